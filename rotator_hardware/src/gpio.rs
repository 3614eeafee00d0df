//! Raspberry Pi wiring: encoder inputs on GPIO, motor speed through a
//! TLC5615 DAC, enable and reverse on GPIO outputs.

use crate::error::{HwError, Result};
use crate::tlc5615::Tlc5615;
use rotator_traits::{InputLines, LineLevels, MotorDriver};
use rppal::gpio::{Gpio, InputPin, OutputPin};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// Encoder A/B/index lines read straight off the header.
pub struct GpioLines {
    a: InputPin,
    b: InputPin,
    index: InputPin,
}

impl GpioLines {
    pub fn new(a: u8, b: u8, index: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        Ok(Self {
            a: gpio.get(a).map_err(gpio_err)?.into_input(),
            b: gpio.get(b).map_err(gpio_err)?.into_input(),
            index: gpio.get(index).map_err(gpio_err)?.into_input(),
        })
    }
}

impl InputLines for GpioLines {
    fn read(&mut self) -> std::result::Result<LineLevels, BoxError> {
        Ok(LineLevels::new(
            self.a.is_high(),
            self.b.is_high(),
            self.index.is_high(),
        ))
    }
}

/// Pin and bus assignment for `DacMotor`.
#[derive(Debug, Clone, Copy)]
pub struct DacMotorPins {
    pub enable: u8,
    pub reverse: u8,
    pub spi_bus: u8,
    pub spi_ss: u8,
    pub spi_clock_hz: u32,
}

pub struct DacMotor {
    dac: Tlc5615,
    enable: OutputPin,
    reverse: OutputPin,
}

impl DacMotor {
    /// Opens the pins with the motor disabled and the DAC at zero.
    pub fn new(pins: DacMotorPins) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut enable = gpio.get(pins.enable).map_err(gpio_err)?.into_output();
        enable.set_low();
        let mut reverse = gpio.get(pins.reverse).map_err(gpio_err)?.into_output();
        reverse.set_low();
        let dac = Tlc5615::new(pins.spi_bus, pins.spi_ss, pins.spi_clock_hz)?;
        tracing::debug!(?pins, "dac motor ready");
        Ok(Self {
            dac,
            enable,
            reverse,
        })
    }
}

impl MotorDriver for DacMotor {
    fn set_level(&mut self, level: u16) -> std::result::Result<(), BoxError> {
        self.dac.write_level(level)?;
        Ok(())
    }

    fn set_enable(&mut self, on: bool) -> std::result::Result<(), BoxError> {
        if on {
            self.enable.set_high();
        } else {
            self.enable.set_low();
        }
        Ok(())
    }

    fn set_reverse(&mut self, reverse: bool) -> std::result::Result<(), BoxError> {
        if reverse {
            self.reverse.set_high();
        } else {
            self.reverse.set_low();
        }
        Ok(())
    }
}

impl Drop for DacMotor {
    fn drop(&mut self) {
        self.enable.set_low();
        if let Err(e) = self.dac.write_level(0) {
            tracing::warn!(error = %e, "failed to zero dac on drop");
        }
    }
}
