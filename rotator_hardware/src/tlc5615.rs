//! TLC5615 10-bit serial DAC driving the motor speed input.
//!
//! The chip takes a 12-bit frame: 10 data bits, MSB first, followed by two
//! don't-care zero bits. A 16-bit transfer is accepted as long as the four
//! leading bits are zero.

/// Largest level the DAC accepts.
pub const MAX_LEVEL: u16 = 0x3FF;

/// SPI frame for `level`, clamped to 10 bits.
#[inline]
pub const fn frame(level: u16) -> [u8; 2] {
    let lvl = if level > MAX_LEVEL { MAX_LEVEL } else { level };
    (lvl << 2).to_be_bytes()
}

#[cfg(feature = "hardware")]
pub use spi::Tlc5615;

#[cfg(feature = "hardware")]
mod spi {
    use super::frame;
    use crate::error::{HwError, Result};
    use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

    pub struct Tlc5615 {
        spi: Spi,
        level: u16,
    }

    fn bus(n: u8) -> Result<Bus> {
        Ok(match n {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            other => return Err(HwError::Spi(format!("unsupported SPI bus {other}"))),
        })
    }

    fn slave_select(n: u8) -> Result<SlaveSelect> {
        Ok(match n {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => return Err(HwError::Spi(format!("unsupported slave select {other}"))),
        })
    }

    impl Tlc5615 {
        pub fn new(bus_no: u8, ss: u8, clock_hz: u32) -> Result<Self> {
            let spi = Spi::new(bus(bus_no)?, slave_select(ss)?, clock_hz, Mode::Mode0)
                .map_err(|e| HwError::Spi(e.to_string()))?;
            let mut dac = Self { spi, level: 0 };
            dac.write_level(0)?;
            Ok(dac)
        }

        pub fn write_level(&mut self, level: u16) -> Result<()> {
            let word = frame(level);
            self.spi
                .write(&word)
                .map_err(|e| HwError::Spi(e.to_string()))?;
            self.level = level.min(super::MAX_LEVEL);
            tracing::trace!(level = self.level, "dac write");
            Ok(())
        }

        pub fn level(&self) -> u16 {
            self.level
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_shifts_past_the_dont_care_bits() {
        assert_eq!(frame(0), [0x00, 0x00]);
        assert_eq!(frame(1), [0x00, 0x04]);
        assert_eq!(frame(0x3FF), [0x0F, 0xFC]);
        assert_eq!(frame(5000), frame(0x3FF));
    }
}
