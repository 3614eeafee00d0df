pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Raw (undebounced) levels of the three encoder lines at one instant.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineLevels {
    pub a: bool,
    pub b: bool,
    pub index: bool,
}

impl LineLevels {
    pub const fn new(a: bool, b: bool, index: bool) -> Self {
        Self { a, b, index }
    }
}

/// Source of the encoder's phase A, phase B and index levels.
pub trait InputLines {
    fn read(&mut self) -> Result<LineLevels, Box<dyn std::error::Error + Send + Sync>>;
}

/// Register-level motor drive: a quantized speed level plus enable and
/// direction outputs.
pub trait MotorDriver {
    fn set_level(&mut self, level: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_enable(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// `true` selects the reverse rotation sense.
    fn set_reverse(&mut self, reverse: bool)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: InputLines + ?Sized> InputLines for Box<T> {
    fn read(&mut self) -> Result<LineLevels, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read()
    }
}

impl<T: MotorDriver + ?Sized> MotorDriver for Box<T> {
    fn set_level(&mut self, level: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_level(level)
    }
    fn set_enable(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_enable(on)
    }
    fn set_reverse(
        &mut self,
        reverse: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_reverse(reverse)
    }
}
