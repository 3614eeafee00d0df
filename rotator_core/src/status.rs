//! Status bitset reported to the outside world.

/// Small bitset of rotator state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const OK: u8 = 0x01;
    pub const MOVING: u8 = 0x02;
    /// Set while driving in the reverse sense.
    pub const DIRECTION: u8 = 0x04;
    pub const PID_BUSY: u8 = 0x08;
    pub const PID_DONE: u8 = 0x10;
    pub const CALIB_BUSY: u8 = 0x20;

    const NAMES: [(u8, &'static str); 6] = [
        (Self::OK, "ok"),
        (Self::MOVING, "moving"),
        (Self::DIRECTION, "direction"),
        (Self::PID_BUSY, "pid_busy"),
        (Self::PID_DONE, "pid_done"),
        (Self::CALIB_BUSY, "calib_busy"),
    ];

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    pub fn set(&mut self, flag: u8, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    /// Names of the flags that are set, lowest bit first.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, n)| *n)
            .collect()
    }
}

impl std::fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02X} [{}]", self.0, self.names().join(","))
    }
}
