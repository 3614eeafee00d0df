//! Named settings exposed to an operator or protocol layer.
//!
//! Each writable setting carries the range it is checked against; the
//! `Rotator` applies them (see `Rotator::write_setting`).

use crate::error::RotatorError;
use std::str::FromStr;

/// Reported for index-relative values while the zero is unknown.
pub const UNKNOWN_POSITION_DEG: f32 = -999.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    Position,
    Target,
    MaxSpeed,
    MinSpeed,
    MaxAccel,
    Kp,
    Ki,
    Kd,
    Period,
    Bias,
    XferPosSlope,
    XferPosIntercept,
    XferNegSlope,
    XferNegIntercept,
    DistanceToTarget,
    TimeToTarget,
    Offset,
    RealPosition,
    Speed,
    SpeedAvg,
    SpeedDac,
    Status,
}

impl Setting {
    pub const ALL: [Setting; 22] = [
        Setting::Position,
        Setting::Target,
        Setting::MaxSpeed,
        Setting::MinSpeed,
        Setting::MaxAccel,
        Setting::Kp,
        Setting::Ki,
        Setting::Kd,
        Setting::Period,
        Setting::Bias,
        Setting::XferPosSlope,
        Setting::XferPosIntercept,
        Setting::XferNegSlope,
        Setting::XferNegIntercept,
        Setting::DistanceToTarget,
        Setting::TimeToTarget,
        Setting::Offset,
        Setting::RealPosition,
        Setting::Speed,
        Setting::SpeedAvg,
        Setting::SpeedDac,
        Setting::Status,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Setting::Position => "position",
            Setting::Target => "target",
            Setting::MaxSpeed => "maxspd",
            Setting::MinSpeed => "minspd",
            Setting::MaxAccel => "maxaccel",
            Setting::Kp => "kp",
            Setting::Ki => "ki",
            Setting::Kd => "kd",
            Setting::Period => "period",
            Setting::Bias => "bias",
            Setting::XferPosSlope => "xfer+m",
            Setting::XferPosIntercept => "xfer+c",
            Setting::XferNegSlope => "xfer-m",
            Setting::XferNegIntercept => "xfer-c",
            Setting::DistanceToTarget => "dtt",
            Setting::TimeToTarget => "ttt",
            Setting::Offset => "offset",
            Setting::RealPosition => "realpos",
            Setting::Speed => "speed",
            Setting::SpeedAvg => "speed_avg",
            Setting::SpeedDac => "speed_dac",
            Setting::Status => "status",
        }
    }

    /// Accepted range for writable settings, `None` for read-only ones.
    ///
    /// `position` and `target` are bounded by the configured motion range
    /// instead; the values here are the stock window.
    pub fn range(self) -> Option<(f32, f32)> {
        match self {
            Setting::Position | Setting::Target => Some((-540.0, 540.0)),
            Setting::MaxSpeed => Some((2.0, 36.0)),
            Setting::MinSpeed => Some((0.5, 5.0)),
            Setting::MaxAccel => Some((1.0, 36.0)),
            Setting::Kp => Some((0.0, 1000.0)),
            Setting::Ki => Some((0.0, 10.0)),
            Setting::Kd => Some((0.0, 100.0)),
            Setting::Period => Some((0.01, 1.0)),
            Setting::Bias => Some((0.0, 10.0)),
            Setting::XferPosSlope | Setting::XferNegSlope => Some((0.5, 10.0)),
            Setting::XferPosIntercept | Setting::XferNegIntercept => Some((-10.0, 10.0)),
            _ => None,
        }
    }

    #[inline]
    pub fn is_writable(self) -> bool {
        self.range().is_some()
    }

    /// Range-check `value` for this setting.
    pub fn check(self, value: f32) -> Result<f32, RotatorError> {
        let Some((min, max)) = self.range() else {
            return Err(RotatorError::ReadOnly(self.name()));
        };
        if value.is_finite() && (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(RotatorError::Range {
                name: self.name(),
                value,
                min,
                max,
            })
        }
    }
}

impl FromStr for Setting {
    type Err = RotatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Setting::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RotatorError::UnknownSetting(wanted.to_string()))
    }
}

impl std::fmt::Display for Setting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a written value combines with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Absolute,
    /// Added to the current value before range checking.
    Relative,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_parses_back() {
        for s in Setting::ALL {
            assert_eq!(s.name().parse::<Setting>(), Ok(s));
        }
        assert_eq!("KP".parse::<Setting>(), Ok(Setting::Kp));
        assert!(matches!(
            "speed_max".parse::<Setting>(),
            Err(RotatorError::UnknownSetting(_))
        ));
    }

    #[test]
    fn read_only_settings_refuse_checks() {
        assert_eq!(
            Setting::Status.check(1.0),
            Err(RotatorError::ReadOnly("status"))
        );
        assert!(Setting::Period.check(0.0).is_err());
        assert_eq!(Setting::Period.check(0.05), Ok(0.05));
    }
}
