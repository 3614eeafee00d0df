#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and transfer-function characterisation for the rotator.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section is optional; omitted fields take the rig's stock values.
//! - The transfer CSV loader enforces headers and fits one line per rotation
//!   direction, with a robust refit to reduce outlier influence.
use serde::Deserialize;

/// Transfer characterisation CSV schema.
///
/// Expected headers:
/// command,measured
///
/// `command` is the drive-side speed (deg/s) that was requested from the
/// motor drive and `measured` the output speed (deg/s) observed on the
/// encoder. Positive and negative commands are fitted separately.
///
/// Example:
/// command,measured
/// 5.0,4.33
/// 20.0,21.46
/// -5.0,-4.69
/// -20.0,-22.09
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct TransferRow {
    pub command: f32,
    pub measured: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EncoderCfg {
    /// Physical lines per revolution; pulses per revolution is 4x this.
    pub lines_per_rev: u32,
    /// Consecutive disagreeing samples needed to accept a new level.
    pub debounce_count: u8,
    /// Sampling tick period in microseconds.
    pub sample_period_us: u64,
    /// Number of pulse periods averaged for the mean speed.
    pub history_len: usize,
    /// One-off settling delay before the tracker is primed at boot.
    pub startup_delay_ms: u64,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            lines_per_rev: 1024,
            debounce_count: 2,
            sample_period_us: 200,
            history_len: 20,
            startup_delay_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActuatorCfg {
    /// Highest level the DAC accepts (10-bit TLC5615: 1023).
    pub max_level: u16,
    /// Fastest output speed in deg/s; also the full-scale of the level range.
    pub abs_max_speed: f32,
    /// Slowest non-zero speed in deg/s; smaller requests snap up to this.
    pub abs_min_speed: f32,
    /// Swap the polarity of the reverse output.
    pub invert_direction: bool,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            max_level: 1023,
            abs_max_speed: 36.0,
            abs_min_speed: 0.5,
            invert_direction: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct TransferCfg {
    pub pos_slope: f32,
    pub pos_intercept: f32,
    pub neg_slope: f32,
    pub neg_intercept: f32,
}

impl Default for TransferCfg {
    fn default() -> Self {
        Self {
            pos_slope: 1.1417,
            pos_intercept: -1.3754,
            neg_slope: 1.1598,
            neg_intercept: 1.1071,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControllerCfg {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Control period in seconds.
    pub period_s: f32,
    pub bias: f32,
    /// deg/s^2
    pub max_accel: f32,
    /// deg/s
    pub max_speed: f32,
    /// deg/s; also the arrival speed threshold
    pub min_speed: f32,
    /// Position report interval while moving (ms).
    pub report_ms: u64,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            kp: 80.0,
            ki: 0.4,
            kd: 2.0,
            period_s: 0.01,
            bias: 0.0,
            max_accel: 9.0,
            max_speed: 36.0,
            min_speed: 1.5,
            report_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsCfg {
    /// Lowest commandable position (deg).
    pub min_deg: f32,
    /// Highest commandable position (deg).
    pub max_deg: f32,
}

impl Default for LimitsCfg {
    fn default() -> Self {
        Self {
            min_deg: -540.0,
            max_deg: 540.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Length of the zero-seeking sweep (deg).
    pub sweep_deg: f32,
    /// Give up after this many failed index verifications; unlimited when absent.
    pub max_retries: Option<u32>,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            sweep_deg: 360.0,
            max_retries: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Main-loop pacing in milliseconds.
    pub loop_period_ms: u64,
    /// Abort a motion or calibration after this long (0 disables).
    pub timeout_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            loop_period_ms: 1,
            timeout_ms: 0,
        }
    }
}

/// BCM pin numbers and SPI selection for the hardware backend.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub enc_a: u8,
    pub enc_b: u8,
    pub enc_index: u8,
    pub motor_enable: u8,
    pub motor_reverse: u8,
    /// SPI bus (0 or 1) for the DAC.
    pub dac_bus: u8,
    /// SPI chip-select line for the DAC.
    pub dac_ss: u8,
    pub dac_clock_hz: u32,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            enc_a: 17,
            enc_b: 27,
            enc_index: 22,
            motor_enable: 23,
            motor_reverse: 24,
            dac_bus: 0,
            dac_ss: 0,
            dac_clock_hz: 1_000_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub encoder: EncoderCfg,
    pub actuator: ActuatorCfg,
    pub transfer: TransferCfg,
    pub controller: ControllerCfg,
    pub limits: LimitsCfg,
    pub calibration: CalibrationCfg,
    pub runner: RunnerCfg,
    pub pins: Pins,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// One direction's fitted line `measured = slope * command + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f32,
    pub intercept: f32,
}

/// Per-direction fit of the motor drive's response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferFit {
    pub positive: LineFit,
    pub negative: LineFit,
}

impl From<TransferFit> for TransferCfg {
    fn from(f: TransferFit) -> Self {
        Self {
            pos_slope: f.positive.slope,
            pos_intercept: f.positive.intercept,
            neg_slope: f.negative.slope,
            neg_intercept: f.negative.intercept,
        }
    }
}

impl TransferFit {
    /// Fit both quadrants from characterisation rows. Rows with a zero command
    /// carry no direction and are skipped.
    pub fn from_rows(rows: &[TransferRow]) -> eyre::Result<Self> {
        let pos: Vec<(f64, f64)> = rows
            .iter()
            .filter(|r| r.command > 0.0)
            .map(|r| (f64::from(r.command), f64::from(r.measured)))
            .collect();
        let neg: Vec<(f64, f64)> = rows
            .iter()
            .filter(|r| r.command < 0.0)
            .map(|r| (f64::from(r.command), f64::from(r.measured)))
            .collect();
        for (name, pts) in [("positive", &pos), ("negative", &neg)] {
            if pts.len() < 2 {
                eyre::bail!(
                    "transfer fit requires at least two {name} rows, got {}",
                    pts.len()
                );
            }
            if pts.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
                eyre::bail!("transfer rows must be finite numbers");
            }
        }
        Ok(Self {
            positive: fit_direction(&pos)?,
            negative: fit_direction(&neg)?,
        })
    }
}

impl TryFrom<&[TransferRow]> for TransferFit {
    type Error = eyre::Report;
    fn try_from(rows: &[TransferRow]) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

/// Ordinary least squares in f64, then a single 2-sigma outlier rejection pass.
fn fit_direction(pts: &[(f64, f64)]) -> eyre::Result<LineFit> {
    let (a0, b0) = ols(pts)?;
    let mut sumsq = 0.0f64;
    for (x, y) in pts {
        let r = y - (a0 * x + b0);
        sumsq += r * r;
    }
    let rms = (sumsq / pts.len() as f64).sqrt();
    let (a, b) = robust_refit(pts, a0, b0, rms, 2.0).unwrap_or((a0, b0));
    let (slope, intercept) = (a as f32, b as f32);
    if !(slope.is_finite() && slope > 0.0) {
        eyre::bail!("transfer fit produced a non-positive slope ({a:.4})");
    }
    if !intercept.is_finite() {
        eyre::bail!("transfer fit produced a non-finite intercept");
    }
    Ok(LineFit { slope, intercept })
}

fn ols(pts: &[(f64, f64)]) -> eyre::Result<(f64, f64)> {
    let n = pts.len() as f64;
    let mean_x = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    for (x, y) in pts {
        let dx = x - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }
    if !sxx.is_finite() || sxx == 0.0 {
        eyre::bail!("transfer fit cannot determine slope (all commands identical)");
    }
    let a = sxy / sxx;
    if !a.is_finite() {
        eyre::bail!("transfer fit produced non-finite slope");
    }
    Ok((a, mean_y - a * mean_x))
}

/// Refit over the points whose residual around `y = a0*x + b0` is within
/// `k * rms`, using an online (Welford/Chan) covariance update. Returns None
/// when nothing was rejected or the inlier set is degenerate, in which case
/// the caller keeps the original line.
fn robust_refit(pts: &[(f64, f64)], a0: f64, b0: f64, rms: f64, k: f64) -> Option<(f64, f64)> {
    if !(rms.is_finite() && rms > 0.0 && k.is_finite() && k > 0.0) {
        return None;
    }
    let thr = k * rms;
    let mut n_in: usize = 0;
    let mut mean_x = 0.0f64;
    let mut mean_y = 0.0f64;
    let mut cxx = 0.0f64;
    let mut cxy = 0.0f64;

    for (x, y) in pts {
        if (y - (a0 * x + b0)).abs() > thr {
            continue;
        }
        n_in += 1;
        let n = n_in as f64;
        let dx = x - mean_x;
        let dy = y - mean_y;
        let mx = mean_x + dx / n;
        let my = mean_y + dy / n;
        cxx += dx * (x - mx);
        cxy += dx * (y - my);
        mean_x = mx;
        mean_y = my;
    }

    if n_in < 2 || n_in == pts.len() || !cxx.is_finite() || cxx == 0.0 {
        return None;
    }
    let a = cxy / cxx;
    if !a.is_finite() {
        return None;
    }
    Some((a, mean_y - a * mean_x))
}

pub fn load_transfer_csv(path: &std::path::Path) -> eyre::Result<TransferFit> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open transfer CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["command", "measured"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "transfer CSV must have headers 'command,measured', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<TransferRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }

    TransferFit::try_from(rows.as_slice())
}

fn check_range(name: &str, v: f32, lo: f32, hi: f32) -> eyre::Result<()> {
    if !(v.is_finite() && (lo..=hi).contains(&v)) {
        eyre::bail!("{name} must be in [{lo}, {hi}], got {v}");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Encoder
        if self.encoder.lines_per_rev == 0 || self.encoder.lines_per_rev > 1 << 20 {
            eyre::bail!("encoder.lines_per_rev must be in [1, 1048576]");
        }
        if self.encoder.debounce_count == 0 {
            eyre::bail!("encoder.debounce_count must be >= 1");
        }
        if !(10..=100_000).contains(&self.encoder.sample_period_us) {
            eyre::bail!("encoder.sample_period_us must be in [10, 100000]");
        }
        if !(1..=1024).contains(&self.encoder.history_len) {
            eyre::bail!("encoder.history_len must be in [1, 1024]");
        }
        if self.encoder.startup_delay_ms > 10_000 {
            eyre::bail!("encoder.startup_delay_ms is unreasonably large (>10s)");
        }

        // Actuator
        if self.actuator.max_level == 0 {
            eyre::bail!("actuator.max_level must be >= 1");
        }
        if !(self.actuator.abs_min_speed > 0.0) {
            eyre::bail!("actuator.abs_min_speed must be > 0");
        }
        if !(self.actuator.abs_max_speed > self.actuator.abs_min_speed)
            || !self.actuator.abs_max_speed.is_finite()
        {
            eyre::bail!("actuator.abs_max_speed must be > actuator.abs_min_speed");
        }

        // Transfer
        check_range("transfer.pos_slope", self.transfer.pos_slope, 0.5, 10.0)?;
        check_range("transfer.neg_slope", self.transfer.neg_slope, 0.5, 10.0)?;
        check_range(
            "transfer.pos_intercept",
            self.transfer.pos_intercept,
            -10.0,
            10.0,
        )?;
        check_range(
            "transfer.neg_intercept",
            self.transfer.neg_intercept,
            -10.0,
            10.0,
        )?;

        // Controller
        let c = &self.controller;
        check_range("controller.kp", c.kp, 0.0, 1000.0)?;
        check_range("controller.ki", c.ki, 0.0, 10.0)?;
        check_range("controller.kd", c.kd, 0.0, 100.0)?;
        check_range("controller.period_s", c.period_s, 0.01, 1.0)?;
        check_range("controller.bias", c.bias, 0.0, 10.0)?;
        check_range("controller.max_accel", c.max_accel, 1.0, 36.0)?;
        check_range("controller.max_speed", c.max_speed, 2.0, 36.0)?;
        check_range("controller.min_speed", c.min_speed, 0.5, 5.0)?;
        if c.min_speed > c.max_speed {
            eyre::bail!("controller.min_speed must be <= controller.max_speed");
        }
        if c.max_speed > self.actuator.abs_max_speed {
            eyre::bail!("controller.max_speed must be <= actuator.abs_max_speed");
        }
        if c.report_ms == 0 {
            eyre::bail!("controller.report_ms must be >= 1");
        }

        // Limits
        if !(self.limits.min_deg.is_finite() && self.limits.max_deg.is_finite()) {
            eyre::bail!("limits.min_deg and limits.max_deg must be finite");
        }
        if self.limits.min_deg >= self.limits.max_deg {
            eyre::bail!("limits.min_deg must be < limits.max_deg");
        }

        // Calibration
        if !(self.calibration.sweep_deg > 0.0 && self.calibration.sweep_deg <= 720.0) {
            eyre::bail!("calibration.sweep_deg must be in (0, 720]");
        }
        if self.calibration.max_retries == Some(0) {
            eyre::bail!("calibration.max_retries must be >= 1 when set");
        }

        // Runner
        if !(1..=1000).contains(&self.runner.loop_period_ms) {
            eyre::bail!("runner.loop_period_ms must be in [1, 1000]");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
