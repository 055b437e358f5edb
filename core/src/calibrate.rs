//! Measures how fast this machine is compared with the reference judge machine.

use std::{hint::black_box, time::Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error(
        "Calibration self-check failed: expected residue {expected} but got {actual}. \
         The reference timing cannot be trusted on this machine"
    )]
    SelfCheck { expected: u64, actual: u64 },

    #[error("Calibration produced an invalid multiplier: {0}")]
    InvalidMultiplier(f64),

    #[error("Invalid calibration setting: {0}")]
    InvalidSetting(&'static str),
}

/// The workload and the reference machine's cost for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub repetitions: u32,
    pub iterations: u64,
    pub modulus: u64,
    /// `iterations! mod modulus`
    pub expected_residue: u64,
    /// Average seconds one repetition takes on the reference machine.
    pub reference_secs: f64,
    /// Skip measuring and use this multiplier.
    pub fixed_multiplier: Option<f64>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            repetitions: 5,
            iterations: 100_000_000,
            modulus: 37,
            expected_residue: 0,
            reference_secs: 0.3495,
            fixed_multiplier: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationResult {
    pub multiplier: f64,
    /// Average seconds per repetition on this machine; `None` when fixed.
    pub measured_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SpeedCalibrator {
    cfg: CalibrationConfig,
}

impl SpeedCalibrator {
    pub fn new(cfg: CalibrationConfig) -> Self {
        Self { cfg }
    }

    /// Runs the workload `repetitions` times and returns
    /// `average_secs / reference_secs`. Larger means slower than the reference.
    pub fn calibrate(&self) -> Result<CalibrationResult, CalibrationError> {
        let cfg = &self.cfg;
        if let Some(m) = cfg.fixed_multiplier {
            return Self::validate(m).map(|multiplier| CalibrationResult {
                multiplier,
                measured_secs: None,
            });
        }
        if cfg.repetitions == 0 {
            return Err(CalibrationError::InvalidSetting("repetitions must be positive"));
        }
        if cfg.modulus == 0 || cfg.modulus > u32::MAX as u64 {
            return Err(CalibrationError::InvalidSetting(
                "modulus must be in 1..=4294967295",
            ));
        }

        let mut total_secs = 0.0;
        for i in 0..cfg.repetitions {
            let start = Instant::now();
            let residue = modular_factorial(black_box(cfg.iterations), black_box(cfg.modulus));
            let secs = start.elapsed().as_secs_f64();

            if residue != cfg.expected_residue {
                return Err(CalibrationError::SelfCheck {
                    expected: cfg.expected_residue,
                    actual: residue,
                });
            }
            log::debug!("Calibration run {}: {:.4}s", i + 1, secs);
            total_secs += secs;
        }
        let average = total_secs / cfg.repetitions as f64;
        let multiplier = Self::validate(average / cfg.reference_secs)?;
        log::info!(
            "This machine runs {:.3} times as slow as the judge (avg {:.4}s)",
            multiplier,
            average
        );

        Ok(CalibrationResult {
            multiplier,
            measured_secs: Some(average),
        })
    }

    fn validate(multiplier: f64) -> Result<f64, CalibrationError> {
        if multiplier.is_finite() && multiplier > 0.0 {
            Ok(multiplier)
        } else {
            Err(CalibrationError::InvalidMultiplier(multiplier))
        }
    }
}

/// Running product `1 × 2 × … × n`, reduced modulo `modulus` at every step.
/// `modulus` must fit in 32 bits.
///
/// ```
/// use runjudge_core::calibrate::modular_factorial;
///
/// assert_eq!(modular_factorial(5, 1000), 120);
/// assert_eq!(modular_factorial(100, 37), 0);
/// ```
pub fn modular_factorial(n: u64, modulus: u64) -> u64 {
    let mut acc = 1 % modulus;
    for i in 1..=n {
        acc = black_box(acc * (i % modulus) % modulus);
    }
    acc
}

#[cfg(test)]
mod test {
    use super::*;

    fn small() -> CalibrationConfig {
        CalibrationConfig {
            repetitions: 3,
            iterations: 200_000,
            reference_secs: 0.001,
            ..Default::default()
        }
    }

    #[test]
    fn modular_factorial_values() {
        assert_eq!(modular_factorial(0, 37), 1);
        assert_eq!(modular_factorial(36, 37), 36); // Wilson's theorem
        assert_eq!(modular_factorial(37, 37), 0);
        assert_eq!(modular_factorial(10, 1), 0);
    }

    #[test]
    fn multiplier_is_positive() {
        let res = SpeedCalibrator::new(small()).calibrate().unwrap();
        assert!(res.multiplier > 0.0);
        assert!(res.multiplier.is_finite());
        assert!(res.measured_secs.unwrap() > 0.0);
    }

    #[test]
    fn self_check_failure_is_fatal() {
        let cfg = CalibrationConfig {
            expected_residue: 1,
            ..small()
        };
        assert_eq!(
            SpeedCalibrator::new(cfg).calibrate().unwrap_err(),
            CalibrationError::SelfCheck {
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn fixed_multiplier_skips_measurement() {
        let cfg = CalibrationConfig {
            fixed_multiplier: Some(1.0),
            ..Default::default()
        };
        let res = SpeedCalibrator::new(cfg).calibrate().unwrap();
        assert_eq!(res.multiplier, 1.0);
        assert_eq!(res.measured_secs, None);

        let cfg = CalibrationConfig {
            fixed_multiplier: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            SpeedCalibrator::new(cfg).calibrate(),
            Err(CalibrationError::InvalidMultiplier(_))
        ));
    }

    #[test]
    fn rejects_zero_repetitions() {
        let cfg = CalibrationConfig {
            repetitions: 0,
            ..small()
        };
        assert!(matches!(
            SpeedCalibrator::new(cfg).calibrate(),
            Err(CalibrationError::InvalidSetting(_))
        ));
    }
}
