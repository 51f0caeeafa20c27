//! Log-domain arithmetic in the acoustic model's log base.
//!
//! Every score in the decoder is a logarithm in a configurable base (1.0001 by
//! default) so that products become sums and tiny probabilities stay representable.

use crate::constants::logmath::{DEFAULT_LOG_BASE, LOG_ONE, LOG_ZERO};
use crate::error::{ConfigError, Result};

/// Conversion and addition helpers for one log base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogMath {
    log_base: f64,
    natural_log_base: f64,
    inverse_natural_log_base: f64,
}

impl LogMath {
    /// Log-domain zero.
    pub const LOG_ZERO: f32 = LOG_ZERO;

    /// Log-domain one.
    pub const LOG_ONE: f32 = LOG_ONE;

    /// Create helpers for the given base, which must be greater than one.
    pub fn new(log_base: f64) -> Result<Self> {
        if !(log_base > 1.0 && log_base.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "log_base",
                value: log_base.to_string(),
            }
            .into());
        }
        let natural_log_base = log_base.ln();
        Ok(Self {
            log_base,
            natural_log_base,
            inverse_natural_log_base: 1.0 / natural_log_base,
        })
    }

    /// The log base.
    pub fn log_base(&self) -> f64 {
        self.log_base
    }

    /// Convert a linear probability to the log domain.
    pub fn linear_to_log(&self, linear: f64) -> f32 {
        if linear <= 0.0 || linear.is_nan() {
            return LOG_ZERO;
        }
        clamp_to_f32(linear.ln() * self.inverse_natural_log_base)
    }

    /// Convert a log-domain value back to a linear probability.
    pub fn log_to_linear(&self, log_value: f32) -> f64 {
        if log_value <= LOG_ZERO {
            return 0.0;
        }
        (log_value as f64 * self.natural_log_base).exp()
    }

    /// Convert a natural logarithm to this log base.
    pub fn ln_to_log(&self, ln_value: f32) -> f32 {
        if ln_value <= LOG_ZERO {
            return LOG_ZERO;
        }
        clamp_to_f32(ln_value as f64 * self.inverse_natural_log_base)
    }

    /// Convert a value in this log base to a natural logarithm.
    pub fn log_to_ln(&self, log_value: f32) -> f64 {
        if log_value <= LOG_ZERO {
            return f64::NEG_INFINITY;
        }
        log_value as f64 * self.natural_log_base
    }

    /// Convert a base-10 logarithm (as found in ARPA language models) to this log base.
    pub fn log10_to_log(&self, log10_value: f32) -> f32 {
        if log10_value <= LOG_ZERO {
            return LOG_ZERO;
        }
        clamp_to_f32(log10_value as f64 * std::f64::consts::LN_10 * self.inverse_natural_log_base)
    }

    /// Returns `log(a_linear + b_linear)` given `a` and `b` in the log domain.
    pub fn add_as_linear(&self, a: f32, b: f32) -> f32 {
        let (high, low) = if a > b { (a, b) } else { (b, a) };
        if low <= LOG_ZERO {
            return high;
        }
        let diff = high as f64 - low as f64;
        let correction = (-diff * self.natural_log_base).exp().ln_1p() * self.inverse_natural_log_base;
        clamp_to_f32(high as f64 + correction)
    }

    /// `log_value` raised to `weight` in the linear domain, never below log-zero.
    pub fn scale(log_value: f32, weight: f32) -> f32 {
        clamp_to_f32(log_value as f64 * weight as f64)
    }

    /// Log-domain sum of a sequence of log values.
    pub fn sum<I>(&self, values: I) -> f32
    where
        I: IntoIterator<Item = f32>,
    {
        values
            .into_iter()
            .fold(LOG_ZERO, |total, v| self.add_as_linear(total, v))
    }
}

impl Default for LogMath {
    fn default() -> Self {
        let natural_log_base = DEFAULT_LOG_BASE.ln();
        Self {
            log_base: DEFAULT_LOG_BASE,
            natural_log_base,
            inverse_natural_log_base: 1.0 / natural_log_base,
        }
    }
}

fn clamp_to_f32(value: f64) -> f32 {
    if value.is_nan() {
        LOG_ZERO
    } else if value <= LOG_ZERO as f64 {
        LOG_ZERO
    } else if value >= f32::MAX as f64 {
        f32::MAX
    } else {
        value as f32
    }
}
