//! Raw ADC code → force conversion.
//!
//! ```text
//!  code ──× mV/code──▶ mV ──clamp[low, high]──▶ mV' ──linear──▶ 0..=max N
//! ```
//!
//! Readings outside the calibrated window saturate at 0 or `max_output`;
//! they are never extrapolated.  The window is guaranteed non-empty by
//! construction: [`Scaling::new`] rejects `low >= high` at config time and
//! [`DEFAULT_SCALING`] is checked by the compiler.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Lower edge of the load-cell amplifier's usable output (mV).
pub const LOW_BOUND_MV: f32 = 185.0;
/// Upper edge of the load-cell amplifier's usable output (mV).
pub const HIGH_BOUND_MV: f32 = 950.0;
/// Full-scale force (N) at `HIGH_BOUND_MV`.
pub const MAX_OUTPUT_N: f32 = 20.0;
/// Largest full-scale a calibration may declare.  Keeps every reading
/// printable as "#####.## N" in the fixed-size readout buffer.
pub const FULL_SCALE_LIMIT_N: f32 = 10_000.0;

/// Factory calibration, validated at compile time.
pub const DEFAULT_SCALING: Scaling = Scaling::new_const(LOW_BOUND_MV, HIGH_BOUND_MV, MAX_OUTPUT_N);

/// Calibration window mapping millivolts onto force units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScalingFields", into = "ScalingFields")]
pub struct Scaling {
    low_mv: f32,
    high_mv: f32,
    max_output: f32,
}

/// Unvalidated wire shape of [`Scaling`].
#[derive(Serialize, Deserialize)]
struct ScalingFields {
    low_mv: f32,
    high_mv: f32,
    max_output: f32,
}

impl Scaling {
    /// Const constructor; a bad window fails the build when used in a `const`.
    pub const fn new_const(low_mv: f32, high_mv: f32, max_output: f32) -> Self {
        assert!(high_mv > low_mv, "scaling window must be non-empty");
        assert!(max_output > 0.0, "full-scale output must be positive");
        assert!(max_output <= FULL_SCALE_LIMIT_N, "full-scale output too large");
        Self {
            low_mv,
            high_mv,
            max_output,
        }
    }

    /// Runtime constructor for calibration loaded from configuration.
    pub fn new(low_mv: f32, high_mv: f32, max_output: f32) -> Result<Self, ConfigError> {
        if !(low_mv.is_finite() && high_mv.is_finite() && max_output.is_finite()) {
            return Err(ConfigError::ValidationFailed("scaling values must be finite"));
        }
        if high_mv <= low_mv {
            return Err(ConfigError::ValidationFailed("scaling high_mv must exceed low_mv"));
        }
        if max_output <= 0.0 {
            return Err(ConfigError::ValidationFailed("scaling max_output must be positive"));
        }
        if max_output > FULL_SCALE_LIMIT_N {
            return Err(ConfigError::ValidationFailed("scaling max_output too large"));
        }
        Ok(Self {
            low_mv,
            high_mv,
            max_output,
        })
    }

    pub fn low_mv(&self) -> f32 {
        self.low_mv
    }

    pub fn high_mv(&self) -> f32 {
        self.high_mv
    }

    pub fn max_output(&self) -> f32 {
        self.max_output
    }

    /// Saturate `mv` to the calibration window.
    pub fn clamp(&self, mv: f32) -> f32 {
        mv.clamp(self.low_mv, self.high_mv)
    }

    /// Clamp then remap onto `0..=max_output`.
    pub fn scale(&self, mv: f32) -> f32 {
        let clamped = self.clamp(mv);
        (clamped - self.low_mv) * (self.max_output - 0.0) / (self.high_mv - self.low_mv) + 0.0
    }
}

impl Default for Scaling {
    fn default() -> Self {
        DEFAULT_SCALING
    }
}

impl TryFrom<ScalingFields> for Scaling {
    type Error = ConfigError;

    fn try_from(f: ScalingFields) -> Result<Self, Self::Error> {
        Self::new(f.low_mv, f.high_mv, f.max_output)
    }
}

impl From<Scaling> for ScalingFields {
    fn from(s: Scaling) -> Self {
        Self {
            low_mv: s.low_mv,
            high_mv: s.high_mv,
            max_output: s.max_output,
        }
    }
}

/// One conversion, produced once per tick and overwritten by the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Signed output code straight from the ADC.
    pub raw_code: i16,
    /// `raw_code` converted to millivolts.
    pub millivolts: f32,
    /// `millivolts` saturated to the calibration window.
    pub clamped_mv: f32,
    /// Force in newtons.
    pub force: f32,
}

/// Stateless raw-code → [`Sample`] transform.
#[derive(Debug, Clone, Copy)]
pub struct SignalProcessor {
    scaling: Scaling,
    mv_per_code: f32,
}

impl SignalProcessor {
    /// `mv_per_code` is the ADC's LSB size for its current resolution/gain.
    pub fn new(scaling: Scaling, mv_per_code: f32) -> Self {
        Self {
            scaling,
            mv_per_code,
        }
    }

    pub fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    pub fn process(&self, raw_code: i16) -> Sample {
        let millivolts = f32::from(raw_code) * self.mv_per_code;
        Sample {
            raw_code,
            millivolts,
            clamped_mv: self.scaling.clamp(millivolts),
            force: self.scaling.scale(millivolts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MV_PER_CODE_16BIT: f32 = 0.0625;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn four_hundred_millivolts_scales_to_5_62_newtons() {
        let p = SignalProcessor::new(DEFAULT_SCALING, MV_PER_CODE_16BIT);
        // 6400 codes × 0.0625 mV = 400 mV
        let s = p.process(6400);
        assert!(approx(s.millivolts, 400.0));
        assert!(approx(s.clamped_mv, 400.0));
        let expected = (400.0 - 185.0) * 20.0 / (950.0 - 185.0);
        assert!(approx(s.force, expected));
        assert!((s.force - 5.62).abs() < 0.01);
    }

    #[test]
    fn below_window_saturates_to_zero() {
        let p = SignalProcessor::new(DEFAULT_SCALING, MV_PER_CODE_16BIT);
        let s = p.process(-3000);
        assert_eq!(s.clamped_mv, LOW_BOUND_MV);
        assert_eq!(s.force, 0.0);
    }

    #[test]
    fn above_window_saturates_to_full_scale() {
        let p = SignalProcessor::new(DEFAULT_SCALING, MV_PER_CODE_16BIT);
        let s = p.process(i16::MAX);
        assert_eq!(s.clamped_mv, HIGH_BOUND_MV);
        assert!(approx(s.force, MAX_OUTPUT_N));
    }

    #[test]
    fn window_edges_map_to_range_edges() {
        assert_eq!(DEFAULT_SCALING.scale(LOW_BOUND_MV), 0.0);
        assert!(approx(DEFAULT_SCALING.scale(HIGH_BOUND_MV), MAX_OUTPUT_N));
    }

    #[test]
    fn runtime_constructor_rejects_empty_window() {
        assert!(Scaling::new(500.0, 500.0, 20.0).is_err());
        assert!(Scaling::new(600.0, 500.0, 20.0).is_err());
        assert!(Scaling::new(100.0, 500.0, 0.0).is_err());
        assert!(Scaling::new(f32::NAN, 500.0, 20.0).is_err());
        assert!(Scaling::new(100.0, 500.0, 10.0).is_ok());
        assert!(Scaling::new(100.0, 500.0, FULL_SCALE_LIMIT_N).is_ok());
        assert!(Scaling::new(100.0, 500.0, 1e20).is_err());
    }

    #[test]
    fn deserialising_invalid_window_fails() {
        let bad = r#"{"low_mv":950.0,"high_mv":185.0,"max_output":20.0}"#;
        assert!(serde_json::from_str::<Scaling>(bad).is_err());

        let good = r#"{"low_mv":100.0,"high_mv":900.0,"max_output":10.0}"#;
        let s: Scaling = serde_json::from_str(good).unwrap();
        assert_eq!(s.high_mv(), 900.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn output_always_within_range(mv in -10_000.0f32..10_000.0) {
            let out = DEFAULT_SCALING.scale(mv);
            prop_assert!((0.0..=MAX_OUTPUT_N + 1e-4).contains(&out));
        }

        #[test]
        fn scaling_is_monotonic(a in LOW_BOUND_MV..HIGH_BOUND_MV, b in LOW_BOUND_MV..HIGH_BOUND_MV) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(DEFAULT_SCALING.scale(lo) <= DEFAULT_SCALING.scale(hi));
        }
    }
}
