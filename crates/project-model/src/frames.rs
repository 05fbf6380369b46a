//! Frame ranges sampled by cache exports.

use serde::{Deserialize, Serialize};

/// Tolerance used when deciding whether the last sample lands on `end`.
const FRAME_EPSILON: f64 = 1e-6;

/// Largest number of samples a single range may produce.
pub const MAX_FRAME_SAMPLES: usize = 1_000_000;

/// An inclusive frame range sampled at a fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl FrameRange {
    pub fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    /// A single-frame range.
    pub fn single(frame: f64) -> Self {
        Self::new(frame, frame, 1.0)
    }

    /// Check that the range can be sampled.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.start.is_finite() && self.end.is_finite() && self.step.is_finite()) {
            return Err("frame range values must be finite".to_string());
        }
        if self.step <= 0.0 {
            return Err(format!("frame step must be positive, got {}", self.step));
        }
        if self.end < self.start {
            return Err(format!(
                "frame range end {} is before start {}",
                self.end, self.start
            ));
        }
        let count = self.raw_count();
        if count > MAX_FRAME_SAMPLES as f64 {
            return Err(format!(
                "frame range {}..{} step {} yields more than {MAX_FRAME_SAMPLES} samples",
                self.start, self.end, self.step
            ));
        }
        Ok(())
    }

    fn raw_count(&self) -> f64 {
        ((self.end - self.start) / self.step + FRAME_EPSILON).floor() + 1.0
    }

    /// Number of samples, or 0 for an invalid range.
    pub fn count(&self) -> usize {
        if self.validate().is_err() {
            return 0;
        }
        self.raw_count() as usize
    }

    /// Sample times: `start`, `start + step`, ... up to and including `end`.
    ///
    /// Samples are computed as `start + i * step` so long ranges do not
    /// accumulate rounding error.
    pub fn samples(&self) -> impl Iterator<Item = f64> {
        let Self { start, step, .. } = *self;
        (0..self.count()).map(move |i| start + i as f64 * step)
    }

    /// The range covering the first `count` samples, or `None` when no
    /// sample was taken.
    pub fn truncated(&self, count: usize) -> Option<Self> {
        let last = count.checked_sub(1)?;
        let end = self.start + last as f64 * self.step;
        Some(Self::new(self.start, end.min(self.end), self.step))
    }
}

impl Default for FrameRange {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_include_both_ends() {
        let range = FrameRange::new(1.0, 3.0, 1.0);
        assert_eq!(range.samples().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
        assert_eq!(range.count(), 3);
    }

    #[test]
    fn fractional_steps_do_not_drift() {
        let range = FrameRange::new(0.0, 1.0, 0.1);
        let samples: Vec<f64> = range.samples().collect();
        assert_eq!(samples.len(), 11);
        assert!((samples[10] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn step_that_overshoots_stops_before_end() {
        let range = FrameRange::new(1.0, 4.0, 2.0);
        assert_eq!(range.samples().collect::<Vec<_>>(), vec![1.0, 3.0]);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(FrameRange::new(1.0, 10.0, 0.0).validate().is_err());
        assert!(FrameRange::new(10.0, 1.0, 1.0).validate().is_err());
        assert_eq!(FrameRange::new(10.0, 1.0, 1.0).samples().count(), 0);
    }

    #[test]
    fn oversized_ranges_are_rejected_without_allocating() {
        let range = FrameRange::new(0.0, 1e9, 1e-3);
        assert!(range.validate().is_err());
        assert_eq!(range.count(), 0);
        assert_eq!(range.samples().next(), None);

        let largest = FrameRange::new(1.0, MAX_FRAME_SAMPLES as f64, 1.0);
        assert!(largest.validate().is_ok());
        assert_eq!(largest.count(), MAX_FRAME_SAMPLES);
    }

    #[test]
    fn truncation_covers_the_samples_taken() {
        let range = FrameRange::new(1.0, 10.0, 0.5);
        assert_eq!(range.truncated(0), None);
        assert_eq!(range.truncated(1), Some(FrameRange::new(1.0, 1.0, 0.5)));
        assert_eq!(range.truncated(3), Some(FrameRange::new(1.0, 2.0, 0.5)));
        assert_eq!(range.truncated(range.count()), Some(range));
    }
}
