use std::collections::HashMap;

/// Highest value reported while at least one part is unfinished.
const UNFINISHED_CEILING: f64 = 99.99;

/// Merges per-part progress into one overall percentage.
///
/// Each part contributes its last reported percentage (0–100); the overall
/// value is the mean over all parts, so parts that have not started count
/// as zero. A single-PUT transfer is a session of one part.
///
/// A part's value only moves forward until [`reset`](Self::reset) is
/// called for it. A retried part is reset and re-accumulates, so the
/// displayed total dips; that dip is expected.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    total_parts: u32,
    parts: HashMap<u32, f64>,
}

impl ProgressAggregator {
    /// Creates an aggregator for `total_parts` parts (at least one).
    pub fn new(total_parts: u32) -> Self {
        Self {
            total_parts: total_parts.max(1),
            parts: HashMap::new(),
        }
    }

    /// Records `fraction` (0.0–1.0) for a part and returns the overall
    /// percentage.
    pub fn update(&mut self, part_number: u32, fraction: f64) -> f64 {
        let percent = if fraction.is_finite() {
            (fraction * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let slot = self.parts.entry(part_number).or_insert(0.0);
        if percent > *slot {
            *slot = percent;
        }
        self.overall()
    }

    /// Drops a part's contribution back to zero before it is retried.
    pub fn reset(&mut self, part_number: u32) -> f64 {
        self.parts.insert(part_number, 0.0);
        self.overall()
    }

    /// Last reported percentage of one part.
    pub fn part(&self, part_number: u32) -> f64 {
        self.parts.get(&part_number).copied().unwrap_or(0.0)
    }

    /// Overall percentage in `[0, 100]`; exactly 100 only once every part
    /// reported 100.
    pub fn overall(&self) -> f64 {
        if self.is_complete() {
            return 100.0;
        }
        let sum: f64 = self.parts.values().sum();
        (sum / f64::from(self.total_parts)).clamp(0.0, UNFINISHED_CEILING)
    }

    /// Whether every part `1..=total_parts` reported 100.
    pub fn is_complete(&self) -> bool {
        (1..=self.total_parts).all(|n| self.part(n) >= 100.0)
    }

    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }
}
