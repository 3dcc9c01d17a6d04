use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// Fixed-point position units per raw sample on the target hardware.
pub const DEFAULT_UNITS_PER_SAMPLE: i64 = 4_058;

/// Converts between seconds, samples and the hardware's fixed-point slot positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotScale {
    pub sample_rate: u32,
    pub units_per_sample: i64,
}

impl Default for SlotScale {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            units_per_sample: DEFAULT_UNITS_PER_SAMPLE,
        }
    }
}

impl SlotScale {
    /// Slot units per hundredth of a second.
    #[must_use]
    pub fn centisecond_factor(&self) -> f64 {
        f64::from(self.sample_rate) / 100.0 * self.units_per_sample as f64
    }

    /// Seconds are quantized to centiseconds before scaling.
    #[must_use]
    pub fn seconds_to_units(&self, seconds: f64) -> i64 {
        let centiseconds = (seconds * 100.0).round();
        (centiseconds * self.centisecond_factor()).floor() as i64
    }

    #[must_use]
    pub fn samples_to_units(&self, samples: u64) -> i64 {
        i64::try_from(samples)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.units_per_sample)
    }

    #[must_use]
    pub fn units_to_seconds(&self, units: i64) -> f64 {
        if self.sample_rate == 0 || self.units_per_sample == 0 {
            return 0.0;
        }
        units as f64 / self.units_per_sample as f64 / f64::from(self.sample_rate)
    }

    #[must_use]
    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        if seconds <= 0.0 {
            return 0;
        }
        (seconds * f64::from(self.sample_rate)).round() as u64
    }
}

/// Parse `HH:MM:SS.ss`, `MM:SS.ss` or `SS.ss` into seconds. Non-finite values are rejected.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut seconds = 0.0;
    for part in parts {
        let value: f64 = part.trim().parse().ok()?;
        seconds = seconds * 60.0 + value;
    }
    seconds.is_finite().then_some(seconds)
}

/// Format seconds as `HH:MM:SS.ssss`, dropping up to three trailing zeros.
#[must_use]
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let hours = (seconds / 3_600.0).floor();
    let remainder = seconds - hours * 3_600.0;
    let minutes = (remainder / 60.0).floor();
    let remainder = remainder - minutes * 60.0;

    let mut formatted = format!(
        "{:02}:{:02}:{remainder:07.4}",
        hours as u64, minutes as u64
    );
    for _ in 0..3 {
        if formatted.ends_with('0') {
            formatted.pop();
        }
    }
    formatted
}
