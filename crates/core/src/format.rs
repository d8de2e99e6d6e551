//! Display formatting shared by the job and file normalizers.

use chrono::{Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Placeholder for a duration or clock time that cannot be computed.
pub const UNKNOWN_TIME: &str = "--:--";

/// A human-readable duration paired with its unit, e.g. `("1:05", "h")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedDuration {
    pub value: String,
    pub unit: &'static str,
}

impl FormattedDuration {
    pub fn is_unknown(&self) -> bool {
        self.value == UNKNOWN_TIME
    }
}

/// Format a second count as `H:MM` hours.
///
/// Missing, negative and non-finite inputs yield [`UNKNOWN_TIME`].
pub fn format_duration(seconds: Option<f64>) -> FormattedDuration {
    let value = match seconds {
        Some(s) if s.is_finite() && s >= 0.0 => {
            let hours = s / 3600.0;
            let mut whole_hours = hours.floor() as u64;
            let mut minutes = ((hours - hours.floor()) * 60.0).round() as u64;
            if minutes == 60 {
                minutes = 0;
                whole_hours += 1;
            }
            format!("{whole_hours}:{minutes:02}")
        }
        _ => UNKNOWN_TIME.to_string(),
    };

    FormattedDuration { value, unit: "h" }
}

/// Wall-clock `HH:MM` at which a job with `seconds_remaining` left finishes.
pub fn format_end_time(now: NaiveDateTime, seconds_remaining: Option<f64>) -> String {
    match seconds_remaining {
        Some(s) if s.is_finite() && s >= 0.0 => {
            chrono::TimeDelta::try_seconds(s.round() as i64)
                .and_then(|delta| now.checked_add_signed(delta))
                .map_or_else(|| UNKNOWN_TIME.to_string(), |end| end.format("%H:%M").to_string())
        }
        _ => UNKNOWN_TIME.to_string(),
    }
}

/// Physical properties of the loaded filament.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilamentProfile {
    /// Filament diameter in millimetres.
    pub diameter_mm: f64,
    /// Density in g/cm³.
    pub density_g_cm3: f64,
}

impl Default for FilamentProfile {
    fn default() -> Self {
        Self {
            diameter_mm: 1.75,
            density_g_cm3: 1.25,
        }
    }
}

impl FilamentProfile {
    /// Convert an extruded length (mm) into grams, rounded to one decimal.
    pub fn grams(&self, length_mm: f64) -> f64 {
        let radius = self.diameter_mm / 2.0;
        let volume_mm3 = std::f64::consts::PI * radius * radius * length_mm;
        // mm³ * g/cm³ = mg; divide by 100 and round, then by 10 for one decimal.
        (volume_mm3 * self.density_g_cm3 / 100.0).round() / 10.0
    }
}

/// Bytes to megabytes with one decimal, e.g. `"12.3"`.
pub fn format_megabytes(bytes: f64) -> String {
    format!("{:.1}", bytes / 1_000_000.0)
}

/// Unix timestamp to local `dd.mm.yyyy HH:MM:SS`.
pub fn format_upload_date(timestamp: i64) -> Option<String> {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|date| date.format("%d.%m.%Y %H:%M:%S").to_string())
}
