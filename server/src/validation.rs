use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::ApiError;

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Speed must be a finite positive multiplier.
pub fn validate_speed(speed: f32) -> Result<f32, ApiError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(ApiError::InvalidInput(format!(
            "Invalid speed: {speed}. Must be a positive number"
        )));
    }
    Ok(speed)
}

/// ISO-8601 timestamp, with or without an offset. Offset-less values are
/// taken as UTC; `None` means now.
pub fn parse_timestamp(value: Option<&str>) -> Result<DateTime<Utc>, ApiError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(Utc::now());
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(ApiError::InvalidInput(format!(
        "Invalid timestamp: {raw}. Expected ISO-8601 (e.g., 2024-01-01T12:00:00Z)"
    )))
}

/// Language is an opaque tag handed to the backend. Only control
/// characters are rejected.
pub fn validate_language(language: &str) -> Result<(), ApiError> {
    if language.chars().any(char::is_control) {
        return Err(ApiError::InvalidInput(
            "Invalid language: control characters are not allowed".to_string(),
        ));
    }
    Ok(())
}

/// Audio names are plain file names inside the audio directory.
pub fn validate_audio_filename(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(ApiError::NotFound("Audio file not found".to_string()));
    }
    Ok(())
}
