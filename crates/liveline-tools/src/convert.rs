//! Unit conversions between user-facing values and Live's normalized ranges.
//!
//! Volume: Live's fader is 0.0-1.0 with unity gain (0 dB) at 0.85 and +6 dB
//! at 1.0. Pan: users speak MIDI 0-127 (64 = center), Live speaks -1.0-1.0.

use crate::error::{Result, ToolError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const UNITY_GAIN: f64 = 0.85;
pub const MIN_DB: f64 = -70.0;
pub const MAX_DB: f64 = 6.0;

pub const MIN_TEMPO: f64 = 20.0;
pub const MAX_TEMPO: f64 = 999.0;

/// A tool argument that may arrive as a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl fmt::Display for NumberOrText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberOrText::Number(n) => write!(f, "{}", n),
            NumberOrText::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for NumberOrText {
    fn from(n: f64) -> Self {
        NumberOrText::Number(n)
    }
}

impl From<&str> for NumberOrText {
    fn from(s: &str) -> Self {
        NumberOrText::Text(s.to_string())
    }
}

/// Longest leading decimal number in `s`, ignoring leading whitespace.
/// `"-6db"` gives `-6.0`, `"abc"` gives `None`.
pub fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

/// Longest leading integer in `s`, ignoring leading whitespace.
pub fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s[..end].parse().ok()
}

// -----------------------------------------------------------------------------
// Volume
// -----------------------------------------------------------------------------

pub fn db_to_normalized(db: f64) -> f64 {
    if db <= MIN_DB {
        return 0.0;
    }
    let value = if db <= 0.0 {
        UNITY_GAIN * 10f64.powf(db / 20.0)
    } else {
        UNITY_GAIN + (db / MAX_DB) * (1.0 - UNITY_GAIN)
    };
    value.clamp(0.0, 1.0)
}

/// Silence maps to negative infinity.
pub fn normalized_to_db(value: f64) -> f64 {
    if value < 1e-7 {
        return f64::NEG_INFINITY;
    }
    if value <= UNITY_GAIN {
        return 20.0 * (value / UNITY_GAIN).log10();
    }
    (((value - UNITY_GAIN) / (1.0 - UNITY_GAIN)) * MAX_DB).min(MAX_DB)
}

/// Accepts `"-6dB"`, `"-inf"`, a numeric string, or a number in 0.0-1.0.
pub fn parse_volume_input(input: &NumberOrText) -> Result<f64> {
    match input {
        NumberOrText::Text(text) => {
            let lower = text.trim().to_lowercase();
            if lower == "-inf" || lower == "-infinity" {
                return Ok(0.0);
            }
            if lower.ends_with("db") {
                let db = leading_float(&lower).ok_or_else(|| {
                    ToolError::InvalidVolume(format!("Cannot parse dB value from \"{}\"", text))
                })?;
                return Ok(db_to_normalized(db));
            }
            let value = leading_float(&lower).ok_or_else(|| {
                ToolError::InvalidVolume(format!("Cannot parse volume from \"{}\"", text))
            })?;
            check_normalized_volume(value)
        }
        NumberOrText::Number(value) => check_normalized_volume(*value),
    }
}

fn check_normalized_volume(value: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ToolError::InvalidVolume(format!(
            "Normalized volume must be 0.0-1.0, got {}",
            value
        )));
    }
    Ok(value)
}

// -----------------------------------------------------------------------------
// Pan
// -----------------------------------------------------------------------------

pub fn midi_pan_to_float(midi: f64) -> f64 {
    let clamped = midi.round().clamp(0.0, 127.0);
    (clamped - 64.0) / 64.0
}

pub fn float_pan_to_midi(value: f64) -> i64 {
    ((value * 64.0 + 64.0).round() as i64).clamp(0, 127)
}

/// MIDI pan 0-127, as a number or numeric string, to Live's -1.0-1.0.
pub fn parse_pan_input(input: &NumberOrText) -> Result<f64> {
    let value = match input {
        NumberOrText::Number(n) => *n,
        NumberOrText::Text(text) => leading_int(text).map(|v| v as f64).ok_or_else(|| {
            ToolError::InvalidPan(format!("Expected integer 0-127, got \"{}\"", text))
        })?,
    };
    if value.is_nan() {
        return Err(ToolError::InvalidPan(format!(
            "Expected integer 0-127, got \"{}\"",
            input
        )));
    }
    if !(0.0..=127.0).contains(&value) {
        return Err(ToolError::InvalidPan(format!(
            "MIDI pan must be 0-127, got {}",
            value
        )));
    }
    Ok(midi_pan_to_float(value))
}

// -----------------------------------------------------------------------------
// Tempo
// -----------------------------------------------------------------------------

/// Absolute BPM, `"+5"`/`"-10"` relative to `current`, or `"double"`/`"half"`.
pub fn parse_tempo_input(input: &NumberOrText, current: f64) -> Result<f64> {
    let result = match input {
        NumberOrText::Number(n) => Some(*n),
        NumberOrText::Text(text) => {
            let lower = text.trim().to_lowercase();
            match lower.as_str() {
                "double" => Some(current * 2.0),
                "half" => Some(current / 2.0),
                s if s.starts_with('+') || s.starts_with('-') => {
                    leading_float(s).map(|delta| current + delta)
                }
                s => leading_float(s),
            }
        }
    };

    let tempo = match result {
        Some(t) if !t.is_nan() => t,
        _ => {
            return Err(ToolError::InvalidTempo(format!(
                "Cannot parse tempo from \"{}\"",
                input
            )))
        }
    };
    if !(MIN_TEMPO..=MAX_TEMPO).contains(&tempo) {
        return Err(ToolError::InvalidTempo(format!(
            "Tempo must be 20-999 BPM, got {}",
            tempo
        )));
    }
    Ok(tempo)
}
