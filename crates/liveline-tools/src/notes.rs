//! MIDI notes and their flat OSC encoding.
//!
//! On the wire a note is five consecutive values: pitch, start time,
//! duration, velocity, mute (0/1).

use crate::error::{Result, ToolError};
use liveline_osc::Value;
use serde::{Deserialize, Serialize};

pub const VALUES_PER_NOTE: usize = 5;
pub const DEFAULT_VELOCITY: i64 = 100;

/// A note as given by the caller, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NoteSpec {
    pub pitch: f64,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub velocity: Option<f64>,
    #[serde(default)]
    pub mute: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: i64,
    pub start_time: f64,
    pub duration: f64,
    pub velocity: i64,
    pub mute: bool,
}

fn is_integer(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0
}

impl NoteSpec {
    /// Check ranges and fill in the default velocity. `index` names the note
    /// in error messages.
    pub fn validate(&self, index: usize) -> Result<Note> {
        let invalid = |message: String| ToolError::InvalidNote { index, message };

        if !is_integer(self.pitch) || !(0.0..=127.0).contains(&self.pitch) {
            return Err(invalid(format!("pitch must be integer 0-127, got {}", self.pitch)));
        }
        if !(self.start_time >= 0.0) {
            return Err(invalid(format!("start_time must be >= 0, got {}", self.start_time)));
        }
        if !(self.duration > 0.0) {
            return Err(invalid(format!("duration must be > 0, got {}", self.duration)));
        }
        let velocity = match self.velocity {
            None => DEFAULT_VELOCITY,
            Some(v) if is_integer(v) && (1.0..=127.0).contains(&v) => v as i64,
            Some(v) => return Err(invalid(format!("velocity must be 1-127, got {}", v))),
        };

        Ok(Note {
            pitch: self.pitch as i64,
            start_time: self.start_time,
            duration: self.duration,
            velocity,
            mute: self.mute,
        })
    }
}

/// Validate every note; the list must not be empty.
pub fn validate_notes(notes: &[NoteSpec]) -> Result<Vec<Note>> {
    if notes.is_empty() {
        return Err(ToolError::InvalidNotes("notes array must not be empty".into()));
    }
    notes
        .iter()
        .enumerate()
        .map(|(i, note)| note.validate(i))
        .collect()
}

pub fn notes_to_flat(notes: &[Note]) -> Vec<Value> {
    let mut flat = Vec::with_capacity(notes.len() * VALUES_PER_NOTE);
    for note in notes {
        flat.push(Value::Int(note.pitch));
        flat.push(Value::Float(note.start_time));
        flat.push(Value::Float(note.duration));
        flat.push(Value::Int(note.velocity));
        flat.push(Value::Int(note.mute as i64));
    }
    flat
}

/// Decode groups of five values. A trailing partial group is ignored.
pub fn flat_to_notes(flat: &[Value]) -> Vec<Note> {
    flat.chunks_exact(VALUES_PER_NOTE)
        .map(|group| Note {
            pitch: group[0].as_i64().unwrap_or(0),
            start_time: group[1].as_f64().unwrap_or(0.0),
            duration: group[2].as_f64().unwrap_or(0.0),
            velocity: group[3].as_i64().unwrap_or(DEFAULT_VELOCITY),
            mute: group[4].is_truthy(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(pitch: f64, start_time: f64, duration: f64) -> NoteSpec {
        NoteSpec {
            pitch,
            start_time,
            duration,
            velocity: None,
            mute: false,
        }
    }

    #[test]
    fn test_validate_defaults_velocity() {
        let notes = validate_notes(&[spec(60.0, 0.0, 1.0)]).unwrap();
        assert_eq!(notes[0].velocity, 100);
        assert_eq!(notes[0].pitch, 60);
    }

    #[test]
    fn test_validate_reports_offending_index() {
        let notes = [spec(60.0, 0.0, 1.0), spec(128.0, 0.0, 1.0)];
        match validate_notes(&notes) {
            Err(err) => assert_eq!(
                err.to_string(),
                "INVALID_NOTE[1]: pitch must be integer 0-127, got 128"
            ),
            Ok(_) => panic!("Expected pitch error"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        assert!(spec(60.5, 0.0, 1.0).validate(0).is_err());
        assert!(spec(60.0, -1.0, 1.0).validate(0).is_err());
        assert!(spec(60.0, 0.0, 0.0).validate(0).is_err());
        assert!(spec(60.0, f64::NAN, 1.0).validate(0).is_err());

        let mut loud = spec(60.0, 0.0, 1.0);
        loud.velocity = Some(0.0);
        assert!(loud.validate(0).is_err());
        loud.velocity = Some(127.0);
        assert_eq!(loud.validate(0).unwrap().velocity, 127);
    }

    #[test]
    fn test_empty_list_rejected() {
        assert!(matches!(validate_notes(&[]), Err(ToolError::InvalidNotes(_))));
    }

    #[test]
    fn test_spec_from_json() {
        let spec: NoteSpec =
            serde_json::from_str(r#"{"pitch": 64, "start_time": 0.5, "duration": 0.25, "mute": true}"#)
                .unwrap();
        let note = spec.validate(0).unwrap();
        assert_eq!(note.pitch, 64);
        assert!(note.mute);
    }

    #[test]
    fn test_flat_layout_and_partial_group() {
        let mut muted = spec(62.0, 1.0, 0.5).validate(0).unwrap();
        muted.mute = true;
        let flat = notes_to_flat(&[muted.clone()]);
        assert_eq!(
            flat,
            vec![
                Value::Int(62),
                Value::Float(1.0),
                Value::Float(0.5),
                Value::Int(100),
                Value::Int(1)
            ]
        );

        let mut with_tail = flat.clone();
        with_tail.extend([Value::Int(70), Value::Float(0.0)]);
        assert_eq!(flat_to_notes(&with_tail), vec![muted]);
        assert!(flat_to_notes(&[]).is_empty());
    }
}
