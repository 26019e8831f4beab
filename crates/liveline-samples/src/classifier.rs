//! Filename-based sample classification.
//!
//! Instrument type comes from keyword tokens in the filename, falling back to
//! the directory path. BPM, key and character tags are read from the filename
//! only.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Instrument keyword table. Checked in order, first hit wins.
pub const INSTRUMENT_KEYWORDS: &[(&str, &[&str])] = &[
    ("kick", &["kick", "kck", "bd", "bassdrum", "bass_drum", "bass-drum"]),
    ("snare", &["snare", "snr", "sd", "rimshot", "rim"]),
    (
        "hihat",
        &[
            "hihat", "hh", "hat", "hi-hat", "hi_hat", "open-hat", "closed-hat", "openhat",
            "closedhat",
        ],
    ),
    ("cymbal", &["cymbal", "cym", "crash", "ride", "splash"]),
    (
        "perc",
        &[
            "perc", "percussion", "conga", "bongo", "shaker", "tambourine", "tamb", "clap", "clp",
            "snap", "tom", "cowbell",
        ],
    ),
    ("bass", &["bass", "sub", "808", "reese"]),
    ("synth", &["synth", "lead", "pad", "arp", "pluck", "stab", "chord"]),
    (
        "keys",
        &[
            "keys", "piano", "organ", "rhodes", "wurlitzer", "epiano", "e-piano", "clavinet",
        ],
    ),
    ("guitar", &["guitar", "gtr", "acoustic-guitar", "electric-guitar"]),
    (
        "vocal",
        &["vocal", "vox", "voice", "acapella", "acappella", "choir", "sing"],
    ),
    (
        "fx",
        &[
            "fx", "sfx", "effect", "riser", "sweep", "impact", "downlifter", "uplifter", "noise",
            "foley", "transition",
        ],
    ),
    (
        "loop",
        &[
            "loop", "break", "breakbeat", "toploop", "top-loop", "drum-loop", "drumloop",
        ],
    ),
];

pub const INSTRUMENT_TYPES: &[&str] = &[
    "kick", "snare", "hihat", "cymbal", "perc", "bass", "synth", "keys", "guitar", "vocal", "fx",
    "loop",
];

pub const CHARACTER_KEYWORDS: &[&str] = &[
    "warm", "dark", "bright", "punchy", "soft", "hard", "dry", "wet", "analog", "digital",
    "lo-fi", "lofi", "vintage", "modern", "aggressive", "mellow", "crisp", "fat", "thin",
    "heavy", "light", "deep", "raw", "clean", "dirty", "distorted", "filtered", "processed",
    "organic", "acoustic", "electric", "ambient", "atmospheric",
];

const BPM_RANGE: std::ops::RangeInclusive<u32> = 40..=300;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub instrument_type: Option<String>,
    pub bpm: Option<u32>,
    pub key: Option<String>,
    pub character_tags: Vec<String>,
}

struct Patterns {
    instruments: Vec<(&'static str, Vec<Regex>)>,
    bpm: Vec<Regex>,
    key: Option<Regex>,
    token_split: Option<Regex>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let instruments = INSTRUMENT_KEYWORDS
            .iter()
            .map(|(kind, keywords)| {
                let regexes = keywords
                    .iter()
                    .filter_map(|kw| {
                        Regex::new(&format!(
                            r"(?i)(?:^|[_\-\s./\\]){}(?:$|[_\-\s./\\])",
                            regex::escape(kw)
                        ))
                        .ok()
                    })
                    .collect();
                (*kind, regexes)
            })
            .collect();

        let bpm = [r"(\d{2,3})\s*bpm", r"bpm\s*(\d{2,3})", r"[_\-](\d{2,3})[_\-]"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        Patterns {
            instruments,
            bpm,
            key: Regex::new(
                r"(?i)(?:^|[_\-\s.])([A-G][#b]?)\s*(minor|min|major|maj|m)(?:[_\-\s.]|$)",
            )
            .ok(),
            token_split: Regex::new(r"[_\-\s.]+").ok(),
        }
    })
}

fn match_instrument(text: &str) -> Option<String> {
    patterns()
        .instruments
        .iter()
        .find(|(_, regexes)| regexes.iter().any(|re| re.is_match(text)))
        .map(|(kind, _)| kind.to_string())
}

fn extract_bpm(lower_filename: &str) -> Option<u32> {
    for re in &patterns().bpm {
        let value = re
            .captures(lower_filename)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());
        if let Some(bpm) = value.filter(|v| BPM_RANGE.contains(v)) {
            return Some(bpm);
        }
    }
    None
}

fn extract_key(filename: &str) -> Option<String> {
    let caps = patterns().key.as_ref()?.captures(filename)?;
    let raw_note = caps.get(1)?.as_str();
    let quality = caps.get(2)?.as_str().to_lowercase();

    let mut chars = raw_note.chars();
    let note: String = chars
        .next()
        .map(|c| c.to_ascii_uppercase())
        .into_iter()
        .chain(chars)
        .collect();

    let suffix = match quality.as_str() {
        "min" | "minor" | "m" => "min",
        "maj" | "major" => "maj",
        other => return Some(format!("{}{}", note, other)),
    };
    Some(format!("{}{}", note, suffix))
}

fn extract_character_tags(lower_filename: &str) -> Vec<String> {
    let stem = match lower_filename.rfind('.') {
        Some(dot) if dot + 1 < lower_filename.len() => &lower_filename[..dot],
        _ => lower_filename,
    };
    let Some(split) = patterns().token_split.as_ref() else {
        return Vec::new();
    };

    let mut tags: Vec<String> = Vec::new();
    for token in split.split(stem) {
        if CHARACTER_KEYWORDS.contains(&token) && !tags.iter().any(|t| t == token) {
            tags.push(token.to_string());
        }
    }
    tags
}

/// Classify a sample from its path alone.
pub fn classify_path(path: impl AsRef<Path>) -> Classification {
    let path = path.as_ref();
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dirname = path
        .parent()
        .map(|p| p.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let lower_filename = filename.to_lowercase();

    let instrument_type =
        match_instrument(&lower_filename).or_else(|| match_instrument(&dirname));

    Classification {
        instrument_type,
        bpm: extract_bpm(&lower_filename),
        key: extract_key(&filename),
        character_tags: extract_character_tags(&lower_filename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Instrument type
    // -------------------------------------------------------------------------

    #[test]
    fn test_kick_from_filename() {
        let c = classify_path("/samples/Drums/Kicks/kick_01.wav");
        assert_eq!(c.instrument_type.as_deref(), Some("kick"));
    }

    #[test]
    fn test_kick_from_bd_alias_beats_808() {
        let c = classify_path("/samples/BD_808.wav");
        assert_eq!(c.instrument_type.as_deref(), Some("kick"));
    }

    #[test]
    fn test_snare_alias() {
        let c = classify_path("/samples/snr_tight.wav");
        assert_eq!(c.instrument_type.as_deref(), Some("snare"));
    }

    #[test]
    fn test_hihat_from_directory() {
        let c = classify_path("/samples/HiHat/OH_01.wav");
        assert_eq!(c.instrument_type.as_deref(), Some("hihat"));
    }

    #[test]
    fn test_filename_wins_over_directory() {
        let c = classify_path("/samples/Synths/lead_bright.wav");
        assert_eq!(c.instrument_type.as_deref(), Some("synth"));
        let c = classify_path("/samples/FX/vocal_hook.wav");
        assert_eq!(c.instrument_type.as_deref(), Some("vocal"));
    }

    #[test]
    fn test_perc_from_directory_fallback() {
        let c = classify_path("/samples/Percussion/groove_01.wav");
        assert_eq!(c.instrument_type.as_deref(), Some("perc"));
    }

    #[test]
    fn test_no_instrument() {
        let c = classify_path("/samples/random_file_01.wav");
        assert_eq!(c.instrument_type, None);
    }

    #[test]
    fn test_keyword_needs_token_boundary() {
        // "bd" inside a word is not a kick
        let c = classify_path("/samples/abdomen.wav");
        assert_eq!(c.instrument_type, None);
    }

    // -------------------------------------------------------------------------
    // BPM
    // -------------------------------------------------------------------------

    #[test]
    fn test_bpm_patterns() {
        assert_eq!(classify_path("kick_120bpm.wav").bpm, Some(120));
        assert_eq!(classify_path("snare_120_bpm.wav").bpm, Some(120));
        assert_eq!(classify_path("loop_bpm128.wav").bpm, Some(128));
        assert_eq!(classify_path("hat_140BPM_dry.wav").bpm, Some(140));
        assert_eq!(classify_path("bass_90_dark.wav").bpm, Some(90));
    }

    #[test]
    fn test_bpm_absent_or_out_of_range() {
        assert_eq!(classify_path("kick_01.wav").bpm, None);
        assert_eq!(classify_path("sample_999.wav").bpm, None);
        assert_eq!(classify_path("fx_20_bpm.wav").bpm, None);
    }

    // -------------------------------------------------------------------------
    // Key
    // -------------------------------------------------------------------------

    #[test]
    fn test_key_extraction() {
        assert_eq!(classify_path("pad_Cmin_warm.wav").key.as_deref(), Some("Cmin"));
        assert_eq!(classify_path("bass_F#maj.wav").key.as_deref(), Some("F#maj"));
        assert_eq!(classify_path("lead_Am.wav").key.as_deref(), Some("Amin"));
        assert_eq!(classify_path("chord_Bbminor.wav").key.as_deref(), Some("Bbmin"));
        assert_eq!(classify_path("kick_dry.wav").key, None);
    }

    // -------------------------------------------------------------------------
    // Character tags
    // -------------------------------------------------------------------------

    #[test]
    fn test_character_tags_in_order() {
        assert_eq!(
            classify_path("kick_punchy_dark.wav").character_tags,
            vec!["punchy", "dark"]
        );
        assert_eq!(
            classify_path("pad_warm_analog.wav").character_tags,
            vec!["warm", "analog"]
        );
    }

    #[test]
    fn test_character_tags_deduped_and_empty() {
        assert_eq!(classify_path("dark_pad_dark.wav").character_tags, vec!["dark"]);
        assert!(classify_path("kick_01.wav").character_tags.is_empty());
    }
}
