//! # Score Types
//!
//! The typed intermediate representation produced by the parser.
//!
//! ## Type Hierarchy
//! ```text
//! Score
//!   ├── title, tempo (first marking), time_signature (first seen)
//!   ├── Vec<Part>          catalog from <part-list>
//!   └── Vec<PartNotes>     one per <part>, in document order
//!         └── Vec<Note>    absolute time-coded, unsorted
//! ```
//!
//! ## Timing
//! `time_code` and `time_length` are in seconds at the tempo the score was
//! parsed with. A chord member shares the onset of the note it is stacked on,
//! and a tied chain is a single `Note` whose `time_length` covers every tied
//! segment.

use serde::Serialize;

use crate::pitch;

/// Written note value. Only kept as data; drawing it is up to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteSymbol {
    Whole,
    Half,
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl NoteSymbol {
    /// Parse a MusicXML `<type>` name
    pub fn from_musicxml_type(name: &str) -> Option<Self> {
        match name.trim() {
            "maxima" | "long" | "breve" | "whole" => Some(NoteSymbol::Whole),
            "half" => Some(NoteSymbol::Half),
            "quarter" => Some(NoteSymbol::Quarter),
            "eighth" => Some(NoteSymbol::Eighth),
            "16th" => Some(NoteSymbol::Sixteenth),
            "32nd" | "64th" | "128th" | "256th" | "512th" | "1024th" => {
                Some(NoteSymbol::ThirtySecond)
            }
            _ => None,
        }
    }

    /// Length of the undotted value in quarter notes
    pub fn quarters(&self) -> f64 {
        match self {
            NoteSymbol::Whole => 4.0,
            NoteSymbol::Half => 2.0,
            NoteSymbol::Quarter => 1.0,
            NoteSymbol::Eighth => 0.5,
            NoteSymbol::Sixteenth => 0.25,
            NoteSymbol::ThirtySecond => 0.125,
        }
    }

    /// Closest written value for a sounding length, used when `<type>` is absent.
    /// Returns the symbol and whether it needs a dot.
    pub fn from_quarters(quarters: f64) -> (Self, bool) {
        const ALL: [NoteSymbol; 6] = [
            NoteSymbol::Whole,
            NoteSymbol::Half,
            NoteSymbol::Quarter,
            NoteSymbol::Eighth,
            NoteSymbol::Sixteenth,
            NoteSymbol::ThirtySecond,
        ];
        for symbol in ALL {
            let base = symbol.quarters();
            if quarters >= base * 1.5 {
                return (symbol, true);
            }
            if quarters >= base {
                return (symbol, false);
            }
        }
        (NoteSymbol::ThirtySecond, false)
    }
}

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSignature {
    pub beats: u32,
    pub beat_type: u32,
}

/// A part from the score's `<part-list>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Part {
    pub id: String,
    pub name: String,
}

/// A sounding note with absolute timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub tone: i32,       // 0..=11, C = 0
    pub accidental: i32, // as written, kept for spelling
    pub octave: i32,
    pub symbol: NoteSymbol,
    pub dotted: bool,
    pub time_code: f64,   // seconds
    pub time_length: f64, // seconds
}

impl Note {
    /// Absolute pitch index (`12 * octave + tone`)
    pub fn absolute(&self) -> i32 {
        12 * self.octave + self.tone
    }

    pub fn midi_pitch(&self) -> u8 {
        pitch::midi_pitch(self.tone, self.octave)
    }

    /// Time at which the note stops sounding
    pub fn end_time(&self) -> f64 {
        self.time_code + self.time_length
    }

    /// Spelled name with octave, e.g. "F#4"
    pub fn name(&self) -> String {
        format!("{}{}", pitch::note_name(self.tone, self.accidental), self.octave)
    }

    /// Same note moved to another absolute pitch of the same tone class
    pub fn with_absolute(&self, absolute: i32) -> Note {
        Note {
            tone: absolute.rem_euclid(12),
            octave: absolute.div_euclid(12),
            ..*self
        }
    }
}

/// All notes parsed from one `<part>`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartNotes {
    pub part_id: String,
    pub notes: Vec<Note>,
}

/// A parsed score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub title: String,
    /// First tempo marking in the document, if any
    pub tempo: Option<f64>,
    pub time_signature: Option<TimeSignature>,
    pub parts: Vec<Part>,
    pub voices: Vec<PartNotes>,
}

impl Score {
    pub fn part(&self, id: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == id)
    }

    pub fn notes_for(&self, part_id: &str) -> impl Iterator<Item = &Note> + '_ {
        let part_id = part_id.to_string();
        self.voices
            .iter()
            .filter(move |v| v.part_id == part_id)
            .flat_map(|v| v.notes.iter())
    }

    pub fn note_count(&self) -> usize {
        self.voices.iter().map(|v| v.notes.len()).sum()
    }

    /// Latest release time over every part
    pub fn duration(&self) -> f64 {
        self.voices
            .iter()
            .flat_map(|v| v.notes.iter())
            .map(Note::end_time)
            .fold(0.0, f64::max)
    }
}
