//! # Error Types
//!
//! This module defines all error types for the waterfall crate.
//!
//! Parse errors carry the part id and measure number so a broken score can be
//! located without re-reading the whole document.
//!
//! ## Error Types
//! - `StructureMismatch` - The document is not a `score-partwise` score
//! - `MissingField` / `InvalidValue` - A required element is absent or unreadable
//! - `DegenerateTempo` - A tempo that would stall or reverse playback
//! - `Xml`, `UnclosedElement` - The markup itself is broken
//! - `Io`, `Yaml`, `Config` - Failures from the layers around the core
//!
//! Device failures are reported separately through [`SinkError`]; they are logged
//! by the scheduler and never abort playback.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WaterfallError {
    #[error("Score structure not recognized: root element <{root}>, expected <score-partwise>")]
    StructureMismatch { root: String },

    #[error("Part {part}, measure {measure}: missing <{field}>")]
    MissingField {
        part: String,
        measure: String,
        field: String,
    },

    #[error("Part {part}, measure {measure}: invalid <{field}> value {value:?}")]
    InvalidValue {
        part: String,
        measure: String,
        field: String,
        value: String,
    },

    #[error("Tempo must be positive, got {0}")]
    DegenerateTempo(f64),

    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed XML: <{0}> is never closed")]
    UnclosedElement(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Failure reported by a [`crate::playback::MidiSink`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("MIDI write failed: {0}")]
    Write(String),
}
