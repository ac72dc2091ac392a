//! # Timeline Builder
//!
//! Splits a parsed [`Score`] into the two note lists playback works from:
//!
//! - **performance**: notes of the parts the user plays, folded into the
//!   playable [`Register`]. Drives the falling-note display and the
//!   aggregate tone counts.
//! - **accompaniment**: notes of the parts sent to the MIDI sink, at their
//!   written pitch. An empty accompaniment selection means every part.
//!
//! Both lists are sorted by onset, then tone, then octave. Building is pure,
//! so it runs again on every selection change without touching the parser.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::pitch::Register;
use crate::score::{Note, Score};

/// Which parts the user plays and which ones the sink accompanies with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartSelection {
    pub players: BTreeSet<String>,
    pub accompaniment: BTreeSet<String>,
}

impl PartSelection {
    pub fn new<P, A>(players: P, accompaniment: A) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            players: players.into_iter().map(Into::into).collect(),
            accompaniment: accompaniment.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_player(&self, part_id: &str) -> bool {
        self.players.contains(part_id)
    }

    /// Whether a part is sent to the sink; an empty set accompanies with everything
    pub fn accompanies(&self, part_id: &str) -> bool {
        self.accompaniment.is_empty() || self.accompaniment.contains(part_id)
    }

    /// Flip a part's player flag. Returns the new state.
    pub fn toggle_player(&mut self, part_id: &str) -> bool {
        toggle(&mut self.players, part_id)
    }

    /// Flip a part's accompaniment flag. Returns the new state.
    pub fn toggle_accompaniment(&mut self, part_id: &str) -> bool {
        toggle(&mut self.accompaniment, part_id)
    }
}

fn toggle(set: &mut BTreeSet<String>, part_id: &str) -> bool {
    if set.remove(part_id) {
        false
    } else {
        set.insert(part_id.to_string());
        true
    }
}

/// The sorted note lists for one selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    pub performance: Vec<Note>,
    pub accompaniment: Vec<Note>,
}

impl Timeline {
    pub fn build(score: &Score, selection: &PartSelection, register: Register) -> Self {
        Self {
            performance: performance_notes(score, selection, register),
            accompaniment: accompaniment_notes(score, selection),
        }
    }

    /// Aggregate counts of the performance list by clamped pitch
    pub fn tone_counts(&self) -> BTreeMap<i32, usize> {
        tone_counts(&self.performance)
    }
}

/// Notes of player parts, clamped into the register and sorted
pub fn performance_notes(score: &Score, selection: &PartSelection, register: Register) -> Vec<Note> {
    let mut notes: Vec<Note> = score
        .voices
        .iter()
        .filter(|voice| selection.is_player(&voice.part_id))
        .flat_map(|voice| voice.notes.iter())
        .map(|note| note.with_absolute(register.clamp(note.absolute())))
        .collect();
    sort_notes(&mut notes);
    notes
}

/// Notes of accompanying parts at written pitch, sorted
pub fn accompaniment_notes(score: &Score, selection: &PartSelection) -> Vec<Note> {
    let mut notes: Vec<Note> = score
        .voices
        .iter()
        .filter(|voice| selection.accompanies(&voice.part_id))
        .flat_map(|voice| voice.notes.iter().copied())
        .collect();
    sort_notes(&mut notes);
    notes
}

/// Stable sort by onset, then tone, then octave
pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(|a, b| {
        a.time_code
            .total_cmp(&b.time_code)
            .then(a.tone.cmp(&b.tone))
            .then(a.octave.cmp(&b.octave))
    });
}

/// Count notes per absolute pitch
pub fn tone_counts(notes: &[Note]) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for note in notes {
        *counts.entry(note.absolute()).or_insert(0) += 1;
    }
    counts
}

/// Whether a list is in timeline order
pub fn is_sorted(notes: &[Note]) -> bool {
    notes.windows(2).all(|pair| {
        pair[0]
            .time_code
            .total_cmp(&pair[1].time_code)
            .then(pair[0].tone.cmp(&pair[1].tone))
            .then(pair[0].octave.cmp(&pair[1].octave))
            != Ordering::Greater
    })
}
