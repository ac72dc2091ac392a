//! Real-time playback scheduler
//!
//! Advances a virtual timeline with wall-clock time and turns the crossings of
//! note boundaries into sink calls.
//!
//! # Timing
//! Virtual time starts at `-lookahead` so the first notes are on screen
//! before they sound. Each tick moves it by `dt / time_scale`, where
//! `time_scale = start_tempo / tempo`; changing the tempo changes the rate of
//! future ticks and never jumps the virtual time itself.
//!
//! # Crossings
//! A tick covers the half-open interval `(last_processed, time_code]`. Every
//! onset and every release inside it is handled exactly once, however the
//! elapsed time is split into ticks. Releases are handled before onsets so a
//! repeated pitch starting where the previous one ends keeps sounding.
//!
//! # Pause
//! Pausing silences the sounding notes but leaves them in the active set.
//! Resuming does not sound them again, and their release is sent a second
//! time when it is crossed later on.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use super::types::{DrawNote, MidiSink, PlayState, TickSummary};
use crate::config::PlaybackConfig;
use crate::error::WaterfallError;
use crate::score::Note;
use crate::timeline::sort_notes;

/// Playback progress of a note relative to the play line.
///
/// 1 means the note is on the line, 0 means it is just entering the top of
/// the lookahead window. Values outside `[0, 1]` are off screen.
pub fn projected_progress(note: &Note, current: f64, window: f64, time_scale: f64) -> f64 {
    1.0 + (current - note.time_code) * time_scale / window
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Accompaniment, sorted by onset
    notes: Vec<Note>,
    /// Indices into `notes` that are sounding
    active: BTreeSet<usize>,
    state: PlayState,
    tempo: f64,
    start_tempo: f64,
    time_scale: f64,
    time_code: f64,
    last_processed: f64,
    lookahead: f64,
    velocity: u8,
}

impl Scheduler {
    pub fn new(accompaniment: Vec<Note>, tempo: f64, config: &PlaybackConfig) -> Result<Self, WaterfallError> {
        Self::with_settings(accompaniment, tempo, config.lookahead, config.velocity)
    }

    pub fn with_settings(
        mut accompaniment: Vec<Note>,
        tempo: f64,
        lookahead: f64,
        velocity: u8,
    ) -> Result<Self, WaterfallError> {
        check_tempo(tempo)?;
        sort_notes(&mut accompaniment);
        Ok(Self {
            notes: accompaniment,
            active: BTreeSet::new(),
            state: PlayState::Stopped,
            tempo,
            start_tempo: tempo,
            time_scale: 1.0,
            time_code: -lookahead,
            last_processed: -lookahead,
            lookahead,
            velocity,
        })
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn start_tempo(&self) -> f64 {
        self.start_tempo
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn time_code(&self) -> f64 {
        self.time_code
    }

    pub fn last_processed(&self) -> f64 {
        self.last_processed
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Release time of the last accompaniment note
    pub fn end_time(&self) -> f64 {
        self.notes.iter().map(Note::end_time).fold(0.0, f64::max)
    }

    /// Start, or restart from the top, at the current tempo
    pub fn start<S: MidiSink + ?Sized>(&mut self, sink: &mut S) -> Result<TickSummary, WaterfallError> {
        check_tempo(self.tempo)?;
        let summary = self.release_all(sink);
        self.time_code = -self.lookahead;
        self.last_processed = self.time_code;
        self.start_tempo = self.tempo;
        self.time_scale = 1.0;
        self.state = PlayState::Running;
        info!("playback started at {} bpm", self.tempo);
        Ok(summary)
    }

    pub fn restart<S: MidiSink + ?Sized>(&mut self, sink: &mut S) -> Result<TickSummary, WaterfallError> {
        self.start(sink)
    }

    /// Leave playback, releasing everything that is held
    pub fn stop<S: MidiSink + ?Sized>(&mut self, sink: &mut S) -> TickSummary {
        let summary = self.release_all(sink);
        self.state = PlayState::Stopped;
        info!("playback stopped at {:.3}s", self.time_code);
        summary
    }

    /// Freeze time and silence held notes. They stay in the active set.
    pub fn pause<S: MidiSink + ?Sized>(&mut self, sink: &mut S) -> TickSummary {
        let mut summary = TickSummary::default();
        if self.state != PlayState::Running {
            return summary;
        }
        for index in self.active.iter().copied().collect::<Vec<_>>() {
            self.send_off(index, sink, &mut summary);
        }
        self.state = PlayState::Paused;
        info!("paused at {:.3}s", self.time_code);
        summary
    }

    /// Continue from the frozen watermark. Returns whether playback resumed.
    pub fn resume(&mut self) -> bool {
        if self.state != PlayState::Paused {
            return false;
        }
        self.state = PlayState::Running;
        info!("resumed at {:.3}s", self.time_code);
        true
    }

    pub fn toggle_pause<S: MidiSink + ?Sized>(&mut self, sink: &mut S) -> TickSummary {
        match self.state {
            PlayState::Running => self.pause(sink),
            PlayState::Paused => {
                self.resume();
                TickSummary::default()
            }
            PlayState::Stopped => TickSummary::default(),
        }
    }

    /// Change the tempo. While playing this only rescales future ticks.
    pub fn set_tempo(&mut self, tempo: f64) -> Result<(), WaterfallError> {
        check_tempo(tempo)?;
        self.tempo = tempo;
        if self.state != PlayState::Stopped {
            self.time_scale = self.start_tempo / tempo;
        }
        debug!("tempo {} bpm, time scale {:.3}", tempo, self.time_scale);
        Ok(())
    }

    pub fn adjust_tempo(&mut self, delta: f64) -> Result<(), WaterfallError> {
        self.set_tempo(self.tempo + delta)
    }

    /// Swap in a rebuilt accompaniment, releasing whatever the old one held
    pub fn set_accompaniment<S: MidiSink + ?Sized>(&mut self, mut notes: Vec<Note>, sink: &mut S) -> TickSummary {
        let summary = self.release_all(sink);
        sort_notes(&mut notes);
        self.notes = notes;
        summary
    }

    /// Advance by `dt` wall-clock seconds and send every crossing
    pub fn tick<S: MidiSink + ?Sized>(&mut self, dt: f64, sink: &mut S) -> TickSummary {
        let mut summary = TickSummary::default();
        if self.state != PlayState::Running {
            return summary;
        }

        self.time_code += dt.max(0.0) / self.time_scale;
        let (from, to) = (self.last_processed, self.time_code);

        let ending: Vec<usize> = self
            .active
            .iter()
            .copied()
            .filter(|&index| {
                let end = self.notes[index].end_time();
                end > from && end <= to
            })
            .collect();
        for index in ending {
            self.release(index, sink, &mut summary);
        }

        let first = self.notes.partition_point(|n| n.time_code <= from);
        let last = self.notes.partition_point(|n| n.time_code <= to);
        for index in first..last {
            if self.active.contains(&index) {
                continue;
            }
            let note = self.notes[index];
            match sink.note_on(note.midi_pitch(), self.velocity) {
                Ok(()) => {
                    debug!("{} at {:.3}s", note.name(), note.time_code);
                    self.active.insert(index);
                    summary.triggered += 1;
                }
                Err(e) => {
                    warn!("note on {} failed: {}", note.midi_pitch(), e);
                    summary.failed += 1;
                }
            }
        }

        // Notes short enough to start and end inside this tick
        for index in first..last {
            if self.active.contains(&index) && self.notes[index].end_time() <= to {
                self.release(index, sink, &mut summary);
            }
        }

        self.last_processed = to;
        summary
    }

    /// Progress of a note against the current virtual time
    pub fn projected_progress(&self, note: &Note) -> f64 {
        projected_progress(note, self.time_code, self.lookahead, self.time_scale)
    }

    /// Notes of `notes` inside the lookahead window, with their progress
    pub fn draw_queue(&self, notes: &[Note]) -> Vec<DrawNote> {
        let horizon = self.time_code + self.lookahead / self.time_scale;
        notes
            .iter()
            .filter(|note| note.time_code > self.time_code && note.time_code < horizon)
            .map(|note| DrawNote {
                note: *note,
                midi_pitch: note.midi_pitch(),
                progress: self.projected_progress(note),
            })
            .collect()
    }

    fn release<S: MidiSink + ?Sized>(&mut self, index: usize, sink: &mut S, summary: &mut TickSummary) {
        self.active.remove(&index);
        self.send_off(index, sink, summary);
    }

    fn release_all<S: MidiSink + ?Sized>(&mut self, sink: &mut S) -> TickSummary {
        let mut summary = TickSummary::default();
        for index in std::mem::take(&mut self.active) {
            self.send_off(index, sink, &mut summary);
        }
        summary
    }

    fn send_off<S: MidiSink + ?Sized>(&self, index: usize, sink: &mut S, summary: &mut TickSummary) {
        let pitch = self.notes[index].midi_pitch();
        match sink.note_off(pitch) {
            Ok(()) => summary.released += 1,
            Err(e) => {
                warn!("note off {} failed: {}", pitch, e);
                summary.failed += 1;
            }
        }
    }
}

fn check_tempo(tempo: f64) -> Result<(), WaterfallError> {
    if tempo > 0.0 && tempo.is_finite() {
        Ok(())
    } else {
        Err(WaterfallError::DegenerateTempo(tempo))
    }
}
