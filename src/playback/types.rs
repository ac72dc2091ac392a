//! Playback type definitions
//!
//! The collaborators the scheduler talks to (sink, clock, renderer) and the
//! values it hands back to them.

use std::collections::BTreeMap;
use std::time::Instant;

use log::info;

use crate::error::SinkError;
use crate::pitch;
use crate::score::Note;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Output device for note triggers. Fire-and-forget: a failure is reported
/// back but nothing is retried.
pub trait MidiSink {
    fn note_on(&mut self, pitch: u8, velocity: u8) -> Result<(), SinkError>;
    fn note_off(&mut self, pitch: u8) -> Result<(), SinkError>;
}

/// Source of wall-clock time
pub trait Clock {
    /// Milliseconds elapsed since the previous call
    fn elapsed_ms(&mut self) -> u64;
}

/// Consumer of per-step display data
pub trait Renderer {
    fn render(&mut self, frame: &Frame<'_>);
}

/// What a single tick, pause or restart sent to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickSummary {
    pub triggered: usize,
    pub released: usize,
    pub failed: usize,
}

impl TickSummary {
    pub fn is_empty(&self) -> bool {
        self.triggered == 0 && self.released == 0 && self.failed == 0
    }
}

/// A note inside the visible window
///
/// `progress` is 0 at the top of the lookahead window and 1 when the note
/// reaches the play line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawNote {
    pub note: Note,
    pub midi_pitch: u8,
    pub progress: f64,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'a> {
    pub title: &'a str,
    pub tempo: f64,
    pub time_code: f64,
    pub paused: bool,
    /// Clamped absolute pitch -> number of performance notes
    pub tone_counts: &'a BTreeMap<i32, usize>,
    pub notes: Vec<DrawNote>,
}

/// Wall clock backed by [`Instant`]
#[derive(Debug)]
pub struct SystemClock {
    last: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { last: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed_ms(&mut self) -> u64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_millis() as u64;
        // Keep the sub-millisecond remainder for the next poll
        self.last += std::time::Duration::from_millis(elapsed);
        elapsed
    }
}

/// Clock advanced by hand, for driving a player deterministically
#[derive(Debug, Default)]
pub struct ManualClock {
    pending: u64,
}

impl ManualClock {
    pub fn advance(&mut self, ms: u64) {
        self.pending += ms;
    }
}

impl Clock for ManualClock {
    fn elapsed_ms(&mut self) -> u64 {
        std::mem::take(&mut self.pending)
    }
}

/// A message sent to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
}

/// Sink that keeps every event it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<MidiEvent>,
}

impl RecordingSink {
    pub fn note_ons(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MidiEvent::NoteOn { .. }))
            .count()
    }

    pub fn note_offs(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MidiEvent::NoteOff { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl MidiSink for RecordingSink {
    fn note_on(&mut self, pitch: u8, velocity: u8) -> Result<(), SinkError> {
        self.events.push(MidiEvent::NoteOn { pitch, velocity });
        Ok(())
    }

    fn note_off(&mut self, pitch: u8) -> Result<(), SinkError> {
        self.events.push(MidiEvent::NoteOff { pitch });
        Ok(())
    }
}

/// Sink that writes every event to the log, for running without a device
#[derive(Debug, Default)]
pub struct LogSink;

impl MidiSink for LogSink {
    fn note_on(&mut self, pitch: u8, velocity: u8) -> Result<(), SinkError> {
        info!("note on  {:>3} {:<4} vel {}", pitch, midi_name(pitch), velocity);
        Ok(())
    }

    fn note_off(&mut self, pitch: u8) -> Result<(), SinkError> {
        info!("note off {:>3} {}", pitch, midi_name(pitch));
        Ok(())
    }
}

fn midi_name(pitch: u8) -> String {
    let absolute = pitch as i32 - 12;
    format!(
        "{}{}",
        pitch::DIATONIC_NAMES[absolute.rem_euclid(12) as usize],
        absolute.div_euclid(12)
    )
}
