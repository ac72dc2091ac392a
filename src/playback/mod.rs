//! # Playback Module
//!
//! Drives a compiled [`Timeline`](crate::timeline::Timeline) in real time.
//!
//! ## Purpose
//! 1. **Audio triggering** - note-on/note-off for the accompaniment, sent to a
//!    [`MidiSink`] as virtual time crosses note boundaries
//! 2. **Visual position** - a [`DrawNote`] queue with the progress of every
//!    performance note inside the lookahead window
//!
//! ## Sub-modules
//! - `types` - Sink, clock and renderer traits plus the values passed to them
//! - `engine` - The [`Scheduler`] state machine (Stopped, Running, Paused)
//! - `player` - [`Player`], the loop that pairs a clock with a scheduler
//!
//! ## Example
//! ```rust
//! use waterfall::playback::{MidiEvent, RecordingSink, Scheduler};
//! use waterfall::score::{Note, NoteSymbol};
//!
//! let note = Note {
//!     tone: 0,
//!     accidental: 0,
//!     octave: 4,
//!     symbol: NoteSymbol::Quarter,
//!     dotted: false,
//!     time_code: 0.5,
//!     time_length: 1.0,
//! };
//! let mut sink = RecordingSink::default();
//! let mut scheduler = Scheduler::with_settings(vec![note], 120.0, 4.0, 100).unwrap();
//!
//! scheduler.start(&mut sink).unwrap();
//! scheduler.tick(4.5, &mut sink);
//! assert_eq!(sink.events, vec![MidiEvent::NoteOn { pitch: 60, velocity: 100 }]);
//! ```
//!
//! ## Time Scale
//! `time_scale = start_tempo / tempo`. Virtual time advances by
//! `dt / time_scale`, so doubling the tempo doubles the speed of playback
//! without recompiling the score.

mod engine;
mod player;
mod types;

#[cfg(test)]
mod tests;

pub use engine::{projected_progress, Scheduler};
pub use player::Player;
pub use types::{
    Clock, DrawNote, Frame, LogSink, ManualClock, MidiEvent, MidiSink, PlayState, RecordingSink,
    Renderer, SystemClock, TickSummary,
};
