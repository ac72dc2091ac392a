//! The driving loop: one clock poll and one scheduler tick per step.

use std::collections::BTreeMap;

use super::engine::Scheduler;
use super::types::{Clock, Frame, MidiSink, PlayState, Renderer, TickSummary};
use crate::config::PlaybackConfig;
use crate::error::WaterfallError;
use crate::score::Note;
use crate::timeline::Timeline;

/// A playback session. Owns the scheduler together with its clock and sink,
/// so ticks cannot interleave with anything else touching them.
pub struct Player<C: Clock, S: MidiSink> {
    title: String,
    scheduler: Scheduler,
    performance: Vec<Note>,
    tone_counts: BTreeMap<i32, usize>,
    clock: C,
    sink: S,
}

impl<C: Clock, S: MidiSink> Player<C, S> {
    pub fn new(
        title: &str,
        timeline: Timeline,
        tempo: f64,
        config: &PlaybackConfig,
        clock: C,
        sink: S,
    ) -> Result<Self, WaterfallError> {
        let tone_counts = timeline.tone_counts();
        Ok(Self {
            title: title.to_string(),
            scheduler: Scheduler::new(timeline.accompaniment, tempo, config)?,
            performance: timeline.performance,
            tone_counts,
            clock,
            sink,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn performance(&self) -> &[Note] {
        &self.performance
    }

    /// Start from the pre-roll. Time spent before this call is discarded.
    pub fn start(&mut self) -> Result<TickSummary, WaterfallError> {
        self.clock.elapsed_ms();
        self.scheduler.start(&mut self.sink)
    }

    pub fn restart(&mut self) -> Result<TickSummary, WaterfallError> {
        self.start()
    }

    /// Poll the clock and tick. Time that passes while paused is dropped.
    pub fn step(&mut self) -> TickSummary {
        let elapsed = self.clock.elapsed_ms();
        self.scheduler.tick(elapsed as f64 / 1000.0, &mut self.sink)
    }

    pub fn toggle_pause(&mut self) -> TickSummary {
        if self.scheduler.state() == PlayState::Paused {
            // Don't count the paused stretch as playback time
            self.clock.elapsed_ms();
        }
        self.scheduler.toggle_pause(&mut self.sink)
    }

    pub fn set_tempo(&mut self, tempo: f64) -> Result<(), WaterfallError> {
        self.scheduler.set_tempo(tempo)
    }

    pub fn adjust_tempo(&mut self, delta: f64) -> Result<(), WaterfallError> {
        self.scheduler.adjust_tempo(delta)
    }

    /// Whether every note has been released and has passed the play line
    pub fn finished(&self) -> bool {
        let end = self
            .performance
            .iter()
            .map(Note::end_time)
            .fold(self.scheduler.end_time(), f64::max);
        self.scheduler.time_code() > end && self.scheduler.active_count() == 0
    }

    pub fn frame(&self) -> Frame<'_> {
        Frame {
            title: &self.title,
            tempo: self.scheduler.tempo(),
            time_code: self.scheduler.time_code(),
            paused: self.scheduler.state() == PlayState::Paused,
            tone_counts: &self.tone_counts,
            notes: self.scheduler.draw_queue(&self.performance),
        }
    }

    pub fn render<R: Renderer + ?Sized>(&self, renderer: &mut R) {
        renderer.render(&self.frame());
    }

    /// End the session, silencing the sink, and hand the sink back
    pub fn stop(mut self) -> S {
        self.scheduler.stop(&mut self.sink);
        self.sink
    }
}
