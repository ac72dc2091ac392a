//! # Song Session
//!
//! Setup state for one song: the parsed score, which parts are played and
//! accompanied, and the chosen tempo. The timeline is rebuilt from the
//! already parsed score whenever the selection changes.
//!
//! Starting playback at a tempo other than the score's own compiles the
//! document again with [`ParseOptions::tempo`](crate::parser::ParseOptions),
//! so onsets are laid out at the chosen speed and the scheduler starts with a
//! time scale of 1.

use std::fs;
use std::path::Path;

use log::info;

use crate::config::PlaybackConfig;
use crate::error::WaterfallError;
use crate::parser::parse_document;
use crate::playback::{Clock, MidiSink, Player};
use crate::score::{Part, Score};
use crate::timeline::{PartSelection, Timeline};
use crate::xml::{self, XmlNode};

#[derive(Debug, Clone)]
pub struct Session {
    document: XmlNode,
    score: Score,
    config: PlaybackConfig,
    selection: PartSelection,
    /// Tempo the score was compiled at
    base_tempo: f64,
    tempo: f64,
    timeline: Timeline,
}

impl Session {
    /// Parse a score. The first part is the player part and every part
    /// accompanies until the selection is changed.
    pub fn from_source(source: &str, config: PlaybackConfig) -> Result<Self, WaterfallError> {
        config.validate()?;
        let document = xml::parse_document(source)?;
        let score = parse_document(&document, &config.parse_options(None))?;
        let base_tempo = score.tempo.unwrap_or(config.default_tempo);

        let selection = PartSelection::new(score.parts.first().map(|p| p.id.clone()), Vec::<String>::new());
        let timeline = Timeline::build(&score, &selection, config.register());
        info!(
            "loaded \"{}\": {} parts, {} notes, {} bpm",
            score.title,
            score.parts.len(),
            score.note_count(),
            base_tempo
        );

        Ok(Self {
            document,
            score,
            config,
            selection,
            base_tempo,
            tempo: base_tempo,
            timeline,
        })
    }

    pub fn load(path: &Path, config: PlaybackConfig) -> Result<Self, WaterfallError> {
        let source = fs::read_to_string(path)?;
        Self::from_source(&source, config)
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn parts(&self) -> &[Part] {
        &self.score.parts
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn selection(&self) -> &PartSelection {
        &self.selection
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn base_tempo(&self) -> f64 {
        self.base_tempo
    }

    pub fn toggle_player(&mut self, part_id: &str) -> bool {
        let playing = self.selection.toggle_player(part_id);
        self.rebuild();
        playing
    }

    pub fn toggle_accompaniment(&mut self, part_id: &str) -> bool {
        let accompanying = self.selection.toggle_accompaniment(part_id);
        self.rebuild();
        accompanying
    }

    pub fn set_selection(&mut self, selection: PartSelection) {
        self.selection = selection;
        self.rebuild();
    }

    pub fn set_tempo(&mut self, tempo: f64) -> Result<(), WaterfallError> {
        if !(tempo > 0.0 && tempo.is_finite()) {
            return Err(WaterfallError::DegenerateTempo(tempo));
        }
        self.tempo = tempo;
        Ok(())
    }

    /// Step the tempo up (`steps > 0`) or down by the configured increment
    pub fn adjust_tempo(&mut self, steps: i32) -> Result<(), WaterfallError> {
        self.set_tempo(self.tempo + steps as f64 * self.config.tempo_step)
    }

    /// Compile the timeline for the chosen tempo and start a player on it
    pub fn play<C: Clock, S: MidiSink>(&self, clock: C, sink: S) -> Result<Player<C, S>, WaterfallError> {
        let timeline = if self.tempo == self.base_tempo {
            self.timeline.clone()
        } else {
            let score = parse_document(&self.document, &self.config.parse_options(Some(self.tempo)))?;
            Timeline::build(&score, &self.selection, self.config.register())
        };

        let mut player = Player::new(&self.score.title, timeline, self.tempo, &self.config, clock, sink)?;
        player.start()?;
        Ok(player)
    }

    fn rebuild(&mut self) {
        self.timeline = Timeline::build(&self.score, &self.selection, self.config.register());
        info!(
            "selection changed: {} performance notes, {} accompaniment notes",
            self.timeline.performance.len(),
            self.timeline.accompaniment.len()
        );
    }
}
