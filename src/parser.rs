//! # Score Parser
//!
//! Compiles a `score-partwise` MusicXML document into a [`Score`] of absolute
//! time-coded notes.
//!
//! ## Timing Model
//! Every part has its own cursor starting at 0 seconds and its own
//! `divisions` (ticks per quarter note, default 1). A tick count becomes
//! seconds through `ticks / divisions * 60 / tempo`.
//!
//! - `<note>` advances the cursor by its length, unless it is a `<chord/>`
//!   member, which reuses the onset of the note before it.
//! - `<backup>` and `<forward>` move the cursor without sounding, which is how
//!   several voices share a measure.
//! - `<tie type="stop">` notes never start a new sound; their length is folded
//!   into the open tie of the same pitch.
//! - Rests, unpitched notes and grace notes never sound. Any other note
//!   without a `<pitch>` is an error.
//!
//! ## Tempo
//! The first `<sound tempo>` anywhere in the document is the displayed tempo
//! of the song and the tempo conversion starts with. Later markings change
//! the conversion from their measure and beat onward, in every part, so the
//! parts stay aligned whichever one carries the marking.
//! [`ParseOptions::tempo`] rescales every marking so the song can be compiled
//! at a user-chosen speed.
//!
//! ## Errors
//! Any layout other than parts-within-document, measures-within-part is a
//! [`WaterfallError::StructureMismatch`]. Missing durations, undecodable
//! pitches and non-positive divisions or tempos abort the parse.

use std::collections::HashMap;

use log::debug;

use crate::error::WaterfallError;
use crate::pitch::{normalize_pitch, tone_for_step};
use crate::score::{Note, NoteSymbol, Part, PartNotes, Score, TimeSignature};
use crate::xml::{self, XmlNode};

/// Tempo used when the score carries no marking
pub const DEFAULT_TEMPO: f64 = 80.0;

/// Octave assumed for a pitch without `<octave>`
const DEFAULT_OCTAVE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseOptions {
    /// Tempo when the document has no marking
    pub default_tempo: f64,
    /// Compile at this tempo instead of the document's own
    pub tempo: Option<f64>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_tempo: DEFAULT_TEMPO,
            tempo: None,
        }
    }
}

/// Parse MusicXML markup into a score
pub fn parse_score(source: &str, options: &ParseOptions) -> Result<Score, WaterfallError> {
    let document = xml::parse_document(source)?;
    parse_document(&document, options)
}

/// Compile an already-read document tree into a score
pub fn parse_document(document: &XmlNode, options: &ParseOptions) -> Result<Score, WaterfallError> {
    if document.name != "score-partwise" {
        return Err(WaterfallError::StructureMismatch {
            root: document.name.clone(),
        });
    }

    let title = ["work/work-title", "movement-title"]
        .iter()
        .filter_map(|path| document.find(path))
        .map(|node| node.text().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let parts: Vec<Part> = document
        .find("part-list")
        .map(|list| {
            list.children_named("score-part")
                .map(|p| Part {
                    id: p.attr("id").unwrap_or_default().to_string(),
                    name: p.child_text("part-name").unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let first_tempo = first_tempo_marking(document)?;
    let base_tempo = first_tempo.unwrap_or(options.default_tempo);
    if !(base_tempo > 0.0) {
        return Err(WaterfallError::DegenerateTempo(base_tempo));
    }
    let scale = match options.tempo {
        Some(tempo) if tempo > 0.0 => tempo / base_tempo,
        Some(tempo) => return Err(WaterfallError::DegenerateTempo(tempo)),
        None => 1.0,
    };

    let tempo = TempoMap::scan(document, base_tempo * scale, scale)?;
    let mut time_signature = None;
    let mut voices = Vec::new();

    for part in document.children_named("part") {
        let part_id = part.attr("id").unwrap_or_default();
        let mut walker = PartWalker::new(part_id);
        for (index, measure) in part.children_named("measure").enumerate() {
            walker.measure(measure, index, &tempo, &mut time_signature)?;
        }
        debug!("part {}: {} notes", part_id, walker.notes.len());
        voices.push(PartNotes {
            part_id: part_id.to_string(),
            notes: walker.notes,
        });
    }

    Ok(Score {
        title,
        tempo: first_tempo,
        time_signature,
        parts,
        voices,
    })
}

/// `<sound tempo>` carried by a measure child, either inside a `<direction>`
/// or placed directly in the measure
fn tempo_marking(unit: &XmlNode) -> Option<&str> {
    let sound = match unit.name.as_str() {
        "direction" => unit.child("sound")?,
        "sound" => unit,
        _ => return None,
    };
    sound.attr("tempo")
}

fn measure_label(measure: &XmlNode, index: usize) -> String {
    measure
        .attr("number")
        .map(str::to_string)
        .unwrap_or_else(|| (index + 1).to_string())
}

fn first_tempo_marking(document: &XmlNode) -> Result<Option<f64>, WaterfallError> {
    for part in document.children_named("part") {
        for (index, measure) in part.children_named("measure").enumerate() {
            for unit in &measure.children {
                if let Some(value) = tempo_marking(unit) {
                    let label = measure_label(measure, index);
                    let context = Context {
                        part: part.attr("id").unwrap_or_default(),
                        measure: &label,
                    };
                    return context.tempo(value).map(Some);
                }
            }
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, Copy)]
struct TempoChange {
    measure: usize,
    /// Quarter notes from the start of the measure
    offset: f64,
    bpm: f64,
}

/// Tempo by score position. Every part reads the same map, so a marking
/// written in one part moves all of them from its measure and beat onward.
#[derive(Debug)]
struct TempoMap {
    initial: f64,
    /// Sorted by position; markings at the same position keep document order
    changes: Vec<TempoChange>,
}

impl TempoMap {
    fn scan(document: &XmlNode, initial: f64, scale: f64) -> Result<Self, WaterfallError> {
        let mut changes = Vec::new();
        for part in document.children_named("part") {
            let part_id = part.attr("id").unwrap_or_default();
            let mut position = Position::new();
            for (index, measure) in part.children_named("measure").enumerate() {
                let label = measure_label(measure, index);
                let context = Context {
                    part: part_id,
                    measure: &label,
                };
                position.start_measure();
                for unit in &measure.children {
                    if let Some(value) = tempo_marking(unit) {
                        changes.push(TempoChange {
                            measure: index,
                            offset: position.beat,
                            bpm: context.tempo(value)? * scale,
                        });
                    }
                    position.step(unit, &context)?;
                }
            }
        }
        changes.sort_by(|a, b| a.measure.cmp(&b.measure).then(a.offset.total_cmp(&b.offset)));
        Ok(Self { initial, changes })
    }

    fn bpm_at(&self, measure: usize, offset: f64) -> f64 {
        self.changes
            .iter()
            .take_while(|c| (c.measure, c.offset) <= (measure, offset))
            .last()
            .map_or(self.initial, |c| c.bpm)
    }

    /// Seconds between two positions of one measure
    fn seconds(&self, measure: usize, from: f64, to: f64) -> f64 {
        if to < from {
            return -self.seconds(measure, to, from);
        }
        let mut bpm = self.bpm_at(measure, from);
        let mut position = from;
        let mut total = 0.0;
        for change in self
            .changes
            .iter()
            .filter(|c| c.measure == measure && c.offset > from && c.offset < to)
        {
            total += (change.offset - position) * 60.0 / bpm;
            position = change.offset;
            bpm = change.bpm;
        }
        total + (to - position) * 60.0 / bpm
    }
}

/// Location used in error messages
struct Context<'a> {
    part: &'a str,
    measure: &'a str,
}

impl Context<'_> {
    fn missing(&self, field: &str) -> WaterfallError {
        WaterfallError::MissingField {
            part: self.part.to_string(),
            measure: self.measure.to_string(),
            field: field.to_string(),
        }
    }

    fn invalid(&self, field: &str, value: &str) -> WaterfallError {
        WaterfallError::InvalidValue {
            part: self.part.to_string(),
            measure: self.measure.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    fn tempo(&self, value: &str) -> Result<f64, WaterfallError> {
        match value.trim().parse::<f64>() {
            Ok(tempo) if tempo > 0.0 && tempo.is_finite() => Ok(tempo),
            _ => Err(self.invalid("sound tempo", value)),
        }
    }

    /// `<duration>` child in ticks
    fn duration(&self, node: &XmlNode) -> Result<f64, WaterfallError> {
        let text = node.child_text("duration").ok_or_else(|| self.missing("duration"))?;
        match text.parse::<f64>() {
            Ok(ticks) if ticks >= 0.0 && ticks.is_finite() => Ok(ticks),
            _ => Err(self.invalid("duration", text)),
        }
    }
}

/// Musical position inside the current measure, in quarter notes
#[derive(Debug)]
struct Position {
    divisions: f64,
    beat: f64,
    last_onset: f64,
    /// Furthest point any voice has reached
    end: f64,
}

impl Position {
    fn new() -> Self {
        Self {
            divisions: 1.0,
            beat: 0.0,
            last_onset: 0.0,
            end: 0.0,
        }
    }

    fn start_measure(&mut self) {
        self.beat = 0.0;
        self.last_onset = 0.0;
        self.end = 0.0;
    }

    fn jump(&mut self, beat: f64) {
        self.beat = beat;
        self.last_onset = beat;
        self.end = self.end.max(beat);
    }

    /// Move past one measure child. Returns `(onset, length)` in quarter
    /// notes for a note that takes time.
    fn step(&mut self, unit: &XmlNode, context: &Context) -> Result<Option<(f64, f64)>, WaterfallError> {
        match unit.name.as_str() {
            "attributes" => {
                if let Some(text) = unit.child_text("divisions") {
                    self.divisions = match text.parse::<f64>() {
                        Ok(divisions) if divisions > 0.0 && divisions.is_finite() => divisions,
                        _ => return Err(context.invalid("divisions", text)),
                    };
                }
                Ok(None)
            }
            "backup" => {
                let quarters = context.duration(unit)? / self.divisions;
                self.jump(self.beat - quarters);
                Ok(None)
            }
            "forward" => {
                let quarters = context.duration(unit)? / self.divisions;
                self.jump(self.beat + quarters);
                Ok(None)
            }
            "note" if !unit.has_child("grace") => {
                let length = context.duration(unit)? / self.divisions;
                if unit.has_child("chord") {
                    return Ok(Some((self.last_onset, length)));
                }
                let onset = self.beat;
                self.last_onset = onset;
                self.beat = onset + length;
                self.end = self.end.max(self.beat);
                Ok(Some((onset, length)))
            }
            _ => Ok(None),
        }
    }
}

struct PartWalker<'a> {
    part_id: &'a str,
    measure: String,
    index: usize,
    position: Position,
    /// Seconds at which the current measure starts
    measure_start: f64,
    notes: Vec<Note>,
    /// Absolute pitch -> index of the note its tie chain started with
    open_ties: HashMap<i32, usize>,
}

impl<'a> PartWalker<'a> {
    fn new(part_id: &'a str) -> Self {
        Self {
            part_id,
            measure: String::new(),
            index: 0,
            position: Position::new(),
            measure_start: 0.0,
            notes: Vec::new(),
            open_ties: HashMap::new(),
        }
    }

    fn context(&self) -> Context<'_> {
        Context {
            part: self.part_id,
            measure: &self.measure,
        }
    }

    fn measure(
        &mut self,
        measure: &XmlNode,
        index: usize,
        tempo: &TempoMap,
        time_signature: &mut Option<TimeSignature>,
    ) -> Result<(), WaterfallError> {
        self.index = index;
        self.measure = measure_label(measure, index);
        self.position.start_measure();

        for unit in &measure.children {
            if unit.name == "attributes" && time_signature.is_none() {
                *time_signature = read_time_signature(unit);
            }
            let context = Context {
                part: self.part_id,
                measure: &self.measure,
            };
            if let Some((onset, quarters)) = self.position.step(unit, &context)? {
                self.note(unit, onset, quarters, tempo)?;
            }
        }

        self.measure_start += tempo.seconds(index, 0.0, self.position.end);
        Ok(())
    }

    fn note(&mut self, unit: &XmlNode, onset: f64, quarters: f64, tempo: &TempoMap) -> Result<(), WaterfallError> {
        if unit.has_child("rest") || unit.has_child("unpitched") {
            return Ok(());
        }
        let pitch = unit.child("pitch").ok_or_else(|| self.context().missing("pitch"))?;
        let (tone, accidental, octave) = self.pitch(pitch)?;
        let absolute = 12 * octave + tone;
        let (tie_start, tie_stop) = tie_flags(unit);

        let time_code = self.measure_start + tempo.seconds(self.index, 0.0, onset);
        let length = tempo.seconds(self.index, onset, onset + quarters);

        if tie_stop {
            if let Some(&index) = self.open_ties.get(&absolute) {
                let tied = &mut self.notes[index];
                tied.time_length = tied.time_length.max(time_code + length - tied.time_code);
                if !tie_start {
                    self.open_ties.remove(&absolute);
                }
            }
            return Ok(());
        }

        let (symbol, dotted) = match unit.child_text("type").and_then(NoteSymbol::from_musicxml_type) {
            Some(symbol) => (symbol, unit.has_child("dot")),
            None => NoteSymbol::from_quarters(quarters),
        };
        if tie_start {
            self.open_ties.insert(absolute, self.notes.len());
        } else {
            self.open_ties.remove(&absolute);
        }
        self.notes.push(Note {
            tone,
            accidental,
            octave,
            symbol,
            dotted,
            time_code,
            time_length: length,
        });
        Ok(())
    }

    /// Decode `<pitch>` into a normalized `(tone, accidental, octave)`
    fn pitch(&self, pitch: &XmlNode) -> Result<(i32, i32, i32), WaterfallError> {
        let context = self.context();
        let step = pitch.child_text("step").ok_or_else(|| context.missing("step"))?;
        let step_tone = tone_for_step(step).ok_or_else(|| context.invalid("step", step))?;

        let accidental = match pitch.child_text("alter") {
            None => 0,
            Some(text) => match text.parse::<i32>() {
                Ok(alter) => alter,
                // Microtonal alters are rounded to the nearest semitone
                Err(_) => match text.parse::<f64>() {
                    Ok(alter) if alter.is_finite() => alter.round() as i32,
                    _ => return Err(context.invalid("alter", text)),
                },
            },
        };

        let octave = match pitch.child_text("octave") {
            None => DEFAULT_OCTAVE,
            Some(text) => text.parse::<i32>().map_err(|_| context.invalid("octave", text))?,
        };

        let (tone, octave) = normalize_pitch(step_tone, accidental, octave);
        Ok((tone, accidental, octave))
    }
}

/// Compound signatures such as "3+2" are not needed for timing and are skipped
fn read_time_signature(unit: &XmlNode) -> Option<TimeSignature> {
    let time = unit.child("time")?;
    let beats = time.child_text("beats")?.parse().ok()?;
    let beat_type = time.child_text("beat-type")?.parse().ok()?;
    Some(TimeSignature { beats, beat_type })
}

/// `(starts a tie, continues a tie)` from `<tie>`, or from the notated
/// `<tied>` when the score only carries that
fn tie_flags(unit: &XmlNode) -> (bool, bool) {
    let mut ties: Vec<&XmlNode> = unit.children_named("tie").collect();
    if ties.is_empty() {
        if let Some(notations) = unit.child("notations") {
            ties = notations.children_named("tied").collect();
        }
    }

    let mut start = false;
    let mut stop = false;
    for tie in ties {
        match tie.attr("type") {
            Some("start") => start = true,
            Some("stop") => stop = true,
            Some("continue") => {
                start = true;
                stop = true;
            }
            _ => {}
        }
    }
    (start, stop)
}
