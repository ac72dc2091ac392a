//! Pitch normalization and register clamping.
//!
//! Pitches are handled as `(tone, octave)` pairs where `tone` is the chromatic
//! step inside the octave (C=0 .. B=11). The absolute pitch index is
//! `12 * octave + tone`; MIDI note numbers add one more octave on top of that.

/// Diatonic step letter to tone class
pub fn tone_for_step(step: &str) -> Option<i32> {
    match step.trim() {
        "C" => Some(0),
        "D" => Some(2),
        "E" => Some(4),
        "F" => Some(5),
        "G" => Some(7),
        "A" => Some(9),
        "B" => Some(11),
        _ => None,
    }
}

/// Fold an accidental into a `(tone, octave)` pair.
///
/// The absolute pitch is re-derived after the accidental is applied, so a
/// sharped B in octave 3 comes back as C in octave 4 and a flatted C in
/// octave 4 as B in octave 3.
pub fn normalize_pitch(tone: i32, accidental: i32, octave: i32) -> (i32, i32) {
    let absolute = 12 * octave + tone + accidental;
    (absolute.rem_euclid(12), absolute.div_euclid(12))
}

/// Move an absolute pitch by whole octaves until it lies in `[low, high]`.
///
/// The tone class is never changed. The register must span at least 11
/// semitones, otherwise the result may land outside it.
pub fn clamp_to_register(absolute: i32, low: i32, high: i32) -> i32 {
    let mut pitch = absolute;
    while pitch > high {
        pitch -= 12;
    }
    while pitch < low {
        pitch += 12;
    }
    pitch
}

/// Absolute pitch window a performer part is folded into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub low: i32,
    pub high: i32,
}

impl Register {
    /// C3 through C5 in score octaves
    pub const PLAYABLE: Register = Register { low: 36, high: 60 };

    pub fn new(low: i32, high: i32) -> Self {
        Self { low, high }
    }

    pub fn span(&self) -> i32 {
        self.high - self.low
    }

    pub fn clamp(&self, absolute: i32) -> i32 {
        clamp_to_register(absolute, self.low, self.high)
    }
}

impl Default for Register {
    fn default() -> Self {
        Self::PLAYABLE
    }
}

/// MIDI note number for a normalized pitch (score octave 4 C = MIDI 60)
pub fn midi_pitch(tone: i32, octave: i32) -> u8 {
    (12 + 12 * octave + tone).clamp(0, 127) as u8
}

/// Display names for each tone class, flats preferred
pub const DIATONIC_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Spell a tone with the accidental it was written with.
///
/// With an accidental the name is built from the unaltered tone plus `b` or
/// `#` marks, so a written F# (tone 6, +1) reads "F#" rather than "Gb".
pub fn note_name(tone: i32, accidental: i32) -> String {
    if accidental == 0 {
        return DIATONIC_NAMES[tone.rem_euclid(12) as usize].to_string();
    }
    let reference = (tone - accidental).rem_euclid(12) as usize;
    let mark = if accidental < 0 { "b" } else { "#" };
    let mut name = DIATONIC_NAMES[reference].to_string();
    for _ in 0..accidental.unsigned_abs() {
        name.push_str(mark);
    }
    name
}
