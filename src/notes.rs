use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

use crate::error::ParseError;

pub const NOTES_PER_OCTAVE: i16 = 12;

/// Raw key number as delivered by a MIDI instrument. 60 is middle C (C4).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct MidiNote(pub u8);

#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd)]
pub struct NoteVolume(pub u8); // 0..=127

impl MidiNote {
    pub fn pitch_class(self) -> i16 {
        (self.0 as i16).rem_euclid(NOTES_PER_OCTAVE)
    }

    pub fn octave(self) -> i8 {
        (self.0 as i16 / NOTES_PER_OCTAVE - 1) as i8
    }

    /// Offset by `semitones`, or `None` when the result leaves 0..=127.
    pub fn checked_add(self, semitones: i16) -> Option<MidiNote> {
        let n = self.0 as i16 + semitones;
        (0..=127).contains(&n).then(|| MidiNote(n as u8))
    }
}

impl fmt::Display for MidiNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sub for MidiNote {
    type Output = Interval;
    fn sub(self, rhs: MidiNote) -> Interval {
        Interval(self.0 as i16 - rhs.0 as i16)
    }
}

// Difference in half steps
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct Interval(pub i16);

impl Interval {
    pub const OCTAVE: Interval = Interval(NOTES_PER_OCTAVE);

    pub fn semitones(self) -> i16 {
        self.0
    }
}

/// Staff letter of a note, independent of any sharp or flat.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::A,
        Letter::B,
    ];

    pub fn natural_pitch_class(self) -> i16 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    pub fn index(self) -> i16 {
        self as i16
    }

    pub fn from_index(i: i16) -> Letter {
        Letter::ALL[i.rem_euclid(7) as usize]
    }

    pub fn name(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }

    fn from_char(c: char) -> Option<Letter> {
        Letter::ALL
            .into_iter()
            .find(|l| l.name() == c.to_ascii_uppercase())
    }
}

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Accidental {
    Flat,
    Natural,
    Sharp,
}

impl Accidental {
    pub fn semitones(self) -> i16 {
        match self {
            Accidental::Flat => -1,
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Accidental::Flat => "b",
            Accidental::Natural => "n",
            Accidental::Sharp => "#",
        }
    }
}

/// A note as written on the staff.
///
/// `accidental` is `None` when no sign is written and the key signature decides
/// the alteration. Use [`crate::theory::resolve`] to get the key that sounds.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct Note {
    pub letter: Letter,
    pub octave: i8,
    pub accidental: Option<Accidental>,
}

impl Note {
    pub fn new(letter: Letter, octave: i8) -> Self {
        Self {
            letter,
            octave,
            accidental: None,
        }
    }

    pub fn with_accidental(self, accidental: Accidental) -> Self {
        Self {
            accidental: Some(accidental),
            ..self
        }
    }

    /// Natural pitch class of the written letter (0-11).
    pub fn pitch_class(&self) -> i16 {
        self.letter.natural_pitch_class()
    }

    /// Diatonic line/space index; C4 is 28. Higher notes sit higher on the staff.
    pub fn staff_position(&self) -> i16 {
        self.octave as i16 * 7 + self.letter.index()
    }

    pub fn from_staff_position(position: i16) -> Self {
        Self::new(
            Letter::from_index(position),
            position.div_euclid(7) as i8,
        )
    }

    /// Key number for this letter and octave altered by `alteration`.
    pub fn midi_with(&self, alteration: Accidental) -> Option<MidiNote> {
        let n = (self.octave as i16 + 1) * NOTES_PER_OCTAVE
            + self.letter.natural_pitch_class()
            + alteration.semitones();
        (0..=127).contains(&n).then(|| MidiNote(n as u8))
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = self.accidental.map_or("", Accidental::symbol);
        write!(f, "{}{}{}", self.letter.name(), sign, self.octave)
    }
}

/// Parses names like `C4`, `F#3`, `Bb2` or `En5`.
impl FromStr for Note {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::Note(s.to_string());
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars.next().and_then(Letter::from_char).ok_or_else(bad)?;
        let rest = chars.as_str();
        let (accidental, octave) = match rest.chars().next() {
            Some('#') => (Some(Accidental::Sharp), &rest[1..]),
            Some('b') => (Some(Accidental::Flat), &rest[1..]),
            Some('n') => (Some(Accidental::Natural), &rest[1..]),
            _ => (None, rest),
        };
        let octave: i8 = octave.parse().map_err(|_| bad())?;
        if !(-1..=9).contains(&octave) {
            return Err(bad());
        }
        Ok(Self {
            letter,
            octave,
            accidental,
        })
    }
}

/// Parses either a raw key number (`60`) or a note name (`C4`, `F#3`).
/// A name without a sign is read as natural.
impl FromStr for MidiNote {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return if n <= 127 {
                Ok(MidiNote(n))
            } else {
                Err(ParseError::Note(s.to_string()))
            };
        }
        let note: Note = s.parse()?;
        note.midi_with(note.accidental.unwrap_or(Accidental::Natural))
            .ok_or_else(|| ParseError::Note(s.to_string()))
    }
}
