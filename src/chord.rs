use std::fmt;

use crate::notes::Note;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Clef {
    Treble,
    Bass,
}

impl Clef {
    pub const ALL: [Clef; 2] = [Clef::Treble, Clef::Bass];

    pub fn name(self) -> &'static str {
        match self {
            Clef::Treble => "treble",
            Clef::Bass => "bass",
        }
    }
}

impl fmt::Display for Clef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Notes struck together at one time position. A chord without notes is a rest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Chord {
    notes: Vec<Note>,
}

impl Chord {
    /// Builds a chord ordered from the lowest staff position up. Duplicate notes are dropped.
    pub fn new(mut notes: Vec<Note>) -> Self {
        notes.sort_by_key(|n| (n.staff_position(), n.accidental.map(|a| a.semitones())));
        notes.dedup();
        Self { notes }
    }

    pub fn rest() -> Self {
        Self { notes: Vec::new() }
    }

    pub fn is_rest(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rest() {
            return f.write_str("rest");
        }
        let names: Vec<String> = self.notes.iter().map(Note::to_string).collect();
        write!(f, "[{}]", names.join(" "))
    }
}

/// One bar of chords on a single staff.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bar {
    pub clef: Clef,
    pub chords: Vec<Chord>,
}

impl Bar {
    pub fn new(clef: Clef, chords: Vec<Chord>) -> Self {
        Self { clef, chords }
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Chord> {
        self.chords.get(index)
    }
}

/// The grand staff: treble and bass bars played against each other, chord by chord.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BarPair {
    pub treble: Bar,
    pub bass: Bar,
}

impl BarPair {
    pub fn bar(&self, clef: Clef) -> &Bar {
        match clef {
            Clef::Treble => &self.treble,
            Clef::Bass => &self.bass,
        }
    }

    pub fn bar_mut(&mut self, clef: Clef) -> &mut Bar {
        match clef {
            Clef::Treble => &mut self.treble,
            Clef::Bass => &mut self.bass,
        }
    }

    /// Number of chord positions. Both bars always have the same length.
    pub fn len(&self) -> usize {
        self.treble.len()
    }

    pub fn is_empty(&self) -> bool {
        self.treble.is_empty()
    }

    /// Chords of both staves at one position, treble first.
    pub fn chords_at(&self, index: usize) -> impl Iterator<Item = &Chord> + '_ {
        Clef::ALL
            .into_iter()
            .filter_map(move |clef| self.bar(clef).get(index))
    }
}
