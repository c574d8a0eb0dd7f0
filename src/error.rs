use std::time::Duration;

use thiserror::Error;

use crate::chord::Clef;
use crate::notes::MidiNote;

/// Errors the caller has to deal with; the trainer cannot continue on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrainerError {
    #[error("no playable notes for the {clef} clef between {low} and {high}")]
    EmptyRange {
        clef: Clef,
        low: MidiNote,
        high: MidiNote,
    },

    #[error("invalid chord size range {min}-{max} for the {clef} clef")]
    InvalidChordSize { clef: Clef, min: usize, max: usize },

    #[error("{clef} chords of {size} notes do not fit into one hand span ({available} keys)")]
    ChordTooWide {
        clef: Clef,
        size: usize,
        available: usize,
    },

    #[error("a bar needs at least one chord")]
    EmptyBar,

    #[error("MIDI input error: {0}")]
    MidiInput(String),
}

/// Problems with the player's input. These are shown to the player and clear
/// themselves; they never stop the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("Wrong key: {name}")]
    WrongKey { key: MidiNote, name: String },

    #[error(
        "Since you took more than {threshold_secs} seconds, we ignored this chord to avoid \
         dragging down your statistics. Hopefully, you just made a break in between :)"
    )]
    TimeoutDowngrade {
        elapsed: Duration,
        threshold_secs: u64,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid note `{0}`")]
    Note(String),

    #[error("unknown key signature `{0}`")]
    KeySignature(String),

    #[error("invalid range `{0}`")]
    Range(String),
}
