//! Random bars for the grand staff, constrained by [`Settings`].

use bitflags::bitflags;
use rand::seq::index;
use rand::Rng;

use crate::chord::{Bar, BarPair, Chord, Clef};
use crate::error::TrainerError;
use crate::notes::Note;
use crate::settings::{KeySignatureSetting, Settings};
use crate::theory::{preferred_spelling, KeySignature};

/// Chance that a chord position on one staff is a rest.
pub const REST_PROBABILITY: f64 = 0.1;

// One hand span above the lowest note of a chord, counted in candidate notes
// including the root: an octave of staff positions, or of semitones.
const DIATONIC_SPAN: usize = 8;
const CHROMATIC_SPAN: usize = 13;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Regenerate: u8 {
        const TREBLE = 1 << 0;
        const BASS = 1 << 1;
        const KEY_SIGNATURE = 1 << 2;

        const ALL = Regenerate::TREBLE.bits()
            | Regenerate::BASS.bits()
            | Regenerate::KEY_SIGNATURE.bits();
    }
}

impl Regenerate {
    pub fn for_clef(clef: Clef) -> Self {
        match clef {
            Clef::Treble => Regenerate::TREBLE,
            Clef::Bass => Regenerate::BASS,
        }
    }
}

/// What has to be generated again after the settings changed from `old` to `new`.
///
/// Accidental usage, key signature and bar length touch both staves, so any of
/// them regenerates everything. Otherwise only the staff whose chord sizes or
/// range changed is replaced.
pub fn regeneration_plan(old: &Settings, new: &Settings) -> Regenerate {
    if old.use_accidentals != new.use_accidentals
        || old.key_signature != new.key_signature
        || old.chords_per_bar != new.chords_per_bar
    {
        return Regenerate::ALL;
    }

    let mut plan = Regenerate::empty();
    for clef in Clef::ALL {
        if old.chord_size_ranges.get(clef) != new.chord_size_ranges.get(clef)
            || old.pitch_range(clef) != new.pitch_range(clef)
        {
            plan |= Regenerate::for_clef(clef);
        }
    }
    plan
}

pub fn generate_key_signature<R: Rng + ?Sized>(settings: &Settings, rng: &mut R) -> KeySignature {
    match settings.key_signature {
        KeySignatureSetting::Random => {
            KeySignature::STANDARD[rng.gen_range(0..KeySignature::STANDARD.len())]
        }
        KeySignatureSetting::Fixed(k) => k,
    }
}

/// Notes a staff may use, lowest first. Without accidentals only the notes of
/// the key qualify; with accidentals every key in range does.
fn candidate_notes(clef: Clef, settings: &Settings, key: KeySignature) -> Vec<Note> {
    settings
        .pitch_range(clef)
        .keys()
        .map(|k| preferred_spelling(k, key))
        .filter(|n| settings.use_accidentals || n.accidental.is_none())
        .collect()
}

fn random_chord<R: Rng + ?Sized>(
    candidates: &[Note],
    size: usize,
    span: usize,
    rng: &mut R,
) -> Chord {
    let root = rng.gen_range(0..=candidates.len() - size);
    let upper = (root + span).min(candidates.len());
    let mut notes = vec![candidates[root]];
    notes.extend(
        index::sample(rng, upper - root - 1, size - 1)
            .into_iter()
            .map(|i| candidates[root + 1 + i]),
    );
    Chord::new(notes)
}

// Candidate notes and hand span for `clef`, or the reason no bar can be built.
fn playable_notes(
    clef: Clef,
    settings: &Settings,
    key: KeySignature,
) -> Result<(Vec<Note>, usize), TrainerError> {
    if settings.chords_per_bar == 0 {
        return Err(TrainerError::EmptyBar);
    }

    let sizes = settings.chord_size_ranges.get(clef);
    if !sizes.is_valid() {
        return Err(TrainerError::InvalidChordSize {
            clef,
            min: sizes.min,
            max: sizes.max,
        });
    }

    let candidates = candidate_notes(clef, settings, key);
    if candidates.is_empty() {
        let range = settings.pitch_range(clef);
        return Err(TrainerError::EmptyRange {
            clef,
            low: range.low,
            high: range.high,
        });
    }

    let span = if settings.use_accidentals {
        CHROMATIC_SPAN
    } else {
        DIATONIC_SPAN
    };
    let available = span.min(candidates.len());
    if sizes.max > available {
        return Err(TrainerError::ChordTooWide {
            clef,
            size: sizes.max,
            available,
        });
    }

    Ok((candidates, span))
}

/// Fails if any key signature `settings` can pick leaves a staff without a playable bar.
pub fn check_settings(settings: &Settings) -> Result<(), TrainerError> {
    let keys = match settings.key_signature {
        KeySignatureSetting::Random => KeySignature::STANDARD.to_vec(),
        KeySignatureSetting::Fixed(k) => vec![k],
    };
    for key in keys {
        for clef in Clef::ALL {
            playable_notes(clef, settings, key)?;
        }
    }
    Ok(())
}

/// One bar of `settings.chords_per_bar` chords (or rests) for `clef`.
pub fn generate_bar<R: Rng + ?Sized>(
    clef: Clef,
    settings: &Settings,
    key: KeySignature,
    rng: &mut R,
) -> Result<Bar, TrainerError> {
    let (candidates, span) = playable_notes(clef, settings, key)?;
    let sizes = settings.chord_size_ranges.get(clef);

    let chords = (0..settings.chords_per_bar)
        .map(|_| {
            if rng.gen_bool(REST_PROBABILITY) {
                Chord::rest()
            } else {
                let size = rng.gen_range(sizes.min..=sizes.max);
                random_chord(&candidates, size, span, rng)
            }
        })
        .collect();

    Ok(Bar::new(clef, chords))
}

/// Treble and bass bars of equal length under `key`.
pub fn generate_bars<R: Rng + ?Sized>(
    settings: &Settings,
    key: KeySignature,
    rng: &mut R,
) -> Result<BarPair, TrainerError> {
    Ok(BarPair {
        treble: generate_bar(Clef::Treble, settings, key, rng)?,
        bass: generate_bar(Clef::Bass, settings, key, rng)?,
    })
}
