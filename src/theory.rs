//! Pitch and key-signature arithmetic: how a written note sounds under a key
//! signature, and how a pressed key can be written.

use std::fmt;
use std::str::FromStr;

use crate::chord::{Chord, Clef};
use crate::error::ParseError;
use crate::notes::{Accidental, Letter, MidiNote, Note, NOTES_PER_OCTAVE};

const KEY_NAMES: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];

const SHARP_ORDER: [Letter; 7] = [
    Letter::F,
    Letter::C,
    Letter::G,
    Letter::D,
    Letter::A,
    Letter::E,
    Letter::B,
];

const FLAT_ORDER: [Letter; 7] = [
    Letter::B,
    Letter::E,
    Letter::A,
    Letter::D,
    Letter::G,
    Letter::C,
    Letter::F,
];

/// A major key signature, counted in fifths: positive for sharps, negative for flats.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct KeySignature {
    fifths: i8,
}

impl KeySignature {
    pub const C: KeySignature = KeySignature { fifths: 0 };

    /// One key per tonic pitch class, F# rather than Gb.
    pub const STANDARD: [KeySignature; 12] = [
        KeySignature { fifths: -5 },
        KeySignature { fifths: -4 },
        KeySignature { fifths: -3 },
        KeySignature { fifths: -2 },
        KeySignature { fifths: -1 },
        KeySignature { fifths: 0 },
        KeySignature { fifths: 1 },
        KeySignature { fifths: 2 },
        KeySignature { fifths: 3 },
        KeySignature { fifths: 4 },
        KeySignature { fifths: 5 },
        KeySignature { fifths: 6 },
    ];

    pub fn new(fifths: i8) -> Option<Self> {
        (-7..=7).contains(&fifths).then_some(Self { fifths })
    }

    pub fn name(self) -> &'static str {
        KEY_NAMES[(self.fifths + 7) as usize]
    }

    pub fn prefers_flats(self) -> bool {
        self.fifths < 0
    }

    /// Alteration the signature applies to every `letter` without a written accidental.
    pub fn alteration(self, letter: Letter) -> Accidental {
        let count = self.fifths.unsigned_abs() as usize;
        if self.fifths > 0 && SHARP_ORDER[..count].contains(&letter) {
            Accidental::Sharp
        } else if self.fifths < 0 && FLAT_ORDER[..count].contains(&letter) {
            Accidental::Flat
        } else {
            Accidental::Natural
        }
    }

    /// The letters the signature alters, in the order they are written on the staff.
    pub fn overrides(self) -> Vec<(Letter, Accidental)> {
        let count = self.fifths.unsigned_abs() as usize;
        if self.fifths >= 0 {
            SHARP_ORDER[..count]
                .iter()
                .map(|&l| (l, Accidental::Sharp))
                .collect()
        } else {
            FLAT_ORDER[..count]
                .iter()
                .map(|&l| (l, Accidental::Flat))
                .collect()
        }
    }
}

impl Default for KeySignature {
    fn default() -> Self {
        KeySignature::C
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeySignature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        KEY_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(s))
            .map(|i| KeySignature {
                fifths: i as i8 - 7,
            })
            .ok_or_else(|| ParseError::KeySignature(s.to_string()))
    }
}

/// Sign that has to be written in front of `letter` to get `alteration` under `signature`.
pub fn written_accidental(
    letter: Letter,
    alteration: Accidental,
    signature: KeySignature,
) -> Option<Accidental> {
    if signature.alteration(letter) == alteration {
        None
    } else {
        Some(alteration)
    }
}

/// The key that sounds for a written note.
pub fn resolve(note: &Note, signature: KeySignature) -> Option<MidiNote> {
    note.midi_with(
        note.accidental
            .unwrap_or_else(|| signature.alteration(note.letter)),
    )
}

/// Keys that have to be held to play `chord`. Empty for rests.
pub fn keys_of(chord: &Chord, signature: KeySignature) -> Vec<MidiNote> {
    chord
        .notes()
        .iter()
        .filter_map(|n| resolve(n, signature))
        .collect()
}

/// Every way to write `key` with at most one sharp or flat, best first.
///
/// A spelling that needs no written sign under `signature` always comes first.
/// Otherwise naturals win, then sharps for sharp keys and C, flats for flat keys.
pub fn spellings_for(key: MidiNote, signature: KeySignature) -> Vec<Note> {
    let alterations = [Accidental::Flat, Accidental::Natural, Accidental::Sharp];
    let mut spellings: Vec<Note> = Letter::ALL
        .into_iter()
        .flat_map(|letter| {
            alterations.into_iter().filter_map(move |alteration| {
                let base =
                    key.0 as i16 - letter.natural_pitch_class() - alteration.semitones();
                if base.rem_euclid(NOTES_PER_OCTAVE) != 0 {
                    return None;
                }
                Some(Note {
                    letter,
                    octave: (base.div_euclid(NOTES_PER_OCTAVE) - 1) as i8,
                    accidental: written_accidental(letter, alteration, signature),
                })
            })
        })
        .collect();
    spellings.sort_by_key(|n| spelling_rank(n, signature));
    spellings
}

fn spelling_rank(note: &Note, signature: KeySignature) -> u8 {
    match (note.accidental, signature.prefers_flats()) {
        (None, _) => 0,
        (Some(Accidental::Natural), _) => 1,
        (Some(Accidental::Sharp), false) | (Some(Accidental::Flat), true) => 2,
        (Some(Accidental::Sharp), true) | (Some(Accidental::Flat), false) => 3,
    }
}

pub fn preferred_spelling(key: MidiNote, signature: KeySignature) -> Note {
    spellings_for(key, signature)
        .into_iter()
        .next()
        .unwrap_or_else(|| plain_spelling(key, signature))
}

/// The natural of a white key, or the sharp of the letter below a black key.
fn plain_spelling(key: MidiNote, signature: KeySignature) -> Note {
    let (letter, alteration) = match key.pitch_class() {
        0 => (Letter::C, Accidental::Natural),
        1 => (Letter::C, Accidental::Sharp),
        2 => (Letter::D, Accidental::Natural),
        3 => (Letter::D, Accidental::Sharp),
        4 => (Letter::E, Accidental::Natural),
        5 => (Letter::F, Accidental::Natural),
        6 => (Letter::F, Accidental::Sharp),
        7 => (Letter::G, Accidental::Natural),
        8 => (Letter::G, Accidental::Sharp),
        9 => (Letter::A, Accidental::Natural),
        10 => (Letter::A, Accidental::Sharp),
        _ => (Letter::B, Accidental::Natural),
    };
    Note {
        letter,
        octave: key.octave(),
        accidental: written_accidental(letter, alteration, signature),
    }
}

/// Human readable name of a pressed key, e.g. `F#4` in G major or `Gb4` in Db major.
pub fn note_name(key: MidiNote, signature: KeySignature) -> String {
    let note = preferred_spelling(key, signature);
    let alteration = note
        .accidental
        .unwrap_or_else(|| signature.alteration(note.letter));
    let sign = match alteration {
        Accidental::Natural => "",
        other => other.symbol(),
    };
    format!("{}{}{}", note.letter.name(), sign, note.octave)
}

/// Inclusive span of keys a staff draws from.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PitchRange {
    pub low: MidiNote,
    pub high: MidiNote,
}

impl PitchRange {
    pub fn new(low: MidiNote, high: MidiNote) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, key: MidiNote) -> bool {
        self.low <= key && key <= self.high
    }

    pub fn is_empty(&self) -> bool {
        self.low > self.high
    }

    pub fn keys(&self) -> impl Iterator<Item = MidiNote> {
        (self.low.0..=self.high.0).map(MidiNote)
    }
}

impl fmt::Display for PitchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            note_name(self.low, KeySignature::C),
            note_name(self.high, KeySignature::C)
        )
    }
}

/// Parses `C4-A5` or `60-81`.
impl FromStr for PitchRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::Range(s.to_string());
        let (low, high) = s.split_once('-').ok_or_else(bad)?;
        let low: MidiNote = low.parse().map_err(|_| bad())?;
        let high: MidiNote = high.parse().map_err(|_| bad())?;
        Ok(Self { low, high })
    }
}

/// Default playable range of a staff: C4..A5 for treble, E2..B3 for bass.
pub fn clef_range(clef: Clef) -> PitchRange {
    match clef {
        Clef::Treble => PitchRange::new(MidiNote(60), MidiNote(81)),
        Clef::Bass => PitchRange::new(MidiNote(40), MidiNote(59)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> KeySignature {
        name.parse().unwrap()
    }

    #[test]
    fn plain_spelling_sounds_the_same_key() {
        for fifths in -7..=7 {
            let signature = KeySignature::new(fifths).unwrap();
            for k in 0..=127u8 {
                let note = plain_spelling(MidiNote(k), signature);
                assert_eq!(resolve(&note, signature), Some(MidiNote(k)));
                assert!(spellings_for(MidiNote(k), signature).contains(&note));
            }
        }
    }

    #[test]
    fn standard_keys_cover_every_tonic_once() {
        let mut tonics: Vec<&str> = KeySignature::STANDARD.iter().map(|k| k.name()).collect();
        tonics.sort();
        tonics.dedup();
        assert_eq!(tonics.len(), 12);
        assert!(tonics.contains(&"F#"));
        assert!(!tonics.contains(&"Gb"));
    }

    #[test]
    fn key_names_parse_back() {
        for fifths in -7..=7 {
            let k = KeySignature::new(fifths).unwrap();
            assert_eq!(key(k.name()), k);
        }
        assert!("H".parse::<KeySignature>().is_err());
        assert!(KeySignature::new(8).is_none());
    }

    #[test]
    fn signature_alterations() {
        let d = key("D");
        assert_eq!(d.alteration(Letter::F), Accidental::Sharp);
        assert_eq!(d.alteration(Letter::C), Accidental::Sharp);
        assert_eq!(d.alteration(Letter::G), Accidental::Natural);

        let eb = key("Eb");
        assert_eq!(
            eb.overrides(),
            vec![
                (Letter::B, Accidental::Flat),
                (Letter::E, Accidental::Flat),
                (Letter::A, Accidental::Flat),
            ]
        );
        assert!(KeySignature::C.overrides().is_empty());
    }

    #[test]
    fn resolve_applies_signature_unless_written() {
        let g = key("G");
        let f5 = Note::new(Letter::F, 5);
        assert_eq!(resolve(&f5, g), Some(MidiNote(78)));
        assert_eq!(
            resolve(&f5.with_accidental(Accidental::Natural), g),
            Some(MidiNote(77))
        );
        assert_eq!(resolve(&f5, KeySignature::C), Some(MidiNote(77)));
    }

    #[test]
    fn black_key_spelling_follows_key_direction() {
        let cs = spellings_for(MidiNote(61), KeySignature::C);
        assert_eq!(cs.len(), 2);
        assert_eq!(cs[0], Note::new(Letter::C, 4).with_accidental(Accidental::Sharp));
        assert_eq!(cs[1], Note::new(Letter::D, 4).with_accidental(Accidental::Flat));

        let f = spellings_for(MidiNote(61), key("F"));
        assert_eq!(f[0], Note::new(Letter::D, 4).with_accidental(Accidental::Flat));
    }

    #[test]
    fn spelling_in_key_needs_no_sign() {
        assert_eq!(
            preferred_spelling(MidiNote(66), key("D")),
            Note::new(Letter::F, 4)
        );
        assert_eq!(
            preferred_spelling(MidiNote(70), key("Bb")),
            Note::new(Letter::B, 4)
        );
        // E# belongs to F# major.
        assert_eq!(
            preferred_spelling(MidiNote(65), key("F#")),
            Note::new(Letter::E, 4)
        );
    }

    #[test]
    fn naturals_beat_enharmonic_flats_outside_key() {
        // E natural in F# major is written with a natural sign, not as Fb.
        assert_eq!(
            preferred_spelling(MidiNote(64), key("F#")),
            Note::new(Letter::E, 4).with_accidental(Accidental::Natural)
        );
    }

    #[test]
    fn spellings_cross_octave_boundaries() {
        let spellings = spellings_for(MidiNote(60), KeySignature::C);
        assert!(spellings.contains(&Note::new(Letter::B, 3).with_accidental(Accidental::Sharp)));
        for n in spellings {
            assert_eq!(resolve(&n, KeySignature::C), Some(MidiNote(60)));
        }
    }

    #[test]
    fn every_spelling_resolves_back_in_every_key() {
        for fifths in -7..=7 {
            let sig = KeySignature::new(fifths).unwrap();
            for k in 21..=108 {
                let spellings = spellings_for(MidiNote(k), sig);
                assert!(!spellings.is_empty());
                for n in spellings {
                    assert_eq!(resolve(&n, sig), Some(MidiNote(k)));
                }
            }
        }
    }

    #[test]
    fn keys_of_chord() {
        let chord = Chord::new(vec![
            Note::new(Letter::D, 4),
            Note::new(Letter::F, 4),
            Note::new(Letter::A, 4),
        ]);
        assert_eq!(
            keys_of(&chord, key("D")),
            vec![MidiNote(62), MidiNote(66), MidiNote(69)]
        );
        assert!(keys_of(&Chord::rest(), key("D")).is_empty());
    }

    #[test]
    fn names_of_pressed_keys() {
        assert_eq!(note_name(MidiNote(61), KeySignature::C), "C#4");
        assert_eq!(note_name(MidiNote(61), key("Ab")), "Db4");
        assert_eq!(note_name(MidiNote(60), key("D")), "C4");
    }

    #[test]
    fn pitch_range_parse_and_contains() {
        let r: PitchRange = "C4-A5".parse().unwrap();
        assert_eq!(r, clef_range(Clef::Treble));
        assert!(r.contains(MidiNote(60)));
        assert!(!r.contains(MidiNote(82)));
        assert_eq!("40-59".parse::<PitchRange>().unwrap(), clef_range(Clef::Bass));
        assert!("C4".parse::<PitchRange>().is_err());
        assert_eq!(r.to_string(), "C4-A5");
    }
}
