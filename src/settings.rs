use crate::chord::Clef;
use crate::theory::{clef_range, KeySignature, PitchRange};

/// Inclusive bounds on the number of notes in one chord.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChordSizeRange {
    pub min: usize,
    pub max: usize,
}

impl ChordSizeRange {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min >= 1 && self.min <= self.max
    }

    pub fn contains(&self, size: usize) -> bool {
        self.min <= size && size <= self.max
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChordSizeRanges {
    pub treble: ChordSizeRange,
    pub bass: ChordSizeRange,
}

impl ChordSizeRanges {
    pub fn get(&self, clef: Clef) -> ChordSizeRange {
        match clef {
            Clef::Treble => self.treble,
            Clef::Bass => self.bass,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySignatureSetting {
    /// A new standard key signature with every generated pair of bars.
    Random,
    Fixed(KeySignature),
}

/// Exercise configuration. Owned by the front end; generation only reads it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub chord_size_ranges: ChordSizeRanges,
    pub use_accidentals: bool,
    pub key_signature: KeySignatureSetting,
    pub chords_per_bar: usize,
    pub treble_range: PitchRange,
    pub bass_range: PitchRange,

    // Preferred MIDI input port (substring of the port name). First port when unset.
    pub midi_input: Option<String>,
}

impl Settings {
    pub fn pitch_range(&self, clef: Clef) -> PitchRange {
        match clef {
            Clef::Treble => self.treble_range,
            Clef::Bass => self.bass_range,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chord_size_ranges: ChordSizeRanges {
                treble: ChordSizeRange::new(1, 3),
                bass: ChordSizeRange::new(1, 2),
            },
            use_accidentals: false,
            key_signature: KeySignatureSetting::Fixed(KeySignature::C),
            chords_per_bar: 4,
            treble_range: clef_range(Clef::Treble),
            bass_range: clef_range(Clef::Bass),
            midi_input: None,
        }
    }
}

fn encode_size_range(r: ChordSizeRange) -> String {
    format!("{}-{}", r.min, r.max)
}

fn decode_size_range(v: &str) -> Option<ChordSizeRange> {
    let (min, max) = v.split_once('-')?;
    Some(ChordSizeRange::new(
        min.trim().parse().ok()?,
        max.trim().parse().ok()?,
    ))
}

pub fn encode_settings(s: &Settings) -> String {
    let key_signature = match s.key_signature {
        KeySignatureSetting::Random => "random".to_string(),
        KeySignatureSetting::Fixed(k) => k.name().to_string(),
    };

    format!(
        "treble_chord_size={}\nbass_chord_size={}\nuse_accidentals={}\nkey_signature={}\nchords_per_bar={}\ntreble_range={}\nbass_range={}\nmidi_input={}\n",
        encode_size_range(s.chord_size_ranges.treble),
        encode_size_range(s.chord_size_ranges.bass),
        s.use_accidentals,
        key_signature,
        s.chords_per_bar,
        s.treble_range,
        s.bass_range,
        s.midi_input.as_deref().unwrap_or(""),
    )
}

/// Reads `key=value` lines. Unknown keys and bad values keep their defaults.
pub fn decode_settings(input: &str) -> Settings {
    let mut s = Settings::default();

    for line in input.lines() {
        let Some((k, v)) = line.split_once('=') else { continue };
        let v = v.trim();
        let ok = match k.trim() {
            "treble_chord_size" => decode_size_range(v)
                .map(|r| s.chord_size_ranges.treble = r)
                .is_some(),
            "bass_chord_size" => decode_size_range(v)
                .map(|r| s.chord_size_ranges.bass = r)
                .is_some(),
            "use_accidentals" => {
                s.use_accidentals = v == "true";
                true
            }
            "key_signature" => {
                if v.eq_ignore_ascii_case("random") {
                    s.key_signature = KeySignatureSetting::Random;
                    true
                } else {
                    v.parse()
                        .map(|k| s.key_signature = KeySignatureSetting::Fixed(k))
                        .is_ok()
                }
            }
            "chords_per_bar" => v.parse().map(|n| s.chords_per_bar = n).is_ok(),
            "treble_range" => v.parse().map(|r| s.treble_range = r).is_ok(),
            "bass_range" => v.parse().map(|r| s.bass_range = r).is_ok(),
            "midi_input" => {
                s.midi_input = (!v.is_empty()).then(|| v.to_string());
                true
            }
            _ => true,
        };
        if !ok {
            log::warn!("Ignoring invalid setting: {}", line.trim());
        }
    }

    s
}

#[cfg(feature = "cli")]
fn settings_path() -> Option<std::path::PathBuf> {
    use std::path::PathBuf;

    #[cfg(windows)]
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("sight-trainer").join("settings.txt"));
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("sight-trainer").join("settings.txt"));
    }

    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("sight-trainer").join("settings.txt"));
    }

    None
}

#[cfg(feature = "cli")]
pub fn load_settings() -> Settings {
    use std::fs;

    let Some(path) = settings_path() else {
        return Settings::default();
    };

    match fs::read_to_string(&path) {
        Ok(s) => {
            log::info!("Loaded settings from {}", path.display());
            decode_settings(&s)
        }
        Err(_) => Settings::default(),
    }
}

#[cfg(feature = "cli")]
pub fn save_settings(s: &Settings) {
    use std::fs;

    let Some(path) = settings_path() else {
        return;
    };

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    if let Err(e) = fs::write(&path, encode_settings(s)) {
        log::warn!("Could not save settings to {}: {e}", path.display());
    }
}
