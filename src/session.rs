use crate::bar_generator::{
    check_settings, generate_bar, generate_bars, generate_key_signature, regeneration_plan,
    Regenerate,
};
use crate::chord::{BarPair, Chord, Clef};
use crate::error::{MatchError, TrainerError};
use crate::matcher::{MatchPhase, MatchSignal, MidiMatcher, NoteEvent};
use crate::notes::MidiNote;
use crate::report::{AnalyticsEvent, StatisticEvent};
use crate::settings::Settings;
use crate::theory::{keys_of, note_name, KeySignature};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use rand::Rng;

/// Successes slower than this are not counted; the player probably took a break.
pub const TIMEOUT_THRESHOLD: Duration = Duration::from_secs(30);

/// Stand-ins for a real performance, used for debugging without an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugAction {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerEvent {
    Note(NoteEvent),
    Debug(DebugAction),
}

/// What the front end should do after an event. The session never talks to
/// the statistics or analytics services itself.
#[derive(Debug, Default)]
pub struct SessionEffects {
    pub statistics: Vec<StatisticEvent>,
    pub analytics: Vec<AnalyticsEvent>,
    pub errors: Vec<MatchError>,
    pub error_resolved: bool,
    pub play_success_sound: bool,
    pub redraw: bool,
}

/// Walks the player through generated bars, one chord position at a time.
pub struct TrainingSession<R: Rng> {
    settings: Settings,
    rng: R,
    bars: BarPair,
    key_signature: KeySignature,
    chord_index: usize,
    matcher: MidiMatcher,
    error: Option<MatchError>,
}

impl<R: Rng> TrainingSession<R> {
    pub fn new(settings: Settings, mut rng: R, now: Instant) -> Result<Self, TrainerError> {
        check_settings(&settings)?;
        let key_signature = generate_key_signature(&settings, &mut rng);
        let bars = generate_bars(&settings, key_signature, &mut rng)?;
        let mut session = Self {
            settings,
            rng,
            bars,
            key_signature,
            chord_index: 0,
            matcher: MidiMatcher::new(),
            error: None,
        };
        session.present_current_chord(now, &mut SessionEffects::default())?;
        Ok(session)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn bars(&self) -> &BarPair {
        &self.bars
    }

    pub fn key_signature(&self) -> KeySignature {
        self.key_signature
    }

    pub fn chord_index(&self) -> usize {
        self.chord_index
    }

    pub fn current_chords(&self) -> impl Iterator<Item = (Clef, &Chord)> + '_ {
        Clef::ALL.into_iter().filter_map(move |clef| {
            self.bars
                .bar(clef)
                .get(self.chord_index)
                .map(|chord| (clef, chord))
        })
    }

    /// Message to show the player, if any.
    pub fn error(&self) -> Option<&MatchError> {
        self.error.as_ref()
    }

    pub fn phase(&self) -> MatchPhase {
        self.matcher.phase()
    }

    /// Keys of both staves at the current position, rests ignored.
    pub fn current_keys(&self) -> Vec<MidiNote> {
        let keys: BTreeSet<MidiNote> = self
            .bars
            .chords_at(self.chord_index)
            .flat_map(|chord| keys_of(chord, self.key_signature))
            .collect();
        keys.into_iter().collect()
    }

    pub fn handle_event(
        &mut self,
        event: TrainerEvent,
        now: Instant,
    ) -> Result<SessionEffects, TrainerError> {
        let mut effects = SessionEffects::default();

        match event {
            TrainerEvent::Note(note_event) => match self.matcher.handle_event(note_event, now) {
                Some(MatchSignal::Success { elapsed }) => {
                    self.on_success(elapsed, now, &mut effects)?
                }
                Some(MatchSignal::Failure { wrong_key, elapsed }) => {
                    self.on_failure(Some(wrong_key), elapsed, &mut effects)
                }
                Some(MatchSignal::Resolved) => self.resolve_error(&mut effects),
                None => {}
            },
            TrainerEvent::Debug(DebugAction::Success) => {
                let elapsed = self.matcher.elapsed(now);
                self.on_success(elapsed, now, &mut effects)?
            }
            TrainerEvent::Debug(DebugAction::Failure) => {
                let elapsed = self.matcher.elapsed(now);
                self.on_failure(None, elapsed, &mut effects)
            }
        }

        Ok(effects)
    }

    /// Switch to new settings, regenerating only what they affect. On error the
    /// session keeps its previous settings and bars.
    pub fn apply_settings(
        &mut self,
        settings: Settings,
        now: Instant,
    ) -> Result<SessionEffects, TrainerError> {
        let mut effects = SessionEffects::default();
        if settings == self.settings {
            return Ok(effects);
        }

        check_settings(&settings)?;
        let plan = regeneration_plan(&self.settings, &settings);
        let key_signature = if plan.contains(Regenerate::KEY_SIGNATURE) {
            generate_key_signature(&settings, &mut self.rng)
        } else {
            self.key_signature
        };
        let mut bars = self.bars.clone();
        for clef in Clef::ALL {
            if plan.contains(Regenerate::for_clef(clef)) {
                *bars.bar_mut(clef) = generate_bar(clef, &settings, key_signature, &mut self.rng)?;
            }
        }
        log::info!("Settings changed, regenerated {:?}", plan);

        self.settings = settings;
        self.key_signature = key_signature;
        self.bars = bars;
        self.chord_index = 0;
        effects.redraw = true;
        self.present_current_chord(now, &mut effects)?;
        Ok(effects)
    }

    fn on_success(
        &mut self,
        elapsed: Duration,
        now: Instant,
        effects: &mut SessionEffects,
    ) -> Result<(), TrainerError> {
        if elapsed <= TIMEOUT_THRESHOLD {
            effects.statistics.push(StatisticEvent {
                success: true,
                keys: self.current_keys(),
                key_signature: self.key_signature,
                time: elapsed,
            });
            self.resolve_error(effects);
        } else {
            log::warn!("Chord took {:?}, leaving it out of the statistics", elapsed);
            self.raise(
                MatchError::TimeoutDowngrade {
                    elapsed,
                    threshold_secs: TIMEOUT_THRESHOLD.as_secs(),
                },
                effects,
            );
        }

        effects.analytics.push(AnalyticsEvent::success());
        effects.play_success_sound = true;
        effects.redraw = true;
        self.advance(now, effects)
    }

    // The chord stays current; the player has to let go of the wrong key and try again.
    fn on_failure(
        &mut self,
        wrong_key: Option<MidiNote>,
        elapsed: Duration,
        effects: &mut SessionEffects,
    ) {
        effects.statistics.push(StatisticEvent {
            success: false,
            keys: self.current_keys(),
            key_signature: self.key_signature,
            time: elapsed,
        });
        effects.analytics.push(AnalyticsEvent::failure());

        if let Some(key) = wrong_key {
            let name = note_name(key, self.key_signature);
            self.raise(MatchError::WrongKey { key, name }, effects);
        }
        effects.redraw = true;
    }

    fn raise(&mut self, error: MatchError, effects: &mut SessionEffects) {
        self.error = Some(error.clone());
        effects.errors.push(error);
    }

    fn resolve_error(&mut self, effects: &mut SessionEffects) {
        if self.error.take().is_some() {
            effects.error_resolved = true;
            effects.redraw = true;
        }
    }

    /// Move to the next chord position, or to a fresh pair of bars after the last one.
    fn advance(&mut self, now: Instant, effects: &mut SessionEffects) -> Result<(), TrainerError> {
        self.step(effects)?;
        self.present_current_chord(now, effects)
    }

    fn step(&mut self, effects: &mut SessionEffects) -> Result<(), TrainerError> {
        if self.chord_index + 1 >= self.bars.len() {
            let key_signature = generate_key_signature(&self.settings, &mut self.rng);
            let bars = generate_bars(&self.settings, key_signature, &mut self.rng)?;
            self.key_signature = key_signature;
            self.bars = bars;
            self.chord_index = 0;
            log::info!(
                "New bars in {}: treble {:?} bass {:?}",
                self.key_signature,
                self.bars.treble.chords.iter().map(Chord::to_string).collect::<Vec<_>>(),
                self.bars.bass.chords.iter().map(Chord::to_string).collect::<Vec<_>>(),
            );
            self.resolve_error(effects);
        } else {
            self.chord_index += 1;
        }
        Ok(())
    }

    // Rest positions need no input and are passed over.
    fn present_current_chord(
        &mut self,
        now: Instant,
        effects: &mut SessionEffects,
    ) -> Result<(), TrainerError> {
        loop {
            let keys = self.current_keys();
            match self.matcher.set_desired(keys, now) {
                Some(MatchSignal::Success { .. }) => {
                    log::debug!("Skipping rest at chord {}", self.chord_index);
                    self.step(effects)?;
                }
                _ => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ChordSizeRange, KeySignatureSetting};
    use crate::theory::PitchRange;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session(settings: Settings, t0: Instant) -> TrainingSession<StdRng> {
        TrainingSession::new(settings, StdRng::seed_from_u64(42), t0).unwrap()
    }

    fn press(s: &mut TrainingSession<StdRng>, key: MidiNote, at: Instant) -> SessionEffects {
        s.handle_event(TrainerEvent::Note(NoteEvent::down(key)), at)
            .unwrap()
    }

    fn release(s: &mut TrainingSession<StdRng>, key: MidiNote, at: Instant) -> SessionEffects {
        s.handle_event(TrainerEvent::Note(NoteEvent::up(key)), at)
            .unwrap()
    }

    // Presses every current key, then lets go. Returns the effects of the last press.
    fn play_current(s: &mut TrainingSession<StdRng>, at: Instant) -> SessionEffects {
        let keys = s.current_keys();
        let mut last = SessionEffects::default();
        for &k in &keys {
            last = press(s, k, at);
        }
        for &k in &keys {
            release(s, k, at);
        }
        last
    }

    #[test]
    fn current_position_always_has_keys() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);
        for _ in 0..100 {
            assert!(!s.current_keys().is_empty());
            assert_eq!(s.bars().treble.len(), s.bars().bass.len());
            assert!(s.chord_index() < s.bars().len());
            s.handle_event(TrainerEvent::Debug(DebugAction::Success), t0)
                .unwrap();
        }
    }

    #[test]
    fn playing_the_chord_registers_success_and_advances() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);
        let keys = s.current_keys();
        let before = (s.chord_index(), s.bars().clone());

        let effects = play_current(&mut s, t0 + Duration::from_secs(2));

        assert_eq!(
            effects.statistics,
            vec![StatisticEvent {
                success: true,
                keys,
                key_signature: KeySignature::C,
                time: Duration::from_secs(2),
            }]
        );
        assert_eq!(effects.analytics, vec![AnalyticsEvent::success()]);
        assert!(effects.play_success_sound);
        assert!(effects.errors.is_empty());
        assert_ne!((s.chord_index(), s.bars().clone()), before);
    }

    #[test]
    fn wrong_key_keeps_chord_and_reports_failure() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);
        let keys = s.current_keys();
        let index = s.chord_index();

        // Far below both staves.
        let wrong = MidiNote(20);
        let effects = press(&mut s, wrong, t0 + Duration::from_millis(500));

        assert_eq!(effects.statistics.len(), 1);
        assert!(!effects.statistics[0].success);
        assert_eq!(effects.statistics[0].keys, keys);
        assert_eq!(effects.analytics, vec![AnalyticsEvent::failure()]);
        assert_eq!(
            effects.errors,
            vec![MatchError::WrongKey {
                key: wrong,
                name: "G#0".to_string(),
            }]
        );
        assert_eq!(s.error(), effects.errors.first());
        assert_eq!(s.chord_index(), index);
        assert_eq!(s.current_keys(), keys);

        let effects = release(&mut s, wrong, t0 + Duration::from_millis(900));
        assert!(effects.error_resolved);
        assert_eq!(s.error(), None);
        assert!(effects.statistics.is_empty());
    }

    #[test]
    fn chord_can_be_completed_after_wrong_key_is_released() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);
        let keys = s.current_keys();

        press(&mut s, MidiNote(20), t0);
        release(&mut s, MidiNote(20), t0);

        let effects = play_current(&mut s, t0);
        assert_eq!(effects.statistics.len(), 1);
        assert!(effects.statistics[0].success);
        assert_eq!(effects.statistics[0].keys, keys);
    }

    #[test]
    fn slow_success_is_not_counted_but_advances() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);
        let before = (s.chord_index(), s.bars().clone());

        let late = t0 + Duration::from_millis(31_000);
        let effects = play_current(&mut s, late);

        assert!(effects.statistics.is_empty());
        assert_eq!(
            effects.errors,
            vec![MatchError::TimeoutDowngrade {
                elapsed: Duration::from_millis(31_000),
                threshold_secs: 30,
            }]
        );
        assert_eq!(effects.analytics, vec![AnalyticsEvent::success()]);
        assert!(effects.play_success_sound);
        assert_ne!((s.chord_index(), s.bars().clone()), before);
    }

    #[test]
    fn success_at_threshold_still_counts() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);

        let effects = play_current(&mut s, t0 + TIMEOUT_THRESHOLD);
        assert_eq!(effects.statistics.len(), 1);
        assert!(effects.errors.is_empty());
    }

    #[test]
    fn timely_success_clears_previous_error() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);

        // Wrong key held while the debug source reports a success.
        press(&mut s, MidiNote(20), t0);
        assert!(s.error().is_some());
        let effects = s
            .handle_event(TrainerEvent::Debug(DebugAction::Success), t0)
            .unwrap();
        assert!(effects.error_resolved);
        assert_eq!(s.error(), None);
    }

    #[test]
    fn last_chord_regenerates_bars() {
        let t0 = Instant::now();
        let settings = Settings {
            chords_per_bar: 1,
            key_signature: KeySignatureSetting::Random,
            ..Settings::default()
        };
        let mut s = session(settings, t0);
        let mut changed = false;
        for _ in 0..10 {
            let before = s.bars().clone();
            let effects = play_current(&mut s, t0);
            assert_eq!(effects.statistics.len(), 1);
            assert_eq!(s.chord_index(), 0);
            assert_eq!(s.bars().len(), 1);
            changed |= s.bars() != &before;
        }
        assert!(changed);
    }

    #[test]
    fn debug_failure_reports_without_error_message() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);
        let index = s.chord_index();

        let effects = s
            .handle_event(
                TrainerEvent::Debug(DebugAction::Failure),
                t0 + Duration::from_secs(4),
            )
            .unwrap();

        assert_eq!(effects.statistics.len(), 1);
        assert!(!effects.statistics[0].success);
        assert_eq!(effects.statistics[0].time, Duration::from_secs(4));
        assert_eq!(effects.analytics, vec![AnalyticsEvent::failure()]);
        assert!(effects.errors.is_empty());
        assert_eq!(s.chord_index(), index);
    }

    #[test]
    fn treble_settings_change_keeps_bass_bar() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);
        let bass = s.bars().bass.clone();
        let key = s.key_signature();

        let mut new = s.settings().clone();
        new.chord_size_ranges.treble = ChordSizeRange::new(2, 2);
        s.apply_settings(new, t0).unwrap();

        assert_eq!(s.bars().bass, bass);
        assert_eq!(s.key_signature(), key);
        assert_eq!(s.bars().treble.len(), s.bars().bass.len());
        for chord in &s.bars().treble.chords {
            assert!(chord.is_rest() || chord.len() == 2);
        }
    }

    #[test]
    fn accidental_change_regenerates_everything() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);
        let before = s.bars().clone();

        let mut new = s.settings().clone();
        new.use_accidentals = true;
        new.key_signature = KeySignatureSetting::Fixed("E".parse().unwrap());
        let effects = s.apply_settings(new, t0).unwrap();

        assert!(effects.redraw);
        assert_eq!(s.key_signature().name(), "E");
        assert_ne!(s.bars(), &before);
        assert!(s.settings().use_accidentals);
    }

    #[test]
    fn invalid_settings_leave_session_untouched() {
        let t0 = Instant::now();
        let mut s = session(Settings::default(), t0);
        let before = s.bars().clone();
        let settings = s.settings().clone();

        let mut bad = settings.clone();
        bad.chord_size_ranges.bass = ChordSizeRange::new(0, 2);
        assert!(matches!(
            s.apply_settings(bad, t0),
            Err(TrainerError::InvalidChordSize { clef: Clef::Bass, .. })
        ));
        assert_eq!(s.bars(), &before);
        assert_eq!(s.settings(), &settings);
    }

    #[test]
    fn random_key_settings_must_suit_every_key() {
        let t0 = Instant::now();
        let mut narrow = Settings {
            bass_range: PitchRange::new(MidiNote(40), MidiNote(40)),
            key_signature: KeySignatureSetting::Random,
            chords_per_bar: 1,
            ..Settings::default()
        };
        narrow.chord_size_ranges.bass = ChordSizeRange::new(1, 1);
        let empty_bass = TrainerError::EmptyRange {
            clef: Clef::Bass,
            low: MidiNote(40),
            high: MidiNote(40),
        };

        assert_eq!(
            TrainingSession::new(narrow.clone(), StdRng::seed_from_u64(0), t0).err(),
            Some(empty_bass.clone())
        );

        let mut s = session(Settings::default(), t0);
        let before = (s.key_signature(), s.bars().clone(), s.current_keys());
        assert_eq!(s.apply_settings(narrow, t0).err(), Some(empty_bass));
        assert_eq!((s.key_signature(), s.bars().clone(), s.current_keys()), before);
    }

    #[test]
    fn shown_keys_always_match_what_is_expected() {
        let t0 = Instant::now();
        let settings = Settings {
            key_signature: KeySignatureSetting::Random,
            chords_per_bar: 1,
            ..Settings::default()
        };
        let mut s = session(settings, t0);
        for _ in 0..50 {
            assert_eq!(s.matcher.desired_keys().collect::<Vec<_>>(), s.current_keys());
            let effects = play_current(&mut s, t0);
            assert_eq!(effects.statistics.len(), 1);
            assert!(effects.statistics[0].success);
        }
    }

    #[test]
    fn bad_initial_settings_are_rejected() {
        let settings = Settings {
            chords_per_bar: 0,
            ..Settings::default()
        };
        assert!(matches!(
            TrainingSession::new(settings, StdRng::seed_from_u64(1), Instant::now()),
            Err(TrainerError::EmptyBar)
        ));
    }
}
