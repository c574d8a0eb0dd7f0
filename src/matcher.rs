use crate::notes::{MidiNote, NoteVolume};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// A decoded note-on / note-off from the instrument or the virtual keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub state: KeyState,
    pub note: MidiNote,
    pub velocity: NoteVolume,
}

impl NoteEvent {
    pub const DEFAULT_VELOCITY: NoteVolume = NoteVolume(64);

    pub fn down(note: MidiNote) -> Self {
        Self {
            state: KeyState::Pressed,
            note,
            velocity: Self::DEFAULT_VELOCITY,
        }
    }

    pub fn up(note: MidiNote) -> Self {
        Self {
            state: KeyState::Released,
            note,
            velocity: NoteVolume(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// No chord presented.
    Idle,
    /// Chord presented, none of its keys pressed.
    Waiting,
    /// Some of the desired keys are down and nothing wrong is.
    PartiallyMatched,
    Resolved(Resolution),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSignal {
    Success { elapsed: Duration },
    Failure { wrong_key: MidiNote, elapsed: Duration },
    /// The player let go after an error or a partial chord; any error message can be cleared.
    Resolved,
}

/// Matching progress for the chord currently presented.
#[derive(Debug, Clone)]
struct MatchState {
    desired: BTreeSet<MidiNote>,
    pressed: BTreeSet<MidiNote>,
    wrong: BTreeSet<MidiNote>,
    start: Instant,
    phase: MatchPhase,
}

/// Compares live key presses with the keys of the current chord.
///
/// Events have to arrive in the order they were played. Keys already held when a
/// chord is presented don't count for it; only presses after that do.
#[derive(Debug, Default)]
pub struct MidiMatcher {
    held: BTreeSet<MidiNote>,
    state: Option<MatchState>,
}

impl MidiMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.as_ref().map_or(MatchPhase::Idle, |s| s.phase)
    }

    pub fn desired_keys(&self) -> impl Iterator<Item = MidiNote> + '_ {
        self.state.iter().flat_map(|s| s.desired.iter().copied())
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = MidiNote> + '_ {
        self.state.iter().flat_map(|s| s.pressed.iter().copied())
    }

    /// Every key physically down right now, whether it counts for the chord or not.
    pub fn held_keys(&self) -> impl Iterator<Item = MidiNote> + '_ {
        self.held.iter().copied()
    }

    pub fn start_time(&self) -> Option<Instant> {
        self.state.as_ref().map(|s| s.start)
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.start_time()
            .map_or(Duration::ZERO, |start| now.saturating_duration_since(start))
    }

    /// Present a new chord. A chord without keys (a rest) resolves right away.
    pub fn set_desired(
        &mut self,
        desired: impl IntoIterator<Item = MidiNote>,
        now: Instant,
    ) -> Option<MatchSignal> {
        let desired: BTreeSet<MidiNote> = desired.into_iter().collect();
        let is_rest = desired.is_empty();
        log::debug!("Desired keys: {:?}", desired);

        self.state = Some(MatchState {
            desired,
            pressed: BTreeSet::new(),
            wrong: BTreeSet::new(),
            start: now,
            phase: if is_rest {
                MatchPhase::Resolved(Resolution::Success)
            } else {
                MatchPhase::Waiting
            },
        });

        is_rest.then_some(MatchSignal::Success {
            elapsed: Duration::ZERO,
        })
    }

    pub fn handle_event(&mut self, event: NoteEvent, now: Instant) -> Option<MatchSignal> {
        match event.state {
            KeyState::Pressed => self.key_down(event.note, now),
            KeyState::Released => self.key_up(event.note, now),
        }
    }

    fn key_down(&mut self, note: MidiNote, now: Instant) -> Option<MatchSignal> {
        if !self.held.insert(note) {
            // Already down; a repeated note-on changes nothing.
            return None;
        }

        let state = self.state.as_mut()?;
        if matches!(
            state.phase,
            MatchPhase::Idle | MatchPhase::Resolved(Resolution::Success)
        ) {
            return None;
        }
        let elapsed = now.saturating_duration_since(state.start);

        if !state.desired.contains(&note) {
            state.wrong.insert(note);
            state.phase = MatchPhase::Resolved(Resolution::Failure);
            log::debug!("Wrong key {} after {:?}", note, elapsed);
            return Some(MatchSignal::Failure {
                wrong_key: note,
                elapsed,
            });
        }

        state.pressed.insert(note);
        if !state.wrong.is_empty() {
            return None;
        }

        if state.pressed == state.desired {
            state.phase = MatchPhase::Resolved(Resolution::Success);
            log::debug!("Chord matched after {:?}", elapsed);
            Some(MatchSignal::Success { elapsed })
        } else {
            state.phase = MatchPhase::PartiallyMatched;
            None
        }
    }

    fn key_up(&mut self, note: MidiNote, now: Instant) -> Option<MatchSignal> {
        self.held.remove(&note);

        let state = self.state.as_mut()?;
        state.wrong.remove(&note);
        state.pressed.remove(&note);

        match state.phase {
            // The whole chord is still down once the last wrong key lets go.
            MatchPhase::Resolved(Resolution::Failure)
                if state.wrong.is_empty() && state.pressed == state.desired =>
            {
                state.phase = MatchPhase::Resolved(Resolution::Success);
                let elapsed = now.saturating_duration_since(state.start);
                log::debug!("Chord matched after {:?}", elapsed);
                Some(MatchSignal::Success { elapsed })
            }
            MatchPhase::Resolved(Resolution::Failure) if state.wrong.is_empty() => {
                state.phase = if state.pressed.is_empty() {
                    MatchPhase::Waiting
                } else {
                    MatchPhase::PartiallyMatched
                };
                Some(MatchSignal::Resolved)
            }
            MatchPhase::PartiallyMatched if state.pressed.is_empty() => {
                state.phase = MatchPhase::Waiting;
                Some(MatchSignal::Resolved)
            }
            _ => None,
        }
    }
}
