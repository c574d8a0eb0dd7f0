use crate::matcher::{KeyState, NoteEvent};
use crate::notes::{Interval, MidiNote};
use crate::session::{DebugAction, TrainerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiKey {
    Char(char),
    OctaveUp,
    OctaveDown,
}

// Tracker-style layout: the bottom letter row is the white keys, the row above the black keys.
const KEYBOARD_ROW: [char; 13] = [
    'z', 's', 'x', 'd', 'c', 'v', 'g', 'b', 'h', 'n', 'j', 'm', ',',
];

/// On-screen or computer-keyboard substitute for a MIDI instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualKeyboard {
    base: MidiNote,
    debug: bool,
}

impl VirtualKeyboard {
    pub fn new(base: MidiNote) -> Self {
        Self { base, debug: false }
    }

    /// Also map `t` and `f` to simulated success and failure.
    pub fn with_debug(self, debug: bool) -> Self {
        Self { debug, ..self }
    }

    pub fn base(&self) -> MidiNote {
        self.base
    }

    /// Handles octave shifts itself; returns the event for everything that reaches the trainer.
    pub fn handle(&mut self, state: KeyState, key: UiKey) -> Option<TrainerEvent> {
        match key {
            UiKey::OctaveUp | UiKey::OctaveDown => {
                if state == KeyState::Pressed {
                    let octave = Interval::OCTAVE.semitones();
                    let shift = if key == UiKey::OctaveUp { octave } else { -octave };
                    if let Some(base) = self.base.checked_add(shift) {
                        if base.checked_add(octave).is_some() {
                            self.base = base;
                        }
                    }
                }
                None
            }
            UiKey::Char(c) => self.key_event(state, c),
        }
    }

    fn key_event(&self, state: KeyState, c: char) -> Option<TrainerEvent> {
        if let Some(action) = self.debug_action(c) {
            // Debug actions fire on release.
            return (state == KeyState::Released).then_some(TrainerEvent::Debug(action));
        }

        let offset = KEYBOARD_ROW.iter().position(|&k| k == c)?;
        let note = self.base.checked_add(offset as i16)?;
        Some(TrainerEvent::Note(match state {
            KeyState::Pressed => NoteEvent::down(note),
            KeyState::Released => NoteEvent::up(note),
        }))
    }

    fn debug_action(&self, c: char) -> Option<DebugAction> {
        match (self.debug, c) {
            (true, 't') => Some(DebugAction::Success),
            (true, 'f') => Some(DebugAction::Failure),
            _ => None,
        }
    }
}

impl Default for VirtualKeyboard {
    fn default() -> Self {
        Self::new(MidiNote(60))
    }
}
