use crate::error::TrainerError;
use crate::matcher::{KeyState, NoteEvent};
use crate::notes::{MidiNote, NoteVolume};
use crate::session::TrainerEvent;

use crossbeam_channel::Sender;
use midir::{Ignore, MidiInput, MidiInputConnection};

const CLIENT_NAME: &str = "Sight Trainer Client";
const CONNECTION_NAME: &str = "Sight Trainer Input";

/// Note-on / note-off from raw MIDI bytes, any channel. A note-on with velocity 0 is a release.
pub fn decode_message(bytes: &[u8]) -> Option<NoteEvent> {
    let &[status, note, velocity, ..] = bytes else {
        return None;
    };
    if note > 127 {
        return None;
    }

    let state = match (status & 0xF0, velocity) {
        (0x90, 0) | (0x80, _) => KeyState::Released,
        (0x90, _) => KeyState::Pressed,
        _ => return None,
    };
    Some(NoteEvent {
        state,
        note: MidiNote(note),
        velocity: NoteVolume(velocity),
    })
}

/// Keeps the input connection open; events stop when this is dropped.
pub struct MidiInputBackend {
    conn: Option<MidiInputConnection<()>>,
    port_name: Option<String>,
}

impl MidiInputBackend {
    /// Connects to the first input whose name contains `preferred`, or the first input at all.
    /// Having no MIDI device is not an error; `is_available` reports it.
    pub fn connect(
        preferred: Option<&str>,
        events: Sender<TrainerEvent>,
    ) -> Result<Self, TrainerError> {
        let mut midi_in =
            MidiInput::new(CLIENT_NAME).map_err(|e| TrainerError::MidiInput(e.to_string()))?;
        midi_in.ignore(Ignore::All);

        let ports = midi_in.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_default())
            .collect();

        let index = preferred
            .and_then(|wanted| names.iter().position(|n| n.contains(wanted)))
            .or_else(|| (!ports.is_empty()).then_some(0));

        let Some(index) = index else {
            log::info!("No MIDI input ports found");
            return Ok(Self {
                conn: None,
                port_name: None,
            });
        };

        let port_name = names[index].clone();
        log::info!("Connecting to MIDI input: {}", port_name);
        let conn = midi_in
            .connect(
                &ports[index],
                CONNECTION_NAME,
                move |_stamp, message, _| {
                    if let Some(event) = decode_message(message) {
                        let _ = events.send(TrainerEvent::Note(event));
                    }
                },
                (),
            )
            .map_err(|e| TrainerError::MidiInput(e.to_string()))?;

        Ok(Self {
            conn: Some(conn),
            port_name: Some(port_name),
        })
    }

    pub fn is_available(&self) -> bool {
        self.conn.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }
}
