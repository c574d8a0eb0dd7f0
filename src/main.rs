//! # Sight Trainer
//!
//! Terminal front end for the sight-reading trainer.
//!
//! ## Functionality
//! * **Exercise**: Prints a key signature and a bar for each staff, and marks the chord to play.
//! * **Input**: Listens to the first MIDI input port (or the one named in the settings file).
//!     Without an instrument, type the sounding notes of the chord (`C4 E4 G4`) and press Enter.
//! * **Computer keyboard**: `k zcb` plays the keys of the tracker-style row `zsxdcvgbhnjm,`.
//!     `<` and `>` shift the row by an octave.
//! * **Debug**: With `--debug`, the lines `t` and `f` count as a played or a missed chord.
//!
//! Set `RUST_LOG=debug` to follow the matcher.

use sight_trainer::chord::Clef;
use sight_trainer::input_map::{UiKey, VirtualKeyboard};
use sight_trainer::matcher::{KeyState, NoteEvent};
use sight_trainer::midi_input::MidiInputBackend;
use sight_trainer::notes::MidiNote;
use sight_trainer::report::{dispatch_effects, LogAnalytics, StatisticLog};
use sight_trainer::session::{SessionEffects, TrainerEvent, TrainingSession};
use sight_trainer::settings;

use crossbeam_channel::{select, unbounded, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::io::BufRead;
use std::time::Instant;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let debug = std::env::args().any(|a| a == "--debug");
    let settings = settings::load_settings();
    // Writes the defaults out on first run so the file can be edited.
    settings::save_settings(&settings);

    let mut session = TrainingSession::new(settings.clone(), StdRng::from_entropy(), Instant::now())?;

    let (event_tx, event_rx) = unbounded::<TrainerEvent>();
    let (quit_tx, quit_rx) = unbounded::<()>();

    // Keep the connection alive for the whole run.
    let midi = match MidiInputBackend::connect(settings.midi_input.as_deref(), event_tx.clone()) {
        Ok(midi) => Some(midi),
        Err(e) => {
            log::error!("{e}");
            None
        }
    };
    match midi
        .as_ref()
        .filter(|m| m.is_available())
        .and_then(|m| m.port_name())
    {
        Some(name) => println!("Listening to MIDI input '{name}'. Type q to quit."),
        None => println!(
            "No MIDI input found. Type the notes to play (e.g. `C4 E4 G4`) and press Enter. Type q to quit."
        ),
    }

    std::thread::spawn(move || read_stdin(event_tx, quit_tx, debug));

    let mut statistics = StatisticLog::new();
    let mut analytics = LogAnalytics;
    print_state(&session);

    loop {
        select! {
            recv(event_rx) -> event => {
                let Ok(event) = event else { break };
                let effects = match session.handle_event(event, Instant::now()) {
                    Ok(effects) => effects,
                    Err(e) => {
                        log::error!("Could not continue the exercise: {e}");
                        continue;
                    }
                };
                dispatch_effects(&effects, &mut statistics, &mut analytics);
                show_effects(&effects);
                if effects.redraw {
                    print_state(&session);
                }
            }
            recv(quit_rx) -> _ => break,
        }
    }

    println!(
        "\n{} chords played, {} mistakes.",
        statistics.successes(),
        statistics.failures()
    );
    if let Some(mean) = statistics.mean_success_time() {
        println!("Average time per chord: {:.1}s", mean.as_secs_f64());
    }
    Ok(())
}

// Each line is one chord: all keys go down, then up again.
fn read_stdin(events: Sender<TrainerEvent>, quit: Sender<()>, debug: bool) {
    let mut keyboard = VirtualKeyboard::default().with_debug(debug);
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();

        let keys: Vec<UiKey> = match line {
            "q" | "quit" => break,
            "t" => vec![UiKey::Char('t')],
            "f" => vec![UiKey::Char('f')],
            "<" => vec![UiKey::OctaveDown],
            ">" => vec![UiKey::OctaveUp],
            _ => match line.strip_prefix("k ") {
                Some(row) => row.chars().filter(|c| !c.is_whitespace()).map(UiKey::Char).collect(),
                None => {
                    send_note_names(&events, line);
                    continue;
                }
            },
        };

        let mut releases = Vec::new();
        for &key in &keys {
            if let Some(event) = keyboard.handle(KeyState::Pressed, key) {
                let _ = events.send(event);
            }
        }
        for &key in &keys {
            if let Some(event) = keyboard.handle(KeyState::Released, key) {
                releases.push(event);
            }
        }
        for event in releases {
            let _ = events.send(event);
        }
        if matches!(line, "<" | ">") {
            println!("Keyboard row starts at {}", keyboard.base());
        }
    }
    let _ = quit.send(());
}

fn send_note_names(events: &Sender<TrainerEvent>, line: &str) {
    let keys: Result<Vec<MidiNote>, _> = line.split_whitespace().map(str::parse).collect();
    match keys {
        Ok(keys) => {
            for &k in &keys {
                let _ = events.send(TrainerEvent::Note(NoteEvent::down(k)));
            }
            for &k in &keys {
                let _ = events.send(TrainerEvent::Note(NoteEvent::up(k)));
            }
        }
        Err(e) => println!("{e}"),
    }
}

fn show_effects(effects: &SessionEffects) {
    for error in &effects.errors {
        println!("! {error}");
    }
    if effects.play_success_sound {
        println!("\u{7}Correct!");
    }
}

fn print_state<R: Rng>(session: &TrainingSession<R>) {
    let key = session.key_signature();
    let overrides: Vec<String> = key
        .overrides()
        .iter()
        .map(|(letter, accidental)| format!("{}{}", letter.name(), accidental.symbol()))
        .collect();

    println!();
    if overrides.is_empty() {
        println!("Key signature: {key}");
    } else {
        println!("Key signature: {key} ({})", overrides.join(" "));
    }

    for clef in Clef::ALL {
        let cells: Vec<String> = session
            .bars()
            .bar(clef)
            .chords
            .iter()
            .enumerate()
            .map(|(i, chord)| {
                if i == session.chord_index() {
                    format!(">{chord}<")
                } else {
                    chord.to_string()
                }
            })
            .collect();
        println!("{:>6}: {}", clef.name(), cells.join("  "));
    }

    if let Some(error) = session.error() {
        println!("! {error}");
    }
}
