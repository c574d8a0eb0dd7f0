pub mod bar_generator;
pub mod chord;
pub mod error;
pub mod input_map;
pub mod matcher;
pub mod notes;
pub mod report;
pub mod session;
pub mod settings;
pub mod theory;

#[cfg(feature = "midi")]
pub mod midi_input;
