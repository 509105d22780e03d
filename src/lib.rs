//! sidgrid: a three-voice chip sequencer.
//!
//! The grid and voice settings live in [`pipeline::project::Project`]. Live
//! playback goes through [`pipeline::transport::Transport`] into the cpal
//! engine in [`audio`]; [`pipeline::render::OfflineRenderer`] runs the same
//! synth against a virtual clock for WAV export.

pub mod audio;
pub mod audio_api;
pub mod config;
pub mod error;
pub mod middle;
pub mod pipeline;
pub mod shared;
pub mod tui;

pub use audio_api::{AudioCommand, AudioOut, TriggerParams};
pub use config::Config;
pub use error::{ExportError, GridShapeError, OverlapError, ProjectError};
pub use pipeline::grid::Grid;
pub use pipeline::project::Project;
