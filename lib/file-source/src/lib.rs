//! Positioned file tailer, tailer factory, and file-backed producer
//! (components B, C, D).

mod error;
mod factory;
mod input;
mod line;
mod watcher;

pub use error::Error;
pub use factory::{FactoryConfig, Line, StartPolicy, TailerFactory};
pub use input::{default_line_decoder, FileInput};
pub use watcher::{StartFrom, Tailer, TailerConfig, TailerListener};
