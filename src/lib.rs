#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::missing_panics_doc,
    clippy::similar_names
)]

pub mod app;
pub mod clustering;
pub mod config;
pub mod dataset;
pub mod error;
pub mod observability;
pub mod profile;
pub mod recommend;

pub use error::{EngineError, EngineResult};
