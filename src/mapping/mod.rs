//! Translation of keyboard and mouse input into virtual controller state.
//!
//! - [`button`] - logical controller buttons and their dispatch categories
//! - [`lookup`] - reverse `KeyCode -> LogicalButton` table per slot
//! - [`stick`] - keyboard and mouse driven analog stick math
//! - [`engine`] - the feeder engine tying it all to the virtual bus

pub mod button;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod stick;

pub use button::{LogicalButton, Stick};
pub use engine::{EngineStats, FeederEngine};
pub use error::FeederError;
