//! Query reconciliation pipeline
//!
//! The pipeline ties user intent to the two dependent streams. Incoming
//! actions and stream deliveries are funneled through a single [`Event`]
//! queue into the [`Controller`], which owns a [`Stage`] per stream and
//! re-derives both from the current desired keys after every event.

pub mod controller;
pub mod display;
pub mod events;
pub mod opener;
pub mod stage;

#[cfg(test)]
mod controller_tests;

pub use controller::Controller;
pub use display::{DisplayState, StageView};
pub use events::Event;
pub use opener::{HttpStreamOpener, StreamOpener};
pub use stage::Stage;
