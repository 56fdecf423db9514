//! Audio module - engine seam and transport control
//!
//! - `engine`: traits the platform audio engine is driven through
//! - `transport`: the controller that owns the single live sound
//! - `rodio_backend`: engine implementation on top of `rodio`

mod engine;
mod transport;
mod rodio_backend;

#[cfg(test)]
pub(crate) mod fake;

pub use transport::{LocalResolver, Progress, TransportController, TransportEvent};
pub use rodio_backend::RodioEngine;
