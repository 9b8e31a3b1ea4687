//! Shared test mocks and utilities for the Reefbook booking platform.

mod clock;
mod directory;

pub use clock::FixedClock;
pub use directory::{FailingDirectory, StaticDirectory};
