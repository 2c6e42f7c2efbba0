//! Road Traffic Simulation Library
//!
//! Loads events from INI sections, runs the tick loop and writes per-tick
//! reports in the same format.

pub mod ini;
pub mod simulation;
