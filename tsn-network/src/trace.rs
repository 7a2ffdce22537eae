//! Step-by-step record of everything that happened to packets during a simulation
//!
//! The record can be exported as a replay log and checked after the fact by the verifier.

pub mod simulation_step;
pub mod simulation_stepper;
pub mod simulation_verifier;
pub mod stats;
pub mod tracer;
