//! # shuttle-sim-server
//!
//! The simulation engine behind the shuttle telemetry stream: loads a
//! route and its stops, expands them into a dense travel path, and steps
//! through that path on a clock, publishing position, trip and door events
//! to a WebSocket broadcast channel and a document store. A small HTTP
//! control surface starts, pauses, resumes, stops and inspects the run.

pub mod config;
pub mod error;
pub mod routes;
pub mod simulator;
pub mod sink;
pub mod source;
