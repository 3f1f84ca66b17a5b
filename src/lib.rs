// THEORY:
// This file is the entry point for the `presence_cam` library crate. The binary
// in `main.rs` is a thin shell around it: parse flags, load configuration, build
// the collaborators, hand them to the `Controller`.
//
// Layering, bottom up:
// - `core_modules`: pure signal processing and decision logic (distance filter,
//   frame differencing, arbiter). No I/O, no clocks they do not get handed.
// - `sensors`, `camera`, `storage`: the hardware-facing collaborators, each behind
//   a trait so tests and bench setups can swap them out.
// - `controller`: the async orchestrator that ties the above together.

pub mod camera;
pub mod config;
pub mod controller;
pub mod core_modules;
pub mod error;
pub mod logging;
pub mod sensors;
pub mod storage;

pub use config::AppConfig;
pub use controller::Controller;
pub use error::{CamError, Result};
