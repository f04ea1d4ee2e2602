//! # ygb-core
//!
//! Host-side runtime for the ygb emulator: the executor thread that paces
//! the opaque core, the controller that drives it from the UI thread, the
//! audio path, save persistence and configuration.

pub mod audio;
pub mod config;
pub mod controller;
pub mod emu;
pub mod executor;
pub mod logger;
pub mod pacing;
pub mod persistence;
pub mod surface;
pub mod telemetry;

pub use config::Config;
pub use controller::{Controller, Stat};
pub use emu::{CoreUpcalls, EmuCore, StepInput, UpdateInput, UpdateResult};
pub use executor::{link, spawn, ClientPorts, Executor, ExecutorHandle, ExecutorOptions, ExecutorPorts};
pub use persistence::SaveStore;
