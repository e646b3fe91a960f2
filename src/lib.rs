//! Emulator of the Monoprice Select Mini V2 HTTP control API.
//!
//! Clients poll `/inquiry` and send fire-and-forget `/set?cmd=...` commands;
//! effects show up on later polls after the device's command latency.

pub mod config;
pub mod printer;
pub mod protocol;
pub mod scheduler;
pub mod server;
pub mod thermal;
pub mod web;

pub use config::{Config, ConfigError};
pub use printer::{PrintStatus, Printer, PrinterState};
pub use protocol::{Command, PrintAction};
pub use scheduler::{Mutation, Scheduler};
pub use server::ServerError;
pub use thermal::Heater;
