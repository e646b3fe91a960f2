//! The web module for handling the Axum API.
//! This file declares the other files in this directory as sub-modules.

pub mod api;
pub mod upload;

/// Static page served for any GET the printer does not understand.
pub const HELP_PAGE: &str = include_str!("help.html");
