//! Select Mini V2 command grammar.
//!
//! The printer encodes commands as `/set?cmd={X:...}` with the braces
//! percent-encoded. Requests are decoded once into [`Command`]; any
//! `{C:T...}` or `{C:P...}` frame that is not `0` plus the fixed number of
//! digits decodes to [`Command::MalformedTarget`], which the device
//! acknowledges and ignores.

use std::collections::HashMap;

use axum::extract::Query;
use axum::http::Uri;

use crate::printer::PrintStatus;
use crate::scheduler::Mutation;
use crate::thermal::Heater;

pub const INQUIRY_PATH: &str = "/inquiry";
pub const SET_PATH: &str = "/set";

const HOTEND_PREFIX: &str = "C:T";
const BED_PREFIX: &str = "C:P";
const HOTEND_DIGITS: usize = 3;
const BED_DIGITS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintAction {
    /// `{P:M}`: print the cached model.
    Print,
    /// `{P:X}`
    Cancel,
    /// `{P:P}`
    Pause,
    /// `{P:R}`
    Resume,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Inquiry,
    PrintState(PrintAction),
    SetTarget { heater: Heater, temperature: i32 },
    MalformedTarget(Heater),
    /// `/set?code=...` machine code passthrough.
    RawCode(String),
    Unknown,
}

impl Command {
    pub fn from_uri(uri: &Uri) -> Self {
        match uri.path() {
            INQUIRY_PATH => Command::Inquiry,
            SET_PATH => match Query::<HashMap<String, String>>::try_from_uri(uri) {
                Ok(Query(params)) => Self::from_set_params(&params),
                Err(_) => Command::Unknown,
            },
            _ => Command::Unknown,
        }
    }

    fn from_set_params(params: &HashMap<String, String>) -> Self {
        if let Some(cmd) = params.get("cmd") {
            return Self::parse_cmd(cmd);
        }
        match params.get("code") {
            Some(code) => Command::RawCode(code.clone()),
            None => Command::Unknown,
        }
    }

    /// Decode a `cmd` value such as `{C:T0200}`, already percent-decoded.
    pub fn parse_cmd(cmd: &str) -> Self {
        let Some(body) = cmd.strip_prefix('{') else {
            return Command::Unknown;
        };
        if let Some(payload) = body.strip_prefix(HOTEND_PREFIX) {
            return parse_target(Heater::Hotend, payload, HOTEND_DIGITS);
        }
        if let Some(payload) = body.strip_prefix(BED_PREFIX) {
            return parse_target(Heater::Bed, payload, BED_DIGITS);
        }
        match body {
            "P:M}" => Command::PrintState(PrintAction::Print),
            "P:X}" => Command::PrintState(PrintAction::Cancel),
            "P:P}" => Command::PrintState(PrintAction::Pause),
            "P:R}" => Command::PrintState(PrintAction::Resume),
            _ => Command::Unknown,
        }
    }

    /// Deferred state change this command causes, if any.
    pub fn mutation(&self) -> Option<Mutation> {
        match self {
            Command::PrintState(PrintAction::Print) => {
                Some(Mutation::SetStatus(PrintStatus::Printing))
            }
            Command::PrintState(PrintAction::Cancel) => Some(Mutation::SetStatus(PrintStatus::Idle)),
            Command::SetTarget { heater, temperature } => {
                Some(Mutation::SetTarget(*heater, *temperature))
            }
            // Pause/resume and raw codes are acknowledged but inert.
            Command::PrintState(PrintAction::Pause | PrintAction::Resume)
            | Command::RawCode(_)
            | Command::MalformedTarget(_)
            | Command::Inquiry
            | Command::Unknown => None,
        }
    }
}

/// `payload` is what follows the heater letter: a `0`, exactly `width`
/// digits and the closing brace. Anything else is acknowledged and ignored.
fn parse_target(heater: Heater, payload: &str, width: usize) -> Command {
    let digits = match payload.strip_prefix('0').and_then(|p| p.strip_suffix('}')) {
        Some(digits) if digits.len() == width && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits
        }
        _ => return Command::MalformedTarget(heater),
    };
    match digits.parse() {
        Ok(temperature) => Command::SetTarget { heater, temperature },
        Err(_) => Command::MalformedTarget(heater),
    }
}
