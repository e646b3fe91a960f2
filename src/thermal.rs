//! Heater convergence simulation.
//!
//! Each heater gets at most one convergence task, started by the first target
//! it receives. The task wakes every convergence period, reads the live target
//! and nudges the current temperature toward it by a random step. It never
//! finishes on its own; only the printer shutdown broadcast stops it.

use std::fmt;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::printer::Printer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heater {
    Hotend,
    Bed,
}

impl Heater {
    pub const ALL: [Heater; 2] = [Heater::Hotend, Heater::Bed];

    pub(crate) fn index(self) -> usize {
        match self {
            Heater::Hotend => 0,
            Heater::Bed => 1,
        }
    }
}

impl fmt::Display for Heater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Heater::Hotend => f.write_str("hotend"),
            Heater::Bed => f.write_str("bed"),
        }
    }
}

pub fn clamp_to_floor(temperature: i32, floor: i32) -> i32 {
    temperature.max(floor)
}

/// Move `current` by `step` toward `target`. At or below target heats,
/// above target cools, so the reading jitters around the goal once reached.
pub fn converge_step(current: i32, target: i32, step: i32, floor: i32) -> i32 {
    let next = if current <= target {
        current + step
    } else {
        current - step
    };
    clamp_to_floor(next, floor)
}

pub(crate) fn spawn_convergence(
    printer: Printer,
    heater: Heater,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let period = printer.thermal().convergence_period();
    tracing::debug!("Starting {} convergence every {:?}", heater, period);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::debug!("{} convergence loop shutting down", heater);
                    break;
                }
                _ = interval.tick() => {
                    printer.converge(heater).await;
                }
            }
        }
    })
}
