// src/printer.rs - Simulated printer state shared by handlers and background tasks
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, broadcast};

use crate::config::ThermalConfig;
use crate::thermal::{self, Heater};

/// Print job status as reported by the inquiry flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStatus {
    Idle,
    Printing,
}

impl PrintStatus {
    pub fn flag(self) -> char {
        match self {
            PrintStatus::Idle => 'I',
            PrintStatus::Printing => 'P',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterState {
    pub status: PrintStatus,
    pub hotend_temperature: i32,
    pub target_hotend_temperature: i32,
    pub bed_temperature: i32,
    pub target_bed_temperature: i32,
    pub progress: u8,
}

impl PrinterState {
    pub fn new(room_temperature: i32) -> Self {
        Self {
            status: PrintStatus::Idle,
            hotend_temperature: room_temperature,
            target_hotend_temperature: 0,
            bed_temperature: room_temperature,
            target_bed_temperature: 0,
            progress: 0,
        }
    }

    pub fn temperature(&self, heater: Heater) -> i32 {
        match heater {
            Heater::Hotend => self.hotend_temperature,
            Heater::Bed => self.bed_temperature,
        }
    }

    pub fn target(&self, heater: Heater) -> i32 {
        match heater {
            Heater::Hotend => self.target_hotend_temperature,
            Heater::Bed => self.target_bed_temperature,
        }
    }

    fn temperature_mut(&mut self, heater: Heater) -> &mut i32 {
        match heater {
            Heater::Hotend => &mut self.hotend_temperature,
            Heater::Bed => &mut self.bed_temperature,
        }
    }

    fn target_mut(&mut self, heater: Heater) -> &mut i32 {
        match heater {
            Heater::Hotend => &mut self.target_hotend_temperature,
            Heater::Bed => &mut self.target_bed_temperature,
        }
    }
}

/// Inquiry wire format: `T{hotend}/{target}P{bed}/{target}/{progress}{I|P}`.
impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T{}/{}P{}/{}/{}{}",
            self.hotend_temperature,
            self.target_hotend_temperature,
            self.bed_temperature,
            self.target_bed_temperature,
            self.progress,
            self.status.flag()
        )
    }
}

struct Simulation {
    state: PrinterState,
    rng: StdRng,
    converging: [bool; 2],
    shut_down: bool,
}

struct Shared {
    sim: Mutex<Simulation>,
    thermal: ThermalConfig,
    shutdown_tx: broadcast::Sender<()>,
}

/// Handle to the one simulated printer. Clones share the same state.
#[derive(Clone)]
pub struct Printer {
    inner: Arc<Shared>,
}

impl Printer {
    pub fn new(thermal: ThermalConfig) -> Self {
        Self::with_rng(thermal, StdRng::from_os_rng())
    }

    /// Deterministic noise, for reproducible runs and tests.
    pub fn with_seed(thermal: ThermalConfig, seed: u64) -> Self {
        Self::with_rng(thermal, StdRng::seed_from_u64(seed))
    }

    fn with_rng(thermal: ThermalConfig, rng: StdRng) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let sim = Simulation {
            state: PrinterState::new(thermal.room_temperature),
            rng,
            converging: [false; 2],
            shut_down: false,
        };
        Self {
            inner: Arc::new(Shared {
                sim: Mutex::new(sim),
                thermal,
                shutdown_tx,
            }),
        }
    }

    pub fn thermal(&self) -> &ThermalConfig {
        &self.inner.thermal
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.inner.shutdown_tx.subscribe()
    }

    /// Ambient drift on both heaters. Runs once per inbound request.
    pub async fn tick(&self) {
        let config = &self.inner.thermal;
        let mut sim = self.inner.sim.lock().await;
        let Simulation { state, rng, .. } = &mut *sim;
        for heater in Heater::ALL {
            let delta = rng.random_range(-config.ambient_drift..=config.ambient_drift);
            let current = state.temperature_mut(heater);
            *current = thermal::clamp_to_floor(*current + delta, config.floor());
        }
    }

    pub async fn set_status(&self, status: PrintStatus) {
        let mut sim = self.inner.sim.lock().await;
        if sim.state.status != status {
            tracing::info!("Printer status: {:?} -> {:?}", sim.state.status, status);
        }
        sim.state.status = status;
    }

    /// Overwrite a heater's target and make sure its convergence task runs.
    pub async fn set_target(&self, heater: Heater, temperature: i32) {
        let shutdown_rx = {
            let mut sim = self.inner.sim.lock().await;
            *sim.state.target_mut(heater) = temperature;
            tracing::info!("Setting {} target temperature: {}", heater, temperature);
            if sim.converging[heater.index()] || sim.shut_down {
                None
            } else {
                sim.converging[heater.index()] = true;
                // Subscribed under the lock so a concurrent shutdown() is seen.
                Some(self.subscribe_shutdown())
            }
        };
        if let Some(shutdown_rx) = shutdown_rx {
            thermal::spawn_convergence(self.clone(), heater, shutdown_rx);
        }
    }

    pub async fn set_target_hotend(&self, temperature: i32) {
        self.set_target(Heater::Hotend, temperature).await;
    }

    pub async fn set_target_bed(&self, temperature: i32) {
        self.set_target(Heater::Bed, temperature).await;
    }

    /// One convergence period for `heater`, against its current target.
    pub async fn converge(&self, heater: Heater) {
        let config = &self.inner.thermal;
        let mut sim = self.inner.sim.lock().await;
        let Simulation { state, rng, .. } = &mut *sim;
        let step = rng.random_range(0..=config.convergence_max_step);
        let target = state.target(heater);
        let current = state.temperature_mut(heater);
        *current = thermal::converge_step(*current, target, step, config.floor());
    }

    pub async fn snapshot(&self) -> PrinterState {
        self.inner.sim.lock().await.state.clone()
    }

    /// Rendered status for `/inquiry`.
    pub async fn inquiry(&self) -> String {
        self.inner.sim.lock().await.state.to_string()
    }

    pub async fn is_converging(&self, heater: Heater) -> bool {
        self.inner.sim.lock().await.converging[heater.index()]
    }

    /// Stop every background task bound to this printer.
    pub async fn shutdown(&self) {
        self.inner.sim.lock().await.shut_down = true;
        let _ = self.inner.shutdown_tx.send(());
        tracing::info!("Printer simulation shut down");
    }
}
