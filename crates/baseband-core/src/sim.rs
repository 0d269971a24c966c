//! # Simulated Hardware
//!
//! Hosted implementations of the driver traits in [`crate::hal`], so the
//! whole core runs off target.
//!
//! Each simulated engine owns a fixed pool of transfers that cycle through
//! two crossbeam channels:
//!
//! ```text
//!            ┌──────── complete (clock thread or step()) ────────┐
//!            │                                                   ▼
//!       free pool                                         completion queue
//!            ▲                                                   │
//!            └──────────── release() ◄── runtime thread ◄── wait_*()
//! ```
//!
//! If the runtime thread falls behind, the pool runs dry and the clock
//! counts an overrun instead of completing a transfer, which is what sample
//! loss looks like on target. Halting drops the halt channel's sender, so
//! every blocked `wait_*` returns `None`.
//!
//! ## Example
//!
//! ```rust
//! use baseband_core::config::RuntimeConfig;
//! use baseband_core::hal::BasebandDma;
//! use baseband_core::sim::{RxSource, SimulatedHardware};
//! use baseband_core::types::Direction;
//!
//! let sim = SimulatedHardware::new(&RuntimeConfig::stepped(), RxSource::Silence);
//! sim.dma.init().unwrap();
//! sim.dma.enable(Direction::Receive);
//! assert_eq!(sim.dma.step(1), 1);
//! let transfer = sim.dma.wait_for_rx_buffer().unwrap();
//! assert_eq!(transfer.samples.len(), 2048);
//! sim.dma.release(transfer);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, select, Receiver, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::{RuntimeConfig, SimPacing};
use crate::dds::PhaseAccumulator;
use crate::error::{BasebandError, Result};
use crate::hal::{
    AudioOutput, BasebandDma, BufferGeometry, DmaTransfer, Hardware, RssiSampler, RssiTransfer,
    Transfer,
};
use crate::types::{buffer_period, Direction, Iq8};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a simulated engine completes transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One transfer per interval
    Interval(Duration),
    /// A transfer as soon as one is free
    FreeRunning,
    /// Only when `step` is called
    Stepped,
}

/// Fills completed receive transfers.
trait Fill<T>: Send {
    fn fill(&mut self, samples: &mut [T]);
}

/// Receive-side signal of the simulated DMA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RxSource {
    /// All-zero samples
    Silence,
    /// Uniform noise in ±`amplitude`, seeded
    Noise { amplitude: i8, seed: u64 },
    /// Full-scale complex tone at `frequency` Hz offset
    Tone { frequency: f64, sampling_rate: f64 },
}

struct RxGenerator {
    source: RxSource,
    rng: StdRng,
    tone: PhaseAccumulator,
}

impl RxGenerator {
    fn new(source: RxSource) -> Self {
        let seed = match source {
            RxSource::Noise { seed, .. } => seed,
            _ => 0,
        };
        Self {
            source,
            rng: StdRng::seed_from_u64(seed),
            tone: PhaseAccumulator::new(),
        }
    }
}

impl Fill<Iq8> for RxGenerator {
    fn fill(&mut self, samples: &mut [Iq8]) {
        match self.source {
            RxSource::Silence => samples.fill(Iq8::new(0, 0)),
            RxSource::Noise { amplitude, .. } => {
                let a = amplitude.unsigned_abs() as i16;
                for s in samples.iter_mut() {
                    let re = self.rng.gen_range(-a..=a) as i8;
                    let im = self.rng.gen_range(-a..=a) as i8;
                    *s = Iq8::new(re, im);
                }
            }
            RxSource::Tone {
                frequency,
                sampling_rate,
            } => {
                let inc = PhaseAccumulator::increment_for(frequency, sampling_rate);
                for s in samples.iter_mut() {
                    *s = Iq8::new(self.tone.cosine(), self.tone.sine());
                    self.tone.advance(inc);
                }
            }
        }
    }
}

struct RssiGenerator {
    level: u8,
    spread: u8,
    rng: StdRng,
}

impl Fill<u8> for RssiGenerator {
    fn fill(&mut self, samples: &mut [u8]) {
        let lo = self.level.saturating_sub(self.spread);
        let hi = self.level.saturating_add(self.spread);
        for s in samples.iter_mut() {
            *s = self.rng.gen_range(lo..=hi);
        }
    }
}

#[derive(Debug)]
struct EngineState {
    enabled: bool,
    direction: Direction,
    transfer_samples: usize,
    sequence: u64,
}

/// Transfer pool, completion queue and clock shared by the simulated
/// engines.
struct Engine<T> {
    name: &'static str,
    transfers: usize,
    free: (Sender<Transfer<T>>, Receiver<Transfer<T>>),
    done: (Sender<Transfer<T>>, Receiver<Transfer<T>>),
    halt_tx: Mutex<Option<Sender<()>>>,
    halt_rx: Receiver<()>,
    halted: AtomicBool,
    allocated: AtomicBool,
    state: Mutex<EngineState>,
    filler: Mutex<Box<dyn Fill<T>>>,
    overruns: AtomicU64,
    completed: AtomicU64,
}

impl<T: Copy + Default + Send + 'static> Engine<T> {
    fn new(
        name: &'static str,
        geometry: BufferGeometry,
        direction: Direction,
        filler: Box<dyn Fill<T>>,
    ) -> Self {
        let (halt_tx, halt_rx) = channel::bounded(0);
        Self {
            name,
            transfers: geometry.transfers,
            free: channel::unbounded(),
            done: channel::unbounded(),
            halt_tx: Mutex::new(Some(halt_tx)),
            halt_rx,
            halted: AtomicBool::new(false),
            allocated: AtomicBool::new(false),
            state: Mutex::new(EngineState {
                enabled: false,
                direction,
                transfer_samples: geometry.transfer_samples,
                sequence: 0,
            }),
            filler: Mutex::new(filler),
            overruns: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    fn allocate(&self) -> Result<()> {
        let samples = lock(&self.state).transfer_samples;
        if self.transfers == 0 || samples == 0 {
            return Err(BasebandError::DmaInit(format!(
                "{}: empty buffer geometry ({} x {})",
                self.name, self.transfers, samples
            )));
        }
        if self.allocated.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for _ in 0..self.transfers {
            let transfer = Transfer {
                samples: vec![T::default(); samples].into_boxed_slice(),
                direction: Direction::Receive,
                sequence: 0,
            };
            // Both ends are owned by self, the channel cannot be closed.
            let _ = self.free.0.send(transfer);
        }
        debug!(engine = self.name, transfers = self.transfers, samples, "transfers allocated");
        Ok(())
    }

    fn set_enabled(&self, enabled: bool, direction: Option<Direction>) {
        let mut state = lock(&self.state);
        state.enabled = enabled;
        if let Some(direction) = direction {
            state.direction = direction;
        }
    }

    fn configure(&self, transfer_samples: usize, direction: Direction) {
        let mut state = lock(&self.state);
        state.transfer_samples = transfer_samples;
        state.direction = direction;
    }

    fn is_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    /// Complete `transfer` if the engine is running; otherwise return it to
    /// the pool.
    fn complete(&self, mut transfer: Transfer<T>) -> bool {
        let (enabled, direction, samples, sequence) = {
            let mut state = lock(&self.state);
            if state.enabled {
                state.sequence += 1;
            }
            (state.enabled, state.direction, state.transfer_samples, state.sequence)
        };
        if !enabled || self.halted.load(Ordering::Acquire) {
            let _ = self.free.0.send(transfer);
            return false;
        }

        if transfer.samples.len() != samples {
            transfer.samples = vec![T::default(); samples].into_boxed_slice();
        }
        if direction == Direction::Receive {
            lock(&self.filler).fill(&mut transfer.samples);
        }
        transfer.direction = direction;
        transfer.sequence = sequence;

        self.completed.fetch_add(1, Ordering::Relaxed);
        let _ = self.done.0.send(transfer);
        true
    }

    /// One clock tick: complete a free transfer or count an overrun.
    fn tick(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        match self.free.1.try_recv() {
            Ok(transfer) => self.complete(transfer),
            Err(_) => {
                let overruns = self.overruns.fetch_add(1, Ordering::Relaxed) + 1;
                if overruns.is_power_of_two() {
                    warn!(engine = self.name, overruns, "no free transfer, samples lost");
                }
                false
            }
        }
    }

    fn wait(&self) -> Option<Transfer<T>> {
        if self.halted.load(Ordering::Acquire) {
            return None;
        }
        let transfer = select! {
            recv(self.done.1) -> t => t.ok(),
            recv(self.halt_rx) -> _ => None,
        };
        match transfer {
            Some(t) if self.halted.load(Ordering::Acquire) => {
                self.release(t);
                None
            }
            other => other,
        }
    }

    fn release(&self, transfer: Transfer<T>) {
        let _ = self.free.0.send(transfer);
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::Release);
        self.set_enabled(false, None);
        lock(&self.halt_tx).take();
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Whether every transfer is back in the free pool.
    fn is_idle(&self) -> bool {
        self.done.1.is_empty() && self.free.1.len() == self.transfers
    }

    fn spawn_clock(self: &Arc<Self>, pacing: Pacing) -> Option<JoinHandle<()>> {
        let engine = Arc::clone(self);
        let spawned = match pacing {
            Pacing::Stepped => return None,
            Pacing::Interval(period) => std::thread::Builder::new()
                .name(format!("{}-clock", self.name))
                .spawn(move || engine.run_interval(period)),
            Pacing::FreeRunning => std::thread::Builder::new()
                .name(format!("{}-clock", self.name))
                .spawn(move || engine.run_free()),
        };
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(engine = self.name, "clock thread not started: {}", e);
                None
            }
        }
    }

    fn run_interval(&self, period: Duration) {
        let period = period.max(Duration::from_micros(10));
        let mut next = Instant::now() + period;
        loop {
            let timeout = next.saturating_duration_since(Instant::now());
            select! {
                recv(self.halt_rx) -> _ => break,
                default(timeout) => {}
            }
            self.tick();
            next += period;
        }
    }

    fn run_free(&self) {
        loop {
            select! {
                recv(self.halt_rx) -> _ => break,
                recv(self.free.1) -> t => {
                    let Ok(transfer) = t else { break };
                    if !self.complete(transfer) {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                }
            }
        }
    }
}

/// Simulated baseband DMA engine.
pub struct SimulatedDma {
    engine: Arc<Engine<Iq8>>,
    pacing: Pacing,
    fail_init: bool,
    geometry: Mutex<BufferGeometry>,
    clock: Mutex<Option<JoinHandle<()>>>,
    capture: Mutex<Option<Vec<Iq8>>>,
    capture_limit: usize,
}

impl SimulatedDma {
    pub fn new(geometry: BufferGeometry, pacing: Pacing, source: RxSource) -> Self {
        Self {
            engine: Arc::new(Engine::new(
                "dma",
                geometry,
                Direction::Receive,
                Box::new(RxGenerator::new(source)),
            )),
            pacing,
            fail_init: false,
            geometry: Mutex::new(geometry),
            clock: Mutex::new(None),
            capture: Mutex::new(None),
            capture_limit: 0,
        }
    }

    /// Make `init` fail, as a DMA controller that cannot be brought up.
    pub fn with_init_failure(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Record released transmit transfers, up to `limit` samples.
    pub fn with_tx_capture(mut self, limit: usize) -> Self {
        self.capture = Mutex::new(Some(Vec::new()));
        self.capture_limit = limit;
        self
    }

    /// Complete up to `n` transfers by hand. Returns how many completed.
    pub fn step(&self, n: usize) -> usize {
        (0..n).filter(|_| self.engine.tick()).count()
    }

    /// Poll until every transfer has been released back, or `timeout`.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.engine.is_idle() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_micros(100));
        }
        true
    }

    /// Take the captured transmit samples.
    pub fn take_captured(&self) -> Vec<Iq8> {
        lock(&self.capture)
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub fn geometry(&self) -> BufferGeometry {
        *lock(&self.geometry)
    }

    pub fn direction(&self) -> Direction {
        lock(&self.engine.state).direction
    }

    pub fn overruns(&self) -> u64 {
        self.engine.overruns.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.engine.completed.load(Ordering::Relaxed)
    }

    pub fn is_halted(&self) -> bool {
        self.engine.is_halted()
    }
}

impl BasebandDma for SimulatedDma {
    fn init(&self) -> Result<()> {
        if self.fail_init {
            return Err(BasebandError::DmaInit("simulated controller fault".to_string()));
        }
        self.engine.allocate()?;
        let mut clock = lock(&self.clock);
        if clock.is_none() {
            *clock = self.engine.spawn_clock(self.pacing);
        }
        Ok(())
    }

    fn configure(&self, geometry: BufferGeometry, direction: Direction) {
        *lock(&self.geometry) = geometry;
        self.engine.configure(geometry.transfer_samples, direction);
    }

    fn enable(&self, direction: Direction) {
        self.engine.set_enabled(true, Some(direction));
    }

    fn disable(&self) {
        self.engine.set_enabled(false, None);
    }

    fn is_enabled(&self) -> bool {
        self.engine.is_enabled()
    }

    fn wait_for_rx_buffer(&self) -> Option<DmaTransfer> {
        self.engine.wait()
    }

    fn wait_for_tx_buffer(&self) -> Option<DmaTransfer> {
        self.engine.wait()
    }

    fn release(&self, transfer: DmaTransfer) {
        if transfer.direction == Direction::Transmit {
            if let Some(captured) = lock(&self.capture).as_mut() {
                let room = self.capture_limit.saturating_sub(captured.len());
                let n = room.min(transfer.samples.len());
                captured.extend_from_slice(&transfer.samples[..n]);
            }
        }
        self.engine.release(transfer);
    }

    fn halt(&self) {
        self.engine.halt();
        if let Some(handle) = lock(&self.clock).take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for SimulatedDma {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDma")
            .field("pacing", &self.pacing)
            .field("geometry", &self.geometry())
            .field("completed", &self.completed())
            .field("overruns", &self.overruns())
            .finish()
    }
}

/// Simulated RSSI sampler producing readings around a fixed level.
pub struct SimulatedRssi {
    engine: Arc<Engine<u8>>,
    pacing: Pacing,
    clock: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedRssi {
    pub fn new(geometry: BufferGeometry, pacing: Pacing, level: u8, spread: u8) -> Self {
        Self {
            engine: Arc::new(Engine::new(
                "rssi",
                geometry,
                Direction::Receive,
                Box::new(RssiGenerator {
                    level,
                    spread,
                    rng: StdRng::seed_from_u64(0x5255),
                }),
            )),
            pacing,
            clock: Mutex::new(None),
        }
    }

    pub fn step(&self, n: usize) -> usize {
        (0..n).filter(|_| self.engine.tick()).count()
    }

    pub fn completed(&self) -> u64 {
        self.engine.completed.load(Ordering::Relaxed)
    }
}

impl RssiSampler for SimulatedRssi {
    fn init(&self) -> Result<()> {
        self.engine
            .allocate()
            .map_err(|e| BasebandError::RssiInit(e.to_string()))?;
        let mut clock = lock(&self.clock);
        if clock.is_none() {
            *clock = self.engine.spawn_clock(self.pacing);
        }
        Ok(())
    }

    fn start(&self) {
        self.engine.set_enabled(true, None);
    }

    fn stop(&self) {
        self.engine.set_enabled(false, None);
    }

    fn is_running(&self) -> bool {
        self.engine.is_enabled()
    }

    fn wait_for_buffer(&self) -> Option<RssiTransfer> {
        self.engine.wait()
    }

    fn release(&self, transfer: RssiTransfer) {
        self.engine.release(transfer);
    }

    fn halt(&self) {
        self.engine.halt();
        if let Some(handle) = lock(&self.clock).take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for SimulatedRssi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedRssi")
            .field("pacing", &self.pacing)
            .field("running", &self.is_running())
            .field("completed", &self.completed())
            .finish()
    }
}

/// Audio sink that counts what it is given.
#[derive(Debug)]
pub struct SimulatedAudio {
    muted: AtomicBool,
    samples_written: AtomicU64,
    blocks_written: AtomicU64,
}

impl Default for SimulatedAudio {
    fn default() -> Self {
        Self {
            muted: AtomicBool::new(true),
            samples_written: AtomicU64::new(0),
            blocks_written: AtomicU64::new(0),
        }
    }
}

impl SimulatedAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::Relaxed)
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written.load(Ordering::Relaxed)
    }
}

impl AudioOutput for SimulatedAudio {
    fn mute(&self) {
        self.muted.store(true, Ordering::Release);
    }

    fn unmute(&self) {
        self.muted.store(false, Ordering::Release);
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    fn write(&self, samples: &[i16]) {
        if self.is_muted() {
            return;
        }
        self.samples_written
            .fetch_add(samples.len() as u64, Ordering::Relaxed);
        self.blocks_written.fetch_add(1, Ordering::Relaxed);
    }
}

/// A full set of simulated drivers built from a [`RuntimeConfig`].
#[derive(Debug, Clone)]
pub struct SimulatedHardware {
    pub dma: Arc<SimulatedDma>,
    pub rssi: Arc<SimulatedRssi>,
    pub audio: Arc<SimulatedAudio>,
}

impl SimulatedHardware {
    pub fn new(config: &RuntimeConfig, source: RxSource) -> Self {
        Self::from_dma(config, Self::dma_for(config, source))
    }

    /// Use a custom-built DMA engine (capture, init failure).
    pub fn from_dma(config: &RuntimeConfig, dma: SimulatedDma) -> Self {
        let rssi_geometry = BufferGeometry::new(config.rssi_transfer_samples, config.rssi_transfers);
        let rssi_pacing = match config.sim_pacing {
            SimPacing::Stepped => Pacing::Stepped,
            _ => Pacing::Interval(buffer_period(
                config.rssi_transfer_samples,
                config.rssi_sampling_rate,
            )),
        };
        Self {
            dma: Arc::new(dma),
            rssi: Arc::new(SimulatedRssi::new(rssi_geometry, rssi_pacing, 120, 8)),
            audio: Arc::new(SimulatedAudio::new()),
        }
    }

    /// DMA engine matching `config`'s geometry and pacing.
    pub fn dma_for(config: &RuntimeConfig, source: RxSource) -> SimulatedDma {
        let geometry = BufferGeometry::new(
            config.baseband_transfer_samples(),
            config.baseband_transfers,
        );
        let pacing = match config.sim_pacing {
            SimPacing::Realtime { sampling_rate } => {
                Pacing::Interval(buffer_period(geometry.transfer_samples, sampling_rate))
            }
            SimPacing::FreeRunning => Pacing::FreeRunning,
            SimPacing::Stepped => Pacing::Stepped,
        };
        SimulatedDma::new(geometry, pacing, source)
    }

    /// The drivers as trait objects for the core.
    pub fn hardware(&self) -> Hardware {
        Hardware::new(
            Arc::clone(&self.dma) as Arc<dyn BasebandDma>,
            Arc::clone(&self.rssi) as Arc<dyn RssiSampler>,
            Arc::clone(&self.audio) as Arc<dyn AudioOutput>,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn stepped_dma(source: RxSource) -> SimulatedDma {
        SimulatedDma::new(BufferGeometry::new(64, 4), Pacing::Stepped, source)
    }

    #[test]
    fn test_disabled_engine_completes_nothing() {
        let dma = stepped_dma(RxSource::Silence);
        dma.init().unwrap();
        assert_eq!(dma.step(3), 0);
        dma.enable(Direction::Receive);
        assert_eq!(dma.step(3), 3);
        assert_eq!(dma.completed(), 3);
    }

    #[test]
    fn test_pool_exhaustion_counts_overrun() {
        let dma = stepped_dma(RxSource::Silence);
        dma.init().unwrap();
        dma.enable(Direction::Receive);
        assert_eq!(dma.step(6), 4);
        assert_eq!(dma.overruns(), 2);

        let t = dma.wait_for_rx_buffer().unwrap();
        assert_eq!(t.sequence, 1);
        dma.release(t);
        assert_eq!(dma.step(1), 1);
    }

    #[test]
    fn test_transfers_tagged_with_direction() {
        let dma = stepped_dma(RxSource::Silence);
        dma.init().unwrap();
        dma.enable(Direction::Transmit);
        dma.step(1);
        let t = dma.wait_for_tx_buffer().unwrap();
        assert_eq!(t.direction, Direction::Transmit);
        dma.release(t);
    }

    #[test]
    fn test_halt_wakes_waiter() {
        let dma = Arc::new(stepped_dma(RxSource::Silence));
        dma.init().unwrap();
        dma.enable(Direction::Receive);

        let waiter = Arc::clone(&dma);
        let handle = thread::spawn(move || waiter.wait_for_rx_buffer().is_none());
        thread::sleep(Duration::from_millis(20));
        dma.halt();
        assert!(handle.join().unwrap());
        assert!(dma.wait_for_rx_buffer().is_none());
    }

    #[test]
    fn test_init_failure() {
        let dma = stepped_dma(RxSource::Silence).with_init_failure();
        assert!(matches!(dma.init(), Err(BasebandError::DmaInit(_))));

        let empty = SimulatedDma::new(BufferGeometry::new(0, 4), Pacing::Stepped, RxSource::Silence);
        assert!(empty.init().is_err());
    }

    #[test]
    fn test_tone_source() {
        let dma = stepped_dma(RxSource::Tone {
            frequency: 0.0,
            sampling_rate: 1000.0,
        });
        dma.init().unwrap();
        dma.enable(Direction::Receive);
        dma.step(1);
        let t = dma.wait_for_rx_buffer().unwrap();
        assert!(t.samples.iter().all(|s| *s == Iq8::new(127, 0)));
        dma.release(t);
    }

    #[test]
    fn test_tx_capture_respects_limit() {
        let dma = stepped_dma(RxSource::Silence).with_tx_capture(100);
        dma.init().unwrap();
        dma.enable(Direction::Transmit);
        for _ in 0..3 {
            dma.step(1);
            let mut t = dma.wait_for_tx_buffer().unwrap();
            t.samples.fill(Iq8::new(1, 2));
            dma.release(t);
        }
        let captured = dma.take_captured();
        assert_eq!(captured.len(), 100);
        assert!(captured.iter().all(|s| *s == Iq8::new(1, 2)));
    }

    #[test]
    fn test_free_running_flows() {
        let dma = SimulatedDma::new(BufferGeometry::new(32, 2), Pacing::FreeRunning, RxSource::Silence);
        dma.init().unwrap();
        dma.enable(Direction::Receive);
        for _ in 0..10 {
            let t = dma.wait_for_rx_buffer().unwrap();
            dma.release(t);
        }
        dma.halt();
        assert!(dma.completed() >= 10);
    }

    #[test]
    fn test_rssi_readings_within_spread() {
        let rssi = SimulatedRssi::new(BufferGeometry::new(400, 4), Pacing::Stepped, 100, 5);
        rssi.init().unwrap();
        assert_eq!(rssi.step(1), 0);
        rssi.start();
        assert_eq!(rssi.step(1), 1);
        let t = rssi.wait_for_buffer().unwrap();
        assert!(t.samples.iter().all(|&v| (95..=105).contains(&v)));
        rssi.release(t);
    }

    #[test]
    fn test_audio_discards_while_muted() {
        let audio = SimulatedAudio::new();
        audio.write(&[0; 16]);
        assert_eq!(audio.samples_written(), 0);
        audio.unmute();
        audio.write(&[0; 16]);
        assert_eq!(audio.samples_written(), 16);
        assert_eq!(audio.blocks_written(), 1);
    }
}
