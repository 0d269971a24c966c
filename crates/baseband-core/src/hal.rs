//! Hardware interfaces consumed by the core.
//!
//! The DMA engine, the RSSI sampler and the audio output are external
//! collaborators. The core only depends on these traits; [`crate::sim`]
//! provides hosted implementations.
//!
//! Transfers are owned buffers that move from the driver to the runtime
//! thread and back: `wait_*` hands one out, `release` returns it to the
//! driver's pool. A runtime thread never holds a transfer across iterations.

use std::sync::Arc;

use crate::error::Result;
use crate::types::{Direction, Iq8};

/// One completed DMA transfer.
#[derive(Debug)]
pub struct Transfer<T> {
    pub samples: Box<[T]>,
    /// Direction the engine was running in when the transfer completed
    pub direction: Direction,
    /// Monotonic completion counter
    pub sequence: u64,
}

/// Baseband sample transfer.
pub type DmaTransfer = Transfer<Iq8>;

/// RSSI reading transfer.
pub type RssiTransfer = Transfer<u8>;

/// Layout of the DMA buffer: `transfers` equal slices of
/// `transfer_samples` samples each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferGeometry {
    pub transfer_samples: usize,
    pub transfers: usize,
}

impl BufferGeometry {
    pub fn new(transfer_samples: usize, transfers: usize) -> Self {
        Self {
            transfer_samples,
            transfers,
        }
    }

    pub fn total_samples(&self) -> usize {
        self.transfer_samples * self.transfers
    }
}

/// Baseband sample DMA engine.
///
/// On target both waits block on the same transfer-complete interrupt; a
/// transfer is tagged with the direction in effect when it completed.
pub trait BasebandDma: Send + Sync {
    /// Allocate descriptors. Failure is fatal for the core.
    fn init(&self) -> Result<()>;

    /// Point the engine at its buffer and set the transfer direction.
    fn configure(&self, geometry: BufferGeometry, direction: Direction);

    /// Start transfers in `direction`.
    fn enable(&self, direction: Direction);

    /// Stop transfers. In-flight completions may still be delivered.
    fn disable(&self);

    fn is_enabled(&self) -> bool;

    /// Block until the next receive transfer completes.
    ///
    /// Returns `None` only once the engine is halted.
    fn wait_for_rx_buffer(&self) -> Option<DmaTransfer>;

    /// Block until the next transmit transfer is due for filling.
    ///
    /// Returns `None` only once the engine is halted.
    fn wait_for_tx_buffer(&self) -> Option<DmaTransfer>;

    /// Hand a transfer back to the engine (transmit transfers go out on air).
    fn release(&self, transfer: DmaTransfer);

    /// Disable the completion interrupt and wake all waiters with `None`.
    fn halt(&self);
}

/// RSSI sampling hardware.
pub trait RssiSampler: Send + Sync {
    fn init(&self) -> Result<()>;

    fn start(&self);

    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Block until the next RSSI transfer completes; `None` once halted.
    fn wait_for_buffer(&self) -> Option<RssiTransfer>;

    fn release(&self, transfer: RssiTransfer);

    fn halt(&self);
}

/// Audio output path (I2S on target).
pub trait AudioOutput: Send + Sync {
    fn mute(&self);

    fn unmute(&self);

    fn is_muted(&self) -> bool;

    /// Queue one block of audio samples. Writes while muted are discarded.
    fn write(&self, samples: &[i16]);
}

/// The set of drivers the core runs against.
#[derive(Clone)]
pub struct Hardware {
    pub dma: Arc<dyn BasebandDma>,
    pub rssi: Arc<dyn RssiSampler>,
    pub audio: Arc<dyn AudioOutput>,
}

impl Hardware {
    pub fn new(
        dma: Arc<dyn BasebandDma>,
        rssi: Arc<dyn RssiSampler>,
        audio: Arc<dyn AudioOutput>,
    ) -> Self {
        Self { dma, rssi, audio }
    }
}

impl std::fmt::Debug for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hardware")
            .field("dma_enabled", &self.dma.is_enabled())
            .field("rssi_running", &self.rssi.is_running())
            .field("audio_muted", &self.audio.is_muted())
            .finish()
    }
}
