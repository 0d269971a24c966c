//! End-to-end tests of the baseband core against the simulated hardware.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use baseband_core::config::{
    AfskConfig, BasebandConfiguration, CoreConfig, JammerConfig, JammerRange, Mode, RuntimeConfig,
    SimPacing, JAMMER_RANGES,
};
use baseband_core::context::BasebandContext;
use baseband_core::error::BasebandError;
use baseband_core::hal::{AudioOutput, BasebandDma, RssiSampler};
use baseband_core::message::{Message, MAX_SIZE};
use baseband_core::rt::EVT_MASK_BASEBAND;
use baseband_core::shared::AppLink;
use baseband_core::sim::{RxSource, SimulatedHardware};
use baseband_core::system::{Baseband, ShutdownReport};
use baseband_core::types::{Direction, Iq8};

const TIMEOUT: Duration = Duration::from_secs(10);

struct Running {
    link: AppLink,
    context: Arc<BasebandContext>,
    handle: thread::JoinHandle<ShutdownReport>,
}

impl Running {
    fn start(config: CoreConfig, sim: &SimulatedHardware) -> Self {
        let baseband = Baseband::start(config, sim.hardware()).expect("core starts");
        let link = baseband.link();
        let context = Arc::clone(baseband.context());
        let handle = thread::spawn(move || baseband.run());
        Self {
            link,
            context,
            handle,
        }
    }

    /// Configure and wait until the snapshot carries `configuration`.
    fn configure(&self, configuration: BasebandConfiguration) {
        self.link.configure(configuration).unwrap();
        assert!(
            wait_for(|| self.context.snapshot().configuration == Some(configuration)),
            "configuration {:?} never applied",
            configuration
        );
    }

    fn shutdown(self) -> (ShutdownReport, Vec<Message>) {
        self.link.shutdown().unwrap();
        let report = self.handle.join().unwrap();
        let rest = self
            .link
            .collect_until(Duration::from_secs(1), |m| *m == Message::Shutdown);
        (report, rest)
    }
}

fn wait_for<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn stepped() -> (CoreConfig, SimulatedHardware) {
    let config = CoreConfig {
        runtime: RuntimeConfig::stepped(),
        ..Default::default()
    };
    let sim = SimulatedHardware::new(&config.runtime, RxSource::Silence);
    (config, sim)
}

fn free_running(mailbox: usize) -> RuntimeConfig {
    RuntimeConfig::hosted()
        .with_sim_pacing(SimPacing::FreeRunning)
        .with_mailbox_capacity(mailbox)
}

#[test]
fn test_direction_policy_through_mailbox() {
    let (config, sim) = stepped();
    let core = Running::start(config, &sim);

    let mut instance = core.context.snapshot().instance;
    for mode in Mode::ALL {
        core.configure(BasebandConfiguration::new(mode, mode.default_sampling_rate()));
        let snap = core.context.snapshot();
        assert_eq!(snap.instance, instance + 1, "{} swapped more than once", mode);
        instance = snap.instance;

        assert_eq!(snap.direction, mode.direction(), "{}", mode);
        assert_eq!(sim.dma.direction(), mode.direction());
        assert_eq!(sim.rssi.is_running(), mode.direction() == Direction::Receive, "{}", mode);
        assert_eq!(sim.audio.is_muted(), !mode.is_audio());
    }

    let (_, rest) = core.shutdown();
    assert_eq!(rest.last(), Some(&Message::Shutdown));
}

#[test]
fn test_unchanged_mode_refreshes_snapshot_only() {
    let (config, sim) = stepped();
    let core = Running::start(config, &sim);

    core.configure(BasebandConfiguration::new(Mode::NarrowbandFmAudio, 3_072_000));
    let before = core.context.snapshot();
    for rate in [1_536_000, 768_000, 3_072_000] {
        let update = BasebandConfiguration::new(Mode::NarrowbandFmAudio, rate).with_decimation(2);
        core.configure(update);
        let after = core.context.snapshot();
        assert_eq!(after.instance, before.instance);
        assert_eq!(after.configuration, Some(update));
    }
    core.shutdown();
}

#[test]
fn test_unknown_mode_and_unknown_message_are_ignored() {
    let (config, sim) = stepped();
    let core = Running::start(config, &sim);

    core.configure(BasebandConfiguration::with_raw_mode(15, 2_280_000));
    assert_eq!(core.context.snapshot().processor, None);

    let mut record = [0u8; MAX_SIZE];
    record[0] = 0xEE;
    core.link.shared().baseband_queue.push_record(record).unwrap();
    core.context.events().signal(EVT_MASK_BASEBAND);

    core.configure(BasebandConfiguration::new(Mode::Tpms, 2_457_600));
    assert_eq!(core.context.snapshot().processor, Some("tpms"));
    core.shutdown();
}

#[test]
fn test_fsk_message_runs_to_completion() {
    let runtime = free_running(64);
    let dma = SimulatedHardware::dma_for(&runtime, RxSource::Silence).with_tx_capture(1 << 20);
    let sim = SimulatedHardware::from_dma(&runtime, dma);
    let config = CoreConfig {
        runtime,
        afsk: Some(AfskConfig::bell202(b"AB", 1)),
        ..Default::default()
    };
    let core = Running::start(config, &sim);

    core.link
        .configure(BasebandConfiguration::new(Mode::LcrFsk, 2_280_000))
        .unwrap();
    let messages = core
        .link
        .collect_until(TIMEOUT, |m| *m == Message::TxDone { n: 0 });
    let done: Vec<u32> = messages
        .iter()
        .filter_map(|m| match m {
            Message::TxDone { n } => Some(*n),
            _ => None,
        })
        .collect();
    assert_eq!(done, vec![1, 0]);
    assert!(core.link.shared().afsk.transmit_done());

    // Nothing more is reported once the generator is done
    thread::sleep(Duration::from_millis(50));
    let (_, rest) = core.shutdown();
    assert!(rest.iter().all(|m| !matches!(m, Message::TxDone { .. })));

    let captured = sim.dma.take_captured();
    assert!(captured.iter().any(|s| *s != Iq8::new(0, 0)));
}

#[test]
fn test_jammer_cycles_active_ranges() {
    let active = [0usize, 3, 7];
    let ranges = (0..JAMMER_RANGES)
        .map(|i| JammerRange {
            active: active.contains(&i),
            ..JammerRange::new(430_000_000 + i as u64 * 100_000, 20_000.0)
        })
        .collect();
    let runtime = free_running(64);
    let sim = SimulatedHardware::new(&runtime, RxSource::Silence);
    let config = CoreConfig {
        runtime,
        jammer: Some(JammerConfig::new(ranges)),
        ..Default::default()
    };
    let core = Running::start(config, &sim);

    core.link
        .configure(BasebandConfiguration::new(Mode::Jammer, 2_280_000))
        .unwrap();
    let mut centers = Vec::new();
    let deadline = Instant::now() + TIMEOUT;
    while centers.len() < 9 && Instant::now() < deadline {
        if let Some(Message::Retune { freq }) = core.link.recv_timeout(Duration::from_millis(10)) {
            centers.push(freq);
        }
    }
    core.shutdown();

    let expected: Vec<u64> = [0u64, 3, 7]
        .iter()
        .cycle()
        .take(9)
        .map(|i| 430_000_000 + i * 100_000)
        .collect();
    assert_eq!(centers, expected);
}

#[test]
fn test_shutdown_is_prompt_while_streaming() {
    let runtime = free_running(64);
    let sim = SimulatedHardware::new(
        &runtime,
        RxSource::Noise {
            amplitude: 40,
            seed: 7,
        },
    );
    let core = Running::start(
        CoreConfig {
            runtime,
            ..Default::default()
        },
        &sim,
    );
    core.configure(BasebandConfiguration::new(Mode::NarrowbandFmAudio, 3_072_000));
    assert!(wait_for(|| sim.dma.completed() > 8));
    core.link.shared().application_queue.drain();

    let start = Instant::now();
    let (report, rest) = core.shutdown();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(report.buffers > 0);
    assert_eq!(rest.last(), Some(&Message::Shutdown));
    assert!(sim.dma.is_halted());
    assert!(!sim.rssi.is_running());
}

#[test]
fn test_dma_init_failure_is_fatal() {
    let runtime = RuntimeConfig::stepped();
    let dma = SimulatedHardware::dma_for(&runtime, RxSource::Silence).with_init_failure();
    let sim = SimulatedHardware::from_dma(&runtime, dma);
    let result = Baseband::start(
        CoreConfig {
            runtime,
            ..Default::default()
        },
        sim.hardware(),
    );
    assert!(matches!(result, Err(BasebandError::DmaInit(_))));
    assert!(!sim.dma.is_enabled());
}

#[test]
fn test_invalid_config_is_rejected() {
    let (mut config, sim) = stepped();
    config.runtime.mailbox_capacity = 0;
    let result = Baseband::start(config, sim.hardware());
    assert!(matches!(result, Err(BasebandError::Config(_))));
}
