//! Baseband Core Command-Line Interface
//!
//! Boots the real-time baseband core against simulated hardware and plays
//! the application side of the mailbox:
//! - Listing the processor modes and their transfer direction
//! - Running a receive or transmit mode and printing what the core publishes
//! - Transmitting a text message through the LCR/FSK generator
//! - Driving the frequency-hopping jammer over a range table

use anyhow::{bail, Context, Result};
use baseband_core::config::{
    AfskConfig, BasebandConfiguration, CoreConfig, JammerConfig, Mode, RuntimeConfig, SimPacing,
};
use baseband_core::message::{Message, PacketKind};
use baseband_core::sim::{RxSource, SimulatedHardware};
use baseband_core::system::{Baseband, ShutdownReport};
use baseband_core::types::Iq8;
use baseband_core::AppLink;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "baseband")]
#[command(author, version, about = "Baseband coprocessor core on simulated hardware", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON configuration file (runtime, afsk, jammer sections)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print published messages as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List processor modes and their transfer direction
    Modes,

    /// Print the effective configuration as JSON
    Config,

    /// Boot the core, apply a mode and print published messages
    Run {
        /// Mode name (e.g. NFM, AIS) or raw mode value
        #[arg(short, long, default_value = "NFM")]
        mode: String,

        /// Sampling rate in Hz (defaults to the mode's usual rate)
        #[arg(short, long)]
        rate: Option<u32>,

        /// Front-end decimation for receive processors (1 = automatic)
        #[arg(long, default_value = "1")]
        decimation: u32,

        /// Seconds to run (0 = until Ctrl+C)
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Receive signal (silence, noise, tone:<hz>)
        #[arg(long, default_value = "noise")]
        source: String,

        /// Complete transfers as fast as they are consumed
        #[arg(long)]
        fast: bool,
    },

    /// Transmit a text message through the LCR/FSK generator
    Fsk {
        /// Message text
        #[arg(short, long)]
        message: String,

        /// Additional passes after the first
        #[arg(long, default_value = "0")]
        repeat: u32,

        /// Save the transmitted I/Q stream (interleaved i8)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Give up after this many seconds
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Complete transfers as fast as they are consumed
        #[arg(long)]
        fast: bool,
    },

    /// Run the frequency-hopping jammer and print retunes
    Jam {
        /// Ranges as center:bandwidth in Hz (up to 16)
        #[arg(short, long, num_args = 1.., required = true)]
        range: Vec<String>,

        /// Stop after this many retunes
        #[arg(short = 'n', long, default_value = "16")]
        retunes: usize,

        /// Give up after this many seconds
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Complete transfers as fast as they are consumed
        #[arg(long)]
        fast: bool,
    },
}

/// Transmit samples kept for `fsk --output`.
const CAPTURE_LIMIT: usize = 32 << 20;

const POLL: Duration = Duration::from_millis(100);

fn load_config(path: Option<&Path>) -> Result<CoreConfig> {
    match path {
        Some(path) => CoreConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => Ok(CoreConfig {
            runtime: RuntimeConfig::hosted(),
            ..Default::default()
        }),
    }
}

fn parse_mode(text: &str) -> Result<Mode> {
    if let Ok(raw) = text.parse::<u32>() {
        return Mode::from_raw(raw).ok_or_else(|| anyhow::anyhow!("Unknown mode value: {}", raw));
    }
    Mode::ALL
        .into_iter()
        .find(|m| m.name().eq_ignore_ascii_case(text))
        .ok_or_else(|| anyhow::anyhow!("Unknown mode: {}. See `baseband modes`", text))
}

fn parse_source(text: &str, sampling_rate: u32) -> Result<RxSource> {
    match text {
        "silence" => Ok(RxSource::Silence),
        "noise" => Ok(RxSource::Noise {
            amplitude: 48,
            seed: 0x5eed,
        }),
        other => match other.strip_prefix("tone:") {
            Some(freq) => Ok(RxSource::Tone {
                frequency: freq.parse().context("Invalid tone frequency")?,
                sampling_rate: sampling_rate as f64,
            }),
            None => bail!("Invalid source: {}. Use silence, noise or tone:<hz>", other),
        },
    }
}

fn pacing(fast: bool, sampling_rate: u32) -> SimPacing {
    if fast {
        SimPacing::FreeRunning
    } else {
        SimPacing::Realtime { sampling_rate }
    }
}

/// Install a Ctrl+C handler and return the running flag it clears.
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;
    Ok(running)
}

/// A core running on its own dispatcher thread.
struct Session {
    link: AppLink,
    handle: JoinHandle<ShutdownReport>,
}

impl Session {
    fn start(config: CoreConfig, sim: &SimulatedHardware) -> Result<Self> {
        let baseband =
            Baseband::start(config, sim.hardware()).context("Failed to start baseband core")?;
        let link = baseband.link();
        let handle = thread::Builder::new()
            .name("dispatcher".into())
            .spawn(move || baseband.run())
            .context("Failed to spawn dispatcher thread")?;
        Ok(Self { link, handle })
    }

    /// Post `Shutdown`, wait for the core and return the messages published
    /// while it wound down.
    fn shutdown(self) -> Result<(ShutdownReport, Vec<Message>)> {
        self.link.shutdown().context("Failed to post shutdown")?;
        let report = self
            .handle
            .join()
            .map_err(|_| anyhow::anyhow!("Dispatcher thread panicked"))?;
        let rest = self
            .link
            .collect_until(Duration::from_secs(1), |m| *m == Message::Shutdown);
        Ok((report, rest))
    }
}

fn print_message(message: &Message, as_json: bool) {
    if as_json {
        println!("{}", message_json(message));
    } else {
        println!("{}", describe(message));
    }
}

fn describe(message: &Message) -> String {
    match message {
        Message::RssiStatistics(s) => format!(
            "rssi       mean {:3}  min {:3}  max {:3}  ({} readings)",
            s.mean(),
            s.min,
            s.max,
            s.count
        ),
        Message::BasebandStatistics(s) => format!(
            "baseband   {} buffers  {} samples  max {} us  load {}.{}%  overruns {}  dropped {}",
            s.buffer_count,
            s.sample_count,
            s.max_execute_us,
            s.load_permille / 10,
            s.load_permille % 10,
            s.deadline_overruns,
            s.messages_dropped
        ),
        Message::ChannelStatistics(s) => {
            format!("channel    max {} dB  ({} samples)", s.max_db, s.count)
        }
        Message::ChannelSpectrum(s) => {
            let peak = s
                .db
                .iter()
                .enumerate()
                .max_by_key(|(_, db)| **db)
                .map(|(bin, db)| (bin, *db))
                .unwrap_or((0, 0));
            format!(
                "spectrum   {} Hz  peak bin {} ({} dB)",
                s.sampling_rate, peak.0, peak.1
            )
        }
        Message::PacketReceived(p) => format!("packet     {:?}  {}", p.kind, hex(&p.bits)),
        Message::BasebandConfiguration(c) => format!(
            "config     mode {}  {} Hz  decimation {}",
            c.mode, c.sampling_rate, c.decimation_factor
        ),
        Message::Shutdown => "shutdown".to_string(),
        Message::TxDone { n } => format!("tx-done    {}", n),
        Message::Retune { freq } => format!("retune     {} Hz", freq),
    }
}

fn message_json(message: &Message) -> serde_json::Value {
    match message {
        Message::RssiStatistics(s) => json!({
            "type": "rssi_statistics",
            "accumulator": s.accumulator,
            "count": s.count,
            "min": s.min,
            "max": s.max,
        }),
        Message::BasebandStatistics(s) => json!({
            "type": "baseband_statistics",
            "buffer_count": s.buffer_count,
            "sample_count": s.sample_count,
            "max_execute_us": s.max_execute_us,
            "load_permille": s.load_permille,
            "deadline_overruns": s.deadline_overruns,
            "messages_dropped": s.messages_dropped,
        }),
        Message::ChannelStatistics(s) => json!({
            "type": "channel_statistics",
            "max_db": s.max_db,
            "count": s.count,
        }),
        Message::ChannelSpectrum(s) => json!({
            "type": "channel_spectrum",
            "sampling_rate": s.sampling_rate,
            "db": s.db.to_vec(),
        }),
        Message::PacketReceived(p) => json!({
            "type": "packet_received",
            "kind": match p.kind {
                PacketKind::Ais => "ais",
                PacketKind::Tpms => "tpms",
            },
            "bits": hex(&p.bits),
        }),
        Message::BasebandConfiguration(c) => json!({
            "type": "baseband_configuration",
            "configuration": c,
        }),
        Message::Shutdown => json!({ "type": "shutdown" }),
        Message::TxDone { n } => json!({ "type": "tx_done", "n": n }),
        Message::Retune { freq } => json!({ "type": "retune", "freq": freq }),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn write_samples_i8(samples: &[Iq8], path: &Path) -> Result<()> {
    use byteorder::WriteBytesExt;

    let file = File::create(path).context("Failed to create output file")?;
    let mut writer = BufWriter::new(file);

    for sample in samples {
        writer.write_i8(sample.re)?;
        writer.write_i8(sample.im)?;
    }

    writer.flush()?;
    Ok(())
}

fn print_report(report: &ShutdownReport) {
    info!(
        buffers = report.buffers,
        executed = report.executed,
        overruns = report.overruns,
        dropped = report.dropped,
        "core stopped"
    );
    if report.overruns > 0 {
        warn!("{} buffers overran their deadline", report.overruns);
    }
}

fn cmd_modes(as_json: bool) -> Result<()> {
    if as_json {
        let table: Vec<_> = Mode::ALL
            .iter()
            .map(|m| {
                json!({
                    "mode": m,
                    "value": m.raw(),
                    "name": m.name(),
                    "direction": m.direction(),
                    "sampling_rate": m.default_sampling_rate(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!("=== Processor Modes ===\n");
    println!("  {:>5}  {:<10} {:<4} {:>12}", "value", "name", "dir", "rate (Hz)");
    for mode in Mode::ALL {
        println!(
            "  {:>5}  {:<10} {:<4} {:>12}",
            mode.raw(),
            mode.name(),
            mode.direction(),
            mode.default_sampling_rate()
        );
    }
    println!("\nAny other value leaves the core without a processor.");
    Ok(())
}

fn cmd_config(config: &CoreConfig) -> Result<()> {
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_run(
    mut config: CoreConfig,
    mode: String,
    rate: Option<u32>,
    decimation: u32,
    duration: u64,
    source: String,
    fast: bool,
    as_json: bool,
) -> Result<()> {
    let mode = parse_mode(&mode)?;
    let rate = rate.unwrap_or_else(|| mode.default_sampling_rate());
    let source = parse_source(&source, rate)?;

    config.runtime.sim_pacing = pacing(fast, rate);
    let sim = SimulatedHardware::new(&config.runtime, source);
    let session = Session::start(config, &sim)?;

    let running = interrupt_flag()?;
    let configuration = BasebandConfiguration::new(mode, rate).with_decimation(decimation);
    session
        .link
        .configure(configuration)
        .context("Failed to post configuration")?;
    info!("Running {} at {} Hz ({})", mode, rate, mode.direction());

    let deadline = (duration > 0).then(|| Instant::now() + Duration::from_secs(duration));
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        if let Some(message) = session.link.recv_timeout(POLL) {
            print_message(&message, as_json);
        }
    }

    let (report, rest) = session.shutdown()?;
    for message in &rest {
        print_message(message, as_json);
    }
    print_report(&report);
    Ok(())
}

fn cmd_fsk(
    mut config: CoreConfig,
    message: String,
    repeat: u32,
    output: Option<PathBuf>,
    timeout: u64,
    fast: bool,
    as_json: bool,
) -> Result<()> {
    let afsk = AfskConfig::bell202(message.as_bytes(), repeat);
    afsk.validate()?;
    let bits = (afsk.data.len() * 10) as u64 * (repeat as u64 + 1);
    info!(
        "Transmitting '{}' ({} bytes, {} bits incl. framing, {} passes)",
        message,
        afsk.data.len(),
        bits,
        repeat + 1
    );
    config.afsk = Some(afsk);

    let rate = Mode::LcrFsk.default_sampling_rate();
    config.runtime.sim_pacing = pacing(fast, rate);
    let mut dma = SimulatedHardware::dma_for(&config.runtime, RxSource::Silence);
    if output.is_some() {
        dma = dma.with_tx_capture(CAPTURE_LIMIT);
    }
    let sim = SimulatedHardware::from_dma(&config.runtime, dma);
    let session = Session::start(config, &sim)?;

    let running = interrupt_flag()?;
    session
        .link
        .configure(BasebandConfiguration::new(Mode::LcrFsk, rate))
        .context("Failed to post configuration")?;

    let start = Instant::now();
    let deadline = start + Duration::from_secs(timeout);
    let mut done = false;
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        match session.link.recv_timeout(POLL) {
            Some(m @ Message::TxDone { n }) => {
                print_message(&m, as_json);
                if n == 0 {
                    done = true;
                    break;
                }
            }
            Some(other) => tracing::debug!("{}", describe(&other)),
            None => {}
        }
    }

    let (report, _) = session.shutdown()?;
    print_report(&report);
    if !done {
        bail!("Transmission did not complete");
    }
    info!("Transmission complete in {:.3} s", start.elapsed().as_secs_f64());

    if let Some(path) = output {
        let samples = sim.dma.take_captured();
        write_samples_i8(&samples, &path)?;
        info!("Wrote {} I/Q samples to {:?}", samples.len(), path);
    }
    Ok(())
}

fn cmd_jam(
    mut config: CoreConfig,
    ranges: Vec<String>,
    retunes: usize,
    timeout: u64,
    fast: bool,
    as_json: bool,
) -> Result<()> {
    let table = JammerConfig::parse_ranges(&ranges).context("Invalid jammer range")?;
    info!("Jamming {} ranges", table.ranges.len());
    config.jammer = Some(table);

    let rate = Mode::Jammer.default_sampling_rate();
    config.runtime.sim_pacing = pacing(fast, rate);
    let sim = SimulatedHardware::new(&config.runtime, RxSource::Silence);
    let session = Session::start(config, &sim)?;

    let running = interrupt_flag()?;
    session
        .link
        .configure(BasebandConfiguration::new(Mode::Jammer, rate))
        .context("Failed to post configuration")?;

    let deadline = Instant::now() + Duration::from_secs(timeout);
    let mut seen = 0;
    while seen < retunes && running.load(Ordering::SeqCst) && Instant::now() < deadline {
        if let Some(message) = session.link.recv_timeout(POLL) {
            if matches!(message, Message::Retune { .. }) {
                seen += 1;
                print_message(&message, as_json);
            }
        }
    }

    let (report, _) = session.shutdown()?;
    print_report(&report);
    if seen < retunes {
        warn!("Stopped after {} of {} retunes", seen, retunes);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Modes => cmd_modes(cli.json),

        Commands::Config => cmd_config(&config),

        Commands::Run {
            mode,
            rate,
            decimation,
            duration,
            source,
            fast,
        } => cmd_run(config, mode, rate, decimation, duration, source, fast, cli.json),

        Commands::Fsk {
            message,
            repeat,
            output,
            timeout,
            fast,
        } => cmd_fsk(config, message, repeat, output, timeout, fast, cli.json),

        Commands::Jam {
            range,
            retunes,
            timeout,
            fast,
        } => cmd_jam(config, range, retunes, timeout, fast, cli.json),
    }
}
