use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use sensorlink_rs::error::LinkError;
use sensorlink_rs::firmware::{Firmware, Mode, ModeRegister, SimulatedSensors};
use sensorlink_rs::host::{
    CommandSink, ErrorMetric, LogFormat, LoopbackWriter, MeasurementLog, Monitor, SensorReadings,
    SerialLink,
};
use sensorlink_rs::phy::{FrameDecoder, FrameEncoder};
use sensorlink_rs::ui::progress::ProgressManager;
use sensorlink_rs::ui::{
    print_banner, print_menu, print_stats, prompt_mode, render_error_table, render_readings,
};
use sensorlink_rs::utils::config::LinkConfig;
use sensorlink_rs::utils::consts::*;
use sensorlink_rs::utils::logging::init_logging;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    /// JSON link configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select a mode on the device and decode its frames
    Monitor {
        #[arg(short, long)]
        port: Option<String>,
        #[arg(short, long)]
        baud: Option<u32>,
        /// Mode letter A..I; prompts when omitted
        #[arg(short, long)]
        mode: Option<char>,
        /// Append snapshots of the readings to this file
        #[arg(short, long)]
        log: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = LogFormat::Grid)]
        format: LogFormat,
        /// Frames per sensor before printing the error table
        #[arg(short, long)]
        series: Option<usize>,
        #[arg(long, value_enum, default_value_t = ErrorMetric::Range)]
        metric: ErrorMetric,
        /// Drop samples of frames whose CRC does not match
        #[arg(long)]
        strict_crc: bool,
    },
    /// Run the simulated firmware against the host decoder in-process
    Simulate {
        /// Mode letter A..I; the configured initial mode when omitted
        #[arg(short, long)]
        mode: Option<char>,
        #[arg(short, long, default_value_t = 10)]
        ticks: u64,
        /// Tick period; the configured poll interval when omitted
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Largest chunk handed to the host at once
        #[arg(long, default_value_t = SIM_MAX_CHUNK_BYTES)]
        chunk: usize,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(short, long)]
        series: Option<usize>,
        #[arg(long, value_enum, default_value_t = ErrorMetric::Range)]
        metric: ErrorMetric,
        #[arg(long)]
        strict_crc: bool,
    },
    /// Decode a captured byte stream
    Decode {
        input: PathBuf,
        /// One JSON object per frame
        #[arg(long)]
        json: bool,
    },
    /// CRC of u16 values packed little-endian
    Crc {
        #[arg(required = true)]
        values: Vec<u16>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    print_banner();

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), LinkError> {
    let config = match &cli.config {
        Some(path) => LinkConfig::load(path)?,
        None => LinkConfig::default(),
    };

    match cli.command {
        Commands::Monitor {
            port,
            baud,
            mode,
            log,
            format,
            series,
            metric,
            strict_crc,
        } => {
            let mut config = config;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(baud) = baud {
                config.baud_rate = baud;
            }
            if strict_crc {
                config.dispatch_regardless_of_crc = false;
            }
            config.validate()?;
            let mode = match mode {
                Some(code) => parse_mode(code)?,
                None => {
                    print_menu();
                    prompt_mode(config.default_mode()).map_err(LinkError::Config)?
                }
            };
            run_monitor(&config, mode, log.as_deref(), format, series, metric)
        }
        Commands::Simulate {
            mode,
            ticks,
            interval_ms,
            chunk,
            seed,
            series,
            metric,
            strict_crc,
        } => {
            let mut config = config;
            if strict_crc {
                config.dispatch_regardless_of_crc = false;
            }
            let mode = config.mode_or_default(mode)?;
            run_simulation(
                &config,
                mode,
                ticks,
                interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| config.poll_interval()),
                chunk,
                seed,
                series,
                metric,
            )
        }
        Commands::Decode { input, json } => run_decode(&config, &input, json),
        Commands::Crc { values } => {
            let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            println!("{:04X}", config.crc().checksum(&bytes));
            Ok(())
        }
    }
}

fn parse_mode(code: char) -> Result<Mode, LinkError> {
    LinkConfig::default().mode_or_default(Some(code))
}

/// Forward mode letters typed on stdin, one per line
fn spawn_mode_reader(tx: crossbeam_channel::Sender<Mode>) {
    thread::spawn(move || {
        for line in io::stdin().lines() {
            let Ok(line) = line else {
                break;
            };
            let Some(code) = line.trim().chars().next() else {
                continue;
            };
            match parse_mode(code) {
                Ok(mode) => {
                    if tx.send(mode).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{}", e),
            }
        }
    });
}

fn decoder_for(config: &LinkConfig) -> FrameDecoder {
    FrameDecoder::new(config.crc())
        .with_dispatch_regardless_of_crc(config.dispatch_regardless_of_crc)
}

fn stop_on_ctrlc(running: &Arc<AtomicBool>) -> Result<(), LinkError> {
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| LinkError::Config(format!("Ctrl-C handler: {}", e)))
}

/// Host loop with series tables printed as they finish. Stops once every
/// series of the mode is complete.
fn monitor_until_done(
    monitor: &mut Monitor,
    rx: &crossbeam_channel::Receiver<Vec<u8>>,
    running: &Arc<AtomicBool>,
) -> Result<(), LinkError> {
    let expected = monitor.mode().frame_types().len();
    let mut finished = 0;
    let stats = monitor.run(rx, running, |result| {
        println!("{}", render_error_table(result.frame_type, &result.errors));
        finished += 1;
        if finished == expected {
            running.store(false, Ordering::SeqCst);
        }
    })?;

    print!("{}", render_readings(monitor.mode(), monitor.readings()));
    print_stats(&stats);
    Ok(())
}

fn build_monitor(
    config: &LinkConfig,
    mode: Mode,
    series: Option<usize>,
    metric: ErrorMetric,
) -> Monitor {
    let monitor = Monitor::new(decoder_for(config), mode);
    match series {
        Some(length) if length > 0 => monitor
            .with_series(length, metric)
            .with_progress(ProgressManager::new()),
        _ => monitor,
    }
}

fn run_monitor(
    config: &LinkConfig,
    mode: Mode,
    log: Option<&Path>,
    format: LogFormat,
    series: Option<usize>,
    metric: ErrorMetric,
) -> Result<(), LinkError> {
    let mut link = SerialLink::open(config)?;
    link.send_mode(mode)?;

    let running = Arc::new(AtomicBool::new(true));
    stop_on_ctrlc(&running)?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let reader = link.spawn_reader(tx, running.clone())?;

    let mut monitor = build_monitor(config, mode, series, metric);
    if let Some(path) = log {
        monitor = monitor.with_log(
            MeasurementLog::open(path, format)?,
            Duration::from_millis(LOG_INTERVAL_MS),
        );
    }

    info!("Monitoring {} in mode {}", link.name(), mode);
    info!("Type a mode letter and Enter to switch");
    let (mode_tx, mode_rx) = crossbeam_channel::unbounded();
    spawn_mode_reader(mode_tx);
    let mut monitor = monitor.with_commands(Box::new(link), mode_rx);
    monitor_until_done(&mut monitor, &rx, &running)?;

    running.store(false, Ordering::SeqCst);
    if reader.join().is_err() {
        warn!("Serial reader thread panicked");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_simulation(
    config: &LinkConfig,
    mode: Mode,
    ticks: u64,
    interval: Duration,
    chunk: usize,
    seed: u64,
    series: Option<usize>,
    metric: ErrorMetric,
) -> Result<(), LinkError> {
    let running = Arc::new(AtomicBool::new(true));
    stop_on_ctrlc(&running)?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut register = Arc::new(ModeRegister::default());
    let mut firmware = Firmware::new(
        SimulatedSensors::new(seed),
        LoopbackWriter::new(tx, chunk, seed),
        FrameEncoder::new(config.crc()),
        register.clone(),
    );
    register.send_mode(mode)?;

    let fw_running = running.clone();
    let device = thread::spawn(move || -> std::io::Result<u64> {
        firmware.boot()?;
        firmware.run(interval, &fw_running, Some(ticks))
    });

    let (mode_tx, mode_rx) = crossbeam_channel::unbounded();
    spawn_mode_reader(mode_tx);
    let mut monitor =
        build_monitor(config, mode, series, metric).with_commands(Box::new(register), mode_rx);
    info!("Simulating mode {} for {} ticks", mode, ticks);
    monitor_until_done(&mut monitor, &rx, &running)?;

    running.store(false, Ordering::SeqCst);
    // Unblock the firmware if it is still writing into the channel
    drop(rx);
    match device.join() {
        Ok(Ok(n)) => info!("Firmware emitted {} ticks", n),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            info!("Firmware stopped: host closed the link")
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(LinkError::Config("firmware thread panicked".into())),
    }
    Ok(())
}

fn run_decode(config: &LinkConfig, input: &Path, json: bool) -> Result<(), LinkError> {
    let bytes = fs::read(input)?;
    let mut decoder = decoder_for(config);
    let mut readings = SensorReadings::new();

    for result in decoder.push_bytes(&bytes) {
        match result {
            Ok(frame) => {
                if json {
                    println!("{}", serde_json::to_string(&frame)?);
                } else {
                    println!(
                        "{} {} samples, crc received {:04X} computed {:04X}{}",
                        frame.frame_type.tag(),
                        frame.payload.len(),
                        frame.crc.received,
                        frame.crc.computed,
                        if frame.is_valid() { "" } else { " MISMATCH" }
                    );
                }
                decoder.dispatch(&frame, &mut readings);
            }
            Err(e) => warn!("Skipped line: {}", e),
        }
    }
    if !json {
        print!("{}", render_readings(Mode::All, &readings));
    }
    if decoder.pending() > 0 {
        warn!("{} trailing bytes without a line terminator", decoder.pending());
    }
    print_stats(&decoder.stats());
    Ok(())
}
