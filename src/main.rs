use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use ndntdump::anonymizer::{parse_keep_set, Anonymizer};
use ndntdump::input::{open_source, CloseHandle};
use ndntdump::output::{copy_records, open_outputs, RotateHandle};
use ndntdump::reader::{Reader, ReaderOptions, ReaderStats, DEFAULT_TCP_PORT, DEFAULT_WS_PORT};

// ─── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture NDN traffic and write anonymized packet records as NDJSON and pcapng.")]
struct Args {
    /// Network interface to capture on
    #[arg(short = 'i', long)]
    ifname: Option<String>,

    /// Capture file to replay (.pcap or .pcapng, optionally .gz or .zst)
    #[arg(short = 'r', long)]
    input: Option<PathBuf>,

    /// Local MAC address when replaying a capture file
    #[arg(long)]
    local: Option<String>,

    /// NDN over TCP/UDP port
    #[arg(long, default_value_t = DEFAULT_TCP_PORT)]
    tcp_port: u16,

    /// NDN over WebSocket port
    #[arg(long, default_value_t = DEFAULT_WS_PORT)]
    wss_port: u16,

    /// NDJSON record output (.gz or .zst to compress)
    #[arg(short = 'L', long)]
    json: Option<PathBuf>,

    /// Anonymized pcapng output (.gz or .zst to compress)
    #[arg(short = 'w', long)]
    pcapng: Option<PathBuf>,

    /// IP prefix exempt from anonymization (repeatable)
    #[arg(short = 'N', long = "keep-ip")]
    keep_ip: Vec<String>,

    /// Do not anonymize MAC addresses
    #[arg(long, default_value_t = false)]
    keep_mac: bool,

    /// Keep Interest/Data payload bytes (testing only)
    #[arg(long, default_value_t = false)]
    keep_payload: bool,

    /// Print reader statistics as JSON to stdout
    #[arg(long, default_value_t = false)]
    report: bool,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Signals ──────────────────────────────────────────────────────────────────

/// SIGHUP reopens the output files. Must run before any other thread starts so
/// that every thread inherits the blocked mask.
#[cfg(unix)]
fn spawn_rotate_on_sighup(handles: Vec<RotateHandle>) -> Result<()> {
    use nix::sys::signal::{SigSet, Signal};

    let mut set = SigSet::empty();
    set.add(Signal::SIGHUP);
    set.thread_block().context("blocking SIGHUP")?;
    std::thread::Builder::new().name("sighup".into()).spawn(move || loop {
        match set.wait() {
            Ok(_) => {
                info!("SIGHUP, reopening outputs");
                for h in &handles {
                    if let Err(e) = h.rotate() {
                        warn!("reopen failed: {e:#}");
                    }
                }
            }
            Err(e) => {
                warn!("sigwait: {e}");
                return;
            }
        }
    })?;
    Ok(())
}

#[cfg(not(unix))]
fn spawn_rotate_on_sighup(_: Vec<RotateHandle>) -> Result<()> {
    Ok(())
}

fn close_on_interrupt(close: CloseHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("interrupted, stopping capture");
        close.close();
    })
    .context("installing signal handler")
}

// ─── Summary ──────────────────────────────────────────────────────────────────

fn print_summary(stats: &ReaderStats) {
    println!("=== Capture Summary ===");
    println!("Frames read:                 {}", stats.frames);
    println!("Records emitted:             {}", stats.records);
    println!("WebSocket frames:            {}", stats.websocket_frames);
    println!("X-Forwarded-For masked:      {}", stats.xff_masked);
    println!("─────────────────────────────────────────");
    println!("Skipped, undecodable:        {}", stats.skipped_undecodable);
    println!("Skipped, foreign:            {}", stats.skipped_foreign);
    println!("Skipped, not NDN:            {}", stats.skipped_not_ndn);
    println!("Skipped, malformed NDN:      {}", stats.skipped_malformed_ndn);
}

// ─── main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(log_level).with_target(false).with_writer(std::io::stderr).init();

    let keep = parse_keep_set(&args.keep_ip)?;
    let source = open_source(args.ifname.as_deref(), args.input.as_deref(), args.local.as_deref())?;
    info!("Opening {}", source.name());
    let (mut outputs, rotate) = open_outputs(args.json.as_deref(), args.pcapng.as_deref())?;
    spawn_rotate_on_sighup(rotate)?;

    let opts = ReaderOptions {
        tcp_port: args.tcp_port,
        ws_port: args.wss_port,
        keep_payload: args.keep_payload,
        raw_export: args.pcapng.is_some(),
    };
    let mut reader = Reader::new(source, Anonymizer::new(keep, args.keep_mac), opts)?;
    close_on_interrupt(reader.close_handle())?;

    copy_records(&mut reader, &mut outputs)?;

    let stats = reader.stats();
    info!(frames = stats.frames, records = stats.records, "capture finished");
    if args.report {
        println!("{}", serde_json::to_string_pretty(stats)?);
    } else {
        print_summary(stats);
    }
    Ok(())
}
