//! justplay - play one audio file from the command line
//!
//! Loads the file, starts playback and reads transport commands from stdin
//! until `quit` or end of input. On end of input it keeps playing until the
//! file finishes (or forever when looping); a paused player exits.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use justplay::audio::CpalHost;
use justplay::{Playback, PlaybackConfig, PlaybackState};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interval between state polls while waiting for playback to finish
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Command-line arguments for justplay
#[derive(Parser, Debug)]
#[command(name = "justplay")]
#[command(about = "Play a single audio file with interactive transport controls")]
#[command(version)]
struct Args {
    /// Audio file to play
    #[arg(required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// Configuration file (TOML); falls back to $JUSTPLAY_CONFIG
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial volume (0.0 - 1.0)
    #[arg(long)]
    volume: Option<f32>,

    /// Restart from the beginning at the end of the file
    #[arg(short = 'l', long = "loop")]
    loop_at_end: bool,

    /// Output device name
    #[arg(short, long)]
    device: Option<String>,

    /// Device period in frames
    #[arg(long)]
    buffer_frames: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

/// A line of input from the transport prompt
#[derive(Debug, PartialEq)]
enum Command {
    Play,
    Pause,
    Resume,
    Stop,
    Seek(f64),
    Volume(f32),
    Loop(bool),
    Status,
    Quit,
}

impl Command {
    fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        let command = match (name, arg) {
            ("play", None) => Command::Play,
            ("pause", None) => Command::Pause,
            ("resume", None) => Command::Resume,
            ("stop", None) => Command::Stop,
            ("status", None) => Command::Status,
            ("quit" | "exit", None) => Command::Quit,
            ("seek", Some(value)) => Command::Seek(
                value
                    .parse()
                    .map_err(|_| format!("invalid position: {}", value))?,
            ),
            ("volume", Some(value)) => Command::Volume(
                value
                    .parse()
                    .map_err(|_| format!("invalid volume: {}", value))?,
            ),
            ("loop", Some("on")) => Command::Loop(true),
            ("loop", Some("off")) => Command::Loop(false),
            _ => return Err(format!("unknown command: {}", line.trim())),
        };
        Ok(command)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_devices {
        for name in CpalHost::list_devices().context("Failed to enumerate output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut config = PlaybackConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("justplay={}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let file = args.file.context("No audio file given")?;

    let mut player = Playback::with_config(&config).context("Failed to initialize audio output")?;
    player
        .load_file(&file)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    player.play().context("Failed to start playback")?;

    info!(
        "Playing {} ({:.1}s, volume {:.2}, loop {})",
        file.display(),
        player.duration(),
        player.volume(),
        if player.loops_at_end() { "on" } else { "off" }
    );

    if run_prompt(&mut player)? {
        wait_until_finished(&mut player)?;
    }

    player.stop().context("Failed to stop playback")?;
    info!("Playback finished");
    Ok(())
}

fn apply_overrides(config: &mut PlaybackConfig, args: &Args) {
    if let Some(volume) = args.volume {
        config.volume = volume.clamp(0.0, 1.0);
    }
    if args.loop_at_end {
        config.loop_at_end = true;
    }
    if let Some(device) = args.device.as_ref() {
        config.device = Some(device.clone());
    }
    if let Some(frames) = args.buffer_frames.filter(|&frames| frames > 0) {
        config.buffer_frames = Some(frames);
    }
    if let Some(level) = args.log_level.as_ref() {
        config.logging.level = level.clone();
    }
}

/// Read commands until `quit` or end of input.
///
/// Returns `true` on end of input (keep playing), `false` on `quit`.
fn run_prompt(player: &mut Playback) -> Result<bool> {
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                eprintln!("{}", msg);
                continue;
            }
        };
        debug!("Command: {:?}", command);

        let result = match command {
            Command::Play => player.play(),
            Command::Pause => player.pause(),
            Command::Resume => player.resume(),
            Command::Stop => player.stop(),
            Command::Seek(seconds) => player.seek(seconds),
            Command::Volume(volume) => {
                player.set_volume(volume);
                Ok(())
            }
            Command::Loop(enabled) => {
                player.loop_at_end(enabled);
                Ok(())
            }
            Command::Status => {
                print_status(player);
                Ok(())
            }
            Command::Quit => return Ok(false),
        };

        if let Err(e) = result {
            warn!("{}", e);
        }
    }

    Ok(true)
}

fn print_status(player: &Playback) {
    let position = player.curr_pos().unwrap_or(0.0);
    let mut stdout = io::stdout().lock();
    let _ = writeln!(
        stdout,
        "{} {:.2}/{:.2}s volume={:.2} loop={}",
        player.state(),
        position,
        player.duration(),
        player.volume(),
        if player.loops_at_end() { "on" } else { "off" }
    );
}

/// Poll until playback leaves the playing state. A paused player is left
/// as is: nothing would resume it once input has ended.
fn wait_until_finished(player: &mut Playback) -> Result<()> {
    loop {
        if let Some(fault) = player.take_stream_fault() {
            return Err(fault).context("Audio stream failed");
        }
        if !keep_waiting(player.state()) {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn keep_waiting(state: PlaybackState) -> bool {
    state == PlaybackState::Playing
}
