use std::io::{self, BufRead};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use player::options::MediaOption;
use player::{Outcome, Player, PlayerConfig, PlayerError, PlayerEvent, Source};
use player_gst::GstEngine;

#[derive(Parser)]
#[command(
    name = "rtsp-player",
    about = "Play an RTSP stream or a local video file"
)]
struct Args {
    /// Video file path, file:// URI, or rtsp://host[:port]/path URL
    source: String,

    /// Delay between connection checks, in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_interval_ms: u64,

    /// Connection checks allowed for RTSP streams
    #[arg(long, default_value_t = 60)]
    remote_polls: u32,

    /// Connection checks allowed for local files
    #[arg(long, default_value_t = 30)]
    local_polls: u32,

    /// Let RTP use UDP instead of interleaving over TCP
    #[arg(long)]
    udp: bool,

    /// RTSP connection timeout, in milliseconds
    #[arg(long, default_value_t = 5000)]
    connect_timeout_ms: u32,

    /// Extra engine option in `:name[=value]` form (repeatable)
    #[arg(long = "option", short = 'o', value_parser = parse_option)]
    options: Vec<MediaOption>,
}

fn parse_option(s: &str) -> Result<MediaOption, String> {
    MediaOption::parse(s).ok_or_else(|| format!("expected :name[=value], got {s:?}"))
}

impl Args {
    fn config(&self) -> PlayerConfig {
        let mut config = PlayerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            remote_poll_budget: self.remote_polls,
            local_poll_budget: self.local_polls,
            extra_options: self.options.clone(),
            ..PlayerConfig::default()
        };
        config.remote.force_tcp = !self.udp;
        config.remote.connect_timeout_ms = self.connect_timeout_ms;
        config
    }
}

fn print_error(error: &PlayerError) {
    eprintln!("error: {error}");
    for hint in error.hints() {
        eprintln!("  - {hint}");
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let source = match Source::parse(&args.source) {
        Ok(source) => source,
        Err(e) => {
            print_error(&e);
            return ExitCode::from(2);
        }
    };

    let engine = match GstEngine::new() {
        Ok(engine) => engine,
        Err(e) => {
            print_error(&e);
            return ExitCode::FAILURE;
        }
    };
    let mut player = match Player::new(engine, args.config()) {
        Ok(player) => player,
        Err(e) => {
            print_error(&e);
            return ExitCode::FAILURE;
        }
    };

    // Ends when the player is disposed and the channel closes.
    let events = player.events();
    let printer = thread::spawn(move || {
        for event in events {
            match event {
                PlayerEvent::StatusChanged { status, .. } => println!("{status}"),
                PlayerEvent::ErrorOccurred { error, .. } => print_error(&error),
            }
        }
    });

    println!("Playing {source} ({})", source.kind());
    let code = match player.play(&source).and_then(|connect| connect.wait()) {
        Ok(Outcome::Connected(_)) => {
            println!("Press Enter to stop");
            let mut line = String::new();
            if let Err(e) = io::stdin().lock().read_line(&mut line) {
                tracing::warn!(error = %e, "failed to read stdin");
            }
            player.stop();
            ExitCode::SUCCESS
        }
        // Failures were already reported through the event channel.
        Ok(Outcome::Failed(_) | Outcome::Cancelled) | Err(_) => ExitCode::FAILURE,
    };

    player.dispose();
    if printer.join().is_err() {
        tracing::error!("event printer panicked");
    }
    code
}
