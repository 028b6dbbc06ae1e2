use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use lumen_core::{
    shared_function, ChannelGroup, ConfigManager, GrandMaster, MasterTimer, OutputMap,
    SharedDmxSource, TimerEvent,
};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;

mod artnet;
mod demo;

use artnet::{ArtNetMode, ArtNetSink};
use demo::{Chase, Pulse, Slider, Waveform};

/// Runs the lumen master timer with a few demo effects and sends the result over Art-Net.
#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(about = "Lumen lighting engine")]
struct Args {
    /// Path to the engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick frequency in Hz (overrides the configuration file)
    #[arg(long)]
    frequency: Option<u32>,

    /// Art-Net Source IP address
    #[arg(long, value_parser = parse_ip)]
    source_ip: Option<IpAddr>,

    /// Art-Net Destination IP address (optional - if not provided, broadcast mode will be used)
    #[arg(long, value_parser = parse_ip)]
    dest_ip: Option<IpAddr>,

    /// Art-Net port (default: 6454)
    #[arg(long, default_value = "6454")]
    artnet_port: u16,

    /// Force broadcast mode even if destination IP is provided
    #[arg(long, default_value = "false")]
    broadcast: bool,

    /// How long to run the demo before fading out, in seconds
    #[arg(long, default_value = "10")]
    duration: u64,

    /// Fade-out time in milliseconds (defaults to the configured value)
    #[arg(long)]
    fade_out: Option<u32>,

    /// Waveform used by the demo chase
    #[arg(long, value_enum, default_value = "sine")]
    waveform: Waveform,
}

fn parse_ip(s: &str) -> Result<IpAddr, String> {
    s.parse().map_err(|e| format!("Invalid IP address: {}", e))
}

fn artnet_mode(args: &Args) -> ArtNetMode {
    match (args.broadcast, args.dest_ip) {
        (false, Some(dest_ip)) => {
            let source_ip = args
                .source_ip
                .unwrap_or_else(|| IpAddr::from([0, 0, 0, 0]));
            ArtNetMode::Unicast(
                SocketAddr::new(source_ip, 0),
                SocketAddr::new(dest_ip, args.artnet_port),
            )
        }
        _ => ArtNetMode::Broadcast,
    }
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = ConfigManager::new(args.config.clone());
    let mut settings = config.load()?;
    if let Some(frequency) = args.frequency {
        settings.frequency_hz = frequency;
    }
    if let Err(errors) = ConfigManager::validate_settings(&settings) {
        anyhow::bail!("Invalid settings: {}", errors.join(", "));
    }
    log::info!(
        "Loaded settings from {}: {} Hz, {} universe(s)",
        config.config_path().display(),
        settings.frequency_hz,
        settings.universes
    );

    let output = Arc::new(OutputMap::new(
        settings.universes,
        GrandMaster::new(
            settings.grand_master_channel_mode,
            settings.grand_master_value_mode,
        ),
    ));

    let mode = artnet_mode(&args);
    log::info!("Art-Net mode: {:?}", mode);
    output.add_sink(Box::new(ArtNetSink::new(mode, args.artnet_port)?));

    let timer = Arc::new(MasterTimer::new(Arc::clone(&output), &settings));
    let events = timer.subscribe();
    let event_logger = thread::spawn(move || log_events(events));

    let tick_ms = timer.tick();
    let chase = shared_function(
        Chase::new("Chase", args.waveform, (0..8).collect(), 2000, tick_ms).with_release(800),
    );
    let strobe = shared_function(Pulse::new("Opening flash", vec![8, 9], 10));
    let slider = Arc::new(Mutex::new(Slider::new(
        "Haze slider",
        16,
        ChannelGroup::Other,
        64,
    )));

    timer.register_dmx_source(slider.clone());
    timer.start_function(strobe);
    timer.start_function(chase);
    timer.start()?;

    let half = Duration::from_secs(args.duration) / 2;
    thread::sleep(half);
    slider.lock().set_value(128);
    log::info!("{} function(s) running", timer.running_functions());
    thread::sleep(half);

    let fade_out = args.fade_out.unwrap_or(settings.default_fade_out_ms);
    timer.fade_and_stop_all(i32::try_from(fade_out).unwrap_or(i32::MAX));
    thread::sleep(Duration::from_millis(fade_out as u64 + 2 * tick_ms as u64));

    let slider_source: SharedDmxSource = slider;
    timer.unregister_dmx_source(&slider_source);
    timer.stop();

    drop(timer);
    if event_logger.join().is_err() {
        log::error!("Event logger thread panicked");
    }
    Ok(())
}

fn log_events(mut events: tokio::sync::broadcast::Receiver<TimerEvent>) {
    loop {
        match events.blocking_recv() {
            Ok(TimerEvent::FunctionListChanged { running }) => {
                log::info!("Running functions: {}", running);
            }
            Ok(TimerEvent::FadeSequenceCompleted) => log::info!("Fade-out complete"),
            Ok(event) => log::debug!("Timer event: {:?}", event),
            Err(RecvError::Lagged(missed)) => log::warn!("Missed {} timer events", missed),
            Err(RecvError::Closed) => break,
        }
    }
}
