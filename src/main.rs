//! redeem-tts: speaks channel-point redemptions with samples and voice effects.

mod api;
mod config;
mod dsp;
mod error;
mod events;
mod library;
mod pipeline;
mod player;
mod synth;
mod tmp;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pipeline::assembler::AudioAssembler;
use pipeline::numbers::NumberNormalizer;
use pipeline::worker::{supervise, PlaybackWorker};

#[derive(Parser, Debug)]
#[command(name = "redeem-tts", about = "Channel-point text-to-speech player")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable the local ingest API
    #[arg(long)]
    no_api: bool,

    /// Render clips without playing them
    #[arg(long)]
    silent: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy HTTP internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,hyper_util=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,hyper_util=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("redeem-tts starting");

    let config = config::Config::load(args.config.as_deref());
    info!(
        "TTS: reward \"{}\", sound cap {}, max effect repetitions {:?}",
        config.tts.reward_name, config.tts.sound_cap, config.tts.max_effect_repetitions
    );

    let workspace = tmp::TempWorkspace::open(&config.paths.tmp_dir)?;
    workspace.clean();

    let library = Arc::new(library::SampleLibrary::load(
        &config.paths.sounds_dir,
        &config.library,
    ));
    if library.is_empty() {
        tracing::warn!("No sounds in {}, [name] references will be spoken", config.paths.sounds_dir.display());
    }

    let synthesizer = synth::HttpSynthesizer::new(
        &config.tts.endpoint,
        Duration::from_secs(config.tts.request_timeout_secs),
    )?;
    let assembler = Arc::new(AudioAssembler::new(
        Arc::new(synthesizer),
        Arc::new(dsp::SoxEngine::new()),
        NumberNormalizer::new(config.tts.language),
        workspace.clone(),
        config.tts.max_effect_repetitions,
    ));

    let player: Arc<dyn player::AudioPlayer> = if args.silent || !config.playback.enabled {
        Arc::new(player::SilentPlayer)
    } else {
        Arc::new(player::RodioPlayer)
    };

    let cancel = CancellationToken::new();
    let worker = Arc::new(PlaybackWorker::new(
        assembler,
        library.clone(),
        player,
        config.tts.sound_cap,
        Duration::from_millis(config.queue.poll_interval_ms),
        cancel.clone(),
    ));

    let (queue, receiver) = pipeline::queue::message_queue();
    let events = events::EventRouter::new(
        &config.tts.reward_name,
        config.events.accept_whispers,
        queue,
    );

    if config.api.enabled && !args.no_api {
        let state = api::ApiState {
            events: events.clone(),
            worker_state: worker.subscribe(),
            library,
        };
        api::start_api(state, config.api.port, cancel.clone()).await;
    }

    // Stop on Ctrl+C
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Caught interrupt, shutting down");
            }
            cancel.cancel();
        }
    });

    info!("Ready");
    let exit = supervise(worker, receiver, &config.supervisor).await;
    info!("Playback stopped ({exit:?}), cleaning up");

    // Keep the producer side alive until the worker is done.
    drop(events);
    workspace.clean();

    Ok(())
}
