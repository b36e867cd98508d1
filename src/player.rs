//! Local playback of finished clips.
//!
//! Playback blocks until the clip ends, so it runs on a blocking thread and
//! polls for cancellation while the sink drains.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use rodio::{Decoder, OutputStreamBuilder, Sink};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play `path` to completion, or stop early once `cancel` fires.
    async fn play(&self, path: &Path, cancel: &CancellationToken) -> Result<()>;
}

/// Default output device via rodio.
pub struct RodioPlayer;

#[async_trait]
impl AudioPlayer for RodioPlayer {
    async fn play(&self, path: &Path, cancel: &CancellationToken) -> Result<()> {
        let path = path.to_path_buf();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || play_blocking(&path, &cancel)).await?
    }
}

fn play_blocking(path: &Path, cancel: &CancellationToken) -> Result<()> {
    let mut stream = OutputStreamBuilder::open_default_stream()
        .map_err(|e| PipelineError::Playback(format!("Failed to open audio output: {e}")))?;
    stream.log_on_drop(false);

    let file = File::open(path)?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| PipelineError::Playback(format!("Failed to decode {}: {e}", path.display())))?;

    let sink = Sink::connect_new(stream.mixer());
    sink.append(source);
    debug!("Playing {}", path.display());

    while !sink.empty() {
        if cancel.is_cancelled() {
            sink.stop();
            info!("Playback cancelled");
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    Ok(())
}

/// Render-only mode: logs instead of playing.
pub struct SilentPlayer;

#[async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self, path: &Path, _cancel: &CancellationToken) -> Result<()> {
        info!("Playback disabled, skipping {}", path.display());
        Ok(())
    }
}
