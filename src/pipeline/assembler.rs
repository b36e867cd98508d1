//! Audio assembler: segments → intermediate files → one playable clip.
//!
//! Per segment: synthesize speech sources, concatenate them with library
//! samples in order, then run the segment's effect chain. Per message:
//! concatenate the segment outputs. Every file created on the way is
//! recorded in the [`MessageContext`] so it can be removed whatever happens.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::effects::aggregate;
use super::numbers::NumberNormalizer;
use super::segments::{Segment, Source};
use crate::dsp::AudioEngine;
use crate::error::Result;
use crate::synth::SpeechSynthesizer;
use crate::tmp::TempWorkspace;

/// Per-message state, owned by the worker for the lifetime of one message.
#[derive(Debug, Default)]
pub struct MessageContext {
    /// Library samples spent by this message, counted against the sound cap.
    pub samples_used: usize,
    /// Final clip, once rendered.
    pub output: Option<PathBuf>,
    temp_files: Vec<PathBuf>,
}

impl MessageContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a new intermediate file path and track it.
    pub fn new_temp(&mut self, workspace: &TempWorkspace) -> PathBuf {
        let path = workspace.new_wav_path();
        self.temp_files.push(path.clone());
        path
    }

    /// Delete one tracked file early.
    pub fn release(&mut self, path: &Path) {
        self.temp_files.retain(|p| p != path);
        remove_quietly(path);
    }

    #[cfg(test)]
    pub fn temp_files(&self) -> &[PathBuf] {
        &self.temp_files
    }

    /// Delete every tracked file, the final clip included.
    pub fn cleanup(&mut self) -> usize {
        let files = std::mem::take(&mut self.temp_files);
        for path in &files {
            remove_quietly(path);
        }
        self.output = None;
        files.len()
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {e}", path.display());
        }
    }
}

pub struct AudioAssembler {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    engine: Arc<dyn AudioEngine>,
    normalizer: NumberNormalizer,
    workspace: TempWorkspace,
    max_effect_repetitions: Option<u32>,
}

impl AudioAssembler {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        engine: Arc<dyn AudioEngine>,
        normalizer: NumberNormalizer,
        workspace: TempWorkspace,
        max_effect_repetitions: Option<u32>,
    ) -> Self {
        Self {
            synthesizer,
            engine,
            normalizer,
            workspace,
            max_effect_repetitions,
        }
    }

    pub fn workspace(&self) -> &TempWorkspace {
        &self.workspace
    }

    /// Spell out numbers and make sure the text ends like a sentence.
    pub fn prepare_text(&self, text: &str) -> String {
        let mut text = self.normalizer.normalize(text).trim().to_string();
        if !text.ends_with(['.', '!', '?']) {
            text.push('.');
        }
        text
    }

    /// Render one segment. `None` when nothing in it produced audio.
    pub async fn render_segment(
        &self,
        segment: &Segment,
        ctx: &mut MessageContext,
    ) -> Result<Option<PathBuf>> {
        let mut inputs = Vec::with_capacity(segment.sources.len());
        let mut synthesized = Vec::new();

        for source in &segment.sources {
            match source {
                Source::Sample { path, .. } => inputs.push(path.clone()),
                Source::Speech(text) => {
                    let text = self.prepare_text(text);
                    let dest = ctx.new_temp(&self.workspace);
                    match self.synthesizer.synthesize(&text, &dest).await {
                        Ok(()) => {
                            inputs.push(dest.clone());
                            synthesized.push(dest);
                        }
                        Err(e) => {
                            warn!("Skipping \"{text}\": {e}");
                            ctx.release(&dest);
                        }
                    }
                }
            }
        }

        if inputs.is_empty() {
            debug!("Segment produced no audio");
            return Ok(None);
        }

        let combined = ctx.new_temp(&self.workspace);
        let joined = self.engine.concat(&inputs, &combined).await;
        for path in &synthesized {
            ctx.release(path);
        }
        joined?;

        let plan = aggregate(&segment.effect_ids, self.max_effect_repetitions);
        let chain = plan.to_chain();
        if !plan.is_empty() {
            debug!("Effect plan {:?} → {} transform(s)", plan, chain.len());
        }

        let output = ctx.new_temp(&self.workspace);
        let applied = self.engine.apply(&chain, &combined, &output).await;
        ctx.release(&combined);
        applied?;

        Ok(Some(output))
    }

    /// Render every segment and join them into the final clip.
    /// Segments that fail are skipped; `None` when nothing is playable.
    pub async fn render_message(
        &self,
        segments: &[Segment],
        ctx: &mut MessageContext,
    ) -> Result<Option<PathBuf>> {
        let mut outputs = Vec::with_capacity(segments.len());
        for (i, segment) in segments.iter().enumerate() {
            match self.render_segment(segment, ctx).await {
                Ok(Some(path)) => outputs.push(path),
                Ok(None) => {}
                Err(e) => warn!("Skipping segment {}/{}: {e}", i + 1, segments.len()),
            }
        }

        let clip = match outputs.len() {
            0 => return Ok(None),
            // A lone segment is already the clip.
            1 => outputs.swap_remove(0),
            _ => {
                let clip = ctx.new_temp(&self.workspace);
                let joined = self.engine.concat(&outputs, &clip).await;
                for path in &outputs {
                    ctx.release(path);
                }
                joined?;
                clip
            }
        };

        ctx.output = Some(clip.clone());
        Ok(Some(clip))
    }
}
