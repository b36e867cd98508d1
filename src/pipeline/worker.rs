//! Playback queue worker with state machine.
//!
//! IDLE → RENDERING → PLAYING → CLEANUP → IDLE, STOPPED on cancellation.
//!
//! Exactly one message is rendered and played at a time. A failing message
//! is logged and dropped; the loop itself only ends on cancellation or when
//! every producer is gone. [`supervise`] restarts the loop if it dies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::assembler::{AudioAssembler, MessageContext};
use super::queue::{Dequeue, MessageReceiver, Ticket};
use super::segments::resolve;
use super::tokenizer::tokenize;
use crate::config::SupervisorConfig;
use crate::error::Result;
use crate::library::SampleLibrary;
use crate::player::AudioPlayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Rendering,
    Playing,
    Cleanup,
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Rendering => write!(f, "RENDERING"),
            Self::Playing => write!(f, "PLAYING"),
            Self::Cleanup => write!(f, "CLEANUP"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Cancelled,
    QueueClosed,
}

pub struct PlaybackWorker {
    assembler: Arc<AudioAssembler>,
    library: Arc<SampleLibrary>,
    player: Arc<dyn AudioPlayer>,
    sound_cap: usize,
    poll_interval: Duration,
    state: watch::Sender<WorkerState>,
    cancel: CancellationToken,
}

impl PlaybackWorker {
    pub fn new(
        assembler: Arc<AudioAssembler>,
        library: Arc<SampleLibrary>,
        player: Arc<dyn AudioPlayer>,
        sound_cap: usize,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            assembler,
            library,
            player,
            sound_cap,
            poll_interval,
            state,
            cancel,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    #[cfg(test)]
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    fn set_state(&self, next: WorkerState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            info!("State: {prev} → {next}");
        }
    }

    /// Consume the queue until cancelled or closed.
    pub async fn run(&self, rx: &mut MessageReceiver) -> WorkerExit {
        self.set_state(WorkerState::Idle);
        debug!("Waiting for messages");

        let exit = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break WorkerExit::Cancelled,
                next = rx.next(self.poll_interval) => next,
            };

            match next {
                Dequeue::Timeout => continue,
                Dequeue::Closed => break WorkerExit::QueueClosed,
                Dequeue::Message(ticket) => {
                    self.handle(ticket).await;
                    if self.cancel.is_cancelled() {
                        break WorkerExit::Cancelled;
                    }
                }
            }
        };

        self.set_state(WorkerState::Stopped);
        info!("Playback worker stopped ({exit:?})");
        exit
    }

    async fn handle(&self, ticket: Ticket) {
        let started = Instant::now();
        info!("Processing \"{}\" ({} queued)", ticket.text, ticket.queue_len());

        let mut ctx = MessageContext::new();
        // Cancelling drops the render mid-step. A blocking concat or file write
        // already handed to the runtime still finishes and may leave a file
        // behind after cleanup; the workspace clean at shutdown removes it.
        let outcome = tokio::select! {
            result = self.process(&ticket.text, &mut ctx) => Some(result),
            _ = self.cancel.cancelled() => None,
        };

        match outcome {
            Some(Ok(())) => info!("Message done in {:.0}ms", started.elapsed().as_secs_f64() * 1000.0),
            Some(Err(e)) => error!("Message \"{}\" failed: {e}", ticket.text),
            None => info!("Cancelled while handling \"{}\"", ticket.text),
        }

        self.set_state(WorkerState::Cleanup);
        let removed = ctx.cleanup();
        self.assembler.workspace().clean();
        debug!("Removed {removed} intermediate file(s)");

        self.set_state(WorkerState::Idle);
        ticket.done();
    }

    async fn process(&self, text: &str, ctx: &mut MessageContext) -> Result<()> {
        self.set_state(WorkerState::Rendering);

        let tokens = tokenize(text);
        debug!("Tokens: {tokens:?}");
        let segments = resolve(&tokens, &self.library, self.sound_cap, &mut ctx.samples_used);
        debug!("{} segment(s), {} sample(s)", segments.len(), ctx.samples_used);

        let Some(clip) = self.assembler.render_message(&segments, ctx).await? else {
            info!("Nothing playable in message");
            return Ok(());
        };

        self.set_state(WorkerState::Playing);
        self.player.play(&clip, &self.cancel).await
    }
}

/// Run `worker` until it exits cleanly, restarting it with backoff if it dies.
pub async fn supervise(
    worker: Arc<PlaybackWorker>,
    rx: MessageReceiver,
    config: &SupervisorConfig,
) -> WorkerExit {
    let rx = Arc::new(AsyncMutex::new(rx));
    let initial = Duration::from_millis(config.initial_backoff_ms);
    let max = Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms));
    let mut backoff = initial;

    loop {
        let started = Instant::now();
        let run = tokio::spawn({
            let worker = worker.clone();
            let rx = rx.clone();
            async move {
                let mut rx = rx.lock().await;
                worker.run(&mut rx).await
            }
        });

        let err = match run.await {
            Ok(exit) => return exit,
            Err(e) => e,
        };

        error!("Playback worker terminated unexpectedly: {err}");
        worker.assembler.workspace().clean();
        worker.set_state(WorkerState::Stopped);

        if started.elapsed() > max {
            backoff = initial;
        }
        warn!("Restarting playback worker in {}ms", backoff.as_millis());
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = worker.cancel.cancelled() => return WorkerExit::Cancelled,
        }
        backoff = (backoff * 2).min(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::tests::{read_wav, write_wav};
    use crate::error::PipelineError;
    use crate::pipeline::assembler::tests::{assembler, StubSynthesizer};
    use crate::pipeline::queue::{message_queue, QueueHandle};
    use crate::tmp::TempWorkspace;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    /// Decodes the stub synthesizer's clips back into text.
    #[derive(Default)]
    struct RecordingPlayer {
        played: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AudioPlayer for RecordingPlayer {
        async fn play(&self, path: &Path, _cancel: &CancellationToken) -> Result<()> {
            let text: String = read_wav(path)
                .into_iter()
                .filter_map(|s| char::from_u32(s.unsigned_abs() as u32))
                .collect();
            if text.contains("boom") {
                panic!("player exploded");
            }
            if text.contains("broken") {
                return Err(PipelineError::Playback("device unplugged".into()));
            }
            self.played.lock().unwrap().push(text);
            Ok(())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        workspace: TempWorkspace,
        player: Arc<RecordingPlayer>,
        worker: Arc<PlaybackWorker>,
        cancel: CancellationToken,
    }

    fn harness(poll_ms: u64) -> Harness {
        harness_with(poll_ms, StubSynthesizer::default())
    }

    fn harness_with(poll_ms: u64, synthesizer: StubSynthesizer) -> Harness {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = TempWorkspace::open(dir.path().join("tmp")).unwrap();
        let sample = dir.path().join("boo.wav");
        write_wav(&sample, &[7, 7], 22050);
        let library = SampleLibrary::from_entries([("[boo]".to_string(), sample)]);

        let player = Arc::new(RecordingPlayer::default());
        let cancel = CancellationToken::new();
        let worker = Arc::new(PlaybackWorker::new(
            Arc::new(assembler(workspace.clone(), Arc::new(synthesizer))),
            Arc::new(library),
            player.clone(),
            2,
            Duration::from_millis(poll_ms),
            cancel.clone(),
        ));

        Harness {
            _dir: dir,
            workspace,
            player,
            worker,
            cancel,
        }
    }

    async fn drain(handle: &QueueHandle) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !handle.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue did not drain");
    }

    fn played(h: &Harness) -> Vec<String> {
        h.player.played.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn plays_in_enqueue_order() {
        let h = harness(20);
        let (handle, rx) = message_queue();
        let supervisor = tokio::spawn({
            let worker = h.worker.clone();
            async move { supervise(worker, rx, &SupervisorConfig::default()).await }
        });

        let (a, b, c) = (handle.clone(), handle.clone(), handle.clone());
        a.enqueue("A");
        b.enqueue("B");
        c.enqueue("C");
        drain(&handle).await;

        assert_eq!(played(&h), vec!["A.", "B.", "C."]);
        h.cancel.cancel();
        assert_eq!(supervisor.await.unwrap(), WorkerExit::Cancelled);
    }

    #[tokio::test]
    async fn concurrent_producers_keep_their_own_order() {
        let h = harness(20);
        let (handle, mut rx) = message_queue();

        let producers: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|p| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    for word in ["one", "two", "three", "four", "five", "six"] {
                        handle.enqueue(format!("{p} {word}"));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }

        let worker = h.worker.clone();
        let run = tokio::spawn(async move { worker.run(&mut rx).await });
        drain(&handle).await;
        h.cancel.cancel();
        run.await.unwrap();

        let played = played(&h);
        assert_eq!(played.len(), 18);
        for p in ["a", "b", "c"] {
            let mine: Vec<String> = played
                .iter()
                .filter(|t| t.starts_with(&format!("{p} ")))
                .cloned()
                .collect();
            let expected: Vec<String> = ["one", "two", "three", "four", "five", "six"]
                .iter()
                .map(|word| format!("{p} {word}."))
                .collect();
            assert_eq!(mine, expected);
        }
    }

    #[tokio::test]
    async fn failures_are_isolated_and_leave_no_files() {
        let h = harness(20);
        let (handle, mut rx) = message_queue();
        let worker = h.worker.clone();
        let run = tokio::spawn(async move { worker.run(&mut rx).await });

        for message in [
            "hello [boo]",
            "fail",
            "{1}broken speaker",
            "",
            "{.}{.}",
            "[boo] {2}fail {.}ok",
            "bye",
        ] {
            handle.enqueue(message);
        }
        drain(&handle).await;

        assert_eq!(h.workspace.wav_count(), 0);
        assert_eq!(played(&h).len(), 3);
        assert_eq!(played(&h)[2], "bye.");
        assert_eq!(h.worker.state(), WorkerState::Idle);

        h.cancel.cancel();
        assert_eq!(run.await.unwrap(), WorkerExit::Cancelled);
    }

    #[tokio::test]
    async fn cancellation_interrupts_an_idle_wait() {
        let h = harness(100);
        let (_handle, mut rx) = message_queue();
        let mut state = h.worker.subscribe();
        let worker = h.worker.clone();
        let run = tokio::spawn(async move { worker.run(&mut rx).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        let cancelled_at = Instant::now();
        h.cancel.cancel();

        let exit = tokio::time::timeout(Duration::from_millis(100), run)
            .await
            .expect("worker did not stop within the poll interval")
            .unwrap();
        assert_eq!(exit, WorkerExit::Cancelled);
        assert!(cancelled_at.elapsed() < Duration::from_millis(100));
        state.wait_for(|s| *s == WorkerState::Stopped).await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_interrupts_rendering() {
        let h = harness_with(
            20,
            StubSynthesizer {
                delay: Duration::from_secs(30),
                ..Default::default()
            },
        );
        let (handle, mut rx) = message_queue();
        let mut state = h.worker.subscribe();
        let worker = h.worker.clone();
        let run = tokio::spawn(async move { worker.run(&mut rx).await });

        handle.enqueue("never finished");
        state.wait_for(|s| *s == WorkerState::Rendering).await.unwrap();
        h.cancel.cancel();

        let exit = tokio::time::timeout(Duration::from_millis(200), run)
            .await
            .expect("render was not interrupted")
            .unwrap();
        assert_eq!(exit, WorkerExit::Cancelled);
        assert_eq!(h.worker.state(), WorkerState::Stopped);
        assert!(handle.is_empty());
        assert!(played(&h).is_empty());
        assert_eq!(h.workspace.wav_count(), 0);
    }

    #[tokio::test]
    async fn stops_when_all_producers_are_gone() {
        let h = harness(20);
        let (handle, mut rx) = message_queue();
        handle.enqueue("last words");
        drop(handle);

        assert_eq!(h.worker.run(&mut rx).await, WorkerExit::QueueClosed);
        assert_eq!(played(&h), vec!["last words."]);
    }

    #[tokio::test]
    async fn supervisor_restarts_after_a_panic() {
        let h = harness(20);
        let (handle, rx) = message_queue();
        let config = SupervisorConfig {
            initial_backoff_ms: 10,
            max_backoff_ms: 50,
        };
        let supervisor = tokio::spawn({
            let worker = h.worker.clone();
            async move { supervise(worker, rx, &config).await }
        });

        handle.enqueue("boom");
        handle.enqueue("still alive");
        drain(&handle).await;

        assert_eq!(played(&h), vec!["still alive."]);
        assert_eq!(h.workspace.wav_count(), 0);

        h.cancel.cancel();
        assert_eq!(supervisor.await.unwrap(), WorkerExit::Cancelled);
    }
}
