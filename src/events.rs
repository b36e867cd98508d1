//! Event payloads from the streaming platform.
//!
//! Channel-point redemptions for the configured reward, and optionally
//! whispers, are turned into queue messages. Anything else is dropped.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::pipeline::queue::QueueHandle;

#[derive(Debug, Deserialize)]
struct RedemptionEvent {
    data: RedemptionData,
}

#[derive(Debug, Deserialize)]
struct RedemptionData {
    redemption: Redemption,
}

#[derive(Debug, Deserialize)]
pub struct Redemption {
    pub user_input: String,
    pub user: User,
    pub reward: Reward,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct Reward {
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct WhisperEvent {
    data_object: WhisperData,
}

#[derive(Debug, Deserialize)]
struct WhisperData {
    body: String,
}

pub fn parse_redemption(payload: &Value) -> Result<Redemption, serde_json::Error> {
    RedemptionEvent::deserialize(payload).map(|e| e.data.redemption)
}

pub fn parse_whisper(payload: &Value) -> Result<String, serde_json::Error> {
    WhisperEvent::deserialize(payload).map(|e| e.data_object.body)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Queued,
    /// Valid payload we do not speak (other reward, whispers disabled).
    Ignored,
    Malformed(String),
    /// The worker is gone.
    Closed,
}

/// Routes platform events into the playback queue.
#[derive(Clone)]
pub struct EventRouter {
    reward_name: String,
    accept_whispers: bool,
    queue: QueueHandle,
}

impl EventRouter {
    pub fn new(reward_name: &str, accept_whispers: bool, queue: QueueHandle) -> Self {
        Self {
            reward_name: reward_name.to_string(),
            accept_whispers,
            queue,
        }
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    pub fn on_redemption(&self, payload: &Value) -> Outcome {
        let redemption = match parse_redemption(payload) {
            Ok(r) => r,
            Err(e) => {
                warn!("Error in redemption body: {e}");
                return Outcome::Malformed(e.to_string());
            }
        };

        if redemption.reward.title != self.reward_name {
            debug!("Ignoring redemption of \"{}\"", redemption.reward.title);
            return Outcome::Ignored;
        }

        info!("{} said: {}", redemption.user.display_name, redemption.user_input);
        self.push(redemption.user_input)
    }

    pub fn on_whisper(&self, payload: &Value) -> Outcome {
        if !self.accept_whispers {
            return Outcome::Ignored;
        }
        match parse_whisper(payload) {
            Ok(body) => self.push(body),
            Err(e) => {
                warn!("Error in whisper body: {e}");
                Outcome::Malformed(e.to_string())
            }
        }
    }

    pub fn on_text(&self, text: &str) -> Outcome {
        self.push(text.to_string())
    }

    fn push(&self, message: String) -> Outcome {
        if self.queue.enqueue(message) {
            Outcome::Queued
        } else {
            warn!("Playback queue is closed, dropping message");
            Outcome::Closed
        }
    }
}
