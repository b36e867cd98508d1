//! Speech synthesis over HTTP.
//!
//! The synthesizer is a local TTS server: `GET {endpoint}?text=...` answers
//! with a WAV body, which is written to the path the caller picked.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{PipelineError, Result};

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` into a WAV file at `dest`.
    async fn synthesize(&self, text: &str, dest: &Path) -> Result<()>;
}

pub struct HttpSynthesizer {
    endpoint: String,
    client: Client,
}

impl HttpSynthesizer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, dest: &Path) -> Result<()> {
        debug!("Synthesizing '{text}'");

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("text", text)])
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    PipelineError::Synthesis(format!("Cannot connect to TTS at {}", self.endpoint))
                } else if e.is_timeout() {
                    PipelineError::Synthesis("TTS request timed out".into())
                } else {
                    PipelineError::Http(e)
                }
            })?;

        if !resp.status().is_success() {
            return Err(PipelineError::Synthesis(format!(
                "TTS returned status {}",
                resp.status()
            )));
        }

        let body = resp.bytes().await?;
        if body.is_empty() {
            return Err(PipelineError::Synthesis("TTS returned an empty body".into()));
        }

        tokio::fs::write(dest, &body).await?;
        debug!("Wrote {} bytes to {}", body.len(), dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn synth(endpoint: String) -> HttpSynthesizer {
        HttpSynthesizer::new(&endpoint, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn writes_response_body_with_decoded_query() {
        let app = Router::new().route(
            "/api/tts",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                q.get("text").cloned().unwrap_or_default().into_bytes()
            }),
        );
        let base = serve(app).await;
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("out.wav");

        synth(format!("{base}/api/tts"))
            .synthesize("zażółć & gęślą jaźń?", &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "zażółć & gęślą jaźń?");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let app = Router::new().route(
            "/api/tts",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("out.wav");

        let err = synth(format!("{base}/api/tts"))
            .synthesize("hi.", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_synthesis_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("out.wav");

        let err = synth(format!("http://{addr}/api/tts"))
            .synthesize("hi.", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis(ref m) if m.contains("Cannot connect")));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn empty_body_is_an_error() {
        let app = Router::new().route("/api/tts", get(|| async { Vec::<u8>::new() }));
        let base = serve(app).await;
        let dir = tempfile::TempDir::new().unwrap();

        let result = synth(format!("{base}/api/tts"))
            .synthesize("hi.", &dir.path().join("out.wav"))
            .await;
        assert!(result.is_err());
    }
}
