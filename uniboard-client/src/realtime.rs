//! Push-channel manager with bounded reconnect backoff.
//!
//! Delivery on this channel is best-effort: at-most-once, no replay, no
//! ordering across reconnects. The manager decodes text frames into
//! [`PushEvent`]s and forwards them to the driver; after a drop it
//! reconnects with jittered exponential backoff, and after
//! `max_attempts` consecutive failures it reports a lapse and stops. The
//! driver refreshes on resume, which is the only thing bounding the
//! staleness of events lost while disconnected.

use crate::api_client::ApiClientError;
use crate::config::{ClientConfig, ReconnectConfig};
use futures_util::StreamExt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::warn;
use uniboard_core::PushEvent;
use uniboard_engine::SyncEvent;

#[derive(Clone)]
pub struct PushClient {
    endpoint: String,
    reconnect: ReconnectConfig,
}

impl PushClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.push_endpoint.clone(),
            reconnect: config.reconnect.clone(),
        }
    }

    pub async fn connect(
        &self,
    ) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, ApiClientError> {
        let (stream, _) = tokio_tungstenite::connect_async(self.endpoint.as_str()).await?;
        Ok(stream)
    }

    pub fn reconnect_config(&self) -> &ReconnectConfig {
        &self.reconnect
    }
}

/// Run the push channel until reconnect attempts are exhausted.
pub fn spawn_push_manager(push: PushClient, sender: mpsc::Sender<SyncEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = push.reconnect.initial_ms;
        let mut attempts = 0u32;
        let mut had_session = false;
        loop {
            match push.connect().await {
                Ok(mut stream) => {
                    attempts = 0;
                    backoff = push.reconnect.initial_ms;
                    let _ = sender
                        .send(SyncEvent::ChannelUp {
                            resumed: had_session,
                        })
                        .await;
                    had_session = true;

                    while let Some(message) = stream.next().await {
                        match message {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<PushEvent>(&text) {
                                    Ok(event) => {
                                        let _ = sender.send(SyncEvent::Push(event)).await;
                                    }
                                    Err(err) => {
                                        warn!(%err, "undecodable push frame dropped");
                                    }
                                }
                            }
                            Ok(Message::Close(_)) => break,
                            Ok(_) => {}
                            Err(err) => {
                                warn!(%err, "push channel read error");
                                break;
                            }
                        }
                    }

                    let _ = sender
                        .send(SyncEvent::ChannelDown {
                            reason: "connection closed".to_string(),
                        })
                        .await;
                }
                Err(err) => {
                    attempts += 1;
                    warn!(%err, attempts, "push channel connect failed");
                    if attempts >= push.reconnect.max_attempts {
                        let _ = sender.send(SyncEvent::ChannelLapsed { attempts }).await;
                        return;
                    }
                }
            }

            let delay = jittered_backoff(backoff, push.reconnect.jitter_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            let next = (backoff as f64 * push.reconnect.multiplier) as u64;
            backoff = next.min(push.reconnect.max_ms);
        }
    })
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    let jitter = nanos % jitter_ms;
    base_ms.saturating_add(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_jitter_returns_base() {
        assert_eq!(jittered_backoff(250, 0), 250);
    }

    #[test]
    fn test_jitter_is_bounded() {
        for _ in 0..100 {
            let delay = jittered_backoff(250, 100);
            assert!((250..350).contains(&delay));
        }
    }
}
