use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite;

use super::types::BinanceTradeEvent;
use crate::model::tick::Tick;

/// Exponential backoff for reconnection.
struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Drops a message whose (price, time) repeats the last one seen for its symbol.
#[derive(Debug, Default)]
pub struct LastSeenFilter {
    last: HashMap<String, (f64, i64)>,
}

impl LastSeenFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the tick differs from the previous one for its symbol.
    pub fn admit(&mut self, tick: &Tick) -> bool {
        let key = (tick.price, tick.timestamp_ms);
        match self.last.get(&tick.symbol) {
            Some(prev) if *prev == key => false,
            _ => {
                self.last.insert(tick.symbol.clone(), key);
                true
            }
        }
    }
}

pub fn tick_from_trade(event: &BinanceTradeEvent) -> Option<Tick> {
    let timestamp_ms = i64::try_from(event.trade_time).ok()?;
    Some(Tick::new(
        event.symbol.to_ascii_uppercase(),
        event.price,
        timestamp_ms,
    ))
}

pub struct BinanceWsClient {
    url: String,
}

impl BinanceWsClient {
    pub fn new(stream_url: impl Into<String>) -> Self {
        Self {
            url: stream_url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and run the WebSocket loop with automatic reconnection,
    /// forwarding ticks in arrival order through `tick_tx`.
    pub async fn connect_and_run(
        &self,
        tick_tx: mpsc::Sender<Tick>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0);
        let mut attempt: u32 = 0;
        let mut filter = LastSeenFilter::new();

        loop {
            attempt += 1;
            match self
                .connect_once(&tick_tx, &mut filter, &mut backoff, &mut shutdown)
                .await
            {
                Ok(()) => {
                    tracing::info!(url = %self.url, "WebSocket closed on shutdown");
                    break;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        url = %self.url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "WS error, reconnecting"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => {
                            tracing::info!("Shutdown during reconnect");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn connect_once(
        &self,
        tick_tx: &mpsc::Sender<Tick>,
        filter: &mut LastSeenFilter,
        backoff: &mut ExponentialBackoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!(url = %self.url, "Connecting");

        let (ws_stream, _resp) = tokio_tungstenite::connect_async(&self.url)
            .await
            .context("WebSocket connect failed")?;

        tracing::info!(url = %self.url, "WebSocket connected");
        backoff.reset();

        let (_write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            let event = match serde_json::from_str::<BinanceTradeEvent>(&text) {
                                Ok(event) => event,
                                Err(e) => {
                                    tracing::debug!(error = %e, "Failed to parse WS message");
                                    continue;
                                }
                            };
                            let Some(tick) = tick_from_trade(&event) else {
                                tracing::debug!(trade_time = event.trade_time, "Trade time out of range");
                                continue;
                            };
                            if !filter.admit(&tick) {
                                continue;
                            }
                            // Awaiting keeps arrival order; the dispatcher is the only reader.
                            if tick_tx.send(tick).await.is_err() {
                                tracing::info!("Tick channel closed, stopping WS reader");
                                return Ok(());
                            }
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tokio-tungstenite handles pong automatically
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(anyhow::anyhow!("WebSocket read error: {}", e));
                        }
                        None => {
                            return Err(anyhow::anyhow!("WebSocket stream ended"));
                        }
                    }
                }
                _ = shutdown.changed() => {
                    return Ok(());
                }
            }
        }
    }
}
