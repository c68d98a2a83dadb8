use tokio::sync::{mpsc, watch};

use crate::error::CoreError;
use crate::event::CoreEvent;
use crate::model::tick::Tick;
use crate::pipeline::InstrumentPipeline;
use crate::sink::EventSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub ticks_received: u64,
    pub ticks_rejected: u64,
    pub ticks_dropped: u64,
    pub foreign_ticks: u64,
    pub bars_completed: u64,
    pub samples: u64,
    pub signals: u64,
    pub numeric_defects: u64,
    pub sink_failures: u64,
}

/// Single writer for one instrument: every tick goes through `feed` one at a
/// time, in arrival order, and the resulting events go to every sink.
pub struct TickDispatcher {
    pipeline: InstrumentPipeline,
    sinks: Vec<Box<dyn EventSink>>,
    stats: DispatchStats,
}

impl TickDispatcher {
    pub fn new(pipeline: InstrumentPipeline) -> Self {
        Self {
            pipeline,
            sinks: Vec::new(),
            stats: DispatchStats::default(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Apply one tick for `instrument_id` and forward what it produced.
    pub fn feed(&mut self, instrument_id: &str, price: f64, timestamp_ms: i64) -> Vec<CoreEvent> {
        self.stats.ticks_received += 1;
        if !instrument_id.eq_ignore_ascii_case(self.pipeline.symbol()) {
            self.stats.foreign_ticks += 1;
            tracing::warn!(
                instrument = %instrument_id,
                expected = %self.pipeline.symbol(),
                "ignoring tick for unmanaged instrument"
            );
            return Vec::new();
        }

        let events = match self.pipeline.feed(price, timestamp_ms) {
            Ok(events) => events,
            Err(CoreError::InvalidTick {
                price,
                timestamp_ms,
            }) => vec![CoreEvent::TickRejected {
                symbol: self.pipeline.symbol().to_string(),
                price,
                timestamp_ms,
            }],
            Err(e) => {
                tracing::error!(error = %e, "unexpected pipeline error");
                Vec::new()
            }
        };

        for event in &events {
            self.count(event);
            self.forward(event);
        }
        events
    }

    pub fn feed_tick(&mut self, tick: &Tick) -> Vec<CoreEvent> {
        self.feed(&tick.symbol, tick.price, tick.timestamp_ms)
    }

    fn count(&mut self, event: &CoreEvent) {
        match event {
            CoreEvent::BarCompleted { .. } => self.stats.bars_completed += 1,
            CoreEvent::IndicatorUpdated { .. } => self.stats.samples += 1,
            CoreEvent::SignalFired { .. } => self.stats.signals += 1,
            CoreEvent::TickRejected { .. } => self.stats.ticks_rejected += 1,
            CoreEvent::TickDropped { .. } => self.stats.ticks_dropped += 1,
            CoreEvent::NumericDefect { .. } => self.stats.numeric_defects += 1,
        }
    }

    fn forward(&mut self, event: &CoreEvent) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.handle(event) {
                self.stats.sink_failures += 1;
                tracing::warn!(
                    sink = sink.name(),
                    event = event.kind(),
                    error = ?e,
                    "sink rejected event"
                );
            }
        }
    }

    /// Drain `tick_rx` until it closes or shutdown is signalled.
    pub async fn run(
        &mut self,
        mut tick_rx: mpsc::Receiver<Tick>,
        mut shutdown: watch::Receiver<bool>,
    ) -> DispatchStats {
        loop {
            tokio::select! {
                tick = tick_rx.recv() => {
                    match tick {
                        Some(tick) => {
                            self.feed_tick(&tick);
                        }
                        None => {
                            tracing::info!("Tick channel closed, dispatcher exiting");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Dispatcher shutting down");
                    break;
                }
            }
        }
        self.flush();
        self.stats
    }

    pub fn flush(&mut self) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.flush() {
                self.stats.sink_failures += 1;
                tracing::warn!(sink = sink.name(), error = ?e, "sink flush failed");
            }
        }
    }

    pub fn pipeline(&self) -> &InstrumentPipeline {
        &self.pipeline
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}
