/*!
 * The concurrent pipeline: producers fan into one bounded decoding
 * queue, decode workers run the codecs and the Mode S parser, the
 * middleware chain filters, and the sharded registry integrates each
 * frame and emits events to the bus.
 *
 * Shutdown comes in two modes: `wait()` lets file producers end
 * naturally and drains everything; `stop()` cancels live producers
 * and drains within a bounded grace period.
 */
pub mod bus;
pub mod middleware;
pub mod producers;

use crate::decode::time::now_in_s;
use crate::event::{Event, FrameEvent, LogLevel};
use crate::source::{self, DecodeError};
use crate::track::Registry;
use bus::{EventBus, Sink};
use middleware::Middleware;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A producer feeds raw frames into the pipeline until its input ends
/// or the pipeline is cancelled.
#[async_trait::async_trait]
pub trait Producer: Send + 'static {
    fn name(&self) -> &str;

    async fn run(
        self: Box<Self>,
        tx: mpsc::Sender<FrameEvent>,
        cancel: CancellationToken,
    ) -> std::io::Result<()>;
}

/// The pipeline tuning knobs, all of them overridable per run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Decode workers, defaults to the CPU count
    pub decode_worker_count: usize,
    pub decoding_queue_size: usize,
    pub sink_mailbox_size: usize,
    pub prune_tick: Duration,
    pub prune_after: Duration,
    pub shard_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            decode_worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            decoding_queue_size: 256,
            sink_mailbox_size: 1024,
            prune_tick: Duration::from_secs(30),
            prune_after: Duration::from_secs(300),
            shard_count: 32,
        }
    }
}

/// Frames still in flight after a `stop()` are abandoned once this
/// grace expires.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Raw frames pulled off the decoding queue
    pub frames: AtomicU64,
    /// Transient wire errors (framing, length, CRC)
    pub wire_errors: AtomicU64,
    /// Valid input with nothing to track
    pub skipped: AtomicU64,
    /// Frames removed by a middleware
    pub filtered: AtomicU64,
}

pub struct Pipeline {
    config: PipelineConfig,
    registry: Arc<Registry>,
    bus: Arc<EventBus>,
    stats: Arc<PipelineStats>,
    middlewares: Vec<Arc<dyn Middleware>>,
    producers: Vec<Box<dyn Producer>>,
    cancel: CancellationToken,
    frame_tx: mpsc::Sender<FrameEvent>,
    frame_rx: Option<mpsc::Receiver<FrameEvent>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let (frame_tx, frame_rx) = mpsc::channel(config.decoding_queue_size);
        Pipeline {
            registry: Arc::new(Registry::new(config.shard_count)),
            bus: Arc::new(EventBus::new()),
            stats: Arc::new(PipelineStats::default()),
            middlewares: Vec::new(),
            producers: Vec::new(),
            cancel: CancellationToken::new(),
            frame_tx,
            frame_rx: Some(frame_rx),
            config,
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    pub fn add_producer(&mut self, producer: impl Producer) {
        self.producers.push(Box::new(producer));
    }

    pub fn add_middleware(&mut self, middleware: impl Middleware) {
        self.middlewares.push(Arc::new(middleware));
    }

    pub fn add_sink(&mut self, sink: Arc<dyn Sink>) {
        self.bus.register(sink, self.config.sink_mailbox_size);
    }

    /// Spawn every task and hand back the running pipeline.
    pub fn start(mut self) -> RunningPipeline {
        let frame_rx = self
            .frame_rx
            .take()
            .expect("pipeline started twice");
        let frame_rx = Arc::new(Mutex::new(frame_rx));

        let mut producer_tasks = Vec::new();
        for producer in self.producers.drain(..) {
            let tx = self.frame_tx.clone();
            let cancel = self.cancel.clone();
            let name = producer.name().to_string();
            let bus = self.bus.clone();
            producer_tasks.push(tokio::spawn(async move {
                info!(producer = %name, "producer started");
                if let Err(e) = producer.run(tx, cancel).await {
                    error!(producer = %name, error = %e, "producer failed");
                    bus.publish(Event::log(
                        LogLevel::Error,
                        format!("producer {name} failed: {e}"),
                    ));
                }
                info!(producer = %name, "producer finished");
            }));
        }

        let middlewares = Arc::new(std::mem::take(&mut self.middlewares));
        let mut worker_tasks = Vec::new();
        for _ in 0..self.config.decode_worker_count.max(1) {
            let rx = frame_rx.clone();
            let registry = self.registry.clone();
            let bus = self.bus.clone();
            let stats = self.stats.clone();
            let middlewares = middlewares.clone();
            worker_tasks.push(tokio::spawn(async move {
                loop {
                    let frame_event = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(frame_event) = frame_event else {
                        break;
                    };
                    process_frame(
                        frame_event,
                        &registry,
                        &bus,
                        &stats,
                        &middlewares,
                    );
                }
            }));
        }

        let pruner = {
            let registry = self.registry.clone();
            let bus = self.bus.clone();
            let cancel = self.cancel.clone();
            let tick = self.config.prune_tick;
            let after = self.config.prune_after.as_secs_f64();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick);
                interval.set_missed_tick_behavior(
                    tokio::time::MissedTickBehavior::Delay,
                );
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            registry.prune(now_in_s(), after, |event| {
                                bus.publish(event);
                            });
                        }
                        _ = cancel.cancelled() => break,
                    }
                }
            })
        };

        RunningPipeline {
            registry: self.registry,
            bus: self.bus,
            stats: self.stats,
            cancel: self.cancel,
            frame_tx: Some(self.frame_tx),
            producer_tasks,
            worker_tasks,
            pruner,
        }
    }
}

pub struct RunningPipeline {
    pub registry: Arc<Registry>,
    pub bus: Arc<EventBus>,
    pub stats: Arc<PipelineStats>,
    cancel: CancellationToken,
    frame_tx: Option<mpsc::Sender<FrameEvent>>,
    producer_tasks: Vec<JoinHandle<()>>,
    worker_tasks: Vec<JoinHandle<()>>,
    pruner: JoinHandle<()>,
}

impl RunningPipeline {
    /// Wait mode: producers run to their natural end (file replay),
    /// then the queue and every mailbox drain.
    pub async fn wait(mut self) {
        for task in self.producer_tasks.drain(..) {
            let _ = task.await;
        }
        self.drain(None).await;
    }

    /// Stop mode: cancel live producers, then drain bounded by the
    /// shutdown grace; whatever is still in flight afterwards is
    /// discarded.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        for task in self.producer_tasks.drain(..) {
            let _ = task.await;
        }
        self.drain(Some(SHUTDOWN_GRACE)).await;
    }

    async fn drain(mut self, grace: Option<Duration>) {
        // Closing the last sender ends the workers once the queue is
        // empty
        self.frame_tx.take();
        let workers = async {
            for task in self.worker_tasks.iter_mut() {
                let _ = task.await;
            }
        };
        match grace {
            None => workers.await,
            Some(grace) => {
                if tokio::time::timeout(grace, workers).await.is_err() {
                    debug!("shutdown grace expired, discarding in-flight frames");
                    for task in &self.worker_tasks {
                        task.abort();
                    }
                }
            }
        }

        self.cancel.cancel();
        let _ = self.pruner.await;
        self.bus.close().await;
    }
}

fn process_frame(
    frame_event: FrameEvent,
    registry: &Registry,
    bus: &EventBus,
    stats: &PipelineStats,
    middlewares: &[Arc<dyn Middleware>],
) {
    stats.frames.fetch_add(1, Ordering::Relaxed);
    bus.publish(Event::Frame(frame_event.clone()));

    let decoded = source::decode(
        &frame_event.data,
        frame_event.received_at,
        &frame_event.tag,
    );
    let frame = match decoded {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            stats.skipped.fetch_add(1, Ordering::Relaxed);
            bus.publish(Event::log(
                LogLevel::Debug,
                format!(
                    "nothing to track in input from {}",
                    frame_event.tag.name
                ),
            ));
            return;
        }
        Err(e) => {
            stats.wire_errors.fetch_add(1, Ordering::Relaxed);
            match e {
                DecodeError::Framing(_) | DecodeError::Length(_) => {
                    debug!(source = %frame_event.tag.name, error = %e, "bad frame");
                }
                DecodeError::Crc(_) | DecodeError::Field(_) => {
                    debug!(source = %frame_event.tag.name, error = %e, "undecodable frame");
                }
            }
            return;
        }
    };

    let mut events = Vec::new();
    let mut current = Some(frame);
    for middleware in middlewares {
        match current.take() {
            Some(frame) => {
                current = middleware.on_frame(frame, &mut events);
            }
            None => break,
        }
    }
    for event in events {
        bus.publish(event);
    }

    let Some(frame) = current else {
        stats.filtered.fetch_add(1, Ordering::Relaxed);
        return;
    };

    registry.apply(&frame, |event| bus.publish(event));
}
