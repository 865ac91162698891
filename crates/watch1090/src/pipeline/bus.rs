use crate::event::{Event, LogEvent, LogLevel};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::warn;

/// Receives every event of the pipeline, in the order produced by the
/// originating shard. Delivery must never block the tracker: a slow
/// sink loses its oldest events instead.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    fn name(&self) -> &str {
        "sink"
    }

    async fn on_event(&self, event: Event);

    /// Called once after the last event during shutdown.
    async fn close(&self) {}
}

struct MailboxState {
    queue: VecDeque<Event>,
    /// Events lost since the sink last kept up
    dropped: u64,
}

/// The bounded buffer between the bus and one sink task.
pub struct Mailbox {
    name: String,
    capacity: usize,
    state: Mutex<MailboxState>,
    notify: Notify,
    closed: AtomicBool,
    dropped_total: AtomicU64,
    overflow_warnings: AtomicU64,
}

impl Mailbox {
    fn new(name: String, capacity: usize) -> Self {
        Mailbox {
            name,
            capacity: capacity.max(1),
            state: Mutex::new(MailboxState {
                queue: VecDeque::new(),
                dropped: 0,
            }),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped_total: AtomicU64::new(0),
            overflow_warnings: AtomicU64::new(0),
        }
    }

    /// Synchronous and never blocking: on a full mailbox the oldest
    /// event is discarded.
    fn push(&self, event: Event) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut state = self.state.lock().expect("mailbox lock poisoned");
            if state.queue.len() >= self.capacity {
                state.queue.pop_front();
                state.dropped += 1;
                self.dropped_total.fetch_add(1, Ordering::Relaxed);
                if state.dropped == 1 {
                    warn!(sink = %self.name, "sink mailbox full, dropping oldest events");
                }
            }
            state.queue.push_back(event);
        }
        self.notify.notify_one();
    }

    /// Next event for the sink task; None once the bus closed and the
    /// queue drained. When the sink catches up after an overflow, a
    /// single aggregated warning marker is delivered in-band.
    async fn next(&self) -> Option<Event> {
        loop {
            {
                let mut state =
                    self.state.lock().expect("mailbox lock poisoned");
                if let Some(event) = state.queue.pop_front() {
                    if state.dropped > 0 && state.queue.len() < self.capacity {
                        let dropped = state.dropped;
                        state.dropped = 0;
                        self.overflow_warnings.fetch_add(1, Ordering::Relaxed);
                        state.queue.push_back(Event::Log(LogEvent {
                            level: LogLevel::Warn,
                            msg: format!(
                                "sink {} dropped {dropped} events while backed up",
                                self.name
                            ),
                        }));
                    }
                    return Some(event);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Events lost to drop-oldest since creation
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    /// Aggregated overflow warnings emitted
    pub fn overflow_warnings(&self) -> u64 {
        self.overflow_warnings.load(Ordering::Relaxed)
    }
}

/// Fan-out of the event stream: every sink gets its own mailbox and
/// its own delivery task.
#[derive(Default)]
pub struct EventBus {
    mailboxes: RwLock<Vec<Arc<Mailbox>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink and spawn its delivery task.
    pub fn register(
        &self,
        sink: Arc<dyn Sink>,
        mailbox_size: usize,
    ) -> Arc<Mailbox> {
        let mailbox =
            Arc::new(Mailbox::new(sink.name().to_string(), mailbox_size));
        let task_mailbox = mailbox.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = task_mailbox.next().await {
                sink.on_event(event).await;
            }
            sink.close().await;
        });

        self.mailboxes
            .write()
            .expect("bus lock poisoned")
            .push(mailbox.clone());
        self.tasks.lock().expect("bus lock poisoned").push(task);
        mailbox
    }

    /// Offer an event to every sink. Synchronous, suitable for calling
    /// under a shard lock.
    pub fn publish(&self, event: Event) {
        let mailboxes = self.mailboxes.read().expect("bus lock poisoned");
        match mailboxes.split_last() {
            None => {}
            Some((last, rest)) => {
                for mailbox in rest {
                    mailbox.push(event.clone());
                }
                last.push(event);
            }
        }
    }

    /// Close every mailbox and wait for the sinks to drain.
    pub async fn close(&self) {
        for mailbox in self.mailboxes.read().expect("bus lock poisoned").iter()
        {
            mailbox.close();
        }
        let tasks: Vec<JoinHandle<()>> =
            self.tasks.lock().expect("bus lock poisoned").drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Semaphore;

    struct RecordingSink {
        received: StdMutex<Vec<Event>>,
        gate: Semaphore,
    }

    impl RecordingSink {
        fn new(permits: usize) -> Arc<Self> {
            Arc::new(RecordingSink {
                received: StdMutex::new(Vec::new()),
                gate: Semaphore::new(permits),
            })
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn on_event(&self, event: Event) {
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
            self.received.lock().unwrap().push(event);
        }
    }

    fn numbered(n: usize) -> Event {
        Event::log(LogLevel::Info, format!("event {n}"))
    }

    fn message(event: &Event) -> String {
        match event {
            Event::Log(log) => log.msg.clone(),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn events_flow_to_sink_in_order() {
        let bus = EventBus::new();
        let sink = RecordingSink::new(1000);
        bus.register(sink.clone(), 16);

        for n in 0..5 {
            bus.publish(numbered(n));
        }
        bus.close().await;

        let received = sink.received.lock().unwrap();
        let msgs: Vec<String> = received.iter().map(message).collect();
        assert_eq!(
            msgs,
            vec!["event 0", "event 1", "event 2", "event 3", "event 4"]
        );
    }

    #[tokio::test]
    async fn blocked_sink_drops_oldest_without_blocking_publisher() {
        let bus = EventBus::new();
        let sink = RecordingSink::new(0);
        let mailbox = bus.register(sink.clone(), 4);

        // let the delivery task park on the gate
        tokio::task::yield_now().await;

        for n in 0..10_000 {
            bus.publish(numbered(n));
        }

        // one in-flight event sits in the delivery task, the newest
        // four sit in the mailbox, everything older was dropped
        assert!(mailbox.dropped_total() > 0);

        sink.gate.add_permits(10_000);
        bus.close().await;

        assert_eq!(mailbox.overflow_warnings(), 1);
        let received = sink.received.lock().unwrap();
        let tail: Vec<String> = received
            .iter()
            .filter(|e| !message(e).starts_with("sink "))
            .map(|e| message(e))
            .collect();
        let expected: Vec<String> =
            (9996..10_000).map(|n| format!("event {n}")).collect();
        assert_eq!(tail[tail.len() - 4..], expected[..]);
    }
}
