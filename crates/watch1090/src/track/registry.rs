use crate::decode::Icao;
use crate::event::{Event, PlaneGoneEvent};
use crate::source::Frame;
use crate::track::plane::Plane;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Number of shards the plane registry is split into
pub const DEFAULT_SHARD_COUNT: usize = 32;

/**
 * The per-aircraft state store, sharded by `icao24 % shard_count` to
 * bound lock contention. A plane is created lazily on the first frame
 * resolving its address and mutated only while its shard is locked:
 * the lock spans frame application and event emission so observers
 * always see coherent snapshots.
 */
#[derive(Debug)]
pub struct Registry {
    shards: Vec<Mutex<HashMap<u32, Plane>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_SHARD_COUNT)
    }
}

impl Registry {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Registry {
            shards: (0..shard_count).map(|_| Mutex::default()).collect(),
        }
    }

    fn shard(&self, icao24: u32) -> &Mutex<HashMap<u32, Plane>> {
        &self.shards[icao24 as usize % self.shards.len()]
    }

    /// Apply a decoded frame to its plane, creating the plane on
    /// first contact. Events are handed to `publish` while the shard
    /// is still locked, which keeps per-aircraft event order identical
    /// to frame application order.
    pub fn apply(&self, frame: &Frame, mut publish: impl FnMut(Event)) {
        let icao24 = frame.icao24();
        if icao24 == 0 {
            // expected for some downlink formats
            return;
        }

        let mut shard = self.shard(icao24).lock().expect("shard lock poisoned");
        let plane = shard
            .entry(icao24)
            .or_insert_with(|| Plane::new(Icao(icao24), frame.received_at()));
        for event in plane.apply(frame) {
            publish(event);
        }
    }

    /// A point-in-time copy of one plane's state.
    pub fn get(&self, icao24: u32) -> Option<Plane> {
        self.shard(icao24)
            .lock()
            .expect("shard lock poisoned")
            .get(&icao24)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().expect("shard lock poisoned").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every plane not seen for `prune_after` seconds, emitting
    /// its terminal event under the shard lock.
    pub fn prune(
        &self,
        now: f64,
        prune_after: f64,
        mut publish: impl FnMut(Event),
    ) {
        for shard in &self.shards {
            let mut shard = shard.lock().expect("shard lock poisoned");
            let expired: Vec<u32> = shard
                .iter()
                .filter(|(_, plane)| now - plane.last_seen >= prune_after)
                .map(|(&icao24, _)| icao24)
                .collect();
            for icao24 in expired {
                shard.remove(&icao24);
                debug!(icao = %Icao(icao24), "plane pruned");
                publish(Event::PlaneGone(PlaneGoneEvent {
                    icao: Icao(icao24),
                    t: now,
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{self, InputFormat, SourceTag};
    use std::sync::Arc;

    fn avr_frame(line: &str, t: f64) -> Frame {
        let tag = Arc::new(SourceTag::new("test", InputFormat::Avr));
        source::decode(line.as_bytes(), t, &tag).unwrap().unwrap()
    }

    #[test]
    fn planes_are_created_lazily() {
        let registry = Registry::default();
        assert!(registry.is_empty());

        let frame = avr_frame("*8D40621D58C382D690C8AC2863A7;", 1.0);
        registry.apply(&frame, |_| {});

        assert_eq!(registry.len(), 1);
        assert!(registry.get(0x40621d).is_some());
        assert!(registry.get(0x123456).is_none());
    }

    #[test]
    fn prune_evicts_and_emits_terminal_event() {
        let registry = Registry::default();
        let frame = avr_frame("*8D40621D58C382D690C8AC2863A7;", 0.0);
        registry.apply(&frame, |_| {});

        let mut events = Vec::new();
        registry.prune(2.0, 1.0, |e| events.push(e));

        assert!(registry.get(0x40621d).is_none());
        let gone: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, Event::PlaneGone(_)))
            .collect();
        assert_eq!(gone.len(), 1);
    }

    #[test]
    fn fresh_planes_survive_pruning() {
        let registry = Registry::default();
        let frame = avr_frame("*8D40621D58C382D690C8AC2863A7;", 10.0);
        registry.apply(&frame, |_| {});

        let mut events = Vec::new();
        registry.prune(10.5, 1.0, |e| events.push(e));
        assert!(registry.get(0x40621d).is_some());
        assert!(events.is_empty());
    }
}
