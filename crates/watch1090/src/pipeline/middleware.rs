use crate::event::{DedupedFrameEvent, Event};
use crate::source::Frame;
use std::collections::HashMap;
use std::sync::Mutex;

/// A middleware sees every decoded frame before the tracker does. It
/// may rewrite the frame, drop it by returning None, and push events
/// of its own into the stream.
pub trait Middleware: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn on_frame(&self, frame: Frame, events: &mut Vec<Event>)
        -> Option<Frame>;
}

struct SeenEntry {
    first_seen: f64,
    duplicates: u32,
}

/// Duplicate suppression: overlapping receivers and the antenna
/// diversity of Mode S make the same payload arrive several times
/// within a short window. Only the first copy reaches the tracker; a
/// [`DedupedFrameEvent`] accounts for the burst.
pub struct Dedup {
    window_s: f64,
    seen: Mutex<HashMap<Vec<u8>, SeenEntry>>,
}

/// Entries beyond this trigger an eviction sweep
const SEEN_CAP: usize = 8192;

impl Dedup {
    pub fn new(window_s: f64) -> Self {
        Dedup {
            window_s,
            seen: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for Dedup {
    fn default() -> Self {
        // one second covers same-site multipath and nearby receivers
        Dedup::new(1.0)
    }
}

impl Middleware for Dedup {
    fn name(&self) -> &str {
        "dedup"
    }

    fn on_frame(
        &self,
        frame: Frame,
        events: &mut Vec<Event>,
    ) -> Option<Frame> {
        // SBS1 records are pre-decoded upstream and carry no raw
        // payload to compare
        let raw = match &frame {
            Frame::ModeS { raw, .. } => raw,
            Frame::Sbs1(_) => return Some(frame),
        };

        let mut seen = self.seen.lock().expect("dedup lock poisoned");

        if seen.len() > SEEN_CAP {
            let horizon = raw.received_at - self.window_s;
            seen.retain(|_, entry| entry.first_seen > horizon);
        }

        match seen.get_mut(&raw.payload) {
            Some(entry)
                if raw.received_at - entry.first_seen < self.window_s =>
            {
                entry.duplicates += 1;
                None
            }
            previous => {
                // count of the burst that just ended, zero on a first
                // contact
                let duplicates =
                    previous.map(|entry| entry.duplicates).unwrap_or(0);
                seen.insert(
                    raw.payload.clone(),
                    SeenEntry {
                        first_seen: raw.received_at,
                        duplicates: 0,
                    },
                );
                events.push(Event::DedupedFrame(DedupedFrameEvent {
                    data: raw.payload.clone(),
                    received_at: raw.received_at,
                    duplicates,
                }));
                Some(frame)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{self, InputFormat, SourceTag};
    use std::sync::Arc;

    fn frame(line: &str, t: f64) -> Frame {
        let tag = Arc::new(SourceTag::new("test", InputFormat::Avr));
        source::decode(line.as_bytes(), t, &tag).unwrap().unwrap()
    }

    #[test]
    fn suppresses_repeats_within_window() {
        let dedup = Dedup::new(1.0);
        let mut events = Vec::new();

        let passed =
            dedup.on_frame(frame("*5D7C7DAACD3CE9;", 0.0), &mut events);
        assert!(passed.is_some());
        assert_eq!(events.len(), 1);

        let repeat =
            dedup.on_frame(frame("*5D7C7DAACD3CE9;", 0.5), &mut events);
        assert!(repeat.is_none());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn different_payloads_pass_through() {
        let dedup = Dedup::new(1.0);
        let mut events = Vec::new();

        assert!(dedup
            .on_frame(frame("*5D7C7DAACD3CE9;", 0.0), &mut events)
            .is_some());
        assert!(dedup
            .on_frame(frame("*0005050870B303;", 0.1), &mut events)
            .is_some());
    }

    #[test]
    fn window_expiry_reports_burst_size() {
        let dedup = Dedup::new(1.0);
        let mut events = Vec::new();

        dedup.on_frame(frame("*5D7C7DAACD3CE9;", 0.0), &mut events);
        dedup.on_frame(frame("*5D7C7DAACD3CE9;", 0.2), &mut events);
        dedup.on_frame(frame("*5D7C7DAACD3CE9;", 0.4), &mut events);
        let passed =
            dedup.on_frame(frame("*5D7C7DAACD3CE9;", 2.0), &mut events);
        assert!(passed.is_some());

        let Some(Event::DedupedFrame(last)) = events.last() else {
            unreachable!()
        };
        assert_eq!(last.duplicates, 2);
    }
}
