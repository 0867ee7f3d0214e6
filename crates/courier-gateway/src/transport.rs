use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

use courier_types::events::{ChatEvent, ChatEventKind, RelayTarget};

/// Entries older than this are dropped on every append.
const EVENT_RETENTION: Duration = Duration::from_secs(5 * 60);

/// Hard cap on the event ring; the oldest entry is evicted first.
const EVENT_LOG_CAP: usize = 100;

/// Batch returned to a long-poll client whose cursor was evicted; the client
/// must treat this as a resynchronization signal.
const RESYNC_BATCH: usize = 20;

/// Capacity of each subscriber group's broadcast channel.
const GROUP_CAPACITY: usize = 1024;

/// Process-local push hub: the per-room subscriber groups, the "all rooms"
/// aggregate group, and the bounded event ring behind them. Exactly one
/// exists in the process that hosts the push transport; it is built at
/// startup and handed to handlers through state, never a module global.
///
/// All registry/ring mutations share one mutex and are short, non-blocking
/// critical sections. The long-poll waiter never sleeps while holding it.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportShared>,
}

struct TransportShared {
    state: Mutex<TransportState>,
    notify: Notify,
}

struct TransportState {
    next_event_id: u64,
    events: VecDeque<ChatEvent>,
    rooms: HashMap<Uuid, broadcast::Sender<ChatEvent>>,
    all_rooms: broadcast::Sender<ChatEvent>,
}

impl Transport {
    pub fn new() -> Self {
        let (all_rooms, _) = broadcast::channel(GROUP_CAPACITY);
        Self {
            inner: Arc::new(TransportShared {
                state: Mutex::new(TransportState {
                    next_event_id: 1,
                    events: VecDeque::new(),
                    rooms: HashMap::new(),
                    all_rooms,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Record an event and push it to the room's subscriber group and the
    /// all-rooms aggregate. Event id assignment, ring append and group sends
    /// happen under the one lock, so every subscriber observes one room's
    /// events in creation order.
    pub fn publish(&self, kind: ChatEventKind) -> ChatEvent {
        let target = RelayTarget::Room(kind.room_id());
        self.publish_scoped(kind, target)
    }

    /// Like [`publish`](Self::publish), but with an explicit delivery scope
    /// (the relay surface carries one).
    pub fn publish_scoped(&self, kind: ChatEventKind, target: RelayTarget) -> ChatEvent {
        let now = Utc::now();
        let event = {
            let mut state = self.inner.state.lock().expect("transport lock poisoned");

            let event = ChatEvent {
                id: state.next_event_id,
                at: now,
                kind,
            };
            state.next_event_id += 1;

            evict(&mut state.events, now);
            state.events.push_back(event.clone());
            while state.events.len() > EVENT_LOG_CAP {
                state.events.pop_front();
            }

            if let RelayTarget::Room(room_id) = target {
                let dead = state
                    .rooms
                    .get(&room_id)
                    .is_some_and(|group| group.send(event.clone()).is_err());
                if dead {
                    // Last subscriber left; drop the group.
                    state.rooms.remove(&room_id);
                }
            }
            let _ = state.all_rooms.send(event.clone());

            event
        };
        self.inner.notify.notify_waiters();
        event
    }

    pub fn subscribe_room(&self, room_id: Uuid) -> broadcast::Receiver<ChatEvent> {
        let mut state = self.inner.state.lock().expect("transport lock poisoned");
        state
            .rooms
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<ChatEvent> {
        let state = self.inner.state.lock().expect("transport lock poisoned");
        state.all_rooms.subscribe()
    }

    /// Snapshot of the ring for a long-poll cursor:
    /// - no cursor → everything from the last five minutes;
    /// - cursor still in the ring → events strictly after it;
    /// - cursor evicted/unknown → the most recent [`RESYNC_BATCH`] entries.
    pub fn events_after(&self, last_seen: Option<u64>) -> Vec<ChatEvent> {
        let state = self.inner.state.lock().expect("transport lock poisoned");
        match last_seen {
            None => {
                let cutoff = Utc::now()
                    - chrono::Duration::from_std(EVENT_RETENTION).expect("retention in range");
                state
                    .events
                    .iter()
                    .filter(|e| e.at > cutoff)
                    .cloned()
                    .collect()
            }
            Some(id) if state.events.iter().any(|e| e.id == id) => state
                .events
                .iter()
                .filter(|e| e.id > id)
                .cloned()
                .collect(),
            Some(_) => {
                let skip = state.events.len().saturating_sub(RESYNC_BATCH);
                state.events.iter().skip(skip).cloned().collect()
            }
        }
    }

    /// Long-poll wait: return as soon as `events_after` yields anything, or
    /// an empty list once `budget` elapses. Suspends on the append signal
    /// rather than polling, and never holds the transport lock while
    /// suspended.
    pub async fn wait_for_events(
        &self,
        last_seen: Option<u64>,
        budget: Duration,
    ) -> Vec<ChatEvent> {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register for the next append before checking, so an append
            // between check and await cannot be missed.
            notified.as_mut().enable();

            let events = self.events_after(last_seen);
            if !events.is_empty() {
                return events;
            }
            if tokio::time::Instant::now() >= deadline {
                return Vec::new();
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return Vec::new(),
            }
        }
    }

    #[cfg(test)]
    fn publish_at(&self, kind: ChatEventKind, at: DateTime<Utc>) -> ChatEvent {
        let mut state = self.inner.state.lock().expect("transport lock poisoned");
        let event = ChatEvent {
            id: state.next_event_id,
            at,
            kind,
        };
        state.next_event_id += 1;
        state.events.push_back(event.clone());
        event
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

fn evict(events: &mut VecDeque<ChatEvent>, now: DateTime<Utc>) {
    let cutoff = now - chrono::Duration::from_std(EVENT_RETENTION).expect("retention in range");
    while events.front().is_some_and(|e| e.at <= cutoff) {
        events.pop_front();
    }
}
