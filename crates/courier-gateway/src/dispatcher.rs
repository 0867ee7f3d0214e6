use tracing::warn;

use courier_types::events::{ChatEventKind, RelayTarget};
use courier_types::models::{Message, Room};

use crate::relay::RelayClient;
use crate::transport::Transport;

/// Fans notifications out after a durable write: direct push + event ring
/// when this process hosts the transport, an authenticated relay hop when it
/// does not. Built explicitly at startup and injected through handler state.
///
/// Every path is best-effort — a notification failure is logged and
/// swallowed, never surfaced as a failure of the write that triggered it.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Option<Transport>,
    relay: Option<RelayClient>,
}

impl Dispatcher {
    pub fn new(transport: Option<Transport>, relay: Option<RelayClient>) -> Self {
        Self { transport, relay }
    }

    /// The process-local transport, when this process hosts one. The
    /// long-poll and WebSocket surfaces need it directly.
    pub fn transport(&self) -> Option<&Transport> {
        self.transport.as_ref()
    }

    pub fn notify_new_message(&self, room: &Room, message: &Message) {
        self.dispatch(ChatEventKind::NewMessage {
            room: room.clone(),
            message: message.clone(),
        });
    }

    pub fn notify_room_update(&self, room: &Room) {
        self.dispatch(ChatEventKind::RoomUpdate { room: room.clone() });
    }

    pub fn notify_message_status(&self, message: &Message) {
        self.dispatch(ChatEventKind::MessageStatus {
            room_id: message.room_id,
            message_id: message.id,
            status: message.status,
        });
    }

    fn dispatch(&self, kind: ChatEventKind) {
        if let Some(transport) = &self.transport {
            transport.publish(kind);
        } else if let Some(relay) = &self.relay {
            let target = RelayTarget::Room(kind.room_id());
            relay.forward(kind, target);
        } else {
            // No transport in this process and nowhere to relay. Clients
            // still observe ground truth through normal reads.
            warn!(
                "dropping notification for room {}: no push transport and no relay target",
                kind.room_id()
            );
        }
    }
}
