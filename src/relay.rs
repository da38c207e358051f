//! Signaling Relay (C5).
//!
//! Forwards `offer`/`answer`/`ice-candidate`/`message` along the partner
//! edge only, never inspecting payload contents. Pure: takes an immutable
//! view of the engine state (no mutation needed, relaying changes
//! nothing about partner state) and returns the outbound events to send.

use chrono::{DateTime, Utc};

use crate::engine::{EngineState, Outbound};
use crate::events::OutboundEvent;
use crate::id::ConnectionId;
use crate::models::ConnectionState;

/// `offer` / `answer` / `ice-candidate`: requires the sender be `Paired`
/// with `partner == target_id`; otherwise dropped silently. `make_event`
/// builds the outbound payload from `from_id`; the caller supplies the
/// opaque blob, the relay never looks inside it.
pub fn forward_signal(
    state: &EngineState,
    sender_id: ConnectionId,
    target_id: ConnectionId,
    make_event: impl FnOnce(ConnectionId) -> OutboundEvent,
) -> Vec<Outbound> {
    let Some(sender) = state.registry.lookup(sender_id) else {
        return Vec::new();
    };
    if sender.state != ConnectionState::Paired || sender.partner != Some(target_id) {
        return Vec::new();
    }

    vec![(target_id, make_event(sender_id))]
}

/// `message`: the server stamps `now`, never a client-supplied timestamp.
pub fn forward_message(
    state: &EngineState,
    sender_id: ConnectionId,
    text: String,
    now: DateTime<Utc>,
) -> Vec<Outbound> {
    let Some(sender) = state.registry.lookup(sender_id) else {
        return Vec::new();
    };
    let (ConnectionState::Paired, Some(partner_id)) = (sender.state, sender.partner) else {
        return Vec::new();
    };

    vec![(
        partner_id,
        OutboundEvent::Message {
            text,
            sender: sender_id,
            timestamp: now,
        },
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, PreferredGender, Tier, User};
    use crate::queue::QueueSet;
    use crate::registry::ConnectionRegistry;

    fn paired_pair() -> (EngineState, ConnectionId, ConnectionId) {
        let mut state = EngineState {
            registry: ConnectionRegistry::new(),
            queues: QueueSet::new(),
        };
        let a_id = ConnectionId::generate();
        let b_id = ConnectionId::generate();
        let mut a = User::new(a_id, "a".into(), "Ana".into(), Gender::Female, 22, PreferredGender::Any, Tier::Free);
        let mut b = User::new(b_id, "b".into(), "Ben".into(), Gender::Male, 24, PreferredGender::Any, Tier::Free);
        a.partner = Some(b_id);
        a.state = ConnectionState::Paired;
        b.partner = Some(a_id);
        b.state = ConnectionState::Paired;
        state.registry.register(a);
        state.registry.register(b);
        (state, a_id, b_id)
    }

    #[test]
    fn offer_is_forwarded_to_the_real_partner() {
        let (state, a_id, b_id) = paired_pair();
        let payload = serde_json::json!({"sdp": "opaque"});
        let outbound = forward_signal(&state, a_id, b_id, |from_id| OutboundEvent::Offer {
            offer: payload.clone(),
            from_id,
        });
        assert_eq!(
            outbound,
            vec![(
                b_id,
                OutboundEvent::Offer {
                    offer: payload,
                    from_id: a_id,
                }
            )]
        );
    }

    #[test]
    fn offer_to_a_non_partner_target_is_dropped_silently() {
        let (state, a_id, _b_id) = paired_pair();
        let stranger = ConnectionId::generate();
        let outbound = forward_signal(&state, a_id, stranger, |from_id| OutboundEvent::Offer {
            offer: serde_json::json!({}),
            from_id,
        });
        assert!(outbound.is_empty());
    }

    #[test]
    fn message_gets_server_stamped_timestamp() {
        let (state, a_id, b_id) = paired_pair();
        let now = DateTime::parse_from_rfc3339("2026-07-28T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let outbound = forward_message(&state, a_id, "hi".into(), now);
        assert_eq!(
            outbound,
            vec![(
                b_id,
                OutboundEvent::Message {
                    text: "hi".into(),
                    sender: a_id,
                    timestamp: now,
                }
            )]
        );
    }

    #[test]
    fn message_from_unpaired_sender_is_dropped() {
        let mut state = EngineState {
            registry: ConnectionRegistry::new(),
            queues: QueueSet::new(),
        };
        let lone = ConnectionId::generate();
        state.registry.register(User::new(
            lone,
            "lone".into(),
            "Lone".into(),
            Gender::Other,
            30,
            PreferredGender::Any,
            Tier::Free,
        ));
        let outbound = forward_message(&state, lone, "hi".into(), Utc::now());
        assert!(outbound.is_empty());
    }
}
