//! The engine ties the Connection Registry (C1), Queue Set (C2), Matcher
//! (C3), Session Supervisor (C4), and Signaling Relay (C5) together behind
//! one lock.
//!
//! Every public method here locks once, computes a pure transition, and
//! returns the outbound events that transition produces, so the caller
//! (the Transport Adapter) can dispatch them to sockets *after* the lock
//! is released.

use std::sync::{LazyLock, Mutex};

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::events::{InboundEvent, JoinQueuePayload, OutboundEvent};
use crate::id::ConnectionId;
use crate::models::User;
use crate::queue::QueueSet;
use crate::registry::ConnectionRegistry;
use crate::{matcher, relay, session};

/// A single event to be delivered to one connection.
pub type Outbound = (ConnectionId, OutboundEvent);

#[derive(Debug, Default)]
pub struct EngineState {
    pub registry: ConnectionRegistry,
    pub queues: QueueSet,
}

/// One coarse mutex guards the registry and queue set together, so a
/// match-or-wait decision and the registry/queue mutations it implies are
/// always atomic. `std::sync::Mutex` rather than `tokio::sync::Mutex`
/// because no `.await` ever happens while held.
#[derive(Default)]
pub struct MatchEngine {
    state: Mutex<EngineState>,
}

impl MatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide engine instance. Every connection handler shares
    /// it, mirroring the single-registry-per-process shape the transport
    /// layer expects of its connection table.
    pub fn global() -> &'static MatchEngine {
        static ENGINE: LazyLock<MatchEngine> = LazyLock::new(MatchEngine::new);
        &ENGINE
    }

    /// `join-queue`. A connection not yet known to the registry is
    /// implicitly `Idle`; a known `Waiting` or `Paired` connection ignores
    /// a repeat `join-queue` as an out-of-state no-op.
    pub fn join(&self, connection_id: ConnectionId, payload: JoinQueuePayload) -> Vec<Outbound> {
        if let Err(errors) = payload.validate() {
            tracing::debug!(%connection_id, %errors, "dropping invalid join-queue payload");
            return Vec::new();
        }

        let mut state = self.state.lock().expect("engine mutex poisoned");

        if let Some(existing) = state.registry.lookup(connection_id) {
            match existing.state {
                crate::models::ConnectionState::Waiting => return Vec::new(),
                crate::models::ConnectionState::Paired => return Vec::new(),
                crate::models::ConnectionState::Idle => {}
            }
        }

        let user = User::new(
            connection_id,
            payload.user_id,
            payload.username,
            payload.gender,
            payload.age,
            payload.preferred_gender,
            payload.tier,
        );
        state.registry.register(user);

        matcher::join_or_wait(&mut state, connection_id)
    }

    /// `skip`: tears down a pair, or abandons the waiting queue, and
    /// returns the leaver to `Idle`.
    pub fn skip(&self, connection_id: ConnectionId) -> Vec<Outbound> {
        let mut state = self.state.lock().expect("engine mutex poisoned");
        let Some(user_state) = state.registry.lookup(connection_id).map(|u| u.state) else {
            return Vec::new();
        };

        match user_state {
            crate::models::ConnectionState::Idle => Vec::new(),
            crate::models::ConnectionState::Waiting => {
                state.queues.remove(connection_id);
                if let Some(u) = state.registry.lookup_mut(connection_id) {
                    u.state = crate::models::ConnectionState::Idle;
                }
                vec![(connection_id, OutboundEvent::Skipped)]
            }
            crate::models::ConnectionState::Paired => {
                session::teardown(&mut state, connection_id, session::TeardownReason::Skip)
            }
        }
    }

    /// `leave-queue`. The leaving connection returns to `Idle` but stays
    /// in the registry; it may `join-queue` again without reconnecting.
    pub fn leave(&self, connection_id: ConnectionId) -> Vec<Outbound> {
        let mut state = self.state.lock().expect("engine mutex poisoned");
        let Some(user_state) = state.registry.lookup(connection_id).map(|u| u.state) else {
            return Vec::new();
        };

        match user_state {
            crate::models::ConnectionState::Idle => Vec::new(),
            crate::models::ConnectionState::Waiting => {
                state.queues.remove(connection_id);
                if let Some(u) = state.registry.lookup_mut(connection_id) {
                    u.state = crate::models::ConnectionState::Idle;
                }
                Vec::new()
            }
            crate::models::ConnectionState::Paired => {
                session::teardown(&mut state, connection_id, session::TeardownReason::Leave)
            }
        }
    }

    /// Connection dropped. Removes the connection from the registry and
    /// every queue it might be in; if it was `Paired`, tears the pair down
    /// and re-queues the partner before the registry removal completes.
    pub fn disconnect(&self, connection_id: ConnectionId) -> Vec<Outbound> {
        let mut state = self.state.lock().expect("engine mutex poisoned");
        let Some(user_state) = state.registry.lookup(connection_id).map(|u| u.state) else {
            return Vec::new();
        };

        let outbound = match user_state {
            crate::models::ConnectionState::Idle => Vec::new(),
            crate::models::ConnectionState::Waiting => {
                state.queues.remove(connection_id);
                Vec::new()
            }
            crate::models::ConnectionState::Paired => {
                session::teardown(&mut state, connection_id, session::TeardownReason::Disconnect)
            }
        };

        state.registry.remove(connection_id);
        debug_assert!(
            !state.queues.contains(connection_id),
            "disconnected connection must not remain queued"
        );
        outbound
    }

    /// `offer` / `answer` / `ice-candidate`.
    pub fn signal(
        &self,
        connection_id: ConnectionId,
        target_id: ConnectionId,
        make_event: impl FnOnce(ConnectionId) -> OutboundEvent,
    ) -> Vec<Outbound> {
        let state = self.state.lock().expect("engine mutex poisoned");
        relay::forward_signal(&state, connection_id, target_id, make_event)
    }

    /// `message`. The server stamps `now`; callers must not trust a
    /// client-supplied timestamp.
    pub fn message(&self, connection_id: ConnectionId, text: String, now: DateTime<Utc>) -> Vec<Outbound> {
        let state = self.state.lock().expect("engine mutex poisoned");
        relay::forward_message(&state, connection_id, text, now)
    }

    /// Diagnostics only.
    pub fn connection_count(&self) -> usize {
        self.state.lock().expect("engine mutex poisoned").registry.len()
    }

    /// Dispatches one decoded inbound event, returning the outbound events
    /// it produces. The sole place that maps wire events onto engine calls.
    pub fn handle(&self, connection_id: ConnectionId, event: InboundEvent, now: DateTime<Utc>) -> Vec<Outbound> {
        match event {
            InboundEvent::JoinQueue(payload) => self.join(connection_id, payload),
            InboundEvent::Skip => self.skip(connection_id),
            InboundEvent::LeaveQueue => self.leave(connection_id),
            InboundEvent::Offer { offer, target_id } => self.signal(connection_id, target_id, |from_id| {
                OutboundEvent::Offer { offer, from_id }
            }),
            InboundEvent::Answer { answer, target_id } => self.signal(connection_id, target_id, |from_id| {
                OutboundEvent::Answer { answer, from_id }
            }),
            InboundEvent::IceCandidate { candidate, target_id } => {
                self.signal(connection_id, target_id, |from_id| OutboundEvent::IceCandidate {
                    candidate,
                    from_id,
                })
            }
            InboundEvent::Message { text } => self.message(connection_id, text, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::JoinQueuePayload;
    use crate::models::{Gender, PreferredGender, Tier};

    fn payload(gender: Gender, preferred: PreferredGender, tier: Tier) -> JoinQueuePayload {
        JoinQueuePayload {
            user_id: "u".into(),
            username: "n".into(),
            gender,
            preferred_gender: preferred,
            tier,
            age: 25,
        }
    }

    fn matched_partner(outbound: &[Outbound], connection_id: ConnectionId) -> Option<ConnectionId> {
        outbound.iter().find_map(|(id, event)| match event {
            OutboundEvent::Matched { partner_id, .. } if *id == connection_id => Some(*partner_id),
            _ => None,
        })
    }

    #[test]
    fn join_with_an_overlong_username_is_dropped_silently() {
        let engine = MatchEngine::new();
        let c1 = ConnectionId::generate();

        let mut bad = payload(Gender::Male, PreferredGender::Any, Tier::Free);
        bad.username = "x".repeat(65);

        assert_eq!(engine.join(c1, bad), Vec::new());
        assert_eq!(engine.connection_count(), 0);
    }

    #[test]
    fn two_free_any_preference_users_match_instantly() {
        let engine = MatchEngine::new();
        let c1 = ConnectionId::generate();
        let c2 = ConnectionId::generate();

        let waiting = engine.join(c1, payload(Gender::Male, PreferredGender::Any, Tier::Free));
        assert_eq!(waiting, vec![(c1, OutboundEvent::Waiting)]);

        let matched = engine.join(c2, payload(Gender::Female, PreferredGender::Any, Tier::Free));
        assert_eq!(matched_partner(&matched, c1), Some(c2));
        assert_eq!(matched_partner(&matched, c2), Some(c1));
    }

    #[test]
    fn premium_preference_is_honored_end_to_end() {
        let engine = MatchEngine::new();
        let c1 = ConnectionId::generate();
        let c2 = ConnectionId::generate();
        let c3 = ConnectionId::generate();

        // c1: premium, male, wants a female partner -> waits.
        engine.join(c1, payload(Gender::Male, PreferredGender::Female, Tier::Premium));

        // c2: free male -> cannot satisfy c1's preference, no match forms.
        let no_match = engine.join(c2, payload(Gender::Male, PreferredGender::Any, Tier::Free));
        assert_eq!(no_match, vec![(c2, OutboundEvent::Waiting)]);

        // c3: free female -> satisfies c1's preference, match forms.
        let matched = engine.join(c3, payload(Gender::Female, PreferredGender::Any, Tier::Free));
        assert_eq!(matched_partner(&matched, c1), Some(c3));
        assert_eq!(matched_partner(&matched, c3), Some(c1));
    }

    #[test]
    fn skip_tears_down_and_requeues_the_abandoned_partner() {
        let engine = MatchEngine::new();
        let c1 = ConnectionId::generate();
        let c2 = ConnectionId::generate();
        let c3 = ConnectionId::generate();

        engine.join(c1, payload(Gender::Male, PreferredGender::Any, Tier::Free));
        engine.join(c2, payload(Gender::Female, PreferredGender::Any, Tier::Free));

        let outbound = engine.skip(c1);
        assert!(outbound.contains(&(c1, OutboundEvent::Skipped)));
        assert!(outbound.contains(&(c2, OutboundEvent::PartnerSkipped)));
        assert!(outbound.contains(&(c2, OutboundEvent::Waiting)));

        let matched = engine.join(c3, payload(Gender::Male, PreferredGender::Any, Tier::Free));
        assert_eq!(matched_partner(&matched, c2), Some(c3));
    }

    #[test]
    fn disconnect_while_paired_requeues_the_partner_without_notifying_the_leaver() {
        let engine = MatchEngine::new();
        let c1 = ConnectionId::generate();
        let c2 = ConnectionId::generate();

        engine.join(c1, payload(Gender::Male, PreferredGender::Any, Tier::Free));
        engine.join(c2, payload(Gender::Female, PreferredGender::Any, Tier::Free));

        let outbound = engine.disconnect(c1);
        assert!(!outbound.iter().any(|(id, _)| *id == c1));
        assert!(outbound.contains(&(c2, OutboundEvent::PartnerDisconnected)));
        assert!(outbound.contains(&(c2, OutboundEvent::Waiting)));
        assert_eq!(engine.connection_count(), 1);
    }

    #[test]
    fn signal_is_confined_to_the_real_partner() {
        let engine = MatchEngine::new();
        let c1 = ConnectionId::generate();
        let c2 = ConnectionId::generate();
        let stranger = ConnectionId::generate();

        engine.join(c1, payload(Gender::Male, PreferredGender::Any, Tier::Free));
        engine.join(c2, payload(Gender::Female, PreferredGender::Any, Tier::Free));

        let to_partner = engine.signal(c1, c2, |from_id| OutboundEvent::Offer {
            offer: serde_json::json!({"sdp": "x"}),
            from_id,
        });
        assert_eq!(to_partner.len(), 1);
        assert_eq!(to_partner[0].0, c2);

        let to_stranger = engine.signal(c1, stranger, |from_id| OutboundEvent::Offer {
            offer: serde_json::json!({}),
            from_id,
        });
        assert!(to_stranger.is_empty());
    }

    #[test]
    fn message_carries_the_server_supplied_timestamp_not_a_client_one() {
        let engine = MatchEngine::new();
        let c1 = ConnectionId::generate();
        let c2 = ConnectionId::generate();

        engine.join(c1, payload(Gender::Male, PreferredGender::Any, Tier::Free));
        engine.join(c2, payload(Gender::Female, PreferredGender::Any, Tier::Free));

        let now = DateTime::parse_from_rfc3339("2026-07-28T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let outbound = engine.message(c1, "hello".into(), now);
        match &outbound[..] {
            [(id, OutboundEvent::Message { text, sender, timestamp })] => {
                assert_eq!(*id, c2);
                assert_eq!(text, "hello");
                assert_eq!(*sender, c1);
                assert_eq!(*timestamp, now);
            }
            other => panic!("unexpected outbound: {other:?}"),
        }
    }
}
