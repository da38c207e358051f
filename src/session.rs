//! Session Supervisor (C4).
//!
//! Owns pair teardown: the canonical sequence for when an initiating user
//! leaves/skips/disconnects while paired.

use crate::engine::{EngineState, Outbound};
use crate::events::OutboundEvent;
use crate::id::ConnectionId;
use crate::matcher;
use crate::models::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Skip,
    Leave,
    Disconnect,
}

/// Tears down the pair containing `leaver_id`, who must currently be
/// `Paired` (callers are expected to have already checked this). Returns
/// the notifications for both sides plus whatever the mandatory re-match
/// of the abandoned partner produces. This auto-retry is mandatory; the
/// partner never returns to `Idle` unless they themselves leave.
pub fn teardown(state: &mut EngineState, leaver_id: ConnectionId, reason: TeardownReason) -> Vec<Outbound> {
    let Some(partner_id) = state.registry.lookup(leaver_id).and_then(|u| u.partner) else {
        // Out-of-state: leaver wasn't actually Paired. Silent no-op.
        return Vec::new();
    };

    debug_assert_eq!(
        state.registry.lookup(partner_id).and_then(|u| u.partner),
        Some(leaver_id),
        "partner symmetry violated before teardown"
    );

    // Step 1: single critical section, both partner pointers cleared,
    // both transition to Idle. The caller already holds the engine lock.
    if let Some(u) = state.registry.lookup_mut(leaver_id) {
        u.partner = None;
        u.state = ConnectionState::Idle;
    }
    if let Some(u) = state.registry.lookup_mut(partner_id) {
        u.partner = None;
        u.state = ConnectionState::Idle;
    }

    let mut outbound = Vec::new();

    // Step 2: notification to the leaver.
    if reason == TeardownReason::Skip {
        outbound.push((leaver_id, OutboundEvent::Skipped));
    }

    // Step 3: notification to the partner.
    outbound.push((
        partner_id,
        match reason {
            TeardownReason::Skip => OutboundEvent::PartnerSkipped,
            TeardownReason::Leave | TeardownReason::Disconnect => OutboundEvent::PartnerDisconnected,
        },
    ));

    // Step 4: re-queue the partner through the same Matcher entry point a
    // fresh join-queue would use.
    outbound.extend(matcher::join_or_wait(state, partner_id));

    outbound
}
