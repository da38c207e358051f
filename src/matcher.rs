//! Matcher (C3).
//!
//! Pure decision logic: given a candidate and the current registry/queue
//! state, find an eligible waiter. Never performs I/O and never touches the
//! engine's lock itself; callers already hold it (see `engine`).

use crate::engine::{EngineState, Outbound};
use crate::events::OutboundEvent;
use crate::id::ConnectionId;
use crate::models::{ConnectionState, Tier, User};
use crate::queue::{QueueBucket, QueueSet};
use crate::registry::ConnectionRegistry;

/// Mutual eligibility: each side's stated preference must accept the
/// other's gender. The free-tier downgrade already happened in
/// [`User::new`](crate::models::User::new), so both sides here only ever
/// carry a non-`any` preference if they're premium.
fn is_eligible(candidate: &User, waiter: &User) -> bool {
    if waiter.connection_id == candidate.connection_id {
        return false;
    }
    if !candidate
        .preferred_gender
        .is_satisfied_by(waiter.gender)
    {
        return false;
    }
    if !waiter
        .preferred_gender
        .is_satisfied_by(candidate.gender)
    {
        return false;
    }
    true
}

/// Scan order: a premium candidate with a specific preference looks in
/// that gender's pool first, then `any`; everyone else scans `any, male,
/// female, other`.
fn scan_order(candidate: &User) -> &'static [QueueBucket] {
    if candidate.tier == Tier::Premium {
        match candidate.preferred_gender {
            crate::models::PreferredGender::Male => {
                &[QueueBucket::Male, QueueBucket::Any]
            }
            crate::models::PreferredGender::Female => {
                &[QueueBucket::Female, QueueBucket::Any]
            }
            crate::models::PreferredGender::Other => {
                &[QueueBucket::Other, QueueBucket::Any]
            }
            crate::models::PreferredGender::Any => &QueueBucket::ALL,
        }
    } else {
        &QueueBucket::ALL
    }
}

/// Finds the first eligible waiter for `candidate`, removing it from the
/// Queue Set on success. Ties within a pool break oldest-waiter-first.
pub fn find_match(
    registry: &ConnectionRegistry,
    queues: &mut QueueSet,
    candidate: &User,
) -> Option<ConnectionId> {
    for &bucket in scan_order(candidate) {
        let waiters: Vec<ConnectionId> = queues.iter_bucket(bucket).collect();
        for id in waiters {
            let Some(waiter) = registry.lookup(id) else {
                continue;
            };
            if is_eligible(candidate, waiter) {
                queues.remove(id);
                return Some(id);
            }
        }
    }
    None
}

/// The single Matcher entry point: both a fresh `join-queue` and a Session
/// Supervisor re-queue after the partner leaves call this same routine on
/// a connection whose state is being moved to `Waiting`.
///
/// On match: atomically pairs both sides and returns `matched` for each.
/// On no match: transitions the candidate to `Waiting`, enqueues it, and
/// returns `waiting` for it alone.
pub fn join_or_wait(state: &mut EngineState, candidate_id: ConnectionId) -> Vec<Outbound> {
    let candidate = state
        .registry
        .lookup(candidate_id)
        .cloned()
        .expect("join_or_wait called for an unregistered connection");

    match find_match(&state.registry, &mut state.queues, &candidate) {
        Some(partner_id) => {
            let partner = state
                .registry
                .lookup(partner_id)
                .cloned()
                .expect("matched partner must still be registered");

            debug_assert!(!state.queues.contains(candidate_id), "candidate must not be queued");
            debug_assert!(!state.queues.contains(partner_id), "matched partner must be dequeued");

            {
                let c = state
                    .registry
                    .lookup_mut(candidate_id)
                    .expect("candidate must be registered");
                c.partner = Some(partner_id);
                c.state = ConnectionState::Paired;
            }
            {
                let p = state
                    .registry
                    .lookup_mut(partner_id)
                    .expect("partner must be registered");
                p.partner = Some(candidate_id);
                p.state = ConnectionState::Paired;
            }

            vec![
                (
                    candidate_id,
                    OutboundEvent::Matched {
                        partner_id,
                        partner_info: partner.public_info(),
                    },
                ),
                (
                    partner_id,
                    OutboundEvent::Matched {
                        partner_id: candidate_id,
                        partner_info: candidate.public_info(),
                    },
                ),
            ]
        }
        None => {
            let c = state
                .registry
                .lookup_mut(candidate_id)
                .expect("candidate must be registered");
            c.state = ConnectionState::Waiting;
            let c = state.registry.lookup(candidate_id).expect("just set above");
            state.queues.enqueue(c);

            vec![(candidate_id, OutboundEvent::Waiting)]
        }
    }
}
