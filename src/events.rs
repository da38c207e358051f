//! Wire protocol.
//!
//! Bidirectional framed JSON events over the WebSocket transport. Each
//! event is a tagged object; the tag is the canonical event name.
//! Signaling payloads (`offer`/`answer`/`candidate`) are forwarded
//! verbatim as opaque JSON; the server never inspects them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::id::ConnectionId;
use crate::models::{Gender, PartnerInfo, PreferredGender, Tier};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum InboundEvent {
    JoinQueue(JoinQueuePayload),
    Offer {
        offer: serde_json::Value,
        target_id: ConnectionId,
    },
    Answer {
        answer: serde_json::Value,
        target_id: ConnectionId,
    },
    IceCandidate {
        candidate: serde_json::Value,
        target_id: ConnectionId,
    },
    Message {
        text: String,
    },
    Skip,
    LeaveQueue,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct JoinQueuePayload {
    #[validate(custom(function = "crate::validate::user_id"))]
    pub user_id: String,
    #[validate(custom(function = "crate::validate::username"))]
    pub username: String,
    pub gender: Gender,
    #[serde(default = "default_preferred_gender")]
    pub preferred_gender: PreferredGender,
    pub tier: Tier,
    #[validate(range(max = 150))]
    pub age: u32,
}

fn default_preferred_gender() -> PreferredGender {
    PreferredGender::Any
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum OutboundEvent {
    Matched {
        partner_id: ConnectionId,
        partner_info: PartnerInfo,
    },
    Waiting,
    Skipped,
    PartnerSkipped,
    PartnerDisconnected,
    Offer {
        offer: serde_json::Value,
        from_id: ConnectionId,
    },
    Answer {
        answer: serde_json::Value,
        from_id: ConnectionId,
    },
    IceCandidate {
        candidate: serde_json::Value,
        from_id: ConnectionId,
    },
    Message {
        text: String,
        sender: ConnectionId,
        timestamp: DateTime<Utc>,
    },
}
