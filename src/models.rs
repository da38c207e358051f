//! Core data model.
//!
//! A [`User`] is the in-memory record for one live connection. It is
//! mutated only through the engine's single lock; no other component
//! reaches into it directly.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::id::ConnectionId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// A waiting/joining user's requested partner gender. `Any` places no
/// constraint; the other variants request a specific [`Gender`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PreferredGender {
    Any,
    Male,
    Female,
    Other,
}

impl PreferredGender {
    /// Does `gender` satisfy this preference?
    pub fn is_satisfied_by(self, gender: Gender) -> bool {
        match self {
            PreferredGender::Any => true,
            PreferredGender::Male => gender == Gender::Male,
            PreferredGender::Female => gender == Gender::Female,
            PreferredGender::Other => gender == Gender::Other,
        }
    }
}

impl From<Gender> for PreferredGender {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => PreferredGender::Male,
            Gender::Female => PreferredGender::Female,
            Gender::Other => PreferredGender::Other,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

/// The lifecycle of one connection: unpaired and idle, waiting in a
/// queue, or paired with a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Waiting,
    Paired,
}

#[derive(Debug, Clone)]
pub struct User {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub username: String,
    pub gender: Gender,
    pub age: u32,
    pub preferred_gender: PreferredGender,
    pub tier: Tier,
    pub partner: Option<ConnectionId>,
    pub state: ConnectionState,
}

impl User {
    pub fn new(
        connection_id: ConnectionId,
        user_id: String,
        username: String,
        gender: Gender,
        age: u32,
        preferred_gender: PreferredGender,
        tier: Tier,
    ) -> Self {
        // Free users may only express `any`. The downgrade happens once,
        // at construction, so every later read of `preferred_gender`
        // already reflects it.
        let preferred_gender = match tier {
            Tier::Premium => preferred_gender,
            Tier::Free => PreferredGender::Any,
        };

        Self {
            connection_id,
            user_id,
            username,
            gender,
            age,
            preferred_gender,
            tier,
            partner: None,
            state: ConnectionState::Idle,
        }
    }

    pub fn public_info(&self) -> PartnerInfo {
        PartnerInfo {
            name: self.username.clone(),
            gender: self.gender,
            age: self.age,
        }
    }
}

/// The subset of a [`User`] a matched partner is allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerInfo {
    pub name: String,
    pub gender: Gender,
    pub age: u32,
}
