//! Actors and roles

use crate::ids::ActorId;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Role tiers, ordered from least to most privileged
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Owns cases and pays for them
    Customer,
    /// Works cases and reconciles payments
    Operator,
    /// Full access, including operator assignment
    Administrator,
}

impl Role {
    /// Operator or administrator
    pub fn is_staff(&self) -> bool {
        *self >= Role::Operator
    }
}

/// The caller of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<ActorId>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn customer(id: impl Into<ActorId>) -> Self {
        Self::new(id, Role::Customer)
    }

    pub fn operator(id: impl Into<ActorId>) -> Self {
        Self::new(id, Role::Operator)
    }

    pub fn administrator(id: impl Into<ActorId>) -> Self {
        Self::new(id, Role::Administrator)
    }

    /// The scheduler identity; carries administrator rights
    pub fn system() -> Self {
        Self::new(ActorId::system(), Role::Administrator)
    }
}
