use serde::{Deserialize, Serialize};
use crate::id::EntityId;

/// Marketplace role of the signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

impl Role {
    /// Query parameter that carries the counterpart's id when opening a
    /// peer chat socket. The server treats every non-buyer as the selling
    /// side, so admins address buyers the way sellers do.
    pub fn counterpart_param(&self) -> &'static str {
        match self {
            Role::Buyer => "seller_id",
            Role::Seller | Role::Admin => "buyer_id",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Role::Buyer => "Buyer",
            Role::Seller => "Seller",
            Role::Admin => "Admin",
        }
    }
}

/// The signed-in user, read from client storage. Never mutated by the chat core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: EntityId,
    pub username: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl CurrentUser {
    pub fn new(id: impl Into<EntityId>, username: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role,
            email: None,
        }
    }
}
