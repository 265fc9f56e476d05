//! Socket URL construction.
//!
//! The peer chat endpoint is keyed by book, and the counterpart is named by
//! the role the current user does *not* hold: buyers pass `seller_id`,
//! sellers (and admins) pass `buyer_id`.

use bookbridge_types::{
    ChatError, EntityId, Result,
    config::{ConnectionConfig, EndpointConfig},
    connection::ConnectTarget,
    user::Role,
};
use crate::auth::AuthSession;

/// Build the socket URL for `target`, or explain why it cannot be opened.
pub fn connection_url(
    endpoint: &EndpointConfig,
    config: &ConnectionConfig,
    target: &ConnectTarget,
    auth: &AuthSession,
) -> Result<String> {
    if auth.token.trim().is_empty() {
        return Err(ChatError::AuthRequired);
    }

    let mut url = match target {
        ConnectTarget::Peer {
            session_id,
            book_id,
            counterpart_id,
        } => {
            let book_id = required(book_id, "Missing book information. Please try again.")?;
            let counterpart_id =
                required(counterpart_id, "Missing seller or buyer information. Please try again.")?;
            if session_id.is_pending() && auth.user.role != Role::Buyer {
                return Err(ChatError::Validation(
                    "Only buyers can initiate chats with sellers.".to_string(),
                ));
            }
            format!(
                "{}/ws/chat/{}?{}={}",
                endpoint.ws_origin(),
                urlencoding::encode(book_id.as_str()),
                auth.user.role.counterpart_param(),
                urlencoding::encode(counterpart_id.as_str()),
            )
        }
        ConnectTarget::Community => format!("{}/ws/community", endpoint.ws_origin()),
    };

    if config.token_in_query {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str("token=");
        url.push_str(&urlencoding::encode(&auth.token));
    }
    Ok(url)
}

fn required<'a>(id: &'a Option<EntityId>, message: &str) -> Result<&'a EntityId> {
    match id {
        Some(id) if !id.is_pending() => Ok(id),
        _ => Err(ChatError::Validation(message.to_string())),
    }
}
