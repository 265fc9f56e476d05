//! REST adapter for the marketplace API.
//! Uses browser `fetch()` via gloo-net.

use std::cell::RefCell;

use async_trait::async_trait;
use gloo_net::http::{Request, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use bookbridge_core::ports::ChatApiPort;
use bookbridge_types::{
    ChatError, EntityId, Result,
    catalog::{BookSummary, ChatbotReply},
    config::EndpointConfig,
};

#[derive(Serialize)]
struct ChatbotRequest<'a> {
    query: &'a str,
}

/// `ChatApiPort` over HTTP. The bearer token is swapped in after login or
/// cleared on logout without rebuilding the adapter.
pub struct RestChatApi {
    endpoint: EndpointConfig,
    token: RefCell<Option<String>>,
}

impl RestChatApi {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self {
            endpoint,
            token: RefCell::new(None),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.borrow_mut() = token;
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.borrow().as_deref() {
            Some(token) => builder.header("Authorization", &format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Authenticated GET
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        if self.token.borrow().is_none() {
            return Err(ChatError::AuthRequired);
        }
        let url = self.endpoint.api_url(path);
        let response = self
            .authorize(Request::get(&url))
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        decode(response).await
    }
}

/// Map a response onto `T`, or onto the error the UI should show.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.ok() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        log::warn!("{} returned HTTP {}", response.url(), status);
        return Err(ChatError::from_status(status, &body));
    }
    response
        .json()
        .await
        .map_err(|e| ChatError::Serialization(e.to_string()))
}

#[async_trait(?Send)]
impl ChatApiPort for RestChatApi {
    async fn list_chats(&self) -> Result<Value> {
        self.get("chats").await
    }

    async fn chat_history(&self, chat_id: &EntityId) -> Result<Value> {
        self.get(&format!("chats/{}", chat_id)).await
    }

    async fn book(&self, book_id: &EntityId) -> Result<BookSummary> {
        self.get(&format!("books/{}", book_id)).await
    }

    async fn books(&self) -> Result<Vec<BookSummary>> {
        let value: Value = self.get("books").await?;
        // A null listing means no books.
        match value {
            Value::Null => Ok(Vec::new()),
            other => Ok(serde_json::from_value(other)?),
        }
    }

    async fn chatbot(&self, query: &str) -> Result<ChatbotReply> {
        let url = self.endpoint.api_url("chatbot");
        let response = self
            .authorize(Request::post(&url).header("Content-Type", "application/json"))
            .json(&ChatbotRequest { query })
            .map_err(|e| ChatError::Serialization(e.to_string()))?
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        decode(response).await
    }
}
