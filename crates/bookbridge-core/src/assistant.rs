//! Book assistant transcript: the chatbot widget next to the chats.

use bookbridge_types::{Result, catalog::ChatbotReply};
use serde::{Deserialize, Serialize};

use crate::ports::ChatApiPort;

pub const WELCOME_TEXT: &str = "Hello! I'm BookBridge, your book assistant. How can I help you find books today? You can ask me to find books by title, author, or genre.";
pub const EMPTY_REPLY_TEXT: &str = "Sorry, I couldn't process your request. Please try again.";
pub const ERROR_REPLY_TEXT: &str = "Sorry, there was an error processing your request. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantTurn {
    pub role: AssistantRole,
    pub text: String,
}

impl AssistantTurn {
    fn user(text: impl Into<String>) -> Self {
        Self {
            role: AssistantRole::User,
            text: text.into(),
        }
    }

    fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: AssistantRole::Assistant,
            text: text.into(),
        }
    }
}

/// Render a chatbot reply, with recommendations as a markdown link list.
pub fn format_reply(reply: &ChatbotReply) -> String {
    let mut text = if reply.response.trim().is_empty() {
        EMPTY_REPLY_TEXT.to_string()
    } else {
        reply.response.clone()
    };

    if !reply.books.is_empty() {
        text.push_str("\n\n**Book Recommendations:**");
        for book in &reply.books {
            text.push_str(&format!(
                "\n- [{} by {}](book-detail.html?id={})",
                book.title, book.author, book.id
            ));
        }
    }
    text
}

#[derive(Debug, Clone)]
pub struct AssistantChat {
    transcript: Vec<AssistantTurn>,
    waiting: bool,
}

impl AssistantChat {
    pub fn new() -> Self {
        Self {
            transcript: vec![AssistantTurn::assistant(WELCOME_TEXT)],
            waiting: false,
        }
    }

    pub fn transcript(&self) -> &[AssistantTurn] {
        &self.transcript
    }

    /// Whether a reply is outstanding (the typing indicator)
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Record the user's question. Returns the trimmed query to post, or
    /// `None` for blank input.
    pub fn begin(&mut self, query: &str) -> Option<String> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        self.transcript.push(AssistantTurn::user(query));
        self.waiting = true;
        Some(query.to_string())
    }

    /// Record the outcome of the request `begin` started. Failures become an
    /// apology turn.
    pub fn complete(&mut self, outcome: Result<ChatbotReply>) {
        self.waiting = false;
        let text = match outcome {
            Ok(reply) => format_reply(&reply),
            Err(e) => {
                log::error!("Assistant request failed: {}", e);
                ERROR_REPLY_TEXT.to_string()
            }
        };
        self.transcript.push(AssistantTurn::assistant(text));
    }

    /// `begin` + request + `complete` in one go, for callers that own the
    /// chat exclusively.
    pub async fn ask(&mut self, api: &dyn ChatApiPort, query: &str) -> bool {
        let Some(query) = self.begin(query) else {
            return false;
        };
        let outcome = api.chatbot(&query).await;
        self.complete(outcome);
        true
    }
}

impl Default for AssistantChat {
    fn default() -> Self {
        Self::new()
    }
}
