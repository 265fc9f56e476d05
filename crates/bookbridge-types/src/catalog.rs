//! Marketplace records the chat surfaces read but never own.

use serde::{Deserialize, Serialize};
use crate::id::EntityId;

/// A book listing, used to label sessions and assistant recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub seller_id: Option<EntityId>,
    #[serde(default)]
    pub seller_username: Option<String>,
}

/// Response of `POST /api/chatbot`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatbotReply {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub books: Vec<BookSummary>,
}

/// One line of the persisted shopping cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub price: f64,
    #[serde(default)]
    pub seller_id: Option<EntityId>,
    #[serde(default)]
    pub seller_username: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    pub fn from_book(book: &BookSummary) -> Option<Self> {
        Some(Self {
            id: book.id.clone(),
            title: book.title.clone(),
            author: if book.author.is_empty() {
                "Unknown".to_string()
            } else {
                book.author.clone()
            },
            price: book.price?,
            seller_id: book.seller_id.clone(),
            seller_username: book.seller_username.clone(),
            image_url: book.image_url.clone(),
            quantity: 1,
        })
    }

    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}
