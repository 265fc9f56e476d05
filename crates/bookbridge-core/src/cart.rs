//! Shopping cart persisted in client storage.
//!
//! Every operation is a full read-modify-write of one JSON array.

use std::rc::Rc;

use bookbridge_types::{ChatError, EntityId, Result, catalog::CartItem};
use crate::ports::StoragePort;

pub const CART_KEY: &str = "cart";
pub const SHIPPING_FEE: f64 = 40.0;

const DISCOUNT_CODES: &[(&str, u32)] = &[("WELCOME10", 10), ("BOOKS20", 20), ("SUMMER30", 30)];

/// Percentage off for a promo code, if it is one we know
pub fn discount_for_code(code: &str) -> Option<u32> {
    let code = code.trim();
    DISCOUNT_CODES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, percent)| *percent)
}

#[derive(Clone)]
pub struct CartStore {
    storage: Rc<dyn StoragePort>,
}

impl CartStore {
    pub fn new(storage: Rc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    /// Current items. A corrupt cart reads as empty.
    pub async fn items(&self) -> Result<Vec<CartItem>> {
        let Some(bytes) = self.storage.get(CART_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_slice(&bytes) {
            Ok(items) => Ok(items),
            Err(e) => {
                log::warn!("Stored cart is unreadable, starting empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, items: &[CartItem]) -> Result<()> {
        let bytes = serde_json::to_vec(items)?;
        self.storage.set(CART_KEY, &bytes).await
    }

    /// Add one copy of `item`, bumping the quantity if it is already there.
    pub async fn add(&self, item: CartItem) -> Result<Vec<CartItem>> {
        if item.id.is_pending() || item.title.trim().is_empty() || !(item.price > 0.0) {
            return Err(ChatError::Validation("Invalid book data".to_string()));
        }

        let mut items = self.items().await?;
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => existing.quantity += 1,
            None => {
                log::info!("Added \"{}\" to cart", item.title);
                items.push(CartItem { quantity: 1, ..item });
            }
        }
        self.save(&items).await?;
        Ok(items)
    }

    pub async fn remove(&self, id: &EntityId) -> Result<Vec<CartItem>> {
        let mut items = self.items().await?;
        items.retain(|item| &item.id != id);
        self.save(&items).await?;
        Ok(items)
    }

    /// Set the quantity of one line. Values below 1 become 1; removing a
    /// line is `remove`'s job.
    pub async fn update_quantity(&self, id: &EntityId, quantity: u32) -> Result<Vec<CartItem>> {
        let mut items = self.items().await?;
        let item = items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| ChatError::NotFound(format!("Cart item {}", id)))?;
        item.quantity = quantity.max(1);
        self.save(&items).await?;
        Ok(items)
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.delete(CART_KEY).await
    }

    /// Total number of copies, for the header badge
    pub async fn count(&self) -> Result<u32> {
        Ok(self.items().await?.iter().map(|item| item.quantity).sum())
    }
}

/// Order totals as the cart page shows them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartSummary {
    pub subtotal: f64,
    pub shipping: f64,
    pub discount: f64,
    pub total: f64,
}

impl CartSummary {
    pub fn compute(items: &[CartItem], discount_percent: u32) -> Self {
        let subtotal: f64 = items.iter().map(CartItem::line_total).sum();
        let shipping = if subtotal > 0.0 { SHIPPING_FEE } else { 0.0 };
        let discount = subtotal * f64::from(discount_percent.min(100)) / 100.0;
        Self {
            subtotal,
            shipping,
            discount,
            total: subtotal + shipping - discount,
        }
    }
}
