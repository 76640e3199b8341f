//! Shopping cart model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub title: String,
    pub price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
}

/// Cart contents; serialized as a bare JSON array of items
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn total_price(&self) -> u64 {
        self.items.iter().map(|i| i.price * u64::from(i.quantity)).sum()
    }

    /// Add `item`, merging quantities with an existing entry of the same id
    pub fn add(&mut self, item: CartItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
    }

    /// Returns false if no item had that id
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    /// Set quantity; zero removes the item
    pub fn update_quantity(&mut self, id: i64, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(id);
        }
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, price: u64, quantity: u32) -> CartItem {
        CartItem {
            id,
            title: format!("product-{id}"),
            price,
            price_max: None,
            image: None,
            quantity,
            category_id: None,
        }
    }

    #[test]
    fn test_add_merges_same_id() {
        let mut cart = Cart::default();
        cart.add(item(1, 500, 1));
        cart.add(item(1, 500, 2));
        cart.add(item(2, 1200, 1));
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.total_items(), 4);
        assert_eq!(cart.total_price(), 500 * 3 + 1200);
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = Cart::default();
        cart.add(item(1, 500, 1));
        assert!(cart.update_quantity(1, 5));
        assert_eq!(cart.total_items(), 5);
        assert!(cart.update_quantity(1, 0));
        assert!(cart.is_empty());
        assert!(!cart.update_quantity(9, 1));
    }

    #[test]
    fn test_serializes_as_array() {
        let mut cart = Cart::default();
        cart.add(item(3, 100, 1));
        let json = serde_json::to_string(&cart).unwrap();
        assert!(json.starts_with('['));
        let back: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cart);
    }
}
