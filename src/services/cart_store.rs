//! Cart persisted in local storage under `m19_cart`

use crate::domain::cart::{Cart, CartItem};
use crate::domain::error::Result;
use crate::io::local_storage::SharedStorage;
use tracing::{info, warn};

pub const CART_KEY: &str = "m19_cart";

pub struct CartStore {
    storage: SharedStorage,
    cart: Cart,
}

impl CartStore {
    /// Restore the cart. A stored value that no longer parses is dropped
    /// from storage and the cart starts empty.
    pub fn load(storage: SharedStorage) -> Self {
        let restored = storage.lock().get::<Cart>(CART_KEY);
        let cart = match restored {
            Ok(cart) => cart.unwrap_or_default(),
            Err(e) => {
                warn!(key = %CART_KEY, error = %e, "cart_restore_failed_removing");
                if let Err(e) = storage.lock().remove(CART_KEY) {
                    warn!(key = %CART_KEY, error = %e, "cart_remove_failed");
                }
                Cart::default()
            }
        };
        info!(items = %cart.items().len(), "cart_loaded");
        Self { storage, cart }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn items(&self) -> &[CartItem] {
        self.cart.items()
    }

    pub fn total_items(&self) -> u32 {
        self.cart.total_items()
    }

    pub fn total_price(&self) -> u64 {
        self.cart.total_price()
    }

    pub fn add(&mut self, item: CartItem) -> Result<()> {
        info!(item_id = %item.id, quantity = %item.quantity, "cart_add");
        self.commit(|cart| {
            cart.add(item);
            true
        })?;
        Ok(())
    }

    pub fn remove(&mut self, id: i64) -> Result<bool> {
        let removed = self.commit(|cart| cart.remove(id))?;
        if removed {
            info!(item_id = %id, "cart_remove");
        }
        Ok(removed)
    }

    pub fn update_quantity(&mut self, id: i64, quantity: u32) -> Result<bool> {
        self.commit(|cart| cart.update_quantity(id, quantity))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.commit(|cart| {
            cart.clear();
            true
        })?;
        info!("cart_cleared");
        Ok(())
    }

    /// Apply `change` to a copy, persist it, then adopt it. Nothing is
    /// written when `change` reports no effect; a failed write keeps the
    /// current cart.
    fn commit(&mut self, change: impl FnOnce(&mut Cart) -> bool) -> Result<bool> {
        let mut next = self.cart.clone();
        if !change(&mut next) {
            return Ok(false);
        }
        self.storage.lock().set(CART_KEY, &next)?;
        self.cart = next;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::local_storage::LocalStorage;
    use tempfile::TempDir;

    fn item(id: i64, price: u64, quantity: u32) -> CartItem {
        CartItem {
            id,
            title: format!("item-{id}"),
            price,
            price_max: None,
            image: None,
            quantity,
            category_id: None,
        }
    }

    #[test]
    fn test_cart_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let mut store = CartStore::load(LocalStorage::open_shared(&path));
        store.add(item(1, 500, 2)).unwrap();
        store.add(item(2, 1200, 1)).unwrap();
        store.update_quantity(1, 3).unwrap();

        let reloaded = CartStore::load(LocalStorage::open_shared(&path));
        assert_eq!(reloaded.items().len(), 2);
        assert_eq!(reloaded.total_items(), 4);
        assert_eq!(reloaded.total_price(), 2700);
    }

    #[test]
    fn test_corrupt_entry_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        {
            let storage = LocalStorage::open_shared(&path);
            storage.lock().set(CART_KEY, "garbage").unwrap();
            storage.lock().set("auth_token", "t").unwrap();
        }

        let store = CartStore::load(LocalStorage::open_shared(&path));
        assert!(store.cart().is_empty());

        let reopened = LocalStorage::open(&path);
        assert!(!reopened.contains(CART_KEY));
        assert!(reopened.contains("auth_token"));
    }

    #[test]
    fn test_failed_write_keeps_cart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut store = CartStore::load(LocalStorage::open_shared(&path));
        store.add(item(1, 500, 1)).unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.add(item(2, 900, 1)).is_err());
        assert!(store.clear().is_err());
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.total_price(), 500);
    }

    #[test]
    fn test_remove_missing_does_not_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut store = CartStore::load(LocalStorage::open_shared(&path));
        assert!(!store.remove(42).unwrap());
        assert!(!path.exists());
    }
}
