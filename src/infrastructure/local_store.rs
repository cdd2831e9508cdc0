//! Local cart persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::aggregates::Cart;
use crate::domain::ports::LocalCartStore;

pub const DEFAULT_CART_KEY: &str = "cart";

/// Stores the cart as a JSON document at `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileCartStore {
    path: PathBuf,
}

impl FileCartStore {
    pub fn new(dir: impl AsRef<Path>) -> Self { Self::with_key(dir, DEFAULT_CART_KEY) }

    pub fn with_key(dir: impl AsRef<Path>, key: &str) -> Self {
        Self { path: dir.as_ref().join(format!("{key}.json")) }
    }

    pub fn path(&self) -> &Path { &self.path }

    async fn try_write(&self, cart: &Cart) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut stamped = cart.clone();
        stamped.stamp_now();
        let json = serde_json::to_vec_pretty(&stamped)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}

#[async_trait]
impl LocalCartStore for FileCartStore {
    async fn read(&self) -> Cart {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no local cart yet");
                return Cart::empty();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "local cart unreadable");
                return Cart::empty();
            }
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "local cart corrupt, starting empty");
            Cart::empty()
        })
    }

    async fn write(&self, cart: &Cart) -> bool {
        match self.try_write(cart).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to persist local cart");
                false
            }
        }
    }
}

/// Request-scoped store for a cart the client sent over the wire. The client
/// owns the real local storage, so writes are captured and handed back.
#[derive(Debug)]
pub struct SubmittedCart {
    submitted: Cart,
    written: Mutex<Option<Cart>>,
}

impl SubmittedCart {
    pub fn new(submitted: Cart) -> Self { Self { submitted, written: Mutex::new(None) } }

    pub async fn take_written(&self) -> Option<Cart> { self.written.lock().await.take() }
}

#[async_trait]
impl LocalCartStore for SubmittedCart {
    async fn read(&self) -> Cart { self.submitted.clone() }

    async fn write(&self, cart: &Cart) -> bool {
        let mut stamped = cart.clone();
        stamped.stamp_now();
        *self.written.lock().await = Some(stamped);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::LineItem;
    use crate::domain::value_objects::Quantity;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    #[tokio::test]
    async fn test_missing_file_reads_empty() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = FileCartStore::new(dir.path());
        assert!(store.read().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_write_then_read() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = FileCartStore::new(dir.path().join("nested"));
        let cart = Cart::from_items([LineItem::new("P1", Quantity::new(2)?, Decimal::new(1500, 0))]);

        assert!(store.write(&cart).await);
        let back = store.read().await;

        assert_eq!(back, cart);
        assert!(back.last_updated() >= cart.last_updated());
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_empty() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = FileCartStore::new(dir.path());
        tokio::fs::write(store.path(), b"{ not json").await?;
        assert!(store.read().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_quantity_is_treated_as_corrupt() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = FileCartStore::with_key(dir.path(), "guest");
        let json = r#"{"items":[{"product_id":"P1","quantity":0,"unit_price":"10"}],"last_updated":"2024-05-01T00:00:00Z"}"#;
        tokio::fs::write(store.path(), json).await?;
        assert!(store.read().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unwritable_location_reports_false() -> TestResult {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, b"file, not a directory").await?;
        let store = FileCartStore::new(&blocker);
        assert!(!store.write(&Cart::empty()).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_submitted_cart_captures_write() {
        let store = SubmittedCart::new(Cart::empty());
        assert!(store.take_written().await.is_none());
        let cart = Cart::from_items([LineItem::new("P1", Quantity::ONE, Decimal::ONE)]);
        assert!(store.write(&cart).await);
        assert_eq!(store.take_written().await, Some(cart));
    }
}
