//! Local/remote cart reconciliation at sign-in.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, LineItem};
use crate::domain::events::{CartEvent, CartStoreKind};
use crate::domain::ports::{LocalCartStore, ProductCatalog, RemoteCartStore, RemoteRead};
use crate::domain::services::repricing::{reprice, PriceWarning};
use crate::domain::value_objects::{LineKey, UserId};

/// Merges two carts. For a key present in both, the larger quantity wins and a
/// tie keeps the local item. Quantities are never summed, so merging a cart
/// with itself yields the same cart, merge version included.
pub fn merge(local: &Cart, remote: &Cart) -> Cart {
    if remote.is_empty() { return local.clone(); }
    if local.is_empty() { return remote.clone(); }

    let mut items: Vec<LineItem> = Vec::with_capacity(local.item_count() + remote.item_count());
    let mut index: HashMap<LineKey, usize> = HashMap::new();

    for item in local.items().iter().chain(remote.items()) {
        let key = item.key();
        match index.get(&key) {
            Some(&at) => {
                if item.quantity > items[at].quantity { items[at] = item.clone(); }
            }
            None => {
                index.insert(key, items.len());
                items.push(item.clone());
            }
        }
    }

    let mut merged = Cart::from_items(items);
    merged.stamp_now();
    if let Some(version) = local.merge_version().filter(|_| local.shares_merge_version(remote)) {
        merged.stamp_merge_version(version);
    }
    merged
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteStatus {
    Written { cart_id: Uuid },
    Failed { reason: String },
    /// Both stores already held the same merge; nothing was written.
    InSync,
    /// The remote cart could not be read, so it was neither merged nor overwritten.
    Unavailable { reason: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct Reconciliation {
    pub cart: Cart,
    pub local_written: bool,
    pub remote: RemoteStatus,
    pub warnings: Vec<PriceWarning>,
    pub events: Vec<CartEvent>,
}

impl Reconciliation {
    /// Both stores hold the returned cart.
    pub fn is_consistent(&self) -> bool {
        matches!(self.remote, RemoteStatus::InSync) || (self.local_written && matches!(self.remote, RemoteStatus::Written { .. }))
    }
}

#[derive(Clone)]
pub struct Reconciler {
    local: Arc<dyn LocalCartStore>,
    remote: Arc<dyn RemoteCartStore>,
    catalog: Option<Arc<dyn ProductCatalog>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").field("reprices", &self.catalog.is_some()).finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(local: Arc<dyn LocalCartStore>, remote: Arc<dyn RemoteCartStore>) -> Self {
        Self { local, remote, catalog: None }
    }

    /// Reprice merged carts against the catalog before they are written.
    pub fn with_catalog(mut self, catalog: Arc<dyn ProductCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub async fn reconcile(&self, user_id: &UserId) -> Reconciliation {
        let (local, remote) = tokio::join!(self.local.read(), self.remote.read(user_id));

        let remote = match remote {
            RemoteRead::Found(cart) => cart,
            RemoteRead::NotFound => Cart::empty(),
            RemoteRead::FetchError(reason) => {
                warn!(%user_id, error = %reason, "remote cart unavailable, keeping local cart");
                return Reconciliation {
                    cart: local,
                    local_written: false,
                    remote: RemoteStatus::Unavailable { reason: reason.clone() },
                    warnings: vec![],
                    events: vec![CartEvent::RemoteUnavailable { user_id: user_id.clone(), reason }],
                };
            }
        };

        if local.shares_merge_version(&remote) {
            debug!(%user_id, "local and remote carts already reconciled");
            return Reconciliation { cart: remote, local_written: false, remote: RemoteStatus::InSync, warnings: vec![], events: vec![] };
        }

        let merged = merge(&local, &remote);
        let (mut merged, warnings) = match &self.catalog {
            Some(catalog) => {
                let repriced = reprice(merged, catalog.as_ref()).await;
                (repriced.cart, repriced.warnings)
            }
            None => (merged, vec![]),
        };
        let version = Uuid::now_v7();
        merged.stamp_merge_version(version);

        let (local_written, remote_written) = tokio::join!(self.local.write(&merged), self.remote.write(user_id, &merged));

        let mut events = vec![];
        if !local_written {
            events.push(CartEvent::WriteFailed { user_id: user_id.clone(), store: CartStoreKind::Local, reason: "local write failed".into() });
        }
        let remote = match remote_written {
            Ok(cart_id) => RemoteStatus::Written { cart_id },
            Err(e) => {
                warn!(%user_id, error = %e, "failed to write merged cart to remote store");
                events.push(CartEvent::WriteFailed { user_id: user_id.clone(), store: CartStoreKind::Remote, reason: e.to_string() });
                RemoteStatus::Failed { reason: e.to_string() }
            }
        };

        info!(%user_id, items = merged.item_count(), %version, local_written, "cart reconciled");
        events.insert(0, CartEvent::Merged { user_id: user_id.clone(), merge_version: version, item_count: merged.item_count() });

        Reconciliation { cart: merged, local_written, remote, warnings, events }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockLocalCartStore, MockProductCatalog, MockRemoteCartStore, StoreError, CatalogError};
    use crate::domain::value_objects::{Quantity, VariantAttributes};
    use mockall::predicate::always;
    use rust_decimal::Decimal;

    fn item(id: &str, qty: u32, price: i64) -> LineItem {
        LineItem::new(id, Quantity::new(qty).unwrap(), Decimal::new(price, 0))
    }

    fn qty_of(cart: &Cart, id: &str) -> Option<u32> {
        cart.get(&LineKey::product(id)).map(|i| i.quantity.value())
    }

    #[test]
    fn test_merge_is_idempotent() {
        let cart = Cart::from_items([item("P1", 2, 100), item("P2", 1, 50)]);
        assert_eq!(merge(&cart, &cart), cart);
    }

    #[test]
    fn test_merge_identity() {
        let cart = Cart::from_items([item("P1", 2, 100)]);
        assert_eq!(merge(&Cart::empty(), &cart), cart);
        assert_eq!(merge(&cart, &Cart::empty()), cart);
    }

    #[test]
    fn test_merge_takes_larger_quantity() {
        let small = Cart::from_items([item("P1", 2, 100)]);
        let large = Cart::from_items([item("P1", 5, 100)]);
        assert_eq!(qty_of(&merge(&small, &large), "P1"), Some(5));
        assert_eq!(qty_of(&merge(&large, &small), "P1"), Some(5));
    }

    #[test]
    fn test_merge_tie_keeps_local_item() {
        let local = Cart::from_items([item("P1", 3, 100)]);
        let remote = Cart::from_items([item("P1", 3, 120)]);
        assert_eq!(merge(&local, &remote).items()[0].unit_price, Decimal::new(100, 0));
    }

    #[test]
    fn test_merge_union_preserves_insertion_order() {
        let local = Cart::from_items([item("P1", 1, 100), item("P3", 1, 100)]);
        let remote = Cart::from_items([item("P2", 1, 100), item("P3", 2, 100)]);
        let merged = merge(&local, &remote);
        let ids: Vec<&str> = merged.items().iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P3", "P2"]);
        assert_eq!(qty_of(&merged, "P3"), Some(2));
    }

    #[test]
    fn test_merge_keeps_variants_apart() {
        let m = VariantAttributes::new([("size", "M")]);
        let l = VariantAttributes::new([("size", "L")]);
        let local = Cart::from_items([item("SHIRT", 1, 100).with_variant(m)]);
        let remote = Cart::from_items([item("SHIRT", 4, 100).with_variant(l)]);
        assert_eq!(merge(&local, &remote).item_count(), 2);
    }

    #[test]
    fn test_merge_keeps_shared_merge_version() {
        let mut cart = Cart::from_items([item("P1", 2, 100), item("P2", 1, 50)]);
        cart.stamp_merge_version(Uuid::now_v7());
        assert_eq!(merge(&cart, &cart), cart);

        let mut other = cart.clone();
        other.stamp_merge_version(Uuid::now_v7());
        assert_eq!(merge(&cart, &other).merge_version(), None);
    }

    #[test]
    fn test_merge_with_empty_keeps_decoded_cart_unique() {
        let json = r#"{"items":[
            {"product_id":"P1","variant":{"Size":"M"},"quantity":1,"unit_price":"100"},
            {"product_id":"P1","variant":{"size":" M"},"quantity":1,"unit_price":"100"}
        ],"last_updated":"2024-05-01T10:00:00Z"}"#;
        let local: Cart = serde_json::from_str(json).unwrap();
        assert_eq!(merge(&local, &Cart::empty()).item_count(), 1);
        assert_eq!(merge(&Cart::empty(), &local).item_count(), 1);
    }

    fn remote_returning(read: RemoteRead) -> MockRemoteCartStore {
        let mut remote = MockRemoteCartStore::new();
        remote.expect_read().return_once(move |_| read);
        remote
    }

    fn local_returning(cart: Cart) -> MockLocalCartStore {
        let mut local = MockLocalCartStore::new();
        local.expect_read().return_once(move || cart);
        local
    }

    #[tokio::test]
    async fn test_reconcile_merges_and_writes_both_stores() {
        let mut local = local_returning(Cart::from_items([item("P1", 1, 1000)]));
        local.expect_write().withf(|cart| cart.item_count() == 2 && cart.merge_version().is_some()).times(1).returning(|_| true);

        let mut remote = remote_returning(RemoteRead::Found(Cart::from_items([item("P1", 3, 1000), item("P2", 1, 500)])));
        let cart_id = Uuid::now_v7();
        remote.expect_write().with(always(), always()).times(1).returning(move |_, _| Ok(cart_id));

        let reconciler = Reconciler::new(Arc::new(local), Arc::new(remote));
        let outcome = reconciler.reconcile(&UserId::new("u1")).await;

        assert!(outcome.is_consistent());
        assert_eq!(outcome.remote, RemoteStatus::Written { cart_id });
        assert_eq!(qty_of(&outcome.cart, "P1"), Some(3));
        assert_eq!(qty_of(&outcome.cart, "P2"), Some(1));
        assert!(matches!(outcome.events[0], CartEvent::Merged { item_count: 2, .. }));
    }

    #[tokio::test]
    async fn test_reconcile_without_remote_cart_pushes_local() {
        let mut local = local_returning(Cart::from_items([item("P1", 2, 1000)]));
        local.expect_write().times(1).returning(|_| true);
        let mut remote = remote_returning(RemoteRead::NotFound);
        remote.expect_write().withf(|_, cart| cart.item_count() == 1).times(1).returning(|_, _| Ok(Uuid::now_v7()));

        let outcome = Reconciler::new(Arc::new(local), Arc::new(remote)).reconcile(&UserId::new("u1")).await;

        assert_eq!(qty_of(&outcome.cart, "P1"), Some(2));
        assert!(outcome.is_consistent());
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_remote_untouched() {
        let local = local_returning(Cart::from_items([item("P1", 1, 1000)]));
        let mut remote = remote_returning(RemoteRead::FetchError("connection reset".into()));
        remote.expect_write().never();

        let outcome = Reconciler::new(Arc::new(local), Arc::new(remote)).reconcile(&UserId::new("u1")).await;

        assert_eq!(outcome.remote, RemoteStatus::Unavailable { reason: "connection reset".into() });
        assert_eq!(qty_of(&outcome.cart, "P1"), Some(1));
        assert!(!outcome.is_consistent());
    }

    #[tokio::test]
    async fn test_shared_merge_version_skips_writes() {
        let mut cart = Cart::from_items([item("P1", 1, 1000)]);
        cart.stamp_merge_version(Uuid::now_v7());

        let mut local = local_returning(cart.clone());
        local.expect_write().never();
        let mut remote = remote_returning(RemoteRead::Found(cart.clone()));
        remote.expect_write().never();

        let outcome = Reconciler::new(Arc::new(local), Arc::new(remote)).reconcile(&UserId::new("u1")).await;

        assert_eq!(outcome.remote, RemoteStatus::InSync);
        assert_eq!(outcome.cart, cart);
        assert!(outcome.events.is_empty());
    }

    #[tokio::test]
    async fn test_remote_write_failure_does_not_block_local_write() {
        let mut local = local_returning(Cart::from_items([item("P1", 1, 1000)]));
        local.expect_write().times(1).returning(|_| true);
        let mut remote = remote_returning(RemoteRead::NotFound);
        remote.expect_write().times(1).returning(|_, _| Err(StoreError::Storage("disk full".into())));

        let outcome = Reconciler::new(Arc::new(local), Arc::new(remote)).reconcile(&UserId::new("u1")).await;

        assert!(outcome.local_written);
        assert!(matches!(outcome.remote, RemoteStatus::Failed { .. }));
        assert!(!outcome.is_consistent());
        assert!(outcome.events.iter().any(|e| matches!(e, CartEvent::WriteFailed { store: CartStoreKind::Remote, .. })));
    }

    #[tokio::test]
    async fn test_reconcile_reprices_and_drops_discontinued() {
        let mut local = local_returning(Cart::from_items([item("P1", 1, 1000), item("GONE", 1, 10)]));
        local.expect_write().withf(|cart| cart.item_count() == 1).returning(|_| true);
        let mut remote = remote_returning(RemoteRead::NotFound);
        remote.expect_write().returning(|_, _| Ok(Uuid::now_v7()));

        let mut catalog = MockProductCatalog::new();
        catalog.expect_lookup().returning(|id| match id.as_str() {
            "P1" => Ok(crate::domain::ports::ProductSnapshot {
                price: Decimal::new(1100, 0), sale_price: None, name: "Sac".into(), image: None, vendor_id: None,
            }),
            _ => Err(CatalogError::NotFound),
        });

        let outcome = Reconciler::new(Arc::new(local), Arc::new(remote))
            .with_catalog(Arc::new(catalog))
            .reconcile(&UserId::new("u1"))
            .await;

        assert_eq!(outcome.cart.item_count(), 1);
        assert_eq!(outcome.cart.items()[0].unit_price, Decimal::new(1100, 0));
        assert_eq!(outcome.warnings, vec![PriceWarning::Discontinued { item: LineKey::product("GONE") }]);
    }
}
