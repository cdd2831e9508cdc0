//! Postgres-backed remote cart store, product catalog and promotion lookup.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, LineItem, PromotionCode};
use crate::domain::ports::{
    CatalogError, ProductCatalog, ProductSnapshot, PromotionError, PromotionService, RemoteCartStore, RemoteRead, StoreError,
};
use crate::domain::value_objects::{ProductId, Quantity, UserId, VariantAttributes};

const GET_CART_SQL: &str = "SELECT id, merge_version, updated_at FROM carts WHERE user_id = $1";

const GET_CART_ITEMS_SQL: &str = "SELECT ci.product_id, ci.variant, ci.quantity, \
    COALESCE(p.sale_price, p.price, ci.unit_price) AS unit_price, p.name, p.image, p.vendor_id \
    FROM cart_items ci LEFT JOIN products p ON p.id = ci.product_id AND p.status = 'active' \
    WHERE ci.cart_id = $1 ORDER BY ci.position";

const UPSERT_CART_SQL: &str = "INSERT INTO carts (id, user_id, merge_version, created_at, updated_at) \
    VALUES ($1, $2, $3, NOW(), NOW()) \
    ON CONFLICT (user_id) DO UPDATE SET merge_version = EXCLUDED.merge_version, updated_at = NOW() \
    RETURNING id";

const DELETE_CART_ITEMS_SQL: &str = "DELETE FROM cart_items WHERE cart_id = $1";

const INSERT_CART_ITEM_SQL: &str = "INSERT INTO cart_items (cart_id, position, product_id, variant, quantity, unit_price) \
    VALUES ($1, $2, $3, $4, $5, $6)";

const GET_PRODUCT_SQL: &str = "SELECT price, sale_price, name, image, vendor_id FROM products WHERE id = $1 AND status = 'active'";

const GET_PROMOTION_SQL: &str = "SELECT code, discount_amount, discount_percent FROM promotions \
    WHERE upper(code) = upper($1) AND active AND (expires_at IS NULL OR expires_at > NOW())";

#[derive(Debug, sqlx::FromRow)]
struct CartRow { id: Uuid, merge_version: Option<Uuid>, updated_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    product_id: String,
    variant: Json<BTreeMap<String, String>>,
    quantity: i32,
    unit_price: Decimal,
    name: Option<String>,
    image: Option<String>,
    vendor_id: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow { price: Decimal, sale_price: Option<Decimal>, name: String, image: Option<String>, vendor_id: Option<String> }

#[derive(Debug, sqlx::FromRow)]
struct PromotionRow { code: String, discount_amount: Option<Decimal>, discount_percent: Option<Decimal> }

impl TryFrom<CartItemRow> for LineItem {
    type Error = StoreError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .ok()
            .and_then(|q| Quantity::new(q).ok())
            .ok_or_else(|| StoreError::Corrupt(format!("quantity {} for product {}", row.quantity, row.product_id)))?;

        Ok(LineItem {
            product_id: ProductId::new(row.product_id),
            variant: VariantAttributes::new(row.variant.0),
            quantity,
            unit_price: row.unit_price.max(Decimal::ZERO),
            name: row.name,
            image: row.image,
            vendor_id: row.vendor_id,
        })
    }
}

impl TryFrom<PromotionRow> for PromotionCode {
    type Error = PromotionError;

    fn try_from(row: PromotionRow) -> Result<Self, Self::Error> {
        match (row.discount_amount, row.discount_percent) {
            (Some(amount), None) => Ok(PromotionCode::amount(row.code, amount)),
            (None, Some(percent)) => Ok(PromotionCode::percent(row.code, percent)),
            _ => Err(PromotionError::Invalid),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgRemoteCartStore { db: PgPool }

impl PgRemoteCartStore {
    pub fn new(db: PgPool) -> Self { Self { db } }

    async fn fetch(&self, user_id: &UserId) -> Result<Option<Cart>, StoreError> {
        let Some(cart) = sqlx::query_as::<_, CartRow>(GET_CART_SQL).bind(user_id.as_str()).fetch_optional(&self.db).await? else {
            return Ok(None);
        };
        let rows = sqlx::query_as::<_, CartItemRow>(GET_CART_ITEMS_SQL).bind(cart.id).fetch_all(&self.db).await?;
        let items = rows.into_iter().map(LineItem::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Cart::from_parts(items, cart.updated_at, cart.merge_version)))
    }
}

#[async_trait]
impl RemoteCartStore for PgRemoteCartStore {
    async fn read(&self, user_id: &UserId) -> RemoteRead {
        match self.fetch(user_id).await {
            Ok(Some(cart)) => RemoteRead::Found(cart),
            Ok(None) => RemoteRead::NotFound,
            Err(e) => {
                warn!(%user_id, error = %e, "failed to fetch remote cart");
                RemoteRead::FetchError(e.to_string())
            }
        }
    }

    async fn write(&self, user_id: &UserId, cart: &Cart) -> Result<Uuid, StoreError> {
        let mut tx = self.db.begin().await?;

        let (cart_id,): (Uuid,) = sqlx::query_as(UPSERT_CART_SQL)
            .bind(Uuid::now_v7())
            .bind(user_id.as_str())
            .bind(cart.merge_version())
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(DELETE_CART_ITEMS_SQL).bind(cart_id).execute(&mut *tx).await?;

        for (position, item) in cart.items().iter().enumerate() {
            let variant: BTreeMap<&str, &str> = item.variant.iter().collect();
            let quantity = i32::try_from(item.quantity.value()).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            let position = i32::try_from(position).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            sqlx::query(INSERT_CART_ITEM_SQL)
                .bind(cart_id)
                .bind(position)
                .bind(item.product_id.as_str())
                .bind(Json(variant))
                .bind(quantity)
                .bind(item.unit_price)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(%user_id, %cart_id, items = cart.item_count(), "remote cart replaced");
        Ok(cart_id)
    }
}

#[derive(Debug, Clone)]
pub struct PgProductCatalog { db: PgPool }

impl PgProductCatalog {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn lookup(&self, product_id: &ProductId) -> Result<ProductSnapshot, CatalogError> {
        let row = sqlx::query_as::<_, ProductRow>(GET_PRODUCT_SQL)
            .bind(product_id.as_str())
            .fetch_optional(&self.db)
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?
            .ok_or(CatalogError::NotFound)?;
        Ok(ProductSnapshot { price: row.price, sale_price: row.sale_price, name: row.name, image: row.image, vendor_id: row.vendor_id })
    }
}

#[derive(Debug, Clone)]
pub struct PgPromotionService { db: PgPool }

impl PgPromotionService {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl PromotionService for PgPromotionService {
    async fn validate(&self, code: &str) -> Result<PromotionCode, PromotionError> {
        sqlx::query_as::<_, PromotionRow>(GET_PROMOTION_SQL)
            .bind(code)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| PromotionError::Unavailable(e.to_string()))?
            .ok_or(PromotionError::Invalid)
            .and_then(PromotionCode::try_from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(quantity: i32) -> CartItemRow {
        CartItemRow {
            product_id: "P1".into(),
            variant: Json(BTreeMap::from([("Size".to_string(), "M".to_string())])),
            quantity,
            unit_price: Decimal::new(2500, 0),
            name: Some("Boubou".into()),
            image: None,
            vendor_id: Some("V7".into()),
        }
    }

    #[test]
    fn test_item_row_maps_to_line_item() {
        let item = LineItem::try_from(row(2)).unwrap();
        assert_eq!(item.quantity.value(), 2);
        assert_eq!(item.variant.get("size"), Some("M"));
        assert_eq!(item.vendor_id.as_deref(), Some("V7"));
    }

    #[test]
    fn test_item_row_rejects_non_positive_quantity() {
        assert!(matches!(LineItem::try_from(row(0)), Err(StoreError::Corrupt(_))));
        assert!(matches!(LineItem::try_from(row(-3)), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_promotion_row_requires_exactly_one_discount() {
        let amount = PromotionRow { code: "A".into(), discount_amount: Some(Decimal::new(500, 0)), discount_percent: None };
        assert_eq!(PromotionCode::try_from(amount), Ok(PromotionCode::amount("A", Decimal::new(500, 0))));
        let both = PromotionRow { code: "B".into(), discount_amount: Some(Decimal::ONE), discount_percent: Some(Decimal::ONE) };
        assert_eq!(PromotionCode::try_from(both), Err(PromotionError::Invalid));
    }
}
