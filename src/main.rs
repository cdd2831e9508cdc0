//! Marketplace cart engine - HTTP surface for the storefront

use anyhow::Result;
use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post}, Json, Router};
use marketplace_cart::{
    config::{self, AppConfig},
    domain::{
        aggregates::{Cart, LineItem},
        ports::{ProductCatalog, RemoteCartStore, RemoteRead},
        services::{PricingCalculator, Quote, QuoteService, Reconciler, Reconciliation},
        value_objects::{LineKey, ProductId, Quantity, UserId, VariantAttributes},
    },
    infrastructure::{EventPublisher, PgProductCatalog, PgPromotionService, PgRemoteCartStore, SubmittedCart},
    MarketplaceError,
};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use std::{collections::BTreeMap, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

#[derive(Clone)]
pub struct AppState {
    remote: Arc<PgRemoteCartStore>,
    catalog: Arc<PgProductCatalog>,
    quotes: QuoteService,
    events: EventPublisher,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config: AppConfig = config::load_app_config()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new().max_connections(config.db_max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, cart events will only be logged"); None }
        },
        None => None,
    };

    let catalog = Arc::new(PgProductCatalog::new(db.clone()));
    let state = AppState {
        remote: Arc::new(PgRemoteCartStore::new(db.clone())),
        catalog: catalog.clone(),
        quotes: QuoteService::new(
            PricingCalculator::new(config.currency.clone(), config.shipping_rates.clone()),
            catalog,
            Arc::new(PgPromotionService::new(db)),
        ),
        events: EventPublisher::new(nats),
    };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "marketplace-cart"})) }))
        .route("/api/v1/carts/:user_id", get(get_cart).put(put_cart).delete(clear_cart))
        .route("/api/v1/carts/:user_id/merge", post(merge_cart))
        .route("/api/v1/carts/:user_id/items", post(add_item).patch(update_item).delete(remove_item))
        .route("/api/v1/quotes", post(quote))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state);

    tracing::info!(port = config.port, currency = %config.currency, "marketplace cart engine listening");
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}

type ApiError = (StatusCode, String);

fn reject(e: MarketplaceError) -> ApiError {
    let status = match &e {
        MarketplaceError::CartNotFound | MarketplaceError::ItemNotFound => StatusCode::NOT_FOUND,
        MarketplaceError::InvalidQuantity | MarketplaceError::UnknownShippingMethod(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MarketplaceError::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
        MarketplaceError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

fn invalid(e: validator::ValidationErrors) -> ApiError { (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()) }

/// Remote cart for a signed-in mutation. A user without a cart starts empty;
/// a failed fetch aborts rather than overwriting what could not be read.
async fn load_for_update(s: &AppState, user_id: &UserId) -> Result<Cart, ApiError> {
    match s.remote.read(user_id).await {
        RemoteRead::Found(cart) => Ok(cart),
        RemoteRead::NotFound => Ok(Cart::empty()),
        RemoteRead::FetchError(reason) => Err(reject(MarketplaceError::StorageError(reason))),
    }
}

async fn save(s: &AppState, user_id: &UserId, cart: Cart) -> Result<Json<Cart>, ApiError> {
    s.remote.write(user_id, &cart).await.map_err(|e| reject(e.into()))?;
    Ok(Json(cart))
}

async fn get_cart(State(s): State<AppState>, Path(user_id): Path<String>) -> Result<Json<Cart>, ApiError> {
    match s.remote.read(&UserId::new(user_id)).await {
        RemoteRead::Found(cart) => Ok(Json(cart)),
        RemoteRead::NotFound => Err(reject(MarketplaceError::CartNotFound)),
        RemoteRead::FetchError(reason) => Err(reject(MarketplaceError::StorageError(reason))),
    }
}

async fn put_cart(State(s): State<AppState>, Path(user_id): Path<String>, Json(cart): Json<Cart>) -> Result<Json<Cart>, ApiError> {
    let cart = Cart::from_items(cart.into_items());
    save(&s, &UserId::new(user_id), cart).await
}

async fn clear_cart(State(s): State<AppState>, Path(user_id): Path<String>) -> Result<StatusCode, ApiError> {
    save(&s, &UserId::new(user_id), Cart::empty()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)] pub struct MergeResponse { #[serde(flatten)] pub reconciliation: Reconciliation, pub local_cart: Option<Cart> }

async fn merge_cart(State(s): State<AppState>, Path(user_id): Path<String>, Json(local): Json<Cart>) -> Json<MergeResponse> {
    let user_id = UserId::new(user_id);
    let local = Arc::new(SubmittedCart::new(local));
    let reconciler = Reconciler::new(local.clone(), s.remote.clone()).with_catalog(s.catalog.clone());
    let reconciliation = reconciler.reconcile(&user_id).await;
    s.events.publish(&reconciliation.events).await;
    Json(MergeResponse { reconciliation, local_cart: local.take_written().await })
}

#[derive(Debug, Deserialize, Validate)]
pub struct ItemRequest {
    #[validate(length(min = 1, max = 128))] pub product_id: String,
    #[serde(default)] pub variant: BTreeMap<String, String>,
    #[validate(range(min = 1, max = 10000))] pub quantity: Option<u32>,
}

impl ItemRequest {
    fn key(&self) -> LineKey { LineKey::new(ProductId::new(self.product_id.clone()), VariantAttributes::new(&self.variant)) }
    fn quantity(&self) -> Result<Quantity, ApiError> { Quantity::new(self.quantity.unwrap_or(1)).map_err(|e| reject(e.into())) }
}

async fn add_item(State(s): State<AppState>, Path(user_id): Path<String>, Json(r): Json<ItemRequest>) -> Result<(StatusCode, Json<Cart>), ApiError> {
    r.validate().map_err(invalid)?;
    let user_id = UserId::new(user_id);
    let key = r.key();
    let snapshot = s.catalog.lookup(&key.product_id).await.map_err(|e| match e {
        marketplace_cart::domain::ports::CatalogError::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
        marketplace_cart::domain::ports::CatalogError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    })?;
    let mut cart = load_for_update(&s, &user_id).await?;
    let mut item = LineItem::new(key.product_id.as_str(), r.quantity()?, snapshot.effective_price()).with_variant(key.variant);
    item.name = Some(snapshot.name);
    item.image = snapshot.image;
    item.vendor_id = snapshot.vendor_id;
    cart.add_item(item);
    Ok((StatusCode::CREATED, save(&s, &user_id, cart).await?))
}

async fn update_item(State(s): State<AppState>, Path(user_id): Path<String>, Json(r): Json<ItemRequest>) -> Result<Json<Cart>, ApiError> {
    r.validate().map_err(invalid)?;
    let user_id = UserId::new(user_id);
    let quantity = r.quantity.ok_or_else(|| reject(MarketplaceError::InvalidQuantity)).and_then(|q| Quantity::new(q).map_err(|e| reject(e.into())))?;
    let mut cart = load_for_update(&s, &user_id).await?;
    cart.update_quantity(&r.key(), quantity).map_err(|e| reject(e.into()))?;
    save(&s, &user_id, cart).await
}

async fn remove_item(State(s): State<AppState>, Path(user_id): Path<String>, Json(r): Json<ItemRequest>) -> Result<Json<Cart>, ApiError> {
    r.validate().map_err(invalid)?;
    let user_id = UserId::new(user_id);
    let mut cart = load_for_update(&s, &user_id).await?;
    cart.remove_item(&r.key()).map_err(|e| reject(e.into()))?;
    save(&s, &user_id, cart).await
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuoteRequest {
    #[validate(length(max = 500))] pub items: Vec<LineItem>,
    #[validate(length(min = 1, max = 64))] pub shipping_method: Option<String>,
    #[validate(length(max = 64))] pub promotion_code: Option<String>,
}

async fn quote(State(s): State<AppState>, Json(r): Json<QuoteRequest>) -> Result<Json<Quote>, ApiError> {
    r.validate().map_err(invalid)?;
    let cart = Cart::from_items(r.items);
    let quote = s.quotes.quote(cart, r.shipping_method.as_deref(), r.promotion_code.as_deref()).await.map_err(|e| reject(e.into()))?;
    Ok(Json(quote))
}
