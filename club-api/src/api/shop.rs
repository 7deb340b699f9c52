//! Shop products

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::{optional_text, parse_id, require_non_negative, ApiJson};
use crate::auth::AdminUser;
use crate::db::{self, products::Product};
use crate::error::{require_text, ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<i64>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

/// GET /api/products
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(db::products::list_products(&state.db, true).await?))
}

/// GET /api/products/:id
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    let id = parse_id(&id)?;
    let product = db::products::find_product(&state.db, &id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("Product"))?;

    Ok(Json(product))
}

/// GET /api/admin/products
pub async fn admin_list_products(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(db::products::list_products(&state.db, false).await?))
}

/// POST /api/admin/products
pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let now = Utc::now();
    let product = Product {
        guid: club_common::ids::generate(),
        name: require_text(input.name.as_deref(), "name")?,
        description: optional_text(input.description),
        price_cents: require_non_negative(input.price_cents.unwrap_or(0), "price_cents")?,
        stock: require_non_negative(input.stock.unwrap_or(0), "stock")?,
        image_url: optional_text(input.image_url),
        is_active: input.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };

    db::products::insert_product(&state.db, &product).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/admin/products/:id
pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<Json<Product>> {
    let id = parse_id(&id)?;
    let mut product = db::products::find_product(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product"))?;

    if input.name.is_some() {
        product.name = require_text(input.name.as_deref(), "name")?;
    }
    if input.description.is_some() {
        product.description = optional_text(input.description);
    }
    if let Some(price) = input.price_cents {
        product.price_cents = require_non_negative(price, "price_cents")?;
    }
    if let Some(stock) = input.stock {
        product.stock = require_non_negative(stock, "stock")?;
    }
    if input.image_url.is_some() {
        product.image_url = optional_text(input.image_url);
    }
    if let Some(active) = input.is_active {
        product.is_active = active;
    }
    product.updated_at = Utc::now();

    db::products::update_product(&state.db, &product).await?;
    Ok(Json(product))
}

/// DELETE /api/admin/products/:id
pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    if db::products::delete_product(&state.db, &id).await? == 0 {
        return Err(ApiError::not_found("Product"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/:id", get(get_product))
        .route("/api/admin/products", get(admin_list_products).post(create_product))
        .route(
            "/api/admin/products/:id",
            axum::routing::put(update_product).delete(delete_product),
        )
}
