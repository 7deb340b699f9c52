//! Order history

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::parse_id;
use crate::auth::{ensure_owner_or_admin, AdminUser, CurrentUser};
use crate::db::{self, orders::OrderWithItems};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, Page, ORDERS_PAGE_SIZE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminOrdersQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
}

const STATUSES: [&str; 4] = ["pending", "paid", "cancelled", "refunded"];

/// GET /api/orders
pub async fn my_orders(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<OrderWithItems>>> {
    let orders = db::orders::list_orders_for_user(&state.db, &current.user.guid).await?;
    Ok(Json(db::orders::attach_items(&state.db, orders).await?))
}

/// GET /api/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderWithItems>> {
    let id = parse_id(&id)?;
    let order = db::orders::find_order(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order"))?;
    ensure_owner_or_admin(&current.user, order.user_id.as_deref())?;

    let items = db::orders::items_for_order(&state.db, &id).await?;
    Ok(Json(OrderWithItems { order, items }))
}

/// GET /api/admin/orders?status=&page=
pub async fn admin_list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminOrdersQuery>,
) -> ApiResult<Json<Page<OrderWithItems>>> {
    let status = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(status) = status {
        if !STATUSES.contains(&status) {
            return Err(ApiError::bad_request(format!("Unknown order status: {}", status)));
        }
    }

    let total = db::orders::count_orders(&state.db, status).await?;
    let pagination = calculate_pagination(total, ORDERS_PAGE_SIZE, query.page.unwrap_or(1));
    let orders = db::orders::list_orders(&state.db, status, pagination.page_size, pagination.offset).await?;
    let orders = db::orders::attach_items(&state.db, orders).await?;

    Ok(Json(Page::new(orders, pagination, total)))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(my_orders))
        .route("/api/orders/:id", get(get_order))
        .route("/api/admin/orders", get(admin_list_orders))
}
