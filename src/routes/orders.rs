use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::{
    auth::Identity,
    dto::orders::{
        AddItemRequest, AddItemResponse, CreateOrderRequest, CreateOrderResponse, OrderList,
        OrderWithItems, TotalPriceQuery, TotalPriceResponse, UpdateOrderRequest,
    },
    error::AppResult,
    models::{Order, OrderItem},
    response::ApiResponse,
    routes::{extract::AppJson, params::OrderListQuery},
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/total-price", get(total_price))
        .route("/items/{item_id}", delete(remove_order_item))
        .route(
            "/{id}",
            get(get_order).patch(update_order).delete(delete_order),
        )
        .route("/{id}/items", post(add_order_item))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "List orders", body = ApiResponse<OrderList>)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _identity: Identity,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CreateOrderResponse>),
        (status = 400, description = "Invalid input or reference"),
        (status = 401, description = "Missing or invalid credentials")
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    identity: Identity,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreateOrderResponse>>)> {
    let resp = order_service::create_order(&state, &identity, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found")
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<Order>),
        (status = 400, description = "Empty patch or invalid status"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found")
    ),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<UpdateOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::update_order(&state, &identity, id, patch).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order and items deleted", body = ApiResponse<Order>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found")
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::delete_order(&state, &identity, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/items",
    params(("id" = i64, Path, description = "Order id")),
    request_body = AddItemRequest,
    responses(
        (status = 201, description = "Item added", body = ApiResponse<AddItemResponse>),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order not modifiable")
    ),
    tag = "Orders"
)]
pub async fn add_order_item(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<AddItemRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AddItemResponse>>)> {
    let resp = order_service::add_order_item(&state, &identity, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/orders/items/{item_id}",
    params(("item_id" = i64, Path, description = "Order item id")),
    responses(
        (status = 200, description = "Item removed", body = ApiResponse<OrderItem>),
        (status = 404, description = "Item not found")
    ),
    tag = "Orders"
)]
pub async fn remove_order_item(
    State(state): State<AppState>,
    identity: Identity,
    Path(item_id): Path<i64>,
) -> AppResult<Json<ApiResponse<OrderItem>>> {
    let resp = order_service::remove_order_item(&state, &identity, item_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/total-price",
    params(
        ("from" = Option<String>, Query, description = "Inclusive start date (YYYY-MM-DD)"),
        ("to" = Option<String>, Query, description = "Inclusive end date (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Sum of order totals in range", body = ApiResponse<TotalPriceResponse>),
        (status = 403, description = "Admin only")
    ),
    tag = "Orders"
)]
pub async fn total_price(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<TotalPriceQuery>,
) -> AppResult<Json<ApiResponse<TotalPriceResponse>>> {
    let resp = order_service::total_price(&state, &identity, query).await?;
    Ok(Json(resp))
}
