use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::{
    auth::Identity,
    dto::products::{
        AddImageRequest, CreateProductRequest, ImageList, ProductList, UpdateProductRequest,
    },
    error::AppResult,
    middleware::auth::MaybeIdentity,
    models::{Product, ProductImage},
    response::ApiResponse,
    routes::{extract::AppJson, params::ProductQuery},
    services::product_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/images/{image_id}", delete(remove_image))
        .route(
            "/{id}",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .route("/{id}/images", get(list_images).post(add_image))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search name and description")
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    MaybeIdentity(identity): MaybeIdentity,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state, identity.as_ref(), query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<Product>),
        (status = 403, description = "Admin only")
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    identity: Identity,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let resp = product_service::create_product(&state, &identity, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    patch,
    path = "/api/products/{id}",
    params(("id" = i64, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found")
    ),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_product(&state, &identity, id, patch).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted", body = ApiResponse<Product>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found")
    ),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::delete_product(&state, &identity, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/images",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Images for product", body = ApiResponse<ImageList>),
        (status = 404, description = "Product not found")
    ),
    tag = "Products"
)]
pub async fn list_images(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<ImageList>>> {
    let resp = product_service::list_images(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/images",
    params(("id" = i64, Path, description = "Product id")),
    request_body = AddImageRequest,
    responses(
        (status = 201, description = "Image metadata added", body = ApiResponse<ProductImage>),
        (status = 400, description = "Invalid product reference"),
        (status = 403, description = "Admin only")
    ),
    tag = "Products"
)]
pub async fn add_image(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<AddImageRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductImage>>)> {
    let resp = product_service::add_image(&state, &identity, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/products/images/{image_id}",
    params(("image_id" = i64, Path, description = "Image id")),
    responses(
        (status = 200, description = "Image removed", body = ApiResponse<ProductImage>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Image not found")
    ),
    tag = "Products"
)]
pub async fn remove_image(
    State(state): State<AppState>,
    identity: Identity,
    Path(image_id): Path<i64>,
) -> AppResult<Json<ApiResponse<ProductImage>>> {
    let resp = product_service::remove_image(&state, &identity, image_id).await?;
    Ok(Json(resp))
}
