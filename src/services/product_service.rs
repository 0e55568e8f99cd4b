use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::{
    auth::Identity,
    dto::products::{
        AddImageRequest, CreateProductRequest, ImageList, ProductList, UpdateProductRequest,
    },
    entity::{
        product_images::{
            ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages,
            Model as ImageModel,
        },
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::ensure_admin,
    models::{Product, ProductImage},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
};

/// Anonymous callers browse the in-stock catalog; admins also see
/// out-of-stock entries.
pub async fn list_products(
    state: &AppState,
    identity: Option<&Identity>,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    let is_admin = identity.map(|i| i.is_admin).unwrap_or(false);
    if !is_admin {
        condition = condition.add(Column::Stock.gt(0));
    }

    let finder = Products::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::paginated(page, limit, total)),
    ))
}

pub async fn get_product(state: &AppState, id: i64) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id).one(&state.orm).await?;
    match product {
        Some(p) => Ok(ApiResponse::success("Product", product_from_entity(p), None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn create_product(
    state: &AppState,
    identity: &Identity,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(identity)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }

    let product = ActiveModel {
        id: NotSet,
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(payload.stock),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    identity: &Identity,
    id: i64,
    patch: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(identity)?;
    if patch.is_empty() {
        return Err(AppError::Validation("nothing to update".into()));
    }

    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(name) = patch.name {
        active.name = Set(name);
    }
    if let Some(description) = patch.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = patch.price {
        active.price = Set(price);
    }
    if let Some(stock) = patch.stock {
        active.stock = Set(stock);
    }
    let product = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Product updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    identity: &Identity,
    id: i64,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(identity)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    // Images cascade at the storage layer; order items keep their snapshot
    // and block the delete through the FK instead.
    Products::delete_by_id(existing.id).exec(&state.orm).await?;

    Ok(ApiResponse::success(
        "Product deleted",
        product_from_entity(existing),
        Some(Meta::empty()),
    ))
}

pub async fn list_images(state: &AppState, product_id: i64) -> AppResult<ApiResponse<ImageList>> {
    let product = Products::find_by_id(product_id).one(&state.orm).await?;
    if product.is_none() {
        return Err(AppError::NotFound);
    }

    let items = ProductImages::find()
        .filter(ImageCol::ProductId.eq(product_id))
        .order_by_asc(ImageCol::Position)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(image_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Images",
        ImageList { items },
        Some(Meta::empty()),
    ))
}

pub async fn add_image(
    state: &AppState,
    identity: &Identity,
    product_id: i64,
    payload: AddImageRequest,
) -> AppResult<ApiResponse<ProductImage>> {
    ensure_admin(identity)?;
    if payload.url.trim().is_empty() {
        return Err(AppError::Validation("url must not be empty".into()));
    }

    // A missing product surfaces as an invalid reference through the FK.
    let image = ImageActive {
        id: NotSet,
        product_id: Set(product_id),
        url: Set(payload.url),
        alt_text: Set(payload.alt_text),
        position: Set(payload.position.unwrap_or(0)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Image added",
        image_from_entity(image),
        Some(Meta::empty()),
    ))
}

pub async fn remove_image(
    state: &AppState,
    identity: &Identity,
    image_id: i64,
) -> AppResult<ApiResponse<ProductImage>> {
    ensure_admin(identity)?;
    let existing = ProductImages::find_by_id(image_id).one(&state.orm).await?;
    let existing = match existing {
        Some(i) => i,
        None => return Err(AppError::NotFound),
    };

    ProductImages::delete_by_id(existing.id).exec(&state.orm).await?;

    Ok(ApiResponse::success(
        "Image removed",
        image_from_entity(existing),
        Some(Meta::empty()),
    ))
}

fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn image_from_entity(model: ImageModel) -> ProductImage {
    ProductImage {
        id: model.id,
        product_id: model.product_id,
        url: model.url,
        alt_text: model.alt_text,
        position: model.position,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
