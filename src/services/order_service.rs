use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::{
    audit::log_audit,
    auth::Identity,
    dto::orders::{
        AddItemRequest, AddItemResponse, CreateOrderRequest, CreateOrderResponse, OrderList,
        OrderWithItems, TotalPriceQuery, TotalPriceResponse, UpdateOrderRequest,
    },
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::ensure_admin,
    models::{Order, OrderItem, is_editable_status, is_valid_status},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

const MAX_QUANTITY: i32 = 10_000;

fn max_unit_price() -> Decimal {
    Decimal::from(1_000_000)
}

fn validate_item(quantity: i32, unit_price: Decimal) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::Validation(format!(
            "quantity must be a positive integer, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(AppError::Validation(format!(
            "quantity must be at most {MAX_QUANTITY}, got {quantity}"
        )));
    }
    if unit_price < Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "unit_price must be non-negative, got {unit_price}"
        )));
    }
    if unit_price > max_unit_price() {
        return Err(AppError::Validation(format!(
            "unit_price must be at most {}, got {unit_price}",
            max_unit_price()
        )));
    }
    Ok(())
}

/// Use the caller-provided snapshot when present, otherwise copy the current
/// catalog name. A missing product is an invalid reference, not a 404.
async fn resolve_product_name<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    snapshot: Option<String>,
) -> AppResult<String> {
    if let Some(name) = snapshot {
        return Ok(name);
    }
    let product = Products::find_by_id(product_id).one(conn).await?;
    match product {
        Some(p) => Ok(p.name),
        None => Err(AppError::InvalidReference(format!(
            "product {product_id} does not exist"
        ))),
    }
}

/// Create the order row and all item rows in one transaction; either the
/// whole order becomes visible or none of it does. Without an explicit
/// override the stored total is the accumulated item sum.
pub async fn create_order(
    state: &AppState,
    identity: &Identity,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CreateOrderResponse>> {
    let status = payload.status.unwrap_or_else(|| "pending".to_string());
    if !is_valid_status(&status) {
        return Err(AppError::Validation(format!(
            "invalid order status \"{status}\""
        )));
    }
    for item in &payload.items {
        validate_item(item.quantity, item.unit_price)?;
    }
    if let Some(total) = payload.total_price {
        if total < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "total_price must be non-negative, got {total}"
            )));
        }
    }

    let txn = state.orm.begin().await?;

    let order = OrderActive {
        id: NotSet,
        user_id: Set(payload.user_id),
        user_name: Set(payload.user_name),
        user_location: Set(payload.user_location),
        order_status: Set(status),
        total_price: Set(payload.total_price.unwrap_or(Decimal::ZERO)),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut running_total = Decimal::ZERO;
    for item in payload.items {
        let product_name = resolve_product_name(&txn, item.product_id, item.product_name).await?;
        let line_total = item.unit_price * Decimal::from(item.quantity);
        running_total += line_total;

        OrderItemActive {
            id: NotSet,
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            product_name: Set(product_name),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            total_price: Set(line_total),
        }
        .insert(&txn)
        .await?;
    }

    let total_price = match payload.total_price {
        Some(explicit) => explicit,
        None => {
            let mut active: OrderActive = order.clone().into();
            active.total_price = Set(running_total);
            active.update(&txn).await?;
            running_total
        }
    };

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(&identity.subject),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_price": total_price })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        CreateOrderResponse {
            order_id: order.id,
            total_price,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(state: &AppState, id: i64) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::OrderStatus.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::paginated(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Apply a sparse patch. The total is never recomputed from items here;
/// a caller writing `total_price` overrides the invariant knowingly.
pub async fn update_order(
    state: &AppState,
    identity: &Identity,
    id: i64,
    patch: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(identity)?;
    if patch.is_empty() {
        return Err(AppError::Validation("nothing to update".into()));
    }
    if let Some(status) = patch.order_status.as_deref() {
        if !is_valid_status(status) {
            return Err(AppError::Validation(format!(
                "invalid order status \"{status}\""
            )));
        }
    }
    if let Some(total) = patch.total_price {
        if total < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "total_price must be non-negative, got {total}"
            )));
        }
    }

    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let mut active: OrderActive = existing.into();
    if let Some(user_id) = patch.user_id {
        active.user_id = Set(user_id);
    }
    if let Some(user_name) = patch.user_name {
        active.user_name = Set(user_name);
    }
    if let Some(user_location) = patch.user_location {
        active.user_location = Set(Some(user_location));
    }
    if let Some(status) = patch.order_status {
        active.order_status = Set(status);
    }
    if let Some(total) = patch.total_price {
        active.total_price = Set(total);
    }
    let order = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Items and order go in one transaction so a failure in either delete
/// leaves the order fully intact.
pub async fn delete_order(
    state: &AppState,
    identity: &Identity,
    id: i64,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(identity)?;
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .exec(&txn)
        .await?;
    Orders::delete_by_id(order.id).exec(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(&identity.subject),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order deleted",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Insert the item and bump the parent total by the line total in one
/// transaction. The increment is a delta applied in SQL, not a
/// read-modify-write, so concurrent additions each apply their own delta.
pub async fn add_order_item(
    state: &AppState,
    identity: &Identity,
    order_id: i64,
    payload: AddItemRequest,
) -> AppResult<ApiResponse<AddItemResponse>> {
    validate_item(payload.quantity, payload.unit_price)?;

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };
    if !is_editable_status(&order.order_status) {
        return Err(AppError::NotModifiable(format!(
            "order {} has status \"{}\"",
            order.id, order.order_status
        )));
    }

    let product_name = resolve_product_name(&txn, payload.product_id, payload.product_name).await?;
    let line_total = payload.unit_price * Decimal::from(payload.quantity);

    let item = OrderItemActive {
        id: NotSet,
        order_id: Set(order.id),
        product_id: Set(payload.product_id),
        product_name: Set(product_name),
        quantity: Set(payload.quantity),
        unit_price: Set(payload.unit_price),
        total_price: Set(line_total),
    }
    .insert(&txn)
    .await?;

    Orders::update_many()
        .col_expr(
            OrderCol::TotalPrice,
            Expr::col(OrderCol::TotalPrice).add(line_total),
        )
        .filter(OrderCol::Id.eq(order.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(&identity.subject),
        "order_item_add",
        Some("order_items"),
        Some(serde_json::json!({ "order_id": order.id, "item_id": item.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Item added",
        AddItemResponse {
            item_total: line_total,
        },
        Some(Meta::empty()),
    ))
}

/// Symmetric with `add_order_item`: delete the item and decrement the parent
/// total by the removed line total, in one transaction, without re-summing.
pub async fn remove_order_item(
    state: &AppState,
    identity: &Identity,
    item_id: i64,
) -> AppResult<ApiResponse<OrderItem>> {
    let txn = state.orm.begin().await?;

    let item = OrderItems::find_by_id(item_id).one(&txn).await?;
    let item = match item {
        Some(i) => i,
        None => return Err(AppError::NotFound),
    };

    // The row can vanish between the read and the delete under concurrent
    // removals; only apply the decrement when this transaction removed it.
    let deleted = OrderItems::delete_by_id(item.id).exec(&txn).await?;
    if deleted.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Orders::update_many()
        .col_expr(
            OrderCol::TotalPrice,
            Expr::col(OrderCol::TotalPrice).sub(item.total_price),
        )
        .filter(OrderCol::Id.eq(item.order_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(&identity.subject),
        "order_item_remove",
        Some("order_items"),
        Some(serde_json::json!({ "order_id": item.order_id, "item_id": item.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Item removed",
        order_item_from_entity(item),
        Some(Meta::empty()),
    ))
}

/// Read-only aggregate over order totals; an empty range is 0, not an error.
pub async fn total_price(
    state: &AppState,
    identity: &Identity,
    query: TotalPriceQuery,
) -> AppResult<ApiResponse<TotalPriceResponse>> {
    ensure_admin(identity)?;

    let from: DateTime<Utc> = match query.from {
        Some(d) => d.and_time(NaiveTime::MIN).and_utc(),
        None => DateTime::UNIX_EPOCH,
    };
    // Inclusive upper bound: compare against the start of the following day.
    let to: DateTime<Utc> = match query.to {
        Some(d) => d
            .succ_opt()
            .ok_or_else(|| AppError::Validation("to date out of range".into()))?
            .and_time(NaiveTime::MIN)
            .and_utc(),
        None => Utc::now(),
    };

    let total: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total_price), 0) FROM orders WHERE created_at >= $1 AND created_at < $2",
    )
    .bind(from)
    .bind(to)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Total price",
        TotalPriceResponse { total_price: total },
        Some(Meta::empty()),
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        user_name: model.user_name,
        user_location: model.user_location,
        order_status: model.order_status,
        total_price: model.total_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        quantity: model.quantity,
        unit_price: model.unit_price,
        total_price: model.total_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_bounds_are_enforced() {
        assert!(validate_item(1, Decimal::ZERO).is_ok());
        assert!(validate_item(10_000, Decimal::ONE).is_ok());
        assert!(validate_item(0, Decimal::ONE).is_err());
        assert!(validate_item(-3, Decimal::ONE).is_err());
        assert!(validate_item(10_001, Decimal::ONE).is_err());
    }

    #[test]
    fn unit_price_bounds_are_enforced() {
        assert!(validate_item(1, Decimal::new(1599, 2)).is_ok());
        assert!(validate_item(1, Decimal::from(1_000_000)).is_ok());
        assert!(validate_item(1, Decimal::NEGATIVE_ONE).is_err());
        assert!(validate_item(1, Decimal::from(1_000_001)).is_err());
    }
}
