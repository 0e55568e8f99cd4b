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
    dto::users::{CreateUserRequest, UpdateUserRequest, UserList},
    entity::users::{ActiveModel, Column, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::ensure_admin,
    models::User,
    response::{ApiResponse, Meta},
    routes::params::UserListQuery,
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    identity: &Identity,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(identity)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Username).ilike(pattern.clone()))
                .add(Expr::col(Column::Email).ilike(pattern)),
        );
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::paginated(page, limit, total)),
    ))
}

pub async fn get_user(state: &AppState, identity: &Identity, id: i64) -> AppResult<ApiResponse<User>> {
    ensure_admin(identity)?;
    let user = Users::find_by_id(id).one(&state.orm).await?;
    match user {
        Some(u) => Ok(ApiResponse::success("User", user_from_entity(u), None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn create_user(
    state: &AppState,
    identity: &Identity,
    payload: CreateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(identity)?;
    if payload.username.trim().is_empty() {
        return Err(AppError::Validation("username must not be empty".into()));
    }
    if !payload.email.contains('@') {
        return Err(AppError::Validation(format!(
            "email is not valid: \"{}\"",
            payload.email
        )));
    }

    // Duplicate usernames/emails surface as Conflict via the unique indexes.
    let user = ActiveModel {
        id: NotSet,
        username: Set(payload.username),
        email: Set(payload.email),
        location: Set(payload.location),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "User created",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

pub async fn update_user(
    state: &AppState,
    identity: &Identity,
    id: i64,
    patch: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(identity)?;
    if patch.is_empty() {
        return Err(AppError::Validation("nothing to update".into()));
    }

    let existing = Users::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(username) = patch.username {
        active.username = Set(username);
    }
    if let Some(email) = patch.email {
        active.email = Set(email);
    }
    if let Some(location) = patch.location {
        active.location = Set(Some(location));
    }
    let user = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "User updated",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

pub async fn delete_user(
    state: &AppState,
    identity: &Identity,
    id: i64,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(identity)?;
    let existing = Users::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    // Orders keep a plain FK to users, so deleting a user with orders
    // surfaces as an invalid-reference error rather than cascading.
    Users::delete_by_id(existing.id).exec(&state.orm).await?;

    Ok(ApiResponse::success(
        "User deleted",
        user_from_entity(existing),
        Some(Meta::empty()),
    ))
}

fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        username: model.username,
        email: model.email,
        location: model.location,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
