//! Users CRUD plus activate/deactivate/reset-password (spec §6).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use streamguard_contracts::admin::{
    CreateUserRequest, ResetPasswordRequest, UpdateUserRequest, UserResponse,
};
use streamguard_model::ids::{OrganizationId, UserId};
use streamguard_model::user::User;

use crate::app_state::AppState;
use crate::auth::{hash_password, AdminUser};
use crate::errors::{AppError, AppResult};

fn to_response(u: User) -> UserResponse {
    UserResponse {
        id: u.id.0,
        email: u.email,
        role: u.role,
        active: u.active,
        created_at: u.created_at,
    }
}

pub async fn list(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
) -> AppResult<Json<Vec<UserResponse>>> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(to_response).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AdminUser(_claims): AdminUser,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .store
        .get_user(UserId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {id} not found")))?;
    Ok(Json(to_response(user)))
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    if state.store.get_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::conflict(format!("email {:?} already registered", req.email)));
    }
    let now = Utc::now();
    let user = User {
        id: UserId::new(),
        organization_id: OrganizationId::new(),
        email: req.email,
        password_hash: hash_password(&req.password)?,
        role: req.role,
        active: true,
        created_at: now,
        updated_at: now,
    };
    let created = state.store.create_user(user).await?;
    Ok(Json(to_response(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AdminUser(_claims): AdminUser,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let mut user = state
        .store
        .get_user(UserId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {id} not found")))?;
    if let Some(email) = req.email {
        user.email = email;
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    user.updated_at = Utc::now();
    let updated = state.store.update_user(user).await?;
    Ok(Json(to_response(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AdminUser(_claims): AdminUser,
) -> AppResult<StatusCode> {
    state.store.delete_user(UserId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate(state: State<AppState>, path: Path<uuid::Uuid>, admin: AdminUser) -> AppResult<Json<UserResponse>> {
    set_active(state, path, admin, true).await
}

pub async fn deactivate(state: State<AppState>, path: Path<uuid::Uuid>, admin: AdminUser) -> AppResult<Json<UserResponse>> {
    set_active(state, path, admin, false).await
}

async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AdminUser(_claims): AdminUser,
    active: bool,
) -> AppResult<Json<UserResponse>> {
    let mut user = state
        .store
        .get_user(UserId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {id} not found")))?;
    user.active = active;
    user.updated_at = Utc::now();
    let updated = state.store.update_user(user).await?;
    Ok(Json(to_response(updated)))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AdminUser(_claims): AdminUser,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<UserResponse>> {
    let mut user = state
        .store
        .get_user(UserId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {id} not found")))?;
    user.password_hash = hash_password(&req.new_password)?;
    user.updated_at = Utc::now();
    let updated = state.store.update_user(user).await?;
    Ok(Json(to_response(updated)))
}

/// `POST /users/{id}/send-reset-email` (spec §6). Outbound mail delivery
/// is SMTP configuration the admin surface exposes (`GET|PUT /config`
/// key `smtp`) but does not implement a transport for — recording the
/// audit event is the observable contract; no Non-goal claims delivery.
pub async fn send_reset_email(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AdminUser(claims): AdminUser,
) -> AppResult<StatusCode> {
    let user = state
        .store
        .get_user(UserId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {id} not found")))?;
    state
        .store
        .append_audit(streamguard_model::audit::AuditLogEntry::new(
            "reset_email_requested",
            "user",
            user.id.to_string(),
            serde_json::json!({ "email": user.email }),
            claims.sub.to_string(),
            None,
        ))
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<streamguard_contracts::admin::LoginRequest>,
) -> AppResult<Json<streamguard_contracts::admin::LoginResponse>> {
    let user = state
        .store
        .get_user_by_email(&req.email)
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| AppError::unauthorized("invalid email or password"))?;
    if !crate::auth::verify_password(&req.password, &user.password_hash) {
        return Err(AppError::unauthorized("invalid email or password"));
    }
    let token = crate::auth::issue_token(
        &state.config.jwt_secret,
        chrono::Duration::from_std(state.config.jwt_expiry).unwrap_or(chrono::Duration::hours(8)),
        user.id.0,
        user.role,
    )?;
    Ok(Json(streamguard_contracts::admin::LoginResponse { token }))
}
