use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::JwtManager;
use crate::AppState;

/// User role enum
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserRole {
    User,
    Admin,
    SuperAdmin,
}

impl UserRole {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => UserRole::Admin,
            "superadmin" => UserRole::SuperAdmin,
            _ => UserRole::User,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperAdmin)
    }
}

#[derive(Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    // Check if auth is disabled (development mode)
    if state.config.is_auth_disabled() {
        // Identity comes from test headers when auth is disabled
        let user_id = request
            .headers()
            .get("X-Test-User")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or(Uuid::nil());

        let role = request
            .headers()
            .get("X-Test-Role")
            .and_then(|h| h.to_str().ok())
            .map(UserRole::from_str)
            .unwrap_or(UserRole::User);

        tracing::debug!("Auth disabled - using user: {}, role: {:?}", user_id, role);
        request.extensions_mut().insert(AuthUser { user_id, role });
        return Ok(next.run(request).await);
    }

    // Extract token from Authorization header
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => return Err(StatusCode::UNAUTHORIZED),
    };

    // Verify token
    let jwt_manager = JwtManager::new(&state.config.jwt_secret, state.config.jwt_expiry_seconds);
    let claims = jwt_manager
        .verify_token(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;

    // Fetch user role from database
    let role = fetch_user_role(&state.db.pool, user_id).await;

    // Insert auth user into request extensions
    request.extensions_mut().insert(AuthUser { user_id, role });

    Ok(next.run(request).await)
}

/// Admin middleware - requires admin or superadmin role
/// Must be used AFTER auth_middleware in the middleware chain
pub async fn admin_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    // Get AuthUser from extensions (set by auth_middleware)
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Check if user has admin role
    if !auth_user.role.is_admin() {
        tracing::warn!(
            "Admin access denied for user: {} (role: {:?})",
            auth_user.user_id,
            auth_user.role
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

/// Fetch user role from database
async fn fetch_user_role(pool: &sqlx::PgPool, user_id: Uuid) -> UserRole {
    let result: Option<(String,)> =
        sqlx::query_as(r#"SELECT role::text FROM users WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .ok()
            .flatten();

    match result {
        Some((role_str,)) => UserRole::from_str(&role_str),
        None => UserRole::User,
    }
}
