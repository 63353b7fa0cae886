use crate::auth::{Permission, User, TOKEN_COOKIE};
use crate::core::errors::{Error, Result};
use crate::server::guard::host_of;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
    remember: Option<bool>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    username: String,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    username: String,
    password: String,
    permissions: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    password: Option<String>,
    permissions: Option<Vec<String>>,
}

/// Public view of an account; the password hash never leaves the server.
#[derive(Serialize)]
pub struct UserResponse {
    id: i64,
    username: String,
    permissions: Vec<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            permissions: Permission::names(user.permissions),
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let user = User::get_by_username(&state.db, &request.username)
        .await?
        .ok_or_else(|| Error::unauthorized("invalid username or password"))?;

    if !user.verify_password(&request.password)? {
        return Err(Error::unauthorized("invalid username or password"));
    }

    let host = host_of(&headers);
    let token = user.issue_token(&host)?;

    let mut cookie = Cookie::new(TOKEN_COOKIE, token.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    if request.remember.unwrap_or(false) {
        cookie.set_max_age(time::Duration::days(30));
    }

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token,
            username: user.username,
        }),
    ))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    (
        jar.remove(Cookie::build(TOKEN_COOKIE).path("/")),
        StatusCode::OK,
    )
}

/// Reports whether the presented token (header pair or cookie) belongs to a
/// stored account. Always answers 200; failures are data, not errors.
pub async fn validate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Json<Value> {
    let host = host_of(&headers);

    if let (Some(token), Some(username)) = (
        headers.get("X-Authentication").and_then(|v| v.to_str().ok()),
        headers.get("X-Username").and_then(|v| v.to_str().ok()),
    ) {
        if let Ok(Some(user)) = User::get_by_username(&state.db, username).await {
            if user.verify_token(&host, token) {
                return Json(json!({ "valid": true, "username": user.username }));
            }
        }
        return Json(json!({ "valid": false }));
    }

    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        if let Ok(users) = User::list(&state.db).await {
            for user in users {
                if user.verify_token(&host, cookie.value()) {
                    return Json(json!({ "valid": true, "username": user.username }));
                }
            }
        }
    }

    Json(json!({ "valid": false }))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let permissions = Permission::from_names(&request.permissions)?;

    if User::exists(&state.db, &request.username).await? {
        return Err(Error::invalid_input(format!(
            "User {} already exists",
            request.username
        )));
    }

    User::create(&state.db, &request.username, &request.password, permissions).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "created",
            "username": request.username
        })),
    ))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>> {
    let users = User::list(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>> {
    match User::get_by_username(&state.db, &username).await? {
        Some(user) => Ok(Json(UserResponse::from(user))),
        None => Err(Error::not_found(format!("User {username} not found"))),
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>> {
    let mut user = User::get_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {username} not found")))?;

    if let Some(password) = &request.password {
        user.set_password(password)?;
    }
    if let Some(permissions) = &request.permissions {
        user.permissions = Permission::from_names(permissions)?;
    }

    user.update(&state.db).await?;

    Ok(Json(json!({
        "status": "updated",
        "username": username
    })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>> {
    let user = User::get_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {username} not found")))?;

    user.delete(&state.db).await?;

    Ok(Json(json!({
        "status": "deleted",
        "username": username
    })))
}
