use crate::error::ApiError;
use crate::user_models::{AuthResponse, Claims, LoginRequest, SignupRequest, User};
use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::Redirect,
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;

pub fn mint_token(user: &User, secret: &str, ttl_days: i64) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        exp: (Utc::now() + Duration::days(ttl_days)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Required auth: the route rejects with 401 unless a valid token maps to an
/// existing user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts).ok_or_else(|| ApiError::Unauthorized("Missing Bearer token".into()))?;
        let claims = verify_token(token, &state.config.jwt_secret)?;
        let user = state
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User no longer exists".into()))?;
        Ok(AuthUser(user))
    }
}

/// Optional auth: any extraction failure yields an anonymous caller instead
/// of failing the request.
#[derive(Debug, Clone, Default)]
pub struct MaybeAuthUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state)
            .await
            .ok()
            .map(|auth| auth.0);
        Ok(MaybeAuthUser(user))
    }
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let full_name = payload.full_name.trim();
    let username = payload.username.trim();
    let email = payload.email.trim();
    if full_name.is_empty() || username.is_empty() || email.is_empty() || payload.password.is_empty()
    {
        return Err(ApiError::Validation(
            "Full name, username, email and password are required".into(),
        ));
    }

    if state.users.find_by_email(email).await?.is_some() {
        return Err(ApiError::Validation("Email already in use".into()));
    }
    if state.users.find_by_username(username).await?.is_some() {
        return Err(ApiError::Validation("Username already taken".into()));
    }

    let password_hash = bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(e.into()))?;
    let user = state
        .users
        .insert(User::new(
            full_name.to_string(),
            username.to_string(),
            email.to_string(),
            password_hash,
        ))
        .await?;
    tracing::info!(username = %user.username, "new user signed up");

    let token = mint_token(&user, &state.config.jwt_secret, state.config.token_ttl_days)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.profile(),
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .users
        .find_by_email(payload.email.trim())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".into()))?;

    let matches = bcrypt::verify(&payload.password, &user.password_hash).unwrap_or(false);
    if !matches {
        return Err(ApiError::Unauthorized("Invalid email or password".into()));
    }

    let token = mint_token(&user, &state.config.jwt_secret, state.config.token_ttl_days)?;
    Ok(Json(AuthResponse {
        token,
        user: user.profile(),
    }))
}

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
}

#[derive(Debug, Deserialize)]
pub struct OauthCallbackQuery {
    pub code: String,
}

pub async fn google_redirect(
    State(state): State<Arc<AppState>>,
) -> Result<Redirect, ApiError> {
    let client_id = state
        .config
        .google_client_id
        .as_deref()
        .ok_or_else(|| ApiError::Validation("Google OAuth is not configured".into()))?;

    let url = format!(
        "{GOOGLE_AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}",
        urlencoding::encode(client_id),
        urlencoding::encode(&state.config.google_redirect_url),
        urlencoding::encode("openid email profile"),
    );
    Ok(Redirect::temporary(&url))
}

pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OauthCallbackQuery>,
) -> Result<Redirect, ApiError> {
    let (client_id, client_secret) = match (
        state.config.google_client_id.as_deref(),
        state.config.google_client_secret.as_deref(),
    ) {
        (Some(id), Some(secret)) => (id, secret),
        _ => return Err(ApiError::Validation("Google OAuth is not configured".into())),
    };

    let token: GoogleTokenResponse = state
        .http
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("code", query.code.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", state.config.google_redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Google token exchange failed: {e}")))?
        .error_for_status()
        .map_err(|e| ApiError::Upstream(format!("Google token exchange failed: {e}")))?
        .json()
        .await
        .map_err(|e| ApiError::Upstream(format!("Invalid Google token response: {e}")))?;

    let info: GoogleUserInfo = state
        .http
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Google userinfo failed: {e}")))?
        .error_for_status()
        .map_err(|e| ApiError::Upstream(format!("Google userinfo failed: {e}")))?
        .json()
        .await
        .map_err(|e| ApiError::Upstream(format!("Invalid Google userinfo response: {e}")))?;

    let user = find_or_create_google_user(&state, info).await?;
    let token = mint_token(&user, &state.config.jwt_secret, state.config.token_ttl_days)?;

    let redirect = format!(
        "{}/auth-callback?token={}&name={}&email={}&profilePic={}&userId={}",
        state.config.frontend_url,
        urlencoding::encode(&token),
        urlencoding::encode(&user.full_name),
        urlencoding::encode(&user.email),
        urlencoding::encode(&user.profile_pic),
        urlencoding::encode(&user.id),
    );
    Ok(Redirect::temporary(&redirect))
}

async fn find_or_create_google_user(
    state: &AppState,
    info: GoogleUserInfo,
) -> Result<User, ApiError> {
    if let Some(mut user) = state.users.find_by_email(&info.email).await? {
        // Refresh provider-issued fields on every login.
        let mut dirty = false;
        if !info.picture.is_empty() && user.profile_pic != info.picture {
            user.profile_pic = info.picture;
            dirty = true;
        }
        if user.google_id.is_none() {
            user.google_id = Some(info.id);
            dirty = true;
        }
        if dirty {
            user = state
                .users
                .update(user)
                .await?
                .ok_or_else(|| ApiError::Unauthorized("User no longer exists".into()))?;
        }
        return Ok(user);
    }

    let username = info
        .email
        .split('@')
        .next()
        .unwrap_or(&info.email)
        .to_string();
    let full_name = if info.name.is_empty() {
        username.clone()
    } else {
        info.name.clone()
    };
    // Placeholder credential; password login is not the path for OAuth
    // accounts, so this is never a valid bcrypt hash.
    let mut user = User::new(
        full_name,
        username,
        info.email,
        format!("google-oauth:{}", Uuid::new_v4()),
    );
    user.profile_pic = info.picture;
    user.google_id = Some(info.id);

    let user = state.users.insert(user).await?;
    tracing::info!(email = %user.email, "new user created via Google OAuth");
    Ok(user)
}
