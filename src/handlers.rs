use crate::ai::AiModifyResponse;
use crate::auth::{self, AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::models::{
    ComponentPage, ComponentView, CreateComponentRequest, ListQuery, UiComponent,
    UpdateComponentRequest,
};
use crate::repository::{CategoryFilter, DEFAULT_PAGE_SIZE};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/google", get(auth::google_redirect))
        .route("/api/auth/google/callback", get(auth::google_callback))
        .route("/api/ui-components", get(list_components).post(create_component))
        .route(
            "/api/ui-components/:id",
            get(get_component).put(update_component).delete(delete_component),
        )
        .route("/api/ui-components/:id/like", post(like_component))
        .route("/api/ui-components/:id/download", post(download_component))
        .route("/api/ui-components/:id/ai-modify", post(ai_modify_component))
        .with_state(state)
}

async fn root() -> &'static str {
    "UI Forge backend is running"
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "Server is running",
        "datastoreConnected": state.datastore_connected,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn list_components(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ComponentPage>, ApiError> {
    let filter = CategoryFilter::parse(query.category.as_deref())?;
    let page = state
        .repo
        .list(
            filter,
            query.search.as_deref(),
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(Json(page))
}

async fn get_component(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    MaybeAuthUser(caller): MaybeAuthUser,
) -> Result<Json<ComponentView>, ApiError> {
    let caller_id = caller.as_ref().map(|u| u.id.as_str());
    let view = state.repo.get_by_id(&id, caller_id).await?;
    Ok(Json(view))
}

async fn create_component(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateComponentRequest>,
) -> Result<(StatusCode, Json<UiComponent>), ApiError> {
    let component = state.repo.create(payload, &user.id).await?;
    tracing::info!(id = %component.id, title = %component.title, "component created");
    Ok((StatusCode::CREATED, Json(component)))
}

async fn update_component(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(user): AuthUser,
    Json(patch): Json<UpdateComponentRequest>,
) -> Result<Json<UiComponent>, ApiError> {
    let component = state.repo.update(&id, &user.id, patch).await?;
    Ok(Json(component))
}

async fn delete_component(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.repo.delete(&id, &user.id).await?;
    Ok(Json(json!({ "message": "Component deleted successfully" })))
}

async fn like_component(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(user): AuthUser,
) -> Result<Json<UiComponent>, ApiError> {
    let component = state.repo.toggle_like(&id, &user.id).await?;
    Ok(Json(component))
}

async fn download_component(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UiComponent>, ApiError> {
    let component = state.repo.increment_download(&id).await?;
    Ok(Json(component))
}

#[derive(Debug, Deserialize)]
pub struct AiModifyRequest {
    pub prompt: String,
}

async fn ai_modify_component(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(_user): AuthUser,
    Json(payload): Json<AiModifyRequest>,
) -> Result<Json<AiModifyResponse>, ApiError> {
    let prompt = payload.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::Validation("Prompt is required".into()));
    }

    let view = state.repo.get_by_id(&id, None).await?;
    let code = &view.component.code;
    let modified = state.ai.modify(code, prompt).await?;

    Ok(Json(AiModifyResponse {
        success: true,
        modified_code: modified,
        original_code: crate::ai::CodePair {
            html: code.html.clone(),
            css: code.css.clone(),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiClient;
    use crate::config::Config;
    use crate::repository::ComponentRepository;
    use crate::storage::MemoryStore;
    use crate::user_storage::MemoryUserStore;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            port: 0,
            data_dir: "unused".into(),
            jwt_secret: "test-secret".into(),
            token_ttl_days: 7,
            hf_api_key: None,
            hf_model_url: "http://localhost:1/unused".into(),
            ai_timeout_secs: 1,
            google_client_id: None,
            google_client_secret: None,
            google_redirect_url: "http://localhost/unused".into(),
            frontend_url: "http://localhost:5173".into(),
        }
    }

    fn test_app() -> Router {
        let config = test_config();
        let http = reqwest::Client::new();
        let state = Arc::new(AppState {
            repo: ComponentRepository::new(Arc::new(MemoryStore::new())),
            users: Arc::new(MemoryUserStore::new()),
            ai: AiClient::new(http.clone(), None, config.hf_model_url.clone(), 1),
            http,
            datastore_connected: false,
            config,
        });
        router(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    /// Signs up a fresh user and returns their bearer token and id.
    async fn signup(app: &Router, username: &str) -> (String, String) {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/signup",
                None,
                json!({
                    "fullName": format!("{username} full"),
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "hunter2!",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn create_component_as(app: &Router, token: &str, title: &str, category: &str) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/ui-components",
                Some(token),
                json!({
                    "title": title,
                    "description": format!("{title} description"),
                    "category": category,
                    "code": { "html": "<button/>", "css": ".btn{}" },
                    "tags": ["demo"],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_datastore_mode() {
        let app = test_app();
        let response = app.oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "Server is running");
        assert_eq!(body["datastoreConnected"], false);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn creation_requires_auth() {
        let app = test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/ui-components",
                None,
                json!({
                    "title": "x",
                    "description": "y",
                    "category": "Buttons",
                    "code": { "html": "<p/>", "css": "p{}" },
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn invalid_payload_is_a_400() {
        let app = test_app();
        let (token, _) = signup(&app, "vera").await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/ui-components",
                Some(&token),
                json!({
                    "title": "Broken",
                    "description": "No CSS and no Tailwind",
                    "category": "Buttons",
                    "code": { "html": "<p/>" },
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_category_is_a_400() {
        let app = test_app();
        let response = app
            .oneshot(get_request("/api/ui-components?category=Widgets", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ownership_scenario_end_to_end() {
        let app = test_app();
        let (token_a, _) = signup(&app, "alice").await;
        let (token_b, _) = signup(&app, "bob").await;
        let id = create_component_as(&app, &token_a, "Fancy button", "Buttons").await;

        // Anonymous caller sees no ownership.
        let body = body_json(
            app.clone()
                .oneshot(get_request(&format!("/api/ui-components/{id}"), None))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["isOwner"], false);
        assert_eq!(body["canDelete"], false);

        // The author does.
        let body = body_json(
            app.clone()
                .oneshot(get_request(&format!("/api/ui-components/{id}"), Some(&token_a)))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["isOwner"], true);

        // A different authenticated user cannot delete.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/ui-components/{id}"))
                    .header("authorization", format!("Bearer {token_b}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // The author can.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/ui-components/{id}"))
                    .header("authorization", format!("Bearer {token_a}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(get_request(&format!("/api/ui-components/{id}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mixed_listing_puts_forms_last() {
        let app = test_app();
        let (token, _) = signup(&app, "carol").await;
        create_component_as(&app, &token, "Login form", "Forms").await;
        create_component_as(&app, &token, "Signup form", "Forms").await;
        create_component_as(&app, &token, "Primary button", "Buttons").await;
        create_component_as(&app, &token, "Profile card", "Cards").await;
        create_component_as(&app, &token, "Spinner", "Loaders").await;

        let body = body_json(
            app.oneshot(get_request("/api/ui-components?category=All", None))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["total"], 5);
        assert_eq!(body["totalPages"], 1);

        let categories: Vec<&str> = body["components"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["category"].as_str().unwrap())
            .collect();
        assert_eq!(categories.len(), 5);
        assert_eq!(&categories[3..], ["Forms", "Forms"]);
        assert!(categories[..3].iter().all(|c| *c != "Forms"));
    }

    #[tokio::test]
    async fn like_and_download_flow() {
        let app = test_app();
        let (token, user_id) = signup(&app, "dave").await;
        let id = create_component_as(&app, &token, "Toggle", "Toggle switches").await;

        let body = body_json(
            app.clone()
                .oneshot(json_request(
                    "POST",
                    &format!("/api/ui-components/{id}/like"),
                    Some(&token),
                    json!({}),
                ))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["likes"], json!([user_id]));

        // Likes require auth; downloads do not.
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/ui-components/{id}/like"),
                None,
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(
            app.oneshot(json_request(
                "POST",
                &format!("/api/ui-components/{id}/download"),
                None,
                json!({}),
            ))
            .await
            .unwrap(),
        )
        .await;
        assert_eq!(body["downloads"], 1);
    }

    #[tokio::test]
    async fn ai_modify_validates_prompt_before_calling_upstream() {
        let app = test_app();
        let (token, _) = signup(&app, "erin").await;
        let id = create_component_as(&app, &token, "Card", "Cards").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/ui-components/{id}/ai-modify"),
                Some(&token),
                json!({ "prompt": "  " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // No API key configured in tests, so a real prompt surfaces a 500.
        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/ui-components/{id}/ai-modify"),
                Some(&token),
                json!({ "prompt": "make it blue" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn login_round_trip() {
        let app = test_app();
        signup(&app, "frank").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "frank@example.com", "password": "hunter2!" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["token"].is_string());
        assert_eq!(body["user"]["username"], "frank");

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "frank@example.com", "password": "wrong" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected() {
        let app = test_app();
        signup(&app, "gina").await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/auth/signup",
                None,
                json!({
                    "fullName": "Gina Again",
                    "username": "gina2",
                    "email": "gina@example.com",
                    "password": "hunter2!",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn google_login_without_config_is_a_400() {
        let app = test_app();
        let response = app.oneshot(get_request("/api/auth/google", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
