use std::env;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub hf_api_key: Option<String>,
    pub hf_model_url: String,
    pub ai_timeout_secs: u64,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_url: String,
    pub frontend_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5002);

        Self {
            port,
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()),
            token_ttl_days: env::var("TOKEN_TTL_DAYS")
                .ok()
                .and_then(|d| d.parse().ok())
                .unwrap_or(7),
            hf_api_key: env::var("HUGGINGFACE_API_KEY").ok().filter(|k| !k.is_empty()),
            hf_model_url: env::var("HF_MODEL_URL").unwrap_or_else(|_| {
                "https://api-inference.huggingface.co/models/google/flan-t5-base".to_string()
            }),
            ai_timeout_secs: env::var("AI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            google_client_id: env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty()),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .ok()
                .filter(|v| !v.is_empty()),
            google_redirect_url: env::var("GOOGLE_CALLBACK_URL").unwrap_or_else(|_| {
                format!("http://localhost:{}/api/auth/google/callback", port)
            }),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        }
    }

    pub fn google_oauth_configured(&self) -> bool {
        self.google_client_id.is_some() && self.google_client_secret.is_some()
    }
}
