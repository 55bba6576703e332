use crate::error::ApiError;
use crate::models::CodeBundle;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;

static HTML_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)HTML:\s*(.*?)\s*CSS:").unwrap());
static CSS_SECTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)CSS:\s*(.*)\z").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct CodePair {
    pub html: String,
    pub css: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiModifyResponse {
    pub success: bool,
    pub modified_code: CodePair,
    pub original_code: CodePair,
}

/// Thin passthrough to the hosted inference API. One call, one timeout, no
/// retries; failures surface as UpstreamError.
pub struct AiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model_url: String,
    timeout: Duration,
}

impl AiClient {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        model_url: String,
        timeout_secs: u64,
    ) -> Self {
        Self {
            http,
            api_key,
            model_url,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn modify(&self, code: &CodeBundle, prompt: &str) -> Result<CodePair, ApiError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ApiError::Upstream("AI service API key is not configured".into())
        })?;

        let body = json!({
            "inputs": build_prompt(code, prompt),
            "parameters": {
                "max_new_tokens": 1000,
                "temperature": 0.3,
                "do_sample": true,
                "top_p": 0.9,
            },
        });

        let response = self
            .http
            .post(&self.model_url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("AI service request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %detail, "AI service returned an error");
            return Err(ApiError::Upstream(format!(
                "AI service returned {status}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Invalid AI service response: {e}")))?;
        let text = extract_generated_text(&payload)
            .ok_or_else(|| ApiError::Upstream("AI service returned no generated text".into()))?;

        parse_modified_code(&text)
    }
}

fn build_prompt(code: &CodeBundle, request: &str) -> String {
    format!(
        "Modify this HTML and CSS based on the request: \"{request}\"\n\n\
         Original HTML: {}\n\
         Original CSS: {}\n\n\
         Return the modified code in this format:\n\
         HTML: [modified HTML]\n\
         CSS: [modified CSS]",
        code.html, code.css
    )
}

/// The inference API answers either `[{"generated_text": ...}]` or
/// `[{"text": ...}]` depending on the model.
fn extract_generated_text(payload: &Value) -> Option<String> {
    let first = payload.as_array()?.first()?;
    first
        .get("generated_text")
        .or_else(|| first.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_modified_code(text: &str) -> Result<CodePair, ApiError> {
    let html = HTML_SECTION
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());
    let css = CSS_SECTION
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());

    match (html, css) {
        (Some(html), Some(css)) if !html.is_empty() => Ok(CodePair { html, css }),
        _ => Err(ApiError::Upstream(
            "Could not parse AI response. Please try again.".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_response() {
        let text = "HTML: <button class=\"big\">Go</button>\nCSS: .big { font-size: 2rem; }";
        let pair = parse_modified_code(text).unwrap();
        assert_eq!(pair.html, "<button class=\"big\">Go</button>");
        assert_eq!(pair.css, ".big { font-size: 2rem; }");
    }

    #[test]
    fn section_labels_are_case_insensitive() {
        let text = "html: <p/>\ncss: p {}";
        let pair = parse_modified_code(text).unwrap();
        assert_eq!(pair.html, "<p/>");
        assert_eq!(pair.css, "p {}");
    }

    #[test]
    fn rejects_response_without_css_section() {
        let err = parse_modified_code("HTML: <p/>").unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[test]
    fn rejects_freeform_response() {
        assert!(parse_modified_code("I cannot help with that.").is_err());
    }

    #[test]
    fn generated_text_comes_from_either_field() {
        let payload = serde_json::json!([{"generated_text": "abc"}]);
        assert_eq!(extract_generated_text(&payload).as_deref(), Some("abc"));

        let payload = serde_json::json!([{"text": "xyz"}]);
        assert_eq!(extract_generated_text(&payload).as_deref(), Some("xyz"));

        let payload = serde_json::json!({"unexpected": true});
        assert!(extract_generated_text(&payload).is_none());
    }

    #[test]
    fn prompt_embeds_original_code() {
        let code = CodeBundle {
            html: "<p/>".into(),
            css: "p {}".into(),
            js: String::new(),
        };
        let prompt = build_prompt(&code, "make it red");
        assert!(prompt.contains("make it red"));
        assert!(prompt.contains("Original HTML: <p/>"));
        assert!(prompt.contains("Original CSS: p {}"));
    }
}
