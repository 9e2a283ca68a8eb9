use crate::errors::AppError;
use crate::phone::normalize_phone;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for the Wappi MAX messaging API.
#[derive(Clone)]
pub struct WappiMaxClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    profile_id: String,
}

impl WappiMaxClient {
    pub fn new(
        base_url: String,
        api_token: String,
        profile_id: String,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Wappi client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            api_token,
            profile_id,
        })
    }

    /// Send a text message to a phone-identified recipient under the
    /// configured sender profile. Empty recipient or blank body are
    /// rejected before any I/O.
    pub async fn send_text(&self, recipient: &str, body: &str) -> Result<Value, AppError> {
        let phone = normalize_phone(recipient);
        if phone.is_empty() {
            return Err(AppError::BadRequest(
                "recipient phone is empty".to_string(),
            ));
        }
        if body.trim().is_empty() {
            return Err(AppError::BadRequest("message body is empty".to_string()));
        }

        // Encode query parameters properly; token travels in the header only.
        let url = reqwest::Url::parse_with_params(
            &format!("{}/maxapi/async/message/send", self.base_url),
            &[("profile_id", self.profile_id.as_str())],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Sending MAX message to {}", phone);
        tracing::debug!(
            "Wappi URL: {}/maxapi/async/message/send?profile_id={} (token [REDACTED])",
            self.base_url,
            self.profile_id
        );

        let payload = json!({
            "recipient": phone,
            "body": body,
        });

        let response = self
            .client
            .post(url)
            .header("Authorization", self.api_token.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Wappi request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Wappi returned {}: {}",
                status, error_text
            )));
        }

        let data = response
            .json()
            .await
            .unwrap_or_else(|_| json!({"status": "ok"}));

        tracing::info!("MAX message dispatched to {}", phone);
        Ok(data)
    }
}
