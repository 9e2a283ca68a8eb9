use crate::errors::AppError;
use crate::models::{Contact, Lead, Pipeline, PipelinesResponse};
use serde_json::{json, Value};
use std::time::Duration;

/// Client for the AmoCRM v4 API.
///
/// `base_url` is the full `https://{domain}/api/v4` prefix so tests can
/// point the client at a mock server.
#[derive(Clone)]
pub struct AmoCrmClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl AmoCrmClient {
    pub fn new(base_url: String, access_token: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create AmoCRM client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            access_token,
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "AmoCRM {} returned {}: {}",
                what, status, error_text
            )));
        }
        Ok(response)
    }

    /// Fetch a lead by id, with its linked contacts embedded.
    pub async fn get_lead(&self, lead_id: i64) -> Result<Lead, AppError> {
        let url = format!("{}/leads/{}?with=contacts", self.base_url, lead_id);
        tracing::info!("Fetching lead {} from AmoCRM", lead_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("AmoCRM request failed: {}", e)))?;

        let response = Self::check(response, "lead fetch").await?;
        let lead = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse AmoCRM lead: {}", e))
        })?;

        Ok(lead)
    }

    /// Fetch a contact by id.
    pub async fn get_contact(&self, contact_id: i64) -> Result<Contact, AppError> {
        let url = format!("{}/contacts/{}", self.base_url, contact_id);
        tracing::info!("Fetching contact {} from AmoCRM", contact_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("AmoCRM request failed: {}", e)))?;

        let response = Self::check(response, "contact fetch").await?;
        let contact = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse AmoCRM contact: {}", e))
        })?;

        Ok(contact)
    }

    /// Fetch the full pipeline + status catalog.
    pub async fn get_pipelines(&self) -> Result<Vec<Pipeline>, AppError> {
        let url = format!("{}/leads/pipelines", self.base_url);
        tracing::info!("Fetching pipeline catalog from AmoCRM");

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("AmoCRM request failed: {}", e)))?;

        let response = Self::check(response, "pipelines fetch").await?;
        let catalog: PipelinesResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse AmoCRM pipelines: {}", e))
        })?;

        Ok(catalog.embedded.pipelines)
    }

    /// Append a common note to a lead.
    pub async fn add_note(&self, lead_id: i64, text: &str) -> Result<Value, AppError> {
        let url = format!("{}/leads/{}/notes", self.base_url, lead_id);
        tracing::info!("Appending note to lead {} in AmoCRM", lead_id);

        let payload = json!([{
            "note_type": "common",
            "params": {"text": text}
        }]);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Failed to add note: {}", e)))?;

        let response = Self::check(response, "note append").await?;

        // Note responses are only echoed into logs, keep them loose.
        let data = response
            .json()
            .await
            .unwrap_or_else(|_| json!({"status": "ok"}));

        tracing::info!("Note appended to lead {}", lead_id);
        Ok(data)
    }
}
