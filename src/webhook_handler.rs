use crate::handlers::AppState;
use crate::pipeline::spawn_dispatch;
use crate::webhook_models::{EventRejection, InboundEvent, WebhookResponse};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

/// AmoCRM status-change webhook.
///
/// Accepts `application/json` and form-urlencoded bodies (negotiated by the
/// Content-Type header), normalizes them into one canonical event, gates on
/// the dedup set, and hands accepted deliveries to a detached dispatch
/// task. Every outcome answers HTTP 200 with a small status envelope —
/// AmoCRM disables hooks that error, so application rejections must never
/// surface as 4xx/5xx.
pub async fn geodesist_assigned(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookResponse> {
    tracing::info!("Received AmoCRM webhook ({} bytes)", body.len());

    let parsed = parse_event(&headers, &body);

    let event = match parsed {
        Ok(event) => event,
        Err(Some(rejection)) => {
            tracing::warn!("Webhook rejected: {}", rejection.reason());
            return Json(WebhookResponse::error(Some(rejection.reason())));
        }
        Err(None) => {
            tracing::error!("Webhook body could not be parsed at all");
            return Json(WebhookResponse::error(None));
        }
    };

    let key = event.dedup_key();
    if state.dedup.check_and_record(&key) {
        tracing::info!("Webhook for lead {} ignored: duplicate", event.lead_id);
        return Json(WebhookResponse::ignored("duplicate"));
    }

    let lead_id = event.lead_id;
    spawn_dispatch(state.dispatcher.clone(), event);

    Json(WebhookResponse::processing(lead_id))
}

/// Content negotiation + event normalization.
///
/// `Err(Some(_))` is an application-level rejection with a reason for the
/// envelope; `Err(None)` is the outermost catch for bodies that cannot be
/// parsed at all.
fn parse_event(
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<InboundEvent, Option<EventRejection>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    if content_type.contains("application/json") {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            tracing::warn!("Invalid JSON webhook body: {}", e);
            None
        })?;
        InboundEvent::from_json(&value).map_err(Some)
    } else {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(body)
            .into_owned()
            .collect();
        InboundEvent::from_form(&pairs).map_err(Some)
    }
}
