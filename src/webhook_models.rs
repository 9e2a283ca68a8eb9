use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// Canonical view of an AmoCRM status-change webhook, whatever wire shape
/// it arrived in. Built once per delivery and discarded after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub lead_id: i64,
    pub pipeline_id: Option<i64>,
    pub status_id: Option<i64>,
    pub updated_at: Option<i64>,
}

/// Why an inbound payload could not be turned into an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRejection {
    /// JSON body carried no lead id key at all.
    MissingLeadId,
    /// A lead id key was present but not numeric.
    InvalidLeadId,
    /// Form body had no recognizable lead id anywhere.
    NoLeadId,
}

impl EventRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            EventRejection::MissingLeadId => "lead_id_required",
            EventRejection::InvalidLeadId => "lead_id_invalid",
            EventRejection::NoLeadId => "no_lead_id",
        }
    }
}

fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

impl InboundEvent {
    /// Build an event from a JSON webhook body.
    ///
    /// The lead id comes from `lead_id` / `leadId` / `id`, first key present
    /// wins; `pipeline_id`, `status_id` and `updated_at` are picked up when
    /// present and numeric (numbers or digit strings both accepted).
    pub fn from_json(body: &Value) -> Result<InboundEvent, EventRejection> {
        let raw = body
            .get("lead_id")
            .or_else(|| body.get("leadId"))
            .or_else(|| body.get("id"))
            .ok_or(EventRejection::MissingLeadId)?;
        let lead_id = value_as_i64(raw).ok_or(EventRejection::InvalidLeadId)?;

        Ok(InboundEvent {
            lead_id,
            pipeline_id: body.get("pipeline_id").and_then(value_as_i64),
            status_id: body.get("status_id").and_then(value_as_i64),
            updated_at: body.get("updated_at").and_then(value_as_i64),
        })
    }

    /// Build an event from AmoCRM's native form-urlencoded webhook shape.
    ///
    /// Keys encode a path like `leads[status][0][id]`; the segment after
    /// `leads` is either `status` or `update`, the index is a wildcard. For
    /// each target suffix the first key of that shape with an all-digit
    /// value wins. When no id surfaces that way, any key containing `leads`
    /// and ending in `[id]` with an all-digit value is taken as a fallback.
    pub fn from_form(pairs: &[(String, String)]) -> Result<InboundEvent, EventRejection> {
        let path = Regex::new(r"^leads\[(?:status|update)\]\[\d+\]\[([a-z_]+)\]$")
            .expect("form key pattern is valid");

        let mut lead_id: Option<i64> = None;
        let mut pipeline_id: Option<i64> = None;
        let mut status_id: Option<i64> = None;
        let mut updated_at: Option<i64> = None;

        for (key, value) in pairs {
            let Some(caps) = path.captures(key) else {
                continue;
            };
            if !all_digits(value) {
                continue;
            }
            let slot = match &caps[1] {
                "id" => &mut lead_id,
                "pipeline_id" => &mut pipeline_id,
                "status_id" => &mut status_id,
                "updated_at" => &mut updated_at,
                _ => continue,
            };
            if slot.is_none() {
                *slot = value.parse().ok();
            }
        }

        // Looser sweep for the id when the strict path shape found nothing.
        if lead_id.is_none() {
            for (key, value) in pairs {
                if key.contains("leads") && key.ends_with("[id]") && all_digits(value) {
                    lead_id = value.parse().ok();
                    break;
                }
            }
        }

        let lead_id = lead_id.ok_or(EventRejection::NoLeadId)?;
        Ok(InboundEvent {
            lead_id,
            pipeline_id,
            status_id,
            updated_at,
        })
    }

    /// Dedup key for this delivery: the lead id plus every distinguishing
    /// field the raw event carried, so identical re-deliveries collapse
    /// while distinct status transitions of the same lead stay apart.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.lead_id,
            self.pipeline_id.map(|v| v.to_string()).unwrap_or_default(),
            self.status_id.map(|v| v.to_string()).unwrap_or_default(),
            self.updated_at.map(|v| v.to_string()).unwrap_or_default(),
        )
    }
}

/// JSON envelope returned to the webhook caller. Always paired with HTTP
/// 200 so AmoCRM never disables or retry-storms the hook on application
/// rejections.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<i64>,
}

impl WebhookResponse {
    pub fn processing(lead_id: i64) -> Self {
        Self {
            status: "processing",
            reason: None,
            lead_id: Some(lead_id),
        }
    }

    pub fn ignored(reason: &'static str) -> Self {
        Self {
            status: "ignored",
            reason: Some(reason),
            lead_id: None,
        }
    }

    pub fn error(reason: Option<&'static str>) -> Self {
        Self {
            status: "error",
            reason,
            lead_id: None,
        }
    }
}
