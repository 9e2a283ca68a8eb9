use serde::{Deserialize, Serialize};
use serde_json::Value;

/// AmoCRM lead (deal) as returned by `GET /api/v4/leads/{id}?with=contacts`.
///
/// Only the fields the dispatch pipeline reads are typed; everything else
/// stays in `raw` so unexpected payload growth never breaks deserialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Lead {
    pub id: i64,

    pub status_id: i64,

    pub pipeline_id: i64,

    #[serde(default)]
    pub custom_fields_values: Option<Vec<CustomField>>,

    #[serde(rename = "_embedded", default)]
    pub embedded: Option<LeadEmbedded>,

    /// Raw data for any additional fields
    #[serde(flatten)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LeadEmbedded {
    #[serde(default)]
    pub contacts: Vec<ContactRef>,

    #[serde(flatten)]
    pub raw: Value,
}

/// Reference to a contact linked to a lead.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContactRef {
    pub id: i64,

    #[serde(default)]
    pub is_main: Option<bool>,

    #[serde(flatten)]
    pub raw: Value,
}

/// AmoCRM contact as returned by `GET /api/v4/contacts/{id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Contact {
    pub id: i64,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub custom_fields_values: Option<Vec<CustomField>>,

    #[serde(flatten)]
    pub raw: Value,
}

/// A custom field attached to a lead or contact.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomField {
    #[serde(default)]
    pub field_id: Option<i64>,

    #[serde(default)]
    pub field_name: Option<String>,

    /// Typed field code, e.g. "PHONE" on contacts.
    #[serde(default)]
    pub field_code: Option<String>,

    #[serde(default)]
    pub values: Vec<FieldValue>,

    #[serde(flatten)]
    pub raw: Value,
}

/// One value container inside a custom field.
///
/// AmoCRM mixes strings, numbers and booleans in `value`, and enum-typed
/// fields may carry only an `enum` label or `enum_id` instead.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FieldValue {
    #[serde(default)]
    pub value: Option<Value>,

    #[serde(rename = "enum", default)]
    pub enum_label: Option<String>,

    #[serde(default)]
    pub enum_id: Option<i64>,

    #[serde(flatten)]
    pub raw: Value,
}

impl FieldValue {
    /// Stringified view of this value container: `value` first, then the
    /// `enum` label, then `enum_id`, trimmed. Empty string when all absent.
    fn as_text(&self) -> String {
        if let Some(v) = &self.value {
            let s = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let s = s.trim().to_string();
            if !s.is_empty() {
                return s;
            }
        }
        if let Some(label) = &self.enum_label {
            let s = label.trim().to_string();
            if !s.is_empty() {
                return s;
            }
        }
        if let Some(id) = self.enum_id {
            return id.to_string();
        }
        String::new()
    }
}

/// Display-name lookup over a custom-field list: case-insensitive, trimmed
/// exact match; only the first matching field and its first value count.
fn field_value_by_name(fields: Option<&[CustomField]>, name: &str) -> String {
    let wanted = name.trim().to_lowercase();
    let Some(fields) = fields else {
        return String::new();
    };
    for field in fields {
        let matches = field
            .field_name
            .as_deref()
            .map(|n| n.trim().to_lowercase() == wanted)
            .unwrap_or(false);
        if matches {
            return field
                .values
                .first()
                .map(FieldValue::as_text)
                .unwrap_or_default();
        }
    }
    String::new()
}

impl Lead {
    /// Value of the custom field whose display name matches `name`
    /// (case-insensitive, whitespace-trimmed), or an empty string.
    pub fn field_value_by_name(&self, name: &str) -> String {
        field_value_by_name(self.custom_fields_values.as_deref(), name)
    }

    /// Values for several field names in the given order, empty results
    /// dropped. Used to collect optional fields like cadastral numbers.
    pub fn field_values_by_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        names
            .iter()
            .map(|n| self.field_value_by_name(n.as_ref()))
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Id of the first linked contact, if any.
    pub fn primary_contact_id(&self) -> Option<i64> {
        self.embedded
            .as_ref()
            .and_then(|e| e.contacts.first())
            .map(|c| c.id)
    }
}

impl Contact {
    /// First non-empty value of the typed "PHONE" custom field.
    pub fn phone(&self) -> String {
        let Some(fields) = &self.custom_fields_values else {
            return String::new();
        };
        for field in fields {
            if field.field_code.as_deref() != Some("PHONE") {
                continue;
            }
            for value in &field.values {
                let text = value.as_text();
                if !text.is_empty() {
                    return text;
                }
            }
        }
        String::new()
    }
}

/// A pipeline from `GET /api/v4/leads/pipelines`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Pipeline {
    pub id: i64,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "_embedded", default)]
    pub embedded: Option<PipelineEmbedded>,

    #[serde(flatten)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineEmbedded {
    #[serde(default)]
    pub statuses: Vec<PipelineStatus>,

    #[serde(flatten)]
    pub raw: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineStatus {
    pub id: i64,
    pub name: String,

    #[serde(flatten)]
    pub raw: Value,
}

impl Pipeline {
    pub fn statuses(&self) -> &[PipelineStatus] {
        self.embedded
            .as_ref()
            .map(|e| e.statuses.as_slice())
            .unwrap_or(&[])
    }
}

/// Envelope around the pipelines catalog response.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelinesResponse {
    #[serde(rename = "_embedded")]
    pub embedded: PipelinesEmbedded,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelinesEmbedded {
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,
}
