use crate::config::Config;
use crate::crm_client::AmoCrmClient;
use crate::errors::{AppError, ResultExt};
use crate::messaging::WappiMaxClient;
use crate::models::Lead;
use crate::phone::{extract_phone, normalize_phone};
use crate::status_resolver::StatusResolver;
use crate::webhook_models::InboundEvent;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

const NOT_SPECIFIED: &str = "Не указано";

/// How a single dispatch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Message sent and audit note written.
    Sent,
    /// Lead is not in the watched status — the common, silent case.
    NotInTargetStatus,
    /// The configured status name does not exist in the effective pipeline;
    /// a warning note was written so a human can fix configuration.
    StatusNameNotFound,
}

/// Everything one background dispatch run needs. Built once at startup and
/// shared; each webhook delivery runs against the same collaborators and
/// the same process-lifetime status cache.
pub struct Dispatcher {
    crm: AmoCrmClient,
    wappi: WappiMaxClient,
    resolver: StatusResolver,
    config: Arc<Config>,
}

impl Dispatcher {
    pub fn new(
        crm: AmoCrmClient,
        wappi: WappiMaxClient,
        resolver: StatusResolver,
        config: Arc<Config>,
    ) -> Self {
        Self {
            crm,
            wappi,
            resolver,
            config,
        }
    }

    /// The per-delivery state machine: fetch, filter, extract, notify,
    /// record. Filtering outcomes are normal results; every other failure
    /// propagates to the spawn boundary.
    pub async fn run_dispatch(&self, event: &InboundEvent) -> Result<DispatchOutcome, AppError> {
        let lead = self
            .crm
            .get_lead(event.lead_id)
            .await
            .context(format!("fetching lead {}", event.lead_id))?;

        // Event-carried pipeline id wins over the fetched lead's own.
        let pipeline_id = event.pipeline_id.unwrap_or(lead.pipeline_id);

        let assigned_id = self
            .resolver
            .resolve(pipeline_id, &self.config.assigned_status_name)
            .await
            .context(format!("resolving status for pipeline {}", pipeline_id))?;

        let Some(assigned_id) = assigned_id else {
            let warning = format!(
                "⚠️ Статус \"{}\" не найден в воронке {}. Проверьте настройки интеграции.",
                self.config.assigned_status_name, pipeline_id
            );
            tracing::warn!(
                "Status \"{}\" not found in pipeline {}, writing warning note to lead {}",
                self.config.assigned_status_name,
                pipeline_id,
                lead.id
            );
            self.crm
                .add_note(lead.id, &warning)
                .await
                .context("writing status-miss warning note")?;
            return Ok(DispatchOutcome::StatusNameNotFound);
        };

        if lead.status_id != assigned_id {
            tracing::debug!(
                "Lead {} is in status {} (watched {}), skipping",
                lead.id,
                lead.status_id,
                assigned_id
            );
            return Ok(DispatchOutcome::NotInTargetStatus);
        }

        let fields = self.extract_fields(&lead).await?;

        let message = compose_message(&fields);
        let wappi_result = self
            .wappi
            .send_text(&fields.geodesist_phone, &message)
            .await
            .context("sending MAX message")?;

        let note = compose_note(&fields, &wappi_result.to_string());
        self.crm
            .add_note(lead.id, &note)
            .await
            .context(format!("appending note to lead {}", lead.id))?;

        tracing::info!(
            "Dispatch complete for lead {}: geodesist {} notified",
            lead.id,
            fields.geodesist_phone
        );
        Ok(DispatchOutcome::Sent)
    }

    async fn extract_fields(&self, lead: &Lead) -> Result<DispatchFields, AppError> {
        let geodesist_raw = lead.field_value_by_name(&self.config.geodesist_field_name);

        // Prose extraction first, then a direct normalization of the whole
        // field value for fields that hold a bare number.
        let mut geodesist_phone = extract_phone(&geodesist_raw);
        if geodesist_phone.is_empty() {
            geodesist_phone = normalize_phone(&geodesist_raw);
        }
        if geodesist_phone.is_empty() {
            return Err(AppError::DataExtraction(format!(
                "no phone derivable from field \"{}\" of lead {}",
                self.config.geodesist_field_name, lead.id
            )));
        }

        let work_type = or_not_specified(&lead.field_value_by_name(&self.config.work_type_field_name));
        let address = or_not_specified(&lead.field_value_by_name(&self.config.address_field_name));
        let time_slot = or_not_specified(&format_time_slot(
            &lead.field_value_by_name(&self.config.time_field_name),
        ));
        let cadastral = lead
            .field_values_by_names(&self.config.cadastral_field_names)
            .join(", ");

        // Client details come from the lead's primary contact; a fetch
        // failure there fails the whole run.
        let (client_name, client_phone) = match lead.primary_contact_id() {
            Some(contact_id) => {
                let contact = self
                    .crm
                    .get_contact(contact_id)
                    .await
                    .context(format!("fetching contact {}", contact_id))?;
                (
                    or_not_specified(contact.name.as_deref().unwrap_or("")),
                    or_not_specified(&contact.phone()),
                )
            }
            None => (NOT_SPECIFIED.to_string(), NOT_SPECIFIED.to_string()),
        };

        Ok(DispatchFields {
            lead_id: lead.id,
            geodesist_name: assignee_short_name(&geodesist_raw),
            geodesist_phone,
            client_name,
            client_phone,
            work_type,
            address,
            time_slot,
            cadastral,
        })
    }
}

/// Everything the composers need, pulled out of the CRM records.
#[derive(Debug, Clone)]
pub struct DispatchFields {
    pub lead_id: i64,
    pub geodesist_name: String,
    pub geodesist_phone: String,
    pub client_name: String,
    pub client_phone: String,
    pub work_type: String,
    pub address: String,
    pub time_slot: String,
    pub cadastral: String,
}

fn or_not_specified(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Short display name for the assignee: the text before the first comma of
/// the raw field value ("Иван, +7 961…" -> "Иван").
pub fn assignee_short_name(raw: &str) -> String {
    raw.split(',').next().unwrap_or("").trim().to_string()
}

/// Render an all-digit time-slot value (unix seconds) as Moscow local time,
/// `ДД.ММ.ГГГГ ЧЧ:ММ`. Anything else passes through untouched.
pub fn format_time_slot(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.to_string();
    }
    let Ok(secs) = trimmed.parse::<i64>() else {
        return trimmed.to_string();
    };
    let Some(utc) = DateTime::from_timestamp(secs, 0) else {
        return trimmed.to_string();
    };
    let moscow = FixedOffset::east_opt(3 * 3600).expect("UTC+3 is a valid offset");
    utc.with_timezone(&moscow).format("%d.%m.%Y %H:%M").to_string()
}

/// The message sent to the geodesist over MAX.
pub fn compose_message(fields: &DispatchFields) -> String {
    let mut text = format!(
        "🧭 ВЫЕЗД ГЕОДЕЗИСТА\n\n\
         👤 Клиент: {}\n\
         ☎️ Телефон: {}\n\
         🧩 Тип работ: {}\n\
         📍 Адрес: {}\n\
         🕒 Когда: {}\n",
        fields.client_name,
        fields.client_phone,
        fields.work_type,
        fields.address,
        fields.time_slot,
    );
    if !fields.cadastral.is_empty() {
        text.push_str(&format!("📄 Кадастровый номер: {}\n", fields.cadastral));
    }
    text.push_str(&format!("\nID сделки: {}\n", fields.lead_id));
    text
}

/// The audit note mirrored back onto the lead.
pub fn compose_note(fields: &DispatchFields, wappi_result: &str) -> String {
    let mut text = format!(
        "✅ Геодезисту отправлено в MAX\n\n\
         Геодезист: {} ({})\n\
         Клиент: {}\n\
         Телефон: {}\n\
         Тип работ: {}\n\
         Адрес: {}\n\
         Когда: {}\n",
        fields.geodesist_name,
        fields.geodesist_phone,
        fields.client_name,
        fields.client_phone,
        fields.work_type,
        fields.address,
        fields.time_slot,
    );
    if !fields.cadastral.is_empty() {
        text.push_str(&format!("Кадастровый номер: {}\n", fields.cadastral));
    }
    text.push_str(&format!("\nWappi: {}", wappi_result));
    text
}

/// Spawn one detached dispatch run (non-blocking for the webhook caller).
///
/// The task is the error boundary: any failure is logged here and goes no
/// further — no retry, no note. The caller only ever observes the outcome
/// through the CRM's note history.
pub fn spawn_dispatch(dispatcher: Arc<Dispatcher>, event: InboundEvent) {
    tokio::spawn(async move {
        let lead_id = event.lead_id;
        tracing::info!("Starting background dispatch for lead {}", lead_id);

        match dispatcher.run_dispatch(&event).await {
            Ok(DispatchOutcome::Sent) => {
                tracing::info!("Dispatch for lead {} finished: sent", lead_id);
            }
            Ok(DispatchOutcome::NotInTargetStatus) => {
                tracing::debug!("Dispatch for lead {} skipped: not in target status", lead_id);
            }
            Ok(DispatchOutcome::StatusNameNotFound) => {
                tracing::warn!(
                    "Dispatch for lead {} stopped: status name not found",
                    lead_id
                );
            }
            Err(e) => {
                tracing::error!("Dispatch for lead {} failed: {}", lead_id, e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields_fixture() -> DispatchFields {
        DispatchFields {
            lead_id: 555,
            geodesist_name: "Иван".to_string(),
            geodesist_phone: "79611112233".to_string(),
            client_name: "Петр".to_string(),
            client_phone: "79000000001".to_string(),
            work_type: "Межевание".to_string(),
            address: "Main St 1".to_string(),
            time_slot: "15.11.2023 01:13".to_string(),
            cadastral: String::new(),
        }
    }

    #[test]
    fn time_slot_renders_moscow_local() {
        // 1700000000 = 2023-11-14 22:13:20 UTC = 2023-11-15 01:13 UTC+3
        assert_eq!(format_time_slot("1700000000"), "15.11.2023 01:13");
    }

    #[test]
    fn time_slot_passes_prose_through() {
        assert_eq!(format_time_slot("завтра к 10:00"), "завтра к 10:00");
        assert_eq!(format_time_slot(""), "");
    }

    #[test]
    fn assignee_name_is_text_before_comma() {
        assert_eq!(assignee_short_name("Иван, +7 961 111 22 33"), "Иван");
        assert_eq!(assignee_short_name("Иван"), "Иван");
        assert_eq!(assignee_short_name(""), "");
    }

    #[test]
    fn message_carries_all_fields() {
        let msg = compose_message(&fields_fixture());
        assert!(msg.contains("Клиент: Петр"));
        assert!(msg.contains("Адрес: Main St 1"));
        assert!(msg.contains("ID сделки: 555"));
        assert!(!msg.contains("Кадастровый"));
    }

    #[test]
    fn message_includes_cadastral_when_present() {
        let mut fields = fields_fixture();
        fields.cadastral = "77:01:0001:1, 77:01:0001:2".to_string();
        let msg = compose_message(&fields);
        assert!(msg.contains("Кадастровый номер: 77:01:0001:1, 77:01:0001:2"));
    }

    #[test]
    fn note_mirrors_message_plus_assignee_phone() {
        let note = compose_note(&fields_fixture(), r#"{"status":"ok"}"#);
        assert!(note.contains("Геодезист: Иван (79611112233)"));
        assert!(note.contains("Адрес: Main St 1"));
        assert!(note.contains(r#"Wappi: {"status":"ok"}"#));
    }

    #[test]
    fn placeholders_for_empty_values() {
        assert_eq!(or_not_specified("  "), "Не указано");
        assert_eq!(or_not_specified(" x "), "x");
    }
}
