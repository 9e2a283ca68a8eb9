use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub amocrm_domain: String,
    pub amocrm_access_token: String,
    pub wappi_api_token: String,
    pub wappi_profile_id: String,
    pub wappi_base_url: String,
    /// Display name of the pipeline status that triggers a dispatch.
    pub assigned_status_name: String,
    /// Display names of the lead custom fields the pipeline reads.
    pub geodesist_field_name: String,
    pub work_type_field_name: String,
    pub address_field_name: String,
    pub time_field_name: String,
    pub cadastral_field_names: Vec<String>,
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))
        .and_then(|value| {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            Ok(value)
        })
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            amocrm_domain: required("AMOCRM_DOMAIN")?,
            amocrm_access_token: required("AMOCRM_ACCESS_TOKEN")?,
            wappi_api_token: required("WAPPI_API_TOKEN")?,
            wappi_profile_id: required("WAPPI_MAX_PROFILE_ID")?,
            wappi_base_url: std::env::var("WAPPI_BASE_URL")
                .unwrap_or_else(|_| "https://wappi.pro".to_string()),
            assigned_status_name: std::env::var("ASSIGNED_STATUS_NAME")
                .unwrap_or_else(|_| "Assigned".to_string()),
            geodesist_field_name: std::env::var("GEODESIST_FIELD_NAME")
                .unwrap_or_else(|_| "Геодезист".to_string()),
            work_type_field_name: std::env::var("WORK_TYPE_FIELD_NAME")
                .unwrap_or_else(|_| "Тип работ".to_string()),
            address_field_name: std::env::var("ADDRESS_FIELD_NAME")
                .unwrap_or_else(|_| "Адрес".to_string()),
            time_field_name: std::env::var("TIME_FIELD_NAME")
                .unwrap_or_else(|_| "Время выезда".to_string()),
            cadastral_field_names: std::env::var("CADASTRAL_FIELD_NAMES")
                .unwrap_or_else(|_| "Кадастровый номер,Кадастровый номер 2".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("AmoCRM domain: {}", config.amocrm_domain);
        tracing::debug!("Wappi base URL: {}", config.wappi_base_url);
        tracing::debug!("Assigned status name: {}", config.assigned_status_name);
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }

    /// Full AmoCRM v4 API prefix for the configured account domain.
    pub fn amocrm_base_url(&self) -> String {
        format!("https://{}/api/v4", self.amocrm_domain)
    }
}
