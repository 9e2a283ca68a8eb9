use crate::crm_client::AmoCrmClient;
use crate::errors::AppError;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps a human-readable status name to AmoCRM's numeric status id.
///
/// The pipeline/status catalog is fetched lazily, once, and kept for the
/// process lifetime: the cache maps pipeline id to a lowercased-trimmed
/// status-name index. A pipeline already in the cache answers
/// authoritatively — a name miss there means "not found", never a refetch.
#[derive(Clone)]
pub struct StatusResolver {
    crm: AmoCrmClient,
    catalog: Cache<i64, Arc<HashMap<String, i64>>>,
}

impl StatusResolver {
    pub fn new(crm: AmoCrmClient) -> Self {
        // No TTL: the catalog lives as long as the process. Capacity is a
        // backstop well above any real account's pipeline count.
        let catalog = Cache::builder().max_capacity(1_000).build();
        Self { crm, catalog }
    }

    /// Numeric status id for `status_name` within `pipeline_id`, or `None`
    /// when that pipeline has no status by that name. Fetches the full
    /// catalog at most once per unknown pipeline.
    pub async fn resolve(
        &self,
        pipeline_id: i64,
        status_name: &str,
    ) -> Result<Option<i64>, AppError> {
        let wanted = status_name.trim().to_lowercase();

        if let Some(statuses) = self.catalog.get(&pipeline_id).await {
            return Ok(statuses.get(&wanted).copied());
        }

        tracing::debug!(
            "Pipeline {} not cached, fetching status catalog",
            pipeline_id
        );
        let pipelines = self.crm.get_pipelines().await?;
        for pipeline in &pipelines {
            let index: HashMap<String, i64> = pipeline
                .statuses()
                .iter()
                .map(|s| (s.name.trim().to_lowercase(), s.id))
                .collect();
            self.catalog.insert(pipeline.id, Arc::new(index)).await;
        }
        tracing::info!("Status catalog rebuilt: {} pipeline(s)", pipelines.len());

        match self.catalog.get(&pipeline_id).await {
            Some(statuses) => Ok(statuses.get(&wanted).copied()),
            None => {
                tracing::warn!("Pipeline {} absent from AmoCRM catalog", pipeline_id);
                Ok(None)
            }
        }
    }
}
