use chrono::Utc;

use crate::error::Result;
use crate::models::{CollectionKind, StatsSnapshot};
use crate::rag::retrieval::deal_amount;
use crate::rag::store::CollectionStore;

impl CollectionStore {
    /// Collection sizes plus deal aggregates from a single read of `deals`.
    pub async fn stats(&self) -> Result<StatsSnapshot> {
        let minerals = self.count(CollectionKind::Minerals).await?;
        let deals = self.count(CollectionKind::Deals).await?;
        let kyc = self.count(CollectionKind::Kyc).await?;

        let deal_docs = self.get_all(CollectionKind::Deals).await?;
        let deals_value_usd: f64 = deal_docs.iter().map(|doc| deal_amount(&doc.attributes)).sum();
        let confirmed_deals = deal_docs
            .iter()
            .filter(|doc| doc.attributes.get_str("status") == Some("confirmed"))
            .count();
        let deals_avg_value = if deal_docs.is_empty() {
            0.0
        } else {
            deals_value_usd / deal_docs.len() as f64
        };

        tracing::debug!(
            "Stats for {}: minerals={} deals={} kyc={}",
            self.environment(),
            minerals,
            deals,
            kyc
        );

        Ok(StatsSnapshot {
            minerals,
            deals,
            kyc,
            total_vectors: minerals + deals + kyc,
            status: "healthy".to_string(),
            last_updated: Utc::now(),
            environment: self.environment(),
            deals_value_usd,
            confirmed_deals,
            deals_avg_value,
        })
    }
}
