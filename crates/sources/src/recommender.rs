//! Rightsizing and idle-resource recommendations from the Recommender API.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::gcp::GcpClient;
use crate::rows::round_to;
use crate::source::RecommendationSource;
use crate::{Error, Recommendation, Result};

const RECOMMENDER_API_URL: &str = "https://recommender.googleapis.com/v1";

/// Recommenders consulted, in order.
const RECOMMENDERS: [&str; 3] = [
    "google.compute.instance.MachineTypeRecommender",
    "google.compute.instance.IdleResourceRecommender",
    "google.compute.disk.IdleResourceRecommender",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRecommendationsResponse {
    #[serde(default)]
    recommendations: Vec<ApiRecommendation>,
    #[serde(default)]
    next_page_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRecommendation {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    primary_impact: Option<Impact>,
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Impact {
    #[serde(default)]
    cost_projection: Option<CostProjection>,
}

#[derive(Debug, Deserialize)]
struct CostProjection {
    #[serde(default)]
    cost: Option<Money>,
}

/// `google.type.Money`: whole units as a decimal string plus signed nanos.
#[derive(Debug, Deserialize)]
struct Money {
    #[serde(default)]
    units: String,
    #[serde(default)]
    nanos: i64,
}

impl Money {
    fn amount(&self) -> f64 {
        let units = self.units.parse::<i64>().unwrap_or_default();
        units as f64 + self.nanos as f64 / 1e9
    }
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    overview: Option<Overview>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Overview {
    #[serde(default)]
    resource_name: Option<String>,
}

impl ApiRecommendation {
    /// Projected costs are negative for savings; report savings as positive.
    fn into_row(self, recommender: &str) -> Recommendation {
        let cost = self
            .primary_impact
            .and_then(|i| i.cost_projection)
            .and_then(|p| p.cost)
            .map(|m| m.amount())
            .unwrap_or_default();

        Recommendation {
            name: self.name,
            description: self.description,
            recommender_id: recommender.to_string(),
            resource: self.content.and_then(|c| c.overview).and_then(|o| o.resource_name),
            // `+ 0.0` folds -0.0 into 0.0
            est_savings_monthly: round_to(-cost, 2) + 0.0,
        }
    }
}

/// [`RecommendationSource`] over the Recommender REST API.
pub struct CloudRecommender {
    client: Arc<GcpClient>,
}

impl CloudRecommender {
    pub fn new(client: Arc<GcpClient>) -> Self {
        Self { client }
    }

    async fn list(&self, recommender: &str) -> Result<Vec<Recommendation>> {
        let parent = format!(
            "projects/{}/locations/global/recommenders/{recommender}",
            self.client.project_id()
        );
        let base = format!("{RECOMMENDER_API_URL}/{parent}/recommendations");
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = reqwest::Url::parse_with_params(
                &base,
                page_token.as_deref().map(|token| ("pageToken", token)),
            )
            .map_err(|e| Error::Config(e.to_string()))?;

            let page: ListRecommendationsResponse =
                self.client.get_json("recommender", url).await?;
            out.extend(
                page.recommendations
                    .into_iter()
                    .map(|r| r.into_row(recommender)),
            );

            if page.next_page_token.is_empty() {
                break;
            }
            page_token = Some(page.next_page_token);
        }

        debug!(recommender, count = out.len(), "fetched recommendations");
        Ok(out)
    }
}

impl RecommendationSource for CloudRecommender {
    async fn recommendations(&self, limit: u32) -> Result<Vec<Recommendation>> {
        let mut all = Vec::new();
        for recommender in RECOMMENDERS {
            match self.list(recommender).await {
                Ok(rows) => all.extend(rows),
                Err(e) => warn!(recommender, error = %e, "skipping recommender"),
            }
        }
        Ok(rank(all, limit))
    }
}

/// Largest savings first, at most `limit` rows.
fn rank(mut rows: Vec<Recommendation>, limit: u32) -> Vec<Recommendation> {
    rows.sort_by(|a, b| b.est_savings_monthly.total_cmp(&a.est_savings_monthly));
    rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    rows
}
