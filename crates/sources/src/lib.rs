//! Cloud cost and VM health data sources for CloudLens.
//!
//! This crate provides read-only access to the data the dashboard and the
//! chat agent report on: billing totals from the BigQuery billing export and
//! fleet health from Cloud Monitoring, with a Firestore document acting as a
//! cache for the headline tiles. Savings suggestions come from the
//! Recommender API.
//!
//! # Overview
//!
//! Consumers depend on three traits:
//!
//! - [`BillingSource`]: month-to-date costs, daily trend, top services.
//! - [`MetricsSource`]: tiles summary, CPU and traffic time series.
//! - [`RecommendationSource`]: rightsizing and idle-resource savings.
//!
//! [`BigQueryBilling`], [`CloudMetrics`] and [`CloudRecommender`] implement
//! them against the GCP REST APIs through a shared [`GcpClient`]. Tests
//! substitute their own implementations.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sources::{BigQueryBilling, BillingSource, GcpAuth, GcpClient, GcpConfig, MtdCost};
//!
//! # async fn example() -> sources::Result<()> {
//! let config = GcpConfig {
//!     project_id: "acme-prod".into(),
//!     ..Default::default()
//! };
//! let client = Arc::new(GcpClient::new(config, GcpAuth::MetadataServer));
//! let billing = BigQueryBilling::new(client);
//!
//! let rows = billing.mtd_costs().await?;
//! println!("month to date: ${:.2}", MtdCost::total(&rows));
//! # Ok(())
//! # }
//! ```

mod bigquery;
mod error;
mod firestore;
mod gcp;
mod monitoring;
mod recommender;
mod rows;
mod source;

pub use bigquery::BigQueryBilling;
pub use error::{Error, Result};
pub use gcp::{GcpAuth, GcpClient, GcpConfig};
pub use monitoring::CloudMetrics;
pub use recommender::CloudRecommender;
pub use rows::{
    CpuSeries, DailyCost, MtdCost, Recommendation, ServiceCost, TilesSummary, TrafficSeries,
};
pub use source::{BillingSource, MetricsSource, RecommendationSource};
