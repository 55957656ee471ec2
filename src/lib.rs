pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::{Config, IngestionSettings};
use crate::error::Result;
use crate::services::{
    cache_service::FreshnessCache,
    ingestion_service::IngestionService,
    job_store::{JobStore, PgJobStore},
    pagination_service::PaginationService,
    producer_service::{GeminiProducer, JobProducer},
    scheduler_service::IngestionScheduler,
};
use crate::utils::time::{Clock, SystemClock};
use reqwest::Client;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub ingestion: IngestionService,
    pub scheduler: IngestionScheduler,
    pub generated_jobs: PaginationService,
    pub admin_secret: Option<String>,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        let settings = config.ingestion.clone();
        let http_client = Client::builder()
            .timeout(settings.producer_timeout)
            .build()?;

        let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));
        let gemini = GeminiProducer::new(
            http_client,
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_base_url.clone(),
            settings.producer_timeout,
        );
        if !gemini.is_configured() {
            tracing::warn!(
                "GEMINI_API_KEY is not set; job generation will fail until it is configured"
            );
        }
        let producer: Arc<dyn JobProducer> = Arc::new(gemini);

        Ok(Self::from_parts(
            store,
            producer,
            Arc::new(SystemClock),
            settings,
            config.admin_secret.clone(),
        ))
    }

    /// Wires the services around an arbitrary store, producer and clock.
    pub fn from_parts(
        store: Arc<dyn JobStore>,
        producer: Arc<dyn JobProducer>,
        clock: Arc<dyn Clock>,
        settings: IngestionSettings,
        admin_secret: Option<String>,
    ) -> Self {
        let ingestion = IngestionService::new(
            store,
            producer.clone(),
            clock.clone(),
            settings.scheduled_batch_size,
            settings.producer_timeout,
        );
        let generated_jobs = PaginationService::new(
            producer,
            FreshnessCache::new(settings.cache_ttl, clock.clone()),
            clock,
            settings.page_batch_size,
            settings.producer_timeout,
        );
        let scheduler = IngestionScheduler::new(ingestion.clone(), settings);

        Self {
            ingestion,
            scheduler,
            generated_jobs,
            admin_secret,
        }
    }
}
