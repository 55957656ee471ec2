pub mod cache_service;
pub mod ingestion_service;
pub mod job_store;
pub mod job_transform;
pub mod pagination_service;
pub mod producer_service;
pub mod scheduler_service;
