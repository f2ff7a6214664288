// src/ingest/scrapers/mod.rs
pub mod fixture;
pub mod http_bridge;
