pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod store;

pub use config::AppConfig;
pub use error::{PipelineError, Result};
pub use service::geocoder::Geocoder;
pub use service::ingest::{FonteArquivos, FonteDiretorio, IngestService};
pub use store::{CacheResumo, MasterStore};
