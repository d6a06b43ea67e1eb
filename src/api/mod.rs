pub mod handlers;

pub use handlers::*;

use crate::config::AppConfig;
use crate::service::geocoder::Geocoder;
use crate::service::ingest::IngestService;
use crate::store::{CacheResumo, MasterStore};
use std::sync::Arc;

/// 共享状态: 配置 + 存储句柄 + 各查询服务
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: MasterStore,
    pub ingest: Arc<IngestService>,
    pub geocoder: Arc<Geocoder>,
    pub cache: Arc<CacheResumo>,
}
