pub mod cache;
pub mod master;

pub use cache::CacheResumo;
pub use master::{MasterStore, ResultadoMerge, StatusLoja};
