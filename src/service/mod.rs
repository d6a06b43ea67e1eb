pub mod clientes;
pub mod comissao;
pub mod extractor;
pub mod geocoder;
pub mod ingest;
pub mod periodo;

pub use comissao::{calcular_comissoes, classificar_produto};
pub use extractor::{extrair, ler_grade, ErroExtracao};
pub use geocoder::Geocoder;
pub use ingest::{FonteArquivos, FonteDiretorio, IngestService};
