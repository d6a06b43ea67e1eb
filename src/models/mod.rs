pub mod comissao;
pub mod gazetteer;
pub mod pedido;

pub use comissao::{CategoriaProduto, ResumoComissao};
pub use gazetteer::{normalizar_texto, Estado, Gazetteer, Municipio};
pub use pedido::{ArquivoSincronizado, ChavePedido, Fingerprint, Pedido, RegistroSync};
