use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 订单行记录: 一张订单的一个产品行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pedido {
    /// 订单号; 单元格不可读时为 "Desconhecido"
    pub numero_pedido: String,
    pub data: NaiveDate,
    pub cliente: String,
    pub telefone: String,
    pub cidade: String,
    pub estado: String,
    pub produto: String,
    pub quantidade: f64,
    /// 订单级合计在有效产品行之间平摊后的份额
    pub valor_total: f64,
    pub arquivo_origem: String,
    pub data_upload: DateTime<Utc>,
}

/// 去重键: (订单号, 规范化产品描述)
pub type ChavePedido = (String, String);

impl Pedido {
    pub fn chave(&self) -> ChavePedido {
        (
            self.numero_pedido.clone(),
            self.produto.trim().to_uppercase(),
        )
    }

    /// 业务字段一致即视为同一内容 (来源文件和上传时间不参与比较)
    pub fn mesmo_conteudo(&self, outro: &Pedido) -> bool {
        self.numero_pedido == outro.numero_pedido
            && self.data == outro.data
            && self.cliente == outro.cliente
            && self.telefone == outro.telefone
            && self.cidade == outro.cidade
            && self.estado == outro.estado
            && self.produto == outro.produto
            && self.quantidade == outro.quantidade
            && self.valor_total == outro.valor_total
    }
}

/// 已处理文件的指纹: 签名变化即触发重新处理
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub assinatura: String,
    pub processado_em: DateTime<Utc>,
}

/// 每次合并写入一条同步日志
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistroSync {
    pub cliente_id: String,
    pub arquivo: String,
    pub data_sync: DateTime<Utc>,
    pub registros: usize,
}

/// synced_files 接口的按文件聚合行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArquivoSincronizado {
    pub nome: String,
    pub ultima_sync: DateTime<Utc>,
    pub sincronizacoes: usize,
}
