use chrono::NaiveDateTime;
use serde::Serialize;

/// 产品三分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoriaProduto {
    KitsAr,
    KitsRosca,
    PecasAvulsas,
}

impl CategoriaProduto {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KitsAr => "KITS AR",
            Self::KitsRosca => "KITS ROSCA",
            Self::PecasAvulsas => "PEÇAS AVULSAS",
        }
    }
}

/// 一个结算期的佣金汇总; 每次查询重算, 不跨查询缓存金额
#[derive(Debug, Clone, Serialize)]
pub struct ResumoComissao {
    pub inicio: NaiveDateTime,
    pub fim: NaiveDateTime,
    pub pedidos_unicos: usize,
    pub valor_kit_ar: f64,
    pub valor_pecas_avulsas: f64,
    pub valor_total_vendido: f64,
    pub comissao_kit_ar: f64,
    pub comissao_pecas_avulsas: f64,
    pub bonus: f64,
    pub premio_meta: f64,
    pub meta_atingida: bool,
    pub ganhos_totais: f64,
}
