use crate::models::ResumoComissao;
use chrono::NaiveDateTime;
use dashmap::DashMap;
use std::time::{Duration, Instant};

type Janela = (NaiveDateTime, NaiveDateTime);

/// 佣金汇总缓存: TTL + 版本双重校验.
/// 版本随每次成功合并递增, 金额的正确性优先于缓存新鲜度.
pub struct CacheResumo {
    entradas: DashMap<Janela, Entrada>,
    ttl: Duration,
}

struct Entrada {
    versao: u64,
    criado_em: Instant,
    resumo: ResumoComissao,
}

impl CacheResumo {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entradas: DashMap::new(),
            ttl,
        }
    }

    /// 只有版本一致且未过期才命中
    pub fn obter(&self, janela: &Janela, versao: u64) -> Option<ResumoComissao> {
        {
            let entrada = self.entradas.get(janela)?;
            if entrada.versao == versao && entrada.criado_em.elapsed() < self.ttl {
                return Some(entrada.resumo.clone());
            }
        }
        self.entradas.remove(janela);
        None
    }

    pub fn guardar(&self, janela: Janela, versao: u64, resumo: ResumoComissao) {
        self.entradas.insert(
            janela,
            Entrada {
                versao,
                criado_em: Instant::now(),
                resumo,
            },
        );
    }
}
