use crate::config::ComissaoConfig;
use crate::models::{CategoriaProduto, Pedido, ResumoComissao};
use chrono::{NaiveDateTime, NaiveTime};
use indexmap::IndexMap;

/// KIT AR 类的固定前缀表 (按产品描述前缀判定)
const KITS_AR: [&str; 13] = [
    "KIT 1",
    "KIT 2",
    "KIT 3",
    "KIT 4",
    "KIT 5",
    "KIT 6",
    "KIT 7",
    "KIT UNIVERSAL",
    "KIT UPGRADE",
    "KIT AIR RIDE 4C",
    "KIT K3",
    "KIT K4",
    "KIT K5",
];

/// 产品三分类: 前缀命中 KIT AR, 含 "KIT ROSCA" 为螺纹套件, 其余散件
pub fn classificar_produto(descricao: &str) -> CategoriaProduto {
    let descricao = descricao.trim().to_uppercase();
    if KITS_AR.iter().any(|kit| descricao.starts_with(kit)) {
        CategoriaProduto::KitsAr
    } else if descricao.contains("KIT ROSCA") {
        CategoriaProduto::KitsRosca
    } else {
        CategoriaProduto::PecasAvulsas
    }
}

/// 结算期佣金计算: 期内过滤 → 按订单重组 → 分类汇总 → 佣金/奖金/达标奖
pub fn calcular_comissoes(
    pedidos: &[Pedido],
    inicio: NaiveDateTime,
    fim: NaiveDateTime,
    cfg: &ComissaoConfig,
) -> ResumoComissao {
    // 1. 期内过滤
    let janela = pedidos.iter().filter(|p| {
        let data = p.data.and_time(NaiveTime::MIN);
        data >= inicio && data <= fim
    });

    // 2. 按订单号重组, 行级再按去重键收敛:
    //    订单合计只计一次, 即使输入不是去重后的主记录集
    let mut por_pedido: IndexMap<&str, IndexMap<String, &Pedido>> = IndexMap::new();
    for pedido in janela {
        por_pedido
            .entry(pedido.numero_pedido.as_str())
            .or_default()
            .insert(pedido.produto.trim().to_uppercase(), pedido);
    }

    // 3. 分类汇总
    let mut valor_kit_ar = 0.0f64;
    let mut valor_pecas_avulsas = 0.0f64;
    for linhas in por_pedido.values() {
        for pedido in linhas.values() {
            match classificar_produto(&pedido.produto) {
                CategoriaProduto::KitsAr => valor_kit_ar += pedido.valor_total,
                CategoriaProduto::KitsRosca | CategoriaProduto::PecasAvulsas => {
                    valor_pecas_avulsas += pedido.valor_total
                }
            }
        }
    }
    let valor_total_vendido = valor_kit_ar + valor_pecas_avulsas;

    // 4. 佣金 + 奖金档 + 达标奖
    let comissao_kit_ar = valor_kit_ar * cfg.percentual_kit_ar;
    let comissao_pecas_avulsas = valor_pecas_avulsas * cfg.percentual_pecas_avulsas;
    let bonus = (valor_total_vendido / cfg.faixa_bonus).floor() * cfg.valor_por_bonus;
    let meta_atingida = valor_total_vendido >= cfg.meta_mensal;
    let premio_meta = if meta_atingida { cfg.premio_meta } else { 0.0 };
    let ganhos_totais = comissao_kit_ar + comissao_pecas_avulsas + bonus + premio_meta;

    ResumoComissao {
        inicio,
        fim,
        pedidos_unicos: por_pedido.len(),
        valor_kit_ar,
        valor_pecas_avulsas,
        valor_total_vendido,
        comissao_kit_ar,
        comissao_pecas_avulsas,
        bonus,
        premio_meta,
        meta_atingida,
        ganhos_totais,
    }
}
