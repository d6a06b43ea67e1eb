use crate::models::Pedido;
use crate::service::geocoder::Geocoder;
use chrono::NaiveDate;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// 地图抖动的固定种子, 保证可重现
const SEMENTE_MAPA: u64 = 42;

/// 抖动上限 (度), 约 200 米
const DESLOCAMENTO_MAX: f64 = 0.002;

/// 客户地图标记: 展示层派生, 坐标抖动不回写主记录
#[derive(Debug, Clone, Serialize)]
pub struct MarcadorCliente {
    pub cliente: String,
    pub telefone: String,
    pub cidade: String,
    pub estado: String,
    pub cidade_corrigida: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub ultima_compra: NaiveDate,
}

/// 每个客户一枚标记, 取最近一单; 同城标记彼此抖开
pub fn vista_mapa(geocoder: &Geocoder, pedidos: &[Pedido]) -> Vec<MarcadorCliente> {
    // 每客户保留最近一单
    let mut por_cliente: IndexMap<&str, &Pedido> = IndexMap::new();
    for pedido in pedidos {
        por_cliente
            .entry(pedido.cliente.as_str())
            .and_modify(|atual| {
                if pedido.data >= atual.data {
                    *atual = pedido;
                }
            })
            .or_insert(pedido);
    }

    let ultimos: Vec<&Pedido> = por_cliente.into_values().collect();
    let mut marcadores: Vec<MarcadorCliente> = ultimos
        .par_iter()
        .map(|pedido| {
            let local = geocoder.resolver(&pedido.cidade, &pedido.estado);
            MarcadorCliente {
                cliente: pedido.cliente.clone(),
                telefone: pedido.telefone.clone(),
                cidade: pedido.cidade.clone(),
                estado: pedido.estado.clone(),
                cidade_corrigida: local.cidade_corrigida,
                latitude: local.latitude,
                longitude: local.longitude,
                ultima_compra: pedido.data,
            }
        })
        .collect();

    // 同一解析位置的标记逐个加有界伪随机偏移, 避免完全重叠
    let mut indices_grupo: HashMap<String, u64> = HashMap::new();
    for marcador in &mut marcadores {
        let grupo = marcador
            .cidade_corrigida
            .clone()
            .unwrap_or_else(|| format!("{:.4},{:.4}", marcador.latitude, marcador.longitude));
        let indice = indices_grupo.entry(grupo.clone()).or_insert(0);
        marcador.latitude += deslocamento(&grupo, *indice, 0);
        marcador.longitude += deslocamento(&grupo, *indice, 1);
        *indice += 1;
    }

    marcadores
}

/// 有界确定性伪随机偏移: 同一 (组, 序号, 轴) 永远得到同一偏移
fn deslocamento(grupo: &str, indice: u64, eixo: u64) -> f64 {
    let mut hasher = DefaultHasher::new();
    (SEMENTE_MAPA, grupo, indice, eixo).hash(&mut hasher);
    let fracao = hasher.finish() as f64 / u64::MAX as f64;
    fracao * 2.0 * DESLOCAMENTO_MAX - DESLOCAMENTO_MAX
}

/// 待挽回客户: 订单数 > 3 且超过 3 个月没有购买
#[derive(Debug, Clone, Serialize)]
pub struct LojistaRecuperar {
    pub cliente: String,
    pub telefone: String,
    pub cidade: String,
    pub estado: String,
    pub num_pedidos: usize,
    pub ultima_compra: NaiveDate,
    pub meses_sem_comprar: i64,
}

pub fn lojistas_a_recuperar(pedidos: &[Pedido], hoje: NaiveDate) -> Vec<LojistaRecuperar> {
    let mut por_cliente: IndexMap<&str, (usize, &Pedido)> = IndexMap::new();
    for pedido in pedidos {
        let entrada = por_cliente
            .entry(pedido.cliente.as_str())
            .or_insert((0, pedido));
        entrada.0 += 1;
        if pedido.data >= entrada.1.data {
            entrada.1 = pedido;
        }
    }

    por_cliente
        .into_iter()
        .filter_map(|(_, (num_pedidos, ultimo))| {
            let meses_sem_comprar = (hoje - ultimo.data).num_days() / 30;
            (num_pedidos > 3 && meses_sem_comprar > 3).then(|| LojistaRecuperar {
                cliente: ultimo.cliente.clone(),
                telefone: ultimo.telefone.clone(),
                cidade: ultimo.cidade.clone(),
                estado: ultimo.estado.clone(),
                num_pedidos,
                ultima_compra: ultimo.data,
                meses_sem_comprar,
            })
        })
        .collect()
}
