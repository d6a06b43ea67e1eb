use crate::models::{normalizar_texto, Gazetteer, Municipio};
use std::sync::Arc;

/// 巴西地理中心, 州也无法识别时的兜底坐标
pub const CENTRO_NACIONAL: (f64, f64) = (-15.7801, -47.9292);

/// 模糊匹配接受阈值 (0-100)
pub const LIMIAR_SIMILARIDADE: f64 = 70.0;

/// 解析精度, 按回退层级递减
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precisao {
    Cidade,
    Estado,
    Pais,
}

/// 地理解析结果
#[derive(Debug, Clone)]
pub struct LocalResolvido {
    pub cidade_corrigida: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub precisao: Precisao,
}

/// 忽略词序的相似度: token 排序后的归一化编辑距离, 0-100
pub fn razao_token_sort(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&ordenar_tokens(a), &ordenar_tokens(b)) * 100.0
}

fn ordenar_tokens(texto: &str) -> String {
    let mut tokens: Vec<&str> = texto.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// 把自由文本的 (cidade, estado) 解析为坐标
pub struct Geocoder {
    gazetteer: Arc<Gazetteer>,
}

impl Geocoder {
    pub fn new(gazetteer: Arc<Gazetteer>) -> Self {
        Self { gazetteer }
    }

    /// 四级回退: 州内模糊匹配 → 全国匹配(州校验) → 州质心 → 全国质心
    pub fn resolver(&self, cidade: &str, estado: &str) -> LocalResolvido {
        let cidade_norm = normalizar_texto(cidade);
        let codigo_uf = self.gazetteer.codigo_uf(&normalizar_texto(estado));

        if !cidade_norm.is_empty() && cidade_norm != "DESCONHECIDO" {
            // 1. 只在给定州的分区里找, 避免同名城市跨州误配
            if let Some(codigo) = codigo_uf {
                let particao = self
                    .gazetteer
                    .particao(codigo)
                    .iter()
                    .map(|&i| &self.gazetteer.municipios[i]);
                if let Some(municipio) = melhor_municipio(&cidade_norm, particao) {
                    return local_de(municipio);
                }
            }

            // 2. 全国范围匹配; 州对不上宁可放弃这个匹配
            if let Some(municipio) = melhor_municipio(&cidade_norm, self.gazetteer.municipios.iter())
            {
                if codigo_uf.map_or(true, |codigo| codigo == municipio.codigo_uf) {
                    return local_de(municipio);
                }
            }
        }

        // 3. 州质心
        if let Some(estado) = codigo_uf.and_then(|c| self.gazetteer.estado_por_codigo(c)) {
            return LocalResolvido {
                cidade_corrigida: None,
                latitude: estado.latitude,
                longitude: estado.longitude,
                precisao: Precisao::Estado,
            };
        }

        // 4. 全国质心
        LocalResolvido {
            cidade_corrigida: None,
            latitude: CENTRO_NACIONAL.0,
            longitude: CENTRO_NACIONAL.1,
            precisao: Precisao::Pais,
        }
    }
}

fn local_de(municipio: &Municipio) -> LocalResolvido {
    LocalResolvido {
        cidade_corrigida: Some(municipio.nome_normalizado.clone()),
        latitude: municipio.latitude,
        longitude: municipio.longitude,
        precisao: Precisao::Cidade,
    }
}

/// 阈值以上得分最高的市镇; 平分时保留参照表顺序里的第一个
fn melhor_municipio<'a>(
    cidade_norm: &str,
    candidatos: impl Iterator<Item = &'a Municipio>,
) -> Option<&'a Municipio> {
    let mut melhor: Option<(&Municipio, f64)> = None;
    for municipio in candidatos {
        let score = razao_token_sort(cidade_norm, &municipio.nome_normalizado);
        if score >= LIMIAR_SIMILARIDADE && melhor.map_or(true, |(_, s)| score > s) {
            melhor = Some((municipio, score));
        }
    }
    melhor.map(|(municipio, _)| municipio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Estado;

    fn gazetteer_fixa() -> Arc<Gazetteer> {
        let estados = vec![
            Estado {
                codigo_uf: 35,
                uf: "SP".into(),
                latitude: -23.55,
                longitude: -46.64,
                uf_normalizado: String::new(),
            },
            Estado {
                codigo_uf: 33,
                uf: "RJ".into(),
                latitude: -22.91,
                longitude: -43.21,
                uf_normalizado: String::new(),
            },
        ];
        let municipios = vec![
            Municipio {
                nome: "São Paulo".into(),
                codigo_uf: 35,
                latitude: -23.5505,
                longitude: -46.6333,
                nome_normalizado: String::new(),
            },
            Municipio {
                nome: "Santos".into(),
                codigo_uf: 35,
                latitude: -23.9608,
                longitude: -46.3336,
                nome_normalizado: String::new(),
            },
            Municipio {
                nome: "Volta Redonda".into(),
                codigo_uf: 33,
                latitude: -22.5202,
                longitude: -44.0996,
                nome_normalizado: String::new(),
            },
        ];
        Arc::new(Gazetteer::montar(estados, municipios))
    }

    #[test]
    fn corrige_grafia_dentro_do_estado() {
        let geocoder = Geocoder::new(gazetteer_fixa());
        let local = geocoder.resolver("Sao Pualo", "SP");
        assert_eq!(local.precisao, Precisao::Cidade);
        assert_eq!(local.cidade_corrigida.as_deref(), Some("SAO PAULO"));
        assert!((local.latitude - -23.5505).abs() < 1e-9);
    }

    #[test]
    fn ignora_ordem_das_palavras() {
        let geocoder = Geocoder::new(gazetteer_fixa());
        let local = geocoder.resolver("Redonda Volta", "RJ");
        assert_eq!(local.cidade_corrigida.as_deref(), Some("VOLTA REDONDA"));
    }

    #[test]
    fn sem_estado_aceita_match_nacional() {
        let geocoder = Geocoder::new(gazetteer_fixa());
        let local = geocoder.resolver("Santos", "");
        assert_eq!(local.precisao, Precisao::Cidade);
        assert_eq!(local.cidade_corrigida.as_deref(), Some("SANTOS"));
    }

    #[test]
    fn descarta_match_de_outro_estado() {
        // Volta Redonda 只在 RJ; 给了 SP 就退回州质心
        let geocoder = Geocoder::new(gazetteer_fixa());
        let local = geocoder.resolver("Volta Redonda", "SP");
        assert_eq!(local.precisao, Precisao::Estado);
        assert!(local.cidade_corrigida.is_none());
        assert!((local.latitude - -23.55).abs() < 1e-9);
    }

    #[test]
    fn sem_match_usa_centroide_do_estado() {
        let geocoder = Geocoder::new(gazetteer_fixa());
        let local = geocoder.resolver("Xyzwq", "RJ");
        assert_eq!(local.precisao, Precisao::Estado);
        assert!((local.latitude - -22.91).abs() < 1e-9);
    }

    #[test]
    fn estado_desconhecido_usa_centro_nacional() {
        let geocoder = Geocoder::new(gazetteer_fixa());
        let local = geocoder.resolver("Xyzwq", "ZZ");
        assert_eq!(local.precisao, Precisao::Pais);
        assert!((local.latitude - CENTRO_NACIONAL.0).abs() < 1e-9);
        assert!((local.longitude - CENTRO_NACIONAL.1).abs() < 1e-9);
    }

    #[test]
    fn abaixo_do_limiar_nao_casa() {
        assert!(razao_token_sort("SAO PAULO", "SAO PAULO") >= 99.9);
        assert!(razao_token_sort("PAULO SAO", "SAO PAULO") >= 99.9);
        assert!(razao_token_sort("XYZWQ", "SAO PAULO") < LIMIAR_SIMILARIDADE);
    }
}
