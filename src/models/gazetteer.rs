use crate::error::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// 文本规范化: NFD 分解去掉重音符号, 去空白, 转大写
pub fn normalizar_texto(texto: &str) -> String {
    texto
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_uppercase()
}

/// municipios.csv 行 (名称, 所属州代码, 质心坐标)
#[derive(Debug, Clone, Deserialize)]
pub struct Municipio {
    pub nome: String,
    pub codigo_uf: i32,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip)]
    pub nome_normalizado: String,
}

/// estados.csv 行 (代码, 缩写, 质心坐标)
#[derive(Debug, Clone, Deserialize)]
pub struct Estado {
    pub codigo_uf: i32,
    pub uf: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip)]
    pub uf_normalizado: String,
}

/// 地名参照表: 启动时加载一次, 进程生命周期内只读
#[derive(Debug)]
pub struct Gazetteer {
    pub municipios: Vec<Municipio>,
    pub estados: Vec<Estado>,
    particoes_uf: HashMap<i32, Vec<usize>>,
    codigos_uf: HashMap<String, i32>,
}

impl Gazetteer {
    /// 从两张 CSV 参照表加载
    pub fn carregar(estados_csv: &Path, municipios_csv: &Path) -> Result<Self> {
        let mut estados = Vec::new();
        let mut leitor = csv::Reader::from_path(estados_csv)?;
        for linha in leitor.deserialize() {
            let estado: Estado = linha?;
            estados.push(estado);
        }

        let mut municipios = Vec::new();
        let mut leitor = csv::Reader::from_path(municipios_csv)?;
        for linha in leitor.deserialize() {
            let municipio: Municipio = linha?;
            municipios.push(municipio);
        }

        Ok(Self::montar(estados, municipios))
    }

    /// 规范化名称并构建按州分区的索引
    pub fn montar(mut estados: Vec<Estado>, mut municipios: Vec<Municipio>) -> Self {
        for estado in &mut estados {
            estado.uf_normalizado = normalizar_texto(&estado.uf);
        }
        for municipio in &mut municipios {
            municipio.nome_normalizado = normalizar_texto(&municipio.nome);
        }

        let mut particoes_uf: HashMap<i32, Vec<usize>> = HashMap::new();
        for (i, municipio) in municipios.iter().enumerate() {
            particoes_uf.entry(municipio.codigo_uf).or_default().push(i);
        }

        let codigos_uf = estados
            .iter()
            .map(|e| (e.uf_normalizado.clone(), e.codigo_uf))
            .collect();

        Self {
            municipios,
            estados,
            particoes_uf,
            codigos_uf,
        }
    }

    /// 规范化缩写 -> 州代码
    pub fn codigo_uf(&self, uf_normalizado: &str) -> Option<i32> {
        self.codigos_uf.get(uf_normalizado).copied()
    }

    /// 某州的市镇分区 (municipios 的下标)
    pub fn particao(&self, codigo_uf: i32) -> &[usize] {
        self.particoes_uf
            .get(&codigo_uf)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn estado_por_codigo(&self, codigo_uf: i32) -> Option<&Estado> {
        self.estados.iter().find(|e| e.codigo_uf == codigo_uf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normaliza_acentos_e_caixa() {
        assert_eq!(normalizar_texto("  São Paulo  "), "SAO PAULO");
        assert_eq!(normalizar_texto("Brasília"), "BRASILIA");
        assert_eq!(normalizar_texto(""), "");
    }

    #[test]
    fn monta_particoes_por_uf() {
        let estados = vec![Estado {
            codigo_uf: 35,
            uf: "SP".into(),
            latitude: -23.5,
            longitude: -46.6,
            uf_normalizado: String::new(),
        }];
        let municipios = vec![
            Municipio {
                nome: "São Paulo".into(),
                codigo_uf: 35,
                latitude: -23.55,
                longitude: -46.63,
                nome_normalizado: String::new(),
            },
            Municipio {
                nome: "Santos".into(),
                codigo_uf: 35,
                latitude: -23.96,
                longitude: -46.33,
                nome_normalizado: String::new(),
            },
        ];
        let gazetteer = Gazetteer::montar(estados, municipios);
        assert_eq!(gazetteer.codigo_uf("SP"), Some(35));
        assert_eq!(gazetteer.particao(35).len(), 2);
        assert!(gazetteer.particao(33).is_empty());
        assert_eq!(gazetteer.municipios[0].nome_normalizado, "SAO PAULO");
    }
}
