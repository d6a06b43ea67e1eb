use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub comissao: ComissaoConfig,
    pub dados: DadosConfig,
    /// 上传接口的 Bearer token
    pub api_token: String,
    /// 佣金汇总缓存 TTL (秒); 任何合并成功即失效
    pub cache_ttl_segundos: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 同步周期参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub intervalo_segundos: u64,
    /// 并行下载上限
    pub max_downloads: usize,
    /// 单文件下载超时 (秒)
    pub timeout_segundos: u64,
    /// 协作方失败的重试次数
    pub tentativas: u32,
    /// 指数退避的起始等待 (毫秒)
    pub backoff_inicial_ms: u64,
}

/// 佣金规则: 全部可外部调整, 不写死在计算逻辑里
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComissaoConfig {
    pub percentual_kit_ar: f64,
    pub percentual_pecas_avulsas: f64,
    /// 每达成一档销售额发放的奖金
    pub valor_por_bonus: f64,
    /// 奖金档位宽度
    pub faixa_bonus: f64,
    /// 月度目标
    pub meta_mensal: f64,
    /// 达标一次性奖励
    pub premio_meta: f64,
}

/// 数据文件路径
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DadosConfig {
    pub estados_csv: String,
    pub municipios_csv: String,
    /// 本地同步目录 (.xlsx)
    pub diretorio_pedidos: String,
    /// 指纹持久化文件
    pub arquivo_fingerprints: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            sync: SyncConfig::default(),
            comissao: ComissaoConfig::default(),
            dados: DadosConfig::default(),
            api_token: "seu_token_secreto".to_string(),
            cache_ttl_segundos: 60,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            intervalo_segundos: 300,
            max_downloads: 5,
            timeout_segundos: 60,
            tentativas: 3,
            backoff_inicial_ms: 500,
        }
    }
}

impl Default for ComissaoConfig {
    fn default() -> Self {
        Self {
            percentual_kit_ar: 0.007,
            percentual_pecas_avulsas: 0.005,
            valor_por_bonus: 200.0,
            faixa_bonus: 50_000.0,
            meta_mensal: 200_000.0,
            premio_meta: 600.0,
        }
    }
}

impl Default for DadosConfig {
    fn default() -> Self {
        Self {
            estados_csv: "estados.csv".to_string(),
            municipios_csv: "municipios.csv".to_string(),
            diretorio_pedidos: "pedidos".to_string(),
            arquivo_fingerprints: "arquivos_processados.json".to_string(),
        }
    }
}

impl AppConfig {
    /// 加载配置: 可选 config.toml 叠加 PEDIDO__ 前缀环境变量
    pub fn carregar() -> crate::error::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("PEDIDO").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}
