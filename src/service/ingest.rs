use crate::config::SyncConfig;
use crate::error::{PipelineError, Result};
use crate::service::extractor::{self, ErroExtracao};
use crate::store::{MasterStore, ResultadoMerge};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};
use tokio::time::{sleep, timeout};

/// 远端文件条目: 名称 + 协作方提供的不透明签名
#[derive(Debug, Clone)]
pub struct ArquivoRemoto {
    pub nome: String,
    pub assinatura: String,
}

/// 文件来源协作方: 流水线只消费字节流和签名, 不关心传输协议
#[async_trait]
pub trait FonteArquivos: Send + Sync {
    async fn listar(&self) -> Result<Vec<ArquivoRemoto>>;
    async fn baixar(&self, nome: &str) -> Result<Vec<u8>>;
}

/// 本地目录来源: 签名 = 大小-修改时间
pub struct FonteDiretorio {
    dir: PathBuf,
}

impl FonteDiretorio {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FonteArquivos for FonteDiretorio {
    async fn listar(&self) -> Result<Vec<ArquivoRemoto>> {
        let mut entradas = tokio::fs::read_dir(&self.dir).await?;
        let mut arquivos = Vec::new();
        while let Some(entrada) = entradas.next_entry().await? {
            let nome = entrada.file_name().to_string_lossy().to_string();
            if !nome.ends_with(".xlsx") {
                continue;
            }
            let meta = entrada.metadata().await?;
            let mtime = meta
                .modified()?
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            arquivos.push(ArquivoRemoto {
                nome,
                assinatura: format!("{}-{}", meta.len(), mtime),
            });
        }
        Ok(arquivos)
    }

    async fn baixar(&self, nome: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.dir.join(nome)).await?)
    }
}

/// 上传内容的签名 (SHA-256)
pub fn assinatura_conteudo(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// 同步周期状态: 任何协作方失败都只降级, 不丢已合并数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusSync {
    Completo,
    Degradado,
}

/// 一次同步周期的汇总
#[derive(Debug, Clone, Serialize)]
pub struct ResumoSync {
    pub status: StatusSync,
    pub processados: usize,
    pub ignorados: usize,
    pub rejeitados: usize,
    pub falhas: usize,
    pub registros: usize,
}

impl ResumoSync {
    fn vazio(status: StatusSync) -> Self {
        Self {
            status,
            processados: 0,
            ignorados: 0,
            rejeitados: 0,
            falhas: 0,
            registros: 0,
        }
    }
}

/// 上传处理结果: 提取被拒 (调用方回 400) 与已合并区分开
pub enum ResultadoUpload {
    Ingerido(ResultadoMerge),
    Rejeitado(ErroExtracao),
}

enum ResultadoArquivo {
    Extraido(ArquivoRemoto, Vec<crate::models::Pedido>),
    Rejeitado(String, ErroExtracao),
    Falha(String),
}

/// 摄取服务: 列举 → 指纹短路 → 并行下载+提取 → 串行合并
pub struct IngestService {
    store: MasterStore,
    config: SyncConfig,
}

impl IngestService {
    pub fn new(store: MasterStore, config: SyncConfig) -> Self {
        Self { store, config }
    }

    /// 一个完整的同步周期; 独立来源并行处理, 合并在写者任务里串行
    pub async fn sincronizar(&self, fonte: &dyn FonteArquivos, cliente_id: &str) -> ResumoSync {
        let arquivos = match self.listar_com_retry(fonte).await {
            Ok(arquivos) => arquivos,
            Err(erro) => {
                tracing::error!("Falha ao listar a fonte, mantendo dados anteriores: {}", erro);
                return ResumoSync::vazio(StatusSync::Degradado);
            }
        };

        let mut resumo = ResumoSync::vazio(StatusSync::Completo);

        // 指纹未变的文件在下载之前就短路
        let mut pendentes = Vec::new();
        for arquivo in arquivos {
            match self
                .store
                .ja_processado(&arquivo.nome, &arquivo.assinatura)
                .await
            {
                Ok(true) => resumo.ignorados += 1,
                Ok(false) => pendentes.push(arquivo),
                Err(erro) => {
                    tracing::error!("Store indisponível, abortando ciclo: {}", erro);
                    resumo.status = StatusSync::Degradado;
                    return resumo;
                }
            }
        }

        let total = pendentes.len();
        if total > 0 {
            tracing::info!("同步开始: {} 个文件待处理, {} 个未变跳过", total, resumo.ignorados);
        }

        let mut fluxo = stream::iter(pendentes)
            .map(|arquivo| self.processar_arquivo(fonte, arquivo))
            .buffer_unordered(self.config.max_downloads.max(1));

        while let Some(resultado) = fluxo.next().await {
            match resultado {
                ResultadoArquivo::Extraido(arquivo, pedidos) => {
                    match self
                        .store
                        .merge(&arquivo.nome, &arquivo.assinatura, cliente_id, pedidos)
                        .await
                    {
                        Ok(merge) => {
                            resumo.processados += 1;
                            resumo.registros += merge.registros;
                            tracing::info!(
                                "Arquivo {} mesclado: {} registros, {} conflitos",
                                arquivo.nome,
                                merge.registros,
                                merge.conflitos
                            );
                        }
                        Err(erro) => {
                            tracing::error!("Merge de {} falhou: {}", arquivo.nome, erro);
                            resumo.falhas += 1;
                            resumo.status = StatusSync::Degradado;
                        }
                    }
                }
                ResultadoArquivo::Rejeitado(nome, motivo) => {
                    tracing::warn!("Arquivo {} rejeitado: {}", nome, motivo);
                    resumo.rejeitados += 1;
                }
                ResultadoArquivo::Falha(nome) => {
                    tracing::error!("Arquivo {} esgotou as tentativas", nome);
                    resumo.falhas += 1;
                    resumo.status = StatusSync::Degradado;
                }
            }
        }

        resumo
    }

    /// 展示层直接上传的单个文件
    pub async fn processar_upload(
        &self,
        nome: &str,
        bytes: &[u8],
        cliente_id: &str,
    ) -> Result<ResultadoUpload> {
        let assinatura = assinatura_conteudo(bytes);
        let extracao =
            extractor::ler_grade(bytes).and_then(|grade| extractor::extrair(&grade, nome, Utc::now()));
        match extracao {
            Ok(pedidos) => {
                let merge = self.store.merge(nome, &assinatura, cliente_id, pedidos).await?;
                Ok(ResultadoUpload::Ingerido(merge))
            }
            Err(motivo) => Ok(ResultadoUpload::Rejeitado(motivo)),
        }
    }

    async fn processar_arquivo(
        &self,
        fonte: &dyn FonteArquivos,
        arquivo: ArquivoRemoto,
    ) -> ResultadoArquivo {
        let bytes = match self.baixar_com_retry(fonte, &arquivo.nome).await {
            Ok(bytes) => bytes,
            Err(erro) => {
                tracing::error!("Download de {} falhou: {}", arquivo.nome, erro);
                return ResultadoArquivo::Falha(arquivo.nome);
            }
        };
        let extracao = extractor::ler_grade(&bytes)
            .and_then(|grade| extractor::extrair(&grade, &arquivo.nome, Utc::now()));
        match extracao {
            Ok(pedidos) => ResultadoArquivo::Extraido(arquivo, pedidos),
            Err(motivo) => ResultadoArquivo::Rejeitado(arquivo.nome, motivo),
        }
    }

    async fn listar_com_retry(&self, fonte: &dyn FonteArquivos) -> Result<Vec<ArquivoRemoto>> {
        self.com_retry("listagem", || fonte.listar()).await
    }

    async fn baixar_com_retry(&self, fonte: &dyn FonteArquivos, nome: &str) -> Result<Vec<u8>> {
        self.com_retry(nome, || fonte.baixar(nome)).await
    }

    /// 有界重试 + 指数退避 + 单次超时: 一个不可达的来源拖不垮整个周期
    async fn com_retry<T, F, Fut>(&self, alvo: &str, mut operacao: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let limite = Duration::from_secs(self.config.timeout_segundos);
        let mut espera = Duration::from_millis(self.config.backoff_inicial_ms);
        let tentativas = self.config.tentativas.max(1);
        let mut ultimo_erro = None;

        for tentativa in 1..=tentativas {
            match timeout(limite, operacao()).await {
                Ok(Ok(valor)) => return Ok(valor),
                Ok(Err(erro)) => {
                    tracing::warn!("Tentativa {}/{} de {} falhou: {}", tentativa, tentativas, alvo, erro);
                    ultimo_erro = Some(erro);
                }
                Err(_) => {
                    tracing::warn!(
                        "Tentativa {}/{} de {} excedeu {}s",
                        tentativa,
                        tentativas,
                        alvo,
                        limite.as_secs()
                    );
                    ultimo_erro = Some(PipelineError::Fonte(format!(
                        "timeout após {}s",
                        limite.as_secs()
                    )));
                }
            }
            if tentativa < tentativas {
                sleep(espera).await;
                espera *= 2;
            }
        }

        Err(ultimo_erro.unwrap_or_else(|| PipelineError::Fonte("sem tentativas".to_string())))
    }
}
