use crate::error::{PipelineError, Result};
use crate::models::{ArquivoSincronizado, ChavePedido, Fingerprint, Pedido, RegistroSync};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// 一次合并的结果
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ResultadoMerge {
    /// 本次合并携带的订单行数
    pub registros: usize,
    /// 新增的去重键
    pub novos: usize,
    /// 同内容覆盖
    pub substituidos: usize,
    /// 同键不同内容, 按后写覆盖
    pub conflitos: usize,
    /// 指纹未变, 未做任何修改
    pub inalterado: bool,
}

/// 主记录集概览
#[derive(Debug, Clone, Serialize)]
pub struct StatusLoja {
    pub total_registros: usize,
    pub ultima_sincronizacao: Option<DateTime<Utc>>,
    pub total_sincronizacoes: usize,
    pub versao: u64,
}

enum Comando {
    JaProcessado {
        arquivo: String,
        assinatura: String,
        resp: oneshot::Sender<bool>,
    },
    Merge {
        arquivo: String,
        assinatura: String,
        cliente_id: String,
        pedidos: Vec<Pedido>,
        resp: oneshot::Sender<ResultadoMerge>,
    },
    Snapshot {
        resp: oneshot::Sender<(Arc<Vec<Pedido>>, u64)>,
    },
    Status {
        resp: oneshot::Sender<StatusLoja>,
    },
    Sincronizados {
        cliente_id: String,
        resp: oneshot::Sender<Vec<ArquivoSincronizado>>,
    },
}

/// 主记录集句柄: 所有读写都经由唯一写者任务串行执行,
/// 读者看到的是合并前或合并后的快照, 不存在中间状态
#[derive(Clone)]
pub struct MasterStore {
    tx: mpsc::Sender<Comando>,
}

impl MasterStore {
    /// 打开存储并启动写者任务; 指纹文件存在则先恢复
    pub fn abrir(arquivo_fingerprints: Option<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let estado = EstadoLoja::novo(arquivo_fingerprints);
        tokio::spawn(estado.executar(rx));
        Self { tx }
    }

    /// 指纹未变的文件在下载/提取之前就短路
    pub async fn ja_processado(&self, arquivo: &str, assinatura: &str) -> Result<bool> {
        let (resp, rx) = oneshot::channel();
        self.enviar(Comando::JaProcessado {
            arquivo: arquivo.to_string(),
            assinatura: assinatura.to_string(),
            resp,
        })
        .await?;
        rx.await.map_err(|_| PipelineError::StoreEncerrado)
    }

    /// 合并一个来源的提取结果 (对并发读者原子)
    pub async fn merge(
        &self,
        arquivo: &str,
        assinatura: &str,
        cliente_id: &str,
        pedidos: Vec<Pedido>,
    ) -> Result<ResultadoMerge> {
        let (resp, rx) = oneshot::channel();
        self.enviar(Comando::Merge {
            arquivo: arquivo.to_string(),
            assinatura: assinatura.to_string(),
            cliente_id: cliente_id.to_string(),
            pedidos,
            resp,
        })
        .await?;
        rx.await.map_err(|_| PipelineError::StoreEncerrado)
    }

    /// 当前快照与版本号 (版本随每次成功合并递增)
    pub async fn snapshot(&self) -> Result<(Arc<Vec<Pedido>>, u64)> {
        let (resp, rx) = oneshot::channel();
        self.enviar(Comando::Snapshot { resp }).await?;
        rx.await.map_err(|_| PipelineError::StoreEncerrado)
    }

    pub async fn status(&self) -> Result<StatusLoja> {
        let (resp, rx) = oneshot::channel();
        self.enviar(Comando::Status { resp }).await?;
        rx.await.map_err(|_| PipelineError::StoreEncerrado)
    }

    /// 某客户端已合并过的来源文件及合并次数
    pub async fn sincronizados(&self, cliente_id: &str) -> Result<Vec<ArquivoSincronizado>> {
        let (resp, rx) = oneshot::channel();
        self.enviar(Comando::Sincronizados {
            cliente_id: cliente_id.to_string(),
            resp,
        })
        .await?;
        rx.await.map_err(|_| PipelineError::StoreEncerrado)
    }

    async fn enviar(&self, comando: Comando) -> Result<()> {
        self.tx
            .send(comando)
            .await
            .map_err(|_| PipelineError::StoreEncerrado)
    }
}

struct EstadoLoja {
    master: IndexMap<ChavePedido, Pedido>,
    /// 每个来源当前贡献的键, 重新处理时先清旧行
    por_arquivo: HashMap<String, Vec<ChavePedido>>,
    fingerprints: HashMap<String, Fingerprint>,
    sync_log: Vec<RegistroSync>,
    snapshot: Arc<Vec<Pedido>>,
    sujo: bool,
    versao: u64,
    arquivo_fingerprints: Option<PathBuf>,
}

impl EstadoLoja {
    fn novo(arquivo_fingerprints: Option<PathBuf>) -> Self {
        let fingerprints = arquivo_fingerprints
            .as_deref()
            .and_then(carregar_fingerprints)
            .unwrap_or_default();
        Self {
            master: IndexMap::new(),
            por_arquivo: HashMap::new(),
            fingerprints,
            sync_log: Vec::new(),
            snapshot: Arc::new(Vec::new()),
            sujo: false,
            versao: 0,
            arquivo_fingerprints,
        }
    }

    async fn executar(mut self, mut rx: mpsc::Receiver<Comando>) {
        while let Some(comando) = rx.recv().await {
            match comando {
                Comando::JaProcessado {
                    arquivo,
                    assinatura,
                    resp,
                } => {
                    let conhecido = self
                        .fingerprints
                        .get(&arquivo)
                        .map_or(false, |f| f.assinatura == assinatura);
                    let _ = resp.send(conhecido);
                }
                Comando::Merge {
                    arquivo,
                    assinatura,
                    cliente_id,
                    pedidos,
                    resp,
                } => {
                    let resultado = self.merge(arquivo, assinatura, cliente_id, pedidos);
                    let _ = resp.send(resultado);
                }
                Comando::Snapshot { resp } => {
                    let snapshot = self.snapshot_atual();
                    let _ = resp.send((snapshot, self.versao));
                }
                Comando::Status { resp } => {
                    let _ = resp.send(self.status());
                }
                Comando::Sincronizados { cliente_id, resp } => {
                    let _ = resp.send(self.sincronizados(&cliente_id));
                }
            }
        }
        tracing::info!("Master store encerrado");
    }

    fn snapshot_atual(&mut self) -> Arc<Vec<Pedido>> {
        if self.sujo {
            self.snapshot = Arc::new(self.master.values().cloned().collect());
            self.sujo = false;
        }
        Arc::clone(&self.snapshot)
    }

    fn merge(
        &mut self,
        arquivo: String,
        assinatura: String,
        cliente_id: String,
        pedidos: Vec<Pedido>,
    ) -> ResultadoMerge {
        // 1. 指纹未变: 完全不动主记录集
        if let Some(fingerprint) = self.fingerprints.get(&arquivo) {
            if fingerprint.assinatura == assinatura {
                tracing::info!("Arquivo {} sem mudanças, merge ignorado", arquivo);
                return ResultadoMerge {
                    inalterado: true,
                    ..Default::default()
                };
            }
        }

        let mut resultado = ResultadoMerge {
            registros: pedidos.len(),
            ..Default::default()
        };

        // 2. 清除该来源之前贡献且仍归属它的行 (其他来源后写覆盖的键不动)
        if let Some(chaves) = self.por_arquivo.remove(&arquivo) {
            for chave in chaves {
                let pertence = self
                    .master
                    .get(&chave)
                    .map_or(false, |p| p.arquivo_origem == arquivo);
                if pertence {
                    self.master.shift_remove(&chave);
                }
            }
        }

        // 3. 按去重键插入; 重插到队尾保持按摄取排序, 后写胜出
        let mut chaves = Vec::with_capacity(pedidos.len());
        for pedido in pedidos {
            let chave = pedido.chave();
            if let Some(anterior) = self.master.get(&chave) {
                if anterior.mesmo_conteudo(&pedido) {
                    resultado.substituidos += 1;
                } else {
                    resultado.conflitos += 1;
                    tracing::warn!(
                        "Conflito de merge em ({}, {}): {} sobrepõe {}",
                        chave.0,
                        chave.1,
                        pedido.arquivo_origem,
                        anterior.arquivo_origem
                    );
                }
                self.master.shift_remove(&chave);
            } else {
                resultado.novos += 1;
            }
            chaves.push(chave.clone());
            self.master.insert(chave, pedido);
        }

        // 4. 指纹 + 日志 + 版本
        self.fingerprints.insert(
            arquivo.clone(),
            Fingerprint {
                assinatura,
                processado_em: Utc::now(),
            },
        );
        self.sync_log.push(RegistroSync {
            cliente_id,
            arquivo: arquivo.clone(),
            data_sync: Utc::now(),
            registros: resultado.registros,
        });
        self.por_arquivo.insert(arquivo, chaves);
        self.versao += 1;
        self.sujo = true;
        self.salvar_fingerprints();

        resultado
    }

    fn status(&self) -> StatusLoja {
        StatusLoja {
            total_registros: self.master.len(),
            ultima_sincronizacao: self.sync_log.iter().map(|r| r.data_sync).max(),
            total_sincronizacoes: self.sync_log.len(),
            versao: self.versao,
        }
    }

    fn sincronizados(&self, cliente_id: &str) -> Vec<ArquivoSincronizado> {
        let mut por_arquivo: IndexMap<&str, ArquivoSincronizado> = IndexMap::new();
        for registro in self.sync_log.iter().filter(|r| r.cliente_id == cliente_id) {
            por_arquivo
                .entry(registro.arquivo.as_str())
                .and_modify(|agregado| {
                    agregado.sincronizacoes += 1;
                    if registro.data_sync > agregado.ultima_sync {
                        agregado.ultima_sync = registro.data_sync;
                    }
                })
                .or_insert_with(|| ArquivoSincronizado {
                    nome: registro.arquivo.clone(),
                    ultima_sync: registro.data_sync,
                    sincronizacoes: 1,
                });
        }
        por_arquivo.into_values().collect()
    }

    fn salvar_fingerprints(&self) {
        let Some(caminho) = &self.arquivo_fingerprints else {
            return;
        };
        let gravacao = serde_json::to_string_pretty(&self.fingerprints)
            .map_err(std::io::Error::other)
            .and_then(|json| std::fs::write(caminho, json));
        if let Err(erro) = gravacao {
            tracing::warn!(
                "Falha ao persistir fingerprints em {}: {}",
                caminho.display(),
                erro
            );
        }
    }
}

fn carregar_fingerprints(caminho: &Path) -> Option<HashMap<String, Fingerprint>> {
    let conteudo = std::fs::read_to_string(caminho).ok()?;
    match serde_json::from_str(&conteudo) {
        Ok(fingerprints) => Some(fingerprints),
        Err(erro) => {
            tracing::warn!(
                "Fingerprints ilegíveis em {}, começando vazio: {}",
                caminho.display(),
                erro
            );
            None
        }
    }
}
