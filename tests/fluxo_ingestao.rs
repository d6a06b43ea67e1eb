//! 跨模块流程测试: 提取 → 去重合并 → 同步周期的降级行为

use async_trait::async_trait;
use calamine::Data;
use chrono::Utc;
use pedido_sync_rust::config::SyncConfig;
use pedido_sync_rust::error::{PipelineError, Result};
use pedido_sync_rust::service::extractor::{extrair, Grade};
use pedido_sync_rust::service::ingest::{ArquivoRemoto, FonteArquivos, IngestService, StatusSync};
use pedido_sync_rust::MasterStore;

fn grade_pedido(numero: &str) -> Grade {
    let mut grade = vec![vec![Data::Empty; 26]; 24];
    grade[1][15] = Data::String("15/07/2025".into());
    grade[1][8] = Data::String(numero.into());
    grade[9][4] = Data::String("Loja Alfa".into());
    grade[11][4] = Data::String("Sao Paulo".into());
    grade[11][17] = Data::String("SP".into());
    grade[12][4] = Data::String("11 99999-0000".into());
    grade[18][0] = Data::Float(2.0);
    grade[18][2] = Data::String("KIT 1 COMPLETO".into());
    grade[18][25] = Data::Float(600.0);
    grade[19][0] = Data::Float(1.0);
    grade[19][2] = Data::String("AMORTECEDOR".into());
    grade[19][25] = Data::Float(400.0);
    grade
}

fn config_rapida() -> SyncConfig {
    SyncConfig {
        intervalo_segundos: 1,
        max_downloads: 5,
        timeout_segundos: 1,
        tentativas: 2,
        backoff_inicial_ms: 1,
    }
}

/// 同一订单经两个不同文件名上传, 仍按 (订单号, 产品) 收敛为一组行
#[tokio::test]
async fn mesmo_pedido_em_dois_arquivos_colapsa() {
    let store = MasterStore::abrir(None);
    let grade = grade_pedido("PED-77");

    let do_a = extrair(&grade, "exportacao_a.xlsx", Utc::now()).unwrap();
    let do_b = extrair(&grade, "exportacao_b.xlsx", Utc::now()).unwrap();
    assert_eq!(do_a.len(), 2);

    store.merge("exportacao_a.xlsx", "sig-a", "c1", do_a).await.unwrap();
    store.merge("exportacao_b.xlsx", "sig-b", "c1", do_b).await.unwrap();

    let (snapshot, _) = store.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);

    let mut chaves: Vec<_> = snapshot.iter().map(|p| p.chave()).collect();
    chaves.sort();
    chaves.dedup();
    assert_eq!(chaves.len(), 2);

    // 各行份额之和仍重建订单合计
    let soma: f64 = snapshot.iter().map(|p| p.valor_total).sum();
    assert!((soma - 1000.0).abs() < 1e-9);
}

struct FonteFalha;

#[async_trait]
impl FonteArquivos for FonteFalha {
    async fn listar(&self) -> Result<Vec<ArquivoRemoto>> {
        Err(PipelineError::Fonte("indisponível".to_string()))
    }

    async fn baixar(&self, _nome: &str) -> Result<Vec<u8>> {
        Err(PipelineError::Fonte("indisponível".to_string()))
    }
}

/// 协作方不可达: 周期降级, 但已合并的数据原样保留
#[tokio::test]
async fn fonte_indisponivel_degrada_sem_perder_dados() {
    let store = MasterStore::abrir(None);
    let pedidos = extrair(&grade_pedido("PED-1"), "a.xlsx", Utc::now()).unwrap();
    store.merge("a.xlsx", "sig-1", "c1", pedidos).await.unwrap();
    let (antes, versao_antes) = store.snapshot().await.unwrap();

    let ingest = IngestService::new(store.clone(), config_rapida());
    let resumo = ingest.sincronizar(&FonteFalha, "c1").await;
    assert_eq!(resumo.status, StatusSync::Degradado);
    assert_eq!(resumo.processados, 0);

    let (depois, versao_depois) = store.snapshot().await.unwrap();
    assert_eq!(antes.len(), depois.len());
    assert_eq!(versao_antes, versao_depois);

    // 最后一次成功同步的时间戳继续可见
    let status = store.status().await.unwrap();
    assert!(status.ultima_sincronizacao.is_some());
}

struct FonteFixa {
    arquivos: Vec<(ArquivoRemoto, Vec<u8>)>,
}

#[async_trait]
impl FonteArquivos for FonteFixa {
    async fn listar(&self) -> Result<Vec<ArquivoRemoto>> {
        Ok(self.arquivos.iter().map(|(a, _)| a.clone()).collect())
    }

    async fn baixar(&self, nome: &str) -> Result<Vec<u8>> {
        self.arquivos
            .iter()
            .find(|(a, _)| a.nome == nome)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| PipelineError::Fonte(format!("{} não existe", nome)))
    }
}

/// 指纹未变的来源在下载前短路; 字节流损坏只拒绝该文件
#[tokio::test]
async fn ciclo_pula_inalterados_e_rejeita_corrompidos() {
    let store = MasterStore::abrir(None);
    let pedidos = extrair(&grade_pedido("PED-1"), "conhecido.xlsx", Utc::now()).unwrap();
    store.merge("conhecido.xlsx", "sig-1", "c1", pedidos).await.unwrap();

    let fonte = FonteFixa {
        arquivos: vec![
            (
                ArquivoRemoto {
                    nome: "conhecido.xlsx".to_string(),
                    assinatura: "sig-1".to_string(),
                },
                Vec::new(),
            ),
            (
                ArquivoRemoto {
                    nome: "corrompido.xlsx".to_string(),
                    assinatura: "sig-x".to_string(),
                },
                b"isto nao e um xlsx".to_vec(),
            ),
        ],
    };

    let ingest = IngestService::new(store.clone(), config_rapida());
    let resumo = ingest.sincronizar(&fonte, "c1").await;

    assert_eq!(resumo.ignorados, 1);
    assert_eq!(resumo.rejeitados, 1);
    assert_eq!(resumo.processados, 0);
    assert_eq!(resumo.status, StatusSync::Completo);

    // 被拒文件不产生指纹, 修复后的新签名会被重新处理
    assert!(!store.ja_processado("corrompido.xlsx", "sig-x").await.unwrap());
}
