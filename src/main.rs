use axum::{
    routing::{get, post},
    Router,
};
use pedido_sync_rust::models::Gazetteer;
use pedido_sync_rust::{api, AppConfig, CacheResumo, FonteDiretorio, Geocoder, IngestService, MasterStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = Arc::new(AppConfig::carregar()?);
    info!("Starting server with config: {:?}", config);

    // 加载地名参照表 (进程生命周期内只读)
    let gazetteer = Arc::new(Gazetteer::carregar(
        Path::new(&config.dados.estados_csv),
        Path::new(&config.dados.municipios_csv),
    )?);
    info!(
        "Gazetteer carregado: {} municípios, {} estados",
        gazetteer.municipios.len(),
        gazetteer.estados.len()
    );

    // 打开主记录集 (唯一写者任务) 并恢复指纹
    let store = MasterStore::abrir(Some(PathBuf::from(&config.dados.arquivo_fingerprints)));

    let ingest = Arc::new(IngestService::new(store.clone(), config.sync.clone()));
    let geocoder = Arc::new(Geocoder::new(gazetteer));
    let cache = Arc::new(CacheResumo::new(Duration::from_secs(
        config.cache_ttl_segundos,
    )));

    let state = api::AppState {
        config: config.clone(),
        store,
        ingest: ingest.clone(),
        geocoder,
        cache,
    };

    // 后台定时同步本地目录; 关停时 finish-or-abort, 不留半次合并
    let (parar_tx, parar_rx) = tokio::sync::watch::channel(false);
    let tarefa_sync = tokio::spawn(ciclo_sync(ingest, config.clone(), parar_rx));

    // 构建路由
    let app = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/upload", post(api::upload))
        .route("/api/status", get(api::status))
        .route("/api/synced_files", get(api::synced_files))
        .route("/api/pedidos", get(api::pedidos))
        .route("/api/comissoes", get(api::comissoes))
        .route("/api/vendas/semanas", get(api::vendas_semanais))
        .route("/api/mapa/clientes", get(api::mapa_clientes))
        .route("/api/lojistas/recuperar", get(api::lojistas_recuperar))
        .with_state(state)
        .layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/upload              - Upload de arquivo de pedido");
    info!("  GET  /api/status              - Status e última sincronização");
    info!("  GET  /api/synced_files        - Arquivos já mesclados por cliente");
    info!("  GET  /api/pedidos             - Registros deduplicados");
    info!("  GET  /api/comissoes           - Comissões do período fiscal");
    info!("  GET  /api/vendas/semanas      - Vendas por semana do período");
    info!("  GET  /api/mapa/clientes       - Marcadores de clientes");
    info!("  GET  /api/lojistas/recuperar  - Lojistas a recuperar");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let _ = parar_tx.send(true);
    let _ = tarefa_sync.await;

    Ok(())
}

/// 定时同步循环: 到点跑一个周期, 收到停止信号立即退出
async fn ciclo_sync(
    ingest: Arc<IngestService>,
    config: Arc<AppConfig>,
    mut parar: tokio::sync::watch::Receiver<bool>,
) {
    if let Err(erro) = tokio::fs::create_dir_all(&config.dados.diretorio_pedidos).await {
        tracing::warn!(
            "Não foi possível criar {}: {}",
            config.dados.diretorio_pedidos,
            erro
        );
    }

    let fonte = FonteDiretorio::new(&config.dados.diretorio_pedidos);
    let mut intervalo =
        tokio::time::interval(Duration::from_secs(config.sync.intervalo_segundos.max(1)));

    loop {
        tokio::select! {
            _ = intervalo.tick() => {
                let resumo = ingest.sincronizar(&fonte, "local").await;
                info!(
                    "Ciclo de sincronização ({:?}): {} processados, {} ignorados, {} rejeitados, {} falhas, {} registros",
                    resumo.status,
                    resumo.processados,
                    resumo.ignorados,
                    resumo.rejeitados,
                    resumo.falhas,
                    resumo.registros
                );
            }
            _ = parar.changed() => {
                info!("Ciclo de sincronização encerrado");
                break;
            }
        }
    }
}
