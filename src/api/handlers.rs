use super::AppState;
use crate::service::clientes;
use crate::service::comissao::calcular_comissoes;
use crate::service::ingest::ResultadoUpload;
use crate::service::periodo;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// 上传响应体 (与同步代理约定的格式)
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub registros: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub total_registros: usize,
    pub ultima_sincronizacao: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ClienteQuery {
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodoQuery {
    pub ano: Option<i32>,
    pub mes: Option<u32>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

fn erro_json(status: StatusCode, mensagem: impl Into<String>) -> Response {
    let corpo = json!({ "success": false, "message": mensagem.into() });
    (status, Json(corpo)).into_response()
}

fn autorizado(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|valor| valor.to_str().ok())
        .and_then(|valor| valor.strip_prefix("Bearer "))
        .map_or(false, |recebido| recebido == token)
}

/// 文件上传接口: Bearer 鉴权 + multipart (file, client_id)
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !autorizado(&headers, &state.config.api_token) {
        return erro_json(StatusCode::UNAUTHORIZED, "Token de autenticação inválido");
    }

    let mut nome_arquivo: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;
    let mut cliente_id = "unknown".to_string();

    loop {
        match multipart.next_field().await {
            Ok(Some(campo)) => match campo.name().map(str::to_string).as_deref() {
                Some("file") => {
                    nome_arquivo = campo.file_name().map(str::to_string);
                    match campo.bytes().await {
                        Ok(conteudo) => bytes = Some(conteudo.to_vec()),
                        Err(erro) => {
                            return erro_json(
                                StatusCode::BAD_REQUEST,
                                format!("Falha ao ler o arquivo: {}", erro),
                            )
                        }
                    }
                }
                Some("client_id") => {
                    if let Ok(texto) = campo.text().await {
                        cliente_id = texto;
                    }
                }
                _ => {}
            },
            Ok(None) => break,
            Err(erro) => {
                return erro_json(
                    StatusCode::BAD_REQUEST,
                    format!("Multipart inválido: {}", erro),
                )
            }
        }
    }

    let Some(bytes) = bytes else {
        return erro_json(StatusCode::BAD_REQUEST, "Nenhum arquivo enviado");
    };
    let nome = match nome_arquivo.filter(|n| !n.is_empty()) {
        Some(nome) => nome,
        None => return erro_json(StatusCode::BAD_REQUEST, "Nenhum arquivo selecionado"),
    };

    match state.ingest.processar_upload(&nome, &bytes, &cliente_id).await {
        Ok(ResultadoUpload::Ingerido(merge)) => {
            let resposta = UploadResponse {
                success: true,
                message: format!("Arquivo {} processado com sucesso", nome),
                registros: merge.registros,
            };
            (StatusCode::OK, Json(resposta)).into_response()
        }
        Ok(ResultadoUpload::Rejeitado(motivo)) => erro_json(
            StatusCode::BAD_REQUEST,
            format!("Nenhum dado válido encontrado no arquivo: {}", motivo),
        ),
        Err(erro) => erro_json(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", erro)),
    }
}

/// 系统状态 + 最后一次成功同步时间
pub async fn status(State(state): State<AppState>) -> Response {
    match state.store.status().await {
        Ok(status) => {
            let resposta = StatusResponse {
                status: "online",
                total_registros: status.total_registros,
                ultima_sincronizacao: status.ultima_sincronizacao,
            };
            (StatusCode::OK, Json(resposta)).into_response()
        }
        Err(erro) => erro_json(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", erro)),
    }
}

/// 某客户端已同步文件列表
pub async fn synced_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ClienteQuery>,
) -> Response {
    if !autorizado(&headers, &state.config.api_token) {
        return erro_json(StatusCode::UNAUTHORIZED, "Token de autenticação inválido");
    }
    let cliente_id = query.client_id.unwrap_or_else(|| "unknown".to_string());
    match state.store.sincronizados(&cliente_id).await {
        Ok(arquivos) => (StatusCode::OK, Json(json!({ "arquivos": arquivos }))).into_response(),
        Err(erro) => erro_json(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", erro)),
    }
}

/// 主记录集全量导出
pub async fn pedidos(State(state): State<AppState>) -> Response {
    match state.store.snapshot().await {
        Ok((snapshot, _)) => (
            StatusCode::OK,
            Json(json!({ "pedidos": &*snapshot, "total": snapshot.len() })),
        )
            .into_response(),
        Err(erro) => erro_json(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", erro)),
    }
}

/// 结算期佣金汇总; 不带参数取当前结算期
pub async fn comissoes(
    State(state): State<AppState>,
    Query(query): Query<PeriodoQuery>,
) -> Response {
    let janela = match (query.ano, query.mes) {
        (Some(ano), Some(mes)) if (1..=12).contains(&mes) => periodo::periodo_de(ano, mes),
        (None, None) => periodo::periodo_fiscal(Local::now().date_naive()),
        _ => return erro_json(StatusCode::BAD_REQUEST, "Parâmetros ano/mes inválidos"),
    };

    let (snapshot, versao) = match state.store.snapshot().await {
        Ok(par) => par,
        Err(erro) => {
            return erro_json(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", erro))
        }
    };

    if let Some(resumo) = state.cache.obter(&janela, versao) {
        return (StatusCode::OK, Json(resumo)).into_response();
    }

    let resumo = calcular_comissoes(&snapshot, janela.0, janela.1, &state.config.comissao);
    state.cache.guardar(janela, versao, resumo.clone());
    (StatusCode::OK, Json(resumo)).into_response()
}

/// 结算期销售额按周桶汇总 (周对比图表的数据序列)
pub async fn vendas_semanais(
    State(state): State<AppState>,
    Query(query): Query<PeriodoQuery>,
) -> Response {
    let janela = match (query.ano, query.mes) {
        (Some(ano), Some(mes)) if (1..=12).contains(&mes) => periodo::periodo_de(ano, mes),
        (None, None) => periodo::periodo_fiscal(Local::now().date_naive()),
        _ => return erro_json(StatusCode::BAD_REQUEST, "Parâmetros ano/mes inválidos"),
    };

    match state.store.snapshot().await {
        Ok((snapshot, _)) => {
            let semanas = periodo::vendas_por_semana(&snapshot, janela.0, janela.1);
            (
                StatusCode::OK,
                Json(json!({ "inicio": janela.0, "fim": janela.1, "semanas": semanas })),
            )
                .into_response()
        }
        Err(erro) => erro_json(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", erro)),
    }
}

/// 客户地图标记 (带防重叠抖动的展示层坐标)
pub async fn mapa_clientes(State(state): State<AppState>) -> Response {
    match state.store.snapshot().await {
        Ok((snapshot, _)) => {
            let marcadores = clientes::vista_mapa(&state.geocoder, &snapshot);
            let total = marcadores.len();
            (
                StatusCode::OK,
                Json(json!({ "clientes": marcadores, "total": total })),
            )
                .into_response()
        }
        Err(erro) => erro_json(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", erro)),
    }
}

/// 待挽回客户列表
pub async fn lojistas_recuperar(State(state): State<AppState>) -> Response {
    match state.store.snapshot().await {
        Ok((snapshot, _)) => {
            let lojistas =
                clientes::lojistas_a_recuperar(&snapshot, Local::now().date_naive());
            let total = lojistas.len();
            (
                StatusCode::OK,
                Json(json!({ "lojistas": lojistas, "total": total })),
            )
                .into_response()
        }
        Err(erro) => erro_json(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", erro)),
    }
}
