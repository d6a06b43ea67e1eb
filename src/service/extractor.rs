use crate::models::Pedido;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use std::io::Cursor;
use thiserror::Error;

/// 单元格网格 (0 基, 绝对坐标)
pub type Grade = Vec<Vec<Data>>;

// 固定版式约定: 与上游打印模板逐格对应, 不可配置
const CELULA_DATA: (usize, usize) = (1, 15);
const CELULA_NUMERO: (usize, usize) = (1, 8);
const CELULA_CLIENTE: (usize, usize) = (9, 4);
const CELULA_CIDADE: (usize, usize) = (11, 4);
const CELULA_ESTADO: (usize, usize) = (11, 17);
const CELULA_TELEFONE: (usize, usize) = (12, 4);
const LINHAS_ITENS: std::ops::Range<usize> = 18..24;
const COL_QUANTIDADE: usize = 0;
const COL_DESCRICAO: usize = 2;
const COL_VALOR: usize = 25;
const MIN_LINHAS: usize = 20;
const MIN_COLUNAS: usize = 26;

const DESCONHECIDO: &str = "Desconhecido";
const PRODUTO_DESCONHECIDO: &str = "Produto Desconhecido";

/// 提取失败原因; 按阶段返回, 由调用方决定记录还是传播
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ErroExtracao {
    #[error("estrutura inválida: grade {linhas}x{colunas} menor que o mínimo")]
    EstruturaInvalida { linhas: usize, colunas: usize },

    #[error("data do pedido ilegível")]
    DataInvalida,

    #[error("pedido em fim de semana: {0}")]
    FimDeSemana(NaiveDate),

    #[error("falha ao ler planilha: {0}")]
    Planilha(String),
}

/// 把 xlsx 字节流的第一张表展开为绝对坐标网格
pub fn ler_grade(bytes: &[u8]) -> Result<Grade, ErroExtracao> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook =
        open_workbook_auto_from_rs(cursor).map_err(|e| ErroExtracao::Planilha(e.to_string()))?;
    let nome = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ErroExtracao::Planilha("planilha sem abas".to_string()))?;
    let range = workbook
        .worksheet_range(&nome)
        .map_err(|e| ErroExtracao::Planilha(e.to_string()))?;

    let Some(fim) = range.end() else {
        return Ok(Vec::new());
    };
    let inicio = range.start().unwrap_or((0, 0));
    let mut grade = vec![vec![Data::Empty; fim.1 as usize + 1]; fim.0 as usize + 1];
    for (linha, coluna, valor) in range.cells() {
        grade[linha + inicio.0 as usize][coluna + inicio.1 as usize] = valor.clone();
    }
    Ok(grade)
}

/// 把一个网格提取为订单行; 纯转换, 无副作用
pub fn extrair(grade: &[Vec<Data>], arquivo: &str, agora: DateTime<Utc>) -> Result<Vec<Pedido>, ErroExtracao> {
    let colunas = grade.iter().map(Vec::len).max().unwrap_or(0);
    if grade.len() < MIN_LINHAS || colunas < MIN_COLUNAS {
        return Err(ErroExtracao::EstruturaInvalida {
            linhas: grade.len(),
            colunas,
        });
    }

    // 1. 订单日期: 不可解析或落在周末则整个文件拒绝
    let data = celula(grade, CELULA_DATA)
        .and_then(como_data)
        .ok_or(ErroExtracao::DataInvalida)?;
    if matches!(data.weekday(), Weekday::Sat | Weekday::Sun) {
        return Err(ErroExtracao::FimDeSemana(data));
    }

    // 2. 订单级合计: 六个金额单元格求和
    let valor_pedido: f64 = LINHAS_ITENS
        .clone()
        .filter_map(|i| celula(grade, (i, COL_VALOR)).and_then(como_numero))
        .sum();

    let numero_pedido = texto_ou_desconhecido(grade, CELULA_NUMERO);
    let cliente = texto_ou_desconhecido(grade, CELULA_CLIENTE);
    let cidade = texto_ou_desconhecido(grade, CELULA_CIDADE);
    let estado = texto_ou_desconhecido(grade, CELULA_ESTADO);
    let telefone = texto_ou_desconhecido(grade, CELULA_TELEFONE);

    // 3. 产品行: 数量 > 0 且描述非空才有效
    let mut itens: Vec<(f64, String)> = Vec::new();
    for i in LINHAS_ITENS {
        let quantidade = celula(grade, (i, COL_QUANTIDADE)).and_then(como_numero);
        let descricao = celula(grade, (i, COL_DESCRICAO)).and_then(como_texto);
        if let (Some(quantidade), Some(descricao)) = (quantidade, descricao) {
            if quantidade > 0.0 {
                itens.push((quantidade, descricao));
            }
        }
    }

    let montar = |produto: String, quantidade: f64, valor: f64| Pedido {
        numero_pedido: numero_pedido.clone(),
        data,
        cliente: cliente.clone(),
        telefone: telefone.clone(),
        cidade: cidade.clone(),
        estado: estado.clone(),
        produto,
        quantidade,
        valor_total: valor,
        arquivo_origem: arquivo.to_string(),
        data_upload: agora,
    };

    // 4. 没有任何有效产品行: 用未知产品单行保住整单收入
    if itens.is_empty() {
        return Ok(vec![montar(PRODUTO_DESCONHECIDO.to_string(), 0.0, valor_pedido)]);
    }

    // 5. 合计在有效行之间平摊 (除法, 不是复制)
    let quota = valor_pedido / itens.len() as f64;
    Ok(itens
        .into_iter()
        .map(|(quantidade, produto)| montar(produto, quantidade, quota))
        .collect())
}

fn celula(grade: &[Vec<Data>], pos: (usize, usize)) -> Option<&Data> {
    grade.get(pos.0).and_then(|linha| linha.get(pos.1))
}

fn texto_ou_desconhecido(grade: &[Vec<Data>], pos: (usize, usize)) -> String {
    celula(grade, pos)
        .and_then(como_texto)
        .unwrap_or_else(|| DESCONHECIDO.to_string())
}

fn como_texto(data: &Data) -> Option<String> {
    match data {
        Data::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Data::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

fn como_numero(data: &Data) -> Option<f64> {
    match data {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 日期单元格: Excel 日期类型, 或 dia/mês/ano 优先的文本
fn como_data(data: &Data) -> Option<NaiveDate> {
    match data {
        Data::DateTime(dt) => dt.as_datetime().map(|d| d.date()),
        Data::DateTimeIso(s) => s.get(..10).and_then(|d| d.parse().ok()),
        Data::String(s) => {
            let s = s.trim();
            const FORMATOS: [&str; 4] = ["%d/%m/%Y", "%d/%m/%y", "%d-%m-%Y", "%Y-%m-%d"];
            FORMATOS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        }
        _ => None,
    }
}
