use crate::models::Pedido;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// 当前结算期: 上月26日 00:00:00 至 本月25日 23:59:59
pub fn periodo_fiscal(hoje: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let (ano, mes) = if hoje.month() == 1 {
        (hoje.year() - 1, 12)
    } else {
        (hoje.year(), hoje.month() - 1)
    };
    periodo_de(ano, mes)
}

/// 以 (ano, mes) 的26日为起点的结算期
pub fn periodo_de(ano: i32, mes: u32) -> (NaiveDateTime, NaiveDateTime) {
    let inicio = dia26(ano, mes).and_time(NaiveTime::MIN);
    let (ano_seguinte, mes_seguinte) = if mes == 12 { (ano + 1, 1) } else { (ano, mes + 1) };
    let fim = dia26(ano_seguinte, mes_seguinte).and_time(NaiveTime::MIN) - Duration::seconds(1);
    (inicio, fim)
}

fn dia26(ano: i32, mes: u32) -> NaiveDate {
    // 任何月份都有26日
    NaiveDate::from_ymd_opt(ano, mes, 26).expect("dia 26")
}

/// 周桶: 0 = 期外; 期内按天数四等分, 取值 1..=4
pub fn semana_do_periodo(data: NaiveDateTime, inicio: NaiveDateTime, fim: NaiveDateTime) -> u8 {
    let total_dias = (fim - inicio).num_days() + 1;
    if total_dias <= 0 || data < inicio || data > fim {
        return 0;
    }
    let dias_desde_inicio = (data - inicio).num_days();
    let semana = dias_desde_inicio * 4 / total_dias + 1;
    semana.clamp(1, 4) as u8
}

/// 期内销售额按周桶汇总 (周对比图表的数据序列)
pub fn vendas_por_semana(
    pedidos: &[Pedido],
    inicio: NaiveDateTime,
    fim: NaiveDateTime,
) -> [f64; 4] {
    let mut somas = [0.0f64; 4];
    for pedido in pedidos {
        let semana = semana_do_periodo(pedido.data.and_time(NaiveTime::MIN), inicio, fim);
        if semana > 0 {
            somas[semana as usize - 1] += pedido.valor_total;
        }
    }
    somas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodo_comum() {
        let (inicio, fim) = periodo_de(2025, 7);
        assert_eq!(inicio.to_string(), "2025-07-26 00:00:00");
        assert_eq!(fim.to_string(), "2025-08-25 23:59:59");
    }

    #[test]
    fn periodo_com_virada_de_ano() {
        let (inicio, fim) = periodo_de(2025, 12);
        assert_eq!(inicio.date(), NaiveDate::from_ymd_opt(2025, 12, 26).unwrap());
        assert_eq!(fim.date(), NaiveDate::from_ymd_opt(2026, 1, 25).unwrap());
    }

    #[test]
    fn periodo_fiscal_em_janeiro_volta_para_dezembro() {
        let (inicio, fim) = periodo_fiscal(NaiveDate::from_ymd_opt(2026, 1, 10).unwrap());
        assert_eq!(inicio.date(), NaiveDate::from_ymd_opt(2025, 12, 26).unwrap());
        assert_eq!(fim.date(), NaiveDate::from_ymd_opt(2026, 1, 25).unwrap());
    }

    #[test]
    fn semana_dentro_do_periodo_fica_entre_1_e_4() {
        let (inicio, fim) = periodo_de(2025, 7);
        let mut dia = inicio.date();
        while dia <= fim.date() {
            let semana = semana_do_periodo(dia.and_time(NaiveTime::MIN), inicio, fim);
            assert!((1..=4).contains(&semana), "dia {} caiu na semana {}", dia, semana);
            dia += Duration::days(1);
        }
        // 边界: 首日落在第1周, 末日落在第4周
        assert_eq!(semana_do_periodo(inicio, inicio, fim), 1);
        assert_eq!(semana_do_periodo(fim, inicio, fim), 4);
    }

    #[test]
    fn agrega_vendas_por_semana() {
        use crate::models::Pedido;
        use chrono::Utc;

        let (inicio, fim) = periodo_de(2025, 7);
        let linha = |data: &str, valor: f64| Pedido {
            numero_pedido: "P1".to_string(),
            data: data.parse().unwrap(),
            cliente: "Loja Alfa".to_string(),
            telefone: String::new(),
            cidade: "Sao Paulo".to_string(),
            estado: "SP".to_string(),
            produto: "MOLA".to_string(),
            quantidade: 1.0,
            valor_total: valor,
            arquivo_origem: "a.xlsx".to_string(),
            data_upload: Utc::now(),
        };

        let pedidos = vec![
            linha("2025-07-26", 100.0), // 第1周
            linha("2025-08-25", 40.0),  // 第4周
            linha("2025-09-10", 999.0), // 期外, 不计
        ];
        let semanas = vendas_por_semana(&pedidos, inicio, fim);
        assert!((semanas[0] - 100.0).abs() < 1e-9);
        assert_eq!(semanas[1], 0.0);
        assert_eq!(semanas[2], 0.0);
        assert!((semanas[3] - 40.0).abs() < 1e-9);
    }

    #[test]
    fn semana_fora_do_periodo_eh_zero() {
        let (inicio, fim) = periodo_de(2025, 7);
        let antes = inicio - Duration::days(1);
        let depois = fim + Duration::seconds(1);
        assert_eq!(semana_do_periodo(antes, inicio, fim), 0);
        assert_eq!(semana_do_periodo(depois, inicio, fim), 0);
    }
}
