// src/services/retry.rs

use chrono::{DateTime, Duration, Utc};

// Política de retentativa de um passo de cadência que falhou no disparo.
// Backoff exponencial limitado; esgotou, a run vai para FALHA e espera
// revisão humana. O passo em si nunca avança numa falha.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_tentativas: i32,
    pub base_minutos: i64,
    pub teto_minutos: i64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tentativas: 3,
            base_minutos: 30,
            teto_minutos: 24 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisaoDeRetentativa {
    /// Reagenda o mesmo passo, com o contador de tentativas atualizado.
    Reagendar {
        tentativas: i32,
        next_run_at: DateTime<Utc>,
    },
    /// Tentativas esgotadas.
    Desistir,
}

/// `tentativas_anteriores` é o total de falhas já registradas no passo
/// atual; a falha que acabou de acontecer ainda não está contada.
pub fn decidir_retentativa(
    tentativas_anteriores: i32,
    cfg: &RetryConfig,
    agora: DateTime<Utc>,
) -> DecisaoDeRetentativa {
    let tentativa = tentativas_anteriores + 1;
    if tentativa >= cfg.max_tentativas {
        return DecisaoDeRetentativa::Desistir;
    }

    // base * 2^(tentativa-1), com teto
    let expoente = u32::try_from(tentativa - 1).unwrap_or(0);
    let fator = 1_i64.checked_shl(expoente).unwrap_or(i64::MAX);
    let atraso = cfg
        .base_minutos
        .saturating_mul(fator)
        .min(cfg.teto_minutos);

    DecisaoDeRetentativa::Reagendar {
        tentativas: tentativa,
        next_run_at: agora + Duration::minutes(atraso),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_dobra_a_cada_falha() {
        let cfg = RetryConfig::default();
        let agora = Utc::now();

        match decidir_retentativa(0, &cfg, agora) {
            DecisaoDeRetentativa::Reagendar {
                tentativas,
                next_run_at,
            } => {
                assert_eq!(tentativas, 1);
                assert_eq!(next_run_at, agora + Duration::minutes(30));
            }
            outro => panic!("esperava Reagendar, veio {:?}", outro),
        }

        match decidir_retentativa(1, &cfg, agora) {
            DecisaoDeRetentativa::Reagendar { next_run_at, .. } => {
                assert_eq!(next_run_at, agora + Duration::minutes(60));
            }
            outro => panic!("esperava Reagendar, veio {:?}", outro),
        }
    }

    #[test]
    fn terceira_falha_desiste() {
        let cfg = RetryConfig::default();
        assert_eq!(
            decidir_retentativa(2, &cfg, Utc::now()),
            DecisaoDeRetentativa::Desistir
        );
    }

    #[test]
    fn atraso_respeita_o_teto() {
        let cfg = RetryConfig {
            max_tentativas: 10,
            base_minutos: 30,
            teto_minutos: 120,
        };
        let agora = Utc::now();

        match decidir_retentativa(5, &cfg, agora) {
            DecisaoDeRetentativa::Reagendar { next_run_at, .. } => {
                assert_eq!(next_run_at, agora + Duration::minutes(120));
            }
            outro => panic!("esperava Reagendar, veio {:?}", outro),
        }
    }
}
