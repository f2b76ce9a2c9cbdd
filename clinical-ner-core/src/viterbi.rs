//! # Algoritmo de Viterbi — Decodificação de Sequências CRF
//!
//! Encontra a sequência de tags de maior score por **programação dinâmica**,
//! em `O(N × T²)` em vez de `O(T^N)`.
//!
//! ```text
//! Inicialização: viterbi[0][t] = emission[0][t]
//!
//! Recursão: viterbi[i][t] = max_{t'} [viterbi[i-1][t'] + transition[t'][t]] + emission[i][t]
//!
//! Backtracking: reconstrói o caminho ótimo de trás pra frente
//! ```

use serde::{Deserialize, Serialize};

/// Resultado do Viterbi
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViterbiResult {
    /// Índices das tags da melhor sequência (um por token)
    pub best_path: Vec<usize>,
    /// Score (não-normalizado) da melhor sequência
    pub best_score: f64,
}

/// Executa o Viterbi sobre scores já calculados.
///
/// # Parâmetros
/// - `emission`: `emission[i][t]`, score da tag `t` no token `i`
/// - `transition`: `transition[prev][next]`
pub fn viterbi_decode(emission: &[Vec<f64>], transition: &[Vec<f64>]) -> ViterbiResult {
    if emission.is_empty() {
        return ViterbiResult {
            best_path: vec![],
            best_score: 0.0,
        };
    }

    let n_tokens = emission.len();
    let n_tags = emission[0].len();

    let mut viterbi: Vec<f64> = emission[0].clone();
    // backptr[i][t] = tag anterior que maximiza o score de t no token i
    let mut backptr: Vec<Vec<usize>> = vec![vec![0usize; n_tags]; n_tokens];

    for i in 1..n_tokens {
        let mut next = vec![f64::NEG_INFINITY; n_tags];
        for t in 0..n_tags {
            let (best_prev, best_score) = (0..n_tags)
                .map(|prev| (prev, viterbi[prev] + transition[prev][t]))
                .fold((0, f64::NEG_INFINITY), |best, cand| if cand.1 > best.1 { cand } else { best });
            next[t] = best_score + emission[i][t];
            backptr[i][t] = best_prev;
        }
        viterbi = next;
    }

    let (mut last, best_score) = best_in_slice(&viterbi);
    let mut best_path = vec![0usize; n_tokens];
    for i in (0..n_tokens).rev() {
        best_path[i] = last;
        last = backptr[i][last];
    }

    ViterbiResult { best_path, best_score }
}

/// Índice e valor do maior elemento (o primeiro, em caso de empate)
fn best_in_slice(scores: &[f64]) -> (usize, f64) {
    scores
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &s)| if s > best.1 { (i, s) } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sequence() {
        let result = viterbi_decode(&[], &[]);
        assert!(result.best_path.is_empty());
    }

    #[test]
    fn test_emission_only() {
        let emission = vec![vec![0.0, 2.0], vec![3.0, 1.0]];
        let transition = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let result = viterbi_decode(&emission, &transition);
        assert_eq!(result.best_path, vec![1, 0]);
        assert!((result.best_score - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_transition_changes_path() {
        // Sem transição o melhor seria [1, 0]; a penalidade 1->0 força [1, 1]
        let emission = vec![vec![0.0, 2.0], vec![3.0, 1.5]];
        let transition = vec![vec![0.0, 0.0], vec![-5.0, 0.0]];
        let result = viterbi_decode(&emission, &transition);
        assert_eq!(result.best_path, vec![1, 1]);
        assert!((result.best_score - 3.5).abs() < 1e-9);
    }
}
