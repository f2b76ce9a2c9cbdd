//! # CRF — Conditional Random Field Linear-Chain
//!
//! O CRF aprende a probabilidade condicional `P(y|x)` de uma sequência de tags
//! `y` dada a sequência de tokens `x`:
//!
//! ```text
//! score(y, x) = Σ_i [emission(y_i, x, i) + transition(y_{i-1}, y_i)]
//! P(y|x)      = exp(score(y, x)) / Z(x)
//! ```
//!
//! ## Treino
//!
//! Gradiente estocástico sobre a log-verossimilhança condicional, uma
//! sequência por vez. As marginais vêm do algoritmo forward-backward em espaço
//! logarítmico:
//!
//! ```text
//! ∂ log P / ∂ w_{f,y}   = Σ_i f(x, i) · (1[y_i = y] − P(y_i = y | x))
//! ∂ log P / ∂ T_{y',y}  = Σ_i (1[y_{i-1} = y', y_i = y] − P(y_{i-1} = y', y_i = y | x))
//! ```
//!
//! A regularização L2 encolhe todos os pesos ao fim de cada época. A ordem das
//! sequências é embaralhada com semente fixa, então o treino é determinístico.
//!
//! ## Predição
//!
//! Decodificação pelo [Viterbi](crate::viterbi).

use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CrfConfig;
use crate::error::{NerError, Result};
use crate::features::FeatureVector;
use crate::learner::SequenceLearner;
use crate::viterbi::viterbi_decode;

/// Modelo CRF com pesos aprendidos
///
/// Contém:
/// - `emission_weights`: vetor denso `[feature * n_labels + label]`
/// - `transition_weights`: matriz `[label_prev][label_next]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrfModel {
    pub config: CrfConfig,
    labels: Vec<String>,
    feature_index: HashMap<String, usize>,
    emission_weights: Vec<f64>,
    transition_weights: Vec<Vec<f64>>,
}

/// Uma sequência de treino já indexada: features ativas por token e índice
/// da tag gold.
struct IndexedSequence {
    features: Vec<Vec<(usize, f64)>>,
    gold: Vec<usize>,
}

impl CrfModel {
    /// Cria um modelo sem pesos (precisa de `fit` antes de `predict`)
    pub fn new(config: CrfConfig) -> Self {
        Self {
            config,
            labels: Vec::new(),
            feature_index: HashMap::new(),
            emission_weights: Vec::new(),
            transition_weights: Vec::new(),
        }
    }

    /// Tags conhecidas, em ordem lexicográfica.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_trained(&self) -> bool {
        !self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.feature_index.len()
    }

    /// Peso de transição entre duas tags (0.0 para tags desconhecidas)
    pub fn transition_score(&self, prev: &str, next: &str) -> f64 {
        match (self.label_position(prev), self.label_position(next)) {
            (Some(p), Some(n)) => self.transition_weights[p][n],
            _ => 0.0,
        }
    }

    fn label_position(&self, label: &str) -> Option<usize> {
        self.labels.binary_search_by(|l| l.as_str().cmp(label)).ok()
    }

    /// Features conhecidas de um token, como pares (índice, valor).
    fn index_features(&self, fv: &FeatureVector) -> Vec<(usize, f64)> {
        fv.features
            .iter()
            .filter_map(|(name, value)| self.feature_index.get(name).map(|&idx| (idx, *value)))
            .collect()
    }

    /// Scores de emissão `[token][label]` de uma sequência indexada
    fn emission_scores(&self, features: &[Vec<(usize, f64)>]) -> Vec<Vec<f64>> {
        let n_labels = self.labels.len();
        features
            .iter()
            .map(|token| {
                let mut scores = vec![0.0; n_labels];
                for &(f, value) in token {
                    let base = f * n_labels;
                    for (y, score) in scores.iter_mut().enumerate() {
                        *score += value * self.emission_weights[base + y];
                    }
                }
                scores
            })
            .collect()
    }

    /// Constrói o vocabulário de tags e features a partir dos dados de treino
    fn build_index(&mut self, features: &[&[FeatureVector]], labels: &[&[String]]) -> Result<Vec<IndexedSequence>> {
        let label_set: BTreeSet<&str> = labels.iter().flat_map(|s| s.iter().map(String::as_str)).collect();
        if label_set.is_empty() {
            return Err(NerError::learner("CRF received no training tokens"));
        }
        self.labels = label_set.into_iter().map(str::to_string).collect();

        self.feature_index.clear();
        for sequence in features {
            for fv in sequence.iter() {
                for name in fv.features.keys() {
                    let next = self.feature_index.len();
                    self.feature_index.entry(name.clone()).or_insert(next);
                }
            }
        }

        let n_labels = self.labels.len();
        self.emission_weights = vec![0.0; self.feature_index.len() * n_labels];
        self.transition_weights = vec![vec![0.0; n_labels]; n_labels];

        features
            .iter()
            .zip(labels)
            .enumerate()
            .filter(|(_, (x, _))| !x.is_empty())
            .map(|(i, (x, y))| {
                if x.len() != y.len() {
                    return Err(NerError::learner(format!(
                        "sequence {i} has {} tokens but {} labels",
                        x.len(),
                        y.len()
                    )));
                }
                let gold = y
                    .iter()
                    .map(|l| self.label_position(l).unwrap_or_default())
                    .collect();
                let features = x.iter().map(|fv| self.index_features(fv)).collect();
                Ok(IndexedSequence { features, gold })
            })
            .collect()
    }

    /// Um passo de gradiente numa sequência. Retorna a log-verossimilhança.
    fn train_sequence(&mut self, sequence: &IndexedSequence, learning_rate: f64) -> f64 {
        let n = sequence.gold.len();
        let n_labels = self.labels.len();
        let emission = self.emission_scores(&sequence.features);
        let (alpha, beta, log_z) = forward_backward(&emission, &self.transition_weights);

        let gold_score: f64 = (0..n)
            .map(|i| {
                let y = sequence.gold[i];
                let trans = if i > 0 {
                    self.transition_weights[sequence.gold[i - 1]][y]
                } else {
                    0.0
                };
                emission[i][y] + trans
            })
            .sum();

        // Gradiente das transições com os pesos antigos
        let mut transition_grad = vec![vec![0.0; n_labels]; n_labels];
        for i in 1..n {
            for (prev, row) in transition_grad.iter_mut().enumerate() {
                for (y, grad) in row.iter_mut().enumerate() {
                    let marginal = (alpha[i - 1][prev]
                        + self.transition_weights[prev][y]
                        + emission[i][y]
                        + beta[i][y]
                        - log_z)
                        .exp();
                    let observed = if sequence.gold[i - 1] == prev && sequence.gold[i] == y {
                        1.0
                    } else {
                        0.0
                    };
                    *grad += observed - marginal;
                }
            }
        }

        for i in 0..n {
            for y in 0..n_labels {
                let marginal = (alpha[i][y] + beta[i][y] - log_z).exp();
                let observed = if sequence.gold[i] == y { 1.0 } else { 0.0 };
                let delta = learning_rate * (observed - marginal);
                if delta == 0.0 {
                    continue;
                }
                for &(f, value) in &sequence.features[i] {
                    self.emission_weights[f * n_labels + y] += delta * value;
                }
            }
        }

        for (row, grad_row) in self.transition_weights.iter_mut().zip(&transition_grad) {
            for (w, g) in row.iter_mut().zip(grad_row) {
                *w += learning_rate * g;
            }
        }

        gold_score - log_z
    }

    fn shrink(&mut self, factor: f64) {
        self.emission_weights.iter_mut().for_each(|w| *w *= factor);
        self.transition_weights
            .iter_mut()
            .flat_map(|row| row.iter_mut())
            .for_each(|w| *w *= factor);
    }
}

impl Default for CrfModel {
    fn default() -> Self {
        Self::new(CrfConfig::default())
    }
}

impl SequenceLearner for CrfModel {
    fn fit(&mut self, features: &[&[FeatureVector]], labels: &[&[String]]) -> Result<()> {
        let sequences = self.build_index(features, labels)?;
        if sequences.is_empty() {
            return Err(NerError::learner("CRF received no non-empty sequences"));
        }

        let mut order: Vec<usize> = (0..sequences.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        for epoch in 0..self.config.epochs {
            let learning_rate = self.config.learning_rate / (1.0 + self.config.decay * epoch as f64);
            order.shuffle(&mut rng);

            let mut log_likelihood = 0.0;
            for &idx in &order {
                log_likelihood += self.train_sequence(&sequences[idx], learning_rate);
            }

            let factor = (1.0 - learning_rate * self.config.l2).max(0.0);
            self.shrink(factor);

            debug!(
                "CRF epoch {}/{}: log-likelihood {:.4}",
                epoch + 1,
                self.config.epochs,
                log_likelihood
            );
        }
        Ok(())
    }

    fn predict(&self, features: &[&[FeatureVector]]) -> Result<Vec<Vec<String>>> {
        if !self.is_trained() {
            return Err(NerError::learner("CRF must be fitted before predicting"));
        }
        Ok(features
            .iter()
            .map(|sequence| {
                let indexed: Vec<Vec<(usize, f64)>> = sequence.iter().map(|fv| self.index_features(fv)).collect();
                let emission = self.emission_scores(&indexed);
                viterbi_decode(&emission, &self.transition_weights)
                    .best_path
                    .into_iter()
                    .map(|y| self.labels[y].clone())
                    .collect()
            })
            .collect())
    }
}

/// `log(Σ exp(x))` estável numericamente
pub fn log_sum_exp(values: impl IntoIterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.into_iter().collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Forward-backward em espaço log. Retorna `(alpha, beta, log Z)`.
fn forward_backward(emission: &[Vec<f64>], transition: &[Vec<f64>]) -> (Vec<Vec<f64>>, Vec<Vec<f64>>, f64) {
    let n = emission.len();
    let n_labels = transition.len();

    let mut alpha = vec![vec![0.0; n_labels]; n];
    alpha[0] = emission[0].clone();
    for i in 1..n {
        for y in 0..n_labels {
            alpha[i][y] = emission[i][y] + log_sum_exp((0..n_labels).map(|p| alpha[i - 1][p] + transition[p][y]));
        }
    }

    let mut beta = vec![vec![0.0; n_labels]; n];
    for i in (0..n.saturating_sub(1)).rev() {
        for y in 0..n_labels {
            beta[i][y] = log_sum_exp((0..n_labels).map(|q| transition[y][q] + emission[i + 1][q] + beta[i + 1][q]));
        }
    }

    let log_z = log_sum_exp(alpha[n - 1].iter().copied());
    (alpha, beta, log_z)
}
