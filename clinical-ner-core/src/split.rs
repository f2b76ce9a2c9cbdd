//! # K-Fold Estratificado para Sequências
//!
//! Em NER quase todos os tokens são `O`; um k-fold aleatório pode facilmente
//! deixar um fold sem nenhum exemplo de uma entidade rara. Este splitter
//! estratifica por **sequência**:
//!
//! 1. Conta a frequência global (em tokens) de cada label de entidade.
//! 2. Cada sequência recebe como estrato o seu label **mais raro**
//!    (empates: ordem lexicográfica). Sequências só com `O` formam o estrato `O`.
//! 3. Os estratos são percorridos do menor para o maior; dentro de cada um os
//!    índices são embaralhados (semente fixa) e distribuídos em round-robin
//!    entre os folds. O cursor do round-robin continua de um estrato para o
//!    outro, então os tamanhos dos folds diferem em no máximo 1.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NerError, Result};
use crate::span::{is_outside, OUTSIDE};

/// Um par (treino, teste) de índices de sequências, ambos ordenados.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct SequenceStratifiedKFold {
    folds: usize,
    seed: u64,
}

impl SequenceStratifiedKFold {
    /// # Erros
    /// [`NerError::InvalidArgument`] se `folds <= 1`.
    pub fn new(folds: usize, seed: u64) -> Result<Self> {
        if folds <= 1 {
            return Err(NerError::invalid_argument(format!(
                "number of folds must be greater than 1, got {folds}"
            )));
        }
        Ok(Self { folds, seed })
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Particiona as sequências (representadas pelas suas tags) em folds.
    ///
    /// # Erros
    /// [`NerError::Configuration`] se houver menos sequências ou menos
    /// estratos que folds.
    pub fn split<S: AsRef<[String]>>(&self, labels: &[S]) -> Result<Vec<Fold>> {
        let n = labels.len();
        if self.folds > n {
            return Err(NerError::configuration(format!(
                "cannot split {n} sequences into {} folds",
                self.folds
            )));
        }

        let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for sequence in labels {
            for label in sequence.as_ref() {
                if !is_outside(label) {
                    *frequency.entry(label.as_str()).or_insert(0) += 1;
                }
            }
        }

        let mut strata: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (index, sequence) in labels.iter().enumerate() {
            let rarest = sequence
                .as_ref()
                .iter()
                .filter(|l| !is_outside(l))
                .map(|l| (frequency[l.as_str()], l.as_str()))
                .min()
                .map(|(_, label)| label)
                .unwrap_or(OUTSIDE);
            strata.entry(rarest).or_default().push(index);
        }

        if self.folds > strata.len() {
            return Err(NerError::configuration(format!(
                "cannot split {} stratification classes into {} folds",
                strata.len(),
                self.folds
            )));
        }

        let mut ordered: Vec<(&str, Vec<usize>)> = strata.into_iter().collect();
        ordered.sort_by(|a, b| a.1.len().cmp(&b.1.len()).then(a.0.cmp(b.0)));

        debug!(
            "Stratification: {}",
            ordered
                .iter()
                .map(|(label, members)| format!("{label}={}", members.len()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut test_sets: Vec<Vec<usize>> = vec![Vec::new(); self.folds];
        let mut cursor = 0usize;
        for (_, mut members) in ordered {
            members.shuffle(&mut rng);
            for index in members {
                test_sets[cursor % self.folds].push(index);
                cursor += 1;
            }
        }

        let folds = test_sets
            .into_iter()
            .map(|mut test| {
                test.sort_unstable();
                let mut in_test = vec![false; n];
                for &i in &test {
                    in_test[i] = true;
                }
                let train = (0..n).filter(|&i| !in_test[i]).collect();
                Fold { train, test }
            })
            .collect();
        Ok(folds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{quickcheck, TestResult};

    fn dataset(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|s| s.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_rejects_single_fold() {
        assert!(matches!(
            SequenceStratifiedKFold::new(1, 0),
            Err(NerError::InvalidArgument(_))
        ));
        assert!(SequenceStratifiedKFold::new(0, 0).is_err());
    }

    #[test]
    fn test_rejects_more_folds_than_sequences() {
        let data = dataset(&[&["O"], &["Drug"]]);
        let kfold = SequenceStratifiedKFold::new(3, 0).unwrap();
        assert!(matches!(kfold.split(&data), Err(NerError::Configuration(_))));
    }

    #[test]
    fn test_rejects_more_folds_than_strata() {
        let data = dataset(&[&["O"], &["O", "O"], &["O"], &["O"], &["O", "O"], &["O"]]);
        let kfold = SequenceStratifiedKFold::new(3, 0).unwrap();
        assert!(matches!(kfold.split(&data), Err(NerError::Configuration(_))));

        let data = dataset(&[&["O"], &["Drug"], &["O"], &["Drug", "O"], &["O"], &["Drug"]]);
        assert!(kfold.split(&data).is_err());
        assert_eq!(SequenceStratifiedKFold::new(2, 0).unwrap().split(&data).unwrap().len(), 2);
    }

    #[test]
    fn test_rare_label_spread_across_folds() {
        // 4 sequências com "Route" (raro), 4 só com "Drug", 6 com "Reason", 6 só com O
        let mut raw: Vec<&[&str]> = Vec::new();
        for _ in 0..4 {
            raw.push(&["Drug", "Route", "O"]);
        }
        for _ in 0..4 {
            raw.push(&["Drug", "O"]);
        }
        for _ in 0..6 {
            raw.push(&["Reason", "O"]);
        }
        for _ in 0..6 {
            raw.push(&["O", "O"]);
        }
        let data = dataset(&raw);
        let folds = SequenceStratifiedKFold::new(4, 7).unwrap().split(&data).unwrap();

        for fold in &folds {
            let with_route = fold.test.iter().filter(|&&i| data[i].iter().any(|l| l == "Route")).count();
            assert_eq!(with_route, 1);
            assert_eq!(fold.test.len(), 5);
            assert_eq!(fold.train.len(), 15);
        }
    }

    #[test]
    fn test_same_seed_same_partition() {
        let data = dataset(&[&["Drug"], &["O"], &["Dose"], &["Drug", "Dose"], &["O"], &["Drug"]]);
        let a = SequenceStratifiedKFold::new(3, 42).unwrap().split(&data).unwrap();
        let b = SequenceStratifiedKFold::new(3, 42).unwrap().split(&data).unwrap();
        assert_eq!(a, b);
    }

    quickcheck! {
        fn prop_folds_partition_indices(raw: Vec<Vec<u8>>, k: u8, seed: u64) -> TestResult {
            let k = (k % 2) as usize + 2;
            if raw.len() < k {
                return TestResult::discard();
            }
            let data: Vec<Vec<String>> = raw
                .iter()
                .map(|seq| seq.iter().map(|b| match b % 4 {
                    0 | 1 => "O".to_string(),
                    2 => "Drug".to_string(),
                    _ => "Reason".to_string(),
                }).collect())
                .collect();

            let folds = match SequenceStratifiedKFold::new(k, seed).unwrap().split(&data) {
                Ok(f) => f,
                // poucos estratos para k
                Err(NerError::Configuration(_)) => return TestResult::discard(),
                Err(_) => return TestResult::failed(),
            };
            if folds.len() != k {
                return TestResult::failed();
            }

            let mut seen = vec![0usize; data.len()];
            for fold in &folds {
                for &i in &fold.test {
                    seen[i] += 1;
                }
                let mut all: Vec<usize> = fold.train.iter().chain(&fold.test).copied().collect();
                all.sort_unstable();
                if all != (0..data.len()).collect::<Vec<_>>() {
                    return TestResult::failed();
                }
            }
            TestResult::from_bool(seen.iter().all(|&c| c == 1))
        }
    }
}
