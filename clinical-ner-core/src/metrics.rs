//! # Métricas por Token (precision / recall / F1 ponderados)
//!
//! As sequências gold e preditas são achatadas (concatenadas) e comparadas
//! token a token. Para cada label do subconjunto pedido:
//!
//! ```text
//! precision_l = tp_l / predicted_l
//! recall_l    = tp_l / support_l
//! f1_l        = 2 * p * r / (p + r)
//! ```
//!
//! A média ponderada usa o *support* (ocorrências gold) de cada label como
//! peso. Divisões por zero resultam em `0.0`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{NerError, Result};

/// Precision, recall e F1 de um label (ou do sistema).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    true_positive: usize,
    predicted: usize,
    support: usize,
}

fn divide(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn f_measure(precision: f64, recall: f64) -> f64 {
    divide(2.0 * precision * recall, precision + recall)
}

fn count_labels<G, P>(gold: &[G], predicted: &[P], labels: &[String]) -> Result<BTreeMap<String, Counts>>
where
    G: AsRef<[String]>,
    P: AsRef<[String]>,
{
    if gold.len() != predicted.len() {
        return Err(NerError::invalid_argument(format!(
            "gold has {} sequences but predictions have {}",
            gold.len(),
            predicted.len()
        )));
    }

    let mut counts: BTreeMap<String, Counts> = labels.iter().map(|l| (l.clone(), Counts::default())).collect();

    for (seq_idx, (gold_seq, pred_seq)) in gold.iter().zip(predicted).enumerate() {
        let (gold_seq, pred_seq) = (gold_seq.as_ref(), pred_seq.as_ref());
        if gold_seq.len() != pred_seq.len() {
            return Err(NerError::invalid_argument(format!(
                "sequence {} has {} gold labels but {} predictions",
                seq_idx,
                gold_seq.len(),
                pred_seq.len()
            )));
        }
        for (g, p) in gold_seq.iter().zip(pred_seq) {
            if let Some(c) = counts.get_mut(g) {
                c.support += 1;
                if g == p {
                    c.true_positive += 1;
                }
            }
            if let Some(c) = counts.get_mut(p) {
                c.predicted += 1;
            }
        }
    }
    Ok(counts)
}

/// Calcula precision, recall e F1 ponderados pelo support, restritos a
/// `labels`.
///
/// Labels repetidos em `labels` contam uma única vez.
pub fn flat_scores<G, P>(gold: &[G], predicted: &[P], labels: &[String]) -> Result<Scores>
where
    G: AsRef<[String]>,
    P: AsRef<[String]>,
{
    let counts = count_labels(gold, predicted, labels)?;

    let total_support: usize = counts.values().map(|c| c.support).sum();
    if total_support == 0 {
        return Ok(Scores::default());
    }

    let mut weighted = Scores::default();
    for c in counts.values() {
        let precision = divide(c.true_positive as f64, c.predicted as f64);
        let recall = divide(c.true_positive as f64, c.support as f64);
        let weight = c.support as f64;
        weighted.precision += weight * precision;
        weighted.recall += weight * recall;
        weighted.f1 += weight * f_measure(precision, recall);
    }
    let total = total_support as f64;
    Ok(Scores {
        precision: weighted.precision / total,
        recall: weighted.recall / total,
        f1: weighted.f1 / total,
    })
}

pub fn flat_precision_score<G, P>(gold: &[G], predicted: &[P], labels: &[String]) -> Result<f64>
where
    G: AsRef<[String]>,
    P: AsRef<[String]>,
{
    Ok(flat_scores(gold, predicted, labels)?.precision)
}

pub fn flat_recall_score<G, P>(gold: &[G], predicted: &[P], labels: &[String]) -> Result<f64>
where
    G: AsRef<[String]>,
    P: AsRef<[String]>,
{
    Ok(flat_scores(gold, predicted, labels)?.recall)
}

pub fn flat_f1_score<G, P>(gold: &[G], predicted: &[P], labels: &[String]) -> Result<f64>
where
    G: AsRef<[String]>,
    P: AsRef<[String]>,
{
    Ok(flat_scores(gold, predicted, labels)?.f1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seqs(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|s| s.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_label_scores() {
        let gold = seqs(&[&["Drug", "O", "Drug"], &["Drug", "O"]]);
        let pred = seqs(&[&["Drug", "Drug", "O"], &["Drug", "O"]]);
        let s = flat_scores(&gold, &pred, &labels(&["Drug"])).unwrap();
        // tp=2, predicted=3, support=3
        assert!((s.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((s.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((s.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_average_over_labels() {
        // Drug: tp=2 pred=2 support=3 -> p=1, r=2/3
        // Dose: tp=1 pred=2 support=1 -> p=1/2, r=1
        let gold = seqs(&[&["Drug", "Drug", "Drug", "Dose", "O"]]);
        let pred = seqs(&[&["Drug", "Drug", "O", "Dose", "Dose"]]);
        let s = flat_scores(&gold, &pred, &labels(&["Dose", "Drug"])).unwrap();

        let p = (3.0 * 1.0 + 1.0 * 0.5) / 4.0;
        let r = (3.0 * (2.0 / 3.0) + 1.0 * 1.0) / 4.0;
        let f_drug = 2.0 * 1.0 * (2.0 / 3.0) / (1.0 + 2.0 / 3.0);
        let f_dose = 2.0 * 0.5 * 1.0 / 1.5;
        let f = (3.0 * f_drug + 1.0 * f_dose) / 4.0;
        assert!((s.precision - p).abs() < 1e-12);
        assert!((s.recall - r).abs() < 1e-12);
        assert!((s.f1 - f).abs() < 1e-12);
        assert!((flat_f1_score(&gold, &pred, &labels(&["Dose", "Drug"])).unwrap() - f).abs() < 1e-12);
    }

    #[test]
    fn test_zero_support_is_zero() {
        let gold = seqs(&[&["O", "O"]]);
        let pred = seqs(&[&["Drug", "O"]]);
        let s = flat_scores(&gold, &pred, &labels(&["Drug"])).unwrap();
        assert_eq!(s, Scores::default());
    }

    #[test]
    fn test_no_predictions_gives_zero_precision() {
        let gold = seqs(&[&["Drug", "O"]]);
        let pred = seqs(&[&["O", "O"]]);
        assert_eq!(flat_precision_score(&gold, &pred, &labels(&["Drug"])).unwrap(), 0.0);
        assert_eq!(flat_recall_score(&gold, &pred, &labels(&["Drug"])).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let gold = seqs(&[&["Drug", "O"]]);
        let pred = seqs(&[&["Drug"]]);
        assert!(flat_scores(&gold, &pred, &labels(&["Drug"])).is_err());
        assert!(flat_scores(&gold, &seqs(&[]), &labels(&["Drug"])).is_err());
    }
}
