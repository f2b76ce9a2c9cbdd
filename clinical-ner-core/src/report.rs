//! # Estatísticas de Validação Cruzada
//!
//! Cada fold produz um [`FoldStatistics`] (precision/recall/F1 por label, mais
//! a linha `system`). [`aggregate`] resume os folds em média, mínimo e máximo.
//!
//! As tabelas seguem o layout "org-mode":
//!
//! ```text
//! | label   |   precision |   recall |    f1 |
//! |---------+-------------+----------+-------|
//! | Drug    |       0.912 |    0.871 | 0.891 |
//! | system  |       0.912 |    0.871 | 0.891 |
//! ```

use serde::{Deserialize, Serialize};

use crate::evaluation::SYSTEM_LABEL;
use crate::metrics::Scores;
use crate::span::SpansByDocument;

/// Scores de um fold, na ordem do tagset com `system` por último.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoldStatistics {
    pub rows: Vec<(String, Scores)>,
}

impl FoldStatistics {
    pub fn get(&self, label: &str) -> Option<&Scores> {
        self.rows.iter().find(|(l, _)| l == label).map(|(_, s)| s)
    }

    pub fn system(&self) -> Scores {
        self.get(SYSTEM_LABEL).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateScores {
    pub precision_avg: f64,
    pub precision_min: f64,
    pub precision_max: f64,
    pub recall_avg: f64,
    pub recall_min: f64,
    pub recall_max: f64,
    pub f1_avg: f64,
    pub f1_min: f64,
    pub f1_max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    pub rows: Vec<(String, AggregateScores)>,
}

impl AggregateStatistics {
    pub fn get(&self, label: &str) -> Option<&AggregateScores> {
        self.rows.iter().find(|(l, _)| l == label).map(|(_, s)| s)
    }

    pub fn system(&self) -> AggregateScores {
        self.get(SYSTEM_LABEL).copied().unwrap_or_default()
    }
}

/// Média, mínimo e máximo de uma série (zeros para série vazia)
fn summarize(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (avg, min, max)
}

/// Resume os folds para cada label do tagset e para `system` (última linha).
///
/// Um label ausente de um fold conta como scores zero nesse fold.
pub fn aggregate(tagset: &[String], folds: &[FoldStatistics]) -> AggregateStatistics {
    let rows = tagset
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(SYSTEM_LABEL))
        .map(|label| {
            let scores: Vec<Scores> = folds
                .iter()
                .map(|fold| fold.get(label).copied().unwrap_or_default())
                .collect();
            let series = |f: fn(&Scores) -> f64| -> Vec<f64> { scores.iter().map(f).collect() };

            let (precision_avg, precision_min, precision_max) = summarize(&series(|s| s.precision));
            let (recall_avg, recall_min, recall_max) = summarize(&series(|s| s.recall));
            let (f1_avg, f1_min, f1_max) = summarize(&series(|s| s.f1));
            (
                label.to_string(),
                AggregateScores {
                    precision_avg,
                    precision_min,
                    precision_max,
                    recall_avg,
                    recall_min,
                    recall_max,
                    f1_avg,
                    f1_min,
                    f1_max,
                },
            )
        })
        .collect();
    AggregateStatistics { rows }
}

/// Junta os deltas de spans de cada fold, concatenando as listas de um mesmo
/// documento na ordem dos folds.
pub fn merge_span_deltas(deltas: impl IntoIterator<Item = SpansByDocument>) -> SpansByDocument {
    let mut merged = SpansByDocument::new();
    for delta in deltas {
        for (document, spans) in delta {
            merged.entry(document).or_default().extend(spans);
        }
    }
    merged
}

pub fn render_fold_table(statistics: &FoldStatistics) -> String {
    let rows = statistics
        .rows
        .iter()
        .map(|(label, s)| vec![label.clone(), fmt3(s.precision), fmt3(s.recall), fmt3(s.f1)])
        .collect::<Vec<_>>();
    org_table(&["label", "precision", "recall", "f1"], &rows)
}

pub fn render_summary_table(statistics: &AggregateStatistics) -> String {
    let rows = statistics
        .rows
        .iter()
        .map(|(label, s)| {
            vec![
                label.clone(),
                fmt3(s.precision_avg),
                fmt3(s.recall_avg),
                fmt3(s.f1_avg),
                fmt3(s.f1_min),
                fmt3(s.f1_max),
            ]
        })
        .collect::<Vec<_>>();
    org_table(
        &["label", "precision_avg", "recall_avg", "f1_avg", "f1_min", "f1_max"],
        &rows,
    )
}

fn fmt3(value: f64) -> String {
    format!("{value:.3}")
}

/// Tabela org-mode: primeira coluna alinhada à esquerda, demais à direita.
/// Cada coluna tem no mínimo a largura do cabeçalho mais 2.
fn org_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            rows.iter()
                .map(|row| row[col].chars().count())
                .chain(std::iter::once(header.chars().count() + 2))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = vec![render_row(headers.iter().copied(), &widths)];
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
    lines.push(format!("|{}|", rule.join("+")));
    for row in rows {
        lines.push(render_row(row.iter().map(String::as_str), &widths));
    }
    lines.join("\n")
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let cells: Vec<String> = cells
        .zip(widths)
        .enumerate()
        .map(|(col, (cell, &width))| {
            if col == 0 {
                format!(" {cell:<width$} ")
            } else {
                format!(" {cell:>width$} ")
            }
        })
        .collect();
    format!("|{}|", cells.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::TaggedSpan;

    fn fold(drug_f1: f64, system_f1: f64) -> FoldStatistics {
        FoldStatistics {
            rows: vec![
                (
                    "Drug".to_string(),
                    Scores {
                        precision: drug_f1,
                        recall: drug_f1,
                        f1: drug_f1,
                    },
                ),
                (
                    SYSTEM_LABEL.to_string(),
                    Scores {
                        precision: 1.0,
                        recall: 0.5,
                        f1: system_f1,
                    },
                ),
            ],
        }
    }

    #[test]
    fn test_aggregate_mean_min_max() {
        let tagset = vec!["Drug".to_string(), "Route".to_string()];
        let stats = aggregate(&tagset, &[fold(0.5, 0.6), fold(1.0, 0.8), fold(0.0, 0.7)]);

        let labels: Vec<&str> = stats.rows.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["Drug", "Route", "system"]);

        let drug = stats.get("Drug").unwrap();
        assert!((drug.f1_avg - 0.5).abs() < 1e-12);
        assert_eq!(drug.f1_min, 0.0);
        assert_eq!(drug.f1_max, 1.0);

        // Label ausente dos folds
        assert_eq!(*stats.get("Route").unwrap(), AggregateScores::default());

        let system = stats.system();
        assert!(system.f1_min <= system.f1_avg && system.f1_avg <= system.f1_max);
        assert!((system.recall_min - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_merge_concatenates_in_fold_order() {
        let mut first = SpansByDocument::new();
        first.insert("a".to_string(), vec![TaggedSpan::new("Drug", 10, 15)]);
        let mut second = SpansByDocument::new();
        second.insert("a".to_string(), vec![TaggedSpan::new("Drug", 0, 4)]);
        second.insert("b".to_string(), vec![TaggedSpan::new("Route", 3, 5)]);

        let merged = merge_span_deltas([first, second]);
        assert_eq!(
            merged["a"],
            vec![TaggedSpan::new("Drug", 10, 15), TaggedSpan::new("Drug", 0, 4)]
        );
        assert_eq!(merged["b"].len(), 1);
    }

    #[test]
    fn test_fold_table_layout() {
        let table = render_fold_table(&fold(0.5, 0.6));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "| label   |   precision |   recall |    f1 |");
        assert_eq!(lines[1], "|---------+-------------+----------+-------|");
        assert_eq!(lines[2], "| Drug    |       0.500 |    0.500 | 0.500 |");
        assert_eq!(lines[3], "| system  |       1.000 |    0.500 | 0.600 |");
    }

    #[test]
    fn test_summary_table_has_all_rows() {
        let stats = aggregate(&["Drug".to_string()], &[fold(0.5, 0.6)]);
        let table = render_summary_table(&stats);
        assert_eq!(table.lines().count(), 4);
        assert!(table.lines().next().unwrap().contains("f1_max"));
    }
}
