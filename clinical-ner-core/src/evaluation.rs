//! # Avaliação de um Fold
//!
//! Para cada fold:
//!
//! 1. Pede ao pipeline um learner **novo** (sem estado de folds anteriores).
//! 2. Treina nas sequências de treino e prediz as de teste.
//! 3. Calcula precision/recall/F1 para cada label do tagset e para o
//!    sistema inteiro (`"system"`, média ponderada sobre todo o tagset).
//! 4. Opcionalmente reconstrói as menções gold e preditas por documento.
//!
//! O fold não altera nenhum estado compartilhado: as menções são devolvidas
//! no [`FoldOutcome`] e o chamador as junta depois.

use std::collections::BTreeSet;

use tracing::info;

use crate::error::Result;
use crate::learner::SequenceLearner;
use crate::metrics::flat_scores;
use crate::pipeline::{ExtractedData, Pipeline};
use crate::report::{render_fold_table, FoldStatistics};
use crate::span::{is_outside, reconstruct_spans, SpansByDocument};
use crate::split::Fold;

/// Linha sintética com os scores do sistema inteiro.
pub const SYSTEM_LABEL: &str = "system";

/// Resultado de um fold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoldOutcome {
    pub statistics: FoldStatistics,
    /// Menções preditas do fold (quando pedidas)
    pub predicted_spans: Option<SpansByDocument>,
    pub gold_spans: Option<SpansByDocument>,
}

/// Todas as tags de entidade presentes, em ordem lexicográfica.
pub fn tagset<S: AsRef<[String]>>(labels: &[S]) -> Vec<String> {
    labels
        .iter()
        .flat_map(|s| s.as_ref().iter())
        .filter(|l| !is_outside(l))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct FoldEvaluator<'a, P: Pipeline + ?Sized> {
    pipeline: &'a P,
    data: &'a ExtractedData,
    tagset: Vec<String>,
    collect_spans: bool,
}

impl<'a, P: Pipeline + ?Sized> FoldEvaluator<'a, P> {
    /// O tagset é calculado uma vez sobre o dataset inteiro.
    pub fn new(pipeline: &'a P, data: &'a ExtractedData, collect_spans: bool) -> Self {
        Self {
            pipeline,
            data,
            tagset: tagset(&data.labels),
            collect_spans,
        }
    }

    pub fn tagset(&self) -> &[String] {
        &self.tagset
    }

    /// Treina e avalia um fold.
    ///
    /// # Erros
    /// Falhas do learner (incluindo predições desalinhadas) abortam o fold.
    pub fn evaluate(&self, fold_index: usize, fold: &Fold) -> Result<FoldOutcome> {
        let (learner_name, mut learner) = self.pipeline.get_learner();
        info!(
            "Fold {}: training {} on {} sequences, testing on {}",
            fold_index + 1,
            learner_name,
            fold.train.len(),
            fold.test.len()
        );

        learner.fit(&self.data.features_at(&fold.train), &self.data.labels_at(&fold.train))?;
        let predicted = learner.predict(&self.data.features_at(&fold.test))?;
        let gold = self.data.labels_at(&fold.test);

        let mut rows = Vec::with_capacity(self.tagset.len() + 1);
        for label in &self.tagset {
            let scores = flat_scores(&gold, &predicted, std::slice::from_ref(label))?;
            rows.push((label.clone(), scores));
        }
        rows.push((SYSTEM_LABEL.to_string(), flat_scores(&gold, &predicted, &self.tagset)?));
        let statistics = FoldStatistics { rows };

        info!("Fold {} results:\n{}", fold_index + 1, render_fold_table(&statistics));

        let (predicted_spans, gold_spans) = if self.collect_spans {
            let mut spans = Vec::new();
            let mut documents = Vec::new();
            for &i in &fold.test {
                let sequence = &self.data.sequences[i];
                spans.extend_from_slice(&sequence.spans);
                documents.extend(std::iter::repeat(sequence.document.as_str()).take(sequence.len()));
            }
            let flat_gold: Vec<&str> = gold.iter().flat_map(|s| s.iter().map(String::as_str)).collect();
            let flat_predicted: Vec<&str> = predicted.iter().flatten().map(String::as_str).collect();
            (
                Some(reconstruct_spans(&flat_predicted, &spans, &documents)?),
                Some(reconstruct_spans(&flat_gold, &spans, &documents)?),
            )
        } else {
            (None, None)
        };

        Ok(FoldOutcome {
            statistics,
            predicted_spans,
            gold_spans,
        })
    }
}
