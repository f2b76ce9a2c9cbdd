//! # Pipeline de Extração
//!
//! O pipeline transforma um [`Document`] em sequências rotuladas:
//!
//! 1. Tokenização do texto bruto.
//! 2. Segmentação em sentenças (uma sequência por sentença).
//! 3. Extração de features para cada token.
//! 4. Rótulo gold de cada token a partir das anotações `.ann`.
//!
//! Ele também é a fábrica de learners: cada chamada a
//! [`Pipeline::get_learner`] devolve um learner novo, sem estado de treino.
//!
//! A extração é uma função pura: o resultado ([`ExtractedData`]) pertence a
//! quem chamou e nunca fica guardado no modelo.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{LearnerKind, PipelineConfig};
use crate::crf::CrfModel;
use crate::dataset::Document;
use crate::error::Result;
use crate::features::{extract_features, FeatureVector, FEATURE_GROUPS};
use crate::learner::{Learner, PicklableLearner};
use crate::perceptron::PerceptronModel;
use crate::span::{Span, OUTSIDE};
use crate::tokenizer::{split_sentences, tokenize};

/// Features, spans e documento de uma sentença.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceFeatures {
    pub features: Vec<FeatureVector>,
    pub spans: Vec<Span>,
    pub document: String,
}

impl SequenceFeatures {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Resultado do pré-processamento: sequências e tags paralelas.
///
/// Invariante: `sequences[i].features.len() == sequences[i].spans.len() == labels[i].len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub sequences: Vec<SequenceFeatures>,
    pub labels: Vec<Vec<String>>,
}

impl ExtractedData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sequence: SequenceFeatures, labels: Vec<String>) {
        self.sequences.push(sequence);
        self.labels.push(labels);
    }

    pub fn extend(&mut self, other: ExtractedData) {
        self.sequences.extend(other.sequences);
        self.labels.extend(other.labels);
    }

    /// Número de sequências
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn num_tokens(&self) -> usize {
        self.labels.iter().map(Vec::len).sum()
    }

    /// Features das sequências nos índices dados, na ordem dada
    pub fn features_at(&self, indices: &[usize]) -> Vec<&[FeatureVector]> {
        indices.iter().map(|&i| self.sequences[i].features.as_slice()).collect()
    }

    pub fn labels_at(&self, indices: &[usize]) -> Vec<&[String]> {
        indices.iter().map(|&i| self.labels[i].as_slice()).collect()
    }

    pub fn all_features(&self) -> Vec<&[FeatureVector]> {
        self.sequences.iter().map(|s| s.features.as_slice()).collect()
    }

    pub fn all_labels(&self) -> Vec<&[String]> {
        self.labels.iter().map(Vec::as_slice).collect()
    }
}

/// Resumo de um pipeline (para `Model::info` e a CLI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInformation {
    pub pipeline: String,
    pub learner: String,
    pub description: String,
    pub features: Vec<String>,
    pub window_size: usize,
}

impl fmt::Display for PipelineInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pipeline:    {}", self.pipeline)?;
        writeln!(f, "learner:     {}", self.learner)?;
        writeln!(f, "description: {}", self.description)?;
        writeln!(f, "window_size: {}", self.window_size)?;
        write!(f, "features:    {}", self.features.join(", "))
    }
}

/// Um pipeline NER: extrator de features + fábrica de learners.
pub trait Pipeline: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> String;

    /// Um learner novo, com o seu nome.
    fn get_learner(&self) -> (String, Learner);

    /// Extrai as sequências de um documento. Sem anotações gold, todos os
    /// tokens recebem `"O"`.
    fn extract(&self, document: &Document) -> Result<ExtractedData>;

    fn information(&self) -> PipelineInformation;
}

/// Pipeline padrão para notas clínicas.
#[derive(Debug, Clone, Default)]
pub struct ClinicalPipeline {
    pub config: PipelineConfig,
}

impl ClinicalPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Aplica a lista de entidades aceitas, se houver.
    fn filter_label(&self, label: &str) -> String {
        match &self.config.entities {
            Some(entities) if !entities.iter().any(|e| e == label) => OUTSIDE.to_string(),
            _ => label.to_string(),
        }
    }
}

impl Pipeline for ClinicalPipeline {
    fn name(&self) -> &str {
        "clinical"
    }

    fn description(&self) -> String {
        format!(
            "Clinical notes: sentence-level sequences, lexical/shape/context features (window {}), {} learner",
            self.config.window_size,
            self.config.learner.name()
        )
    }

    fn get_learner(&self) -> (String, Learner) {
        let learner = match self.config.learner {
            LearnerKind::Crf => Learner::Picklable(PicklableLearner::Crf(CrfModel::new(self.config.crf.clone()))),
            LearnerKind::Perceptron => {
                Learner::SelfPersisting(Box::new(PerceptronModel::new(self.config.perceptron.clone())))
            }
        };
        (self.config.learner.name().to_string(), learner)
    }

    fn extract(&self, document: &Document) -> Result<ExtractedData> {
        let tokens = tokenize(&document.text);
        let mut data = ExtractedData::new();

        for range in split_sentences(&document.text, &tokens) {
            let sentence = &tokens[range];
            let features = extract_features(sentence, self.config.window_size, document.lexicon.as_ref());
            let spans = sentence.iter().map(|t| Span::new(t.start, t.end)).collect();
            let labels = sentence
                .iter()
                .map(|t| {
                    document
                        .annotations
                        .as_ref()
                        .and_then(|ann| ann.label_covering(t.start, t.end))
                        .map(|label| self.filter_label(label))
                        .unwrap_or_else(|| OUTSIDE.to_string())
                })
                .collect();
            data.push(
                SequenceFeatures {
                    features,
                    spans,
                    document: document.id.clone(),
                },
                labels,
            );
        }
        Ok(data)
    }

    fn information(&self) -> PipelineInformation {
        PipelineInformation {
            pipeline: self.name().to_string(),
            learner: self.config.learner.name().to_string(),
            description: self.description(),
            features: FEATURE_GROUPS.iter().map(|g| g.to_string()).collect(),
            window_size: self.config.window_size,
        }
    }
}
