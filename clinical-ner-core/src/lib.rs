//! # clinical-ner-core — Treino e Validação Cruzada de NER Clínico
//!
//! Este crate treina reconhecedores de entidades (medicamentos, doses, vias,
//! frequências, indicações...) em notas clínicas e os avalia por validação
//! cruzada estratificada.
//!
//! ## Arquitetura do Sistema
//!
//! 1.  **Dataset** ([`dataset`]): diretório com `.txt` e anotações `.ann` ([`annotation`]).
//! 2.  **Pipeline** ([`pipeline`]): tokenização ([`tokenizer`]), sentenças e
//!     features ([`features`]); também fabrica os learners.
//! 3.  **Learners** ([`learner`]): CRF linear-chain ([`crf`] + [`viterbi`]) ou
//!     Averaged Perceptron ([`perceptron`]).
//! 4.  **Validação cruzada**:
//!     *   k-fold estratificado por sequência ([`split`]);
//!     *   avaliação por fold ([`evaluation`]) com métricas ponderadas ([`metrics`]);
//!     *   reconstrução de menções ([`span`]);
//!     *   agregação e tabelas ([`report`]);
//!     *   escrita de `predictions/` e `groundtruth/` ([`writer`]).
//! 5.  **Orquestração** ([`model`]): `fit`, `predict`, `cross_validate`, `dump`, `load`.
//!
//! ## Exemplo de Uso
//!
//! ```no_run
//! use clinical_ner_core::{ClinicalPipeline, CrossValidationOptions, Model, OutputDirectory};
//!
//! let model = Model::new(ClinicalPipeline::default());
//! let options = CrossValidationOptions {
//!     num_folds: 5,
//!     training_dataset: Some("notes/".into()),
//!     prediction_directory: Some(OutputDirectory::Default),
//!     ..CrossValidationOptions::default()
//! };
//! let result = model.cross_validate(&options)?;
//! println!("system F1: {:.3}", result.statistics.system().f1_avg);
//! # Ok::<(), clinical_ner_core::NerError>(())
//! ```

pub mod annotation;
pub mod config;
pub mod corpus;
pub mod crf;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod learner;
pub mod metrics;
pub mod model;
pub mod perceptron;
pub mod pipeline;
pub mod report;
pub mod span;
pub mod split;
pub mod tokenizer;
pub mod viterbi;
pub mod writer;

pub use annotation::{Annotations, EntityAnnotation};
pub use config::{CrossValidationOptions, LearnerKind, OutputDirectory, PipelineConfig};
pub use dataset::{Dataset, Document};
pub use error::{NerError, Result};
pub use learner::{Learner, SequenceLearner};
pub use model::{CrossValidationResult, Model};
pub use pipeline::{ClinicalPipeline, ExtractedData, Pipeline};
pub use span::{Span, TaggedSpan};
pub use split::{Fold, SequenceStratifiedKFold};
