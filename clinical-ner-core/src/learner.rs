//! # Learners de Sequência
//!
//! Um learner recebe sequências de [`FeatureVector`] (uma por sentença) e as
//! tags correspondentes, e depois prediz tags para novas sequências.
//!
//! ## Persistência
//!
//! Os learners diferem na forma como são salvos em disco, e isso é expresso
//! pela variante de [`Learner`], não pelo nome do learner:
//!
//! - [`Learner::Picklable`]: o modelo é serializado de forma uniforme
//!   (JSON via `serde`) por quem o possui.
//! - [`Learner::SelfPersisting`]: o learner sabe salvar e carregar a si mesmo,
//!   no formato que escolher.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crf::CrfModel;
use crate::error::{NerError, Result};
use crate::features::FeatureVector;

/// Interface comum de treino e predição.
pub trait SequenceLearner: Send {
    /// Treina com sequências de features e as tags paralelas.
    fn fit(&mut self, features: &[&[FeatureVector]], labels: &[&[String]]) -> Result<()>;

    /// Prediz uma tag por token para cada sequência.
    fn predict(&self, features: &[&[FeatureVector]]) -> Result<Vec<Vec<String>>>;
}

/// Learner que controla a própria persistência.
pub trait SelfPersistingLearner: SequenceLearner {
    fn save(&self, path: &Path) -> Result<()>;
    fn load(&mut self, path: &Path) -> Result<()>;
}

/// Learners serializados uniformemente pelo [`Model`](crate::model::Model).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "learner", content = "model", rename_all = "snake_case")]
pub enum PicklableLearner {
    Crf(CrfModel),
}

impl SequenceLearner for PicklableLearner {
    fn fit(&mut self, features: &[&[FeatureVector]], labels: &[&[String]]) -> Result<()> {
        match self {
            PicklableLearner::Crf(crf) => crf.fit(features, labels),
        }
    }

    fn predict(&self, features: &[&[FeatureVector]]) -> Result<Vec<Vec<String>>> {
        match self {
            PicklableLearner::Crf(crf) => crf.predict(features),
        }
    }
}

/// Um learner pronto para uso, etiquetado pela sua forma de persistência.
pub enum Learner {
    Picklable(PicklableLearner),
    SelfPersisting(Box<dyn SelfPersistingLearner>),
}

impl Learner {
    /// Salva o learner em `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        match self {
            Learner::Picklable(learner) => {
                let json = serde_json::to_string(learner)?;
                fs::write(path, json).map_err(|e| NerError::io(path, e))
            }
            Learner::SelfPersisting(learner) => learner.save(path),
        }
    }

    /// Carrega os pesos salvos em `path` para dentro desta instância (recém
    /// criada pela fábrica do pipeline).
    pub fn load(&mut self, path: &Path) -> Result<()> {
        match self {
            Learner::Picklable(learner) => {
                let content = fs::read_to_string(path).map_err(|e| NerError::io(path, e))?;
                *learner = serde_json::from_str(&content)?;
                Ok(())
            }
            Learner::SelfPersisting(learner) => learner.load(path),
        }
    }

    pub fn is_self_persisting(&self) -> bool {
        matches!(self, Learner::SelfPersisting(_))
    }
}

impl SequenceLearner for Learner {
    fn fit(&mut self, features: &[&[FeatureVector]], labels: &[&[String]]) -> Result<()> {
        if features.len() != labels.len() {
            return Err(NerError::invalid_argument(format!(
                "{} feature sequences but {} label sequences",
                features.len(),
                labels.len()
            )));
        }
        match self {
            Learner::Picklable(learner) => learner.fit(features, labels),
            Learner::SelfPersisting(learner) => learner.fit(features, labels),
        }
    }

    fn predict(&self, features: &[&[FeatureVector]]) -> Result<Vec<Vec<String>>> {
        let predictions = match self {
            Learner::Picklable(learner) => learner.predict(features)?,
            Learner::SelfPersisting(learner) => learner.predict(features)?,
        };
        if predictions.len() != features.len()
            || predictions.iter().zip(features).any(|(p, f)| p.len() != f.len())
        {
            return Err(NerError::learner("predictions are not aligned with the input sequences"));
        }
        Ok(predictions)
    }
}

impl std::fmt::Debug for Learner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Learner::Picklable(learner) => f.debug_tuple("Picklable").field(learner).finish(),
            Learner::SelfPersisting(_) => f.write_str("SelfPersisting(..)"),
        }
    }
}
