//! # Configuração
//!
//! Parâmetros do pipeline e da validação cruzada. Todos os campos têm valor
//! padrão (`#[serde(default)]`), então um JSON parcial é aceito:
//!
//! ```json
//! { "learner": "perceptron", "window_size": 1, "entities": ["Drug", "Dosage"] }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NerError, Result};

/// Qual learner o pipeline fabrica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerKind {
    #[default]
    Crf,
    Perceptron,
}

impl LearnerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LearnerKind::Crf => "CRF",
            LearnerKind::Perceptron => "AveragedPerceptron",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrfConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Coeficiente da regularização L2
    pub l2: f64,
    /// Decaimento da taxa de aprendizado: `lr / (1 + decay * epoch)`
    pub decay: f64,
    pub seed: u64,
}

impl Default for CrfConfig {
    fn default() -> Self {
        Self {
            epochs: 30,
            learning_rate: 0.1,
            l2: 0.001,
            decay: 0.1,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptronConfig {
    pub iterations: usize,
    pub seed: u64,
}

impl Default for PerceptronConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Quantos tokens de cada lado entram nas features de contexto
    pub window_size: usize,
    pub learner: LearnerKind,
    pub crf: CrfConfig,
    pub perceptron: PerceptronConfig,
    /// Lista de entidades aceitas; labels fora dela viram "O".
    pub entities: Option<Vec<String>>,
    /// Threads usadas no pré-processamento assíncrono
    pub n_jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: 2,
            learner: LearnerKind::default(),
            crf: CrfConfig::default(),
            perceptron: PerceptronConfig::default(),
            entities: None,
            n_jobs: default_jobs(),
        }
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| NerError::io(path, e))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_jobs == 0 {
            return Err(NerError::configuration("n_jobs must be at least 1"));
        }
        if self.crf.learning_rate <= 0.0 {
            return Err(NerError::configuration("crf.learning_rate must be positive"));
        }
        if matches!(&self.entities, Some(e) if e.is_empty()) {
            return Err(NerError::configuration("entities whitelist is empty"));
        }
        Ok(())
    }
}

/// Destino de um conjunto de anotações geradas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputDirectory {
    /// Subdiretório do dataset de treino (`predictions/` ou `groundtruth/`)
    Default,
    At(PathBuf),
}

impl OutputDirectory {
    pub fn resolve(&self, data_directory: &Path, default_name: &str) -> PathBuf {
        match self {
            OutputDirectory::Default => data_directory.join(default_name),
            OutputDirectory::At(path) => path.clone(),
        }
    }
}

/// Opções de [`Model::cross_validate`](crate::model::Model::cross_validate)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossValidationOptions {
    pub num_folds: usize,
    /// Semente do embaralhamento dos estratos
    pub seed: u64,
    pub training_dataset: Option<PathBuf>,
    pub prediction_directory: Option<OutputDirectory>,
    pub groundtruth_directory: Option<OutputDirectory>,
    /// Pré-processa os documentos em paralelo
    pub asynchronous: bool,
}

impl Default for CrossValidationOptions {
    fn default() -> Self {
        Self {
            num_folds: 5,
            seed: 0,
            training_dataset: None,
            prediction_directory: None,
            groundtruth_directory: None,
            asynchronous: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"learner": "perceptron", "crf": {"epochs": 3}}"#).unwrap();
        assert_eq!(config.learner, LearnerKind::Perceptron);
        assert_eq!(config.crf.epochs, 3);
        assert_eq!(config.crf.learning_rate, 0.1);
        assert_eq!(config.window_size, 2);
        assert!(config.entities.is_none());
    }

    #[test]
    fn test_from_json_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"n_jobs": 0}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&path),
            Err(NerError::Configuration(_))
        ));

        fs::write(&path, r#"{"entities": ["Drug"]}"#).unwrap();
        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.entities, Some(vec!["Drug".to_string()]));
    }

    #[test]
    fn test_cross_validation_defaults() {
        let options = CrossValidationOptions::default();
        assert_eq!(options.num_folds, 5);
        assert!(!options.asynchronous);
    }

    #[test]
    fn test_output_directory_resolution() {
        let data = Path::new("/data/notes");
        assert_eq!(
            OutputDirectory::Default.resolve(data, "predictions"),
            PathBuf::from("/data/notes/predictions")
        );
        assert_eq!(
            OutputDirectory::At(PathBuf::from("/tmp/out")).resolve(data, "predictions"),
            PathBuf::from("/tmp/out")
        );

        let options: CrossValidationOptions =
            serde_json::from_str(r#"{"prediction_directory": "default", "groundtruth_directory": {"at": "/tmp/gt"}}"#)
                .unwrap();
        assert_eq!(options.prediction_directory, Some(OutputDirectory::Default));
        assert_eq!(
            options.groundtruth_directory,
            Some(OutputDirectory::At(PathBuf::from("/tmp/gt")))
        );
    }
}
