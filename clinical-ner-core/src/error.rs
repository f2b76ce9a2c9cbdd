//! # Erros do clinical-ner-core
//!
//! Todas as operações falíveis do crate retornam [`Result`]. Não há política de
//! retentativa: uma falha em qualquer fold aborta a validação cruzada inteira.

use std::path::PathBuf;

use thiserror::Error;

/// Atalho para resultados do crate.
pub type Result<T> = std::result::Result<T, NerError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NerError {
    /// Combinação de parâmetros inválida (ex: `num_folds <= 1`, diretório de
    /// predições sem dataset de treino, predição sem modelo treinado).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Argumento inválido para uma função isolada (ex: vetores desalinhados).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A extração de features não produziu nenhuma sequência.
    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Linha malformada num arquivo de anotação `.ann`.
    #[error("Annotation error: {0}")]
    Annotation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Falha do learner durante `fit` ou `predict`.
    #[error("Learner error: {0}")]
    Learner(String),
}

impl NerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        NerError::Configuration(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        NerError::InvalidArgument(msg.into())
    }

    pub fn empty_data(msg: impl Into<String>) -> Self {
        NerError::EmptyData(msg.into())
    }

    pub fn learner(msg: impl Into<String>) -> Self {
        NerError::Learner(msg.into())
    }

    /// Envolve um `std::io::Error` com o caminho que o provocou.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NerError::Io {
            path: path.into(),
            source,
        }
    }
}
