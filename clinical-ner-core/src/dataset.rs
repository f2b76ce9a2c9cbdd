//! # Dataset de Documentos Clínicos
//!
//! Um dataset é um diretório com arquivos:
//!
//! ```text
//! notes/
//!   record-01.txt          texto bruto
//!   record-01.ann          anotações gold (opcional)
//!   record-01.metamapped   léxico metamap do documento (opcional)
//! ```
//!
//! O identificador de um documento é o nome do arquivo sem extensão. Os
//! arquivos são enumerados em ordem de nome, então os índices de sequência
//! produzidos no pré-processamento são reprodutíveis.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::annotation::Annotations;
use crate::error::{NerError, Result};
use crate::features::TermLexicon;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    /// Identificador do documento (nome sem extensão)
    pub file_name: String,
    pub txt_path: PathBuf,
    pub ann_path: Option<PathBuf>,
    pub metamapped_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    data_directory: PathBuf,
    files: Vec<DataFile>,
}

impl Dataset {
    /// Lê o diretório e indexa os documentos.
    ///
    /// # Erros
    /// - [`NerError::Io`] se o diretório não puder ser lido
    /// - [`NerError::EmptyData`] se não houver nenhum `.txt`
    pub fn new(data_directory: impl Into<PathBuf>) -> Result<Self> {
        let data_directory = data_directory.into();
        let entries = fs::read_dir(&data_directory).map_err(|e| NerError::io(&data_directory, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| NerError::io(&data_directory, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();

        if names.is_empty() {
            return Err(NerError::empty_data(format!(
                "no .txt files in {}",
                data_directory.display()
            )));
        }

        let files: Vec<DataFile> = names
            .into_iter()
            .map(|name| {
                let existing = |ext: &str| {
                    let path = data_directory.join(format!("{name}.{ext}"));
                    path.is_file().then_some(path)
                };
                DataFile {
                    txt_path: data_directory.join(format!("{name}.txt")),
                    ann_path: existing("ann"),
                    metamapped_path: existing("metamapped"),
                    file_name: name,
                }
            })
            .collect();

        debug!("Dataset {}: {} documents", data_directory.display(), files.len());
        Ok(Self { data_directory, files })
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    /// `true` se algum documento tiver arquivo `.metamapped`.
    pub fn is_metamapped(&self) -> bool {
        self.files.iter().any(|f| f.metamapped_path.is_some())
    }

    /// `true` se todos os documentos tiverem anotações gold.
    pub fn is_annotated(&self) -> bool {
        self.files.iter().all(|f| f.ann_path.is_some())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[DataFile] {
        &self.files
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataFile> {
        self.files.iter()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a DataFile;
    type IntoIter = std::slice::Iter<'a, DataFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Um documento carregado em memória, pronto para o pipeline.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub id: String,
    pub text: String,
    /// Anotações gold, quando existem
    pub annotations: Option<Annotations>,
    pub lexicon: Option<TermLexicon>,
}

impl Document {
    /// Documento sem anotações (para predição de texto solto).
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn from_data_file(file: &DataFile) -> Result<Self> {
        let text = fs::read_to_string(&file.txt_path).map_err(|e| NerError::io(&file.txt_path, e))?;
        let annotations = file.ann_path.as_deref().map(Annotations::from_file).transpose()?;
        let lexicon = match &file.metamapped_path {
            Some(path) => Some(TermLexicon::parse(
                &fs::read_to_string(path).map_err(|e| NerError::io(path, e))?,
            )),
            None => None,
        };
        Ok(Self {
            id: file.file_name.clone(),
            text,
            annotations,
            lexicon,
        })
    }
}
