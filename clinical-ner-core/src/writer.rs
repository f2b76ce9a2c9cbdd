//! # Escrita de Anotações
//!
//! Grava um arquivo `.ann` por documento do dataset, a partir das menções
//! reconstruídas na validação cruzada (ou na predição).

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::annotation::Annotations;
use crate::dataset::Dataset;
use crate::error::{NerError, Result};
use crate::span::SpansByDocument;

/// Cria o diretório de saída. Se ele já existir, apenas avisa: os arquivos
/// `.ann` existentes serão sobrescritos.
///
/// # Erros
/// [`NerError::Io`] se o caminho já existir e não for um diretório.
pub fn create_annotation_directory(directory: &Path) -> Result<()> {
    if directory.exists() && !directory.is_dir() {
        return Err(NerError::io(
            directory,
            io::Error::new(io::ErrorKind::AlreadyExists, "path exists and is not a directory"),
        ));
    }
    if directory.is_dir() {
        warn!("Overwriting existing annotations in {}", directory.display());
        return Ok(());
    }
    fs::create_dir_all(directory).map_err(|e| NerError::io(directory, e))
}

/// Grava `<file_name>.ann` para cada documento do dataset.
///
/// Documentos sem menções recebem um arquivo vazio. As menções de cada
/// documento são ordenadas por offset antes da escrita.
///
/// Retorna as anotações do último documento escrito (`None` para dataset
/// vazio).
pub fn write_annotations(
    directory: &Path,
    dataset: &Dataset,
    spans_by_document: &SpansByDocument,
) -> Result<Option<Annotations>> {
    let mut last = None;
    for file in dataset {
        let text = fs::read_to_string(&file.txt_path).map_err(|e| NerError::io(&file.txt_path, e))?;

        let mut spans = spans_by_document.get(&file.file_name).cloned().unwrap_or_default();
        spans.sort_by_key(|s| (s.start, s.end));
        let annotations = Annotations::from_tagged_spans(&text, &spans)?;

        let path = directory.join(format!("{}.ann", file.file_name));
        annotations.write(&path)?;
        debug!("Wrote {} entities to {}", annotations.len(), path.display());
        last = Some(annotations);
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::TaggedSpan;

    #[test]
    fn test_existing_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        create_annotation_directory(dir.path()).unwrap();

        let nested = dir.path().join("predictions").join("run");
        create_annotation_directory(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_regular_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions");
        fs::write(&path, "not a directory").unwrap();

        let err = create_annotation_directory(&path).unwrap_err();
        assert!(matches!(err, NerError::Io { ref path, .. } if path.ends_with("predictions")));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not a directory");
    }

    #[test]
    fn test_write_one_file_per_document() {
        let data_dir = tempfile::tempdir().unwrap();
        fs::write(data_dir.path().join("a.txt"), "Give Lasix 40 mg").unwrap();
        fs::write(data_dir.path().join("b.txt"), "No meds").unwrap();
        let dataset = Dataset::new(data_dir.path()).unwrap();

        let mut spans = SpansByDocument::new();
        spans.insert(
            "a".to_string(),
            vec![TaggedSpan::new("Dosage", 11, 16), TaggedSpan::new("Drug", 5, 10)],
        );

        let out = data_dir.path().join("predictions");
        create_annotation_directory(&out).unwrap();
        let last = write_annotations(&out, &dataset, &spans).unwrap().unwrap();
        assert!(last.is_empty());

        let a = fs::read_to_string(out.join("a.ann")).unwrap();
        assert_eq!(a, "T1\tDrug 5 10\tLasix\nT2\tDosage 11 16\t40 mg\n");
        assert_eq!(fs::read_to_string(out.join("b.ann")).unwrap(), "");
    }

    #[test]
    fn test_span_outside_text_fails() {
        let data_dir = tempfile::tempdir().unwrap();
        fs::write(data_dir.path().join("a.txt"), "short").unwrap();
        let dataset = Dataset::new(data_dir.path()).unwrap();
        let mut spans = SpansByDocument::new();
        spans.insert("a".to_string(), vec![TaggedSpan::new("Drug", 0, 50)]);
        assert!(matches!(
            write_annotations(data_dir.path(), &dataset, &spans),
            Err(NerError::Annotation(_))
        ));
    }
}
