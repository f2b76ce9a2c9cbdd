//! # Anotações Standoff (formato brat `.ann`)
//!
//! Cada linha de entidade tem a forma:
//!
//! ```text
//! T1	Drug 23 30	aspirin
//! ```
//!
//! - identificador `T<n>`
//! - rótulo e offsets em caracteres `[start, end)`, separados por espaço
//! - texto coberto pela menção
//!
//! Linhas de outros tipos (`R`, `A`, `#`...) são ignoradas na leitura. Para
//! entidades descontínuas (`Drug 0 4;9 12`) só o primeiro fragmento é usado.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{NerError, Result};
use crate::span::TaggedSpan;
use crate::tokenizer::char_slice;

/// `T<n>\t<label> <start> <end>[;<start> <end>...]\t<text>`
static ENTITY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^T\d+\t(\S+) (\d+) (\d+)(?:;\d+ \d+)*(?:\t(.*))?$").expect("entity line pattern is valid")
});

/// Uma menção de entidade num documento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAnnotation {
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Conjunto de anotações de um documento.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    pub entities: Vec<EntityAnnotation>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrói as anotações a partir dos spans reconstruídos, recortando o
    /// texto de cada menção do documento original.
    pub fn from_tagged_spans(text: &str, spans: &[TaggedSpan]) -> Result<Self> {
        let entities = spans
            .iter()
            .map(|span| {
                let mention = char_slice(text, span.start, span.end).ok_or_else(|| {
                    NerError::Annotation(format!(
                        "span {} {} {} is outside the document ({} chars)",
                        span.label,
                        span.start,
                        span.end,
                        text.chars().count()
                    ))
                })?;
                Ok(EntityAnnotation {
                    label: span.label.clone(),
                    start: span.start,
                    end: span.end,
                    text: mention.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entities })
    }

    /// Faz o parse do conteúdo de um arquivo `.ann`.
    pub fn parse(content: &str) -> Result<Self> {
        let mut entities = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if !line.starts_with('T') {
                continue;
            }
            let caps = ENTITY_LINE.captures(line).ok_or_else(|| {
                NerError::Annotation(format!("line {}: malformed entity '{}'", line_no + 1, line))
            })?;
            let start: usize = caps[2]
                .parse()
                .map_err(|_| NerError::Annotation(format!("line {}: bad start offset", line_no + 1)))?;
            let end: usize = caps[3]
                .parse()
                .map_err(|_| NerError::Annotation(format!("line {}: bad end offset", line_no + 1)))?;
            if end < start {
                return Err(NerError::Annotation(format!(
                    "line {}: end {} before start {}",
                    line_no + 1,
                    end,
                    start
                )));
            }
            entities.push(EntityAnnotation {
                label: caps[1].to_string(),
                start,
                end,
                text: caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default(),
            });
        }
        Ok(Self { entities })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| NerError::io(path, e))?;
        Self::parse(&content)
    }

    /// Serializa no formato `.ann`, numerando as entidades a partir de `T1`.
    pub fn to_ann_string(&self) -> String {
        let mut out = String::new();
        for (i, entity) in self.entities.iter().enumerate() {
            let text = entity.text.replace(['\n', '\r'], " ");
            out.push_str(&format!(
                "T{}\t{} {} {}\t{}\n",
                i + 1,
                entity.label,
                entity.start,
                entity.end,
                text
            ));
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_ann_string()).map_err(|e| NerError::io(path, e))
    }

    /// Rótulo da entidade que cobre inteiramente `[start, end)`, se houver.
    pub fn label_covering(&self, start: usize, end: usize) -> Option<&str> {
        self.entities
            .iter()
            .find(|e| e.start <= start && end <= e.end)
            .map(|e| e.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entities_and_skip_other_lines() {
        let content = "T1\tDrug 10 17\taspirin\n#1\tAnnotatorNotes T1\tok\nT2\tDosage 18 23;24 26\t81 mg qd\nR1\tReason Arg1:T1 Arg2:T2\n";
        let ann = Annotations::parse(content).unwrap();
        assert_eq!(ann.len(), 2);
        assert_eq!(ann.entities[0].label, "Drug");
        assert_eq!((ann.entities[0].start, ann.entities[0].end), (10, 17));
        assert_eq!(ann.entities[1].label, "Dosage");
        assert_eq!(ann.entities[1].end, 23);
    }

    #[test]
    fn test_parse_rejects_malformed_line() {
        let err = Annotations::parse("T1\tDrug ten 17\taspirin\n").unwrap_err();
        assert!(matches!(err, NerError::Annotation(_)));
    }

    #[test]
    fn test_parse_from_many_threads() {
        use rayon::prelude::*;

        let documents: Vec<String> = (0..32)
            .map(|i| format!("T1\tDrug {} {}\taspirin\n", i, i + 7))
            .collect();
        let parsed: Vec<Annotations> = documents
            .par_iter()
            .map(|d| Annotations::parse(d).unwrap())
            .collect();
        for (i, ann) in parsed.iter().enumerate() {
            assert_eq!((ann.entities[0].start, ann.entities[0].end), (i, i + 7));
        }
    }

    #[test]
    fn test_from_tagged_spans_and_serialize() {
        let text = "Start aspirin now";
        let spans = vec![TaggedSpan::new("Drug", 6, 13)];
        let ann = Annotations::from_tagged_spans(text, &spans).unwrap();
        assert_eq!(ann.entities[0].text, "aspirin");
        assert_eq!(ann.to_ann_string(), "T1\tDrug 6 13\taspirin\n");

        let reparsed = Annotations::parse(&ann.to_ann_string()).unwrap();
        assert_eq!(reparsed, ann);
    }

    #[test]
    fn test_from_tagged_spans_out_of_range() {
        let spans = vec![TaggedSpan::new("Drug", 6, 40)];
        assert!(Annotations::from_tagged_spans("short", &spans).is_err());
    }

    #[test]
    fn test_label_covering() {
        let ann = Annotations::parse("T1\tReason 5 15\tchest pain\n").unwrap();
        assert_eq!(ann.label_covering(5, 10), Some("Reason"));
        assert_eq!(ann.label_covering(11, 15), Some("Reason"));
        assert_eq!(ann.label_covering(0, 4), None);
        assert_eq!(ann.label_covering(3, 8), None);
    }
}
