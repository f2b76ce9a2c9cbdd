//! # Reconstrução de Spans a partir de Tags por Token
//!
//! O learner prediz uma tag por token. Para escrever anotações precisamos do
//! caminho inverso: agrupar tokens consecutivos com a **mesma** tag numa única
//! menção `(label, start, end)` e atribuí-la ao documento de origem.
//!
//! ## Regra de fusão
//!
//! ```text
//! labels: O      Drug    Drug    O     Reason
//! spans:  (0,1)  (2,7)   (8,13)  ...   (20,24)
//!                └──── Drug 2..13 ┘     Reason 20..24
//! ```
//!
//! Não há distinção entre `B-`/`I-`: duas menções adjacentes do mesmo tipo,
//! sem um `O` entre elas, viram uma única menção. Tags diferentes nunca são
//! fundidas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{NerError, Result};

/// Tag de token fora de qualquer entidade.
pub const OUTSIDE: &str = "O";

/// Intervalo semiaberto `[start, end)` em caracteres no texto do documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Uma menção de entidade reconstruída.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggedSpan {
    pub label: String,
    pub start: usize,
    pub end: usize,
}

impl TaggedSpan {
    pub fn new(label: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }
}

/// Spans agrupados por identificador de documento.
pub type SpansByDocument = BTreeMap<String, Vec<TaggedSpan>>;

/// `true` para tags que não representam entidade (`"O"` ou vazia).
pub fn is_outside(label: &str) -> bool {
    label == OUTSIDE || label.is_empty()
}

/// Converte um fluxo plano de tags em menções por documento.
///
/// Os três vetores são paralelos (um elemento por token) e normalmente vêm da
/// concatenação de todas as sequências de teste de um fold, em ordem.
///
/// # Erros
/// [`NerError::InvalidArgument`] se os comprimentos forem diferentes.
pub fn reconstruct_spans<L, D>(labels: &[L], spans: &[Span], documents: &[D]) -> Result<SpansByDocument>
where
    L: AsRef<str>,
    D: AsRef<str>,
{
    if labels.len() != spans.len() || labels.len() != documents.len() {
        return Err(NerError::invalid_argument(format!(
            "labels ({}), spans ({}) and documents ({}) must have the same length",
            labels.len(),
            spans.len(),
            documents.len()
        )));
    }

    let mut by_document = SpansByDocument::new();
    let mut i = 0;

    while i < labels.len() {
        let entity = labels[i].as_ref();
        if is_outside(entity) {
            i += 1;
            continue;
        }
        let document = documents[i].as_ref();
        let start = spans[i].start;

        // Acumula tokens consecutivos com a mesma tag, sem atravessar documentos
        while i + 1 < labels.len() && labels[i + 1].as_ref() == entity && documents[i + 1].as_ref() == document {
            i += 1;
        }

        by_document
            .entry(document.to_string())
            .or_default()
            .push(TaggedSpan::new(entity, start, spans[i].end));
        i += 1;
    }

    Ok(by_document)
}
