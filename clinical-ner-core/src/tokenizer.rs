//! # Tokenizador para Notas Clínicas
//!
//! Divide o texto bruto em tokens (palavras, números, pontuação) e agrupa os
//! tokens em sentenças. Cada sentença vira uma sequência para o learner.
//!
//! ## Offsets
//!
//! Os offsets de [`Token`] são contados em **caracteres** (não bytes) e formam
//! um intervalo semiaberto `[start, end)`. É a mesma convenção dos arquivos de
//! anotação `.ann`, o que permite comparar tokens e anotações diretamente.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use clinical_ner_core::tokenizer::{tokenize, split_sentences};
//!
//! let text = "Started aspirin 81 mg. Pain resolved.";
//! let tokens = tokenize(text);
//! assert_eq!(tokens[1].text, "aspirin");
//!
//! let sentences = split_sentences(text, &tokens);
//! assert_eq!(sentences.len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Um token extraído do texto original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// O texto do token (ex: "aspirin", ",", "81").
    pub text: String,
    /// Offset inicial em caracteres (inclusive).
    pub start: usize,
    /// Offset final em caracteres (exclusivo).
    pub end: usize,
    /// Índice sequencial do token no documento.
    pub index: usize,
}

/// Abreviações comuns em prescrições e notas clínicas; o ponto final delas
/// não termina o token.
const ABBREVIATIONS: &[&str] = &[
    "Dr", "Mr", "Mrs", "Ms", "Pt", "pt", "mg", "mcg", "ml", "mL", "kg", "q", "qd", "qid", "bid",
    "tid", "prn", "po", "PO", "iv", "IV", "im", "sq", "hs", "ac", "pc", "tab", "tabs", "cap",
    "caps", "approx", "hx", "Hx", "dx", "Dx", "rx", "Rx", "vs", "etc", "No", "no",
];

/// Tokeniza o texto separando por espaços e pontuação.
///
/// Preserva abreviações clínicas ("mg.", "Dr."), números decimais ("2.5") e
/// palavras hifenizadas ("follow-up").
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current_start = 0;
    let mut current_text = String::new();
    let chars: Vec<char> = text.chars().collect();

    for (pos, &ch) in chars.iter().enumerate() {
        if ch.is_alphanumeric() || (ch == '-' && !current_text.is_empty()) {
            if current_text.is_empty() {
                current_start = pos;
            }
            current_text.push(ch);
        } else if ch == '.' && !current_text.is_empty() {
            let is_abbrev = ABBREVIATIONS.contains(&current_text.as_str());
            let current_is_num = current_text.chars().all(char::is_numeric);
            let next_is_num = chars.get(pos + 1).map(|c| c.is_numeric()).unwrap_or(false);

            if current_is_num && next_is_num {
                current_text.push('.');
            } else if is_abbrev {
                current_text.push('.');
                flush_token(&mut tokens, &mut current_text, current_start, pos + 1);
            } else {
                flush_token(&mut tokens, &mut current_text, current_start, pos);
                push_token(&mut tokens, ".".to_string(), pos, pos + 1);
            }
        } else if ch == '\'' || ch == '\u{2019}' {
            if current_text.is_empty() {
                current_start = pos;
            }
            current_text.push(ch);
        } else if ch.is_whitespace() {
            flush_token(&mut tokens, &mut current_text, current_start, pos);
        } else {
            flush_token(&mut tokens, &mut current_text, current_start, pos);
            push_token(&mut tokens, ch.to_string(), pos, pos + 1);
        }
    }

    flush_token(&mut tokens, &mut current_text, current_start, chars.len());

    for (i, token) in tokens.iter_mut().enumerate() {
        token.index = i;
    }
    tokens
}

/// Agrupa os tokens em sentenças usando as fronteiras de sentença do Unicode
/// (UAX #29).
///
/// Retorna intervalos de índices de tokens. Sentenças sem tokens (só espaços)
/// são descartadas. Um token que atravessa uma fronteira fica na sentença
/// onde começa.
pub fn split_sentences(text: &str, tokens: &[Token]) -> Vec<std::ops::Range<usize>> {
    let mut ranges = Vec::new();
    let mut sentence_end_char = 0usize;
    let mut first = 0usize;
    let mut i = 0usize;

    for sentence in text.split_sentence_bounds() {
        sentence_end_char += sentence.chars().count();
        while i < tokens.len() && tokens[i].start < sentence_end_char {
            i += 1;
        }
        if i > first {
            ranges.push(first..i);
            first = i;
        }
    }
    if first < tokens.len() {
        ranges.push(first..tokens.len());
    }
    ranges
}

/// Recorta `text` pelos offsets em caracteres `[start, end)`.
///
/// Retorna `None` se o intervalo estiver fora do texto ou invertido.
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let mut indices = text.char_indices().map(|(b, _)| b).chain(std::iter::once(text.len()));
    let start_byte = indices.nth(start)?;
    let end_byte = if end == start {
        start_byte
    } else {
        indices.nth(end - start - 1)?
    };
    Some(&text[start_byte..end_byte])
}

/// Fecha o token acumulado e adiciona à lista (se não vazio)
fn flush_token(tokens: &mut Vec<Token>, text: &mut String, start: usize, end: usize) {
    if !text.is_empty() {
        tokens.push(Token {
            text: text.clone(),
            start,
            end,
            index: 0, // será atribuído depois
        });
        text.clear();
    }
}

/// Adiciona um token de pontuação diretamente
fn push_token(tokens: &mut Vec<Token>, text: String, start: usize, end: usize) {
    tokens.push(Token {
        text,
        start,
        end,
        index: 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        let tokens = tokenize("Aspirin 81 mg daily.");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Aspirin", "81", "mg", "daily", "."]);
        assert_eq!(tokens[4].start, 19);
    }

    #[test]
    fn test_tokenize_offsets_are_char_based() {
        let text = "Dor ñ aspirin";
        let tokens = tokenize(text);
        let aspirin = tokens.iter().find(|t| t.text == "aspirin").unwrap();
        assert_eq!(aspirin.start, 6);
        assert_eq!(aspirin.end, 13);
        assert_eq!(char_slice(text, aspirin.start, aspirin.end), Some("aspirin"));
    }

    #[test]
    fn test_decimal_and_hyphen() {
        let tokens = tokenize("Give 2.5 mg at follow-up");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"2.5"));
        assert!(texts.contains(&"follow-up"));
    }

    #[test]
    fn test_abbreviation_keeps_period() {
        let tokens = tokenize("Take 1 tab po daily");
        assert!(tokens.iter().any(|t| t.text == "po"));
        let tokens = tokenize("Dr. Smith saw the pt. today");
        assert_eq!(tokens[0].text, "Dr.");
        assert_eq!(tokens[0].end, 3);
    }

    #[test]
    fn test_split_sentences() {
        let text = "Started aspirin. Pain resolved. ";
        let tokens = tokenize(text);
        let sentences = split_sentences(text, &tokens);
        assert_eq!(sentences, vec![0..3, 3..6]);
    }

    #[test]
    fn test_char_slice_bounds() {
        assert_eq!(char_slice("abc", 1, 3), Some("bc"));
        assert_eq!(char_slice("abc", 3, 3), Some(""));
        assert_eq!(char_slice("abc", 2, 4), None);
        assert_eq!(char_slice("abc", 2, 1), None);
    }
}
