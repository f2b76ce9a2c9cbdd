//! # Engenharia de Features para NER Clínico
//!
//! Para cada token, extrai um vetor esparso de features que os learners
//! (CRF, Perceptron) usam para pontuar as tags.
//!
//! ## Features Implementadas
//!
//! ### Token atual
//! - Forma da palavra (lowercase) e forma "shape" (`Xxxx`, `dd.d`)
//! - Capitalização: is_capitalized, is_all_caps
//! - Prefixos e sufixos de 2, 3 e 4 caracteres
//! - Dígitos, hífen, ponto, pontuação
//! - Unidades de dosagem conhecidas (mg, ml, ...)
//!
//! ### Contexto (janela configurável)
//! - Palavras vizinhas com deslocamento: `-1:word=...`, `+2:word=...`
//! - `BOS` / `EOS` nas bordas da sentença
//!
//! ### Léxico externo (metamap)
//! - `semantic_type=<tipo>` quando o token aparece no léxico do documento

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::tokenizer::Token;

/// Unidades e vias de administração frequentes em prescrições.
const DOSAGE_UNITS: &[&str] = &[
    "mg", "mcg", "g", "ml", "l", "units", "unit", "iu", "meq", "tab", "tabs", "tablet", "tablets",
    "cap", "caps", "capsule", "puff", "puffs", "drops",
];

/// Features ativas de um token.
///
/// Mapa ordenado para que a soma dos pesos (e portanto as predições) não
/// dependa da ordem de iteração.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// O mapa de features ativas. Ex: `{"bias": 1.0, "word=aspirin": 1.0}`.
    pub features: BTreeMap<String, f64>,
    /// Índice do token dentro da sentença.
    pub token_index: usize,
}

impl FeatureVector {
    pub fn new(token_index: usize) -> Self {
        Self {
            features: BTreeMap::new(),
            token_index,
        }
    }

    /// Adiciona uma feature ao vetor com valor 1.0 (binária) ou customizado.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.features.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.features.contains_key(key)
    }
}

/// Léxico de termos -> tipo semântico, carregado de um arquivo `.metamapped`.
///
/// Formato: uma entrada por linha, `termo<TAB>tipo`. Termos com várias
/// palavras marcam cada palavra individualmente.
#[derive(Debug, Clone, Default)]
pub struct TermLexicon {
    terms: HashMap<String, String>,
}

impl TermLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Self {
        let mut lexicon = Self::new();
        for line in content.lines() {
            let Some((term, semantic_type)) = line.split_once('\t') else {
                continue;
            };
            let semantic_type = semantic_type.trim();
            if semantic_type.is_empty() {
                continue;
            }
            for word in term.split_whitespace() {
                lexicon.insert(word, semantic_type);
            }
        }
        lexicon
    }

    pub fn insert(&mut self, word: &str, semantic_type: &str) {
        self.terms.insert(word.to_lowercase(), semantic_type.to_string());
    }

    pub fn lookup(&self, word: &str) -> Option<&str> {
        self.terms.get(&word.to_lowercase()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Nomes dos grupos de features produzidos por [`extract_features`] (para
/// `Model::info`).
pub const FEATURE_GROUPS: &[&str] = &[
    "word",
    "shape",
    "capitalization",
    "affixes",
    "digits",
    "punctuation",
    "dosage_unit",
    "window_words",
    "semantic_type",
];

/// Gera vetores de features para toda a sequência de tokens.
///
/// O índice `i` do retorno corresponde ao token `i` da entrada.
///
/// # Parâmetros
/// - `tokens`: tokens de uma sentença.
/// - `window_size`: quantos vizinhos de cada lado entram como contexto.
/// - `lexicon`: léxico metamap do documento (opcional).
pub fn extract_features(tokens: &[Token], window_size: usize, lexicon: Option<&TermLexicon>) -> Vec<FeatureVector> {
    (0..tokens.len())
        .map(|i| extract_for_token(tokens, i, window_size, lexicon))
        .collect()
}

/// Extrai features para um único token em seu contexto
pub fn extract_for_token(
    tokens: &[Token],
    i: usize,
    window_size: usize,
    lexicon: Option<&TermLexicon>,
) -> FeatureVector {
    let mut fv = FeatureVector::new(i);
    let word = &tokens[i].text;
    let lower = word.to_lowercase();

    // === Features da palavra atual ===
    fv.insert("bias", 1.0);
    fv.insert(format!("word={lower}"), 1.0);
    fv.insert(format!("shape={}", word_shape(word)), 1.0);

    let first_char_upper = word.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
    let has_alpha = word.chars().any(char::is_alphabetic);
    let all_upper = word.chars().all(|c| c.is_uppercase() || !c.is_alphabetic());

    if first_char_upper {
        fv.insert("is_capitalized", 1.0);
    }
    if has_alpha && all_upper && word.chars().count() > 1 {
        fv.insert("is_all_caps", 1.0);
    }

    let chars: Vec<char> = lower.chars().collect();
    for n in 2..=4 {
        if chars.len() >= n {
            let prefix: String = chars[..n].iter().collect();
            let suffix: String = chars[chars.len() - n..].iter().collect();
            fv.insert(format!("prefix{n}={prefix}"), 1.0);
            fv.insert(format!("suffix{n}={suffix}"), 1.0);
        }
    }

    if word.chars().all(|c| c.is_numeric() || c == '.') && word.chars().any(char::is_numeric) {
        fv.insert("is_number", 1.0);
    } else if word.chars().any(char::is_numeric) {
        fv.insert("has_digit", 1.0);
    }
    if word.contains('-') {
        fv.insert("has_hyphen", 1.0);
    }
    if word.contains('.') {
        fv.insert("has_period", 1.0);
    }
    if !word.chars().any(char::is_alphanumeric) {
        fv.insert("is_punctuation", 1.0);
    }
    if DOSAGE_UNITS.contains(&lower.trim_end_matches('.')) {
        fv.insert("is_dosage_unit", 1.0);
    }

    if let Some(semantic_type) = lexicon.and_then(|lex| lex.lookup(word)) {
        fv.insert(format!("semantic_type={semantic_type}"), 1.0);
    }

    // === Features de contexto ===
    if i == 0 {
        fv.insert("BOS", 1.0);
    }
    if i + 1 == tokens.len() {
        fv.insert("EOS", 1.0);
    }

    for offset in 1..=window_size {
        if i >= offset {
            let prev = &tokens[i - offset];
            fv.insert(format!("-{offset}:word={}", prev.text.to_lowercase()), 1.0);
            if offset == 1 && prev.text.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
                fv.insert("-1:is_capitalized", 1.0);
            }
        }
        if i + offset < tokens.len() {
            let next = &tokens[i + offset];
            fv.insert(format!("+{offset}:word={}", next.text.to_lowercase()), 1.0);
            if offset == 1 && DOSAGE_UNITS.contains(&next.text.to_lowercase().trim_end_matches('.')) {
                fv.insert("+1:is_dosage_unit", 1.0);
            }
        }
    }

    fv
}

/// Forma ortográfica compacta: maiúsculas -> `X`, minúsculas -> `x`,
/// dígitos -> `d`; repetições consecutivas colapsadas (`Aspirin` -> `Xx`).
pub fn word_shape(word: &str) -> String {
    let mut shape = String::new();
    for c in word.chars() {
        let class = if c.is_uppercase() {
            'X'
        } else if c.is_lowercase() {
            'x'
        } else if c.is_numeric() {
            'd'
        } else {
            c
        };
        if !shape.ends_with(class) {
            shape.push(class);
        }
    }
    shape
}
