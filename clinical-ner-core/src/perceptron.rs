//! # Averaged Perceptron para NER
//!
//! Algoritmo online simples e eficiente, mais rápido de treinar que o CRF.
//! Decodifica da esquerda para a direita de forma gulosa, usando a tag
//! anterior como feature extra (`prev_tag=...`).
//!
//! Utiliza "Lazy Averaging" para evitar custo O(N*T) na atualização dos pesos
//! médios.
//!
//! ## Persistência
//!
//! O perceptron salva a si mesmo (ver
//! [`SelfPersistingLearner`]) num arquivo JSON-lines: a primeira linha é o
//! cabeçalho com as tags, cada linha seguinte é um peso
//! `{"feature": ..., "tag": ..., "weight": ...}`.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_jsonlines::{json_lines, write_json_lines};
use tracing::debug;

use crate::config::PerceptronConfig;
use crate::error::{NerError, Result};
use crate::features::FeatureVector;
use crate::learner::{SelfPersistingLearner, SequenceLearner};

const START_TAG: &str = "<s>";

type WeightKey = (String, String);

/// Modelo Perceptron Médio (Averaged Perceptron).
///
/// O Perceptron é **mistake-driven**: processa uma sequência por vez e só
/// atualiza os pesos quando erra a tag de um token.
///
/// # Lazy Averaging
/// O total acumulado de um peso só é atualizado quando a feature está ativa;
/// o modelo final é o mesmo do Averaged Perceptron padrão.
#[derive(Debug, Clone, Default)]
pub struct PerceptronModel {
    pub config: PerceptronConfig,
    /// Pesos atuais: (feature, tag) -> peso. Após o treino, contém as médias.
    weights: HashMap<WeightKey, f64>,
    /// Soma acumulada dos pesos.
    total_weights: HashMap<WeightKey, f64>,
    /// Último passo em que o peso foi atualizado.
    last_update: HashMap<WeightKey, usize>,
    steps: usize,
    tags: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct Header {
    format: String,
    tags: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct WeightLine {
    feature: String,
    tag: String,
    weight: f64,
}

/// Uma linha do arquivo: o cabeçalho (só na primeira) ou um peso.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ModelLine {
    Header(Header),
    Weight(WeightLine),
}

const FORMAT: &str = "averaged-perceptron/1";

impl PerceptronModel {
    pub fn new(config: PerceptronConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    fn score_tag(&self, fv: &FeatureVector, prev_tag: &str, tag: &str) -> f64 {
        let mut score = fv
            .features
            .iter()
            .filter_map(|(name, value)| {
                self.weights
                    .get(&(name.clone(), tag.to_string()))
                    .map(|w| w * value)
            })
            .sum::<f64>();
        if let Some(w) = self.weights.get(&(prev_feature(prev_tag), tag.to_string())) {
            score += w;
        }
        score
    }

    fn predict_single(&self, fv: &FeatureVector, prev_tag: &str) -> &str {
        let mut best = self.tags.first().map(String::as_str).unwrap_or_default();
        let mut best_score = f64::NEG_INFINITY;
        for tag in &self.tags {
            let score = self.score_tag(fv, prev_tag, tag);
            if score > best_score {
                best_score = score;
                best = tag;
            }
        }
        best
    }

    fn predict_sequence(&self, sequence: &[FeatureVector]) -> Vec<String> {
        let mut prev = START_TAG.to_string();
        sequence
            .iter()
            .map(|fv| {
                let tag = self.predict_single(fv, &prev).to_string();
                prev.clone_from(&tag);
                tag
            })
            .collect()
    }

    /// `w_correto += φ(x)`, `w_errado -= φ(x)`
    fn update(&mut self, fv: &FeatureVector, prev_tag: &str, true_tag: &str, pred_tag: &str) {
        for (name, value) in &fv.features {
            self.update_feature(name, true_tag, *value);
            self.update_feature(name, pred_tag, -*value);
        }
        let prev = prev_feature(prev_tag);
        self.update_feature(&prev, true_tag, 1.0);
        self.update_feature(&prev, pred_tag, -1.0);
    }

    fn update_feature(&mut self, feature: &str, tag: &str, delta: f64) {
        let key = (feature.to_string(), tag.to_string());

        // Acumula o peso antigo pelos passos em que ficou constante
        let current = self.weights.get(&key).copied().unwrap_or(0.0);
        let last_step = self.last_update.get(&key).copied().unwrap_or(0);
        *self.total_weights.entry(key.clone()).or_insert(0.0) += (self.steps - last_step) as f64 * current;
        self.last_update.insert(key.clone(), self.steps);

        *self.weights.entry(key).or_insert(0.0) += delta;
    }

    fn finalize_weights(&mut self) {
        let steps = self.steps;
        for (key, weight) in &self.weights {
            let last_step = self.last_update.get(key).copied().unwrap_or(0);
            *self.total_weights.entry(key.clone()).or_insert(0.0) += (steps - last_step) as f64 * weight;
        }
        if steps > 0 {
            self.weights = self
                .total_weights
                .drain()
                .map(|(key, total)| (key, total / steps as f64))
                .filter(|(_, w)| *w != 0.0)
                .collect();
        }
        self.total_weights.clear();
        self.last_update.clear();
    }
}

fn prev_feature(tag: &str) -> String {
    format!("prev_tag={tag}")
}

impl SequenceLearner for PerceptronModel {
    fn fit(&mut self, features: &[&[FeatureVector]], labels: &[&[String]]) -> Result<()> {
        let tag_set: BTreeSet<&String> = labels.iter().flat_map(|s| s.iter()).collect();
        if tag_set.is_empty() {
            return Err(NerError::learner("perceptron received no training tokens"));
        }
        for (i, (x, y)) in features.iter().zip(labels).enumerate() {
            if x.len() != y.len() {
                return Err(NerError::learner(format!(
                    "sequence {i} has {} tokens but {} labels",
                    x.len(),
                    y.len()
                )));
            }
        }
        self.tags = tag_set.into_iter().cloned().collect();
        self.weights.clear();
        self.steps = 0;

        let mut order: Vec<usize> = (0..features.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        for iteration in 0..self.config.iterations {
            order.shuffle(&mut rng);
            let mut mistakes = 0usize;
            for &idx in &order {
                let mut prev = START_TAG.to_string();
                for (fv, gold) in features[idx].iter().zip(labels[idx].iter()) {
                    let predicted = self.predict_single(fv, &prev).to_string();
                    if &predicted != gold {
                        self.update(fv, &prev, gold, &predicted);
                        mistakes += 1;
                    }
                    self.steps += 1;
                    prev = predicted;
                }
            }
            debug!(
                "Perceptron iteration {}/{}: {} mistakes",
                iteration + 1,
                self.config.iterations,
                mistakes
            );
        }

        self.finalize_weights();
        Ok(())
    }

    fn predict(&self, features: &[&[FeatureVector]]) -> Result<Vec<Vec<String>>> {
        if self.tags.is_empty() {
            return Err(NerError::learner("perceptron must be fitted before predicting"));
        }
        Ok(features.iter().map(|s| self.predict_sequence(s)).collect())
    }
}

impl SelfPersistingLearner for PerceptronModel {
    fn save(&self, path: &Path) -> Result<()> {
        let header = ModelLine::Header(Header {
            format: FORMAT.to_string(),
            tags: self.tags.clone(),
        });

        let mut keys: Vec<&WeightKey> = self.weights.keys().collect();
        keys.sort();
        let weights = keys.into_iter().map(|key| {
            ModelLine::Weight(WeightLine {
                feature: key.0.clone(),
                tag: key.1.clone(),
                weight: self.weights[key],
            })
        });

        write_json_lines(path, std::iter::once(header).chain(weights)).map_err(|e| NerError::io(path, e))
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let mut lines = json_lines::<ModelLine, _>(path).map_err(|e| NerError::io(path, e))?;

        let header = match lines.next() {
            Some(line) => match line.map_err(|e| NerError::io(path, e))? {
                ModelLine::Header(header) => header,
                ModelLine::Weight(_) => {
                    return Err(NerError::learner(format!("{} has no header line", path.display())))
                }
            },
            None => return Err(NerError::learner(format!("{} is empty", path.display()))),
        };
        if header.format != FORMAT {
            return Err(NerError::learner(format!(
                "unsupported perceptron format '{}'",
                header.format
            )));
        }

        let mut weights = HashMap::new();
        for line in lines {
            match line.map_err(|e| NerError::io(path, e))? {
                ModelLine::Weight(entry) => {
                    weights.insert((entry.feature, entry.tag), entry.weight);
                }
                ModelLine::Header(_) => {
                    return Err(NerError::learner(format!("{} has more than one header", path.display())))
                }
            }
        }

        self.tags = header.tags;
        self.weights = weights;
        self.total_weights.clear();
        self.last_update.clear();
        self.steps = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::extract_features;
    use crate::learner::Learner;
    use crate::tokenizer::tokenize;
    use std::fs;

    fn corpus() -> (Vec<Vec<FeatureVector>>, Vec<Vec<String>>) {
        let sentences: &[(&str, &[&str])] = &[
            ("Lasix 40 mg", &["Drug", "Dosage", "Dosage"]),
            ("Coumadin 5 mg", &["Drug", "Dosage", "Dosage"]),
            ("patient stable", &["O", "O"]),
            ("continue Lasix", &["O", "Drug"]),
        ];
        let x = sentences
            .iter()
            .map(|(t, _)| extract_features(&tokenize(t), 1, None))
            .collect();
        let y = sentences
            .iter()
            .map(|(_, tags)| tags.iter().map(|t| t.to_string()).collect())
            .collect();
        (x, y)
    }

    fn slices<T>(v: &[Vec<T>]) -> Vec<&[T]> {
        v.iter().map(Vec::as_slice).collect()
    }

    #[test]
    fn test_perceptron_learning_lazy() {
        let (x, y) = corpus();
        let mut model = PerceptronModel::new(PerceptronConfig {
            iterations: 10,
            ..PerceptronConfig::default()
        });
        model.fit(&slices(&x), &slices(&y)).unwrap();

        assert_eq!(model.tags(), &["Dosage", "Drug", "O"]);
        assert_eq!(model.predict(&slices(&x)).unwrap(), y);
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let (x, _) = corpus();
        assert!(PerceptronModel::default().predict(&slices(&x)).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let (x, y) = corpus();
        let mut learner = Learner::SelfPersisting(Box::new(PerceptronModel::default()));
        learner.fit(&slices(&x), &slices(&y)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perceptron.jsonl");
        learner.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.lines().next().unwrap().contains(FORMAT));

        let mut restored = Learner::SelfPersisting(Box::new(PerceptronModel::default()));
        restored.load(&path).unwrap();
        assert!(restored.is_self_persisting());
        assert_eq!(
            restored.predict(&slices(&x)).unwrap(),
            learner.predict(&slices(&x)).unwrap()
        );
    }

    #[test]
    fn test_load_rejects_foreign_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"format\":\"other\",\"tags\":[]}\n").unwrap();
        let mut model = PerceptronModel::default();
        assert!(matches!(model.load(&path), Err(NerError::Learner(_))));
    }

    #[test]
    fn test_load_requires_header_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.jsonl");
        fs::write(
            &path,
            "{\"feature\":\"bias\",\"tag\":\"Drug\",\"weight\":1.0}\n",
        )
        .unwrap();
        let mut model = PerceptronModel::default();
        assert!(matches!(model.load(&path), Err(NerError::Learner(_))));

        fs::write(&path, "").unwrap();
        assert!(matches!(model.load(&path), Err(NerError::Learner(_))));
    }

    #[test]
    fn test_saved_lines_are_sorted_weights() {
        let (x, y) = corpus();
        let mut model = PerceptronModel::default();
        model.fit(&slices(&x), &slices(&y)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perceptron.jsonl");
        model.save(&path).unwrap();

        let lines: Vec<serde_json::Value> = json_lines(&path).unwrap().map(|l| l.unwrap()).collect();
        assert_eq!(lines[0]["format"], FORMAT);
        let keys: Vec<(String, String)> = lines[1..]
            .iter()
            .map(|l| (l["feature"].as_str().unwrap().to_string(), l["tag"].as_str().unwrap().to_string()))
            .collect();
        assert_eq!(keys.len(), model.weights.len());
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }
}
