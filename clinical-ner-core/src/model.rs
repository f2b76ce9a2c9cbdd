//! # Modelo NER — Treino, Predição e Validação Cruzada
//!
//! O [`Model`] junta um [`Pipeline`] (extração de features e fábrica de
//! learners) com o learner treinado:
//!
//! ```text
//! Dataset ──preprocess──▶ ExtractedData ──fit──▶ Learner
//!                              │
//!                              └──cross_validate──▶ folds ──▶ estatísticas
//!                                                      └──▶ predictions/ groundtruth/
//! ```
//!
//! O pré-processamento pode rodar em paralelo (pool `rayon` com `n_jobs`
//! threads); a ordem das sequências é sempre a ordem dos arquivos do dataset.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotation::Annotations;
use crate::config::{CrossValidationOptions, OutputDirectory};
use crate::dataset::{DataFile, Dataset, Document};
use crate::error::{NerError, Result};
use crate::evaluation::FoldEvaluator;
use crate::learner::{Learner, SequenceLearner};
use crate::pipeline::{ExtractedData, Pipeline, PipelineInformation};
use crate::report::{aggregate, merge_span_deltas, render_summary_table, AggregateStatistics, FoldStatistics};
use crate::span::{reconstruct_spans, SpansByDocument};
use crate::split::{Fold, SequenceStratifiedKFold};
use crate::writer::{create_annotation_directory, write_annotations};

/// Identificador usado para texto avulso em [`Model::predict_text`]
pub const STRING_INPUT: &str = "STRING_INPUT";

/// Resultado completo de uma validação cruzada.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub folds: Vec<Fold>,
    pub tagset: Vec<String>,
    pub fold_statistics: Vec<FoldStatistics>,
    pub statistics: AggregateStatistics,
    /// Menções preditas por documento (quando alguma saída foi pedida)
    pub predicted_spans: Option<SpansByDocument>,
    pub gold_spans: Option<SpansByDocument>,
    pub prediction_directory: Option<PathBuf>,
    pub groundtruth_directory: Option<PathBuf>,
}

pub struct Model<P: Pipeline> {
    pipeline: P,
    learner: Option<Learner>,
    n_jobs: usize,
}

impl<P: Pipeline> Model<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            learner: None,
            n_jobs: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        }
    }

    /// Número de threads do pré-processamento assíncrono (mínimo 1)
    pub fn with_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs.max(1);
        self
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn is_fitted(&self) -> bool {
        self.learner.is_some()
    }

    /// Extrai features e tags de todos os documentos do dataset.
    ///
    /// Não guarda nada no modelo: o resultado pertence a quem chamou.
    pub fn preprocess(&self, dataset: &Dataset, asynchronous: bool) -> Result<ExtractedData> {
        let pipeline = &self.pipeline;
        let parts: Vec<ExtractedData> = if asynchronous {
            info!("Preprocessing data asynchronously ({} threads)...", self.n_jobs);
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.n_jobs)
                .thread_name(|i| format!("clinical-ner-{i}"))
                .build()
                .map_err(|e| NerError::configuration(format!("failed to initialize thread pool: {e}")))?;
            pool.install(|| {
                dataset
                    .files()
                    .par_iter()
                    .map(|file| extract_file(pipeline, file))
                    .collect::<Result<Vec<_>>>()
            })?
        } else {
            info!("Preprocessing data synchronously...");
            dataset
                .iter()
                .map(|file| extract_file(pipeline, file))
                .collect::<Result<Vec<_>>>()?
        };

        let mut data = ExtractedData::new();
        for part in parts {
            data.extend(part);
        }
        Ok(data)
    }

    /// Treina um learner novo sobre o dataset inteiro.
    pub fn fit(&mut self, dataset: &Dataset, asynchronous: bool) -> Result<()> {
        let data = self.preprocess(dataset, asynchronous)?;
        if data.is_empty() {
            return Err(NerError::empty_data("training data is empty"));
        }

        let (learner_name, mut learner) = self.pipeline.get_learner();
        info!(
            "Training {} on {} sequences ({} tokens)",
            learner_name,
            data.len(),
            data.num_tokens()
        );
        learner.fit(&data.all_features(), &data.all_labels())?;
        info!("Successfully trained {}", learner_name);

        self.learner = Some(learner);
        Ok(())
    }

    fn fitted_learner(&self) -> Result<&Learner> {
        self.learner
            .as_ref()
            .ok_or_else(|| NerError::configuration("must fit or load a model before predicting"))
    }

    /// Prediz as menções de um documento.
    pub fn predict_document(&self, document: &Document) -> Result<Annotations> {
        let learner = self.fitted_learner()?;
        let data = self.pipeline.extract(document)?;
        let predicted = learner.predict(&data.all_features())?;

        let labels: Vec<&str> = predicted.iter().flatten().map(String::as_str).collect();
        let spans: Vec<_> = data.sequences.iter().flat_map(|s| s.spans.iter().copied()).collect();
        let documents = vec![document.id.as_str(); labels.len()];

        let by_document = reconstruct_spans(&labels, &spans, &documents)?;
        let mentions = by_document.get(&document.id).map(Vec::as_slice).unwrap_or_default();
        Annotations::from_tagged_spans(&document.text, mentions)
    }

    pub fn predict_text(&self, text: &str) -> Result<Annotations> {
        self.predict_document(&Document::from_text(STRING_INPUT, text))
    }

    /// Prediz todos os documentos do dataset e grava um `.ann` por documento
    /// (por padrão em `<dataset>/predictions`).
    ///
    /// Retorna as anotações do último documento.
    pub fn predict_dataset(
        &self,
        dataset: &Dataset,
        prediction_directory: Option<&OutputDirectory>,
    ) -> Result<Option<Annotations>> {
        self.fitted_learner()?;
        let directory = prediction_directory
            .unwrap_or(&OutputDirectory::Default)
            .resolve(dataset.data_directory(), "predictions");
        create_annotation_directory(&directory)?;

        let mut last = None;
        for file in dataset {
            info!("Predicting file: {}", file.file_name);
            let document = Document::from_data_file(file)?;
            let annotations = self.predict_document(&document)?;

            let path = directory.join(format!("{}.ann", file.file_name));
            debug!("Writing to: {}", path.display());
            annotations.write(&path)?;
            last = Some(annotations);
        }
        Ok(last)
    }

    /// Validação cruzada estratificada sobre o dataset de treino.
    ///
    /// # Erros
    /// [`NerError::Configuration`] se `num_folds <= 1`, se um diretório de
    /// saída for pedido sem dataset de treino ou se não houver dataset. Os
    /// parâmetros são verificados antes de qualquer processamento.
    pub fn cross_validate(&self, options: &CrossValidationOptions) -> Result<CrossValidationResult> {
        if options.num_folds <= 1 {
            return Err(NerError::configuration(format!(
                "number of folds for cross validation must be greater than 1, got {}",
                options.num_folds
            )));
        }
        let wants_output = options.prediction_directory.is_some() || options.groundtruth_directory.is_some();
        let Some(training_dataset) = options.training_dataset.as_deref() else {
            if wants_output {
                return Err(NerError::configuration(
                    "cannot write predictions or groundtruth during cross validation without a training dataset",
                ));
            }
            return Err(NerError::configuration("cross validation requires a training dataset"));
        };

        let dataset = Dataset::new(training_dataset)?;
        let data = self.preprocess(&dataset, options.asynchronous)?;
        let mut result = self.cross_validate_data(&data, options.num_folds, options.seed, wants_output)?;

        let outputs = [
            (&options.prediction_directory, "predictions", &result.predicted_spans),
            (&options.groundtruth_directory, "groundtruth", &result.gold_spans),
        ];
        let mut written: Vec<Option<PathBuf>> = Vec::with_capacity(2);
        for (requested, default_name, spans) in outputs {
            let (Some(requested), Some(spans)) = (requested, spans) else {
                written.push(None);
                continue;
            };
            let directory = requested.resolve(dataset.data_directory(), default_name);
            create_annotation_directory(&directory)?;
            write_annotations(&directory, &dataset, spans)?;
            info!("Wrote {} to {}", default_name, directory.display());
            written.push(Some(directory));
        }
        result.groundtruth_directory = written.pop().flatten();
        result.prediction_directory = written.pop().flatten();

        Ok(result)
    }

    /// Validação cruzada sobre dados já extraídos.
    ///
    /// Com `collect_spans`, as menções gold e preditas de todos os folds são
    /// juntadas por documento (todo documento aparece no mapa, mesmo sem
    /// menções).
    pub fn cross_validate_data(
        &self,
        data: &ExtractedData,
        num_folds: usize,
        seed: u64,
        collect_spans: bool,
    ) -> Result<CrossValidationResult> {
        if num_folds <= 1 {
            return Err(NerError::configuration(format!(
                "number of folds for cross validation must be greater than 1, got {num_folds}"
            )));
        }
        if data.is_empty() {
            return Err(NerError::empty_data("no sequences to cross validate"));
        }

        let folds = SequenceStratifiedKFold::new(num_folds, seed)?.split(&data.labels)?;
        let evaluator = FoldEvaluator::new(&self.pipeline, data, collect_spans);
        let tagset = evaluator.tagset().to_vec();
        info!("Tagset: {:?}", tagset);

        let mut fold_statistics = Vec::with_capacity(folds.len());
        let mut predicted_deltas = Vec::new();
        let mut gold_deltas = Vec::new();
        for (index, fold) in folds.iter().enumerate() {
            let outcome = evaluator.evaluate(index, fold)?;
            fold_statistics.push(outcome.statistics);
            predicted_deltas.extend(outcome.predicted_spans);
            gold_deltas.extend(outcome.gold_spans);
        }

        let statistics = aggregate(&tagset, &fold_statistics);
        info!("Cross validation summary:\n{}", render_summary_table(&statistics));

        let (predicted_spans, gold_spans) = if collect_spans {
            let empty: SpansByDocument = data
                .sequences
                .iter()
                .map(|s| (s.document.clone(), Vec::new()))
                .collect();
            (
                Some(merge_span_deltas(std::iter::once(empty.clone()).chain(predicted_deltas))),
                Some(merge_span_deltas(std::iter::once(empty).chain(gold_deltas))),
            )
        } else {
            (None, None)
        };

        Ok(CrossValidationResult {
            folds,
            tagset,
            fold_statistics,
            statistics,
            predicted_spans,
            gold_spans,
            prediction_directory: None,
            groundtruth_directory: None,
        })
    }

    /// Salva o learner treinado em `path`.
    pub fn dump(&self, path: &Path) -> Result<()> {
        let learner = self
            .learner
            .as_ref()
            .ok_or_else(|| NerError::configuration("must fit model before dumping"))?;
        learner.save(path)?;
        info!("Model written to {}", path.display());
        Ok(())
    }

    /// Carrega um learner salvo por [`Model::dump`] com o mesmo pipeline.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let (learner_name, mut learner) = self.pipeline.get_learner();
        learner.load(path)?;
        info!("Loaded {} from {}", learner_name, path.display());
        self.learner = Some(learner);
        Ok(())
    }

    pub fn info(&self) -> PipelineInformation {
        self.pipeline.information()
    }
}

fn extract_file<P: Pipeline + ?Sized>(pipeline: &P, file: &DataFile) -> Result<ExtractedData> {
    info!("Processing file: {}", file.file_name);
    let document = Document::from_data_file(file)?;
    let data = pipeline.extract(&document)?;
    info!(
        "{}: feature extraction completed (num_sequences={})",
        file.file_name,
        data.len()
    );
    Ok(data)
}
