//! Validação cruzada de ponta a ponta sobre o corpus sintético.

use std::fs;
use std::path::Path;

use clinical_ner_core::corpus::{clinical_notes, write_demo_dataset};
use clinical_ner_core::{
    ClinicalPipeline, CrossValidationOptions, LearnerKind, Model, NerError, OutputDirectory, PipelineConfig,
};

fn options(dataset: &Path) -> CrossValidationOptions {
    CrossValidationOptions {
        num_folds: 4,
        seed: 11,
        training_dataset: Some(dataset.to_path_buf()),
        ..CrossValidationOptions::default()
    }
}

#[test]
fn same_seed_gives_identical_results() {
    let dir = tempfile::tempdir().unwrap();
    write_demo_dataset(dir.path()).unwrap();
    let model = Model::new(ClinicalPipeline::default());
    let options = CrossValidationOptions {
        num_folds: 5,
        ..options(dir.path())
    };

    let first = model.cross_validate(&options).unwrap();
    let second = model.cross_validate(&options).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.folds.len(), 5);
    assert_eq!(
        first.tagset,
        vec!["Dosage", "Drug", "Duration", "Frequency", "Reason", "Route"]
    );
}

#[test]
fn folds_partition_all_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_demo_dataset(dir.path()).unwrap();
    let model = Model::new(ClinicalPipeline::default());
    let n = model.preprocess(&dataset, false).unwrap().len();

    let result = model.cross_validate(&options(dir.path())).unwrap();
    let mut seen: Vec<usize> = result.folds.iter().flat_map(|f| f.test.iter().copied()).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..n).collect::<Vec<_>>());
    for fold in &result.folds {
        assert!(fold.train.iter().all(|i| !fold.test.contains(i)));
    }
}

#[test]
fn aggregate_bounds_hold() {
    let dir = tempfile::tempdir().unwrap();
    write_demo_dataset(dir.path()).unwrap();
    let result = Model::new(ClinicalPipeline::default())
        .cross_validate(&options(dir.path()))
        .unwrap();

    assert_eq!(result.fold_statistics.len(), 4);
    assert_eq!(result.statistics.rows.last().unwrap().0, "system");
    for (_, s) in &result.statistics.rows {
        assert!(s.f1_min <= s.f1_avg + 1e-12 && s.f1_avg <= s.f1_max + 1e-12);
        assert!(s.precision_min <= s.precision_avg + 1e-12 && s.precision_avg <= s.precision_max + 1e-12);
        assert!(s.recall_min <= s.recall_avg + 1e-12 && s.recall_avg <= s.recall_max + 1e-12);
        assert!((0.0..=1.0).contains(&s.f1_max));
    }
    assert!(result.statistics.system().f1_avg > 0.0);
}

#[test]
fn prediction_directory_without_dataset_is_rejected() {
    let options = CrossValidationOptions {
        prediction_directory: Some(OutputDirectory::Default),
        ..CrossValidationOptions::default()
    };
    let err = Model::new(ClinicalPipeline::default())
        .cross_validate(&options)
        .unwrap_err();
    assert!(matches!(err, NerError::Configuration(_)));
}

#[test]
fn documents_without_tokens_are_empty_data() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "   \n").unwrap();
    fs::write(dir.path().join("b.txt"), "").unwrap();

    let options = CrossValidationOptions {
        num_folds: 2,
        prediction_directory: Some(OutputDirectory::Default),
        ..options(dir.path())
    };
    let err = Model::new(ClinicalPipeline::default())
        .cross_validate(&options)
        .unwrap_err();
    assert!(matches!(err, NerError::EmptyData(_)));
    assert!(!dir.path().join("predictions").exists());
}

#[test]
fn single_fold_is_rejected_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    write_demo_dataset(dir.path()).unwrap();
    let options = CrossValidationOptions {
        num_folds: 1,
        prediction_directory: Some(OutputDirectory::Default),
        ..options(dir.path())
    };
    let err = Model::new(ClinicalPipeline::default())
        .cross_validate(&options)
        .unwrap_err();
    assert!(matches!(err, NerError::Configuration(_)));
    assert!(!dir.path().join("predictions").exists());
}

#[test]
fn writes_predictions_and_groundtruth() {
    let dir = tempfile::tempdir().unwrap();
    write_demo_dataset(dir.path()).unwrap();
    let gt_dir = tempfile::tempdir().unwrap();

    let options = CrossValidationOptions {
        prediction_directory: Some(OutputDirectory::Default),
        groundtruth_directory: Some(OutputDirectory::At(gt_dir.path().join("gold"))),
        ..options(dir.path())
    };
    let result = Model::new(ClinicalPipeline::default())
        .cross_validate(&options)
        .unwrap();

    let predictions = dir.path().join("predictions");
    let groundtruth = gt_dir.path().join("gold");
    assert_eq!(result.prediction_directory.as_deref(), Some(predictions.as_path()));
    assert_eq!(result.groundtruth_directory.as_deref(), Some(groundtruth.as_path()));

    let notes = clinical_notes();
    for note in &notes {
        assert!(predictions.join(format!("{}.ann", note.id)).is_file());
        // A reconstrução das tags gold devolve exatamente as anotações originais
        let gold = fs::read_to_string(groundtruth.join(format!("{}.ann", note.id))).unwrap();
        let original = fs::read_to_string(dir.path().join(format!("{}.ann", note.id))).unwrap();
        assert_eq!(gold, original, "{}", note.id);
    }

    let spans = result.gold_spans.unwrap();
    assert_eq!(spans.len(), notes.len());
}

#[test]
fn perceptron_asynchronous_cross_validation() {
    let dir = tempfile::tempdir().unwrap();
    write_demo_dataset(dir.path()).unwrap();
    let model = Model::new(ClinicalPipeline::new(PipelineConfig {
        learner: LearnerKind::Perceptron,
        ..PipelineConfig::default()
    }))
    .with_jobs(2);

    let options = CrossValidationOptions {
        asynchronous: true,
        ..options(dir.path())
    };
    let result = model.cross_validate(&options).unwrap();
    assert!(result.predicted_spans.is_none());
    assert!(result.prediction_directory.is_none());
    assert_eq!(result.fold_statistics.len(), 4);
}
