use crate::cli::{CrossValidateArgs, DemoArgs, PipelineArgs, PredictArgs, TrainArgs};
use clinical_ner_core::corpus::write_demo_dataset;
use clinical_ner_core::report::render_summary_table;
use clinical_ner_core::{
    ClinicalPipeline, CrossValidationOptions, CrossValidationResult, Dataset, Model, OutputDirectory,
    PipelineConfig, Result,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

fn load_model(args: &PipelineArgs) -> Result<Model<ClinicalPipeline>> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.n_jobs = threads;
    }
    config.validate()?;
    let n_jobs = config.n_jobs;
    Ok(Model::new(ClinicalPipeline::new(config)).with_jobs(n_jobs))
}

fn output_directory(flag: &Option<Option<PathBuf>>) -> Option<OutputDirectory> {
    flag.as_ref()
        .map(|dir| dir.clone().map_or(OutputDirectory::Default, OutputDirectory::At))
}

pub fn train(args: TrainArgs) -> Result<()> {
    let start = Instant::now();
    let mut model = load_model(&args.pipeline)?;
    let dataset = Dataset::new(&args.dataset)?;
    model.fit(&dataset, args.asynchronous)?;
    model.dump(&args.output)?;
    info!("Total execution time: {:.2?}", start.elapsed());
    Ok(())
}

pub fn predict(args: PredictArgs) -> Result<()> {
    let mut model = load_model(&args.pipeline)?;
    model.load(&args.model)?;

    if let Some(text) = &args.text {
        print!("{}", model.predict_text(text)?.to_ann_string());
        return Ok(());
    }
    if let Some(dir) = &args.dataset {
        let dataset = Dataset::new(dir)?;
        let destination = args.output_dir.clone().map(OutputDirectory::At);
        model.predict_dataset(&dataset, destination.as_ref())?;
    }
    Ok(())
}

pub fn cross_validate(args: CrossValidateArgs) -> Result<()> {
    let start = Instant::now();
    let model = load_model(&args.pipeline)?;
    let options = CrossValidationOptions {
        num_folds: args.folds,
        seed: args.seed,
        training_dataset: Some(args.dataset.clone()),
        prediction_directory: output_directory(&args.predictions),
        groundtruth_directory: output_directory(&args.groundtruth),
        asynchronous: args.asynchronous,
    };
    let result = model.cross_validate(&options)?;

    print!("{}", render_result(&result, args.json)?);
    info!("Total execution time: {:.2?}", start.elapsed());
    Ok(())
}

/// Texto impresso no stdout, sempre terminado em nova linha.
fn render_result(result: &CrossValidationResult, json: bool) -> Result<String> {
    let body = if json {
        serde_json::to_string_pretty(result)?
    } else {
        render_summary_table(&result.statistics)
    };
    Ok(format!("{body}\n"))
}

pub fn demo(args: DemoArgs) -> Result<()> {
    let dataset = write_demo_dataset(&args.output)?;
    println!(
        "Wrote {} annotated notes to {}",
        dataset.len(),
        dataset.data_directory().display()
    );
    Ok(())
}

pub fn info(args: PipelineArgs) -> Result<()> {
    let model = load_model(&args)?;
    println!("{}", model.info());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_ends_with_newline() {
        let result = CrossValidationResult::default();
        let table = render_result(&result, false).unwrap();
        assert!(table.ends_with("|\n"));
        assert!(!table.ends_with("\n\n"));

        let json = render_result(&result, true).unwrap();
        assert!(json.ends_with("}\n"));
    }
}
