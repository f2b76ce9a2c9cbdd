use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clinical-ner",
          version,
          about = "Clinical named-entity recognition: training, prediction and cross validation",
          long_about = None,
          disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(global = true)]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Train a model on an annotated dataset")]
    Train(TrainArgs),
    #[clap(about = "Predict entities with a trained model")]
    Predict(PredictArgs),
    #[clap(about = "Stratified k-fold cross validation")]
    CrossValidate(CrossValidateArgs),
    #[clap(about = "Write the built-in synthetic clinical corpus")]
    Demo(DemoArgs),
    #[clap(about = "Show pipeline and learner information")]
    Info(PipelineArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[clap(short = 'c')]
    #[clap(long = "config")]
    #[clap(help = "Pipeline configuration (JSON)")]
    #[clap(value_name = "CONFIG")]
    #[arg(value_parser = check_file_exists)]
    pub config: Option<PathBuf>,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of preprocessing threads (overrides the configuration)")]
    #[clap(value_name = "THREADS")]
    #[arg(value_parser = threads_in_range)]
    pub threads: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct TrainArgs {
    #[clap(required = true)]
    #[clap(short = 'd')]
    #[clap(long = "dataset")]
    #[clap(help = "Directory with .txt and .ann files")]
    #[clap(value_name = "DATASET")]
    #[arg(value_parser = check_dir_exists)]
    pub dataset: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Where to write the trained model")]
    #[clap(value_name = "MODEL")]
    pub output: PathBuf,

    #[clap(long = "async")]
    #[clap(help = "Preprocess documents in parallel")]
    pub asynchronous: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["dataset", "text"])))]
#[command(arg_required_else_help(true))]
pub struct PredictArgs {
    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "model")]
    #[clap(help = "Model written by `train`")]
    #[clap(value_name = "MODEL")]
    #[arg(value_parser = check_file_exists)]
    pub model: PathBuf,

    #[clap(short = 'd')]
    #[clap(long = "dataset")]
    #[clap(help = "Directory with .txt files to annotate")]
    #[clap(value_name = "DATASET")]
    #[arg(value_parser = check_dir_exists)]
    pub dataset: Option<PathBuf>,

    #[clap(long = "text")]
    #[clap(help = "Annotate a single text and print the .ann lines")]
    #[clap(value_name = "TEXT")]
    pub text: Option<String>,

    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(help = "Prediction directory (default: <DATASET>/predictions)")]
    #[clap(value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct CrossValidateArgs {
    #[clap(required = true)]
    #[clap(short = 'd')]
    #[clap(long = "dataset")]
    #[clap(help = "Directory with .txt and .ann files")]
    #[clap(value_name = "DATASET")]
    #[arg(value_parser = check_dir_exists)]
    pub dataset: PathBuf,

    #[clap(short = 'k')]
    #[clap(long = "folds")]
    #[clap(help = "Number of folds")]
    #[clap(value_name = "FOLDS")]
    #[clap(default_value = "5")]
    pub folds: usize,

    #[clap(long = "seed")]
    #[clap(help = "Seed for the stratified split")]
    #[clap(value_name = "SEED")]
    #[clap(default_value = "0")]
    pub seed: u64,

    #[clap(long = "predictions")]
    #[clap(help = "Write fold predictions (default: <DATASET>/predictions)")]
    #[clap(value_name = "DIR")]
    #[arg(num_args = 0..=1)]
    pub predictions: Option<Option<PathBuf>>,

    #[clap(long = "groundtruth")]
    #[clap(help = "Write the groundtruth seen by the folds (default: <DATASET>/groundtruth)")]
    #[clap(value_name = "DIR")]
    #[arg(num_args = 0..=1)]
    pub groundtruth: Option<Option<PathBuf>>,

    #[clap(long = "async")]
    #[clap(help = "Preprocess documents in parallel")]
    pub asynchronous: bool,

    #[clap(long = "json")]
    #[clap(help = "Print the full result as JSON instead of the summary table")]
    pub json: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct DemoArgs {
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Directory to write the corpus to")]
    #[clap(value_name = "DIR")]
    pub output: PathBuf,
}

/// Instala o subscriber de logs. `RUST_LOG`, quando definido, tem prioridade
/// sobre `-v`.
pub fn init_verbose(args: &Cli) {
    let filter_level = match args.verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn threads_in_range(s: &str) -> Result<usize, String> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf, String> {
    let path = Path::new(s);
    if !path.is_file() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_dir_exists(s: &str) -> Result<PathBuf, String> {
    let path = Path::new(s);
    if !path.is_dir() {
        Err(format!("Directory does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_optional_output_directories() {
        let cli = Cli::try_parse_from(["clinical-ner", "cross-validate", "-d", ".", "--predictions", "--groundtruth", "gt"])
            .unwrap();
        let Command::CrossValidate(args) = cli.command else {
            panic!("expected cross-validate");
        };
        assert_eq!(args.predictions, Some(None));
        assert_eq!(args.groundtruth, Some(Some(PathBuf::from("gt"))));
        assert_eq!(args.folds, 5);
    }

    #[test]
    fn test_verbosity_is_global() {
        let cli = Cli::try_parse_from(["clinical-ner", "demo", "-o", "out", "-vv"]).unwrap();
        assert_eq!(cli.verbosity, 2);
    }

    #[test]
    fn test_threads_must_be_positive() {
        assert!(threads_in_range("0").is_err());
        assert_eq!(threads_in_range("4"), Ok(4));
    }
}
