#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use ehgstudies::config::{Study, StudyConfig};
use ehgstudies::data::load_feature_table;
use ehgstudies::hosseinzahde::study_hosseinzahde;
use ehgstudies::learn::Preprocessing;
use ehgstudies::protocol::{Protocol, ResultsBundle, StudyError};
use ehgstudies::sadiahmed::study_sadiahmed;

#[derive(Args)]
pub struct StudyArgs {
    /// Path to the feature table (tab-separated, or comma-separated with a .csv extension)
    pub features: PathBuf,

    /// Name of the binary outcome column (1 = term, 0 = preterm)
    #[arg(long, default_value = "Term")]
    pub label_column: String,

    /// Optional TOML file with study settings; flags below override it
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Feed raw features to the classifier instead of standardizing them (the
    /// oversampling branch always uses raw features)
    #[arg(long)]
    pub no_standardize: bool,

    /// Use C = 1 instead of tuning C by inner cross-validation
    #[arg(long)]
    pub no_grid: bool,

    /// Seed for fold shuffling, oversampling and probability calibration
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Number of cross-validation folds
    #[arg(long, value_name = "N")]
    pub folds: Option<usize>,

    /// Where to write the JSON results
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl StudyArgs {
    fn study_config(&self) -> Result<StudyConfig, StudyError> {
        let mut config = match &self.config {
            Some(path) => StudyConfig::from_toml_file(path)?,
            None => StudyConfig::default(),
        };
        if self.no_standardize {
            config.preprocessing = Preprocessing::Identity;
        }
        if self.no_grid {
            config.grid = false;
        }
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        if let Some(folds) = self.folds {
            config.n_splits = folds;
        }
        if let Some(output) = &self.output {
            config.output_file = Some(output.clone());
        }
        Ok(config)
    }
}

#[derive(Parser)]
#[command(
    name = "ehgstudies",
    about = "Reproduce EHG preterm-birth studies under four oversampling protocols",
    long_about = "Runs the Hosseinzahde or Sadi-Ahmed study on an EHG feature table and \
                 reports the AUC without oversampling, with oversampling inside \
                 cross-validation, in-sample, and with oversampling before cross-validation."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// RBF SVC on the ten most important features
    #[command(about = "Run the Hosseinzahde study")]
    Hosseinzahde(StudyArgs),

    /// Linear SVC on 21 EMD features over a rank-selected cohort
    #[command(about = "Run the Sadi-Ahmed study")]
    Sadiahmed(StudyArgs),
}

fn run_study(study: Study, args: StudyArgs) -> Result<(), StudyError> {
    let config = args.study_config()?;
    let (features, labels) = load_feature_table(&args.features, &args.label_column)?;
    let results = match study {
        Study::Hosseinzahde => study_hosseinzahde(&features, labels.view(), &config)?,
        Study::SadiAhmed => study_sadiahmed(&features, labels.view(), &config)?,
    };
    print_summary(&results);
    Ok(())
}

fn print_summary(results: &ResultsBundle) {
    for protocol in Protocol::ALL {
        println!(
            "{:<24} AUC {:.4}  ({} rows)",
            protocol.to_string(),
            results.auc(protocol),
            results.details(protocol).len()
        );
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();
    let result = match command {
        Some(Commands::Hosseinzahde(args)) => run_study(Study::Hosseinzahde, args),
        Some(Commands::Sadiahmed(args)) => run_study(Study::SadiAhmed, args),
        None => {
            if let Err(e) = Cli::command().print_help() {
                eprintln!("Error: {e}");
            }
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
