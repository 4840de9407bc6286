use anyhow::Context;
use clap::{Parser, Subcommand};
use json::object;
use rust_imbalance::config::ExperimentConfig;
use rust_imbalance::experiment::{
    self, ClassifierKind, PipelineReport, ResamplerKind, Scenario, ScenarioOutcome,
};
use rust_imbalance::parsing::labeled_csv::{self, LabelColumn};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Log progress at info level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the built-in scenarios on synthetic data and print one accuracy per scenario
    Scenarios {
        /// Only run these scenarios, in the given order
        #[arg(short, long, value_enum, value_delimiter = ',')]
        only: Vec<Scenario>,

        /// TOML file overriding the default experiment settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for data generation, splitting and every estimator
        #[arg(short, long)]
        seed: Option<u64>,

        /// Write the outcomes as JSON
        #[arg(short, long)]
        report_path: Option<PathBuf>,
    },

    /// Resample and classify a labeled CSV file
    Csv {
        /// The path of the CSV file, with a header row
        #[arg(short, long)]
        file: PathBuf,

        /// Column holding the integer class label
        #[arg(short, long, value_enum, default_value_t = LabelColumn::Last)]
        label_column: LabelColumn,

        #[arg(short, long, value_enum, default_value_t = ResamplerKind::Passthrough)]
        resampler: ResamplerKind,

        #[arg(short = 'm', long, value_enum, default_value_t = ClassifierKind::RandomForest)]
        classifier: ClassifierKind,

        /// Fraction of rows held out for scoring
        #[arg(short, long, default_value_t = 0.2)]
        test_size: f64,

        #[arg(short, long, default_value_t = 42)]
        seed: u64,

        /// Keep class proportions equal on both sides of the split
        #[arg(long)]
        stratify: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

/// Write the outcomes in JSON format
/// The keys are the scenario labels, each holding the accuracy and the row counts
fn write_report(
    report_path: &Path,
    seed: u64,
    outcomes: &[ScenarioOutcome],
) -> std::io::Result<()> {
    let mut data = object! {};
    let mut file = File::create(report_path)?;
    data["seed"] = seed.into();

    for outcome in outcomes {
        let mut entry = object! {};
        entry["accuracy"] = outcome.accuracy.into();
        entry["train_rows"] = outcome.train_rows.into();
        entry["fitted_rows"] = outcome.fitted_rows.into();
        entry["test_rows"] = outcome.test_rows.into();

        data[outcome.scenario.label()] = entry;
    }

    file.write_all(data.pretty(2).as_bytes())?;

    Ok(())
}

fn run_scenarios(
    only: Vec<Scenario>,
    config: Option<PathBuf>,
    seed: Option<u64>,
    report_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut experiment_config = match &config {
        Some(path) => ExperimentConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    if let Some(seed) = seed {
        experiment_config = experiment_config.with_seed(seed);
    }

    let scenarios = if only.is_empty() {
        Scenario::ALL.to_vec()
    } else {
        only
    };

    let mut outcomes = vec![];
    for scenario in scenarios {
        let outcome = experiment::run_scenario(scenario, &experiment_config)
            .with_context(|| format!("scenario '{}' failed", scenario.label()))?;
        println!("{}: {}", scenario.label(), outcome.accuracy);
        outcomes.push(outcome);
    }

    if let Some(report_path) = report_path {
        write_report(&report_path, experiment_config.seed, &outcomes)
            .with_context(|| format!("failed to write report {}", report_path.display()))?;
    }

    Ok(())
}

/// `classes` maps each class index back to the label found in the file
fn print_report(report: &PipelineReport, classes: &[usize]) {
    println!("Accuracy: {}", report.accuracy);
    println!("Balanced accuracy: {}", report.balanced_accuracy);
    println!(
        "Rows: {} train, {} fitted, {} test",
        report.train_rows, report.fitted_rows, report.test_rows
    );
    println!(
        "{:>8} {:>10} {:>10} {:>10} {:>8}",
        "class", "precision", "recall", "f1-score", "support"
    );

    for scores in &report.per_class {
        println!(
            "{:>8} {:>10.3} {:>10.3} {:>10.3} {:>8}",
            classes.get(scores.label).copied().unwrap_or(scores.label),
            scores.precision,
            scores.recall,
            scores.f1_score,
            scores.support
        );
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Scenarios {
            only,
            config,
            seed,
            report_path,
        } => run_scenarios(only, config, seed, report_path),
        Command::Csv {
            file,
            label_column,
            resampler,
            classifier,
            test_size,
            seed,
            stratify,
        } => {
            let (dataset, classes) = labeled_csv::load_labeled(&file, label_column)
                .with_context(|| format!("failed to read dataset {}", file.display()))?;
            let mut config = ExperimentConfig::default().with_seed(seed);
            config.test_size = test_size;

            let report =
                experiment::run_pipeline(&dataset, resampler, classifier, &config, stratify)
                    .context("pipeline failed")?;
            print_report(&report, &classes);

            Ok(())
        }
    }
}
