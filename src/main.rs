use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};

use connectome_cnn::{
    error::{CcnnError, Result},
    io::{load_dataset, read_labels, LabelColumns},
    run_cross_validation, train_full, Dataset, FoldTable, RunConfig,
};

#[derive(Parser)]
#[command(
    name = "ccnn",
    version,
    about = "Connectome CNN age regression with subject-aware cross-validation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign the subjects of a label file to cross-validation folds
    Folds {
        /// CSV label file with a subject id column
        labels: PathBuf,

        /// Where to write the fold table (JSON)
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value = "10")]
        num_folds: usize,

        #[arg(long, default_value = "0")]
        seed: u64,

        /// 0-based column holding the subject id
        #[arg(long, default_value = "0")]
        subject_column: usize,

        /// 0-based column holding the label
        #[arg(long, default_value = "2")]
        label_column: usize,
    },

    /// Cross-validate a network as described by a run configuration
    Cv {
        /// JSON run configuration
        config: PathBuf,
    },

    /// Train on the whole dataset and export the parameters for a later stage
    Pretrain {
        /// JSON run configuration; `export_path` is required
        config: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Folds { labels, out, num_folds, seed, subject_column, label_column } => {
            let columns = LabelColumns { subject: Some(subject_column), label: label_column, has_header: false };
            folds_command(&labels, &out, &columns, num_folds, seed)
        }
        Commands::Cv { config } => cv_command(&config),
        Commands::Pretrain { config } => pretrain_command(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn folds_command(labels: &Path, out: &Path, columns: &LabelColumns, num_folds: usize, seed: u64) -> Result<()> {
    let table = read_labels(labels, columns)?;
    let subjects = table.subjects.unwrap_or_default();
    let folds = FoldTable::build(num_folds, &subjects, &mut StdRng::seed_from_u64(seed))?;
    folds.save_json(out)?;
    log::info!(
        "Wrote {} folds of up to {} subjects to '{}'",
        folds.num_folds(),
        folds.rows(),
        out.display()
    );
    Ok(())
}

fn cv_command(config_path: &Path) -> Result<()> {
    let config = RunConfig::load(config_path)?;
    let dataset = load(&config)?;
    let table = config.fold_table(&dataset)?;
    let init = config.initialization()?;

    let results = run_cross_validation(&dataset, &table, &config.train, &init, config.arch, config.seed)?;
    if let Some(path) = &config.results_path {
        results.save_json(path)?;
        log::info!("Saved results to '{}'", path.display());
    }
    Ok(())
}

fn pretrain_command(config_path: &Path) -> Result<()> {
    let config = RunConfig::load(config_path)?;
    let export_path = config
        .export_path
        .clone()
        .ok_or_else(|| CcnnError::InvalidConfig("pretrain needs an export_path".into()))?;
    let dataset = load(&config)?;
    let init = config.initialization()?;

    let net = train_full(&dataset, &config.train, &init, config.arch, config.seed)?;
    let bundle = net.export(config.export_scope);
    bundle.save_json(&export_path)?;
    log::info!("Saved {} tensors to '{}'", bundle.len(), export_path.display());
    Ok(())
}

fn load(config: &RunConfig) -> Result<Dataset> {
    load_dataset(&config.tensor_path, &config.labels_path, &config.label_columns, config.arch.num_roi)
}
