use std::path::Path;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{folds::FoldTable, split::assemble_fold, tensor::Dataset};
use crate::error::{CcnnError, Result};
use crate::io::json::{load_json, save_json};
use crate::metrics::r_squared;
use crate::network::{architecture::Architecture, network::{ConnectomeNet, Initialization}};
use crate::train::{loop_fn::train_loop, train_config::TrainConfig, trainer::{ConnectomeTrainer, ModelTrainer}};

/// Held-out labels and predictions of one fold.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldResult {
    pub fold: usize,
    pub labels: Vec<f64>,
    pub predictions: Vec<f64>,
    pub r_squared: f64,
}

/// Outcome of a complete cross-validation run.
///
/// `labels` and `predictions` are the test splits stacked in fold order;
/// `r_squared` is computed over the stacked vectors, not averaged per fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResults {
    pub labels: Vec<f64>,
    pub predictions: Vec<f64>,
    pub folds: FoldTable,
    pub fold_r_squared: Vec<f64>,
    pub r_squared: f64,
}

impl CvResults {
    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }

    pub fn load_json(path: &Path) -> Result<CvResults> {
        load_json(path)
    }
}

/// Stacks per-fold results into one `CvResults`.
pub fn aggregate(results: Vec<FoldResult>, table: &FoldTable) -> CvResults {
    let mut labels = Vec::new();
    let mut predictions = Vec::new();
    let mut fold_r_squared = Vec::with_capacity(results.len());
    for result in results {
        labels.extend(result.labels);
        predictions.extend(result.predictions);
        fold_r_squared.push(result.r_squared);
    }
    let r_squared = r_squared(&labels, &predictions);
    CvResults { labels, predictions, folds: table.clone(), fold_r_squared, r_squared }
}

/// Seed of the RNG owned by fold `fold` of a run seeded with `seed`.
pub(crate) fn fold_seed(seed: u64, fold: usize) -> u64 {
    seed ^ (fold as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Trains and evaluates one network per fold.
///
/// Every fold gets a freshly initialized network and optimizer; nothing is
/// carried from one fold to the next. The first error aborts the run.
pub fn run_cross_validation(
    dataset: &Dataset,
    table: &FoldTable,
    config: &TrainConfig,
    init: &Initialization,
    arch: Architecture,
    seed: u64,
) -> Result<CvResults> {
    config.validate()?;
    if dataset.side() != arch.num_roi {
        return Err(CcnnError::ShapeMismatch {
            what: "connectivity matrices",
            expected: format!("{0}x{0}", arch.num_roi),
            found: format!("{0}x{0}", dataset.side()),
        });
    }
    table.covers(&dataset.subjects)?;

    log::info!(
        "Cross-validating {} instances of {} subjects in {} folds",
        dataset.len(),
        dataset.unique_subjects(),
        table.num_folds()
    );
    let mut results = Vec::with_capacity(table.num_folds());
    for fold in 0..table.num_folds() {
        let mut rng = StdRng::seed_from_u64(fold_seed(seed, fold));
        let result = run_fold(fold, dataset, table, config, init, arch, &mut rng)?;
        log::info!("Test R squared: {:.2}", result.r_squared);
        results.push(result);
    }

    let cv = aggregate(results, table);
    log::info!("Final R squared: {:.2}", cv.r_squared);
    Ok(cv)
}

fn run_fold(
    fold: usize,
    dataset: &Dataset,
    table: &FoldTable,
    config: &TrainConfig,
    init: &Initialization,
    arch: Architecture,
    rng: &mut StdRng,
) -> Result<FoldResult> {
    let mut split = assemble_fold(fold, table, dataset, rng)?;
    log::info!(
        "Fold {}/{}: {} train and {} test instances ({} test subjects)",
        fold + 1,
        table.num_folds(),
        split.train.len(),
        split.test.len(),
        split.test_subjects.len()
    );

    let net = ConnectomeNet::new(arch, init, rng)?;
    let mut trainer = ConnectomeTrainer::new(net, config, rng.gen());
    train_loop(&mut trainer, &mut split.train, config, rng)?;

    let predictions = trainer.predict(&split.test.data);
    let labels = split.test.labels;
    let r_squared = r_squared(&labels, &predictions);
    Ok(FoldResult { fold, labels, predictions, r_squared })
}
