use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{folds::FoldTable, tensor::Dataset};
use crate::error::{CcnnError, Result};
use crate::io::{json, labels::LabelColumns};
use crate::network::{
    architecture::Architecture,
    network::{ExportScope, Initialization},
    params::ParamBundle,
};
use crate::train::train_config::TrainConfig;

/// How a pretrained bundle seeds the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PretrainedMode {
    /// Frozen convolutions, fresh fully connected layers.
    #[default]
    Transfer,
    /// Frozen convolutions, fully connected layers continue from the bundle.
    FineTune,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pretrained {
    pub path: PathBuf,
    #[serde(default)]
    pub mode: PretrainedMode,
}

/// Everything one `cv` or `pretrain` run needs, read from a JSON file.
///
/// Only `tensor_path` and `labels_path` are required; everything else falls
/// back to the baseline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub tensor_path: PathBuf,
    pub labels_path: PathBuf,
    #[serde(default)]
    pub label_columns: LabelColumns,
    /// Fold table to reuse. Built from `seed` and saved here when missing.
    #[serde(default)]
    pub folds_path: Option<PathBuf>,
    #[serde(default = "default_num_folds")]
    pub num_folds: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "TrainConfig::baseline")]
    pub train: TrainConfig,
    #[serde(default)]
    pub arch: Architecture,
    #[serde(default)]
    pub pretrained: Option<Pretrained>,
    #[serde(default)]
    pub results_path: Option<PathBuf>,
    #[serde(default)]
    pub export_path: Option<PathBuf>,
    #[serde(default)]
    pub export_scope: ExportScope,
}

fn default_num_folds() -> usize {
    10
}

impl RunConfig {
    /// Reads and validates a run configuration.
    pub fn load(path: &Path) -> Result<RunConfig> {
        let config: RunConfig = json::load_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_folds == 0 {
            return Err(CcnnError::InvalidConfig("num_folds must be at least 1".into()));
        }
        self.train.validate()?;
        self.arch.validate()
    }

    /// Reuses the table at `folds_path` when it exists, otherwise builds one
    /// from `seed` and saves it there. A reused table must have `num_folds`
    /// folds and assign every subject of `dataset`.
    pub fn fold_table(&self, dataset: &Dataset) -> Result<FoldTable> {
        if let Some(path) = self.folds_path.as_deref().filter(|p| p.exists()) {
            let table = FoldTable::load_json(path)?;
            if table.num_folds() != self.num_folds {
                return Err(CcnnError::InvalidConfig(format!(
                    "'{}' has {} folds but num_folds is {}",
                    path.display(),
                    table.num_folds(),
                    self.num_folds
                )));
            }
            table.covers(&dataset.subjects)?;
            log::info!("Reusing fold table '{}'", path.display());
            return Ok(table);
        }

        let table = FoldTable::build(self.num_folds, &dataset.subjects, &mut StdRng::seed_from_u64(self.seed))?;
        if let Some(path) = &self.folds_path {
            table.save_json(path)?;
            log::info!("Saved fold table to '{}'", path.display());
        }
        Ok(table)
    }

    /// Loads the pretrained bundle, if one is configured.
    pub fn initialization(&self) -> Result<Initialization> {
        let Some(pretrained) = &self.pretrained else {
            return Ok(Initialization::Xavier);
        };
        let bundle = ParamBundle::load_json(&pretrained.path)?;
        log::info!(
            "Loaded {} pretrained tensors from '{}'",
            bundle.len(),
            pretrained.path.display()
        );
        Ok(match pretrained.mode {
            PretrainedMode::Transfer => Initialization::Transfer(bundle),
            PretrainedMode::FineTune => Initialization::FineTune(bundle),
        })
    }
}
