use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::{shuffle::shuffle_samples, tensor::Dataset};
use crate::error::{CcnnError, Result};
use crate::metrics::r_squared;
use crate::network::{architecture::Architecture, network::{ConnectomeNet, Initialization}};
use crate::train::{loop_fn::train_loop, train_config::TrainConfig, trainer::{ConnectomeTrainer, ModelTrainer}};

/// Trains one network on every instance of `dataset`, with nothing held out.
///
/// Used to produce parameters for a later stage: export the result with
/// `ConnectomeNet::export` and load it there as `Initialization::Transfer`.
/// The dataset is expected to be normalized already (`io::load_dataset`
/// does this); it is not normalized again here.
pub fn train_full(
    dataset: &Dataset,
    config: &TrainConfig,
    init: &Initialization,
    arch: Architecture,
    seed: u64,
) -> Result<ConnectomeNet> {
    config.validate()?;
    if dataset.side() != arch.num_roi {
        return Err(CcnnError::ShapeMismatch {
            what: "connectivity matrices",
            expected: format!("{0}x{0}", arch.num_roi),
            found: format!("{0}x{0}", dataset.side()),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = dataset.samples.clone();
    shuffle_samples(&mut train, &mut rng);

    let net = ConnectomeNet::new(arch, init, &mut rng)?;
    log::info!(
        "Training on all {} instances, {} trainable parameters",
        train.len(),
        net.trainable_param_count()
    );
    let mut trainer = ConnectomeTrainer::new(net, config, rng.gen());
    let summary = train_loop(&mut trainer, &mut train, config, &mut rng)?;

    let fit = r_squared(&train.labels, &trainer.predict(&train.data));
    log::info!(
        "Finished {} steps over {} epochs; training R squared: {:.2}",
        summary.steps,
        summary.epochs,
        fit
    );
    Ok(trainer.into_net())
}
