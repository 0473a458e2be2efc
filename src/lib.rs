//! MNIST random forest driver: flags, collaborator seams, and the
//! train-then-evaluate sequence.

mod driver;
mod flags;

pub use driver::{
    DataSource, EARLY_STOPPING_ROUNDS, EstimatorBuilder, MnistSource, NUM_CLASSES, NUM_FEATURES,
    TensorForestBuilder, forest_hparams, resolve_model_dir, train_and_eval,
};
pub use flags::{Flags, TrainConfig};
