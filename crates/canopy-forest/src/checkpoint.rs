//! Checkpoint serialization via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::forest::RandomForest;
use crate::hparams::TensorForestParams;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// File name of the checkpoint inside a model directory.
pub const CHECKPOINT_FILE: &str = "forest.ckpt";

/// A trained forest together with the step count and hyperparameters that produced it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Checkpoint {
    /// Number of training batches consumed so far.
    pub global_step: u64,
    /// Hyperparameters the forest was grown with.
    pub params: TensorForestParams,
    /// The forest itself.
    pub forest: RandomForest,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CheckpointEnvelope {
    format_version: u32,
    checkpoint: Checkpoint,
}

impl Checkpoint {
    /// Write the checkpoint to `path`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SerializeCheckpoint`] | bincode encoding failed |
    /// | [`ForestError::WriteFile`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();

        let envelope = CheckpointEnvelope {
            format_version: FORMAT_VERSION,
            checkpoint: self.clone(),
        };
        let bytes = bincode::serialize(&envelope)
            .map_err(|e| ForestError::SerializeCheckpoint { source: e })?;

        std::fs::write(path, &bytes).map_err(|e| ForestError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            global_step = self.global_step,
            n_trees = self.forest.n_trees(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Read a checkpoint from `path`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::ReadFile`] | file read failed |
    /// | [`ForestError::DeserializeCheckpoint`] | bincode decoding failed |
    /// | [`ForestError::IncompatibleCheckpointVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForestError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| ForestError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let envelope: CheckpointEnvelope =
            bincode::deserialize(&bytes).map_err(|e| ForestError::DeserializeCheckpoint {
                path: path.to_path_buf(),
                source: e,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(ForestError::IncompatibleCheckpointVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        debug!(
            global_step = envelope.checkpoint.global_step,
            n_trees = envelope.checkpoint.forest.n_trees(),
            "checkpoint loaded"
        );
        Ok(envelope.checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{CHECKPOINT_FILE, Checkpoint};
    use crate::forest::RandomForest;
    use crate::hparams::ForestHParams;
    use crate::ForestError;

    fn stump_checkpoint() -> Checkpoint {
        let params = ForestHParams::new(3, 2).with_num_trees(2).fill().unwrap();
        Checkpoint {
            global_step: 17,
            forest: RandomForest::stumps(&params),
            params,
        }
    }

    #[test]
    fn round_trip_preserves_everything() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CHECKPOINT_FILE);
        let checkpoint = stump_checkpoint();
        checkpoint.save(&path).unwrap();
        assert_eq!(Checkpoint::load(&path).unwrap(), checkpoint);
    }

    #[test]
    fn load_missing_file_error() {
        let dir = TempDir::new().unwrap();
        let err = Checkpoint::load(dir.path().join("absent.ckpt")).unwrap_err();
        assert!(matches!(err, ForestError::ReadFile { .. }));
    }

    #[test]
    fn load_corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.ckpt");
        std::fs::write(&path, b"not a checkpoint").unwrap();
        let err = Checkpoint::load(&path).unwrap_err();
        assert!(matches!(err, ForestError::DeserializeCheckpoint { .. }));
    }
}
