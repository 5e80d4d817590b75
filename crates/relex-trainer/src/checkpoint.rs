//! Checkpoint persistence.
//!
//! A checkpoint is a single safetensors file. Tensors:
//!
//! - `model.<param>`: every trainable parameter
//! - `optimizer.<param>.<slot>`: Adadelta accumulators
//!
//! Header metadata carries `epoch`, `loss` (last batch), `avg_loss` and
//! `optimizer` (JSON of [`AdadeltaState`]).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, anyhow, bail};
use candle_core::{Device, Tensor, Var};
use safetensors::SafeTensors;

use crate::optimizer::{Adadelta, AdadeltaState};

const MODEL_PREFIX: &str = "model.";
const OPTIMIZER_PREFIX: &str = "optimizer.";

/// Progress values stored alongside the tensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointMeta {
    pub epoch: usize,
    pub loss: f64,
    pub avg_loss: f64,
}

/// A checkpoint read back from disk.
#[derive(Debug)]
pub struct Checkpoint {
    pub meta: CheckpointMeta,
    pub optimizer: AdadeltaState,
    pub model: HashMap<String, Tensor>,
    pub optimizer_slots: HashMap<String, Tensor>,
}

/// Write model parameters and optimizer state to `path`, creating parent
/// directories as needed.
pub fn save_checkpoint(
    path: &Path,
    meta: CheckpointMeta,
    params: &[(String, Var)],
    optimizer: &Adadelta,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
    }

    let mut tensors: Vec<(String, Tensor)> = params
        .iter()
        .map(|(name, var)| (format!("{MODEL_PREFIX}{name}"), var.as_tensor().clone()))
        .collect();
    tensors.extend(
        optimizer
            .slot_tensors()
            .into_iter()
            .map(|(name, t)| (format!("{OPTIMIZER_PREFIX}{name}"), t)),
    );

    let metadata: HashMap<String, String> = HashMap::from([
        ("epoch".to_string(), meta.epoch.to_string()),
        ("loss".to_string(), meta.loss.to_string()),
        ("avg_loss".to_string(), meta.avg_loss.to_string()),
        ("optimizer".to_string(), serde_json::to_string(&optimizer.state())?),
    ]);

    safetensors::serialize_to_file(tensors, &Some(metadata), path)
        .with_context(|| format!("Cannot write checkpoint '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), epoch = meta.epoch, "Saved checkpoint");
    Ok(())
}

/// Read a checkpoint written by [`save_checkpoint`].
pub fn load_checkpoint(path: &Path, device: &Device) -> anyhow::Result<Checkpoint> {
    let buffer = std::fs::read(path)
        .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;
    let (_, header) = SafeTensors::read_metadata(&buffer)
        .with_context(|| format!("Invalid checkpoint '{}'", path.display()))?;
    let info = header
        .metadata()
        .as_ref()
        .ok_or_else(|| anyhow!("checkpoint '{}' has no metadata", path.display()))?;

    let field = |key: &str| {
        info.get(key)
            .ok_or_else(|| anyhow!("checkpoint '{}' is missing '{key}'", path.display()))
    };
    let meta = CheckpointMeta {
        epoch: field("epoch")?.parse()?,
        loss: field("loss")?.parse()?,
        avg_loss: field("avg_loss")?.parse()?,
    };
    let optimizer: AdadeltaState = serde_json::from_str(field("optimizer")?)?;

    let mut model = HashMap::new();
    let mut optimizer_slots = HashMap::new();
    for (name, tensor) in candle_core::safetensors::load_buffer(&buffer, device)? {
        if let Some(param) = name.strip_prefix(MODEL_PREFIX) {
            model.insert(param.to_string(), tensor);
        } else if let Some(slot) = name.strip_prefix(OPTIMIZER_PREFIX) {
            optimizer_slots.insert(slot.to_string(), tensor);
        } else {
            bail!("unexpected tensor '{name}' in checkpoint '{}'", path.display());
        }
    }

    Ok(Checkpoint {
        meta,
        optimizer,
        model,
        optimizer_slots,
    })
}

impl Checkpoint {
    /// Copy saved values into `params` and `optimizer`. Every parameter must be
    /// present with a matching shape.
    pub fn restore(
        &self,
        params: &[(String, Var)],
        optimizer: &mut Adadelta,
    ) -> anyhow::Result<()> {
        for (name, var) in params {
            let saved = self
                .model
                .get(name)
                .ok_or_else(|| anyhow!("checkpoint has no parameter '{name}'"))?;
            if saved.dims() != var.dims() {
                bail!(
                    "parameter '{name}' has shape {:?} in the checkpoint but {:?} in the model",
                    saved.dims(),
                    var.dims()
                );
            }
            var.set(&saved.to_device(var.device())?)?;
        }
        optimizer.load_state(self.optimizer, &self.optimizer_slots)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParamsAdadelta;
    use candle_nn::Optimizer;

    fn param(values: &[f32]) -> Var {
        Var::from_tensor(&Tensor::new(values, &Device::Cpu).unwrap()).unwrap()
    }

    #[test]
    fn save_then_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.safetensors");

        let w = param(&[1.0, -2.0]);
        let params = vec![("net.w".to_string(), w.clone())];
        let mut opt = Adadelta::new_named(params.clone(), ParamsAdadelta::default()).unwrap();
        let loss = w.as_tensor().sqr().unwrap().sum_all().unwrap();
        opt.backward_step(&loss).unwrap();

        let meta = CheckpointMeta {
            epoch: 4,
            loss: 0.25,
            avg_loss: 0.5,
        };
        save_checkpoint(&path, meta, &params, &opt).unwrap();

        let ckpt = load_checkpoint(&path, &Device::Cpu).unwrap();
        assert_eq!(ckpt.meta, meta);
        assert_eq!(ckpt.optimizer.step, 1);
        assert!(ckpt.optimizer_slots.contains_key("net.w.square_avg"));

        let fresh = param(&[0.0, 0.0]);
        let fresh_params = vec![("net.w".to_string(), fresh.clone())];
        let mut fresh_opt =
            Adadelta::new_named(fresh_params.clone(), ParamsAdadelta::default()).unwrap();
        ckpt.restore(&fresh_params, &mut fresh_opt).unwrap();

        assert_eq!(
            fresh.as_tensor().to_vec1::<f32>().unwrap(),
            w.as_tensor().to_vec1::<f32>().unwrap()
        );
        assert_eq!(fresh_opt.step_count(), 1);
    }

    #[test]
    fn restore_rejects_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let params = vec![("w".to_string(), param(&[1.0, 2.0]))];
        let opt = Adadelta::new_named(params.clone(), ParamsAdadelta::default()).unwrap();
        let meta = CheckpointMeta {
            epoch: 0,
            loss: 1.0,
            avg_loss: 1.0,
        };
        save_checkpoint(&path, meta, &params, &opt).unwrap();

        let ckpt = load_checkpoint(&path, &Device::Cpu).unwrap();
        let other = vec![("w".to_string(), param(&[1.0, 2.0, 3.0]))];
        let mut other_opt = Adadelta::new_named(other.clone(), ParamsAdadelta::default()).unwrap();
        assert!(ckpt.restore(&other, &mut other_opt).is_err());

        let missing = vec![("v".to_string(), param(&[1.0, 2.0]))];
        assert!(ckpt.restore(&missing, &mut other_opt).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_checkpoint(&dir.path().join("none.safetensors"), &Device::Cpu).is_err());
    }
}
