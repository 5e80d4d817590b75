//! Adadelta with inspectable state.
//!
//! Follows the `torch.optim.Adadelta` update rule:
//!
//! ```text
//! g      <- g + weight_decay * theta
//! v      <- rho * v + (1 - rho) * g^2
//! delta  <- sqrt(u + eps) / sqrt(v + eps) * g
//! u      <- rho * u + (1 - rho) * delta^2
//! theta  <- theta - lr * delta
//! ```
//!
//! The per-parameter accumulators `v` (`square_avg`) and `u` (`acc_delta`) are
//! keyed by parameter name so they can be written to and restored from a
//! checkpoint.

use std::collections::HashMap;

use candle_core::backprop::GradStore;
use candle_core::{Result, Tensor, Var};
use candle_nn::Optimizer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamsAdadelta {
    pub lr: f64,
    pub rho: f64,
    pub eps: f64,
    pub weight_decay: f64,
}

impl Default for ParamsAdadelta {
    fn default() -> Self {
        Self {
            lr: 1.0,
            rho: 0.9,
            eps: 1e-6,
            weight_decay: 0.0,
        }
    }
}

/// Optimizer state stored next to the accumulators in a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdadeltaState {
    pub params: ParamsAdadelta,
    pub step: usize,
}

#[derive(Debug)]
struct VarAdadelta {
    name: String,
    var: Var,
    square_avg: Var,
    acc_delta: Var,
}

#[derive(Debug)]
pub struct Adadelta {
    vars: Vec<VarAdadelta>,
    params: ParamsAdadelta,
    step_t: usize,
}

const SLOTS: [&str; 2] = ["square_avg", "acc_delta"];

impl Adadelta {
    /// Optimizer over named parameters. Non floating-point variables are skipped.
    pub fn new_named(vars: Vec<(String, Var)>, params: ParamsAdadelta) -> Result<Self> {
        let vars = vars
            .into_iter()
            .filter(|(_, var)| var.dtype().is_float())
            .map(|(name, var)| {
                let square_avg = Var::zeros(var.shape(), var.dtype(), var.device())?;
                let acc_delta = Var::zeros(var.shape(), var.dtype(), var.device())?;
                Ok(VarAdadelta {
                    name,
                    var,
                    square_avg,
                    acc_delta,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            vars,
            params,
            step_t: 0,
        })
    }

    pub fn params(&self) -> &ParamsAdadelta {
        &self.params
    }

    /// Number of steps taken so far.
    pub fn step_count(&self) -> usize {
        self.step_t
    }

    pub fn state(&self) -> AdadeltaState {
        AdadeltaState {
            params: self.params,
            step: self.step_t,
        }
    }

    /// Accumulators keyed `<param>.<slot>`.
    pub fn slot_tensors(&self) -> Vec<(String, Tensor)> {
        let mut out = Vec::with_capacity(self.vars.len() * SLOTS.len());
        for v in &self.vars {
            out.push((format!("{}.{}", v.name, SLOTS[0]), v.square_avg.as_tensor().clone()));
            out.push((format!("{}.{}", v.name, SLOTS[1]), v.acc_delta.as_tensor().clone()));
        }
        out
    }

    /// Restore accumulators saved by [`Adadelta::slot_tensors`].
    pub fn load_state(
        &mut self,
        state: AdadeltaState,
        slots: &HashMap<String, Tensor>,
    ) -> Result<()> {
        for v in &self.vars {
            for (slot, target) in SLOTS.iter().zip([&v.square_avg, &v.acc_delta]) {
                let key = format!("{}.{}", v.name, slot);
                let saved = slots.get(&key).ok_or_else(|| {
                    candle_core::Error::Msg(format!("missing optimizer slot {key}"))
                })?;
                target.set(&saved.to_device(v.var.device())?)?;
            }
        }
        self.params = state.params;
        self.step_t = state.step;
        Ok(())
    }
}

impl Optimizer for Adadelta {
    type Config = ParamsAdadelta;

    fn new(vars: Vec<Var>, params: ParamsAdadelta) -> Result<Self> {
        let named = vars
            .into_iter()
            .enumerate()
            .map(|(i, var)| (format!("param{i}"), var))
            .collect();
        Self::new_named(named, params)
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.lr = lr
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.step_t += 1;
        let ParamsAdadelta {
            lr,
            rho,
            eps,
            weight_decay,
        } = self.params;

        for v in &self.vars {
            let theta = v.var.as_tensor();
            let Some(g) = grads.get(theta) else {
                continue;
            };
            let g = if weight_decay != 0.0 {
                (g + theta.affine(weight_decay, 0.0)?)?
            } else {
                g.clone()
            };

            let square_avg = ((v.square_avg.as_tensor() * rho)? + (g.sqr()? * (1.0 - rho))?)?;
            let std = (&square_avg + eps)?.sqrt()?;
            let delta = ((v.acc_delta.as_tensor() + eps)?.sqrt()?.div(&std)? * &g)?;
            let acc_delta = ((v.acc_delta.as_tensor() * rho)? + (delta.sqr()? * (1.0 - rho))?)?;

            v.square_avg.set(&square_avg)?;
            v.acc_delta.set(&acc_delta)?;
            v.var.set(&(theta - (delta * lr)?)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn scalar_param(x: f32) -> Var {
        Var::from_tensor(&Tensor::new(&[x], &Device::Cpu).unwrap()).unwrap()
    }

    #[test]
    fn first_step_matches_closed_form() {
        let w = scalar_param(1.0);
        let mut opt = Adadelta::new_named(vec![("w".into(), w.clone())], ParamsAdadelta::default())
            .unwrap();

        // d(w^2)/dw = 2w = 2
        let loss = w.as_tensor().sqr().unwrap().sum_all().unwrap();
        opt.backward_step(&loss).unwrap();

        // v = 0.1 * 4, delta = sqrt(eps) / sqrt(v + eps) * 2
        let v = 0.1f64 * 4.0;
        let delta = (1e-6f64).sqrt() / (v + 1e-6).sqrt() * 2.0;
        let got = w.as_tensor().to_vec1::<f32>().unwrap()[0] as f64;
        assert!((got - (1.0 - delta)).abs() < 1e-5, "got {got}");
        assert_eq!(opt.step_count(), 1);
    }

    #[test]
    fn decreases_a_quadratic() {
        let w = scalar_param(3.0);
        let mut opt = Adadelta::new(vec![w.clone()], ParamsAdadelta::default()).unwrap();
        for _ in 0..200 {
            let loss = w.as_tensor().sqr().unwrap().sum_all().unwrap();
            opt.backward_step(&loss).unwrap();
        }
        let got = w.as_tensor().to_vec1::<f32>().unwrap()[0];
        assert!(got < 3.0 && got > 0.0);
    }

    #[test]
    fn state_survives_a_reload() {
        let w = scalar_param(1.0);
        let mut opt = Adadelta::new_named(vec![("w".into(), w.clone())], ParamsAdadelta::default())
            .unwrap();
        let loss = w.as_tensor().sqr().unwrap().sum_all().unwrap();
        opt.backward_step(&loss).unwrap();

        let slots: HashMap<String, Tensor> = opt.slot_tensors().into_iter().collect();
        assert!(slots.contains_key("w.square_avg"));
        assert!(slots.contains_key("w.acc_delta"));

        let other = scalar_param(1.0);
        let mut restored =
            Adadelta::new_named(vec![("w".into(), other)], ParamsAdadelta::default()).unwrap();
        restored.load_state(opt.state(), &slots).unwrap();
        assert_eq!(restored.step_count(), 1);

        let a = opt.slot_tensors();
        let b = restored.slot_tensors();
        for ((na, ta), (nb, tb)) in a.iter().zip(&b) {
            assert_eq!(na, nb);
            assert_eq!(ta.to_vec1::<f32>().unwrap(), tb.to_vec1::<f32>().unwrap());
        }
    }

    #[test]
    fn missing_slot_is_an_error() {
        let mut opt =
            Adadelta::new_named(vec![("w".into(), scalar_param(1.0))], ParamsAdadelta::default())
                .unwrap();
        let state = opt.state();
        assert!(opt.load_state(state, &HashMap::new()).is_err());
    }
}
