//! Relation classifier: the feature layer followed by a small network.

use candle_core::{D, DType, Device, Tensor, Var};
use rand::Rng;
use relex_core::{Example, ExampleVectorizer};

/// Network mapping feature vectors `[batch, width]` to class logits
/// `[batch, num_classes]`.
pub trait RelationNet {
    fn forward(&self, features: &Tensor) -> candle_core::Result<Tensor>;

    /// Trainable parameters, keyed by a name unique within the network.
    fn named_vars(&self) -> Vec<(String, Var)>;
}

/// Two-layer perceptron with a ReLU hidden layer.
#[derive(Debug)]
pub struct MlpNet {
    w1: Var,
    b1: Var,
    w2: Var,
    b2: Var,
}

impl MlpNet {
    /// Weights and biases are drawn from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`.
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        hidden_dim: usize,
        num_classes: usize,
        rng: &mut R,
        device: &Device,
    ) -> candle_core::Result<Self> {
        let w1 = uniform_var((input_dim, hidden_dim), input_dim, rng, device)?;
        let b1 = uniform_var(hidden_dim, input_dim, rng, device)?;
        let w2 = uniform_var((hidden_dim, num_classes), hidden_dim, rng, device)?;
        let b2 = uniform_var(num_classes, hidden_dim, rng, device)?;
        Ok(Self { w1, b1, w2, b2 })
    }

    pub fn input_dim(&self) -> usize {
        self.w1.dims()[0]
    }

    pub fn num_classes(&self) -> usize {
        self.w2.dims()[1]
    }
}

fn uniform_var<S, R>(
    shape: S,
    fan_in: usize,
    rng: &mut R,
    device: &Device,
) -> candle_core::Result<Var>
where
    S: Into<candle_core::Shape>,
    R: Rng + ?Sized,
{
    let shape = shape.into();
    let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
    let data: Vec<f32> = (0..shape.elem_count())
        .map(|_| rng.gen_range(-bound..bound))
        .collect();
    Var::from_tensor(&Tensor::from_vec(data, shape, device)?)
}

impl RelationNet for MlpNet {
    fn forward(&self, features: &Tensor) -> candle_core::Result<Tensor> {
        features
            .matmul(self.w1.as_tensor())?
            .broadcast_add(self.b1.as_tensor())?
            .relu()?
            .matmul(self.w2.as_tensor())?
            .broadcast_add(self.b2.as_tensor())
    }

    fn named_vars(&self) -> Vec<(String, Var)> {
        vec![
            ("fc1.weight".into(), self.w1.clone()),
            ("fc1.bias".into(), self.b1.clone()),
            ("fc2.weight".into(), self.w2.clone()),
            ("fc2.bias".into(), self.b2.clone()),
        ]
    }
}

/// Vectorizer plus network. Parameters are exposed as `embedding.*` and
/// `net.*`.
pub struct RelationModel<N: RelationNet> {
    vectorizer: ExampleVectorizer,
    net: N,
}

impl<N: RelationNet> RelationModel<N> {
    pub fn new(vectorizer: ExampleVectorizer, net: N) -> Self {
        Self { vectorizer, net }
    }

    /// Class logits for `examples`, shape `[examples.len(), num_classes]`.
    pub fn forward(&self, examples: &[Example]) -> relex_core::Result<Tensor> {
        let features = self.vectorizer.vectorize_batch(examples)?;
        Ok(self.net.forward(&features)?)
    }

    /// Arg-max class per example.
    pub fn predict(&self, examples: &[Example]) -> relex_core::Result<Vec<u32>> {
        let logits = self.forward(examples)?;
        Ok(logits.argmax(D::Minus1)?.to_dtype(DType::U32)?.to_vec1::<u32>()?)
    }

    /// Fraction of `examples` predicted correctly, evaluated `batch_size` at a
    /// time. An empty set scores 0.
    pub fn accuracy(&self, examples: &[Example], batch_size: usize) -> relex_core::Result<f64> {
        if examples.is_empty() {
            return Ok(0.0);
        }
        let mut correct = 0usize;
        for chunk in examples.chunks(batch_size.max(1)) {
            let predicted = self.predict(chunk)?;
            correct += predicted
                .iter()
                .zip(chunk)
                .filter(|(p, e)| **p == e.label_id)
                .count();
        }
        Ok(correct as f64 / examples.len() as f64)
    }

    /// All trainable parameters.
    pub fn named_vars(&self) -> Vec<(String, Var)> {
        let mut vars = self.vectorizer.named_vars();
        vars.extend(
            self.net
                .named_vars()
                .into_iter()
                .map(|(name, var)| (format!("net.{name}"), var)),
        );
        vars
    }

    pub fn vectorizer(&self) -> &ExampleVectorizer {
        &self.vectorizer
    }

    pub fn net(&self) -> &N {
        &self.net
    }

    pub fn device(&self) -> &Device {
        self.vectorizer.device()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use relex_core::{EdgeDirection, LabelMap, PathStep, VectorizerConfig, WordVectors};

    pub(crate) fn tiny_model(num_classes: usize, seed: u64) -> RelationModel<MlpNet> {
        let vectors = WordVectors::from_pairs([
            ("obama", vec![0.5f32, -0.1]),
            ("born", vec![0.2, 0.3]),
            ("hawaii", vec![-0.4, 0.9]),
            ("company", vec![0.1, 0.1]),
        ])
        .unwrap();
        let pos = LabelMap::from_symbols(["NNP", "VBN", "NN"]).unwrap();
        let dep = LabelMap::from_symbols(["nsubj", "prep", "pobj", "ROOT"]).unwrap();
        let config = VectorizerConfig {
            max_path_len: 3,
            max_abs_offset: 5,
            position_dim: 3,
            ..VectorizerConfig::default()
        };
        let device = Device::Cpu;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let vectorizer =
            ExampleVectorizer::build(&config, &vectors, pos, dep, &mut rng, &device).unwrap();
        let net = MlpNet::new(vectorizer.width(), 8, num_classes, &mut rng, &device).unwrap();
        RelationModel::new(vectorizer, net)
    }

    pub(crate) fn sample(label: u32, word: &str, offset: i64) -> Example {
        Example::new(
            label,
            vec![
                PathStep::new(word, "NNP", "nsubj", EdgeDirection::Backward, offset),
                PathStep::new("born", "VBN", "prep", EdgeDirection::Forward, offset + 1),
            ],
        )
    }

    #[test]
    fn logits_have_class_width() {
        let model = tiny_model(4, 1);
        let logits = model
            .forward(&[sample(0, "obama", 0), sample(1, "hawaii", 2)])
            .unwrap();
        assert_eq!(logits.dims(), &[2, 4]);
    }

    #[test]
    fn parameter_names_are_prefixed() {
        let model = tiny_model(3, 1);
        let names: Vec<String> = model.named_vars().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"embedding.word".to_string()));
        assert!(names.contains(&"net.fc1.weight".to_string()));
        assert!(names.contains(&"net.fc2.bias".to_string()));
    }

    #[test]
    fn accuracy_is_a_fraction() {
        let model = tiny_model(3, 2);
        let examples: Vec<Example> = (0..7).map(|i| sample(i % 3, "obama", 0)).collect();
        let acc = model.accuracy(&examples, 3).unwrap();
        assert!((0.0..=1.0).contains(&acc));

        let predicted = model.predict(&examples[..1]).unwrap()[0];
        let all_right: Vec<Example> = (0..4).map(|_| sample(predicted, "obama", 0)).collect();
        assert_eq!(model.accuracy(&all_right, 2).unwrap(), 1.0);
        assert_eq!(model.accuracy(&[], 2).unwrap(), 0.0);
    }

    #[test]
    fn same_seed_same_model() {
        let a = tiny_model(3, 9).forward(&[sample(0, "obama", 1)]).unwrap();
        let b = tiny_model(3, 9).forward(&[sample(0, "obama", 1)]).unwrap();
        assert_eq!(
            a.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            b.flatten_all().unwrap().to_vec1::<f32>().unwrap()
        );
    }
}
