//! Controller structure and forward propagation.

use ndarray::{aview1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Two-layer tanh network driving a car
///
/// Shapes are fixed at construction: `w1` is `n_inputs x n_hidden`, `w2` is
/// `n_hidden x n_outputs`. `Clone` is a deep copy, so offspring never alias
/// their parent's weights.
#[derive(Clone, Debug, PartialEq)]
pub struct Controller {
    /// Input -> hidden weights
    pub w1: Array2<f64>,
    /// Hidden -> output weights
    pub w2: Array2<f64>,
}

impl Serialize for Controller {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let shape = [self.n_inputs(), self.n_hidden(), self.n_outputs()];
        let weights: Vec<f64> = self.w1.iter().chain(self.w2.iter()).copied().collect();

        let mut state = serializer.serialize_struct("Controller", 2)?;
        state.serialize_field("shape", &shape)?;
        state.serialize_field("weights", &weights)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Controller {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ControllerData {
            shape: [usize; 3],
            weights: Vec<f64>,
        }

        let data = ControllerData::deserialize(deserializer)?;
        let [n_inputs, n_hidden, n_outputs] = data.shape;
        Self::from_parts(n_inputs, n_hidden, n_outputs, &data.weights).map_err(serde::de::Error::custom)
    }
}

impl Controller {
    /// Create a controller with weights drawn uniformly from [-1, 1]
    pub fn random<R: Rng + ?Sized>(n_inputs: usize, n_hidden: usize, n_outputs: usize, rng: &mut R) -> Self {
        let w1 = Array2::from_shape_fn((n_inputs, n_hidden), |_| rng.gen_range(-1.0..=1.0));
        let w2 = Array2::from_shape_fn((n_hidden, n_outputs), |_| rng.gen_range(-1.0..=1.0));
        Self { w1, w2 }
    }

    /// Create a controller whose outputs are always zero
    pub fn zeros(n_inputs: usize, n_hidden: usize, n_outputs: usize) -> Self {
        Self {
            w1: Array2::zeros((n_inputs, n_hidden)),
            w2: Array2::zeros((n_hidden, n_outputs)),
        }
    }

    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.w1.nrows()
    }

    #[inline]
    pub fn n_hidden(&self) -> usize {
        self.w1.ncols()
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.w2.ncols()
    }

    /// Perform forward pass through the network
    ///
    /// Every output lies in [-1, 1] for any finite input.
    #[inline]
    pub fn forward(&self, inputs: &[f64]) -> Vec<f64> {
        debug_assert_eq!(inputs.len(), self.n_inputs());

        let mut hidden = aview1(inputs).dot(&self.w1);
        hidden.mapv_inplace(f64::tanh);

        let mut output = hidden.dot(&self.w2);
        output.mapv_inplace(f64::tanh);

        output.to_vec()
    }

    /// Total number of weights
    pub fn parameter_count(&self) -> usize {
        self.w1.len() + self.w2.len()
    }

    /// Check if network is valid (no NaN/Inf)
    pub fn is_valid(&self) -> bool {
        self.w1.iter().chain(self.w2.iter()).all(|w| w.is_finite())
    }

    /// Flatten to `[n_inputs, n_hidden, n_outputs, w1 row-major.., w2 row-major..]`
    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(3 + self.parameter_count());
        flat.push(self.n_inputs() as f64);
        flat.push(self.n_hidden() as f64);
        flat.push(self.n_outputs() as f64);
        flat.extend(self.w1.iter().copied());
        flat.extend(self.w2.iter().copied());
        flat
    }

    /// Rebuild a controller from the layout produced by [`Controller::to_flat`]
    pub fn from_flat(flat: &[f64]) -> Result<Self, String> {
        if flat.len() < 3 {
            return Err(format!("flat controller needs a 3-value header, got {} values", flat.len()));
        }
        let mut sizes = [0usize; 3];
        for (size, &raw) in sizes.iter_mut().zip(&flat[..3]) {
            if !(raw >= 0.0 && raw.fract() == 0.0) {
                return Err(format!("invalid layer size {}", raw));
            }
            *size = raw as usize;
        }
        let [n_inputs, n_hidden, n_outputs] = sizes;
        Self::from_parts(n_inputs, n_hidden, n_outputs, &flat[3..])
    }

    fn from_parts(n_inputs: usize, n_hidden: usize, n_outputs: usize, weights: &[f64]) -> Result<Self, String> {
        let split = n_inputs.checked_mul(n_hidden);
        let expected = split
            .zip(n_hidden.checked_mul(n_outputs))
            .and_then(|(a, b)| a.checked_add(b));
        let (Some(split), Some(expected)) = (split, expected) else {
            return Err(format!("controller shape {}x{}x{} is too large", n_inputs, n_hidden, n_outputs));
        };
        if weights.len() != expected {
            return Err(format!(
                "expected {} weights for a {}x{}x{} controller, got {}",
                expected,
                n_inputs,
                n_hidden,
                n_outputs,
                weights.len()
            ));
        }

        let w1 = Array2::from_shape_vec((n_inputs, n_hidden), weights[..split].to_vec())
            .map_err(|e| e.to_string())?;
        let w2 = Array2::from_shape_vec((n_hidden, n_outputs), weights[split..].to_vec())
            .map_err(|e| e.to_string())?;
        Ok(Self { w1, w2 })
    }
}
