//! Feed-forward controller networks for cars.
//!
//! Implements a fixed-topology two-layer perceptron with:
//! - Dense input->hidden and hidden->output weight matrices (no biases)
//! - tanh activations on both layers
//! - Per-weight random perturbation for reproduction

mod network;
mod mutations;

pub use network::Controller;
pub use mutations::MutationConfig;
