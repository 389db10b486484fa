//! Differentiable loss operations

use crate::autograd::{BackwardOp, GradCell, Tensor};
use ndarray::Array1;
use std::rc::Rc;

/// Mean squared error, L = mean((predictions - targets)²)
///
/// Returns a one-element tensor. Gradients flow into `predictions` and, if it
/// was produced by other operations, on through its graph. `targets` is
/// treated as a constant.
///
/// # Panics
///
/// Panics if the operands differ in length.
pub fn mse_loss(predictions: &Tensor, targets: &Tensor) -> Tensor {
    assert_eq!(
        predictions.len(),
        targets.len(),
        "Predictions and targets must have same length"
    );

    let diff = &*predictions.data() - &*targets.data();
    let mse = (&diff * &diff).mean().unwrap_or(0.0);

    let requires_grad = predictions.requires_grad();
    let mut loss = Tensor::from_vec(vec![mse], requires_grad);

    if requires_grad {
        // d(MSE)/d(pred) = 2 * (pred - target) / n
        let n = predictions.len().max(1) as f32;
        let backward_op = Rc::new(MseBackward {
            predictions: predictions.clone(),
            local_grad: diff * (2.0 / n),
            result_grad: loss.grad_cell(),
        });
        loss.set_backward_op(backward_op);
    }

    loss
}

struct MseBackward {
    predictions: Tensor,
    local_grad: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for MseBackward {
    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.predictions]
    }

    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            self.predictions.accumulate_grad(&self.local_grad * grad[0]);
        }
    }
}
