//! Activation function autograd operations: relu, tanh

use crate::autograd::{BackwardOp, GradCell, Tensor};
use std::rc::Rc;

/// ReLU activation
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad).shaped_like(a);

    if requires_grad {
        let backward_op = Rc::new(ReluBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReluBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for ReluBackward {
    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a]
    }

    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * (a > 0)
                let grad_a = grad * &self.a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
                self.a.accumulate_grad(grad_a);
            }
        }
    }
}

/// Hyperbolic tangent activation
pub fn tanh(a: &Tensor) -> Tensor {
    let data = a.data().mapv(f32::tanh);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad).shaped_like(a);

    if requires_grad {
        let backward_op = Rc::new(TanhBackward {
            a: a.clone(),
            output: result.detach(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct TanhBackward {
    a: Tensor,
    output: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for TanhBackward {
    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a]
    }

    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂tanh/∂x = 1 - tanh²(x)
                let local = self.output.data().mapv(|y| 1.0 - y * y);
                self.a.accumulate_grad(grad * &local);
            }
        }
    }
}
