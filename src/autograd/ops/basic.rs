//! Basic autograd operations: add, mul, scale, sum, row broadcast

use crate::autograd::{BackwardOp, GradCell, Tensor};
use ndarray::Array1;
use std::rc::Rc;

/// Add two tensors element-wise
///
/// The output keeps the shape of `a`.
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    let data = &*a.data() + &*b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad).shaped_like(a);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a, &self.b]
    }

    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }
        }
    }
}

/// Multiply two tensors element-wise
///
/// The output keeps the shape of `a`.
pub fn mul(a: &Tensor, b: &Tensor) -> Tensor {
    let data = &*a.data() * &*b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad).shaped_like(a);

    if requires_grad {
        let backward_op = Rc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MulBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for MulBackward {
    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a, &self.b]
    }

    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * b
                let grad_a = grad * &*self.b.data();
                self.a.accumulate_grad(grad_a);
            }
            if self.b.requires_grad() {
                // ∂L/∂b = ∂L/∂out * a
                let grad_b = grad * &*self.a.data();
                self.b.accumulate_grad(grad_b);
            }
        }
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = &*a.data() * factor;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad).shaped_like(a);

    if requires_grad {
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ScaleBackward {
    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a]
    }

    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad * self.factor);
            }
        }
    }
}

/// Sum all elements
pub fn sum(a: &Tensor) -> Tensor {
    let data = Array1::from(vec![a.data().sum()]);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SumBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SumBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SumBackward {
    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a]
    }

    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let grad_a = Array1::from_elem(self.a.len(), grad[0]);
                self.a.accumulate_grad(grad_a);
            }
        }
    }
}

/// Add a length-`cols` row vector to every row of a `rows x cols` matrix
pub fn add_row_broadcast(matrix: &Tensor, row: &Tensor, rows: usize, cols: usize) -> Tensor {
    assert_eq!(matrix.len(), rows * cols, "matrix size mismatch");
    assert_eq!(row.len(), cols, "row size mismatch");

    let mut data = matrix.data().clone();
    {
        let row_data = row.data();
        for (i, v) in data.iter_mut().enumerate() {
            *v += row_data[i % cols];
        }
    }

    let requires_grad = matrix.requires_grad() || row.requires_grad();
    let mut result = Tensor::new(data, requires_grad).shaped_like(matrix);

    if requires_grad {
        let backward_op = Rc::new(RowBroadcastBackward {
            matrix: matrix.clone(),
            row: row.clone(),
            cols,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct RowBroadcastBackward {
    matrix: Tensor,
    row: Tensor,
    cols: usize,
    result_grad: GradCell,
}

impl BackwardOp for RowBroadcastBackward {
    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.matrix, &self.row]
    }

    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.matrix.requires_grad() {
                self.matrix.accumulate_grad(grad.clone());
            }
            if self.row.requires_grad() {
                // Column sums of the output gradient
                let mut grad_row = Array1::zeros(self.cols);
                for (i, g) in grad.iter().enumerate() {
                    grad_row[i % self.cols] += g;
                }
                self.row.accumulate_grad(grad_row);
            }
        }
    }
}
