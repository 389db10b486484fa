//! Matrix multiplication autograd operations
//!
//! Matrices are row-major and flattened; the dimensions travel alongside the
//! data rather than in the tensor shape.

use crate::autograd::{BackwardOp, GradCell, Tensor};
use ndarray::Array1;
use std::rc::Rc;

/// Transpose a row-major matrix (rows x cols) to (cols x rows)
pub fn transpose(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut transposed = vec![0.0f32; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            transposed[c * rows + r] = data[r * cols + c];
        }
    }
    transposed
}

/// Compute C = A @ B on flat row-major buffers
///
/// The `i-p-j` loop order keeps both inner accesses sequential.
pub fn matmul_compute(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    for i in 0..m {
        let row = &mut c[i * n..(i + 1) * n];
        for p in 0..k {
            let a_ip = a[i * k + p];
            if a_ip == 0.0 {
                continue;
            }
            for (c_ij, &b_pj) in row.iter_mut().zip(&b[p * n..(p + 1) * n]) {
                *c_ij += a_ip * b_pj;
            }
        }
    }
    c
}

/// Matrix multiplication against a transposed right operand
///
/// Computes C = A @ B^T where A is m×k and B is n×k, so C is m×n. This is
/// the product a linear layer needs with its `[out, in]` weight.
///
/// # Panics
///
/// Panics if either operand length disagrees with the given dimensions.
pub fn matmul_transposed(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Tensor {
    assert_eq!(a.len(), m * k, "Matrix A size mismatch");
    assert_eq!(b.len(), n * k, "Matrix B size mismatch");

    let result_data = {
        let a_data = a.data().to_vec();
        let b_t = transpose(&b.to_vec(), n, k);
        matmul_compute(&a_data, &b_t, m, k, n)
    };

    let requires_grad = a.requires_grad() || b.requires_grad();
    let mut result = Tensor::zeros(&[m, n], requires_grad);
    *result.data_mut() = Array1::from(result_data);

    if requires_grad {
        let backward_op = Rc::new(MatmulTransposedBackward {
            a: a.clone(),
            b: b.clone(),
            m,
            k,
            n,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MatmulTransposedBackward {
    a: Tensor,
    b: Tensor,
    m: usize,
    k: usize,
    n: usize,
    result_grad: GradCell,
}

impl BackwardOp for MatmulTransposedBackward {
    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a, &self.b]
    }

    fn backward(&self) {
        if let Some(grad_output) = self.result_grad.borrow().as_ref() {
            // ∂L/∂A = ∂L/∂C @ B    (m×n) @ (n×k) = (m×k)
            // ∂L/∂B = ∂L/∂C^T @ A  (n×m) @ (m×k) = (n×k)
            let grad_c = grad_output.to_vec();

            if self.a.requires_grad() {
                let grad_a = matmul_compute(&grad_c, &self.b.to_vec(), self.m, self.n, self.k);
                self.a.accumulate_grad(Array1::from(grad_a));
            }

            if self.b.requires_grad() {
                let grad_c_t = transpose(&grad_c, self.m, self.n);
                let grad_b = matmul_compute(&grad_c_t, &self.a.to_vec(), self.n, self.m, self.k);
                self.b.accumulate_grad(Array1::from(grad_b));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_2x3() {
        // [1, 2, 3]
        // [4, 5, 6]
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let result = transpose(&data, 2, 3);
        assert_eq!(result, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_matmul_compute_2x3_3x2() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let c = matmul_compute(&a, &b, 2, 3, 2);
        assert_eq!(c, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_transposed_matches_explicit_transpose() {
        // A 2x3, B 2x3 (so B^T is 3x2)
        let a_data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b_data = vec![0.5, -1.0, 2.0, 1.0, 0.0, -0.5];
        let a = Tensor::from_vec(a_data.clone(), true);
        let b = Tensor::from_vec(b_data.clone(), true);

        let c = matmul_transposed(&a, &b, 2, 3, 2);
        let expected = matmul_compute(&a_data, &transpose(&b_data, 2, 3), 2, 3, 2);
        assert_eq!(c.to_vec(), expected);
        assert_eq!(c.shape(), &[2, 2]);

        c.set_grad(Array1::ones(4));
        c.backward_op().unwrap().backward();
        // dB[j, p] = sum_i A[i, p]
        assert_eq!(b.grad().unwrap().to_vec(), vec![5.0, 7.0, 9.0, 5.0, 7.0, 9.0]);
        // dA[i, p] = sum_j B[j, p]
        assert_eq!(a.grad().unwrap().to_vec(), vec![1.5, -1.0, 1.5, 1.5, -1.0, 1.5]);
    }

    #[test]
    fn test_frozen_left_operand_gets_no_grad() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], false);
        let b = Tensor::from_vec(vec![5.0, 6.0, 7.0, 8.0], true);
        let c = matmul_transposed(&a, &b, 2, 2, 2);

        c.set_grad(Array1::ones(4));
        c.backward_op().unwrap().backward();

        assert!(a.grad().is_none());
        assert_eq!(b.grad().unwrap().to_vec(), vec![4.0, 6.0, 4.0, 6.0]);
    }

    #[test]
    #[should_panic(expected = "Matrix B size mismatch")]
    fn test_size_mismatch_b() {
        let a = Tensor::from_vec(vec![1.0, 2.0], false);
        let b = Tensor::from_vec(vec![5.0, 6.0, 7.0], false);
        let _ = matmul_transposed(&a, &b, 1, 2, 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(50))]

            #[test]
            fn prop_identity_is_neutral(
                m in 1..=6usize,
                k in 1..=6usize,
                seed in 0..500u32,
            ) {
                let a: Vec<f32> = (0..m * k)
                    .map(|i| ((i as f32 + seed as f32) * 0.37).sin())
                    .collect();
                let mut identity = vec![0.0; k * k];
                for i in 0..k {
                    identity[i * k + i] = 1.0;
                }
                let result = matmul_compute(&a, &identity, m, k, k);
                for (&got, &exp) in result.iter().zip(a.iter()) {
                    prop_assert!((got - exp).abs() < 1e-5);
                }
            }

            #[test]
            fn prop_double_transpose(rows in 1..=8usize, cols in 1..=8usize) {
                let data: Vec<f32> = (0..rows * cols).map(|i| i as f32).collect();
                let back = transpose(&transpose(&data, rows, cols), cols, rows);
                prop_assert_eq!(back, data);
            }
        }
    }
}
