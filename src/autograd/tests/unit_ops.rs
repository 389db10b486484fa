//! Unit tests for autograd operations (forward and backward)

use super::test_utils::finite_difference;
use crate::autograd::{
    add, add_row_broadcast, backward, matmul_transposed, mse_loss, mul, relu, scale, sum, Tensor,
};
use approx::assert_abs_diff_eq;

#[test]
fn test_add_backward() {
    let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
    let b = Tensor::from_vec(vec![4.0, 5.0, 6.0], true);
    let c = add(&a, &b);
    assert_abs_diff_eq!(c.data()[2], 9.0);

    backward(&c, Some(ndarray::arr1(&[1.0, 1.0, 1.0])));

    assert_abs_diff_eq!(a.grad().expect("gradient should be available")[0], 1.0);
    assert_abs_diff_eq!(b.grad().expect("gradient should be available")[0], 1.0);
}

#[test]
fn test_mul_backward() {
    let a = Tensor::from_vec(vec![2.0, 3.0], true);
    let b = Tensor::from_vec(vec![5.0, 7.0], true);
    let c = mul(&a, &b);

    backward(&c, Some(ndarray::arr1(&[1.0, 1.0])));

    let grad_a = a.grad().expect("gradient should be available");
    let grad_b = b.grad().expect("gradient should be available");

    // d(a*b)/da = b
    assert_abs_diff_eq!(grad_a[0], 5.0);
    assert_abs_diff_eq!(grad_a[1], 7.0);

    // d(a*b)/db = a
    assert_abs_diff_eq!(grad_b[0], 2.0);
    assert_abs_diff_eq!(grad_b[1], 3.0);
}

#[test]
fn test_mul_keeps_left_shape() {
    let w = Tensor::from_shape_vec(&[2, 3], vec![1.0; 6], false).unwrap();
    let m = Tensor::ones_like(&w, true);
    assert_eq!(mul(&w, &m).shape(), &[2, 3]);
}

#[test]
fn test_scale_backward() {
    let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
    let c = scale(&a, 3.0);
    assert_abs_diff_eq!(c.data()[1], 6.0);

    backward(&c, Some(ndarray::arr1(&[1.0, 1.0, 1.0])));

    let grad_a = a.grad().expect("gradient should be available");
    assert_abs_diff_eq!(grad_a[0], 3.0);
    assert_abs_diff_eq!(grad_a[2], 3.0);
}

#[test]
fn test_no_grad_inputs_build_no_graph() {
    let a = Tensor::from_vec(vec![1.0, 2.0], false);
    let b = Tensor::from_vec(vec![3.0, 4.0], false);

    assert!(!add(&a, &b).requires_grad());
    assert!(!mul(&a, &b).requires_grad());
    assert!(!scale(&a, 2.0).requires_grad());
    assert!(!relu(&a).requires_grad());
    assert!(mul(&a, &b).backward_op().is_none());
}

#[test]
fn test_sum_backward() {
    let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
    let c = sum(&a);
    assert_abs_diff_eq!(c.item().unwrap(), 6.0);

    backward(&c, None);

    let grad_a = a.grad().expect("gradient should be available");
    assert_abs_diff_eq!(grad_a[0], 1.0);
    assert_abs_diff_eq!(grad_a[1], 1.0);
    assert_abs_diff_eq!(grad_a[2], 1.0);
}

#[test]
fn test_chain_rule() {
    // f(x) = sum(relu(x * 2))
    let a = Tensor::from_vec(vec![-1.0, 1.0, 2.0], true);
    let b = scale(&a, 2.0);
    let c = relu(&b);
    let d = sum(&c);

    backward(&d, None);

    let grad_a = a.grad().expect("gradient should be available");
    assert_abs_diff_eq!(grad_a[0], 0.0);
    assert_abs_diff_eq!(grad_a[1], 2.0);
    assert_abs_diff_eq!(grad_a[2], 2.0);
}

#[test]
fn test_row_broadcast_backward() {
    // 2x3 matrix plus a length-3 row
    let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], true);
    let b = Tensor::from_vec(vec![10.0, 20.0, 30.0], true);
    let y = add_row_broadcast(&x, &b, 2, 3);
    assert_eq!(y.to_vec(), vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);

    backward(&y, Some(ndarray::arr1(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])));

    assert_eq!(x.grad().unwrap().to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(b.grad().unwrap().to_vec(), vec![5.0, 7.0, 9.0]);
}

#[test]
fn test_matmul_transposed_forward() {
    // [1, 2, 3]   [7,  8]
    // [4, 5, 6] @ [9, 10]  = [58, 64; 139, 154]
    //             [11, 12]
    // with the right operand stored transposed, as a linear weight is
    let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], true);
    let b = Tensor::from_vec(vec![7.0, 9.0, 11.0, 8.0, 10.0, 12.0], true);
    let c = matmul_transposed(&a, &b, 2, 3, 2);

    assert_eq!(c.len(), 4);
    assert_abs_diff_eq!(c.data()[0], 58.0);
    assert_abs_diff_eq!(c.data()[1], 64.0);
    assert_abs_diff_eq!(c.data()[2], 139.0);
    assert_abs_diff_eq!(c.data()[3], 154.0);
}

#[test]
fn test_multiplier_gradient_through_linear_map() {
    // loss = sum(x @ (w * m)^T); dL/dm[j, p] = w[j, p] * x[p]
    let x = Tensor::from_vec(vec![1.0, 2.0], false); // 1x2
    let w = Tensor::from_vec(vec![3.0, -1.0, 0.5, 4.0], false); // 2x2, [out, in]
    let m = Tensor::ones_like(&w, true);

    let effective = mul(&w, &m);
    let y = matmul_transposed(&x, &effective, 1, 2, 2);
    backward(&sum(&y), None);

    let grad = m.grad().expect("gradient should be available");
    assert_abs_diff_eq!(grad[0], 3.0);
    assert_abs_diff_eq!(grad[1], -2.0);
    assert_abs_diff_eq!(grad[2], 0.5);
    assert_abs_diff_eq!(grad[3], 8.0);
}

#[test]
fn test_mse_through_matmul_matches_finite_difference() {
    let x = vec![0.5, -1.0, 2.0, 1.5];
    let w_data = vec![0.2, -0.3, 0.7, 0.1];
    let target = Tensor::from_vec(vec![1.0, 0.0, -1.0, 0.5], false);

    let w = Tensor::from_vec(w_data.clone(), true);
    let pred = matmul_transposed(&Tensor::from_vec(x.clone(), false), &w, 2, 2, 2);
    backward(&mse_loss(&pred, &target), None);
    let analytical = w.grad().expect("gradient should be available");

    let numerical = finite_difference(
        |w_val| {
            let t_w = Tensor::from_vec(w_val.to_vec(), false);
            let t_pred = matmul_transposed(&Tensor::from_vec(x.clone(), false), &t_w, 2, 2, 2);
            let value = mse_loss(&t_pred, &target).data()[0];
            value
        },
        &w_data,
        1e-3,
    );

    for i in 0..w_data.len() {
        assert_abs_diff_eq!(analytical[i], numerical[i], epsilon = 1e-2);
    }
}

#[test]
fn test_intermediate_used_twice_propagates_once() {
    // loss = sum(y + y), y = w * m; dL/dm = 2w
    let w = Tensor::from_vec(vec![2.0, 3.0], false);
    let m = Tensor::ones_like(&w, true);
    let y = mul(&w, &m);
    backward(&sum(&add(&y, &y)), None);

    assert_eq!(m.grad().expect("gradient should be available").to_vec(), vec![4.0, 6.0]);
}

#[test]
fn test_diamond_graph_matches_finite_difference() {
    // loss = sum(relu(y) * y + scale(y, 3)), with y = w * m used three times
    let w_data = vec![1.5, -2.0, 0.5];
    let m = Tensor::from_vec(vec![1.0, 1.0, 1.0], true);
    let w = Tensor::from_vec(w_data.clone(), false);
    let y = mul(&w, &m);
    let loss = sum(&add(&mul(&relu(&y), &y), &scale(&y, 3.0)));
    backward(&loss, None);
    let analytical = m.grad().expect("gradient should be available");

    let numerical = finite_difference(
        |m_val| {
            let y = mul(&Tensor::from_vec(w_data.clone(), false), &Tensor::from_vec(m_val.to_vec(), false));
            let value = sum(&add(&mul(&relu(&y), &y), &scale(&y, 3.0))).data()[0];
            value
        },
        &[1.0, 1.0, 1.0],
        1e-3,
    );

    for i in 0..3 {
        assert_abs_diff_eq!(analytical[i], numerical[i], epsilon = 1e-2);
    }
}

#[test]
fn test_shared_leaf_accumulates_from_every_use() {
    // loss = sum(a * a) => dL/da = 2a
    let a = Tensor::from_vec(vec![1.0, -2.0], true);
    backward(&sum(&mul(&a, &a)), None);
    assert_eq!(a.grad().expect("gradient should be available").to_vec(), vec![2.0, -4.0]);
}
