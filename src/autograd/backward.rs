//! Backward operation trait and graph traversal

use super::Tensor;
use std::collections::HashSet;

/// Gradient propagation step recorded by an operation
///
/// Implementations read the gradient accumulated on their output and push
/// the local contribution into each input that requires grad. They do not
/// recurse: [`backward`](super::backward) runs every op once, after all of
/// the op's consumers have run.
pub trait BackwardOp {
    /// Tensors this op propagates into
    fn inputs(&self) -> Vec<&Tensor>;

    /// Propagate the output gradient to the inputs
    fn backward(&self);
}

/// Every tensor reachable from `root`, each listed after all of its inputs
///
/// Handles onto the same tensor count once.
pub(crate) fn topological_order(root: &Tensor) -> Vec<Tensor> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(root.clone(), false)];

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node);
            continue;
        }
        if !visited.insert(node.node_id()) {
            continue;
        }
        let op = node.backward_op();
        stack.push((node, true));
        if let Some(op) = op {
            for input in op.inputs() {
                if !visited.contains(&input.node_id()) {
                    stack.push((input.clone(), false));
                }
            }
        }
    }
    order
}
