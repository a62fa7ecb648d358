//! Finite difference weights on arbitrarily spaced nodes.
//!
//! The stencil module only needs "weights for derivative orders 0..=m at a set of
//! nodes around an evaluation point", so the generator sits behind the
//! [`WeightGenerator`] trait. [`Fornberg`] is the default implementation (B. Fornberg,
//! "Generation of finite difference formulas on arbitrarily spaced grids",
//! Math. Comp. 51 (1988)).

/// Source of finite difference weights
pub trait WeightGenerator {
    /// Weights for derivative orders `0..=max_order` evaluated at `z` using `nodes`.
    /// The table is returned order-major: entry `order * nodes.len() + node`.
    fn weights(&self, z: f64, nodes: &[f64], max_order: usize) -> Vec<f64>;
}

/// Fornberg's recursive algorithm
#[derive(Debug, Clone, Copy, Default)]
pub struct Fornberg;

impl WeightGenerator for Fornberg {
    fn weights(&self, z: f64, nodes: &[f64], max_order: usize) -> Vec<f64> {
        let npts = nodes.len();
        let mut c = vec![0.0; (max_order + 1) * npts];
        if npts == 0 {
            return c;
        }
        let idx = |order: usize, node: usize| order * npts + node;
        let mut c1 = 1.0;
        let mut c4 = nodes[0] - z;
        c[idx(0, 0)] = 1.0;
        for i in 1..npts {
            let mn = i.min(max_order);
            let mut c2 = 1.0;
            let c5 = c4;
            c4 = nodes[i] - z;
            for j in 0..i {
                let c3 = nodes[i] - nodes[j];
                c2 *= c3;
                if j == i - 1 {
                    for k in (1..=mn).rev() {
                        c[idx(k, i)] =
                            c1 * (k as f64 * c[idx(k - 1, i - 1)] - c5 * c[idx(k, i - 1)]) / c2;
                    }
                    c[idx(0, i)] = -c1 * c5 * c[idx(0, i - 1)] / c2;
                }
                for k in (1..=mn).rev() {
                    c[idx(k, j)] = (c4 * c[idx(k, j)] - k as f64 * c[idx(k - 1, j)]) / c3;
                }
                c[idx(0, j)] = c4 * c[idx(0, j)] / c3;
            }
            c1 = c2;
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_central_three_point() {
        let w = Fornberg.weights(0.0, &[-1.0, 0.0, 1.0], 2);
        let expected = [0.0, 1.0, 0.0, -0.5, 0.0, 0.5, 1.0, -2.0, 1.0];
        for (a, b) in w.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_one_sided_reproduces_quadratic() {
        // f(x) = 3x^2 - x + 2 on nodes to the right of the evaluation point
        let nodes = [0.5, 1.25, 2.0];
        let f = |x: f64| 3.0 * x * x - x + 2.0;
        let w = Fornberg.weights(0.5, &nodes, 2);
        let d1: f64 = (0..3).map(|i| w[3 + i] * f(nodes[i])).sum();
        let d2: f64 = (0..3).map(|i| w[6 + i] * f(nodes[i])).sum();
        assert_relative_eq!(d1, 6.0 * 0.5 - 1.0, epsilon = 1e-12);
        assert_relative_eq!(d2, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_node() {
        let w = Fornberg.weights(0.0, &[0.0], 2);
        assert_eq!(w, vec![1.0, 0.0, 0.0]);
    }
}
