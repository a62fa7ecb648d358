//! Block tridiagonal matrix in the compressed layout: `N` dense `n x n` diagonal
//! blocks coupled to their neighbours through diagonal sub- and super-diagonal blocks.
//!
//! [`BlockDiagMatrix::factorize`] runs the block Thomas algorithm:
//!
//! ```text
//! S_0     = D_0
//! C_i     = S_i^-1 U_i
//! S_{i+1} = D_{i+1} - L_{i+1} C_i
//! ```
//!
//! with an nalgebra LU per `S_i`; the solve is the usual forward sweep followed by
//! back substitution.
use super::jacobian_layout::{CompressedBlockDiag, JacobianIndexing, JacobianLayout};
use super::problem::RDError;
use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};

#[derive(Debug, Clone, PartialEq)]
pub struct BlockDiagMatrix {
    pub nblocks: usize,
    pub n: usize,
    /// entries in the compressed block diagonal layout
    pub data: Vec<f64>,
    storage: CompressedBlockDiag,
}

impl BlockDiagMatrix {
    pub fn new(nblocks: usize, n: usize) -> Self {
        let storage = CompressedBlockDiag { nblocks, n };
        Self {
            nblocks,
            n,
            data: vec![0.0; storage.storage_len()],
            storage,
        }
    }

    pub fn layout(&self) -> JacobianLayout {
        JacobianLayout::CompressedBlockDiag(self.storage)
    }

    #[inline]
    pub fn block(&self, bi: usize, ri: usize, ci: usize) -> f64 {
        self.data[self.storage.index(bi, bi, ri, ci)]
    }

    /// Coupling of row block `bi` to block `bi - 1`, entry `ri`
    #[inline]
    pub fn sub(&self, bi: usize, ri: usize) -> f64 {
        self.data[self.storage.index(bi, bi - 1, ri, ri)]
    }

    /// Coupling of row block `bi` to block `bi + 1`, entry `ri`
    #[inline]
    pub fn sup(&self, bi: usize, ri: usize) -> f64 {
        self.data[self.storage.index(bi, bi + 1, ri, ri)]
    }

    fn diag_block(&self, bi: usize) -> DMatrix<f64> {
        let n = self.n;
        DMatrix::from_column_slice(n, n, &self.data[bi * n * n..(bi + 1) * n * n])
    }

    /// `out = A v`
    pub fn dot_vec(&self, v: &[f64], out: &mut [f64]) {
        let n = self.n;
        for bi in 0..self.nblocks {
            for ri in 0..n {
                let mut acc: f64 = (0..n).map(|ci| self.block(bi, ri, ci) * v[bi * n + ci]).sum();
                if bi > 0 {
                    acc += self.sub(bi, ri) * v[(bi - 1) * n + ri];
                }
                if bi + 1 < self.nblocks {
                    acc += self.sup(bi, ri) * v[(bi + 1) * n + ri];
                }
                out[bi * n + ri] = acc;
            }
        }
    }

    /// Overwrites `self` with `I - gamma * other`
    pub fn set_to_identity_minus_gamma_times(&mut self, gamma: f64, other: &BlockDiagMatrix) {
        for (dst, src) in self.data.iter_mut().zip(other.data.iter()) {
            *dst = -gamma * src;
        }
        for bi in 0..self.nblocks {
            for si in 0..self.n {
                let idx = self.storage.index(bi, bi, si, si);
                self.data[idx] += 1.0;
            }
        }
    }

    pub fn factorize(&self) -> Result<BlockDiagLu, RDError> {
        let n = self.n;
        let mut lus: Vec<LU<f64, Dyn, Dyn>> = Vec::with_capacity(self.nblocks);
        let mut coupling: Vec<DMatrix<f64>> = Vec::with_capacity(self.nblocks.saturating_sub(1));
        let mut schur = self.diag_block(0);
        for bi in 0..self.nblocks {
            let lu = std::mem::replace(&mut schur, DMatrix::zeros(0, 0)).lu();
            if !lu.is_invertible() {
                return Err(RDError::SingularMatrix { block: bi });
            }
            if bi + 1 < self.nblocks {
                let upper = DMatrix::from_diagonal(&DVector::from_fn(n, |ri, _| self.sup(bi, ri)));
                let c = lu.solve(&upper).ok_or(RDError::SingularMatrix { block: bi })?;
                let mut next = self.diag_block(bi + 1);
                for ri in 0..n {
                    let l = self.sub(bi + 1, ri);
                    for ci in 0..n {
                        next[(ri, ci)] -= l * c[(ri, ci)];
                    }
                }
                coupling.push(c);
                schur = next;
            }
            lus.push(lu);
        }
        let sub = (1..self.nblocks)
            .map(|bi| (0..n).map(|ri| self.sub(bi, ri)).collect())
            .collect();
        Ok(BlockDiagLu {
            n,
            lus,
            coupling,
            sub,
        })
    }
}

/// Block LU factors of a [`BlockDiagMatrix`]
#[derive(Debug, Clone)]
pub struct BlockDiagLu {
    n: usize,
    lus: Vec<LU<f64, Dyn, Dyn>>,
    /// `C_i = S_i^-1 U_i`
    coupling: Vec<DMatrix<f64>>,
    /// `L_{i+1}` diagonals
    sub: Vec<Vec<f64>>,
}

impl BlockDiagLu {
    /// Solves `A z = r`
    pub fn solve(&self, r: &[f64], z: &mut [f64]) -> Result<(), RDError> {
        let n = self.n;
        let nblocks = self.lus.len();
        let mut g: Vec<DVector<f64>> = Vec::with_capacity(nblocks);
        for bi in 0..nblocks {
            let mut rhs = DVector::from_column_slice(&r[bi * n..(bi + 1) * n]);
            if bi > 0 {
                for ri in 0..n {
                    rhs[ri] -= self.sub[bi - 1][ri] * g[bi - 1][ri];
                }
            }
            let gi = self.lus[bi]
                .solve(&rhs)
                .ok_or(RDError::SingularMatrix { block: bi })?;
            g.push(gi);
        }
        for bi in (0..nblocks).rev() {
            if bi + 1 < nblocks {
                let next = DVector::from_column_slice(&z[(bi + 1) * n..(bi + 2) * n]);
                let correction = &self.coupling[bi] * next;
                g[bi] -= correction;
            }
            z[bi * n..(bi + 1) * n].copy_from_slice(g[bi].as_slice());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReactionDiffusion::jacobian_layout::expand_to_dense;
    use approx::assert_relative_eq;

    fn sample(nblocks: usize, n: usize) -> BlockDiagMatrix {
        let mut m = BlockDiagMatrix::new(nblocks, n);
        let layout = m.layout();
        for bi in 0..nblocks {
            for ri in 0..n {
                for ci in 0..n {
                    let v = if ri == ci { 4.0 + bi as f64 } else { 0.3 * (ri as f64 - ci as f64) + 0.1 };
                    m.data[layout.index(bi, bi, ri, ci)] = v;
                }
                if bi > 0 {
                    m.data[layout.index(bi, bi - 1, ri, ri)] = -1.0 - 0.1 * ri as f64;
                }
                if bi + 1 < nblocks {
                    m.data[layout.index(bi, bi + 1, ri, ri)] = -0.5 + 0.2 * bi as f64;
                }
            }
        }
        m
    }

    #[test]
    fn test_dot_vec_matches_dense() {
        let m = sample(4, 3);
        let dense = expand_to_dense(&m.layout(), &m.data, 4, 3);
        let v: Vec<f64> = (0..12).map(|i| (i as f64).sin()).collect();
        let mut out = vec![0.0; 12];
        m.dot_vec(&v, &mut out);
        let expected = &dense * DVector::from_vec(v);
        for i in 0..12 {
            assert_relative_eq!(out[i], expected[i], epsilon = 1e-13);
        }
    }

    #[test]
    fn test_identity_minus_gamma() {
        let m = sample(3, 2);
        let mut p = BlockDiagMatrix::new(3, 2);
        p.set_to_identity_minus_gamma_times(0.5, &m);
        assert_relative_eq!(p.block(1, 0, 0), 1.0 - 0.5 * m.block(1, 0, 0));
        assert_relative_eq!(p.block(1, 0, 1), -0.5 * m.block(1, 0, 1));
        assert_relative_eq!(p.sub(2, 1), -0.5 * m.sub(2, 1));
        assert_relative_eq!(p.sup(0, 0), -0.5 * m.sup(0, 0));
    }

    #[test]
    fn test_block_thomas_solve() {
        for (nblocks, n) in [(1, 3), (5, 1), (6, 3)] {
            let m = sample(nblocks, n);
            let lu = m.factorize().unwrap();
            let x: Vec<f64> = (0..nblocks * n).map(|i| 1.0 + 0.25 * i as f64).collect();
            let mut r = vec![0.0; nblocks * n];
            m.dot_vec(&x, &mut r);
            let mut z = vec![0.0; nblocks * n];
            lu.solve(&r, &mut z).unwrap();
            for i in 0..nblocks * n {
                assert_relative_eq!(z[i], x[i], max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn test_shifted_factorization_matches_dense_solve() {
        let m = sample(4, 2);
        let mut p = BlockDiagMatrix::new(4, 2);
        p.set_to_identity_minus_gamma_times(0.3, &m);
        let dense = expand_to_dense(&p.layout(), &p.data, 4, 2);
        let lu = p.factorize().unwrap();
        for shift in [0.0, 1.5] {
            let r: Vec<f64> = (0..8).map(|i| shift + (i as f64).cos()).collect();
            let expected = dense.clone().lu().solve(&DVector::from_column_slice(&r)).unwrap();
            let mut z = vec![0.0; 8];
            lu.solve(&r, &mut z).unwrap();
            for i in 0..8 {
                assert_relative_eq!(z[i], expected[i], max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn test_singular_block_is_reported() {
        let mut m = BlockDiagMatrix::new(3, 2);
        let layout = m.layout();
        for bi in 0..2 {
            for si in 0..2 {
                m.data[layout.index(bi, bi, si, si)] = 1.0;
            }
        }
        assert!(matches!(m.factorize(), Err(RDError::SingularMatrix { block: 2 })));
    }
}
