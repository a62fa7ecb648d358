//! # Preconditioner cache
//!
//! Single-owner cache for Newton-Krylov iterations: the compressed Jacobian built by
//! `prec_setup` (or lazily by `jac_times_vec`), and the factorized `I - gamma*J`
//! built from it. Every stored Jacobian gets a new generation number; the
//! factorization remembers the generation and `gamma` it was built for.
use super::block_diag::{BlockDiagLu, BlockDiagMatrix};
use super::problem::RDError;
use log::debug;

/// Whether `prec_setup` has to reassemble the Jacobian
pub fn jacobian_needs_rebuild(built: bool, reuse_ok: bool) -> bool {
    !built || !reuse_ok
}

/// Whether `I - gamma*J` has to be rebuilt; `cached` is the `(gamma, generation)` of
/// the existing factorization
pub fn preconditioner_needs_rebuild(cached: Option<(f64, u64)>, gamma: f64, generation: u64) -> bool {
    match cached {
        None => true,
        Some((cached_gamma, cached_generation)) => {
            cached_gamma != gamma || cached_generation != generation
        }
    }
}

#[derive(Debug, Clone)]
struct Factorization {
    gamma: f64,
    generation: u64,
    matrix: BlockDiagMatrix,
    lu: BlockDiagLu,
}

#[derive(Debug, Clone, Default)]
pub struct PreconditionerCache {
    jac: Option<BlockDiagMatrix>,
    generation: u64,
    set_up: bool,
    prec: Option<Factorization>,
}

impl PreconditionerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jacobian(&self) -> Option<&BlockDiagMatrix> {
        self.jac.as_ref()
    }

    /// Stores a freshly assembled Jacobian and bumps the generation
    pub fn store_jacobian(&mut self, jac: BlockDiagMatrix) {
        self.jac = Some(jac);
        self.generation += 1;
        debug!("jacobian cache rebuilt, generation {}", self.generation);
    }

    pub fn mark_set_up(&mut self) {
        self.set_up = true;
    }

    /// `I - gamma*J` of the current factorization, if any
    pub fn preconditioner_matrix(&self) -> Option<&BlockDiagMatrix> {
        self.prec.as_ref().map(|p| &p.matrix)
    }

    /// Solves `(I - gamma*J) z = r`; returns whether `I - gamma*J` was rebuilt
    pub fn solve(&mut self, gamma: f64, r: &[f64], z: &mut [f64]) -> Result<bool, RDError> {
        let jac = match (&self.jac, self.set_up) {
            (Some(jac), true) => jac,
            _ => return Err(RDError::PreconditionerNotSetUp),
        };
        let cached = self.prec.as_ref().map(|p| (p.gamma, p.generation));
        let rebuild = preconditioner_needs_rebuild(cached, gamma, self.generation);
        if rebuild {
            let mut matrix = match self.prec.take() {
                Some(p) => p.matrix,
                None => BlockDiagMatrix::new(jac.nblocks, jac.n),
            };
            matrix.set_to_identity_minus_gamma_times(gamma, jac);
            let lu = matrix.factorize()?;
            debug!(
                "preconditioner rebuilt for gamma = {:e}, jacobian generation {}",
                gamma, self.generation
            );
            self.prec = Some(Factorization {
                gamma,
                generation: self.generation,
                matrix,
                lu,
            });
        }
        match &self.prec {
            Some(p) => p.lu.solve(r, z)?,
            None => return Err(RDError::PreconditionerNotSetUp),
        }
        Ok(rebuild)
    }

    /// Drops the cached Jacobian and factorization
    pub fn invalidate(&mut self) {
        self.jac = None;
        self.set_up = false;
        self.prec = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReactionDiffusion::jacobian_layout::JacobianIndexing;
    use approx::assert_relative_eq;

    fn diagonal_jacobian(values: &[f64]) -> BlockDiagMatrix {
        let mut m = BlockDiagMatrix::new(values.len(), 1);
        let layout = m.layout();
        for (bi, v) in values.iter().enumerate() {
            m.data[layout.index(bi, bi, 0, 0)] = *v;
        }
        m
    }

    #[test]
    fn test_rebuild_decisions() {
        assert!(jacobian_needs_rebuild(false, true));
        assert!(jacobian_needs_rebuild(true, false));
        assert!(!jacobian_needs_rebuild(true, true));
        assert!(preconditioner_needs_rebuild(None, 0.1, 1));
        assert!(preconditioner_needs_rebuild(Some((0.1, 1)), 0.2, 1));
        assert!(preconditioner_needs_rebuild(Some((0.1, 1)), 0.1, 2));
        assert!(!preconditioner_needs_rebuild(Some((0.1, 1)), 0.1, 1));
    }

    #[test]
    fn test_solve_requires_setup() {
        let mut cache = PreconditionerCache::new();
        let mut z = vec![0.0; 2];
        assert!(matches!(
            cache.solve(0.1, &[1.0, 1.0], &mut z),
            Err(RDError::PreconditionerNotSetUp)
        ));
        // a lazily built jacobian alone is not a set up preconditioner
        cache.store_jacobian(diagonal_jacobian(&[1.0, 2.0]));
        assert!(cache.solve(0.1, &[1.0, 1.0], &mut z).is_err());
    }

    #[test]
    fn test_reuse_until_gamma_or_jacobian_changes() {
        let mut cache = PreconditionerCache::new();
        cache.store_jacobian(diagonal_jacobian(&[-1.0, -3.0, 1.0]));
        cache.mark_set_up();
        let r = [1.0, 1.0, 1.0];
        let mut z = vec![0.0; 3];
        assert!(cache.solve(0.5, &r, &mut z).unwrap());
        assert_relative_eq!(z[0], 1.0 / 1.5);
        assert_relative_eq!(z[1], 1.0 / 2.5);
        assert_relative_eq!(z[2], 2.0);
        assert!(!cache.solve(0.5, &r, &mut z).unwrap());
        assert!(cache.solve(0.25, &r, &mut z).unwrap());
        assert_relative_eq!(z[2], 1.0 / 0.75);
        cache.store_jacobian(diagonal_jacobian(&[-1.0, -3.0, 1.0]));
        assert!(cache.solve(0.25, &r, &mut z).unwrap());
        assert_eq!(cache.preconditioner_matrix().unwrap().block(0, 0, 0), 1.25);

        cache.invalidate();
        assert!(cache.jacobian().is_none());
        assert!(matches!(
            cache.solve(0.25, &r, &mut z),
            Err(RDError::PreconditionerNotSetUp)
        ));
    }
}
