//! # Reaction Network
//!
//! Compiles the stoichiometry multisets into dense `[nr][n]` coefficient tables:
//! - `coeff_reac`: how many times species `si` is a reactant of reaction `rxn`
//! - `coeff_actv`: multiplicity of `si` in the rate law (defaults to `coeff_reac`, mass action)
//! - `coeff_prod`: how many times `si` is produced
//! - `coeff_totl`: net change, `coeff_prod - coeff_reac`
//!
//! It also owns the per-bin rate modulation: the span list `[s0, s1, ...]` says that the
//! first `s0` reactions are scaled by column 0 of the bin's factor row, the next `s1` by
//! column 1 and so on; reactions past the spanned range keep a factor of 1.
use super::problem::{ProblemDefinition, RDError};
use log::info;
use nalgebra::{DMatrix, DVector};
use prettytable::{Cell, Row, Table};

#[derive(Debug, Clone)]
pub struct ReactionNetwork {
    pub n: usize,
    pub nr: usize,
    pub stoich_reac: Vec<Vec<usize>>,
    pub stoich_prod: Vec<Vec<usize>>,
    /// active species of each reaction, mass action already filled in
    pub stoich_actv: Vec<Vec<usize>>,
    pub k: Vec<f64>,
    pub coeff_reac: Vec<i32>,
    pub coeff_prod: Vec<i32>,
    pub coeff_totl: Vec<i32>,
    pub coeff_actv: Vec<i32>,
    /// modulation factors, one row per bin
    pub bin_k_factor: Vec<Vec<f64>>,
    /// reaction index -> modulation column, for the first `i_bin_k.len()` reactions
    pub i_bin_k: Vec<usize>,
}

impl ReactionNetwork {
    pub fn new(
        n: usize,
        stoich_reac: Vec<Vec<usize>>,
        stoich_prod: Vec<Vec<usize>>,
        stoich_actv: Vec<Vec<usize>>,
        k: Vec<f64>,
        bin_k_factor: Vec<Vec<f64>>,
        bin_k_factor_span: &[usize],
    ) -> Result<Self, RDError> {
        let nr = stoich_reac.len();
        if stoich_prod.len() != nr {
            return Err(RDError::LengthMismatch {
                what: "stoich_prod".to_string(),
                expected: nr,
                got: stoich_prod.len(),
            });
        }
        if k.len() != nr {
            return Err(RDError::LengthMismatch {
                what: "k".to_string(),
                expected: nr,
                got: k.len(),
            });
        }
        if !stoich_actv.is_empty() && stoich_actv.len() != nr {
            return Err(RDError::LengthMismatch {
                what: "stoich_actv".to_string(),
                expected: nr,
                got: stoich_actv.len(),
            });
        }
        for (what, stoich) in [
            ("stoich_reac", &stoich_reac),
            ("stoich_prod", &stoich_prod),
            ("stoich_actv", &stoich_actv),
        ] {
            for (reaction, species) in stoich.iter().enumerate() {
                if let Some(&index) = species.iter().find(|&&si| si >= n) {
                    return Err(RDError::SpeciesIndexOutOfRange {
                        what: what.to_string(),
                        reaction,
                        index,
                        n,
                    });
                }
            }
        }

        let stoich_actv: Vec<Vec<usize>> = (0..nr)
            .map(|rxn| match stoich_actv.get(rxn) {
                Some(actv) if !actv.is_empty() => actv.clone(),
                _ => stoich_reac[rxn].clone(),
            })
            .collect();

        let count = |species: &[usize], si: usize| species.iter().filter(|&&s| s == si).count() as i32;
        let mut coeff_reac = vec![0; nr * n];
        let mut coeff_prod = vec![0; nr * n];
        let mut coeff_totl = vec![0; nr * n];
        let mut coeff_actv = vec![0; nr * n];
        for rxn in 0..nr {
            for si in 0..n {
                let i = rxn * n + si;
                coeff_reac[i] = count(&stoich_reac[rxn], si);
                coeff_actv[i] = count(&stoich_actv[rxn], si);
                coeff_prod[i] = count(&stoich_prod[rxn], si);
                coeff_totl[i] = coeff_prod[i] - coeff_reac[i];
            }
        }

        let i_bin_k: Vec<usize> = bin_k_factor_span
            .iter()
            .enumerate()
            .flat_map(|(col, &span)| std::iter::repeat(col).take(span))
            .collect();
        info!(
            "reaction network compiled: {} species, {} reactions, {} modulated",
            n,
            nr,
            i_bin_k.len()
        );

        Ok(Self {
            n,
            nr,
            stoich_reac,
            stoich_prod,
            stoich_actv,
            k,
            coeff_reac,
            coeff_prod,
            coeff_totl,
            coeff_actv,
            bin_k_factor,
            i_bin_k,
        })
    }

    pub fn from_problem(problem: &ProblemDefinition) -> Result<Self, RDError> {
        Self::new(
            problem.n,
            problem.stoich_reac.clone(),
            problem.stoich_prod.clone(),
            problem.stoich_actv.clone(),
            problem.k.clone(),
            problem.bin_k_factor.clone(),
            &problem.bin_k_factor_span,
        )
    }

    #[inline]
    pub fn net(&self, rxn: usize, si: usize) -> i32 {
        self.coeff_totl[rxn * self.n + si]
    }

    #[inline]
    pub fn actv(&self, rxn: usize, si: usize) -> i32 {
        self.coeff_actv[rxn * self.n + si]
    }

    /// number of reactions subject to per-bin modulation
    pub fn n_factor_affected_k(&self) -> usize {
        self.i_bin_k.len()
    }

    /// modulation factor of reaction `rxn` in bin `bi`
    #[inline]
    pub fn factor(&self, rxn: usize, bi: usize) -> f64 {
        if rxn < self.i_bin_k.len() {
            self.bin_k_factor[bi][self.i_bin_k[rxn]]
        } else {
            1.0
        }
    }

    /// Net stoichiometry as an `n x nr` matrix
    pub fn coefficient_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n, self.nr, |si, rxn| self.net(rxn, si) as f64)
    }

    /// Decomposes per-species yields `y` into effective rate coefficients `k` with
    /// `A k = y`, `A` being the net stoichiometry. Least squares via SVD; fails when
    /// the yields are not a combination of the reactions within `atol`.
    pub fn decompose_yields_into_rate_coeffs(
        &self,
        yields: &DVector<f64>,
        atol: f64,
    ) -> Result<DVector<f64>, RDError> {
        if yields.len() != self.n {
            return Err(RDError::LengthMismatch {
                what: "yields".to_string(),
                expected: self.n,
                got: yields.len(),
            });
        }
        let a = self.coefficient_matrix();
        let svd = a.clone().svd(true, true);
        let k = svd
            .solve(yields, 1e-12)
            .map_err(|e| RDError::InvalidConfiguration(e.to_string()))?;
        let residual = (&a * &k - yields).norm();
        if residual > atol {
            return Err(RDError::InvalidConfiguration(format!(
                "yields are not a combination of the reactions (residual {:e})",
                residual
            )));
        }
        Ok(k)
    }

    /// Table with one row per reaction: equation in species indices, rate constant,
    /// and the net change of every species
    pub fn summary_table(&self, substances: Option<&[String]>) -> Table {
        let name = |si: usize| match substances {
            Some(names) if si < names.len() => names[si].clone(),
            _ => format!("S{}", si),
        };
        let side = |species: &[usize]| {
            species
                .iter()
                .map(|&si| name(si))
                .collect::<Vec<_>>()
                .join(" + ")
        };
        let mut table = Table::new();
        let mut header = vec![Cell::new("reaction"), Cell::new("k")];
        header.extend((0..self.n).map(|si| Cell::new(&name(si))));
        table.add_row(Row::new(header));
        for rxn in 0..self.nr {
            let eq = format!(
                "{} -> {}",
                side(&self.stoich_reac[rxn]),
                side(&self.stoich_prod[rxn])
            );
            let mut row = vec![Cell::new(&eq), Cell::new(&format!("{:e}", self.k[rxn]))];
            row.extend((0..self.n).map(|si| Cell::new(&self.net(rxn, si).to_string())));
            table.add_row(Row::new(row));
        }
        table
    }

    pub fn pretty_print(&self, substances: Option<&[String]>) {
        self.summary_table(substances).printstd();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dimerisation() -> ReactionNetwork {
        // 2A -> B, B + C -> A (with the rate depending on C only)
        ReactionNetwork::new(
            3,
            vec![vec![0, 0], vec![1, 2]],
            vec![vec![1], vec![0]],
            vec![vec![], vec![2]],
            vec![2.0, 3.0],
            vec![],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_coefficient_tables() {
        let net = dimerisation();
        assert_eq!(net.coeff_reac, vec![2, 0, 0, 0, 1, 1]);
        assert_eq!(net.coeff_prod, vec![0, 1, 0, 1, 0, 0]);
        assert_eq!(net.coeff_totl, vec![-2, 1, 0, 1, -1, -1]);
        // mass action for the first reaction, explicit active species for the second
        assert_eq!(net.coeff_actv, vec![2, 0, 0, 0, 0, 1]);
        assert_eq!(net.stoich_actv[0], vec![0, 0]);
    }

    #[test]
    fn test_rejects_inconsistent_input() {
        let bad_index = ReactionNetwork::new(2, vec![vec![2]], vec![vec![0]], vec![], vec![1.0], vec![], &[]);
        assert!(matches!(
            bad_index,
            Err(RDError::SpeciesIndexOutOfRange { index: 2, .. })
        ));
        let bad_len = ReactionNetwork::new(2, vec![vec![0]], vec![], vec![], vec![1.0], vec![], &[]);
        assert!(matches!(bad_len, Err(RDError::LengthMismatch { .. })));
        let bad_k = ReactionNetwork::new(2, vec![vec![0]], vec![vec![1]], vec![], vec![], vec![], &[]);
        assert!(matches!(bad_k, Err(RDError::LengthMismatch { .. })));
    }

    #[test]
    fn test_modulation_lookup() {
        let net = ReactionNetwork::new(
            1,
            vec![vec![0]; 4],
            vec![vec![]; 4],
            vec![],
            vec![1.0; 4],
            vec![vec![2.0, 5.0], vec![3.0, 7.0]],
            &[1, 2],
        )
        .unwrap();
        assert_eq!(net.i_bin_k, vec![0, 1, 1]);
        assert_eq!(net.n_factor_affected_k(), 3);
        assert_eq!(net.factor(0, 1), 3.0);
        assert_eq!(net.factor(2, 0), 5.0);
        assert_eq!(net.factor(3, 1), 1.0);
    }

    #[test]
    fn test_coefficient_matrix_and_yields() {
        let net = ReactionNetwork::new(
            3,
            vec![vec![], vec![]],
            vec![vec![0, 1], vec![2]],
            vec![],
            vec![1.0, 1.0],
            vec![],
            &[],
        )
        .unwrap();
        let a = net.coefficient_matrix();
        assert_eq!(a.shape(), (3, 2));
        assert_eq!(a[(1, 0)], 1.0);
        let yields = DVector::from_vec(vec![0.3, 0.3, 0.7]);
        let k = net.decompose_yields_into_rate_coeffs(&yields, 1e-10).unwrap();
        assert_relative_eq!(k[0], 0.3, epsilon = 1e-12);
        assert_relative_eq!(k[1], 0.7, epsilon = 1e-12);
        let inconsistent = DVector::from_vec(vec![0.3, 0.1, 0.7]);
        assert!(net
            .decompose_yields_into_rate_coeffs(&inconsistent, 1e-10)
            .is_err());
    }

    #[test]
    fn test_summary_table() {
        let net = dimerisation();
        let names = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let table = net.summary_table(Some(&names));
        assert_eq!(table.len(), 3);
        let rendered = table.to_string();
        assert!(rendered.contains("A + A -> B"));
    }
}
