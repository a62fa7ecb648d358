//! # Stencil Geometry
//!
//! Cell centres padded with mirrored ghost cells and the per-bin finite difference
//! weights of the diffusion and advection operators.
//!
//! Padded index `xci` runs over `0..N + 2*nsidep`; the first and last `nsidep` entries
//! are ghost centres mirrored through the outer bin edges:
//!
//! ```text
//! xc[nsidep - i - 1]     = 2*x[0] - xc[nsidep + i]
//! xc[nsidep + N + i]     = 2*x[N] - xc[nsidep + N - i - 1]
//! ```
//!
//! For a reflective boundary the stencil of a boundary bin is centred and reaches
//! into the ghost region; ghost entries are folded back onto the mirrored real bin.
//! For a non-reflective boundary the stencil is shifted inward instead, so it never
//! touches a ghost cell.
use super::fd_weights::WeightGenerator;
use super::problem::Geometry;
use log::info;

/// Padded cell centres: `nsidep` mirrored ghosts on each side of the `N` real centres
pub fn padded_centers(x: &[f64], nsidep: usize) -> Vec<f64> {
    let nbins = x.len() - 1;
    let mut xc = vec![0.0; nbins + 2 * nsidep];
    for i in 0..nbins {
        xc[nsidep + i] = (x[i] + x[i + 1]) / 2.0;
    }
    for i in 0..nsidep {
        xc[nsidep - i - 1] = 2.0 * x[0] - xc[nsidep + i];
        xc[nsidep + i + nbins] = 2.0 * x[nbins] - xc[nsidep + nbins - i - 1];
    }
    xc
}

#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct StencilGeometry {
    pub nbins: usize,
    pub nstencil: usize,
    pub nsidep: usize,
    pub lrefl: bool,
    pub rrefl: bool,
    pub logx: bool,
    pub geom: Geometry,
    /// padded cell centres
    pub xc: Vec<f64>,
    /// diffusion operator weights, `nstencil` per bin
    pub D_weight: Vec<f64>,
    /// advection operator weights, `nstencil` per bin
    pub A_weight: Vec<f64>,
    /// real bin index of every stencil point, `nstencil` per bin
    window: Vec<usize>,
}

impl StencilGeometry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        x: &[f64],
        nstencil: usize,
        geom: Geometry,
        logx: bool,
        lrefl: bool,
        rrefl: bool,
        generator: &dyn WeightGenerator,
    ) -> Self {
        let nbins = x.len() - 1;
        let nsidep = (nstencil - 1) / 2;
        let mut stencil = Self {
            nbins,
            nstencil,
            nsidep,
            lrefl,
            rrefl,
            logx,
            geom,
            xc: padded_centers(x, nsidep),
            D_weight: vec![0.0; nstencil * nbins],
            A_weight: vec![0.0; nstencil * nbins],
            window: Vec::with_capacity(nstencil * nbins),
        };
        for bi in 0..nbins {
            let lbound = stencil.stencil_lbound(bi);
            for li in 0..nstencil {
                let sbi = stencil.padded_to_bin(lbound + li);
                stencil.window.push(sbi);
            }
            stencil.apply_fd(bi, generator);
        }
        info!(
            "stencil geometry built: {} bins, {} point stencil, {} geometry",
            nbins, nstencil, geom
        );
        stencil
    }

    /// Lowest padded index of the stencil used for bin `bi`
    pub fn stencil_lbound(&self, bi: usize) -> usize {
        let le = if self.lrefl { 0 } else { self.nsidep };
        let re = if self.rrefl { 0 } else { self.nsidep };
        let upper = self.nbins + 2 * self.nsidep - re - self.nstencil;
        le.max(upper.min(bi))
    }

    /// Maps a padded index onto the real bin it represents (ghosts fold onto their mirror)
    pub fn padded_to_bin(&self, xci: usize) -> usize {
        let nsidep = self.nsidep;
        if xci < nsidep {
            nsidep - xci - 1
        } else if xci >= self.nbins + nsidep {
            2 * self.nbins + nsidep - 1 - xci
        } else {
            xci - nsidep
        }
    }

    /// Real bin of the `li`:th stencil point of bin `bi`
    #[inline]
    pub fn window_bin(&self, bi: usize, li: usize) -> usize {
        self.window[self.nstencil * bi + li]
    }

    #[inline]
    pub fn d_weight(&self, bi: usize, li: usize) -> f64 {
        self.D_weight[self.nstencil * bi + li]
    }

    #[inline]
    pub fn a_weight(&self, bi: usize, li: usize) -> f64 {
        self.A_weight[self.nstencil * bi + li]
    }

    /// Real (unpadded) cell centres
    pub fn xcenters(&self) -> &[f64] {
        &self.xc[self.nsidep..self.nsidep + self.nbins]
    }

    fn apply_fd(&mut self, bi: usize, generator: &dyn WeightGenerator) {
        let nstencil = self.nstencil;
        let around = bi + self.nsidep;
        let start = self.stencil_lbound(bi);
        let lxc: Vec<f64> = (0..nstencil)
            .map(|li| self.xc[start + li] - self.xc[around])
            .collect();
        let c = generator.weights(0.0, &lxc, 2);
        let fdweight = |order: usize, li: usize| c[nstencil * order + li];
        let xc_around = self.xc[around];

        for li in 0..nstencil {
            let mut d = fdweight(2, li);
            let mut a = fdweight(1, li);
            if self.logx {
                match self.geom {
                    Geometry::Flat => d -= fdweight(1, li),
                    Geometry::Cylindrical => a += fdweight(0, li),
                    Geometry::Spherical => {
                        d += fdweight(1, li);
                        a += 2.0 * fdweight(0, li);
                    }
                }
                d *= (-2.0 * xc_around).exp();
                a *= (-xc_around).exp();
            } else {
                match self.geom {
                    Geometry::Flat => {}
                    Geometry::Cylindrical => {
                        d += fdweight(1, li) / xc_around;
                        a += fdweight(0, li) / xc_around;
                    }
                    Geometry::Spherical => {
                        d += fdweight(1, li) * 2.0 / xc_around;
                        a += fdweight(0, li) * 2.0 / xc_around;
                    }
                }
            }
            self.D_weight[nstencil * bi + li] = d;
            self.A_weight[nstencil * bi + li] = a;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReactionDiffusion::fd_weights::Fornberg;
    use approx::assert_relative_eq;

    fn uneven_edges(nbins: usize) -> Vec<f64> {
        (0..=nbins)
            .map(|i| {
                let s = i as f64 / nbins as f64;
                0.3 + s + 0.2 * s * s
            })
            .collect()
    }

    #[test]
    fn test_ghost_mirroring_is_exact() {
        let x = uneven_edges(7);
        for nstencil in [3, 5, 7] {
            let nsidep = (nstencil - 1) / 2;
            let xc = padded_centers(&x, nsidep);
            let nbins = x.len() - 1;
            for i in 0..nsidep {
                assert_eq!(xc[nsidep - i - 1], 2.0 * x[0] - xc[nsidep + i]);
                assert_eq!(
                    xc[nsidep + nbins + i],
                    2.0 * x[nbins] - xc[nsidep + nbins - i - 1]
                );
            }
        }
    }

    #[test]
    fn test_padded_index_mapping() {
        let x = uneven_edges(6);
        let s = StencilGeometry::new(&x, 5, Geometry::Flat, false, true, true, &Fornberg);
        let mapped: Vec<usize> = (0..6 + 4).map(|xci| s.padded_to_bin(xci)).collect();
        assert_eq!(mapped, vec![1, 0, 0, 1, 2, 3, 4, 5, 5, 4]);
        // every mirrored ghost centre refers to the centre of the bin it maps onto
        for xci in [0, 1, 8, 9] {
            let bi = s.padded_to_bin(xci);
            let edge = if xci < 2 { x[0] } else { x[6] };
            assert_relative_eq!(s.xc[xci], 2.0 * edge - s.xc[bi + 2], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_non_reflective_stencils_are_shifted() {
        let x = uneven_edges(6);
        let s = StencilGeometry::new(&x, 3, Geometry::Flat, false, false, false, &Fornberg);
        assert_eq!(s.stencil_lbound(0), 1);
        assert_eq!(s.stencil_lbound(5), 4);
        let first: Vec<usize> = (0..3).map(|li| s.window_bin(0, li)).collect();
        let last: Vec<usize> = (0..3).map(|li| s.window_bin(5, li)).collect();
        assert_eq!(first, vec![0, 1, 2]);
        assert_eq!(last, vec![3, 4, 5]);

        let r = StencilGeometry::new(&x, 3, Geometry::Flat, false, true, true, &Fornberg);
        let first: Vec<usize> = (0..3).map(|li| r.window_bin(0, li)).collect();
        let last: Vec<usize> = (0..3).map(|li| r.window_bin(5, li)).collect();
        assert_eq!(first, vec![0, 0, 1]);
        assert_eq!(last, vec![4, 5, 5]);
    }

    #[test]
    fn test_weight_tables_sized_and_consistent() {
        let x = uneven_edges(9);
        for geom in [Geometry::Flat, Geometry::Cylindrical, Geometry::Spherical] {
            let s = StencilGeometry::new(&x, 5, geom, false, false, true, &Fornberg);
            assert_eq!(s.D_weight.len(), 5 * 9);
            assert_eq!(s.A_weight.len(), 5 * 9);
            // derivatives of a constant vanish in every geometry
            for bi in 0..9 {
                let dsum: f64 = (0..5).map(|li| s.d_weight(bi, li)).sum();
                assert_relative_eq!(dsum, 0.0, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_spherical_laplacian_of_r_squared() {
        // Laplacian of r^2 in spherical coordinates is 6 everywhere
        let x = uneven_edges(8);
        let s = StencilGeometry::new(&x, 3, Geometry::Spherical, false, false, false, &Fornberg);
        let centres = s.xcenters().to_vec();
        for bi in 0..8 {
            let lap: f64 = (0..3)
                .map(|li| {
                    let r = centres[s.window_bin(bi, li)];
                    s.d_weight(bi, li) * r * r
                })
                .sum();
            assert_relative_eq!(lap, 6.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_log_space_flat_derivative() {
        // with logx the weights act on physical coordinates r = exp(x): d2/dr2 of r^2 is 2
        let x: Vec<f64> = (0..=10).map(|i| 0.5f64.ln() + 0.05 * i as f64).collect();
        let s = StencilGeometry::new(&x, 3, Geometry::Flat, true, false, false, &Fornberg);
        let centres = s.xcenters().to_vec();
        for bi in 1..9 {
            let d2: f64 = (0..3)
                .map(|li| {
                    let r = centres[s.window_bin(bi, li)].exp();
                    s.d_weight(bi, li) * r * r
                })
                .sum();
            assert_relative_eq!(d2, 2.0, epsilon = 2e-2);
        }
    }
}
