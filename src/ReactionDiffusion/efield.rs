//! # Electric Field Solver
//!
//! Self-consistent field from the integrated 1D form of Gauss's law. The running
//! enclosed charge `Q` starts at the left surface charge and grows bin by bin:
//!
//! | geometry    | field in bin               | charge increment                 |
//! |-------------|----------------------------|----------------------------------|
//! | flat        | `F*Q/eps`                  | `rho*(x[i+1] - x[i])`            |
//! | cylindrical | `F*Q/(2*pi*eps*r)`         | `rho*pi*(x[i+1]^2 - x[i]^2)`     |
//! | spherical   | `F*Q/(4*pi*eps*r^2)`       | `rho*4*pi/3*(x[i+1]^3 - x[i]^3)` |
//!
//! In flat geometry a second sweep from the right surface charge subtracts its own
//! contribution, so both boundaries carry an independent charge. The sweeps are
//! prefix sums and run sequentially.
use super::problem::Geometry;
use std::f64::consts::PI;

#[derive(Debug, Clone)]
pub struct ElectricFieldSolver {
    pub geom: Geometry,
    pub logx: bool,
    /// bin edges (log-coordinates when `logx`)
    pub x: Vec<f64>,
    /// unpadded cell centres (log-coordinates when `logx`)
    pub xcenters: Vec<f64>,
    pub z_chg: Vec<i32>,
    pub surf_chg: (f64, f64),
    /// absolute permittivity, `eps_rel * vacuum_permittivity`
    pub eps: f64,
    pub faraday_const: f64,
    /// field per bin
    pub efield: Vec<f64>,
    /// net charge density per bin
    pub netchg: Vec<f64>,
}

impl ElectricFieldSolver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        geom: Geometry,
        logx: bool,
        x: Vec<f64>,
        xcenters: Vec<f64>,
        z_chg: Vec<i32>,
        surf_chg: (f64, f64),
        eps: f64,
        faraday_const: f64,
    ) -> Self {
        let nbins = xcenters.len();
        Self {
            geom,
            logx,
            x,
            xcenters,
            z_chg,
            surf_chg,
            eps,
            faraday_const,
            efield: vec![0.0; nbins],
            netchg: vec![0.0; nbins],
        }
    }

    #[inline]
    fn coord(&self, v: f64) -> f64 {
        if self.logx { v.exp() } else { v }
    }

    /// Recomputes `netchg` and `efield` from linear concentrations `linc` (bin-major)
    pub fn calc(&mut self, linc: &[f64]) {
        let n = self.z_chg.len();
        let nbins = self.efield.len();
        let f = self.faraday_const;
        let eps = self.eps;
        for bi in 0..nbins {
            self.netchg[bi] = (0..n)
                .map(|si| self.z_chg[si] as f64 * linc[bi * n + si])
                .sum();
        }

        let mut q = self.surf_chg.0;
        let mut cx = self.coord(self.x[0]);
        for bi in 0..nbins {
            let r = self.coord(self.xcenters[bi]);
            let nx = self.coord(self.x[bi + 1]);
            match self.geom {
                Geometry::Flat => {
                    self.efield[bi] = f * q / eps;
                    q += self.netchg[bi] * (nx - cx);
                }
                Geometry::Cylindrical => {
                    self.efield[bi] = f * q / (2.0 * PI * eps * r);
                    q += self.netchg[bi] * PI * (nx * nx - cx * cx);
                }
                Geometry::Spherical => {
                    self.efield[bi] = f * q / (4.0 * PI * eps * r * r);
                    q += self.netchg[bi] * 4.0 * PI / 3.0 * (nx * nx * nx - cx * cx * cx);
                }
            }
            cx = nx;
        }
        if self.geom == Geometry::Flat {
            q = self.surf_chg.1;
            for bi in (0..nbins).rev() {
                let nx = self.coord(self.x[bi]);
                self.efield[bi] -= f * q / eps;
                q += self.netchg[bi] * (cx - nx);
                cx = nx;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solver(geom: Geometry, surf_chg: (f64, f64)) -> ElectricFieldSolver {
        let x: Vec<f64> = (0..=5).map(|i| 1.0 + 0.5 * i as f64).collect();
        let xc: Vec<f64> = x.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        ElectricFieldSolver::new(geom, false, x, xc, vec![1, -1], surf_chg, 2.0, 3.0)
    }

    #[test]
    fn test_neutral_flat_field_is_constant() {
        let mut s = solver(Geometry::Flat, (0.25, 0.0));
        let linc: Vec<f64> = (0..5).flat_map(|i| [0.1 * i as f64, 0.1 * i as f64]).collect();
        s.calc(&linc);
        for bi in 0..5 {
            assert_eq!(s.netchg[bi], 0.0);
            assert_relative_eq!(s.efield[bi], 3.0 * 0.25 / 2.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_flat_two_sided_charges() {
        // a charged slab in the middle bin, opposite surface charges
        let mut s = solver(Geometry::Flat, (0.1, -0.1));
        let mut linc = vec![0.0; 10];
        linc[4] = 2.0;
        s.calc(&linc);
        assert_eq!(s.netchg[2], 2.0);
        // left of the slab the slab charge counts with the right boundary
        assert_relative_eq!(s.efield[0], 3.0 * (0.1 - (-0.1 + 2.0 * 0.5)) / 2.0, epsilon = 1e-14);
        assert_relative_eq!(s.efield[4], 3.0 * (0.1 + 2.0 * 0.5 + 0.1) / 2.0, epsilon = 1e-14);
    }

    #[test]
    fn test_spherical_gauss_law() {
        let mut s = solver(Geometry::Spherical, (0.0, 0.0));
        let mut linc = vec![0.0; 10];
        linc[0] = 1.0; // unit charge density in the innermost shell
        s.calc(&linc);
        assert_eq!(s.efield[0], 0.0);
        let enclosed = 4.0 * PI / 3.0 * (1.5f64.powi(3) - 1.0);
        for bi in 1..5 {
            let r = s.xcenters[bi];
            assert_relative_eq!(
                s.efield[bi],
                3.0 * enclosed / (4.0 * PI * 2.0 * r * r),
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn test_log_coordinates_match_linear() {
        let lin = solver(Geometry::Cylindrical, (0.3, 0.0));
        let mut log = lin.clone();
        log.logx = true;
        log.x = lin.x.iter().map(|v| v.ln()).collect();
        log.xcenters = lin.xcenters.iter().map(|v| v.ln()).collect();
        let linc: Vec<f64> = (0..10).map(|i| 0.05 * i as f64).collect();
        let mut lin = lin;
        lin.calc(&linc);
        log.calc(&linc);
        for bi in 0..5 {
            assert_relative_eq!(lin.efield[bi], log.efield[bi], max_relative = 1e-12);
        }
    }
}
