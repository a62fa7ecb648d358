//! # Reaction-diffusion engine
//!
//! Ties the precomputed pieces together and exposes the callbacks an implicit
//! integrator needs:
//! - `f(t, y, dydt)`: right hand side
//! - `jacobian_into` / `jacobian`: Jacobian in any [`LayoutKind`]
//! - `jac_times_vec`, `prec_setup`, `prec_solve_left`: Newton-Krylov support
//!
//! State vectors are bin-major, `y[bi*n + si]`. With `logy` the state holds
//! `ln(C)`, with `logt` the independent variable is `ln(t)`.
//!
//! RHS and Jacobian assembly run bin by bin, each bin writing only its own output
//! chunk, so with the `parallel` feature the bins are distributed over the rayon
//! pool with one rate scratch buffer per worker.
use super::block_diag::BlockDiagMatrix;
use super::efield::ElectricFieldSolver;
use super::fd_weights::{Fornberg, WeightGenerator};
use super::jacobian_layout::{JacobianIndexing, JacobianLayout, LayoutKind, create_layout};
use super::preconditioner::{PreconditionerCache, jacobian_needs_rebuild};
use super::problem::{Geometry, ProblemDefinition, RDError};
use super::reaction_network::ReactionNetwork;
use super::stencil::StencilGeometry;
use log::{info, trace};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Number of calls of each callback since construction or the last `zero_counters`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationCounters {
    pub nfev: u64,
    pub njev: u64,
    pub njacvec_dot: u64,
    pub nprec_setup: u64,
    pub nprec_solve: u64,
    /// actual rebuilds of `I - gamma*J`
    pub nprec_rebuild: u64,
}

/// Runs `body(bin, chunk, rate_scratch)` for every `width`-sized chunk of `out`
fn for_each_bin<F>(out: &mut [f64], width: usize, nr: usize, body: F)
where
    F: Fn(usize, &mut [f64], &mut [f64]) + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        out.par_chunks_mut(width)
            .enumerate()
            .for_each_init(|| vec![0.0; nr], |local_r, (bi, chunk)| body(bi, chunk, local_r));
    }
    #[cfg(not(feature = "parallel"))]
    {
        let mut local_r = vec![0.0; nr];
        for (bi, chunk) in out.chunks_mut(width).enumerate() {
            body(bi, chunk, &mut local_r);
        }
    }
}

#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct ReactionDiffusion {
    /// number of species
    pub n: usize,
    /// number of bins
    pub N: usize,
    pub nr: usize,
    pub nstencil: usize,
    pub geom: Geometry,
    pub logy: bool,
    pub logt: bool,
    pub logx: bool,
    pub auto_efield: bool,
    pub D: Vec<f64>,
    pub mobility: Vec<f64>,
    pub stencil: StencilGeometry,
    pub network: ReactionNetwork,
    pub field: ElectricFieldSolver,
    pub counters: EvaluationCounters,
    cache: PreconditionerCache,
}

impl ReactionDiffusion {
    pub fn new(problem: &ProblemDefinition) -> Result<Self, RDError> {
        Self::with_weight_generator(problem, &Fornberg)
    }

    #[allow(non_snake_case)]
    pub fn with_weight_generator(
        problem: &ProblemDefinition,
        generator: &dyn WeightGenerator,
    ) -> Result<Self, RDError> {
        let problem = problem.normalised();
        problem.validate()?;
        let network = ReactionNetwork::from_problem(&problem)?;
        let nstencil = problem.stencil_width();
        let stencil = StencilGeometry::new(
            &problem.x,
            nstencil,
            problem.geom,
            problem.logx,
            problem.lrefl,
            problem.rrefl,
            generator,
        );
        let field = ElectricFieldSolver::new(
            problem.geom,
            problem.logx,
            problem.x.clone(),
            stencil.xcenters().to_vec(),
            problem.z_chg.clone(),
            problem.surf_chg,
            problem.eps_rel * problem.constants.vacuum_permittivity,
            problem.constants.faraday_const,
        );
        let N = problem.N;
        info!(
            "reaction-diffusion system ready: n = {}, N = {}, nr = {}, logy = {}, logt = {}, logx = {}, auto_efield = {}",
            problem.n, N, network.nr, problem.logy, problem.logt, problem.logx, problem.auto_efield
        );
        Ok(Self {
            n: problem.n,
            N,
            nr: network.nr,
            nstencil,
            geom: problem.geom,
            logy: problem.logy,
            logt: problem.logt,
            logx: problem.logx,
            auto_efield: problem.auto_efield,
            D: problem.D,
            mobility: problem.mobility,
            stencil,
            network,
            field,
            counters: EvaluationCounters::default(),
            cache: PreconditionerCache::new(),
        })
    }

    /// Length of the state vector
    pub fn size(&self) -> usize {
        self.n * self.N
    }

    /// Unpadded cell centres
    pub fn xcenters(&self) -> &[f64] {
        self.stencil.xcenters()
    }

    pub fn efield(&self) -> &[f64] {
        &self.field.efield
    }

    pub fn netchg(&self) -> &[f64] {
        &self.field.netchg
    }

    /// Sets a fixed external field; only allowed when the field is not self-consistent
    pub fn set_efield(&mut self, efield: &[f64]) -> Result<(), RDError> {
        if self.auto_efield {
            return Err(RDError::InvalidConfiguration(
                "The field is recomputed on every call when auto_efield is set".to_string(),
            ));
        }
        if efield.len() != self.N {
            return Err(RDError::LengthMismatch {
                what: "efield".to_string(),
                expected: self.N,
                got: efield.len(),
            });
        }
        self.field.efield.copy_from_slice(efield);
        Ok(())
    }

    /// Recomputes net charge and field from linear concentrations
    pub fn calc_efield(&mut self, linc: &[f64]) {
        self.field.calc(linc);
    }

    pub fn zero_counters(&mut self) {
        self.counters = EvaluationCounters::default();
    }

    /// Drops the cached Jacobian and preconditioner; `prec_setup` is required again
    pub fn invalidate_caches(&mut self) {
        self.cache.invalidate();
    }

    pub fn layout(&self, kind: LayoutKind) -> JacobianLayout {
        create_layout(kind, self.N, self.n)
    }

    /// Zeroed buffer for a Jacobian in the given layout
    pub fn alloc_jacobian(&self, kind: LayoutKind) -> Vec<f64> {
        vec![0.0; self.layout(kind).storage_len()]
    }

    fn linear_concentrations<'a>(&self, y: &'a [f64]) -> Cow<'a, [f64]> {
        if self.logy {
            Cow::Owned(y.iter().map(|v| v.exp()).collect())
        } else {
            Cow::Borrowed(y)
        }
    }

    /// Right hand side `dydt = f(t, y)`
    pub fn f(&mut self, t: f64, y: &[f64], dydt: &mut [f64]) {
        let linc = self.linear_concentrations(y);
        if self.auto_efield {
            self.field.calc(&linc);
        }
        {
            let this = &*self;
            let linc = &*linc;
            for_each_bin(dydt, self.n, self.nr, |bi, out, local_r| {
                this.rhs_bin(bi, t, y, linc, out, local_r)
            });
        }
        self.counters.nfev += 1;
        trace!("f call {}: t = {:e}", self.counters.nfev, t);
    }

    fn rhs_bin(&self, bi: usize, t: f64, y: &[f64], linc: &[f64], out: &mut [f64], local_r: &mut [f64]) {
        let n = self.n;
        self.network.fill_local_rates(bi, y, self.logy, local_r);
        out.iter_mut().for_each(|v| *v = 0.0);
        for rxn in 0..self.nr {
            for (si, dydt) in out.iter_mut().enumerate() {
                let net = self.network.net(rxn, si);
                if net != 0 {
                    *dydt += net as f64 * local_r[rxn];
                }
            }
        }
        if self.N > 1 {
            let efield = &self.field.efield;
            for si in 0..n {
                if self.D[si] == 0.0 && self.mobility[si] == 0.0 {
                    continue;
                }
                let mut diffusion = 0.0;
                let mut advection = 0.0;
                for li in 0..self.nstencil {
                    let biw = self.stencil.window_bin(bi, li);
                    diffusion += self.stencil.d_weight(bi, li) * linc[biw * n + si];
                    advection += self.stencil.a_weight(bi, li)
                        * (linc[biw * n + si] * efield[bi] + linc[bi * n + si] * efield[biw]);
                }
                out[si] += diffusion * self.D[si] - advection * self.mobility[si];
            }
        }
        match (self.logy, self.logt) {
            (true, true) => {
                for (si, v) in out.iter_mut().enumerate() {
                    *v *= (t - y[bi * n + si]).exp();
                }
            }
            (true, false) => {
                for (si, v) in out.iter_mut().enumerate() {
                    *v /= linc[bi * n + si];
                }
            }
            (false, true) => {
                let expt = t.exp();
                out.iter_mut().for_each(|v| *v *= expt);
            }
            (false, false) => {}
        }
    }

    /// Per-reaction contribution to `dC_si/dt` in the first bin (`net change * rate`)
    pub fn per_rxn_contrib_to_fi(&self, _t: f64, y: &[f64], si: usize) -> Vec<f64> {
        let mut local_r = vec![0.0; self.nr];
        self.network.fill_local_rates(0, y, self.logy, &mut local_r);
        local_r
            .iter()
            .enumerate()
            .map(|(rxn, r)| self.network.net(rxn, si) as f64 * r)
            .collect()
    }

    /// Local blocks of bin `bi`: row-major `n x n` diagonal block, then the `n`
    /// sub-diagonal and the `n` super-diagonal entries
    #[allow(clippy::too_many_arguments)]
    fn jacobian_bin(
        &self,
        bi: usize,
        t: f64,
        y: &[f64],
        linc: &[f64],
        fout: &[f64],
        local: &mut [f64],
        local_r: &mut [f64],
    ) {
        let n = self.n;
        local.iter_mut().for_each(|v| *v = 0.0);
        self.network.fill_local_rates(bi, y, self.logy, local_r);
        let (diag, rest) = local.split_at_mut(n * n);
        let (sub, sup) = rest.split_at_mut(n);

        for si in 0..n {
            for dsi in 0..n {
                let mut v = 0.0;
                for rxn in 0..self.nr {
                    let net = self.network.net(rxn, si);
                    let actv = self.network.actv(rxn, dsi);
                    if net != 0 && actv != 0 {
                        v += (net * actv) as f64 * local_r[rxn];
                    }
                }
                diag[si * n + dsi] = if self.logy {
                    v / linc[bi * n + si]
                } else {
                    v / y[bi * n + dsi]
                };
            }
        }

        if self.N > 1 {
            let efield = &self.field.efield;
            for si in 0..n {
                let (d, mob) = (self.D[si], self.mobility[si]);
                if d == 0.0 && mob == 0.0 {
                    continue;
                }
                // ratio of neighbour to own concentration from the log transform
                let cf = |nb: usize| {
                    if self.logy {
                        linc[nb * n + si] / linc[bi * n + si]
                    } else {
                        1.0
                    }
                };
                for li in 0..self.nstencil {
                    let sbi = self.stencil.window_bin(bi, li);
                    let dw = self.stencil.d_weight(bi, li);
                    let aw = self.stencil.a_weight(bi, li);
                    diag[si * n + si] -= mob * efield[sbi] * aw;
                    let coupling = d * dw - mob * efield[bi] * aw;
                    if sbi == bi {
                        diag[si * n + si] += coupling;
                    } else if bi >= 1 && sbi == bi - 1 {
                        sub[si] += coupling * cf(sbi);
                    } else if bi + 1 < self.N && sbi == bi + 1 {
                        sup[si] += coupling * cf(sbi);
                    }
                    // wider stencils: couplings beyond the nearest neighbours are dropped
                }
            }
        }

        if self.logt {
            let expt = t.exp();
            local.iter_mut().for_each(|v| *v *= expt);
        }
        if self.logy {
            for si in 0..n {
                local[si * n + si] -= fout[bi * n + si];
            }
        }
    }

    /// Assembles the Jacobian into `ja`, laid out as `layout`. Every stored entry of the
    /// block tridiagonal pattern is overwritten; other entries are left untouched.
    /// `fy` is the RHS at `(t, y)`; it is only needed with `logy` and evaluated when absent.
    pub fn jacobian_into(
        &mut self,
        t: f64,
        y: &[f64],
        fy: Option<&[f64]>,
        layout: &JacobianLayout,
        ja: &mut [f64],
    ) {
        let n = self.n;
        let nbins = self.N;
        let fout: Cow<[f64]> = match (self.logy, fy) {
            (false, _) => Cow::Borrowed(&[]),
            (true, Some(fy)) => Cow::Borrowed(fy),
            (true, None) => {
                let mut tmp = vec![0.0; self.size()];
                self.f(t, y, &mut tmp);
                Cow::Owned(tmp)
            }
        };
        let linc = self.linear_concentrations(y);
        if self.auto_efield {
            self.field.calc(&linc);
        }

        let width = n * n + 2 * n;
        let mut blocks = vec![0.0; width * nbins];
        {
            let this = &*self;
            let (linc, fout) = (&*linc, &*fout);
            for_each_bin(&mut blocks, width, self.nr, |bi, local, local_r| {
                this.jacobian_bin(bi, t, y, linc, fout, local, local_r)
            });
        }

        for (bi, local) in blocks.chunks(width).enumerate() {
            for ri in 0..n {
                for ci in 0..n {
                    ja[layout.index(bi, bi, ri, ci)] = local[ri * n + ci];
                }
                if bi > 0 {
                    ja[layout.index(bi, bi - 1, ri, ri)] = local[n * n + ri];
                }
                if bi + 1 < nbins {
                    ja[layout.index(bi, bi + 1, ri, ri)] = local[n * n + n + ri];
                }
            }
        }
        self.counters.njev += 1;
        trace!(
            "jacobian call {} ({:?}): t = {:e}",
            self.counters.njev,
            layout.kind(),
            t
        );
    }

    /// Jacobian in a freshly allocated buffer of the requested layout
    pub fn jacobian(&mut self, t: f64, y: &[f64], fy: Option<&[f64]>, kind: LayoutKind) -> Vec<f64> {
        let layout = self.layout(kind);
        let mut ja = vec![0.0; layout.storage_len()];
        self.jacobian_into(t, y, fy, &layout, &mut ja);
        ja
    }

    fn assemble_block_diag(&mut self, t: f64, y: &[f64], fy: Option<&[f64]>) -> BlockDiagMatrix {
        let mut jac = BlockDiagMatrix::new(self.N, self.n);
        let layout = jac.layout();
        self.jacobian_into(t, y, fy, &layout, &mut jac.data);
        jac
    }

    /// `out = J v`, with `J` the cached compressed Jacobian; assembled at `(t, y)` on
    /// the first call only
    pub fn jac_times_vec(&mut self, v: &[f64], out: &mut [f64], t: f64, y: &[f64], fy: Option<&[f64]>) {
        if self.cache.jacobian().is_none() {
            let jac = self.assemble_block_diag(t, y, fy);
            self.cache.store_jacobian(jac);
        }
        if let Some(jac) = self.cache.jacobian() {
            jac.dot_vec(v, out);
        }
        self.counters.njacvec_dot += 1;
        trace!("jac_times_vec call {}", self.counters.njacvec_dot);
    }

    /// Refreshes the cached Jacobian unless `reuse_ok` allows keeping it; returns
    /// whether it was recomputed
    pub fn prec_setup(&mut self, t: f64, y: &[f64], fy: Option<&[f64]>, reuse_ok: bool) -> bool {
        let recomputed = jacobian_needs_rebuild(self.cache.jacobian().is_some(), reuse_ok);
        if recomputed {
            let jac = self.assemble_block_diag(t, y, fy);
            self.cache.store_jacobian(jac);
        }
        self.cache.mark_set_up();
        self.counters.nprec_setup += 1;
        trace!(
            "prec_setup call {}: recomputed = {}",
            self.counters.nprec_setup,
            recomputed
        );
        recomputed
    }

    /// Solves `(I - gamma*J) z = r` with the Jacobian of the last `prec_setup`.
    /// Returns whether `I - gamma*J` had to be rebuilt.
    pub fn prec_solve_left(
        &mut self,
        _t: f64,
        _y: &[f64],
        _fy: Option<&[f64]>,
        r: &[f64],
        z: &mut [f64],
        gamma: f64,
    ) -> Result<bool, RDError> {
        self.counters.nprec_solve += 1;
        let rebuilt = self.cache.solve(gamma, r, z)?;
        if rebuilt {
            self.counters.nprec_rebuild += 1;
        }
        trace!(
            "prec_solve_left call {}: gamma = {:e}, rebuilt = {}",
            self.counters.nprec_solve,
            gamma,
            rebuilt
        );
        Ok(rebuilt)
    }
}
