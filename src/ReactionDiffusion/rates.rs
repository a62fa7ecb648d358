//! Rate evaluation: the only place where concentrations enter the rate law.
//!
//! Linear representation: `r = k * f_bi * prod(C_s ^ actv_s)`.
//! Logarithmic representation (`y = ln C`): `r = k * f_bi * exp(sum(actv_s * y_s))`.
use super::reaction_network::ReactionNetwork;

impl ReactionNetwork {
    /// Fills `local_r` (length `nr`) with the rates of every reaction in bin `bi`.
    /// `y` is the full state vector, bin-major (`y[bi*n + si]`).
    pub fn fill_local_rates(&self, bi: usize, y: &[f64], logy: bool, local_r: &mut [f64]) {
        let local_y = &y[bi * self.n..(bi + 1) * self.n];
        for (rxn, rate) in local_r.iter_mut().enumerate().take(self.nr) {
            let actv = &self.stoich_actv[rxn];
            let r = if logy {
                actv.iter().map(|&si| local_y[si]).sum::<f64>().exp()
            } else {
                actv.iter().map(|&si| local_y[si]).product::<f64>()
            };
            *rate = r * self.factor(rxn, bi) * self.k[rxn];
        }
    }
}
