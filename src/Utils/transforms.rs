//! State and grid helpers.
use crate::ReactionDiffusion::problem::RDError;

/// Algebraic sigmoid `x / ((x/lim)^n + 1)^(1/n)`.
/// Close to identity for `|x| << lim` and saturating at `lim`; used to damp log-states
/// before they reach `exp`.
pub fn sigm(x: f64, lim: f64, n: i32) -> f64 {
    x / ((x / lim).powi(n) + 1.0).powf(1.0 / n as f64)
}

/// `ln C` of every concentration, with an optional sigmoid damping `(lim, n)`
pub fn to_log_state(linc: &[f64], damp: Option<(f64, i32)>) -> Vec<f64> {
    linc.iter()
        .map(|c| {
            let y = c.ln();
            match damp {
                Some((lim, n)) => sigm(y, lim, n),
                None => y,
            }
        })
        .collect()
}

pub fn from_log_state(y: &[f64]) -> Vec<f64> {
    y.iter().map(|v| v.exp()).collect()
}

/// `nbins + 1` equidistant bin edges from `x0` to `xend`. With `logx` the edges are
/// equidistant in `ln x` and returned as log-coordinates.
pub fn linspace_edges(x0: f64, xend: f64, nbins: usize, logx: bool) -> Result<Vec<f64>, RDError> {
    if nbins == 0 {
        return Err(RDError::InvalidConfiguration(
            "At least one bin is required".to_string(),
        ));
    }
    if !(xend > x0) {
        return Err(RDError::InvalidConfiguration(format!(
            "Grid end {} must exceed its start {}",
            xend, x0
        )));
    }
    let (a, b) = if logx {
        if x0 <= 0.0 {
            return Err(RDError::InvalidConfiguration(
                "Logarithmic grids need a positive start".to_string(),
            ));
        }
        (x0.ln(), xend.ln())
    } else {
        (x0, xend)
    };
    let step = (b - a) / nbins as f64;
    let mut edges: Vec<f64> = (0..=nbins).map(|i| a + step * i as f64).collect();
    edges[nbins] = b;
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigm() {
        assert_relative_eq!(sigm(1.0, 150.0, 8), 1.0, max_relative = 1e-12);
        assert_relative_eq!(sigm(-3.0, 150.0, 8), -3.0, max_relative = 1e-12);
        assert!(sigm(1e4, 150.0, 8) < 150.0);
        assert!(sigm(-1e4, 150.0, 8) > -150.0);
        assert_relative_eq!(sigm(150.0, 150.0, 8), 150.0 / 2f64.powf(0.125), max_relative = 1e-12);
    }

    #[test]
    fn test_log_state_round_trip() {
        let c = [1.3, 1e-4, 0.7];
        let y = to_log_state(&c, None);
        assert_relative_eq!(y[1], 1e-4f64.ln());
        let back = from_log_state(&y);
        for (a, b) in back.iter().zip(c.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-14);
        }
        let damped = to_log_state(&[1e-300], Some((150.0, 8)));
        assert!(damped[0] > -150.0);
    }

    #[test]
    fn test_linspace_edges() {
        let x = linspace_edges(0.0, 1.0, 4, false).unwrap();
        assert_eq!(x.len(), 5);
        assert_relative_eq!(x[1], 0.25);
        assert_eq!(x[4], 1.0);
        let lx = linspace_edges(1.0, 100.0, 2, true).unwrap();
        assert_relative_eq!(lx[1].exp(), 10.0, max_relative = 1e-12);
        assert!(linspace_edges(0.0, 1.0, 0, false).is_err());
        assert!(linspace_edges(0.0, 1.0, 3, true).is_err());
        assert!(linspace_edges(1.0, 1.0, 3, false).is_err());
    }
}
