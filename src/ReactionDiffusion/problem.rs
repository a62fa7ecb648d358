//! # Problem Definition
//!
//! Everything that describes a 1D reaction-diffusion-advection system before any
//! derived data is computed: species and bin counts, stoichiometry, rate constants,
//! transport coefficients, bin edges, geometry and the representation flags
//! (logarithmic concentration, time and space).
//!
//! The struct is plain data with public fields, so it can be filled by hand or read
//! from a JSON file:
//!
//! ```rust
//! use RDKinetics::ReactionDiffusion::problem::ProblemDefinition;
//! let json = r#"{ "n": 2, "N": 1, "stoich_reac": [[0]], "stoich_prod": [[1]], "k": [0.5] }"#;
//! let problem = ProblemDefinition::from_json_str(json).unwrap();
//! assert_eq!(problem.stencil_width(), 1);
//! assert!(problem.validate().is_ok());
//! ```
//!
//! Validation is eager and complete: once [`ProblemDefinition::validate`] passes, the
//! runtime evaluation code does not re-check any array lengths.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Faraday constant, C/mol
pub const FARADAY_CONST: f64 = 96485.3329;
/// Vacuum permittivity, F/m
pub const VACUUM_PERMITTIVITY: f64 = 8.8541878128e-12;

/// Errors of the reaction-diffusion engine
#[derive(Debug, Error)]
pub enum RDError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Length of {what} is {got}, expected {expected}")]
    LengthMismatch {
        what: String,
        expected: usize,
        got: usize,
    },
    #[error("Species index {index} in {what} of reaction {reaction} is out of range (n = {n})")]
    SpeciesIndexOutOfRange {
        what: String,
        reaction: usize,
        index: usize,
        n: usize,
    },
    #[error("Unknown geometry code: {0}")]
    UnknownGeometry(i32),
    #[error("Singular diagonal block {block} during factorization")]
    SingularMatrix { block: usize },
    #[error("prec_setup must be called before prec_solve_left")]
    PreconditionerNotSetUp,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coordinate geometry of the 1D domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Geometry {
    #[default]
    Flat,
    Cylindrical,
    Spherical,
}

impl Geometry {
    /// flat = 0, cylindrical = 1, spherical = 2
    pub fn from_code(code: i32) -> Result<Self, RDError> {
        match code {
            0 => Ok(Geometry::Flat),
            1 => Ok(Geometry::Cylindrical),
            2 => Ok(Geometry::Spherical),
            other => Err(RDError::UnknownGeometry(other)),
        }
    }

    pub fn as_code(&self) -> i32 {
        match self {
            Geometry::Flat => 0,
            Geometry::Cylindrical => 1,
            Geometry::Spherical => 2,
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Geometry::Flat => "flat",
            Geometry::Cylindrical => "cylindrical",
            Geometry::Spherical => "spherical",
        };
        write!(f, "{}", name)
    }
}

/// Physical constants used by the electric field solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    /// C/mol
    pub faraday_const: f64,
    /// F/m
    pub vacuum_permittivity: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            faraday_const: FARADAY_CONST,
            vacuum_permittivity: VACUUM_PERMITTIVITY,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_eps_rel() -> f64 {
    1.0
}

/// Immutable description of the discretized system
#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDefinition {
    /// number of species
    pub n: usize,
    /// number of bins
    pub N: usize,
    /// reactant species indices of each reaction (a multiset)
    pub stoich_reac: Vec<Vec<usize>>,
    /// product species indices of each reaction (a multiset)
    pub stoich_prod: Vec<Vec<usize>>,
    /// species entering the rate law; an empty entry (or an empty vector) means mass action
    #[serde(default)]
    pub stoich_actv: Vec<Vec<usize>>,
    /// rate constants
    pub k: Vec<f64>,
    /// diffusion coefficients
    #[serde(default)]
    pub D: Vec<f64>,
    #[serde(default)]
    pub mobility: Vec<f64>,
    /// integer charges of species
    #[serde(default)]
    pub z_chg: Vec<i32>,
    /// bin edges, length N + 1 (log-coordinates when `logx`)
    #[serde(default)]
    pub x: Vec<f64>,
    /// per-bin modulation factors, one row per bin, one column per span
    #[serde(default)]
    pub bin_k_factor: Vec<Vec<f64>>,
    /// number of consecutive reactions (from the first one) modulated by each column
    #[serde(default)]
    pub bin_k_factor_span: Vec<usize>,
    #[serde(default)]
    pub geom: Geometry,
    #[serde(default)]
    pub logy: bool,
    #[serde(default)]
    pub logt: bool,
    #[serde(default)]
    pub logx: bool,
    /// odd number of stencil points; `None` picks 1 for a single bin and 3 otherwise
    #[serde(default)]
    pub nstencil: Option<usize>,
    #[serde(default = "default_true")]
    pub lrefl: bool,
    #[serde(default = "default_true")]
    pub rrefl: bool,
    #[serde(default)]
    pub auto_efield: bool,
    /// surface charges at the left and right boundary
    #[serde(default)]
    pub surf_chg: (f64, f64),
    #[serde(default = "default_eps_rel")]
    pub eps_rel: f64,
    #[serde(default)]
    pub constants: PhysicalConstants,
}

impl ProblemDefinition {
    /// Minimal problem: reflective boundaries, flat geometry, linear representation
    #[allow(non_snake_case)]
    pub fn new(
        n: usize,
        N: usize,
        stoich_reac: Vec<Vec<usize>>,
        stoich_prod: Vec<Vec<usize>>,
        k: Vec<f64>,
    ) -> Self {
        Self {
            n,
            N,
            stoich_reac,
            stoich_prod,
            stoich_actv: Vec::new(),
            k,
            D: Vec::new(),
            mobility: Vec::new(),
            z_chg: Vec::new(),
            x: Vec::new(),
            bin_k_factor: Vec::new(),
            bin_k_factor_span: Vec::new(),
            geom: Geometry::Flat,
            logy: false,
            logt: false,
            logx: false,
            nstencil: None,
            lrefl: true,
            rrefl: true,
            auto_efield: false,
            surf_chg: (0.0, 0.0),
            eps_rel: 1.0,
            constants: PhysicalConstants::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, RDError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, RDError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> Result<String, RDError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn stencil_width(&self) -> usize {
        match self.nstencil {
            Some(w) => w,
            None if self.N == 1 => 1,
            None => 3,
        }
    }

    pub fn nr(&self) -> usize {
        self.stoich_reac.len()
    }

    /// Copy with the single-bin defaults filled in: zero transport coefficients and
    /// the unit interval as bin edges.
    pub fn normalised(&self) -> Self {
        let mut problem = self.clone();
        if problem.N == 1 {
            if problem.D.is_empty() {
                problem.D = vec![0.0; problem.n];
            }
            if problem.mobility.is_empty() {
                problem.mobility = vec![0.0; problem.n];
            }
            if problem.z_chg.is_empty() && !problem.auto_efield {
                problem.z_chg = vec![0; problem.n];
            }
            if problem.x.is_empty() {
                problem.x = vec![0.0, 1.0];
            }
        }
        problem.nstencil = Some(problem.stencil_width());
        problem
    }

    /// Checks every invariant the engine relies on. Call on a normalised problem.
    pub fn validate(&self) -> Result<(), RDError> {
        let n = self.n;
        let nbins = self.N;
        let nstencil = self.stencil_width();
        if n == 0 {
            return Err(RDError::InvalidConfiguration(
                "At least one species is required".to_string(),
            ));
        }
        if nbins == 0 {
            return Err(RDError::InvalidConfiguration(
                "Zero bins sounds boring.".to_string(),
            ));
        }
        if nbins == 2 {
            return Err(RDError::InvalidConfiguration(
                "2nd order PDE requires at least 3 stencil points.".to_string(),
            ));
        }
        if nstencil % 2 == 0 {
            return Err(RDError::InvalidConfiguration(
                "Only odd number of stencil points supported".to_string(),
            ));
        }
        if nbins == 1 && nstencil != 1 {
            return Err(RDError::InvalidConfiguration(
                "You must set nstencil=1 for N=1".to_string(),
            ));
        }
        if nbins > 1 && nstencil <= 1 {
            return Err(RDError::InvalidConfiguration(
                "You must set nstencil>1 for N>1".to_string(),
            ));
        }
        let nr = self.stoich_reac.len();
        check_len("stoich_prod", nr, self.stoich_prod.len())?;
        check_len("k", nr, self.k.len())?;
        if !self.stoich_actv.is_empty() {
            check_len("stoich_actv", nr, self.stoich_actv.len())?;
        }
        if nbins > 1 {
            check_len("D", n, self.D.len())?;
            check_len("mobility", n, self.mobility.len())?;
            check_len("z_chg", n, self.z_chg.len())?;
        }
        if self.auto_efield {
            check_len("z_chg", n, self.z_chg.len())?;
        }
        if nbins > 1 || self.auto_efield {
            check_len("x (bin edges)", nbins + 1, self.x.len())?;
        }
        if self.x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(RDError::InvalidConfiguration(
                "Bin edges must be strictly increasing".to_string(),
            ));
        }
        let nsidep = (nstencil - 1) / 2;
        if nbins > 1 {
            if (!self.lrefl || !self.rrefl) && nstencil > nbins {
                return Err(RDError::InvalidConfiguration(format!(
                    "Stencil of {} points is wider than the {} bins",
                    nstencil, nbins
                )));
            }
            if nsidep > nbins {
                return Err(RDError::InvalidConfiguration(format!(
                    "Reflected stencil of {} points needs at least {} bins",
                    nstencil, nsidep
                )));
            }
        }
        check_species("stoich_reac", &self.stoich_reac, n)?;
        check_species("stoich_prod", &self.stoich_prod, n)?;
        check_species("stoich_actv", &self.stoich_actv, n)?;
        if !self.bin_k_factor_span.is_empty() {
            check_len("bin_k_factor", nbins, self.bin_k_factor.len())?;
            let ncols = self.bin_k_factor_span.len();
            if let Some(bi) = self.bin_k_factor.iter().position(|row| row.len() < ncols) {
                return Err(RDError::LengthMismatch {
                    what: format!("bin_k_factor row {}", bi),
                    expected: ncols,
                    got: self.bin_k_factor[bi].len(),
                });
            }
            let spanned: usize = self.bin_k_factor_span.iter().sum();
            if spanned > nr {
                return Err(RDError::InvalidConfiguration(format!(
                    "bin_k_factor_span covers {} reactions but only {} are defined",
                    spanned, nr
                )));
            }
        }
        Ok(())
    }
}

fn check_len(what: &str, expected: usize, got: usize) -> Result<(), RDError> {
    if expected != got {
        return Err(RDError::LengthMismatch {
            what: what.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

fn check_species(what: &str, stoich: &[Vec<usize>], n: usize) -> Result<(), RDError> {
    for (reaction, species) in stoich.iter().enumerate() {
        if let Some(&index) = species.iter().find(|&&si| si > n - 1) {
            return Err(RDError::SpeciesIndexOutOfRange {
                what: what.to_string(),
                reaction,
                index,
                n,
            });
        }
    }
    Ok(())
}
