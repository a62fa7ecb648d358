//! # Reaction-Diffusion-Advection Module
//!
//! Method-of-lines discretization of one-dimensional transport with chemical reactions
//! and an optional self-consistent electric field. The module supplies the right hand
//! side and Jacobian callbacks of an implicit ODE integrator; it does not integrate.
//!
//! ## Mathematical Model
//!
//! ### Nomenclature
//!
//! | Symbol | Description | Units |
//! |--------|-------------|-------|
//! | `C_i` | Concentration of species `i` | mol/m³ |
//! | `D_i` | Diffusion coefficient | m²/s |
//! | `μ_i` | Electrical mobility | m²/(V·s) |
//! | `z_i` | Charge number | - |
//! | `E` | Electric field | V/m |
//! | `F` | Faraday constant | C/mol |
//! | `ε` | Permittivity, `ε_r·ε_0` | F/m |
//! | `r_j` | Rate of reaction `j` | mol/(m³·s) |
//!
//! ### Governing Equations
//!
//! ```text
//! dC_i/dt = Σ_j[ν_ij r_j] + D_i ∇²C_i - μ_i ∇·(C_i E)
//! r_j     = k_j f_j(bin) Π_s[C_s^a_sj]
//! ```
//!
//! where `ν_ij` is the net stoichiometric change, `a_sj` the multiplicity of species `s`
//! in the rate law of reaction `j` (mass action by default) and `f_j(bin)` an optional
//! per-bin modulation factor. `∇²` and `∇·` take the flat, cylindrical or spherical
//! form. With the self-consistent field, `E` follows Gauss's law from the net charge
//! `ρ = Σ_i z_i C_i` and the surface charges at the boundaries.
//!
//! ### Representations
//!
//! - `logy`: the state is `y = ln C`, so `dy/dt = (dC/dt)/C`
//! - `logt`: the independent variable is `ln t`, so every derivative gets a factor `t`
//! - `logx`: bin edges are given as `ln x`
//!
//! ## Discretization
//!
//! The domain is split into `N` bins; derivatives at each bin centre use an `nstencil`
//! point finite difference stencil over neighbouring centres, with mirrored ghost
//! cells at reflective boundaries. The Jacobian is block tridiagonal (nearest
//! neighbour coupling) and can be stored in dense, banded or compressed block
//! diagonal layouts; the compressed one also backs the `I - γJ` preconditioner.
//!
//! ## Modules
//! - [`problem`]: problem definition, errors, JSON configuration
//! - [`fd_weights`]: finite difference weights on arbitrary nodes
//! - [`stencil`]: padded centres, boundary folding, per-bin operator weights
//! - [`reaction_network`], [`rates`]: coefficient tables and rate evaluation
//! - [`efield`]: Gauss's law field solver
//! - [`jacobian_layout`], [`block_diag`], [`preconditioner`]: Jacobian storage and
//!   the Newton-Krylov preconditioner
//! - [`engine`]: the assembled system

pub mod block_diag;
pub mod efield;
pub mod engine;
pub mod fd_weights;
pub mod jacobian_layout;
pub mod preconditioner;
pub mod problem;
pub mod rates;
pub mod reaction_network;
pub mod stencil;
