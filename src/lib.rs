//! brentsat: searching for fast matrix multiplication schemes
//!
//! A scheme multiplies an n1×n2 matrix by an n2×n3 matrix with `m` scalar
//! products. It is valid when its three coefficient matrices satisfy the
//! Brent equations. Two search strategies are provided:
//!
//! - [`encode`] turns "does a GF(2) scheme with `m` products exist?" into a
//!   SAT instance for an external solver ([`solver`]);
//! - [`flip`] walks the flip graph of bit-packed GF(2) schemes, lowering the
//!   rank by local moves.
//!
//! Found schemes are canonicalized ([`scheme::Scheme::sort`]) and persisted as
//! JSON [`record`]s. [`scheme::additions`] then lowers the additions needed to
//! evaluate a scheme by sharing common subexpressions.

pub mod algebra;
pub mod config;
pub mod encode;
pub mod error;
pub mod flip;
pub mod record;
pub mod ring;
pub mod scheme;
pub mod solver;

pub use config::Config;
pub use encode::{BrentEncoder, EncodingOptions, Layout, ParityEncoding, VariableMap};
pub use error::{ConfigError, ParseError, RecordError, SchemeError, SolverError};
pub use flip::{BitPackedScheme, FlipWalk, WalkReport};
pub use ring::{Coeff, Ring};
pub use scheme::{AdditionReducer, Canonicalization, Dims, Reduced, ReductionMode, Scheme};
pub use solver::{SolveOutcome, SolverConfig};
