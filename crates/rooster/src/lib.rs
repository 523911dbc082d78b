//! # Rooster - An Exact Integer-Point Sampler for Rational Polyhedra
//!
//! Rooster decides whether a convex rational polyhedron, given as a
//! conjunction of linear equalities and inequalities over
//! arbitrary-precision integers, contains an integer point, and if so
//! returns one such point. Polyhedra may be bounded or unbounded; an
//! unbounded input is split into a bounded part and its recession cone,
//! and a rational point found in the cone is promoted to an integer one
//! by a rounding construction. The search over the bounded part is a
//! depth-first scan along the directions of a (reduced) lattice basis,
//! driven by an exact simplex tableau with snapshot/rollback.
//!
//! The main entry point is [`BasicSet::sample_vec`]; unions of sets and
//! relations are sampled through [`Set::sample`] and [`Map::sample`].

pub mod basic_set;
pub mod context;
pub(crate) mod gbr;
pub(crate) mod helpers;
pub mod map;
pub mod mat;
pub mod sample;
pub mod tab;
#[cfg(test)]
pub(crate) mod tests;
pub mod vec;

use thiserror::Error;

pub use crate::{
	basic_set::BasicSet,
	context::{Context, GbrMode, IlpSolver, PipSolver},
	map::{BasicMap, Map, Set},
	mat::IntMat,
	sample::{sample_with_cone, set_initial_basis_with_cone, skew_to_positive_orthant, tab_sample},
	tab::Tableau,
	vec::IntVec,
};

#[derive(Debug, Error, PartialEq, Eq)]
/// Errors reported by the sampling core.
///
/// Note that an unsatisfiable input is not an error: it is reported as a
/// zero-length [`IntVec`].
pub enum Error {
	/// A precondition on the input was violated, e.g. the input carries
	/// parameters or existentially quantified divisions.
	#[error("invalid input: {0}")]
	InvalidInput(&'static str),
	/// An internal assertion that should be unreachable was violated.
	#[error("internal invariant violated: {0}")]
	InternalInvariant(&'static str),
	/// A backend returned a result outside its contract, or a required
	/// backend was not available.
	#[error("backend failure: {0}")]
	Backend(&'static str),
}
