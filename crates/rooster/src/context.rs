//! Configuration threaded through the sampling entry points.
//!
//! A [`Context`] carries the policy choices of a computation: when to
//! run generalized basis reduction, which integer LP backend to use, and
//! the optional external backend itself. The two basis-reduction fields
//! use interior mutability because the search saves, flips and restores
//! them around its inner loop; all other state is plain.
//!
//! Contexts are not thread-safe: concurrent sampler runs need
//! independent contexts and independent inputs.

use std::{
	cell::Cell,
	fmt::{self, Debug, Formatter},
};

use crate::{basic_set::BasicSet, vec::IntVec, Error};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// When the search runs generalized basis reduction.
pub enum GbrMode {
	/// Never reduce the basis.
	Never,
	/// Reduce the basis only for the first multi-valued range
	/// encountered during a search.
	Once,
	#[default]
	/// Reduce the basis whenever a multi-valued range is encountered.
	Always,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Which integer LP backend answers general sampling queries.
pub enum IlpSolver {
	#[default]
	/// The built-in sampler based on generalized basis reduction.
	Gbr,
	/// An external backend registered with
	/// [`Context::with_pip_solver`], fed positive-orthant-skewed sets.
	Pip,
}

/// An external integer LP backend: given a set skewed into the positive
/// orthant, return an integer sample in the skewed coordinates, or the
/// zero-length vector when there is none.
pub type PipSolver = Box<dyn Fn(BasicSet) -> Result<IntVec, Error>>;

/// Per-computation configuration for the sampler.
pub struct Context {
	/// Basis reduction policy.
	gbr: Cell<GbrMode>,
	/// Whether basis reduction may return early once it has settled a
	/// reasonable first direction.
	gbr_only_first: Cell<bool>,
	/// Selected integer LP backend.
	ilp_solver: IlpSolver,
	/// The external backend, when one is registered.
	pip_solver: Option<PipSolver>,
}

impl Context {
	/// A context with the default policies.
	pub fn new() -> Self {
		Context {
			gbr: Cell::new(GbrMode::default()),
			gbr_only_first: Cell::new(false),
			ilp_solver: IlpSolver::default(),
			pip_solver: None,
		}
	}

	/// Select the basis reduction policy.
	pub fn with_gbr(self, mode: GbrMode) -> Self {
		self.gbr.set(mode);
		self
	}

	/// Select the integer LP backend.
	pub fn with_ilp_solver(mut self, solver: IlpSolver) -> Self {
		self.ilp_solver = solver;
		self
	}

	/// Register an external integer LP backend and select it.
	pub fn with_pip_solver(mut self, solver: PipSolver) -> Self {
		self.pip_solver = Some(solver);
		self.ilp_solver = IlpSolver::Pip;
		self
	}

	/// The current basis reduction policy.
	pub fn gbr(&self) -> GbrMode {
		self.gbr.get()
	}

	/// Change the basis reduction policy; the search uses this to
	/// suppress repeated reductions and restores the caller's value.
	pub(crate) fn set_gbr(&self, mode: GbrMode) {
		self.gbr.set(mode);
	}

	/// Whether basis reduction may settle for a good first direction.
	pub fn gbr_only_first(&self) -> bool {
		self.gbr_only_first.get()
	}

	/// Flip the early-return flag of the basis reduction.
	pub(crate) fn set_gbr_only_first(&self, value: bool) {
		self.gbr_only_first.set(value);
	}

	/// The selected integer LP backend.
	pub fn ilp_solver(&self) -> IlpSolver {
		self.ilp_solver
	}

	/// The registered external backend, if any.
	pub(crate) fn pip_solver(&self) -> Option<&PipSolver> {
		self.pip_solver.as_ref()
	}
}

impl Debug for Context {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Context")
			.field("gbr", &self.gbr.get())
			.field("gbr_only_first", &self.gbr_only_first.get())
			.field("ilp_solver", &self.ilp_solver)
			.field("pip_solver", &self.pip_solver.is_some())
			.finish()
	}
}

impl Default for Context {
	fn default() -> Self {
		Context::new()
	}
}
