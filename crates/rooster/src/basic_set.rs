//! The basic-set model: a single conjunction of linear equalities and
//! inequalities with integer coefficients.
//!
//! A constraint is stored as a row of length `1 + total_dim` with the
//! constant first: an equality row `e` holds when `e * (1, x) = 0`, an
//! inequality row `i` when `i * (1, x) >= 0`. A basic set may cache a
//! sample vector; a zero-length cached sample records that the set was
//! proved to contain no integer point.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::{
	helpers,
	mat::IntMat,
	tab::{ConIdx, Tableau},
	vec::IntVec,
	Error,
};

/// Outcome of normalizing a single constraint row.
enum RowState {
	/// The row is in normal form and still carries information.
	Ok,
	/// The row holds trivially and can be dropped.
	Trivial,
	/// The row can not be satisfied by any integer point.
	Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A conjunction of linear equality and inequality constraints over
/// integer variables.
pub struct BasicSet {
	/// Number of set dimensions.
	pub(crate) dim: usize,
	/// Number of parameters (must be zero for sampling).
	pub(crate) n_param: usize,
	/// Number of existentially quantified divisions (must be zero for
	/// sampling).
	pub(crate) n_div: usize,
	/// Equality rows, `1 + total_dim` entries each, constant first.
	pub(crate) eqs: Vec<Vec<BigInt>>,
	/// Inequality rows, `1 + total_dim` entries each, constant first.
	pub(crate) ineqs: Vec<Vec<BigInt>>,
	/// Whether the set is known to contain no integer point.
	pub(crate) empty: bool,
	/// Whether implicit equalities have already been made explicit.
	pub(crate) no_implicit: bool,
	/// Cached sample point, if any; a zero-length vector records that
	/// the set was proved empty.
	pub(crate) sample: Option<IntVec>,
}

impl BasicSet {
	/// The unconstrained set of the given dimension.
	pub fn new(dim: usize) -> Self {
		BasicSet::with_space(dim, 0, 0)
	}

	/// The unconstrained set over a space with parameters and divisions.
	///
	/// The sampler rejects sets with parameters or divisions; this
	/// constructor exists so that callers holding such spaces get the
	/// documented error rather than silent misbehavior.
	pub fn with_space(dim: usize, n_param: usize, n_div: usize) -> Self {
		BasicSet {
			dim,
			n_param,
			n_div,
			eqs: Vec::new(),
			ineqs: Vec::new(),
			empty: false,
			no_implicit: false,
			sample: None,
		}
	}

	/// An explicitly empty set of the given dimension.
	pub fn empty_set(dim: usize) -> Self {
		let mut bset = BasicSet::new(dim);
		bset.set_empty();
		bset
	}

	/// The single-point set `{x}` for the (possibly rational) point `x`,
	/// with the point cached as its sample.
	pub fn from_vec(v: IntVec) -> Result<Self, Error> {
		if v.is_empty() {
			return Err(Error::InvalidInput("single-point set of a zero-length vector"));
		}
		let dim = v.len() - 1;
		let mut bset = BasicSet::new(dim);
		for i in (0..dim).rev() {
			let mut row = vec![BigInt::zero(); 1 + dim];
			row[0] = -v.els()[1 + i].clone();
			row[1 + i] = v.els()[0].clone();
			bset.eqs.push(row);
		}
		bset.sample = Some(v);
		Ok(bset)
	}

	/// Number of set dimensions.
	pub fn dim(&self) -> usize {
		self.dim
	}

	/// Total dimension: set dimensions, parameters and divisions.
	pub fn total_dim(&self) -> usize {
		self.dim + self.n_param + self.n_div
	}

	/// Number of equality constraints.
	pub fn n_eq(&self) -> usize {
		self.eqs.len()
	}

	/// Number of inequality constraints.
	pub fn n_ineq(&self) -> usize {
		self.ineqs.len()
	}

	/// The equality rows.
	pub fn eqs(&self) -> &[Vec<BigInt>] {
		&self.eqs
	}

	/// The inequality rows.
	pub fn ineqs(&self) -> &[Vec<BigInt>] {
		&self.ineqs
	}

	/// Add an equality constraint row.
	pub fn add_eq(&mut self, row: Vec<BigInt>) {
		debug_assert_eq!(row.len(), 1 + self.total_dim());
		self.eqs.push(row);
		self.no_implicit = false;
		self.sample = None;
	}

	/// Add an inequality constraint row.
	pub fn add_ineq(&mut self, row: Vec<BigInt>) {
		debug_assert_eq!(row.len(), 1 + self.total_dim());
		self.ineqs.push(row);
		self.no_implicit = false;
		self.sample = None;
	}

	/// Drop the inequality at the given position.
	pub fn drop_inequality(&mut self, i: usize) {
		let _ = self.ineqs.remove(i);
		self.sample = None;
	}

	/// Whether the set is already known to contain no integer point.
	/// This is a flag check only; no computation is performed.
	pub fn fast_is_empty(&self) -> bool {
		self.empty
	}

	/// Mark the set as containing no integer point.
	pub(crate) fn set_empty(&mut self) {
		self.empty = true;
		self.sample = Some(IntVec::empty());
	}

	/// The cached sample, if one is set.
	pub fn cached_sample(&self) -> Option<&IntVec> {
		self.sample.as_ref()
	}

	/// Seed the sample cache, e.g. with the result of an earlier call.
	pub fn set_sample(&mut self, v: IntVec) {
		self.sample = Some(v);
	}

	/// Whether the given point satisfies every constraint. The vector
	/// must have `1 + total_dim` elements under the denominator
	/// convention.
	pub fn contains(&self, v: &IntVec) -> bool {
		if v.len() != 1 + self.total_dim() {
			return false;
		}
		self.eqs.iter().all(|e| helpers::inner_product(e, v.els()).is_zero())
			&& self
				.ineqs
				.iter()
				.all(|i| !helpers::inner_product(i, v.els()).is_negative())
	}

	/// Bring the constraints into a normal form: equalities are reduced
	/// by Gaussian elimination with integer-divisibility checks (an
	/// equality whose coefficients share a factor that does not divide
	/// its constant proves the set empty of integer points), inequality
	/// constants are tightened by the coefficient gcd, parallel
	/// inequalities are merged, and opposite pairs become equalities or
	/// prove emptiness.
	pub fn simplify(mut self) -> Self {
		if self.empty {
			return self;
		}
		loop {
			if self.gauss() {
				return self;
			}
			if !self.merge_ineqs() {
				break;
			}
			if self.empty {
				return self;
			}
		}
		self
	}

	/// Normalize an equality row. A row without coefficients must have a
	/// zero constant; otherwise the gcd of the coefficients must divide
	/// the constant for an integer solution to exist.
	fn normalize_eq_row(row: &mut [BigInt]) -> RowState {
		let g = helpers::gcd_of(&row[1..]);
		if g.is_zero() {
			return if row[0].is_zero() { RowState::Trivial } else { RowState::Empty };
		}
		if !row[0].is_multiple_of(&g) {
			return RowState::Empty;
		}
		if !g.is_one() {
			helpers::scale_down(row, &g);
		}
		RowState::Ok
	}

	/// Normalize an inequality row: divide the coefficients by their gcd
	/// and tighten the constant with a floor division.
	fn normalize_ineq_row(row: &mut [BigInt]) -> RowState {
		let g = helpers::gcd_of(&row[1..]);
		if g.is_zero() {
			return if row[0].is_negative() { RowState::Empty } else { RowState::Trivial };
		}
		if !g.is_one() {
			row[0] = row[0].div_floor(&g);
			helpers::scale_down(&mut row[1..], &g);
		}
		RowState::Ok
	}

	/// Gaussian elimination on the equalities, substituting them into the
	/// inequalities. Returns `true` when the set was proved empty.
	fn gauss(&mut self) -> bool {
		let total = self.total_dim();
		let mut i = 0;
		while i < self.eqs.len() {
			match Self::normalize_eq_row(&mut self.eqs[i]) {
				RowState::Empty => {
					self.set_empty();
					return true;
				}
				RowState::Trivial => {
					let _ = self.eqs.remove(i);
				}
				RowState::Ok => i += 1,
			}
		}
		let mut done = 0;
		for col in 0..total {
			let Some(r) = (done..self.eqs.len()).find(|&r| !self.eqs[r][1 + col].is_zero())
			else {
				continue;
			};
			self.eqs.swap(done, r);
			if self.eqs[done][1 + col].is_negative() {
				helpers::neg_range(&mut self.eqs[done]);
			}
			let pivot_row = self.eqs[done].clone();
			for r2 in 0..self.eqs.len() {
				if r2 == done || self.eqs[r2][1 + col].is_zero() {
					continue;
				}
				helpers::elim(&mut self.eqs[r2], &pivot_row, 1 + col);
				if let RowState::Empty = Self::normalize_eq_row(&mut self.eqs[r2]) {
					self.set_empty();
					return true;
				}
			}
			for q in 0..self.ineqs.len() {
				if self.ineqs[q][1 + col].is_zero() {
					continue;
				}
				// The pivot is positive, so the elimination multiplies the
				// inequality by a positive factor and keeps its direction.
				helpers::elim(&mut self.ineqs[q], &pivot_row, 1 + col);
				if let RowState::Empty = Self::normalize_ineq_row(&mut self.ineqs[q]) {
					self.set_empty();
					return true;
				}
			}
			done += 1;
		}
		self.eqs.retain(|r| !helpers::is_zero(r));
		self.ineqs
			.retain(|r| !(helpers::is_zero(&r[1..]) && !r[0].is_negative()));
		false
	}

	/// Merge parallel inequalities and detect opposite pairs. Returns
	/// `true` when a pair was turned into an equality, in which case the
	/// caller re-runs the Gaussian elimination.
	fn merge_ineqs(&mut self) -> bool {
		let mut q = 0;
		while q < self.ineqs.len() {
			if let RowState::Empty = Self::normalize_ineq_row(&mut self.ineqs[q]) {
				self.set_empty();
				return false;
			}
			if helpers::is_zero(&self.ineqs[q][1..]) {
				let _ = self.ineqs.remove(q);
			} else {
				q += 1;
			}
		}
		let mut new_eq = false;
		let mut i = 0;
		'outer: while i < self.ineqs.len() {
			let mut j = i + 1;
			while j < self.ineqs.len() {
				if self.ineqs[i][1..] == self.ineqs[j][1..] {
					if self.ineqs[j][0] < self.ineqs[i][0] {
						self.ineqs.swap(i, j);
					}
					let _ = self.ineqs.remove(j);
					continue;
				}
				let opposite = self.ineqs[i][1..]
					.iter()
					.zip(&self.ineqs[j][1..])
					.all(|(x, y)| *x == -y);
				if opposite {
					let s = &self.ineqs[i][0] + &self.ineqs[j][0];
					if s.is_negative() {
						self.set_empty();
						return false;
					}
					if s.is_zero() {
						let row = self.ineqs[i].clone();
						let _ = self.ineqs.remove(j);
						let _ = self.ineqs.remove(i);
						self.eqs.push(row);
						new_eq = true;
						continue 'outer;
					}
				}
				j += 1;
			}
			i += 1;
		}
		new_eq
	}

	/// Make implicit equalities explicit: an inequality that can not be
	/// slack anywhere on the set is moved to the equalities.
	pub fn detect_equalities(mut self) -> Result<Self, Error> {
		if self.empty || self.ineqs.is_empty() {
			self.no_implicit = true;
			return Ok(self);
		}
		let mut tab = Tableau::from_basic_set(&self)?;
		if tab.is_empty() {
			self.set_empty();
			return Ok(self);
		}
		tab.detect_implicit_equalities()?;
		let n_eq = self.eqs.len();
		let mut moved = Vec::new();
		for i in (0..self.ineqs.len()).rev() {
			if tab.is_equality(ConIdx::from_usize(n_eq + i)) {
				moved.push(self.ineqs.remove(i));
			}
		}
		for row in moved.into_iter().rev() {
			self.eqs.push(row);
		}
		self.no_implicit = true;
		Ok(self)
	}

	/// The recession cone: every constraint with its constant zeroed,
	/// with implicit equalities surfaced and the equalities reduced.
	pub fn recession_cone(&self) -> Result<BasicSet, Error> {
		let mut cone = BasicSet::with_space(self.dim, self.n_param, self.n_div);
		for eq in &self.eqs {
			let mut row = eq.clone();
			row[0] = BigInt::zero();
			cone.eqs.push(row);
		}
		for ineq in &self.ineqs {
			let mut row = ineq.clone();
			row[0] = BigInt::zero();
			cone.ineqs.push(row);
		}
		let cone = cone.detect_equalities()?;
		Ok(cone.simplify())
	}

	/// Remove the equalities by variable compression.
	///
	/// Returns the reduced set together with the affine embedding `T`
	/// mapping points of the reduced space back to the original one.
	/// When the equalities have no integer solution, the returned set is
	/// marked empty and `T` has no columns.
	pub fn remove_equalities(self) -> Result<(BasicSet, IntMat), Error> {
		let total = self.total_dim();
		if self.eqs.is_empty() {
			return Ok((self, IntMat::identity(1 + total)));
		}
		match IntMat::variable_compression(&self.eqs, total) {
			None => {
				let mut bset = self;
				bset.eqs.clear();
				bset.ineqs.clear();
				bset.set_empty();
				Ok((bset, IntMat::zeroes(1 + total, 0)))
			}
			Some(t) => {
				let reduced = self.preimage(&t)?;
				Ok((reduced, t))
			}
		}
	}

	/// The preimage under the affine map `x = T * (1, x')`: every
	/// constraint row is multiplied by `T` on the right, moving the set
	/// into the space of `x'`.
	pub fn preimage(mut self, t: &IntMat) -> Result<Self, Error> {
		if t.n_row() != 1 + self.total_dim() {
			return Err(Error::InvalidInput("preimage dimension mismatch"));
		}
		debug_assert_eq!(self.n_param + self.n_div, 0);
		if t.n_col() == 0 {
			self.dim = 0;
			self.eqs.clear();
			self.ineqs.clear();
			self.set_empty();
			return Ok(self);
		}
		self.dim = t.n_col() - 1;
		let mapped = |rows: &[Vec<BigInt>]| -> Vec<Vec<BigInt>> {
			rows.iter().map(|r| t.row_product(r)).collect()
		};
		self.eqs = mapped(&self.eqs);
		self.ineqs = mapped(&self.ineqs);
		self.sample = None;
		self.no_implicit = false;
		self.cleanup_trivial();
		Ok(self)
	}

	/// Drop constant-only rows, marking the set empty when one of them is
	/// violated.
	fn cleanup_trivial(&mut self) {
		if self.eqs.iter().any(|r| helpers::is_zero(&r[1..]) && !r[0].is_zero()) {
			self.set_empty();
		}
		if self
			.ineqs
			.iter()
			.any(|r| helpers::is_zero(&r[1..]) && r[0].is_negative())
		{
			self.set_empty();
		}
		self.eqs.retain(|r| !helpers::is_zero(r));
		self.ineqs
			.retain(|r| !(helpers::is_zero(&r[1..]) && !r[0].is_negative()));
	}

	/// Delete `n` dimensions starting at `first` from the space, removing
	/// the corresponding coefficient columns from every constraint.
	pub fn drop_dims(mut self, first: usize, n: usize) -> Result<Self, Error> {
		if first + n > self.total_dim() {
			return Err(Error::InvalidInput("dimension drop out of range"));
		}
		for row in self.eqs.iter_mut().chain(self.ineqs.iter_mut()) {
			let _ = row.drain(1 + first..1 + first + n);
		}
		self.dim -= n;
		self.sample = None;
		self.no_implicit = false;
		self.cleanup_trivial();
		Ok(self)
	}

	/// Drop every inequality whose support intersects the `n` dimensions
	/// starting at `first`.
	pub fn drop_constraints_involving(mut self, first: usize, n: usize) -> Self {
		self.ineqs
			.retain(|r| helpers::first_non_zero(&r[1 + first..1 + first + n]).is_none());
		self.sample = None;
		self
	}
}

impl Display for BasicSet {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "dim {}", self.dim)?;
		if self.empty {
			write!(f, " (empty)")?;
		}
		for eq in &self.eqs {
			write!(f, "\neq   [{}]", eq.iter().format(", "))?;
		}
		for ineq in &self.ineqs {
			write!(f, "\nineq [{}]", ineq.iter().format(", "))?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use expect_test::expect;
	use num_bigint::BigInt;

	use crate::{basic_set::BasicSet, vec::IntVec};

	/// Build a constraint row from machine integers.
	fn row_of(els: &[i64]) -> Vec<BigInt> {
		els.iter().map(|&x| BigInt::from(x)).collect()
	}

	/// Build a basic set from equality and inequality rows.
	fn set_of(dim: usize, eqs: &[&[i64]], ineqs: &[&[i64]]) -> BasicSet {
		let mut bset = BasicSet::new(dim);
		for eq in eqs {
			bset.add_eq(row_of(eq));
		}
		for ineq in ineqs {
			bset.add_ineq(row_of(ineq));
		}
		bset
	}

	#[test]
	fn test_simplify_divisibility_empty() {
		// 2x = 1 has no integer solution.
		let bset = set_of(1, &[&[-1, 2]], &[]).simplify();
		assert!(bset.fast_is_empty());
	}

	#[test]
	fn test_simplify_scales_equality() {
		let bset = set_of(1, &[&[-4, 2]], &[]).simplify();
		assert_eq!(bset.eqs()[0], row_of(&[-2, 1]));
	}

	#[test]
	fn test_simplify_tightens_inequality() {
		// 2x >= 1 tightens to x >= 1.
		let bset = set_of(1, &[], &[&[-1, 2]]).simplify();
		assert_eq!(bset.ineqs()[0], row_of(&[-1, 1]));
	}

	#[test]
	fn test_simplify_opposite_pair_becomes_equality() {
		let bset = set_of(2, &[], &[&[-3, 1, 1], &[3, -1, -1], &[7, 1, 0]]).simplify();
		assert_eq!(bset.n_eq(), 1);
		assert_eq!(bset.n_ineq(), 1);
		assert!(!bset.fast_is_empty());
	}

	#[test]
	fn test_simplify_contradiction() {
		// x >= 1 and x <= 0.
		let bset = set_of(1, &[], &[&[-1, 1], &[0, -1]]).simplify();
		assert!(bset.fast_is_empty());
	}

	#[test]
	fn test_merge_parallel_keeps_tighter() {
		let bset = set_of(1, &[], &[&[-3, 1], &[-5, 1]]).simplify();
		assert_eq!(bset.n_ineq(), 1);
		assert_eq!(bset.ineqs()[0], row_of(&[-5, 1]));
	}

	#[test]
	fn test_detect_equalities() {
		// x >= 0, y >= 0, -x - y >= 0 pins the origin.
		let bset = set_of(2, &[], &[&[0, 1, 0], &[0, 0, 1], &[0, -1, -1]])
			.detect_equalities()
			.unwrap();
		assert_eq!(bset.n_eq() + bset.n_ineq(), 3);
		assert_eq!(bset.n_eq(), 3);
	}

	#[test]
	fn test_recession_cone_of_bounded_set() {
		// 3 <= x <= 5 is bounded, so its cone is the origin.
		let cone = set_of(1, &[], &[&[-3, 1], &[5, -1]])
			.recession_cone()
			.unwrap();
		assert_eq!(cone.n_eq(), 1);
	}

	#[test]
	fn test_remove_equalities_embedding() {
		// x + y = 4: points of the reduced line lift onto the original.
		let (reduced, t) = set_of(2, &[&[-4, 1, 1]], &[&[0, 1, 0]])
			.remove_equalities()
			.unwrap();
		assert_eq!(reduced.n_eq(), 0);
		assert_eq!(reduced.dim(), 1);
		let s = IntVec::from_els(vec![BigInt::from(1), BigInt::from(2)]);
		let lifted = t.product(&s);
		let orig = set_of(2, &[&[-4, 1, 1]], &[]);
		assert!(orig.contains(&lifted));
	}

	#[test]
	fn test_from_vec_roundtrip() {
		let v = IntVec::from_els(vec![BigInt::from(1), BigInt::from(3), BigInt::from(-2)]);
		let bset = BasicSet::from_vec(v.clone()).unwrap();
		assert!(bset.contains(&v));
		assert_eq!(bset.cached_sample(), Some(&v));
	}

	#[test]
	fn test_display_snapshot() {
		let bset = set_of(2, &[&[-4, 1, 1]], &[&[0, 1, 0], &[5, -1, 0]]);
		expect![[r#"
			dim 2
			eq   [-4, 1, 1]
			ineq [0, 1, 0]
			ineq [5, -1, 0]"#]]
		.assert_eq(&bset.to_string());
	}
}
