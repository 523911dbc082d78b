//! The tableau engine driving the sampler: exact rational linear
//! programming over a constraint list with snapshot/rollback.
//!
//! The sampler only needs a narrow interface: minimize an affine form,
//! read the attaining vertex, pin a valid equality, add an inequality,
//! detect implicit equalities, and undo everything back to a snapshot.
//! Queries are answered by a two-phase primal simplex over exact
//! rationals with Bland's anti-cycling rule, re-solved per query. That
//! makes the undo stack trivial: between a snapshot and its rollback the
//! sampler only ever appends constraints, so an undo record is just the
//! kind of the appended row.
//!
//! A tableau can carry a tracked [`BasicSet`] shadow. Every constraint
//! added through the tableau is appended to the shadow in the same
//! order, and rollback removes it from both.

use index_vec::IndexVec;
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use tracing::trace;

use crate::{basic_set::BasicSet, helpers, mat::IntMat, vec::IntVec, Error};

index_vec::define_index_type! {
	/// Identifies a constraint within a [`Tableau`].
	pub struct ConIdx = u32;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The kind of a tableau constraint.
enum ConKind {
	/// The constraint row must evaluate to exactly zero.
	Eq,
	/// The constraint row must evaluate to a non-negative value.
	Ineq,
}

#[derive(Clone, Debug)]
/// A single constraint tracked by the tableau.
struct TabCon {
	/// The affine row, `1 + n_var` entries, constant first.
	row: Vec<BigInt>,
	/// Whether the row is an equality or an inequality.
	kind: ConKind,
	/// Whether an inequality has been detected to hold with equality
	/// everywhere on the set.
	implicit_eq: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// An opaque stamp identifying a state of the tableau; obtained from
/// [`Tableau::snap`] and consumed by [`Tableau::rollback`].
pub struct Snapshot(usize);

#[derive(Clone, Copy, Debug)]
/// A recorded modification that [`Tableau::rollback`] can undo.
enum UndoOp {
	/// An equality row was appended (and mirrored into the shadow).
	AddedEq,
	/// An inequality row was appended (and mirrored into the shadow).
	AddedIneq,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Result of minimizing an affine form over the tableau.
pub enum MinOutcome {
	/// The minimum exists; the reported value is its ceiling.
	Finite(BigInt),
	/// The tableau is rationally infeasible.
	Empty,
	/// The form is unbounded below over the tableau.
	Unbounded,
}

#[derive(Clone, Debug)]
/// Exact outcome of a linear program over the tableau.
pub(crate) enum LpOutcome {
	/// The constraints are infeasible.
	Empty,
	/// The objective is unbounded below.
	Unbounded,
	/// The exact optimum together with an attaining vertex.
	Optimal {
		/// The minimum value of the objective.
		value: BigRational,
		/// A vertex attaining the minimum, normalized.
		point: IntVec,
	},
}

#[derive(Debug)]
/// A simplex tableau over a basic set, with snapshot/rollback.
pub struct Tableau {
	/// Number of variables.
	pub(crate) n_var: usize,
	/// The constraint rows.
	cons: IndexVec<ConIdx, TabCon>,
	/// Whether the constraints are rationally infeasible.
	pub(crate) empty: bool,
	/// The affine basis installed by the sampler, `(1 + n_var)` square.
	pub(crate) basis: Option<IntMat>,
	/// Number of trailing basis directions known to be unbounded.
	pub(crate) n_unbounded: usize,
	/// Number of leading basis directions aligned with equalities.
	/// Scratch for the sampler; only meaningful right after
	/// [`crate::sample::set_initial_basis_with_cone`].
	pub(crate) n_zero: usize,
	/// The tracked shadow set, kept in step with the constraint list.
	bset: Option<BasicSet>,
	/// The most recent vertex visited by a query, if still valid.
	sample: Option<IntVec>,
	/// Undo records for [`Self::rollback`].
	undo: Vec<UndoOp>,
}

impl Tableau {
	/// Build a tableau from the constraints of a basic set and decide
	/// rational feasibility.
	pub fn from_basic_set(bset: &BasicSet) -> Result<Self, Error> {
		let n_var = bset.total_dim();
		let mut cons = IndexVec::new();
		for eq in bset.eqs() {
			let _ = cons.push(TabCon {
				row: eq.clone(),
				kind: ConKind::Eq,
				implicit_eq: false,
			});
		}
		for ineq in bset.ineqs() {
			let _ = cons.push(TabCon {
				row: ineq.clone(),
				kind: ConKind::Ineq,
				implicit_eq: false,
			});
		}
		let mut tab = Tableau {
			n_var,
			cons,
			empty: bset.fast_is_empty(),
			basis: None,
			n_unbounded: 0,
			n_zero: 0,
			bset: None,
			sample: None,
			undo: Vec::new(),
		};
		if !tab.empty {
			match tab.lp_min(&vec![BigInt::zero(); 1 + n_var])? {
				LpOutcome::Empty => tab.empty = true,
				LpOutcome::Optimal { point, .. } => tab.sample = Some(point),
				LpOutcome::Unbounded => {
					return Err(Error::InternalInvariant("feasibility check came back unbounded"))
				}
			}
		}
		Ok(tab)
	}

	/// Number of variables.
	pub fn n_var(&self) -> usize {
		self.n_var
	}

	/// Whether the tableau is rationally infeasible.
	pub fn is_empty(&self) -> bool {
		self.empty
	}

	/// Number of constraints.
	pub fn n_con(&self) -> usize {
		self.cons.len()
	}

	/// Number of equality rows (not counting detected implicit
	/// equalities). Inequality `i` of the underlying set has constraint
	/// index `n_eq() + i` as long as no rows have been added.
	pub fn n_eq(&self) -> usize {
		self.cons.iter().filter(|c| c.kind == ConKind::Eq).count()
	}

	/// Attach an owned shadow set. The shadow must list the same
	/// constraints in the same order as the tableau; constraints added
	/// later through the tableau keep it in step.
	pub fn track_bset(&mut self, bset: BasicSet) {
		debug_assert_eq!(bset.n_eq() + bset.n_ineq(), self.cons.len());
		self.bset = Some(bset);
	}

	/// The tracked shadow set, if one is attached.
	pub fn peek_bset(&self) -> Option<&BasicSet> {
		self.bset.as_ref()
	}

	/// Grow the constraint capacity by `extra` rows.
	pub fn reserve_rows(&mut self, extra: usize) {
		self.cons.raw.reserve(extra);
	}

	/// Take a snapshot of the current state.
	pub fn snap(&self) -> Snapshot {
		Snapshot(self.undo.len())
	}

	/// Restore the exact state at the given snapshot, removing every
	/// constraint added since from the tableau and from the shadow.
	pub fn rollback(&mut self, snap: Snapshot) {
		while self.undo.len() > snap.0 {
			match self.undo.pop() {
				Some(UndoOp::AddedEq) => {
					let _ = self.cons.raw.pop();
					if let Some(bset) = &mut self.bset {
						let _ = bset.eqs.pop();
					}
				}
				Some(UndoOp::AddedIneq) => {
					let _ = self.cons.raw.pop();
					if let Some(bset) = &mut self.bset {
						let _ = bset.ineqs.pop();
					}
				}
				None => break,
			}
		}
		self.sample = None;
	}

	/// Add an equality that is known to hold on the current feasible
	/// region (the sampler pins values it has bracketed).
	pub fn add_valid_eq(&mut self, row: &[BigInt]) {
		debug_assert_eq!(row.len(), 1 + self.n_var);
		let _ = self.cons.push(TabCon {
			row: row.to_vec(),
			kind: ConKind::Eq,
			implicit_eq: false,
		});
		if let Some(bset) = &mut self.bset {
			bset.eqs.push(row.to_vec());
		}
		self.undo.push(UndoOp::AddedEq);
		self.sample = None;
	}

	/// Add an inequality row.
	pub fn add_ineq(&mut self, row: &[BigInt]) {
		debug_assert_eq!(row.len(), 1 + self.n_var);
		let _ = self.cons.push(TabCon {
			row: row.to_vec(),
			kind: ConKind::Ineq,
			implicit_eq: false,
		});
		if let Some(bset) = &mut self.bset {
			bset.ineqs.push(row.to_vec());
		}
		self.undo.push(UndoOp::AddedIneq);
		self.sample = None;
	}

	/// Minimize the affine form `row * (1, x)` over the tableau. On a
	/// finite minimum the ceiling of the value is returned and the
	/// attaining vertex becomes the current sample.
	pub fn min(&mut self, row: &[BigInt]) -> Result<MinOutcome, Error> {
		match self.lp_min(row)? {
			LpOutcome::Empty => {
				self.sample = None;
				Ok(MinOutcome::Empty)
			}
			LpOutcome::Unbounded => Ok(MinOutcome::Unbounded),
			LpOutcome::Optimal { value, point } => {
				self.sample = Some(point);
				Ok(MinOutcome::Finite(value.ceil().to_integer()))
			}
		}
	}

	/// Whether the current sample is an integer point.
	pub fn sample_is_integer(&self) -> bool {
		self.sample.as_ref().is_some_and(IntVec::is_integer)
	}

	/// A rational point of the feasible region: the current sample, or a
	/// fresh vertex when no query has been answered since the last
	/// modification.
	pub fn get_sample_value(&mut self) -> Result<IntVec, Error> {
		if let Some(sample) = &self.sample {
			return Ok(sample.clone());
		}
		match self.lp_min(&vec![BigInt::zero(); 1 + self.n_var])? {
			LpOutcome::Optimal { point, .. } => {
				self.sample = Some(point.clone());
				Ok(point)
			}
			_ => Err(Error::InternalInvariant("sample requested from an empty tableau")),
		}
	}

	/// Whether the constraint is an equality, either by kind or because
	/// it was detected to be implicit.
	pub fn is_equality(&self, idx: ConIdx) -> bool {
		let con = &self.cons[idx];
		con.kind == ConKind::Eq || con.implicit_eq
	}

	/// Detect inequalities that hold with equality everywhere on the
	/// feasible region and flag them.
	pub fn detect_implicit_equalities(&mut self) -> Result<(), Error> {
		if self.empty {
			return Ok(());
		}
		for idx in 0..self.cons.len() {
			let i = ConIdx::from_usize(idx);
			if self.is_equality(i) {
				continue;
			}
			let mut neg = self.cons[i].row.clone();
			helpers::neg_range(&mut neg);
			match self.lp_min(&neg)? {
				LpOutcome::Optimal { value, .. } if value.is_zero() => {
					trace!(con = idx, "inequality is an implicit equality");
					self.cons[i].implicit_eq = true;
				}
				LpOutcome::Empty => {
					self.empty = true;
					self.sample = None;
					return Ok(());
				}
				_ => {}
			}
		}
		Ok(())
	}

	/// An independent subset of the equality rows (explicit and
	/// detected), coefficient part only. The row count is the rank of
	/// the equality system; a full-rank system is reported as the
	/// identity.
	pub fn equalities(&self) -> IntMat {
		let n = self.n_var;
		if self.empty {
			return IntMat::zeroes(0, n);
		}
		let mut reduced: Vec<Vec<BigInt>> = Vec::new();
		let mut out: Vec<Vec<BigInt>> = Vec::new();
		for con in self.cons.iter() {
			if con.kind != ConKind::Eq && !con.implicit_eq {
				continue;
			}
			let mut r = con.row[1..].to_vec();
			loop {
				let Some(pos) = helpers::first_non_zero(&r) else { break };
				match reduced
					.iter()
					.find(|red| helpers::first_non_zero(red) == Some(pos))
				{
					Some(red) => helpers::elim(&mut r, red, pos),
					None => {
						out.push(con.row[1..].to_vec());
						reduced.push(r);
						break;
					}
				}
			}
		}
		if out.len() == n {
			return IntMat::identity(n);
		}
		IntMat::from_rows(out, n)
	}

	/// The rank of the equality system.
	pub fn n_eq_rank(&self) -> usize {
		self.equalities().n_row()
	}

	/// Exact minimization of `obj * (1, x)` over the constraints: a
	/// two-phase primal simplex with Bland's rule. Free variables are
	/// split into differences of non-negative ones, every inequality
	/// gets a slack, and phase one starts from an artificial basis.
	pub(crate) fn lp_min(&self, obj: &[BigInt]) -> Result<LpOutcome, Error> {
		debug_assert_eq!(obj.len(), 1 + self.n_var);
		if self.empty {
			return Ok(LpOutcome::Empty);
		}
		let n = self.n_var;
		let m = self.cons.len();
		let n_ineq = self.cons.iter().filter(|c| c.kind == ConKind::Ineq).count();
		let n_struct = 2 * n + n_ineq;
		let n_cols = n_struct + m;
		let rhs = n_cols;

		let mut rows: Vec<Vec<BigRational>> = Vec::with_capacity(m);
		let mut slack = 0;
		for con in self.cons.iter() {
			let mut r = vec![BigRational::zero(); n_cols + 1];
			for j in 0..n {
				let c = BigRational::from_integer(con.row[1 + j].clone());
				r[n + j] = -c.clone();
				r[j] = c;
			}
			if con.kind == ConKind::Ineq {
				r[2 * n + slack] = -BigRational::one();
				slack += 1;
			}
			r[rhs] = BigRational::from_integer(-con.row[0].clone());
			if r[rhs].is_negative() {
				for x in r.iter_mut() {
					*x = -x.clone();
				}
			}
			rows.push(r);
		}
		for (i, r) in rows.iter_mut().enumerate() {
			r[n_struct + i] = BigRational::one();
		}
		let mut basis: Vec<usize> = (n_struct..n_cols).collect();

		// Phase one: minimize the sum of the artificials.
		let mut cost = vec![BigRational::zero(); n_cols + 1];
		for (j, c) in cost.iter_mut().enumerate() {
			let col_sum = rows.iter().fold(BigRational::zero(), |acc, r| acc + &r[j]);
			*c = if (n_struct..n_cols).contains(&j) {
				BigRational::one() - col_sum
			} else {
				-col_sum
			};
		}
		if !Self::pivot_to_optimum(&mut rows, &mut cost, &mut basis, n_cols, rhs) {
			return Err(Error::InternalInvariant("phase one of the simplex is unbounded"));
		}
		if !cost[rhs].is_zero() {
			return Ok(LpOutcome::Empty);
		}
		// Drive remaining artificials out of the basis where possible;
		// rows that cannot be pivoted are redundant and stay inert.
		for i in 0..m {
			if basis[i] < n_struct {
				continue;
			}
			if let Some(j) = (0..n_struct).find(|&j| !rows[i][j].is_zero()) {
				Self::pivot(&mut rows, &mut cost, &mut basis, i, j);
			}
		}

		// Phase two: minimize the requested objective.
		let objective: Vec<BigRational> = (0..n_cols)
			.map(|j| {
				if j < n {
					BigRational::from_integer(obj[1 + j].clone())
				} else if j < 2 * n {
					BigRational::from_integer(-obj[1 + (j - n)].clone())
				} else {
					BigRational::zero()
				}
			})
			.collect();
		for (j, c) in cost.iter_mut().enumerate() {
			let carried = basis
				.iter()
				.enumerate()
				.fold(BigRational::zero(), |acc, (i, &b)| acc + &objective[b] * &rows[i][j]);
			*c = if j < n_cols { objective[j].clone() - carried } else { -carried };
		}
		if !Self::pivot_to_optimum(&mut rows, &mut cost, &mut basis, n_struct, rhs) {
			return Ok(LpOutcome::Unbounded);
		}

		let mut vals = vec![BigRational::zero(); n_struct];
		for (i, &b) in basis.iter().enumerate() {
			if b < n_struct {
				vals[b] = rows[i][rhs].clone();
			}
		}
		let x: Vec<BigRational> = (0..n).map(|j| &vals[j] - &vals[n + j]).collect();
		let den = x.iter().fold(BigInt::one(), |l, v| l.lcm(v.denom()));
		let mut els = Vec::with_capacity(1 + n);
		els.push(den.clone());
		let scale = BigRational::from_integer(den);
		for v in &x {
			els.push((v * &scale).to_integer());
		}
		let value = x
			.iter()
			.enumerate()
			.fold(BigRational::from_integer(obj[0].clone()), |acc, (j, v)| {
				acc + BigRational::from_integer(obj[1 + j].clone()) * v
			});
		Ok(LpOutcome::Optimal {
			value,
			point: IntVec::from_els(els).normalize(),
		})
	}

	/// Run Bland-rule pivots until the cost row has no negative entry
	/// among the first `enter_limit` columns. Returns false when the
	/// objective is unbounded below.
	fn pivot_to_optimum(
		rows: &mut [Vec<BigRational>],
		cost: &mut [BigRational],
		basis: &mut [usize],
		enter_limit: usize,
		rhs: usize,
	) -> bool {
		loop {
			let Some(enter) = (0..enter_limit).find(|&j| cost[j].is_negative()) else {
				return true;
			};
			let mut leave: Option<(usize, BigRational)> = None;
			for (i, row) in rows.iter().enumerate() {
				if !row[enter].is_positive() {
					continue;
				}
				let ratio = &row[rhs] / &row[enter];
				let better = match &leave {
					None => true,
					Some((li, lr)) => ratio < *lr || (ratio == *lr && basis[i] < basis[*li]),
				};
				if better {
					leave = Some((i, ratio));
				}
			}
			let Some((leave, _)) = leave else {
				return false;
			};
			Self::pivot(rows, cost, basis, leave, enter);
		}
	}

	/// Pivot the tableau so that column `c` enters the basis at row `r`.
	fn pivot(
		rows: &mut [Vec<BigRational>],
		cost: &mut [BigRational],
		basis: &mut [usize],
		r: usize,
		c: usize,
	) {
		let p = rows[r][c].clone();
		for x in rows[r].iter_mut() {
			*x /= &p;
		}
		let pivot_row = rows[r].clone();
		for (i, row) in rows.iter_mut().enumerate() {
			if i == r || row[c].is_zero() {
				continue;
			}
			let f = row[c].clone();
			for (x, pr) in row.iter_mut().zip(&pivot_row) {
				let t = &f * pr;
				*x -= t;
			}
		}
		if !cost[c].is_zero() {
			let f = cost[c].clone();
			for (x, pr) in cost.iter_mut().zip(&pivot_row) {
				let t = &f * pr;
				*x -= t;
			}
		}
		basis[r] = c;
	}
}

#[cfg(test)]
mod tests {
	use num_bigint::BigInt;

	use crate::{
		basic_set::BasicSet,
		tab::{ConIdx, MinOutcome, Tableau},
	};

	/// Build a constraint row from machine integers.
	fn row_of(els: &[i64]) -> Vec<BigInt> {
		els.iter().map(|&x| BigInt::from(x)).collect()
	}

	/// A basic set from inequality rows only.
	fn set_of_ineqs(dim: usize, ineqs: &[&[i64]]) -> BasicSet {
		let mut bset = BasicSet::new(dim);
		for ineq in ineqs {
			bset.add_ineq(row_of(ineq));
		}
		bset
	}

	#[test]
	fn test_min_rounds_up() {
		// 2x >= 3 has rational minimum 3/2; the reported value is 2.
		let bset = set_of_ineqs(1, &[&[-3, 2]]);
		let mut tab = Tableau::from_basic_set(&bset).unwrap();
		assert_eq!(tab.min(&row_of(&[0, 1])).unwrap(), MinOutcome::Finite(BigInt::from(2)));
		assert!(!tab.sample_is_integer());
	}

	#[test]
	fn test_min_detects_unbounded() {
		let bset = set_of_ineqs(1, &[&[0, 1]]);
		let mut tab = Tableau::from_basic_set(&bset).unwrap();
		assert_eq!(tab.min(&row_of(&[0, -1])).unwrap(), MinOutcome::Unbounded);
		assert_eq!(tab.min(&row_of(&[0, 1])).unwrap(), MinOutcome::Finite(BigInt::from(0)));
	}

	#[test]
	fn test_infeasible_at_construction() {
		let bset = set_of_ineqs(1, &[&[-1, 1], &[0, -1]]);
		let tab = Tableau::from_basic_set(&bset).unwrap();
		assert!(tab.is_empty());
	}

	#[test]
	fn test_pin_and_rollback() {
		// The square 0 <= x, y <= 3.
		let bset = set_of_ineqs(2, &[&[0, 1, 0], &[3, -1, 0], &[0, 0, 1], &[3, 0, -1]]);
		let mut tab = Tableau::from_basic_set(&bset).unwrap();
		tab.track_bset(bset);
		let snap = tab.snap();
		tab.add_valid_eq(&row_of(&[-2, 1, 0]));
		assert_eq!(tab.n_con(), 5);
		assert_eq!(tab.peek_bset().unwrap().n_eq(), 1);
		assert_eq!(tab.min(&row_of(&[0, 1, 0])).unwrap(), MinOutcome::Finite(BigInt::from(2)));
		tab.rollback(snap);
		assert_eq!(tab.n_con(), 4);
		assert_eq!(tab.peek_bset().unwrap().n_eq(), 0);
		assert_eq!(tab.min(&row_of(&[0, 1, 0])).unwrap(), MinOutcome::Finite(BigInt::from(0)));
	}

	#[test]
	fn test_pin_makes_empty() {
		let bset = set_of_ineqs(1, &[&[0, 1], &[3, -1]]);
		let mut tab = Tableau::from_basic_set(&bset).unwrap();
		tab.add_ineq(&row_of(&[-7, 1]));
		assert_eq!(tab.min(&row_of(&[0, 1])).unwrap(), MinOutcome::Empty);
	}

	#[test]
	fn test_detect_implicit_equalities() {
		// x >= 0 and -x >= 0 force x = 0; y is free in [0, 2].
		let bset = set_of_ineqs(2, &[&[0, 1, 0], &[0, -1, 0], &[0, 0, 1], &[2, 0, -1]]);
		let mut tab = Tableau::from_basic_set(&bset).unwrap();
		tab.detect_implicit_equalities().unwrap();
		assert!(tab.is_equality(ConIdx::from_usize(0)));
		assert!(tab.is_equality(ConIdx::from_usize(1)));
		assert!(!tab.is_equality(ConIdx::from_usize(2)));
		assert_eq!(tab.n_eq_rank(), 1);
	}

	#[test]
	fn test_sample_of_square_is_vertex() {
		let bset = set_of_ineqs(2, &[&[0, 1, 0], &[3, -1, 0], &[0, 0, 1], &[3, 0, -1]]);
		let mut tab = Tableau::from_basic_set(&bset).unwrap();
		let s = tab.get_sample_value().unwrap();
		assert!(s.is_integer());
		assert_eq!(s.len(), 3);
	}
}
