//! The sampling core: decide whether a basic set contains an integer
//! point and return one if it does.
//!
//! The dispatcher strips fast paths (emptiness, cached samples,
//! zero/one-dimensional sets, equalities) and then splits the set into a
//! bounded part and its recession cone. The bounded part is searched
//! depth-first along the directions of a (reduced) lattice basis inside
//! a tableau with snapshot/rollback; the unbounded part is handled by a
//! rounding construction that turns any rational point of a shifted
//! cone into an integer point of the set.
//!
//! A zero-length [`IntVec`] result always means "no integer point";
//! errors are reserved for broken preconditions and backend failures.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use tracing::{debug, trace};

use crate::{
	basic_set::BasicSet,
	context::{Context, GbrMode, IlpSolver},
	gbr::compute_reduced_basis,
	helpers,
	mat::IntMat,
	tab::{ConIdx, MinOutcome, Snapshot, Tableau},
	vec::IntVec,
	Error,
};

/// Restores the basis-reduction policy of a context when dropped, so
/// that every exit path of the search, errors included, puts back the
/// caller's configuration.
struct GbrGuard<'a> {
	/// The context whose policy is restored.
	ctx: &'a Context,
	/// The policy to restore.
	saved: GbrMode,
}

impl<'a> GbrGuard<'a> {
	/// Capture the current policy of `ctx`.
	fn new(ctx: &'a Context) -> Self {
		GbrGuard {
			ctx,
			saved: ctx.gbr(),
		}
	}
}

impl Drop for GbrGuard<'_> {
	fn drop(&mut self) {
		self.ctx.set_gbr(self.saved);
	}
}

impl BasicSet {
	/// Find an integer point in the set, if any.
	///
	/// The set must have no parameters and no division variables.
	/// Returns the zero-length vector when the set contains no integer
	/// point; otherwise the result has denominator 1 and satisfies every
	/// constraint.
	pub fn sample_vec(self, ctx: &Context) -> Result<IntVec, Error> {
		basic_set_sample(self, false, ctx)
	}

	/// Find an integer point in a set the caller asserts to be bounded.
	///
	/// Skips the recession-cone analysis; the caller is responsible for
	/// the boundedness of the input.
	pub fn sample_bounded(self, ctx: &Context) -> Result<IntVec, Error> {
		basic_set_sample(self, true, ctx)
	}
}

/// The top-level dispatcher behind [`BasicSet::sample_vec`] and
/// [`BasicSet::sample_bounded`].
fn basic_set_sample(mut bset: BasicSet, bounded: bool, ctx: &Context) -> Result<IntVec, Error> {
	if bset.fast_is_empty() {
		return Ok(IntVec::empty());
	}
	if bset.n_param != 0 {
		return Err(Error::InvalidInput("sampling a set with parameters"));
	}
	if bset.n_div != 0 {
		return Err(Error::InvalidInput("sampling a set with division variables"));
	}
	let dim = bset.dim();
	if let Some(cached) = bset.cached_sample() {
		if cached.len() == 1 + dim && bset.contains(cached) {
			debug!("cached sample still satisfies the set");
			return Ok(cached.clone());
		}
	}
	bset.sample = None;
	if bset.n_eq() > 0 {
		return sample_eq(bset, ctx, |b, c| basic_set_sample(b, bounded, c));
	}
	if dim == 0 {
		return Ok(IntVec::zero_point(0));
	}
	if dim == 1 {
		return interval_sample(bset);
	}
	match ctx.ilp_solver() {
		IlpSolver::Pip => pip_sample(bset, ctx),
		IlpSolver::Gbr if bounded => sample_bounded(bset, ctx),
		IlpSolver::Gbr => gbr_sample(bset, ctx),
	}
}

/// Sample a one-dimensional set: after simplification the set is either
/// empty, a single integer given by a unit equality, or an interval
/// whose tightest lower (or upper) bound is the candidate.
fn interval_sample(bset: BasicSet) -> Result<IntVec, Error> {
	let bset = bset.simplify();
	if bset.fast_is_empty() {
		return Ok(IntVec::empty());
	}
	if bset.n_eq() == 0 && bset.n_ineq() == 0 {
		return Ok(IntVec::zero_point(bset.total_dim()));
	}
	if bset.n_eq() > 0 {
		if bset.n_eq() != 1 || bset.n_ineq() != 0 {
			return Err(Error::InternalInvariant("interval not reduced by simplification"));
		}
		let eq = &bset.eqs()[0];
		let x = if eq[1].is_one() {
			-eq[0].clone()
		} else if (-&eq[1]).is_one() {
			eq[0].clone()
		} else {
			return Err(Error::InternalInvariant("interval equality with non-unit coefficient"));
		};
		return Ok(IntVec::from_els(vec![BigInt::one(), x]));
	}
	let first = &bset.ineqs()[0];
	let x = if first[1].is_one() {
		-first[0].clone()
	} else {
		first[0].clone()
	};
	let candidate = IntVec::from_els(vec![BigInt::one(), x]);
	for ineq in &bset.ineqs()[1..] {
		if helpers::inner_product(ineq, candidate.els()).is_negative() {
			return Ok(IntVec::empty());
		}
	}
	Ok(candidate)
}

/// Sample a set with equalities by removing them, sampling the reduced
/// set with `recurse`, and lifting the result back through the affine
/// embedding. Emptiness is preserved in both directions.
fn sample_eq<F>(bset: BasicSet, ctx: &Context, recurse: F) -> Result<IntVec, Error>
where
	F: Fn(BasicSet, &Context) -> Result<IntVec, Error>,
{
	let (reduced, t) = bset.remove_equalities()?;
	let sample = recurse(reduced, ctx)?;
	if sample.is_empty() {
		return Ok(sample);
	}
	Ok(t.product(&sample))
}

/// A maximal linearly independent subset of the inequality rows,
/// prefixed with the affine row `(1, 0, ..., 0)`. Candidates are row
/// reduced under their first non-zero position; ties are broken by
/// insertion order.
fn independent_bounds(bset: &BasicSet) -> IntMat {
	let dim = bset.total_dim();
	let mut rows: Vec<Vec<BigInt>> = Vec::with_capacity(1 + dim);
	let mut affine = vec![BigInt::zero(); 1 + dim];
	affine[0] = BigInt::one();
	rows.push(affine);
	if bset.n_ineq() == 0 {
		return IntMat::from_rows(rows, 1 + dim);
	}
	let mut dirs: Vec<Vec<BigInt>> = vec![bset.ineqs()[0][1..].to_vec()];
	rows.push(bset.ineqs()[0].clone());
	for j in 1..bset.n_ineq() {
		if dirs.len() >= dim {
			break;
		}
		let mut c = bset.ineqs()[j][1..].to_vec();
		let Some(mut pos) = helpers::first_non_zero(&c) else {
			continue;
		};
		let mut i = 0;
		let mut dead = false;
		while i < dirs.len() {
			match helpers::first_non_zero(&dirs[i]) {
				None => {}
				Some(pos_i) if pos_i < pos => {}
				Some(pos_i) if pos_i > pos => break,
				Some(_) => {
					helpers::elim(&mut c, &dirs[i], pos);
					match helpers::first_non_zero(&c) {
						None => {
							dead = true;
							break;
						}
						Some(p) => pos = p,
					}
				}
			}
			i += 1;
		}
		if dead {
			continue;
		}
		dirs.insert(i, c);
		rows.push(bset.ineqs()[j].clone());
	}
	IntMat::from_rows(rows, 1 + dim)
}

/// Skew the set into the positive orthant and project out its lineality
/// space.
///
/// A maximal independent set of bounds is brought onto the leading
/// dimensions by a unimodular transformation; dimensions past the
/// bounded rank appear in no constraint afterwards and are dropped from
/// the transformation (the value zero is plugged in when mapping
/// samples back). The set must have no parameters, divisions or
/// equalities.
pub fn skew_to_positive_orthant(mut bset: BasicSet) -> Result<(BasicSet, IntMat), Error> {
	if bset.n_param != 0 || bset.n_div != 0 {
		return Err(Error::InvalidInput("skewing a set with parameters or divisions"));
	}
	if bset.n_eq() != 0 {
		return Err(Error::InvalidInput("skewing a set with equalities"));
	}
	let old_dim = bset.total_dim();
	// Hoist (multiples of) unit rows to the front.
	let mut hoisted = 0;
	for i in 0..bset.n_ineq() {
		let Some(pos) = helpers::first_non_zero(&bset.ineqs[i][1..]) else {
			continue;
		};
		if helpers::first_non_zero(&bset.ineqs[i][1 + pos + 1..]).is_some() {
			continue;
		}
		bset.ineqs.swap(i, hoisted);
		hoisted += 1;
	}
	let bounds = independent_bounds(&bset);
	let new_dim = bounds.n_row() - 1;
	let (_h, u, _q) = bounds.left_hermite(true);
	let u = u.drop_cols(1 + new_dim, old_dim - new_dim);
	let bset = bset.preimage(&u)?;
	Ok((bset, u))
}

/// Sample a set that is known to be bounded: after the fast paths, build
/// a tableau, track the set in it, surface implicit equalities and run
/// the depth-first search.
pub(crate) fn sample_bounded(bset: BasicSet, ctx: &Context) -> Result<IntVec, Error> {
	if bset.fast_is_empty() {
		return Ok(IntVec::empty());
	}
	let dim = bset.total_dim();
	if dim == 0 {
		return Ok(IntVec::zero_point(0));
	}
	if dim == 1 {
		return interval_sample(bset);
	}
	if bset.n_eq() > 0 {
		return sample_eq(bset, ctx, sample_bounded);
	}
	let mut tab = Tableau::from_basic_set(&bset)?;
	if tab.is_empty() {
		return Ok(IntVec::empty());
	}
	let no_implicit = bset.no_implicit;
	tab.track_bset(bset);
	if !no_implicit {
		tab.detect_implicit_equalities()?;
	}
	tab_sample(&mut tab, ctx)
}

/// An initial basis for a bounded tableau: the identity when there are
/// no equalities (or nothing but equalities), and otherwise a Hermite
/// basis whose leading directions are aligned with the equalities, so
/// that their ranges during the search are singletons.
fn initial_basis(tab: &Tableau) -> Result<IntMat, Error> {
	let n_var = tab.n_var();
	if tab.is_empty() {
		return Ok(IntMat::identity(1 + n_var));
	}
	let eq = tab.equalities();
	if eq.n_row() == 0 || eq.n_row() == n_var {
		return Ok(IntMat::identity(1 + n_var));
	}
	let (_h, _u, q) = eq.left_hermite(false);
	Ok(q.lin_to_aff())
}

/// Depth-first search for an integer point over the directions of the
/// tableau's basis.
///
/// The basis is installed on demand ([`initial_basis`]) unless the
/// caller has already set one. When `tab.n_unbounded > 0` the caller
/// must have installed a basis with the unbounded directions last and
/// added shifted copies of the constraints involving them (see
/// [`set_initial_basis_with_cone`]), so that any feasible rational
/// value in those directions can be rounded up.
///
/// At each level the range of the current direction is bracketed with
/// two minimizations; when the range holds more than one integer, basis
/// reduction may fire (at most once per level per descent, subject to
/// the [`GbrMode`] policy of the context). The chosen value is pinned
/// with a valid equality and the search descends, rolling the tableau
/// back to the level's snapshot on backtrack. `tab.n_zero` is treated
/// as scratch and clobbered.
pub fn tab_sample(tab: &mut Tableau, ctx: &Context) -> Result<IntVec, Error> {
	if tab.is_empty() {
		return Ok(IntVec::empty());
	}
	if tab.basis.is_none() {
		tab.basis = Some(initial_basis(tab)?);
	}
	let dim = tab.n_var();
	{
		let basis = tab.basis.as_ref().unwrap();
		if basis.n_row() != 1 + dim || basis.n_col() != 1 + dim {
			return Err(Error::InternalInvariant("basis of unexpected shape"));
		}
	}

	if tab.n_unbounded == dim {
		// Any rational point can be rounded up within the basis.
		let sample = tab.get_sample_value()?;
		let basis = tab.basis.as_ref().unwrap();
		let sample = basis.product(&sample).ceil();
		return basis.inverse_product(&sample);
	}

	let _guard = GbrGuard::new(ctx);
	tab.reserve_rows(dim + 1);
	let mut min = vec![BigInt::zero(); dim];
	let mut max = vec![BigInt::zero(); dim];
	let mut snap = vec![Snapshot::default(); dim];

	let mut level: isize = 0;
	let mut init = true;
	let mut reduced = false;

	while level >= 0 {
		let l = level as usize;
		let mut empty = false;
		if init {
			let row = tab.basis.as_ref().unwrap().row(1 + l).to_vec();
			match tab.min(&row)? {
				MinOutcome::Empty => empty = true,
				MinOutcome::Unbounded => {
					return Err(Error::InternalInvariant("unbounded direction in bounded search"))
				}
				MinOutcome::Finite(v) => min[l] = v,
			}
			if !empty && tab.sample_is_integer() {
				break;
			}
			let mut neg = row;
			helpers::neg_range(&mut neg[1..]);
			match tab.min(&neg)? {
				MinOutcome::Empty => empty = true,
				MinOutcome::Unbounded => {
					return Err(Error::InternalInvariant("unbounded direction in bounded search"))
				}
				MinOutcome::Finite(v) => max[l] = -v,
			}
			if !empty && tab.sample_is_integer() {
				break;
			}
			if !empty && !reduced && ctx.gbr() != GbrMode::Never && min[l] < max[l] {
				if ctx.gbr() == GbrMode::Once {
					ctx.set_gbr(GbrMode::Never);
				}
				tab.n_zero = l;
				let only_first = ctx.gbr_only_first();
				ctx.set_gbr_only_first(ctx.gbr() == GbrMode::Always);
				let result = compute_reduced_basis(tab, ctx);
				ctx.set_gbr_only_first(only_first);
				result?;
				reduced = true;
				continue;
			}
			reduced = false;
			snap[l] = tab.snap();
		} else {
			min[l] = &min[l] + 1;
		}
		if empty || min[l] > max[l] {
			trace!(level = l, "backtracking");
			level -= 1;
			init = false;
			if level >= 0 {
				tab.rollback(snap[level as usize]);
			}
			continue;
		}
		trace!(level = l, value = %min[l], "pinning direction");
		let mut row = tab.basis.as_ref().unwrap().row(1 + l).to_vec();
		row[0] = -min[l].clone();
		tab.add_valid_eq(&row);
		if l + tab.n_unbounded < dim - 1 {
			level += 1;
			init = true;
			continue;
		}
		break;
	}

	if level < 0 {
		return Ok(IntVec::empty());
	}
	let sample = tab.get_sample_value()?;
	if tab.n_unbounded > 0 && !sample.is_integer() {
		let basis = tab.basis.as_ref().unwrap();
		let sample = basis.product(&sample).ceil();
		return basis.inverse_product(&sample);
	}
	Ok(sample)
}

/// Any rational point of the set, as a normalized vector.
fn rational_sample(bset: BasicSet) -> Result<IntVec, Error> {
	let mut tab = Tableau::from_basic_set(&bset)?;
	tab.get_sample_value()
}

/// Plug the values of `sample` into the leading coordinates of the set
/// and drop those coordinates.
fn plug_in(bset: BasicSet, sample: &IntVec) -> Result<BasicSet, Error> {
	let total = bset.total_dim();
	let k = sample.len();
	let n_col = 1 + total - (k - 1);
	let mut t = IntMat::zeroes(1 + total, n_col);
	for (i, el) in sample.els().iter().enumerate() {
		t.set(i, 0, el.clone());
	}
	for i in 0..n_col - 1 {
		t.set(k + i, 1 + i, BigInt::one());
	}
	bset.preimage(&t)
}

/// Shift the constraints of a linear cone so that the unit cube at any
/// point of the result lies inside the affine cone `vec + cone`.
///
/// For a ray constraint `<a, x> >= 0` and the rational point `v/d`, the
/// shifted constraint is
/// `<a, x> - ceil(<a, v> / d) + sum of the negative entries of a >= 0`,
/// which avoids rescaling the constraints of the affine cone.
fn shift_cone(cone: BasicSet, vec: &IntVec) -> Result<BasicSet, Error> {
	if cone.n_eq() != 0 {
		return Err(Error::InternalInvariant("shifting a cone with equalities"));
	}
	let total = cone.total_dim();
	debug_assert_eq!(1 + total, vec.len());
	let mut shift = BasicSet::new(total);
	for ineq in cone.ineqs() {
		let b = helpers::inner_product(&ineq[1..], &vec.els()[1..]);
		let mut constant = -b.div_ceil(vec.den());
		for x in &ineq[1..] {
			if x.is_negative() {
				constant += x;
			}
		}
		let mut row = ineq.clone();
		row[0] = constant;
		shift.add_ineq(row);
	}
	Ok(shift)
}

/// Promote a rational point of a (transformed) set into an integer
/// point, given the recession cone of the original set and the
/// transformation `U` that was applied to it.
///
/// An already-integer point is returned unchanged. Otherwise the cone
/// is transformed the same way, restricted to the trailing coordinates
/// of the point, shifted to the point, and any rational point of the
/// shifted cone is rounded up.
fn round_up_in_cone(vec: IntVec, cone: BasicSet, u: &IntMat) -> Result<IntVec, Error> {
	if vec.is_empty() {
		return Err(Error::InternalInvariant("rounding a zero-length vector"));
	}
	let vec = vec.normalize();
	if vec.is_integer() {
		return Ok(vec);
	}
	let total = cone.total_dim();
	let cone = cone.preimage(u)?;
	let cone = cone.drop_dims(0, total - (vec.len() - 1))?;
	let cone = shift_cone(cone, &vec)?;
	let sample = rational_sample(cone)?;
	Ok(sample.ceil())
}

/// Sample a set whose recession cone `cone` has non-trivial dimension.
///
/// A Hermite basis of the cone's equalities moves the bounded
/// directions of the set to the leading coordinates. The set is
/// projected onto those coordinates by dropping every inequality whose
/// support touches the unbounded suffix (any combination of such
/// constraints bounding the suffix would itself have been a bounded
/// direction), and the projection is sampled. The sampled values are
/// plugged in, a rational point of the remainder is rounded up in the
/// cone, and the two halves are lifted back to the original space.
pub fn sample_with_cone(bset: BasicSet, cone: BasicSet, ctx: &Context) -> Result<IntVec, Error> {
	let total = cone.total_dim();
	let cone_dim = total - cone.n_eq();
	let m = IntMat::from_rows(cone.eqs().iter().map(|r| r[1..].to_vec()).collect(), total);
	let (_h, u, _q) = m.left_hermite(false);
	let u = u.lin_to_aff();
	let bset = bset.preimage(&u)?;
	let bounded = bset
		.clone()
		.drop_constraints_involving(total - cone_dim, cone_dim)
		.drop_dims(total - cone_dim, cone_dim)?;
	let sample = sample_bounded(bounded, ctx)?;
	if sample.is_empty() {
		return Ok(sample);
	}
	let bset = plug_in(bset, &sample)?;
	let cone_sample = rational_sample(bset)?;
	let cone_sample = round_up_in_cone(cone_sample, cone, &u)?;
	let sample = sample.concat(cone_sample)?;
	Ok(u.product(&sample))
}

/// Add shifted copies of the cone's ray constraints to `tab` so that
/// any rational value in the unbounded directions of its basis can be
/// rounded up to a feasible integer value.
///
/// `u` is the inverse of the installed basis, restricted here to the
/// unbounded columns; the shift of a constraint is the sum of the
/// negative entries of its coefficient row expressed in that basis.
fn tab_shift_cone(tab: &mut Tableau, tab_cone: &Tableau, u: IntMat) -> Result<(), Error> {
	if tab.n_unbounded == 0 {
		return Ok(());
	}
	let Some(cone_bset) = tab_cone.peek_bset() else {
		return Err(Error::InternalInvariant("cone tableau without a tracked set"));
	};
	let n_eq = tab_cone.n_eq();
	let u = u.drop_cols(0, tab.n_var() - tab.n_unbounded);
	for (i, ineq) in cone_bset.ineqs().iter().enumerate() {
		if tab_cone.is_equality(ConIdx::from_usize(n_eq + i)) {
			continue;
		}
		let in_basis = u.row_product(&ineq[1..]);
		let shift = helpers::sum_of_neg(&in_basis);
		if shift.is_zero() {
			continue;
		}
		tab.reserve_rows(1);
		let mut row = ineq.clone();
		row[0] += &shift;
		tab.add_ineq(&row);
	}
	Ok(())
}

/// Install an initial basis on a possibly unbounded tableau, given a
/// tableau `tab_cone` for its recession cone, and add the shifted
/// constraints that make rounding up safe.
///
/// The basis lists the equality-aligned directions of `tab` first
/// (their count lands in `tab.n_zero`), then the remaining bounded
/// directions (equalities of the cone), and the unbounded directions
/// last (their count lands in `tab.n_unbounded`). A trivial cone
/// reduces to [`initial_basis`].
pub fn set_initial_basis_with_cone(tab: &mut Tableau, tab_cone: &Tableau) -> Result<(), Error> {
	debug_assert_eq!(tab.n_var(), tab_cone.n_var());
	if tab_cone.n_eq_rank() == tab_cone.n_var() {
		tab.basis = Some(initial_basis(tab)?);
		return Ok(());
	}
	let eq = tab.equalities();
	tab.n_zero = eq.n_row();
	let eq = eq.concat(tab_cone.equalities());
	tab.n_unbounded = tab.n_var() - (eq.n_row() - tab.n_zero);
	let (_h, u, q) = eq.left_hermite(false);
	tab.basis = Some(q.lin_to_aff());
	tab_shift_cone(tab, tab_cone, u)
}

/// Sample via generalized basis reduction: directly on the bounded set,
/// or through the recession-cone split when the cone is non-trivial.
pub(crate) fn gbr_sample(bset: BasicSet, ctx: &Context) -> Result<IntVec, Error> {
	let dim = bset.total_dim();
	let cone = bset.recession_cone()?;
	if cone.n_eq() < dim {
		debug!(dim, cone_eq = cone.n_eq(), "recession cone is non-trivial");
		return sample_with_cone(bset, cone, ctx);
	}
	sample_bounded(bset, ctx)
}

/// Sample through the external backend: skew the set into the positive
/// orthant, let the backend sample the skewed set, and map the result
/// back through the skew matrix.
pub(crate) fn pip_sample(bset: BasicSet, ctx: &Context) -> Result<IntVec, Error> {
	let (skewed, t) = skew_to_positive_orthant(bset)?;
	let Some(solver) = ctx.pip_solver() else {
		return Err(Error::Backend("no external integer LP backend registered"));
	};
	let sample = solver(skewed)?;
	if sample.is_empty() {
		return Ok(sample);
	}
	Ok(t.product(&sample))
}
