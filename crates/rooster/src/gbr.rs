//! Generalized basis reduction over a tableau.
//!
//! The depth-first sampler scans the range of every basis direction in
//! turn; basis reduction keeps those ranges small by shortening the
//! basis rows. The width of a direction is the difference between the
//! maximum and the minimum of the corresponding affine form over the
//! tableau. Consecutive rows are combined with an integer shift that
//! minimizes the width of the second row (the width is a convex
//! piecewise-linear function of the shift, so an exact unimodal search
//! finds the minimizing integer), and the rows are swapped whenever the
//! shifted row became shorter than its predecessor. Every operation is
//! unimodular, so the basis keeps spanning the integer lattice.
//!
//! The first `n_zero` rows (equality-aligned) and the last
//! `n_unbounded` rows of the basis are never touched or mixed into.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use tracing::trace;

use crate::{
	context::Context,
	helpers,
	mat::IntMat,
	tab::{LpOutcome, Tableau},
	Error,
};

/// Reduce the eligible rows of the tableau's basis.
///
/// Honors `ctx.gbr_only_first`: when set, the routine returns as soon as
/// the first eligible direction has stabilized.
pub(crate) fn compute_reduced_basis(tab: &mut Tableau, ctx: &Context) -> Result<(), Error> {
	if tab.is_empty() {
		return Ok(());
	}
	let lo = tab.n_zero;
	let hi = tab.n_var() - tab.n_unbounded;
	if lo + 2 > hi {
		return Ok(());
	}
	let Some(mut basis) = tab.basis.take() else {
		return Err(Error::InternalInvariant("basis reduction without an installed basis"));
	};
	let result = reduce(tab, &mut basis, ctx, lo, hi);
	tab.basis = Some(basis);
	result
}

/// The reduction loop proper; `basis` has been taken out of the tableau
/// so that width queries can borrow the tableau freely.
fn reduce(
	tab: &Tableau,
	basis: &mut IntMat,
	ctx: &Context,
	lo: usize,
	hi: usize,
) -> Result<(), Error> {
	let mut budget = 16 + 4 * (hi - lo) * (hi - lo);
	let mut i = lo;
	while i + 1 < hi {
		if budget == 0 {
			trace!("basis reduction budget exhausted");
			break;
		}
		budget -= 1;
		let row_i = basis.row(1 + i).to_vec();
		let row_next = basis.row(1 + i + 1).to_vec();
		let w_i = width(tab, &row_i)?;
		let (mu, w_next) = best_shift(tab, &row_i, &row_next)?;
		if !mu.is_zero() {
			let combined = shifted(&row_next, &row_i, &mu);
			basis.row_mut(1 + i + 1).clone_from_slice(&combined);
		}
		if w_next < w_i {
			trace!(level = i, "basis reduction swaps directions");
			basis.swap_rows(1 + i, 1 + i + 1);
			if i > lo {
				i -= 1;
			}
		} else {
			if ctx.gbr_only_first() && i == lo {
				break;
			}
			i += 1;
		}
	}
	Ok(())
}

/// `base + mu * dir`, elementwise.
fn shifted(base: &[BigInt], dir: &[BigInt], mu: &BigInt) -> Vec<BigInt> {
	base.iter().zip(dir).map(|(b, d)| b + mu * d).collect()
}

/// The width of the tableau along an affine direction row.
fn width(tab: &Tableau, row: &[BigInt]) -> Result<BigRational, Error> {
	let lo = match tab.lp_min(row)? {
		LpOutcome::Optimal { value, .. } => value,
		_ => return Err(Error::InternalInvariant("width query on an unbounded direction")),
	};
	let mut neg = row.to_vec();
	helpers::neg_range(&mut neg);
	let hi = match tab.lp_min(&neg)? {
		LpOutcome::Optimal { value, .. } => -value,
		_ => return Err(Error::InternalInvariant("width query on an unbounded direction")),
	};
	Ok(hi - lo)
}

/// The integer shift `mu` minimizing `width(base + mu * dir)`, found by
/// exponential bracketing followed by ternary search on the convex
/// width function, together with the achieved width.
fn best_shift(
	tab: &Tableau,
	dir: &[BigInt],
	base: &[BigInt],
) -> Result<(BigInt, BigRational), Error> {
	let eval = |mu: &BigInt| width(tab, &shifted(base, dir, mu));
	let w0 = eval(&BigInt::zero())?;
	let w_up = eval(&BigInt::from(1))?;
	let w_down = eval(&BigInt::from(-1))?;
	if w0 <= w_up && w0 <= w_down {
		return Ok((BigInt::zero(), w0));
	}
	let (mut best_mu, mut best_w) = if w_up < w_down {
		(BigInt::from(1), w_up)
	} else {
		(BigInt::from(-1), w_down)
	};
	loop {
		let cand = &best_mu * 2;
		let w_cand = eval(&cand)?;
		if w_cand < best_w {
			best_mu = cand;
			best_w = w_cand;
		} else {
			break;
		}
	}
	// The minimum lies between best_mu / 2 and 2 * best_mu.
	let (mut a, mut b) = if best_mu.is_negative() {
		(&best_mu * 2, &best_mu / 2)
	} else {
		(&best_mu / 2, &best_mu * 2)
	};
	while &b - &a > BigInt::from(2) {
		let third = (&b - &a) / 3;
		let m1 = &a + &third;
		let m2 = &b - &third;
		if eval(&m1)? <= eval(&m2)? {
			b = m2;
		} else {
			a = m1;
		}
	}
	let mut best = (a.clone(), eval(&a)?);
	let mut mu = &a + 1;
	while mu <= b {
		let w = eval(&mu)?;
		if w < best.1 {
			best = (mu.clone(), w);
		}
		mu = &mu + 1;
	}
	Ok(best)
}
