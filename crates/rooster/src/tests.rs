//! Crate-level scenario tests: the sampling contract end to end, over
//! hand-picked boundary sets and a seeded sweep of random polyhedra
//! cross-checked against brute-force enumeration.

use num_bigint::BigInt;
use tracing_test::traced_test;

use crate::{
	basic_set::BasicSet,
	context::{Context, GbrMode},
	vec::IntVec,
	Error,
};

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

/// The invariants every non-empty sample has to satisfy.
fn assert_valid_sample(bset: &BasicSet, sample: &IntVec) {
	assert!(sample.is_integer(), "sample {sample} has a denominator");
	assert_eq!(sample.len(), 1 + bset.total_dim());
	assert!(bset.contains(sample), "sample {sample} outside the set");
}

#[test]
fn test_contradiction_is_empty() {
	let ctx = Context::new();
	let s = set_of(1, &[], &[&[-1, 1], &[0, -1]]).sample_vec(&ctx).unwrap();
	assert!(s.is_empty());
}

#[test]
fn test_interval_returns_lower_bound() {
	let ctx = Context::new();
	let s = set_of(1, &[], &[&[-3, 1], &[5, -1]]).sample_vec(&ctx).unwrap();
	assert_eq!(s.els(), row_of(&[1, 3]).as_slice());
}

#[test]
fn test_non_integral_equality_is_empty() {
	let ctx = Context::new();
	let s = set_of(1, &[&[-1, 2]], &[]).sample_vec(&ctx).unwrap();
	assert!(s.is_empty());
}

#[test]
fn test_scaled_equality_solves() {
	let ctx = Context::new();
	let s = set_of(1, &[&[-4, 2]], &[]).sample_vec(&ctx).unwrap();
	assert_eq!(s.els(), row_of(&[1, 2]).as_slice());
}

#[test]
fn test_bounded_triangle() {
	let ctx = Context::new();
	let bset = set_of(2, &[], &[&[0, 1, 1], &[0, 1, -1], &[5, -1, 0]]);
	let s = bset.clone().sample_vec(&ctx).unwrap();
	assert_valid_sample(&bset, &s);
}

#[test]
fn test_unbounded_half_plane() {
	let ctx = Context::new();
	let bset = set_of(2, &[], &[&[0, 0, 1]]);
	let s = bset.clone().sample_vec(&ctx).unwrap();
	assert_valid_sample(&bset, &s);
}

#[test]
fn test_round_up_from_rational_vertex() {
	// The only vertex is (1/2, 0); the rounded point must still be in
	// the set.
	let ctx = Context::new();
	let bset = set_of(2, &[], &[&[-1, 2, 2], &[-1, 2, -2]]);
	let s = bset.clone().sample_vec(&ctx).unwrap();
	assert_valid_sample(&bset, &s);
}

#[test]
fn test_zero_dimensional_point() {
	let ctx = Context::new();
	let s = BasicSet::new(0).sample_vec(&ctx).unwrap();
	assert_eq!(s.els(), row_of(&[1]).as_slice());
}

#[test]
fn test_rejects_parameters_and_divs() {
	let ctx = Context::new();
	let with_param = BasicSet::with_space(1, 1, 0).sample_vec(&ctx);
	assert_eq!(with_param, Err(Error::InvalidInput("sampling a set with parameters")));
	let with_div = BasicSet::with_space(1, 0, 1).sample_vec(&ctx);
	assert_eq!(
		with_div,
		Err(Error::InvalidInput("sampling a set with division variables"))
	);
}

#[test]
#[traced_test]
fn test_cached_sample_short_circuits() {
	let ctx = Context::new();
	let bset = set_of(2, &[], &[&[0, 1, 1], &[0, 1, -1], &[5, -1, 0]]);
	let first = bset.clone().sample_vec(&ctx).unwrap();
	let mut seeded = bset;
	seeded.set_sample(first.clone());
	let second = seeded.sample_vec(&ctx).unwrap();
	assert_eq!(first, second);
	assert!(logs_contain("cached sample still satisfies the set"));
}

#[test]
fn test_stale_cache_is_cleared() {
	let ctx = Context::new();
	let mut bset = set_of(1, &[], &[&[-3, 1], &[5, -1]]);
	bset.set_sample(IntVec::from_els(row_of(&[1, 9])));
	let s = bset.sample_vec(&ctx).unwrap();
	assert_eq!(s.els(), row_of(&[1, 3]).as_slice());
}

#[test]
fn test_bounded_entry_matches_general_entry() {
	let ctx = Context::new();
	let bset = set_of(2, &[], &[&[0, 1, 0], &[4, -1, 0], &[0, 0, 1], &[4, 0, -1], &[-1, 1, 1]]);
	let general = bset.clone().sample_vec(&ctx).unwrap();
	let bounded = bset.sample_bounded(&ctx).unwrap();
	assert_eq!(general, bounded);
}

#[test]
fn test_unimodular_transformation_roundtrip() {
	let ctx = Context::new();
	// U maps (x', y') to (x' + y', y'); it is unimodular.
	let u = crate::mat::IntMat::from_rows(
		vec![row_of(&[1, 0, 0]), row_of(&[0, 1, 1]), row_of(&[0, 0, 1])],
		3,
	);
	let bset = set_of(2, &[], &[&[0, 1, 1], &[0, 1, -1], &[5, -1, 0]]);
	let transformed = bset.clone().preimage(&u).unwrap();
	let s = transformed.sample_vec(&ctx).unwrap();
	assert!(!s.is_empty());
	let lifted = u.product(&s);
	assert!(bset.contains(&lifted), "lifted sample {lifted} outside the original");
}

#[test]
fn test_gbr_modes_agree() {
	let bset = set_of(
		2,
		&[],
		&[&[0, 1, -10], &[1, -1, 10], &[0, 0, 1], &[10, 0, -1]],
	);
	for mode in [GbrMode::Never, GbrMode::Once, GbrMode::Always] {
		let ctx = Context::new().with_gbr(mode);
		let s = bset.clone().sample_vec(&ctx).unwrap();
		assert_valid_sample(&bset, &s);
	}
}

#[test]
fn test_equalities_combined_with_cone() {
	// A line with an unbounded direction: x + y = 3, x >= 0.
	let ctx = Context::new();
	let bset = set_of(2, &[&[-3, 1, 1]], &[&[0, 1, 0]]);
	let s = bset.clone().sample_vec(&ctx).unwrap();
	assert_valid_sample(&bset, &s);
}

/// A small xorshift generator so the sweep is deterministic.
struct Rng(u64);

impl Rng {
	fn next(&mut self) -> u64 {
		let mut x = self.0;
		x ^= x << 13;
		x ^= x >> 7;
		x ^= x << 17;
		self.0 = x;
		x
	}

	fn range(&mut self, lo: i64, hi: i64) -> i64 {
		lo + (self.next() % ((hi - lo + 1) as u64)) as i64
	}
}

/// Enumerate the integer grid of the bounding box and report whether
/// any point satisfies the set.
fn brute_force_non_empty(bset: &BasicSet, bound: i64) -> bool {
	let dim = bset.total_dim();
	let width = (2 * bound + 1) as usize;
	let count = width.pow(dim as u32);
	for idx in 0..count {
		let mut point = vec![BigInt::from(1)];
		let mut rest = idx;
		for _ in 0..dim {
			point.push(BigInt::from((rest % width) as i64 - bound));
			rest /= width;
		}
		if bset.contains(&IntVec::from_els(point)) {
			return true;
		}
	}
	false
}

#[test]
fn test_random_polyhedra_against_brute_force() {
	let mut rng = Rng(0x2545_f491_4f6c_dd1d);
	let modes = [GbrMode::Always, GbrMode::Once, GbrMode::Never];
	for case in 0..48 {
		let dim = (case % 3) + 1;
		let mut bset = BasicSet::new(dim);
		for d in 0..dim {
			let mut lower = vec![BigInt::from(0); 1 + dim];
			lower[0] = BigInt::from(6);
			lower[1 + d] = BigInt::from(1);
			bset.add_ineq(lower);
			let mut upper = vec![BigInt::from(0); 1 + dim];
			upper[0] = BigInt::from(6);
			upper[1 + d] = BigInt::from(-1);
			bset.add_ineq(upper);
		}
		let extra = rng.range(0, 3);
		for _ in 0..extra {
			let mut row = vec![BigInt::from(rng.range(-5, 5))];
			for _ in 0..dim {
				row.push(BigInt::from(rng.range(-3, 3)));
			}
			bset.add_ineq(row);
		}
		if rng.range(0, 2) == 0 {
			let mut row = vec![BigInt::from(rng.range(-4, 4))];
			for _ in 0..dim {
				row.push(BigInt::from(rng.range(-2, 2)));
			}
			bset.add_eq(row);
		}
		let ctx = Context::new().with_gbr(modes[case % modes.len()]);
		let sample = bset.clone().sample_vec(&ctx).unwrap();
		let expected = brute_force_non_empty(&bset, 6);
		assert_eq!(
			!sample.is_empty(),
			expected,
			"case {case} disagrees with enumeration on\n{bset}"
		);
		if !sample.is_empty() {
			assert_valid_sample(&bset, &sample);
		}
	}
}
