//! Small numeric primitives over sequences of big integers that are used
//! in multiple places in the library and are not exposed to the user.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, Zero};

/// Inner product of two equally long integer sequences.
pub(crate) fn inner_product(a: &[BigInt], b: &[BigInt]) -> BigInt {
	debug_assert_eq!(a.len(), b.len());
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Position of the first non-zero entry, if any.
pub(crate) fn first_non_zero(seq: &[BigInt]) -> Option<usize> {
	seq.iter().position(|x| !x.is_zero())
}

/// Whether every entry of the sequence is zero.
pub(crate) fn is_zero(seq: &[BigInt]) -> bool {
	seq.iter().all(Zero::is_zero)
}

/// Negate a sequence in place.
pub(crate) fn neg_range(seq: &mut [BigInt]) {
	for x in seq.iter_mut() {
		*x = -std::mem::take(x);
	}
}

/// Eliminate position `pos` of `dst` using `src`, which must be non-zero
/// at `pos`. The combination is exact: with `g = gcd(src[pos], dst[pos])`
/// the result is `(src[pos] / g) * dst - (dst[pos] / g) * src`.
pub(crate) fn elim(dst: &mut [BigInt], src: &[BigInt], pos: usize) {
	debug_assert!(!src[pos].is_zero());
	if dst[pos].is_zero() {
		return;
	}
	let g = src[pos].gcd(&dst[pos]);
	let a = &src[pos] / &g;
	let b = &dst[pos] / &g;
	for (d, s) in dst.iter_mut().zip(src) {
		*d = &a * &*d - &b * s;
	}
}

/// Sum of the negative entries of the sequence.
pub(crate) fn sum_of_neg(seq: &[BigInt]) -> BigInt {
	seq.iter().filter(|x| x.is_negative()).sum()
}

/// The gcd of all entries of the sequence; zero for an all-zero sequence.
pub(crate) fn gcd_of(seq: &[BigInt]) -> BigInt {
	seq.iter().fold(BigInt::zero(), |g, x| g.gcd(x))
}

/// Divide every entry of the sequence by `g`, which must divide exactly.
pub(crate) fn scale_down(seq: &mut [BigInt], g: &BigInt) {
	debug_assert!(!g.is_zero());
	for x in seq.iter_mut() {
		debug_assert!(x.is_multiple_of(g));
		*x = &*x / g;
	}
}
