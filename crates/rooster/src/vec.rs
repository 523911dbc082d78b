//! Vectors of arbitrary-precision integers with a common denominator.
//!
//! An [`IntVec`] of length `1 + n` represents a rational point in `n`
//! dimensions: element 0 is the (positive) common denominator and the
//! remaining elements are the scaled coordinates. Sampling results are
//! always normalized to denominator 1. The zero-length vector is the
//! distinguished witness that a set contains no integer point.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::{helpers, Error};

#[derive(Clone, Debug, PartialEq, Eq)]
/// A rational point stored as a denominator followed by integer
/// coordinates, or the zero-length "no integer point" witness.
pub struct IntVec {
	/// The raw elements; element 0 is the denominator when non-empty.
	els: Vec<BigInt>,
}

impl IntVec {
	/// The zero-length witness meaning "the set has no integer point".
	pub fn empty() -> Self {
		IntVec { els: Vec::new() }
	}

	/// The origin of an `dim`-dimensional space, with denominator 1. For
	/// `dim == 0` this is the canonical zero-dimensional sample `[1]`.
	pub fn zero_point(dim: usize) -> Self {
		let mut els = vec![BigInt::zero(); 1 + dim];
		els[0] = BigInt::one();
		IntVec { els }
	}

	/// Wrap raw elements; element 0 must be a positive denominator.
	pub fn from_els(els: Vec<BigInt>) -> Self {
		debug_assert!(els.is_empty() || els[0].is_positive());
		IntVec { els }
	}

	/// Number of stored elements, including the denominator slot.
	pub fn len(&self) -> usize {
		self.els.len()
	}

	/// Whether this is the zero-length "no integer point" witness.
	pub fn is_empty(&self) -> bool {
		self.els.is_empty()
	}

	/// The common denominator.
	///
	/// # Panics
	/// Panics when called on the zero-length witness.
	pub fn den(&self) -> &BigInt {
		&self.els[0]
	}

	/// The raw elements, denominator first.
	pub fn els(&self) -> &[BigInt] {
		&self.els
	}

	/// Mutable access to the raw elements.
	pub fn els_mut(&mut self) -> &mut [BigInt] {
		&mut self.els
	}

	/// Whether the vector denotes an integer point. Only meaningful on a
	/// normalized vector.
	pub fn is_integer(&self) -> bool {
		!self.is_empty() && self.els[0].is_one()
	}

	/// Divide all elements by their gcd, keeping the denominator positive.
	pub fn normalize(mut self) -> Self {
		if self.is_empty() {
			return self;
		}
		let g = helpers::gcd_of(&self.els);
		if !g.is_zero() && !g.is_one() {
			helpers::scale_down(&mut self.els, &g);
		}
		self
	}

	/// Round every coordinate up to the next integer; the denominator
	/// becomes 1.
	pub fn ceil(mut self) -> Self {
		if self.is_empty() {
			return self;
		}
		let den = std::mem::replace(&mut self.els[0], BigInt::one());
		for x in self.els[1..].iter_mut() {
			*x = x.div_ceil(&den);
		}
		self
	}

	/// Concatenate the coordinates of two integer vectors (denominator 1
	/// each) into one integer vector.
	pub fn concat(self, other: IntVec) -> Result<IntVec, Error> {
		if self.is_empty() || other.is_empty() {
			return Err(Error::InternalInvariant("concatenation of a zero-length vector"));
		}
		if !self.is_integer() || !other.is_integer() {
			return Err(Error::InternalInvariant("concatenation of non-integer vectors"));
		}
		let mut els = self.els;
		els.extend_from_slice(&other.els[1..]);
		Ok(IntVec { els })
	}
}

impl Display for IntVec {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		if self.is_empty() {
			return write!(f, "[]");
		}
		write!(f, "[{}; {}]", self.els[0], self.els[1..].iter().format(", "))
	}
}

#[cfg(test)]
mod tests {
	use num_bigint::BigInt;

	use crate::vec::IntVec;

	/// Build a vector from machine integers, denominator first.
	fn vec_of(els: &[i64]) -> IntVec {
		IntVec::from_els(els.iter().map(|&x| BigInt::from(x)).collect())
	}

	#[test]
	fn test_ceil() {
		// (7/2, -7/2, 4/2) rounds up to (4, -3, 2).
		let v = vec_of(&[2, 7, -7, 4]).ceil();
		assert_eq!(v, vec_of(&[1, 4, -3, 2]));
		assert!(v.is_integer());
	}

	#[test]
	fn test_normalize() {
		let v = vec_of(&[4, 6, -2]).normalize();
		assert_eq!(v, vec_of(&[2, 3, -1]));
		assert!(!v.is_integer());
		assert_eq!(vec_of(&[3, 6, 3]).normalize(), vec_of(&[1, 2, 1]));
	}

	#[test]
	fn test_concat() {
		let v = vec_of(&[1, 2]).concat(vec_of(&[1, 3, 4])).unwrap();
		assert_eq!(v, vec_of(&[1, 2, 3, 4]));
		assert!(vec_of(&[2, 1]).concat(vec_of(&[1, 3])).is_err());
	}

	#[test]
	fn test_display() {
		assert_eq!(vec_of(&[1, 5, -3]).to_string(), "[1; 5, -3]");
		assert_eq!(IntVec::empty().to_string(), "[]");
	}
}
