//! Sampling for unions of basic sets and for relations.
//!
//! A [`Set`] is a finite union of [`BasicSet`] disjuncts; a [`Map`] is a
//! finite union of [`BasicMap`] disjuncts, each of which is a basic set
//! over the concatenated input and output dimensions. Sampling scans
//! the disjuncts in order and returns the first single-point disjunct
//! found, or an empty one when every disjunct is empty.

use delegate::delegate;

use crate::{basic_set::BasicSet, context::Context, Error};

#[derive(Clone, Debug, PartialEq, Eq)]
/// A conjunction of constraints over input and output dimensions,
/// backed by a basic set over their concatenation.
pub struct BasicMap {
	/// Number of input dimensions.
	n_in: usize,
	/// Number of output dimensions.
	n_out: usize,
	/// The underlying set over `n_in + n_out` dimensions.
	bset: BasicSet,
}

impl BasicMap {
	/// Wrap a basic set over `n_in + n_out` dimensions as a relation.
	pub fn new(n_in: usize, n_out: usize, bset: BasicSet) -> Result<Self, Error> {
		if bset.dim() != n_in + n_out {
			return Err(Error::InvalidInput("relation dimensions do not match the set"));
		}
		Ok(BasicMap { n_in, n_out, bset })
	}

	/// An explicitly empty relation of the given dimensions.
	pub fn empty(n_in: usize, n_out: usize) -> Self {
		BasicMap {
			n_in,
			n_out,
			bset: BasicSet::empty_set(n_in + n_out),
		}
	}

	/// Number of input dimensions.
	pub fn n_in(&self) -> usize {
		self.n_in
	}

	/// Number of output dimensions.
	pub fn n_out(&self) -> usize {
		self.n_out
	}

	/// The underlying set over the concatenated dimensions.
	pub fn underlying_set(&self) -> &BasicSet {
		&self.bset
	}

	delegate! {
		to self.bset {
			/// Total dimension of the underlying set.
			pub fn total_dim(&self) -> usize;
			/// Whether the relation is already known to be empty.
			pub fn fast_is_empty(&self) -> bool;
		}
	}

	/// Reduce the relation to a single pair of its graph, or to an empty
	/// relation when it holds no integer pair.
	pub fn sample(self, ctx: &Context) -> Result<BasicMap, Error> {
		let (n_in, n_out) = (self.n_in, self.n_out);
		let point = self.bset.sample_vec(ctx)?;
		if point.is_empty() {
			return Ok(BasicMap::empty(n_in, n_out));
		}
		BasicMap::new(n_in, n_out, BasicSet::from_vec(point)?)
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A finite union of relations over a common pair of spaces.
pub struct Map {
	/// Number of input dimensions.
	n_in: usize,
	/// Number of output dimensions.
	n_out: usize,
	/// The disjuncts of the union.
	parts: Vec<BasicMap>,
}

impl Map {
	/// Build a union from relation disjuncts over matching spaces.
	pub fn from_parts(n_in: usize, n_out: usize, parts: Vec<BasicMap>) -> Result<Self, Error> {
		if parts.iter().any(|p| p.n_in != n_in || p.n_out != n_out) {
			return Err(Error::InvalidInput("union of relations over different spaces"));
		}
		Ok(Map { n_in, n_out, parts })
	}

	/// The disjuncts of the union.
	pub fn parts(&self) -> &[BasicMap] {
		&self.parts
	}

	/// Reduce the union to a single pair from the first non-empty
	/// disjunct, or to an empty relation.
	pub fn sample(self, ctx: &Context) -> Result<BasicMap, Error> {
		let (n_in, n_out) = (self.n_in, self.n_out);
		for part in self.parts {
			let sample = part.sample(ctx)?;
			if !sample.fast_is_empty() {
				return Ok(sample);
			}
		}
		Ok(BasicMap::empty(n_in, n_out))
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A finite union of basic sets over a common space.
pub struct Set {
	/// Dimension of the space.
	dim: usize,
	/// The disjuncts of the union.
	parts: Vec<BasicSet>,
}

impl Set {
	/// Build a union from basic-set disjuncts over a matching space.
	pub fn from_parts(dim: usize, parts: Vec<BasicSet>) -> Result<Self, Error> {
		if parts.iter().any(|p| p.dim() != dim) {
			return Err(Error::InvalidInput("union of sets over different spaces"));
		}
		Ok(Set { dim, parts })
	}

	/// The disjuncts of the union.
	pub fn parts(&self) -> &[BasicSet] {
		&self.parts
	}

	/// Reduce the union to a single point of the first non-empty
	/// disjunct, or to an empty basic set.
	pub fn sample(self, ctx: &Context) -> Result<BasicSet, Error> {
		let dim = self.dim;
		for part in self.parts {
			let point = part.sample_vec(ctx)?;
			if !point.is_empty() {
				return BasicSet::from_vec(point);
			}
		}
		Ok(BasicSet::empty_set(dim))
	}
}

#[cfg(test)]
mod tests {
	use num_bigint::BigInt;

	use crate::{
		basic_set::BasicSet,
		context::Context,
		map::{BasicMap, Map, Set},
	};

	/// A basic set from inequality rows of machine integers.
	fn set_of_ineqs(dim: usize, ineqs: &[&[i64]]) -> BasicSet {
		let mut bset = BasicSet::new(dim);
		for ineq in ineqs {
			bset.add_ineq(ineq.iter().map(|&x| BigInt::from(x)).collect());
		}
		bset
	}

	#[test]
	fn test_set_sample_skips_empty_disjunct() {
		let ctx = Context::new();
		let empty_part = set_of_ineqs(1, &[&[-1, 1], &[0, -1]]);
		let full_part = set_of_ineqs(1, &[&[-3, 1], &[5, -1]]);
		let set = Set::from_parts(1, vec![empty_part, full_part]).unwrap();
		let point = set.sample(&ctx).unwrap();
		assert!(!point.fast_is_empty());
		assert_eq!(point.cached_sample().unwrap().els()[1], BigInt::from(3));
	}

	#[test]
	fn test_set_sample_all_empty() {
		let ctx = Context::new();
		let set = Set::from_parts(1, vec![set_of_ineqs(1, &[&[-1, 1], &[0, -1]])]).unwrap();
		assert!(set.sample(&ctx).unwrap().fast_is_empty());
	}

	#[test]
	fn test_map_sample_returns_pair() {
		let ctx = Context::new();
		// The relation x -> y with 0 <= x, y <= 2 as a 2-dimensional set.
		let bmap = BasicMap::new(
			1,
			1,
			set_of_ineqs(2, &[&[0, 1, 0], &[2, -1, 0], &[0, 0, 1], &[2, 0, -1]]),
		)
		.unwrap();
		let map = Map::from_parts(1, 1, vec![bmap]).unwrap();
		let sample = map.sample(&ctx).unwrap();
		assert!(!sample.fast_is_empty());
		assert_eq!(sample.n_in(), 1);
		assert_eq!(sample.n_out(), 1);
		assert_eq!(sample.underlying_set().n_eq(), 2);
	}

	#[test]
	fn test_basic_map_dimension_check() {
		assert!(BasicMap::new(1, 1, BasicSet::new(3)).is_err());
	}
}
