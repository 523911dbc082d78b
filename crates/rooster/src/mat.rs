//! Dense matrices of arbitrary-precision integers.
//!
//! Besides the usual products, this module provides the decompositions
//! the sampler is built on: the left Hermite decomposition `H = M * U`
//! (column echelon form with unimodular `U` and its inverse `Q`), the
//! embedding of a linear map into the affine group, and the variable
//! compression that turns an integer equality system into an affine
//! parametrization of its solutions.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use crate::{helpers, vec::IntVec, Error};

#[derive(Clone, Debug, PartialEq, Eq)]
/// A dense row-major matrix of big integers.
pub struct IntMat {
	/// Number of rows.
	n_row: usize,
	/// Number of columns.
	n_col: usize,
	/// Row-major storage of the entries.
	els: Vec<BigInt>,
}

impl IntMat {
	/// An all-zero matrix of the given shape.
	pub fn zeroes(n_row: usize, n_col: usize) -> Self {
		IntMat {
			n_row,
			n_col,
			els: vec![BigInt::zero(); n_row * n_col],
		}
	}

	/// The `n` by `n` identity matrix.
	pub fn identity(n: usize) -> Self {
		let mut m = IntMat::zeroes(n, n);
		for i in 0..n {
			m.set(i, i, BigInt::one());
		}
		m
	}

	/// Build a matrix from equally long rows.
	///
	/// An empty row list produces a matrix with zero rows and `n_col`
	/// columns.
	pub fn from_rows(rows: Vec<Vec<BigInt>>, n_col: usize) -> Self {
		debug_assert!(rows.iter().all(|r| r.len() == n_col));
		let n_row = rows.len();
		IntMat {
			n_row,
			n_col,
			els: rows.into_iter().flatten().collect(),
		}
	}

	/// Number of rows.
	pub fn n_row(&self) -> usize {
		self.n_row
	}

	/// Number of columns.
	pub fn n_col(&self) -> usize {
		self.n_col
	}

	/// The entry at the given position.
	pub fn at(&self, row: usize, col: usize) -> &BigInt {
		&self.els[row * self.n_col + col]
	}

	/// Overwrite the entry at the given position.
	pub fn set(&mut self, row: usize, col: usize, value: BigInt) {
		self.els[row * self.n_col + col] = value;
	}

	/// The given row as a slice.
	pub fn row(&self, row: usize) -> &[BigInt] {
		&self.els[row * self.n_col..(row + 1) * self.n_col]
	}

	/// The given row as a mutable slice.
	pub fn row_mut(&mut self, row: usize) -> &mut [BigInt] {
		&mut self.els[row * self.n_col..(row + 1) * self.n_col]
	}

	/// Exchange two rows.
	pub fn swap_rows(&mut self, a: usize, b: usize) {
		if a == b {
			return;
		}
		for j in 0..self.n_col {
			self.els.swap(a * self.n_col + j, b * self.n_col + j);
		}
	}

	/// Exchange two columns.
	pub fn swap_cols(&mut self, a: usize, b: usize) {
		if a == b {
			return;
		}
		for i in 0..self.n_row {
			self.els.swap(i * self.n_col + a, i * self.n_col + b);
		}
	}

	/// Add `f` times row `src` to row `dst`.
	fn row_add(&mut self, dst: usize, src: usize, f: &BigInt) {
		for j in 0..self.n_col {
			let t = &self.els[src * self.n_col + j] * f;
			self.els[dst * self.n_col + j] += t;
		}
	}

	/// Subtract `f` times column `src` from column `dst`.
	fn col_sub(&mut self, dst: usize, src: usize, f: &BigInt) {
		for i in 0..self.n_row {
			let t = &self.els[i * self.n_col + src] * f;
			self.els[i * self.n_col + dst] -= t;
		}
	}

	/// Negate column `col`.
	fn neg_col(&mut self, col: usize) {
		for i in 0..self.n_row {
			let x = &mut self.els[i * self.n_col + col];
			*x = -std::mem::take(x);
		}
	}

	/// Negate row `row`.
	fn neg_row(&mut self, row: usize) {
		helpers::neg_range(self.row_mut(row));
	}

	/// Drop `n` columns starting at `first`.
	pub fn drop_cols(self, first: usize, n: usize) -> Self {
		debug_assert!(first + n <= self.n_col);
		let n_col = self.n_col;
		let keep = |j: &usize| *j < first || *j >= first + n;
		let els = self
			.els
			.into_iter()
			.enumerate()
			.filter(|(idx, _)| keep(&(idx % n_col)))
			.map(|(_, x)| x)
			.collect();
		IntMat {
			n_row: self.n_row,
			n_col: n_col - n,
			els,
		}
	}

	/// Stack `other` below `self`; the column counts must agree.
	pub fn concat(mut self, other: IntMat) -> Self {
		debug_assert_eq!(self.n_col, other.n_col);
		self.els.extend(other.els);
		self.n_row += other.n_row;
		self
	}

	/// A copy of the row/column window starting at `(row, col)` with the
	/// given shape.
	pub fn sub_matrix(&self, row: usize, n_row: usize, col: usize, n_col: usize) -> Self {
		let mut m = IntMat::zeroes(n_row, n_col);
		for i in 0..n_row {
			for j in 0..n_col {
				m.set(i, j, self.at(row + i, col + j).clone());
			}
		}
		m
	}

	/// Embed a linear map into the affine group by prepending the
	/// homogenizing row and column.
	pub fn lin_to_aff(self) -> Self {
		let n = self.n_col;
		let mut m = IntMat::zeroes(1 + self.n_row, 1 + n);
		m.set(0, 0, BigInt::one());
		for i in 0..self.n_row {
			for j in 0..n {
				m.set(1 + i, 1 + j, self.at(i, j).clone());
			}
		}
		m
	}

	/// Matrix-vector product under the denominator-first convention.
	pub fn product(&self, v: &IntVec) -> IntVec {
		debug_assert_eq!(self.n_col, v.len());
		let els = (0..self.n_row)
			.map(|i| helpers::inner_product(self.row(i), v.els()))
			.collect();
		IntVec::from_els(els)
	}

	/// Row-vector times matrix; `row` must have one entry per matrix row.
	pub fn row_product(&self, row: &[BigInt]) -> Vec<BigInt> {
		debug_assert_eq!(self.n_row, row.len());
		(0..self.n_col)
			.map(|j| row.iter().enumerate().map(|(i, x)| x * self.at(i, j)).sum())
			.collect()
	}

	/// Solve `self * y = v` exactly and return `y` under the
	/// denominator-first convention, normalized.
	///
	/// The matrix must be square and invertible; the sampler only calls
	/// this on (affine embeddings of) unimodular bases.
	pub fn inverse_product(&self, v: &IntVec) -> Result<IntVec, Error> {
		let n = self.n_row;
		if self.n_col != n || v.len() != n {
			return Err(Error::InternalInvariant("inverse product shape mismatch"));
		}
		// Gauss-Jordan over exact rationals on the augmented system.
		let mut a: Vec<Vec<BigRational>> = (0..n)
			.map(|i| {
				self.row(i)
					.iter()
					.cloned()
					.chain([v.els()[i].clone()])
					.map(BigRational::from_integer)
					.collect()
			})
			.collect();
		for col in 0..n {
			let Some(pivot) = (col..n).find(|&r| !a[r][col].is_zero()) else {
				return Err(Error::InternalInvariant("inverse product of singular matrix"));
			};
			a.swap(col, pivot);
			let p = a[col][col].clone();
			for x in a[col].iter_mut() {
				*x /= &p;
			}
			for r in 0..n {
				if r == col || a[r][col].is_zero() {
					continue;
				}
				let f = a[r][col].clone();
				for j in col..=n {
					let t = &f * &a[col][j];
					a[r][j] -= t;
				}
			}
		}
		let y: Vec<BigRational> = (0..n).map(|i| a[i][n].clone()).collect();
		let scale = y
			.iter()
			.fold(BigInt::one(), |l, x| l.lcm(x.denom()));
		let mut els: Vec<BigInt> = y
			.iter()
			.map(|x| (x * BigRational::from_integer(scale.clone())).to_integer())
			.collect();
		if els[0].is_negative() {
			helpers::neg_range(&mut els);
		}
		Ok(IntVec::from_els(els).normalize())
	}

	/// Left Hermite decomposition by unimodular column operations.
	///
	/// Returns `(H, U, Q)` with `H = self * U` in column echelon form
	/// (pivots positive, on the leading columns, with zeros above), `U`
	/// unimodular and `Q` its inverse, so `self = H * Q`. Off-pivot
	/// entries in a pivot row are reduced into `[0, pivot)`, or into
	/// `(-pivot, 0]` when `neg` is set.
	pub fn left_hermite(&self, neg: bool) -> (IntMat, IntMat, IntMat) {
		let n = self.n_col;
		let mut h = self.clone();
		let mut u = IntMat::identity(n);
		let mut q = IntMat::identity(n);
		let mut first = 0;
		for i in 0..self.n_row {
			if first >= n {
				break;
			}
			loop {
				// Column with the smallest non-zero magnitude in row i.
				let mut j0 = None;
				for j in first..n {
					if h.at(i, j).is_zero() {
						continue;
					}
					match j0 {
						None => j0 = Some(j),
						Some(b) => {
							if h.at(i, j).abs() < h.at(i, b).abs() {
								j0 = Some(j);
							}
						}
					}
				}
				let Some(j0) = j0 else { break };
				let mut done = true;
				for j in first..n {
					if j == j0 || h.at(i, j).is_zero() {
						continue;
					}
					done = false;
					let f = h.at(i, j) / h.at(i, j0);
					if !f.is_zero() {
						h.col_sub(j, j0, &f);
						u.col_sub(j, j0, &f);
						q.row_add(j0, j, &f);
					}
				}
				if !done {
					continue;
				}
				if j0 != first {
					h.swap_cols(first, j0);
					u.swap_cols(first, j0);
					q.swap_rows(first, j0);
				}
				if h.at(i, first).is_negative() {
					h.neg_col(first);
					u.neg_col(first);
					q.neg_row(first);
				}
				let p = h.at(i, first).clone();
				for j in 0..first {
					let f = if neg {
						h.at(i, j).div_ceil(&p)
					} else {
						h.at(i, j).div_floor(&p)
					};
					if !f.is_zero() {
						h.col_sub(j, first, &f);
						u.col_sub(j, first, &f);
						q.row_add(first, j, &f);
					}
				}
				first += 1;
				break;
			}
		}
		(h, u, q)
	}

	/// Parametrize the integer solutions of the equality system given by
	/// `eqs` (rows of length `1 + total`, constant first, `row * (1, x) = 0`).
	///
	/// Returns the affine matrix `T` with `x = T * (1, z)` ranging over
	/// exactly the integer solutions as `z` ranges over the integers, or
	/// `None` when the system has no integer solution.
	pub fn variable_compression(eqs: &[Vec<BigInt>], total: usize) -> Option<IntMat> {
		if eqs.is_empty() {
			return Some(IntMat::identity(1 + total));
		}
		let b1 = IntMat::from_rows(eqs.iter().map(|r| r[1..].to_vec()).collect(), total);
		let (h, u, _q) = b1.left_hermite(false);
		let mut y = vec![BigInt::zero(); total];
		let mut piv = 0;
		for (i, eq) in eqs.iter().enumerate() {
			let mut rhs = -eq[0].clone();
			for (j, yj) in y.iter().enumerate().take(piv) {
				rhs -= h.at(i, j) * yj;
			}
			if piv < total && !h.at(i, piv).is_zero() {
				if !rhs.is_multiple_of(h.at(i, piv)) {
					return None;
				}
				y[piv] = &rhs / h.at(i, piv);
				piv += 1;
			} else if !rhs.is_zero() {
				return None;
			}
		}
		let rank = piv;
		let mut t = IntMat::zeroes(1 + total, 1 + total - rank);
		t.set(0, 0, BigInt::one());
		for i in 0..total {
			let x0 = (0..rank).map(|j| u.at(i, j) * &y[j]).sum();
			t.set(1 + i, 0, x0);
			for c in 0..total - rank {
				t.set(1 + i, 1 + c, u.at(i, rank + c).clone());
			}
		}
		Some(t)
	}
}

impl Display for IntMat {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		writeln!(f, "[")?;
		for i in 0..self.n_row {
			writeln!(f, "\t[{}]", self.row(i).iter().format(", "))?;
		}
		write!(f, "]")
	}
}

#[cfg(test)]
mod tests {
	use num_bigint::BigInt;
	use num_traits::{One, Zero};

	use crate::{mat::IntMat, vec::IntVec};

	/// Build a matrix from rows of machine integers.
	fn mat_of(rows: &[&[i64]]) -> IntMat {
		let n_col = rows.first().map_or(0, |r| r.len());
		IntMat::from_rows(
			rows.iter()
				.map(|r| r.iter().map(|&x| BigInt::from(x)).collect())
				.collect(),
			n_col,
		)
	}

	/// Plain matrix product, used to check decomposition invariants.
	fn mul(a: &IntMat, b: &IntMat) -> IntMat {
		assert_eq!(a.n_col(), b.n_row());
		let mut m = IntMat::zeroes(a.n_row(), b.n_col());
		for i in 0..a.n_row() {
			for j in 0..b.n_col() {
				let x = (0..a.n_col()).map(|k| a.at(i, k) * b.at(k, j)).sum();
				m.set(i, j, x);
			}
		}
		m
	}

	#[test]
	fn test_left_hermite_products() {
		let m = mat_of(&[&[4, 6, 2], &[2, 0, 8]]);
		let (h, u, q) = m.left_hermite(false);
		assert_eq!(mul(&m, &u), h);
		assert_eq!(mul(&q, &u), IntMat::identity(3));
		assert_eq!(mul(&h, &q), m);
		// Echelon shape: zeros above and right of the pivots.
		assert!(h.at(0, 1).is_zero() && h.at(0, 2).is_zero());
		assert!(h.at(1, 2).is_zero());
		assert!(h.at(0, 0) > &BigInt::zero());
	}

	#[test]
	fn test_left_hermite_neg_range() {
		let m = mat_of(&[&[1, 0], &[7, 3]]);
		let (h, u, _q) = m.left_hermite(true);
		assert_eq!(mul(&m, &u), h);
		// The off-pivot entry of the second row is reduced into (-3, 0].
		assert!(h.at(1, 0) <= &BigInt::zero());
		assert!(h.at(1, 0) > &BigInt::from(-3));
	}

	#[test]
	fn test_inverse_product_roundtrip() {
		let m = mat_of(&[&[1, 0, 0], &[0, 2, 1], &[0, 1, 1]]);
		let v = IntVec::from_els(vec![BigInt::one(), BigInt::from(5), BigInt::from(3)]);
		let y = m.inverse_product(&v).unwrap();
		assert_eq!(m.product(&y).normalize(), v);
	}

	#[test]
	fn test_variable_compression_solves() {
		// x + y = 4 over two dimensions: x = (4, 0) + z * (-1, 1) up to a
		// unimodular change of the free coordinate.
		let eqs = vec![vec![BigInt::from(-4), BigInt::one(), BigInt::one()]];
		let t = IntMat::variable_compression(&eqs, 2).unwrap();
		assert_eq!(t.n_row(), 3);
		assert_eq!(t.n_col(), 2);
		for z in -3i64..=3 {
			let p = t.product(&IntVec::from_els(vec![BigInt::one(), BigInt::from(z)]));
			assert_eq!(p.els()[1].clone() + p.els()[2].clone(), BigInt::from(4));
		}
	}

	#[test]
	fn test_variable_compression_no_integer_solution() {
		// 2x = 1 has no integer solution.
		let eqs = vec![vec![BigInt::from(-1), BigInt::from(2)]];
		assert!(IntMat::variable_compression(&eqs, 1).is_none());
	}

	#[test]
	fn test_drop_cols_and_concat() {
		let m = mat_of(&[&[1, 2, 3], &[4, 5, 6]]);
		let d = m.clone().drop_cols(1, 1);
		assert_eq!(d, mat_of(&[&[1, 3], &[4, 6]]));
		let c = m.concat(mat_of(&[&[7, 8, 9]]));
		assert_eq!(c, mat_of(&[&[1, 2, 3], &[4, 5, 6], &[7, 8, 9]]));
	}

	#[test]
	fn test_lin_to_aff() {
		let m = mat_of(&[&[2, 1], &[1, 1]]).lin_to_aff();
		assert_eq!(m, mat_of(&[&[1, 0, 0], &[0, 2, 1], &[0, 1, 1]]));
	}
}
