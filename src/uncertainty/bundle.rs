use std::ops::{Add, Div, Mul, Neg, Sub};

use num_complex::Complex64;

use super::UncertainValue;
use crate::error::{CorrError, Result};

/// Finite-difference uncertainty bundle
///
/// Carries a nominal value plus two perturbed replicas per independent input:
/// column 0 is the nominal value, columns `1 + 2i` and `2 + 2i` hold the value
/// with input `i` shifted by the real and imaginary part of its uncertainty.
/// Every operation is replayed on all columns, so after any chain of
/// arithmetic each column holds the result the expression would produce under
/// that single perturbation. [`Bundle::collapse`] turns the spread into a
/// root-sum-of-squares standard uncertainty.
///
/// Mixing bundles created for different input counts is a programming defect.
/// The arithmetic operators panic in that case; [`Bundle::zip_with`] reports it
/// as [`CorrError::Consistency`].
///
/// # Example
/// ```
/// use metrocorr::uncertainty::Bundle;
///
/// let a = Bundle::seed_real(2.0, 0.1, 0, 2).unwrap();
/// let b = Bundle::seed_real(3.0, 0.2, 1, 2).unwrap();
/// let sum = (&a + &b).collapse();
/// assert!((sum.value.re - 5.0).abs() < 1e-12);
/// assert!((sum.uncertainty.re - (0.1f64.powi(2) + 0.2f64.powi(2)).sqrt()).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    cols: Vec<Complex64>,
}

impl Bundle {
    /// Bundle width for `inputs` independent inputs
    pub fn width_for(inputs: usize) -> usize {
        2 * inputs + 1
    }

    /// A value without uncertainty, replicated across all columns
    pub fn constant(value: Complex64, inputs: usize) -> Self {
        Self {
            cols: vec![value; Self::width_for(inputs)],
        }
    }

    pub fn constant_real(value: f64, inputs: usize) -> Self {
        Self::constant(Complex64::new(value, 0.0), inputs)
    }

    /// Seed input `index` of `inputs` with a complex value and its
    /// uncertainty (real part probes the real axis, imaginary part the
    /// imaginary axis)
    pub fn seed(
        value: Complex64,
        uncertainty: Complex64,
        index: usize,
        inputs: usize,
    ) -> Result<Self> {
        if index >= inputs {
            return Err(CorrError::Consistency(format!(
                "input slot {} out of range for {} inputs",
                index, inputs
            )));
        }
        let mut bundle = Self::constant(value, inputs);
        bundle.cols[1 + 2 * index] = value + Complex64::new(uncertainty.re, 0.0);
        bundle.cols[2 + 2 * index] = value + Complex64::new(0.0, uncertainty.im);
        Ok(bundle)
    }

    pub fn seed_real(value: f64, uncertainty: f64, index: usize, inputs: usize) -> Result<Self> {
        Self::seed(
            Complex64::new(value, 0.0),
            Complex64::new(uncertainty, 0.0),
            index,
            inputs,
        )
    }

    /// Seed from an [`UncertainValue`]
    pub fn seed_value(value: &UncertainValue, index: usize, inputs: usize) -> Result<Self> {
        Self::seed(value.value, value.uncertainty, index, inputs)
    }

    /// Seed every value as its own input, in order
    pub fn seed_all(values: &[UncertainValue]) -> Vec<Self> {
        let inputs = values.len();
        values
            .iter()
            .enumerate()
            .map(|(index, v)| {
                let mut bundle = Self::constant(v.value, inputs);
                bundle.cols[1 + 2 * index] = v.value + Complex64::new(v.uncertainty.re, 0.0);
                bundle.cols[2 + 2 * index] = v.value + Complex64::new(0.0, v.uncertainty.im);
                bundle
            })
            .collect()
    }

    /// Sum of terms that depend on disjoint sets of inputs
    ///
    /// Term `k` keeps its own slots, shifted past the slots of the terms
    /// before it, so the result has as many inputs as all terms together.
    /// Equivalent to seeding every input in one wide bundle, without
    /// replaying each term over the full width.
    pub fn sum_disjoint(terms: &[Bundle]) -> Self {
        let nominal: Complex64 = terms.iter().map(|t| t.cols[0]).sum();
        let mut cols = Vec::with_capacity(1 + terms.iter().map(|t| t.width() - 1).sum::<usize>());
        cols.push(nominal);
        for term in terms {
            let base = term.cols[0];
            cols.extend(term.cols[1..].iter().map(|&c| nominal + (c - base)));
        }
        Self { cols }
    }

    pub fn width(&self) -> usize {
        self.cols.len()
    }

    pub fn inputs(&self) -> usize {
        (self.cols.len() - 1) / 2
    }

    /// Nominal (unperturbed) value
    pub fn value(&self) -> Complex64 {
        self.cols[0]
    }

    pub fn columns(&self) -> &[Complex64] {
        &self.cols
    }

    /// Apply `f` to every column
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(Complex64) -> Complex64,
    {
        Self {
            cols: self.cols.iter().map(|&c| f(c)).collect(),
        }
    }

    /// Combine two bundles column by column, checking their widths
    pub fn zip_with<F>(&self, other: &Bundle, f: F) -> Result<Self>
    where
        F: Fn(Complex64, Complex64) -> Complex64,
    {
        if self.width() != other.width() {
            return Err(CorrError::Consistency(format!(
                "bundle width mismatch: {} vs {}",
                self.width(),
                other.width()
            )));
        }
        Ok(Self {
            cols: self
                .cols
                .iter()
                .zip(&other.cols)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    fn zip_or_panic<F>(&self, other: &Bundle, f: F) -> Self
    where
        F: Fn(Complex64, Complex64) -> Complex64,
    {
        assert_eq!(
            self.width(),
            other.width(),
            "bundle width mismatch in arithmetic"
        );
        Self {
            cols: self
                .cols
                .iter()
                .zip(&other.cols)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    pub fn recip(&self) -> Self {
        self.map(|c| c.inv())
    }

    pub fn sqrt(&self) -> Self {
        self.map(|c| c.sqrt())
    }

    pub fn exp(&self) -> Self {
        self.map(|c| c.exp())
    }

    pub fn powf(&self, exponent: f64) -> Self {
        self.map(|c| c.powf(exponent))
    }

    pub fn conj(&self) -> Self {
        self.map(|c| c.conj())
    }

    /// Real part as a real-valued bundle
    pub fn re(&self) -> Self {
        self.map(|c| Complex64::new(c.re, 0.0))
    }

    /// Imaginary part as a real-valued bundle
    pub fn im(&self) -> Self {
        self.map(|c| Complex64::new(c.im, 0.0))
    }

    /// Modulus as a real-valued bundle
    pub fn norm(&self) -> Self {
        self.map(|c| Complex64::new(c.norm(), 0.0))
    }

    /// Argument as a real-valued bundle
    ///
    /// Perturbed columns are measured relative to the nominal argument so a
    /// value sitting on the ±π branch cut does not produce a 2π spread.
    pub fn arg(&self) -> Self {
        let nominal = self.cols[0];
        let phi0 = nominal.arg();
        self.map(|c| {
            let delta = if nominal == Complex64::new(0.0, 0.0) {
                c.arg()
            } else {
                (c / nominal).arg()
            };
            Complex64::new(phi0 + delta, 0.0)
        })
    }

    /// `magnitude * exp(j * phase)` for two real-valued bundles
    pub fn from_polar(magnitude: &Bundle, phase: &Bundle) -> Self {
        magnitude.zip_or_panic(phase, |m, p| Complex64::from_polar(m.re, p.re))
    }

    /// Collapse to nominal value and standard uncertainty
    ///
    /// The uncertainty is the root-sum-of-squares of the column deviations
    /// from nominal, taken separately for the real and imaginary parts.
    pub fn collapse(&self) -> UncertainValue {
        let nominal = self.cols[0];
        let (sum_re, sum_im) = self.cols[1..].iter().fold((0.0, 0.0), |(sr, si), c| {
            let d = c - nominal;
            (sr + d.re * d.re, si + d.im * d.im)
        });
        UncertainValue::new(nominal, Complex64::new(sum_re.sqrt(), sum_im.sqrt()))
    }
}

macro_rules! bundle_binop {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&Bundle> for &Bundle {
            type Output = Bundle;

            fn $method(self, rhs: &Bundle) -> Bundle {
                self.zip_or_panic(rhs, |a, b| a $op b)
            }
        }

        impl $trait<Bundle> for Bundle {
            type Output = Bundle;

            fn $method(self, rhs: Bundle) -> Bundle {
                (&self).$method(&rhs)
            }
        }

        impl $trait<&Bundle> for Bundle {
            type Output = Bundle;

            fn $method(self, rhs: &Bundle) -> Bundle {
                (&self).$method(rhs)
            }
        }

        impl $trait<Bundle> for &Bundle {
            type Output = Bundle;

            fn $method(self, rhs: Bundle) -> Bundle {
                self.$method(&rhs)
            }
        }

        impl $trait<Complex64> for &Bundle {
            type Output = Bundle;

            fn $method(self, rhs: Complex64) -> Bundle {
                self.map(|a| a $op rhs)
            }
        }

        impl $trait<Complex64> for Bundle {
            type Output = Bundle;

            fn $method(self, rhs: Complex64) -> Bundle {
                self.map(|a| a $op rhs)
            }
        }

        impl $trait<f64> for &Bundle {
            type Output = Bundle;

            fn $method(self, rhs: f64) -> Bundle {
                self.map(|a| a $op rhs)
            }
        }

        impl $trait<f64> for Bundle {
            type Output = Bundle;

            fn $method(self, rhs: f64) -> Bundle {
                self.map(|a| a $op rhs)
            }
        }

        impl $trait<&Bundle> for f64 {
            type Output = Bundle;

            fn $method(self, rhs: &Bundle) -> Bundle {
                rhs.map(|b| Complex64::new(self, 0.0) $op b)
            }
        }

        impl $trait<Bundle> for f64 {
            type Output = Bundle;

            fn $method(self, rhs: Bundle) -> Bundle {
                self $op &rhs
            }
        }

        impl $trait<&Bundle> for Complex64 {
            type Output = Bundle;

            fn $method(self, rhs: &Bundle) -> Bundle {
                rhs.map(|b| self $op b)
            }
        }

        impl $trait<Bundle> for Complex64 {
            type Output = Bundle;

            fn $method(self, rhs: Bundle) -> Bundle {
                self $op &rhs
            }
        }
    };
}

// # Panics
//
// Binary operators between two bundles panic when the widths differ.
bundle_binop!(Add, add, +);
bundle_binop!(Sub, sub, -);
bundle_binop!(Mul, mul, *);
bundle_binop!(Div, div, /);

impl Neg for &Bundle {
    type Output = Bundle;

    fn neg(self) -> Bundle {
        self.map(|c| -c)
    }
}

impl Neg for Bundle {
    type Output = Bundle;

    fn neg(self) -> Bundle {
        -&self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_layout() {
        let b = Bundle::seed(Complex64::new(1.0, 2.0), Complex64::new(0.1, 0.2), 1, 3).unwrap();
        assert_eq!(b.width(), 7);
        assert_eq!(b.inputs(), 3);
        assert_eq!(b.columns()[0], Complex64::new(1.0, 2.0));
        assert_eq!(b.columns()[1], Complex64::new(1.0, 2.0));
        assert_eq!(b.columns()[3], Complex64::new(1.1, 2.0));
        assert_eq!(b.columns()[4], Complex64::new(1.0, 2.2));
        assert_eq!(b.columns()[6], Complex64::new(1.0, 2.0));
    }

    #[test]
    fn test_seed_rejects_out_of_range_slot() {
        assert!(matches!(
            Bundle::seed_real(1.0, 0.1, 3, 3),
            Err(CorrError::Consistency(_))
        ));
    }

    #[test]
    fn test_zip_with_width_mismatch() {
        let a = Bundle::constant_real(1.0, 2);
        let b = Bundle::constant_real(1.0, 3);
        assert!(matches!(
            a.zip_with(&b, |x, y| x + y),
            Err(CorrError::Consistency(_))
        ));
    }

    #[test]
    #[should_panic(expected = "bundle width mismatch")]
    fn test_operator_width_mismatch_panics() {
        let a = Bundle::constant_real(1.0, 2);
        let b = Bundle::constant_real(1.0, 3);
        let _ = a + b;
    }

    #[test]
    fn test_scaling_scales_uncertainty() {
        let a = Bundle::seed_real(4.0, 0.5, 0, 1).unwrap();
        let r = (&a * 3.0).collapse();
        assert!((r.value.re - 12.0).abs() < 1e-12);
        assert!((r.uncertainty.re - 1.5).abs() < 1e-12);
        assert_eq!(r.uncertainty.im, 0.0);
    }

    #[test]
    fn test_product_relative_uncertainty() {
        let a = Bundle::seed_real(10.0, 0.01, 0, 2).unwrap();
        let b = Bundle::seed_real(20.0, 0.04, 1, 2).unwrap();
        let r = (&a * &b).collapse();
        let expected = 200.0 * ((0.01f64 / 10.0).powi(2) + (0.04f64 / 20.0).powi(2)).sqrt();
        assert!((r.uncertainty.re - expected).abs() < 1e-9);
    }

    #[test]
    fn test_arg_across_branch_cut() {
        let z = Bundle::seed(Complex64::new(-1.0, 1e-12), Complex64::new(0.0, 1e-3), 0, 1).unwrap();
        let phi = z.arg().collapse();
        assert!((phi.uncertainty.re - 1e-3).abs() < 1e-6);
    }

    #[test]
    fn test_sum_disjoint_matches_wide_seeding() {
        let a = Bundle::seed_real(2.0, 0.1, 0, 1).unwrap();
        let b = Bundle::seed_real(3.0, 0.2, 0, 1).unwrap();
        let sum = Bundle::sum_disjoint(&[&a * &a, &b * &b]);
        assert_eq!(sum.inputs(), 2);

        let wa = Bundle::seed_real(2.0, 0.1, 0, 2).unwrap();
        let wb = Bundle::seed_real(3.0, 0.2, 1, 2).unwrap();
        let wide = &wa * &wa + &wb * &wb;
        for (x, y) in sum.columns().iter().zip(wide.columns()) {
            assert!((x - y).norm() < 1e-12);
        }
    }

    #[test]
    fn test_from_polar() {
        let m = Bundle::seed_real(2.0, 0.02, 0, 2).unwrap();
        let p = Bundle::seed_real(0.0, 0.001, 1, 2).unwrap();
        let z = Bundle::from_polar(&m, &p).collapse();
        assert!((z.value.re - 2.0).abs() < 1e-12);
        assert!((z.uncertainty.re - 0.02).abs() < 1e-9);
        assert!((z.uncertainty.im - 0.002).abs() < 1e-9);
    }
}
