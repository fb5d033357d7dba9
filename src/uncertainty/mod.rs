//! First-order finite-difference uncertainty propagation.

mod bundle;

pub use bundle::Bundle;

use num_complex::Complex64;

/// A complex (or real, with zero imaginary parts) value paired with its
/// standard uncertainty
///
/// The uncertainty holds the real-part uncertainty in `.re` and the
/// imaginary-part uncertainty in `.im`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UncertainValue {
    pub value: Complex64,
    pub uncertainty: Complex64,
}

impl UncertainValue {
    pub fn new(value: Complex64, uncertainty: Complex64) -> Self {
        Self { value, uncertainty }
    }

    pub fn real(value: f64, uncertainty: f64) -> Self {
        Self::new(Complex64::new(value, 0.0), Complex64::new(uncertainty, 0.0))
    }

    /// Value with no uncertainty
    pub fn exact(value: Complex64) -> Self {
        Self::new(value, Complex64::new(0.0, 0.0))
    }

    pub fn zero() -> Self {
        Self::exact(Complex64::new(0.0, 0.0))
    }
}
