use std::f64::consts::PI;

use num_complex::Complex64;
use rand::RngExt;
use rand_chacha::ChaCha8Rng;

/// Harmonic frequencies `fundamental · 1..=harmonics`
pub fn harmonic_frequencies(fundamental: f64, harmonics: usize) -> Vec<f64> {
    (1..=harmonics).map(|h| fundamental * h as f64).collect()
}

/// Random harmonic content: the fundamental at `amplitude`, each higher
/// harmonic at a random fraction of `amplitude / h`, all at random phases
pub fn random_harmonics(amplitude: f64, harmonics: usize, rng: &mut ChaCha8Rng) -> Vec<Complex64> {
    (1..=harmonics)
        .map(|h| {
            let scale = if h == 1 {
                1.0
            } else {
                (0.05 + 0.95 * rng.random::<f64>()) / h as f64
            };
            let phase = (2.0 * rng.random::<f64>() - 1.0) * PI;
            Complex64::from_polar(amplitude * scale, phase)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_fundamental_dominates() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let x = random_harmonics(10.0, 20, &mut rng);
        assert_eq!(x.len(), 20);
        assert!((x[0].norm() - 10.0).abs() < 1e-12);
        assert!(x[1..].iter().all(|p| p.norm() < 10.0));
    }
}
