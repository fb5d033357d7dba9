use metrocorr::impedance::z_inv;
use metrocorr::uncertainty::{Bundle, UncertainValue};
use num_complex::Complex64;
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[test]
fn test_impedance_inversion_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for _ in 0..200 {
        // magnitudes from milliohms to megohms at any angle
        let magnitude = 10f64.powf(-3.0 + 9.0 * rng.random::<f64>());
        let angle = (2.0 * rng.random::<f64>() - 1.0) * std::f64::consts::PI;
        let z = Complex64::from_polar(magnitude, angle);
        let u = magnitude * 10f64.powf(-6.0 + 3.0 * rng.random::<f64>());
        let original = UncertainValue::new(z, Complex64::new(u, u));

        let back = z_inv(z_inv(original));
        assert!(
            (back.value - z).norm() / magnitude < 1e-6,
            "value {} -> {}",
            z,
            back.value
        );
        let (u_re, u_im) = (back.uncertainty.re, back.uncertainty.im);
        assert!((u_re - u).abs() / u < 1e-2, "u_re {} -> {}", u, u_re);
        assert!((u_im - u).abs() / u < 1e-2, "u_im {} -> {}", u, u_im);
    }
}

#[test]
fn test_linear_expression_matches_analytic_rss() {
    let (a, ua) = (2.0, 0.1);
    let (b, ub) = (3.0, 0.2);
    let (c, uc) = (5.0, 0.05);

    let ba = Bundle::seed_real(a, ua, 0, 3).unwrap();
    let bb = Bundle::seed_real(b, ub, 1, 3).unwrap();
    let bc = Bundle::seed_real(c, uc, 2, 3).unwrap();
    let d = ((&ba + &bb) / &bc).collapse();

    let dv: f64 = (a + b) / c;
    let analytic =
        dv * ((ua * ua + ub * ub) / ((a + b) * (a + b)) + (uc / c) * (uc / c)).sqrt();
    assert!((d.value.re - dv).abs() < 1e-12);
    // the division is linear in a and b, so only c contributes curvature
    assert!(
        (d.uncertainty.re - analytic).abs() / analytic < 1e-3,
        "{} vs {}",
        d.uncertainty.re,
        analytic
    );
    assert_eq!(d.uncertainty.im, 0.0);
}

#[test]
fn test_sum_is_exactly_linear() {
    let a = Bundle::seed_real(2.0, 0.1, 0, 2).unwrap();
    let b = Bundle::seed_real(3.0, 0.2, 1, 2).unwrap();
    let s = (&a + &b).collapse();
    assert!((s.uncertainty.re - 0.1f64.hypot(0.2)).abs() < 1e-12);
}

#[test]
fn test_complex_uncertainty_probes_both_parts() {
    let z = UncertainValue::new(Complex64::new(1.0, 1.0), Complex64::new(0.01, 0.02));
    let b = Bundle::seed_value(&z, 0, 1).unwrap();
    let out = (&b * 2.0).collapse();
    assert!((out.uncertainty.re - 0.02).abs() < 1e-12);
    assert!((out.uncertainty.im - 0.04).abs() < 1e-12);
}
