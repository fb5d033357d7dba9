use num_complex::Complex64;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use metrocorr::config::{SolverConfig, Topology, TransducerKind};
use metrocorr::loading::{self, PhasorSpectrum};
use metrocorr::table::{Axis, CorrectionTable, Grid, Quantity, TableSet};
use metrocorr::simulation::{
    BinDeviation, SyntheticTransducer, compare, harmonic_frequencies, random_harmonics,
};

pub const FUNDAMENTAL: f64 = 50.0;

/// A random transducer, a known input and what the digitizer saw
pub struct Case {
    pub kind: TransducerKind,
    pub transducer: SyntheticTransducer,
    pub freq: Vec<f64>,
    pub truth: Vec<Complex64>,
    pub high: PhasorSpectrum,
    pub low: Option<PhasorSpectrum>,
}

/// Build a case with `harmonics` bins
///
/// `component_u` is the relative uncertainty of every table entry, `signal_u`
/// the relative amplitude and absolute phase uncertainty of the measurement.
pub fn build_case(
    kind: TransducerKind,
    topology: Topology,
    seed: u64,
    harmonics: usize,
    component_u: f64,
    signal_u: f64,
) -> Case {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut transducer = SyntheticTransducer::random(kind, topology, &mut rng).unwrap();
    transducer.rel_uncertainty = component_u;
    let freq = harmonic_frequencies(FUNDAMENTAL, harmonics);
    let truth = random_harmonics(100.0, harmonics, &mut rng);
    let (high, low) = transducer.measure(&freq, &truth, signal_u, signal_u).unwrap();
    Case {
        kind,
        transducer,
        freq,
        truth,
        high,
        low,
    }
}

/// Replace the input at `bins` with zero and measure again
pub fn silence(case: &mut Case, bins: &[usize], signal_u: f64) {
    for &i in bins {
        case.truth[i] = Complex64::new(0.0, 0.0);
    }
    let (high, low) = case
        .transducer
        .measure(&case.freq, &case.truth, signal_u, signal_u)
        .unwrap();
    case.high = high;
    case.low = low;
}

/// RMS of the true input
pub fn truth_rms(case: &Case) -> f64 {
    case.freq
        .iter()
        .zip(&case.truth)
        .map(|(&f, x)| if f == 0.0 { x.norm_sqr() } else { x.norm_sqr() / 2.0 })
        .sum::<f64>()
        .sqrt()
}

/// The case's tables with `tr_gain` and `tr_phi` made level dependent
///
/// At RMS level `l` the gain is scaled by `1 + beta·(l/rms − 1)` and the
/// phase shifted by `gamma·(l/rms − 1)`, tabulated at `rms/2`, `rms` and
/// `2·rms`. At the true level both equal the transducer's own transfer.
pub fn level_dependent_tables(case: &Case, rms: f64, beta: f64, gamma: f64) -> TableSet {
    let mut tables = case.transducer.table_set(&case.freq).unwrap();
    let levels = [rms / 2.0, rms, 2.0 * rms];
    let spread = |name: &str, quantity: &str, shift: &dyn Fn(f64, f64) -> f64| {
        let q = tables.get(name).unwrap().quantity(quantity).unwrap().clone();
        let (values, u) = (q.values.column(0), q.uncertainty.column(0));
        let n = values.len();
        let cells = |f: &dyn Fn(usize, f64) -> f64| -> Vec<f64> {
            (0..n)
                .flat_map(|i| levels.iter().map(move |&l| (i, l)))
                .map(|(i, l)| f(i, l))
                .collect()
        };
        let shifted = cells(&|i: usize, l: f64| shift(values[i], l / rms - 1.0));
        let same_u = cells(&|i: usize, _: f64| u[i]);
        CorrectionTable::new(
            name,
            Some(Axis::new("f", case.freq.clone()).unwrap()),
            Some(Axis::new("rms", levels.to_vec()).unwrap()),
            vec![Quantity::new(
                quantity,
                Grid::new(n, 3, shifted).unwrap(),
                Grid::new(n, 3, same_u).unwrap(),
            )],
        )
        .unwrap()
    };
    let gain = spread("tr_gain", "gain", &|g: f64, d: f64| g * (1.0 + beta * d));
    let phi = spread("tr_phi", "phi", &|p: f64, d: f64| p + gamma * d);
    tables.insert("tr_gain", gain);
    tables.insert("tr_phi", phi);
    tables
}

/// Run the solver on a case with the given bin limit
pub fn solve_case(case: &Case, max_accurate_bins: usize) -> PhasorSpectrum {
    let tables = case.transducer.table_set(&case.freq).unwrap();
    solve_with_tables(case, &tables, max_accurate_bins)
}

pub fn solve_with_tables(
    case: &Case,
    tables: &TableSet,
    max_accurate_bins: usize,
) -> PhasorSpectrum {
    let config = SolverConfig {
        max_accurate_bins,
        ..SolverConfig::default()
    };
    loading::solve(tables, case.kind, &config, &case.high, case.low.as_ref()).unwrap()
}

/// Assert every bin matches the truth within `max(rel·amp, k·u)`
pub fn assert_recovered(case: &Case, solved: &PhasorSpectrum, rel: f64, k: f64) {
    let deviations: Vec<BinDeviation> = compare(solved, &case.truth);
    for (i, d) in deviations.iter().enumerate() {
        assert!(
            d.within(rel, k),
            "bin {} ({} Hz): amp {:.6e} error {:.3e} (u {:.3e}), phase error {:.3e} (u {:.3e})",
            i,
            case.freq[i],
            d.amp,
            d.amp_error,
            d.u_amp,
            d.phase_error,
            d.u_phase
        );
    }
}
