use metrocorr::config::InterpMode;
use metrocorr::error::CorrError;
use metrocorr::table::{CorrectionTable, Extrapolation, TableSource, expand};

fn text(s: &str) -> TableSource {
    TableSource::Text(s.to_string())
}

fn load(s: &str, secondary: Option<&str>, names: &[&str]) -> metrocorr::Result<CorrectionTable> {
    CorrectionTable::load(&text(s), secondary, names, InterpMode::Linear)
}

#[test]
fn test_evaluation_at_stored_points_returns_stored_values() {
    // trailing NaN makes every naive ±epsilon probe next to it fail
    let table = load(
        "divider gain;\nf;gain;u_gain\n0;1.0;1e-6\n100;1.25;2e-6\n1000;0.5;3e-6\n\
         10000;2.0;4e-6\n100000;NaN;\n",
        None,
        &["f", "gain", "u_gain"],
    )
    .unwrap();
    let stored = [(0.0, 1.0), (100.0, 1.25), (1000.0, 0.5), (10000.0, 2.0)];
    for mode in [
        InterpMode::Nearest,
        InterpMode::Linear,
        InterpMode::Pchip,
        InterpMode::Spline,
    ] {
        let f: Vec<f64> = stored.iter().map(|&(f, _)| f).collect();
        let out = table
            .interp(Some(&f), None, mode, Extrapolation::Error)
            .unwrap();
        let gain = out.require("gain").unwrap();
        for (k, &(_, expected)) in stored.iter().enumerate() {
            let v = gain.values.at(k, 0);
            assert!(!v.is_nan(), "{:?} NaN at {}", mode, f[k]);
            assert!((v - expected).abs() < 1e-12, "{:?}: {} != {}", mode, v, expected);
        }
    }
}

#[test]
fn test_2d_evaluation_at_stored_points() {
    let table = load(
        "gain;\nf;gain;gain;gain\nrms;1;10;100\n0;1.0;1.1;1.2\n500;2.0;2.1;2.2\n1000;3.0;3.1;3.2\n",
        Some("rms"),
        &["f", "gain"],
    )
    .unwrap();
    let out = table
        .interp(
            Some(&[0.0, 500.0, 1000.0][..]),
            Some(&[1.0, 10.0, 100.0][..]),
            InterpMode::Spline,
            Extrapolation::Error,
        )
        .unwrap();
    let gain = out.require("gain").unwrap();
    assert!((gain.values.at(1, 2) - 2.2).abs() < 1e-12);
    assert!((gain.values.at(2, 0) - 3.0).abs() < 1e-12);
}

#[test]
fn test_expansion_clips_to_common_range() {
    let wide = load("wide\nf,a\n0,0\n50,5\n100,10\n", None, &["f", "a"]).unwrap();
    let narrow = load("narrow\nf,b\n20,1\n60,1\n80,1\n200,1\n", None, &["f", "b"]).unwrap();

    let expanded = expand(&[wide, narrow], true, InterpMode::Linear).unwrap();
    let axis = expanded.primary.as_ref().unwrap();
    assert_eq!(axis.values, vec![20.0, 50.0, 60.0, 80.0, 100.0]);
    let a = expanded.get("wide").unwrap().require("a").unwrap();
    assert!((a.values.at(0, 0) - 2.0).abs() < 1e-12);

    assert!(expanded.check_primary(&[30.0, 90.0]).is_ok());
    match expanded.check_primary(&[10.0, 90.0]) {
        Err(CorrError::Range { table, axis, .. }) => {
            assert_eq!(table, "narrow");
            assert_eq!(axis, "f");
        }
        other => panic!("expected range error, got {:?}", other),
    }
    match expanded.check_primary(&[150.0]) {
        Err(CorrError::Range { table, .. }) => assert_eq!(table, "wide"),
        other => panic!("expected range error, got {:?}", other),
    }

    // the expanded tables themselves refuse to extrapolate
    let narrow = expanded.get("narrow").unwrap();
    let err = narrow.interp(Some(&[150.0][..]), None, InterpMode::Linear, Extrapolation::Error);
    assert!(matches!(err, Err(CorrError::Range { .. })));
}

#[test]
fn test_disjoint_tables_cannot_be_expanded() {
    let low = load("low\nf,a\n0,0\n10,1\n", None, &["f", "a"]).unwrap();
    let high = load("high\nf,a\n20,0\n30,1\n", None, &["f", "a"]).unwrap();
    assert!(matches!(
        expand(&[low, high], true, InterpMode::Linear),
        Err(CorrError::Range { .. })
    ));
}

#[test]
fn test_partially_numeric_axis_is_format_error() {
    let err = load("t;\nf;a\n0;1\n;2\n2;3\n", None, &["f", "a"]);
    assert!(matches!(err, Err(CorrError::Format(_))));
}

#[test]
fn test_column_count_not_multiple_of_quantities() {
    let err = load("t;\nf;a;b;a\n0;1;2;3\n", Some("rms"), &["f", "a", "b"]);
    assert!(matches!(err, Err(CorrError::Format(_))));
}

#[test]
fn test_multiple_columns_need_secondary_axis() {
    let err = load("t;\nf;a;a\n0;1;2\n1;3;4\n", None, &["f", "a"]);
    assert!(matches!(err, Err(CorrError::Format(_))));
}

#[test]
fn test_non_numeric_value_is_format_error() {
    let err = load("t;\nf;a\n0;1\n1;one\n", None, &["f", "a"]);
    assert!(matches!(err, Err(CorrError::Format(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = CorrectionTable::load(
        &TableSource::File("/nonexistent/table.csv".into()),
        None,
        &["f", "a"],
        InterpMode::Linear,
    );
    assert!(matches!(err, Err(CorrError::Io(_)) | Err(CorrError::Csv(_))));
}
