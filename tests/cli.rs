use std::fmt::Write as _;
use std::fs;
use std::process::Command;

use ehgstudies::protocol::ResultsBundle;
use tempfile::tempdir;

fn feature_file(rows: usize, features: usize) -> String {
    let mut text = String::from("record");
    for j in 0..features {
        write!(text, "\tf{j}").expect("format header");
    }
    text.push_str("\tTerm\n");
    for i in 0..rows {
        let term = i % 2;
        write!(text, "r{i}").expect("format row");
        for j in 0..features {
            let value = ((i * 31 + j * 17) % 23) as f64 / 10.0 + term as f64 * (j % 3) as f64;
            write!(text, "\t{value}").expect("format value");
        }
        writeln!(text, "\t{term}").expect("format label");
    }
    text
}

#[test]
fn hosseinzahde_cli_writes_results_file() {
    let tmp = tempdir().expect("temporary directory");
    let features_path = tmp.path().join("features.tsv");
    fs::write(&features_path, feature_file(60, 12)).expect("write features");
    let output = tmp.path().join("out.json");

    let exe = env!("CARGO_BIN_EXE_ehgstudies");
    let status = Command::new(exe)
        .current_dir(tmp.path())
        .args([
            "hosseinzahde",
            features_path.to_str().expect("path str"),
            "--no-grid",
            "--folds",
            "5",
            "--output",
            output.to_str().expect("path str"),
        ])
        .status()
        .expect("run ehgstudies cli");

    assert!(status.success(), "CLI exited with status {status:?}");
    let results = ResultsBundle::load(&output).expect("load results");
    assert_eq!(results.without_oversampling_details.fold_ids(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn missing_label_column_fails_with_status_one() {
    let tmp = tempdir().expect("temporary directory");
    let features_path = tmp.path().join("features.tsv");
    fs::write(&features_path, "a\tb\n1\t2\n3\t4\n").expect("write features");

    let exe = env!("CARGO_BIN_EXE_ehgstudies");
    let output = Command::new(exe)
        .current_dir(tmp.path())
        .args(["sadiahmed", features_path.to_str().expect("path str")])
        .output()
        .expect("run ehgstudies cli");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr was: {stderr}");
}
