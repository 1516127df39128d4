use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use ribose_compiler::inr::save_stream;

// CLI INTEGRATION
// ================================================================================================

/// A nil-prologue passthrough: paste every byte, emit the field and stop on eos.
fn passthrough_inr() -> Vec<u8> {
    let bytes: Vec<[u8; 1]> = (0u8..=255).map(|b| [b]).collect();
    let mut transitions: Vec<(u32, u32, i32, &[u8])> = vec![(0, 2, 0, b"nil")];
    for byte in &bytes {
        transitions.push((2, 10, 0, byte));
    }
    transitions.push((10, 2, 1, b"paste"));
    transitions.push((2, 20, 0, b"eos"));
    transitions.push((20, 21, 1, b"out"));
    transitions.push((21, 22, 1, b"stop"));
    save_stream(3, &transitions)
}

#[test]
fn compile_then_run_passes_bytes_through() {
    let dir = tempfile::tempdir().unwrap();
    let automata = dir.path().join("automata");
    fs::create_dir(&automata).unwrap();
    fs::write(automata.join("Echo.inr"), passthrough_inr()).unwrap();
    let model = dir.path().join("echo.model");

    Command::cargo_bin("ribose")
        .unwrap()
        .args(["compile", "--model"])
        .arg(&model)
        .arg(&automata)
        .assert()
        .success();
    assert!(model.exists());
    let map = fs::read_to_string(model.with_extension("map")).unwrap();
    assert!(map.contains("transducer\tEcho\t0"));

    let input = dir.path().join("input.txt");
    fs::write(&input, b"hello").unwrap();

    Command::cargo_bin("ribose")
        .unwrap()
        .args(["run", "--model"])
        .arg(&model)
        .arg("Echo")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::eq("hello"));
}

#[test]
fn failed_compile_reports_diagnostics_and_deletes_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let automata = dir.path().join("automata");
    fs::create_dir(&automata).unwrap();
    // an unknown effector fails the whole model
    let stream = save_stream(3, &[(0, 2, 0, b"a"), (2, 3, 1, b"bogus")]);
    fs::write(automata.join("Broken.inr"), stream).unwrap();
    let model = dir.path().join("broken.model");

    Command::cargo_bin("ribose")
        .unwrap()
        .args(["compile", "--model"])
        .arg(&model)
        .arg(&automata)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown effector 'bogus'"));
    assert!(!model.exists());
    assert!(!model.with_extension("map").exists());
}

#[test]
fn running_a_missing_transducer_fails() {
    let dir = tempfile::tempdir().unwrap();
    let automata = dir.path().join("automata");
    fs::create_dir(&automata).unwrap();
    fs::write(automata.join("Echo.inr"), passthrough_inr()).unwrap();
    let model = dir.path().join("echo.model");

    Command::cargo_bin("ribose")
        .unwrap()
        .args(["compile", "--model"])
        .arg(&model)
        .arg(&automata)
        .assert()
        .success();

    Command::cargo_bin("ribose")
        .unwrap()
        .args(["run", "--model"])
        .arg(&model)
        .arg("Missing")
        .write_stdin("x")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing"));
}
