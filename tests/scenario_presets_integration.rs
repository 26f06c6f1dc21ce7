use std::fs;
use std::path::PathBuf;
use std::process::Command;

use bess_dispatch::config::DispatchConfig;

#[derive(Debug)]
struct Kpis {
    grid_import_kwh: f64,
    cycles: f64,
}

#[test]
fn scenario_files_match_presets() {
    let compact = DispatchConfig::from_toml_file(&scenario("compact_bess.toml")).unwrap();
    assert_eq!(compact, DispatchConfig::compact_bess());

    let expanded = DispatchConfig::from_toml_file(&scenario("expanded_bess.toml")).unwrap();
    assert_eq!(expanded, DispatchConfig::expanded_bess());

    let high = DispatchConfig::from_toml_file(&scenario("high_peak_threshold.toml")).unwrap();
    assert!(high.validate().is_empty());
    assert_eq!(high.schedule.peak_shaving_threshold_kw, 2300.0);
    assert!(high.input.truncate_mall_overflow);
}

#[test]
fn presets_run_via_cli_and_produce_distinct_dynamics() {
    let compact = run_and_parse_kpis(&["--preset", "compact_bess"], "compact");
    let baseline = run_and_parse_kpis(&["--preset", "baseline"], "baseline");
    let expanded = run_and_parse_kpis(
        &["--config", scenario("expanded_bess.toml").to_str().unwrap()],
        "expanded",
    );

    assert!(
        (baseline.grid_import_kwh - compact.grid_import_kwh).abs() > 1.0,
        "expected baseline and compact grid import to differ: baseline={:.1}, compact={:.1}",
        baseline.grid_import_kwh,
        compact.grid_import_kwh
    );
    assert!(
        (compact.cycles - expanded.cycles).abs() > 1.0,
        "expected compact and expanded cycle counts to differ: compact={:.1}, expanded={:.1}",
        compact.cycles,
        expanded.cycles
    );
}

#[test]
fn unknown_preset_exits_with_input_code() {
    let output = Command::new(env!("CARGO_BIN_EXE_bess-dispatch"))
        .args(["--preset", "jumbo", "--synthetic", "--output-dir"])
        .arg(std::env::temp_dir().join("bess-dispatch-jumbo"))
        .output()
        .expect("bess-dispatch process should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown preset"), "stderr={stderr}");
}

fn scenario(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(name)
}

fn run_and_parse_kpis(args: &[&str], tag: &str) -> Kpis {
    let out_dir = std::env::temp_dir().join(format!("bess-dispatch-cli-{tag}-{}", std::process::id()));
    let output = Command::new(env!("CARGO_BIN_EXE_bess-dispatch"))
        .args(args)
        .args(["--synthetic", "--seed", "42", "--output-dir"])
        .arg(&out_dir)
        .output()
        .expect("bess-dispatch process should run");

    assert!(
        output.status.success(),
        "run failed for {args:?}: stderr={} ",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(out_dir.join("dispatch_hourly.csv").exists());
    assert!(out_dir.join("summary.json").exists());
    fs::remove_dir_all(&out_dir).ok();

    let stdout = String::from_utf8(output.stdout).expect("stdout should be valid UTF-8");
    parse_kpis(&stdout)
}

fn parse_kpis(stdout: &str) -> Kpis {
    let mut grid_import_kwh = None;
    let mut cycles = None;

    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Grid import / export:") {
            grid_import_kwh = rest.split('/').next().and_then(|v| v.trim().parse().ok());
        }
        if let Some(rest) = line.strip_prefix("BESS charge / disch.:") {
            cycles = rest
                .split('(')
                .nth(1)
                .and_then(|v| v.split_whitespace().next())
                .and_then(|v| v.parse().ok());
        }
    }

    Kpis {
        grid_import_kwh: grid_import_kwh.expect("grid import line missing"),
        cycles: cycles.expect("cycles line missing"),
    }
}
