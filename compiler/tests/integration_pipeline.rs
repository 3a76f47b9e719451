// Integration tests for the compilation pipeline.
//
// Library-level checks go through `compile_source` on notation text; the
// driver checks run the `bdc` binary end to end.

use std::process::Command;

use bdc::config::CompilerOptions;
use bdc::diag::codes;
use bdc::pass::PassId;
use bdc::pipeline::{compile_source, emit_signals, CompiledDsp};
use bdc::session::Session;
use bdc::type_infer::get_certified_type;
use bdc::types::{Boolean, Nature, Variability};

fn compile_with(source: &str, options: CompilerOptions) -> (Session, CompiledDsp) {
    match compile_source(source, "process", options, PassId::Annotate) {
        Ok(r) => r,
        Err(diags) => panic!("compilation of {source:?} failed: {diags:?}"),
    }
}

fn compile(source: &str) -> (Session, CompiledDsp) {
    compile_with(source, CompilerOptions::default())
}

fn signals(source: &str) -> String {
    let (s, dsp) = compile(source);
    emit_signals(&s, &dsp)
}

// ── Typing ──────────────────────────────────────────────────────────────────

#[test]
fn int_division_is_real() {
    let (s, dsp) = compile("process = int(_) / int(_);");
    let t = get_certified_type(&s, dsp.outputs[0]).unwrap();
    assert_eq!(s.types.nature(t), Nature::Real);
}

#[test]
fn comparison_is_boolean_int() {
    let (s, dsp) = compile("process = _ < _;");
    let t = get_certified_type(&s, dsp.outputs[0]).unwrap();
    assert_eq!(s.types.nature(t), Nature::Int);
    assert_eq!(s.types.boolean(t), Boolean::Bool);
    let i = s.types.interval(t);
    assert_eq!((i.lo, i.hi), (0.0, 1.0));
}

#[test]
fn table_round_trip_reads_real() {
    let (s, dsp) = compile("process = rwtable(8, 0, 3, _, 3);");
    let t = get_certified_type(&s, dsp.outputs[0]).unwrap();
    assert!(s.types.nature(t) >= Nature::Real);
}

#[test]
fn table_size_must_be_compile_time_constant() {
    for src in [
        r#"process = rdtable(ffunction(int rand(), "stdlib.h"), 0, int(_));"#,
        r#"process = rdtable(int(hslider("size", 8, 1, 64, 1)), 0, int(_));"#,
    ] {
        let err = compile_source(src, "process", CompilerOptions::default(), PassId::Annotate)
            .unwrap_err();
        assert_eq!(err[0].code, Some(codes::E0103), "{src}");
    }
    assert!(compile_source(
        "process = rdtable(16, 0, int(_));",
        "process",
        CompilerOptions::default(),
        PassId::Annotate
    )
    .is_ok());
}

#[test]
fn merge_with_real_zero_is_real() {
    let (s, dsp) = compile("process = int(_), 0.0 :> _;");
    let t = get_certified_type(&s, dsp.outputs[0]).unwrap();
    assert_eq!(s.types.nature(t), Nature::Real);
}

#[test]
fn counter_terminates_by_widening() {
    let (s, dsp) = compile("process = 1 : + ~ _;");
    assert_eq!(dsp.inputs, 0);
    let t = get_certified_type(&s, dsp.outputs[0]).unwrap();
    assert_eq!(s.types.nature(t), Nature::Int);
    assert_eq!(s.types.variability(t), Variability::Samp);
    assert_eq!(s.types.interval(t).hi, f64::INFINITY);
    assert!(dsp.stats.forced_jumps >= 1);
    assert_eq!(dsp.stats.groups_solved, 1);
}

#[test]
fn bounded_feedback_converges_without_forcing() {
    // y = 0.5 * y' with a constant seed: the range never grows.
    let (s, dsp) = compile("process = 0 : + ~ *(0.5);");
    assert_eq!(dsp.stats.forced_jumps, 0);
    let t = get_certified_type(&s, dsp.outputs[0]).unwrap();
    assert_eq!(s.types.nature(t), Nature::Real);
}

#[test]
fn causality_check_is_optional() {
    let src = "process = _ @ _;";
    assert!(compile_source(src, "process", CompilerOptions::default(), PassId::Annotate).is_ok());

    let options = CompilerOptions {
        causality: true,
        ..CompilerOptions::default()
    };
    let err = compile_source(src, "process", options, PassId::Annotate).unwrap_err();
    assert_eq!(err[0].code, Some(codes::E0303));
}

#[test]
fn bounded_delay_passes_causality() {
    let options = CompilerOptions {
        causality: true,
        ..CompilerOptions::default()
    };
    let (s, dsp) = compile_with("process = _ @ 4;", options);
    let t = get_certified_type(&s, dsp.outputs[0]).unwrap();
    assert_eq!(s.types.variability(t), Variability::Samp);
}

#[test]
fn sliders_are_block_rate() {
    let (s, dsp) = compile(r#"process = hgroup("main", _ * hslider("gain", 0.5, 0, 1, 0.1));"#);
    let t = get_certified_type(&s, dsp.outputs[0]).unwrap();
    assert_eq!(s.types.variability(t), Variability::Samp);
    let text = emit_signals(&s, &dsp);
    assert!(text.contains("/h:main/gain"), "{text}");
}

// ── Box algebra ─────────────────────────────────────────────────────────────

#[test]
fn identity_route() {
    assert_eq!(
        signals("process = route(2, 2, (1, 1), (2, 2));"),
        "inputs: 2\nout0 = IN[0]\nout1 = IN[1]\n"
    );
}

#[test]
fn swapping_route() {
    assert_eq!(
        signals("process = route(2, 2, (1, 2), (2, 1));"),
        "inputs: 2\nout0 = IN[1]\nout1 = IN[0]\n"
    );
}

#[test]
fn unmapped_route_output_is_zero() {
    assert_eq!(
        signals("process = route(1, 2, 1, 1);"),
        "inputs: 1\nout0 = IN[0]\nout1 = 0\n"
    );
}

#[test]
fn seq_direct_chain() {
    assert_eq!(signals("process = _ : _;"), "inputs: 1\nout0 = IN[0]\n");
}

#[test]
fn seq_appends_extra_outputs() {
    assert_eq!(
        signals("process = _, _ : int;"),
        "inputs: 2\nout0 = int(IN[0])\nout1 = IN[1]\n"
    );
}

#[test]
fn seq_pulls_missing_inputs() {
    assert_eq!(signals("process = _ : +;"), "inputs: 2\nout0 = (IN[0] + IN[1])\n");
}

#[test]
fn propagation_is_memoized() {
    let mut s = Session::default();
    let w = s.boxes.wire();
    let m = s.boxes.prim(bdc::boxes::Prim::Mem);
    let b = s.boxes.seq(w, m);
    let x = s.sigs.input(0);
    let env = s.envs.empty();
    let path = s.paths.root();

    let first = bdc::propagate::propagate(&mut s, env, path, b, &[x]).unwrap();
    let derivations = s.stats.derivations;
    let hits = s.stats.memo_hits;
    let second = bdc::propagate::propagate(&mut s, env, path, b, &[x]).unwrap();
    assert_eq!(first, second);
    assert_eq!(s.stats.derivations, derivations);
    assert_eq!(s.stats.memo_hits, hits + 1);
}

#[test]
fn lambda_application() {
    assert_eq!(
        signals(r"gain(g) = _ * g; process = gain(2);"),
        "inputs: 1\nout0 = (IN[0] * 2)\n"
    );
}

#[test]
fn arity_errors_are_fatal() {
    let err = compile_source(
        "process = (_, _) ~ (_, _, _);",
        "process",
        CompilerOptions::default(),
        PassId::Annotate,
    )
    .unwrap_err();
    assert_eq!(err.len(), 1);
    assert!(err[0].code.is_some());
}

#[test]
fn sessions_do_not_share_state() {
    let (s1, d1) = compile("process = _';");
    let (s2, d2) = compile("process = _';");
    assert_eq!(d1.outputs, d2.outputs);
    assert_eq!(s1.sigs.len(), s2.sigs.len());
    assert_eq!(s1.types.len(), s2.types.len());
}

// ── Driver ──────────────────────────────────────────────────────────────────

fn bdc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bdc"))
}

#[test]
fn cli_emits_types_for_inline_expression() {
    let output = bdc()
        .args(["-e", "_ * 0.5"])
        .output()
        .expect("failed to run bdc");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("out0 : RSEVN"), "{stdout}");
}

#[test]
fn cli_emits_manifest_without_source() {
    let output = bdc()
        .args(["--emit", "manifest"])
        .output()
        .expect("failed to run bdc");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json.as_array().unwrap().iter().any(|p| p["name"] == "abs"));
}

#[test]
fn cli_build_info_is_json() {
    let output = bdc()
        .args(["--emit", "build-info", "-e", "_ + 1"])
        .output()
        .expect("failed to run bdc");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["source_hash"].as_str().unwrap().len(), 64);
    assert_eq!(json["listing_hash"].as_str().unwrap().len(), 64);
}

#[test]
fn cli_reports_syntax_errors() {
    let output = bdc()
        .args(["-e", "_ +"])
        .output()
        .expect("failed to run bdc");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("E0404"), "{stderr}");
}

#[test]
fn cli_reads_source_files_and_config() {
    let dir = std::env::temp_dir().join(format!("bdc-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let src = dir.join("counter.dsp");
    std::fs::write(&src, "process = 1 : + ~ _;\n").unwrap();
    let cfg = dir.join("options.json");
    std::fs::write(&cfg, r#"{ "widening_limit": 3 }"#).unwrap();

    let output = bdc()
        .arg(&src)
        .arg("--config")
        .arg(&cfg)
        .args(["--emit", "signals"])
        .output()
        .expect("failed to run bdc");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("W"), "{stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cli_rejects_invalid_config() {
    let output = bdc()
        .args(["--narrowing-limit", "0", "-e", "_"])
        .output()
        .expect("failed to run bdc");
    assert_eq!(output.status.code(), Some(2));
}
