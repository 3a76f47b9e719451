// pipeline.rs — Compilation driver and emit targets
//
// Runs the minimal set of passes for a terminal PassId over one box:
// arity and inputs, propagation, de Bruijn to symbolic recursion, type
// annotation. Also hosts the source-level entry point and the renderers
// behind each `--emit` target.
//
// Preconditions: the box belongs to the session's arena.
// Postconditions: every pass in `required_passes(terminal)` has run, and
//   when `Annotate` ran every node reachable from the outputs is typed.
// Failure modes: the first fatal diagnostic of any pass.
// Side effects: grows the session's arenas; logs per-pass timing at `info`.

use std::collections::HashSet;
use std::fmt::Write;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::config::CompilerOptions;
use crate::diag::{codes, Diagnostic};
use crate::id::{BoxId, SigId};
use crate::pass::{descriptor, required_passes, PassId};
use crate::print::{display_signal, kind_name};
use crate::session::{Session, Stats};
use crate::signal::SigKind;
use crate::type_infer::get_certified_type;

// ── Compiled diagram ───────────────────────────────────────────────────────

/// Result of running the pipeline on one box.
#[derive(Debug, Clone)]
pub struct CompiledDsp {
    /// Number of audio inputs `IN[0..inputs)`.
    pub inputs: usize,
    /// One signal per box output.
    pub outputs: Vec<SigId>,
    /// The outputs as a signal list.
    pub root: SigId,
    /// Whether type annotation ran.
    pub typed: bool,
    pub stats: Stats,
}

/// Which artifact the driver prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    /// Pretty printed outputs and recursive group definitions.
    Signals,
    /// Each output with its certified type.
    Types,
    /// Every reachable node with kind, children and type.
    Json,
    /// Graphviz of the typed signal graph.
    Dot,
    /// The extended primitive registry.
    Manifest,
    /// Provenance hashes.
    BuildInfo,
}

impl EmitTarget {
    /// The last pass this target needs, or `None` when it needs no pass.
    pub fn terminal(self) -> Option<PassId> {
        match self {
            EmitTarget::Manifest => None,
            EmitTarget::Signals => Some(PassId::Symbolize),
            EmitTarget::Types | EmitTarget::Json | EmitTarget::Dot | EmitTarget::BuildInfo => {
                Some(PassId::Annotate)
            }
        }
    }
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Propagate, symbolize and type `b`.
pub fn compile(s: &mut Session, b: BoxId) -> Result<CompiledDsp, Diagnostic> {
    run_pipeline(s, b, PassId::Annotate)
}

/// Run the passes needed to produce `terminal` for box `b`.
pub fn run_pipeline(
    s: &mut Session,
    b: BoxId,
    terminal: PassId,
) -> Result<CompiledDsp, Diagnostic> {
    let mut inputs = 0;
    let mut outputs = Vec::new();
    let mut typed = false;

    for pass in required_passes(terminal) {
        let t = Instant::now();
        match pass {
            PassId::Propagate => {
                let (ins, outs) = s.boxes.arity(b, &s.registry)?;
                let in_sigs: Vec<SigId> = (0..ins as u32).map(|i| s.sigs.input(i)).collect();
                let env = s.envs.empty();
                let path = s.paths.root();
                outputs = crate::propagate::propagate(s, env, path, b, &in_sigs)?;
                if outputs.len() != outs {
                    return Err(Diagnostic::error(
                        codes::E0200,
                        format!(
                            "diagram declares {} outputs but propagates {}",
                            outs,
                            outputs.len()
                        ),
                    )
                    .with_context(s.boxes.display(b).to_string()));
                }
                inputs = ins;
            }
            PassId::Symbolize => {
                outputs = crate::debruijn::de_bruijn_to_sym(s, &outputs)?;
            }
            PassId::Annotate => {
                let root = s.sigs.list(&outputs);
                crate::fixpoint::type_annotation(s, &[root])?;
                typed = true;
            }
        }
        let ms = t.elapsed().as_secs_f64() * 1000.0;
        info!(pass = descriptor(pass).name, ms, "pass complete");
    }

    let root = s.sigs.list(&outputs);
    Ok(CompiledDsp {
        inputs,
        outputs,
        root,
        typed,
        stats: s.stats,
    })
}

/// Parse `source`, lower its `entry` definition and run the passes for
/// `terminal`. Front-end errors are reported together.
pub fn compile_source(
    source: &str,
    entry: &str,
    options: CompilerOptions,
    terminal: PassId,
) -> Result<(Session, CompiledDsp), Vec<Diagnostic>> {
    options.validate().map_err(|d| vec![d])?;
    let program = crate::parser::parse(source).into_result()?;
    let mut s = Session::new(options);
    let b = crate::lower::lower_program(&mut s, &program, entry).map_err(|d| vec![d])?;
    let dsp = run_pipeline(&mut s, b, terminal).map_err(|d| vec![d])?;
    Ok((s, dsp))
}

// ── Traversal ──────────────────────────────────────────────────────────────

/// Every node reachable from `roots`, following symbolic group bodies,
/// in ascending id order.
pub fn reachable(s: &Session, roots: &[SigId]) -> Vec<SigId> {
    let mut seen = HashSet::new();
    let mut stack: Vec<SigId> = roots.to_vec();
    while let Some(sig) = stack.pop() {
        if !seen.insert(sig) {
            continue;
        }
        let kind = s.sigs.kind(sig);
        if let SigKind::Rec(var) = kind {
            stack.extend(s.rec_body(*var));
        }
        stack.extend(kind.children());
    }
    let mut nodes: Vec<SigId> = seen.into_iter().collect();
    nodes.sort();
    nodes
}

// ── Emit targets ───────────────────────────────────────────────────────────

/// Outputs as expressions, then the body of every recursive group.
pub fn emit_signals(s: &Session, dsp: &CompiledDsp) -> String {
    let mut buf = String::new();
    let _ = writeln!(buf, "inputs: {}", dsp.inputs);
    for (i, &o) in dsp.outputs.iter().enumerate() {
        let _ = writeln!(buf, "out{} = {}", i, display_signal(s, o));
    }
    for (var, body) in s.rec_groups() {
        let _ = writeln!(buf, "W{} = {}", var.0, display_signal(s, body));
    }
    buf
}

/// Each output with its certified type. This listing is also the
/// canonical text hashed into the build info.
pub fn emit_types(s: &Session, dsp: &CompiledDsp) -> Result<String, Diagnostic> {
    let mut buf = String::new();
    for (i, &o) in dsp.outputs.iter().enumerate() {
        let t = get_certified_type(s, o)?;
        let _ = writeln!(
            buf,
            "out{} : {} = {}",
            i,
            s.types.display(t),
            display_signal(s, o)
        );
    }
    Ok(buf)
}

#[derive(Serialize)]
struct JsonReport {
    inputs: usize,
    outputs: Vec<u32>,
    groups: Vec<JsonGroup>,
    nodes: Vec<JsonNode>,
}

#[derive(Serialize)]
struct JsonGroup {
    var: u32,
    body: u32,
}

#[derive(Serialize)]
struct JsonNode {
    id: u32,
    kind: &'static str,
    children: Vec<u32>,
    #[serde(rename = "type")]
    ty: Option<String>,
    text: String,
}

/// JSON report of every node reachable from the outputs.
pub fn emit_json(s: &Session, dsp: &CompiledDsp) -> Result<String, Diagnostic> {
    let nodes = reachable(s, &dsp.outputs)
        .into_iter()
        .map(|sig| {
            let kind = s.sigs.kind(sig);
            JsonNode {
                id: sig.0,
                kind: kind_name(kind),
                children: kind.children().iter().map(|c| c.0).collect(),
                ty: s.sigs.ty(sig).map(|t| s.types.display(t).to_string()),
                text: display_signal(s, sig).to_string(),
            }
        })
        .collect();
    let report = JsonReport {
        inputs: dsp.inputs,
        outputs: dsp.outputs.iter().map(|o| o.0).collect(),
        groups: s
            .rec_groups()
            .into_iter()
            .map(|(var, body)| JsonGroup {
                var: var.0,
                body: body.0,
            })
            .collect(),
        nodes,
    };
    serde_json::to_string_pretty(&report)
        .map_err(|e| Diagnostic::error(codes::E0402, format!("cannot serialize report: {e}")))
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Hashes identifying one compilation.
///
/// `source_hash`: SHA-256 of the notation source.
/// `listing_hash`: SHA-256 of the typed output listing (`emit_types`).
/// `registry_fingerprint`: SHA-256 of the registry manifest.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub source_hash: String,
    pub listing_hash: String,
    pub registry_fingerprint: String,
    pub compiler_version: &'static str,
}

impl Provenance {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn sha256_hex(text: &str) -> String {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(64);
    for b in digest {
        let _ = write!(hex, "{:02x}", b);
    }
    hex
}

pub fn compute_provenance(
    source: &str,
    s: &Session,
    dsp: &CompiledDsp,
) -> Result<Provenance, Diagnostic> {
    Ok(Provenance {
        source_hash: sha256_hex(source),
        listing_hash: sha256_hex(&emit_types(s, dsp)?),
        registry_fingerprint: sha256_hex(&s.registry.manifest()),
        compiler_version: env!("CARGO_PKG_VERSION"),
    })
}

/// Render `target` for a compiled diagram.
pub fn emit(
    target: EmitTarget,
    source: &str,
    s: &Session,
    dsp: &CompiledDsp,
) -> Result<String, Diagnostic> {
    match target {
        EmitTarget::Signals => Ok(emit_signals(s, dsp)),
        EmitTarget::Types => emit_types(s, dsp),
        EmitTarget::Json => emit_json(s, dsp),
        EmitTarget::Dot => Ok(crate::dot::emit_dot(s, dsp)),
        EmitTarget::Manifest => Ok(s.registry.manifest()),
        EmitTarget::BuildInfo => Ok(compute_provenance(source, s, dsp)?.to_json()),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
