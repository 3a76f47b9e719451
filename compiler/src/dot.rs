// dot.rs — Graphviz DOT output for typed signal graphs
//
// One node per signal reachable from the outputs, labelled with its kind
// and (when annotated) its type. Edges run from operand to user. Every
// symbolic group gets a cluster holding its body list; the feedback edge
// from a body back to its group node is dashed.
//
// Preconditions: `dsp` was produced from `s`.
// Postconditions: returns a valid DOT string.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::id::SigId;
use crate::pipeline::{reachable, CompiledDsp};
use crate::print::kind_name;
use crate::session::Session;
use crate::signal::SigKind;

/// Emit the signal graph of `dsp` as a Graphviz DOT string.
pub fn emit_dot(s: &Session, dsp: &CompiledDsp) -> String {
    let mut buf = String::new();
    let _ = writeln!(buf, "digraph signals {{");
    let _ = writeln!(buf, "    rankdir=LR;");
    let _ = writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];");
    let _ = writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];");

    let nodes = reachable(s, &dsp.outputs);
    let groups = s.rec_groups();

    let _ = writeln!(buf);
    for &sig in &nodes {
        if groups.iter().any(|&(_, body)| body == sig) {
            continue;
        }
        let _ = writeln!(buf, "    {} [{}];", node_id(sig), node_attrs(s, sig));
    }

    for (var, body) in &groups {
        if !nodes.contains(body) {
            continue;
        }
        let _ = writeln!(buf);
        let _ = writeln!(buf, "    subgraph cluster_w{} {{", var.0);
        let _ = writeln!(buf, "        label=\"W{}\";", var.0);
        let _ = writeln!(buf, "        style=rounded;");
        let _ = writeln!(buf, "        color=gray50;");
        let _ = writeln!(buf, "        {} [{}];", node_id(*body), node_attrs(s, *body));
        let _ = writeln!(buf, "    }}");
    }

    let _ = writeln!(buf);
    for &sig in &nodes {
        for child in s.sigs.kind(sig).children() {
            let _ = writeln!(buf, "    {} -> {};", node_id(child), node_id(sig));
        }
    }
    for &sig in &nodes {
        if let SigKind::Rec(var) = s.sigs.kind(sig) {
            if let Some(body) = s.rec_body(*var) {
                let _ = writeln!(
                    buf,
                    "    {} -> {} [style=dashed, constraint=false];",
                    node_id(body),
                    node_id(sig)
                );
            }
        }
    }

    let _ = writeln!(buf);
    for (i, &o) in dsp.outputs.iter().enumerate() {
        let _ = writeln!(buf, "    out{i} [shape=invhouse, label=\"out{i}\"];");
        let _ = writeln!(buf, "    {} -> out{};", node_id(o), i);
    }

    let _ = writeln!(buf, "}}");
    buf
}

fn node_id(sig: SigId) -> String {
    format!("n{}", sig.0)
}

fn node_label(s: &Session, sig: SigId) -> String {
    let kind = s.sigs.kind(sig);
    let head = match kind {
        SigKind::Int(i) => i.to_string(),
        SigKind::Real(r) => format!("{:?}", r.get()),
        SigKind::Input(i) => format!("IN[{i}]"),
        SigKind::BinOp(op, _, _) => op.symbol().to_string(),
        SigKind::Proj(i, _) => format!("proj{i}"),
        SigKind::Rec(var) => format!("W{}", var.0),
        SigKind::FFun(ff, _) => ff.name.clone(),
        SigKind::FConst { name, .. } | SigKind::FVar { name, .. } => name.clone(),
        SigKind::Xtended(id, _) => s
            .registry
            .get(*id)
            .map_or("xtended", |p| p.name())
            .to_string(),
        SigKind::Button(p)
        | SigKind::Checkbox(p)
        | SigKind::Soundfile(p)
        | SigKind::Slider { path: p, .. }
        | SigKind::Bargraph { path: p, .. } => {
            format!("{} {}", kind_name(kind), s.paths.display(*p))
        }
        other => kind_name(other).to_string(),
    };
    match s.sigs.ty(sig) {
        Some(t) => format!("{}\\n{}", escape(&head), escape(&s.types.display(t).to_string())),
        None => escape(&head),
    }
}

fn node_attrs(s: &Session, sig: SigId) -> String {
    let label = node_label(s, sig);
    match s.sigs.kind(sig) {
        SigKind::Input(_) => format!("shape=house, label=\"{label}\""),
        SigKind::Int(_) | SigKind::Real(_) => format!("shape=plaintext, label=\"{label}\""),
        SigKind::Rec(_) => format!("shape=doublecircle, label=\"{label}\""),
        SigKind::Delay1(_) | SigKind::Delay(..) | SigKind::Prefix(..) => {
            format!("shape=box, style=filled, fillcolor=lightyellow, label=\"{label}\"")
        }
        SigKind::Button(_)
        | SigKind::Checkbox(_)
        | SigKind::Slider { .. }
        | SigKind::Bargraph { .. }
        | SigKind::Soundfile(_) => {
            format!("shape=component, label=\"{label}\"")
        }
        SigKind::Nil | SigKind::Cons(..) => format!("shape=point, label=\"{label}\""),
        _ => format!("shape=box, label=\"{label}\""),
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Tests ──────────────────────────────────────────────────────────────────
