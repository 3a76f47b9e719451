// boxes.rs — Block-diagram (box) terms
//
// Boxes are the surface algebra handed to propagation: literals, wires,
// composition operators, primitives, UI widgets and declarations. They are
// hash-consed like signals so that the propagation memo can key on handles.
//
// `BoxArena::arity` answers the (inputs, outputs) query for any box and is
// memoized per handle.
//
// Preconditions: handles passed in were produced by the same arena.
// Postconditions: arity results are stable for the arena's lifetime.
// Failure modes: invalid composition arities, malformed route counts,
//   unknown extended primitives.
// Side effects: interning grows the arena; arity results are cached.

use std::collections::HashMap;
use std::fmt;

use crate::diag::{codes, Diagnostic};
use crate::id::{BoxId, PrimId, Slot};
use crate::intern::Interner;
use crate::registry::Registry;
use crate::signal::{BinOp, ForeignFn, Orientation, Real64, SliderKind};
use crate::types::Nature;

/// A numeric literal embedded in a box (waveform values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i32),
    Real(Real64),
}

impl Literal {
    pub fn as_f64(self) -> f64 {
        match self {
            Literal::Int(i) => i as f64,
            Literal::Real(r) => r.get(),
        }
    }
}

// ── Fixed-arity primitives ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    Bin(BinOp),
    IntCast,
    FloatCast,
    Mem,
    Prefix,
    Delay,
    Attach,
    Enable,
    Control,
    Select2,
    RdTable,
    RwTable,
    Lowest,
    Highest,
    AssertBounds,
}

impl Prim {
    pub fn arity(self) -> usize {
        match self {
            Prim::IntCast | Prim::FloatCast | Prim::Mem | Prim::Lowest | Prim::Highest => 1,
            Prim::Bin(_)
            | Prim::Prefix
            | Prim::Delay
            | Prim::Attach
            | Prim::Enable
            | Prim::Control => 2,
            Prim::Select2 | Prim::RdTable | Prim::AssertBounds => 3,
            Prim::RwTable => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Prim::Bin(op) => op.symbol(),
            Prim::IntCast => "int",
            Prim::FloatCast => "float",
            Prim::Mem => "mem",
            Prim::Prefix => "prefix",
            Prim::Delay => "@",
            Prim::Attach => "attach",
            Prim::Enable => "enable",
            Prim::Control => "control",
            Prim::Select2 => "select2",
            Prim::RdTable => "rdtable",
            Prim::RwTable => "rwtable",
            Prim::Lowest => "lowest",
            Prim::Highest => "highest",
            Prim::AssertBounds => "assertbounds",
        }
    }

    /// Named primitives (operators are reached through notation symbols).
    pub fn by_name(name: &str) -> Option<Prim> {
        Some(match name {
            "int" => Prim::IntCast,
            "float" => Prim::FloatCast,
            "mem" => Prim::Mem,
            "prefix" => Prim::Prefix,
            "attach" => Prim::Attach,
            "enable" => Prim::Enable,
            "control" => Prim::Control,
            "select2" => Prim::Select2,
            "rdtable" => Prim::RdTable,
            "rwtable" => Prim::RwTable,
            "lowest" => Prim::Lowest,
            "highest" => Prim::Highest,
            "assertbounds" => Prim::AssertBounds,
            "xor" => Prim::Bin(BinOp::Xor),
            _ => return None,
        })
    }
}

// ── Box kinds ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoxKind {
    Int(i32),
    Real(Real64),
    Waveform(Vec<Literal>),
    FConst { nature: Nature, name: String, file: String },
    FVar { nature: Nature, name: String, file: String },
    Cut,
    Wire,
    Slot(Slot),
    Symbolic(Slot, BoxId),
    Prim(Prim),
    FFun(ForeignFn),
    Xtended(PrimId),
    Button(String),
    Checkbox(String),
    Slider { kind: SliderKind, label: String, cur: Real64, min: Real64, max: Real64, step: Real64 },
    Bargraph { orient: Orientation, label: String, min: Real64, max: Real64 },
    Soundfile { label: String, chans: u32 },
    Group(Orientation, String, BoxId),
    Seq(BoxId, BoxId),
    Par(BoxId, BoxId),
    Split(BoxId, BoxId),
    Merge(BoxId, BoxId),
    Rec(BoxId, BoxId),
    Route(BoxId, BoxId, BoxId),
    Environment,
}

// ── Arena ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct BoxArena {
    nodes: Interner<BoxKind>,
    arity: HashMap<BoxId, (usize, usize)>,
}

impl BoxArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn intern(&mut self, kind: BoxKind) -> BoxId {
        BoxId(self.nodes.intern(kind).0)
    }

    pub fn kind(&self, b: BoxId) -> &BoxKind {
        self.nodes.get(b.0)
    }

    // ── Builders ─────────────────────────────────────────────────────────

    pub fn int(&mut self, v: i32) -> BoxId {
        self.intern(BoxKind::Int(v))
    }

    pub fn real(&mut self, v: f64) -> BoxId {
        self.intern(BoxKind::Real(Real64::new(v)))
    }

    pub fn wire(&mut self) -> BoxId {
        self.intern(BoxKind::Wire)
    }

    pub fn cut(&mut self) -> BoxId {
        self.intern(BoxKind::Cut)
    }

    pub fn prim(&mut self, p: Prim) -> BoxId {
        self.intern(BoxKind::Prim(p))
    }

    pub fn binop(&mut self, op: BinOp) -> BoxId {
        self.prim(Prim::Bin(op))
    }

    pub fn seq(&mut self, a: BoxId, b: BoxId) -> BoxId {
        self.intern(BoxKind::Seq(a, b))
    }

    pub fn par(&mut self, a: BoxId, b: BoxId) -> BoxId {
        self.intern(BoxKind::Par(a, b))
    }

    /// Left-nested parallel composition of a non-empty list.
    pub fn par_all(&mut self, items: &[BoxId]) -> Option<BoxId> {
        let (&first, rest) = items.split_first()?;
        Some(rest.iter().fold(first, |acc, &b| self.par(acc, b)))
    }

    pub fn split(&mut self, a: BoxId, b: BoxId) -> BoxId {
        self.intern(BoxKind::Split(a, b))
    }

    pub fn merge(&mut self, a: BoxId, b: BoxId) -> BoxId {
        self.intern(BoxKind::Merge(a, b))
    }

    pub fn rec(&mut self, a: BoxId, b: BoxId) -> BoxId {
        self.intern(BoxKind::Rec(a, b))
    }

    pub fn route(&mut self, ins: BoxId, outs: BoxId, pairs: BoxId) -> BoxId {
        self.intern(BoxKind::Route(ins, outs, pairs))
    }

    pub fn slot(&mut self, s: Slot) -> BoxId {
        self.intern(BoxKind::Slot(s))
    }

    pub fn symbolic(&mut self, s: Slot, body: BoxId) -> BoxId {
        self.intern(BoxKind::Symbolic(s, body))
    }

    pub fn group(&mut self, orient: Orientation, label: impl Into<String>, body: BoxId) -> BoxId {
        self.intern(BoxKind::Group(orient, label.into(), body))
    }

    // ── Literal extraction ───────────────────────────────────────────────

    /// Integer value of a literal box (reals truncate).
    pub fn literal_int(&self, b: BoxId) -> Option<i32> {
        match self.kind(b) {
            BoxKind::Int(i) => Some(*i),
            BoxKind::Real(r) => Some(r.get() as i32),
            _ => None,
        }
    }

    /// Flatten a parallel tree of numeric literals.
    pub fn int_list(&self, b: BoxId, out: &mut Vec<i32>) -> Result<(), Diagnostic> {
        match self.kind(b) {
            BoxKind::Par(x, y) => {
                self.int_list(*x, out)?;
                self.int_list(*y, out)
            }
            _ => match self.literal_int(b) {
                Some(i) => {
                    out.push(i);
                    Ok(())
                }
                None => Err(Diagnostic::error(codes::E0201, "not a valid list of numbers")
                    .with_context(self.display(b).to_string())),
            },
        }
    }

    // ── Arity ────────────────────────────────────────────────────────────

    /// (inputs, outputs) of a box.
    pub fn arity(&mut self, b: BoxId, registry: &Registry) -> Result<(usize, usize), Diagnostic> {
        if let Some(&a) = self.arity.get(&b) {
            return Ok(a);
        }
        let a = self.compute_arity(b, registry)?;
        self.arity.insert(b, a);
        Ok(a)
    }

    fn compute_arity(&mut self, b: BoxId, registry: &Registry) -> Result<(usize, usize), Diagnostic> {
        let kind = self.kind(b).clone();
        let composition_error = |what: &str, this: &BoxArena| {
            Diagnostic::error(codes::E0204, what.to_string())
                .with_context(this.display(b).to_string())
        };
        Ok(match kind {
            BoxKind::Int(_)
            | BoxKind::Real(_)
            | BoxKind::FConst { .. }
            | BoxKind::FVar { .. }
            | BoxKind::Slot(_)
            | BoxKind::Button(_)
            | BoxKind::Checkbox(_)
            | BoxKind::Slider { .. } => (0, 1),
            BoxKind::Waveform(_) => (0, 2),
            BoxKind::Cut => (1, 0),
            BoxKind::Wire | BoxKind::Bargraph { .. } => (1, 1),
            BoxKind::Symbolic(_, body) => {
                let (i, o) = self.arity(body, registry)?;
                (i + 1, o)
            }
            BoxKind::Prim(p) => (p.arity(), 1),
            BoxKind::FFun(f) => (f.args.len(), 1),
            BoxKind::Xtended(id) => match registry.get(id) {
                Some(prim) => (prim.arity(), 1),
                None => {
                    return Err(Diagnostic::error(
                        codes::E0205,
                        format!("unknown extended primitive #{}", id.0),
                    ))
                }
            },
            BoxKind::Soundfile { chans, .. } => (2, chans as usize + 2),
            BoxKind::Group(_, _, body) => self.arity(body, registry)?,
            BoxKind::Seq(x, y) => {
                let (in1, out1) = self.arity(x, registry)?;
                let (in2, out2) = self.arity(y, registry)?;
                if out1 >= in2 {
                    (in1, out2 + (out1 - in2))
                } else {
                    (in1 + (in2 - out1), out2)
                }
            }
            BoxKind::Par(x, y) => {
                let (in1, out1) = self.arity(x, registry)?;
                let (in2, out2) = self.arity(y, registry)?;
                (in1 + in2, out1 + out2)
            }
            BoxKind::Split(x, y) => {
                let (in1, out1) = self.arity(x, registry)?;
                let (in2, out2) = self.arity(y, registry)?;
                if out1 == 0 && in2 > 0 {
                    return Err(composition_error(
                        "split composition needs at least one output to distribute",
                        self,
                    ));
                }
                (in1, out2)
            }
            BoxKind::Merge(x, y) => {
                let (in1, _) = self.arity(x, registry)?;
                let (_, out2) = self.arity(y, registry)?;
                (in1, out2)
            }
            BoxKind::Rec(x, y) => {
                let (in1, out1) = self.arity(x, registry)?;
                let (in2, out2) = self.arity(y, registry)?;
                if in2 > out1 || out2 > in1 {
                    return Err(composition_error(
                        &format!(
                            "recursive composition A~B needs outputs(A) >= inputs(B) and inputs(A) >= outputs(B), got A:{in1}->{out1}, B:{in2}->{out2}"
                        ),
                        self,
                    ));
                }
                (in1 - out2, out1)
            }
            BoxKind::Route(ins, outs, _) => match (self.literal_int(ins), self.literal_int(outs)) {
                (Some(i), Some(o)) if i >= 0 && o >= 0 => (i as usize, o as usize),
                _ => {
                    return Err(Diagnostic::error(codes::E0201, "invalid route expression")
                        .with_context(self.display(b).to_string()))
                }
            },
            BoxKind::Environment => (0, 0),
        })
    }

    pub fn display(&self, b: BoxId) -> BoxDisplay<'_> {
        BoxDisplay { arena: self, b }
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Renders a box back in block-diagram notation, fully parenthesized.
pub struct BoxDisplay<'a> {
    arena: &'a BoxArena,
    b: BoxId,
}

impl fmt::Display for BoxDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = |b: BoxId| self.arena.display(b);
        match self.arena.kind(self.b) {
            BoxKind::Int(i) => write!(f, "{i}"),
            BoxKind::Real(r) => write!(f, "{:?}", r.get()),
            BoxKind::Waveform(vs) => {
                write!(f, "waveform{{")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match v {
                        Literal::Int(n) => write!(f, "{n}")?,
                        Literal::Real(r) => write!(f, "{:?}", r.get())?,
                    }
                }
                write!(f, "}}")
            }
            BoxKind::FConst { name, .. } => write!(f, "fconst({name})"),
            BoxKind::FVar { name, .. } => write!(f, "fvar({name})"),
            BoxKind::Cut => write!(f, "!"),
            BoxKind::Wire => write!(f, "_"),
            BoxKind::Slot(s) => write!(f, "x{}", s.0),
            BoxKind::Symbolic(s, body) => write!(f, "\\(x{}).({})", s.0, d(*body)),
            BoxKind::Prim(p) => write!(f, "{}", p.name()),
            BoxKind::FFun(ff) => write!(f, "ffunction({})", ff.name),
            BoxKind::Xtended(id) => write!(f, "xtended#{}", id.0),
            BoxKind::Button(l) => write!(f, "button({l:?})"),
            BoxKind::Checkbox(l) => write!(f, "checkbox({l:?})"),
            BoxKind::Slider {
                kind,
                label,
                cur,
                min,
                max,
                step,
            } => {
                let name = match kind {
                    SliderKind::VSlider => "vslider",
                    SliderKind::HSlider => "hslider",
                    SliderKind::NumEntry => "nentry",
                };
                write!(
                    f,
                    "{name}({label:?}, {}, {}, {}, {})",
                    cur.get(),
                    min.get(),
                    max.get(),
                    step.get()
                )
            }
            BoxKind::Bargraph {
                orient,
                label,
                min,
                max,
            } => write!(
                f,
                "{}bargraph({label:?}, {}, {})",
                orient.prefix(),
                min.get(),
                max.get()
            ),
            BoxKind::Soundfile { label, chans } => write!(f, "soundfile({label:?}, {chans})"),
            BoxKind::Group(o, label, body) => {
                write!(f, "{}group({label:?}, {})", o.prefix(), d(*body))
            }
            BoxKind::Seq(a, b) => write!(f, "({} : {})", d(*a), d(*b)),
            BoxKind::Par(a, b) => write!(f, "({}, {})", d(*a), d(*b)),
            BoxKind::Split(a, b) => write!(f, "({} <: {})", d(*a), d(*b)),
            BoxKind::Merge(a, b) => write!(f, "({} :> {})", d(*a), d(*b)),
            BoxKind::Rec(a, b) => write!(f, "({} ~ {})", d(*a), d(*b)),
            BoxKind::Route(i, o, p) => write!(f, "route({}, {}, {})", d(*i), d(*o), d(*p)),
            BoxKind::Environment => write!(f, "environment{{}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arity_of(arena: &mut BoxArena, b: BoxId) -> (usize, usize) {
        arena.arity(b, &Registry::with_builtins()).unwrap()
    }

    #[test]
    fn leaves_and_primitives() {
        let mut a = BoxArena::new();
        let w = a.wire();
        let c = a.cut();
        let add = a.binop(BinOp::Add);
        let one = a.int(1);
        assert_eq!(arity_of(&mut a, w), (1, 1));
        assert_eq!(arity_of(&mut a, c), (1, 0));
        assert_eq!(arity_of(&mut a, add), (2, 1));
        assert_eq!(arity_of(&mut a, one), (0, 1));
        let rw = a.prim(Prim::RwTable);
        assert_eq!(arity_of(&mut a, rw), (5, 1));
    }

    #[test]
    fn composition_arities() {
        let mut a = BoxArena::new();
        let w = a.wire();
        let add = a.binop(BinOp::Add);
        let ww = a.par(w, w);
        let seq = a.seq(ww, add);
        assert_eq!(arity_of(&mut a, seq), (2, 1));
        let split = a.split(w, ww);
        assert_eq!(arity_of(&mut a, split), (1, 2));
        let merge = a.merge(ww, w);
        assert_eq!(arity_of(&mut a, merge), (2, 1));
        // `+ ~ _` : one free input, one output.
        let rec = a.rec(add, w);
        assert_eq!(arity_of(&mut a, rec), (1, 1));
    }

    #[test]
    fn tolerant_sequence_arities() {
        let mut a = BoxArena::new();
        let w = a.wire();
        let add = a.binop(BinOp::Add);
        let www = a.par(w, w);
        let www = a.par(www, w);
        // 3 outputs into a 2-input box: the extra output is appended.
        let more = a.seq(www, add);
        assert_eq!(arity_of(&mut a, more), (3, 2));
        // 1 output into a 2-input box: the missing input is pulled from outside.
        let less = a.seq(w, add);
        assert_eq!(arity_of(&mut a, less), (2, 1));
    }

    #[test]
    fn invalid_recursion_is_rejected() {
        let mut a = BoxArena::new();
        let w = a.wire();
        let ww = a.par(w, w);
        let bad = a.rec(w, ww);
        let err = a.arity(bad, &Registry::with_builtins()).unwrap_err();
        assert_eq!(err.code, Some(codes::E0204));
    }

    #[test]
    fn route_counts_must_be_literals() {
        let mut a = BoxArena::new();
        let two = a.int(2);
        let w = a.wire();
        let ok = a.route(two, two, two);
        assert_eq!(arity_of(&mut a, ok), (2, 2));
        let bad = a.route(w, two, two);
        assert!(a.arity(bad, &Registry::with_builtins()).is_err());
    }

    #[test]
    fn display_is_parenthesized() {
        let mut a = BoxArena::new();
        let w = a.wire();
        let add = a.binop(BinOp::Add);
        let ww = a.par(w, w);
        let seq = a.seq(ww, add);
        assert_eq!(a.display(seq).to_string(), "((_, _) : +)");
    }
}
