// lower.rs — Box notation to box terms
//
// Walks a parsed notation program and builds the box term of its entry
// definition in the session's box arena.
//
// Names resolve innermost first: lambda parameters, then definitions, then
// named primitives, then the extended primitive registry. Definitions are
// lowered once and shared; a definition that refers to itself is an error.
// Calls of widget, group, route and soundfile names build those boxes from
// their literal arguments; any other call `f(a, b)` is `a, b : f`, padded
// with leading wires when `f` is a primitive with more inputs than the
// arguments supply (`*(2)` is `_, 2 : *`).
//
// Preconditions: `program` is a well-formed AST from the parser.
// Postconditions: the returned box is interned in `s.boxes`.
// Failure modes: unknown names, duplicate or self-referencing definitions,
//   malformed widget/route/foreign arguments (each with a source span).
// Side effects: allocates lambda slots; grows the box arena.

use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::boxes::{BoxKind, Literal, Prim};
use crate::diag::{codes, Diagnostic};
use crate::id::{BoxId, Slot};
use crate::session::Session;
use crate::signal::{ForeignFn, Orientation, Real64, SliderKind};
use crate::types::Nature;

/// Lower the definition named `entry` (usually `process`).
pub fn lower_program(s: &mut Session, program: &Program, entry: &str) -> Result<BoxId, Diagnostic> {
    let mut defs = HashMap::new();
    for def in &program.definitions {
        if defs.insert(def.name.name.as_str(), def).is_some() {
            return Err(Diagnostic::error(
                codes::E0401,
                format!("duplicate definition of '{}'", def.name.name),
            )
            .with_span(def.name.span));
        }
    }
    if !defs.contains_key(entry) {
        return Err(Diagnostic::error(
            codes::E0400,
            format!("no '{entry}' definition to compile"),
        )
        .with_span(program.span));
    }
    let mut lowerer = Lowerer {
        s,
        defs,
        done: HashMap::new(),
        active: HashSet::new(),
        scope: Vec::new(),
    };
    lowerer.definition(entry, program.span)
}

struct Lowerer<'a, 'p> {
    s: &'a mut Session,
    defs: HashMap<&'p str, &'p Definition>,
    done: HashMap<String, BoxId>,
    active: HashSet<String>,
    /// Lambda parameters in scope, innermost last.
    scope: Vec<(String, Slot)>,
}

impl<'p> Lowerer<'_, 'p> {
    fn definition(&mut self, name: &str, use_span: Span) -> Result<BoxId, Diagnostic> {
        if let Some(&b) = self.done.get(name) {
            return Ok(b);
        }
        let Some(&def) = self.defs.get(name) else {
            return Err(unknown(name, use_span));
        };
        if !self.active.insert(name.to_string()) {
            return Err(Diagnostic::error(
                codes::E0401,
                format!("definition '{name}' refers to itself"),
            )
            .with_span(use_span)
            .with_hint("use the `~` operator for feedback"));
        }
        // Definitions do not see the lambda parameters of their use site.
        let outer = std::mem::take(&mut self.scope);
        let result = self.lambda(&def.params, &def.body);
        self.scope = outer;
        self.active.remove(name);
        let b = result?;
        self.done.insert(name.to_string(), b);
        Ok(b)
    }

    fn lambda(&mut self, params: &[Ident], body: &Expr) -> Result<BoxId, Diagnostic> {
        let slots: Vec<Slot> = params.iter().map(|_| self.s.ids.alloc_slot()).collect();
        for (p, &slot) in params.iter().zip(&slots) {
            self.scope.push((p.name.clone(), slot));
        }
        let lowered = self.expr(body);
        self.scope.truncate(self.scope.len() - params.len());
        let mut b = lowered?;
        for &slot in slots.iter().rev() {
            b = self.s.boxes.symbolic(slot, b);
        }
        Ok(b)
    }

    fn expr(&mut self, e: &Expr) -> Result<BoxId, Diagnostic> {
        let boxes = &mut self.s.boxes;
        Ok(match &e.kind {
            ExprKind::Int(n) => boxes.int(int_literal(*n, e.span)?),
            ExprKind::Real(v) => boxes.real(*v),
            ExprKind::Str(_) => {
                return Err(Diagnostic::error(
                    codes::E0401,
                    "a string is only valid as a widget, group or soundfile label",
                )
                .with_span(e.span))
            }
            ExprKind::Wire => boxes.wire(),
            ExprKind::Cut => boxes.cut(),
            ExprKind::Ident(name) => self.ident(name, e.span)?,
            ExprKind::OpBox(op) => boxes.prim(prim_of(*op)),
            ExprKind::Compose(c, l, r) => {
                let l = self.expr(l)?;
                let r = self.expr(r)?;
                let boxes = &mut self.s.boxes;
                match c {
                    Composition::Seq => boxes.seq(l, r),
                    Composition::Par => boxes.par(l, r),
                    Composition::Split => boxes.split(l, r),
                    Composition::Merge => boxes.merge(l, r),
                    Composition::Rec => boxes.rec(l, r),
                }
            }
            ExprKind::Infix(op, l, r) => {
                let l = self.expr(l)?;
                let r = self.expr(r)?;
                let boxes = &mut self.s.boxes;
                let args = boxes.par(l, r);
                let p = boxes.prim(prim_of(*op));
                boxes.seq(args, p)
            }
            ExprKind::Mem(x) => {
                let x = self.expr(x)?;
                let m = self.s.boxes.prim(Prim::Mem);
                self.s.boxes.seq(x, m)
            }
            ExprKind::Call(f, args) => self.call(f, args, e.span)?,
            ExprKind::Lambda(params, body) => self.lambda(params, body)?,
            ExprKind::Waveform(values) => {
                let values = values
                    .iter()
                    .map(|v| match v.kind {
                        ExprKind::Int(n) => Ok(Literal::Int(int_literal(n, v.span)?)),
                        ExprKind::Real(r) => Ok(Literal::Real(Real64::new(r))),
                        _ => Err(bad_arg("waveform values must be numbers", v.span)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.s.boxes.intern(BoxKind::Waveform(values))
            }
            ExprKind::Environment => boxes.intern(BoxKind::Environment),
            ExprKind::Foreign(decl) => self.foreign(decl)?,
        })
    }

    fn ident(&mut self, name: &str, span: Span) -> Result<BoxId, Diagnostic> {
        if let Some((_, slot)) = self.scope.iter().rev().find(|(n, _)| n == name) {
            return Ok(self.s.boxes.slot(*slot));
        }
        if self.defs.contains_key(name) {
            return self.definition(name, span);
        }
        if let Some(p) = Prim::by_name(name) {
            return Ok(self.s.boxes.prim(p));
        }
        if let Some(id) = self.s.registry.lookup(name) {
            return Ok(self.s.boxes.intern(BoxKind::Xtended(id)));
        }
        Err(unknown(name, span))
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.scope.iter().any(|(n, _)| n == name) || self.defs.contains_key(name)
    }

    // ── Calls ────────────────────────────────────────────────────────────

    fn call(&mut self, f: &Expr, args: &[Expr], span: Span) -> Result<BoxId, Diagnostic> {
        if let ExprKind::Ident(name) = &f.kind {
            if !self.is_shadowed(name) {
                if let Some(b) = self.builtin_call(name, args, span)? {
                    return Ok(b);
                }
            }
        }
        let callee = self.expr(f)?;
        if args.is_empty() {
            return Ok(callee);
        }
        let mut lowered = Vec::with_capacity(args.len());
        for a in args {
            lowered.push(self.expr(a)?);
        }
        let pads_left = matches!(
            self.s.boxes.kind(callee),
            BoxKind::Prim(_) | BoxKind::Xtended(_) | BoxKind::FFun(_)
        );
        if pads_left {
            let (ins, _) = self.s.boxes.arity(callee, &self.s.registry)?;
            let mut supplied = 0;
            for &a in &lowered {
                supplied += self.s.boxes.arity(a, &self.s.registry)?.1;
            }
            let wire = self.s.boxes.wire();
            let mut padded = vec![wire; ins.saturating_sub(supplied)];
            padded.extend(lowered);
            lowered = padded;
        }
        let Some(args) = self.s.boxes.par_all(&lowered) else {
            return Ok(callee);
        };
        Ok(self.s.boxes.seq(args, callee))
    }

    /// Widget, group, route and soundfile constructors.
    fn builtin_call(
        &mut self,
        name: &str,
        args: &[Expr],
        span: Span,
    ) -> Result<Option<BoxId>, Diagnostic> {
        let kind = match name {
            "button" | "checkbox" => {
                let [label] = expect_args::<1>(name, args, span)?;
                let label = string_arg(label)?;
                if name == "button" {
                    BoxKind::Button(label)
                } else {
                    BoxKind::Checkbox(label)
                }
            }
            "hslider" | "vslider" | "nentry" => {
                let [label, cur, min, max, step] = expect_args::<5>(name, args, span)?;
                let kind = match name {
                    "hslider" => SliderKind::HSlider,
                    "vslider" => SliderKind::VSlider,
                    _ => SliderKind::NumEntry,
                };
                BoxKind::Slider {
                    kind,
                    label: string_arg(label)?,
                    cur: Real64::new(number_arg(cur)?),
                    min: Real64::new(number_arg(min)?),
                    max: Real64::new(number_arg(max)?),
                    step: Real64::new(number_arg(step)?),
                }
            }
            "hbargraph" | "vbargraph" => {
                let [label, min, max] = expect_args::<3>(name, args, span)?;
                BoxKind::Bargraph {
                    orient: if name == "hbargraph" {
                        Orientation::Horizontal
                    } else {
                        Orientation::Vertical
                    },
                    label: string_arg(label)?,
                    min: Real64::new(number_arg(min)?),
                    max: Real64::new(number_arg(max)?),
                }
            }
            "hgroup" | "vgroup" | "tgroup" => {
                let [label, body] = expect_args::<2>(name, args, span)?;
                let orient = match name {
                    "hgroup" => Orientation::Horizontal,
                    "vgroup" => Orientation::Vertical,
                    _ => Orientation::Tab,
                };
                let label = string_arg(label)?;
                let body = self.expr(body)?;
                BoxKind::Group(orient, label, body)
            }
            "soundfile" => {
                let [label, chans] = expect_args::<2>(name, args, span)?;
                let n = number_arg(chans)?;
                if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
                    return Err(bad_arg("channel count must be a non-negative integer", chans.span));
                }
                BoxKind::Soundfile {
                    label: string_arg(label)?,
                    chans: n as u32,
                }
            }
            "route" => return self.route(args, span).map(Some),
            _ => return Ok(None),
        };
        Ok(Some(self.s.boxes.intern(kind)))
    }

    fn route(&mut self, args: &[Expr], span: Span) -> Result<BoxId, Diagnostic> {
        let mut numbers = Vec::new();
        for a in args {
            flatten_ints(a, &mut numbers)?;
        }
        if numbers.len() < 4 || numbers.len() % 2 != 0 {
            return Err(bad_arg(
                "route expects input and output counts followed by source/destination pairs",
                span,
            ));
        }
        let boxes = &mut self.s.boxes;
        let ins = boxes.int(numbers[0]);
        let outs = boxes.int(numbers[1]);
        let pairs: Vec<BoxId> = numbers[2..].iter().map(|&n| boxes.int(n)).collect();
        let Some(pairs) = boxes.par_all(&pairs) else {
            return Err(bad_arg("route has no pairs", span));
        };
        Ok(boxes.route(ins, outs, pairs))
    }

    // ── Foreign declarations ─────────────────────────────────────────────

    fn foreign(&mut self, decl: &ForeignDecl) -> Result<BoxId, Diagnostic> {
        let nature = nature_of(&decl.result)?;
        let name = decl.name.name.clone();
        let file = decl.file.clone();
        let kind = match decl.kind {
            ForeignKind::Function => BoxKind::FFun(ForeignFn {
                name,
                result: nature,
                args: decl.args.iter().map(nature_of).collect::<Result<_, _>>()?,
                file,
            }),
            ForeignKind::Const => BoxKind::FConst { nature, name, file },
            ForeignKind::Var => BoxKind::FVar { nature, name, file },
        };
        Ok(self.s.boxes.intern(kind))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn unknown(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(codes::E0400, format!("unknown identifier '{name}'")).with_span(span)
}

fn bad_arg(message: &str, span: Span) -> Diagnostic {
    Diagnostic::error(codes::E0401, message.to_string()).with_span(span)
}

fn prim_of(op: Operator) -> Prim {
    match op {
        Operator::Bin(b) => Prim::Bin(b),
        Operator::Delay => Prim::Delay,
    }
}

fn int_literal(n: i64, span: Span) -> Result<i32, Diagnostic> {
    i32::try_from(n).map_err(|_| bad_arg("integer literal out of range", span))
}

fn nature_of(id: &Ident) -> Result<Nature, Diagnostic> {
    match id.name.as_str() {
        "int" => Ok(Nature::Int),
        "real" | "float" | "double" => Ok(Nature::Real),
        other => Err(bad_arg(
            &format!("unknown foreign type '{other}' (expected int or real)"),
            id.span,
        )),
    }
}

fn expect_args<'e, const N: usize>(
    name: &str,
    args: &'e [Expr],
    span: Span,
) -> Result<&'e [Expr; N], Diagnostic> {
    args.try_into().map_err(|_| {
        bad_arg(
            &format!("'{name}' expects {N} argument(s), got {}", args.len()),
            span,
        )
    })
}

fn string_arg(e: &Expr) -> Result<String, Diagnostic> {
    match &e.kind {
        ExprKind::Str(s) => Ok(s.clone()),
        _ => Err(bad_arg("expected a string label", e.span)),
    }
}

fn number_arg(e: &Expr) -> Result<f64, Diagnostic> {
    match e.kind {
        ExprKind::Int(n) => Ok(n as f64),
        ExprKind::Real(v) => Ok(v),
        _ => Err(bad_arg("expected a numeric literal", e.span)),
    }
}

fn flatten_ints(e: &Expr, out: &mut Vec<i32>) -> Result<(), Diagnostic> {
    match &e.kind {
        ExprKind::Compose(Composition::Par, l, r) => {
            flatten_ints(l, out)?;
            flatten_ints(r, out)
        }
        ExprKind::Int(n) => {
            out.push(int_literal(*n, e.span)?);
            Ok(())
        }
        _ => Err(bad_arg("route arguments must be integer literals", e.span)),
    }
}
