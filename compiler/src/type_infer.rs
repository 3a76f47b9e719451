// type_infer.rs — Signal typing rules
//
// Abstract interpretation of one signal under the current hypothesis for
// every recursive group. Each node is typed once per inference epoch: the
// visit stamp on the node says whether its stored type belongs to the
// current epoch. Recursive groups are never descended into here; their
// types are set by the fixpoint solver (`fixpoint.rs`) before the bodies
// and the roots are typed.
//
// Preconditions: the signals are symbolic (no de Bruijn nodes).
// Postconditions: every node reached gets a type stamped with the epoch.
// Failure modes: shape errors from the type algebra, projection errors,
//   table operand errors, soundfile part bounds, causality violations,
//   non-constant bounds, unknown extended primitives.
// Side effects: writes types and visit stamps into the signal arena.

use crate::diag::{codes, Diagnostic};
use crate::id::{SigId, Type};
use crate::interval::Interval;
use crate::session::Session;
use crate::signal::{BinOp, SigKind};
use crate::types::{
    Attrs, Boolean, Computability, Nature, Variability, Vectorability,
};

/// Certified type of a signal typed by the last annotation.
pub fn get_certified_type(s: &Session, sig: SigId) -> Result<Type, Diagnostic> {
    s.sigs.ty(sig).ok_or_else(|| {
        Diagnostic::error(codes::E0309, format!("signal {sig} was never typed"))
            .with_hint("run type annotation on a term that reaches this signal")
    })
}

/// Interval of a binary operation from the intervals of its operands.
pub fn arithmetic(op: BinOp, x: Interval, y: Interval) -> Interval {
    match op {
        BinOp::Add => x.add(y),
        BinOp::Sub => x.sub(y),
        BinOp::Mul => x.mul(y),
        BinOp::Div => x.div(y),
        BinOp::Rem => x.rem(y),
        BinOp::Lsh => x.shl(y),
        BinOp::ARsh => x.shr(y),
        BinOp::Gt => x.greater(y),
        BinOp::Lt => x.less(y),
        BinOp::Ge => x.greater_eq(y),
        BinOp::Le => x.less_eq(y),
        BinOp::Eq => x.equal(y),
        BinOp::Ne => x.not_equal(y),
        BinOp::And => x.and(y),
        BinOp::Or => x.or(y),
        BinOp::Xor => x.xor(y),
    }
}

const SOUNDFILE_RANGE: (f64, f64) = (0.0, i32::MAX as f64);

/// Types signals within one epoch.
pub(crate) struct Inferer<'a> {
    pub(crate) s: &'a mut Session,
    epoch: u64,
}

impl<'a> Inferer<'a> {
    pub(crate) fn new(s: &'a mut Session) -> Self {
        let epoch = s.epoch();
        Inferer { s, epoch }
    }

    /// Type of `sig`, inferred at most once per epoch.
    pub(crate) fn ty(&mut self, sig: SigId) -> Result<Type, Diagnostic> {
        if self.s.sigs.is_visited(sig, self.epoch) {
            if let Some(t) = self.s.sigs.ty(sig) {
                return Ok(t);
            }
        }
        let t = self.infer(sig)?;
        self.s.sigs.set_ty(sig, t);
        self.s.sigs.set_visited(sig, self.epoch);
        Ok(t)
    }

    fn simple(&mut self, n: Nature, v: Variability, c: Computability, i: Interval) -> Type {
        self.s
            .types
            .make_simple(n, v, c, Vectorability::Vect, Boolean::Num, i)
    }

    fn infer(&mut self, sig: SigId) -> Result<Type, Diagnostic> {
        let kind = self.s.sigs.kind(sig).clone();
        match kind {
            SigKind::Int(i) => Ok(self.simple(
                Nature::Int,
                Variability::Konst,
                Computability::Comp,
                Interval::point(i as f64),
            )),
            SigKind::Real(r) => Ok(self.simple(
                Nature::Real,
                Variability::Konst,
                Computability::Comp,
                Interval::point(r.get()),
            )),
            SigKind::Input(_) => Ok(self.s.types.tinput()),

            // ── Delays ───────────────────────────────────────────────────
            SigKind::Delay1(x) => {
                let t = self.ty(x)?;
                let i = self.s.types.interval(t).reunion(Interval::point(0.0));
                let t = self.s.types.samp_cast(t);
                Ok(self.s.types.with_interval(t, i))
            }
            SigKind::Prefix(init, x) => {
                let t1 = self.ty(init)?;
                let t2 = self.ty(x)?;
                self.s.types.check_init(t1)?;
                let i = self.s.types.interval(t1).reunion(self.s.types.interval(t2));
                let j = self.s.types.join(t1, t2)?;
                let t = self.s.types.samp_cast(j);
                Ok(self.s.types.with_interval(t, i))
            }
            SigKind::Delay(x, d) => {
                let t1 = self.ty(x)?;
                let t2 = self.ty(d)?;
                if self.s.options.causality {
                    self.check_delay_amount(sig, t2)?;
                }
                let i = self.s.types.interval(t1).reunion(Interval::point(0.0));
                let t = self.s.types.samp_cast(t1);
                Ok(self.s.types.with_interval(t, i))
            }

            // ── Arithmetic ───────────────────────────────────────────────
            SigKind::BinOp(op, a, b) => {
                let t1 = self.ty(a)?;
                let t2 = self.ty(b)?;
                let types = &mut self.s.types;
                let i = arithmetic(op, types.interval(t1), types.interval(t2));
                let j = types.join(t1, t2)?;
                let t3 = types.with_interval(j, i);
                Ok(if op == BinOp::Div {
                    types.float_cast(t3)
                } else if op.is_comparison() {
                    types.bool_cast(t3)
                } else {
                    t3
                })
            }
            SigKind::IntCast(x) => {
                let t = self.ty(x)?;
                Ok(self.s.types.int_cast(t))
            }
            SigKind::FloatCast(x) => {
                let t = self.ty(x)?;
                Ok(self.s.types.float_cast(t))
            }

            // ── Foreign declarations ─────────────────────────────────────
            SigKind::FFun(ff, args) => {
                if args.is_empty() {
                    return Ok(self.simple(
                        ff.result,
                        Variability::Samp,
                        Computability::Init,
                        Interval::invalid(),
                    ));
                }
                let mut t = self.simple(
                    Nature::Int,
                    Variability::Konst,
                    Computability::Init,
                    Interval::invalid(),
                );
                for a in args {
                    let ta = self.ty(a)?;
                    t = self.s.types.join(t, ta)?;
                }
                let env = self.s.types.attrs(t);
                Ok(self.s.types.simple(Attrs::new(
                    ff.result,
                    env.variability,
                    env.computability,
                    env.vectorability,
                    env.boolean,
                    Interval::invalid(),
                )))
            }
            SigKind::FConst { nature, .. } => Ok(self.simple(
                nature,
                Variability::Konst,
                Computability::Comp,
                Interval::invalid(),
            )),
            SigKind::FVar { nature, .. } => Ok(self.simple(
                nature,
                Variability::Block,
                Computability::Exec,
                Interval::invalid(),
            )),

            // ── User interface ───────────────────────────────────────────
            SigKind::Button(_) | SigKind::Checkbox(_) => Ok(self.s.types.tgui01()),
            SigKind::Slider {
                cur,
                min,
                max,
                step,
                ..
            } => {
                let mut t = self.s.types.tgui();
                for x in [cur, min, max, step] {
                    let tx = self.ty(x)?;
                    t = self.s.types.join(t, tx)?;
                }
                let lo = self.constant_value(min)?;
                let hi = self.constant_value(max)?;
                Ok(self.s.types.with_interval(t, Interval::new(lo, hi)))
            }
            SigKind::Bargraph { min, max, input, .. } => {
                self.ty(min)?;
                self.ty(max)?;
                let t = self.ty(input)?;
                Ok(self.s.types.promote_variability(t, Variability::Block))
            }

            // ── Soundfiles ───────────────────────────────────────────────
            SigKind::Soundfile(_) => Ok(self.simple(
                Nature::Int,
                Variability::Block,
                Computability::Exec,
                Interval::new(SOUNDFILE_RANGE.0, SOUNDFILE_RANGE.1),
            )),
            SigKind::SoundfileLength(sf, part) | SigKind::SoundfileRate(sf, part) => {
                self.ty(sf)?;
                let tp = self.ty(part)?;
                self.check_part(sig, tp)?;
                let v = self.s.types.variability(tp).max(Variability::Block);
                Ok(self.simple(
                    Nature::Int,
                    v,
                    Computability::Exec,
                    Interval::new(SOUNDFILE_RANGE.0, SOUNDFILE_RANGE.1),
                ))
            }
            SigKind::SoundfileBuffer {
                sf,
                chan,
                part,
                index,
            } => {
                self.ty(sf)?;
                self.ty(chan)?;
                let tp = self.ty(part)?;
                self.ty(index)?;
                self.check_part(sig, tp)?;
                Ok(self.simple(
                    Nature::Real,
                    Variability::Samp,
                    Computability::Exec,
                    Interval::invalid(),
                ))
            }

            // ── Sequencing ───────────────────────────────────────────────
            SigKind::Attach(x, y) | SigKind::Enable(x, y) | SigKind::Control(x, y) => {
                self.ty(y)?;
                self.ty(x)
            }
            SigKind::Select2(sel, a, b) => {
                let ts = self.ty(sel)?;
                let t1 = self.ty(a)?;
                let t2 = self.ty(b)?;
                let types = &mut self.s.types;
                let (x, y, z) = (types.attrs(t1), types.attrs(t2), types.attrs(ts));
                Ok(types.simple(Attrs::new(
                    x.nature.max(y.nature),
                    x.variability.max(y.variability).max(z.variability),
                    x.computability.max(y.computability).max(z.computability),
                    x.vectorability.max(y.vectorability).max(z.vectorability),
                    x.boolean.max(y.boolean),
                    x.interval.reunion(y.interval),
                )))
            }
            SigKind::AssertBounds(lo, hi, x) => {
                self.ty(lo)?;
                self.ty(hi)?;
                let t = self.ty(x)?;
                let bounds = Interval::new(self.constant_value(lo)?, self.constant_value(hi)?);
                let i = self.s.types.interval(t);
                let clamped = if i.valid {
                    i.intersection(bounds)
                } else {
                    bounds
                };
                Ok(self.s.types.with_interval(t, clamped))
            }
            SigKind::Lowest(x) => {
                let t = self.ty(x)?;
                let lo = self.s.types.interval(t).lo;
                Ok(self.bound_constant(lo))
            }
            SigKind::Highest(x) => {
                let t = self.ty(x)?;
                let hi = self.s.types.interval(t).hi;
                Ok(self.bound_constant(hi))
            }

            // ── Tables ───────────────────────────────────────────────────
            SigKind::Table { size, gen } => {
                let ts = self.ty(size)?;
                self.s.types.check_int(ts)?;
                self.s.types.check_konst(ts)?;
                self.s.types.check_init(ts)?;
                let tc = self.ty(gen)?;
                self.s.types.check_init(tc)?;
                Ok(self.s.types.table(tc))
            }
            SigKind::Gen(content) => self.ty(content),
            SigKind::WrTable { table, index, data } => {
                let tt = self.ty(table)?;
                let ti = self.ty(index)?;
                let td = self.ty(data)?;
                let content = self.table_content(sig, tt)?;
                self.check_index(sig, ti)?;
                let types = &self.s.types;
                let (i, d) = (types.attrs(ti), types.attrs(td));
                let env = Attrs::new(
                    d.nature,
                    i.variability.max(d.variability),
                    i.computability.max(d.computability),
                    i.vectorability.max(d.vectorability),
                    d.boolean,
                    d.interval,
                );
                Ok(self.s.types.table_with(content, env))
            }
            SigKind::RdTable { table, index } => {
                let tt = self.ty(table)?;
                let ti = self.ty(index)?;
                self.table_content(sig, tt)?;
                self.check_index(sig, ti)?;
                let types = &mut self.s.types;
                let (t, i) = (types.attrs(tt), types.attrs(ti));
                Ok(types.simple(Attrs::new(
                    t.nature,
                    t.variability.max(i.variability),
                    t.computability.max(i.computability),
                    t.vectorability.max(i.vectorability),
                    t.boolean,
                    t.interval,
                )))
            }

            // ── Waveforms ────────────────────────────────────────────────
            SigKind::Waveform(values) => {
                if values.is_empty() {
                    return Err(Diagnostic::error(codes::E0308, "empty waveform"));
                }
                let mut lo = f64::INFINITY;
                let mut hi = f64::NEG_INFINITY;
                let mut all_int = true;
                for &v in &values {
                    self.ty(v)?;
                    let Some(n) = self.s.sigs.numeric(v) else {
                        return Err(Diagnostic::error(
                            codes::E0310,
                            format!("waveform value {v} is not a number"),
                        ));
                    };
                    all_int &= matches!(self.s.sigs.kind(v), SigKind::Int(_));
                    lo = lo.min(n.as_f64());
                    hi = hi.max(n.as_f64());
                }
                let nature = if all_int { Nature::Int } else { Nature::Real };
                Ok(self.s.types.make_simple(
                    nature,
                    Variability::Samp,
                    Computability::Comp,
                    Vectorability::Scal,
                    Boolean::Num,
                    Interval::new(lo, hi),
                ))
            }

            // ── Extended primitives ──────────────────────────────────────
            SigKind::Xtended(id, args) => {
                let mut types = Vec::with_capacity(args.len());
                for a in args {
                    types.push(self.ty(a)?);
                }
                self.s.registry.infer_type(id, &mut self.s.types, &types)
            }

            // ── Recursion and lists ──────────────────────────────────────
            SigKind::Proj(i, group) => {
                let t = self.ty(group)?;
                self.projection(t, i)
            }
            SigKind::Rec(var) => Err(Diagnostic::error(
                codes::E0311,
                format!("recursive group W{} has no type hypothesis", var.0),
            )),
            SigKind::Nil => Ok(self.s.types.tuplet(Vec::new())),
            SigKind::Cons(head, tail) => {
                let th = self.ty(head)?;
                let tt = self.ty(tail)?;
                Ok(self.s.types.product(th, tt))
            }
            SigKind::DbRef(_) | SigKind::DbRec(_) => Err(Diagnostic::error(
                codes::E0300,
                format!("unrecognized signal {sig}: de Bruijn recursion must be symbolized first"),
            )),
        }
    }

    fn bound_constant(&mut self, v: f64) -> Type {
        self.simple(
            Nature::Real,
            Variability::Konst,
            Computability::Comp,
            Interval::point(v),
        )
    }

    /// Component `i` of a tuplet, promoted to the tuplet's variability and
    /// computability, and made scalar.
    fn projection(&mut self, t: Type, i: u32) -> Result<Type, Diagnostic> {
        let types = &mut self.s.types;
        let Some(items) = types.tuplet_items(t) else {
            return Err(Diagnostic::error(
                codes::E0301,
                "projection of a signal that is not a tuplet",
            )
            .with_context(types.display(t).to_string()));
        };
        let Some(&item) = items.get(i as usize) else {
            return Err(Diagnostic::error(
                codes::E0302,
                format!("projection index {i} out of range for {} items", items.len()),
            )
            .with_context(types.display(t).to_string()));
        };
        let v = types.variability(t);
        let c = types.computability(t);
        let item = types.promote_variability(item, v);
        let item = types.promote_computability(item, c);
        Ok(types.promote_vectorability(item, Vectorability::Scal))
    }

    /// Value of a compile-time constant signal.
    fn constant_value(&self, sig: SigId) -> Result<f64, Diagnostic> {
        let types = &self.s.types;
        if let Some(t) = self.s.sigs.ty(sig) {
            let i = types.interval(t);
            if types.variability(t) == Variability::Konst && i.is_point() {
                return Ok(i.lo);
            }
        }
        Err(Diagnostic::error(
            codes::E0310,
            format!("{sig} must be a constant value known at compile time"),
        ))
    }

    fn check_delay_amount(&self, sig: SigId, t: Type) -> Result<(), Diagnostic> {
        let i = self.s.types.interval(t);
        if !i.is_bounded() {
            return Err(Diagnostic::error(
                codes::E0303,
                format!("can't compute the min and max values of the delay amount in {sig}"),
            )
            .with_hint("the amount is probably a recursive signal; bound it explicitly"));
        }
        if i.lo < 0.0 {
            return Err(Diagnostic::error(
                codes::E0304,
                format!("possible negative delay amount {i} in {sig}"),
            ));
        }
        Ok(())
    }

    fn check_part(&self, sig: SigId, t: Type) -> Result<(), Diagnostic> {
        let i = self.s.types.interval(t);
        let max = self.s.options.max_soundfile_parts as f64;
        if !i.valid || i.lo < 0.0 || i.hi >= max {
            return Err(Diagnostic::error(
                codes::E0305,
                format!(
                    "out of range soundfile part number {i} in {sig}, expected within [0, {}]",
                    max - 1.0
                ),
            ));
        }
        Ok(())
    }

    fn table_content(&self, sig: SigId, t: Type) -> Result<Type, Diagnostic> {
        self.s.types.table_content(t).ok_or_else(|| {
            Diagnostic::error(codes::E0306, format!("table operand of {sig} is not a table"))
                .with_context(self.s.types.display(t).to_string())
        })
    }

    fn check_index(&self, sig: SigId, t: Type) -> Result<(), Diagnostic> {
        let types = &self.s.types;
        if types.is_simple(t) && types.nature(t) == Nature::Int {
            Ok(())
        } else {
            Err(Diagnostic::error(
                codes::E0307,
                format!("table index of {sig} must be an integer"),
            )
            .with_context(types.display(t).to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerOptions;
    use crate::id::PathId;
    use crate::signal::{ForeignFn, SliderKind};

    fn type_of(s: &mut Session, sig: SigId) -> Result<Type, Diagnostic> {
        s.next_epoch();
        Inferer::new(s).ty(sig)
    }

    fn shown(s: &mut Session, sig: SigId) -> String {
        let t = type_of(s, sig).unwrap();
        s.types.display(t).to_string()
    }

    #[test]
    fn literals_are_constant_points() {
        let mut s = Session::default();
        let one = s.sigs.int(1);
        insta::assert_snapshot!(shown(&mut s, one), @"NKCVN [1, 1]");
    }

    #[test]
    fn integer_division_is_real() {
        let mut s = Session::default();
        let a = s.sigs.int(1);
        let b = s.sigs.input(0);
        let int_b = s.sigs.int_cast(b);
        let d = s.sigs.binop(BinOp::Div, a, int_b);
        let t = type_of(&mut s, d).unwrap();
        assert_eq!(s.types.nature(t), Nature::Real);
    }

    #[test]
    fn comparison_is_boolean_int() {
        let mut s = Session::default();
        let a = s.sigs.input(0);
        let b = s.sigs.input(1);
        let c = s.sigs.binop(BinOp::Lt, a, b);
        let t = type_of(&mut s, c).unwrap();
        assert_eq!(s.types.nature(t), Nature::Int);
        assert_eq!(s.types.boolean(t), Boolean::Bool);
        assert_eq!(s.types.interval(t), Interval::new(0.0, 1.0));
    }

    #[test]
    fn delay1_is_sample_rate_and_includes_zero() {
        let mut s = Session::default();
        let five = s.sigs.int(5);
        let m = s.sigs.delay1(five);
        insta::assert_snapshot!(shown(&mut s, m), @"NSCVN [0, 5]");
    }

    #[test]
    fn causality_rejects_unbounded_delays_only_when_enabled() {
        let mut s = Session::default();
        let x = s.sigs.input(0);
        let d = s.sigs.input(1);
        let delayed = s.sigs.delay(x, d);
        assert!(type_of(&mut s, delayed).is_ok());

        let mut s = Session::new(CompilerOptions {
            causality: true,
            ..CompilerOptions::default()
        });
        let x = s.sigs.input(0);
        let d = s.sigs.input(1);
        let delayed = s.sigs.delay(x, d);
        let err = type_of(&mut s, delayed).unwrap_err();
        assert_eq!(err.code, Some(codes::E0303));

        let neg = s.sigs.int(-2);
        let delayed = s.sigs.delay(x, neg);
        let err = type_of(&mut s, delayed).unwrap_err();
        assert_eq!(err.code, Some(codes::E0304));

        let ok = s.sigs.int(4);
        let delayed = s.sigs.delay(x, ok);
        assert!(type_of(&mut s, delayed).is_ok());
    }

    #[test]
    fn prefix_requires_init_time_value() {
        let mut s = Session::default();
        let x = s.sigs.input(0);
        let p = s.sigs.intern(SigKind::Prefix(x, x));
        let err = type_of(&mut s, p).unwrap_err();
        assert_eq!(err.code, Some(codes::E0104));
    }

    #[test]
    fn table_write_then_read_is_real() {
        let mut s = Session::default();
        let size = s.sigs.int(8);
        let zero = s.sigs.int(0);
        let gen = s.sigs.intern(SigKind::Gen(zero));
        let table = s.sigs.intern(SigKind::Table { size, gen });
        let idx = s.sigs.int(3);
        let value = s.sigs.real(0.25);
        let written = s.sigs.intern(SigKind::WrTable {
            table,
            index: idx,
            data: value,
        });
        let read = s.sigs.intern(SigKind::RdTable {
            table: written,
            index: idx,
        });
        let t = type_of(&mut s, read).unwrap();
        assert_eq!(s.types.nature(t), Nature::Real);
    }

    #[test]
    fn table_size_must_be_a_constant() {
        let mut s = Session::default();
        let rand = s.sigs.intern(SigKind::FFun(
            ForeignFn {
                name: "rand".into(),
                result: Nature::Int,
                args: vec![],
                file: "stdlib.h".into(),
            },
            vec![],
        ));
        let zero = s.sigs.int(0);
        let gen = s.sigs.intern(SigKind::Gen(zero));
        let table = s.sigs.intern(SigKind::Table { size: rand, gen });
        let err = type_of(&mut s, table).unwrap_err();
        assert_eq!(err.code, Some(codes::E0103));

        let size = s.sigs.int(16);
        let table = s.sigs.intern(SigKind::Table { size, gen });
        assert!(type_of(&mut s, table).is_ok());
    }

    #[test]
    fn table_operand_must_be_a_table() {
        let mut s = Session::default();
        let x = s.sigs.input(0);
        let idx = s.sigs.int(0);
        let read = s.sigs.intern(SigKind::RdTable { table: x, index: idx });
        let err = type_of(&mut s, read).unwrap_err();
        assert_eq!(err.code, Some(codes::E0306));
    }

    #[test]
    fn projection_of_non_tuplet_is_fatal() {
        let mut s = Session::default();
        let x = s.sigs.input(0);
        let p = s.sigs.proj(0, x);
        let err = type_of(&mut s, p).unwrap_err();
        assert_eq!(err.code, Some(codes::E0301));

        let l = s.sigs.list(&[x]);
        let p = s.sigs.proj(3, l);
        let err = type_of(&mut s, p).unwrap_err();
        assert_eq!(err.code, Some(codes::E0302));
    }

    #[test]
    fn lists_type_as_tuplets() {
        let mut s = Session::default();
        let one = s.sigs.int(1);
        let x = s.sigs.input(0);
        let l = s.sigs.list(&[one, x]);
        insta::assert_snapshot!(shown(&mut s, l), @"SE [?] : {NKCVN [1, 1]*RSEVN [?]}");
    }

    #[test]
    fn slider_interval_is_its_range() {
        let mut s = Session::default();
        let [cur, min, max, step] = [0.5, 0.0, 1.0, 0.1].map(|v| s.sigs.real(v));
        let slider = s.sigs.intern(SigKind::Slider {
            kind: SliderKind::HSlider,
            path: PathId(0),
            cur,
            min,
            max,
            step,
        });
        insta::assert_snapshot!(shown(&mut s, slider), @"RBEVN [0, 1]");
    }

    #[test]
    fn soundfile_part_must_be_in_range() {
        let mut s = Session::default();
        let sf = s.sigs.intern(SigKind::Soundfile(PathId(0)));
        let part = s.sigs.int(300);
        let len = s.sigs.intern(SigKind::SoundfileLength(sf, part));
        let err = type_of(&mut s, len).unwrap_err();
        assert_eq!(err.code, Some(codes::E0305));

        let part = s.sigs.int(1);
        let len = s.sigs.intern(SigKind::SoundfileLength(sf, part));
        let t = type_of(&mut s, len).unwrap();
        assert_eq!(s.types.variability(t), Variability::Block);
    }

    #[test]
    fn foreign_function_takes_declared_nature() {
        let mut s = Session::default();
        let x = s.sigs.input(0);
        let ff = ForeignFn {
            name: "lrint".into(),
            result: Nature::Int,
            args: vec![Nature::Real],
            file: "math.h".into(),
        };
        let call = s.sigs.intern(SigKind::FFun(ff.clone(), vec![x]));
        insta::assert_snapshot!(shown(&mut s, call), @"NSEVN [?]");

        let rand = s.sigs.intern(SigKind::FFun(
            ForeignFn {
                args: vec![],
                ..ff
            },
            vec![],
        ));
        insta::assert_snapshot!(shown(&mut s, rand), @"NSIVN [?]");
    }

    #[test]
    fn assert_bounds_intersects_known_intervals() {
        let mut s = Session::default();
        let lo = s.sigs.int(0);
        let hi = s.sigs.int(10);
        let x = s.sigs.int(5);
        let m = s.sigs.delay1(x);
        let bounded = s.sigs.intern(SigKind::AssertBounds(lo, hi, m));
        let t = type_of(&mut s, bounded).unwrap();
        assert_eq!(s.types.interval(t), Interval::new(0.0, 5.0));

        let input = s.sigs.input(0);
        let bounded = s.sigs.intern(SigKind::AssertBounds(lo, hi, input));
        let t = type_of(&mut s, bounded).unwrap();
        assert_eq!(s.types.interval(t), Interval::new(0.0, 10.0));
    }

    #[test]
    fn waveform_nature_follows_values() {
        let mut s = Session::default();
        let a = s.sigs.int(1);
        let b = s.sigs.int(-3);
        let w = s.sigs.intern(SigKind::Waveform(vec![a, b]));
        insta::assert_snapshot!(shown(&mut s, w), @"NSCSN [-3, 1]");

        let empty = s.sigs.intern(SigKind::Waveform(vec![]));
        let err = type_of(&mut s, empty).unwrap_err();
        assert_eq!(err.code, Some(codes::E0308));
    }

    #[test]
    fn unannotated_recursion_is_fatal() {
        let mut s = Session::default();
        let var = s.ids.alloc_rec_var();
        let r = s.sigs.rec(var);
        let err = type_of(&mut s, r).unwrap_err();
        assert_eq!(err.code, Some(codes::E0311));
    }

    #[test]
    fn certified_type_requires_annotation() {
        let mut s = Session::default();
        let x = s.sigs.input(0);
        assert!(get_certified_type(&s, x).is_err());
        type_of(&mut s, x).unwrap();
        assert!(get_certified_type(&s, x).is_ok());
    }

    #[test]
    fn stale_stamps_are_not_reused() {
        let mut s = Session::default();
        let x = s.sigs.input(0);
        s.next_epoch();
        Inferer::new(&mut s).ty(x).unwrap();
        let epoch = s.next_epoch();
        assert!(!s.sigs.is_visited(x, epoch));
    }
}
