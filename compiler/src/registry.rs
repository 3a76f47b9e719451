// registry.rs — Extended primitive registry
//
// Extended primitives are the math functions outside the fixed primitive
// set. Each one is a small record implementing `ExtendedPrim`: an arity, a
// type rule over already-typed operands, and an optional constant-folding
// rule (which may also perform local peephole rewrites). The registry hands
// out a `PrimId` per record; signals refer to primitives by that id.

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;

use serde::Serialize;

use crate::diag::{codes, Diagnostic};
use crate::id::{PrimId, SigId, Type};
use crate::interval::Interval;
use crate::signal::{Num, SigKind, SignalArena};
use crate::types::TypeTable;

// ── Capability interface ─────────────────────────────────────────────────

/// Context handed to a fold rule.
pub struct FoldCtx<'a> {
    pub sigs: &'a mut SignalArena,
    /// Id under which the folding primitive is registered.
    pub me: PrimId,
    names: &'a HashMap<String, PrimId>,
}

impl FoldCtx<'_> {
    /// Id of another registered primitive, for cross-primitive rewrites.
    pub fn id_of(&self, name: &str) -> Option<PrimId> {
        self.names.get(name).copied()
    }

    /// The argument of `s` when `s` is a call of primitive `id`.
    pub fn call_arg(&self, s: SigId, id: PrimId) -> Option<SigId> {
        match self.sigs.kind(s) {
            SigKind::Xtended(p, args) if *p == id && args.len() == 1 => Some(args[0]),
            _ => None,
        }
    }
}

pub trait ExtendedPrim {
    fn name(&self) -> &'static str;

    fn arity(&self) -> usize;

    fn infer_type(&self, types: &mut TypeTable, args: &[Type]) -> Result<Type, Diagnostic>;

    /// Fold or rewrite a call. `Ok(None)` keeps the call as is.
    fn try_fold(&self, ctx: &mut FoldCtx<'_>, args: &[SigId]) -> Result<Option<SigId>, Diagnostic>;
}

// ── Registry ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    id: u32,
    name: &'a str,
    arity: usize,
}

#[derive(Default)]
pub struct Registry {
    prims: Vec<Box<dyn ExtendedPrim>>,
    names: HashMap<String, PrimId>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("prims", &self.prims.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the standard math catalogue.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        let builtins: Vec<Box<dyn ExtendedPrim>> = vec![
            Box::new(Abs),
            Box::new(Sqrt),
            Box::new(MinMax { is_max: false }),
            Box::new(MinMax { is_max: true }),
            Box::new(Rounding::Ceil),
            Box::new(Rounding::Rint),
            Box::new(Tan),
            Box::new(Exp10),
            Box::new(Log10),
            Box::new(Ftz),
        ];
        for prim in builtins {
            let registered = r.register(prim);
            debug_assert!(registered.is_ok(), "duplicate builtin: {registered:?}");
        }
        r
    }

    pub fn register(&mut self, prim: Box<dyn ExtendedPrim>) -> Result<PrimId, Diagnostic> {
        let name = prim.name();
        if self.names.contains_key(name) {
            return Err(Diagnostic::error(
                codes::E0403,
                format!("extended primitive '{name}' is already registered"),
            ));
        }
        let id = PrimId(self.prims.len() as u32);
        self.names.insert(name.to_string(), id);
        self.prims.push(prim);
        Ok(id)
    }

    pub fn get(&self, id: PrimId) -> Option<&dyn ExtendedPrim> {
        self.prims.get(id.index()).map(|p| p.as_ref())
    }

    pub fn lookup(&self, name: &str) -> Option<PrimId> {
        self.names.get(name).copied()
    }

    /// Like `lookup`, but a missing primitive is an error.
    pub fn require(&self, name: &str) -> Result<PrimId, Diagnostic> {
        self.lookup(name).ok_or_else(|| {
            Diagnostic::error(
                codes::E0205,
                format!("extended primitive '{name}' is not registered"),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrimId, &dyn ExtendedPrim)> {
        self.prims
            .iter()
            .enumerate()
            .map(|(i, p)| (PrimId(i as u32), p.as_ref()))
    }

    fn prim(&self, id: PrimId) -> Result<&dyn ExtendedPrim, Diagnostic> {
        self.get(id).ok_or_else(|| {
            Diagnostic::error(
                codes::E0205,
                format!("unknown extended primitive #{}", id.0),
            )
        })
    }

    /// Build a call signal, folding it when the primitive's rule allows.
    pub fn call(
        &self,
        id: PrimId,
        sigs: &mut SignalArena,
        args: Vec<SigId>,
    ) -> Result<SigId, Diagnostic> {
        let prim = self.prim(id)?;
        if args.len() != prim.arity() {
            return Err(Diagnostic::error(
                codes::E0312,
                format!(
                    "'{}' expects {} argument(s), got {}",
                    prim.name(),
                    prim.arity(),
                    args.len()
                ),
            ));
        }
        let mut ctx = FoldCtx {
            sigs: &mut *sigs,
            me: id,
            names: &self.names,
        };
        if let Some(folded) = prim.try_fold(&mut ctx, &args)? {
            return Ok(folded);
        }
        Ok(sigs.xtended(id, args))
    }

    pub fn call_named(
        &self,
        name: &str,
        sigs: &mut SignalArena,
        args: Vec<SigId>,
    ) -> Result<SigId, Diagnostic> {
        let id = self.require(name)?;
        self.call(id, sigs, args)
    }

    /// Result type of a call given its operand types.
    pub fn infer_type(
        &self,
        id: PrimId,
        types: &mut TypeTable,
        args: &[Type],
    ) -> Result<Type, Diagnostic> {
        let prim = self.prim(id)?;
        if args.len() != prim.arity() {
            return Err(Diagnostic::error(
                codes::E0312,
                format!(
                    "'{}' typed with {} operand(s), expects {}",
                    prim.name(),
                    args.len(),
                    prim.arity()
                ),
            ));
        }
        prim.infer_type(types, args)
    }

    /// Canonical JSON listing of the registered primitives.
    pub fn manifest(&self) -> String {
        let entries: Vec<ManifestEntry<'_>> = self
            .iter()
            .map(|(id, p)| ManifestEntry {
                id: id.0,
                name: p.name(),
                arity: p.arity(),
            })
            .collect();
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    }
}

// ── Standard catalogue ───────────────────────────────────────────────────

fn unary_constant(sigs: &SignalArena, args: &[SigId]) -> Option<Num> {
    args.first().and_then(|&a| sigs.numeric(a))
}

struct Abs;

impl ExtendedPrim for Abs {
    fn name(&self) -> &'static str {
        "abs"
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_type(&self, types: &mut TypeTable, args: &[Type]) -> Result<Type, Diagnostic> {
        let i = types.interval(args[0]).abs();
        Ok(types.with_interval(args[0], i))
    }

    fn try_fold(&self, ctx: &mut FoldCtx<'_>, args: &[SigId]) -> Result<Option<SigId>, Diagnostic> {
        // abs(abs(x)) = abs(x)
        if ctx.call_arg(args[0], ctx.me).is_some() {
            return Ok(Some(args[0]));
        }
        Ok(match unary_constant(ctx.sigs, args) {
            Some(Num::Int(i)) => Some(ctx.sigs.int(i.wrapping_abs())),
            Some(Num::Real(r)) => Some(ctx.sigs.real(r.abs())),
            None => None,
        })
    }
}

struct Sqrt;

impl ExtendedPrim for Sqrt {
    fn name(&self) -> &'static str {
        "sqrt"
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_type(&self, types: &mut TypeTable, args: &[Type]) -> Result<Type, Diagnostic> {
        let i = types.interval(args[0]);
        let out = if i.valid && i.lo >= 0.0 {
            i.map_increasing(f64::sqrt)
        } else {
            Interval::invalid()
        };
        let t = types.float_cast(args[0]);
        Ok(types.with_interval(t, out))
    }

    fn try_fold(&self, ctx: &mut FoldCtx<'_>, args: &[SigId]) -> Result<Option<SigId>, Diagnostic> {
        match unary_constant(ctx.sigs, args) {
            Some(n) if n.as_f64() < 0.0 => Err(Diagnostic::error(
                codes::E0206,
                format!("out of domain sqrt({})", n.as_f64()),
            )),
            Some(n) => Ok(Some(ctx.sigs.real(n.as_f64().sqrt()))),
            None => Ok(None),
        }
    }
}

struct MinMax {
    is_max: bool,
}

impl ExtendedPrim for MinMax {
    fn name(&self) -> &'static str {
        if self.is_max {
            "max"
        } else {
            "min"
        }
    }

    fn arity(&self) -> usize {
        2
    }

    fn infer_type(&self, types: &mut TypeTable, args: &[Type]) -> Result<Type, Diagnostic> {
        let (a, b) = (types.interval(args[0]), types.interval(args[1]));
        let i = if self.is_max { a.max(b) } else { a.min(b) };
        let t = types.join(args[0], args[1])?;
        Ok(types.with_interval(t, i))
    }

    fn try_fold(&self, ctx: &mut FoldCtx<'_>, args: &[SigId]) -> Result<Option<SigId>, Diagnostic> {
        let (Some(x), Some(y)) = (ctx.sigs.numeric(args[0]), ctx.sigs.numeric(args[1])) else {
            return Ok(None);
        };
        let r = match (x, y) {
            (Num::Int(a), Num::Int(b)) => Num::Int(if self.is_max { a.max(b) } else { a.min(b) }),
            _ => {
                let (a, b) = (x.as_f64(), y.as_f64());
                Num::Real(if self.is_max { a.max(b) } else { a.min(b) })
            }
        };
        Ok(Some(ctx.sigs.num(r)))
    }
}

enum Rounding {
    Ceil,
    Rint,
}

impl Rounding {
    fn apply(&self, x: f64) -> f64 {
        match self {
            Rounding::Ceil => x.ceil(),
            Rounding::Rint => x.round_ties_even(),
        }
    }
}

impl ExtendedPrim for Rounding {
    fn name(&self) -> &'static str {
        match self {
            Rounding::Ceil => "ceil",
            Rounding::Rint => "rint",
        }
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_type(&self, types: &mut TypeTable, args: &[Type]) -> Result<Type, Diagnostic> {
        let i = types.interval(args[0]).map_increasing(|x| self.apply(x));
        let t = types.float_cast(args[0]);
        Ok(types.with_interval(t, i))
    }

    fn try_fold(&self, ctx: &mut FoldCtx<'_>, args: &[SigId]) -> Result<Option<SigId>, Diagnostic> {
        Ok(unary_constant(ctx.sigs, args).map(|n| ctx.sigs.real(self.apply(n.as_f64()))))
    }
}

struct Tan;

impl ExtendedPrim for Tan {
    fn name(&self) -> &'static str {
        "tan"
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_type(&self, types: &mut TypeTable, args: &[Type]) -> Result<Type, Diagnostic> {
        let i = types.interval(args[0]);
        let out = if i.valid && -FRAC_PI_2 < i.lo && i.hi < FRAC_PI_2 {
            i.map_increasing(f64::tan)
        } else {
            Interval::invalid()
        };
        let t = types.float_cast(args[0]);
        Ok(types.with_interval(t, out))
    }

    fn try_fold(&self, ctx: &mut FoldCtx<'_>, args: &[SigId]) -> Result<Option<SigId>, Diagnostic> {
        Ok(unary_constant(ctx.sigs, args).map(|n| ctx.sigs.real(n.as_f64().tan())))
    }
}

struct Exp10;

impl ExtendedPrim for Exp10 {
    fn name(&self) -> &'static str {
        "exp10"
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_type(&self, types: &mut TypeTable, args: &[Type]) -> Result<Type, Diagnostic> {
        let i = types
            .interval(args[0])
            .map_increasing(|x| 10f64.powf(x));
        let t = types.float_cast(args[0]);
        Ok(types.with_interval(t, i))
    }

    fn try_fold(&self, ctx: &mut FoldCtx<'_>, args: &[SigId]) -> Result<Option<SigId>, Diagnostic> {
        // exp10(log10(x)) = x
        if let Some(log10) = ctx.id_of("log10") {
            if let Some(inner) = ctx.call_arg(args[0], log10) {
                return Ok(Some(inner));
            }
        }
        Ok(unary_constant(ctx.sigs, args).map(|n| ctx.sigs.real(10f64.powf(n.as_f64()))))
    }
}

struct Log10;

impl ExtendedPrim for Log10 {
    fn name(&self) -> &'static str {
        "log10"
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_type(&self, types: &mut TypeTable, args: &[Type]) -> Result<Type, Diagnostic> {
        let i = types.interval(args[0]);
        let out = if i.valid && i.lo > 0.0 {
            i.map_increasing(f64::log10)
        } else {
            Interval::invalid()
        };
        let t = types.float_cast(args[0]);
        Ok(types.with_interval(t, out))
    }

    fn try_fold(&self, ctx: &mut FoldCtx<'_>, args: &[SigId]) -> Result<Option<SigId>, Diagnostic> {
        match unary_constant(ctx.sigs, args) {
            Some(n) if n.as_f64() <= 0.0 => Err(Diagnostic::error(
                codes::E0206,
                format!("out of domain log10({})", n.as_f64()),
            )),
            Some(n) => Ok(Some(ctx.sigs.real(n.as_f64().log10()))),
            None => Ok(None),
        }
    }
}

/// Flush-to-zero marker wrapped around recursive definitions.
struct Ftz;

impl ExtendedPrim for Ftz {
    fn name(&self) -> &'static str {
        "ftz"
    }

    fn arity(&self) -> usize {
        1
    }

    fn infer_type(&self, _types: &mut TypeTable, args: &[Type]) -> Result<Type, Diagnostic> {
        Ok(args[0])
    }

    fn try_fold(&self, ctx: &mut FoldCtx<'_>, args: &[SigId]) -> Result<Option<SigId>, Diagnostic> {
        if ctx.sigs.numeric(args[0]).is_some() || ctx.call_arg(args[0], ctx.me).is_some() {
            return Ok(Some(args[0]));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Boolean, Computability, Nature, Variability, Vectorability};

    fn int_type(types: &mut TypeTable, lo: f64, hi: f64) -> Type {
        types.make_simple(
            Nature::Int,
            Variability::Samp,
            Computability::Exec,
            Vectorability::Vect,
            Boolean::Num,
            Interval::new(lo, hi),
        )
    }

    #[test]
    fn builtins_are_registered_once() {
        let mut r = Registry::with_builtins();
        assert!(r.lookup("abs").is_some());
        assert!(r.lookup("ftz").is_some());
        let err = r.register(Box::new(Abs)).unwrap_err();
        assert_eq!(err.code, Some(codes::E0403));
    }

    #[test]
    fn every_builtin_is_registered() {
        let r = Registry::with_builtins();
        for name in [
            "abs", "sqrt", "min", "max", "ceil", "rint", "tan", "exp10", "log10", "ftz",
        ] {
            assert!(r.lookup(name).is_some(), "{name} missing");
        }
        assert_eq!(r.names.len(), 10);
    }

    #[test]
    fn abs_of_abs_is_abs() {
        let r = Registry::with_builtins();
        let mut sigs = SignalArena::new();
        let x = sigs.input(0);
        let a1 = r.call_named("abs", &mut sigs, vec![x]).unwrap();
        let a2 = r.call_named("abs", &mut sigs, vec![a1]).unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn constants_fold() {
        let r = Registry::with_builtins();
        let mut sigs = SignalArena::new();
        let m3 = sigs.int(-3);
        let a = r.call_named("abs", &mut sigs, vec![m3]).unwrap();
        assert_eq!(a, sigs.int(3));
        let two = sigs.int(2);
        let mx = r.call_named("max", &mut sigs, vec![m3, two]).unwrap();
        assert_eq!(mx, sigs.int(2));
        let e = r.call_named("exp10", &mut sigs, vec![two]).unwrap();
        assert_eq!(e, sigs.real(100.0));
    }

    #[test]
    fn negative_sqrt_constant_is_fatal() {
        let r = Registry::with_builtins();
        let mut sigs = SignalArena::new();
        let m = sigs.real(-1.0);
        let err = r.call_named("sqrt", &mut sigs, vec![m]).unwrap_err();
        assert_eq!(err.code, Some(codes::E0206));
    }

    #[test]
    fn arity_mismatch_is_fatal() {
        let r = Registry::with_builtins();
        let mut sigs = SignalArena::new();
        let x = sigs.input(0);
        let err = r.call_named("min", &mut sigs, vec![x]).unwrap_err();
        assert_eq!(err.code, Some(codes::E0312));
    }

    #[test]
    fn sqrt_type_tracks_nonnegative_intervals() {
        let r = Registry::with_builtins();
        let mut types = TypeTable::new();
        let t = int_type(&mut types, 4.0, 9.0);
        let id = r.lookup("sqrt").unwrap();
        let out = r.infer_type(id, &mut types, &[t]).unwrap();
        assert_eq!(types.nature(out), Nature::Real);
        assert_eq!(types.interval(out), Interval::new(2.0, 3.0));

        let neg = int_type(&mut types, -1.0, 9.0);
        let out = r.infer_type(id, &mut types, &[neg]).unwrap();
        assert!(!types.interval(out).valid);
    }

    #[test]
    fn tan_interval_only_inside_half_period() {
        let r = Registry::with_builtins();
        let mut types = TypeTable::new();
        let id = r.lookup("tan").unwrap();
        let inside = int_type(&mut types, 0.0, 1.0);
        let out = r.infer_type(id, &mut types, &[inside]).unwrap();
        assert!(types.interval(out).valid);
        let outside = int_type(&mut types, 0.0, 2.0);
        let out = r.infer_type(id, &mut types, &[outside]).unwrap();
        assert!(!types.interval(out).valid);
    }

    #[test]
    fn manifest_lists_every_primitive() {
        let r = Registry::with_builtins();
        let json: serde_json::Value = serde_json::from_str(&r.manifest()).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), r.len());
        assert_eq!(entries[0]["name"], "abs");
        assert_eq!(entries[2]["arity"], 2);
    }
}
