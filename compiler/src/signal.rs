// signal.rs — Hash-consed signal DAG
//
// A signal is one computed wire. Signals are interned in a `SignalArena`, so
// structurally equal signals share one `SigId`. Each node also owns:
//   - its de Bruijn aperture (computed once at creation),
//   - a lazily attached type (set by type inference),
//   - a visit stamp, compared against the current inference epoch.
//
// Recursion appears in two forms. Propagation builds de Bruijn groups
// (`DbRec` binding `DbRef(1)`); before typing they are converted to symbolic
// groups (`Rec(var)` with the body kept in a side table) by `debruijn.rs`.
//
// Preconditions: handles passed in were produced by the same arena.
// Postconditions: builders return canonical handles.
// Failure modes: none (constant folding declines instead of failing).
// Side effects: interning grows the arena.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::id::{PathId, PrimId, RecVar, SigId, Type};
use crate::intern::Interner;
use crate::types::Nature;

// ── Numeric literals ─────────────────────────────────────────────────────

/// An `f64` usable as a hash key: compared by canonical bit pattern.
#[derive(Debug, Clone, Copy)]
pub struct Real64(f64);

impl Real64 {
    pub fn new(v: f64) -> Self {
        if v == 0.0 {
            Real64(0.0)
        } else if v.is_nan() {
            Real64(f64::NAN)
        } else {
            Real64(v)
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for Real64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Real64 {}

impl Hash for Real64 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// A compile-time numeric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i32),
    Real(f64),
}

impl Num {
    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Real(r) => r,
        }
    }
}

// ── Binary operators ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lsh,
    ARsh,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
    Xor,
}

impl BinOp {
    pub const ALL: [BinOp; 16] = [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Div,
        BinOp::Rem,
        BinOp::Lsh,
        BinOp::ARsh,
        BinOp::Gt,
        BinOp::Lt,
        BinOp::Ge,
        BinOp::Le,
        BinOp::Eq,
        BinOp::Ne,
        BinOp::And,
        BinOp::Or,
        BinOp::Xor,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Lsh => "<<",
            BinOp::ARsh => ">>",
            BinOp::Gt => ">",
            BinOp::Lt => "<",
            BinOp::Ge => ">=",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "xor",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Gt | BinOp::Lt | BinOp::Ge | BinOp::Le | BinOp::Eq | BinOp::Ne
        )
    }

    /// Evaluate on constants. Division always yields a real; comparisons
    /// yield 0/1 integers. Returns `None` when the result is undefined
    /// (division by zero, out-of-range shifts, bitwise ops on reals).
    pub fn fold(self, a: Num, b: Num) -> Option<Num> {
        use Num::{Int, Real};
        let (x, y) = (a.as_f64(), b.as_f64());
        let both_int = match (a, b) {
            (Int(i), Int(j)) => Some((i, j)),
            _ => None,
        };
        let flag = |c: bool| Some(Int(c as i32));
        match self {
            BinOp::Add => Some(match both_int {
                Some((i, j)) => Int(i.wrapping_add(j)),
                None => Real(x + y),
            }),
            BinOp::Sub => Some(match both_int {
                Some((i, j)) => Int(i.wrapping_sub(j)),
                None => Real(x - y),
            }),
            BinOp::Mul => Some(match both_int {
                Some((i, j)) => Int(i.wrapping_mul(j)),
                None => Real(x * y),
            }),
            BinOp::Div => (y != 0.0).then(|| Real(x / y)),
            BinOp::Rem => match both_int {
                Some((_, 0)) => None,
                Some((i, j)) => Some(Int(i.wrapping_rem(j))),
                None => (y != 0.0).then(|| Real(x % y)),
            },
            BinOp::Lsh => match both_int {
                Some((i, j)) if (0..32).contains(&j) => Some(Int(i.wrapping_shl(j as u32))),
                _ => None,
            },
            BinOp::ARsh => match both_int {
                Some((i, j)) if (0..32).contains(&j) => Some(Int(i >> j)),
                _ => None,
            },
            BinOp::Gt => flag(x > y),
            BinOp::Lt => flag(x < y),
            BinOp::Ge => flag(x >= y),
            BinOp::Le => flag(x <= y),
            BinOp::Eq => flag(x == y),
            BinOp::Ne => flag(x != y),
            BinOp::And => both_int.map(|(i, j)| Int(i & j)),
            BinOp::Or => both_int.map(|(i, j)| Int(i | j)),
            BinOp::Xor => both_int.map(|(i, j)| Int(i ^ j)),
        }
    }
}

// ── Foreign declarations ─────────────────────────────────────────────────

/// Signature of an external function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignFn {
    pub name: String,
    pub result: Nature,
    pub args: Vec<Nature>,
    pub file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliderKind {
    VSlider,
    HSlider,
    NumEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Vertical,
    Horizontal,
    Tab,
}

impl Orientation {
    pub fn prefix(self) -> char {
        match self {
            Orientation::Vertical => 'v',
            Orientation::Horizontal => 'h',
            Orientation::Tab => 't',
        }
    }
}

// ── Signal kinds ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SigKind {
    Int(i32),
    Real(Real64),
    Input(u32),

    Delay1(SigId),
    Prefix(SigId, SigId),
    Delay(SigId, SigId),
    BinOp(BinOp, SigId, SigId),
    IntCast(SigId),
    FloatCast(SigId),

    FFun(ForeignFn, Vec<SigId>),
    FConst { nature: Nature, name: String, file: String },
    FVar { nature: Nature, name: String, file: String },

    Button(PathId),
    Checkbox(PathId),
    Slider { kind: SliderKind, path: PathId, cur: SigId, min: SigId, max: SigId, step: SigId },
    Bargraph { orient: Orientation, path: PathId, min: SigId, max: SigId, input: SigId },

    Soundfile(PathId),
    SoundfileLength(SigId, SigId),
    SoundfileRate(SigId, SigId),
    SoundfileBuffer { sf: SigId, chan: SigId, part: SigId, index: SigId },

    Attach(SigId, SigId),
    Enable(SigId, SigId),
    Control(SigId, SigId),
    Select2(SigId, SigId, SigId),
    AssertBounds(SigId, SigId, SigId),
    Lowest(SigId),
    Highest(SigId),

    Table { size: SigId, gen: SigId },
    Gen(SigId),
    WrTable { table: SigId, index: SigId, data: SigId },
    RdTable { table: SigId, index: SigId },

    Waveform(Vec<SigId>),
    Xtended(PrimId, Vec<SigId>),

    Proj(u32, SigId),
    Rec(RecVar),
    DbRef(u32),
    DbRec(SigId),

    Nil,
    Cons(SigId, SigId),
}

impl SigKind {
    /// Operand signals in a fixed order.
    pub fn children(&self) -> Vec<SigId> {
        use SigKind::*;
        match self {
            Int(_) | Real(_) | Input(_) | FConst { .. } | FVar { .. } | Button(_) | Checkbox(_)
            | Soundfile(_) | Rec(_) | DbRef(_) | Nil => vec![],
            Delay1(a) | IntCast(a) | FloatCast(a) | Lowest(a) | Highest(a) | Gen(a)
            | Proj(_, a) | DbRec(a) => vec![*a],
            Prefix(a, b) | Delay(a, b) | BinOp(_, a, b) | SoundfileLength(a, b)
            | SoundfileRate(a, b) | Attach(a, b) | Enable(a, b) | Control(a, b) | Cons(a, b) => {
                vec![*a, *b]
            }
            Select2(a, b, c) | AssertBounds(a, b, c) => vec![*a, *b, *c],
            Slider { cur, min, max, step, .. } => vec![*cur, *min, *max, *step],
            Bargraph { min, max, input, .. } => vec![*min, *max, *input],
            SoundfileBuffer { sf, chan, part, index } => vec![*sf, *chan, *part, *index],
            Table { size, gen } => vec![*size, *gen],
            WrTable { table, index, data } => vec![*table, *index, *data],
            RdTable { table, index } => vec![*table, *index],
            FFun(_, args) | Waveform(args) | Xtended(_, args) => args.clone(),
        }
    }

    /// Same node with its operands replaced, in `children()` order.
    pub fn with_children(&self, c: &[SigId]) -> SigKind {
        use SigKind::*;
        match self {
            Int(_) | Real(_) | Input(_) | FConst { .. } | FVar { .. } | Button(_) | Checkbox(_)
            | Soundfile(_) | Rec(_) | DbRef(_) | Nil => self.clone(),
            Delay1(_) => Delay1(c[0]),
            IntCast(_) => IntCast(c[0]),
            FloatCast(_) => FloatCast(c[0]),
            Lowest(_) => Lowest(c[0]),
            Highest(_) => Highest(c[0]),
            Gen(_) => Gen(c[0]),
            Proj(i, _) => Proj(*i, c[0]),
            DbRec(_) => DbRec(c[0]),
            Prefix(..) => Prefix(c[0], c[1]),
            Delay(..) => Delay(c[0], c[1]),
            BinOp(op, ..) => BinOp(*op, c[0], c[1]),
            SoundfileLength(..) => SoundfileLength(c[0], c[1]),
            SoundfileRate(..) => SoundfileRate(c[0], c[1]),
            Attach(..) => Attach(c[0], c[1]),
            Enable(..) => Enable(c[0], c[1]),
            Control(..) => Control(c[0], c[1]),
            Cons(..) => Cons(c[0], c[1]),
            Select2(..) => Select2(c[0], c[1], c[2]),
            AssertBounds(..) => AssertBounds(c[0], c[1], c[2]),
            Slider { kind, path, .. } => Slider {
                kind: *kind,
                path: *path,
                cur: c[0],
                min: c[1],
                max: c[2],
                step: c[3],
            },
            Bargraph { orient, path, .. } => Bargraph {
                orient: *orient,
                path: *path,
                min: c[0],
                max: c[1],
                input: c[2],
            },
            SoundfileBuffer { .. } => SoundfileBuffer {
                sf: c[0],
                chan: c[1],
                part: c[2],
                index: c[3],
            },
            Table { .. } => Table {
                size: c[0],
                gen: c[1],
            },
            WrTable { .. } => WrTable {
                table: c[0],
                index: c[1],
                data: c[2],
            },
            RdTable { .. } => RdTable {
                table: c[0],
                index: c[1],
            },
            FFun(f, _) => FFun(f.clone(), c.to_vec()),
            Waveform(_) => Waveform(c.to_vec()),
            Xtended(p, _) => Xtended(*p, c.to_vec()),
        }
    }
}

// ── Arena ────────────────────────────────────────────────────────────────

/// Hash-consing arena for signals, with per-node type and visit slots.
#[derive(Debug, Default)]
pub struct SignalArena {
    nodes: Interner<SigKind>,
    aperture: Vec<u32>,
    types: Vec<Option<Type>>,
    visited: Vec<u64>,
    lift_memo: HashMap<(SigId, u32), SigId>,
}

impl SignalArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn intern(&mut self, kind: SigKind) -> SigId {
        let aperture = match &kind {
            SigKind::DbRef(n) => *n,
            SigKind::DbRec(body) => self.aperture(*body).saturating_sub(1),
            other => other
                .children()
                .iter()
                .map(|&c| self.aperture(c))
                .max()
                .unwrap_or(0),
        };
        let (id, fresh) = self.nodes.intern(kind);
        if fresh {
            self.aperture.push(aperture);
            self.types.push(None);
            self.visited.push(0);
        }
        SigId(id)
    }

    pub fn kind(&self, s: SigId) -> &SigKind {
        self.nodes.get(s.0)
    }

    /// Deepest free de Bruijn reference; 0 for closed terms.
    pub fn aperture(&self, s: SigId) -> u32 {
        self.aperture[s.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SigId, &SigKind)> {
        self.nodes.iter().map(|(i, k)| (SigId(i), k))
    }

    // ── Type and visit slots ─────────────────────────────────────────────

    pub fn ty(&self, s: SigId) -> Option<Type> {
        self.types[s.index()]
    }

    pub fn set_ty(&mut self, s: SigId, t: Type) {
        self.types[s.index()] = Some(t);
    }

    pub fn is_visited(&self, s: SigId, epoch: u64) -> bool {
        self.visited[s.index()] == epoch
    }

    pub fn set_visited(&mut self, s: SigId, epoch: u64) {
        self.visited[s.index()] = epoch;
    }

    // ── Builders ─────────────────────────────────────────────────────────

    pub fn int(&mut self, v: i32) -> SigId {
        self.intern(SigKind::Int(v))
    }

    pub fn real(&mut self, v: f64) -> SigId {
        self.intern(SigKind::Real(Real64::new(v)))
    }

    pub fn num(&mut self, n: Num) -> SigId {
        match n {
            Num::Int(i) => self.int(i),
            Num::Real(r) => self.real(r),
        }
    }

    pub fn input(&mut self, i: u32) -> SigId {
        self.intern(SigKind::Input(i))
    }

    pub fn delay1(&mut self, s: SigId) -> SigId {
        self.intern(SigKind::Delay1(s))
    }

    pub fn delay(&mut self, s: SigId, d: SigId) -> SigId {
        self.intern(SigKind::Delay(s, d))
    }

    pub fn binop(&mut self, op: BinOp, a: SigId, b: SigId) -> SigId {
        self.intern(SigKind::BinOp(op, a, b))
    }

    pub fn add(&mut self, a: SigId, b: SigId) -> SigId {
        self.binop(BinOp::Add, a, b)
    }

    /// Addition onto an accumulator; an integer zero seed on the left is
    /// dropped. Any other zero is kept so the sum's nature is preserved.
    pub fn add_simplified(&mut self, acc: SigId, b: SigId) -> SigId {
        if matches!(self.kind(acc), SigKind::Int(0)) {
            b
        } else {
            self.add(acc, b)
        }
    }

    pub fn int_cast(&mut self, s: SigId) -> SigId {
        self.intern(SigKind::IntCast(s))
    }

    pub fn float_cast(&mut self, s: SigId) -> SigId {
        self.intern(SigKind::FloatCast(s))
    }

    pub fn proj(&mut self, i: u32, group: SigId) -> SigId {
        self.intern(SigKind::Proj(i, group))
    }

    pub fn db_ref(&mut self, level: u32) -> SigId {
        self.intern(SigKind::DbRef(level))
    }

    pub fn db_rec(&mut self, body: SigId) -> SigId {
        self.intern(SigKind::DbRec(body))
    }

    pub fn rec(&mut self, var: RecVar) -> SigId {
        self.intern(SigKind::Rec(var))
    }

    pub fn xtended(&mut self, prim: PrimId, args: Vec<SigId>) -> SigId {
        self.intern(SigKind::Xtended(prim, args))
    }

    pub fn nil(&mut self) -> SigId {
        self.intern(SigKind::Nil)
    }

    pub fn cons(&mut self, head: SigId, tail: SigId) -> SigId {
        self.intern(SigKind::Cons(head, tail))
    }

    /// Right-nested `Cons` list terminated by `Nil`.
    pub fn list(&mut self, items: &[SigId]) -> SigId {
        let mut l = self.nil();
        for &s in items.iter().rev() {
            l = self.cons(s, l);
        }
        l
    }

    /// Elements of a `Cons`/`Nil` list, or `None` if `s` is not a list.
    pub fn list_items(&self, s: SigId) -> Option<Vec<SigId>> {
        let mut out = Vec::new();
        let mut cur = s;
        loop {
            match self.kind(cur) {
                SigKind::Nil => return Some(out),
                SigKind::Cons(h, t) => {
                    out.push(*h);
                    cur = *t;
                }
                _ => return None,
            }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn numeric(&self, s: SigId) -> Option<Num> {
        match self.kind(s) {
            SigKind::Int(i) => Some(Num::Int(*i)),
            SigKind::Real(r) => Some(Num::Real(r.get())),
            _ => None,
        }
    }

    // ── Constant folding ─────────────────────────────────────────────────

    /// Binary operation, folded when both operands are known constants.
    pub fn fold_binop(&mut self, op: BinOp, a: SigId, b: SigId) -> SigId {
        if let (Some(x), Some(y)) = (self.numeric(a), self.numeric(b)) {
            if let Some(r) = op.fold(x, y) {
                return self.num(r);
            }
        }
        self.binop(op, a, b)
    }

    pub fn fold_int_cast(&mut self, s: SigId) -> SigId {
        match self.numeric(s) {
            Some(n) => self.int(n.as_f64() as i32),
            None => self.int_cast(s),
        }
    }

    pub fn fold_float_cast(&mut self, s: SigId) -> SigId {
        match self.numeric(s) {
            Some(n) => self.real(n.as_f64()),
            None => self.float_cast(s),
        }
    }

    // ── de Bruijn lifting ────────────────────────────────────────────────

    /// Shift every free de Bruijn reference up by one level.
    pub fn lift(&mut self, s: SigId) -> SigId {
        self.liftn(s, 1)
    }

    fn liftn(&mut self, s: SigId, threshold: u32) -> SigId {
        if self.aperture(s) < threshold {
            return s;
        }
        if let Some(&r) = self.lift_memo.get(&(s, threshold)) {
            return r;
        }
        let kind = self.kind(s).clone();
        let lifted = match kind {
            SigKind::DbRef(n) => self.db_ref(n + 1),
            SigKind::DbRec(body) => {
                let b = self.liftn(body, threshold + 1);
                self.db_rec(b)
            }
            other => {
                let children: Vec<SigId> = other
                    .children()
                    .into_iter()
                    .map(|c| self.liftn(c, threshold))
                    .collect();
                self.intern(other.with_children(&children))
            }
        };
        self.lift_memo.insert((s, threshold), lifted);
        lifted
    }
}

impl fmt::Display for SigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structurally_equal_signals_share_a_handle() {
        let mut a = SignalArena::new();
        let x = a.input(0);
        let one = a.int(1);
        let s1 = a.add(x, one);
        let s2 = a.add(x, one);
        assert_eq!(s1, s2);
        assert_ne!(s1, a.add(one, x));
    }

    #[test]
    fn real_zero_sign_is_canonical() {
        let mut a = SignalArena::new();
        assert_eq!(a.real(0.0), a.real(-0.0));
        assert_ne!(a.real(0.0), a.int(0));
    }

    #[test]
    fn folding_follows_operator_rules() {
        use Num::*;
        assert_eq!(BinOp::Div.fold(Int(1), Int(2)), Some(Real(0.5)));
        assert_eq!(BinOp::Div.fold(Int(1), Int(0)), None);
        assert_eq!(BinOp::Lt.fold(Real(1.0), Int(2)), Some(Int(1)));
        assert_eq!(BinOp::Add.fold(Int(2), Int(3)), Some(Int(5)));
        assert_eq!(BinOp::Add.fold(Int(2), Real(0.5)), Some(Real(2.5)));
        assert_eq!(BinOp::Rem.fold(Int(7), Int(0)), None);
        assert_eq!(BinOp::Lsh.fold(Int(1), Int(40)), None);
        assert_eq!(BinOp::And.fold(Real(1.0), Int(1)), None);
    }

    #[test]
    fn fold_binop_builds_constants() {
        let mut a = SignalArena::new();
        let two = a.int(2);
        let three = a.int(3);
        let x = a.input(0);
        let five = a.fold_binop(BinOp::Add, two, three);
        assert_eq!(a.numeric(five), Some(Num::Int(5)));
        let open = a.fold_binop(BinOp::Add, two, x);
        assert!(matches!(a.kind(open), SigKind::BinOp(BinOp::Add, _, _)));
    }

    #[test]
    fn aperture_tracks_free_references() {
        let mut a = SignalArena::new();
        let r1 = a.db_ref(1);
        let p = a.proj(0, r1);
        let m = a.delay1(p);
        assert_eq!(a.aperture(m), 1);
        let body = a.list(&[m]);
        let g = a.db_rec(body);
        assert_eq!(a.aperture(g), 0);
        let x = a.input(0);
        assert_eq!(a.aperture(x), 0);
    }

    #[test]
    fn lift_shifts_only_free_references() {
        let mut a = SignalArena::new();
        let r1 = a.db_ref(1);
        let x = a.input(0);
        let s = a.add(r1, x);
        let lifted = a.lift(s);
        let r2 = a.db_ref(2);
        assert_eq!(lifted, a.add(r2, x));

        // A closed group is untouched.
        let body = a.list(&[r1]);
        let g = a.db_rec(body);
        assert_eq!(a.lift(g), g);
        // Closed inputs are untouched.
        assert_eq!(a.lift(x), x);
    }

    #[test]
    fn lists_round_trip_through_cons_cells() {
        let mut a = SignalArena::new();
        let x = a.input(0);
        let y = a.input(1);
        let l = a.list(&[x, y]);
        assert_eq!(a.list_items(l), Some(vec![x, y]));
        assert_eq!(a.list_items(x), None);
    }

    #[test]
    fn add_simplified_drops_zero() {
        let mut a = SignalArena::new();
        let zero = a.int(0);
        let x = a.input(0);
        assert_eq!(a.add_simplified(zero, x), x);
        let y = a.input(1);
        let s = a.add_simplified(x, y);
        assert_eq!(s, a.add(x, y));
    }

    #[test]
    fn add_simplified_keeps_other_zeros() {
        let mut a = SignalArena::new();
        let x = a.input(0);
        let real_zero = a.real(0.0);
        assert_eq!(a.add_simplified(x, real_zero), a.add(x, real_zero));
        assert_eq!(a.add_simplified(real_zero, x), a.add(real_zero, x));
        let zero = a.int(0);
        assert_eq!(a.add_simplified(x, zero), a.add(x, zero));
    }
}
