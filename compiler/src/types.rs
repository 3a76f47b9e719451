// types.rs — Semantic type lattice with hash-consed representation
//
// A signal type describes five lattice axes (nature, variability,
// computability, vectorability, booleanness) plus a tracked numeric interval
// and a resolution tag. Types come in three shapes: Simple, Table (an
// envelope plus a content type) and Tuplet (an ordered product, used for
// lists and recursive groups).
//
// Every type is interned in a `TypeTable`; callers only ever hold canonical
// `Type` handles, so structural equality is handle equality.
//
// Preconditions: handles passed in were produced by the same table.
// Postconditions: every returned handle is canonical.
// Failure modes: joining incompatible shapes, failed check_* constraints.
// Side effects: interning grows the table.

use std::fmt;

use crate::diag::{codes, Diagnostic};
use crate::id::Type;
use crate::intern::Interner;
use crate::interval::Interval;

// ── Axes ─────────────────────────────────────────────────────────────────
//
// Each axis is totally ordered; the derived `Ord` follows declaration order,
// so the join of two values is their maximum.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Nature {
    Int,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variability {
    Konst,
    Block,
    Samp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Computability {
    Comp,
    Init,
    Exec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Vectorability {
    Vect,
    Scal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Boolean {
    Num,
    Bool,
}

impl Nature {
    pub fn letter(self) -> char {
        match self {
            Nature::Int => 'N',
            Nature::Real => 'R',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Nature::Int => "int",
            Nature::Real => "real",
        }
    }
}

impl Variability {
    pub fn letter(self) -> char {
        match self {
            Variability::Konst => 'K',
            Variability::Block => 'B',
            Variability::Samp => 'S',
        }
    }
}

impl Computability {
    pub fn letter(self) -> char {
        match self {
            Computability::Comp => 'C',
            Computability::Init => 'I',
            Computability::Exec => 'E',
        }
    }
}

impl Vectorability {
    pub fn letter(self) -> char {
        match self {
            Vectorability::Vect => 'V',
            Vectorability::Scal => 'S',
        }
    }
}

impl Boolean {
    pub fn letter(self) -> char {
        match self {
            Boolean::Num => 'N',
            Boolean::Bool => 'B',
        }
    }
}

/// Fixed-point resolution tag. Only equal tags survive a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Res {
    pub valid: bool,
    pub index: i32,
}

// ── Attribute tuple ──────────────────────────────────────────────────────

/// The attribute tuple shared by every shape (a Table or Tuplet's envelope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attrs {
    pub nature: Nature,
    pub variability: Variability,
    pub computability: Computability,
    pub vectorability: Vectorability,
    pub boolean: Boolean,
    pub interval: Interval,
    pub res: Res,
}

impl Attrs {
    pub fn new(
        nature: Nature,
        variability: Variability,
        computability: Computability,
        vectorability: Vectorability,
        boolean: Boolean,
        interval: Interval,
    ) -> Self {
        Attrs {
            nature,
            variability,
            computability,
            vectorability,
            boolean,
            interval,
            res: Res::default(),
        }
    }

    /// Axis-wise maximum with interval union.
    pub fn join(&self, other: &Attrs) -> Attrs {
        Attrs {
            nature: self.nature.max(other.nature),
            variability: self.variability.max(other.variability),
            computability: self.computability.max(other.computability),
            vectorability: self.vectorability.max(other.vectorability),
            boolean: self.boolean.max(other.boolean),
            interval: self.interval.reunion(other.interval),
            res: if self.res == other.res {
                self.res
            } else {
                Res::default()
            },
        }
    }

    /// Envelope of an empty product.
    pub fn unit() -> Attrs {
        Attrs::new(
            Nature::Int,
            Variability::Konst,
            Computability::Comp,
            Vectorability::Vect,
            Boolean::Num,
            Interval::invalid(),
        )
    }

    fn fmt_axes(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{} {}",
            self.nature.letter(),
            self.variability.letter(),
            self.computability.letter(),
            self.vectorability.letter(),
            self.boolean.letter(),
            self.interval
        )
    }
}

// ── Type shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeData {
    Simple(Attrs),
    Table { attrs: Attrs, content: Type },
    Tuplet { attrs: Attrs, items: Vec<Type> },
}

impl TypeData {
    pub fn attrs(&self) -> &Attrs {
        match self {
            TypeData::Simple(a) => a,
            TypeData::Table { attrs, .. } => attrs,
            TypeData::Tuplet { attrs, .. } => attrs,
        }
    }

    fn shape_name(&self) -> &'static str {
        match self {
            TypeData::Simple(_) => "simple",
            TypeData::Table { .. } => "table",
            TypeData::Tuplet { .. } => "tuplet",
        }
    }
}

// ── Type table ───────────────────────────────────────────────────────────

/// Hash-consing table owning every type of one compiler session.
#[derive(Debug, Default)]
pub struct TypeTable {
    interner: Interner<TypeData>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct types allocated so far.
    pub fn len(&self) -> usize {
        self.interner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interner.is_empty()
    }

    fn intern(&mut self, data: TypeData) -> Type {
        Type(self.interner.intern(data).0)
    }

    pub fn data(&self, t: Type) -> &TypeData {
        self.interner.get(t.0)
    }

    pub fn attrs(&self, t: Type) -> Attrs {
        *self.data(t).attrs()
    }

    pub fn nature(&self, t: Type) -> Nature {
        self.data(t).attrs().nature
    }

    pub fn variability(&self, t: Type) -> Variability {
        self.data(t).attrs().variability
    }

    pub fn computability(&self, t: Type) -> Computability {
        self.data(t).attrs().computability
    }

    pub fn vectorability(&self, t: Type) -> Vectorability {
        self.data(t).attrs().vectorability
    }

    pub fn boolean(&self, t: Type) -> Boolean {
        self.data(t).attrs().boolean
    }

    pub fn interval(&self, t: Type) -> Interval {
        self.data(t).attrs().interval
    }

    // ── Constructors ─────────────────────────────────────────────────────

    pub fn simple(&mut self, attrs: Attrs) -> Type {
        self.intern(TypeData::Simple(attrs))
    }

    pub fn make_simple(
        &mut self,
        nature: Nature,
        variability: Variability,
        computability: Computability,
        vectorability: Vectorability,
        boolean: Boolean,
        interval: Interval,
    ) -> Type {
        self.simple(Attrs::new(
            nature,
            variability,
            computability,
            vectorability,
            boolean,
            interval,
        ))
    }

    /// Table whose envelope is copied from its content.
    pub fn table(&mut self, content: Type) -> Type {
        let attrs = self.attrs(content);
        self.table_with(content, attrs)
    }

    pub fn table_with(&mut self, content: Type, attrs: Attrs) -> Type {
        self.intern(TypeData::Table { attrs, content })
    }

    /// Tuplet whose envelope is the join of its items.
    pub fn tuplet(&mut self, items: Vec<Type>) -> Type {
        let attrs = items
            .iter()
            .map(|&t| self.attrs(t))
            .reduce(|a, b| a.join(&b))
            .unwrap_or_else(Attrs::unit);
        self.intern(TypeData::Tuplet { attrs, items })
    }

    pub fn tuplet_items(&self, t: Type) -> Option<&[Type]> {
        match self.data(t) {
            TypeData::Tuplet { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn table_content(&self, t: Type) -> Option<Type> {
        match self.data(t) {
            TypeData::Table { content, .. } => Some(*content),
            _ => None,
        }
    }

    pub fn is_simple(&self, t: Type) -> bool {
        matches!(self.data(t), TypeData::Simple(_))
    }

    // ── Lattice ──────────────────────────────────────────────────────────

    /// Least upper bound. Shapes must match: Tables join content and
    /// envelope, Tuplets join component-wise and require equal arity.
    pub fn join(&mut self, a: Type, b: Type) -> Result<Type, Diagnostic> {
        if a == b {
            return Ok(a);
        }
        match (self.data(a).clone(), self.data(b).clone()) {
            (TypeData::Simple(x), TypeData::Simple(y)) => Ok(self.simple(x.join(&y))),
            (
                TypeData::Table {
                    attrs: xa,
                    content: xc,
                },
                TypeData::Table {
                    attrs: ya,
                    content: yc,
                },
            ) => {
                let content = self.join(xc, yc).map_err(|e| {
                    e.with_cause("while joining the contents of two tables", None)
                })?;
                Ok(self.table_with(content, xa.join(&ya)))
            }
            (
                TypeData::Tuplet {
                    attrs: xa,
                    items: xs,
                },
                TypeData::Tuplet {
                    attrs: ya,
                    items: ys,
                },
            ) => {
                if xs.len() != ys.len() {
                    return Err(Diagnostic::error(
                        codes::E0101,
                        format!(
                            "cannot join tuplets of different arity ({} and {})",
                            xs.len(),
                            ys.len()
                        ),
                    )
                    .with_context(format!("{} | {}", self.display(a), self.display(b))));
                }
                let mut items = Vec::with_capacity(xs.len());
                for (x, y) in xs.into_iter().zip(ys) {
                    items.push(self.join(x, y)?);
                }
                Ok(self.intern(TypeData::Tuplet {
                    attrs: xa.join(&ya),
                    items,
                }))
            }
            (x, y) => Err(Diagnostic::error(
                codes::E0100,
                format!(
                    "trying to combine incompatible types ({} and {})",
                    x.shape_name(),
                    y.shape_name()
                ),
            )
            .with_context(format!("{} | {}", self.display(a), self.display(b)))),
        }
    }

    pub fn equals(&self, a: Type, b: Type) -> bool {
        a == b
    }

    /// `a <= b` in the lattice: joining `a` into `b` leaves `b` unchanged.
    pub fn subtype(&mut self, a: Type, b: Type) -> Result<bool, Diagnostic> {
        Ok(self.join(a, b)? == b)
    }

    /// Product of two types, flattening nested tuplets one level.
    pub fn product(&mut self, a: Type, b: Type) -> Type {
        let mut items = Vec::new();
        for t in [a, b] {
            match self.tuplet_items(t) {
                Some(xs) => items.extend_from_slice(xs),
                None => items.push(t),
            }
        }
        self.tuplet(items)
    }

    // ── Promotions and casts ─────────────────────────────────────────────

    /// Rebuild `t` with the same shape and a modified envelope.
    fn map_attrs(&mut self, t: Type, f: impl FnOnce(&mut Attrs)) -> Type {
        let mut data = self.data(t).clone();
        match &mut data {
            TypeData::Simple(a) => f(a),
            TypeData::Table { attrs, .. } => f(attrs),
            TypeData::Tuplet { attrs, .. } => f(attrs),
        }
        self.intern(data)
    }

    pub fn promote_nature(&mut self, t: Type, n: Nature) -> Type {
        self.map_attrs(t, |a| a.nature = a.nature.max(n))
    }

    pub fn promote_variability(&mut self, t: Type, v: Variability) -> Type {
        self.map_attrs(t, |a| a.variability = a.variability.max(v))
    }

    pub fn promote_computability(&mut self, t: Type, c: Computability) -> Type {
        self.map_attrs(t, |a| a.computability = a.computability.max(c))
    }

    pub fn promote_vectorability(&mut self, t: Type, v: Vectorability) -> Type {
        self.map_attrs(t, |a| a.vectorability = a.vectorability.max(v))
    }

    pub fn promote_boolean(&mut self, t: Type, b: Boolean) -> Type {
        self.map_attrs(t, |a| a.boolean = a.boolean.max(b))
    }

    /// Replace the interval, keeping every other attribute.
    pub fn with_interval(&mut self, t: Type, i: Interval) -> Type {
        self.map_attrs(t, |a| a.interval = i)
    }

    pub fn int_cast(&mut self, t: Type) -> Type {
        self.map_attrs(t, |a| a.nature = Nature::Int)
    }

    pub fn float_cast(&mut self, t: Type) -> Type {
        self.map_attrs(t, |a| a.nature = Nature::Real)
    }

    /// Boolean-flagged integer.
    pub fn bool_cast(&mut self, t: Type) -> Type {
        self.map_attrs(t, |a| {
            a.nature = Nature::Int;
            a.boolean = Boolean::Bool;
        })
    }

    pub fn samp_cast(&mut self, t: Type) -> Type {
        self.promote_variability(t, Variability::Samp)
    }

    pub fn vec_cast(&mut self, t: Type) -> Type {
        self.map_attrs(t, |a| a.vectorability = Vectorability::Vect)
    }

    // ── Checks ───────────────────────────────────────────────────────────

    pub fn check_int(&self, t: Type) -> Result<Type, Diagnostic> {
        if self.is_simple(t) && self.nature(t) == Nature::Int {
            Ok(t)
        } else {
            Err(
                Diagnostic::error(codes::E0102, "an integer type is required")
                    .with_context(self.display(t).to_string()),
            )
        }
    }

    pub fn check_konst(&self, t: Type) -> Result<Type, Diagnostic> {
        if self.variability(t) == Variability::Konst {
            Ok(t)
        } else {
            Err(
                Diagnostic::error(codes::E0103, "a constant type is required")
                    .with_context(self.display(t).to_string()),
            )
        }
    }

    pub fn check_init(&self, t: Type) -> Result<Type, Diagnostic> {
        if self.computability(t) <= Computability::Init {
            Ok(t)
        } else {
            Err(Diagnostic::error(
                codes::E0104,
                "a value known at initialization time is required",
            )
            .with_context(self.display(t).to_string()))
        }
    }

    // ── Standard types ───────────────────────────────────────────────────

    /// Audio input: real samples with unknown bounds.
    pub fn tinput(&mut self) -> Type {
        self.make_simple(
            Nature::Real,
            Variability::Samp,
            Computability::Exec,
            Vectorability::Vect,
            Boolean::Num,
            Interval::invalid(),
        )
    }

    /// Continuous UI control (sliders, number entries).
    pub fn tgui(&mut self) -> Type {
        self.make_simple(
            Nature::Real,
            Variability::Block,
            Computability::Exec,
            Vectorability::Vect,
            Boolean::Num,
            Interval::invalid(),
        )
    }

    /// Two-state UI control (buttons, checkboxes).
    pub fn tgui01(&mut self) -> Type {
        self.make_simple(
            Nature::Int,
            Variability::Block,
            Computability::Exec,
            Vectorability::Vect,
            Boolean::Num,
            Interval::new(0.0, 1.0),
        )
    }

    /// Most restrictive hypothesis for a recursive signal.
    pub fn trec(&mut self) -> Type {
        self.make_simple(
            Nature::Int,
            Variability::Samp,
            Computability::Init,
            Vectorability::Vect,
            Boolean::Num,
            Interval::point(0.0),
        )
    }

    /// Most general hypothesis for a recursive signal.
    pub fn trecmax(&mut self) -> Type {
        self.make_simple(
            Nature::Real,
            Variability::Samp,
            Computability::Exec,
            Vectorability::Scal,
            Boolean::Num,
            Interval::full(),
        )
    }

    pub fn display(&self, t: Type) -> TypeDisplay<'_> {
        TypeDisplay { table: self, ty: t }
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Renders a type as `NKCVN [lo, hi]`: one letter per axis, then the interval.
pub struct TypeDisplay<'a> {
    table: &'a TypeTable,
    ty: Type,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table.data(self.ty) {
            TypeData::Simple(a) => a.fmt_axes(f),
            TypeData::Table { attrs, content } => {
                attrs.fmt_axes(f)?;
                write!(f, ":Table({})", self.table.display(*content))
            }
            TypeData::Tuplet { attrs, items } => {
                write!(
                    f,
                    "{}{} {} : {{",
                    attrs.variability.letter(),
                    attrs.computability.letter(),
                    attrs.interval
                )?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "*")?;
                    }
                    write!(f, "{}", self.table.display(*item))?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_const(tt: &mut TypeTable, v: f64) -> Type {
        tt.make_simple(
            Nature::Int,
            Variability::Konst,
            Computability::Comp,
            Vectorability::Vect,
            Boolean::Num,
            Interval::point(v),
        )
    }

    #[test]
    fn identical_attributes_share_a_handle() {
        let mut tt = TypeTable::new();
        let a = int_const(&mut tt, 3.0);
        let b = int_const(&mut tt, 3.0);
        let c = int_const(&mut tt, 4.0);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(tt.len(), 2);
    }

    #[test]
    fn join_takes_axis_maximum_and_interval_union() {
        let mut tt = TypeTable::new();
        let a = int_const(&mut tt, 1.0);
        let input = tt.tinput();
        let j = tt.join(a, input).unwrap();
        assert_eq!(tt.nature(j), Nature::Real);
        assert_eq!(tt.variability(j), Variability::Samp);
        assert_eq!(tt.computability(j), Computability::Exec);
        assert!(!tt.interval(j).valid);

        let b = int_const(&mut tt, 5.0);
        let k = tt.join(a, b).unwrap();
        assert_eq!(tt.interval(k), Interval::new(1.0, 5.0));
    }

    #[test]
    fn join_of_mismatched_shapes_is_fatal() {
        let mut tt = TypeTable::new();
        let a = int_const(&mut tt, 1.0);
        let tup = tt.tuplet(vec![a]);
        let err = tt.join(a, tup).unwrap_err();
        assert_eq!(err.code, Some(codes::E0100));

        let tbl = tt.table(a);
        assert!(tt.join(tbl, a).is_err());
    }

    #[test]
    fn tuplet_join_requires_equal_arity() {
        let mut tt = TypeTable::new();
        let a = int_const(&mut tt, 1.0);
        let one = tt.tuplet(vec![a]);
        let two = tt.tuplet(vec![a, a]);
        let err = tt.join(one, two).unwrap_err();
        assert_eq!(err.code, Some(codes::E0101));
    }

    #[test]
    fn table_join_joins_contents() {
        let mut tt = TypeTable::new();
        let a = int_const(&mut tt, 1.0);
        let r = tt.tinput();
        let ta = tt.table(a);
        let tr = tt.table(r);
        let j = tt.join(ta, tr).unwrap();
        let content = tt.table_content(j).unwrap();
        assert_eq!(tt.nature(content), Nature::Real);
    }

    #[test]
    fn product_flattens_tuplets() {
        let mut tt = TypeTable::new();
        let a = int_const(&mut tt, 1.0);
        let b = int_const(&mut tt, 2.0);
        let ab = tt.product(a, b);
        let abc = tt.product(ab, a);
        assert_eq!(tt.tuplet_items(abc).unwrap(), &[a, b, a]);
        let empty = tt.tuplet(vec![]);
        assert_eq!(tt.product(a, empty), tt.tuplet(vec![a]));
    }

    #[test]
    fn subtype_matches_join_definition() {
        let mut tt = TypeTable::new();
        let a = int_const(&mut tt, 1.0);
        let input = tt.tinput();
        assert!(tt.subtype(a, a).unwrap());
        assert!(!tt.subtype(input, a).unwrap());
    }

    #[test]
    fn casts_reinterpret_nature_only() {
        let mut tt = TypeTable::new();
        let input = tt.tinput();
        let i = tt.int_cast(input);
        assert_eq!(tt.nature(i), Nature::Int);
        assert_eq!(tt.variability(i), Variability::Samp);
        let b = tt.bool_cast(input);
        assert_eq!(tt.boolean(b), Boolean::Bool);
        assert_eq!(tt.nature(b), Nature::Int);
    }

    #[test]
    fn checks_reject_wrong_types() {
        let mut tt = TypeTable::new();
        let input = tt.tinput();
        assert_eq!(tt.check_int(input).unwrap_err().code, Some(codes::E0102));
        assert_eq!(tt.check_konst(input).unwrap_err().code, Some(codes::E0103));
        assert_eq!(tt.check_init(input).unwrap_err().code, Some(codes::E0104));
        let k = int_const(&mut tt, 2.0);
        assert!(tt.check_int(k).and_then(|t| tt.check_konst(t)).is_ok());
    }

    #[test]
    fn display_forms() {
        let mut tt = TypeTable::new();
        let a = int_const(&mut tt, 1.0);
        let input = tt.tinput();
        insta::assert_snapshot!(tt.display(a).to_string(), @"NKCVN [1, 1]");
        insta::assert_snapshot!(tt.display(input).to_string(), @"RSEVN [?]");
        let tup = tt.tuplet(vec![a, input]);
        insta::assert_snapshot!(tt.display(tup).to_string(), @"SE [?] : {NKCVN [1, 1]*RSEVN [?]}");
        let tbl = tt.table(a);
        insta::assert_snapshot!(tt.display(tbl).to_string(), @"NKCVN [1, 1]:Table(NKCVN [1, 1])");
    }
}
