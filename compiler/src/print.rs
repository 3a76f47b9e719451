// print.rs — Signal pretty printer
//
// Renders a signal as a fully parenthesized expression. Symbolic groups
// print as their variable (`W3`); their bodies are listed separately by
// the driver, so printing always terminates.
//
// Preconditions: the signal belongs to the session's arena.
// Postconditions: none (read-only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::id::SigId;
use crate::session::Session;
use crate::signal::{SigKind, SliderKind};

/// Display adapter for one signal.
pub struct SignalDisplay<'a> {
    s: &'a Session,
    sig: SigId,
}

/// Render `sig` (see [`SignalDisplay`]).
pub fn display_signal(s: &Session, sig: SigId) -> SignalDisplay<'_> {
    SignalDisplay { s, sig }
}

impl fmt::Display for SignalDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sig(self.s, self.sig, f)
    }
}

fn call(s: &Session, f: &mut fmt::Formatter<'_>, name: &str, args: &[SigId]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, &a) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_sig(s, a, f)?;
    }
    f.write_str(")")
}

fn write_sig(s: &Session, sig: SigId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    use SigKind::*;
    match s.sigs.kind(sig) {
        Int(i) => write!(f, "{i}"),
        Real(r) => write!(f, "{:?}", r.get()),
        Input(i) => write!(f, "IN[{i}]"),
        Delay1(x) => call(s, f, "mem", &[*x]),
        Prefix(a, b) => call(s, f, "prefix", &[*a, *b]),
        Delay(x, d) => call(s, f, "delay", &[*x, *d]),
        BinOp(op, a, b) => {
            f.write_str("(")?;
            write_sig(s, *a, f)?;
            write!(f, " {} ", op.symbol())?;
            write_sig(s, *b, f)?;
            f.write_str(")")
        }
        IntCast(x) => call(s, f, "int", &[*x]),
        FloatCast(x) => call(s, f, "float", &[*x]),
        FFun(ff, args) => call(s, f, &ff.name, args),
        FConst { name, .. } | FVar { name, .. } => f.write_str(name),
        Button(p) => write!(f, "button({})", s.paths.display(*p)),
        Checkbox(p) => write!(f, "checkbox({})", s.paths.display(*p)),
        Slider {
            kind,
            path,
            cur,
            min,
            max,
            step,
        } => {
            let name = match kind {
                SliderKind::HSlider => "hslider",
                SliderKind::VSlider => "vslider",
                SliderKind::NumEntry => "nentry",
            };
            write!(f, "{name}({}, ", s.paths.display(*path))?;
            for (i, &a) in [*cur, *min, *max, *step].iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_sig(s, a, f)?;
            }
            f.write_str(")")
        }
        Bargraph {
            orient,
            path,
            min,
            max,
            input,
        } => {
            write!(f, "{}bargraph({}, ", orient.prefix(), s.paths.display(*path))?;
            write_sig(s, *min, f)?;
            f.write_str(", ")?;
            write_sig(s, *max, f)?;
            f.write_str(", ")?;
            write_sig(s, *input, f)?;
            f.write_str(")")
        }
        Soundfile(p) => write!(f, "soundfile({})", s.paths.display(*p)),
        SoundfileLength(sf, part) => call(s, f, "length", &[*sf, *part]),
        SoundfileRate(sf, part) => call(s, f, "rate", &[*sf, *part]),
        SoundfileBuffer {
            sf,
            chan,
            part,
            index,
        } => call(s, f, "buffer", &[*sf, *chan, *part, *index]),
        Attach(a, b) => call(s, f, "attach", &[*a, *b]),
        Enable(a, b) => call(s, f, "enable", &[*a, *b]),
        Control(a, b) => call(s, f, "control", &[*a, *b]),
        Select2(c, a, b) => call(s, f, "select2", &[*c, *a, *b]),
        AssertBounds(lo, hi, x) => call(s, f, "assertbounds", &[*lo, *hi, *x]),
        Lowest(x) => call(s, f, "lowest", &[*x]),
        Highest(x) => call(s, f, "highest", &[*x]),
        Table { size, gen } => call(s, f, "table", &[*size, *gen]),
        Gen(x) => call(s, f, "gen", &[*x]),
        WrTable { table, index, data } => call(s, f, "wrtable", &[*table, *index, *data]),
        RdTable { table, index } => call(s, f, "rdtable", &[*table, *index]),
        Waveform(values) => {
            f.write_str("waveform{")?;
            for (i, &v) in values.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_sig(s, v, f)?;
            }
            f.write_str("}")
        }
        Xtended(id, args) => {
            let name = s.registry.get(*id).map_or("xtended", |p| p.name());
            call(s, f, name, args)
        }
        Proj(i, g) => {
            write!(f, "proj{i}(")?;
            write_sig(s, *g, f)?;
            f.write_str(")")
        }
        Rec(var) => write!(f, "W{}", var.0),
        DbRef(level) => write!(f, "ref({level})"),
        DbRec(body) => call(s, f, "rec", &[*body]),
        Nil => f.write_str("nil"),
        Cons(head, tail) => match s.sigs.list_items(sig) {
            Some(items) => {
                f.write_str("[")?;
                for (i, &x) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_sig(s, x, f)?;
                }
                f.write_str("]")
            }
            None => call(s, f, "cons", &[*head, *tail]),
        },
    }
}

/// Short name of a signal kind, as used in reports and graphs.
pub fn kind_name(kind: &SigKind) -> &'static str {
    use SigKind::*;
    match kind {
        Int(_) => "int",
        Real(_) => "real",
        Input(_) => "input",
        Delay1(_) => "mem",
        Prefix(..) => "prefix",
        Delay(..) => "delay",
        BinOp(..) => "binop",
        IntCast(_) => "intcast",
        FloatCast(_) => "floatcast",
        FFun(..) => "ffun",
        FConst { .. } => "fconst",
        FVar { .. } => "fvar",
        Button(_) => "button",
        Checkbox(_) => "checkbox",
        Slider { .. } => "slider",
        Bargraph { .. } => "bargraph",
        Soundfile(_) => "soundfile",
        SoundfileLength(..) => "soundfile_length",
        SoundfileRate(..) => "soundfile_rate",
        SoundfileBuffer { .. } => "soundfile_buffer",
        Attach(..) => "attach",
        Enable(..) => "enable",
        Control(..) => "control",
        Select2(..) => "select2",
        AssertBounds(..) => "assertbounds",
        Lowest(_) => "lowest",
        Highest(_) => "highest",
        Table { .. } => "table",
        Gen(_) => "gen",
        WrTable { .. } => "wrtable",
        RdTable { .. } => "rdtable",
        Waveform(_) => "waveform",
        Xtended(..) => "xtended",
        Proj(..) => "proj",
        Rec(_) => "rec",
        DbRef(_) => "dbref",
        DbRec(_) => "dbrec",
        Nil => "nil",
        Cons(..) => "cons",
    }
}
