// env.rs — Slot environments and UI group paths
//
// Both are persistent, interned linked lists so that they can take part in
// the propagation memo key by handle. Environments bind slots to signals;
// paths record the stack of UI groups a widget lives in.

use std::fmt;

use crate::id::{EnvId, PathId, SigId, Slot};
use crate::intern::Interner;
use crate::signal::{Orientation, SignalArena};

// ── Slot environments ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnvData {
    Empty,
    Bind { slot: Slot, sig: SigId, next: EnvId },
}

#[derive(Debug)]
pub struct EnvTable {
    nodes: Interner<EnvData>,
    empty: EnvId,
}

impl Default for EnvTable {
    fn default() -> Self {
        let mut nodes = Interner::new();
        let (empty, _) = nodes.intern(EnvData::Empty);
        Self {
            nodes,
            empty: EnvId(empty),
        }
    }
}

impl EnvTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty(&self) -> EnvId {
        self.empty
    }

    pub fn push(&mut self, slot: Slot, sig: SigId, next: EnvId) -> EnvId {
        EnvId(self.nodes.intern(EnvData::Bind { slot, sig, next }).0)
    }

    /// Innermost binding of `slot`.
    pub fn lookup(&self, mut env: EnvId, slot: Slot) -> Option<SigId> {
        loop {
            match self.nodes.get(env.0) {
                EnvData::Empty => return None,
                EnvData::Bind { slot: s, sig, next } => {
                    if *s == slot {
                        return Some(*sig);
                    }
                    env = *next;
                }
            }
        }
    }

    /// Same bindings with every bound signal lifted one recursion level.
    pub fn lift(&mut self, env: EnvId, sigs: &mut SignalArena) -> EnvId {
        let mut bindings = Vec::new();
        let mut cur = env;
        while let EnvData::Bind { slot, sig, next } = self.nodes.get(cur.0).clone() {
            bindings.push((slot, sig));
            cur = next;
        }
        bindings
            .into_iter()
            .rev()
            .fold(self.empty, |acc, (slot, sig)| {
                let lifted = sigs.lift(sig);
                self.push(slot, lifted, acc)
            })
    }
}

// ── UI paths ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathData {
    Root,
    Group { orient: Orientation, label: String, parent: PathId },
    Widget { label: String, parent: PathId },
}

#[derive(Debug)]
pub struct PathTable {
    nodes: Interner<PathData>,
    root: PathId,
}

impl Default for PathTable {
    fn default() -> Self {
        let mut nodes = Interner::new();
        let (root, _) = nodes.intern(PathData::Root);
        Self {
            nodes,
            root: PathId(root),
        }
    }
}

impl PathTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> PathId {
        self.root
    }

    pub fn data(&self, p: PathId) -> &PathData {
        self.nodes.get(p.0)
    }

    pub fn push_group(&mut self, parent: PathId, orient: Orientation, label: &str) -> PathId {
        PathId(
            self.nodes
                .intern(PathData::Group {
                    orient,
                    label: label.to_string(),
                    parent,
                })
                .0,
        )
    }

    fn parent(&self, p: PathId) -> PathId {
        match self.data(p) {
            PathData::Root => p,
            PathData::Group { parent, .. } | PathData::Widget { parent, .. } => *parent,
        }
    }

    /// Resolve a widget label against the current group path.
    ///
    /// Segments are `/`-separated: empty and `.` segments are skipped, `..`
    /// pops a frame, `h:`/`v:`/`t:` segments push a group, and any other
    /// segment before the last pushes a vertical group. The last segment
    /// names the widget.
    pub fn normalize(&mut self, path: PathId, label: &str) -> PathId {
        let segments: Vec<&str> = label.split('/').collect();
        let Some((last, groups)) = segments.split_last() else {
            return self.widget(path, label);
        };
        let mut cur = path;
        for seg in groups {
            cur = match *seg {
                "" | "." => cur,
                ".." => self.parent(cur),
                s => {
                    let (orient, name) = split_orientation(s);
                    self.push_group(cur, orient, name)
                }
            };
        }
        self.widget(cur, last)
    }

    fn widget(&mut self, parent: PathId, label: &str) -> PathId {
        PathId(
            self.nodes
                .intern(PathData::Widget {
                    label: label.to_string(),
                    parent,
                })
                .0,
        )
    }

    pub fn display(&self, p: PathId) -> PathDisplay<'_> {
        PathDisplay { table: self, p }
    }
}

fn split_orientation(seg: &str) -> (Orientation, &str) {
    match seg.split_once(':') {
        Some(("h", rest)) => (Orientation::Horizontal, rest),
        Some(("v", rest)) => (Orientation::Vertical, rest),
        Some(("t", rest)) => (Orientation::Tab, rest),
        _ => (Orientation::Vertical, seg),
    }
}

pub struct PathDisplay<'a> {
    table: &'a PathTable,
    p: PathId,
}

impl fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut frames = Vec::new();
        let mut cur = self.p;
        loop {
            match self.table.data(cur) {
                PathData::Root => break,
                PathData::Group {
                    orient,
                    label,
                    parent,
                } => {
                    frames.push(format!("{}:{}", orient.prefix(), label));
                    cur = *parent;
                }
                PathData::Widget { label, parent } => {
                    frames.push(label.clone());
                    cur = *parent;
                }
            }
        }
        if frames.is_empty() {
            return write!(f, "/");
        }
        for frame in frames.iter().rev() {
            write!(f, "/{frame}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_binding_wins() {
        let mut sigs = SignalArena::new();
        let mut envs = EnvTable::new();
        let a = sigs.int(1);
        let b = sigs.int(2);
        let e1 = envs.push(Slot(0), a, envs.empty());
        let e2 = envs.push(Slot(0), b, e1);
        assert_eq!(envs.lookup(e2, Slot(0)), Some(b));
        assert_eq!(envs.lookup(e1, Slot(0)), Some(a));
        assert_eq!(envs.lookup(e2, Slot(1)), None);
    }

    #[test]
    fn equal_environments_share_a_handle() {
        let mut sigs = SignalArena::new();
        let mut envs = EnvTable::new();
        let a = sigs.input(0);
        let e1 = envs.push(Slot(3), a, envs.empty());
        let e2 = envs.push(Slot(3), a, envs.empty());
        assert_eq!(e1, e2);
    }

    #[test]
    fn lifting_shifts_bound_references() {
        let mut sigs = SignalArena::new();
        let mut envs = EnvTable::new();
        let r = sigs.db_ref(1);
        let k = sigs.int(7);
        let e = envs.push(Slot(0), r, envs.empty());
        let e = envs.push(Slot(1), k, e);
        let lifted = envs.lift(e, &mut sigs);
        let r2 = sigs.db_ref(2);
        assert_eq!(envs.lookup(lifted, Slot(0)), Some(r2));
        assert_eq!(envs.lookup(lifted, Slot(1)), Some(k));
    }

    #[test]
    fn labels_are_normalized_against_groups() {
        let mut paths = PathTable::new();
        let main = paths.push_group(paths.root(), Orientation::Horizontal, "main");
        let gain = paths.normalize(main, "gain");
        assert_eq!(paths.display(gain).to_string(), "/h:main/gain");

        let nested = paths.normalize(main, "v:sub/./freq");
        assert_eq!(paths.display(nested).to_string(), "/h:main/v:sub/freq");

        let up = paths.normalize(main, "../t:tabs/q");
        assert_eq!(paths.display(up).to_string(), "/t:tabs/q");
    }

    #[test]
    fn same_label_same_path_is_shared() {
        let mut paths = PathTable::new();
        let a = paths.normalize(paths.root(), "gain");
        let b = paths.normalize(paths.root(), "//gain");
        assert_eq!(a, b);
    }
}
