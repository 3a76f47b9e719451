// debruijn.rs — de Bruijn to symbolic recursion
//
// Propagation builds recursive groups with de Bruijn binders: `DbRec(body)`
// binds the group and `DbRef(n)` refers to the n-th enclosing group. Type
// inference works on symbolic groups instead: each `DbRec` becomes a leaf
// `Rec(var)` whose body is kept in the session's body table, with the
// references to it replaced by `Rec(var)` as well.
//
// Preconditions: the root signals are closed (aperture 0).
// Postconditions: no `DbRec`/`DbRef` node is reachable from the result;
//   structurally equal groups map to the same symbolic variable.
// Failure modes: a free de Bruijn reference (open term).
// Side effects: allocates recursion variables; fills `rec_bodies`.

use tracing::debug;

use crate::diag::{codes, Diagnostic};
use crate::id::{RecVar, SigId};
use crate::session::Session;
use crate::signal::SigKind;

/// Convert every signal of `roots` to symbolic recursion.
pub fn de_bruijn_to_sym(s: &mut Session, roots: &[SigId]) -> Result<Vec<SigId>, Diagnostic> {
    let mut env = Vec::new();
    let out = roots
        .iter()
        .map(|&r| convert(s, r, &mut env))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(groups = s.rec_bodies.len(), "recursive groups symbolized");
    Ok(out)
}

/// `env` lists the variables of the enclosing groups, innermost last.
fn convert(s: &mut Session, sig: SigId, env: &mut Vec<RecVar>) -> Result<SigId, Diagnostic> {
    let aperture = s.sigs.aperture(sig) as usize;
    if aperture > env.len() {
        return Err(Diagnostic::error(
            codes::E0300,
            format!("free recursion reference in {sig} (depth {aperture})"),
        ));
    }
    let key = (sig, env[env.len() - aperture..].to_vec());
    if let Some(&done) = s.symbolize_memo.get(&key) {
        return Ok(done);
    }

    let kind = s.sigs.kind(sig).clone();
    let result = match kind {
        SigKind::DbRef(n) => {
            let var = env[env.len() - n as usize];
            s.sigs.rec(var)
        }
        SigKind::DbRec(body) => {
            let var = s.ids.alloc_rec_var();
            env.push(var);
            let converted = convert(s, body, env);
            env.pop();
            s.rec_bodies.insert(var, converted?);
            s.sigs.rec(var)
        }
        other => {
            let children = other.children();
            if children.is_empty() {
                sig
            } else {
                let mut converted = Vec::with_capacity(children.len());
                for c in children {
                    converted.push(convert(s, c, env)?);
                }
                s.sigs.intern(other.with_children(&converted))
            }
        }
    };
    s.symbolize_memo.insert(key, result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::BinOp;

    /// `DbRec([x + mem(proj0(ref1))])` as propagation builds it for `+ ~ _`.
    fn counter_group(s: &mut Session, x: SigId) -> SigId {
        let r = s.sigs.db_ref(1);
        let p = s.sigs.proj(0, r);
        let m = s.sigs.delay1(p);
        let sum = s.sigs.binop(BinOp::Add, m, x);
        let body = s.sigs.list(&[sum]);
        s.sigs.db_rec(body)
    }

    #[test]
    fn groups_become_symbolic() {
        let mut s = Session::default();
        let x = s.sigs.input(0);
        let g = counter_group(&mut s, x);
        let out = s.sigs.proj(0, g);
        let converted = de_bruijn_to_sym(&mut s, &[out]).unwrap();

        let SigKind::Proj(0, rec) = s.sigs.kind(converted[0]).clone() else {
            panic!("expected a projection");
        };
        let SigKind::Rec(var) = s.sigs.kind(rec).clone() else {
            panic!("expected a symbolic group");
        };
        let body = s.rec_body(var).unwrap();
        let items = s.sigs.list_items(body).unwrap();
        // The body refers back to the same symbolic group.
        let SigKind::BinOp(_, m, _) = s.sigs.kind(items[0]).clone() else {
            panic!("expected the sum");
        };
        let SigKind::Delay1(p) = s.sigs.kind(m).clone() else {
            panic!("expected a delay");
        };
        assert_eq!(s.sigs.kind(p), &SigKind::Proj(0, rec));
    }

    #[test]
    fn equal_groups_share_a_variable() {
        let mut s = Session::default();
        let x = s.sigs.input(0);
        let g = counter_group(&mut s, x);
        let a = s.sigs.proj(0, g);
        let b = s.sigs.delay1(a);
        let converted = de_bruijn_to_sym(&mut s, &[a, b]).unwrap();
        assert_eq!(s.rec_bodies.len(), 1);
        assert_eq!(s.sigs.kind(converted[1]), &SigKind::Delay1(converted[0]));
    }

    #[test]
    fn nested_groups_resolve_outer_references() {
        let mut s = Session::default();
        // DbRec([proj0(DbRec([ref2 + ref1]))])
        let r1 = s.sigs.db_ref(1);
        let r2 = s.sigs.db_ref(2);
        let inner_sum = s.sigs.binop(BinOp::Add, r2, r1);
        let inner_body = s.sigs.list(&[inner_sum]);
        let inner = s.sigs.db_rec(inner_body);
        let p = s.sigs.proj(0, inner);
        let outer_body = s.sigs.list(&[p]);
        let outer = s.sigs.db_rec(outer_body);
        assert_eq!(s.sigs.aperture(outer), 0);

        de_bruijn_to_sym(&mut s, &[outer]).unwrap();
        let groups = s.rec_groups();
        assert_eq!(groups.len(), 2);
        let (outer_var, _) = groups[0];
        let (inner_var, inner_body) = groups[1];
        let items = s.sigs.list_items(inner_body).unwrap();
        let SigKind::BinOp(_, a, b) = s.sigs.kind(items[0]).clone() else {
            panic!("expected the sum");
        };
        assert_eq!(s.sigs.kind(a), &SigKind::Rec(outer_var));
        assert_eq!(s.sigs.kind(b), &SigKind::Rec(inner_var));
    }

    #[test]
    fn free_reference_is_fatal() {
        let mut s = Session::default();
        let r = s.sigs.db_ref(1);
        let err = de_bruijn_to_sym(&mut s, &[r]).unwrap_err();
        assert_eq!(err.code, Some(codes::E0300));
    }
}
