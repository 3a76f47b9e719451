// fixpoint.rs — Type annotation of recursive signals
//
// Types a set of root signals whose recursive groups are symbolic. Every
// group gets a tuplet hypothesis; its body is typed under the hypotheses
// and the result becomes the next hypothesis, until nothing moves.
//
//   1. Narrowing: starting from the most general hypothesis, a few passes
//      with interval intersection give an upper bound for every output.
//   2. Widening: starting from the most restrictive hypothesis, passes with
//      interval union grow every output. A bound that keeps moving for more
//      than `widening_limit` passes jumps to the narrowing bound (or to
//      infinity when that bound is not outward).
//   3. The roots are typed in the epoch of the last, stable pass.
//
// Preconditions: signals are symbolic; each group body is a signal list.
// Postconditions: every node reachable from the roots carries a type.
// Failure modes: any typing error; a group body that is not a list.
// Side effects: types and visit stamps in the signal arena; counters in
//   `Session::stats`.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::diag::{codes, Diagnostic};
use crate::id::{RecVar, SigId, Type};
use crate::interval::Interval;
use crate::session::Session;
use crate::signal::SigKind;
use crate::type_infer::Inferer;

/// One symbolic group reachable from the roots.
#[derive(Debug, Clone, Copy)]
struct Group {
    var: RecVar,
    sig: SigId,
    body: SigId,
    arity: usize,
}

/// Annotate `roots` and everything they reach with types.
pub fn type_annotation(s: &mut Session, roots: &[SigId]) -> Result<(), Diagnostic> {
    let groups = collect_groups(s, roots)?;
    debug!(groups = groups.len(), roots = roots.len(), "type annotation");

    let mut upper: Vec<Type> = groups
        .iter()
        .map(|g| {
            let t = s.types.trecmax();
            s.types.tuplet(vec![t; g.arity])
        })
        .collect();
    let mut current: Vec<Type> = groups
        .iter()
        .map(|g| {
            let t = s.types.trec();
            s.types.tuplet(vec![t; g.arity])
        })
        .collect();

    // ── Narrowing ────────────────────────────────────────────────────────
    if !groups.is_empty() {
        for _ in 0..s.options.narrowing_limit {
            update_rec_types(s, &groups, &mut upper, true)?;
        }
    }

    // ── Widening ─────────────────────────────────────────────────────────
    let mut age_lo: Vec<Vec<u32>> = groups.iter().map(|g| vec![0; g.arity]).collect();
    let mut age_hi = age_lo.clone();
    loop {
        s.stats.widening_iterations += 1;
        let previous = current.clone();
        update_rec_types(s, &groups, &mut current, false)?;

        let mut changed = false;
        for (i, g) in groups.iter().enumerate() {
            if current[i] == previous[i] {
                continue;
            }
            changed = true;
            let new_items = items(s, current[i])?;
            let old_items = items(s, previous[i])?;
            let up_items = items(s, upper[i])?;
            let mut widened = Vec::with_capacity(g.arity);
            for j in 0..g.arity {
                let new = s.types.interval(new_items[j]);
                let old = s.types.interval(old_items[j]);
                let up = s.types.interval(up_items[j]);
                let mut i_j = new;
                if new.valid && old.valid {
                    if new.lo != old.lo {
                        age_lo[i][j] += 1;
                        if age_lo[i][j] > s.options.widening_limit {
                            let lo = if up.valid && up.lo < new.lo {
                                up.lo
                            } else {
                                f64::NEG_INFINITY
                            };
                            i_j = i_j.with_lo(lo);
                            s.stats.forced_jumps += 1;
                            trace!(group = g.var.0, output = j, lo, "lower bound forced");
                        }
                    }
                    if new.hi != old.hi {
                        age_hi[i][j] += 1;
                        if age_hi[i][j] > s.options.widening_limit {
                            let hi = if up.valid && up.hi > new.hi {
                                up.hi
                            } else {
                                f64::INFINITY
                            };
                            i_j = i_j.with_hi(hi);
                            s.stats.forced_jumps += 1;
                            trace!(group = g.var.0, output = j, hi, "upper bound forced");
                        }
                    }
                }
                widened.push(s.types.with_interval(new_items[j], i_j));
            }
            current[i] = s.types.tuplet(widened);
        }
        if !changed {
            break;
        }
    }
    s.stats.groups_solved += groups.len() as u64;
    for (g, &t) in groups.iter().zip(&current) {
        debug!(group = g.var.0, ty = %s.types.display(t), "recursive group solved");
    }

    let mut inferer = Inferer::new(s);
    for &r in roots {
        inferer.ty(r)?;
    }
    Ok(())
}

/// One pass: install `vtype` as the hypotheses, type every body, and merge
/// the result back into `vtype` (intersection when `narrow`, else union).
fn update_rec_types(
    s: &mut Session,
    groups: &[Group],
    vtype: &mut [Type],
    narrow: bool,
) -> Result<(), Diagnostic> {
    let epoch = s.next_epoch();
    for (g, &t) in groups.iter().zip(vtype.iter()) {
        s.sigs.set_ty(g.sig, t);
        s.sigs.set_visited(g.sig, epoch);
    }

    let mut inferer = Inferer::new(s);
    let mut bodies = Vec::with_capacity(groups.len());
    for g in groups {
        bodies.push(inferer.ty(g.body)?);
    }

    for (i, (g, body)) in groups.iter().zip(bodies).enumerate() {
        let new_items = items(s, body)?;
        let old_items = items(s, vtype[i])?;
        if new_items.len() != g.arity || old_items.len() != g.arity {
            return Err(Diagnostic::error(
                codes::E0300,
                format!(
                    "recursive group W{} has {} outputs but its body types as {}",
                    g.var.0,
                    g.arity,
                    new_items.len()
                ),
            ));
        }
        let merged: Vec<Type> = new_items
            .iter()
            .zip(&old_items)
            .map(|(&n, &o)| {
                let (ni, oi) = (s.types.interval(n), s.types.interval(o));
                let i: Interval = if narrow {
                    ni.intersection(oi)
                } else {
                    ni.reunion(oi)
                };
                s.types.with_interval(n, i)
            })
            .collect();
        vtype[i] = s.types.tuplet(merged);
    }
    Ok(())
}

fn items(s: &Session, t: Type) -> Result<Vec<Type>, Diagnostic> {
    s.types
        .tuplet_items(t)
        .map(<[Type]>::to_vec)
        .ok_or_else(|| {
            Diagnostic::error(codes::E0301, "recursive group does not type as a tuplet")
                .with_context(s.types.display(t).to_string())
        })
}

/// Groups reachable from `roots`, in depth-first discovery order.
fn collect_groups(s: &Session, roots: &[SigId]) -> Result<Vec<Group>, Diagnostic> {
    let mut seen = HashSet::new();
    let mut groups = Vec::new();
    let mut stack: Vec<SigId> = roots.iter().rev().copied().collect();
    while let Some(sig) = stack.pop() {
        if !seen.insert(sig) {
            continue;
        }
        match s.sigs.kind(sig) {
            SigKind::Rec(var) => {
                let body = s.rec_body(*var).ok_or_else(|| {
                    Diagnostic::error(
                        codes::E0311,
                        format!("recursive group W{} has no body", var.0),
                    )
                })?;
                let arity = s
                    .sigs
                    .list_items(body)
                    .ok_or_else(|| {
                        Diagnostic::error(
                            codes::E0300,
                            format!("body of recursive group W{} is not a signal list", var.0),
                        )
                    })?
                    .len();
                groups.push(Group {
                    var: *var,
                    sig,
                    body,
                    arity,
                });
                stack.push(body);
            }
            kind => stack.extend(kind.children().into_iter().rev()),
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::BinOp;
    use crate::type_infer::get_certified_type;
    use crate::types::{Nature, Variability};

    /// Symbolic `+(1) ~ _`: W = [mem(proj0(W)) + 1].
    fn counter(s: &mut Session) -> SigId {
        let var = s.ids.alloc_rec_var();
        let w = s.sigs.rec(var);
        let p = s.sigs.proj(0, w);
        let m = s.sigs.delay1(p);
        let one = s.sigs.int(1);
        let sum = s.sigs.binop(BinOp::Add, m, one);
        let body = s.sigs.list(&[sum]);
        s.rec_bodies.insert(var, body);
        s.sigs.proj(0, w)
    }

    #[test]
    fn counter_widens_to_infinity() {
        let mut s = Session::default();
        let out = counter(&mut s);
        let root = s.sigs.delay1(out);
        type_annotation(&mut s, &[root]).unwrap();

        let t = get_certified_type(&s, out).unwrap();
        assert_eq!(s.types.nature(t), Nature::Int);
        assert_eq!(s.types.variability(t), Variability::Samp);
        let i = s.types.interval(t);
        assert_eq!(i.lo, 0.0);
        assert_eq!(i.hi, f64::INFINITY);
        assert!(s.stats.forced_jumps >= 1);
        assert!(s.stats.widening_iterations > u64::from(s.options.widening_limit));
        assert_eq!(s.stats.groups_solved, 1);
    }

    #[test]
    fn stable_group_converges_at_once() {
        let mut s = Session::default();
        let var = s.ids.alloc_rec_var();
        let w = s.sigs.rec(var);
        let p = s.sigs.proj(0, w);
        let m = s.sigs.delay1(p);
        let body = s.sigs.list(&[m]);
        s.rec_bodies.insert(var, body);
        type_annotation(&mut s, &[p]).unwrap();

        // The second pass only confirms the scalar outputs of the first.
        assert!(s.stats.widening_iterations <= 2);
        assert_eq!(s.stats.forced_jumps, 0);
        let t = get_certified_type(&s, p).unwrap();
        assert_eq!(s.types.interval(t), Interval::point(0.0));
    }

    #[test]
    fn roots_without_recursion_are_typed() {
        let mut s = Session::default();
        let x = s.sigs.input(0);
        let two = s.sigs.int(2);
        let y = s.sigs.binop(BinOp::Mul, x, two);
        let before = s.epoch();
        type_annotation(&mut s, &[y]).unwrap();
        assert!(s.epoch() > before);
        let t = get_certified_type(&s, y).unwrap();
        insta::assert_snapshot!(s.types.display(t).to_string(), @"RSEVN [?]");
    }

    #[test]
    fn every_reachable_group_is_solved() {
        let mut s = Session::default();
        let inner = counter(&mut s);
        // W2 = [proj0(W1) + mem(proj0(W2))]
        let var = s.ids.alloc_rec_var();
        let w = s.sigs.rec(var);
        let p = s.sigs.proj(0, w);
        let m = s.sigs.delay1(p);
        let sum = s.sigs.binop(BinOp::Add, inner, m);
        let body = s.sigs.list(&[sum]);
        s.rec_bodies.insert(var, body);

        type_annotation(&mut s, &[p]).unwrap();
        assert_eq!(s.stats.groups_solved, 2);
        assert!(get_certified_type(&s, inner).is_ok());
        assert!(get_certified_type(&s, sum).is_ok());
    }

    #[test]
    fn shared_subterms_are_typed_once_per_pass() {
        let mut s = Session::default();
        let out = counter(&mut s);
        let a = s.sigs.delay1(out);
        let b = s.sigs.binop(BinOp::Mul, a, a);
        type_annotation(&mut s, &[a, b]).unwrap();
        let ta = get_certified_type(&s, a).unwrap();
        let tb = get_certified_type(&s, b).unwrap();
        assert_eq!(s.types.interval(ta).lo, 0.0);
        assert_eq!(s.types.nature(tb), Nature::Int);
    }

    #[test]
    fn body_must_be_a_list() {
        let mut s = Session::default();
        let var = s.ids.alloc_rec_var();
        let w = s.sigs.rec(var);
        let one = s.sigs.int(1);
        s.rec_bodies.insert(var, one);
        let err = type_annotation(&mut s, &[w]).unwrap_err();
        assert_eq!(err.code, Some(codes::E0300));
    }
}
