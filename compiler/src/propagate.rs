// propagate.rs — Box-to-signal propagation
//
// Elaborates a box term applied to a list of input signals into the list of
// its output signals. Composition operators split, route and recombine the
// signal lists; leaves build signal nodes. Feedback (`A ~ B`) builds a de
// Bruijn recursive group whose members refer to the group through `DbRef(1)`.
//
// Preconditions: the box and signals belong to the session's arenas.
// Postconditions: results are memoized per (environment, path, box, inputs);
//   a repeated call with an equal key performs no new derivation.
// Failure modes: input count mismatches, malformed routes, foreign function
//   arity mismatches, invalid compositions, constant-folding domain errors.
// Side effects: grows the signal/env/path arenas and the memo; bumps
//   `stats.derivations` / `stats.memo_hits`.

use tracing::{trace, warn};

use crate::boxes::{BoxKind, Literal, Prim};
use crate::diag::{codes, Diagnostic};
use crate::id::{BoxId, EnvId, PathId, SigId};
use crate::session::Session;
use crate::signal::{BinOp, Real64, SigKind, SliderKind};

/// Output signals of `b` applied to `inputs`.
pub fn propagate(
    s: &mut Session,
    env: EnvId,
    path: PathId,
    b: BoxId,
    inputs: &[SigId],
) -> Result<Vec<SigId>, Diagnostic> {
    Propagator { s }.propagate(env, path, b, inputs)
}

/// Propagate a closed box onto fresh audio inputs `IN[0..n)`.
pub fn propagate_root(s: &mut Session, b: BoxId) -> Result<Vec<SigId>, Diagnostic> {
    let (ins, _) = s.boxes.arity(b, &s.registry)?;
    let inputs: Vec<SigId> = (0..ins as u32).map(|i| s.sigs.input(i)).collect();
    let env = s.envs.empty();
    let path = s.paths.root();
    propagate(s, env, path, b, &inputs)
}

struct Propagator<'a> {
    s: &'a mut Session,
}

impl Propagator<'_> {
    fn propagate(
        &mut self,
        env: EnvId,
        path: PathId,
        b: BoxId,
        inputs: &[SigId],
    ) -> Result<Vec<SigId>, Diagnostic> {
        let key = (env, path, b, inputs.to_vec());
        if let Some(out) = self.s.propagate_memo.get(&key) {
            self.s.stats.memo_hits += 1;
            trace!(box_id = b.0, "propagate memo hit");
            return Ok(out.clone());
        }
        self.s.stats.derivations += 1;
        trace!(box_id = b.0, inputs = inputs.len(), "propagate");
        let out = self.derive(env, path, b, inputs).map_err(|d| {
            if d.context.is_some() {
                d
            } else {
                let ctx = self.s.boxes.display(b).to_string();
                d.with_context(ctx)
            }
        })?;
        self.s.propagate_memo.insert(key, out.clone());
        Ok(out)
    }

    fn arity(&mut self, b: BoxId) -> Result<(usize, usize), Diagnostic> {
        self.s.boxes.arity(b, &self.s.registry)
    }

    fn derive(
        &mut self,
        env: EnvId,
        path: PathId,
        b: BoxId,
        lsig: &[SigId],
    ) -> Result<Vec<SigId>, Diagnostic> {
        let (ins, _) = self.arity(b)?;
        if lsig.len() != ins {
            return Err(Diagnostic::error(
                codes::E0200,
                format!("box expects {} input(s), got {}", ins, lsig.len()),
            ));
        }
        let kind = self.s.boxes.kind(b).clone();
        let sigs = &mut self.s.sigs;
        Ok(match kind {
            // ── Numbers and declarations ─────────────────────────────────
            BoxKind::Int(i) => vec![sigs.int(i)],
            BoxKind::Real(r) => vec![sigs.real(r.get())],
            BoxKind::Waveform(values) => {
                let items: Vec<SigId> = values
                    .iter()
                    .map(|v| match v {
                        Literal::Int(i) => sigs.int(*i),
                        Literal::Real(r) => sigs.real(r.get()),
                    })
                    .collect();
                let len = sigs.int(items.len() as i32);
                let content = sigs.intern(SigKind::Waveform(items));
                vec![len, content]
            }
            BoxKind::FConst { nature, name, file } => {
                vec![sigs.intern(SigKind::FConst { nature, name, file })]
            }
            BoxKind::FVar { nature, name, file } => {
                vec![sigs.intern(SigKind::FVar { nature, name, file })]
            }

            // ── Wires ────────────────────────────────────────────────────
            BoxKind::Cut => Vec::new(),
            BoxKind::Wire => lsig.to_vec(),

            // ── Slots and abstractions ───────────────────────────────────
            BoxKind::Slot(slot) => match self.s.envs.lookup(env, slot) {
                Some(sig) => vec![sig],
                None => {
                    let n = self.s.ids.alloc_dummy_input();
                    warn!(slot = slot.0, input = n, "unbound slot, using a placeholder input");
                    vec![self.s.sigs.input(n)]
                }
            },
            BoxKind::Symbolic(slot, body) => {
                let env2 = self.s.envs.push(slot, lsig[0], env);
                self.propagate(env2, path, body, &lsig[1..])?
            }

            // ── Primitives ───────────────────────────────────────────────
            BoxKind::Prim(p) => vec![self.prim(p, lsig)?],
            BoxKind::FFun(ff) => {
                if ff.args.len() != lsig.len() {
                    return Err(Diagnostic::error(
                        codes::E0202,
                        format!(
                            "foreign function '{}' expects {} argument(s), got {}",
                            ff.name,
                            ff.args.len(),
                            lsig.len()
                        ),
                    ));
                }
                vec![sigs.intern(SigKind::FFun(ff, lsig.to_vec()))]
            }
            BoxKind::Xtended(id) => {
                vec![self.s.registry.call(id, &mut self.s.sigs, lsig.to_vec())?]
            }

            // ── User interface ───────────────────────────────────────────
            BoxKind::Button(label) => {
                let p = self.s.paths.normalize(path, &label);
                vec![self.s.sigs.intern(SigKind::Button(p))]
            }
            BoxKind::Checkbox(label) => {
                let p = self.s.paths.normalize(path, &label);
                vec![self.s.sigs.intern(SigKind::Checkbox(p))]
            }
            BoxKind::Slider {
                kind,
                label,
                cur,
                min,
                max,
                step,
            } => vec![self.slider(path, kind, &label, [cur, min, max, step])?],
            BoxKind::Bargraph {
                orient,
                label,
                min,
                max,
            } => {
                let p = self.s.paths.normalize(path, &label);
                let sigs = &mut self.s.sigs;
                let (min, max) = (sigs.real(min.get()), sigs.real(max.get()));
                vec![sigs.intern(SigKind::Bargraph {
                    orient,
                    path: p,
                    min,
                    max,
                    input: lsig[0],
                })]
            }
            BoxKind::Soundfile { label, chans } => self.soundfile(path, &label, chans, lsig)?,
            BoxKind::Group(orient, label, body) => {
                let p = self.s.paths.push_group(path, orient, &label);
                self.propagate(env, p, body, lsig)?
            }

            // ── Composition ──────────────────────────────────────────────
            BoxKind::Seq(x, y) => self.seq(env, path, x, y, lsig)?,
            BoxKind::Par(x, y) => {
                let (in1, _) = self.arity(x)?;
                let mut out = self.propagate(env, path, x, &lsig[..in1])?;
                out.extend(self.propagate(env, path, y, &lsig[in1..])?);
                out
            }
            BoxKind::Split(x, y) => {
                let (in2, _) = self.arity(y)?;
                let l1 = self.propagate(env, path, x, lsig)?;
                let l2 = split(&l1, in2)?;
                self.propagate(env, path, y, &l2)?
            }
            BoxKind::Merge(x, y) => {
                let (in2, _) = self.arity(y)?;
                let l1 = self.propagate(env, path, x, lsig)?;
                let l2 = self.mix(&l1, in2);
                self.propagate(env, path, y, &l2)?
            }
            BoxKind::Rec(x, y) => self.rec(env, path, x, y, lsig)?,
            BoxKind::Route(i, o, pairs) => self.route(i, o, pairs, lsig)?,
            BoxKind::Environment => Vec::new(),
        })
    }

    fn prim(&mut self, p: Prim, a: &[SigId]) -> Result<SigId, Diagnostic> {
        let enable_control = self.s.options.enable_control;
        let sigs = &mut self.s.sigs;
        Ok(match p {
            Prim::Bin(op) => sigs.fold_binop(op, a[0], a[1]),
            Prim::IntCast => sigs.fold_int_cast(a[0]),
            Prim::FloatCast => sigs.fold_float_cast(a[0]),
            Prim::Mem => sigs.delay1(a[0]),
            Prim::Prefix => sigs.intern(SigKind::Prefix(a[0], a[1])),
            Prim::Delay => sigs.delay(a[0], a[1]),
            Prim::Attach => sigs.intern(SigKind::Attach(a[0], a[1])),
            // enable(x, y) = control(x * y, y != 0)
            Prim::Enable => {
                let prod = sigs.binop(BinOp::Mul, a[0], a[1]);
                if enable_control {
                    let zero = sigs.real(0.0);
                    let on = sigs.binop(BinOp::Ne, a[1], zero);
                    sigs.intern(SigKind::Control(prod, on))
                } else {
                    prod
                }
            }
            // control(x, y) = control(x, y != 0)
            Prim::Control => {
                if enable_control {
                    let zero = sigs.real(0.0);
                    let on = sigs.binop(BinOp::Ne, a[1], zero);
                    sigs.intern(SigKind::Control(a[0], on))
                } else {
                    a[0]
                }
            }
            Prim::Select2 => sigs.intern(SigKind::Select2(a[0], a[1], a[2])),
            // rdtable(size, init, ridx)
            Prim::RdTable => {
                let gen = sigs.intern(SigKind::Gen(a[1]));
                let table = sigs.intern(SigKind::Table { size: a[0], gen });
                sigs.intern(SigKind::RdTable {
                    table,
                    index: a[2],
                })
            }
            // rwtable(size, init, widx, wsig, ridx)
            Prim::RwTable => {
                let gen = sigs.intern(SigKind::Gen(a[1]));
                let table = sigs.intern(SigKind::Table { size: a[0], gen });
                let written = sigs.intern(SigKind::WrTable {
                    table,
                    index: a[2],
                    data: a[3],
                });
                sigs.intern(SigKind::RdTable {
                    table: written,
                    index: a[4],
                })
            }
            Prim::Lowest => sigs.intern(SigKind::Lowest(a[0])),
            Prim::Highest => sigs.intern(SigKind::Highest(a[0])),
            // assertbounds(lo, hi, x)
            Prim::AssertBounds => sigs.intern(SigKind::AssertBounds(a[0], a[1], a[2])),
        })
    }

    fn slider(
        &mut self,
        path: PathId,
        kind: SliderKind,
        label: &str,
        params: [Real64; 4],
    ) -> Result<SigId, Diagnostic> {
        let p = self.s.paths.normalize(path, label);
        let sigs = &mut self.s.sigs;
        let [cur, min, max, step] = params.map(|v| sigs.real(v.get()));
        let slider = sigs.intern(SigKind::Slider {
            kind,
            path: p,
            cur,
            min,
            max,
            step,
        });
        if !self.s.options.range_ui {
            return Ok(slider);
        }
        // max(min, min(max, slider))
        let registry = &self.s.registry;
        let upper = registry.call_named("min", &mut self.s.sigs, vec![max, slider])?;
        registry.call_named("max", &mut self.s.sigs, vec![min, upper])
    }

    fn soundfile(
        &mut self,
        path: PathId,
        label: &str,
        chans: u32,
        lsig: &[SigId],
    ) -> Result<Vec<SigId>, Diagnostic> {
        let p = self.s.paths.normalize(path, label);
        let sigs = &mut self.s.sigs;
        let sf = sigs.intern(SigKind::Soundfile(p));
        let part = sigs.int_cast(lsig[0]);
        let length = sigs.intern(SigKind::SoundfileLength(sf, part));
        let rate = sigs.intern(SigKind::SoundfileRate(sf, part));

        // int(max(0, min(ridx, length - 1)))
        let one = sigs.int(1);
        let zero = sigs.int(0);
        let last = sigs.binop(BinOp::Sub, length, one);
        let registry = &self.s.registry;
        let upper = registry.call_named("min", &mut self.s.sigs, vec![lsig[1], last])?;
        let clamped = registry.call_named("max", &mut self.s.sigs, vec![zero, upper])?;
        let sigs = &mut self.s.sigs;
        let ridx = sigs.int_cast(clamped);

        let mut out = vec![length, rate];
        for c in 0..chans {
            let chan = sigs.int(c as i32);
            out.push(sigs.intern(SigKind::SoundfileBuffer {
                sf,
                chan,
                part,
                index: ridx,
            }));
        }
        Ok(out)
    }

    fn seq(
        &mut self,
        env: EnvId,
        path: PathId,
        x: BoxId,
        y: BoxId,
        lsig: &[SigId],
    ) -> Result<Vec<SigId>, Diagnostic> {
        let (in1, out1) = self.arity(x)?;
        let (in2, _) = self.arity(y)?;
        if out1 == in2 {
            let l1 = self.propagate(env, path, x, lsig)?;
            self.propagate(env, path, y, &l1)
        } else if out1 > in2 {
            // A's extra outputs pass through after B's outputs.
            let l1 = self.propagate(env, path, x, lsig)?;
            let mut out = self.propagate(env, path, y, &l1[..in2])?;
            out.extend_from_slice(&l1[in2..]);
            Ok(out)
        } else {
            // B's missing inputs come straight from the caller.
            let mut l1 = self.propagate(env, path, x, &lsig[..in1])?;
            l1.extend_from_slice(&lsig[in1..in1 + (in2 - out1)]);
            self.propagate(env, path, y, &l1)
        }
    }

    /// Sum `lsig` round-robin into `nbus` buckets.
    fn mix(&mut self, lsig: &[SigId], nbus: usize) -> Vec<SigId> {
        let sigs = &mut self.s.sigs;
        (0..nbus)
            .map(|b| {
                let start = match lsig.get(b) {
                    Some(&s) => s,
                    None => sigs.int(0),
                };
                lsig.iter()
                    .skip(b + nbus)
                    .step_by(nbus)
                    .fold(start, |acc, &s| sigs.add_simplified(acc, s))
            })
            .collect()
    }

    /// `x ~ y`. Outputs that close over the group read it one sample late,
    /// as `mem(proj(p, group))`; outputs that do not are returned as is.
    fn rec(
        &mut self,
        env: EnvId,
        path: PathId,
        x: BoxId,
        y: BoxId,
        lsig: &[SigId],
    ) -> Result<Vec<SigId>, Diagnostic> {
        let (in2, _) = self.arity(y)?;

        // References inside the group see the enclosing scope one level up.
        let env2 = self.s.envs.lift(env, &mut self.s.sigs);
        let sigs = &mut self.s.sigs;
        let group_ref = sigs.db_ref(1);
        let l0: Vec<SigId> = (0..in2 as u32)
            .map(|i| {
                let p = sigs.proj(i, group_ref);
                sigs.delay1(p)
            })
            .collect();

        let mut l1 = self.propagate(env2, path, y, &l0)?;
        let lifted: Vec<SigId> = lsig.iter().map(|&s| self.s.sigs.lift(s)).collect();
        l1.extend(lifted);
        let l2 = self.propagate(env2, path, x, &l1)?;

        let l3 = if self.s.options.ftz_mode > 0 {
            let ftz = self.s.registry.require("ftz")?;
            l2.into_iter()
                .map(|s| self.s.registry.call(ftz, &mut self.s.sigs, vec![s]))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            l2
        };

        let sigs = &mut self.s.sigs;
        let body = sigs.list(&l3);
        let group = sigs.db_rec(body);
        Ok(l3
            .iter()
            .enumerate()
            .map(|(p, &e)| {
                if sigs.aperture(e) > 0 {
                    let proj = sigs.proj(p as u32, group);
                    sigs.delay1(proj)
                } else {
                    // Closed branch: no need to go through the group.
                    e
                }
            })
            .collect())
    }

    fn route(
        &mut self,
        ins: BoxId,
        outs: BoxId,
        pairs: BoxId,
        lsig: &[SigId],
    ) -> Result<Vec<SigId>, Diagnostic> {
        let boxes = &self.s.boxes;
        let (Some(ins), Some(outs)) = (boxes.literal_int(ins), boxes.literal_int(outs)) else {
            return Err(Diagnostic::error(codes::E0201, "invalid route expression"));
        };
        let mut table = Vec::new();
        boxes.int_list(pairs, &mut table)?;

        let sigs = &mut self.s.sigs;
        let zero = sigs.int(0);
        let mut out = vec![zero; outs.max(0) as usize];
        for pair in table.chunks_exact(2) {
            let (src, dst) = (pair[0], pair[1]);
            if dst > 0 && dst <= outs && src > 0 && src <= ins {
                let d = (dst - 1) as usize;
                let input = lsig[(src - 1) as usize];
                out[d] = sigs.add_simplified(out[d], input);
            }
        }
        Ok(out)
    }
}

/// Distribute `lsig` cyclically over `nbus` inputs.
fn split(lsig: &[SigId], nbus: usize) -> Result<Vec<SigId>, Diagnostic> {
    if lsig.is_empty() && nbus > 0 {
        return Err(Diagnostic::error(
            codes::E0204,
            "split composition has no output to distribute",
        ));
    }
    Ok((0..nbus).map(|b| lsig[b % lsig.len()]).collect())
}
