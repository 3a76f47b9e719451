// session.rs — Compiler session context
//
// Owns every piece of state one compilation needs: the hash-consed arenas,
// the registry, options, memo tables and counters. Nothing is global, so two
// sessions never share types, signals or visit stamps.

use std::collections::HashMap;

use crate::boxes::BoxArena;
use crate::config::CompilerOptions;
use crate::env::{EnvTable, PathTable};
use crate::id::{BoxId, EnvId, IdAllocator, PathId, RecVar, SigId};
use crate::registry::Registry;
use crate::signal::SignalArena;
use crate::types::TypeTable;

/// Propagation memo key: environment, UI path, box and input signals.
pub(crate) type PropagateKey = (EnvId, PathId, BoxId, Vec<SigId>);

/// Counters reported by the driver and checked by tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Propagation calls that actually derived a result.
    pub derivations: u64,
    /// Propagation calls answered from the memo.
    pub memo_hits: u64,
    /// Recursive groups solved by the fixpoint.
    pub groups_solved: u64,
    /// Widening iterations across all groups.
    pub widening_iterations: u64,
    /// Bounds forced to their upper-bound value after aging.
    pub forced_jumps: u64,
}

#[derive(Debug)]
pub struct Session {
    pub types: TypeTable,
    pub sigs: SignalArena,
    pub boxes: BoxArena,
    pub envs: EnvTable,
    pub paths: PathTable,
    pub registry: Registry,
    pub options: CompilerOptions,
    pub ids: IdAllocator,
    pub stats: Stats,
    pub(crate) propagate_memo: HashMap<PropagateKey, Vec<SigId>>,
    pub(crate) rec_bodies: HashMap<RecVar, SigId>,
    pub(crate) symbolize_memo: HashMap<(SigId, Vec<RecVar>), SigId>,
    epoch: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}

impl Session {
    /// Fresh session with the standard primitive catalogue.
    pub fn new(options: CompilerOptions) -> Self {
        Self::with_registry(options, Registry::with_builtins())
    }

    pub fn with_registry(options: CompilerOptions, registry: Registry) -> Self {
        Session {
            types: TypeTable::new(),
            sigs: SignalArena::new(),
            boxes: BoxArena::new(),
            envs: EnvTable::new(),
            paths: PathTable::new(),
            registry,
            options,
            ids: IdAllocator::new(),
            stats: Stats::default(),
            propagate_memo: HashMap::new(),
            rec_bodies: HashMap::new(),
            symbolize_memo: HashMap::new(),
            epoch: 0,
        }
    }

    /// Start a new inference epoch; older visit stamps become stale.
    pub fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Body of a symbolic recursive group.
    pub fn rec_body(&self, var: RecVar) -> Option<SigId> {
        self.rec_bodies.get(&var).copied()
    }

    /// Symbolic groups in creation order.
    pub fn rec_groups(&self) -> Vec<(RecVar, SigId)> {
        let mut groups: Vec<(RecVar, SigId)> =
            self.rec_bodies.iter().map(|(&v, &b)| (v, b)).collect();
        groups.sort_by_key(|(v, _)| *v);
        groups
    }
}
