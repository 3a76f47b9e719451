// id.rs — Dense handles for hash-consed compiler terms
//
// Every arena (types, signals, boxes, slot environments, UI paths) hands out
// `u32` newtype handles. Because the arenas are hash-consed, handle equality
// is structural equality of the underlying term.

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(
    /// Canonical type in the session's `TypeTable`.
    Type
);
handle!(
    /// Canonical signal node in the session's `SignalArena`.
    SigId
);
handle!(
    /// Canonical box term in the session's `BoxArena`.
    BoxId
);
handle!(
    /// Canonical slot environment (persistent binding list).
    EnvId
);
handle!(
    /// Canonical UI group path.
    PathId
);
handle!(
    /// Identity of a registered extended primitive.
    PrimId
);
handle!(
    /// Binder of a symbolic recursive group.
    RecVar
);
handle!(
    /// Lambda-bound slot in a symbolic abstraction.
    Slot
);

/// Allocator for fresh identities. Produces monotonically increasing IDs in
/// allocation order, ensuring deterministic assignment.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_rec_var: u32,
    next_slot: u32,
    next_dummy_input: u32,
}

/// First channel number used for inputs synthesized for unbound slots.
pub const DUMMY_INPUT_BASE: u32 = 10_000;

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_rec_var(&mut self) -> RecVar {
        let id = RecVar(self.next_rec_var);
        self.next_rec_var += 1;
        id
    }

    pub fn alloc_slot(&mut self) -> Slot {
        let id = Slot(self.next_slot);
        self.next_slot += 1;
        id
    }

    /// Channel number of the next placeholder input.
    pub fn alloc_dummy_input(&mut self) -> u32 {
        self.next_dummy_input += 1;
        DUMMY_INPUT_BASE + self.next_dummy_input
    }
}
