// pass.rs — The three semantic passes and what each one needs
//
// Declares the compiler's semantic passes (parsing and lowering of the
// notation happen before the runner), their dependency edges and the
// artifacts they produce. The pipeline runner uses this to compute the
// minimal pass subset for each `--emit` target.

use std::collections::HashSet;

/// Identifies each compiler pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    /// Box arity, input list, propagation, output list.
    Propagate,
    /// de Bruijn groups to symbolic groups.
    Symbolize,
    /// Recursive fixpoint and typing of every reachable node.
    Annotate,
}

/// Artifacts produced by the passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Inputs,  // input count and IN[i] signals
    Outputs, // de Bruijn output signals
    Groups,  // symbolic recursion bodies
    Types,   // per-node certified types
}

/// What a pass reads, writes and guarantees.
pub struct PassDescriptor {
    /// Name used in timing and log lines.
    pub name: &'static str,
    /// Passes whose outputs this pass consumes.
    pub inputs: &'static [PassId],
    pub outputs: &'static [ArtifactId],
    /// What invalidates this pass's output.
    pub invalidation_key: &'static str,
    /// Postconditions, for documentation.
    pub invariants: &'static str,
}

pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Propagate => PassDescriptor {
            name: "propagate",
            inputs: &[],
            outputs: &[ArtifactId::Inputs, ArtifactId::Outputs],
            invalidation_key: "box + registry + options",
            invariants: "one closed signal per box output",
        },
        PassId::Symbolize => PassDescriptor {
            name: "symbolize",
            inputs: &[PassId::Propagate],
            outputs: &[ArtifactId::Outputs, ArtifactId::Groups],
            invalidation_key: "outputs",
            invariants: "no de Bruijn node reachable from the outputs",
        },
        PassId::Annotate => PassDescriptor {
            name: "annotate",
            inputs: &[PassId::Symbolize],
            outputs: &[ArtifactId::Types],
            invalidation_key: "outputs + groups + widening/narrowing limits",
            invariants: "every reachable node carries a certified type",
        },
    }
}

pub const ALL_PASSES: [PassId; 3] = [PassId::Propagate, PassId::Symbolize, PassId::Annotate];

/// Minimal ordered set of passes needed to produce `terminal`, in
/// execution order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut scheduled = HashSet::new();
    let mut passes = Vec::new();
    schedule(terminal, &mut scheduled, &mut passes);
    passes
}

fn schedule(pass: PassId, scheduled: &mut HashSet<PassId>, passes: &mut Vec<PassId>) {
    if scheduled.contains(&pass) {
        return;
    }
    descriptor(pass)
        .inputs
        .iter()
        .for_each(|&before| schedule(before, scheduled, passes));
    scheduled.insert(pass);
    passes.push(pass);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_requires_everything() {
        assert_eq!(
            required_passes(PassId::Annotate),
            vec![PassId::Propagate, PassId::Symbolize, PassId::Annotate]
        );
    }

    #[test]
    fn symbolize_skips_annotation() {
        let passes = required_passes(PassId::Symbolize);
        assert_eq!(passes, vec![PassId::Propagate, PassId::Symbolize]);
        assert!(!passes.contains(&PassId::Annotate));
    }

    #[test]
    fn propagate_is_minimal() {
        assert_eq!(required_passes(PassId::Propagate), vec![PassId::Propagate]);
    }

    #[test]
    fn all_descriptors_have_outputs_and_names() {
        let mut names = HashSet::new();
        for pass in ALL_PASSES {
            let d = descriptor(pass);
            assert!(!d.outputs.is_empty(), "pass {pass:?} has no outputs");
            assert!(names.insert(d.name), "duplicate pass name {}", d.name);
        }
    }

    #[test]
    fn inputs_precede_their_consumers() {
        for pass in ALL_PASSES {
            let order = required_passes(pass);
            for (i, p) in order.iter().enumerate() {
                for dep in descriptor(*p).inputs {
                    let j = order.iter().position(|q| q == dep).unwrap();
                    assert!(j < i, "{dep:?} must run before {p:?}");
                }
            }
        }
    }
}
