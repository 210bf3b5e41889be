//! Ancestor-slot tracking
//!
//! Parent references (`%`) lower to numbered slots. A slot's `level` counts
//! how many path boundaries remain before it binds; once it reaches a step
//! at level 1 the step records it as its `ancestor` and the evaluator binds
//! the parent value under the slot's label. The tracker owns the label table
//! so a later re-label (two slots binding the same step) reaches the
//! original parent node through its slot index rather than a shared pointer.

use crate::codes::DiagnosticCode;
use crate::error::Diagnostic;
use crate::ir::{Node, NodeKind, Slot};

#[derive(Debug, Default)]
pub struct AncestryTracker {
    labels: Vec<String>,
}

impl AncestryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh slot at level 1.
    pub fn allocate(&mut self) -> Slot {
        let index = self.labels.len();
        let label = format!("!{index}");
        self.labels.push(label.clone());
        Slot {
            label,
            level: 1,
            index,
        }
    }

    /// Current label for a slot index (re-labels included).
    pub fn label(&self, index: usize) -> &str {
        &self.labels[index]
    }

    /// Point a slot's original parent node at another slot's label.
    pub fn relabel(&mut self, index: usize, label: &str) {
        self.labels[index] = label.to_string();
    }

    /// The final label table, indexed by slot index.
    pub fn into_labels(self) -> Vec<String> {
        self.labels
    }
}

/// Propagate unresolved slots from a processed child onto its container.
pub(crate) fn push_ancestry(result: &mut Node, value: &Node) {
    let mut slots = value.seeking_parent.clone();
    if let NodeKind::Parent(slot) = &value.kind {
        slots.push(slot.clone());
    }
    result.seeking_parent.extend(slots);
}

enum SeekClass {
    Bindable,
    Parent,
    Block,
    Path,
    Other,
}

fn classify(node: &Node) -> SeekClass {
    match &node.kind {
        NodeKind::Name(_) | NodeKind::Wildcard => SeekClass::Bindable,
        NodeKind::Parent(_) => SeekClass::Parent,
        NodeKind::Block(_) => SeekClass::Block,
        NodeKind::Path { .. } => SeekClass::Path,
        _ => SeekClass::Other,
    }
}

/// Walk one step (or container) looking for the binding point of `slot`.
///
/// Returns the slot with its level adjusted; level 0 means it bound here.
pub(crate) fn seek_parent(
    node: &mut Node,
    mut slot: Slot,
    tracker: &mut AncestryTracker,
) -> Result<Slot, Diagnostic> {
    match classify(node) {
        SeekClass::Bindable => {
            slot.level -= 1;
            if slot.level == 0 {
                match &node.ancestor {
                    None => {
                        slot.label = tracker.label(slot.index).to_string();
                    }
                    Some(existing) => {
                        // Two slots bound the same step: reuse the label so
                        // both parent nodes resolve to one binding.
                        tracker.relabel(slot.index, &existing.label);
                        slot.label = existing.label.clone();
                    }
                }
                node.ancestor = Some(slot.clone());
                node.tuple = true;
            }
        }
        SeekClass::Parent => {
            slot.level += 1;
        }
        SeekClass::Block => {
            let mut bound = false;
            if let NodeKind::Block(expressions) = &mut node.kind {
                if let Some(last) = expressions.last_mut() {
                    bound = true;
                    slot = seek_parent(last, slot, tracker)?;
                }
            }
            if bound {
                node.tuple = true;
            }
        }
        SeekClass::Path => {
            if let NodeKind::Path { steps } = &mut node.kind {
                let mut index = steps.len();
                while index > 0 {
                    index -= 1;
                    slot = seek_parent(&mut steps[index], slot, tracker)?;
                    if slot.level == 0 {
                        break;
                    }
                }
            }
            node.tuple = true;
        }
        SeekClass::Other => {
            return Err(Diagnostic::new(DiagnosticCode::S0217, node.span).with_token(node.tag()));
        }
    }
    Ok(slot)
}

/// Bind the last step's pending slots against the preceding steps; slots
/// that outlive the path bubble up onto the path's own `seeking_parent`.
pub(crate) fn resolve_ancestry(
    path: &mut Node,
    tracker: &mut AncestryTracker,
) -> Result<(), Diagnostic> {
    let last_index = {
        let NodeKind::Path { steps } = &path.kind else {
            return Ok(());
        };
        match steps.len() {
            0 => return Ok(()),
            n => n - 1,
        }
    };

    let mut slots = {
        let NodeKind::Path { steps } = &path.kind else {
            unreachable!()
        };
        let last = &steps[last_index];
        let mut slots = last.seeking_parent.clone();
        if let NodeKind::Parent(slot) = &last.kind {
            slots.push(slot.clone());
        }
        slots
    };

    for slot in slots.drain(..) {
        let mut slot = slot;
        let mut index = last_index as isize - 1;
        while slot.level > 0 {
            if index < 0 {
                path.seeking_parent.push(slot);
                break;
            }
            let NodeKind::Path { steps } = &mut path.kind else {
                unreachable!()
            };
            // contiguous focus-bound steps share one binding frame
            let mut at = index as usize;
            while at > 0 && steps[at].focus.is_some() && steps[at - 1].focus.is_some() {
                at -= 1;
            }
            index = at as isize - 1;
            slot = seek_parent(&mut steps[at], slot, tracker)?;
        }
    }
    Ok(())
}
