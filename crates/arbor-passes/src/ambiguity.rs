use arbor_core::node::{NodeKind, NodeRef};

/// Number of nodes in `tree` that disambiguation has not resolved: raw
/// names, type nodes without a type and calls without an owner class.
pub fn ambiguity_count(tree: &NodeRef) -> usize {
    let own = match tree.kind() {
        NodeKind::Name => 1,
        NodeKind::TypeNode if tree.ty().is_none() => 1,
        NodeKind::Call if tree.owner().is_none() => 1,
        _ => 0,
    };
    own + tree.children().iter().map(ambiguity_count).sum::<usize>()
}
