//! Category propagation (spec.md §4.7): folds each node's descendants'
//! categories into it, so a filter looking only at a top-level node (a
//! changed function, say) still sees every category a descendant picked up.

use crate::category::ChangeCategory;
use crate::node::{ClassDiff, DiffKind, DiffNode, FunctionTypeDiff};

/// Walks `node` bottom-up, OR-ing every descendant's category into it, and
/// returns the total. Categories assigned at construction time (spec.md
/// §4.7's per-kind flags, e.g. `ACCESS_CHANGE` on a data-member diff) are
/// preserved, not overwritten.
pub fn propagate_categories(node: &mut DiffNode) -> ChangeCategory {
    let child_categories = match &mut node.kind {
        DiffKind::Unchanged | DiffKind::Distinct { .. } => ChangeCategory::NONE,
        DiffKind::Pointer(inner)
        | DiffKind::Reference(inner)
        | DiffKind::Qualified(inner)
        | DiffKind::Typedef(inner)
        | DiffKind::Array(inner) => propagate_categories(inner),
        DiffKind::Enum(_) => ChangeCategory::NONE,
        DiffKind::ClassOrUnion(class) => propagate_class(class),
        DiffKind::FunctionType(f) => propagate_function_type(f),
        DiffKind::FunctionDecl(f) => propagate_categories(&mut f.function_type),
        DiffKind::Var(v) => propagate_categories(&mut v.ty),
    };
    node.category.insert(child_categories);
    node.category
}

fn propagate_function_type(f: &mut FunctionTypeDiff) -> ChangeCategory {
    let mut total = propagate_categories(&mut f.return_type);
    for p in &mut f.parameters {
        total.insert(propagate_categories(p));
    }
    total
}

fn propagate_class(class: &mut ClassDiff) -> ChangeCategory {
    let mut total = ChangeCategory::NONE;
    for m in &mut class.changed_members {
        total.insert(propagate_categories(&mut m.diff));
    }
    for f in &mut class.changed_functions {
        total.insert(propagate_categories(&mut f.diff));
    }
    for b in &mut class.base_diffs {
        total.insert(propagate_categories(b));
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DiffKind;

    #[test]
    fn category_set_on_a_leaf_propagates_to_its_pointer_wrapper() {
        let leaf = DiffNode {
            category: ChangeCategory::HARMLESS_ENUM_CHANGE,
            is_local: true,
            kind: DiffKind::Enum(crate::node::EnumDiff {
                deleted: Vec::new(),
                inserted: Vec::new(),
                changed: Vec::new(),
            }),
        };
        let mut pointer = DiffNode {
            category: ChangeCategory::NONE,
            is_local: false,
            kind: DiffKind::Pointer(Box::new(leaf)),
        };
        let total = propagate_categories(&mut pointer);
        assert!(total.contains(ChangeCategory::HARMLESS_ENUM_CHANGE));
        assert!(pointer.category.contains(ChangeCategory::HARMLESS_ENUM_CHANGE));
    }
}
