//! Reporting filter (spec.md §4.7 "Filtering"): decides which changed decls
//! survive into the report, given a category mask and leaf-mode setting.

use crate::category::ChangeCategory;
use crate::corpus::ChangedDecl;
use crate::node::DiffNode;

#[derive(Copy, Clone, Debug)]
pub struct DiffContext {
    /// Categories to hide from the report (spec.md §6.3 `--harmless`
    /// inverse: by default harmless categories plus `SUPPRESSED` are masked).
    pub ignore_categories: ChangeCategory,
    /// spec.md §4.7: leaf mode reports only nodes carrying a *local* change,
    /// skipping intermediate wrapper nodes whose only change is a changed
    /// descendant.
    pub leaf_mode: bool,
}

impl Default for DiffContext {
    fn default() -> Self {
        DiffContext {
            ignore_categories: ChangeCategory::harmless() | ChangeCategory::SUPPRESSED | ChangeCategory::REDUNDANT,
            leaf_mode: false,
        }
    }
}

impl DiffContext {
    /// True if `node` should appear in the report under this context.
    pub fn is_reportable(&self, node: &DiffNode) -> bool {
        if !node.has_change() {
            return false;
        }
        if self.leaf_mode && !node.is_local {
            return false;
        }
        !self.fully_masked(node)
    }

    /// A node is masked only when every category it carries is one we
    /// ignore; a node mixing e.g. a harmless category with an uncategorized
    /// real change still needs to surface.
    fn fully_masked(&self, node: &DiffNode) -> bool {
        !node.category.is_empty() && node.category.bits() & !self.ignore_categories.bits() == 0
    }

    pub fn filter_changed<'a>(&self, entries: &'a [ChangedDecl]) -> Vec<&'a ChangedDecl> {
        entries.iter().filter(|e| self.is_reportable(&e.diff)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DiffKind;

    fn node(category: ChangeCategory, is_local: bool) -> DiffNode {
        DiffNode {
            category,
            is_local,
            kind: DiffKind::Enum(crate::node::EnumDiff {
                deleted: Vec::new(),
                inserted: Vec::new(),
                changed: Vec::new(),
            }),
        }
    }

    #[test]
    fn fully_harmless_node_is_not_reportable_by_default() {
        let ctx = DiffContext::default();
        let n = node(ChangeCategory::HARMLESS_ENUM_CHANGE, true);
        assert!(!ctx.is_reportable(&n));
    }

    #[test]
    fn uncategorized_local_change_is_reportable() {
        let ctx = DiffContext::default();
        let n = node(ChangeCategory::NONE, true);
        assert!(ctx.is_reportable(&n));
    }

    #[test]
    fn suppressed_node_is_never_reportable() {
        let ctx = DiffContext::default();
        let n = node(ChangeCategory::SUPPRESSED, true);
        assert!(!ctx.is_reportable(&n));
    }
}
