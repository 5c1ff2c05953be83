//! Corpus-level diff statistics (spec.md §4.7 "Stats").

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CorpusDiffStats {
    pub num_added_functions: usize,
    pub num_removed_functions: usize,
    pub num_changed_functions: usize,
    pub num_added_variables: usize,
    pub num_removed_variables: usize,
    pub num_changed_variables: usize,
    /// Changed functions/variables whose top-level diff node is itself
    /// local, i.e. survive leaf-mode filtering (spec.md §4.7 "Filtering").
    pub num_leaf_changes: usize,

    /// spec.md §4.8: "Function symbols not referenced by debug info changes
    /// summary" — symbols with no matching exported decl, i.e. no DWARF info.
    pub num_added_unreferenced_function_symbols: usize,
    pub num_removed_unreferenced_function_symbols: usize,
    /// spec.md §4.8: "Variable symbols not referenced by debug info changes
    /// summary".
    pub num_added_unreferenced_variable_symbols: usize,
    pub num_removed_unreferenced_variable_symbols: usize,
}

impl CorpusDiffStats {
    /// spec.md §6.3 exit codes: nonzero when any ABI-relevant change was
    /// found (added/removed counts or any changed decl), matching
    /// `abidiff`'s "1 means the ABIs differ" convention.
    pub fn has_incompatible_changes(&self) -> bool {
        self.num_removed_functions > 0
            || self.num_removed_variables > 0
            || self.num_changed_functions > 0
            || self.num_changed_variables > 0
            || self.num_removed_unreferenced_function_symbols > 0
            || self.num_removed_unreferenced_variable_symbols > 0
    }

    pub fn has_any_changes(&self) -> bool {
        self.has_incompatible_changes()
            || self.num_added_functions > 0
            || self.num_added_variables > 0
            || self.num_added_unreferenced_function_symbols > 0
            || self.num_added_unreferenced_variable_symbols > 0
    }
}
