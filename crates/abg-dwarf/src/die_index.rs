//! DIE index (spec.md §4.3): parent map and import-point table built by one
//! walk over every compilation unit of both debug-info partitions, used
//! afterward for logical-parent resolution.

use std::collections::HashMap;

use gimli::{AttributeValue, Reader};

#[derive(thiserror::Error, Debug)]
pub enum DieIndexError {
    #[error("gimli read error: {0}")]
    Gimli(#[from] gimli::Error),
}

pub type Result<T> = std::result::Result<T, DieIndexError>;

/// A DIE identified by its offset relative to the start of its own
/// `.debug_info` section, tagged with which debug-info partition that
/// section belongs to (spec.md §3: "a DIE offset is only unique *within*
/// its partition").
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DieKey {
    pub offset: u64,
    pub is_alt: bool,
}

/// spec.md §4.3: `{offset_of_import, imported_die_offset, imported_cu_offset,
/// imported_die_first_child_offset, from_alt_di}`.
#[derive(Copy, Clone, Debug)]
pub struct ImportPoint {
    pub offset_of_import: u64,
    pub imported_die_offset: u64,
    pub imported_cu_offset: u64,
    pub imported_die_first_child_offset: Option<u64>,
    pub from_alt_di: bool,
}

#[derive(Default)]
pub struct DieIndex {
    parents: HashMap<DieKey, DieKey>,
    children: HashMap<DieKey, Vec<DieKey>>,
    tags: HashMap<DieKey, gimli::DwTag>,
    cu_of: HashMap<DieKey, DieKey>,
    /// Import points, grouped by the CU that contains the
    /// `DW_TAG_imported_unit` DIE, sorted by `offset_of_import`.
    import_points: HashMap<DieKey, Vec<ImportPoint>>,
}

impl DieIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent_of(&self, die: DieKey) -> Option<DieKey> {
        self.parents.get(&die).copied()
    }

    pub fn tag_of(&self, die: DieKey) -> Option<gimli::DwTag> {
        self.tags.get(&die).copied()
    }

    pub fn cu_of(&self, die: DieKey) -> Option<DieKey> {
        self.cu_of.get(&die).copied()
    }

    pub fn children_of(&self, parent: DieKey) -> &[DieKey] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Walks one compilation unit's tree, recording each child's parent, and
    /// every `DW_TAG_imported_unit`'s import point.
    #[tracing::instrument(skip(self, unit), fields(is_alt))]
    pub fn index_unit<R: Reader>(&mut self, unit: &gimli::Unit<R>, is_alt: bool) -> Result<()> {
        let header_offset = unit.header.offset().as_debug_info_offset().map(|o| o.0.into_u64()).unwrap_or(0);
        let cu_root = DieKey {
            offset: header_offset,
            is_alt,
        };

        let mut cursor = unit.entries();
        // stack of ancestor DieKeys, index 0 = root
        let mut stack: Vec<DieKey> = Vec::new();
        while let Some((delta_depth, entry)) = cursor.next_dfs()? {
            let key = DieKey {
                offset: global_offset(unit, entry.offset(), is_alt),
                is_alt,
            };
            if delta_depth <= 0 {
                for _ in 0..(1 - delta_depth) {
                    stack.pop();
                }
            }
            if let Some(&parent) = stack.last() {
                self.parents.insert(key, parent);
                self.children.entry(parent).or_default().push(key);
            }
            self.tags.insert(key, entry.tag());
            self.cu_of.insert(key, cu_root);
            stack.push(key);

            if entry.tag() == gimli::constants::DW_TAG_imported_unit {
                if let Some(import) = self.read_import_point(unit, entry, key.offset, is_alt)? {
                    self.import_points.entry(cu_root).or_default().push(import);
                }
            }
        }

        if let Some(points) = self.import_points.get_mut(&cu_root) {
            points.sort_by_key(|p| p.offset_of_import);
        }
        Ok(())
    }

    fn read_import_point<R: Reader>(
        &self,
        unit: &gimli::Unit<R>,
        entry: &gimli::DebuggingInformationEntry<R>,
        offset_of_import: u64,
        is_alt: bool,
    ) -> Result<Option<ImportPoint>> {
        let Some(attr) = entry.attr(gimli::constants::DW_AT_import)? else {
            return Ok(None);
        };
        let (imported_offset, imported_is_alt) = match attr.value() {
            AttributeValue::UnitRef(off) => (global_offset(unit, off, is_alt), is_alt),
            AttributeValue::DebugInfoRef(off) => (off.0.into_u64(), is_alt),
            // A DWARF5 "sup" reference (and the legacy GNU `ref_alt` form,
            // which gimli surfaces the same way) always points at the
            // alternate file.
            AttributeValue::DebugInfoRefSup(off) => (off.0.into_u64(), true),
            _ => return Ok(None),
        };
        let imported_die_offset = imported_offset;
        let imported_cu_offset = self
            .cu_of
            .get(&DieKey {
                offset: imported_offset,
                is_alt: imported_is_alt,
            })
            .map(|k| k.offset)
            .unwrap_or(imported_offset);
        Ok(Some(ImportPoint {
            offset_of_import,
            imported_die_offset,
            imported_cu_offset,
            imported_die_first_child_offset: None,
            from_alt_di: imported_is_alt,
        }))
    }

    /// Logical parent resolution (spec.md §4.3).
    ///
    /// `die` sits at `where_` for the purpose of deciding which import point
    /// (if any) logically places it. Returns `None` only when `die` is
    /// already the outermost DIE. When the physical parent is a
    /// `DW_TAG_partial_unit` but no import point covers `where_`, the
    /// logical parent falls back to the current TU's top-level DIE (the CU
    /// root), per spec.md §4.3 step 2.
    pub fn logical_parent(&self, die: DieKey, where_: u64) -> Option<DieKey> {
        let parent = self.parent_of(die)?;
        if self.tag_of(parent) != Some(gimli::constants::DW_TAG_partial_unit) {
            return Some(parent);
        }
        let cu = self.cu_of(die)?;
        let candidate = self
            .import_points
            .get(&cu)
            .and_then(|points| points.iter().rev().find(|p| p.offset_of_import <= where_));
        let Some(candidate) = candidate else {
            return Some(cu);
        };
        if candidate.from_alt_di != die.is_alt {
            // the import point lives in the opposite partition from `die`;
            // recurse using it as the new "where".
            return self.logical_parent(
                DieKey {
                    offset: candidate.imported_die_offset,
                    is_alt: candidate.from_alt_di,
                },
                candidate.offset_of_import,
            );
        }
        Some(DieKey {
            offset: candidate.imported_die_offset,
            is_alt: candidate.from_alt_di,
        })
    }
}

fn global_offset<R: Reader>(unit: &gimli::Unit<R>, off: gimli::UnitOffset<R::Offset>, _is_alt: bool) -> u64 {
    off.to_debug_info_offset(&unit.header)
        .map(|o| o.0.into_u64())
        .unwrap_or_else(|| off.0.into_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_points_sort_by_offset_of_import() {
        let mut idx = DieIndex::new();
        let cu = DieKey { offset: 0, is_alt: false };
        idx.import_points.insert(
            cu,
            vec![
                ImportPoint {
                    offset_of_import: 200,
                    imported_die_offset: 10,
                    imported_cu_offset: 0,
                    imported_die_first_child_offset: None,
                    from_alt_di: true,
                },
                ImportPoint {
                    offset_of_import: 50,
                    imported_die_offset: 20,
                    imported_cu_offset: 0,
                    imported_die_first_child_offset: None,
                    from_alt_di: true,
                },
            ],
        );
        idx.import_points.get_mut(&cu).unwrap().sort_by_key(|p| p.offset_of_import);
        let points = &idx.import_points[&cu];
        assert_eq!(points[0].offset_of_import, 50);
        assert_eq!(points[1].offset_of_import, 200);
    }

    #[test]
    fn logical_parent_falls_back_to_physical_parent_when_not_partial_unit() {
        let mut idx = DieIndex::new();
        let root = DieKey { offset: 0, is_alt: false };
        let child = DieKey { offset: 8, is_alt: false };
        idx.parents.insert(child, root);
        idx.tags.insert(root, gimli::constants::DW_TAG_compile_unit);
        assert_eq!(idx.logical_parent(child, 8), Some(root));
    }
}
