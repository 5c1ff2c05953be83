//! Data-member insertion-range boundaries (spec.md §4.6, SPEC_FULL §C.2):
//! either a literal bit offset (`-1` meaning "end") or a parsed function-call
//! expression `offset_of(member)` / `offset_after(member)`, evaluated
//! against the first class's laid-out data members.

use crate::error::{SuppressionError, SuppressionResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Boundary {
    BitOffset(i64),
    OffsetOf(String),
    OffsetAfter(String),
}

const END: i64 = -1;

impl Boundary {
    pub fn parse(raw: &str, line: u32) -> SuppressionResult<Boundary> {
        let s = raw.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Ok(Boundary::BitOffset(n));
        }
        if let Some(inner) = s.strip_prefix("offset_of(").and_then(|r| r.strip_suffix(')')) {
            return Ok(Boundary::OffsetOf(inner.trim().to_string()));
        }
        if let Some(inner) = s.strip_prefix("offset_after(").and_then(|r| r.strip_suffix(')')) {
            return Ok(Boundary::OffsetAfter(inner.trim().to_string()));
        }
        Err(SuppressionError::MalformedRange {
            line,
            message: format!("`{raw}` is neither an integer nor offset_of(...)/offset_after(...)"),
        })
    }

    /// Resolves against `class`'s laid-out (non-static) data members; `None`
    /// when the boundary names a member this class doesn't have.
    pub fn resolve(
        &self,
        class: &abg_ir::ClassData,
        decls: &abg_ir::DeclArena,
        types: &abg_ir::TypeArena,
    ) -> Option<i64> {
        match self {
            Boundary::BitOffset(n) if *n == END => Some(i64::MAX),
            Boundary::BitOffset(n) => Some(*n),
            Boundary::OffsetOf(member) => member_offset(class, decls, member),
            Boundary::OffsetAfter(member) => {
                let member_data = class
                    .data_members
                    .iter()
                    .find(|m| m.is_laid_out && decls[m.decl].name.as_str() == member)?;
                let offset = member_data.layout_offset_bits? as i64;
                let ty = decls[member_data.decl].as_var()?;
                Some(offset + types[ty].size_bits as i64)
            }
        }
    }
}

fn member_offset(class: &abg_ir::ClassData, decls: &abg_ir::DeclArena, member: &str) -> Option<i64> {
    class
        .data_members
        .iter()
        .find(|m| m.is_laid_out && decls[m.decl].name.as_str() == member)
        .and_then(|m| m.layout_offset_bits)
        .map(|b| b as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_and_function_call_forms() {
        assert_eq!(Boundary::parse("32", 1).unwrap(), Boundary::BitOffset(32));
        assert_eq!(Boundary::parse("-1", 1).unwrap(), Boundary::BitOffset(-1));
        assert_eq!(Boundary::parse("offset_of(foo)", 1).unwrap(), Boundary::OffsetOf("foo".to_string()));
        assert_eq!(
            Boundary::parse("offset_after( bar )", 1).unwrap(),
            Boundary::OffsetAfter("bar".to_string())
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(Boundary::parse("not_a_boundary", 1).is_err());
    }
}
