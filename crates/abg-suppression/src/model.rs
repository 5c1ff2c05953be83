//! Typed suppression rules (spec.md §4.6, §6.2) built from the raw
//! section/key/value records the parser produces.

use std::collections::HashMap;

use regex::Regex;

use crate::boundary::Boundary;
use crate::error::{SuppressionError, SuppressionResult};
use crate::parser::{RawSection, RawValue};
use crate::pattern::Pattern;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Struct,
    Union,
    Enum,
    Array,
    Typedef,
    Builtin,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReachKind {
    Direct,
    Pointer,
    Reference,
    ReferenceOrPointer,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    FunctionSubtypeChange,
    AddedFunction,
    DeletedFunction,
    VariableSubtypeChange,
    AddedVariable,
    DeletedVariable,
    All,
}

fn parse_enum<T: Copy>(pairs: &[(&str, T)], value: &str, line: u32, key: &str) -> SuppressionResult<T> {
    pairs
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, v)| *v)
        .ok_or_else(|| SuppressionError::Parse {
            line,
            message: format!("`{value}` is not a recognized value for `{key}`"),
        })
}

impl TypeKind {
    fn parse(value: &str, line: u32) -> SuppressionResult<Self> {
        parse_enum(
            &[
                ("class", TypeKind::Class),
                ("struct", TypeKind::Struct),
                ("union", TypeKind::Union),
                ("enum", TypeKind::Enum),
                ("array", TypeKind::Array),
                ("typedef", TypeKind::Typedef),
                ("builtin", TypeKind::Builtin),
            ],
            value,
            line,
            "type_kind",
        )
    }
}

impl ReachKind {
    fn parse(value: &str, line: u32) -> SuppressionResult<Self> {
        parse_enum(
            &[
                ("direct", ReachKind::Direct),
                ("pointer", ReachKind::Pointer),
                ("reference", ReachKind::Reference),
                ("reference-or-pointer", ReachKind::ReferenceOrPointer),
            ],
            value,
            line,
            "accessed_through",
        )
    }
}

impl ChangeKind {
    fn parse(value: &str, line: u32) -> SuppressionResult<Self> {
        parse_enum(
            &[
                ("function-subtype-change", ChangeKind::FunctionSubtypeChange),
                ("added-function", ChangeKind::AddedFunction),
                ("deleted-function", ChangeKind::DeletedFunction),
                ("variable-subtype-change", ChangeKind::VariableSubtypeChange),
                ("added-variable", ChangeKind::AddedVariable),
                ("deleted-variable", ChangeKind::DeletedVariable),
                ("all", ChangeKind::All),
            ],
            value,
            line,
            "change_kind",
        )
    }
}

/// `label`, `file_name_regexp`/`_not_regexp`, `soname_regexp`/`_not_regexp`:
/// carried by every suppression subtype (spec.md §4.6).
#[derive(Clone, Debug, Default)]
pub struct BinaryFilter {
    pub file_name_regexp: Option<Regex>,
    pub file_name_not_regexp: Option<Regex>,
    pub soname_regexp: Option<Regex>,
    pub soname_not_regexp: Option<Regex>,
}

impl BinaryFilter {
    pub fn matches(&self, file_name: &str, soname: Option<&str>) -> bool {
        if let Some(re) = &self.file_name_regexp {
            if !re.is_match(file_name) {
                return false;
            }
        }
        if let Some(re) = &self.file_name_not_regexp {
            if re.is_match(file_name) {
                return false;
            }
        }
        if let Some(re) = &self.soname_regexp {
            if !soname.map(|s| re.is_match(s)).unwrap_or(false) {
                return false;
            }
        }
        if let Some(re) = &self.soname_not_regexp {
            if soname.map(|s| re.is_match(s)).unwrap_or(false) {
                return false;
            }
        }
        true
    }
}

/// A raw `[section]`'s entries, consumed key by key; unconsumed entries at
/// the end are reported so a caller can spot typos in the suppression file.
struct Entries<'a> {
    map: HashMap<&'a str, &'a RawValue>,
    repeatable: HashMap<&'a str, Vec<&'a RawValue>>,
}

impl<'a> Entries<'a> {
    fn new(section: &'a RawSection, repeatable_keys: &[&str]) -> Self {
        let mut map = HashMap::new();
        let mut repeatable: HashMap<&str, Vec<&RawValue>> = HashMap::new();
        for (k, v) in &section.entries {
            if repeatable_keys.contains(&k.as_str()) {
                repeatable.entry(k.as_str()).or_default().push(v);
            } else {
                map.insert(k.as_str(), v);
            }
        }
        Entries { map, repeatable }
    }

    fn scalar(&self, key: &str) -> Option<&str> {
        match self.map.get(key) {
            Some(RawValue::Scalar(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn list(&self, key: &str) -> Vec<String> {
        match self.map.get(key) {
            Some(RawValue::List(items)) => items.clone(),
            Some(RawValue::Scalar(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    fn nested_list(&self, key: &str) -> Vec<Vec<String>> {
        match self.map.get(key) {
            Some(RawValue::NestedList(pairs)) => pairs.clone(),
            Some(RawValue::List(items)) => vec![items.clone()],
            _ => Vec::new(),
        }
    }

    fn regex(&self, key: &str, _line: u32) -> SuppressionResult<Option<Regex>> {
        match self.scalar(key) {
            Some(s) => Ok(Some(Regex::new(s)?)),
            None => Ok(None),
        }
    }

    fn repeated(&self, key: &str) -> impl Iterator<Item = &RawValue> {
        self.repeatable.get(key).into_iter().flatten().copied()
    }
}

fn binary_filter(entries: &Entries, line: u32) -> SuppressionResult<BinaryFilter> {
    Ok(BinaryFilter {
        file_name_regexp: entries.regex("file_name_regexp", line)?,
        file_name_not_regexp: entries.regex("file_name_not_regexp", line)?,
        soname_regexp: entries.regex("soname_regexp", line)?,
        soname_not_regexp: entries.regex("soname_not_regexp", line)?,
    })
}

#[derive(Clone, Debug)]
pub struct TypeSuppression {
    pub label: Option<String>,
    pub binary: BinaryFilter,
    pub name: Option<String>,
    pub name_regexp: Option<Regex>,
    pub name_not_regexp: Option<Regex>,
    pub type_kind: Option<TypeKind>,
    pub reach_kind: Option<ReachKind>,
    pub source_location_not_in: Vec<String>,
    pub source_location_not_regexp: Option<Regex>,
    pub data_member_named_regexp: Option<Regex>,
    /// Boundary pairs from `has_data_member_inserted_at` (a single point,
    /// widened to `(b, b)`), `..._between`, and `..._members_inserted_between`.
    pub insertion_ranges: Vec<(Boundary, Boundary)>,
}

impl TypeSuppression {
    fn from_section(section: &RawSection) -> SuppressionResult<Self> {
        let entries = Entries::new(section, &[]);
        let line = section.line;

        let mut insertion_ranges = Vec::new();
        if let Some(at) = entries.scalar("has_data_member_inserted_at") {
            let b = Boundary::parse(at, line)?;
            insertion_ranges.push((b.clone(), b));
        }
        for key in ["has_data_member_inserted_between", "has_data_members_inserted_between"] {
            for pair in entries.nested_list(key) {
                if pair.len() != 2 {
                    return Err(SuppressionError::MalformedRange {
                        line,
                        message: format!("`{key}` range must have exactly two boundaries"),
                    });
                }
                insertion_ranges.push((Boundary::parse(&pair[0], line)?, Boundary::parse(&pair[1], line)?));
            }
        }

        Ok(TypeSuppression {
            label: entries.scalar("label").map(str::to_string),
            binary: binary_filter(&entries, line)?,
            name: entries.scalar("name").map(str::to_string),
            name_regexp: entries.regex("name_regexp", line)?,
            name_not_regexp: entries.regex("name_not_regexp", line)?,
            type_kind: entries.scalar("type_kind").map(|v| TypeKind::parse(v, line)).transpose()?,
            reach_kind: entries.scalar("accessed_through").map(|v| ReachKind::parse(v, line)).transpose()?,
            source_location_not_in: entries.list("source_location_not_in"),
            source_location_not_regexp: entries.regex("source_location_not_regexp", line)?,
            data_member_named_regexp: entries.regex("has_data_member_named_regexp", line)?,
            insertion_ranges,
        })
    }

    pub fn matches_name(&self, name: &str) -> bool {
        if let Some(exact) = &self.name {
            if exact != name {
                return false;
            }
        }
        if let Some(re) = &self.name_regexp {
            if !re.is_match(name) {
                return false;
            }
        }
        if let Some(re) = &self.name_not_regexp {
            if re.is_match(name) {
                return false;
            }
        }
        true
    }

    /// spec.md §4.6 / SPEC_FULL §C.2: true if `at_bit_offset` falls within
    /// any declared insertion range, resolved against `class`'s laid-out
    /// members.
    pub fn suppresses_insertion_at(
        &self,
        at_bit_offset: u64,
        class: &abg_ir::ClassData,
        decls: &abg_ir::DeclArena,
        types: &abg_ir::TypeArena,
    ) -> bool {
        let at = at_bit_offset as i64;
        self.insertion_ranges.iter().any(|(lo, hi)| {
            let (Some(lo), Some(hi)) = (lo.resolve(class, decls, types), hi.resolve(class, decls, types)) else {
                return false;
            };
            lo <= at && at <= hi
        })
    }
}

#[derive(Clone, Debug)]
pub struct ParameterSpec {
    pub index: usize,
    pub type_name: Pattern,
}

fn parse_parameter_spec(raw: &str, line: u32) -> SuppressionResult<ParameterSpec> {
    let raw = raw.trim();
    let (index_str, rest) = raw.split_once(' ').ok_or_else(|| SuppressionError::Parse {
        line,
        message: format!("`parameter` value `{raw}` must be `<index> <type-name-or-/regex/>`"),
    })?;
    let index: usize = index_str.parse().map_err(|_| SuppressionError::Parse {
        line,
        message: format!("`{index_str}` is not a valid parameter index"),
    })?;
    let rest = rest.trim();
    let type_name = if let Some(inner) = rest.strip_prefix('/').and_then(|r| r.strip_suffix('/')) {
        Pattern::regex(inner)?
    } else {
        Pattern::literal(rest)
    };
    Ok(ParameterSpec { index, type_name })
}

#[derive(Clone, Debug)]
pub struct FunctionSuppression {
    pub label: Option<String>,
    pub binary: BinaryFilter,
    pub change_kind: Option<ChangeKind>,
    pub name: Option<String>,
    pub name_regexp: Option<Regex>,
    pub return_type_name: Option<String>,
    pub return_type_regexp: Option<Regex>,
    pub symbol_name: Option<String>,
    pub symbol_name_regexp: Option<Regex>,
    pub symbol_version: Option<String>,
    pub symbol_version_regexp: Option<Regex>,
    /// SPEC_FULL §C.3: absent in the file defaults to permissive (`false`):
    /// the rule matches on the primary symbol name without requiring every
    /// alias to match too. `true` is the strict original_source meaning.
    pub allow_other_aliases: bool,
    pub parameters: Vec<ParameterSpec>,
}

impl FunctionSuppression {
    fn from_section(section: &RawSection) -> SuppressionResult<Self> {
        let entries = Entries::new(section, &["parameter"]);
        let line = section.line;
        let mut parameters = Vec::new();
        for value in entries.repeated("parameter") {
            if let RawValue::Scalar(s) = value {
                parameters.push(parse_parameter_spec(s, line)?);
            }
        }
        Ok(FunctionSuppression {
            label: entries.scalar("label").map(str::to_string),
            binary: binary_filter(&entries, line)?,
            change_kind: entries.scalar("change_kind").map(|v| ChangeKind::parse(v, line)).transpose()?,
            name: entries.scalar("name").map(str::to_string),
            name_regexp: entries.regex("name_regexp", line)?,
            return_type_name: entries.scalar("return_type_name").map(str::to_string),
            return_type_regexp: entries.regex("return_type_regexp", line)?,
            symbol_name: entries.scalar("symbol_name").map(str::to_string),
            symbol_name_regexp: entries.regex("symbol_name_regexp", line)?,
            symbol_version: entries.scalar("symbol_version").map(str::to_string),
            symbol_version_regexp: entries.regex("symbol_version_regexp", line)?,
            allow_other_aliases: entries.scalar("allow_other_aliases").map(|v| v == "yes" || v == "true").unwrap_or(false),
            parameters,
        })
    }

    pub fn matches_symbol_name(&self, primary: &str, aliases: &[String]) -> bool {
        let name_matches = |n: &str| {
            self.symbol_name.as_deref().map(|e| e == n).unwrap_or(true)
                && self.symbol_name_regexp.as_ref().map(|re| re.is_match(n)).unwrap_or(true)
        };
        if self.symbol_name.is_none() && self.symbol_name_regexp.is_none() {
            return true;
        }
        if self.allow_other_aliases {
            name_matches(primary) && aliases.iter().all(|a| name_matches(a))
        } else {
            name_matches(primary) || aliases.iter().any(|a| name_matches(a))
        }
    }
}

#[derive(Clone, Debug)]
pub struct VariableSuppression {
    pub label: Option<String>,
    pub binary: BinaryFilter,
    pub change_kind: Option<ChangeKind>,
    pub name: Option<String>,
    pub name_regexp: Option<Regex>,
    pub symbol_name: Option<String>,
    pub symbol_name_regexp: Option<Regex>,
    pub symbol_version: Option<String>,
    pub symbol_version_regexp: Option<Regex>,
    pub type_name: Option<String>,
    pub type_name_regexp: Option<Regex>,
}

impl VariableSuppression {
    fn from_section(section: &RawSection) -> SuppressionResult<Self> {
        let entries = Entries::new(section, &[]);
        let line = section.line;
        Ok(VariableSuppression {
            label: entries.scalar("label").map(str::to_string),
            binary: binary_filter(&entries, line)?,
            change_kind: entries.scalar("change_kind").map(|v| ChangeKind::parse(v, line)).transpose()?,
            name: entries.scalar("name").map(str::to_string),
            name_regexp: entries.regex("name_regexp", line)?,
            symbol_name: entries.scalar("symbol_name").map(str::to_string),
            symbol_name_regexp: entries.regex("symbol_name_regexp", line)?,
            symbol_version: entries.scalar("symbol_version").map(str::to_string),
            symbol_version_regexp: entries.regex("symbol_version_regexp", line)?,
            type_name: entries.scalar("type_name").map(str::to_string),
            type_name_regexp: entries.regex("type_name_regexp", line)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct FileSuppression {
    pub label: Option<String>,
    pub file_name_regexp: Option<Regex>,
    pub file_name_not_regexp: Option<Regex>,
}

impl FileSuppression {
    fn from_section(section: &RawSection) -> SuppressionResult<Self> {
        let entries = Entries::new(section, &[]);
        let line = section.line;
        Ok(FileSuppression {
            label: entries.scalar("label").map(str::to_string),
            file_name_regexp: entries.regex("file_name_regexp", line)?,
            file_name_not_regexp: entries.regex("file_name_not_regexp", line)?,
        })
    }

    pub fn matches_file(&self, file_name: &str) -> bool {
        if let Some(re) = &self.file_name_regexp {
            if !re.is_match(file_name) {
                return false;
            }
        }
        if let Some(re) = &self.file_name_not_regexp {
            if re.is_match(file_name) {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug)]
pub enum Suppression {
    Type(TypeSuppression),
    Function(FunctionSuppression),
    Variable(VariableSuppression),
    File(FileSuppression),
}

#[derive(Default, Clone, Debug)]
pub struct SuppressionSet {
    pub rules: Vec<Suppression>,
}

impl SuppressionSet {
    /// Parses `src`, dropping malformed individual rules (spec.md §7) while
    /// returning their errors for the caller to log.
    pub fn parse_lenient(src: &str) -> (SuppressionSet, Vec<SuppressionError>) {
        let mut set = SuppressionSet::default();
        let mut errors = Vec::new();
        let sections = match crate::parser::parse(src) {
            Ok(s) => s,
            Err(e) => {
                errors.push(e);
                return (set, errors);
            }
        };
        for section in &sections {
            let built = match section.name.as_str() {
                "suppress_type" => TypeSuppression::from_section(section).map(Suppression::Type),
                "suppress_function" => FunctionSuppression::from_section(section).map(Suppression::Function),
                "suppress_variable" => VariableSuppression::from_section(section).map(Suppression::Variable),
                "suppress_file" => FileSuppression::from_section(section).map(Suppression::File),
                other => Err(SuppressionError::UnknownSection {
                    line: section.line,
                    section: other.to_string(),
                }),
            };
            match built {
                Ok(rule) => set.rules.push(rule),
                Err(e) => errors.push(e),
            }
        }
        (set, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_suppression_with_insertion_range() {
        let src = "[suppress_type]\nname_regexp = ^Foo\nhas_data_member_inserted_between = {{32, -1}}\n";
        let (set, errors) = SuppressionSet::parse_lenient(src);
        assert!(errors.is_empty());
        assert_eq!(set.rules.len(), 1);
        match &set.rules[0] {
            Suppression::Type(t) => {
                assert!(t.matches_name("FooBar"));
                assert!(!t.matches_name("Bar"));
                assert_eq!(t.insertion_ranges.len(), 1);
            }
            _ => panic!("expected type suppression"),
        }
    }

    #[test]
    fn unknown_section_is_dropped_not_fatal() {
        let src = "[suppress_bogus]\nname = foo\n[suppress_file]\nfile_name_regexp = \\.so$\n";
        let (set, errors) = SuppressionSet::parse_lenient(src);
        assert_eq!(errors.len(), 1);
        assert_eq!(set.rules.len(), 1);
    }

    #[test]
    fn allow_other_aliases_defaults_to_permissive() {
        let src = "[suppress_function]\nsymbol_name = foo\n";
        let (set, _) = SuppressionSet::parse_lenient(src);
        match &set.rules[0] {
            Suppression::Function(f) => {
                assert!(!f.allow_other_aliases);
                assert!(f.matches_symbol_name("foo", &["foo@@VER_1".to_string()]));
            }
            _ => panic!("expected function suppression"),
        }
    }

    #[test]
    fn repeatable_parameter_specs_are_collected() {
        let src = "[suppress_function]\nname = foo\nparameter = 0 int\nparameter = 1 /^char.*/\n";
        let (set, errors) = SuppressionSet::parse_lenient(src);
        assert!(errors.is_empty());
        match &set.rules[0] {
            Suppression::Function(f) => assert_eq!(f.parameters.len(), 2),
            _ => panic!("expected function suppression"),
        }
    }
}
