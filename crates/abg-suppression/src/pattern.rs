//! Literal-or-regex matching, the recurring shape of almost every
//! suppression filter (spec.md §4.6: "filters by type name (literal or
//! regex)...").

use regex::Regex;

#[derive(Clone, Debug)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(s: impl Into<String>) -> Self {
        Pattern::Literal(s.into())
    }

    pub fn regex(src: &str) -> Result<Self, regex::Error> {
        Ok(Pattern::Regex(Regex::new(src)?))
    }

    pub fn matches(&self, s: &str) -> bool {
        match self {
            Pattern::Literal(lit) => lit == s,
            Pattern::Regex(re) => re.is_match(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_requires_exact_match() {
        let p = Pattern::literal("Foo");
        assert!(p.matches("Foo"));
        assert!(!p.matches("Foobar"));
    }

    #[test]
    fn regex_matches_substrings() {
        let p = Pattern::regex("^Foo").unwrap();
        assert!(p.matches("Foobar"));
        assert!(!p.matches("xFoo"));
    }
}
