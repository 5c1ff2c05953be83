//! Turns a [`Token`](crate::lexer::Token) stream into raw `[section]` /
//! `key = value` records, with no knowledge yet of which section/key names
//! are valid (spec.md §6.2) — that validation happens in [`crate::model`].

use crate::error::{SuppressionError, SuppressionResult};
use crate::lexer::{Lexer, Spanned, Token};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawValue {
    Scalar(String),
    List(Vec<String>),
    NestedList(Vec<Vec<String>>),
}

#[derive(Clone, Debug)]
pub struct RawSection {
    pub name: String,
    pub line: u32,
    pub entries: Vec<(String, RawValue)>,
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn line(&self) -> u32 {
        self.tokens.get(self.pos).map(|s| s.line).unwrap_or(0)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        t
    }

    fn expect_word(&mut self) -> SuppressionResult<String> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(SuppressionError::Parse {
                line: self.line(),
                message: format!("expected a word, found {other:?}"),
            }),
        }
    }

    fn expect(&mut self, tok: Token) -> SuppressionResult<()> {
        match self.next() {
            Some(ref t) if *t == tok => Ok(()),
            other => Err(SuppressionError::Parse {
                line: self.line(),
                message: format!("expected {tok:?}, found {other:?}"),
            }),
        }
    }

    fn parse_brace_list(&mut self) -> SuppressionResult<Vec<String>> {
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RBrace) {
            self.next();
            return Ok(items);
        }
        loop {
            items.push(self.expect_word()?);
            match self.peek() {
                Some(&Token::Comma) => {
                    self.next();
                }
                Some(&Token::RBrace) => {
                    self.next();
                    break;
                }
                other => {
                    return Err(SuppressionError::Parse {
                        line: self.line(),
                        message: format!("expected ',' or '}}' in list, found {other:?}"),
                    })
                }
            }
        }
        Ok(items)
    }

    fn parse_value(&mut self) -> SuppressionResult<RawValue> {
        match self.peek() {
            Some(&Token::LBrace) => {
                self.next();
                if self.peek() == Some(&Token::LBrace) {
                    let mut tuples = Vec::new();
                    loop {
                        self.expect(Token::LBrace)?;
                        tuples.push(self.parse_brace_list()?);
                        match self.peek() {
                            Some(&Token::Comma) => {
                                self.next();
                            }
                            Some(&Token::RBrace) => {
                                self.next();
                                break;
                            }
                            other => {
                                return Err(SuppressionError::Parse {
                                    line: self.line(),
                                    message: format!("expected ',' or '}}' in tuple list, found {other:?}"),
                                })
                            }
                        }
                    }
                    Ok(RawValue::NestedList(tuples))
                } else {
                    Ok(RawValue::List(self.parse_brace_list()?))
                }
            }
            Some(Token::Word(_)) => Ok(RawValue::Scalar(self.expect_word()?)),
            other => Err(SuppressionError::Parse {
                line: self.line(),
                message: format!("expected a value, found {other:?}"),
            }),
        }
    }

    fn parse(mut self) -> SuppressionResult<Vec<RawSection>> {
        let mut sections = Vec::new();
        while self.peek().is_some() {
            let line = self.line();
            self.expect(Token::LBracket)?;
            let name = self.expect_word()?;
            self.expect(Token::RBracket)?;
            let mut entries = Vec::new();
            while matches!(self.peek(), Some(Token::Word(_))) {
                let key = self.expect_word()?;
                self.expect(Token::Eq)?;
                let value = self.parse_value()?;
                entries.push((key, value));
            }
            sections.push(RawSection { name, line, entries });
        }
        Ok(sections)
    }
}

pub fn parse(src: &str) -> SuppressionResult<Vec<RawSection>> {
    let tokens = Lexer::new(src).tokenize();
    Parser { tokens, pos: 0 }.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar_and_list_and_tuple_list_values() {
        let src = "[suppress_type]\nname = Foo\nsource_location_not_in = {a.h, b.h}\nhas_data_member_inserted_between = {{offset_of(a), offset_after(b)}}\n";
        let sections = parse(src).unwrap();
        assert_eq!(sections.len(), 1);
        let s = &sections[0];
        assert_eq!(s.name, "suppress_type");
        assert_eq!(s.entries[0], ("name".to_string(), RawValue::Scalar("Foo".to_string())));
        assert_eq!(
            s.entries[1].1,
            RawValue::List(vec!["a.h".to_string(), "b.h".to_string()])
        );
        assert_eq!(
            s.entries[2].1,
            RawValue::NestedList(vec![vec!["offset_of(a)".to_string(), "offset_after(b)".to_string()]])
        );
    }

    #[test]
    fn parses_multiple_sections() {
        let src = "[suppress_function]\nname = foo\n[suppress_variable]\nname = bar\n";
        let sections = parse(src).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].name, "suppress_variable");
    }
}
