//! CSS selector subset.
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `=`, `^=`, `$=`, `*=`, `~=`, `|=`), `:nth-child(n)`,
//! `:nth-of-type(n)`, `:first-child`, descendant and child combinators, and
//! comma-separated selector lists. This is the grammar the generator emits
//! plus the common hand-written forms.

use crate::error::SelectorError;
use crate::tree::{ElementTree, NodeId};

/// Parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList(Vec<ComplexSelector>);

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    nth: Vec<Nth>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    matcher: Option<(AttrOp, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Prefix,
    Suffix,
    Substring,
    Includes,
    DashMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nth {
    Child(usize),
    OfType(usize),
}

/// Parse a selector list.
pub fn parse(selector: &str) -> Result<SelectorList, SelectorError> {
    let mut parser = Parser {
        source: selector,
        chars: selector.chars().collect(),
        pos: 0,
    };
    parser.parse_list()
}

/// Whether `s` can be written as a bare CSS identifier (`#s`, `.s`).
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    let starts_ok = match first {
        '-' => match s.chars().nth(1) {
            Some(second) => !second.is_ascii_digit() && second != '-',
            None => false,
        },
        c => c.is_alphabetic() || c == '_' || !c.is_ascii(),
    };
    starts_ok && s.chars().all(is_ident_char)
}

/// Double-quoted attribute value with `"` and `\` escaped.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// `#id` when the id is a plain identifier, `[id="..."]` otherwise.
pub fn id_selector(id: &str) -> String {
    if is_identifier(id) {
        format!("#{id}")
    } else {
        format!("[id={}]", quote(id))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> SelectorError {
        SelectorError::InvalidCss {
            selector: self.source.to_string(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<SelectorList, SelectorError> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => {
                    self.pos += 1;
                }
                Some(c) => return Err(self.error(format!("unexpected '{c}'"))),
            }
        }
        Ok(SelectorList(list))
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        self.skip_ws();
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some('+') | Some('~') => {
                    return Err(self.error("sibling combinators are not supported"));
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{c}'"))),
            };
            if matches!(self.peek(), None | Some(',')) {
                return Err(self.error("dangling combinator"));
            }
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let start = self.pos;
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.pos += 1;
            }
            Some(c) if is_ident_char(c) || c == '\\' => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.nth.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a selector, found '{c}'")),
                None => self.error("expected a selector"),
            });
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("dangling escape")),
                }
            } else if is_ident_char(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.error("expected an identifier"));
        }
        Ok(out)
    }

    fn parse_attr(&mut self) -> Result<AttrSelector, SelectorError> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    matcher: None,
                });
            }
            Some('=') => {
                self.pos += 1;
                AttrOp::Equals
            }
            Some(c) => {
                let op = match c {
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    '*' => AttrOp::Substring,
                    '~' => AttrOp::Includes,
                    '|' => AttrOp::DashMatch,
                    other => return Err(self.error(format!("unexpected '{other}' in attribute"))),
                };
                self.pos += 1;
                self.expect('=')?;
                op
            }
            None => return Err(self.error("unterminated attribute selector")),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                self.parse_quoted(quote)?
            }
            _ => self.parse_ident()?,
        };
        self.skip_ws();
        self.expect(']')?;

        Ok(AttrSelector {
            name,
            matcher: Some((op, value)),
        })
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("dangling escape")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn parse_pseudo(&mut self) -> Result<Nth, SelectorError> {
        let name = self.parse_ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(Nth::Child(1)),
            "nth-child" | "nth-of-type" => {
                self.expect('(')?;
                self.skip_ws();
                let mut digits = String::new();
                while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                    digits.push(c);
                    self.pos += 1;
                }
                self.skip_ws();
                self.expect(')')?;
                let n: usize = digits
                    .parse()
                    .map_err(|_| self.error(format!("{name} needs a positive integer")))?;
                if n == 0 {
                    return Err(self.error(format!("{name} is 1-based")));
                }
                Ok(if name == "nth-child" {
                    Nth::Child(n)
                } else {
                    Nth::OfType(n)
                })
            }
            other => Err(self.error(format!("unsupported pseudo-class ':{other}'"))),
        }
    }
}

impl SelectorList {
    /// All attached elements matching any selector of the list, in document order.
    pub fn query(&self, tree: &ElementTree) -> Vec<NodeId> {
        tree.all_elements()
            .into_iter()
            .filter(|&node| self.matches(tree, node))
            .collect()
    }

    pub fn matches(&self, tree: &ElementTree, node: NodeId) -> bool {
        self.0.iter().any(|complex| complex.matches(tree, node))
    }
}

impl ComplexSelector {
    fn matches(&self, tree: &ElementTree, node: NodeId) -> bool {
        self.matches_at(tree, node, self.compounds.len() - 1)
    }

    fn matches_at(&self, tree: &ElementTree, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(tree, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => tree
                .parent(node)
                .is_some_and(|parent| self.matches_at(tree, parent, index - 1)),
            Combinator::Descendant => tree
                .ancestors(node)
                .any(|ancestor| self.matches_at(tree, ancestor, index - 1)),
        }
    }
}

impl Compound {
    fn matches(&self, tree: &ElementTree, node: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if tree.tag(node) != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if tree.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self
            .classes
            .iter()
            .all(|class| tree.classes(node).any(|c| c == class))
        {
            return false;
        }
        if !self.attrs.iter().all(|attr| attr.matches(tree, node)) {
            return false;
        }
        self.nth.iter().all(|nth| match nth {
            Nth::Child(n) => tree.child_index(node) == Some(n - 1),
            Nth::OfType(n) => tree.type_index(node) == Some(n - 1),
        })
    }
}

impl AttrSelector {
    fn matches(&self, tree: &ElementTree, node: NodeId) -> bool {
        let Some(actual) = tree.attr(node, &self.name) else {
            return false;
        };
        let Some((op, expected)) = &self.matcher else {
            return true;
        };
        match op {
            AttrOp::Equals => actual == expected,
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(expected.as_str()),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(expected.as_str()),
            AttrOp::Substring => !expected.is_empty() && actual.contains(expected.as_str()),
            AttrOp::Includes => actual.split_whitespace().any(|w| w == expected),
            AttrOp::DashMatch => {
                actual == expected
                    || actual
                        .strip_prefix(expected.as_str())
                        .is_some_and(|rest| rest.starts_with('-'))
            }
        }
    }
}

#[cfg(test)]
#[path = "css_tests.rs"]
mod tests;
