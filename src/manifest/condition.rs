//! Visibility conditions for recipe parameters.
//!
//! The host platform ships conditions as plain strings such as `model.expert` or
//! `!model.expert && model.advanced`. They are parsed into a small expression tree
//! so visibility can be resolved without evaluating strings dynamically, and so a
//! descriptor can be checked statically (e.g. warning on references to parameters
//! that do not exist).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::manifest::ParamValue;

/// A boolean expression over sibling parameter values.
///
/// `&&` binds tighter than `||`; `!` applies to the closest operand; parentheses
/// group as usual. Field references use the host's `model.<param>` notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityCondition {
    Literal(bool),
    FieldRef(String),
    Not(Box<VisibilityCondition>),
    And(Vec<VisibilityCondition>),
    Or(Vec<VisibilityCondition>),
}

impl VisibilityCondition {
    /// Evaluates the condition against the current parameter values.
    ///
    /// A missing parameter evaluates as false, matching how the host treats a
    /// reference to an unset form field.
    pub fn evaluate(&self, values: &HashMap<String, ParamValue>) -> bool {
        match self {
            VisibilityCondition::Literal(value) => *value,
            VisibilityCondition::FieldRef(name) => truthy(values.get(name)),
            VisibilityCondition::Not(inner) => !inner.evaluate(values),
            VisibilityCondition::And(items) => items.iter().all(|c| c.evaluate(values)),
            VisibilityCondition::Or(items) => items.iter().any(|c| c.evaluate(values)),
        }
    }

    /// Collects every parameter name the condition refers to.
    pub fn field_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            VisibilityCondition::Literal(_) => {}
            VisibilityCondition::FieldRef(name) => refs.push(name),
            VisibilityCondition::Not(inner) => inner.collect_refs(refs),
            VisibilityCondition::And(items) | VisibilityCondition::Or(items) => {
                for item in items {
                    item.collect_refs(refs);
                }
            }
        }
    }
}

/// Truthiness of a parameter value inside a condition: booleans count as
/// themselves, the string "true" counts as true, numbers count as non-zero.
/// Everything else (null, other strings, arrays, objects, missing) is false.
fn truthy(value: Option<&ParamValue>) -> bool {
    match value {
        Some(ParamValue::Bool(b)) => *b,
        Some(ParamValue::String(s)) => s == "true",
        Some(ParamValue::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

// ============================================================================
// Parsing
// ============================================================================

impl FromStr for VisibilityCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { input: s, pos: 0 };
        let expr = parser.parse_or()?;
        parser.skip_whitespace();
        if parser.pos < parser.input.len() {
            return Err(format!(
                "unexpected trailing input at offset {}: '{}'",
                parser.pos,
                &parser.input[parser.pos..]
            ));
        }
        Ok(expr)
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.rest().chars().next() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Consumes `token` if it comes next, after skipping whitespace.
    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<VisibilityCondition, String> {
        let mut items = vec![self.parse_and()?];
        while self.eat("||") {
            items.push(self.parse_and()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            VisibilityCondition::Or(items)
        })
    }

    fn parse_and(&mut self) -> Result<VisibilityCondition, String> {
        let mut items = vec![self.parse_unary()?];
        while self.eat("&&") {
            items.push(self.parse_unary()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            VisibilityCondition::And(items)
        })
    }

    fn parse_unary(&mut self) -> Result<VisibilityCondition, String> {
        if self.eat("!") {
            let inner = self.parse_unary()?;
            return Ok(VisibilityCondition::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<VisibilityCondition, String> {
        if self.eat("(") {
            let expr = self.parse_or()?;
            if !self.eat(")") {
                return Err(format!("expected ')' at offset {}", self.pos));
            }
            return Ok(expr);
        }
        if self.eat_keyword("true") {
            return Ok(VisibilityCondition::Literal(true));
        }
        if self.eat_keyword("false") {
            return Ok(VisibilityCondition::Literal(false));
        }
        if self.eat("model.") {
            let name = self.parse_identifier()?;
            return Ok(VisibilityCondition::FieldRef(name));
        }
        Err(format!(
            "expected 'true', 'false', 'model.<param>', '!' or '(' at offset {}",
            self.pos
        ))
    }

    /// Consumes `word` only when it is not the prefix of a longer identifier.
    fn eat_keyword(&mut self, word: &str) -> bool {
        self.skip_whitespace();
        if !self.rest().starts_with(word) {
            return false;
        }
        let follows_ident = self.rest()[word.len()..]
            .starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_');
        if follows_ident {
            return false;
        }
        self.pos += word.len();
        true
    }

    fn parse_identifier(&mut self) -> Result<String, String> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
            .count();
        if len == 0 {
            return Err(format!(
                "expected a parameter name after 'model.' at offset {}",
                self.pos
            ));
        }
        let name = &rest[..len];
        self.pos += len;
        Ok(name.to_string())
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for VisibilityCondition {
    /// Renders the condition back into the host's string form. Parser output
    /// round-trips: `display(parse(s)) == s` for canonically spaced input.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisibilityCondition::Literal(true) => write!(f, "true"),
            VisibilityCondition::Literal(false) => write!(f, "false"),
            VisibilityCondition::FieldRef(name) => write!(f, "model.{}", name),
            VisibilityCondition::Not(inner) => {
                write!(f, "!")?;
                write_child(f, inner, needs_parens_in_unary(inner))
            }
            VisibilityCondition::And(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " && ")?;
                    }
                    write_child(f, item, needs_parens_in_and(item))?;
                }
                Ok(())
            }
            VisibilityCondition::Or(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " || ")?;
                    }
                    write_child(f, item, needs_parens_in_or(item))?;
                }
                Ok(())
            }
        }
    }
}

fn needs_parens_in_unary(child: &VisibilityCondition) -> bool {
    matches!(
        child,
        VisibilityCondition::And(_) | VisibilityCondition::Or(_)
    )
}

fn needs_parens_in_and(child: &VisibilityCondition) -> bool {
    matches!(
        child,
        VisibilityCondition::And(_) | VisibilityCondition::Or(_)
    )
}

fn needs_parens_in_or(child: &VisibilityCondition) -> bool {
    matches!(child, VisibilityCondition::Or(_))
}

fn write_child(
    f: &mut fmt::Formatter<'_>,
    child: &VisibilityCondition,
    parens: bool,
) -> fmt::Result {
    if parens {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

// ============================================================================
// Serde: conditions travel as plain strings in the manifest document
// ============================================================================

impl Serialize for VisibilityCondition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VisibilityCondition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
