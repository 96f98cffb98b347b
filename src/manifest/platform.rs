// src/manifest/platform.rs

//! Platform expressions for `supports` and dependency `platform` fields
//!
//! Grammar:
//!
//! ```text
//! expr     := and-expr | or-expr | unary
//! and-expr := unary ("&" unary)+
//! or-expr  := unary (("|" | ",") unary)+
//! unary    := "!" unary | "(" expr ")" | identifier
//! ```
//!
//! `&` and `|` cannot be mixed at one nesting level without parentheses.

use crate::error::{Error, Result};
use crate::package::Triplet;
use std::fmt;

/// Identifiers that are true for more than one triplet component
const ALIASES: &[(&str, &[&str])] = &[
    ("windows", &["windows", "uwp", "mingw"]),
    ("arm", &["arm", "arm64"]),
];

/// Evaluation context: the triplet being built and the host triplet
#[derive(Debug, Clone, Copy)]
pub struct PlatformContext<'a> {
    pub target: &'a Triplet,
    pub host: &'a Triplet,
}

/// Parsed platform expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformExpr {
    Identifier(String),
    Not(Box<PlatformExpr>),
    And(Vec<PlatformExpr>),
    Or(Vec<PlatformExpr>),
}

impl PlatformExpr {
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = Parser {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos != parser.bytes.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    pub fn evaluate(&self, ctx: &PlatformContext<'_>) -> bool {
        match self {
            PlatformExpr::Identifier(id) => identifier_matches(id, ctx),
            PlatformExpr::Not(inner) => !inner.evaluate(ctx),
            PlatformExpr::And(terms) => terms.iter().all(|t| t.evaluate(ctx)),
            PlatformExpr::Or(terms) => terms.iter().any(|t| t.evaluate(ctx)),
        }
    }
}

fn identifier_matches(id: &str, ctx: &PlatformContext<'_>) -> bool {
    if id == "native" {
        return ctx.target == ctx.host;
    }
    let accepted = ALIASES
        .iter()
        .find(|(alias, _)| *alias == id)
        .map(|(_, components)| *components)
        .unwrap_or(&[]);
    ctx.target
        .components()
        .any(|c| c == id || accepted.contains(&c))
}

impl fmt::Display for PlatformExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, terms: &[PlatformExpr], op: &str) -> fmt::Result {
            for (i, term) in terms.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                match term {
                    PlatformExpr::And(_) | PlatformExpr::Or(_) => write!(f, "({term})")?,
                    _ => write!(f, "{term}")?,
                }
            }
            Ok(())
        }

        match self {
            PlatformExpr::Identifier(id) => f.write_str(id),
            PlatformExpr::Not(inner) => match inner.as_ref() {
                PlatformExpr::And(_) | PlatformExpr::Or(_) => write!(f, "!({inner})"),
                _ => write!(f, "!{inner}"),
            },
            PlatformExpr::And(terms) => join(f, terms, "&"),
            PlatformExpr::Or(terms) => join(f, terms, "|"),
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> Error {
        Error::InvalidPlatformExpression {
            expression: self.text.to_string(),
            reason: format!("{reason} at offset {}", self.pos),
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<PlatformExpr> {
        let first = self.unary()?;
        let mut terms = vec![first];
        let mut op: Option<u8> = None;

        while let Some(c) = self.peek() {
            let this_op = match c {
                b'&' => b'&',
                b'|' | b',' => b'|',
                _ => break,
            };
            if op.is_some_and(|prev| prev != this_op) {
                return Err(self.error("mixing '&' and '|' requires parentheses"));
            }
            op = Some(this_op);
            self.pos += 1;
            terms.push(self.unary()?);
        }

        Ok(match op {
            None => terms.remove(0),
            Some(b'&') => PlatformExpr::And(terms),
            Some(_) => PlatformExpr::Or(terms),
        })
    }

    fn unary(&mut self) -> Result<PlatformExpr> {
        match self.peek() {
            Some(b'!') => {
                self.pos += 1;
                Ok(PlatformExpr::Not(Box::new(self.unary()?)))
            }
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if self.peek() != Some(b')') {
                    return Err(self.error("expected ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {
                let start = self.pos;
                while self.pos < self.bytes.len()
                    && (self.bytes[self.pos].is_ascii_lowercase()
                        || self.bytes[self.pos].is_ascii_digit())
                {
                    self.pos += 1;
                }
                Ok(PlatformExpr::Identifier(self.text[start..self.pos].to_string()))
            }
            Some(_) => Err(self.error("expected an identifier, '!' or '('")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str, target: &str, host: &str) -> bool {
        let target = Triplet::new(target).unwrap();
        let host = Triplet::new(host).unwrap();
        PlatformExpr::parse(expr).unwrap().evaluate(&PlatformContext {
            target: &target,
            host: &host,
        })
    }

    #[test]
    fn test_identifier_matches_component() {
        assert!(eval("linux", "x64-linux", "x64-linux"));
        assert!(!eval("windows", "x64-linux", "x64-linux"));
        assert!(eval("static", "x64-windows-static", "x64-windows"));
    }

    #[test]
    fn test_aliases() {
        assert!(eval("windows", "x64-uwp", "x64-windows"));
        assert!(eval("arm", "arm64-osx", "arm64-osx"));
    }

    #[test]
    fn test_native() {
        assert!(eval("native", "x64-linux", "x64-linux"));
        assert!(!eval("native", "arm64-linux", "x64-linux"));
    }

    #[test]
    fn test_operators() {
        assert!(eval("!windows & !osx", "x64-linux", "x64-linux"));
        assert!(eval("windows | linux", "x64-linux", "x64-linux"));
        assert!(eval("windows, linux", "x64-linux", "x64-linux"));
        assert!(eval("(windows | linux) & !arm", "x64-linux", "x64-linux"));
        assert!(!eval("!(windows | linux)", "x64-linux", "x64-linux"));
    }

    #[test]
    fn test_rejects_mixed_operators() {
        assert!(PlatformExpr::parse("windows & linux | osx").is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(PlatformExpr::parse("").is_err());
        assert!(PlatformExpr::parse("(windows").is_err());
        assert!(PlatformExpr::parse("windows &").is_err());
        assert!(PlatformExpr::parse("Windows").is_err());
        assert!(PlatformExpr::parse("windows linux").is_err());
    }

    #[test]
    fn test_display_reparses() {
        let expr = PlatformExpr::parse("!(windows | uwp) & x64").unwrap();
        assert_eq!(expr.to_string(), "!(windows | uwp) & x64");
        assert_eq!(PlatformExpr::parse(&expr.to_string()).unwrap(), expr);
    }
}
