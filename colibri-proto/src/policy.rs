// Copyright 2026 Anapaya Systems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sequence predicates over reservation paths.
//!
//! A sequence is a series of step predicates that must match the AS hops of a
//! path in order. Predicates can be combined:
//! - `|` (OR): either the left or the right expression must match.
//! - `?`: the preceding expression may appear zero or one time.
//! - `+`: the preceding expression must appear one or more times.
//! - `*`: the preceding expression may appear zero or more times.
//! - Parentheses group expressions.
//!
//! A step predicate is written `isd[-asn[#ifaces]]` where 0 is a wildcard in
//! every position, e.g. `1-ff00:0:2#3,4` or `0+`.

use std::{fmt::Display, str::FromStr};

use crate::{
    address::{Asn, Isd},
    steps::{PathInterface, PathStep, PathSteps},
};

pub use self::parser::SequenceParseError;

/// A parsed sequence predicate.
#[derive(Debug, Clone)]
pub struct Sequence {
    exprs: Vec<SequenceExpr>,
    raw: String,
}

impl Sequence {
    /// Parses a sequence from its string form.
    pub fn parse(s: &str) -> Result<Self, SequenceParseError> {
        let tokens = lexer::tokenize(s);
        let exprs = parser::Parser::new(&tokens).parse()?;
        Ok(Sequence {
            exprs,
            raw: s.to_string(),
        })
    }

    /// Checks the sequence against the AS hops of a step list.
    pub fn matches_steps(&self, steps: &PathSteps) -> bool {
        let hops: Vec<PathStep> = steps.iter().copied().collect();
        self.matches(&hops)
    }

    /// Checks the sequence against a traversed-interface list, as recorded on
    /// an existing reservation. The list holds the egress of every hop but
    /// the last interleaved with the ingress of every hop but the first; the
    /// zero interfaces at the path ends are implied.
    pub fn eval_interfaces(&self, interfaces: &[PathInterface]) -> bool {
        let Some(hops) = hops_from_interfaces(interfaces) else {
            return false;
        };
        self.matches(&hops)
    }

    /// Filters paths, keeping those whose steps match the sequence.
    pub fn eval<P>(&self, paths: Vec<P>, steps_of: impl Fn(&P) -> &PathSteps) -> Vec<P> {
        paths
            .into_iter()
            .filter(|p| self.matches_steps(steps_of(p)))
            .collect()
    }

    fn matches(&self, hops: &[PathStep]) -> bool {
        // Apply each top-level expression to the set of reachable positions.
        let mut positions: Vec<usize> = vec![0];
        for expr in &self.exprs {
            let mut next = Vec::new();
            for &pos in &positions {
                next.extend(expr.match_from(hops, pos));
            }
            next.sort_unstable();
            next.dedup();
            positions = next;
            if positions.is_empty() {
                return false;
            }
        }
        positions.contains(&hops.len())
    }
}

impl FromStr for Sequence {
    type Err = SequenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sequence::parse(s)
    }
}

impl Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Rebuilds the AS hops from a traversed-interface list.
///
/// Returns None if the list cannot come from a well-formed path: an odd
/// number of entries, or an interior link whose two interfaces disagree on
/// the AS they belong to.
fn hops_from_interfaces(interfaces: &[PathInterface]) -> Option<Vec<PathStep>> {
    if interfaces.is_empty() {
        return Some(Vec::new());
    }
    if interfaces.len() % 2 != 0 {
        return None;
    }

    let mut hops = Vec::with_capacity(interfaces.len() / 2 + 1);
    hops.push(PathStep {
        ingress: 0,
        egress: interfaces[0].id,
        isd_asn: interfaces[0].isd_asn,
    });
    for pair in interfaces[1..interfaces.len() - 1].chunks(2) {
        if pair[0].isd_asn != pair[1].isd_asn {
            return None;
        }
        hops.push(PathStep {
            ingress: pair[0].id,
            egress: pair[1].id,
            isd_asn: pair[0].isd_asn,
        });
    }
    let last = interfaces[interfaces.len() - 1];
    hops.push(PathStep {
        ingress: last.id,
        egress: 0,
        isd_asn: last.isd_asn,
    });
    Some(hops)
}

/// A predicate over the interface pair of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IfacePredicate {
    /// Matches any interfaces.
    Any,
    /// Either ingress or egress must match the value; 0 is a wildcard.
    Either(u16),
    /// Ingress and egress must match the respective values; 0 is a wildcard.
    Both { ingress: u16, egress: u16 },
}

impl IfacePredicate {
    fn matches(&self, hop_ingress: u16, hop_egress: u16) -> bool {
        let m = |want: u16, have: u16| want == 0 || want == have;
        match self {
            IfacePredicate::Any => true,
            IfacePredicate::Either(id) => m(*id, hop_ingress) || m(*id, hop_egress),
            IfacePredicate::Both { ingress, egress } => {
                m(*ingress, hop_ingress) && m(*egress, hop_egress)
            }
        }
    }
}

/// A predicate over one AS hop of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPredicate {
    isd: Isd,
    asn: Option<Asn>,
    interfaces: IfacePredicate,
}

impl StepPredicate {
    /// Checks the predicate against one hop.
    fn matches(&self, hop: &PathStep) -> bool {
        self.isd.matches(hop.isd_asn.isd)
            && self.asn.map(|a| a.matches(hop.isd_asn.asn)).unwrap_or(true)
            && self.interfaces.matches(hop.ingress, hop.egress)
    }
}

impl FromStr for StepPredicate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (isd, rest) = match s.split_once('-') {
            None => {
                return Ok(StepPredicate {
                    isd: Isd::from_str(s).map_err(|e| e.to_string())?,
                    asn: None,
                    interfaces: IfacePredicate::Any,
                });
            }
            Some(parts) => parts,
        };
        let isd = Isd::from_str(isd).map_err(|e| e.to_string())?;

        let (asn, ifaces) = match rest.split_once('#') {
            None => (rest, None),
            Some((asn, ifaces)) => (asn, Some(ifaces)),
        };
        let asn = Asn::from_str(asn).map_err(|e| e.to_string())?;

        let interfaces = match ifaces {
            None => IfacePredicate::Any,
            Some(spec) => {
                match spec.split_once(',') {
                    None => IfacePredicate::Either(spec.parse().map_err(|_| {
                        format!("invalid interface: {spec}")
                    })?),
                    Some((ingress, egress)) => {
                        IfacePredicate::Both {
                            ingress: ingress
                                .parse()
                                .map_err(|_| format!("invalid ingress interface: {ingress}"))?,
                            egress: egress
                                .parse()
                                .map_err(|_| format!("invalid egress interface: {egress}"))?,
                        }
                    }
                }
            }
        };

        Ok(StepPredicate {
            isd,
            asn: Some(asn),
            interfaces,
        })
    }
}

/// An expression node of a sequence.
#[derive(Debug, Clone)]
enum SequenceExpr {
    Predicate(StepPredicate),
    Or(Box<SequenceExpr>, Box<SequenceExpr>),
    Optional(Box<SequenceExpr>),
    OneOrMore(Box<SequenceExpr>),
    ZeroOrMore(Box<SequenceExpr>),
}

impl SequenceExpr {
    /// Matches the expression starting at `pos` and returns every position
    /// reachable after consuming it.
    fn match_from(&self, hops: &[PathStep], pos: usize) -> Vec<usize> {
        let mut reachable = match self {
            SequenceExpr::Predicate(pred) => {
                if pos < hops.len() && pred.matches(&hops[pos]) {
                    vec![pos + 1]
                } else {
                    vec![]
                }
            }
            SequenceExpr::Or(a, b) => {
                let mut left = a.match_from(hops, pos);
                left.extend(b.match_from(hops, pos));
                left
            }
            SequenceExpr::Optional(inner) => {
                let mut res = vec![pos];
                res.extend(inner.match_from(hops, pos));
                res
            }
            SequenceExpr::OneOrMore(inner) => Self::closure_from(hops, pos, inner),
            SequenceExpr::ZeroOrMore(inner) => {
                let mut res = Self::closure_from(hops, pos, inner);
                res.push(pos);
                res
            }
        };
        reachable.sort_unstable();
        reachable.dedup();
        reachable
    }

    /// Collects every position reachable by one or more repetitions of the
    /// inner expression.
    fn closure_from(hops: &[PathStep], pos: usize, inner: &SequenceExpr) -> Vec<usize> {
        let mut all = Vec::new();
        let mut frontier = inner.match_from(hops, pos);
        all.extend(&frontier);
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for p in frontier {
                for n in inner.match_from(hops, p) {
                    if !all.contains(&n) {
                        all.push(n);
                        next.push(n);
                    }
                }
            }
            frontier = next;
        }
        all
    }
}

mod lexer {
    /// A token of the sequence grammar.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(super) enum TokenKind {
        Predicate(String),
        Or,
        LParen,
        RParen,
        QMark,
        Plus,
        Star,
        Eoi,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(super) struct Token {
        pub kind: TokenKind,
        /// The (start, end) span in the input string.
        pub span: (usize, usize),
    }

    const RESERVED: &str = "|()+?*";

    pub(super) fn tokenize(s: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut input = s.char_indices().peekable();
        while let Some((idx, c)) = input.next() {
            let kind = match c {
                '|' => TokenKind::Or,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '?' => TokenKind::QMark,
                '+' => TokenKind::Plus,
                '*' => TokenKind::Star,
                c if c.is_whitespace() => continue,
                c => {
                    let mut ident = String::new();
                    ident.push(c);
                    while let Some(&(_, p)) = input.peek() {
                        if p.is_whitespace() || RESERVED.contains(p) {
                            break;
                        }
                        input.next();
                        ident.push(p);
                    }
                    let end = idx + ident.len();
                    tokens.push(Token {
                        kind: TokenKind::Predicate(ident),
                        span: (idx, end),
                    });
                    continue;
                }
            };
            tokens.push(Token {
                kind,
                span: (idx, idx + 1),
            });
        }
        tokens.push(Token {
            kind: TokenKind::Eoi,
            span: (s.len(), s.len()),
        });
        tokens
    }
}

mod parser {
    use thiserror::Error;

    use super::{
        SequenceExpr,
        lexer::{Token, TokenKind},
    };

    /// Error raised when a sequence string cannot be parsed.
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("invalid sequence at {}..{}: {message}", span.0, span.1)]
    pub struct SequenceParseError {
        /// The (start, end) span in the input string where parsing failed.
        pub span: (usize, usize),
        /// Human-readable description of the failure.
        pub message: String,
    }

    const NO_BIND_POWER: u8 = 0;
    // OR binds loosest of the operators; quantifiers are consumed greedily.
    const OR_BIND_POWER: u8 = 10;

    pub(super) struct Parser<'t> {
        tokens: &'t [Token],
        pos: usize,
    }

    impl<'t> Parser<'t> {
        pub fn new(tokens: &'t [Token]) -> Self {
            Parser { tokens, pos: 0 }
        }

        fn peek(&self) -> &'t TokenKind {
            &self.tokens[self.pos].kind
        }

        fn consume(&mut self) -> &'t Token {
            let t = &self.tokens[self.pos];
            if t.kind != TokenKind::Eoi {
                self.pos += 1;
            }
            t
        }

        pub fn parse(&mut self) -> Result<Vec<SequenceExpr>, SequenceParseError> {
            let mut exprs = Vec::new();
            while *self.peek() != TokenKind::Eoi {
                exprs.push(self.parse_expr(NO_BIND_POWER)?);
            }
            Ok(exprs)
        }

        fn parse_expr(&mut self, left_bp: u8) -> Result<SequenceExpr, SequenceParseError> {
            let token = self.consume();
            let mut expr = match &token.kind {
                TokenKind::Predicate(s) => {
                    SequenceExpr::Predicate(s.parse().map_err(|e| {
                        SequenceParseError {
                            span: token.span,
                            message: format!("invalid step predicate '{s}': {e}"),
                        }
                    })?)
                }
                TokenKind::LParen => {
                    let span_l = token.span;
                    let nested = self.parse_expr(NO_BIND_POWER)?;
                    let closing = self.consume();
                    match closing.kind {
                        TokenKind::RParen => nested,
                        TokenKind::Eoi => {
                            return Err(SequenceParseError {
                                span: span_l,
                                message: "unclosed '('".into(),
                            });
                        }
                        _ => {
                            return Err(SequenceParseError {
                                span: closing.span,
                                message: "expected ')'".into(),
                            });
                        }
                    }
                }
                kind => {
                    return Err(SequenceParseError {
                        span: token.span,
                        message: format!("unexpected token {kind:?}, expected a predicate or '('"),
                    });
                }
            };

            loop {
                // quantifiers bind tightest and are consumed greedily
                match self.peek() {
                    TokenKind::QMark => {
                        self.consume();
                        expr = SequenceExpr::Optional(Box::new(expr));
                        continue;
                    }
                    TokenKind::Plus => {
                        self.consume();
                        expr = SequenceExpr::OneOrMore(Box::new(expr));
                        continue;
                    }
                    TokenKind::Star => {
                        self.consume();
                        expr = SequenceExpr::ZeroOrMore(Box::new(expr));
                        continue;
                    }
                    _ => {}
                }

                match self.peek() {
                    TokenKind::Or if left_bp <= OR_BIND_POWER => {
                        self.consume();
                        // left associative: bump the right-hand binding power
                        let rhs = self.parse_expr(OR_BIND_POWER + 1)?;
                        expr = SequenceExpr::Or(Box::new(expr), Box::new(rhs));
                    }
                    _ => break,
                }
            }

            Ok(expr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hops(spec: &[&str]) -> Vec<PathStep> {
        spec.iter()
            .map(|s| {
                PathStep {
                    ingress: 0,
                    egress: 0,
                    isd_asn: s.parse().unwrap(),
                }
            })
            .collect()
    }

    #[test]
    fn should_match_linear_sequences() {
        let seq = Sequence::parse("1 2 3").unwrap();
        assert!(seq.matches(&hops(&["1-1", "2-1", "3-1"])));
        assert!(!seq.matches(&hops(&["1-1", "2-1"])));
        assert!(!seq.matches(&hops(&["2-1", "1-1", "3-1"])));
    }

    #[test]
    fn should_match_optional() {
        let seq = Sequence::parse("1 2? 3").unwrap();
        assert!(seq.matches(&hops(&["1-1", "3-1"])));
        assert!(seq.matches(&hops(&["1-1", "2-1", "3-1"])));
        assert!(!seq.matches(&hops(&["1-1", "2-1"])));
    }

    #[test]
    fn should_match_one_or_more() {
        let seq = Sequence::parse("1+ 1-4").unwrap();
        assert!(seq.matches(&hops(&["1-1", "1-1", "1-4"])));
        assert!(!seq.matches(&hops(&["1-4"])));
        assert!(!seq.matches(&hops(&["1-1", "1-5"])));
    }

    #[test]
    fn should_match_zero_or_more() {
        let seq = Sequence::parse("1* 2").unwrap();
        assert!(seq.matches(&hops(&["2-1"])));
        assert!(seq.matches(&hops(&["1-1", "1-1", "2-1"])));
        assert!(!seq.matches(&hops(&["1-1", "1-1"])));
    }

    #[test]
    fn should_match_alternatives() {
        let seq = Sequence::parse("(1 | 2) 3").unwrap();
        assert!(seq.matches(&hops(&["1-1", "3-1"])));
        assert!(seq.matches(&hops(&["2-1", "3-1"])));
        assert!(!seq.matches(&hops(&["4-1", "3-1"])));

        let seq = Sequence::parse("1 (2+ | 3) 4").unwrap();
        assert!(seq.matches(&hops(&["1-1", "2-1", "2-1", "4-1"])));
        assert!(seq.matches(&hops(&["1-1", "3-1", "4-1"])));
        assert!(!seq.matches(&hops(&["1-1", "2-1", "3-1", "4-1"])));
    }

    #[test]
    fn should_match_wildcard_transit() {
        let seq = Sequence::parse("1-ff00:0:1 0+ 1-ff00:0:3").unwrap();
        assert!(seq.matches(&hops(&["1-ff00:0:1", "1-ff00:0:88", "1-ff00:0:3"])));
        assert!(!seq.matches(&hops(&["1-ff00:0:1", "1-ff00:0:3"])));
    }

    #[test]
    fn should_match_interface_predicates() {
        let seq = Sequence::parse("1-ff00:0:1#0,1 1-ff00:0:2#2,0").unwrap();
        let path = vec![
            PathStep {
                ingress: 0,
                egress: 1,
                isd_asn: "1-ff00:0:1".parse().unwrap(),
            },
            PathStep {
                ingress: 2,
                egress: 0,
                isd_asn: "1-ff00:0:2".parse().unwrap(),
            },
        ];
        assert!(seq.matches(&path));

        let seq = Sequence::parse("1-ff00:0:1#7 1-ff00:0:2").unwrap();
        assert!(!seq.matches(&path));
    }

    #[test]
    fn should_eval_interfaces() {
        let seq = Sequence::parse("1-ff00:0:1 1-ff00:0:2").unwrap();
        // direct path: one link with two interfaces
        let direct = vec![
            PathInterface {
                isd_asn: "1-ff00:0:1".parse().unwrap(),
                id: 1,
            },
            PathInterface {
                isd_asn: "1-ff00:0:2".parse().unwrap(),
                id: 2,
            },
        ];
        assert!(seq.eval_interfaces(&direct));

        let transit = vec![
            PathInterface {
                isd_asn: "1-ff00:0:1".parse().unwrap(),
                id: 3,
            },
            PathInterface {
                isd_asn: "1-ff00:0:88".parse().unwrap(),
                id: 99,
            },
            PathInterface {
                isd_asn: "1-ff00:0:88".parse().unwrap(),
                id: 4,
            },
            PathInterface {
                isd_asn: "1-ff00:0:2".parse().unwrap(),
                id: 5,
            },
        ];
        assert!(!seq.eval_interfaces(&transit));
        assert!(
            Sequence::parse("1-ff00:0:1 0+ 1-ff00:0:2")
                .unwrap()
                .eval_interfaces(&transit)
        );

        // odd interface count cannot come from a well-formed path
        assert!(!seq.eval_interfaces(&direct[..1]));
    }

    #[test]
    fn should_reject_malformed_sequences() {
        assert!(Sequence::parse("(1 2").is_err());
        assert!(Sequence::parse("1 )").is_err());
        assert!(Sequence::parse("x-y").is_err());
        assert!(Sequence::parse("1-ff00:0:1#a").is_err());
    }
}
