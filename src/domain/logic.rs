//! Boolean logic expressions over rule ids.
//!
//! Expressions such as `R1 & (R2 | ~R3)` are tokenized, parsed into an
//! [`Expr`] tree and evaluated against [`RuleMasks`]. Nothing is executed
//! beyond this boolean algebra.
//!
//! Precedence, highest first: `~` (not), `&` (and), `|` (or). `&` and `|`
//! are left-associative. Allowed characters are ASCII letters, digits, `_`,
//! whitespace, `~`, `&`, `|`, `(` and `)`.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::error::InvalidExpression;
use crate::domain::rule_eval::RuleMasks;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Rule { id: String, position: usize },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Rule { id, .. } => write!(f, "{}", id),
            Expr::Not(inner) => write!(f, "~{}", inner),
            Expr::And(l, r) => write!(f, "({} & {})", l, r),
            Expr::Or(l, r) => write!(f, "({} | {})", l, r),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(id) => write!(f, "{}", id),
            Token::Not => f.write_str("~"),
            Token::And => f.write_str("&"),
            Token::Or => f.write_str("|"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, InvalidExpression> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_ascii_whitespace() => {
                chars.next();
            }
            '~' | '&' | '|' | '(' | ')' => {
                let token = match ch {
                    '~' => Token::Not,
                    '&' => Token::And,
                    '|' => Token::Or,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                };
                tokens.push((token, pos));
                chars.next();
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((Token::Ident(ident), pos));
            }
            other => {
                return Err(InvalidExpression::new(
                    format!("character '{}' is not allowed", other),
                    pos,
                ));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(self.end)
    }

    fn found(&self) -> String {
        self.peek()
            .map(|t| format!("'{}'", t))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn parse_or(&mut self) -> Result<Expr, InvalidExpression> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, InvalidExpression> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, InvalidExpression> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, InvalidExpression> {
        let offset = self.offset();
        match self.peek().cloned() {
            Some(Token::Ident(id)) => {
                self.pos += 1;
                Ok(Expr::Rule {
                    id,
                    position: offset,
                })
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(InvalidExpression::new(
                        format!("expected ')', found {}", self.found()),
                        self.offset(),
                    ));
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => Err(InvalidExpression::new(
                format!("expected rule id, '~' or '(', found {}", self.found()),
                offset,
            )),
        }
    }
}

/// A parsed logic expression, ready to evaluate against rule masks.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicExpression {
    source: String,
    root: Expr,
}

impl LogicExpression {
    /// Parse `input` without checking which rule ids exist.
    pub fn parse(input: &str) -> Result<Self, InvalidExpression> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(InvalidExpression::new("empty expression", 0));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: input.len(),
        };
        let root = parser.parse_or()?;
        if parser.peek().is_some() {
            return Err(InvalidExpression::new(
                format!("unexpected {} after expression", parser.found()),
                parser.offset(),
            ));
        }
        Ok(Self {
            source: input.to_string(),
            root,
        })
    }

    /// Parse `input` and require every referenced rule id to be in `known`.
    pub fn compile<'a>(
        input: &str,
        known: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, InvalidExpression> {
        let expr = Self::parse(input)?;
        let known: BTreeSet<&str> = known.into_iter().collect();
        expr.check_known(|id| known.contains(id))?;
        Ok(expr)
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Referenced rule ids, sorted and deduplicated.
    pub fn rule_ids(&self) -> BTreeSet<&str> {
        let mut ids = BTreeSet::new();
        collect_ids(&self.root, &mut ids);
        ids
    }

    fn check_known(&self, is_known: impl Fn(&str) -> bool) -> Result<(), InvalidExpression> {
        let mut leaves = Vec::new();
        collect_leaves(&self.root, &mut leaves);
        match leaves.into_iter().find(|(id, _)| !is_known(id)) {
            Some((id, position)) => Err(InvalidExpression::new(
                format!("unknown rule id '{}'", id),
                position,
            )),
            None => Ok(()),
        }
    }

    /// Evaluate over every step of `masks`.
    pub fn evaluate(&self, masks: &RuleMasks) -> Result<Vec<bool>, InvalidExpression> {
        self.check_known(|id| masks.contains_key(id))?;
        let len = self
            .rule_ids()
            .iter()
            .map(|id| masks[*id].len())
            .min()
            .unwrap_or(0);
        Ok((0..len).map(|step| eval_node(&self.root, masks, step)).collect())
    }

    /// Evaluate at a single step; steps beyond a mask's end read as false.
    pub fn evaluate_at(&self, masks: &RuleMasks, step: usize) -> Result<bool, InvalidExpression> {
        self.check_known(|id| masks.contains_key(id))?;
        Ok(eval_node(&self.root, masks, step))
    }
}

impl fmt::Display for LogicExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn collect_ids<'a>(expr: &'a Expr, ids: &mut BTreeSet<&'a str>) {
    match expr {
        Expr::Rule { id, .. } => {
            ids.insert(id.as_str());
        }
        Expr::Not(inner) => collect_ids(inner, ids),
        Expr::And(l, r) | Expr::Or(l, r) => {
            collect_ids(l, ids);
            collect_ids(r, ids);
        }
    }
}

fn collect_leaves<'a>(expr: &'a Expr, leaves: &mut Vec<(&'a str, usize)>) {
    match expr {
        Expr::Rule { id, position } => leaves.push((id.as_str(), *position)),
        Expr::Not(inner) => collect_leaves(inner, leaves),
        Expr::And(l, r) | Expr::Or(l, r) => {
            collect_leaves(l, leaves);
            collect_leaves(r, leaves);
        }
    }
}

fn eval_node(expr: &Expr, masks: &RuleMasks, step: usize) -> bool {
    match expr {
        Expr::Rule { id, .. } => masks
            .get(id)
            .and_then(|m| m.get(step))
            .copied()
            .unwrap_or(false),
        Expr::Not(inner) => !eval_node(inner, masks, step),
        Expr::And(l, r) => eval_node(l, masks, step) && eval_node(r, masks, step),
        Expr::Or(l, r) => eval_node(l, masks, step) || eval_node(r, masks, step),
    }
}
