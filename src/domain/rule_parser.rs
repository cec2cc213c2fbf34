//! Operand parser for rule definitions.
//!
//! Recursive descent parser turning operand text such as
//! `bollinger_bands(period=30, std_dev=2).upper`, `price(field=Close)`,
//! `obv` or `1.0850` into an [`Operand`], with error messages that carry the
//! character offset and the expected/found tokens.
//!
//! Grammar:
//!
//! ```text
//! operand   := number | indicator
//! indicator := ident [ '(' [ param { ',' param } ] ')' ] [ '.' ident ]
//! param     := ident '=' ( number | ident )
//! ```

use crate::domain::error::InvalidExpression;
use crate::domain::rule::{IndicatorRef, Operand, ParamValue};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), InvalidExpression> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(InvalidExpression::new(
                format!("expected '{}', found '{}'", expected, ch),
                self.pos,
            )),
            None => Err(InvalidExpression::new(
                format!("expected '{}', found end of input", expected),
                self.pos,
            )),
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn at_number(&self) -> bool {
        self.peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
    }

    fn parse_number(&mut self) -> Result<f64, InvalidExpression> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(InvalidExpression::new("expected number", start));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map_err(|_| InvalidExpression::new(format!("invalid number: {}", num_str), start))
    }

    fn parse_identifier(&mut self, what: &str) -> Result<String, InvalidExpression> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            _ => {
                return Err(InvalidExpression::new(
                    format!("expected {}, found '{}'", what, self.peek_word()),
                    start,
                ));
            }
        }
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_param(&mut self) -> Result<(String, ParamValue), InvalidExpression> {
        let key = self.parse_identifier("parameter name")?;
        self.expect_char('=')?;
        self.skip_whitespace();
        let value = if self.at_number() {
            ParamValue::Number(self.parse_number()?)
        } else {
            ParamValue::Text(self.parse_identifier("parameter value")?)
        };
        Ok((key, value))
    }

    fn parse_params(&mut self) -> Result<Vec<(String, ParamValue)>, InvalidExpression> {
        self.expect_char('(')?;
        let mut params = Vec::new();

        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
            return Ok(params);
        }

        loop {
            self.skip_whitespace();
            let param_pos = self.pos;
            let (key, value) = self.parse_param()?;
            if params.iter().any(|(k, _)| *k == key) {
                return Err(InvalidExpression::new(
                    format!("duplicate parameter '{}'", key),
                    param_pos,
                ));
            }
            params.push((key, value));

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some(')') => {
                    self.advance();
                    return Ok(params);
                }
                _ => {
                    return Err(InvalidExpression::new(
                        format!("expected ',' or ')', found '{}'", self.peek_word()),
                        self.pos,
                    ));
                }
            }
        }
    }

    fn parse_indicator(&mut self) -> Result<Operand, InvalidExpression> {
        let name = self.parse_identifier("indicator name or number")?;

        self.skip_whitespace();
        let params = if self.peek() == Some('(') {
            self.parse_params()?
        } else {
            Vec::new()
        };

        self.skip_whitespace();
        let output = if self.peek() == Some('.') {
            self.advance();
            Some(self.parse_identifier("output name")?)
        } else {
            None
        };

        Ok(Operand::Indicator(IndicatorRef {
            name,
            params,
            output,
        }))
    }

    fn parse_operand(&mut self) -> Result<Operand, InvalidExpression> {
        self.skip_whitespace();

        if self.peek().is_none() {
            return Err(InvalidExpression::new(
                "expected operand, found end of input",
                self.pos,
            ));
        }

        if self.at_number() {
            let num = self.parse_number()?;
            return Ok(Operand::Constant(num));
        }

        self.parse_indicator()
    }

    fn parse(&mut self) -> Result<Operand, InvalidExpression> {
        let operand = self.parse_operand()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(InvalidExpression::new(
                format!("unexpected input after operand: '{}'", self.remaining()),
                self.pos,
            ));
        }
        Ok(operand)
    }
}

pub fn parse_operand(input: &str) -> Result<Operand, InvalidExpression> {
    let mut parser = Parser::new(input);
    parser.parse()
}
