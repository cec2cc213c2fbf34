//! Rule data structures.
//!
//! - `Operand`: what can be compared (indicator references, constants)
//! - `IndicatorRef`: an indicator name, its ordered parameters and an optional output
//! - `Comparator`: the named comparison applied to two operand series
//! - `Rule`: one named comparison producing a boolean series

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRef {
    pub name: String,
    pub params: Vec<(String, ParamValue)>,
    pub output: Option<String>,
}

impl IndicatorRef {
    /// Deterministic cache key: name, then output, then parameter values.
    ///
    /// `bollinger_bands(period=30, std_dev=2).upper` becomes `bollinger_bands_upper_30_2`.
    pub fn column_name(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if let Some(ref output) = self.output {
            parts.push(output.clone());
        }
        parts.extend(self.params.iter().map(|(_, v)| v.to_string()));
        parts.join("_")
    }
}

impl fmt::Display for IndicatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, "({})", params.join(", "))?;
        }
        if let Some(ref output) = self.output {
            write!(f, ".{}", output)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Indicator(IndicatorRef),
    Constant(f64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Indicator(r) => write!(f, "{}", r),
            Operand::Constant(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Above,
    Below,
    CrossesAbove,
    CrossesBelow,
    Equals,
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "above" | "greater_than" | ">" => Ok(Comparator::Above),
            "below" | "less_than" | "<" => Ok(Comparator::Below),
            "crosses_above" | "cross_above" => Ok(Comparator::CrossesAbove),
            "crosses_below" | "cross_below" => Ok(Comparator::CrossesBelow),
            "equals" | "==" => Ok(Comparator::Equals),
            other => Err(format!("unknown comparator '{}'", other)),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Comparator::Above => "above",
            Comparator::Below => "below",
            Comparator::CrossesAbove => "crosses_above",
            Comparator::CrossesBelow => "crosses_below",
            Comparator::Equals => "equals",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: String,
    pub left: Operand,
    pub right: Operand,
    pub comparator: Comparator,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} {}",
            self.id, self.left, self.comparator, self.right
        )
    }
}
