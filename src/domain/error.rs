//! Domain error types.

/// A malformed logic expression or operand, with the character offset of the fault.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid expression at position {position}: {message}")]
pub struct InvalidExpression {
    pub message: String,
    pub position: usize,
}

impl InvalidExpression {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for logictrader.
#[derive(Debug, thiserror::Error)]
pub enum LogicTraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    InvalidExpression(#[from] InvalidExpression),

    #[error("invalid rule {rule}: {reason}")]
    RuleInvalid { rule: String, reason: String },

    #[error("unknown indicator '{name}'")]
    UnknownIndicator { name: String },

    #[error("invalid indicator {indicator}: {reason}")]
    InvalidIndicator { indicator: String, reason: String },

    #[error("no price data for {symbol}")]
    NoData { symbol: String },

    #[error("invalid price data: {reason}")]
    InvalidPriceData { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&LogicTraderError> for std::process::ExitCode {
    fn from(err: &LogicTraderError) -> Self {
        let code: u8 = match err {
            LogicTraderError::Io(_) => 1,
            LogicTraderError::ConfigParse { .. }
            | LogicTraderError::ConfigMissing { .. }
            | LogicTraderError::ConfigInvalid { .. } => 2,
            LogicTraderError::InvalidExpression(_)
            | LogicTraderError::RuleInvalid { .. }
            | LogicTraderError::UnknownIndicator { .. }
            | LogicTraderError::InvalidIndicator { .. } => 4,
            LogicTraderError::NoData { .. } | LogicTraderError::InvalidPriceData { .. } => 5,
            LogicTraderError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_expression_context_points_at_offset() {
        let err = InvalidExpression::new("unknown rule id 'R9'", 5);
        let rendered = err.display_with_context("R1 & R9");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "R1 & R9");
        assert_eq!(lines[1], "     ^");
        assert!(lines[2].contains("position 5"));
    }

    #[test]
    fn expression_error_converts_to_top_level() {
        let err: LogicTraderError = InvalidExpression::new("boom", 0).into();
        assert!(matches!(err, LogicTraderError::InvalidExpression(_)));
        assert_eq!(err.to_string(), "invalid expression at position 0: boom");
    }

    #[test]
    fn exit_codes_by_category() {
        use std::process::ExitCode;
        let cases = [
            (
                LogicTraderError::ConfigMissing {
                    section: "strategy".into(),
                    key: "rules".into(),
                },
                ExitCode::from(2),
            ),
            (
                LogicTraderError::UnknownIndicator {
                    name: "vwap".into(),
                },
                ExitCode::from(4),
            ),
            (
                LogicTraderError::NoData {
                    symbol: "EURUSD".into(),
                },
                ExitCode::from(5),
            ),
            (
                LogicTraderError::Report {
                    reason: "disk full".into(),
                },
                ExitCode::from(6),
            ),
        ];
        for (err, expected) in &cases {
            assert_eq!(format!("{:?}", ExitCode::from(err)), format!("{:?}", expected));
        }
    }
}
