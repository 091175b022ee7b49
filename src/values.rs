//! Parsing and evaluation of value expressions.
//!
//! Recipe parameters and capability preconditions carry textual expressions of
//! the form `[op] number`, where the operator defaults to `=` and the number
//! may use a decimal comma instead of a decimal point.
use anyhow::{Context, Result, bail};
use float_cmp::approx_eq;
use std::str::FromStr;

/// A comparison operator in a value expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CompareOp {
    /// `=`
    #[strum(serialize = "=")]
    Equal,
    /// `>=`
    #[strum(serialize = ">=")]
    GreaterOrEqual,
    /// `<=`
    #[strum(serialize = "<=")]
    LessOrEqual,
    /// `>`
    #[strum(serialize = ">")]
    Greater,
    /// `<`
    #[strum(serialize = "<")]
    Less,
}

impl CompareOp {
    /// Compare `lhs` against `rhs` with this operator
    pub fn compare(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Equal => approx_eq!(f64, lhs, rhs),
            Self::GreaterOrEqual => lhs >= rhs,
            Self::LessOrEqual => lhs <= rhs,
            Self::Greater => lhs > rhs,
            Self::Less => lhs < rhs,
        }
    }
}

/// A parsed `[op] number` expression
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueExpression {
    /// The comparison operator (`=` if the expression omitted it)
    pub op: CompareOp,
    /// The numeric operand
    pub value: f64,
}

impl ValueExpression {
    /// Whether `actual` satisfies this expression, i.e. `actual op value`
    pub fn holds_for(&self, actual: f64) -> bool {
        self.op.compare(actual, self.value)
    }
}

impl FromStr for ValueExpression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s.trim_start();
        let (op, rest) = split_operator(rest);
        let rest = rest.trim_start();

        // Take the leading run of numeric characters; anything after it (e.g. a unit
        // suffix) is ignored
        let number: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
            .collect();
        if number.is_empty() {
            bail!("No number found in value expression {s:?}");
        }

        let value = number
            .replace(',', ".")
            .parse()
            .with_context(|| format!("Invalid number in value expression {s:?}"))?;
        Ok(Self { op, value })
    }
}

/// Split a leading comparison operator off `s`, defaulting to `=`
fn split_operator(s: &str) -> (CompareOp, &str) {
    for (prefix, op) in [
        (">=", CompareOp::GreaterOrEqual),
        ("<=", CompareOp::LessOrEqual),
        (">", CompareOp::Greater),
        ("<", CompareOp::Less),
        ("=", CompareOp::Equal),
    ] {
        if let Some(rest) = s.strip_prefix(prefix) {
            return (op, rest);
        }
    }

    (CompareOp::Equal, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("100", CompareOp::Equal, 100.0)]
    #[case("= 120", CompareOp::Equal, 120.0)]
    #[case(">= 100", CompareOp::GreaterOrEqual, 100.0)]
    #[case("<=50", CompareOp::LessOrEqual, 50.0)]
    #[case("> 0.5", CompareOp::Greater, 0.5)]
    #[case("< 2,5", CompareOp::Less, 2.5)]
    #[case("12,75", CompareOp::Equal, 12.75)]
    #[case("100 rpm", CompareOp::Equal, 100.0)]
    fn test_parse_valid(#[case] input: &str, #[case] op: CompareOp, #[case] value: f64) {
        let expr: ValueExpression = input.parse().unwrap();
        assert_eq!(expr.op, op);
        assert_eq!(expr.value, value);
    }

    #[rstest]
    #[case("")]
    #[case("fast")]
    #[case(">= high")]
    #[case("1.2.3")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(input.parse::<ValueExpression>().is_err());
    }

    #[rstest]
    #[case("= 5", 5.0, true)]
    #[case("= 5", 5.1, false)]
    #[case(">= 5", 5.0, true)]
    #[case(">= 5", 4.9, false)]
    #[case("<= 5", 5.0, true)]
    #[case("<= 5", 5.1, false)]
    #[case("> 5", 5.0, false)]
    #[case("> 5", 5.1, true)]
    #[case("< 5", 4.9, true)]
    #[case("< 5", 5.0, false)]
    fn test_holds_for(#[case] expr: &str, #[case] actual: f64, #[case] expected: bool) {
        let expr: ValueExpression = expr.parse().unwrap();
        assert_eq!(expr.holds_for(actual), expected);
    }
}
