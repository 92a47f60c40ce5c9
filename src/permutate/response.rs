//! Scalar responses reduced from an output column.
//!
//! A response is written either as a bare column name (`STRESS_XX`, the
//! final value) or as `<reduction>(<column>)`, e.g. `absmax(STRESS_XX)`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    #[default]
    Last,
    Max,
    Min,
    Mean,
    AbsMax,
    AbsMin,
}

impl Reduction {
    pub const ALL: [Reduction; 6] = [
        Reduction::Last,
        Reduction::Max,
        Reduction::Min,
        Reduction::Mean,
        Reduction::AbsMax,
        Reduction::AbsMin,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Reduction::Last => "last",
            Reduction::Max => "max",
            Reduction::Min => "min",
            Reduction::Mean => "mean",
            Reduction::AbsMax => "absmax",
            Reduction::AbsMin => "absmin",
        }
    }

    /// `None` for an empty column.
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        let first = *values.first()?;
        let folded = match self {
            Reduction::Last => *values.last()?,
            Reduction::Max => values.iter().copied().fold(first, f64::max),
            Reduction::Min => values.iter().copied().fold(first, f64::min),
            Reduction::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reduction::AbsMax => values.iter().fold(0.0, |acc: f64, v| acc.max(v.abs())),
            Reduction::AbsMin => values.iter().fold(first.abs(), |acc: f64, v| acc.min(v.abs())),
        };
        Some(folded)
    }
}

impl FromStr for Reduction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        // `ave` is accepted as an alias of `mean`
        if lower == "ave" {
            return Ok(Reduction::Mean);
        }
        Reduction::ALL
            .into_iter()
            .find(|r| r.name() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> = Reduction::ALL.iter().map(|r| r.name()).collect();
                format!("unknown reduction '{s}', expected one of {}", names.join(", "))
            })
    }
}

/// One response column of a permutation study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResponseSpec {
    pub column: String,
    pub reduction: Reduction,
}

impl ResponseSpec {
    pub fn last(column: &str) -> Self {
        Self {
            column: column.to_string(),
            reduction: Reduction::Last,
        }
    }
}

impl FromStr for ResponseSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (reduction, column) = match s.split_once('(') {
            Some((func, rest)) => {
                let column = rest
                    .strip_suffix(')')
                    .ok_or_else(|| format!("response '{s}' is missing a closing ')'"))?;
                (func.parse::<Reduction>()?, column.trim())
            }
            None => (Reduction::Last, s),
        };
        if column.is_empty() || column.contains(|c: char| c.is_whitespace() || "()".contains(c)) {
            return Err(format!("response '{s}' does not name a single output column"));
        }
        Ok(Self {
            column: column.to_string(),
            reduction,
        })
    }
}

impl TryFrom<String> for ResponseSpec {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ResponseSpec> for String {
    fn from(r: ResponseSpec) -> Self {
        r.to_string()
    }
}

impl fmt::Display for ResponseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reduction {
            Reduction::Last => write!(f, "{}", self.column),
            r => write!(f, "{}({})", r.name(), self.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reductions_over_a_column() {
        let col = [1.0, -4.0, 2.5, -0.5];
        assert_eq!(Reduction::Last.apply(&col), Some(-0.5));
        assert_eq!(Reduction::Max.apply(&col), Some(2.5));
        assert_eq!(Reduction::Min.apply(&col), Some(-4.0));
        assert_eq!(Reduction::Mean.apply(&col), Some(-0.25));
        assert_eq!(Reduction::AbsMax.apply(&col), Some(4.0));
        assert_eq!(Reduction::AbsMin.apply(&col), Some(0.5));
        assert_eq!(Reduction::Max.apply(&[]), None);
    }

    #[test]
    fn bare_and_reduced_names_parse() {
        let bare: ResponseSpec = "STRESS_XX".parse().unwrap();
        assert_eq!(bare, ResponseSpec::last("STRESS_XX"));
        assert_eq!(bare.to_string(), "STRESS_XX");

        let reduced: ResponseSpec = "AbsMax( STRESS_XX )".parse().unwrap();
        assert_eq!(reduced.reduction, Reduction::AbsMax);
        assert_eq!(reduced.column, "STRESS_XX");
        assert_eq!(reduced.to_string(), "absmax(STRESS_XX)");

        assert_eq!("ave(PRES)".parse::<ResponseSpec>().unwrap().reduction, Reduction::Mean);
        assert!("median(PRES)".parse::<ResponseSpec>().is_err());
        assert!("max(PRES".parse::<ResponseSpec>().is_err());
        assert!("max()".parse::<ResponseSpec>().is_err());
    }

    #[test]
    fn responses_deserialize_from_strings() {
        let specs: Vec<ResponseSpec> = serde_json::from_str(r#"["STRESS_XX", "min(STRAIN_YY)"]"#).unwrap();
        assert_eq!(specs[0].reduction, Reduction::Last);
        assert_eq!(specs[1].reduction, Reduction::Min);
        assert!(serde_json::from_str::<Vec<ResponseSpec>>(r#"["nope(X)"]"#).is_err());
        assert_eq!(serde_json::to_string(&specs).unwrap(), r#"["STRESS_XX","min(STRAIN_YY)"]"#);
    }
}
