//! Review type and severity vocabulary shared by prompts, context and output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of review requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewType {
    /// Low-effort, high-impact fixes.
    #[default]
    QuickFixes,
    Architectural,
    Security,
    Performance,
    UnusedCode,
    BestPractices,
    /// Holistic assessment of code quality and developer skill.
    Evaluation,
}

impl ReviewType {
    pub const ALL: [ReviewType; 7] = [
        ReviewType::QuickFixes,
        ReviewType::Architectural,
        ReviewType::Security,
        ReviewType::Performance,
        ReviewType::UnusedCode,
        ReviewType::BestPractices,
        ReviewType::Evaluation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickFixes => "quick-fixes",
            Self::Architectural => "architectural",
            Self::Security => "security",
            Self::Performance => "performance",
            Self::UnusedCode => "unused-code",
            Self::BestPractices => "best-practices",
            Self::Evaluation => "evaluation",
        }
    }

    /// Human-readable title used in prompts and reports.
    pub fn title(&self) -> &'static str {
        match self {
            Self::QuickFixes => "Quick Fixes Review",
            Self::Architectural => "Architectural Review",
            Self::Security => "Security Review",
            Self::Performance => "Performance Review",
            Self::UnusedCode => "Unused Code Review",
            Self::BestPractices => "Best Practices Review",
            Self::Evaluation => "Code Evaluation",
        }
    }
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                anyhow::anyhow!(
                    "Invalid review type '{}'. Valid values: {}",
                    s,
                    valid.join(", ")
                )
            })
    }
}

/// Severity of a finding or issue.
///
/// Ordered from most to least severe. Model output is parsed leniently:
/// `error`/`blocker` read as critical, `warning` as medium, unknown as medium.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Weight used when ranking digest entries; higher survives truncation longer.
    pub fn weight(&self) -> u8 {
        match self {
            Self::Critical => 9,
            Self::High => 8,
            Self::Medium => 6,
            Self::Low => 4,
            Self::Info => 3,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Critical => "🔴",
            Self::High => "🟠",
            Self::Medium => "🟡",
            Self::Low => "🔵",
            Self::Info => "⚪",
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "critical" | "blocker" | "error" => Self::Critical,
            "high" | "major" => Self::High,
            "low" | "minor" => Self::Low,
            "info" | "note" | "informational" => Self::Info,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_type_round_trip_through_str() {
        for review_type in ReviewType::ALL {
            assert_eq!(review_type.as_str().parse::<ReviewType>().unwrap(), review_type);
        }
        assert_eq!(
            "Best_Practices".parse::<ReviewType>().unwrap(),
            ReviewType::BestPractices
        );
    }

    #[test]
    fn test_review_type_invalid_lists_choices() {
        let err = "style".parse::<ReviewType>().unwrap_err().to_string();
        assert!(err.contains("quick-fixes"));
        assert!(err.contains("style"));
    }

    #[test]
    fn test_review_type_serde_kebab_case() {
        let json = serde_json::to_string(&ReviewType::UnusedCode).unwrap();
        assert_eq!(json, "\"unused-code\"");
    }

    #[test]
    fn test_severity_lenient_parsing() {
        let parse = |s: &str| -> Severity { serde_json::from_str(&format!("\"{}\"", s)).unwrap() };
        assert_eq!(parse("HIGH"), Severity::High);
        assert_eq!(parse("error"), Severity::Critical);
        assert_eq!(parse("warning"), Severity::Medium);
        assert_eq!(parse("something-else"), Severity::Medium);
        assert_eq!(parse("note"), Severity::Info);
    }

    #[test]
    fn test_severity_ordering_and_weight() {
        assert!(Severity::Critical < Severity::Low);
        assert!(Severity::Critical.weight() > Severity::High.weight());
        assert!(Severity::Low.weight() > Severity::Info.weight());
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
    }
}
