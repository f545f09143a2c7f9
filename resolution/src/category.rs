//! Ticket categories: the closed set every classifier must map into.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Support categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Payment, refunds, subscription, pricing
    Billing,
    /// API, integration, bugs, performance
    Technical,
    /// Authentication, permissions, data security
    Security,
    /// Account management, general questions
    General,
}

/// A label outside the closed category set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category: {0:?}")]
pub struct UnknownCategory(pub String);

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 4] = [
        Category::Billing,
        Category::Technical,
        Category::Security,
        Category::General,
    ];

    /// Categories searched when the primary collection comes up short.
    pub fn related(self) -> &'static [Category] {
        match self {
            Self::Billing => &[Self::General],
            Self::Technical => &[Self::General, Self::Security],
            Self::Security => &[Self::Technical, Self::General],
            Self::General => &[Self::Billing, Self::Technical, Self::Security],
        }
    }

    /// Lower-case slug, used for knowledge-base file names.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::Technical => "technical",
            Self::Security => "security",
            Self::General => "general",
        }
    }

    /// Category-specific closing line for customer-facing replies.
    pub fn closing(self) -> &'static str {
        match self {
            Self::Billing => {
                "If you have any additional billing questions, please don't hesitate to reach out."
            }
            Self::Technical => {
                "If you continue to experience technical difficulties, please contact our technical support team."
            }
            Self::Security => {
                "For any additional security concerns, please contact our security team immediately."
            }
            Self::General => "If you need any further assistance, please feel free to contact us.",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Billing => write!(f, "Billing"),
            Self::Technical => write!(f, "Technical"),
            Self::Security => write!(f, "Security"),
            Self::General => write!(f, "General"),
        }
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Exact label match, ignoring case and surrounding whitespace or
    /// punctuation. Anything else is an error, never a default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().trim_matches(|c: char| !c.is_alphanumeric());
        Self::ALL
            .into_iter()
            .find(|category| category.slug().eq_ignore_ascii_case(label))
            .ok_or_else(|| UnknownCategory(s.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        assert_eq!("Billing".parse::<Category>().unwrap(), Category::Billing);
        assert_eq!(" technical\n".parse::<Category>().unwrap(), Category::Technical);
        assert_eq!("SECURITY.".parse::<Category>().unwrap(), Category::Security);
        assert_eq!("**General**".parse::<Category>().unwrap(), Category::General);
    }

    #[test]
    fn test_parse_rejects_out_of_enum() {
        let err = "Sales".parse::<Category>().unwrap_err();
        assert_eq!(err, UnknownCategory("Sales".into()));
        assert!("".parse::<Category>().is_err());
        assert!("Billing and Technical".parse::<Category>().is_err());
    }

    #[test]
    fn test_related_never_contains_self() {
        for category in Category::ALL {
            assert!(!category.related().contains(&category));
        }
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
        }
    }
}
