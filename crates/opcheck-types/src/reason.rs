//! The fixed reason-for-check enumeration accepted on the submit endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text"))]
pub enum ReasonForCheck {
    #[serde(rename = "Client Onboarding")]
    #[cfg_attr(feature = "database", sqlx(rename = "Client Onboarding"))]
    ClientOnboarding,
    #[serde(rename = "Claim Payment")]
    #[cfg_attr(feature = "database", sqlx(rename = "Claim Payment"))]
    ClaimPayment,
    #[serde(rename = "Business Partner Payment")]
    #[cfg_attr(feature = "database", sqlx(rename = "Business Partner Payment"))]
    BusinessPartnerPayment,
    #[serde(rename = "Business Partner Due Diligence")]
    #[cfg_attr(
        feature = "database",
        sqlx(rename = "Business Partner Due Diligence")
    )]
    BusinessPartnerDueDiligence,
    #[serde(rename = "Periodic Re-Screen")]
    #[cfg_attr(feature = "database", sqlx(rename = "Periodic Re-Screen"))]
    PeriodicReScreen,
    #[serde(rename = "Ad-Hoc Compliance Review")]
    #[cfg_attr(feature = "database", sqlx(rename = "Ad-Hoc Compliance Review"))]
    AdHocComplianceReview,
}

impl ReasonForCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientOnboarding => "Client Onboarding",
            Self::ClaimPayment => "Claim Payment",
            Self::BusinessPartnerPayment => "Business Partner Payment",
            Self::BusinessPartnerDueDiligence => "Business Partner Due Diligence",
            Self::PeriodicReScreen => "Periodic Re-Screen",
            Self::AdHocComplianceReview => "Ad-Hoc Compliance Review",
        }
    }
}

impl fmt::Display for ReasonForCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized reason_for_check: {0}")]
pub struct UnknownReason(String);

impl FromStr for ReasonForCheck {
    type Err = UnknownReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Client Onboarding" => Ok(Self::ClientOnboarding),
            "Claim Payment" => Ok(Self::ClaimPayment),
            "Business Partner Payment" => Ok(Self::BusinessPartnerPayment),
            "Business Partner Due Diligence" => Ok(Self::BusinessPartnerDueDiligence),
            "Periodic Re-Screen" => Ok(Self::PeriodicReScreen),
            "Ad-Hoc Compliance Review" => Ok(Self::AdHocComplianceReview),
            other => Err(UnknownReason(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_enumerated_reason() {
        for s in [
            "Client Onboarding",
            "Claim Payment",
            "Business Partner Payment",
            "Business Partner Due Diligence",
            "Periodic Re-Screen",
            "Ad-Hoc Compliance Review",
        ] {
            let parsed: ReasonForCheck = s.parse().expect("should parse");
            assert_eq!(parsed.as_str(), s);
        }
    }

    #[test]
    fn rejects_unknown_reason() {
        assert!("Vibes".parse::<ReasonForCheck>().is_err());
    }
}
