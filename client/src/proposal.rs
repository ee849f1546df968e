//! Proposal lifecycle status as reported by the on-chain program.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current on-chain lifecycle stage of one proposal.
///
/// `None` means no proposal account exists yet for the transaction index.
/// The value is always read from the ledger and never mutated locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// No proposal account exists
    None,
    /// Created as a draft, not yet open for voting
    Draft,
    /// Open for voting
    Active,
    /// Reached the approval threshold
    Approved,
    /// Reached the rejection cutoff
    Rejected,
    /// Execution in progress
    Executing,
    /// Executed
    Executed,
    /// Cancelled after approval
    Cancelled,
}

impl ProposalStatus {
    /// All variants, in lifecycle order
    pub const ALL: [ProposalStatus; 8] = [
        ProposalStatus::None,
        ProposalStatus::Draft,
        ProposalStatus::Active,
        ProposalStatus::Approved,
        ProposalStatus::Rejected,
        ProposalStatus::Executing,
        ProposalStatus::Executed,
        ProposalStatus::Cancelled,
    ];

    /// Whether an approval may be composed for this status.
    ///
    /// `Approved`, `Rejected`, `Executing`, `Executed` and `Cancelled` are
    /// terminal or invalid for approval.
    pub fn is_approvable(&self) -> bool {
        matches!(
            self,
            ProposalStatus::None | ProposalStatus::Draft | ProposalStatus::Active
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::None => "None",
            ProposalStatus::Draft => "Draft",
            ProposalStatus::Active => "Active",
            ProposalStatus::Approved => "Approved",
            ProposalStatus::Rejected => "Rejected",
            ProposalStatus::Executing => "Executing",
            ProposalStatus::Executed => "Executed",
            ProposalStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProposalStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown proposal status: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ProposalStatus::None, true)]
    #[test_case(ProposalStatus::Draft, true)]
    #[test_case(ProposalStatus::Active, true)]
    #[test_case(ProposalStatus::Approved, false)]
    #[test_case(ProposalStatus::Rejected, false)]
    #[test_case(ProposalStatus::Executing, false)]
    #[test_case(ProposalStatus::Executed, false)]
    #[test_case(ProposalStatus::Cancelled, false)]
    fn test_is_approvable(status: ProposalStatus, expected: bool) {
        assert_eq!(status.is_approvable(), expected);
    }

    #[test]
    fn test_display_parses_back() {
        for status in ProposalStatus::ALL {
            assert_eq!(status.to_string().parse::<ProposalStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_unknown_status() {
        assert!("Pending".parse::<ProposalStatus>().is_err());
    }
}
