use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{Account, AccountId, AccountStatus, Package, PackageCredits};

/// Length of the unlimited grant bought with an unlimited package.
pub const UNLIMITED_GRANT_MONTHS: u32 = 12;

/// Result of checking whether an account may submit a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    InsufficientCredits,
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("account {0} has insufficient credits")]
    InsufficientCredits(AccountId),
    #[error("account {0} is suspended")]
    AccountSuspended(AccountId),
}

/// Credit and subscription accounting. Every operation returns a new account value and
/// leaves persistence to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountLedger;

impl AccountLedger {
    pub fn new() -> Self {
        Self
    }

    pub fn check_eligibility(&self, account: &Account, now: DateTime<Utc>) -> Eligibility {
        if account.status == AccountStatus::Suspended {
            return Eligibility::Suspended;
        }
        if self.is_exempt(account, now) || account.credits > 0 {
            return Eligibility::Eligible;
        }
        Eligibility::InsufficientCredits
    }

    /// Staff roles and holders of an unexpired unlimited grant never consume credits.
    pub fn is_exempt(&self, account: &Account, now: DateTime<Utc>) -> bool {
        account.role.is_staff() || account.has_unlimited_grant(now)
    }

    pub fn ensure_eligible(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        match self.check_eligibility(account, now) {
            Eligibility::Eligible => Ok(()),
            Eligibility::InsufficientCredits => {
                Err(LedgerError::InsufficientCredits(account.id.clone()))
            }
            Eligibility::Suspended => Err(LedgerError::AccountSuspended(account.id.clone())),
        }
    }

    /// Remove one credit. Fails without touching the account when it is ineligible or empty.
    pub fn debit_one(&self, account: &Account, now: DateTime<Utc>) -> Result<Account, LedgerError> {
        self.ensure_eligible(account, now)?;
        let credits = account
            .credits
            .checked_sub(1)
            .ok_or_else(|| LedgerError::InsufficientCredits(account.id.clone()))?;

        debug!(account_id = %account.id, remaining = credits, "debited one credit");
        Ok(Account {
            credits,
            ..account.clone()
        })
    }

    /// Charge one submission: eligibility check, then a debit unless the account is exempt.
    pub fn consume(&self, account: &Account, now: DateTime<Utc>) -> Result<Account, LedgerError> {
        self.ensure_eligible(account, now)?;
        if self.is_exempt(account, now) {
            return Ok(account.clone());
        }
        self.debit_one(account, now)
    }

    /// Apply a purchased package.
    pub fn grant(&self, account: &Account, package: &Package, now: DateTime<Utc>) -> Account {
        let mut updated = account.clone();
        updated.subscription_plan = Some(package.id.clone());

        match package.credits {
            PackageCredits::Unlimited => {
                let expiry = now
                    .checked_add_months(Months::new(UNLIMITED_GRANT_MONTHS))
                    .unwrap_or_else(|| now + chrono::Duration::days(365));
                updated.subscription_expiry = Some(expiry);
            }
            PackageCredits::Limited(credits) => {
                updated.credits = account.credits.saturating_add(credits);
                updated.subscription_expiry = None;
            }
        }

        updated
    }
}
