use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timeline::Timeline;

const REQUEST_PREFIX: &str = "REQ-";

/// Identifier wrapper for verification requests. Sequence-formatted ids sort by creation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{REQUEST_PREFIX}{sequence:06}"))
    }

    /// Numeric sequence of an id minted by `from_sequence`.
    pub fn sequence(&self) -> Option<u64> {
        self.0
            .strip_prefix(REQUEST_PREFIX)
            .and_then(|digits| digits.parse().ok())
    }
}

// Sequenced ids compare numerically so `REQ-1000000` follows `REQ-999999`. Foreign ids
// sort before them, by text.
impl Ord for RequestId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sequence()
            .cmp(&other.sequence())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for RequestId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for client and staff accounts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to an uploaded credential document (storage key or URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

/// Candidate facts captured at submission. Free text; the engine never validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFacts {
    pub name: String,
    pub institution: String,
    pub degree: String,
    pub graduation_year: String,
}

/// Inbound submission payload. A document without an attached result is analyzed before
/// the lifecycle sees it; neither means the officer decides the analysis stage by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionInput {
    pub candidate: CandidateFacts,
    #[serde(default)]
    pub document: Option<DocumentRef>,
    #[serde(default)]
    pub analysis: Option<AnalysisResult>,
}

/// Overall status of a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Draft,
    Pending,
    Processing,
    ReviewRequired,
    PendingClientAction,
    InstitutionOutreach,
    Verified,
    Rejected,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Draft => "draft",
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::ReviewRequired => "review_required",
            RequestStatus::PendingClientAction => "pending_client_action",
            RequestStatus::InstitutionOutreach => "institution_outreach",
            RequestStatus::Verified => "verified",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Verified | RequestStatus::Rejected)
    }

    /// Submitted requests that still await a decision.
    pub const fn is_in_progress(self) -> bool {
        matches!(
            self,
            RequestStatus::Pending
                | RequestStatus::Processing
                | RequestStatus::ReviewRequired
                | RequestStatus::PendingClientAction
                | RequestStatus::InstitutionOutreach
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Informal conclusion of institution outreach, used to pick the finalization branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationOutcome {
    Success,
    Failure,
}

/// Structured output of the document analysis collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub extracted_name: String,
    #[serde(default)]
    pub extracted_institution: String,
    #[serde(default)]
    pub extracted_degree: String,
    #[serde(default)]
    pub extracted_date: String,
    pub confidence_score: u8,
    #[serde(default)]
    pub authenticity_notes: String,
    pub is_tampered: bool,
}

impl AnalysisResult {
    /// Minimal result carrying only the routing-relevant fields.
    pub fn scored(confidence_score: u8, is_tampered: bool) -> Self {
        Self {
            extracted_name: String::new(),
            extracted_institution: String::new(),
            extracted_degree: String::new(),
            extracted_date: String::new(),
            confidence_score,
            authenticity_notes: String::new(),
            is_tampered,
        }
    }
}

/// One verification case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: RequestId,
    pub candidate: CandidateFacts,
    pub owner_id: AccountId,
    pub owner_name: String,
    pub status: RequestStatus,
    pub timeline: Timeline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_outcome: Option<VerificationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_report_note: Option<String>,
    #[serde(default)]
    pub manual_verification_requested: bool,
    pub submission_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl VerificationRequest {
    /// Bump `last_updated` without ever moving it backwards.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountRole {
    Client,
    VerificationOfficer,
    Admin,
}

impl AccountRole {
    /// Staff roles review work and are exempt from credit consumption.
    pub const fn is_staff(self) -> bool {
        matches!(self, AccountRole::VerificationOfficer | AccountRole::Admin)
    }

    pub const fn label(self) -> &'static str {
        match self {
            AccountRole::Client => "Client",
            AccountRole::VerificationOfficer => "Verification Officer",
            AccountRole::Admin => "Admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
}

/// Requesting organization or staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub organization: String,
    pub role: AccountRole,
    pub credits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_expiry: Option<DateTime<Utc>>,
    pub status: AccountStatus,
}

/// Details an administrator supplies when adding an account. The id is allocated by the
/// service and the account starts active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub organization: String,
    pub role: AccountRole,
    #[serde(default)]
    pub credits: u32,
}

impl NewAccount {
    pub fn into_account(self, id: AccountId) -> Account {
        Account {
            id,
            name: self.name,
            email: self.email,
            organization: self.organization,
            role: self.role,
            credits: self.credits,
            subscription_plan: None,
            subscription_expiry: None,
            status: AccountStatus::Active,
        }
    }
}

impl Account {
    pub fn has_unlimited_grant(&self, now: DateTime<Utc>) -> bool {
        self.subscription_expiry
            .map(|expiry| expiry > now)
            .unwrap_or(false)
    }
}

/// Purchasable allotment: a fixed number of credits or a time-boxed unlimited grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageCredits {
    Limited(u32),
    Unlimited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub price: u32,
    pub credits: PackageCredits,
    pub description: String,
}

/// Packages offered to client organizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageCatalog {
    packages: Vec<Package>,
}

impl PackageCatalog {
    pub fn new(packages: Vec<Package>) -> Self {
        Self { packages }
    }

    pub fn standard() -> Self {
        let package = |id: &str, name: &str, price, credits, description: &str| Package {
            id: id.to_string(),
            name: name.to_string(),
            price,
            credits,
            description: description.to_string(),
        };

        Self::new(vec![
            package(
                "STANDARD",
                "Standard",
                120,
                PackageCredits::Limited(1),
                "Perfect for one-off verification needs.",
            ),
            package(
                "CORPORATE_PLUS",
                "Corporate Plus",
                600,
                PackageCredits::Limited(5),
                "For small businesses with occasional hiring.",
            ),
            package(
                "CORPORATE_PRO",
                "Corporate Pro",
                1200,
                PackageCredits::Limited(10),
                "Ideal for growing teams and regular checks.",
            ),
            package(
                "ENTERPRISE",
                "Enterprise",
                2500,
                PackageCredits::Unlimited,
                "Unlimited access for high-volume institutions.",
            ),
        ])
    }

    pub fn find(&self, package_id: &str) -> Option<&Package> {
        self.packages.iter().find(|package| package.id == package_id)
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Appends `package`. Returns `false` and leaves the catalog alone when the id is taken.
    pub fn add(&mut self, package: Package) -> bool {
        if self.find(&package.id).is_some() {
            return false;
        }
        self.packages.push(package);
        true
    }

    /// Replaces the package with the same id in place.
    pub fn replace(&mut self, package: Package) -> bool {
        match self.packages.iter_mut().find(|existing| existing.id == package.id) {
            Some(existing) => {
                *existing = package;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, package_id: &str) -> Option<Package> {
        let index = self
            .packages
            .iter()
            .position(|package| package.id == package_id)?;
        Some(self.packages.remove(index))
    }
}

impl Default for PackageCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
