//! Book instance (physical copy) model and its loan state machine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

use super::user::UserId;

/// Status discriminant, stored as a single character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatusKind {
    Maintenance,
    OnLoan,
    Available,
    Reserved,
}

impl LoanStatusKind {
    pub const ALL: [LoanStatusKind; 4] = [
        LoanStatusKind::Maintenance,
        LoanStatusKind::OnLoan,
        LoanStatusKind::Available,
        LoanStatusKind::Reserved,
    ];

    pub fn code(self) -> &'static str {
        match self {
            LoanStatusKind::Maintenance => "m",
            LoanStatusKind::OnLoan => "o",
            LoanStatusKind::Available => "a",
            LoanStatusKind::Reserved => "r",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "m" => Some(LoanStatusKind::Maintenance),
            "o" => Some(LoanStatusKind::OnLoan),
            "a" => Some(LoanStatusKind::Available),
            "r" => Some(LoanStatusKind::Reserved),
            _ => None,
        }
    }

    /// Statuses reachable in one step from `self`.
    ///
    /// Maintenance is reachable from everywhere; a copy leaves maintenance
    /// only by becoming available again.
    pub fn allowed_transitions(self) -> &'static [LoanStatusKind] {
        match self {
            LoanStatusKind::Maintenance => &[LoanStatusKind::Available],
            LoanStatusKind::Available => &[
                LoanStatusKind::Maintenance,
                LoanStatusKind::Reserved,
                LoanStatusKind::OnLoan,
            ],
            LoanStatusKind::Reserved => &[
                LoanStatusKind::Maintenance,
                LoanStatusKind::Available,
                LoanStatusKind::OnLoan,
            ],
            LoanStatusKind::OnLoan => &[LoanStatusKind::Maintenance, LoanStatusKind::Available],
        }
    }

    pub fn can_transition_to(self, to: LoanStatusKind) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

impl std::fmt::Display for LoanStatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LoanStatusKind::Maintenance => "Maintenance",
            LoanStatusKind::OnLoan => "On loan",
            LoanStatusKind::Available => "Available",
            LoanStatusKind::Reserved => "Reserved",
        };
        write!(f, "{}", label)
    }
}

/// Loan status of a copy. Fields only exist in the state that needs them,
/// so a copy on loan always has a borrower and a due date.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoanStatus {
    #[default]
    Maintenance,
    OnLoan {
        borrower: UserId,
        due_back: NaiveDate,
    },
    Available,
    Reserved,
}

impl LoanStatus {
    pub fn kind(&self) -> LoanStatusKind {
        match self {
            LoanStatus::Maintenance => LoanStatusKind::Maintenance,
            LoanStatus::OnLoan { .. } => LoanStatusKind::OnLoan,
            LoanStatus::Available => LoanStatusKind::Available,
            LoanStatus::Reserved => LoanStatusKind::Reserved,
        }
    }

    pub fn borrower(&self) -> Option<UserId> {
        match self {
            LoanStatus::OnLoan { borrower, .. } => Some(*borrower),
            _ => None,
        }
    }

    pub fn due_back(&self) -> Option<NaiveDate> {
        match self {
            LoanStatus::OnLoan { due_back, .. } => Some(*due_back),
            _ => None,
        }
    }

    /// Build the status for a kind that carries no loan data
    pub fn without_loan(kind: LoanStatusKind) -> Option<Self> {
        match kind {
            LoanStatusKind::Maintenance => Some(LoanStatus::Maintenance),
            LoanStatusKind::Available => Some(LoanStatus::Available),
            LoanStatusKind::Reserved => Some(LoanStatus::Reserved),
            LoanStatusKind::OnLoan => None,
        }
    }
}

/// True iff a due date exists and `today` is strictly after it.
pub fn compute_overdue(due_back: Option<NaiveDate>, today: NaiveDate) -> bool {
    due_back.map(|due| today > due).unwrap_or(false)
}

/// One loanable copy of a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookInstance {
    pub id: Uuid,
    pub book_id: Option<i32>,
    pub imprint: String,
    #[serde(flatten)]
    pub status: LoanStatus,
    /// Incremented on every write, used to reject stale updates
    pub version: i32,
}

impl BookInstance {
    pub fn new(book_id: Option<i32>, imprint: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            imprint,
            status: LoanStatus::default(),
            version: 0,
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        compute_overdue(self.status.due_back(), today)
    }

    /// Move to `next` if the transition table allows it
    pub fn transition(&mut self, next: LoanStatus) -> AppResult<()> {
        let from = self.status.kind();
        let to = next.kind();
        if !from.can_transition_to(to) {
            return Err(AppError::IllegalTransition { from, to });
        }
        self.status = next;
        Ok(())
    }

    /// Replace the due date of a running loan, keeping the borrower
    pub fn extend_loan(&mut self, new_due_back: NaiveDate) -> AppResult<()> {
        match &mut self.status {
            LoanStatus::OnLoan { due_back, .. } => {
                *due_back = new_due_back;
                Ok(())
            }
            _ => Err(AppError::NotOnLoan(self.id)),
        }
    }
}

/// A copy as shown to anyone browsing the catalog: its status and due
/// date, never who holds it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublicCopy {
    pub id: Uuid,
    pub book_id: Option<i32>,
    pub imprint: String,
    pub status: LoanStatusKind,
    pub due_back: Option<NaiveDate>,
    pub version: i32,
}

impl From<BookInstance> for PublicCopy {
    fn from(instance: BookInstance) -> Self {
        Self {
            id: instance.id,
            book_id: instance.book_id,
            imprint: instance.imprint,
            status: instance.status.kind(),
            due_back: instance.status.due_back(),
            version: instance.version,
        }
    }
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct BookInstanceRow {
    pub id: Uuid,
    pub book_id: Option<i32>,
    pub imprint: String,
    pub status: String,
    pub borrower_id: Option<i32>,
    pub due_back: Option<NaiveDate>,
    pub version: i32,
}

impl TryFrom<BookInstanceRow> for BookInstance {
    type Error = AppError;

    fn try_from(row: BookInstanceRow) -> Result<Self, Self::Error> {
        let kind = LoanStatusKind::from_code(&row.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown status code {:?} on instance {}", row.status, row.id))
        })?;

        let status = match (kind, row.borrower_id, row.due_back) {
            (LoanStatusKind::OnLoan, Some(borrower), Some(due_back)) => {
                LoanStatus::OnLoan { borrower, due_back }
            }
            (LoanStatusKind::OnLoan, _, _) => {
                return Err(AppError::Internal(format!(
                    "Instance {} is on loan without borrower or due date",
                    row.id
                )))
            }
            (other, _, _) => LoanStatus::without_loan(other).unwrap_or_default(),
        };

        Ok(BookInstance {
            id: row.id,
            book_id: row.book_id,
            imprint: row.imprint,
            status,
            version: row.version,
        })
    }
}

/// A copy paired with its book title, as returned by loan listings
#[derive(Debug, Clone)]
pub struct TitledInstance {
    pub instance: BookInstance,
    pub book_title: Option<String>,
}

/// Loan listing entry with overdue state computed for the requested day
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanedCopy {
    #[serde(flatten)]
    pub instance: BookInstance,
    pub book_title: Option<String>,
    pub is_overdue: bool,
}

impl LoanedCopy {
    pub fn new(entry: TitledInstance, today: NaiveDate) -> Self {
        let is_overdue = entry.instance.is_overdue(today);
        Self {
            instance: entry.instance,
            book_title: entry.book_title,
            is_overdue,
        }
    }
}

/// Create or update a copy's catalog data (status is handled separately)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInstanceInput {
    #[validate(length(min = 1, max = 200, message = "Imprint must be 1-200 characters"))]
    pub imprint: String,
    /// Book the copy belongs to. Ignored on create, where the path gives it.
    pub book_id: Option<i32>,
}

/// Status change request for non-loan statuses
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetStatusRequest {
    pub status: LoanStatusKind,
    /// Version the caller last saw; the change is refused if the copy moved on
    #[serde(default)]
    pub version: Option<i32>,
}

/// Checkout request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub borrower: UserId,
    /// Defaults to the proposed renewal date (two weeks from today)
    pub due_back: Option<NaiveDate>,
    #[serde(default)]
    pub version: Option<i32>,
}

/// Renewal request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RenewRequest {
    pub due_back: NaiveDate,
    #[serde(default)]
    pub version: Option<i32>,
}

/// `?version=` on requests without a body
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct VersionQuery {
    pub version: Option<i32>,
}

/// Pre-filled renewal form
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RenewalProposal {
    pub instance: BookInstance,
    pub book_title: Option<String>,
    pub proposed_due_back: NaiveDate,
}
