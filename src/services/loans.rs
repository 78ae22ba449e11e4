//! Loan lifecycle: checkout, renewal, return and status changes

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book_instance::RenewalProposal, Actor, BookInstance, LoanStatus, LoanStatusKind,
        Permission, UserId,
    },
    repository::{BookStore, InstanceStore, SharedStore, UserStore},
};

use super::{auth::SharedAuthorizer, renewal::RenewalPolicy};

#[derive(Clone)]
pub struct LoansService {
    store: SharedStore,
    authorizer: SharedAuthorizer,
    policy: RenewalPolicy,
}

impl LoansService {
    pub fn new(store: SharedStore, authorizer: SharedAuthorizer, policy: RenewalPolicy) -> Self {
        Self { store, authorizer, policy }
    }

    /// Load a copy, pinning the version the caller expects to overwrite
    async fn load(&self, id: Uuid, expected_version: Option<i32>) -> AppResult<BookInstance> {
        let mut instance = self.store.get_instance(id).await?;
        if let Some(version) = expected_version {
            instance.version = version;
        }
        Ok(instance)
    }

    /// Lend a copy to `borrower`. Without a due date the default loan
    /// period applies; an explicit one must fall inside the renewal window.
    pub async fn mark_on_loan(
        &self,
        actor: &Actor,
        id: Uuid,
        borrower: UserId,
        due_back: Option<NaiveDate>,
        expected_version: Option<i32>,
        today: NaiveDate,
    ) -> AppResult<BookInstance> {
        self.authorizer.require(actor, Permission::CanMarkReturned)?;

        let mut instance = self.load(id, expected_version).await?;
        self.store.get_user(borrower).await?;

        let due_back = match due_back {
            Some(date) => self.policy.validate(date, today)?,
            None => self.policy.proposed_due_back(today),
        };

        instance.transition(LoanStatus::OnLoan { borrower, due_back })?;
        let saved = self.store.update_instance(&instance).await?;

        tracing::info!(
            instance_id = %id,
            borrower,
            %due_back,
            by = actor.user_id,
            "Book instance checked out"
        );
        Ok(saved)
    }

    /// Move the due date of a running loan
    pub async fn renew(
        &self,
        actor: &Actor,
        id: Uuid,
        new_due_back: NaiveDate,
        expected_version: Option<i32>,
        today: NaiveDate,
    ) -> AppResult<BookInstance> {
        self.authorizer.require(actor, Permission::CanMarkReturned)?;

        let mut instance = self.load(id, expected_version).await?;
        if instance.status.kind() != LoanStatusKind::OnLoan {
            return Err(AppError::NotOnLoan(id));
        }

        let due_back = self.policy.validate(new_due_back, today)?;
        instance.extend_loan(due_back)?;
        let saved = self.store.update_instance(&instance).await?;

        tracing::info!(instance_id = %id, %due_back, by = actor.user_id, "Loan renewed");
        Ok(saved)
    }

    /// Current loan plus the pre-filled renewal date
    pub async fn renewal_proposal(
        &self,
        actor: &Actor,
        id: Uuid,
        today: NaiveDate,
    ) -> AppResult<RenewalProposal> {
        self.authorizer.require(actor, Permission::CanMarkReturned)?;

        let instance = self.store.get_instance(id).await?;
        if instance.status.kind() != LoanStatusKind::OnLoan {
            return Err(AppError::NotOnLoan(id));
        }

        let book_title = match instance.book_id {
            Some(book_id) => Some(self.store.get_book(book_id).await?.title),
            None => None,
        };

        Ok(RenewalProposal {
            instance,
            book_title,
            proposed_due_back: self.policy.proposed_due_back(today),
        })
    }

    /// Take a copy back; it becomes available again
    pub async fn mark_returned(
        &self,
        actor: &Actor,
        id: Uuid,
        expected_version: Option<i32>,
    ) -> AppResult<BookInstance> {
        self.authorizer.require(actor, Permission::CanMarkReturned)?;

        let mut instance = self.load(id, expected_version).await?;
        let borrower = instance.status.borrower().ok_or(AppError::NotOnLoan(id))?;

        instance.transition(LoanStatus::Available)?;
        let saved = self.store.update_instance(&instance).await?;

        tracing::info!(instance_id = %id, borrower, by = actor.user_id, "Book instance returned");
        Ok(saved)
    }

    /// Move a copy to maintenance, available or reserved
    pub async fn set_status(
        &self,
        actor: &Actor,
        id: Uuid,
        target: LoanStatusKind,
        expected_version: Option<i32>,
    ) -> AppResult<BookInstance> {
        self.authorizer.require(actor, Permission::ChangeBookinstance)?;

        let next = LoanStatus::without_loan(target).ok_or_else(|| {
            AppError::Validation("Use checkout to put a copy on loan".to_string())
        })?;

        let mut instance = self.load(id, expected_version).await?;
        let from = instance.status.kind();
        instance.transition(next)?;
        let saved = self.store.update_instance(&instance).await?;

        tracing::info!(instance_id = %id, %from, to = %target, by = actor.user_id, "Status changed");
        Ok(saved)
    }
}
