//! Mutating actions and the refresh that follows them.
//!
//! An action is awaited to completion. If it fails the user gets a blocking
//! notice and the view is left exactly as it was. If it succeeds the owning
//! view is fetched again, once.

use std::future::Future;

use crate::errors::{GymError, GymResult};
use crate::listing::{ListView, PageSource, Refresh};
use crate::structs::client::Client;
use crate::structs::{MemberId, PackageId, SubscribeRequest};

/// The prompts a front-end has to provide.
pub trait Interaction: Send + Sync {
    /// Blocking yes/no question. `false` cancels the action.
    fn confirm(&self, prompt: &str) -> bool;

    /// Blocking notice shown when an action fails.
    fn notify(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    Toggle,
    Subscribe,
}

impl MutationKind {
    /// Delete and toggle ask before any request is sent.
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, MutationKind::Delete | MutationKind::Toggle)
    }
}

/// Describes an action on a kind of record, e.g. deleting a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutation {
    pub kind: MutationKind,
    /// Human name of the record, e.g. `"member"`.
    pub subject: &'static str,
}

impl Mutation {
    pub const fn new(kind: MutationKind, subject: &'static str) -> Self {
        Self { kind, subject }
    }

    pub fn confirmation_prompt(&self) -> String {
        match self.kind {
            MutationKind::Toggle => {
                format!("Are you sure you want to change this {}'s status?", self.subject)
            }
            _ => format!("Are you sure you want to delete this {}?", self.subject),
        }
    }

    pub fn failure_notice(&self) -> String {
        match self.kind {
            MutationKind::Create => format!("Failed to create {}.", self.subject),
            MutationKind::Update => format!("Failed to update {}.", self.subject),
            MutationKind::Delete => format!("Failed to delete {}.", self.subject),
            MutationKind::Toggle => "Failed to toggle status.".to_string(),
            MutationKind::Subscribe => "Error updating subscription.".to_string(),
        }
    }

    /// Confirms if needed, awaits `action`, then refreshes `view` on success.
    ///
    /// `action` is only called after confirmation, so a declined prompt
    /// sends nothing.
    pub async fn run<S, F, Fut>(
        &self,
        view: &ListView<S>,
        ui: &dyn Interaction,
        action: F,
    ) -> MutationOutcome
    where
        S: PageSource,
        F: FnOnce() -> Fut,
        Fut: Future<Output = GymResult<()>>,
    {
        if self.kind.needs_confirmation() && !ui.confirm(&self.confirmation_prompt()) {
            tracing::debug!(kind = ?self.kind, subject = self.subject, "Action cancelled");
            return MutationOutcome::Cancelled;
        }

        match action().await {
            Ok(()) => {
                tracing::info!(kind = ?self.kind, subject = self.subject, "Action succeeded");
                MutationOutcome::Completed(view.refresh().await)
            }
            Err(err) => {
                tracing::warn!(kind = ?self.kind, subject = self.subject, error = %err, "Action failed");
                ui.notify(&self.failure_notice());
                MutationOutcome::Failed(err)
            }
        }
    }
}

#[derive(Debug)]
pub enum MutationOutcome {
    /// The action succeeded and the view was fetched again.
    Completed(Refresh),
    /// The user declined the confirmation. Nothing was sent.
    Cancelled,
    /// Not enough was selected to submit. Nothing was sent.
    Incomplete,
    /// The backend rejected the action. The view is unchanged.
    Failed(GymError),
}

impl MutationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, MutationOutcome::Completed(_))
    }
}

pub const SUBSCRIBE_MEMBER: Mutation = Mutation::new(MutationKind::Subscribe, "member");

/// Member/package pair picked in a table row before subscribing.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeSelection {
    member: Option<MemberId>,
    package: Option<PackageId>,
}

impl SubscribeSelection {
    /// Opens the plan picker on `member`. Any earlier package pick is dropped.
    pub fn begin(&mut self, member: MemberId) {
        self.member = Some(member);
        self.package = None;
    }

    /// Picks a package, or clears the pick with `None`.
    pub fn choose_package(&mut self, package: Option<PackageId>) {
        self.package = package;
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    pub fn member(&self) -> Option<MemberId> {
        self.member
    }

    pub fn is_editing(&self, member: MemberId) -> bool {
        self.member == Some(member)
    }

    /// The request to send, once both halves are chosen.
    pub fn request(&self) -> Option<SubscribeRequest> {
        Some(SubscribeRequest {
            member_id: self.member?,
            package_id: self.package?,
        })
    }

    /// Submits the selection. Does nothing until both member and package are
    /// chosen. Resets after success; kept as-is after a failure.
    pub async fn submit<S: PageSource>(
        &mut self,
        client: &Client,
        view: &ListView<S>,
        ui: &dyn Interaction,
    ) -> MutationOutcome {
        let Some(request) = self.request() else {
            return MutationOutcome::Incomplete;
        };

        let outcome = SUBSCRIBE_MEMBER
            .run(view, ui, || client.subscribe(&request))
            .await;
        if outcome.is_completed() {
            self.cancel();
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_delete_and_toggle_confirm() {
        assert!(MutationKind::Delete.needs_confirmation());
        assert!(MutationKind::Toggle.needs_confirmation());
        assert!(!MutationKind::Create.needs_confirmation());
        assert!(!MutationKind::Update.needs_confirmation());
        assert!(!MutationKind::Subscribe.needs_confirmation());
    }

    #[test]
    fn prompts_and_notices() {
        let delete = Mutation::new(MutationKind::Delete, "member");
        assert_eq!(
            delete.confirmation_prompt(),
            "Are you sure you want to delete this member?"
        );
        assert_eq!(delete.failure_notice(), "Failed to delete member.");
        assert_eq!(
            Mutation::new(MutationKind::Update, "user").failure_notice(),
            "Failed to update user."
        );
    }

    #[test]
    fn selection_needs_both_halves() {
        let mut selection = SubscribeSelection::default();
        assert_eq!(selection.request(), None);

        selection.begin(4);
        assert!(selection.is_editing(4));
        assert_eq!(selection.request(), None);

        selection.choose_package(Some(2));
        assert_eq!(
            selection.request(),
            Some(SubscribeRequest {
                member_id: 4,
                package_id: 2
            })
        );

        // switching rows drops the package pick
        selection.begin(5);
        assert_eq!(selection.request(), None);

        selection.cancel();
        assert_eq!(selection, SubscribeSelection::default());
    }
}
