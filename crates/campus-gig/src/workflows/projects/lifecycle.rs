//! Project state machine.
//!
//! ```text
//! draft ──▶ pending_review ──▶ open ──▶ in_progress ──▶ completed
//!                 │  ▲           │           │
//!                 ▼  │           ▼           ▼
//!              rejected       cancelled   cancelled
//! ```
//!
//! University postings enter directly at `open`. `open → in_progress` is only taken
//! when an application is accepted.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{
    Actor, EligibilityCriteria, PaymentType, Project, ProjectDraft, ProjectId, ProjectOwner,
    ProjectRevision, ProjectStatus, ProjectTransition, ReviewDecision, TeamPolicy, UniversityId,
};
use super::errors::{AuthorizationError, ProjectError, StateError, ValidationError};
use super::milestones::{is_project_complete, ledger_summary};
use super::repository::ProjectRecord;

const MAX_GPA: f32 = 10.0;
const DEFAULT_REJECTION_REASON: &str = "No reason provided";

impl ProjectStatus {
    pub const fn allowed_transitions(self) -> &'static [ProjectStatus] {
        match self {
            ProjectStatus::Draft => &[ProjectStatus::PendingReview],
            ProjectStatus::PendingReview => &[ProjectStatus::Open, ProjectStatus::Rejected],
            ProjectStatus::Rejected => &[ProjectStatus::PendingReview],
            ProjectStatus::Open => &[ProjectStatus::InProgress, ProjectStatus::Cancelled],
            ProjectStatus::InProgress => &[ProjectStatus::Completed, ProjectStatus::Cancelled],
            ProjectStatus::Completed | ProjectStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: ProjectStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

/// Build a new project for `actor`.
///
/// Company postings start as drafts awaiting submission. University postings are
/// auto-approved and open immediately without passing through review.
pub(crate) fn create_project(
    actor: &Actor,
    id: ProjectId,
    draft: ProjectDraft,
    now: DateTime<Utc>,
) -> Result<Project, ProjectError> {
    validate_fields(&draft.title, draft.team, &draft.eligibility, draft.duration_weeks)?;

    match actor {
        Actor::Company(company) => {
            let university = draft.university.clone().ok_or_else(|| {
                ValidationError::InvalidField {
                    field: "university",
                    reason: "company postings must target a university".to_string(),
                }
            })?;
            let owner = ProjectOwner::Company(company.clone());
            let mut project = Project::from_draft(id, owner, university, draft, now);
            project.record_entry(ProjectStatus::Draft, actor, now, None);
            Ok(project)
        }
        Actor::University(university) => {
            if let Some(target) = &draft.university {
                if target != university {
                    return Err(ValidationError::InvalidField {
                        field: "university",
                        reason: format!("universities can only post to themselves, not {target}"),
                    }
                    .into());
                }
            }
            let owner = ProjectOwner::University(university.clone());
            let mut project = Project::from_draft(id, owner, university.clone(), draft, now);
            project.approved_at = Some(now);
            project.record_entry(
                ProjectStatus::Open,
                actor,
                now,
                Some("auto-approved: posted by university".to_string()),
            );
            Ok(project)
        }
        Actor::Student(_) => Err(AuthorizationError::new(actor, "post projects").into()),
    }
}

fn validate_fields(
    title: &str,
    team: TeamPolicy,
    eligibility: &EligibilityCriteria,
    duration_weeks: u16,
) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "title",
            reason: "must not be empty".to_string(),
        });
    }
    if team.capacity() == 0 {
        return Err(ValidationError::InvalidField {
            field: "team.size",
            reason: "team projects need at least one seat".to_string(),
        });
    }
    if let Some(min_gpa) = eligibility.min_gpa {
        if !min_gpa.is_finite() || !(0.0..=MAX_GPA).contains(&min_gpa) {
            return Err(ValidationError::InvalidField {
                field: "eligibility.min_gpa",
                reason: format!("must be between 0 and {MAX_GPA}"),
            });
        }
    }
    if duration_weeks == 0 {
        return Err(ValidationError::InvalidField {
            field: "duration_weeks",
            reason: "must be at least one week".to_string(),
        });
    }
    Ok(())
}

impl Project {
    fn from_draft(
        id: ProjectId,
        owner: ProjectOwner,
        university: UniversityId,
        draft: ProjectDraft,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            university,
            title: draft.title.trim().to_string(),
            domain: draft.domain,
            description: draft.description,
            required_skills: draft.required_skills,
            team: draft.team,
            job_type: draft.job_type,
            eligibility: draft.eligibility,
            payment_type: draft.payment_type,
            payment_amount: draft.payment_amount,
            duration_weeks: draft.duration_weeks,
            deadline: draft.deadline,
            attachment: draft.attachment,
            status: ProjectStatus::Draft,
            rejection_reason: None,
            assigned_students: BTreeSet::new(),
            created_at: now,
            submitted_for_review_at: None,
            approved_at: None,
            completed_at: None,
            history: Vec::new(),
        }
    }

    fn record_entry(
        &mut self,
        status: ProjectStatus,
        actor: &Actor,
        now: DateTime<Utc>,
        note: Option<String>,
    ) {
        self.status = status;
        self.history.push(ProjectTransition {
            from: None,
            to: status,
            actor: actor.clone(),
            at: now,
            note,
        });
        info!(project_id = %self.id, status = %status, actor = %actor, "project created");
    }

    pub(crate) fn ensure_owner(
        &self,
        actor: &Actor,
        action: &'static str,
    ) -> Result<(), AuthorizationError> {
        if self.owner.is_actor(actor) {
            Ok(())
        } else {
            Err(AuthorizationError::new(actor, action))
        }
    }

    /// Apply one edge of the state machine and append it to the history.
    pub(crate) fn advance(
        &mut self,
        to: ProjectStatus,
        actor: &Actor,
        now: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<(), StateError> {
        let from = self.status;
        if !from.can_transition_to(to) {
            return Err(StateError::Project { from, to });
        }

        match to {
            ProjectStatus::PendingReview => {
                self.submitted_for_review_at = Some(now);
                self.rejection_reason = None;
            }
            ProjectStatus::Open => self.approved_at = Some(now),
            ProjectStatus::Completed => self.completed_at = Some(now),
            // Assignments only exist for in-progress or completed work.
            ProjectStatus::Cancelled => self.assigned_students.clear(),
            _ => {}
        }

        self.status = to;
        self.history.push(ProjectTransition {
            from: Some(from),
            to,
            actor: actor.clone(),
            at: now,
            note,
        });
        info!(project_id = %self.id, %from, %to, actor = %actor, "project transition");
        Ok(())
    }

    pub(crate) fn submit_for_review(
        &mut self,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(), ProjectError> {
        self.ensure_owner(actor, "submit the project for review")?;
        self.advance(ProjectStatus::PendingReview, actor, now, None)?;
        Ok(())
    }

    pub(crate) fn review(
        &mut self,
        actor: &Actor,
        decision: ReviewDecision,
        now: DateTime<Utc>,
    ) -> Result<(), ProjectError> {
        let reviewer = matches!(actor, Actor::University(university) if *university == self.university);
        if !reviewer || self.owner.posted_by_university() {
            return Err(AuthorizationError::new(actor, "review the project").into());
        }

        match decision {
            ReviewDecision::Approve => {
                self.advance(ProjectStatus::Open, actor, now, Some("approved".to_string()))?;
            }
            ReviewDecision::Reject { reason } => {
                let reason = reason
                    .map(|reason| reason.trim().to_string())
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());
                self.advance(ProjectStatus::Rejected, actor, now, Some(reason.clone()))?;
                self.rejection_reason = Some(reason);
            }
        }
        Ok(())
    }

    /// Cancel an open or running project. Applications and milestones are kept.
    pub(crate) fn cancel(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<(), ProjectError> {
        self.ensure_owner(actor, "cancel the project")?;
        self.advance(ProjectStatus::Cancelled, actor, now, None)?;
        Ok(())
    }

    pub(crate) fn revise(
        &mut self,
        actor: &Actor,
        revision: ProjectRevision,
    ) -> Result<(), ProjectError> {
        self.ensure_owner(actor, "edit the project")?;
        if !matches!(self.status, ProjectStatus::Draft | ProjectStatus::Rejected) {
            return Err(StateError::ProjectStatus {
                status: self.status,
                operation: "edit the project",
            }
            .into());
        }

        let ProjectRevision {
            title,
            description,
            required_skills,
            team,
            job_type,
            eligibility,
            payment_type,
            payment_amount,
            duration_weeks,
            deadline,
            attachment,
        } = revision;

        let title = title.map(|title| title.trim().to_string());
        validate_fields(
            title.as_deref().unwrap_or(&self.title),
            team.unwrap_or(self.team),
            eligibility.as_ref().unwrap_or(&self.eligibility),
            duration_weeks.unwrap_or(self.duration_weeks),
        )?;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(required_skills) = required_skills {
            self.required_skills = required_skills;
        }
        if let Some(team) = team {
            self.team = team;
        }
        if let Some(job_type) = job_type {
            self.job_type = job_type;
        }
        if let Some(eligibility) = eligibility {
            self.eligibility = eligibility;
        }
        if let Some(payment_type) = payment_type {
            self.payment_type = payment_type;
        }
        if let Some(payment_amount) = payment_amount {
            self.payment_amount = payment_amount;
        }
        if let Some(duration_weeks) = duration_weeks {
            self.duration_weeks = duration_weeks;
        }
        if let Some(deadline) = deadline {
            self.deadline = deadline;
        }
        if attachment.is_some() {
            self.attachment = attachment;
        }
        Ok(())
    }
}

/// Owner-requested completion of a running project.
///
/// Milestone-paid projects need a complete ledger; fixed-price projects need at least
/// one approved deliverable.
pub(crate) fn complete_project(
    record: &mut ProjectRecord,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(), ProjectError> {
    record.project.ensure_owner(actor, "complete the project")?;

    let from = record.project.status;
    if !from.can_transition_to(ProjectStatus::Completed) {
        return Err(StateError::Project {
            from,
            to: ProjectStatus::Completed,
        }
        .into());
    }

    match record.project.payment_type {
        PaymentType::Milestone => {
            if !is_project_complete(record) {
                let summary = ledger_summary(record);
                return Err(ValidationError::LedgerIncomplete {
                    allocated: summary.allocated,
                    approved: summary.approved,
                }
                .into());
            }
        }
        PaymentType::Fixed => {
            if !record
                .deliverables
                .iter()
                .any(|deliverable| deliverable.is_approved())
            {
                return Err(ValidationError::NoApprovedDeliverable.into());
            }
        }
    }

    record.project.advance(
        ProjectStatus::Completed,
        actor,
        now,
        Some("marked complete by owner".to_string()),
    )?;
    Ok(())
}
