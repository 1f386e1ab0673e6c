//! Milestone ledger: payment allocation, deliverable review and completion tracking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::domain::{
    Actor, Deliverable, DeliverableDecision, DeliverableDraft, DeliverableId, DeliverableReview,
    Milestone, MilestoneDraft, MilestoneId, MilestoneStatus, PaymentType, Percentage,
    ProjectStatus,
};
use super::errors::{AuthorizationError, ProjectError, StateError, ValidationError};
use super::repository::ProjectRecord;

/// Allocation and approval totals across a project's active milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub allocated: Percentage,
    pub approved: Percentage,
    pub remaining: Percentage,
    pub milestones: usize,
    pub approved_milestones: usize,
    pub fully_allocated: bool,
    pub complete: bool,
}

fn allocated_hundredths(record: &ProjectRecord) -> u32 {
    record
        .active_milestones()
        .map(|milestone| milestone.payment_percentage.hundredths())
        .sum()
}

fn approved_hundredths(record: &ProjectRecord) -> u32 {
    record
        .active_milestones()
        .filter(|milestone| milestone.status == MilestoneStatus::Approved)
        .map(|milestone| milestone.payment_percentage.hundredths())
        .sum()
}

fn clamp(hundredths: u32) -> Percentage {
    Percentage::from_hundredths(hundredths).unwrap_or(Percentage::FULL)
}

/// True iff every allocated percentage is approved and the allocation is exactly 100%.
pub fn is_project_complete(record: &ProjectRecord) -> bool {
    let full = Percentage::FULL.hundredths();
    allocated_hundredths(record) == full && approved_hundredths(record) == full
}

pub fn ledger_summary(record: &ProjectRecord) -> LedgerSummary {
    let allocated = allocated_hundredths(record);
    let approved = approved_hundredths(record);
    let full = Percentage::FULL.hundredths();

    LedgerSummary {
        allocated: clamp(allocated),
        approved: clamp(approved),
        remaining: clamp(full.saturating_sub(allocated)),
        milestones: record.active_milestones().count(),
        approved_milestones: record
            .active_milestones()
            .filter(|milestone| milestone.status == MilestoneStatus::Approved)
            .count(),
        fully_allocated: allocated == full,
        complete: is_project_complete(record),
    }
}

fn ensure_mutable_project(record: &ProjectRecord, operation: &'static str) -> Result<(), StateError> {
    let status = record.project.status;
    if status.is_terminal() {
        return Err(StateError::ProjectStatus { status, operation });
    }
    Ok(())
}

pub(crate) fn add_milestone(
    record: &mut ProjectRecord,
    actor: &Actor,
    id: MilestoneId,
    draft: MilestoneDraft,
) -> Result<Milestone, ProjectError> {
    record.project.ensure_owner(actor, "add milestones")?;
    ensure_mutable_project(record, "add milestones")?;

    if draft.title.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "title",
            reason: "must not be empty".to_string(),
        }
        .into());
    }

    let allocated = allocated_hundredths(record);
    let requested = draft.payment_percentage;
    let total = allocated + requested.hundredths();
    if total > Percentage::FULL.hundredths() {
        return Err(ValidationError::AllocationExceeded {
            allocated: clamp(allocated),
            requested,
            total: f64::from(total) / 100.0,
        }
        .into());
    }

    let order = draft.order.unwrap_or_else(|| {
        record
            .active_milestones()
            .map(|milestone| milestone.order)
            .max()
            .unwrap_or(0)
            .saturating_add(1)
    });

    let milestone = Milestone {
        id,
        project_id: record.project.id.clone(),
        title: draft.title.trim().to_string(),
        description: draft.description,
        order,
        payment_percentage: requested,
        due_date: draft.due_date,
        status: MilestoneStatus::Pending,
        removed: false,
        completed_at: None,
    };
    record.milestones.push(milestone.clone());
    record.milestones.sort_by_key(|milestone| milestone.order);

    info!(
        project_id = %record.project.id,
        milestone_id = %milestone.id,
        percentage = %milestone.payment_percentage,
        allocated = %clamp(total),
        "milestone added"
    );
    Ok(milestone)
}

/// Soft-remove a milestone so its percentage no longer counts towards the allocation.
pub(crate) fn remove_milestone(
    record: &mut ProjectRecord,
    actor: &Actor,
    milestone_id: &MilestoneId,
) -> Result<(), ProjectError> {
    record.project.ensure_owner(actor, "remove milestones")?;
    ensure_mutable_project(record, "remove milestones")?;

    let milestone = record
        .milestone_mut(milestone_id)
        .filter(|milestone| !milestone.removed)
        .ok_or_else(|| ProjectError::not_found("milestone", milestone_id))?;

    if milestone.status == MilestoneStatus::Approved {
        return Err(StateError::Milestone {
            milestone_id: milestone_id.clone(),
            status: milestone.status,
            operation: "remove it",
        }
        .into());
    }

    milestone.removed = true;
    info!(milestone_id = %milestone_id, "milestone removed");
    Ok(())
}

/// Approve a submitted milestone together with its outstanding deliverables.
pub(crate) fn approve_milestone(
    record: &mut ProjectRecord,
    actor: &Actor,
    milestone_id: &MilestoneId,
    now: DateTime<Utc>,
) -> Result<Milestone, ProjectError> {
    record.project.ensure_owner(actor, "approve milestones")?;
    ensure_mutable_project(record, "approve milestones")?;

    let milestone = record
        .milestone(milestone_id)
        .filter(|milestone| !milestone.removed)
        .ok_or_else(|| ProjectError::not_found("milestone", milestone_id))?;

    if milestone.status != MilestoneStatus::Submitted {
        return Err(StateError::Milestone {
            milestone_id: milestone_id.clone(),
            status: milestone.status,
            operation: "approve it",
        }
        .into());
    }

    let has_submission = record.deliverables.iter().any(|deliverable| {
        deliverable.milestone_id.as_ref() == Some(milestone_id)
            && deliverable.review == DeliverableReview::Submitted
    });
    if !has_submission {
        return Err(ValidationError::NoSubmittedDeliverable {
            milestone_id: milestone_id.clone(),
        }
        .into());
    }

    for deliverable in record
        .deliverables
        .iter_mut()
        .filter(|deliverable| deliverable.milestone_id.as_ref() == Some(milestone_id))
        .filter(|deliverable| deliverable.review == DeliverableReview::Submitted)
    {
        deliverable.review = DeliverableReview::Approved;
        deliverable.reviewed_at = Some(now);
    }

    let approved = mark_approved(record, milestone_id, now)?;
    settle_completion(record, actor, now)?;
    Ok(approved)
}

fn mark_approved(
    record: &mut ProjectRecord,
    milestone_id: &MilestoneId,
    now: DateTime<Utc>,
) -> Result<Milestone, ProjectError> {
    let milestone = record
        .milestone_mut(milestone_id)
        .ok_or_else(|| ProjectError::not_found("milestone", milestone_id))?;
    milestone.status = MilestoneStatus::Approved;
    milestone.completed_at = Some(now);
    info!(milestone_id = %milestone_id, "milestone approved");
    Ok(milestone.clone())
}

/// Complete milestone-paid projects once the ledger is fully approved.
fn settle_completion(
    record: &mut ProjectRecord,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(), ProjectError> {
    if record.project.payment_type == PaymentType::Milestone
        && record.project.status == ProjectStatus::InProgress
        && is_project_complete(record)
    {
        record.project.advance(
            ProjectStatus::Completed,
            actor,
            now,
            Some("all milestones approved".to_string()),
        )?;
    }
    Ok(())
}

pub(crate) fn submit_deliverable(
    record: &mut ProjectRecord,
    actor: &Actor,
    id: DeliverableId,
    draft: DeliverableDraft,
    now: DateTime<Utc>,
) -> Result<Deliverable, ProjectError> {
    let student_id = match actor {
        Actor::Student(student) if record.project.assigned_students.contains(student) => {
            student.clone()
        }
        _ => return Err(AuthorizationError::new(actor, "submit deliverables").into()),
    };

    if record.project.status != ProjectStatus::InProgress {
        return Err(StateError::ProjectStatus {
            status: record.project.status,
            operation: "submit deliverables",
        }
        .into());
    }

    if draft.title.trim().is_empty() || draft.file_ref.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "deliverable",
            reason: "title and file reference are required".to_string(),
        }
        .into());
    }

    if let Some(milestone_id) = &draft.milestone_id {
        let milestone = record
            .milestone_mut(milestone_id)
            .filter(|milestone| !milestone.removed)
            .ok_or_else(|| ProjectError::not_found("milestone", milestone_id))?;
        if milestone.status == MilestoneStatus::Approved {
            return Err(StateError::Milestone {
                milestone_id: milestone_id.clone(),
                status: milestone.status,
                operation: "accept new deliverables",
            }
            .into());
        }
        milestone.status = MilestoneStatus::Submitted;
    }

    let deliverable = Deliverable {
        id,
        project_id: record.project.id.clone(),
        milestone_id: draft.milestone_id,
        student_id,
        title: draft.title.trim().to_string(),
        description: draft.description,
        file_ref: draft.file_ref,
        submission_notes: draft.submission_notes,
        review: DeliverableReview::Submitted,
        feedback: None,
        submitted_at: now,
        reviewed_at: None,
    };
    record.deliverables.push(deliverable.clone());
    info!(
        project_id = %record.project.id,
        deliverable_id = %deliverable.id,
        student_id = %deliverable.student_id,
        "deliverable submitted"
    );
    Ok(deliverable)
}

/// Review a submitted deliverable.
///
/// Approval approves the linked milestone once every deliverable still under
/// consideration for it is approved; deliverables sent back for revision are
/// superseded by their resubmission and do not block the milestone. Reviews of
/// deliverables on a removed milestone leave that milestone untouched.
pub(crate) fn review_deliverable(
    record: &mut ProjectRecord,
    actor: &Actor,
    deliverable_id: &DeliverableId,
    decision: DeliverableDecision,
    now: DateTime<Utc>,
) -> Result<Deliverable, ProjectError> {
    record.project.ensure_owner(actor, "review deliverables")?;
    ensure_mutable_project(record, "review deliverables")?;

    let deliverable = record
        .deliverable_mut(deliverable_id)
        .ok_or_else(|| ProjectError::not_found("deliverable", deliverable_id))?;
    if deliverable.review != DeliverableReview::Submitted {
        return Err(StateError::Deliverable {
            deliverable_id: deliverable_id.clone(),
            review: deliverable.review,
        }
        .into());
    }

    let milestone_id = deliverable.milestone_id.clone();
    match decision {
        DeliverableDecision::Approve { feedback } => {
            deliverable.review = DeliverableReview::Approved;
            deliverable.feedback = feedback;
            deliverable.reviewed_at = Some(now);
            let reviewed = deliverable.clone();

            if let Some(milestone_id) = milestone_id {
                let settled = record
                    .deliverables
                    .iter()
                    .filter(|deliverable| deliverable.milestone_id.as_ref() == Some(&milestone_id))
                    .filter(|deliverable| !deliverable.revision_required())
                    .all(Deliverable::is_approved);
                let awaiting = record
                    .milestone(&milestone_id)
                    .filter(|milestone| !milestone.removed)
                    .map(|milestone| milestone.status == MilestoneStatus::Submitted)
                    .unwrap_or(false);
                if settled && awaiting {
                    mark_approved(record, &milestone_id, now)?;
                    settle_completion(record, actor, now)?;
                }
            }
            Ok(reviewed)
        }
        DeliverableDecision::RequestRevision { feedback } => {
            deliverable.review = DeliverableReview::RevisionRequired;
            deliverable.feedback = Some(feedback);
            deliverable.reviewed_at = Some(now);
            let reviewed = deliverable.clone();

            if let Some(milestone) = milestone_id
                .as_ref()
                .and_then(|milestone_id| record.milestone_mut(milestone_id))
                .filter(|milestone| !milestone.removed)
            {
                if milestone.status != MilestoneStatus::Approved {
                    milestone.status = MilestoneStatus::RevisionRequired;
                }
            }
            Ok(reviewed)
        }
    }
}
