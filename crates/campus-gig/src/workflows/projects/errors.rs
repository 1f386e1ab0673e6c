use serde::Serialize;

use super::domain::{
    Actor, ApplicationStatus, DeliverableId, DeliverableReview, MilestoneId, MilestoneStatus,
    Percentage, ProjectId, ProjectStatus, StudentId,
};
use super::eligibility::IneligibilityReason;
use super::repository::RepositoryError;

/// Malformed or out-of-range input, including ineligible applicants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("student {student_id} is not eligible: {}", join_reasons(.reasons))]
    Ineligible {
        student_id: StudentId,
        reasons: Vec<IneligibilityReason>,
    },
    #[error("team member {student_id} is not eligible: {}", join_reasons(.reasons))]
    TeamMemberIneligible {
        student_id: StudentId,
        reasons: Vec<IneligibilityReason>,
    },
    #[error("project is {status}; applications are only accepted while open")]
    ProjectNotOpen { status: ProjectStatus },
    #[error("student {student_id} already has an active application for this project")]
    DuplicateApplication { student_id: StudentId },
    #[error("team applications are not accepted on individual projects")]
    TeamApplicationNotAllowed,
    #[error("team of {requested} exceeds the project capacity of {capacity}")]
    TeamTooLarge { requested: usize, capacity: usize },
    #[error("student {student_id} cannot be listed as a team member")]
    InvalidTeamMember { student_id: StudentId },
    #[error("project positions are already filled")]
    PositionFilled,
    #[error("milestone allocation would reach {total}% (allocated {allocated}, adding {requested})")]
    AllocationExceeded {
        allocated: Percentage,
        requested: Percentage,
        total: f64,
    },
    #[error("milestone {milestone_id} has no submitted deliverable")]
    NoSubmittedDeliverable { milestone_id: MilestoneId },
    #[error("project has no approved deliverable")]
    NoApprovedDeliverable,
    #[error("milestone ledger incomplete: {approved} approved of {allocated} allocated")]
    LedgerIncomplete {
        allocated: Percentage,
        approved: Percentage,
    },
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

fn join_reasons(reasons: &[IneligibilityReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Requested transition is not an edge of the relevant state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("project cannot move from {from} to {to}")]
    Project {
        from: ProjectStatus,
        to: ProjectStatus,
    },
    #[error("project is {status}; cannot {operation}")]
    ProjectStatus {
        status: ProjectStatus,
        operation: &'static str,
    },
    #[error("application cannot move from {from} to {to}")]
    Application {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("milestone {milestone_id} is {status}; cannot {operation}")]
    Milestone {
        milestone_id: MilestoneId,
        status: MilestoneStatus,
        operation: &'static str,
    },
    #[error("deliverable {deliverable_id} is already {review}")]
    Deliverable {
        deliverable_id: DeliverableId,
        review: DeliverableReview,
    },
}

/// Actor lacks the role or ownership for the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{actor} is not allowed to {action}")]
pub struct AuthorizationError {
    pub actor: Actor,
    pub action: &'static str,
}

impl AuthorizationError {
    pub(crate) fn new(actor: &Actor, action: &'static str) -> Self {
        Self {
            actor: actor.clone(),
            action,
        }
    }
}

/// Error raised by lifecycle operations. Every failure leaves stored state unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error("project {project_id} changed concurrently; expected version {expected}")]
    Conflict { project_id: ProjectId, expected: u64 },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Repository(RepositoryError),
}

impl ProjectError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProjectError::Validation(_) => ErrorKind::Validation,
            ProjectError::State(_) => ErrorKind::State,
            ProjectError::Authorization(_) => ErrorKind::Authorization,
            ProjectError::Conflict { .. } => ErrorKind::Conflict,
            ProjectError::NotFound { .. } => ErrorKind::NotFound,
            ProjectError::Repository(_) => ErrorKind::Repository,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    State,
    Authorization,
    Conflict,
    NotFound,
    Repository,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::State => "state_error",
            ErrorKind::Authorization => "authorization_error",
            ErrorKind::Conflict => "conflict_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Repository => "repository_error",
        }
    }
}
