//! Project lifecycle and eligibility matching.
//!
//! Projects move through review, open for applications, accept students and track
//! milestone-based completion. Every mutation is applied to the project aggregate as a
//! single compare-and-set write through [`ProjectRepository`].

pub mod applications;
pub mod domain;
pub mod eligibility;
pub mod errors;
pub mod lifecycle;
pub mod milestones;
pub mod repository;
pub mod roster;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use applications::ApplicationTransition;
pub use domain::{
    Actor, ActorRole, ApplicationId, ApplicationStatus, ApplicationSubmission, CompanyId,
    Deliverable, DeliverableDecision, DeliverableDraft, DeliverableId, DeliverableReview,
    EligibilityCriteria, JobType, Milestone, MilestoneDraft, MilestoneId, MilestoneStatus,
    PaymentType, Percentage, Project, ProjectApplication, ProjectDomain, ProjectDraft, ProjectId,
    ProjectOwner, ProjectRevision, ProjectStatus, ProjectTransition, ReviewDecision, Student,
    StudentId, StudentYear, TeamPolicy, UniversityId, VerificationStatus,
};
pub use eligibility::{eligible_projects, evaluate_eligibility, is_eligible, IneligibilityReason};
pub use errors::{AuthorizationError, ErrorKind, ProjectError, StateError, ValidationError};
pub use milestones::{is_project_complete, ledger_summary, LedgerSummary};
pub use repository::{
    ApplicationCounts, ProjectRecord, ProjectRepository, ProjectStatusView, RepositoryError,
};
pub use roster::{RosterImportError, StudentRosterImporter};
pub use router::project_router;
pub use service::{MilestoneApproval, ProjectService};
