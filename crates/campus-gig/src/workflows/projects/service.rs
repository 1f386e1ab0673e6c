use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use super::applications::{self, ApplicationTransition};
use super::domain::{
    Actor, ApplicationId, ApplicationStatus, ApplicationSubmission, Deliverable,
    DeliverableDecision, DeliverableDraft, DeliverableId, Milestone, MilestoneDraft, MilestoneId,
    Project, ProjectApplication, ProjectDraft, ProjectId, ProjectRevision, ProjectStatus,
    ReviewDecision, Student, StudentId,
};
use super::eligibility;
use super::errors::{AuthorizationError, ProjectError};
use super::lifecycle;
use super::milestones::{self, LedgerSummary};
use super::repository::{ProjectRecord, ProjectRepository, RepositoryError};

static PROJECT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static MILESTONE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static DELIVERABLE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence(sequence: &AtomicU64, prefix: &str) -> String {
    let id = sequence.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

/// Result of approving a milestone, with the ledger and project state after the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneApproval {
    pub milestone: Milestone,
    pub ledger: LedgerSummary,
    pub project_status: ProjectStatus,
}

/// Service applying lifecycle operations as atomic read-validate-write units.
///
/// Each mutation loads the project aggregate, applies the operation to a private copy
/// and saves it with the version it was loaded at. A lost race surfaces as
/// [`ProjectError::Conflict`] and nothing is written.
pub struct ProjectService<R> {
    repository: Arc<R>,
}

impl<R> ProjectService<R>
where
    R: ProjectRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn create_project(
        &self,
        actor: &Actor,
        draft: ProjectDraft,
    ) -> Result<ProjectRecord, ProjectError> {
        let id = ProjectId(next_sequence(&PROJECT_SEQUENCE, "prj"));
        let project = lifecycle::create_project(actor, id, draft, Utc::now())
            .map_err(|err| rejected("create_project", err))?;
        self.repository
            .insert(ProjectRecord::new(project))
            .map_err(ProjectError::Repository)
    }

    pub fn revise_project(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
        revision: ProjectRevision,
    ) -> Result<ProjectRecord, ProjectError> {
        self.mutate(project_id, "revise_project", |record| {
            record.project.revise(actor, revision)
        })?;
        self.get_project(project_id)
    }

    pub fn submit_for_review(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
    ) -> Result<Project, ProjectError> {
        self.mutate(project_id, "submit_for_review", |record| {
            record.project.submit_for_review(actor, Utc::now())?;
            Ok(record.project.clone())
        })
    }

    pub fn review_project(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
        decision: ReviewDecision,
    ) -> Result<Project, ProjectError> {
        self.mutate(project_id, "review_project", |record| {
            record.project.review(actor, decision, Utc::now())?;
            Ok(record.project.clone())
        })
    }

    pub fn cancel_project(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
    ) -> Result<Project, ProjectError> {
        self.mutate(project_id, "cancel_project", |record| {
            record.project.cancel(actor, Utc::now())?;
            Ok(record.project.clone())
        })
    }

    pub fn complete_project(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
    ) -> Result<Project, ProjectError> {
        self.mutate(project_id, "complete_project", |record| {
            lifecycle::complete_project(record, actor, Utc::now())?;
            Ok(record.project.clone())
        })
    }

    pub fn get_project(&self, project_id: &ProjectId) -> Result<ProjectRecord, ProjectError> {
        self.load(project_id)
    }

    /// Apply to an open project as the calling student.
    pub fn submit_application(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
        submission: ApplicationSubmission,
    ) -> Result<ProjectApplication, ProjectError> {
        let Actor::Student(student_id) = actor else {
            return Err(rejected(
                "submit_application",
                AuthorizationError::new(actor, "apply to projects").into(),
            ));
        };

        let applicant = self
            .student(student_id)
            .map_err(|err| rejected("submit_application", err))?;
        let team = submission
            .team_members
            .iter()
            .map(|member| self.student(member))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| rejected("submit_application", err))?;

        self.mutate(project_id, "submit_application", |record| {
            let id = ApplicationId(next_sequence(&APPLICATION_SEQUENCE, "app"));
            let application = applications::submit_application(
                record,
                &applicant,
                &team,
                id,
                submission,
                Utc::now(),
            )?;
            record.applications.push(application.clone());
            Ok(application)
        })
    }

    pub fn transition_application(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        to: ApplicationStatus,
    ) -> Result<ApplicationTransition, ProjectError> {
        let project_id = self
            .repository
            .project_for_application(application_id)
            .map_err(ProjectError::Repository)?
            .ok_or_else(|| ProjectError::not_found("application", application_id))?;

        self.mutate(&project_id, "transition_application", |record| {
            applications::transition_application(record, application_id, to, actor, Utc::now())
        })
    }

    pub fn get_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ProjectApplication, ProjectError> {
        let project_id = self
            .repository
            .project_for_application(application_id)
            .map_err(ProjectError::Repository)?
            .ok_or_else(|| ProjectError::not_found("application", application_id))?;
        self.load(&project_id)?
            .application(application_id)
            .cloned()
            .ok_or_else(|| ProjectError::not_found("application", application_id))
    }

    pub fn add_milestone(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
        draft: MilestoneDraft,
    ) -> Result<Milestone, ProjectError> {
        self.mutate(project_id, "add_milestone", |record| {
            let id = MilestoneId(next_sequence(&MILESTONE_SEQUENCE, "ms"));
            milestones::add_milestone(record, actor, id, draft)
        })
    }

    pub fn remove_milestone(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
        milestone_id: &MilestoneId,
    ) -> Result<LedgerSummary, ProjectError> {
        self.mutate(project_id, "remove_milestone", |record| {
            milestones::remove_milestone(record, actor, milestone_id)?;
            Ok(milestones::ledger_summary(record))
        })
    }

    pub fn approve_milestone(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
        milestone_id: &MilestoneId,
    ) -> Result<MilestoneApproval, ProjectError> {
        self.mutate(project_id, "approve_milestone", |record| {
            let milestone = milestones::approve_milestone(record, actor, milestone_id, Utc::now())?;
            Ok(MilestoneApproval {
                milestone,
                ledger: milestones::ledger_summary(record),
                project_status: record.project.status(),
            })
        })
    }

    pub fn submit_deliverable(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
        draft: DeliverableDraft,
    ) -> Result<Deliverable, ProjectError> {
        self.mutate(project_id, "submit_deliverable", |record| {
            let id = DeliverableId(next_sequence(&DELIVERABLE_SEQUENCE, "dlv"));
            milestones::submit_deliverable(record, actor, id, draft, Utc::now())
        })
    }

    pub fn review_deliverable(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
        deliverable_id: &DeliverableId,
        decision: DeliverableDecision,
    ) -> Result<Deliverable, ProjectError> {
        self.mutate(project_id, "review_deliverable", |record| {
            milestones::review_deliverable(record, actor, deliverable_id, decision, Utc::now())
        })
    }

    pub fn ledger(&self, project_id: &ProjectId) -> Result<LedgerSummary, ProjectError> {
        let record = self.load(project_id)?;
        Ok(milestones::ledger_summary(&record))
    }

    pub fn is_project_complete(&self, project_id: &ProjectId) -> Result<bool, ProjectError> {
        let record = self.load(project_id)?;
        Ok(milestones::is_project_complete(&record))
    }

    pub fn is_eligible(
        &self,
        student_id: &StudentId,
        project_id: &ProjectId,
    ) -> Result<bool, ProjectError> {
        let student = self.student(student_id)?;
        let record = self.load(project_id)?;
        Ok(eligibility::is_eligible(&student, &record.project))
    }

    /// Open projects the student is eligible to apply to.
    pub fn eligible_projects(&self, student_id: &StudentId) -> Result<Vec<Project>, ProjectError> {
        let student = self.student(student_id)?;
        let records = self.repository.list().map_err(ProjectError::Repository)?;
        Ok(
            eligibility::eligible_projects(&student, records.iter().map(|record| &record.project))
                .into_iter()
                .cloned()
                .collect(),
        )
    }

    fn student(&self, student_id: &StudentId) -> Result<Student, ProjectError> {
        self.repository
            .fetch_student(student_id)
            .map_err(ProjectError::Repository)?
            .ok_or_else(|| ProjectError::not_found("student", student_id))
    }

    fn load(&self, project_id: &ProjectId) -> Result<ProjectRecord, ProjectError> {
        self.repository
            .fetch(project_id)
            .map_err(ProjectError::Repository)?
            .ok_or_else(|| ProjectError::not_found("project", project_id))
    }

    /// Read-validate-write against a single project aggregate.
    fn mutate<T, F>(
        &self,
        project_id: &ProjectId,
        operation: &'static str,
        apply: F,
    ) -> Result<T, ProjectError>
    where
        F: FnOnce(&mut ProjectRecord) -> Result<T, ProjectError>,
    {
        let mut record = self
            .load(project_id)
            .map_err(|err| rejected(operation, err))?;
        let expected = record.version;

        let value = apply(&mut record).map_err(|err| rejected(operation, err))?;

        let saved = self
            .repository
            .save(record, expected)
            .map_err(|err| match err {
                RepositoryError::Conflict => ProjectError::Conflict {
                    project_id: project_id.clone(),
                    expected,
                },
                other => ProjectError::Repository(other),
            })
            .map_err(|err| rejected(operation, err))?;
        debug!(operation, project_id = %project_id, version = saved.version, "project committed");

        Ok(value)
    }
}

fn rejected(operation: &'static str, err: ProjectError) -> ProjectError {
    warn!(operation, kind = err.kind().label(), error = %err, "lifecycle operation rejected");
    err
}
