use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationStatus, Deliverable, DeliverableId, Milestone, MilestoneId, Project,
    ProjectApplication, ProjectId, ProjectOwner, ProjectTransition, Student, StudentId,
    UniversityId,
};
use super::milestones::{ledger_summary, LedgerSummary};

/// Project aggregate: the project plus everything it owns or is referenced by.
///
/// `version` is the compare-and-set token for [`ProjectRepository::save`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project: Project,
    pub applications: Vec<ProjectApplication>,
    pub milestones: Vec<Milestone>,
    pub deliverables: Vec<Deliverable>,
    pub version: u64,
}

impl ProjectRecord {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            applications: Vec::new(),
            milestones: Vec::new(),
            deliverables: Vec::new(),
            version: 0,
        }
    }

    pub fn application(&self, id: &ApplicationId) -> Option<&ProjectApplication> {
        self.applications.iter().find(|application| &application.id == id)
    }

    pub(crate) fn application_mut(&mut self, id: &ApplicationId) -> Option<&mut ProjectApplication> {
        self.applications
            .iter_mut()
            .find(|application| &application.id == id)
    }

    pub fn milestone(&self, id: &MilestoneId) -> Option<&Milestone> {
        self.milestones.iter().find(|milestone| &milestone.id == id)
    }

    pub(crate) fn milestone_mut(&mut self, id: &MilestoneId) -> Option<&mut Milestone> {
        self.milestones.iter_mut().find(|milestone| &milestone.id == id)
    }

    /// Milestones that have not been removed, in display order.
    pub fn active_milestones(&self) -> impl Iterator<Item = &Milestone> {
        self.milestones.iter().filter(|milestone| !milestone.removed)
    }

    pub fn deliverable(&self, id: &DeliverableId) -> Option<&Deliverable> {
        self.deliverables
            .iter()
            .find(|deliverable| &deliverable.id == id)
    }

    pub(crate) fn deliverable_mut(&mut self, id: &DeliverableId) -> Option<&mut Deliverable> {
        self.deliverables
            .iter_mut()
            .find(|deliverable| &deliverable.id == id)
    }

    pub fn application_counts(&self) -> ApplicationCounts {
        let mut counts = ApplicationCounts::default();
        for application in &self.applications {
            match application.status {
                ApplicationStatus::Pending => counts.pending += 1,
                ApplicationStatus::Shortlisted => counts.shortlisted += 1,
                ApplicationStatus::Accepted => counts.accepted += 1,
                ApplicationStatus::Rejected => counts.rejected += 1,
                ApplicationStatus::Withdrawn => counts.withdrawn += 1,
            }
        }
        counts
    }

    pub fn status_view(&self) -> ProjectStatusView {
        let project = &self.project;
        ProjectStatusView {
            project_id: project.id.clone(),
            title: project.title.clone(),
            status: project.status.label(),
            owner: project.owner.clone(),
            university: project.university.clone(),
            assigned_students: project.assigned_students.iter().cloned().collect(),
            applications: self.application_counts(),
            ledger: ledger_summary(self),
            rejection_reason: project.rejection_reason.clone(),
            history: project.history.clone(),
            version: self.version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplicationCounts {
    pub pending: usize,
    pub shortlisted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub withdrawn: usize,
}

/// Storage abstraction with compare-and-set writes keyed by project id.
pub trait ProjectRepository: Send + Sync {
    fn insert(&self, record: ProjectRecord) -> Result<ProjectRecord, RepositoryError>;
    /// Persist `record` if the stored version still equals `expected_version`, returning
    /// the stored record with its version advanced. Otherwise [`RepositoryError::Conflict`].
    fn save(
        &self,
        record: ProjectRecord,
        expected_version: u64,
    ) -> Result<ProjectRecord, RepositoryError>;
    fn fetch(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, RepositoryError>;
    fn list(&self) -> Result<Vec<ProjectRecord>, RepositoryError>;
    fn project_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ProjectId>, RepositoryError>;
    fn fetch_student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record version conflict")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized representation of a project's lifecycle state.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatusView {
    pub project_id: ProjectId,
    pub title: String,
    pub status: &'static str,
    pub owner: ProjectOwner,
    pub university: UniversityId,
    pub assigned_students: Vec<StudentId>,
    pub applications: ApplicationCounts,
    pub ledger: LedgerSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub history: Vec<ProjectTransition>,
    pub version: u64,
}
