use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for posted projects.
    ProjectId
);
identifier!(
    /// Identifier wrapper for student applications.
    ApplicationId
);
identifier!(
    /// Identifier wrapper for project milestones.
    MilestoneId
);
identifier!(
    /// Identifier wrapper for submitted deliverables.
    DeliverableId
);
identifier!(StudentId);
identifier!(CompanyId);
identifier!(UniversityId);

/// Pre-authenticated caller of a lifecycle operation.
///
/// Capability checks dispatch on this enum; there is no role hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Company(CompanyId),
    University(UniversityId),
    Student(StudentId),
}

impl Actor {
    pub fn role(&self) -> ActorRole {
        match self {
            Actor::Company(_) => ActorRole::Company,
            Actor::University(_) => ActorRole::University,
            Actor::Student(_) => ActorRole::Student,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Actor::Company(id) => &id.0,
            Actor::University(id) => &id.0,
            Actor::Student(id) => &id.0,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role().label(), self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Company,
    University,
    Student,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Company => "company",
            ActorRole::University => "university",
            ActorRole::Student => "student",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "company" => Some(ActorRole::Company),
            "university" => Some(ActorRole::University),
            "student" => Some(ActorRole::Student),
            _ => None,
        }
    }

    pub fn with_id(self, id: impl Into<String>) -> Actor {
        let id = id.into();
        match self {
            ActorRole::Company => Actor::Company(CompanyId(id)),
            ActorRole::University => Actor::University(UniversityId(id)),
            ActorRole::Student => Actor::Student(StudentId(id)),
        }
    }
}

/// Who posted the project. Exactly one of company or university.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ProjectOwner {
    Company(CompanyId),
    University(UniversityId),
}

impl ProjectOwner {
    pub fn is_actor(&self, actor: &Actor) -> bool {
        match (self, actor) {
            (ProjectOwner::Company(owner), Actor::Company(caller)) => owner == caller,
            (ProjectOwner::University(owner), Actor::University(caller)) => owner == caller,
            _ => false,
        }
    }

    pub fn posted_by_university(&self) -> bool {
        matches!(self, ProjectOwner::University(_))
    }
}

/// Lifecycle status of a posted project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    PendingReview,
    Rejected,
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::PendingReview => "pending_review",
            ProjectStatus::Rejected => "rejected",
            ProjectStatus::Open => "open",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Cancelled)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectDomain {
    Design,
    Marketing,
    Coding,
    DataAnalysis,
    Psychology,
    Research,
    ContentWriting,
    BusinessStrategy,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    #[default]
    Remote,
    Hybrid,
    Onsite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    #[default]
    Fixed,
    Milestone,
}

/// Staffing model of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TeamPolicy {
    #[default]
    Individual,
    Team {
        size: u8,
    },
}

impl TeamPolicy {
    /// Maximum number of students that can be assigned.
    pub fn capacity(self) -> usize {
        match self {
            TeamPolicy::Individual => 1,
            TeamPolicy::Team { size } => usize::from(size),
        }
    }

    pub fn is_individual(self) -> bool {
        matches!(self, TeamPolicy::Individual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StudentYear {
    #[serde(rename = "1")]
    First,
    #[serde(rename = "2")]
    Second,
    #[serde(rename = "3")]
    Third,
    #[serde(rename = "4")]
    Fourth,
    #[serde(rename = "graduate")]
    Graduate,
}

impl StudentYear {
    pub const fn label(self) -> &'static str {
        match self {
            StudentYear::First => "1",
            StudentYear::Second => "2",
            StudentYear::Third => "3",
            StudentYear::Fourth => "4",
            StudentYear::Graduate => "graduate",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "first" | "first year" => Some(StudentYear::First),
            "2" | "second" | "second year" => Some(StudentYear::Second),
            "3" | "third" | "third year" => Some(StudentYear::Third),
            "4" | "fourth" | "fourth year" => Some(StudentYear::Fourth),
            "graduate" | "grad" => Some(StudentYear::Graduate),
            _ => None,
        }
    }
}

impl fmt::Display for StudentYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

/// Student record as supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    /// University-assigned student number.
    pub usn: String,
    pub name: String,
    pub university: Option<UniversityId>,
    pub department: String,
    pub year: StudentYear,
    /// Grade point average on a 0-10 scale.
    pub gpa: Option<f32>,
    pub verification: VerificationStatus,
}

/// Academic filters a student must satisfy to apply. Empty sets are unrestricted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EligibilityCriteria {
    #[serde(default)]
    pub departments: BTreeSet<String>,
    #[serde(default)]
    pub years: BTreeSet<StudentYear>,
    #[serde(default)]
    pub min_gpa: Option<f32>,
}

/// Payment share of a milestone, stored in hundredths of a percent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "f64", into = "f64")]
pub struct Percentage(u32);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);
    pub const FULL: Percentage = Percentage(10_000);

    pub const fn from_hundredths(value: u32) -> Option<Self> {
        if value <= Self::FULL.0 {
            Some(Percentage(value))
        } else {
            None
        }
    }

    pub const fn whole(value: u8) -> Option<Self> {
        Self::from_hundredths(value as u32 * 100)
    }

    pub const fn hundredths(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl TryFrom<f64> for Percentage {
    type Error = PercentageError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(PercentageError(value));
        }
        Ok(Percentage((value * 100.0).round() as u32))
    }
}

impl From<Percentage> for f64 {
    fn from(value: Percentage) -> Self {
        value.as_f64()
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{:.2}%", self.as_f64())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("payment percentage must be between 0 and 100, got {0}")]
pub struct PercentageError(pub f64);

/// Posted project with its workflow fields.
///
/// `status`, `assigned_students` and `history` only change through the lifecycle
/// operations in this module tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner: ProjectOwner,
    /// University whose students the project targets and who reviews company postings.
    pub university: UniversityId,
    pub title: String,
    pub domain: ProjectDomain,
    pub description: String,
    pub required_skills: Vec<String>,
    pub team: TeamPolicy,
    pub job_type: JobType,
    pub eligibility: EligibilityCriteria,
    pub payment_type: PaymentType,
    /// Remuneration in minor currency units.
    pub payment_amount: u64,
    pub duration_weeks: u16,
    pub deadline: NaiveDate,
    /// Opaque reference to the job description attachment.
    pub attachment: Option<String>,
    pub(crate) status: ProjectStatus,
    pub rejection_reason: Option<String>,
    pub(crate) assigned_students: BTreeSet<StudentId>,
    pub created_at: DateTime<Utc>,
    pub submitted_for_review_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub(crate) history: Vec<ProjectTransition>,
}

impl Project {
    pub fn status(&self) -> ProjectStatus {
        self.status
    }

    pub fn assigned_students(&self) -> &BTreeSet<StudentId> {
        &self.assigned_students
    }

    pub fn history(&self) -> &[ProjectTransition] {
        &self.history
    }
}

/// Audit entry appended on every project status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTransition {
    pub from: Option<ProjectStatus>,
    pub to: ProjectStatus,
    pub actor: Actor,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Client-supplied fields for a new project posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    /// Target university. Required for company postings; universities post to themselves.
    #[serde(default)]
    pub university: Option<UniversityId>,
    pub title: String,
    pub domain: ProjectDomain,
    pub description: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub team: TeamPolicy,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default)]
    pub eligibility: EligibilityCriteria,
    #[serde(default)]
    pub payment_type: PaymentType,
    pub payment_amount: u64,
    pub duration_weeks: u16,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub attachment: Option<String>,
}

/// Partial update applied while a project is still editable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectRevision {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required_skills: Option<Vec<String>>,
    #[serde(default)]
    pub team: Option<TeamPolicy>,
    #[serde(default)]
    pub job_type: Option<JobType>,
    #[serde(default)]
    pub eligibility: Option<EligibilityCriteria>,
    #[serde(default)]
    pub payment_type: Option<PaymentType>,
    #[serde(default)]
    pub payment_amount: Option<u64>,
    #[serde(default)]
    pub duration_weeks: Option<u16>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub attachment: Option<String>,
}

/// University decision on a company posting awaiting review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject {
        #[serde(default)]
        reason: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Shortlisted,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A student's (or a student-led team's) application to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectApplication {
    pub id: ApplicationId,
    pub project_id: ProjectId,
    pub student_id: StudentId,
    pub cover_letter: String,
    pub proposed_approach: Option<String>,
    pub portfolio_links: Vec<String>,
    /// Additional members for team applications, excluding the applicant.
    pub team_members: Vec<StudentId>,
    pub(crate) status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ProjectApplication {
    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn is_team_application(&self) -> bool {
        !self.team_members.is_empty()
    }

    /// Applicant followed by team members.
    pub fn members(&self) -> impl Iterator<Item = &StudentId> {
        std::iter::once(&self.student_id).chain(self.team_members.iter())
    }
}

/// Fields a student provides when applying.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub cover_letter: String,
    #[serde(default)]
    pub proposed_approach: Option<String>,
    #[serde(default)]
    pub portfolio_links: Vec<String>,
    #[serde(default)]
    pub team_members: Vec<StudentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    Submitted,
    Approved,
    RevisionRequired,
}

impl MilestoneStatus {
    pub const fn label(self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::Submitted => "submitted",
            MilestoneStatus::Approved => "approved",
            MilestoneStatus::RevisionRequired => "revision_required",
        }
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Percentage-weighted checkpoint owned by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub order: u16,
    pub payment_percentage: Percentage,
    pub due_date: NaiveDate,
    pub(crate) status: MilestoneStatus,
    pub(crate) removed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Milestone {
    pub fn status(&self) -> MilestoneStatus {
        self.status
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: Option<u16>,
    pub payment_percentage: Percentage,
    pub due_date: NaiveDate,
}

/// Review state of a deliverable. Approved and revision-required are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableReview {
    Submitted,
    Approved,
    RevisionRequired,
}

impl DeliverableReview {
    pub const fn label(self) -> &'static str {
        match self {
            DeliverableReview::Submitted => "submitted",
            DeliverableReview::Approved => "approved",
            DeliverableReview::RevisionRequired => "revision_required",
        }
    }
}

impl fmt::Display for DeliverableReview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Student submission against a project and optionally one of its milestones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: DeliverableId,
    pub project_id: ProjectId,
    pub milestone_id: Option<MilestoneId>,
    pub student_id: StudentId,
    pub title: String,
    pub description: String,
    /// Opaque file storage reference.
    pub file_ref: String,
    pub submission_notes: Option<String>,
    pub(crate) review: DeliverableReview,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Deliverable {
    pub fn review(&self) -> DeliverableReview {
        self.review
    }

    pub fn is_approved(&self) -> bool {
        self.review == DeliverableReview::Approved
    }

    pub fn revision_required(&self) -> bool {
        self.review == DeliverableReview::RevisionRequired
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverableDraft {
    #[serde(default)]
    pub milestone_id: Option<MilestoneId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub file_ref: String,
    #[serde(default)]
    pub submission_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DeliverableDecision {
    Approve {
        #[serde(default)]
        feedback: Option<String>,
    },
    RequestRevision {
        feedback: String,
    },
}
