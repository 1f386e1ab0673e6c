use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::http::{header, Request};
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::projects::applications;
use crate::workflows::projects::domain::{
    Actor, ApplicationId, ApplicationStatus, ApplicationSubmission, CompanyId, DeliverableDraft,
    EligibilityCriteria, JobType, MilestoneDraft, MilestoneId, PaymentType, Percentage,
    ProjectDomain, ProjectDraft, ProjectId, Student, StudentId, StudentYear, TeamPolicy,
    UniversityId, VerificationStatus,
};
use crate::workflows::projects::lifecycle;
use crate::workflows::projects::repository::{ProjectRecord, ProjectRepository, RepositoryError};
use crate::workflows::projects::router::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
use crate::workflows::projects::{project_router, ProjectService};

pub(super) const UNIVERSITY: &str = "uni-north";
pub(super) const OTHER_UNIVERSITY: &str = "uni-south";
pub(super) const COMPANY: &str = "acme-labs";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn company() -> Actor {
    Actor::Company(CompanyId(COMPANY.to_string()))
}

pub(super) fn university() -> Actor {
    Actor::University(UniversityId(UNIVERSITY.to_string()))
}

pub(super) fn other_university() -> Actor {
    Actor::University(UniversityId(OTHER_UNIVERSITY.to_string()))
}

pub(super) fn student_actor(id: &str) -> Actor {
    Actor::Student(StudentId(id.to_string()))
}

pub(super) fn student(id: &str) -> Student {
    Student {
        id: StudentId(id.to_string()),
        usn: format!("1NR22CS-{id}"),
        name: format!("Student {id}"),
        university: Some(UniversityId(UNIVERSITY.to_string())),
        department: "Computer Science".to_string(),
        year: StudentYear::Third,
        gpa: Some(8.5),
        verification: VerificationStatus::Approved,
    }
}

pub(super) fn student_with_gpa(id: &str, gpa: f32) -> Student {
    Student {
        gpa: Some(gpa),
        ..student(id)
    }
}

pub(super) fn project_draft() -> ProjectDraft {
    ProjectDraft {
        university: Some(UniversityId(UNIVERSITY.to_string())),
        title: "Campus energy dashboard".to_string(),
        domain: ProjectDomain::Coding,
        description: "Visualise building energy use across campus".to_string(),
        required_skills: vec!["rust".to_string(), "sql".to_string()],
        team: TeamPolicy::Individual,
        job_type: JobType::Remote,
        eligibility: EligibilityCriteria::default(),
        payment_type: PaymentType::Milestone,
        payment_amount: 40_000,
        duration_weeks: 8,
        deadline: NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date"),
        attachment: None,
    }
}

pub(super) fn gpa_restricted_draft(min_gpa: f32) -> ProjectDraft {
    let mut draft = project_draft();
    draft.eligibility = EligibilityCriteria {
        departments: ["Computer Science".to_string()].into_iter().collect(),
        years: [StudentYear::Third, StudentYear::Fourth].into_iter().collect(),
        min_gpa: Some(min_gpa),
    };
    draft
}

pub(super) fn team_draft(size: u8) -> ProjectDraft {
    ProjectDraft {
        team: TeamPolicy::Team { size },
        ..project_draft()
    }
}

pub(super) fn fixed_draft() -> ProjectDraft {
    ProjectDraft {
        payment_type: PaymentType::Fixed,
        ..project_draft()
    }
}

pub(super) fn application(cover_letter: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        cover_letter: cover_letter.to_string(),
        proposed_approach: Some("Weekly iterations".to_string()),
        portfolio_links: vec!["https://example.org/portfolio".to_string()],
        team_members: Vec::new(),
    }
}

pub(super) fn team_application(members: &[&str]) -> ApplicationSubmission {
    ApplicationSubmission {
        team_members: members
            .iter()
            .map(|member| StudentId(member.to_string()))
            .collect(),
        ..application("We work well together")
    }
}

pub(super) fn milestone_draft(title: &str, percentage: u8) -> MilestoneDraft {
    MilestoneDraft {
        title: title.to_string(),
        description: String::new(),
        order: None,
        payment_percentage: Percentage::whole(percentage).expect("valid percentage"),
        due_date: NaiveDate::from_ymd_opt(2025, 11, 1).expect("valid date"),
    }
}

pub(super) fn deliverable_draft(milestone_id: Option<&MilestoneId>) -> DeliverableDraft {
    DeliverableDraft {
        milestone_id: milestone_id.cloned(),
        title: "Sprint report".to_string(),
        description: "Progress for the sprint".to_string(),
        file_ref: "files/sprint-report.pdf".to_string(),
        submission_notes: None,
    }
}

/// University-posted project record, open immediately.
pub(super) fn open_record(draft: ProjectDraft) -> ProjectRecord {
    let project = lifecycle::create_project(
        &university(),
        ProjectId("prj-test".to_string()),
        draft,
        now(),
    )
    .expect("university posting succeeds");
    ProjectRecord::new(project)
}

/// Open record with `student` accepted, leaving the project in progress.
pub(super) fn in_progress_record(draft: ProjectDraft, student: &Student) -> ProjectRecord {
    let mut record = open_record(draft);
    let id = ApplicationId(format!("app-{}", student.id));
    let submitted = applications::submit_application(
        &record,
        student,
        &[],
        id.clone(),
        application("Keen to help"),
        now(),
    )
    .expect("eligible student can apply");
    record.applications.push(submitted);
    applications::transition_application(
        &mut record,
        &id,
        ApplicationStatus::Accepted,
        &university(),
        now(),
    )
    .expect("owner accepts");
    record
}

pub(super) fn build_service(
    students: impl IntoIterator<Item = Student>,
) -> (ProjectService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::with_students(students));
    let service = ProjectService::new(repository.clone());
    (service, repository)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ProjectId, ProjectRecord>>>,
    students: Arc<Mutex<HashMap<StudentId, Student>>>,
}

impl MemoryRepository {
    pub(super) fn with_students(students: impl IntoIterator<Item = Student>) -> Self {
        let repository = Self::default();
        {
            let mut guard = repository.students.lock().expect("student mutex poisoned");
            for student in students {
                guard.insert(student.id.clone(), student);
            }
        }
        repository
    }

    pub(super) fn stored(&self, id: &ProjectId) -> ProjectRecord {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
            .expect("record stored")
    }
}

impl ProjectRepository for MemoryRepository {
    fn insert(&self, record: ProjectRecord) -> Result<ProjectRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.project.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.project.id.clone(), record.clone());
        Ok(record)
    }

    fn save(
        &self,
        mut record: ProjectRecord,
        expected_version: u64,
    ) -> Result<ProjectRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard
            .get(&record.project.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::Conflict);
        }
        record.version = expected_version + 1;
        guard.insert(record.project.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<ProjectRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn project_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ProjectId>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|record| record.application(id).is_some())
            .map(|record| record.project.id.clone()))
    }

    fn fetch_student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        let guard = self.students.lock().expect("student mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

/// Reads succeed but every save loses the compare-and-set race.
pub(super) struct ConflictRepository {
    pub(super) inner: MemoryRepository,
}

impl ProjectRepository for ConflictRepository {
    fn insert(&self, record: ProjectRecord) -> Result<ProjectRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn save(
        &self,
        _record: ProjectRecord,
        _expected_version: u64,
    ) -> Result<ProjectRecord, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn fetch(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self) -> Result<Vec<ProjectRecord>, RepositoryError> {
        self.inner.list()
    }

    fn project_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ProjectId>, RepositoryError> {
        self.inner.project_for_application(id)
    }

    fn fetch_student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        self.inner.fetch_student(id)
    }
}

pub(super) struct UnavailableRepository;

impl ProjectRepository for UnavailableRepository {
    fn insert(&self, _record: ProjectRecord) -> Result<ProjectRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn save(
        &self,
        _record: ProjectRecord,
        _expected_version: u64,
    ) -> Result<ProjectRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ProjectId) -> Result<Option<ProjectRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<ProjectRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn project_for_application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<ProjectId>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_student(&self, _id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn router_with_service(service: ProjectService<MemoryRepository>) -> axum::Router {
    project_router(Arc::new(service))
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    actor: Option<&Actor>,
    body: &Value,
) -> Request<axum::body::Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(actor) = actor {
        builder = builder
            .header(ACTOR_ROLE_HEADER, actor.role().label())
            .header(ACTOR_ID_HEADER, actor.id());
    }
    builder
        .body(axum::body::Body::from(
            serde_json::to_vec(body).expect("serialize body"),
        ))
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
