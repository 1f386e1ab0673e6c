//! End-to-end scenarios for the project lifecycle through the public service facade and
//! HTTP router.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::NaiveDate;

    use campus_gig::workflows::projects::{
        Actor, ApplicationId, CompanyId, EligibilityCriteria, JobType, MilestoneDraft,
        PaymentType, Percentage, ProjectDomain, ProjectDraft, ProjectId, ProjectRecord,
        ProjectRepository, ProjectService, RepositoryError, Student, StudentId, StudentYear,
        TeamPolicy, UniversityId, VerificationStatus,
    };

    pub(super) const UNIVERSITY: &str = "rvce";

    pub(super) fn university() -> Actor {
        Actor::University(UniversityId(UNIVERSITY.to_string()))
    }

    pub(super) fn company() -> Actor {
        Actor::Company(CompanyId("northwind".to_string()))
    }

    pub(super) fn student_actor(id: &str) -> Actor {
        Actor::Student(StudentId(id.to_string()))
    }

    pub(super) fn student(id: &str, department: &str, year: StudentYear, gpa: f32) -> Student {
        Student {
            id: StudentId(id.to_string()),
            usn: id.to_uppercase(),
            name: id.to_string(),
            university: Some(UniversityId(UNIVERSITY.to_string())),
            department: department.to_string(),
            year,
            gpa: Some(gpa),
            verification: VerificationStatus::Approved,
        }
    }

    pub(super) fn draft(payment_type: PaymentType, team: TeamPolicy) -> ProjectDraft {
        ProjectDraft {
            university: Some(UniversityId(UNIVERSITY.to_string())),
            title: "Supply chain forecasting".to_string(),
            domain: ProjectDomain::DataAnalysis,
            description: "Forecast weekly demand for a regional distributor".to_string(),
            required_skills: vec!["python".to_string(), "statistics".to_string()],
            team,
            job_type: JobType::Hybrid,
            eligibility: EligibilityCriteria {
                departments: ["Information Science".to_string()].into_iter().collect(),
                years: [StudentYear::Third, StudentYear::Fourth]
                    .into_iter()
                    .collect(),
                min_gpa: Some(8.0),
            },
            payment_type,
            payment_amount: 75_000,
            duration_weeks: 10,
            deadline: NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date"),
            attachment: Some("jd/northwind-forecasting.pdf".to_string()),
        }
    }

    pub(super) fn milestone(title: &str, percentage: u8) -> MilestoneDraft {
        MilestoneDraft {
            title: title.to_string(),
            description: format!("{title} checkpoint"),
            order: None,
            payment_percentage: Percentage::whole(percentage).expect("valid percentage"),
            due_date: NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date"),
        }
    }

    #[derive(Default)]
    pub(super) struct InMemoryRepository {
        records: Mutex<HashMap<ProjectId, ProjectRecord>>,
        students: Mutex<HashMap<StudentId, Student>>,
    }

    impl InMemoryRepository {
        pub(super) fn register(&self, student: Student) {
            self.students
                .lock()
                .expect("student mutex poisoned")
                .insert(student.id.clone(), student);
        }
    }

    impl ProjectRepository for InMemoryRepository {
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
            match guard.get(&record.project.id) {
                Some(stored) if stored.version == expected_version => {}
                Some(_) => return Err(RepositoryError::Conflict),
                None => return Err(RepositoryError::NotFound),
            }
            record.version = expected_version + 1;
            guard.insert(record.project.id.clone(), record.clone());
            Ok(record)
        }

        fn fetch(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .expect("repository mutex poisoned")
                .get(id)
                .cloned())
        }

        fn list(&self) -> Result<Vec<ProjectRecord>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .expect("repository mutex poisoned")
                .values()
                .cloned()
                .collect())
        }

        fn project_for_application(
            &self,
            id: &ApplicationId,
        ) -> Result<Option<ProjectId>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .expect("repository mutex poisoned")
                .values()
                .find(|record| record.application(id).is_some())
                .map(|record| record.project.id.clone()))
        }

        fn fetch_student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
            Ok(self
                .students
                .lock()
                .expect("student mutex poisoned")
                .get(id)
                .cloned())
        }
    }

    pub(super) fn service() -> (Arc<ProjectService<InMemoryRepository>>, Arc<InMemoryRepository>) {
        let repository = Arc::new(InMemoryRepository::default());
        let service = Arc::new(ProjectService::new(repository.clone()));
        (service, repository)
    }
}

use axum::body::Body;
use axum::http::{Request, StatusCode};
use campus_gig::workflows::projects::{
    project_router, ApplicationStatus, ApplicationSubmission, DeliverableDecision,
    DeliverableDraft, ErrorKind, PaymentType, ProjectStatus, ReviewDecision, StudentId,
    StudentYear, TeamPolicy,
};
use common::*;
use serde_json::{json, Value};
use tower::ServiceExt;

fn submission(team: &[&str]) -> ApplicationSubmission {
    ApplicationSubmission {
        cover_letter: "I have built demand forecasts before".to_string(),
        proposed_approach: None,
        portfolio_links: Vec::new(),
        team_members: team
            .iter()
            .map(|member| StudentId(member.to_string()))
            .collect(),
    }
}

#[test]
fn company_posting_is_reviewed_staffed_and_completed_by_milestones() {
    let (service, repository) = service();
    repository.register(student("meera", "Information Science", StudentYear::Third, 8.5));
    repository.register(student("ravi", "Information Science", StudentYear::Third, 7.5));

    let created = service
        .create_project(
            &company(),
            draft(PaymentType::Milestone, TeamPolicy::Individual),
        )
        .expect("company posts a draft");
    let project_id = created.project.id.clone();
    assert_eq!(created.project.status(), ProjectStatus::Draft);

    let early = service.submit_application(&student_actor("meera"), &project_id, submission(&[]));
    assert_eq!(early.map_err(|err| err.kind()).err(), Some(ErrorKind::Validation));

    service
        .submit_for_review(&company(), &project_id)
        .expect("submitted for review");
    let rejected = service
        .review_project(
            &university(),
            &project_id,
            ReviewDecision::Reject {
                reason: Some("Clarify deliverables".to_string()),
            },
        )
        .expect("rejected");
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Clarify deliverables"));

    service
        .submit_for_review(&company(), &project_id)
        .expect("resubmitted");
    service
        .review_project(&university(), &project_id, ReviewDecision::Approve)
        .expect("approved");

    let low = service.submit_application(&student_actor("ravi"), &project_id, submission(&[]));
    assert_eq!(low.map_err(|err| err.kind()).err(), Some(ErrorKind::Validation));

    let application = service
        .submit_application(&student_actor("meera"), &project_id, submission(&[]))
        .expect("eligible student applies");
    assert_eq!(application.status(), ApplicationStatus::Pending);

    service
        .transition_application(&company(), &application.id, ApplicationStatus::Shortlisted)
        .expect("shortlisted");
    let accepted = service
        .transition_application(&company(), &application.id, ApplicationStatus::Accepted)
        .expect("accepted");
    assert_eq!(accepted.project_status, ProjectStatus::InProgress);

    let analysis = service
        .add_milestone(&company(), &project_id, milestone("Analysis", 60))
        .expect("analysis milestone");
    let model = service
        .add_milestone(&company(), &project_id, milestone("Model", 40))
        .expect("model milestone");
    let overflow = service.add_milestone(&company(), &project_id, milestone("Extra", 10));
    assert_eq!(
        overflow.map_err(|err| err.kind()).err(),
        Some(ErrorKind::Validation)
    );

    for milestone in [&analysis, &model] {
        service
            .submit_deliverable(
                &student_actor("meera"),
                &project_id,
                DeliverableDraft {
                    milestone_id: Some(milestone.id.clone()),
                    title: format!("{} report", milestone.title),
                    description: String::new(),
                    file_ref: format!("files/{}.pdf", milestone.id),
                    submission_notes: None,
                },
            )
            .expect("deliverable submitted");
        service
            .approve_milestone(&company(), &project_id, &milestone.id)
            .expect("milestone approved");
    }

    let record = service.get_project(&project_id).expect("project stored");
    assert_eq!(record.project.status(), ProjectStatus::Completed);
    assert!(service.is_project_complete(&project_id).expect("ledger"));

    let path: Vec<_> = record
        .project
        .history()
        .iter()
        .map(|entry| entry.to)
        .collect();
    assert_eq!(
        path,
        vec![
            ProjectStatus::Draft,
            ProjectStatus::PendingReview,
            ProjectStatus::Rejected,
            ProjectStatus::PendingReview,
            ProjectStatus::Open,
            ProjectStatus::InProgress,
            ProjectStatus::Completed,
        ]
    );
}

#[test]
fn team_project_accepts_whole_teams_and_rejects_ineligible_members() {
    let (service, repository) = service();
    repository.register(student("asha", "Information Science", StudentYear::Fourth, 9.1));
    repository.register(student("bo", "Information Science", StudentYear::Third, 8.2));
    repository.register(student("cy", "Mechanical", StudentYear::Third, 9.0));

    let project = service
        .create_project(
            &university(),
            draft(PaymentType::Fixed, TeamPolicy::Team { size: 3 }),
        )
        .expect("university posts");
    let project_id = project.project.id.clone();
    assert_eq!(project.project.status(), ProjectStatus::Open);

    let mixed = service.submit_application(&student_actor("asha"), &project_id, submission(&["cy"]));
    assert_eq!(mixed.map_err(|err| err.kind()).err(), Some(ErrorKind::Validation));

    let team = service
        .submit_application(&student_actor("asha"), &project_id, submission(&["bo"]))
        .expect("eligible team applies");
    assert!(team.is_team_application());

    service
        .transition_application(&university(), &team.id, ApplicationStatus::Accepted)
        .expect("team accepted");
    let record = service.get_project(&project_id).expect("stored");
    assert_eq!(record.project.assigned_students().len(), 2);

    let deliverable = service
        .submit_deliverable(
            &student_actor("bo"),
            &project_id,
            DeliverableDraft {
                milestone_id: None,
                title: "Final model".to_string(),
                description: String::new(),
                file_ref: "files/final.ipynb".to_string(),
                submission_notes: Some("Includes evaluation".to_string()),
            },
        )
        .expect("team member submits");
    service
        .review_deliverable(
            &university(),
            &project_id,
            &deliverable.id,
            DeliverableDecision::Approve { feedback: None },
        )
        .expect("approved");

    let completed = service
        .complete_project(&university(), &project_id)
        .expect("owner completes fixed-price project");
    assert_eq!(completed.status(), ProjectStatus::Completed);
}

#[tokio::test]
async fn http_surface_maps_lifecycle_errors() {
    let (service, repository) = service();
    repository.register(student("meera", "Information Science", StudentYear::Third, 8.5));
    let router = project_router(service);

    let body = serde_json::to_vec(&draft(PaymentType::Milestone, TeamPolicy::Individual))
        .expect("serialize draft");
    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/projects")
                .header("content-type", "application/json")
                .header("x-actor-role", "company")
                .header("x-actor-id", "northwind")
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = serde_json::from_slice(
        &axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body"),
    )
    .expect("json");
    assert_eq!(created["status"], json!("draft"));
    let project_id = created["project_id"].as_str().expect("id").to_string();

    let cancel = router
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/projects/{project_id}/cancel"))
                .header("x-actor-role", "company")
                .header("x-actor-id", "northwind")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(cancel.status(), StatusCode::CONFLICT);

    let review = router
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/projects/{project_id}/review"))
                .header("content-type", "application/json")
                .header("x-actor-role", "student")
                .header("x-actor-id", "meera")
                .body(Body::from(json!({ "decision": "approve" }).to_string()))
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(review.status(), StatusCode::FORBIDDEN);

    let anonymous = router
        .oneshot(
            Request::post(format!("/api/v1/projects/{project_id}/submit"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}
