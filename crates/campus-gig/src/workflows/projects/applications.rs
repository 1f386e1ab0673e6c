//! Application state machine.
//!
//! `pending → {shortlisted, accepted, rejected, withdrawn}`,
//! `shortlisted → {accepted, rejected, withdrawn}`; the rest are terminal.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::domain::{
    Actor, ApplicationId, ApplicationStatus, ApplicationSubmission, ProjectApplication,
    ProjectStatus, Student, StudentId,
};
use super::eligibility::evaluate_eligibility;
use super::errors::{AuthorizationError, ProjectError, StateError, ValidationError};
use super::repository::ProjectRecord;

impl ApplicationStatus {
    pub const fn allowed_transitions(self) -> &'static [ApplicationStatus] {
        match self {
            ApplicationStatus::Pending => &[
                ApplicationStatus::Shortlisted,
                ApplicationStatus::Accepted,
                ApplicationStatus::Rejected,
                ApplicationStatus::Withdrawn,
            ],
            ApplicationStatus::Shortlisted => &[
                ApplicationStatus::Accepted,
                ApplicationStatus::Rejected,
                ApplicationStatus::Withdrawn,
            ],
            ApplicationStatus::Accepted
            | ApplicationStatus::Rejected
            | ApplicationStatus::Withdrawn => &[],
        }
    }

    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

/// Result of an application transition, including any project status change it caused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationTransition {
    pub application: ProjectApplication,
    pub project_status: ProjectStatus,
    pub project_started: bool,
}

/// Validate and build a new application from `applicant` (and `team` for team projects).
///
/// A team application is rejected as a whole when any member is ineligible.
pub(crate) fn submit_application(
    record: &ProjectRecord,
    applicant: &Student,
    team: &[Student],
    id: ApplicationId,
    submission: ApplicationSubmission,
    now: DateTime<Utc>,
) -> Result<ProjectApplication, ProjectError> {
    let project = &record.project;

    if project.status != ProjectStatus::Open {
        return Err(ValidationError::ProjectNotOpen {
            status: project.status,
        }
        .into());
    }

    if submission.cover_letter.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "cover_letter",
            reason: "must not be empty".to_string(),
        }
        .into());
    }

    if !team.is_empty() {
        if project.team.is_individual() {
            return Err(ValidationError::TeamApplicationNotAllowed.into());
        }

        let requested = team.len() + 1;
        let capacity = project.team.capacity();
        if requested > capacity {
            return Err(ValidationError::TeamTooLarge {
                requested,
                capacity,
            }
            .into());
        }

        let mut seen = BTreeSet::from([applicant.id.clone()]);
        for member in team {
            if !seen.insert(member.id.clone()) {
                return Err(ValidationError::InvalidTeamMember {
                    student_id: member.id.clone(),
                }
                .into());
            }
        }
    }

    let reasons = evaluate_eligibility(applicant, project);
    if !reasons.is_empty() {
        return Err(ValidationError::Ineligible {
            student_id: applicant.id.clone(),
            reasons,
        }
        .into());
    }

    for member in team {
        let reasons = evaluate_eligibility(member, project);
        if !reasons.is_empty() {
            return Err(ValidationError::TeamMemberIneligible {
                student_id: member.id.clone(),
                reasons,
            }
            .into());
        }
    }

    if project.team.is_individual() {
        let duplicate = record.applications.iter().any(|existing| {
            existing.student_id == applicant.id && !existing.status.is_terminal()
        });
        if duplicate {
            return Err(ValidationError::DuplicateApplication {
                student_id: applicant.id.clone(),
            }
            .into());
        }
    }

    Ok(ProjectApplication {
        id,
        project_id: project.id.clone(),
        student_id: applicant.id.clone(),
        cover_letter: submission.cover_letter,
        proposed_approach: submission.proposed_approach,
        portfolio_links: submission.portfolio_links,
        team_members: team.iter().map(|member| member.id.clone()).collect(),
        status: ApplicationStatus::Pending,
        created_at: now,
        reviewed_at: None,
    })
}

/// Move an application along one edge on behalf of `actor`.
///
/// Owner decisions (shortlist, accept, reject) belong to the project owner; withdrawal
/// belongs to the applicant. Acceptance assigns every member and starts an open project
/// in the same mutation.
pub(crate) fn transition_application(
    record: &mut ProjectRecord,
    application_id: &ApplicationId,
    to: ApplicationStatus,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<ApplicationTransition, ProjectError> {
    let application = record
        .application(application_id)
        .ok_or_else(|| ProjectError::not_found("application", application_id))?;
    let from = application.status;

    match to {
        ApplicationStatus::Shortlisted
        | ApplicationStatus::Accepted
        | ApplicationStatus::Rejected => {
            record
                .project
                .ensure_owner(actor, "decide on applications")?;
        }
        ApplicationStatus::Withdrawn => {
            let applicant = matches!(actor, Actor::Student(student) if *student == application.student_id);
            if !applicant {
                return Err(AuthorizationError::new(actor, "withdraw the application").into());
            }
        }
        ApplicationStatus::Pending => {}
    }

    if !from.can_transition_to(to) {
        return Err(StateError::Application { from, to }.into());
    }

    let mut project_started = false;
    if to == ApplicationStatus::Accepted {
        let members: Vec<StudentId> = application.members().cloned().collect();
        project_started = assign_members(record, &members, actor, application_id, now)?;
    }

    let application = record
        .application_mut(application_id)
        .ok_or_else(|| ProjectError::not_found("application", application_id))?;
    application.status = to;
    if to != ApplicationStatus::Withdrawn {
        application.reviewed_at = Some(now);
    }
    let application = application.clone();

    info!(
        project_id = %record.project.id,
        application_id = %application_id,
        %from,
        %to,
        actor = %actor,
        "application transition"
    );

    Ok(ApplicationTransition {
        application,
        project_status: record.project.status,
        project_started,
    })
}

fn assign_members(
    record: &mut ProjectRecord,
    members: &[StudentId],
    actor: &Actor,
    application_id: &ApplicationId,
    now: DateTime<Utc>,
) -> Result<bool, ProjectError> {
    let project = &record.project;
    let capacity = project.team.capacity();

    match project.status {
        ProjectStatus::Open => {}
        ProjectStatus::InProgress if !project.team.is_individual() => {}
        ProjectStatus::InProgress => return Err(ValidationError::PositionFilled.into()),
        status => {
            return Err(StateError::ProjectStatus {
                status,
                operation: "accept applications",
            }
            .into())
        }
    }

    let already_accepted = record
        .applications
        .iter()
        .any(|application| application.status == ApplicationStatus::Accepted);
    if project.team.is_individual() && already_accepted {
        return Err(ValidationError::PositionFilled.into());
    }

    let newcomers = members
        .iter()
        .filter(|member| !project.assigned_students.contains(*member))
        .count();
    if project.assigned_students.len() + newcomers > capacity {
        if project.assigned_students.len() >= capacity {
            return Err(ValidationError::PositionFilled.into());
        }
        return Err(ValidationError::TeamTooLarge {
            requested: project.assigned_students.len() + newcomers,
            capacity,
        }
        .into());
    }

    let start = project.status == ProjectStatus::Open;
    let project = &mut record.project;
    project.assigned_students.extend(members.iter().cloned());
    if start {
        project.advance(
            ProjectStatus::InProgress,
            actor,
            now,
            Some(format!("application {application_id} accepted")),
        )?;
    }
    Ok(start)
}
