//! Pure eligibility matching between students and project criteria.
//!
//! Evaluation never fails: malformed data (missing university, missing or non-finite
//! GPA) yields a reason instead of an error so the same checks can drive list filtering.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{
    EligibilityCriteria, Project, ProjectStatus, Student, StudentYear, UniversityId,
    VerificationStatus,
};

/// Individual failed check. Evaluation reports every failed check, not only the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum IneligibilityReason {
    NoUniversity,
    DifferentUniversity {
        required: UniversityId,
    },
    Department {
        department: String,
    },
    Year {
        year: StudentYear,
    },
    GpaBelowMinimum {
        gpa: Option<f32>,
        minimum: f32,
    },
    NotVerified {
        status: VerificationStatus,
    },
}

impl fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibilityReason::NoUniversity => write!(f, "student has not selected a university"),
            IneligibilityReason::DifferentUniversity { required } => {
                write!(f, "project is limited to university {required}")
            }
            IneligibilityReason::Department { department } => {
                write!(f, "department '{department}' is not eligible")
            }
            IneligibilityReason::Year { year } => write!(f, "year {year} is not eligible"),
            IneligibilityReason::GpaBelowMinimum { gpa, minimum } => match gpa {
                Some(gpa) => write!(f, "GPA {gpa:.2} below minimum {minimum:.2}"),
                None => write!(f, "GPA missing; minimum {minimum:.2} required"),
            },
            IneligibilityReason::NotVerified { status } => {
                write!(f, "student verification is {}", status.label())
            }
        }
    }
}

impl EligibilityCriteria {
    pub fn admits_department(&self, department: &str) -> bool {
        if self.departments.is_empty() {
            return true;
        }
        let wanted = department.trim();
        self.departments
            .iter()
            .any(|allowed| allowed.trim().eq_ignore_ascii_case(wanted))
    }

    pub fn admits_year(&self, year: StudentYear) -> bool {
        self.years.is_empty() || self.years.contains(&year)
    }

    pub fn admits_gpa(&self, gpa: Option<f32>) -> bool {
        match (self.min_gpa, gpa) {
            (None, _) => true,
            (Some(minimum), Some(gpa)) => gpa >= minimum,
            (Some(_), None) => false,
        }
    }
}

/// Every check the student fails for this project; empty means eligible.
pub fn evaluate_eligibility(student: &Student, project: &Project) -> Vec<IneligibilityReason> {
    let mut reasons = Vec::new();
    let criteria = &project.eligibility;

    match &student.university {
        None => reasons.push(IneligibilityReason::NoUniversity),
        Some(university) if *university != project.university => {
            reasons.push(IneligibilityReason::DifferentUniversity {
                required: project.university.clone(),
            })
        }
        Some(_) => {}
    }

    if !criteria.admits_department(&student.department) {
        reasons.push(IneligibilityReason::Department {
            department: student.department.clone(),
        });
    }

    if !criteria.admits_year(student.year) {
        reasons.push(IneligibilityReason::Year { year: student.year });
    }

    if let Some(minimum) = criteria.min_gpa {
        if !criteria.admits_gpa(student.gpa) {
            reasons.push(IneligibilityReason::GpaBelowMinimum {
                gpa: student.gpa,
                minimum,
            });
        }
    }

    if student.verification != VerificationStatus::Approved {
        reasons.push(IneligibilityReason::NotVerified {
            status: student.verification,
        });
    }

    reasons
}

pub fn is_eligible(student: &Student, project: &Project) -> bool {
    evaluate_eligibility(student, project).is_empty()
}

/// Open projects the student may apply to.
pub fn eligible_projects<'a, I>(student: &Student, projects: I) -> Vec<&'a Project>
where
    I: IntoIterator<Item = &'a Project>,
{
    projects
        .into_iter()
        .filter(|project| project.status == ProjectStatus::Open)
        .filter(|project| is_eligible(student, project))
        .collect()
}
