//! CSV roster import for seeding student records.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{Student, StudentId, StudentYear, UniversityId, VerificationStatus};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, reason: String },
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read student roster: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
            RosterImportError::InvalidRow { line, reason } => {
                write!(f, "invalid roster row on line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads `USN,Name,University,Department,Year,GPA,Verification` rosters.
///
/// The USN doubles as the student identifier. Blank GPA and university cells are
/// treated as missing; blank verification defaults to pending.
pub struct StudentRosterImporter;

impl StudentRosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Student>, RosterImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Student>, RosterImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut students = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            let line = record
                .position()
                .map(|position| position.line())
                .unwrap_or_default();
            let row: RosterRow = record.deserialize(Some(&headers))?;
            students.push(row.into_student(line)?);
        }

        Ok(students)
    }
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "USN")]
    usn: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "University", default, deserialize_with = "empty_string_as_none")]
    university: Option<String>,
    #[serde(rename = "Department")]
    department: String,
    #[serde(rename = "Year")]
    year: String,
    #[serde(rename = "GPA", default, deserialize_with = "empty_string_as_none")]
    gpa: Option<String>,
    #[serde(
        rename = "Verification",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    verification: Option<String>,
}

impl RosterRow {
    fn into_student(self, line: u64) -> Result<Student, RosterImportError> {
        let invalid = |reason: String| RosterImportError::InvalidRow {
            line,
            reason: format!("{} ({})", reason, self.usn),
        };

        if self.usn.is_empty() {
            return Err(invalid("USN is required".to_string()));
        }

        let year = StudentYear::parse(&self.year)
            .ok_or_else(|| invalid(format!("unknown year '{}'", self.year)))?;

        let gpa = match self.gpa.as_deref() {
            None => None,
            Some(raw) => {
                let gpa = raw
                    .parse::<f32>()
                    .map_err(|_| invalid(format!("GPA '{raw}' is not a number")))?;
                if !(0.0..=10.0).contains(&gpa) {
                    return Err(invalid(format!("GPA {gpa} outside 0-10")));
                }
                Some(gpa)
            }
        };

        let verification = match self.verification.as_deref().map(str::to_ascii_lowercase) {
            None => VerificationStatus::Pending,
            Some(status) => match status.as_str() {
                "pending" => VerificationStatus::Pending,
                "approved" | "verified" => VerificationStatus::Approved,
                "rejected" => VerificationStatus::Rejected,
                other => return Err(invalid(format!("unknown verification '{other}'"))),
            },
        };

        Ok(Student {
            id: StudentId(self.usn.clone()),
            usn: self.usn.clone(),
            name: self.name.clone(),
            university: self.university.clone().map(UniversityId),
            department: self.department.clone(),
            year,
            gpa,
            verification,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
