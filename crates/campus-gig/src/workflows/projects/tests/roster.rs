use crate::workflows::projects::domain::{StudentId, StudentYear, UniversityId, VerificationStatus};
use crate::workflows::projects::roster::{RosterImportError, StudentRosterImporter};

const ROSTER: &str = "\
USN,Name,University,Department,Year,GPA,Verification
1NR22CS001, Asha Rao ,uni-north,Computer Science,3,8.7,approved
1NR22ME014,Bo Lin,uni-north,Mechanical,graduate,,
1NR23EC020,Cy Das,,Electronics,1,6.25,Rejected
";

#[test]
fn parses_roster_rows_into_students() {
    let students = StudentRosterImporter::from_reader(ROSTER.as_bytes()).expect("roster parses");
    assert_eq!(students.len(), 3);

    let asha = &students[0];
    assert_eq!(asha.id, StudentId("1NR22CS001".to_string()));
    assert_eq!(asha.name, "Asha Rao");
    assert_eq!(asha.university, Some(UniversityId("uni-north".to_string())));
    assert_eq!(asha.year, StudentYear::Third);
    assert_eq!(asha.gpa, Some(8.7));
    assert_eq!(asha.verification, VerificationStatus::Approved);

    let bo = &students[1];
    assert_eq!(bo.year, StudentYear::Graduate);
    assert_eq!(bo.gpa, None);
    assert_eq!(bo.verification, VerificationStatus::Pending);

    let cy = &students[2];
    assert_eq!(cy.university, None);
    assert_eq!(cy.verification, VerificationStatus::Rejected);
}

#[test]
fn rejects_out_of_range_gpa_with_line_number() {
    let roster = "\
USN,Name,University,Department,Year,GPA,Verification
1NR22CS001,Asha Rao,uni-north,Computer Science,3,8.7,approved
1NR22CS002,Dee Roy,uni-north,Computer Science,2,11.5,approved
";
    match StudentRosterImporter::from_reader(roster.as_bytes()) {
        Err(RosterImportError::InvalidRow { line, reason }) => {
            assert_eq!(line, 3);
            assert!(reason.contains("1NR22CS002"), "reason: {reason}");
        }
        other => panic!("expected invalid row, got {other:?}"),
    }
}

#[test]
fn rejects_unknown_year() {
    let roster = "\
USN,Name,University,Department,Year,GPA,Verification
1NR22CS001,Asha Rao,uni-north,Computer Science,fifth,8.7,approved
";
    let err = StudentRosterImporter::from_reader(roster.as_bytes()).expect_err("invalid year");
    assert!(err.to_string().contains("unknown year"));
}

#[test]
fn missing_file_surfaces_io_error() {
    let err = StudentRosterImporter::from_path("/nonexistent/roster.csv")
        .expect_err("file does not exist");
    assert!(matches!(err, RosterImportError::Io(_)));
}
