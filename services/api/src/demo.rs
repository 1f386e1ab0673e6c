use crate::infra::InMemoryProjectRepository;
use campus_gig::error::AppError;
use campus_gig::workflows::projects::{
    evaluate_eligibility, Actor, ApplicationStatus, ApplicationSubmission, CompanyId,
    DeliverableDecision, DeliverableDraft, EligibilityCriteria, JobType, LedgerSummary,
    MilestoneDraft, PaymentType, Percentage, ProjectDomain, ProjectDraft, ProjectError,
    ProjectId, ProjectRecord, ProjectService, ReviewDecision, Student, StudentRosterImporter,
    StudentYear, TeamPolicy, UniversityId, ValidationError,
};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_UNIVERSITY: &str = "rvce";
const DEMO_COMPANY: &str = "northwind";

const BUILT_IN_ROSTER: &str = "\
USN,Name,University,Department,Year,GPA,Verification
1RV22IS014,Meera Iyer,rvce,Information Science,3,8.6,approved
1RV22IS027,Ravi Kumar,rvce,Information Science,3,7.5,approved
1RV21IS003,Asha Rao,rvce,Information Science,4,9.1,approved
1RV22ME041,Cyrus Patel,rvce,Mechanical,3,9.0,approved
1RV23CS008,Lena Fischer,,Computer Science,2,8.8,pending
";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Student roster CSV. Defaults to a small built-in roster.
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// Print every project status transition at the end of the demo.
    #[arg(long)]
    pub(crate) show_history: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let repository = Arc::new(InMemoryProjectRepository::default());
    let students = match args.roster.as_deref() {
        Some(path) => StudentRosterImporter::from_path(path)?,
        None => StudentRosterImporter::from_reader(Cursor::new(BUILT_IN_ROSTER))?,
    };
    for student in &students {
        repository.register_student(student.clone());
    }
    let service = ProjectService::new(repository);

    let university = Actor::University(UniversityId(DEMO_UNIVERSITY.to_string()));
    let company = Actor::Company(CompanyId(DEMO_COMPANY.to_string()));
    let today = Local::now().date_naive();

    println!("Campus project lifecycle demo");
    println!("Roster: {} students", students.len());

    let research = service.create_project(&university, research_draft(today))?;
    println!(
        "\nUniversity posting '{}' is {}",
        research.project.title,
        research.project.status()
    );

    let posting = service.create_project(&company, forecasting_draft(today))?;
    let project_id = posting.project.id.clone();
    println!(
        "Company posting '{}' starts as {}",
        posting.project.title,
        posting.project.status()
    );
    service.submit_for_review(&company, &project_id)?;
    let reviewed = service.review_project(&university, &project_id, ReviewDecision::Approve)?;
    println!("After university review it is {}", reviewed.status());

    render_eligibility(&service, &students, &project_id)?;

    println!("\nApplications");
    let mut accepted = None;
    for student in &students {
        let actor = Actor::Student(student.id.clone());
        match service.submit_application(&actor, &project_id, cover_letter(student)) {
            Ok(application) if accepted.is_none() => {
                println!("  {} applied ({})", student.name, application.status());
                let outcome = service.transition_application(
                    &company,
                    &application.id,
                    ApplicationStatus::Accepted,
                )?;
                println!(
                    "  {} accepted, project now {}",
                    student.name, outcome.project_status
                );
                accepted = Some(student.clone());
            }
            Ok(application) => println!("  {} applied ({})", student.name, application.status()),
            Err(err) => println!("  {} could not apply: {err}", student.name),
        }
    }

    let Some(assignee) = accepted else {
        println!("\nNo eligible applicant; milestone ledger skipped");
        return Ok(());
    };

    println!("\nMilestone ledger");
    let mut milestones = Vec::new();
    for (title, share) in [("Data audit", 60.0), ("Forecast model", 40.0)] {
        let draft = milestone(title, share, today)?;
        let milestone = service.add_milestone(&company, &project_id, draft)?;
        println!("  added '{}' at {}", milestone.title, milestone.payment_percentage);
        milestones.push(milestone);
    }
    let stretch = milestone("Stretch goal", 10.0, today)?;
    if let Err(err) = service.add_milestone(&company, &project_id, stretch) {
        println!("  'Stretch goal' refused: {err}");
    }
    render_ledger(&service.ledger(&project_id)?);

    let worker = Actor::Student(assignee.id.clone());
    for (index, milestone) in milestones.iter().enumerate() {
        let deliverable = service.submit_deliverable(
            &worker,
            &project_id,
            DeliverableDraft {
                milestone_id: Some(milestone.id.clone()),
                title: format!("{} handoff", milestone.title),
                description: String::new(),
                file_ref: format!("deliverables/{}.zip", milestone.id),
                submission_notes: None,
            },
        )?;
        // The first milestone is closed by approving its deliverable, the second directly.
        if index == 0 {
            service.review_deliverable(
                &company,
                &project_id,
                &deliverable.id,
                DeliverableDecision::Approve { feedback: None },
            )?;
        } else {
            service.approve_milestone(&company, &project_id, &milestone.id)?;
        }
        let ledger = service.ledger(&project_id)?;
        println!(
            "  '{}' approved, {} of {} paid out",
            milestone.title, ledger.approved, ledger.allocated
        );
    }

    let record = service.get_project(&project_id)?;
    println!(
        "\n'{}' finished as {} (complete: {})",
        record.project.title,
        record.project.status(),
        service.is_project_complete(&project_id)?
    );
    if args.show_history {
        render_history(&record);
    }

    Ok(())
}

fn render_eligibility(
    service: &ProjectService<InMemoryProjectRepository>,
    students: &[Student],
    project_id: &ProjectId,
) -> Result<(), AppError> {
    let project = service.get_project(project_id)?.project;
    println!("\nEligibility for '{}'", project.title);
    for student in students {
        let reasons = evaluate_eligibility(student, &project);
        let open = service.eligible_projects(&student.id)?.len();
        if reasons.is_empty() {
            println!("  {:<14} eligible ({open} open projects match)", student.name);
        } else {
            let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
            println!("  {:<14} ineligible: {}", student.name, reasons.join("; "));
        }
    }
    Ok(())
}

fn render_ledger(summary: &LedgerSummary) {
    println!(
        "  allocated {} across {} milestones, {} remaining",
        summary.allocated, summary.milestones, summary.remaining
    );
}

fn render_history(record: &ProjectRecord) {
    println!("\nStatus history");
    for entry in record.project.history() {
        let from = entry
            .from
            .map(|status| status.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {:>14} -> {:<14} by {}",
            entry.at.format("%H:%M:%S"),
            from,
            entry.to,
            entry.actor
        );
    }
}

fn cover_letter(student: &Student) -> ApplicationSubmission {
    ApplicationSubmission {
        cover_letter: format!(
            "{} ({} year, {}) would like to join this project.",
            student.name, student.year, student.department
        ),
        proposed_approach: None,
        portfolio_links: Vec::new(),
        team_members: Vec::new(),
    }
}

fn milestone(title: &str, share: f64, today: NaiveDate) -> Result<MilestoneDraft, ProjectError> {
    let payment_percentage =
        Percentage::try_from(share).map_err(|err| ValidationError::InvalidField {
            field: "payment_percentage",
            reason: err.to_string(),
        })?;
    Ok(MilestoneDraft {
        title: title.to_string(),
        description: String::new(),
        order: None,
        payment_percentage,
        due_date: today + Duration::weeks(4),
    })
}

fn forecasting_draft(today: NaiveDate) -> ProjectDraft {
    ProjectDraft {
        university: Some(UniversityId(DEMO_UNIVERSITY.to_string())),
        title: "Demand forecasting pilot".to_string(),
        domain: ProjectDomain::DataAnalysis,
        description: "Forecast weekly demand for two regional warehouses".to_string(),
        required_skills: vec!["python".to_string(), "time series".to_string()],
        team: TeamPolicy::Individual,
        job_type: JobType::Hybrid,
        eligibility: EligibilityCriteria {
            departments: ["Information Science".to_string()].into_iter().collect(),
            years: [StudentYear::Third, StudentYear::Fourth].into_iter().collect(),
            min_gpa: Some(8.0),
        },
        payment_type: PaymentType::Milestone,
        payment_amount: 60_000,
        duration_weeks: 8,
        deadline: today + Duration::weeks(3),
        attachment: None,
    }
}

fn research_draft(today: NaiveDate) -> ProjectDraft {
    ProjectDraft {
        university: None,
        title: "Campus energy audit".to_string(),
        domain: ProjectDomain::Research,
        description: "Measure and report hostel energy consumption".to_string(),
        required_skills: vec!["excel".to_string()],
        team: TeamPolicy::Team { size: 3 },
        job_type: JobType::Onsite,
        eligibility: EligibilityCriteria::default(),
        payment_type: PaymentType::Fixed,
        payment_amount: 15_000,
        duration_weeks: 6,
        deadline: today + Duration::weeks(2),
        attachment: None,
    }
}
