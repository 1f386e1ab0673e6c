use campus_gig::error::AppError;
use campus_gig::workflows::projects::{
    ApplicationId, ProjectId, ProjectRecord, ProjectRepository, RepositoryError, Student,
    StudentId, StudentRosterImporter,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local project store. Each save is a compare-and-set on the record version.
#[derive(Default, Clone)]
pub(crate) struct InMemoryProjectRepository {
    records: Arc<Mutex<HashMap<ProjectId, ProjectRecord>>>,
    students: Arc<Mutex<HashMap<StudentId, Student>>>,
}

impl InMemoryProjectRepository {
    pub(crate) fn register_student(&self, student: Student) {
        self.students
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(student.id.clone(), student);
    }

    /// Loads a roster export and registers every student in it.
    pub(crate) fn seed_roster(&self, path: &Path) -> Result<usize, AppError> {
        let students = StudentRosterImporter::from_path(path)?;
        let count = students.len();
        for student in students {
            self.register_student(student);
        }
        info!(roster = %path.display(), students = count, "student roster loaded");
        Ok(count)
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<ProjectId, ProjectRecord>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("project store lock poisoned".to_string()))
    }
}

impl ProjectRepository for InMemoryProjectRepository {
    fn insert(&self, record: ProjectRecord) -> Result<ProjectRecord, RepositoryError> {
        let mut guard = self.records()?;
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
        let mut guard = self.records()?;
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
        Ok(self.records()?.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<ProjectRecord>, RepositoryError> {
        let mut records: Vec<_> = self.records()?.values().cloned().collect();
        records.sort_by(|left, right| left.project.created_at.cmp(&right.project.created_at));
        Ok(records)
    }

    fn project_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ProjectId>, RepositoryError> {
        Ok(self
            .records()?
            .values()
            .find(|record| record.application(id).is_some())
            .map(|record| record.project.id.clone()))
    }

    fn fetch_student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self
            .students
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}
