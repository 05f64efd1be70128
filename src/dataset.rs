//! 学生・職業データセットの読み込み。

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};

/// One student row. Fields other than the vector are kept only for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub combined_vector: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Career {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// R, I, A, S, E, C affinities in `[0, 1]`.
    #[serde(default)]
    pub riasec: Vec<f64>,
    /// Display names of the skills the career asks for.
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub skills_vector: Vec<f64>,
    #[serde(default = "unknown_domain")]
    pub domain: String,
    #[serde(default = "unknown_salary")]
    pub salary_range: String,
    /// 埋め込みベクトル。空なら推薦対象外。
    #[serde(default)]
    pub embedding: Vec<f64>,
}

fn unknown_domain() -> String {
    "Unknown".to_string()
}

fn unknown_salary() -> String {
    "N/A".to_string()
}

/// Loads students; a missing file is an empty population. Rows without a vector are skipped.
///
/// # Errors
/// [`EngineError::Persistence`] for unreadable files, [`EngineError::Serialization`]
/// for malformed JSON.
pub fn load_students(path: &Path) -> EngineResult<Vec<StudentRecord>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "student dataset not found");
            return Ok(Vec::new());
        }
        Err(error) => return Err(EngineError::persistence(path, error)),
    };
    let records: Vec<StudentRecord> = serde_json::from_slice(&bytes)?;
    let total = records.len();
    let students: Vec<StudentRecord> = records
        .into_iter()
        .filter(|record| !record.combined_vector.is_empty())
        .collect();
    info!(
        path = %path.display(),
        loaded = students.len(),
        skipped = total - students.len(),
        "student dataset loaded"
    );
    Ok(students)
}

/// # Errors
/// [`EngineError::Persistence`] when the file is missing or unreadable,
/// [`EngineError::Serialization`] for malformed JSON.
pub fn load_careers(path: &Path) -> EngineResult<Vec<Career>> {
    let bytes = fs::read(path).map_err(|error| EngineError::persistence(path, error))?;
    let careers: Vec<Career> = serde_json::from_slice(&bytes)?;
    info!(path = %path.display(), loaded = careers.len(), "career dataset loaded");
    Ok(careers)
}

#[must_use]
pub fn student_vectors(students: &[StudentRecord]) -> Vec<Vec<f64>> {
    students
        .iter()
        .map(|student| student.combined_vector.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_students_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let students = load_students(&dir.path().join("students.json")).unwrap();
        assert!(students.is_empty());
    }

    #[test]
    fn students_without_vectors_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.json");
        fs::write(
            &path,
            r#"[
                {"id": "s1", "combined_vector": [0.1, 0.2]},
                {"id": "s2"},
                {"combined_vector": []}
            ]"#,
        )
        .unwrap();

        let students = load_students(&path).unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(student_vectors(&students), vec![vec![0.1, 0.2]]);
    }

    #[test]
    fn missing_careers_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = load_careers(&dir.path().join("careers.json")).unwrap_err();
        assert!(matches!(error, EngineError::Persistence { .. }));
    }

    #[test]
    fn career_defaults_fill_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("careers.json");
        fs::write(&path, r#"[{"id": "c1", "title": "Nurse"}]"#).unwrap();

        let careers = load_careers(&path).unwrap();
        assert_eq!(careers[0].domain, "Unknown");
        assert_eq!(careers[0].salary_range, "N/A");
        assert!(careers[0].embedding.is_empty());
    }
}
