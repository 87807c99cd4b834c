use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const STUDENTS_FILE: &str = "students.json";
pub const COURSES_FILE: &str = "courses.json";
pub const EXAMS_FILE: &str = "exams.json";
pub const GRADES_FILE: &str = "grades.json";
pub const NOTIFICATIONS_FILE: &str = "notifications.json";
pub const USERS_FILE: &str = "users.json";

/// Score as it appears on the wire. Legacy data files carry a mix of JSON
/// numbers and decimal strings for the same field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    Number(f64),
    Text(String),
}

impl ScoreValue {
    /// Some only for finite numeric scores. Non-numeric text is excluded
    /// from statistics rather than collapsing to zero.
    pub fn parse(&self) -> Option<f64> {
        let v = match self {
            ScoreValue::Number(n) => *n,
            ScoreValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    /// External human-readable student code, distinct from the record id.
    pub student_id: String,
    pub status: StudentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub code: String,
    pub teacher_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub exam_date: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub score: ScoreValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Teacher,
    Student,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

/// Flat-file store: one JSON array per collection under the workspace
/// directory, read whole and written whole on every mutation.
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn open(workspace: &Path) -> anyhow::Result<Store> {
        std::fs::create_dir_all(workspace).with_context(|| {
            format!(
                "failed to create workspace {}",
                workspace.to_string_lossy()
            )
        })?;
        Ok(Store {
            root: workspace.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_students(&self) -> anyhow::Result<Vec<Student>> {
        self.read_collection(STUDENTS_FILE)
    }

    pub fn save_students(&self, students: &[Student]) -> anyhow::Result<()> {
        self.write_collection(STUDENTS_FILE, students)
    }

    pub fn load_courses(&self) -> anyhow::Result<Vec<Course>> {
        self.read_collection(COURSES_FILE)
    }

    pub fn save_courses(&self, courses: &[Course]) -> anyhow::Result<()> {
        self.write_collection(COURSES_FILE, courses)
    }

    pub fn load_exams(&self) -> anyhow::Result<Vec<Exam>> {
        self.read_collection(EXAMS_FILE)
    }

    pub fn save_exams(&self, exams: &[Exam]) -> anyhow::Result<()> {
        self.write_collection(EXAMS_FILE, exams)
    }

    pub fn load_grades(&self) -> anyhow::Result<Vec<Grade>> {
        self.read_collection(GRADES_FILE)
    }

    pub fn save_grades(&self, grades: &[Grade]) -> anyhow::Result<()> {
        self.write_collection(GRADES_FILE, grades)
    }

    pub fn load_notifications(&self) -> anyhow::Result<Vec<Notification>> {
        self.read_collection(NOTIFICATIONS_FILE)
    }

    pub fn save_notifications(&self, notifications: &[Notification]) -> anyhow::Result<()> {
        self.write_collection(NOTIFICATIONS_FILE, notifications)
    }

    pub fn load_users(&self) -> anyhow::Result<Vec<User>> {
        self.read_collection(USERS_FILE)
    }

    pub fn save_users(&self, users: &[User]) -> anyhow::Result<()> {
        self.write_collection(USERS_FILE, users)
    }

    fn read_collection<T: DeserializeOwned>(&self, file: &str) -> anyhow::Result<Vec<T>> {
        let path = self.root.join(file);
        if !path.is_file() {
            // Fresh workspaces have no collection files yet.
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).with_context(|| {
            format!(
                "{} is not a valid collection file",
                path.to_string_lossy()
            )
        })
    }

    fn write_collection<T: Serialize>(&self, file: &str, items: &[T]) -> anyhow::Result<()> {
        let path = self.root.join(file);
        let tmp = self.root.join(format!("{}.writing", file));
        let text = serde_json::to_string_pretty(items)
            .with_context(|| format!("failed to serialize {}", file))?;
        std::fs::write(&tmp, text)
            .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace {}", path.to_string_lossy()))?;
        Ok(())
    }
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
