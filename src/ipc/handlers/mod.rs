pub mod analytics;
pub mod backup_exchange;
pub mod core;
pub mod courses;
pub mod exams;
pub mod grades;
pub mod notifications;
pub mod students;
pub mod users;
