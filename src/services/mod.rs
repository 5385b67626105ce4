pub mod attendance_service;
pub mod auth_service;
pub mod photo_store;
pub mod reconciliation;
pub mod recognizer;
pub mod report_service;
pub mod student_service;
pub mod teacher_service;
