//! Attendance reconciliation: per-day status, fines and subject percentages.
//!
//! Nothing in here touches the database; `report_service` loads the rows and
//! hands them over.

use crate::models::student::{StudentIdentity, StudentSummary};
use chrono::{Duration, NaiveDate};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
pub const MAX_WINDOW_DAYS: i64 = 366;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// `None` when the range is inverted or longer than [`MAX_WINDOW_DAYS`].
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        let days = (end - start).num_days() + 1;
        if days < 1 || days > MAX_WINDOW_DAYS {
            return None;
        }
        Some(Self { start, end })
    }

    /// The `days` dates ending on (and including) `end`.
    pub fn trailing(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - Duration::days(days.max(1) - 1),
            end,
        }
    }

    /// Parses a requested window, falling back to the trailing week ending
    /// `today` when either bound is missing or malformed, or the range is
    /// unusable.
    pub fn resolve(start: Option<&str>, end: Option<&str>, today: NaiveDate) -> Self {
        let parsed = match (start.and_then(parse_date), end.and_then(parse_date)) {
            (Some(s), Some(e)) => Self::new(s, e),
            _ => None,
        };
        parsed.unwrap_or_else(|| Self::trailing(today, DEFAULT_WINDOW_DAYS))
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every date of the window, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take_while(|d| *d <= self.end)
            .collect()
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Present,
    Absent,
    NotApplicable,
}

impl DayStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Present => "P",
            Self::Absent => "A",
            Self::NotApplicable => "N/A",
        }
    }
}

impl Serialize for DayStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// One student marked absent for one lecture on `date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsenceFact {
    pub roll_no: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct StudentAttendance {
    pub roll_no: i64,
    pub name: String,
    pub division: String,
    pub photo_path: Option<String>,
    pub attendance: BTreeMap<String, DayStatus>,
    pub absences: usize,
    pub fine: i64,
    pub is_self: bool,
}

#[derive(Debug, Serialize)]
pub struct DivisionTable {
    pub division: String,
    pub dates: Vec<String>,
    pub fine_per_absence: i64,
    pub students: Vec<StudentAttendance>,
}

/// Classifies every (student, date) of the window.
///
/// A date is Absent when the student has an absence on it, Present when the
/// division held at least one lecture that day, and Not-Applicable otherwise.
/// The fine counts Absent dates, not absent lectures.
pub fn build_division_table(
    division: &str,
    window: &DateWindow,
    students: Vec<StudentSummary>,
    lecture_dates: &[NaiveDate],
    absences: &[AbsenceFact],
    fine_per_absence: i64,
    viewer: Option<&StudentIdentity>,
) -> DivisionTable {
    let dates = window.dates();
    let active: HashSet<NaiveDate> = lecture_dates
        .iter()
        .copied()
        .filter(|d| window.contains(*d))
        .collect();

    let mut absent_on: HashMap<i64, HashSet<NaiveDate>> = HashMap::new();
    for fact in absences.iter().filter(|f| window.contains(f.date)) {
        absent_on.entry(fact.roll_no).or_default().insert(fact.date);
    }
    let no_absences = HashSet::new();

    let students = students
        .into_iter()
        .map(|s| {
            let missed = absent_on.get(&s.roll_no).unwrap_or(&no_absences);
            let attendance: BTreeMap<String, DayStatus> = dates
                .iter()
                .map(|d| {
                    let status = if missed.contains(d) {
                        DayStatus::Absent
                    } else if active.contains(d) {
                        DayStatus::Present
                    } else {
                        DayStatus::NotApplicable
                    };
                    (format_date(*d), status)
                })
                .collect();
            let absences = attendance
                .values()
                .filter(|st| **st == DayStatus::Absent)
                .count();
            let is_self = viewer.is_some_and(|v| v.matches(&s.division, s.roll_no));
            StudentAttendance {
                roll_no: s.roll_no,
                name: s.name,
                division: s.division,
                photo_path: s.photo_path,
                attendance,
                absences,
                fine: absences as i64 * fine_per_absence,
                is_self,
            }
        })
        .collect();

    DivisionTable {
        division: division.to_string(),
        dates: dates.into_iter().map(format_date).collect(),
        fine_per_absence,
        students,
    }
}

/// An attendance percentage, or "N/A" when nothing was held.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Percentage {
    Value(f64),
    NotApplicable,
}

impl Percentage {
    pub fn of(attended: usize, held: usize) -> Self {
        if held == 0 {
            return Self::NotApplicable;
        }
        let raw = attended as f64 / held as f64 * 100.0;
        Self::Value((raw * 10.0).round() / 10.0)
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

/// What the subject report needs to know about one lecture.
#[derive(Debug, Clone)]
pub struct LectureFact {
    pub subject: String,
    pub division: String,
    pub absent_roll_nos: HashSet<i64>,
}

#[derive(Debug, Serialize)]
pub struct SubjectReportRow {
    pub roll_no: i64,
    pub name: String,
    pub division: String,
    pub photo_path: Option<String>,
    pub subject_avg: BTreeMap<String, Percentage>,
    pub total_avg: Percentage,
}

/// Per-subject and overall attendance percentages for each student.
///
/// Only lectures of the student's own division count. Subjects outside
/// `subjects` are left out of the overall figure as well.
pub fn build_subject_report(
    subjects: &[String],
    students: Vec<StudentSummary>,
    lectures: &[LectureFact],
) -> Vec<SubjectReportRow> {
    students
        .into_iter()
        .map(|s| {
            let (mut attended_total, mut held_total) = (0usize, 0usize);
            let mut subject_avg = BTreeMap::new();
            for subject in subjects {
                let held: Vec<&LectureFact> = lectures
                    .iter()
                    .filter(|l| &l.subject == subject && l.division == s.division)
                    .collect();
                let missed = held
                    .iter()
                    .filter(|l| l.absent_roll_nos.contains(&s.roll_no))
                    .count();
                let attended = held.len() - missed;
                attended_total += attended;
                held_total += held.len();
                subject_avg.insert(subject.clone(), Percentage::of(attended, held.len()));
            }
            SubjectReportRow {
                roll_no: s.roll_no,
                name: s.name,
                division: s.division,
                photo_path: s.photo_path,
                subject_avg,
                total_avg: Percentage::of(attended_total, held_total),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RollNo;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn student(roll_no: i64, division: &str) -> StudentSummary {
        StudentSummary {
            roll_no,
            name: format!("Student {roll_no}"),
            division: division.to_string(),
            photo_path: None,
        }
    }

    fn lecture(subject: &str, division: &str, absent: &[i64]) -> LectureFact {
        LectureFact {
            subject: subject.to_string(),
            division: division.to_string(),
            absent_roll_nos: absent.iter().copied().collect(),
        }
    }

    #[test]
    fn three_day_window_example() {
        let window = DateWindow::new(d("2026-10-01"), d("2026-10-03")).unwrap();
        let table = build_division_table(
            "A",
            &window,
            vec![student(1, "A")],
            &[d("2026-10-01"), d("2026-10-03")],
            &[AbsenceFact { roll_no: 1, date: d("2026-10-01") }],
            100,
            None,
        );
        assert_eq!(table.dates, vec!["2026-10-01", "2026-10-02", "2026-10-03"]);
        let row = &table.students[0];
        assert_eq!(row.attendance["2026-10-01"], DayStatus::Absent);
        assert_eq!(row.attendance["2026-10-02"], DayStatus::NotApplicable);
        assert_eq!(row.attendance["2026-10-03"], DayStatus::Present);
        assert_eq!(row.absences, 1);
        assert_eq!(row.fine, 100);
    }

    #[test]
    fn no_absences_means_never_absent_and_no_fine() {
        let window = DateWindow::trailing(d("2026-10-07"), 7);
        let table = build_division_table(
            "A",
            &window,
            vec![student(1, "A"), student(2, "A")],
            &[d("2026-10-02"), d("2026-10-05")],
            &[],
            100,
            None,
        );
        for row in &table.students {
            assert!(row.attendance.values().all(|s| *s != DayStatus::Absent));
            assert_eq!(row.fine, 0);
            assert_eq!(row.attendance["2026-10-02"], DayStatus::Present);
            assert_eq!(row.attendance["2026-10-03"], DayStatus::NotApplicable);
        }
    }

    #[test]
    fn new_division_without_lectures_is_all_not_applicable() {
        let window = DateWindow::trailing(d("2026-10-07"), 7);
        let table = build_division_table("B", &window, vec![student(4, "B")], &[], &[], 100, None);
        let row = &table.students[0];
        assert_eq!(row.attendance.len(), 7);
        assert!(row.attendance.values().all(|s| *s == DayStatus::NotApplicable));
    }

    #[test]
    fn fine_counts_absent_dates_not_lectures() {
        let window = DateWindow::trailing(d("2026-10-07"), 7);
        let absences = [
            AbsenceFact { roll_no: 3, date: d("2026-10-06") },
            AbsenceFact { roll_no: 3, date: d("2026-10-06") },
            AbsenceFact { roll_no: 3, date: d("2026-10-07") },
            AbsenceFact { roll_no: 3, date: d("2026-09-01") },
        ];
        let table = build_division_table(
            "A",
            &window,
            vec![student(3, "A")],
            &[d("2026-10-06"), d("2026-10-07")],
            &absences,
            100,
            None,
        );
        assert_eq!(table.students[0].absences, 2);
        assert_eq!(table.students[0].fine, 200);
    }

    #[test]
    fn viewer_is_matched_on_division_and_roll_number() {
        let window = DateWindow::trailing(d("2026-10-07"), 1);
        let me = StudentIdentity {
            division: "A".into(),
            roll_no: RollNo::new(5).unwrap(),
        };
        let table = build_division_table(
            "A",
            &window,
            vec![student(5, "A"), student(6, "A")],
            &[],
            &[],
            100,
            Some(&me),
        );
        assert!(table.students[0].is_self);
        assert!(!table.students[1].is_self);

        let other = StudentIdentity {
            division: "B".into(),
            roll_no: RollNo::new(5).unwrap(),
        };
        let table = build_division_table("A", &window, vec![student(5, "A")], &[], &[], 100, Some(&other));
        assert!(!table.students[0].is_self);
    }

    #[test]
    fn window_falls_back_to_trailing_week() {
        let today = d("2026-10-18");
        let fallback = DateWindow::trailing(today, 7);
        assert_eq!(fallback.start(), d("2026-10-12"));
        assert_eq!(fallback.dates().len(), 7);

        assert_eq!(DateWindow::resolve(None, None, today), fallback);
        assert_eq!(DateWindow::resolve(Some("yesterday"), Some("2026-10-18"), today), fallback);
        assert_eq!(DateWindow::resolve(Some("2026-10-10"), None, today), fallback);
        assert_eq!(DateWindow::resolve(Some("2026-10-10"), Some("2026-10-01"), today), fallback);
        assert_eq!(DateWindow::resolve(Some("2020-01-01"), Some("2026-01-01"), today), fallback);

        let explicit = DateWindow::resolve(Some("2026-10-01"), Some("2026-10-03"), today);
        assert_eq!(explicit.start(), d("2026-10-01"));
        assert_eq!(explicit.end(), d("2026-10-03"));
    }

    #[test]
    fn percentage_rounds_and_never_divides_by_zero() {
        assert_eq!(Percentage::of(0, 0), Percentage::NotApplicable);
        assert_eq!(Percentage::of(2, 3), Percentage::Value(66.7));
        assert_eq!(Percentage::of(3, 3), Percentage::Value(100.0));
        assert_eq!(serde_json::to_value(Percentage::NotApplicable).unwrap(), "N/A");
        assert_eq!(serde_json::to_value(Percentage::of(1, 8)).unwrap(), 12.5);
    }

    #[test]
    fn subject_report_uses_own_division_only() {
        let subjects = vec!["DS".to_string(), "OS".to_string()];
        let lectures = vec![
            lecture("DS", "A", &[1]),
            lecture("DS", "A", &[]),
            lecture("DS", "A", &[2]),
            lecture("DS", "B", &[1]),
            lecture("OS", "B", &[]),
            lecture("CEP", "A", &[1]),
        ];
        let rows = build_subject_report(&subjects, vec![student(1, "A"), student(1, "B")], &lectures);

        assert_eq!(rows[0].subject_avg["DS"], Percentage::Value(66.7));
        assert_eq!(rows[0].subject_avg["OS"], Percentage::NotApplicable);
        assert_eq!(rows[0].total_avg, Percentage::Value(66.7));

        assert_eq!(rows[1].subject_avg["DS"], Percentage::Value(0.0));
        assert_eq!(rows[1].subject_avg["OS"], Percentage::Value(100.0));
        assert_eq!(rows[1].total_avg, Percentage::Value(50.0));
    }

    #[test]
    fn subject_report_without_lectures_is_not_applicable() {
        let subjects = vec!["DS".to_string()];
        let rows = build_subject_report(&subjects, vec![student(9, "A")], &[]);
        assert_eq!(rows[0].subject_avg["DS"], Percentage::NotApplicable);
        assert_eq!(rows[0].total_avg, Percentage::NotApplicable);
    }
}
