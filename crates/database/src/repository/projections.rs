//! Read-side composites built from the ledgers.

use super::journals::JournalRepository;
use super::lessons::{LessonDetail, LessonRepository};
use super::marks::{MarkFilter, MarkRepository};
use super::users::UserSummary;
use crate::error::DbError;
use chrono::NaiveDate;
use core_types::{Mark, format_date};
use serde::Serialize;
use std::collections::HashMap;

/// Everything that happened to a student on one calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct DayActivity {
    pub date: String,
    pub marks: Vec<Mark>,
    pub lessons: Vec<LessonDetail>,
}

/// One row of the journal matrix.
#[derive(Debug, Clone, Serialize)]
pub struct StudentMarks {
    pub student: UserSummary,
    pub marks: Vec<Mark>,
}

/// Groups marks (by the UTC date they last changed) and lessons (by lesson
/// date) into days. Days appear in the order first seen, marks before lessons.
pub fn group_by_date(marks: Vec<Mark>, lessons: Vec<LessonDetail>) -> Vec<DayActivity> {
    let mut days: Vec<DayActivity> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let mut slot = |date: String, days: &mut Vec<DayActivity>| -> usize {
        *index.entry(date.clone()).or_insert_with(|| {
            days.push(DayActivity { date, marks: Vec::new(), lessons: Vec::new() });
            days.len() - 1
        })
    };

    for mark in marks {
        let i = slot(format_date(mark.updated_at.date_naive()), &mut days);
        days[i].marks.push(mark);
    }
    for lesson in lessons {
        let i = slot(format_date(lesson.lesson.date), &mut days);
        days[i].lessons.push(lesson);
    }
    days
}

#[derive(Debug, Clone)]
pub struct ProjectionRepository {
    marks: MarkRepository,
    lessons: LessonRepository,
    journals: JournalRepository,
}

impl ProjectionRepository {
    pub fn new(marks: MarkRepository, lessons: LessonRepository, journals: JournalRepository) -> Self {
        Self { marks, lessons, journals }
    }

    /// The "what happened recently" view of a student.
    pub async fn latest_by_date(
        &self,
        student_id: i64,
        from: Option<NaiveDate>,
        until: Option<NaiveDate>,
    ) -> Result<Vec<DayActivity>, DbError> {
        let marks = self.marks.latest(student_id, from, until).await?;
        let lessons = self.lessons.list_latest_for_student(student_id, from, until).await?;
        Ok(group_by_date(marks, lessons))
    }

    /// Live marks of a journal per member student, ordered by student name.
    pub async fn journal_matrix(&self, journal_id: i64) -> Result<Vec<StudentMarks>, DbError> {
        let students = self.journals.list_students(journal_id).await?;
        let mut by_student: HashMap<i64, Vec<Mark>> = HashMap::new();
        for mark in self.marks.list_by_journal(journal_id, MarkFilter::Live).await? {
            by_student.entry(mark.student_id).or_default().push(mark);
        }
        Ok(students
            .into_iter()
            .map(|student| StudentMarks {
                marks: by_student.remove(&student.id).unwrap_or_default(),
                student: UserSummary { id: student.id, name: student.name },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::lessons::Lesson;
    use chrono::{TimeZone, Utc};
    use core_types::{MarkTarget, MarkType};

    fn mark(id: i64, day: u32) -> Mark {
        let at = Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap();
        Mark {
            id,
            student_id: 7,
            mark_type: MarkType::Absent,
            target: MarkTarget::Lesson { lesson_id: 1, journal_id: 2, course: 1 },
            grade_id: None,
            comment: None,
            current: true,
            deleted: false,
            previous_ids: Vec::new(),
            by: 1,
            at,
            updated_at: at,
        }
    }

    fn lesson(id: i64, day: u32) -> LessonDetail {
        LessonDetail {
            lesson: Lesson {
                id,
                journal_id: 2,
                description: format!("lesson {id}"),
                date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
                course: 1,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                version: 1,
            },
            journal_name: "Maths".into(),
            journal_archived: false,
        }
    }

    #[test]
    fn days_follow_first_observation_marks_first() {
        let days = group_by_date(
            vec![mark(1, 5), mark(2, 3), mark(3, 5)],
            vec![lesson(10, 4), lesson(11, 3)],
        );
        let dates: Vec<&str> = days.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, ["2024-03-05", "2024-03-03", "2024-03-04"]);
        assert_eq!(days[0].marks.len(), 2);
        assert_eq!(days[1].marks[0].id, 2);
        assert_eq!(days[1].lessons[0].lesson.id, 11);
        assert!(days[2].marks.is_empty());
    }

    #[test]
    fn nothing_in_nothing_out() {
        assert!(group_by_date(Vec::new(), Vec::new()).is_empty());
    }
}
