//! Marks: typed academic records about a student.
//!
//! A mark is never edited in place. A correction produces a successor that
//! carries the predecessor's id at the end of its `previous_ids`, and the
//! predecessor is flagged non-current. Deletion is a flag as well. This module
//! holds the pure rules; persistence lives in the `database` crate.

use crate::enums::{MarkType, TargetKind};
use crate::error::CoreError;
use crate::patch::double_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The fully resolved attachment point of a stored mark.
///
/// Lesson-bound marks also carry the lesson's journal and course so that
/// journal-level reads never need to go through the lessons table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum MarkTarget {
    Lesson {
        lesson_id: i64,
        journal_id: i64,
        course: i32,
    },
    Course {
        journal_id: i64,
        course: i32,
    },
    Subject {
        subject_id: i64,
        journal_id: i64,
    },
    /// Notices: bound to a journal, optionally pinned to one of its lessons.
    Journal {
        journal_id: i64,
        lesson_id: Option<i64>,
        course: Option<i32>,
    },
}

impl MarkTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            MarkTarget::Lesson { .. } => TargetKind::Lesson,
            MarkTarget::Course { .. } => TargetKind::Course,
            MarkTarget::Subject { .. } => TargetKind::Subject,
            MarkTarget::Journal { .. } => TargetKind::Journal,
        }
    }

    pub fn journal_id(&self) -> i64 {
        match *self {
            MarkTarget::Lesson { journal_id, .. }
            | MarkTarget::Course { journal_id, .. }
            | MarkTarget::Subject { journal_id, .. }
            | MarkTarget::Journal { journal_id, .. } => journal_id,
        }
    }

    pub fn lesson_id(&self) -> Option<i64> {
        match *self {
            MarkTarget::Lesson { lesson_id, .. } => Some(lesson_id),
            MarkTarget::Journal { lesson_id, .. } => lesson_id,
            _ => None,
        }
    }

    pub fn course(&self) -> Option<i32> {
        match *self {
            MarkTarget::Lesson { course, .. } | MarkTarget::Course { course, .. } => Some(course),
            MarkTarget::Journal { course, .. } => course,
            MarkTarget::Subject { .. } => None,
        }
    }

    pub fn subject_id(&self) -> Option<i64> {
        match *self {
            MarkTarget::Subject { subject_id, .. } => Some(subject_id),
            _ => None,
        }
    }

    /// Rebuilds a target from the nullable columns of a `marks` row.
    pub fn from_columns(
        mark_type: MarkType,
        lesson_id: Option<i64>,
        journal_id: Option<i64>,
        course: Option<i32>,
        subject_id: Option<i64>,
    ) -> Result<Self, CoreError> {
        let target = match (mark_type.target_kind(), lesson_id, journal_id, course, subject_id) {
            (TargetKind::Lesson, Some(lesson_id), Some(journal_id), Some(course), None) => {
                MarkTarget::Lesson { lesson_id, journal_id, course }
            }
            (TargetKind::Course, None, Some(journal_id), Some(course), None) => {
                MarkTarget::Course { journal_id, course }
            }
            (TargetKind::Subject, None, Some(journal_id), None, Some(subject_id)) => {
                MarkTarget::Subject { subject_id, journal_id }
            }
            (TargetKind::Journal, lesson_id, Some(journal_id), course, None) => {
                MarkTarget::Journal { journal_id, lesson_id, course }
            }
            _ => {
                return Err(CoreError::InvalidMarkTarget(format!(
                    "stored columns do not match type {mark_type}"
                )));
            }
        };
        Ok(target)
    }
}

/// The attachment point as a caller names it, before lookups fill in the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkTargetRef {
    Lesson { lesson_id: i64 },
    Course { journal_id: i64, course: i32 },
    Subject { subject_id: i64, journal_id: i64 },
    Journal { journal_id: i64, lesson_id: Option<i64> },
}

/// A request to record a fresh mark.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMark {
    #[serde(rename = "user_id")]
    pub student_id: i64,
    #[serde(rename = "type")]
    pub mark_type: MarkType,
    pub lesson_id: Option<i64>,
    pub journal_id: Option<i64>,
    pub course: Option<i32>,
    pub subject_id: Option<i64>,
    pub grade_id: Option<i64>,
    pub comment: Option<String>,
}

impl NewMark {
    /// Checks the grade and reference fields against the mark type.
    pub fn target_ref(&self) -> Result<MarkTargetRef, CoreError> {
        let name = self.mark_type.as_str();
        check_grade(self.mark_type, self.grade_id)?;

        let fields = (self.lesson_id, self.journal_id, self.course, self.subject_id);
        match (self.mark_type.target_kind(), fields) {
            (TargetKind::Lesson, (Some(lesson_id), None, None, None)) => {
                Ok(MarkTargetRef::Lesson { lesson_id })
            }
            (TargetKind::Lesson, _) => Err(invalid_target(name, "lesson_id only")),
            (TargetKind::Course, (None, Some(journal_id), Some(course), None)) => {
                Ok(MarkTargetRef::Course { journal_id, course })
            }
            (TargetKind::Course, _) => Err(invalid_target(name, "journal_id and course only")),
            (TargetKind::Subject, (None, Some(journal_id), None, Some(subject_id))) => {
                Ok(MarkTargetRef::Subject { subject_id, journal_id })
            }
            (TargetKind::Subject, _) => Err(invalid_target(name, "subject_id and journal_id only")),
            (TargetKind::Journal, (lesson_id, Some(journal_id), None, None)) => {
                Ok(MarkTargetRef::Journal { journal_id, lesson_id })
            }
            (TargetKind::Journal, _) => {
                Err(invalid_target(name, "journal_id and an optional lesson_id"))
            }
        }
    }
}

fn invalid_target(mark_type: &str, expected: &str) -> CoreError {
    CoreError::InvalidMarkTarget(format!("{mark_type} marks take {expected}"))
}

fn check_grade(mark_type: MarkType, grade_id: Option<i64>) -> Result<(), CoreError> {
    match (mark_type.requires_grade(), grade_id) {
        (true, None) => Err(CoreError::GradeRequired(mark_type.as_str())),
        (false, Some(_)) => Err(CoreError::GradeForbidden(mark_type.as_str())),
        _ => Ok(()),
    }
}

/// Courses are numbered `1..=courses` within a year.
pub fn check_course(course: i32, courses: i32) -> Result<(), CoreError> {
    if (1..=courses).contains(&course) {
        Ok(())
    } else {
        Err(CoreError::CourseOutOfRange { course, courses })
    }
}

/// Fields a correction may change. The target never changes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkPatch {
    #[serde(rename = "type")]
    pub mark_type: Option<MarkType>,
    pub grade_id: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub comment: Option<Option<String>>,
}

/// A row about to be inserted into `marks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkDraft {
    pub student_id: i64,
    pub mark_type: MarkType,
    pub target: MarkTarget,
    pub grade_id: Option<i64>,
    pub comment: Option<String>,
    pub previous_ids: Vec<i64>,
}

impl MarkDraft {
    pub fn fresh(new: &NewMark, target: MarkTarget) -> Self {
        Self {
            student_id: new.student_id,
            mark_type: new.mark_type,
            target,
            grade_id: new.grade_id,
            comment: new.comment.clone(),
            previous_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub id: i64,
    #[serde(rename = "user_id")]
    pub student_id: i64,
    #[serde(rename = "type")]
    pub mark_type: MarkType,
    #[serde(flatten)]
    pub target: MarkTarget,
    pub grade_id: Option<i64>,
    pub comment: Option<String>,
    pub current: bool,
    pub deleted: bool,
    pub previous_ids: Vec<i64>,
    pub by: i64,
    pub at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mark {
    pub fn is_live(&self) -> bool {
        self.current && !self.deleted
    }

    /// Only live marks may be superseded or deleted.
    pub fn ensure_current(&self) -> Result<(), CoreError> {
        if self.deleted {
            Err(CoreError::MarkDeleted)
        } else if !self.current {
            Err(CoreError::MarkNotCurrent)
        } else {
            Ok(())
        }
    }

    /// Derives the replacement row for a correction.
    ///
    /// The type may only change within the same target kind (an absence can
    /// become a lateness, a lesson grade can become "not done"). The grade
    /// follows the new type: kept or replaced for graded types, dropped for
    /// the others.
    pub fn successor(&self, patch: &MarkPatch) -> Result<MarkDraft, CoreError> {
        self.ensure_current()?;

        let mark_type = patch.mark_type.unwrap_or(self.mark_type);
        if mark_type.target_kind() != self.mark_type.target_kind() {
            return Err(CoreError::InvalidMarkTarget(format!(
                "cannot turn a {} mark into a {} mark",
                self.mark_type, mark_type
            )));
        }

        let grade_id = if mark_type.requires_grade() {
            let grade_id = patch.grade_id.or(self.grade_id);
            check_grade(mark_type, grade_id)?;
            grade_id
        } else {
            check_grade(mark_type, patch.grade_id)?;
            None
        };

        let comment = match &patch.comment {
            Some(comment) => comment.clone(),
            None => self.comment.clone(),
        };

        let mut previous_ids = self.previous_ids.clone();
        previous_ids.push(self.id);

        Ok(MarkDraft {
            student_id: self.student_id,
            mark_type,
            target: self.target.clone(),
            grade_id,
            comment,
            previous_ids,
        })
    }
}

/// Checks the revision-chain invariants over a set of marks.
///
/// A slot is identified by the first id of a chain. Within a slot at most one
/// mark may be live, and every mark that some other mark names as a
/// predecessor must be non-current.
pub fn chain_is_consistent(marks: &[Mark]) -> bool {
    let superseded: HashSet<i64> = marks
        .iter()
        .flat_map(|m| m.previous_ids.iter().copied())
        .collect();
    if marks.iter().any(|m| m.current && superseded.contains(&m.id)) {
        return false;
    }

    let mut live_per_slot: HashMap<i64, usize> = HashMap::new();
    for mark in marks.iter().filter(|m| m.is_live()) {
        let slot = mark.previous_ids.first().copied().unwrap_or(mark.id);
        *live_per_slot.entry(slot).or_default() += 1;
    }
    live_per_slot.values().all(|&n| n <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_mark(mark_type: MarkType) -> NewMark {
        NewMark {
            student_id: 7,
            mark_type,
            lesson_id: None,
            journal_id: None,
            course: None,
            subject_id: None,
            grade_id: None,
            comment: None,
        }
    }

    fn stored(id: i64, mark_type: MarkType, grade_id: Option<i64>) -> Mark {
        Mark {
            id,
            student_id: 7,
            mark_type,
            target: MarkTarget::Lesson { lesson_id: 3, journal_id: 2, course: 1 },
            grade_id,
            comment: Some("first try".into()),
            current: true,
            deleted: false,
            previous_ids: Vec::new(),
            by: 1,
            at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn lesson_grade_needs_lesson_and_grade() {
        let mut m = new_mark(MarkType::LessonGrade);
        m.lesson_id = Some(3);
        assert_eq!(m.target_ref(), Err(CoreError::GradeRequired("lesson_grade")));
        m.grade_id = Some(1);
        assert_eq!(m.target_ref(), Ok(MarkTargetRef::Lesson { lesson_id: 3 }));
        m.journal_id = Some(2);
        assert!(matches!(m.target_ref(), Err(CoreError::InvalidMarkTarget(_))));
    }

    #[test]
    fn absences_refuse_grades() {
        let mut m = new_mark(MarkType::Absent);
        m.lesson_id = Some(3);
        m.grade_id = Some(1);
        assert_eq!(m.target_ref(), Err(CoreError::GradeForbidden("absent")));
    }

    #[test]
    fn course_and_subject_targets() {
        let mut course = new_mark(MarkType::CourseGrade);
        course.journal_id = Some(2);
        course.course = Some(2);
        course.grade_id = Some(1);
        assert_eq!(
            course.target_ref(),
            Ok(MarkTargetRef::Course { journal_id: 2, course: 2 })
        );

        let mut subject = new_mark(MarkType::SubjectGrade);
        subject.subject_id = Some(4);
        subject.grade_id = Some(1);
        assert!(subject.target_ref().is_err(), "journal_id is required");
        subject.journal_id = Some(2);
        assert_eq!(
            subject.target_ref(),
            Ok(MarkTargetRef::Subject { subject_id: 4, journal_id: 2 })
        );
    }

    #[test]
    fn notices_take_journal_and_optional_lesson() {
        let mut m = new_mark(MarkType::NoticeBad);
        m.journal_id = Some(2);
        assert_eq!(
            m.target_ref(),
            Ok(MarkTargetRef::Journal { journal_id: 2, lesson_id: None })
        );
        m.lesson_id = Some(3);
        assert_eq!(
            m.target_ref(),
            Ok(MarkTargetRef::Journal { journal_id: 2, lesson_id: Some(3) })
        );
        m.course = Some(1);
        assert!(m.target_ref().is_err());
    }

    #[test]
    fn course_bounds_are_inclusive() {
        assert!(check_course(1, 3).is_ok());
        assert!(check_course(3, 3).is_ok());
        assert_eq!(check_course(0, 3), Err(CoreError::CourseOutOfRange { course: 0, courses: 3 }));
        assert!(check_course(4, 3).is_err());
    }

    #[test]
    fn successor_appends_predecessor_and_keeps_target() {
        let old = stored(10, MarkType::LessonGrade, Some(1));
        let patch = MarkPatch { grade_id: Some(2), ..Default::default() };
        let draft = old.successor(&patch).unwrap();
        assert_eq!(draft.previous_ids, vec![10]);
        assert_eq!(draft.grade_id, Some(2));
        assert_eq!(draft.target, old.target);
        assert_eq!(draft.comment.as_deref(), Some("first try"));

        let mut second = stored(11, MarkType::LessonGrade, Some(2));
        second.previous_ids = draft.previous_ids;
        let third = second
            .successor(&MarkPatch { comment: Some(None), ..Default::default() })
            .unwrap();
        assert_eq!(third.previous_ids, vec![10, 11]);
        assert_eq!(third.comment, None);
    }

    #[test]
    fn successor_requires_a_live_mark() {
        let mut old = stored(10, MarkType::Absent, None);
        old.current = false;
        assert_eq!(old.successor(&MarkPatch::default()), Err(CoreError::MarkNotCurrent));
        old.deleted = true;
        assert_eq!(old.successor(&MarkPatch::default()), Err(CoreError::MarkDeleted));
    }

    #[test]
    fn successor_type_changes_stay_within_target_kind() {
        let absent = stored(10, MarkType::Absent, None);
        let late = absent
            .successor(&MarkPatch { mark_type: Some(MarkType::Late), ..Default::default() })
            .unwrap();
        assert_eq!(late.mark_type, MarkType::Late);

        let to_grade = MarkPatch { mark_type: Some(MarkType::LessonGrade), ..Default::default() };
        assert_eq!(absent.successor(&to_grade), Err(CoreError::GradeRequired("lesson_grade")));

        let graded = stored(12, MarkType::LessonGrade, Some(1));
        let not_done = graded
            .successor(&MarkPatch { mark_type: Some(MarkType::NotDone), ..Default::default() })
            .unwrap();
        assert_eq!(not_done.grade_id, None);

        let to_course = MarkPatch { mark_type: Some(MarkType::CourseGrade), ..Default::default() };
        assert!(matches!(graded.successor(&to_course), Err(CoreError::InvalidMarkTarget(_))));
    }

    #[test]
    fn target_round_trips_through_columns() {
        let target = MarkTarget::Subject { subject_id: 4, journal_id: 2 };
        let rebuilt = MarkTarget::from_columns(
            MarkType::SubjectGrade,
            target.lesson_id(),
            Some(target.journal_id()),
            target.course(),
            target.subject_id(),
        )
        .unwrap();
        assert_eq!(rebuilt, target);

        let mismatched =
            MarkTarget::from_columns(MarkType::CourseGrade, Some(3), Some(2), Some(1), None);
        assert!(mismatched.is_err());
    }

    #[test]
    fn chain_invariant_detects_two_live_revisions() {
        let mut first = stored(10, MarkType::LessonGrade, Some(1));
        let mut second = stored(11, MarkType::LessonGrade, Some(2));
        second.previous_ids = vec![10];
        assert!(!chain_is_consistent(&[first.clone(), second.clone()]));

        first.current = false;
        assert!(chain_is_consistent(&[first.clone(), second.clone()]));

        second.current = false;
        second.deleted = true;
        assert!(chain_is_consistent(&[first, second]));
    }

    #[test]
    fn serialises_target_inline() {
        let mark = stored(10, MarkType::LessonGrade, Some(1));
        let json = serde_json::to_value(&mark).unwrap();
        assert_eq!(json["target"], "lesson");
        assert_eq!(json["lesson_id"], 3);
        assert_eq!(json["type"], "lesson_grade");
        assert_eq!(json["user_id"], 7);
    }
}
