use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of account roles. Stored as the `user_role` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Teacher,
    Parent,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
            Role::Student => "student",
        }
    }

    /// Roles allowed to own a journal or a class.
    pub fn can_teach(&self) -> bool {
        matches!(self, Role::Administrator | Role::Teacher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "assignment_type", rename_all = "snake_case")]
pub enum AssignmentType {
    Homework,
    Test,
}

/// What a mark is attached to. Fixed by the mark's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Lesson,
    Course,
    Subject,
    Journal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "mark_type", rename_all = "snake_case")]
pub enum MarkType {
    LessonGrade,
    CourseGrade,
    SubjectGrade,
    NotDone,
    NoticeGood,
    NoticeNeutral,
    NoticeBad,
    Absent,
    Late,
}

impl MarkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkType::LessonGrade => "lesson_grade",
            MarkType::CourseGrade => "course_grade",
            MarkType::SubjectGrade => "subject_grade",
            MarkType::NotDone => "not_done",
            MarkType::NoticeGood => "notice_good",
            MarkType::NoticeNeutral => "notice_neutral",
            MarkType::NoticeBad => "notice_bad",
            MarkType::Absent => "absent",
            MarkType::Late => "late",
        }
    }

    /// Graded marks must reference a grade definition; every other type must not.
    pub fn requires_grade(&self) -> bool {
        matches!(
            self,
            MarkType::LessonGrade | MarkType::CourseGrade | MarkType::SubjectGrade
        )
    }

    pub fn target_kind(&self) -> TargetKind {
        match self {
            MarkType::LessonGrade | MarkType::NotDone | MarkType::Absent | MarkType::Late => {
                TargetKind::Lesson
            }
            MarkType::CourseGrade => TargetKind::Course,
            MarkType::SubjectGrade => TargetKind::Subject,
            MarkType::NoticeGood | MarkType::NoticeNeutral | MarkType::NoticeBad => {
                TargetKind::Journal
            }
        }
    }
}

impl fmt::Display for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_requirement_follows_type() {
        assert!(MarkType::LessonGrade.requires_grade());
        assert!(MarkType::SubjectGrade.requires_grade());
        assert!(!MarkType::Absent.requires_grade());
        assert!(!MarkType::NoticeBad.requires_grade());
        assert!(!MarkType::NotDone.requires_grade());
    }

    #[test]
    fn lesson_bound_types() {
        for t in [MarkType::LessonGrade, MarkType::NotDone, MarkType::Absent, MarkType::Late] {
            assert_eq!(t.target_kind(), TargetKind::Lesson, "{t}");
        }
        assert_eq!(MarkType::CourseGrade.target_kind(), TargetKind::Course);
        assert_eq!(MarkType::NoticeGood.target_kind(), TargetKind::Journal);
    }

    #[test]
    fn wire_names_are_snake_case() {
        let json = serde_json::to_string(&MarkType::NoticeNeutral).unwrap();
        assert_eq!(json, "\"notice_neutral\"");
        let role: Role = serde_json::from_str("\"administrator\"").unwrap();
        assert_eq!(role, Role::Administrator);
        assert!(serde_json::from_str::<Role>("\"janitor\"").is_err());
    }
}
