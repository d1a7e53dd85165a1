use thiserror::Error;

/// Coarse classification used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Authorization,
    Infrastructure,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid date format, expected YYYY-MM-DD")]
    InvalidDateFormat,

    #[error("invalid mark target: {0}")]
    InvalidMarkTarget(String),

    #[error("a grade is required for marks of type {0}")]
    GradeRequired(&'static str),

    #[error("marks of type {0} cannot carry a grade")]
    GradeForbidden(&'static str),

    #[error("course {course} is outside 1..={courses}")]
    CourseOutOfRange { course: i32, courses: i32 },

    #[error("the mark has been superseded")]
    MarkNotCurrent,

    #[error("the mark has been deleted")]
    MarkDeleted,

    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::MarkNotCurrent | CoreError::MarkDeleted => ErrorKind::Authorization,
            _ => ErrorKind::Validation,
        }
    }
}
