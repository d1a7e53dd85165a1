use core_types::{CoreError, ErrorKind};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to configure the database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Database error: {0}")]
    Sqlx(#[source] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("database call exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    // --- not found ---
    #[error("no such user")]
    NoSuchUser,
    #[error("no such class")]
    NoSuchClass,
    #[error("no such subject")]
    NoSuchSubject,
    #[error("no such grade")]
    NoSuchGrade,
    #[error("no such year")]
    NoSuchYear,
    #[error("no such journal")]
    NoSuchJournal,
    #[error("no such lesson")]
    NoSuchLesson,
    #[error("no such assignment")]
    NoSuchAssignment,
    #[error("no such mark")]
    NoSuchMark,
    #[error("no such group")]
    NoSuchGroup,
    #[error("no such excuse")]
    NoSuchExcuse,
    #[error("no such session")]
    NoSuchSession,
    #[error("the user is not a member of this journal")]
    UserNotInJournal,
    #[error("the user is not a member of this group")]
    UserNotInGroup,

    // --- conflicts ---
    #[error("a user with this e-mail address already exists")]
    EmailAlreadyExists,
    #[error("a grade with this identifier already exists")]
    IdentifierAlreadyExists,
    #[error("the user is already in this group")]
    UserAlreadyInGroup,
    #[error("the user is already in this journal")]
    UserAlreadyInJournal,
    #[error("the absence is already excused")]
    AbsenceExcused,
    #[error("the record was changed by someone else, reload and try again")]
    EditConflict,

    // --- rejected by domain rules ---
    #[error("invalid e-mail address")]
    InvalidEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("the user is not a student")]
    NotAStudent,
    #[error("the user is not a teacher")]
    NotATeacher,
    #[error("the user is not a parent")]
    NotAParent,
    #[error("the journal is archived")]
    JournalArchived,
    #[error("the mark is not an absence of this student")]
    NotValidAbsence,
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::ConnectionConfigError(_)
            | DbError::Sqlx(_)
            | DbError::MigrationError(_)
            | DbError::Timeout(_)
            | DbError::Hash(_) => ErrorKind::Infrastructure,

            DbError::Core(e) => e.kind(),

            DbError::NoSuchUser
            | DbError::NoSuchClass
            | DbError::NoSuchSubject
            | DbError::NoSuchGrade
            | DbError::NoSuchYear
            | DbError::NoSuchJournal
            | DbError::NoSuchLesson
            | DbError::NoSuchAssignment
            | DbError::NoSuchMark
            | DbError::NoSuchGroup
            | DbError::NoSuchExcuse
            | DbError::NoSuchSession
            | DbError::UserNotInJournal
            | DbError::UserNotInGroup => ErrorKind::NotFound,

            DbError::EmailAlreadyExists
            | DbError::IdentifierAlreadyExists
            | DbError::UserAlreadyInGroup
            | DbError::UserAlreadyInJournal
            | DbError::AbsenceExcused
            | DbError::EditConflict => ErrorKind::Conflict,

            DbError::InvalidEmail => ErrorKind::Validation,

            DbError::InvalidCredentials
            | DbError::NotAStudent
            | DbError::NotATeacher
            | DbError::NotAParent
            | DbError::JournalArchived
            | DbError::NotValidAbsence => ErrorKind::Authorization,
        }
    }
}

/// Unique violations are mapped to domain conflicts by constraint name.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                match db_err.constraint() {
                    Some("users_email_key") => return DbError::EmailAlreadyExists,
                    Some("grades_identifier_key") => return DbError::IdentifierAlreadyExists,
                    Some("users_groups_pkey") => return DbError::UserAlreadyInGroup,
                    Some("users_journals_pkey") => return DbError::UserAlreadyInJournal,
                    Some("absences_excuses_mark_id_key") => return DbError::AbsenceExcused,
                    _ => {}
                }
            }
        }
        DbError::Sqlx(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_taxonomy() {
        assert_eq!(DbError::NoSuchMark.kind(), ErrorKind::NotFound);
        assert_eq!(DbError::EditConflict.kind(), ErrorKind::Conflict);
        assert_eq!(DbError::AbsenceExcused.kind(), ErrorKind::Conflict);
        assert_eq!(DbError::JournalArchived.kind(), ErrorKind::Authorization);
        assert_eq!(
            DbError::Timeout(Duration::from_secs(3)).kind(),
            ErrorKind::Infrastructure
        );
        assert_eq!(
            DbError::Core(CoreError::MarkNotCurrent).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            DbError::Core(CoreError::InvalidDateFormat).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn row_not_found_stays_infrastructure() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Sqlx(_)));
    }
}
