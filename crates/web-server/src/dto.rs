//! Request bodies and their validation rules.
//!
//! Dates travel as strings so that a bad value surfaces as
//! `InvalidDateFormat` rather than a generic JSON error.

use crate::error::AppError;
use crate::extract::optional_date;
use core_types::patch::double_option;
use core_types::{AssignmentType, Role, parse_date};
use database::repository::{
    AssignmentPatch, LessonPatch, NewAssignment, NewLesson, NewUser, UserPatch,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be an e-mail address"))]
    pub email: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 256, message = "must not be empty"))]
    pub name: String,
    #[validate(email(message = "must be an e-mail address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<String>,
}

impl CreateUserRequest {
    pub fn into_new_user(self) -> Result<NewUser, AppError> {
        Ok(NewUser {
            birth_date: optional_date(self.birth_date.as_deref())?,
            name: self.name,
            email: self.email,
            password: self.password,
            role: self.role,
            phone: self.phone,
            address: self.address,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub version: i32,
    #[validate(length(min = 1, max = 256, message = "must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "must be an e-mail address"))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: Option<String>,
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub birth_date: Option<Option<String>>,
    pub active: Option<bool>,
}

impl UpdateUserRequest {
    pub fn into_patch(self) -> Result<(UserPatch, i32), AppError> {
        let birth_date = match self.birth_date {
            Some(Some(date)) => Some(Some(parse_date(&date)?)),
            Some(None) => Some(None),
            None => None,
        };
        let patch = UserPatch {
            name: self.name,
            email: self.email,
            password: self.password,
            role: self.role,
            phone: self.phone,
            address: self.address,
            birth_date,
            active: self.active,
        };
        Ok((patch, self.version))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct NameRequest {
    #[validate(length(min = 1, max = 256, message = "must not be empty"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    pub journal_id: i64,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub description: String,
    pub date: String,
    pub course: i32,
}

impl CreateLessonRequest {
    pub fn into_new_lesson(self) -> Result<NewLesson, AppError> {
        Ok(NewLesson {
            date: parse_date(&self.date)?,
            journal_id: self.journal_id,
            description: self.description,
            course: self.course,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLessonRequest {
    pub version: i32,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub description: Option<String>,
    pub date: Option<String>,
    pub course: Option<i32>,
}

impl UpdateLessonRequest {
    pub fn into_patch(self) -> Result<(LessonPatch, i32), AppError> {
        let patch = LessonPatch {
            date: optional_date(self.date.as_deref())?,
            description: self.description,
            course: self.course,
        };
        Ok((patch, self.version))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssignmentRequest {
    pub journal_id: i64,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub description: String,
    pub deadline: String,
    #[serde(rename = "type")]
    pub assignment_type: AssignmentType,
}

impl CreateAssignmentRequest {
    pub fn into_new_assignment(self) -> Result<NewAssignment, AppError> {
        Ok(NewAssignment {
            deadline: parse_date(&self.deadline)?,
            journal_id: self.journal_id,
            description: self.description,
            assignment_type: self.assignment_type,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAssignmentRequest {
    pub version: i32,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub description: Option<String>,
    pub deadline: Option<String>,
    #[serde(rename = "type")]
    pub assignment_type: Option<AssignmentType>,
}

impl UpdateAssignmentRequest {
    pub fn into_patch(self) -> Result<(AssignmentPatch, i32), AppError> {
        let patch = AssignmentPatch {
            deadline: optional_date(self.deadline.as_deref())?,
            description: self.description,
            assignment_type: self.assignment_type,
        };
        Ok((patch, self.version))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExcuseRequest {
    #[validate(length(min = 1, max = 2048, message = "must not be empty"))]
    pub excuse: String,
}

#[derive(Debug, Deserialize)]
pub struct JournalMembershipRequest {
    pub journal_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ClassAssignmentRequest {
    pub class_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ChildLinkRequest {
    pub child_id: i64,
}
