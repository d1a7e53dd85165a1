pub mod dates;
pub mod enums;
pub mod error;
pub mod marks;
pub mod patch;
pub mod validation;

// Re-export the core types to provide a clean public API.
pub use dates::{format_date, parse_date};
pub use enums::{AssignmentType, MarkType, Role, TargetKind};
pub use error::{CoreError, ErrorKind};
pub use marks::{
    Mark, MarkDraft, MarkPatch, MarkTarget, MarkTargetRef, NewMark, chain_is_consistent,
    check_course,
};
pub use validation::is_valid_email;
