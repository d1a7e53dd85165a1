use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("static e-mail pattern compiles")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("teacher@school.example"));
        assert!(is_valid_email("first.last+tag@sub.school.example"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@school.example"));
        assert!(!is_valid_email("trailing@"));
        assert!(!is_valid_email(""));
    }
}
