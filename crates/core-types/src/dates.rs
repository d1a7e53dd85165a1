use crate::error::CoreError;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(input: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| CoreError::InvalidDateFormat)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_then_format_is_identity() {
        let date = parse_date("2006-01-02").unwrap();
        assert_eq!(format_date(date), "2006-01-02");
    }

    #[test]
    fn rejects_other_layouts() {
        assert_eq!(parse_date("02/01/2006"), Err(CoreError::InvalidDateFormat));
        assert_eq!(parse_date("2006-13-01"), Err(CoreError::InvalidDateFormat));
        assert_eq!(parse_date(""), Err(CoreError::InvalidDateFormat));
    }
}
