use chrono::NaiveDate;
use thiserror::Error;
use winnow::Parser;
use winnow::Result;
use winnow::ascii::multispace0;
use winnow::combinator::{delimited, preceded};
use winnow::error::ParserError;
use winnow::token::{one_of, take_while};

#[derive(Debug, Error, PartialEq)]
#[error("`{0}` is not a date, expected YYYY-MM-DD")]
pub struct DueDateError(pub String);

/// Text typed into the add bar, with an optional leading `[date]` tag.
#[derive(Debug, PartialEq)]
pub struct Entry {
    pub due: Option<NaiveDate>,
    pub text: String,
}

/// Parses a whole due date field such as `2025-03-31` or `2025/3/31`.
pub fn parse_due(input: &str) -> std::result::Result<NaiveDate, DueDateError> {
    parse_date
        .parse(input.trim())
        .map_err(|_| DueDateError(input.trim().to_string()))
}

/// Splits `[2025-03-31] Water the plants` into a due date and text. Input
/// without a valid tag is all text.
pub fn parse_entry(input: &str) -> Entry {
    let mut rest = input;
    match parse_date_tag.parse_next(&mut rest) {
        Ok(due) => Entry {
            due: Some(due),
            text: rest.trim().to_string(),
        },
        Err(_) => Entry {
            due: None,
            text: input.trim().to_string(),
        },
    }
}

fn parse_date_tag(input: &mut &str) -> Result<NaiveDate> {
    preceded(
        multispace0,
        delimited('[', delimited(multispace0, parse_date, multispace0), ']'),
    )
    .parse_next(input)
}

fn parse_date(input: &mut &str) -> Result<NaiveDate> {
    let (year, month, day) = (
        parse_year,
        preceded(parse_separator, parse_month_or_day),
        preceded(parse_separator, parse_month_or_day),
    )
        .parse_next(input)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| ParserError::from_input(input))
}

fn parse_year(input: &mut &str) -> Result<i32> {
    take_while(4, '0'..='9')
        .try_map(str::parse::<i32>)
        .parse_next(input)
}

fn parse_month_or_day(input: &mut &str) -> Result<u32> {
    take_while(1..=2, '0'..='9')
        .try_map(str::parse::<u32>)
        .parse_next(input)
}

fn parse_separator(input: &mut &str) -> Result<char> {
    one_of(['-', '/']).parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_year_test() {
        let mut input = "2034-01-01";
        assert_eq!(parse_year(&mut input).unwrap(), 2034);
        assert_eq!(input, "-01-01");
    }

    #[test]
    fn simple_date_test() {
        assert_eq!(
            parse_due("2025-03-01"),
            Ok(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
        );
        assert_eq!(
            parse_due(" 2025/3/9 "),
            Ok(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap())
        );
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(parse_due("2025-02-30").is_err());
        assert!(parse_due("2025-13-01").is_err());
        assert!(parse_due("25-01-01").is_err());
        assert!(parse_due("2025-001-01").is_err());
        assert!(parse_due("tomorrow").is_err());
        assert!(parse_due("2025-01-01 extra").is_err());
    }

    #[test]
    fn simple_parse_test() {
        let input = r#"

            [2025-03-31]
            This is a test task.
            "#;
        assert_eq!(
            parse_entry(input),
            Entry {
                due: NaiveDate::from_ymd_opt(2025, 3, 31),
                text: "This is a test task.".to_string(),
            }
        );
    }

    #[test]
    fn untagged_entry_is_all_text() {
        assert_eq!(
            parse_entry("  Buy milk "),
            Entry {
                due: None,
                text: "Buy milk".to_string(),
            }
        );
        assert_eq!(
            parse_entry("[soon] Buy milk"),
            Entry {
                due: None,
                text: "[soon] Buy milk".to_string(),
            }
        );
    }
}
