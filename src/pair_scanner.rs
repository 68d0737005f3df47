use nom::{
    bytes::complete::is_not,
    character::complete::{char, multispace0},
    sequence::{delimited, separated_pair, tuple},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("no \"key\": \"value\" pairs found in {0} characters of text")]
    NoPairs(usize),
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), is_not("\""), char('"'))(input)
}

fn pair(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(quoted, tuple((char(':'), multispace0)), quoted)(input)
}

/// Collect every `"key": "value"` pair in `text`, left to right and without
/// overlap. Surrounding prose, fences and broken braces are skipped one
/// character at a time. Empty quoted strings never form a pair. Never
/// fails; returns an empty list when nothing matches.
pub fn scan_pairs(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = text;

    while let Some(next) = rest.chars().next() {
        match pair(rest) {
            Ok((remaining, (key, value))) => {
                pairs.push((key.to_string(), value.to_string()));
                rest = remaining;
            }
            Err(_) => rest = &rest[next.len_utf8()..],
        }
    }

    pairs
}

/// Like [`scan_pairs`], but treats an empty result as a failure.
pub fn parse_pairs(text: &str) -> Result<Vec<(String, String)>, ScanError> {
    let pairs = scan_pairs(text);
    if pairs.is_empty() {
        Err(ScanError::NoPairs(text.chars().count()))
    } else {
        Ok(pairs)
    }
}
