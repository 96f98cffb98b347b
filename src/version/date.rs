// src/version/date.rs

//! Date scheme: `YYYY-MM-DD` optionally followed by `.N.N...`

use super::{VersionScheme, parse_error};
use crate::error::Result;
use chrono::NaiveDate;

/// Parsed date version, borrowed from its source text
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(super) struct DateVersion<'a> {
    // Fixed-width and zero padded, so text order is date order
    date: &'a str,
    sequence: Vec<u64>,
}

impl<'a> DateVersion<'a> {
    pub(super) fn parse(text: &'a str) -> Result<Self> {
        let err = |reason: &str| parse_error(text, VersionScheme::Date, reason);

        if text.len() < 10 || !text.is_char_boundary(10) {
            return Err(err("expected a YYYY-MM-DD date"));
        }
        let (date, rest) = text.split_at(10);

        let shape_ok = date.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
        if !shape_ok {
            return Err(err("expected a YYYY-MM-DD date"));
        }
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| err(&format!("invalid calendar date: {e}")))?;

        let mut sequence = Vec::new();
        if !rest.is_empty() {
            let Some(rest) = rest.strip_prefix('.') else {
                return Err(err("date must be followed by '.' and numeric identifiers"));
            };
            for part in rest.split('.') {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(err("release identifiers must be numeric"));
                }
                let n = part
                    .parse::<u64>()
                    .map_err(|e| err(&format!("release identifier out of range: {e}")))?;
                sequence.push(n);
            }
        }

        Ok(Self { date, sequence })
    }
}
