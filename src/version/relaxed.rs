// src/version/relaxed.rs

//! Relaxed scheme: numeric-aware alphanumeric components
//!
//! `1.2.10`, `v3_1`, `2.0-beta.1`. Components before the first `-` are
//! separated by `.` or `_`; everything after the first `-` is a qualifier
//! that sorts below the same version without one.

use super::{VersionScheme, parse_error};
use crate::error::Result;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RelaxedVersion<'a> {
    core: Vec<&'a str>,
    qualifier: Option<Vec<&'a str>>,
}

impl<'a> RelaxedVersion<'a> {
    pub(super) fn parse(text: &'a str) -> Result<Self> {
        let (core, qualifier) = match text.split_once('-') {
            Some((core, qualifier)) => (core, Some(qualifier)),
            None => (text, None),
        };

        let core = split_components(text, core, &['.', '_'])?;
        let qualifier = qualifier
            .map(|q| split_components(text, q, &['.', '-', '_']))
            .transpose()?;

        Ok(Self { core, qualifier })
    }

    pub(super) fn compare(&self, other: &Self) -> Ordering {
        match compare_components(&self.core, &other.core) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (&self.qualifier, &other.qualifier) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => compare_components(a, b),
        }
    }
}

fn split_components<'a>(full: &str, part: &'a str, separators: &[char]) -> Result<Vec<&'a str>> {
    let mut components = Vec::new();
    for component in part.split(separators) {
        if component.is_empty() {
            return Err(parse_error(full, VersionScheme::Relaxed, "empty version component"));
        }
        if !component.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(parse_error(
                full,
                VersionScheme::Relaxed,
                &format!("component '{component}' is not alphanumeric"),
            ));
        }
        components.push(component);
    }
    Ok(components)
}

/// Component-wise comparison; a strict prefix sorts first
fn compare_components(a: &[&str], b: &[&str]) -> Ordering {
    for (lhs, rhs) in a.iter().zip(b.iter()) {
        match compare_component(lhs, rhs) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    a.len().cmp(&b.len())
}

/// Compare one component by alternating digit and non-digit runs
///
/// Digit runs compare numerically, other runs as text, and a digit run sorts
/// below a text run at the same position.
fn compare_component(a: &str, b: &str) -> Ordering {
    let mut lhs = a;
    let mut rhs = b;

    loop {
        match (lhs.is_empty(), rhs.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        let (l_run, l_rest, l_numeric) = next_run(lhs);
        let (r_run, r_rest, r_numeric) = next_run(rhs);

        let ord = match (l_numeric, r_numeric) {
            (true, true) => compare_numeric(l_run, r_run),
            (false, false) => l_run.cmp(r_run),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }

        lhs = l_rest;
        rhs = r_rest;
    }
}

fn next_run(s: &str) -> (&str, &str, bool) {
    let numeric = s.as_bytes()[0].is_ascii_digit();
    let end = s
        .bytes()
        .position(|b| b.is_ascii_digit() != numeric)
        .unwrap_or(s.len());
    let (run, rest) = s.split_at(end);
    (run, rest, numeric)
}

/// Numeric comparison of digit strings of any length
fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
