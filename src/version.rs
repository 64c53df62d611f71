//! Version token ordering.
//!
//! Versions are opaque strings. The core never parses them; it only asks a
//! [`VersionComparator`] for their relative order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Total order over version tokens.
///
/// Implementations must be consistent for the lifetime of the process.
pub trait VersionComparator: Send + Sync {
    /// Compare two version tokens.
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

impl<F> VersionComparator for F
where
    F: Fn(&str, &str) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &str, b: &str) -> Ordering {
        self(a, b)
    }
}

/// Byte-wise lexicographic ordering.
///
/// Only chronological for fixed-width tokens such as `YYYY-MM-DD`:
/// `"10"` sorts before `"9"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lexicographic;

impl VersionComparator for Lexicographic {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }
}

/// Dot-separated segment ordering (`1.2.10` > `1.2.9`).
///
/// Segments that both parse as integers compare numerically, anything else
/// compares as strings. A shorter token sorts first when all shared segments
/// are equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct DottedNumeric;

impl VersionComparator for DottedNumeric {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let mut left = a.split('.');
        let mut right = b.split('.');

        loop {
            match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(l), Some(r)) => {
                    let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                        (Ok(l), Ok(r)) => l.cmp(&r),
                        _ => l.cmp(r),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }
    }
}

/// Built-in comparator selectable from configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComparatorKind {
    /// [`Lexicographic`]
    #[default]
    Lexicographic,
    /// [`DottedNumeric`]
    DottedNumeric,
}

impl ComparatorKind {
    /// Instantiate the comparator.
    pub fn build(self) -> Arc<dyn VersionComparator> {
        match self {
            Self::Lexicographic => Arc::new(Lexicographic),
            Self::DottedNumeric => Arc::new(DottedNumeric),
        }
    }
}
