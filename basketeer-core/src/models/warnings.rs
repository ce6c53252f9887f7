//! Accumulated, non-fatal warnings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered list of human-readable warnings.
///
/// Warnings are collected whenever a secondary source is unavailable but the
/// operation still produced usable data. They are threaded as `&mut Warnings`
/// through nested calls so nothing is lost mid-stack. An empty list means the
/// fully successful path was taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Warnings(Vec<String>);

impl Warnings {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a warning.
    pub fn push(&mut self, warning: impl Into<String>) {
        self.0.push(warning.into());
    }

    /// Appends all warnings from another list, keeping their order.
    pub fn extend(&mut self, other: Warnings) {
        self.0.extend(other.0);
    }

    /// Returns true if no warnings were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of warnings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if an identical warning was already recorded.
    pub fn contains(&self, warning: &str) -> bool {
        self.0.iter().any(|w| w == warning)
    }

    /// Iterates over the warnings in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Borrows the warnings as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consumes the list.
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}

impl<'a> IntoIterator for &'a Warnings {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
