//! Terminal presentation of the schools view
//!
//! Rendering is pure: every function turns published view state into text
//! and leaves printing to the caller.

use crate::view_model::{FetchStatus, JoinedEntry, JoinedView};
use nycs_common::{Error, Result};
use std::collections::HashSet;
use std::fmt::Write;

/// Shown in place of a score when the school has no SAT record
pub const UNAVAILABLE: &str = "Unavailable";

/// Which rows are expanded to show SAT details
#[derive(Debug, Clone, Default)]
pub struct PresenterState {
    expanded: HashSet<String>,
}

impl PresenterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a row between collapsed and expanded, returning the new state
    pub fn toggle(&mut self, dbn: &str) -> bool {
        if self.expanded.remove(dbn) {
            false
        } else {
            self.expanded.insert(dbn.to_string());
            true
        }
    }

    pub fn is_expanded(&self, dbn: &str) -> bool {
        self.expanded.contains(dbn)
    }
}

/// One line of interactive input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Any line not starting with `:` replaces the search query
    Search(String),
    /// `:x <dbn>`
    Toggle(String),
    /// `:r`
    Refresh,
    /// `:q`
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Command::Search(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("q"), None) => Ok(Command::Quit),
            (Some("r"), None) => Ok(Command::Refresh),
            (Some("x"), Some(dbn)) => Ok(Command::Toggle(dbn.to_string())),
            (Some("x"), None) => Err(Error::InvalidInput(":x needs a school id".to_string())),
            _ => Err(Error::InvalidInput(format!("Unknown command: {}", line))),
        }
    }
}

pub fn render_loading() -> String {
    "Loading schools...".to_string()
}

/// Banner for a degraded fetch, `None` when the last cycle fully succeeded
pub fn render_status(status: &FetchStatus) -> Option<String> {
    let mut failed = Vec::new();
    if let Some(e) = &status.schools_error {
        failed.push(format!("schools ({})", e));
    }
    if let Some(e) = &status.scores_error {
        failed.push(format!("scores ({})", e));
    }

    if failed.is_empty() {
        None
    } else {
        Some(format!(
            "Could not refresh {}; showing last available data",
            failed.join(", ")
        ))
    }
}

pub fn render_row(entry: &JoinedEntry, expanded: bool) -> String {
    let school = &entry.school;
    let mut out = format!(
        "[{}] {} - {}",
        school.dbn,
        school.school_name,
        school.borough_name()
    );

    if expanded {
        let scores = entry.scores.as_ref();
        let reading = scores.map_or(UNAVAILABLE, |s| s.critical_reading_avg.as_str());
        let math = scores.map_or(UNAVAILABLE, |s| s.math_avg.as_str());
        let writing = scores.map_or(UNAVAILABLE, |s| s.writing_avg.as_str());

        // Writing to a String cannot fail
        let _ = write!(
            out,
            "\n    SAT Averages\n    Reading: {}  Math: {}  Writing: {}",
            reading, math, writing
        );
    }

    out
}

pub fn render_list(view: &JoinedView, state: &PresenterState) -> String {
    if view.is_empty() {
        return "No schools match.".to_string();
    }

    let mut out = format!("{} schools\n", view.len());
    for entry in view.iter() {
        out.push_str(&render_row(entry, state.is_expanded(&entry.school.dbn)));
        out.push('\n');
    }
    out
}
