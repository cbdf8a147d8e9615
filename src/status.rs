//! Monitoring status levels, aggregation and reporting.
//!
//! A check produces a [`Status`]. Several statuses are folded into one with
//! [`Status::aggregate`], and the result is turned into a [`Report`]: the
//! line to print and the exit code the monitoring framework expects.
//! Nothing in here prints or exits; only the binary does that.

use serde::Serialize;
use strum_macros::{Display, EnumString};

use crate::error::CheckError;

/// Separator placed in front of every aggregated message.
pub const MESSAGE_SEPARATOR: &str = " - ";

/// Status level, ordered from best to worst.
///
/// The numeric value is the process exit code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum Severity {
    #[strum(serialize = "OK")]
    Ok = 0,
    #[strum(serialize = "WARNING")]
    Warning = 1,
    #[strum(serialize = "CRITICAL")]
    Critical = 2,
    #[strum(serialize = "UNKNOWN")]
    Unknown = 3,
}

impl Severity {
    pub fn exit_code(self) -> i32 {
        self as i32
    }
}

/// A message together with its level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub message: String,
    pub severity: Severity,
}

impl Status {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Status {
            message: message.into(),
            severity,
        }
    }

    /// Folds `others` into `self`.
    ///
    /// The level becomes the highest level seen. Every message is appended in
    /// the order given, whatever its level.
    pub fn aggregate<'a, I>(&mut self, others: I)
    where
        I: IntoIterator<Item = &'a Status>,
    {
        for other in others {
            if other.severity > self.severity {
                self.severity = other.severity;
            }
            self.message.push_str(MESSAGE_SEPARATOR);
            self.message.push_str(&other.message);
        }
    }

    /// Folds a list of statuses, using the first one as the primary.
    ///
    /// Returns UNKNOWN when the list is empty, since nothing was checked.
    pub fn aggregate_all(statuses: &[Status]) -> Status {
        match statuses.split_first() {
            Some((first, rest)) => {
                let mut primary = first.clone();
                primary.aggregate(rest);
                primary
            }
            None => Status::new("no checks were run", Severity::Unknown),
        }
    }

    pub fn report(&self) -> Report {
        Report {
            text: format!("{}: {}", self.severity, self.message),
            exit_code: self.severity.exit_code(),
        }
    }
}

impl From<&CheckError> for Status {
    fn from(err: &CheckError) -> Self {
        Status::new(err.to_string(), err.severity())
    }
}

/// What the process prints and the code it exits with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub text: String,
    pub exit_code: i32,
}

impl Report {
    /// Appends long output below the status line.
    pub fn with_details(mut self, details: &str) -> Self {
        if !details.is_empty() {
            self.text.push('\n');
            self.text.push_str(details.trim_end());
        }
        self
    }
}

pub fn ok(message: impl Into<String>) -> Report {
    Status::new(message, Severity::Ok).report()
}

pub fn warning(message: impl Into<String>) -> Report {
    Status::new(message, Severity::Warning).report()
}

pub fn critical(err: &dyn std::error::Error) -> Report {
    Status::new(err.to_string(), Severity::Critical).report()
}

pub fn unknown(message: impl Into<String>) -> Report {
    Status::new(message, Severity::Unknown).report()
}
