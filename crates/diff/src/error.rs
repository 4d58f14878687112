use derive_more::Display;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::Stage;

/// Which input text a validation error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TextSide {
    #[display(fmt = "old")]
    Old,
    #[display(fmt = "new")]
    New,
}

/// Failure of a diff computation.
///
/// The set of kinds is closed; internal faults travel inside
/// [`DiffError::DiffCalculation`] as an `anyhow` chain.
#[derive(Debug, Error)]
pub enum DiffError {
    /// Combined input exceeds the configured size guard. Raised before any
    /// computation starts.
    #[error("content too large: input exceeds the limit of {limit} characters")]
    ContentTooLarge {
        /// Characters in both texts together, or their byte length when the
        /// input was rejected without counting characters
        total: usize,
        limit: usize,
    },

    /// One of the texts contains a disallowed control character.
    #[error("invalid content: {side} text line {line} contains control character U+{code:04X}")]
    InvalidContent {
        side: TextSide,
        /// 1-based line of the first offending character
        line: usize,
        code: u32,
    },

    /// The time budget ran out, or the caller cancelled the computation.
    #[error("{}", timeout_message(.elapsed_ms, .timeout_ms, .cancelled))]
    DiffTimeout {
        elapsed_ms: u64,
        timeout_ms: u64,
        cancelled: bool,
    },

    /// Any other failure, tagged with the stage that was running.
    #[error("diff calculation failed while {stage}")]
    DiffCalculation {
        stage: Stage,
        #[source]
        cause: anyhow::Error,
    },
}

fn timeout_message(elapsed_ms: &u64, timeout_ms: &u64, cancelled: &bool) -> String {
    if *cancelled {
        format!("diff cancelled after {elapsed_ms}ms")
    } else {
        format!("diff timed out after {elapsed_ms}ms (limit {timeout_ms}ms)")
    }
}

/// The closed set of error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorKind {
    #[display(fmt = "ContentTooLarge")]
    ContentTooLarge,
    #[display(fmt = "InvalidContent")]
    InvalidContent,
    #[display(fmt = "DiffTimeout")]
    DiffTimeout,
    #[display(fmt = "DiffCalculation")]
    DiffCalculation,
}

/// Serialisable summary of a [`DiffError`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub cause: Option<String>,
}

impl DiffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiffError::ContentTooLarge { .. } => ErrorKind::ContentTooLarge,
            DiffError::InvalidContent { .. } => ErrorKind::InvalidContent,
            DiffError::DiffTimeout { .. } => ErrorKind::DiffTimeout,
            DiffError::DiffCalculation { .. } => ErrorKind::DiffCalculation,
        }
    }

    /// Check whether the caller's token stopped the computation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DiffError::DiffTimeout { cancelled: true, .. })
    }

    pub fn report(&self) -> ErrorReport {
        let cause = match self {
            DiffError::DiffCalculation { cause, .. } => Some(format!("{cause:#}")),
            _ => None,
        };
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            cause,
        }
    }
}
