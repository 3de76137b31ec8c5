//! Error taxonomy shared across the client
//!
//! Every condition the commands treat as a declared outcome (as opposed to an
//! unexpected I/O failure, which travels as a plain `anyhow` error) gets a
//! variant here so callers can match on it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no {language} source file found in the current directory")]
    NoSourceFile { language: String },

    #[error("compile error")]
    Compile,

    #[error("runtime error (exit status {exit_code})")]
    Runtime { exit_code: i32 },

    #[error("judge `{judge}` does not support language `{language}`")]
    UnsupportedLanguage { judge: String, language: String },

    #[error("failed to log in to `{judge}`: {reason}")]
    Authentication { judge: String, reason: String },

    #[error("invalid problem url `{0}`")]
    InvalidProblemUrl(String),

    #[error("failed to submit the solution: {0}")]
    Submission(String),

    #[error("failed to load problem `{id}`: {reason}")]
    SampleLoad { id: String, reason: String },

    #[error("case index must be between 1 and {max}")]
    InvalidCaseIndex { max: usize },

    #[error("no judge matches `{0}`")]
    UnknownJudge(String),
}
