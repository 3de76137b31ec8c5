//! Judge verdict vocabulary shared by every provider

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict reported by a remote judge.
///
/// `Unknown` is the only non-terminal value: the poll loop keeps going while a
/// submission maps to it. `PretestsPassed` may be followed by a later
/// full-judge verdict on the remote side, but locally it ends the poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeStatus {
    Unknown,
    Accepted,
    PretestsPassed,
    WrongAnswer,
    CompileError,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    OutputLimitExceeded,
    InternalError,
}

/// How a verdict should be emphasised when displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Positive,
    Negative,
    Warning,
    Severe,
}

impl Emphasis {
    /// ANSI escape prefix for this emphasis level.
    pub fn ansi(&self) -> &'static str {
        match self {
            Emphasis::Positive => "\x1b[32;1m",
            Emphasis::Negative => "\x1b[31;1m",
            Emphasis::Warning => "\x1b[33;1m",
            Emphasis::Severe => "\x1b[35;1m",
        }
    }
}

pub const ANSI_RESET: &str = "\x1b[0m";

impl JudgeStatus {
    /// Canonical human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            JudgeStatus::Unknown => "Unknown",
            JudgeStatus::Accepted => "Accepted",
            JudgeStatus::PretestsPassed => "Pretests passed",
            JudgeStatus::WrongAnswer => "Wrong answer",
            JudgeStatus::CompileError => "Compile error",
            JudgeStatus::RuntimeError => "Runtime error",
            JudgeStatus::TimeLimitExceeded => "Time limit exceeded",
            JudgeStatus::MemoryLimitExceeded => "Memory limit exceeded",
            JudgeStatus::OutputLimitExceeded => "Output limit exceeded",
            JudgeStatus::InternalError => "Internal error",
        }
    }

    pub fn emphasis(&self) -> Emphasis {
        match self {
            JudgeStatus::Accepted | JudgeStatus::PretestsPassed => Emphasis::Positive,
            JudgeStatus::WrongAnswer => Emphasis::Negative,
            JudgeStatus::RuntimeError
            | JudgeStatus::TimeLimitExceeded
            | JudgeStatus::MemoryLimitExceeded
            | JudgeStatus::OutputLimitExceeded => Emphasis::Warning,
            JudgeStatus::CompileError | JudgeStatus::InternalError | JudgeStatus::Unknown => {
                Emphasis::Severe
            }
        }
    }

    /// Everything except `Unknown` stops the poll loop.
    pub fn is_terminal(&self) -> bool {
        *self != JudgeStatus::Unknown
    }

    /// Label wrapped in the ANSI emphasis color.
    pub fn colored(&self) -> String {
        format!("{}{}{}", self.emphasis().ansi(), self.label(), ANSI_RESET)
    }
}

impl fmt::Display for JudgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
