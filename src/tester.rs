//! Sample-case tester
//!
//! Runs a problem's sample cases through the language runner and compares the
//! captured output with the expected one. Comparison is exact string equality
//! after both sides are normalized to a trailing newline; anything smarter
//! (whitespace-tolerant diffing, special judges) is the remote judge's
//! business, not ours.

use anyhow::Result;
use tracing::debug;

use crate::errors::ClientError;
use crate::judge::Problem;
use crate::languages::Language;
use crate::runner::Runner;
use crate::text::ensure_trailing_newline;

const SECTION_WIDTH: usize = 40;

/// Outcome of one sample case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    /// 1-indexed case number
    pub index: usize,
    pub passed: bool,
    pub actual: String,
    pub expected: String,
}

fn section(title: &str) -> String {
    let filler = SECTION_WIDTH.saturating_sub(title.len() + 6);
    format!("==== {} {}", title, "=".repeat(filler))
}

fn outputs_match(actual: &str, expected: &str) -> bool {
    ensure_trailing_newline(actual) == ensure_trailing_newline(expected)
}

/// Run every sample case with console echo off. Failures are reported with
/// the input/actual/expected triple but never abort the remaining cases.
pub async fn run_all(
    runner: &Runner,
    lang: &Language,
    problem: &Problem,
    source_path: &std::path::Path,
) -> Result<Vec<CaseReport>> {
    let mut reports = Vec::with_capacity(problem.cases.len());

    for (i, case) in problem.cases.iter().enumerate() {
        let actual = runner
            .run(lang, source_path, Some(&case.input), false)
            .await?;
        let passed = outputs_match(&actual, &case.output);
        debug!("case {}: passed={}", i + 1, passed);

        if !passed {
            println!("{}", section(&format!("case {}: input", i + 1)));
            print!("{}", case.input);
            println!("{}", section("your answer"));
            print!("{}", ensure_trailing_newline(&actual));
            println!("{}", section("correct answer"));
            print!("{}", case.output);
            println!("{}", "=".repeat(SECTION_WIDTH));
        }

        reports.push(CaseReport {
            index: i + 1,
            passed,
            actual,
            expected: case.output.clone(),
        });
    }

    Ok(reports)
}

/// Run a single case (1-indexed) with console echo on, so the user watches
/// the program live. An out-of-range index is rejected before anything runs.
pub async fn run_one(
    runner: &Runner,
    lang: &Language,
    problem: &Problem,
    source_path: &std::path::Path,
    case_index: usize,
) -> Result<CaseReport> {
    if case_index < 1 || case_index > problem.cases.len() {
        return Err(ClientError::InvalidCaseIndex {
            max: problem.cases.len(),
        }
        .into());
    }
    let case = &problem.cases[case_index - 1];

    println!("{}", section("input"));
    print!("{}", case.input);
    println!("{}", section("output"));
    let actual = runner
        .run(lang, source_path, Some(&case.input), true)
        .await?;
    println!("{}", "=".repeat(SECTION_WIDTH));

    let passed = outputs_match(&actual, &case.output);
    if !passed {
        println!("{}", section("your answer"));
        print!("{}", ensure_trailing_newline(&actual));
        println!("{}", section("correct answer"));
        print!("{}", case.output);
        println!("{}", "=".repeat(SECTION_WIDTH));
    }

    Ok(CaseReport {
        index: case_index,
        passed,
        actual,
        expected: case.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::TestCase;
    use std::path::Path;

    /// Language whose "program" sums the two numbers on stdin.
    fn sum_lang(dir: &Path) -> Language {
        let script = dir.join("sum.sh");
        std::fs::write(&script, "read a b\necho $((a + b))\n").unwrap();
        Language {
            name: "Sum".into(),
            file_extension: ".txt".into(),
            compile_command: None,
            run_command: format!("sh {}", script.display()),
            comment_begin: "# ".into(),
            comment_end: "".into(),
        }
    }

    fn sum_problem() -> Problem {
        Problem {
            id: "A".into(),
            contest_id: "".into(),
            name: "a".into(),
            url: "https://example.com/a".into(),
            judge: "AtCoder".into(),
            cases: vec![TestCase {
                input: "1 2\n".into(),
                output: "3\n".into(),
            }],
        }
    }

    #[tokio::test]
    async fn test_run_one_passes_on_matching_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "").unwrap();

        let runner = Runner::new(dir.path());
        let lang = sum_lang(dir.path());
        let report = run_one(&runner, &lang, &sum_problem(), &source, 1)
            .await
            .unwrap();
        assert!(report.passed);
        assert_eq!(report.actual, "3\n");
    }

    #[tokio::test]
    async fn test_run_one_out_of_range_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "").unwrap();

        let runner = Runner::new(dir.path());
        // a command that would blow up if it ever ran
        let lang = Language {
            run_command: "false".into(),
            ..sum_lang(dir.path())
        };

        for bad_index in [0, 2, 99] {
            let err = run_one(&runner, &lang, &sum_problem(), &source, bad_index)
                .await
                .unwrap_err();
            match err.downcast_ref::<ClientError>() {
                Some(ClientError::InvalidCaseIndex { max }) => assert_eq!(*max, 1),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_run_all_reports_every_case() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "").unwrap();

        let runner = Runner::new(dir.path());
        let lang = sum_lang(dir.path());

        let mut problem = sum_problem();
        problem.cases = vec![
            TestCase {
                input: "1 2\n".into(),
                output: "3\n".into(),
            },
            TestCase {
                input: "2 2\n".into(),
                output: "5\n".into(), // wrong on purpose
            },
            TestCase {
                input: "10 20\n".into(),
                output: "30\n".into(),
            },
        ];

        let reports = run_all(&runner, &lang, &problem, &source).await.unwrap();
        // the failing middle case does not stop evaluation
        assert_eq!(reports.len(), 3);
        assert!(reports[0].passed);
        assert!(!reports[1].passed);
        assert!(reports[2].passed);
        assert!(!reports.iter().all(|r| r.passed));
    }

    #[tokio::test]
    async fn test_run_all_passes_iff_outputs_match() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "").unwrap();

        let runner = Runner::new(dir.path());
        let lang = sum_lang(dir.path());
        let reports = run_all(&runner, &lang, &sum_problem(), &source)
            .await
            .unwrap();
        assert!(reports.iter().all(|r| r.passed));
    }

    #[test]
    fn test_outputs_match_normalizes_trailing_newline() {
        assert!(outputs_match("3", "3\n"));
        assert!(outputs_match("3\n", "3\n"));
        assert!(!outputs_match("3 ", "3"));
        assert!(!outputs_match("4\n", "3\n"));
    }
}
