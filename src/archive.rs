//! Accepted-source archive and the pre-submission source processor

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::judge::{Problem, SubmissionRecord};
use crate::languages::Language;
use crate::settings::{expand_exe_dir, Settings};

/// Pipe the source through the configured processor command
/// (`Process.Command`, `{EXE_DIR}` expanded). Without one the source passes
/// through untouched.
pub async fn process_source(settings: &Settings, source: &str) -> Result<String> {
    let Some(command) = settings.get_str("Process.Command", "") else {
        return Ok(source.to_string());
    };
    let command = expand_exe_dir(&command);
    let argv: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    anyhow::ensure!(!argv.is_empty(), "Process.Command is empty");
    debug!("processing source with {:?}", argv);

    let mut child = Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("failed to spawn `{}`", argv[0]))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(source.as_bytes()).await?;
    }
    let output = child
        .wait_with_output()
        .await
        .context("failed to wait for source processor")?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Commented header recorded above an archived source: where it came from,
/// where it went, when, and with what verdict.
pub fn build_header(lang: &Language, problem: &Problem, record: &SubmissionRecord) -> String {
    format!(
        "{}\n{}\n{}\n{}\n\n",
        lang.comment_out(&format!("problem: {}", problem.url)),
        lang.comment_out(&format!("submission: {}", record.url)),
        lang.comment_out(&record.submitted_at.to_rfc3339()),
        lang.comment_out(record.status.label()),
    )
}

pub fn archive_filename(problem: &Problem, record: &SubmissionRecord, lang: &Language) -> String {
    format!(
        "{}_{}{}",
        problem.name,
        record.submitted_at.format("%Y%m%d%H%M%S"),
        lang.file_extension
    )
}

/// Write the header + source under `<archive_dir>/<judge name>/`.
pub fn save_accepted_source(
    archive_dir: &Path,
    lang: &Language,
    problem: &Problem,
    record: &SubmissionRecord,
) -> Result<PathBuf> {
    let judge_dir = archive_dir.join(&problem.judge);
    std::fs::create_dir_all(&judge_dir)
        .with_context(|| format!("failed to create {:?}", judge_dir))?;

    let path = judge_dir.join(archive_filename(problem, record, lang));
    let content = format!("{}{}", build_header(lang, problem, record), record.source);
    std::fs::write(&path, content).with_context(|| format!("failed to write {:?}", path))?;
    info!("saved the accepted source as {:?}", path);
    Ok(path)
}

/// Archive `record` if the user has archiving turned on (asked once, then
/// persisted) and the verdict warrants it.
pub fn archive_if_enabled(
    settings: &mut Settings,
    lang: &Language,
    problem: &Problem,
    record: &SubmissionRecord,
) -> Result<Option<PathBuf>> {
    use crate::judge::JudgeStatus;

    if !matches!(
        record.status,
        JudgeStatus::Accepted | JudgeStatus::PretestsPassed
    ) {
        return Ok(None);
    }
    let enabled = settings.get_or_confirm(
        "Archive.Enabled",
        "Copy the source file after a solution is accepted?",
    )?;
    if !enabled {
        return Ok(None);
    }

    let dir = loop {
        let raw = settings.get_or_prompt(
            "Archive.Directory",
            "",
            "Directory for accepted sources ({EXE_DIR} is allowed)",
        )?;
        let expanded = PathBuf::from(expand_exe_dir(&raw));
        if std::fs::create_dir_all(&expanded).is_ok() {
            break expanded;
        }
        eprintln!("invalid path, try again ...");
        settings.set("Archive.Directory", serde_json::Value::Null)?;
    };

    save_accepted_source(&dir, lang, problem, record).map(Some)
}
