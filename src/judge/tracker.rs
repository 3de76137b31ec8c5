//! Submission tracking
//!
//! Drives the submit -> poll -> terminal-verdict state machine that is common
//! to every judge. The judge-specific part is the status-string table and the
//! way the rendered status is fetched, both supplied by the provider.

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::status::JudgeStatus;
use super::{JudgeProvider, Session};
use crate::errors::ClientError;
use crate::judge::Problem;
use crate::languages::Language;

/// Interval between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// One submission and its (possibly still changing) verdict.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRecord {
    pub problem_id: String,
    pub source: String,
    pub language: String,
    pub submitted_at: DateTime<Utc>,
    pub url: String,
    pub status: JudgeStatus,
}

/// Map a judge-rendered status string through a provider's table. The first
/// entry whose pattern occurs in the rendered text wins; no match leaves the
/// submission `Unknown`, which the poll loop treats as "try again".
pub fn map_status(table: &[(&str, JudgeStatus)], rendered: &str) -> JudgeStatus {
    for (pattern, status) in table {
        if rendered.contains(pattern) {
            return *status;
        }
    }
    JudgeStatus::Unknown
}

/// Submit `source` and poll until the verdict is terminal.
///
/// `deadline: None` preserves the historical behavior of blocking until the
/// judge answers; a `Some` value turns the poll loop into a bounded wait.
pub async fn submit_and_track(
    provider: &dyn JudgeProvider,
    session: &Session,
    problem: &Problem,
    source: &str,
    language: &Language,
    interval: Duration,
    deadline: Option<Duration>,
) -> Result<SubmissionRecord> {
    let mut record = provider.submit(session, problem, source, language).await?;
    poll(provider, session, &mut record, interval, deadline).await?;
    Ok(record)
}

/// Poll loop half of [`submit_and_track`], separated so a submission obtained
/// elsewhere can be watched too.
pub async fn poll(
    provider: &dyn JudgeProvider,
    session: &Session,
    record: &mut SubmissionRecord,
    interval: Duration,
    deadline: Option<Duration>,
) -> Result<()> {
    let started = Instant::now();
    let mut waited = false;

    loop {
        let rendered = provider.fetch_status(session, record).await?;
        let status = map_status(provider.status_table(), &rendered);
        debug!("rendered status {:?} mapped to {:?}", rendered, status);

        if status.is_terminal() {
            record.status = status;
            break;
        }

        if let Some(limit) = deadline {
            if started.elapsed() >= limit {
                return Err(ClientError::Submission(format!(
                    "no verdict within {:?}; check {} yourself",
                    limit, record.url
                ))
                .into());
            }
        }

        if !waited {
            eprint!("waiting for judge .");
            waited = true;
        } else {
            eprint!(".");
        }
        let _ = std::io::stderr().flush();
        tokio::time::sleep(interval).await;
    }

    if waited {
        eprintln!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::UrlKind;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    /// Provider stub that replays a fixed sequence of rendered statuses.
    struct ScriptedProvider {
        statuses: Mutex<Vec<String>>,
        fetches: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(statuses: &[&str]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().rev().map(|s| s.to_string()).collect()),
                fetches: Mutex::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            *self.fetches.lock().unwrap()
        }
    }

    #[async_trait]
    impl JudgeProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "Scripted"
        }

        fn session_key(&self) -> &'static str {
            "scripted"
        }

        fn data_dir(&self) -> &Path {
            Path::new(".")
        }

        fn classify_url(&self, _url: &str) -> Option<UrlKind> {
            None
        }

        async fn probe(&self, _session: &Session) -> Result<bool> {
            Ok(true)
        }

        async fn login(
            &self,
            _session: &Session,
            _settings: &mut crate::settings::Settings,
        ) -> Result<()> {
            Ok(())
        }

        async fn fetch_problem(&self, _session: &Session, _url: &str) -> Result<Vec<Problem>> {
            anyhow::bail!("not used")
        }

        async fn submit(
            &self,
            _session: &Session,
            _problem: &Problem,
            _source: &str,
            _language: &Language,
        ) -> Result<SubmissionRecord> {
            anyhow::bail!("not used")
        }

        fn status_table(&self) -> &'static [(&'static str, JudgeStatus)] {
            &[
                ("Accepted", JudgeStatus::Accepted),
                ("Wrong Answer", JudgeStatus::WrongAnswer),
            ]
        }

        async fn fetch_status(
            &self,
            _session: &Session,
            _record: &SubmissionRecord,
        ) -> Result<String> {
            *self.fetches.lock().unwrap() += 1;
            Ok(self.statuses.lock().unwrap().pop().unwrap_or_default())
        }
    }

    fn dummy_record() -> SubmissionRecord {
        SubmissionRecord {
            problem_id: "A".into(),
            source: "code".into(),
            language: "C++".into(),
            submitted_at: Utc::now(),
            url: "https://example.com/sub/1".into(),
            status: JudgeStatus::Unknown,
        }
    }

    #[test]
    fn test_map_status_first_match_wins() {
        let table: &[(&str, JudgeStatus)] = &[
            ("Accepted", JudgeStatus::Accepted),
            ("Wrong Answer", JudgeStatus::WrongAnswer),
        ];
        assert_eq!(map_status(table, "Accepted"), JudgeStatus::Accepted);
        assert_eq!(
            map_status(table, "Wrong Answer on test 3"),
            JudgeStatus::WrongAnswer
        );
        assert_eq!(map_status(table, "-"), JudgeStatus::Unknown);
        assert_eq!(map_status(table, ""), JudgeStatus::Unknown);
    }

    #[tokio::test]
    async fn test_poll_retries_until_terminal() {
        let provider = ScriptedProvider::new(&["-", "-", "Accepted"]);
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new("scripted", dir.path());
        let mut record = dummy_record();

        poll(&provider, &session, &mut record, Duration::ZERO, None)
            .await
            .unwrap();

        // two retry iterations, then the terminal fetch
        assert_eq!(provider.fetch_count(), 3);
        assert_eq!(record.status, JudgeStatus::Accepted);
    }

    #[tokio::test]
    async fn test_poll_immediate_terminal_does_not_wait() {
        let provider = ScriptedProvider::new(&["Wrong Answer"]);
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new("scripted", dir.path());
        let mut record = dummy_record();

        poll(&provider, &session, &mut record, Duration::ZERO, None)
            .await
            .unwrap();
        assert_eq!(provider.fetch_count(), 1);
        assert_eq!(record.status, JudgeStatus::WrongAnswer);
    }

    #[tokio::test]
    async fn test_poll_deadline_gives_up() {
        let provider = ScriptedProvider::new(&["-", "-", "-", "-"]);
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new("scripted", dir.path());
        let mut record = dummy_record();

        let err = poll(
            &provider,
            &session,
            &mut record,
            Duration::ZERO,
            Some(Duration::ZERO),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Submission(_))
        ));
        assert_eq!(record.status, JudgeStatus::Unknown);
    }
}
