//! Aizu Online Judge provider
//!
//! AOJ is the one judge with a first-class JSON/XML API: login and submission
//! go through `judgeapi.u-aizu.ac.jp`, while sample cases still come from the
//! `description.jsp` problem pages.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tracing::debug;

use super::status::JudgeStatus;
use super::tracker::SubmissionRecord;
use super::{JudgeProvider, Problem, Session, TestCase, UrlKind};
use crate::errors::ClientError;
use crate::languages::Language;
use crate::settings::Settings;
use crate::text::{ensure_trailing_newline, strip_tags, unescape_html};

const API_URL: &str = "https://judgeapi.u-aizu.ac.jp";
const STATUS_LOG_URL: &str = "http://judge.u-aizu.ac.jp/onlinejudge/webservice/status_log";
const REVIEW_URL: &str = "http://judge.u-aizu.ac.jp/onlinejudge/review.jsp?rid=";

static PROBLEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://judge\.u-aizu\.ac\.jp/onlinejudge/description\.jsp\?id=([^&]+)")
        .unwrap()
});
static HEADING_PRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<h([23])[^>]*>(.*?)</h[23]>\s*<pre[^>]*>(.*?)</pre>").unwrap()
});
static RUN_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<run_id>\s*(\d+)").unwrap());
static STATUS_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<status>\s*([^<>]+?)\s*</status>").unwrap());
static RID_OF_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"rid=(\d+)").unwrap());

const INPUT_HEADINGS: &[&str] = &["Sample Input", "入力例", "サンプル入力"];
const OUTPUT_HEADINGS: &[&str] = &["Sample Output", "Output for", "出力例", "サンプル出力"];

pub struct Aoj {
    data_dir: PathBuf,
}

impl Aoj {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn lang_id(&self, language: &Language) -> Result<&'static str> {
        let id = match language.name.as_str() {
            "C++" => "C++14",
            "Python3" => "Python3",
            "Java" => "JAVA",
            "Rust" => "Rust",
            _ => {
                return Err(ClientError::UnsupportedLanguage {
                    judge: self.name().to_string(),
                    language: language.name.clone(),
                }
                .into())
            }
        };
        Ok(id)
    }

    /// Pair sample-input and sample-output `<pre>` blocks by walking the
    /// section headings in page order.
    fn extract_samples(page: &str) -> Vec<TestCase> {
        let mut cases = Vec::new();
        let mut pending_input: Option<String> = None;

        for caps in HEADING_PRE_RE.captures_iter(page) {
            let heading = strip_tags(&caps[2]);
            let heading = heading.trim();
            let block = ensure_trailing_newline(&unescape_html(&caps[3]));

            if INPUT_HEADINGS.iter().any(|h| heading.starts_with(h)) {
                pending_input = Some(block);
            } else if OUTPUT_HEADINGS.iter().any(|h| heading.starts_with(h)) {
                if let Some(input) = pending_input.take() {
                    cases.push(TestCase {
                        input,
                        output: block,
                    });
                }
            }
        }
        cases
    }

    /// Most recent row of the user's status log, as (run_id, rendered status).
    async fn latest_status(&self, session: &Session, user: &str) -> Result<(String, String)> {
        let url = format!("{}?user_id={}&limit=1", STATUS_LOG_URL, user);
        let xml = session.get_text(&url).await?;
        let run_id = RUN_ID_RE
            .captures(&xml)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let status = STATUS_FIELD_RE
            .captures(&xml)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| "-".to_string());
        Ok((run_id, status))
    }
}

#[async_trait]
impl JudgeProvider for Aoj {
    fn name(&self) -> &'static str {
        "Aizu Online Judge"
    }

    fn session_key(&self) -> &'static str {
        "aoj"
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn classify_url(&self, url: &str) -> Option<UrlKind> {
        // AOJ problem pages stand alone; there is no set URL to expand
        PROBLEM_RE.is_match(url).then_some(UrlKind::Problem)
    }

    async fn probe(&self, session: &Session) -> Result<bool> {
        let response = session.get(&format!("{}/self", API_URL)).await?;
        Ok(response.status().is_success())
    }

    async fn login(&self, session: &Session, settings: &mut Settings) -> Result<()> {
        let handle = settings.get_or_prompt("Judge.AOJ.Handle", "AOJ_HANDLE", "AOJ user id")?;
        let password =
            settings.get_or_prompt_password("Judge.AOJ.Password", "AOJ_PASSWORD", "AOJ password")?;

        let response = session
            .post_json(
                &format!("{}/session", API_URL),
                &json!({ "id": handle, "password": password }),
            )
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Authentication {
                judge: self.name().to_string(),
                reason: format!("login endpoint answered {}", response.status()),
            }
            .into());
        }
        session.set_user(&handle);
        Ok(())
    }

    async fn fetch_problem(&self, session: &Session, url: &str) -> Result<Vec<Problem>> {
        let caps = PROBLEM_RE
            .captures(url)
            .ok_or_else(|| ClientError::InvalidProblemUrl(url.to_string()))?;
        let id = caps[1].to_string();

        let page = session.get_text(url).await?;
        let cases = Self::extract_samples(&page);
        debug!("fetched {} sample cases from {}", cases.len(), url);

        Ok(vec![Problem {
            id: id.clone(),
            contest_id: String::new(),
            name: id,
            url: url.to_string(),
            judge: self.name().to_string(),
            cases,
        }])
    }

    async fn submit(
        &self,
        session: &Session,
        problem: &Problem,
        source: &str,
        language: &Language,
    ) -> Result<SubmissionRecord> {
        let lang_id = self.lang_id(language)?;
        let user = session.user().ok_or_else(|| {
            ClientError::Submission("session does not carry an AOJ user id".to_string())
        })?;

        let response = session
            .post_json(
                &format!("{}/submissions", API_URL),
                &json!({
                    "problemId": problem.id,
                    "language": lang_id,
                    "sourceCode": source,
                }),
            )
            .await?;
        if !response.status().is_success() {
            return Err(
                ClientError::Submission(format!("judge answered {}", response.status())).into(),
            );
        }

        // the status log needs a moment before the new run shows up
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        let (run_id, _) = self.latest_status(session, &user).await?;

        eprintln!("your solution was successfully submitted");
        Ok(SubmissionRecord {
            problem_id: problem.id.clone(),
            source: source.to_string(),
            language: language.name.clone(),
            submitted_at: chrono::Utc::now(),
            url: format!("{}{}", REVIEW_URL, run_id),
            status: JudgeStatus::Unknown,
        })
    }

    fn status_table(&self) -> &'static [(&'static str, JudgeStatus)] {
        &[
            ("Accepted", JudgeStatus::Accepted),
            ("Wrong Answer", JudgeStatus::WrongAnswer),
            ("Presentation Error", JudgeStatus::WrongAnswer),
            ("Compile Error", JudgeStatus::CompileError),
            ("Runtime Error", JudgeStatus::RuntimeError),
            ("Time Limit Exceeded", JudgeStatus::TimeLimitExceeded),
            ("Memory Limit Exceeded", JudgeStatus::MemoryLimitExceeded),
            ("Output Limit Exceeded", JudgeStatus::OutputLimitExceeded),
        ]
    }

    async fn fetch_status(&self, session: &Session, record: &SubmissionRecord) -> Result<String> {
        let user = session.user().ok_or_else(|| {
            ClientError::Submission("session does not carry an AOJ user id".to_string())
        })?;
        let (run_id, status) = self.latest_status(session, &user).await?;

        // only trust the row if it still refers to our run
        let our_run = RID_OF_URL_RE
            .captures(&record.url)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        if !our_run.is_empty() && run_id != our_run {
            return Ok("-".to_string());
        }
        Ok(status)
    }
}
