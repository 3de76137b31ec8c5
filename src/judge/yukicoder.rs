//! yukicoder provider
//!
//! The Twitter-form login the site once offered is gone; the adapter
//! authenticates with the personal API key from the account settings page
//! instead, sent as a bearer token. Sample cases still come from the public
//! problem pages.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use super::status::JudgeStatus;
use super::tracker::SubmissionRecord;
use super::{JudgeProvider, Problem, Session, TestCase, UrlKind};
use crate::errors::ClientError;
use crate::languages::Language;
use crate::settings::Settings;
use crate::text::{ensure_trailing_newline, strip_tags, unescape_html};

const BASE_URL: &str = "https://yukicoder.me/";

static PROBLEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://yukicoder\.me/problems/no/(\d+)/?$").unwrap());
static CONTEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://yukicoder\.me/contests/(\d+)/?$").unwrap());
static SAMPLE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="sample">(.*?)</div>\s*</div>"#).unwrap()
});
static PRE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<pre[^>]*>(.*?)</pre>").unwrap());
static MEMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="(/problems/no/\d+)""#).unwrap());
static STATUS_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"id=['"]status['"][^>]*>\s*([^<]+)"#).unwrap());
static SUBMISSION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:Id|SubmissionId)"\s*:\s*(\d+)"#).unwrap());

pub struct Yukicoder {
    data_dir: PathBuf,
}

impl Yukicoder {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn lang_id(&self, language: &Language) -> Result<&'static str> {
        let id = match language.name.as_str() {
            "C++" => "cpp17",
            "Python3" => "python3",
            "Java" => "java8",
            "Rust" => "rust",
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

    fn extract_samples(page: &str) -> Vec<TestCase> {
        let mut cases = Vec::new();
        for block in SAMPLE_BLOCK_RE.captures_iter(page) {
            let pres: Vec<String> = PRE_RE
                .captures_iter(&block[1])
                .map(|c| ensure_trailing_newline(&unescape_html(&strip_tags(&c[1]))))
                .collect();
            if pres.len() >= 2 {
                cases.push(TestCase {
                    input: pres[0].clone(),
                    output: pres[1].clone(),
                });
            }
        }
        cases
    }

    async fn fetch_single(&self, session: &Session, url: &str) -> Result<Problem> {
        let caps = PROBLEM_RE
            .captures(url)
            .ok_or_else(|| ClientError::InvalidProblemUrl(url.to_string()))?;
        let number = caps[1].to_string();

        let page = session.get_text(url).await?;
        let cases = Self::extract_samples(&page);
        debug!("fetched {} sample cases from {}", cases.len(), url);

        Ok(Problem {
            id: number.clone(),
            contest_id: String::new(),
            name: number,
            url: url.to_string(),
            judge: self.name().to_string(),
            cases,
        })
    }
}

#[async_trait]
impl JudgeProvider for Yukicoder {
    fn name(&self) -> &'static str {
        "yukicoder"
    }

    fn session_key(&self) -> &'static str {
        "yukicoder"
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn classify_url(&self, url: &str) -> Option<UrlKind> {
        if PROBLEM_RE.is_match(url) {
            Some(UrlKind::Problem)
        } else if CONTEST_RE.is_match(url) {
            Some(UrlKind::ProblemSet)
        } else {
            None
        }
    }

    async fn probe(&self, session: &Session) -> Result<bool> {
        let response = session
            .get("https://yukicoder.me/api/v1/user/self")
            .await?;
        Ok(response.status().is_success())
    }

    async fn login(&self, session: &Session, settings: &mut Settings) -> Result<()> {
        let api_key = settings.get_or_prompt_password(
            "Judge.yukicoder.ApiKey",
            "YUKICODER_API_KEY",
            "yukicoder API key (account settings page)",
        )?;
        if api_key.trim().is_empty() {
            return Err(ClientError::Authentication {
                judge: self.name().to_string(),
                reason: "empty API key".to_string(),
            }
            .into());
        }
        session.set_token(api_key.trim());
        Ok(())
    }

    async fn fetch_problem(&self, session: &Session, url: &str) -> Result<Vec<Problem>> {
        match self.classify_url(url) {
            Some(UrlKind::Problem) => Ok(vec![self.fetch_single(session, url).await?]),
            Some(UrlKind::ProblemSet) => {
                let page = session.get_text(url).await?;
                let mut members: Vec<String> = Vec::new();
                for caps in MEMBER_RE.captures_iter(&page) {
                    let member = format!("{}{}", BASE_URL.trim_end_matches('/'), &caps[1]);
                    if !members.contains(&member) {
                        members.push(member);
                    }
                }

                let mut problems = Vec::new();
                for member in members {
                    match self.fetch_single(session, &member).await {
                        Ok(p) => problems.push(p),
                        Err(e) => warn!("skipping {}: {:#}", member, e),
                    }
                }
                Ok(problems)
            }
            None => Err(ClientError::InvalidProblemUrl(url.to_string()).into()),
        }
    }

    async fn submit(
        &self,
        session: &Session,
        problem: &Problem,
        source: &str,
        language: &Language,
    ) -> Result<SubmissionRecord> {
        if source.is_empty() {
            return Err(ClientError::Submission("source must not be empty".to_string()).into());
        }
        let lang_id = self.lang_id(language)?;

        let submit_url = format!("{}api/v1/problems/no/{}/submit", BASE_URL, problem.id);
        let response = session
            .post_form(&submit_url, &[("lang", lang_id), ("source", source)])
            .await?;
        if !response.status().is_success() {
            return Err(
                ClientError::Submission(format!("judge answered {}", response.status())).into(),
            );
        }

        let body = response.text().await.unwrap_or_default();
        let submission_id = SUBMISSION_ID_RE
            .captures(&body)
            .map(|c| c[1].to_string())
            .ok_or_else(|| {
                ClientError::Submission("judge did not return a submission id".to_string())
            })?;

        eprintln!("your solution was successfully submitted");
        Ok(SubmissionRecord {
            problem_id: problem.id.clone(),
            source: source.to_string(),
            language: language.name.clone(),
            submitted_at: chrono::Utc::now(),
            url: format!("{}submissions/{}", BASE_URL, submission_id),
            status: JudgeStatus::Unknown,
        })
    }

    fn status_table(&self) -> &'static [(&'static str, JudgeStatus)] {
        &[
            ("AC", JudgeStatus::Accepted),
            ("WA", JudgeStatus::WrongAnswer),
            ("CE", JudgeStatus::CompileError),
            ("RE", JudgeStatus::RuntimeError),
            ("TLE", JudgeStatus::TimeLimitExceeded),
            ("MLE", JudgeStatus::MemoryLimitExceeded),
            ("OLE", JudgeStatus::OutputLimitExceeded),
            ("IE", JudgeStatus::InternalError),
        ]
    }

    async fn fetch_status(&self, session: &Session, record: &SubmissionRecord) -> Result<String> {
        let page = session.get_text(&record.url).await?;
        Ok(STATUS_SPAN_RE
            .captures(&page)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default())
    }
}
