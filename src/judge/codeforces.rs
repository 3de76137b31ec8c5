//! Codeforces provider

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use super::status::JudgeStatus;
use super::tracker::{map_status, SubmissionRecord};
use super::{JudgeProvider, Problem, Session, TestCase, UrlKind};
use crate::errors::ClientError;
use crate::languages::Language;
use crate::settings::Settings;
use crate::text::{ensure_trailing_newline, strip_tags, unescape_html};

const BASE_URL: &str = "https://codeforces.com/";
const LOGIN_URL: &str = "https://codeforces.com/enter";

/// Poll interval for the bulk submission-history viewer. Much longer than the
/// single-submission interval since a whole contest's worth of rows changes
/// slowly.
const HISTORY_POLL_INTERVAL: Duration = Duration::from_secs(60);

static PROBLEM_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^https://codeforces\.com/contest/(\d+)/problem/([^/?#]+)/?$").unwrap(),
        Regex::new(r"^https://codeforces\.com/problemset/problem/(\d+)/([^/?#]+)/?$").unwrap(),
        Regex::new(r"^https://codeforces\.com/gym/(\d+)/problem/([^/?#]+)/?$").unwrap(),
        Regex::new(r"^https://codeforces\.com/group/[^/]+/contest/(\d+)/problem/([^/?#]+)/?$")
            .unwrap(),
    ]
});
static SET_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^https://codeforces\.com/contest/(\d+)/?$").unwrap(),
        Regex::new(r"^https://codeforces\.com/gym/(\d+)/?$").unwrap(),
        Regex::new(r"^https://codeforces\.com/group/[^/]+/contest/(\d+)/?$").unwrap(),
    ]
});
static CSRF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name=['"]csrf_token['"]\s+value=['"]([^'"]+)['"]"#).unwrap()
});
static SAMPLE_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="input">.*?<pre[^>]*>(.*?)</pre>"#).unwrap()
});
static SAMPLE_OUTPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="output">.*?<pre[^>]*>(.*?)</pre>"#).unwrap()
});
static MEMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="(/contest/\d+/problem/[^/"]+)""#).unwrap());
static SUBMISSION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-submission-id="(\d+)""#).unwrap());
static CONTEST_OF_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/contest/(\d+)/").unwrap());
static VERDICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span class=['"]submissionVerdictWrapper['"][^>]*>(.*?)</span>"#).unwrap()
});
static WAITING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"waiting=['"]true['"]"#).unwrap());

pub struct Codeforces {
    data_dir: PathBuf,
}

impl Codeforces {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn lang_id(&self, language: &Language) -> Result<&'static str> {
        let id = match language.name.as_str() {
            "C++" => "54",     // GNU G++17 7.3.0
            "Python3" => "31", // Python 3.8.10
            "Java" => "36",    // Java 1.8.0_241
            "Rust" => "75",    // Rust 2021
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

    fn parse_problem_url(url: &str) -> Option<(String, String)> {
        PROBLEM_RES
            .iter()
            .find_map(|re| re.captures(url))
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
    }

    async fn fetch_single(&self, session: &Session, url: &str) -> Result<Problem> {
        let (contest_id, index) = Self::parse_problem_url(url)
            .ok_or_else(|| ClientError::InvalidProblemUrl(url.to_string()))?;

        let page = session.get_text(url).await?;

        let inputs: Vec<String> = SAMPLE_INPUT_RE
            .captures_iter(&page)
            .map(|c| normalize_pre(&c[1]))
            .collect();
        let outputs: Vec<String> = SAMPLE_OUTPUT_RE
            .captures_iter(&page)
            .map(|c| normalize_pre(&c[1]))
            .collect();
        let cases: Vec<TestCase> = inputs
            .into_iter()
            .zip(outputs)
            .map(|(input, output)| TestCase { input, output })
            .collect();
        debug!("fetched {} sample cases from {}", cases.len(), url);

        Ok(Problem {
            id: index.clone(),
            contest_id: contest_id.clone(),
            name: format!("{}_{}", contest_id, index),
            url: url.to_string(),
            judge: self.name().to_string(),
            cases,
        })
    }

    /// Bulk viewer behind `ojx cf-submissions`: keep polling the contest's
    /// own-submission list, print each newly finished row once, stop when
    /// nothing is waiting any more.
    pub async fn show_my_submissions(
        &self,
        settings: &mut Settings,
        contest_id: u32,
    ) -> Result<()> {
        let session = self.authenticate(settings).await?;
        let my_url = format!("{}contest/{}/my", BASE_URL, contest_id);

        let mut printed: HashSet<u64> = HashSet::new();
        loop {
            let page = session.get_text(&my_url).await?;

            let mut waiting = 0usize;
            for row in page.split("<tr").skip(1) {
                let Some(id) = SUBMISSION_ID_RE
                    .captures(row)
                    .and_then(|c| c[1].parse::<u64>().ok())
                else {
                    continue;
                };

                if WAITING_RE.is_match(row) {
                    waiting += 1;
                    continue;
                }
                if printed.contains(&id) {
                    continue;
                }

                let rendered = VERDICT_RE
                    .captures(row)
                    .map(|c| strip_tags(&c[1]).trim().to_string())
                    .unwrap_or_default();
                let status = map_status(self.status_table(), &rendered);
                println!(
                    "{}contest/{}/submission/{}",
                    BASE_URL, contest_id, id
                );
                println!(
                    "    verdict: {}{}{}",
                    status.emphasis().ansi(),
                    rendered,
                    super::status::ANSI_RESET
                );
                printed.insert(id);
            }

            if waiting == 0 {
                break;
            }
            eprintln!("waiting for judge ({} submissions pending)", waiting);
            tokio::time::sleep(HISTORY_POLL_INTERVAL).await;
        }
        Ok(())
    }
}

fn normalize_pre(block: &str) -> String {
    // newer pages wrap each line in a div instead of <br/>
    let block = block.replace("</div>", "\n");
    ensure_trailing_newline(&unescape_html(strip_tags(&block).trim_start_matches('\n')))
}

#[async_trait]
impl JudgeProvider for Codeforces {
    fn name(&self) -> &'static str {
        "Codeforces"
    }

    fn session_key(&self) -> &'static str {
        "codeforces"
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn classify_url(&self, url: &str) -> Option<UrlKind> {
        if PROBLEM_RES.iter().any(|re| re.is_match(url)) {
            Some(UrlKind::Problem)
        } else if SET_RES.iter().any(|re| re.is_match(url)) {
            Some(UrlKind::ProblemSet)
        } else {
            None
        }
    }

    async fn probe(&self, session: &Session) -> Result<bool> {
        let response = session
            .get("https://codeforces.com/contest/1/submit")
            .await?;
        Ok(response.status().is_success())
    }

    async fn login(&self, session: &Session, settings: &mut Settings) -> Result<()> {
        let handle = settings.get_or_prompt(
            "Judge.Codeforces.Handle",
            "CODEFORCES_HANDLE",
            "Codeforces handle or email",
        )?;
        let password = settings.get_or_prompt_password(
            "Judge.Codeforces.Password",
            "CODEFORCES_PASSWORD",
            "Codeforces password",
        )?;

        let page = session.get_text(LOGIN_URL).await?;
        let csrf = CSRF_RE
            .captures(&page)
            .map(|c| c[1].to_string())
            .ok_or_else(|| ClientError::Authentication {
                judge: self.name().to_string(),
                reason: "login form not found, the page layout may have changed".to_string(),
            })?;

        let response = session
            .post_form(
                LOGIN_URL,
                &[
                    ("handleOrEmail", handle.as_str()),
                    ("password", password.as_str()),
                    ("csrf_token", csrf.as_str()),
                    ("action", "enter"),
                ],
            )
            .await?;
        if !response.status().is_redirection() {
            return Err(ClientError::Authentication {
                judge: self.name().to_string(),
                reason: format!("login form rejected ({})", response.status()),
            }
            .into());
        }
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
        let lang_id = self.lang_id(language)?;
        let submit_url = format!("{}contest/{}/submit", BASE_URL, problem.contest_id);

        let page = session.get_text(&submit_url).await?;
        let csrf = CSRF_RE
            .captures(&page)
            .map(|c| c[1].to_string())
            .ok_or_else(|| ClientError::Submission("no submit form found".to_string()))?;

        let post_url = format!("{}?csrf_token={}", submit_url, csrf);
        let response = session
            .post_form(
                &post_url,
                &[
                    ("csrf_token", csrf.as_str()),
                    ("action", "submitSolutionFormSubmitted"),
                    ("submittedProblemIndex", problem.id.as_str()),
                    ("programTypeId", lang_id),
                    ("source", source),
                ],
            )
            .await?;

        // success redirects to the my-submissions page; resubmitting identical
        // source bounces back to the form instead
        let landed_on_my = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|loc| loc.contains("/my"))
            .unwrap_or(false);
        if !landed_on_my {
            return Err(ClientError::Submission(
                "judge rejected the submission (identical source already submitted?)".to_string(),
            )
            .into());
        }

        let my_url = format!("{}contest/{}/my", BASE_URL, problem.contest_id);
        let page = session.get_text(&my_url).await?;
        let url = SUBMISSION_ID_RE
            .captures(&page)
            .map(|c| format!("{}contest/{}/submission/{}", BASE_URL, problem.contest_id, &c[1]))
            .unwrap_or(my_url);

        eprintln!("your solution was successfully submitted");
        Ok(SubmissionRecord {
            problem_id: problem.id.clone(),
            source: source.to_string(),
            language: language.name.clone(),
            submitted_at: chrono::Utc::now(),
            url,
            status: JudgeStatus::Unknown,
        })
    }

    fn status_table(&self) -> &'static [(&'static str, JudgeStatus)] {
        &[
            ("Accepted", JudgeStatus::Accepted),
            ("Pretests passed", JudgeStatus::PretestsPassed),
            ("Wrong answer", JudgeStatus::WrongAnswer),
            ("Compilation error", JudgeStatus::CompileError),
            ("Runtime error", JudgeStatus::RuntimeError),
            ("Time limit exceeded", JudgeStatus::TimeLimitExceeded),
            ("Memory limit exceeded", JudgeStatus::MemoryLimitExceeded),
            ("Judgement failed", JudgeStatus::InternalError),
        ]
    }

    async fn fetch_status(&self, session: &Session, record: &SubmissionRecord) -> Result<String> {
        // the my-submissions list renders the newest row first
        let my_url = CONTEST_OF_URL_RE
            .captures(&record.url)
            .map(|c| format!("{}contest/{}/my", BASE_URL, &c[1]))
            .unwrap_or_else(|| record.url.clone());
        let page = session.get_text(&my_url).await?;
        Ok(VERDICT_RE
            .captures(&page)
            .map(|c| strip_tags(&c[1]).trim().to_string())
            .unwrap_or_default())
    }
}
