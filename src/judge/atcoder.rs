//! AtCoder provider

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
use crate::text::{ensure_trailing_newline, unescape_html};

const BASE_URL: &str = "https://atcoder.jp/";
const LOGIN_URL: &str = "https://atcoder.jp/login";

static TASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://atcoder\.jp/contests/([^/]+)/tasks/([^/?#]+)/?$").unwrap()
});
static TASK_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://atcoder\.jp/contests/([^/]+)/tasks/?$").unwrap());
static CSRF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:name="csrf_token"\s+value="([^"]+)"|var csrfToken = "([^"]+)")"#).unwrap()
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<span class="h2">\s*([0-9A-Za-z]+)\s*-"#).unwrap());
static MEMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="(/contests/[^/"]+/tasks/[^/"]+)""#).unwrap());
static SUBMISSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="(/contests/[^/"]+/submissions/\d+)""#).unwrap());
static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<span class="label[^"]*"[^>]*>([^<]+)</span>"#).unwrap());

pub struct AtCoder {
    data_dir: PathBuf,
}

impl AtCoder {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn lang_id(&self, language: &Language) -> Result<&'static str> {
        let id = match language.name.as_str() {
            "C++" => "4003",     // C++ (GCC 9.2.1)
            "Python3" => "4006", // Python (3.8.2)
            "Java" => "4005",    // Java (OpenJDK 11.0.6)
            "Rust" => "4050",    // Rust (1.42.0)
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

    fn extract_csrf(page: &str) -> Option<String> {
        let caps = CSRF_RE.captures(page)?;
        caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string())
    }

    async fn fetch_single(&self, session: &Session, url: &str) -> Result<Problem> {
        let caps = TASK_RE
            .captures(url)
            .ok_or_else(|| ClientError::InvalidProblemUrl(url.to_string()))?;
        let contest_id = caps[1].to_string();
        let task = caps[2].to_string();

        let page = session.get_text(url).await?;

        // problem letter comes from the page title ("A - Frog 1")
        let id = TITLE_RE
            .captures(&page)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| {
                task.rsplit('_')
                    .next()
                    .unwrap_or(task.as_str())
                    .to_uppercase()
            });

        let cases = extract_samples(&page);
        debug!("fetched {} sample cases from {}", cases.len(), url);

        Ok(Problem {
            id,
            contest_id,
            name: task,
            url: url.to_string(),
            judge: self.name().to_string(),
            cases,
        })
    }
}

/// Pull `<pre>` blocks that follow sample headings, preferring the Japanese
/// sections when the page carries both.
fn extract_samples(page: &str) -> Vec<TestCase> {
    let ja_inputs = pre_after_heading(page, "入力例");
    let ja_outputs = pre_after_heading(page, "出力例");
    let (inputs, outputs) = if !ja_inputs.is_empty() {
        (ja_inputs, ja_outputs)
    } else {
        (
            pre_after_heading(page, "Sample Input"),
            pre_after_heading(page, "Sample Output"),
        )
    };

    inputs
        .into_iter()
        .zip(outputs)
        .map(|(input, output)| TestCase { input, output })
        .collect()
}

fn pre_after_heading(page: &str, heading: &str) -> Vec<String> {
    let pattern = format!(
        r"(?s)<h3[^>]*>\s*{}[^<]*</h3>\s*<pre[^>]*>(.*?)</pre>",
        regex::escape(heading)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    re.captures_iter(page)
        .map(|c| ensure_trailing_newline(&unescape_html(&c[1])))
        .collect()
}

#[async_trait]
impl JudgeProvider for AtCoder {
    fn name(&self) -> &'static str {
        "AtCoder"
    }

    fn session_key(&self) -> &'static str {
        "atcoder"
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn classify_url(&self, url: &str) -> Option<UrlKind> {
        if TASK_RE.is_match(url) {
            Some(UrlKind::Problem)
        } else if TASK_LIST_RE.is_match(url) {
            Some(UrlKind::ProblemSet)
        } else {
            None
        }
    }

    async fn probe(&self, session: &Session) -> Result<bool> {
        // the submit page redirects to the login form when logged out
        let response = session
            .get("https://atcoder.jp/contests/agc001/submit")
            .await?;
        Ok(response.status().is_success())
    }

    async fn login(&self, session: &Session, settings: &mut Settings) -> Result<()> {
        let handle =
            settings.get_or_prompt("Judge.AtCoder.Handle", "ATCODER_HANDLE", "AtCoder user name")?;
        let password = settings.get_or_prompt_password(
            "Judge.AtCoder.Password",
            "ATCODER_PASSWORD",
            "AtCoder password",
        )?;

        let page = session.get_text(LOGIN_URL).await?;
        let csrf = Self::extract_csrf(&page).ok_or_else(|| ClientError::Authentication {
            judge: self.name().to_string(),
            reason: "login form not found, the page layout may have changed".to_string(),
        })?;

        let response = session
            .post_form(
                LOGIN_URL,
                &[
                    ("username", handle.as_str()),
                    ("password", password.as_str()),
                    ("csrf_token", csrf.as_str()),
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
        let submit_url = format!("{}contests/{}/submit", BASE_URL, problem.contest_id);

        let page = session.get_text(&submit_url).await?;
        let csrf = Self::extract_csrf(&page).ok_or_else(|| {
            ClientError::Submission("no submit form found".to_string())
        })?;

        let response = session
            .post_form(
                &submit_url,
                &[
                    ("data.TaskScreenName", problem.name.as_str()),
                    ("data.LanguageId", lang_id),
                    ("sourceCode", source),
                    ("csrf_token", csrf.as_str()),
                ],
            )
            .await?;
        if !response.status().is_redirection() {
            return Err(
                ClientError::Submission(format!("judge answered {}", response.status())).into(),
            );
        }

        let me_url = format!("{}contests/{}/submissions/me", BASE_URL, problem.contest_id);
        let page = session.get_text(&me_url).await?;
        let url = SUBMISSION_RE
            .captures(&page)
            .map(|c| format!("{}{}", BASE_URL.trim_end_matches('/'), &c[1]))
            .unwrap_or(me_url);

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
        Ok(STATUS_RE
            .captures(&page)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::tracker::map_status;

    fn provider() -> AtCoder {
        AtCoder::new(Path::new("."))
    }

    #[test]
    fn test_classify_url() {
        let ac = provider();
        assert_eq!(
            ac.classify_url("https://atcoder.jp/contests/arc079/tasks/arc079_b"),
            Some(UrlKind::Problem)
        );
        assert_eq!(
            ac.classify_url("https://atcoder.jp/contests/abc200/tasks"),
            Some(UrlKind::ProblemSet)
        );
        assert_eq!(ac.classify_url("https://atcoder.jp/contests/abc200"), None);
        assert_eq!(
            ac.classify_url("https://codeforces.com/contest/1/problem/A"),
            None
        );
    }

    #[test]
    fn test_lang_id_mapping() {
        let ac = provider();
        let langs = crate::languages::Languages::load(None).unwrap();
        assert_eq!(ac.lang_id(langs.get("c++").unwrap()).unwrap(), "4003");
        assert_eq!(ac.lang_id(langs.get("rust").unwrap()).unwrap(), "4050");

        let unknown = Language {
            name: "Cobol".into(),
            file_extension: ".cob".into(),
            compile_command: None,
            run_command: "run".into(),
            comment_begin: "* ".into(),
            comment_end: "".into(),
        };
        let err = ac.lang_id(&unknown).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::UnsupportedLanguage { .. })
        ));
    }

    #[test]
    fn test_extract_samples_english() {
        let page = r#"
            <div class="part"><h3>Sample Input 1</h3><pre>1 2
</pre></div>
            <div class="part"><h3>Sample Output 1</h3><pre>3
</pre></div>
            <div class="part"><h3>Sample Input 2</h3><pre>10 20</pre></div>
            <div class="part"><h3>Sample Output 2</h3><pre>30</pre></div>
        "#;
        let cases = extract_samples(page);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].input, "1 2\n");
        assert_eq!(cases[0].output, "3\n");
        assert_eq!(cases[1].input, "10 20\n");
        assert_eq!(cases[1].output, "30\n");
    }

    #[test]
    fn test_extract_samples_prefers_japanese() {
        let page = r#"
            <h3>入力例 1</h3><pre>5
</pre>
            <h3>出力例 1</h3><pre>25
</pre>
            <h3>Sample Input 1</h3><pre>ignored</pre>
            <h3>Sample Output 1</h3><pre>ignored</pre>
        "#;
        let cases = extract_samples(page);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].input, "5\n");
        assert_eq!(cases[0].output, "25\n");
    }

    #[test]
    fn test_extract_samples_unescapes_entities() {
        let page = "<h3>Sample Input 1</h3><pre>a &lt; b &amp;&amp; c</pre>\
                    <h3>Sample Output 1</h3><pre>yes</pre>";
        let cases = extract_samples(page);
        assert_eq!(cases[0].input, "a < b && c\n");
    }

    #[test]
    fn test_status_table_vocabulary() {
        let ac = provider();
        assert_eq!(map_status(ac.status_table(), "AC"), JudgeStatus::Accepted);
        assert_eq!(
            map_status(ac.status_table(), "TLE"),
            JudgeStatus::TimeLimitExceeded
        );
        // still judging
        assert_eq!(map_status(ac.status_table(), "WJ"), JudgeStatus::Unknown);
        assert_eq!(map_status(ac.status_table(), "3/12"), JudgeStatus::Unknown);
    }

    #[test]
    fn test_extract_csrf() {
        assert_eq!(
            AtCoder::extract_csrf(r#"<input name="csrf_token" value="tok123">"#),
            Some("tok123".to_string())
        );
        assert_eq!(
            AtCoder::extract_csrf(r#"var csrfToken = "tok456""#),
            Some("tok456".to_string())
        );
        assert_eq!(AtCoder::extract_csrf("<html></html>"), None);
    }
}
