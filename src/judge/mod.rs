//! Judge integration layer
//!
//! One [`JudgeProvider`] per remote judge. Providers behave identically at the
//! orchestration level and differ only in URL shape, status vocabulary and
//! login mechanics, so everything above this module talks to the trait and the
//! name-keyed [`ProviderRegistry`].

pub mod aoj;
pub mod atcoder;
pub mod codeforces;
pub mod problem;
pub mod session;
pub mod status;
pub mod tracker;
pub mod yukicoder;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::errors::ClientError;
use crate::languages::Language;
use crate::settings::Settings;

pub use problem::{Problem, TestCase};
pub use session::Session;
pub use status::JudgeStatus;
pub use tracker::SubmissionRecord;

/// What a URL means to a judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// A single problem page
    Problem,
    /// A contest/problem-set listing whose members are problems
    ProblemSet,
}

#[async_trait]
pub trait JudgeProvider: Send + Sync {
    /// Display name; also the weak reference stored in problem records.
    fn name(&self) -> &'static str;

    /// Short key used for the session file name.
    fn session_key(&self) -> &'static str;

    /// Data directory holding this provider's session file.
    fn data_dir(&self) -> &Path;

    /// Does this URL belong to this judge, and is it a single problem or a
    /// whole problem set?
    fn classify_url(&self, url: &str) -> Option<UrlKind>;

    /// Cheap authenticated request that tells whether a session is still
    /// valid.
    async fn probe(&self, session: &Session) -> Result<bool>;

    /// Fresh login using stored or interactively collected credentials,
    /// leaving the session's cookies authenticated.
    async fn login(&self, session: &Session, settings: &mut Settings) -> Result<()>;

    /// Fetch and normalize the problem(s) behind `url`. Problem-set URLs
    /// yield every member problem; a member failure is logged, not fatal.
    async fn fetch_problem(&self, session: &Session, url: &str) -> Result<Vec<Problem>>;

    /// Post `source` for `problem` and return the initial record (status
    /// `Unknown`, provider-computed result URL).
    async fn submit(
        &self,
        session: &Session,
        problem: &Problem,
        source: &str,
        language: &Language,
    ) -> Result<SubmissionRecord>;

    /// Judge-specific rendered-status -> verdict table, consumed by
    /// [`tracker::map_status`].
    fn status_table(&self) -> &'static [(&'static str, JudgeStatus)];

    /// Fetch the judge's current rendered status text for `record`.
    async fn fetch_status(&self, session: &Session, record: &SubmissionRecord) -> Result<String>;

    /// Obtain a working session: reuse the persisted one when the probe still
    /// accepts it, otherwise log in afresh and persist the result.
    async fn authenticate(&self, settings: &mut Settings) -> Result<Session> {
        let session = Session::load(self.session_key(), self.data_dir());
        if session.has_credentials() && self.probe(&session).await.unwrap_or(false) {
            info!("loaded session of {}", self.name());
            return Ok(session);
        }

        info!("logging in to {} ...", self.name());
        let session = Session::new(self.session_key(), self.data_dir());
        self.login(&session, settings).await?;
        if !self.probe(&session).await.unwrap_or(false) {
            return Err(ClientError::Authentication {
                judge: self.name().to_string(),
                reason: "incorrect username or password".to_string(),
            }
            .into());
        }
        session.save()?;
        Ok(session)
    }
}

/// Name-keyed provider table. Problems store their judge as a display name;
/// this is where the weak reference resolves back to a live provider.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn JudgeProvider>>,
}

impl ProviderRegistry {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            providers: vec![
                Arc::new(atcoder::AtCoder::new(data_dir)),
                Arc::new(codeforces::Codeforces::new(data_dir)),
                Arc::new(aoj::Aoj::new(data_dir)),
                Arc::new(yukicoder::Yukicoder::new(data_dir)),
            ],
        }
    }

    pub fn by_name(&self, name: &str) -> Result<Arc<dyn JudgeProvider>> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| ClientError::UnknownJudge(name.to_string()).into())
    }

    /// Ask every provider to classify the URL; the first claim wins.
    pub fn from_url(&self, url: &str) -> Result<(Arc<dyn JudgeProvider>, UrlKind)> {
        for provider in &self.providers {
            if let Some(kind) = provider.classify_url(url) {
                return Ok((provider.clone(), kind));
            }
        }
        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());
        Err(ClientError::UnknownJudge(host).into())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProviderRegistry::new(dir.path());
        assert_eq!(registry.by_name("AtCoder").unwrap().name(), "AtCoder");
        assert_eq!(registry.by_name("Codeforces").unwrap().name(), "Codeforces");
        assert!(registry.by_name("SPOJ").is_err());
    }

    #[test]
    fn test_from_url_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProviderRegistry::new(dir.path());

        let (p, kind) = registry
            .from_url("https://atcoder.jp/contests/arc079/tasks/arc079_b")
            .unwrap();
        assert_eq!(p.name(), "AtCoder");
        assert_eq!(kind, UrlKind::Problem);

        let (p, _) = registry
            .from_url("https://codeforces.com/contest/835/problem/E")
            .unwrap();
        assert_eq!(p.name(), "Codeforces");

        let (p, _) = registry
            .from_url("https://yukicoder.me/problems/no/273")
            .unwrap();
        assert_eq!(p.name(), "yukicoder");

        assert!(registry.from_url("https://example.com/problem/1").is_err());
    }
}
