//! Authenticated session handling
//!
//! A [`Session`] is the credential state for one judge plus the HTTP client
//! that carries it. Cookies are captured from `Set-Cookie` response headers,
//! merged by name, and persisted per provider (`session_<key>.json` in the
//! data directory) so a later run can skip logging in. Redirects are never
//! followed automatically: login and submit flows inspect the `Location`
//! header themselves, which keeps cookie capture at every hop.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// What actually lands in the session file: the cookie set plus the two
/// pieces of identity some judges need later (acting user for AOJ's status
/// feed, bearer token for API-key judges).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionData {
    cookies: Vec<Cookie>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

pub struct Session {
    client: reqwest::Client,
    data: Mutex<SessionData>,
    file: PathBuf,
}

const USER_AGENT: &str = concat!("ojx/", env!("CARGO_PKG_VERSION"));

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

impl Session {
    /// Fresh session with no credentials.
    pub fn new(key: &str, data_dir: &Path) -> Self {
        Self {
            client: http_client(),
            data: Mutex::new(SessionData::default()),
            file: data_dir.join(format!("session_{}.json", key)),
        }
    }

    /// Session seeded from the persisted file, when one exists.
    pub fn load(key: &str, data_dir: &Path) -> Self {
        let session = Self::new(key, data_dir);
        match std::fs::read_to_string(&session.file) {
            Ok(content) => match serde_json::from_str::<SessionData>(&content) {
                Ok(data) => {
                    debug!("loaded {} cookies from {:?}", data.cookies.len(), session.file);
                    *session.data.lock().unwrap() = data;
                }
                Err(e) => warn!("ignoring corrupt session file {:?}: {}", session.file, e),
            },
            Err(_) => debug!("no session file at {:?}", session.file),
        }
        session
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = self.data.lock().unwrap().clone();
        let content = serde_json::to_string(&data)?;
        std::fs::write(&self.file, content)
            .with_context(|| format!("failed to write session to {:?}", self.file))?;
        debug!("session saved to {:?}", self.file);
        Ok(())
    }

    /// Whether this session carries any credential at all (cookies or token).
    pub fn has_credentials(&self) -> bool {
        let data = self.data.lock().unwrap();
        !data.cookies.is_empty() || data.token.is_some()
    }

    pub fn set_user(&self, user: &str) {
        self.data.lock().unwrap().user = Some(user.to_string());
    }

    pub fn user(&self) -> Option<String> {
        self.data.lock().unwrap().user.clone()
    }

    pub fn set_token(&self, token: &str) {
        self.data.lock().unwrap().token = Some(token.to_string());
    }

    fn cookie_header(&self) -> String {
        self.data
            .lock()
            .unwrap()
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Merge cookies from a response into the jar (latest value wins).
    fn absorb(&self, response: &Response) {
        let mut data = self.data.lock().unwrap();
        for header in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            let Some(pair) = raw.split(';').next() else { continue };
            let Some((name, value)) = pair.split_once('=') else { continue };
            let (name, value) = (name.trim().to_string(), value.trim().to_string());
            if let Some(existing) = data.cookies.iter_mut().find(|c| c.name == name) {
                existing.value = value;
            } else {
                data.cookies.push(Cookie { name, value });
            }
        }
    }

    fn decorate(&self, mut request: RequestBuilder) -> RequestBuilder {
        let cookies = self.cookie_header();
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookies);
        }
        if let Some(token) = &self.data.lock().unwrap().token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        request
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = self
            .decorate(request)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;
        self.absorb(&response);
        Ok(response)
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.send(self.client.get(url), url).await
    }

    /// GET expecting a successful page; returns the body text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        anyhow::ensure!(
            response.status() == StatusCode::OK,
            "GET {} returned {}",
            url,
            response.status()
        );
        response.text().await.context("failed to read response body")
    }

    pub async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<Response> {
        self.send(self.client.post(url).form(params), url).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Response> {
        self.send(self.client.post(url).json(body), url).await
    }

    #[cfg(test)]
    pub fn set_cookies_for_test(&self, cookies: Vec<Cookie>) {
        self.data.lock().unwrap().cookies = cookies;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new("testjudge", dir.path());
        session.set_cookies_for_test(vec![Cookie {
            name: "sid".into(),
            value: "abc123".into(),
        }]);
        session.set_user("alice");
        session.save().unwrap();

        let reloaded = Session::load("testjudge", dir.path());
        assert!(reloaded.has_credentials());
        assert_eq!(reloaded.cookie_header(), "sid=abc123");
        assert_eq!(reloaded.user(), Some("alice".to_string()));
    }

    #[test]
    fn test_load_without_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::load("nojudge", dir.path());
        assert!(!session.has_credentials());
        assert_eq!(session.user(), None);
    }

    #[test]
    fn test_token_counts_as_credential() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new("api", dir.path());
        assert!(!session.has_credentials());
        session.set_token("secret");
        assert!(session.has_credentials());
        session.save().unwrap();

        let reloaded = Session::load("api", dir.path());
        assert!(reloaded.has_credentials());
    }

    #[test]
    fn test_cookie_header_joins_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new("j", dir.path());
        session.set_cookies_for_test(vec![
            Cookie {
                name: "a".into(),
                value: "1".into(),
            },
            Cookie {
                name: "b".into(),
                value: "2".into(),
            },
        ]);
        assert_eq!(session.cookie_header(), "a=1; b=2");
    }
}
