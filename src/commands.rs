//! Command implementations behind the CLI surface
//!
//! Each function here is the function-level contract the argument parser calls
//! into: resolve a language and a problem, then wire the store, runner, tester
//! and judge layer together.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::archive;
use crate::errors::ClientError;
use crate::judge::status::ANSI_RESET;
use crate::judge::{tracker, Problem, ProviderRegistry};
use crate::languages::{find_source_code, Language, Languages};
use crate::runner::Runner;
use crate::settings::Settings;
use crate::store::ProblemStore;
use crate::tester;

const GREEN: &str = "\x1b[32;1m";
const RED: &str = "\x1b[31;1m";

pub struct App {
    pub settings: Settings,
    pub languages: Languages,
    pub registry: ProviderRegistry,
    pub store: ProblemStore,
    pub runner: Runner,
    pub data_dir: PathBuf,
}

impl App {
    pub fn init() -> Result<Self> {
        let data_dir = crate::settings::data_dir();
        debug!("data directory: {:?}", data_dir);

        let settings = Settings::load(data_dir.join(crate::settings::SETTINGS_FILENAME));
        let language_overrides = data_dir.join("languages.toml");
        let languages = Languages::load(Some(language_overrides.as_path()))?;
        let registry = ProviderRegistry::new(&data_dir);
        let store = ProblemStore::new(&data_dir);
        let runner = Runner::new(&data_dir);

        Ok(Self {
            settings,
            languages,
            registry,
            store,
            runner,
            data_dir,
        })
    }

    /// `-l` flag, else the `Language.Default` setting, else C++.
    fn resolve_language(&self, flag: Option<&str>) -> Result<Language> {
        let name = match flag {
            Some(name) => name.to_string(),
            None => self
                .settings
                .get_str("Language.Default", "OJX_LANGUAGE")
                .unwrap_or_else(|| "c++".to_string()),
        };
        self.languages
            .get(&name)
            .cloned()
            .ok_or_else(|| {
                ClientError::Config(format!(
                    "unknown language `{}` (known: {})",
                    name,
                    self.languages.names().join(", ")
                ))
                .into()
            })
    }

    fn source_in_cwd(&self, lang: &Language) -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("cannot determine working directory")?;
        find_source_code(&cwd, lang)
    }

    /// Optional bound for the submission poll loop. Unset keeps the
    /// historical block-until-verdict behavior.
    fn poll_deadline(&self) -> Option<Duration> {
        self.settings
            .get_str("Submit.PollDeadlineSecs", "OJX_POLL_DEADLINE_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// `ojx run`: compile and run the source here, stdin inherited.
    pub async fn run(&mut self, lang_flag: Option<&str>) -> Result<()> {
        let lang = self.resolve_language(lang_flag)?;
        let source = self.source_in_cwd(&lang)?;
        debug!("running {:?}", source);
        self.runner.run(&lang, &source, None, true).await?;
        Ok(())
    }

    /// `ojx test`: run sample cases; a full pass offers to submit.
    pub async fn test(
        &mut self,
        problem_id: &str,
        lang_flag: Option<&str>,
        case: Option<usize>,
    ) -> Result<()> {
        let lang = self.resolve_language(lang_flag)?;
        let source = self.source_in_cwd(&lang)?;
        let problem = self.store.load(problem_id, &self.registry)?;

        match case {
            Some(index) => {
                let report =
                    tester::run_one(&self.runner, &lang, &problem, &source, index).await?;
                if report.passed {
                    println!("{}Passed{}", GREEN, ANSI_RESET);
                } else {
                    println!("{}Wrong answer{}", RED, ANSI_RESET);
                }
            }
            None => {
                let reports = tester::run_all(&self.runner, &lang, &problem, &source).await?;
                if reports.iter().all(|r| r.passed) {
                    println!("{}Samplecases passed{}", GREEN, ANSI_RESET);
                    self.submit_problem(&problem, &lang, &source).await?;
                } else {
                    println!("{}Wrong answer{}", RED, ANSI_RESET);
                }
            }
        }
        Ok(())
    }

    /// `ojx fetch`: download problem(s) behind a judge URL into the store.
    pub async fn fetch(&mut self, url: &str) -> Result<()> {
        let (provider, _) = self.registry.from_url(url)?;
        let session = provider.authenticate(&mut self.settings).await?;
        let problems = provider.fetch_problem(&session, url).await?;
        anyhow::ensure!(!problems.is_empty(), "no problems found at {}", url);

        for problem in &problems {
            print!("{}", problem.describe());
            let saved = self.store.save(problem)?;
            println!("saved problem: {}", saved.id);
        }
        Ok(())
    }

    /// `ojx submit`: submit the source here for a stored problem.
    pub async fn submit(&mut self, problem_id: &str, lang_flag: Option<&str>) -> Result<()> {
        let lang = self.resolve_language(lang_flag)?;
        let source = self.source_in_cwd(&lang)?;
        let problem = self.store.load(problem_id, &self.registry)?;
        self.submit_problem(&problem, &lang, &source).await
    }

    async fn submit_problem(
        &mut self,
        problem: &Problem,
        lang: &Language,
        source_path: &Path,
    ) -> Result<()> {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Really submit `{}` to problem `{}`?",
                source_path.display(),
                problem.name
            ))
            .default(true)
            .interact()
            .context("failed to read confirmation")?;
        if !confirmed {
            println!("submit cancelled");
            return Ok(());
        }

        let source = std::fs::read_to_string(source_path)
            .with_context(|| format!("failed to read {:?}", source_path))?;
        let source = archive::process_source(&self.settings, &source).await?;
        if source.is_empty() {
            println!("submit cancelled (processed source is empty)");
            return Ok(());
        }

        let provider = self.registry.by_name(&problem.judge)?;
        let session = provider.authenticate(&mut self.settings).await?;
        let record = tracker::submit_and_track(
            provider.as_ref(),
            &session,
            problem,
            &source,
            lang,
            tracker::POLL_INTERVAL,
            self.poll_deadline(),
        )
        .await?;

        println!("verdict: {}", record.status.colored());
        println!("url:     {}", record.url);
        println!("date:    {}", record.submitted_at.to_rfc3339());

        if let Some(path) =
            archive::archive_if_enabled(&mut self.settings, lang, problem, &record)?
        {
            println!("archived: {}", path.display());
        }
        Ok(())
    }

    /// `ojx view`: one problem in full, or a table of everything stored.
    pub fn view(&self, problem_id: Option<&str>) -> Result<()> {
        match problem_id {
            Some(id) => {
                let problem = self.store.load(id, &self.registry)?;
                print!("{}", problem.describe());
            }
            None => {
                let ids = self.store.list_ids();
                if ids.is_empty() {
                    println!("no problems stored yet; fetch one with `ojx fetch <url>`");
                    return Ok(());
                }
                println!("{:<12} {:<20} {:<18} url", "id", "name", "judge");
                println!("{}", "-".repeat(76));
                for id in ids {
                    let problem = self.store.load(&id, &self.registry)?;
                    println!(
                        "{:<12} {:<20} {:<18} {}",
                        problem.id, problem.name, problem.judge, problem.url
                    );
                }
            }
        }
        Ok(())
    }

    /// `ojx process`: print the processed source to stdout.
    pub async fn process(&mut self, lang_flag: Option<&str>) -> Result<()> {
        let lang = self.resolve_language(lang_flag)?;
        let source_path = self.source_in_cwd(&lang)?;
        let source = std::fs::read_to_string(&source_path)
            .with_context(|| format!("failed to read {:?}", source_path))?;
        print!("{}", archive::process_source(&self.settings, &source).await?);
        Ok(())
    }

    /// `ojx cf-submissions`: bulk verdict viewer for one Codeforces contest.
    pub async fn cf_submissions(&mut self, contest_id: u32) -> Result<()> {
        let codeforces = crate::judge::codeforces::Codeforces::new(&self.data_dir);
        codeforces
            .show_my_submissions(&mut self.settings, contest_id)
            .await
    }
}
