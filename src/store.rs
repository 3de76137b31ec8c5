//! Local problem store
//!
//! One JSON record per problem under `<data_dir>/samplecases/`, keyed by the
//! uppercased problem ID. The judge is stored as its display name and resolved
//! against the provider registry when a record is loaded, so the on-disk
//! schema stays independent of provider internals.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::errors::ClientError;
use crate::judge::{Problem, ProviderRegistry};

pub const STORE_DIR: &str = "samplecases";

static RECORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^problem_(.+)\.json$").unwrap());

fn record_filename(id: &str) -> String {
    format!("problem_{}.json", id)
}

pub struct ProblemStore {
    root: PathBuf,
}

impl ProblemStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join(STORE_DIR),
        }
    }

    /// Persist `problem`, canonicalizing its ID to uppercase. An existing
    /// record with the same ID is overwritten.
    pub fn save(&self, problem: &Problem) -> Result<Problem> {
        let mut problem = problem.clone();
        problem.id = problem.id.to_uppercase();

        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {:?}", self.root))?;

        let path = self.root.join(record_filename(&problem.id));
        let content = serde_json::to_string_pretty(&problem)?;
        std::fs::write(&path, content).with_context(|| format!("failed to write {:?}", path))?;
        info!("saved problem {} to {:?}", problem.id, path);
        Ok(problem)
    }

    /// Load the record for `id` (case-insensitive) and check its judge name
    /// against the registry.
    pub fn load(&self, id: &str, registry: &ProviderRegistry) -> Result<Problem> {
        let id = id.to_uppercase();
        let path = self.root.join(record_filename(&id));

        let content = std::fs::read_to_string(&path).map_err(|_| ClientError::SampleLoad {
            id: id.clone(),
            reason: format!("{:?} does not exist", path),
        })?;
        let problem: Problem =
            serde_json::from_str(&content).map_err(|e| ClientError::SampleLoad {
                id: id.clone(),
                reason: format!("corrupt record: {}", e),
            })?;

        // the stored judge name must resolve to a live provider
        registry.by_name(&problem.judge)?;

        debug!("loaded problem {} from {:?}", id, path);
        Ok(problem)
    }

    /// IDs of every persisted problem, by scanning the record naming scheme.
    pub fn list_ids(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                RECORD_RE
                    .captures(&name.to_string_lossy())
                    .map(|c| c[1].to_string())
            })
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::TestCase;

    fn sample_problem() -> Problem {
        Problem {
            id: "arc079_b".into(),
            contest_id: "arc079".into(),
            name: "arc079_b".into(),
            url: "https://atcoder.jp/contests/arc079/tasks/arc079_b".into(),
            judge: "AtCoder".into(),
            cases: vec![
                TestCase {
                    input: "1 2\n".into(),
                    output: "3\n".into(),
                },
                TestCase {
                    input: "10 20\n".into(),
                    output: "30\n".into(),
                },
            ],
        }
    }

    #[test]
    fn test_round_trip_uppercases_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProblemStore::new(dir.path());
        let registry = ProviderRegistry::new(dir.path());

        store.save(&sample_problem()).unwrap();
        let loaded = store.load("arc079_b", &registry).unwrap();

        let mut expected = sample_problem();
        expected.id = "ARC079_B".into();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_load_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProblemStore::new(dir.path());
        let registry = ProviderRegistry::new(dir.path());

        store.save(&sample_problem()).unwrap();
        assert!(store.load("ARC079_B", &registry).is_ok());
        assert!(store.load("arc079_B", &registry).is_ok());
    }

    #[test]
    fn test_load_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProblemStore::new(dir.path());
        let registry = ProviderRegistry::new(dir.path());

        let err = store.load("NOPE", &registry).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::SampleLoad { .. })
        ));
    }

    #[test]
    fn test_load_unknown_judge_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProblemStore::new(dir.path());
        let registry = ProviderRegistry::new(dir.path());

        let mut problem = sample_problem();
        problem.judge = "RetiredJudge".into();
        store.save(&problem).unwrap();

        let err = store.load("arc079_b", &registry).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::UnknownJudge(_))
        ));
    }

    #[test]
    fn test_list_ids_scans_naming_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProblemStore::new(dir.path());

        assert!(store.list_ids().is_empty());

        let mut a = sample_problem();
        a.id = "A".into();
        store.save(&a).unwrap();
        let mut b = sample_problem();
        b.id = "0123".into();
        store.save(&b).unwrap();

        // unrelated files are ignored
        std::fs::write(dir.path().join(STORE_DIR).join("notes.txt"), "x").unwrap();

        assert_eq!(store.list_ids(), vec!["0123".to_string(), "A".to_string()]);
    }

    #[test]
    fn test_save_overwrites_existing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProblemStore::new(dir.path());
        let registry = ProviderRegistry::new(dir.path());

        store.save(&sample_problem()).unwrap();
        let mut updated = sample_problem();
        updated.cases.push(TestCase {
            input: "5 5\n".into(),
            output: "10\n".into(),
        });
        store.save(&updated).unwrap();

        let loaded = store.load("arc079_b", &registry).unwrap();
        assert_eq!(loaded.cases.len(), 3);
    }
}
