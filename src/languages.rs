//! Language configuration for compilation and execution
//!
//! A [`Language`] describes one toolchain: where its sources live (extension),
//! how to compile (optional) and run them, and how to write a comment in it.
//! The built-in set can be extended or overridden by a `languages.toml` file
//! in the data directory; after startup the set is never mutated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::errors::ClientError;

/// Placeholder substituted with the source path in command templates.
pub const SOURCE_PATH_PLACEHOLDER: &str = "{SOURCEFILE_PATH}";

/// One supported toolchain. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Language {
    /// Display name ("C++", "Python3", ...)
    pub name: String,
    /// Source file extension, including the dot (".cpp")
    pub file_extension: String,
    /// Compile command template (None for interpreted languages)
    pub compile_command: Option<String>,
    /// Run command template; always present
    pub run_command: String,
    /// Comment delimiters, e.g. ("// ", "") or ("# ", "")
    pub comment_begin: String,
    pub comment_end: String,
}

impl Language {
    /// Wrap `line` in this language's comment delimiters.
    pub fn comment_out(&self, line: &str) -> String {
        format!("{}{}{}", self.comment_begin, line, self.comment_end)
    }

    /// Substitute the source path into a command template.
    pub fn substitute(template: &str, source_path: &Path) -> String {
        template.replace(SOURCE_PATH_PLACEHOLDER, &source_path.to_string_lossy())
    }
}

/// Raw TOML entry for a language override file
#[derive(Debug, Deserialize)]
struct RawLanguage {
    file_extension: String,
    compile_command: Option<String>,
    run_command: String,
    #[serde(default = "default_comment_begin")]
    comment_begin: String,
    #[serde(default)]
    comment_end: String,
    #[serde(default)]
    aliases: Vec<String>,
}

fn default_comment_begin() -> String {
    "// ".to_string()
}

fn built_in() -> Vec<(Language, Vec<&'static str>)> {
    vec![
        (
            Language {
                name: "C++".into(),
                file_extension: ".cpp".into(),
                compile_command: Some(format!(
                    "g++ -std=gnu++17 -O2 {} -o a.out",
                    SOURCE_PATH_PLACEHOLDER
                )),
                run_command: "./a.out".into(),
                comment_begin: "// ".into(),
                comment_end: "".into(),
            },
            vec!["cpp", "cc"],
        ),
        (
            Language {
                name: "Python3".into(),
                file_extension: ".py".into(),
                compile_command: None,
                run_command: format!("python3 {}", SOURCE_PATH_PLACEHOLDER),
                comment_begin: "# ".into(),
                comment_end: "".into(),
            },
            vec!["py", "python"],
        ),
        (
            Language {
                name: "Java".into(),
                file_extension: ".java".into(),
                compile_command: Some(format!("javac {}", SOURCE_PATH_PLACEHOLDER)),
                run_command: "java Main".into(),
                comment_begin: "// ".into(),
                comment_end: "".into(),
            },
            vec![],
        ),
        (
            Language {
                name: "Rust".into(),
                file_extension: ".rs".into(),
                compile_command: Some(format!(
                    "rustc -O {} -o a.out",
                    SOURCE_PATH_PLACEHOLDER
                )),
                run_command: "./a.out".into(),
                comment_begin: "// ".into(),
                comment_end: "".into(),
            },
            vec!["rs"],
        ),
    ]
}

/// The set of known languages, keyed by lowercased name and aliases.
pub struct Languages {
    by_name: HashMap<String, Language>,
}

impl Languages {
    /// Build the language set: built-in defaults, then entries from
    /// `override_file` (if it exists), which win on name collision.
    pub fn load(override_file: Option<&Path>) -> Result<Self> {
        let mut by_name = HashMap::new();

        for (lang, aliases) in built_in() {
            for alias in aliases {
                by_name.insert(alias.to_string(), lang.clone());
            }
            by_name.insert(lang.name.to_lowercase(), lang);
        }

        if let Some(path) = override_file {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {:?}", path))?;
                let raw: HashMap<String, RawLanguage> = toml::from_str(&content)
                    .with_context(|| format!("failed to parse {:?}", path))?;
                for (name, raw) in raw {
                    let lang = Language {
                        name: name.clone(),
                        file_extension: raw.file_extension,
                        compile_command: raw.compile_command,
                        run_command: raw.run_command,
                        comment_begin: raw.comment_begin,
                        comment_end: raw.comment_end,
                    };
                    for alias in &raw.aliases {
                        by_name.insert(alias.to_lowercase(), lang.clone());
                    }
                    by_name.insert(name.to_lowercase(), lang);
                }
                debug!("loaded language overrides from {:?}", path);
            }
        }

        Ok(Self { by_name })
    }

    pub fn get(&self, name: &str) -> Option<&Language> {
        self.by_name.get(&name.to_lowercase())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Non-recursive scan of `dir` for files with the language's extension.
pub fn source_candidates(dir: &Path, lang: &Language) -> Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read {:?}", dir))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().ends_with(&lang.file_extension) {
            candidates.push(entry.path());
        }
    }
    candidates.sort();
    Ok(candidates)
}

/// Pick the source file to operate on: a unique candidate is used directly,
/// none is an error, several prompt the user to choose.
pub fn find_source_code(dir: &Path, lang: &Language) -> Result<PathBuf> {
    let mut candidates = source_candidates(dir, lang)?;
    match candidates.len() {
        1 => {
            debug!("unique source file: {:?}", candidates[0]);
            Ok(candidates.swap_remove(0))
        }
        0 => Err(ClientError::NoSourceFile {
            language: lang.name.clone(),
        }
        .into()),
        _ => {
            let items: Vec<String> = candidates
                .iter()
                .map(|p| {
                    p.file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .into_owned()
                })
                .collect();
            let choice = dialoguer::Select::new()
                .with_prompt("Choose source file")
                .items(&items)
                .default(0)
                .interact()
                .context("failed to read selection")?;
            Ok(candidates.swap_remove(choice))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_built_in_lookup_and_aliases() {
        let langs = Languages::load(None).unwrap();
        assert_eq!(langs.get("c++").unwrap().name, "C++");
        assert_eq!(langs.get("CPP").unwrap().name, "C++");
        assert_eq!(langs.get("python3").unwrap().name, "Python3");
        assert!(langs.get("cobol").is_none());
    }

    #[test]
    fn test_interpreted_language_has_no_compile_command() {
        let langs = Languages::load(None).unwrap();
        assert!(langs.get("python3").unwrap().compile_command.is_none());
        assert!(langs.get("c++").unwrap().compile_command.is_some());
    }

    #[test]
    fn test_override_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("languages.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r##"
["C++"]
file_extension = ".cpp"
compile_command = "clang++ -O2 {{SOURCEFILE_PATH}} -o a.out"
run_command = "./a.out"

[Nim]
file_extension = ".nim"
run_command = "nim r {{SOURCEFILE_PATH}}"
comment_begin = "# "
aliases = ["nimlang"]
"##
        )
        .unwrap();

        let langs = Languages::load(Some(path.as_path())).unwrap();
        assert!(langs
            .get("c++")
            .unwrap()
            .compile_command
            .as_deref()
            .unwrap()
            .starts_with("clang++"));
        assert_eq!(langs.get("nimlang").unwrap().name, "Nim");
    }

    #[test]
    fn test_substitute_replaces_every_occurrence() {
        let out = Language::substitute(
            "cp {SOURCEFILE_PATH} /tmp && cat {SOURCEFILE_PATH}",
            Path::new("main.cpp"),
        );
        assert_eq!(out, "cp main.cpp /tmp && cat main.cpp");
    }

    #[test]
    fn test_comment_out() {
        let langs = Languages::load(None).unwrap();
        assert_eq!(
            langs.get("python3").unwrap().comment_out("hello"),
            "# hello"
        );
    }

    #[test]
    fn test_source_candidates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.cpp"), "").unwrap();
        std::fs::write(dir.path().join("b.py"), "").unwrap();
        std::fs::write(dir.path().join("c.cpp"), "").unwrap();

        let langs = Languages::load(None).unwrap();
        let cpp = langs.get("c++").unwrap();
        let found = source_candidates(dir.path(), cpp).unwrap();
        assert_eq!(found.len(), 2);

        let py = langs.get("python3").unwrap();
        let found = source_candidates(dir.path(), py).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_find_source_code_none_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let langs = Languages::load(None).unwrap();
        let cpp = langs.get("c++").unwrap();
        let err = find_source_code(dir.path(), cpp).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::NoSourceFile { .. })
        ));
    }
}
