//! Language runner - compile and execute one source file
//!
//! Compilation is skipped when the source is byte-identical to the last
//! successfully compiled one. The check is a SHA-256 content hash persisted in
//! the data directory (`previous.dat`); invalidation is content-based, never
//! timestamp-based.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use crate::errors::ClientError;
use crate::languages::Language;

/// Name of the persisted compile-skip hash file.
pub const COMPILE_CACHE_FILENAME: &str = "previous.dat";

pub struct Runner {
    /// Where the compile-skip hash lives. Fixed for the process lifetime.
    cache_path: PathBuf,
}

impl Runner {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            cache_path: data_dir.join(COMPILE_CACHE_FILENAME),
        }
    }

    /// Compile (when the language needs it) and run `source_path`.
    ///
    /// `input`: text piped to the child's stdin; `None` inherits the process's
    /// own stdin, which is what makes interactive manual runs work.
    /// `echo`: mirror the child's stdout live to the console and let stderr
    /// through; stdout is captured and returned either way, untouched.
    pub async fn run(
        &self,
        lang: &Language,
        source_path: &Path,
        input: Option<&str>,
        echo: bool,
    ) -> Result<String> {
        if let Some(template) = &lang.compile_command {
            self.compile(lang, template, source_path).await?;
        }

        let argv = split_command(&Language::substitute(&lang.run_command, source_path));
        anyhow::ensure!(!argv.is_empty(), "run command for {} is empty", lang.name);
        debug!("running {:?}", argv);

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        match input {
            Some(_) => cmd.stdin(Stdio::piped()),
            None => cmd.stdin(Stdio::inherit()),
        };
        if echo {
            cmd.stderr(Stdio::inherit());
        } else {
            cmd.stderr(Stdio::null());
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", argv[0]))?;

        if let Some(text) = input {
            let mut stdin = child.stdin.take().context("child stdin unavailable")?;
            stdin.write_all(text.as_bytes()).await?;
            // dropping closes the pipe so the child sees EOF
        }

        let mut stdout = child.stdout.take().context("child stdout unavailable")?;
        let mut captured = Vec::new();
        if echo {
            let mut console = tokio::io::stdout();
            let mut buf = [0u8; 4096];
            loop {
                let n = stdout.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                console.write_all(&buf[..n]).await?;
                console.flush().await?;
                captured.extend_from_slice(&buf[..n]);
            }
        } else {
            stdout.read_to_end(&mut captured).await?;
        }

        let status = child.wait().await.context("failed to wait for child")?;
        if !status.success() {
            return Err(ClientError::Runtime {
                exit_code: status.code().unwrap_or(-1),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&captured).into_owned())
    }

    /// Run the compile command unless the source is unchanged since the last
    /// successful compile.
    async fn compile(&self, lang: &Language, template: &str, source_path: &Path) -> Result<()> {
        let source = std::fs::read(source_path)
            .with_context(|| format!("failed to read source {:?}", source_path))?;
        let hash = Sha256::digest(&source);

        if let Ok(prev) = std::fs::read(&self.cache_path) {
            if prev == hash.as_slice() {
                debug!("source unchanged, skipping compile");
                return Ok(());
            }
        }

        let argv = split_command(&Language::substitute(template, source_path));
        anyhow::ensure!(!argv.is_empty(), "compile command for {} is empty", lang.name);
        debug!("compiling with {:?}", argv);

        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .with_context(|| format!("failed to spawn `{}`", argv[0]))?;

        if !status.success() {
            return Err(ClientError::Compile.into());
        }

        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.cache_path, hash)
            .with_context(|| format!("failed to write {:?}", self.cache_path))?;
        debug!("compile succeeded, hash saved to {:?}", self.cache_path);
        Ok(())
    }
}

fn split_command(template: &str) -> Vec<String> {
    template.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_lang(run_command: &str) -> Language {
        Language {
            name: "Test".into(),
            file_extension: ".txt".into(),
            compile_command: None,
            run_command: run_command.into(),
            comment_begin: "# ".into(),
            comment_end: "".into(),
        }
    }

    #[tokio::test]
    async fn test_run_pipes_stdin_and_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "").unwrap();

        let runner = Runner::new(dir.path());
        let lang = plain_lang("cat");
        let out = runner
            .run(&lang, &source, Some("1 2\n"), false)
            .await
            .unwrap();
        assert_eq!(out, "1 2\n");
    }

    #[tokio::test]
    async fn test_run_reads_source_via_template() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "hello\n").unwrap();

        let runner = Runner::new(dir.path());
        let lang = plain_lang("cat {SOURCEFILE_PATH}");
        let out = runner.run(&lang, &source, Some(""), false).await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "").unwrap();

        let runner = Runner::new(dir.path());
        let lang = plain_lang("false");
        let err = runner
            .run(&lang, &source, Some(""), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Runtime { .. })
        ));
    }

    #[tokio::test]
    async fn test_interpreted_language_never_touches_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "x").unwrap();

        let runner = Runner::new(dir.path());
        let lang = plain_lang("true");
        runner.run(&lang, &source, Some(""), false).await.unwrap();
        assert!(!dir.path().join(COMPILE_CACHE_FILENAME).exists());
    }

    /// Compile command appends a line to a marker file, so the marker's line
    /// count equals the number of actual compile invocations.
    fn counting_lang(dir: &Path) -> Language {
        let script = dir.join("compile.sh");
        let marker = dir.join("marker");
        std::fs::write(&script, format!("echo x >> {}\n", marker.display())).unwrap();
        Language {
            name: "Counting".into(),
            file_extension: ".txt".into(),
            compile_command: Some(format!("sh {}", script.display())),
            run_command: "true".into(),
            comment_begin: "# ".into(),
            comment_end: "".into(),
        }
    }

    fn compile_count(dir: &Path) -> usize {
        std::fs::read_to_string(dir.join("marker"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_unchanged_source_compiles_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "int main() {}").unwrap();

        let runner = Runner::new(dir.path());
        let lang = counting_lang(dir.path());

        runner.run(&lang, &source, Some(""), false).await.unwrap();
        runner.run(&lang, &source, Some(""), false).await.unwrap();
        assert_eq!(compile_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_modified_source_recompiles() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "int main() {}").unwrap();

        let runner = Runner::new(dir.path());
        let lang = counting_lang(dir.path());

        runner.run(&lang, &source, Some(""), false).await.unwrap();
        std::fs::write(&source, "int main() { }").unwrap();
        runner.run(&lang, &source, Some(""), false).await.unwrap();
        assert_eq!(compile_count(dir.path()), 2);
    }

    #[tokio::test]
    async fn test_failed_compile_does_not_save_hash() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.txt");
        std::fs::write(&source, "x").unwrap();

        let runner = Runner::new(dir.path());
        let lang = Language {
            compile_command: Some("false".into()),
            ..plain_lang("true")
        };

        let err = runner
            .run(&lang, &source, Some(""), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Compile)
        ));
        assert!(!dir.path().join(COMPILE_CACHE_FILENAME).exists());
    }
}
