//! Subprocess Command Handler
//!
//! Out-of-process plugins are executed, not linked: the handler spawns the
//! declared executable (or shell command line) with the user's arguments
//! appended and inherited stdio.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use feflow_core::{CommandContext, CommandHandler, CoreError, CoreResult};
use tokio::process::Command;

/// Environment variable carrying the tool home to every plugin process.
pub const ENV_FEFLOW_HOME: &str = "FEFLOW_HOME";
/// Environment variable carrying the parsed arguments as JSON.
pub const ENV_FEFLOW_ARGS: &str = "FEFLOW_ARGS";

/// What to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// An executable with fixed leading arguments.
    Exec { program: PathBuf, args: Vec<String> },
    /// A command line for the platform shell.
    Shell { line: String },
}

#[derive(Debug, Clone)]
pub struct ProcessCommand {
    invocation: Invocation,
    /// Working directory; the invocation's cwd when unset.
    working_dir: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl ProcessCommand {
    pub fn exec(program: impl Into<PathBuf>) -> Self {
        Self {
            invocation: Invocation::Exec {
                program: program.into(),
                args: Vec::new(),
            },
            working_dir: None,
            env: HashMap::new(),
        }
    }

    pub fn shell(line: impl Into<String>) -> Self {
        Self {
            invocation: Invocation::Shell { line: line.into() },
            working_dir: None,
            env: HashMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, leading: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Invocation::Exec { args, .. } = &mut self.invocation {
            args.extend(leading.into_iter().map(Into::into));
        }
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Build the `tokio::process::Command` for the given user arguments.
    pub fn build(&self, user_args: &[String]) -> Command {
        let mut cmd = match &self.invocation {
            Invocation::Exec { program, args } => {
                let mut c = Command::new(program);
                c.args(args).args(user_args);
                c
            }
            Invocation::Shell { line } => shell_command(line, user_args),
        };
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn describe(&self) -> String {
        match &self.invocation {
            Invocation::Exec { program, args } if args.is_empty() => program.display().to_string(),
            Invocation::Exec { program, args } => format!("{} {}", program.display(), args.join(" ")),
            Invocation::Shell { line } => line.clone(),
        }
    }
}

/// `sh -c '<line> "$@"' sh args...` so user arguments arrive unmangled;
/// `cmd /C` on Windows.
fn shell_command(line: &str, user_args: &[String]) -> Command {
    if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        let mut full = line.to_string();
        for arg in user_args {
            full.push(' ');
            full.push_str(arg);
        }
        c.args(["/C", &full]);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c")
            .arg(format!("{} \"$@\"", line))
            .arg("sh")
            .args(user_args);
        c
    }
}

#[async_trait]
impl CommandHandler for ProcessCommand {
    async fn call(&self, ctx: &CommandContext<'_>) -> CoreResult<()> {
        let mut cmd = self.build(ctx.args.raw());
        if self.working_dir.is_none() {
            cmd.current_dir(&ctx.cwd);
        }
        cmd.env(ENV_FEFLOW_HOME, &ctx.home);
        cmd.env(ENV_FEFLOW_ARGS, ctx.args.to_json().to_string());

        tracing::debug!("[process] spawning {}", self.describe());
        let status = cmd.status().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::not_found(format!("{} is not installed or not executable", self.describe()))
            } else {
                CoreError::command(format!("Failed to spawn {}: {}", self.describe(), e))
            }
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(CoreError::command(format!(
                "`{}` exited with {}",
                self.describe(),
                status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "a signal".to_string())
            )))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use feflow_core::{CommandRegistry, HookBus, ParsedArgs};
    use std::sync::Arc;

    fn ctx<'a>(registry: &'a CommandRegistry, cwd: &std::path::Path, args: &[&str]) -> CommandContext<'a> {
        CommandContext {
            invoked_as: "t".into(),
            args: ParsedArgs::parse(args.iter().copied()),
            cwd: cwd.to_path_buf(),
            home: cwd.to_path_buf(),
            version: "0.1.0".into(),
            registry,
        }
    }

    #[tokio::test]
    async fn test_shell_command_receives_user_args() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = CommandRegistry::new(Arc::new(HookBus::new()));
        let out = tmp.path().join("out.txt");
        let handler = ProcessCommand::shell(format!("printf '%s,' > {}", out.display()));

        handler
            .call(&ctx(&registry, tmp.path(), &["a b", "--flag"]))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(out).unwrap(), "a b,--flag,");
    }

    #[tokio::test]
    async fn test_env_and_working_dir_are_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = CommandRegistry::new(Arc::new(HookBus::new()));
        let handler = ProcessCommand::shell("printf '%s' \"$GREETING\" > greeting.txt")
            .with_env("GREETING", "hello");

        handler.call(&ctx(&registry, tmp.path(), &[])).await.unwrap();

        let written = std::fs::read_to_string(tmp.path().join("greeting.txt")).unwrap();
        assert_eq!(written, "hello");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_command_error() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = CommandRegistry::new(Arc::new(HookBus::new()));
        let handler = ProcessCommand::shell("exit 3");

        let err = handler.call(&ctx(&registry, tmp.path(), &[])).await.unwrap_err();
        assert!(matches!(err, CoreError::Command(ref m) if m.contains("exited with 3")));
    }

    #[tokio::test]
    async fn test_missing_executable_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = CommandRegistry::new(Arc::new(HookBus::new()));
        let handler = ProcessCommand::exec(tmp.path().join("no-such-binary"));

        let err = handler.call(&ctx(&registry, tmp.path(), &[])).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn test_exec_leading_args() {
        let handler = ProcessCommand::exec("/bin/echo").with_args(["--x"]);
        assert_eq!(
            handler.invocation(),
            &Invocation::Exec {
                program: PathBuf::from("/bin/echo"),
                args: vec!["--x".into()]
            }
        );
    }
}
