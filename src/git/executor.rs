use crate::audit::AuditLogger;
use crate::error::{GitError, GitResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Result of executing a git command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
}

impl CommandOutput {
    /// Successful output carrying the given stdout, handy for canned runners
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            success: true,
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            success: false,
        }
    }
}

/// Something that can run a git command line and hand back its output
///
/// `run` must return `Ok` for commands that ran but exited nonzero;
/// `Err` is reserved for commands that could not be run at all.
pub trait GitRunner {
    fn run(&self, args: &[&str]) -> GitResult<CommandOutput>;

    /// Run and turn a nonzero exit into `GitError::CommandFailed`
    fn execute(&self, args: &[&str]) -> GitResult<CommandOutput> {
        let output = self.run(args)?;
        if !output.success {
            return Err(GitError::CommandFailed(format!(
                "Command 'git {}' failed with exit code {}: {}",
                args.join(" "),
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

/// Executes git commands within a repository
#[derive(Debug)]
pub struct GitExecutor {
    repo_path: PathBuf,
    audit: Option<AuditLogger>,
}

impl GitExecutor {
    /// Create a new GitExecutor for the given repository path
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            audit: None,
        }
    }

    /// Record every executed command in the given audit log
    pub fn with_audit(mut self, logger: AuditLogger) -> Self {
        self.audit = Some(logger);
        self
    }

    /// Process command output into CommandOutput struct
    fn process_output(&self, output: Output, args: &[&str]) -> CommandOutput {
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);
        let success = output.status.success();

        if let Some(audit) = &self.audit {
            // Audit write failures never fail the command
            let _ = audit.log_command(args, &self.repo_path, exit_code);
        }

        CommandOutput {
            stdout,
            stderr,
            exit_code,
            success,
        }
    }

    /// Get the repository path
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

impl GitRunner for GitExecutor {
    /// Arguments go straight to the git process, no shell is involved
    fn run(&self, args: &[&str]) -> GitResult<CommandOutput> {
        if args.is_empty() {
            return Err(GitError::CommandFailed("Empty command".to_string()));
        }

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .map_err(|e| GitError::CommandFailed(format!("Failed to execute git: {}", e)))?;

        Ok(self.process_output(output, args))
    }
}

/// Refuse ref-like arguments that git would read as an option
pub(crate) fn check_ref_arg(kind: &str, value: &str) -> GitResult<()> {
    if value.trim().is_empty() {
        return Err(GitError::InvalidArgument(format!("{} is empty", kind)));
    }
    if value.starts_with('-') {
        return Err(GitError::InvalidArgument(format!(
            "{} '{}' looks like an option",
            kind, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path().to_path_buf();

        Command::new("git")
            .args(["init", "--initial-branch=main"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        Command::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        (temp_dir, repo_path)
    }

    #[test]
    fn test_run_status() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        let output = executor.run(&["status", "--porcelain"]).unwrap();
        assert!(output.success);
        assert_eq!(output.exit_code, 0);
    }

    #[test]
    fn test_run_reports_nonzero_exit_without_error() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        // No commits yet, so there is no HEAD to log
        let output = executor.run(&["log", "--oneline"]).unwrap();
        assert!(!output.success);
        assert_ne!(output.exit_code, 0);
    }

    #[test]
    fn test_execute_turns_nonzero_exit_into_error() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        let result = executor.execute(&["log", "--oneline"]);
        assert!(matches!(result, Err(GitError::CommandFailed(_))));
    }

    #[test]
    fn test_arguments_are_not_shell_expanded() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        let output = executor
            .run(&["rev-parse", "--verify", "--quiet", "$(whoami)"])
            .unwrap();
        assert!(!output.success);
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_empty_command() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        let no_args: [&str; 0] = [];
        assert!(executor.run(&no_args).is_err());
    }

    #[test]
    fn test_commands_are_audited() {
        let (_temp, repo_path) = create_test_repo();
        let log_path = repo_path.join("audit").join("history.log");
        let executor =
            GitExecutor::new(&repo_path).with_audit(AuditLogger::with_path(&log_path).unwrap());

        executor.run(&["status", "--porcelain"]).unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("git status --porcelain"));
        assert!(content.contains("exit:0"));
    }

    #[test]
    fn test_check_ref_arg() {
        assert!(check_ref_arg("branch", "main").is_ok());
        assert!(check_ref_arg("branch", "feature/x").is_ok());
        assert!(matches!(
            check_ref_arg("branch", "--force"),
            Err(GitError::InvalidArgument(_))
        ));
        assert!(check_ref_arg("version", "  ").is_err());
    }

    #[test]
    fn test_repo_path() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        assert_eq!(executor.repo_path(), repo_path.as_path());
    }
}
