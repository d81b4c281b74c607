use crate::audit::AuditLogger;
use crate::config::Config;
use crate::error::{GitError, GitResult};
use crate::git::executor::{self, CommandOutput, GitExecutor, GitRunner};
use crate::git::parser::{self, Branch, LogEntry, LOG_RECORD_FORMAT};
use crate::report::{ErrorReporter, StderrReporter};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_TAG_PREFIX: &str = "v";

/// A git repository driven through the git command line
///
/// Queries parse git's text output into [`Branch`] and [`LogEntry`] records.
/// Release actions (checkout, merge, tag, push) never return an error for a
/// failed git command: the failure is described to the [`ErrorReporter`] and
/// the action returns `false`.
pub struct Repository<R: GitRunner = GitExecutor> {
    path: PathBuf,
    runner: R,
    reporter: Arc<dyn ErrorReporter>,
    audit: Option<AuditLogger>,
    remote: String,
    tag_prefix: String,
    log_limit: Option<usize>,
}

impl Repository<GitExecutor> {
    /// Detect git repository from current working directory
    pub fn discover() -> GitResult<Self> {
        let current_dir = env::current_dir().map_err(GitError::IoError)?;

        Self::discover_from(&current_dir)
    }

    /// Detect git repository starting from a specific directory
    pub fn discover_from<P: AsRef<Path>>(start_path: P) -> GitResult<Self> {
        let mut current = start_path.as_ref().to_path_buf();

        loop {
            if current.join(".git").exists() {
                return Ok(Self::new(current));
            }

            if !current.pop() {
                return Err(GitError::NotARepository);
            }
        }
    }

    /// Create a Repository for a known git directory
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let executor = GitExecutor::new(&path);
        Self::with_runner(path, executor)
    }

    /// Apply release settings and, when enabled, the command audit log
    pub fn with_config(mut self, config: &Config) -> GitResult<Self> {
        self.remote = config.release.remote.clone();
        self.tag_prefix = config.release.tag_prefix.clone();
        self.log_limit = config.release.log_limit;

        if config.audit.log_commands {
            let logger = match &config.audit.log_path {
                Some(path) => AuditLogger::with_path(path)?,
                None => AuditLogger::new()?,
            };
            self.runner = self.runner.with_audit(logger.clone());
            self.audit = Some(logger);
        }

        Ok(self)
    }
}

impl<R: GitRunner> Repository<R> {
    /// Drive the repository at `path` through a custom runner
    pub fn with_runner<P: AsRef<Path>>(path: P, runner: R) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            runner,
            reporter: Arc::new(StderrReporter),
            audit: None,
            remote: DEFAULT_REMOTE.to_string(),
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            log_limit: None,
        }
    }

    pub fn with_reporter<E: ErrorReporter + 'static>(self, reporter: E) -> Self {
        self.with_shared_reporter(Arc::new(reporter))
    }

    pub fn with_shared_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Get the repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Tag name used for a release version, e.g. `v1.2.0`
    pub fn tag_name(&self, version: &str) -> String {
        format!("{}{}", self.tag_prefix, version)
    }

    /// Name of the checked-out branch (`HEAD` when detached)
    pub fn current_branch(&self) -> GitResult<String> {
        let output = self.runner.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(output.stdout.trim().to_string())
    }

    /// Local branches as listed by `git branch -vv`
    pub fn branches(&self) -> GitResult<Vec<Branch>> {
        let output = self.runner.run(&["branch", "-vv", "--no-color"])?;
        parser::parse_branch_list(&output.stdout)
    }

    /// Short hash of the named branch, `None` when there is no such branch
    pub fn hash_of(&self, branch_name: &str) -> GitResult<Option<String>> {
        Ok(self
            .branches()?
            .into_iter()
            .find(|branch| branch.name == branch_name)
            .map(|branch| branch.hash))
    }

    /// Whether the checked-out branch points at the same commit as `branch_name`
    ///
    /// `HEAD` names the checked-out entry, which covers a detached HEAD.
    /// Two branches that cannot be found never match each other.
    pub fn current_branch_matches(&self, branch_name: &str) -> GitResult<bool> {
        let branches = self.branches()?;
        let current = branches.iter().find(|branch| branch.is_current);
        let other = if branch_name == "HEAD" {
            current
        } else {
            branches.iter().find(|branch| branch.name == branch_name)
        };

        match (current, other) {
            (Some(current), Some(other)) => Ok(current.hash == other.hash),
            _ => Ok(false),
        }
    }

    /// First-parent history of HEAD, newest first, capped at `limit` entries
    ///
    /// `None` or `Some(0)` lists the whole history. A repository without
    /// commits yields an empty list.
    pub fn logs(&self, limit: Option<usize>) -> GitResult<Vec<LogEntry>> {
        let format = format!("--pretty=format:{}", LOG_RECORD_FORMAT);
        let mut args = vec!["log", "-z", "--first-parent", format.as_str()];

        let max_count = limit.filter(|&n| n > 0).map(|n| format!("--max-count={}", n));
        if let Some(max_count) = &max_count {
            args.push(max_count.as_str());
        }

        let output = self.runner.run(&args)?;
        parser::parse_log_records(&output.stdout)
    }

    /// Find a commit by short hash within the first `limit` log entries
    ///
    /// Falls back to the configured search depth when `limit` is `None`.
    /// A hash that is not found is `Ok(None)`, not an error.
    pub fn log(&self, hash: &str, limit: Option<usize>) -> GitResult<Option<LogEntry>> {
        let logs = self.logs(limit.or(self.log_limit))?;
        Ok(logs.into_iter().find(|entry| entry.hash == hash))
    }

    /// True when tracked files differ from HEAD
    pub fn has_uncommitted_changes(&self) -> GitResult<bool> {
        // Stale stat info in the index would make diff-index report phantom changes
        self.runner.run(&["update-index", "-q", "--refresh"])?;

        let output = self.runner.run(&["diff-index", "--quiet", "HEAD"])?;
        Ok(!output.success)
    }

    /// Contents of `file` at `commit` (HEAD by default), trimmed
    pub fn show_file(&self, file: &str, commit: Option<&str>) -> GitResult<String> {
        let commit = commit.unwrap_or("HEAD");
        executor::check_ref_arg("commit", commit)?;

        let object = format!("{}:./{}", commit, file);
        let output = self.runner.execute(&["show", object.as_str()])?;
        Ok(output.stdout.trim().to_string())
    }

    pub fn checkout(&self, branch: &str) -> bool {
        let ok = executor::check_ref_arg("branch", branch).is_ok()
            && self.succeeded(&["checkout", branch]);

        if !ok {
            self.fail(&format!("unable to checkout {}", branch));
        }
        ok
    }

    /// Merge `commit` into the current branch with a `merge <tag>` merge commit
    pub fn merge(&self, commit: &LogEntry, version: &str) -> bool {
        let branch = self.current_branch_or_head();
        let message = format!("merge {}", self.tag_name(version));
        let ok = self.release_args_valid(commit, version)
            && self.succeeded(&["merge", commit.hash.as_str(), "--no-ff", "-m", message.as_str()]);

        if !ok {
            self.fail(&format!("unable to merge {} to {}", commit.hash, branch));
        }
        ok
    }

    /// Create an annotated release tag on `commit`
    pub fn tag(&self, commit: &LogEntry, version: &str) -> bool {
        let tag = self.tag_name(version);
        let ok = self.release_args_valid(commit, version)
            && self.succeeded(&["tag", "-a", tag.as_str(), commit.hash.as_str(), "-m", tag.as_str()]);

        if !ok {
            self.fail(&format!("unable to tag {} with {}", commit.hash, tag));
        }
        ok
    }

    /// Push the current branch and all tags to the release remote
    pub fn push_to_origin(&self) -> bool {
        let branch = self.current_branch_or_head();
        let ok = self.succeeded(&["push", self.remote.as_str(), branch.as_str(), "--tags"]);

        if !ok {
            self.fail(&format!(
                "unable to push {} to {} with tags",
                branch, self.remote
            ));
        }
        ok
    }

    fn release_args_valid(&self, commit: &LogEntry, version: &str) -> bool {
        executor::check_ref_arg("commit", &commit.hash).is_ok()
            && executor::check_ref_arg("version", version).is_ok()
    }

    fn succeeded(&self, args: &[&str]) -> bool {
        matches!(
            self.runner.run(args),
            Ok(CommandOutput { success: true, .. })
        )
    }

    fn current_branch_or_head(&self) -> String {
        match self.current_branch() {
            Ok(branch) if !branch.is_empty() => branch,
            _ => "HEAD".to_string(),
        }
    }

    fn fail(&self, message: &str) {
        if let Some(audit) = &self.audit {
            let _ = audit.log_action_failure(message, &self.path);
        }
        self.reporter.report(message);
    }
}

impl<R: GitRunner + fmt::Debug> fmt::Debug for Repository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.path)
            .field("runner", &self.runner)
            .field("remote", &self.remote)
            .field("tag_prefix", &self.tag_prefix)
            .field("log_limit", &self.log_limit)
            .finish_non_exhaustive()
    }
}
