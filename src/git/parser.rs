use crate::error::{GitError, GitResult};
use serde::{Deserialize, Serialize};

/// `--pretty` template for `git log -z`: unit-separated fields, NUL-terminated records
///
/// Git prints the fields raw, so separators that cannot appear in a subject
/// or name keep quotes, tabs and backslashes intact.
pub const LOG_RECORD_FORMAT: &str = "%h%x1f%cn%x1f%ce%x1f%s%x1f%D";

const FIELD_SEPARATOR: char = '\x1f';
const RECORD_SEPARATOR: char = '\0';

/// Parse git branch -vv output, one Branch per non-empty line
pub fn parse_branch_list(output: &str) -> GitResult<Vec<Branch>> {
    Ok(output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(Branch::parse)
        .collect())
}

/// Parse `git log -z --pretty=format:LOG_RECORD_FORMAT` output
pub fn parse_log_records(output: &str) -> GitResult<Vec<LogEntry>> {
    output
        .split(RECORD_SEPARATOR)
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.is_empty())
        .map(LogEntry::from_record)
        .collect()
}

/// Parse JSON lines, one serialized LogEntry per line
pub fn parse_log(output: &str) -> GitResult<Vec<LogEntry>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(LogEntry::parse)
        .collect()
}

/// Represents a branch from git branch -vv
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Branch {
    pub name: String,
    pub hash: String,
    /// Upstream ref name without brackets or tracking status, empty when untracked
    pub remote: String,
    pub message: String,
    pub is_current: bool,
    pub ahead: usize,
    pub behind: usize,
}

impl Branch {
    /// Parse one line of `git branch -vv`
    ///
    /// Format: `* main abc123 [origin/main: ahead 2, behind 1] Commit message`
    /// or:     `  feature-x def456 Feature work`
    ///
    /// The bracketed upstream is only taken when present, so untracked
    /// branches keep their whole subject as the message.
    pub fn parse(raw: &str) -> Self {
        let (marker, rest) = match raw.chars().next() {
            Some(c @ ('*' | '+')) => (Some(c), &raw[1..]),
            _ => (None, raw),
        };
        let rest = rest.trim();

        // Detached HEAD shows up as "(HEAD detached at abc123)"
        let (name, rest) = match enclosed(rest, '(', ')') {
            Some((inner, rest)) => (format!("({})", inner), rest),
            None => {
                let (name, rest) = next_field(rest);
                (name.to_string(), rest)
            }
        };

        let (hash, mut rest) = next_field(rest.trim_start());
        rest = rest.trim_start();

        // Branches checked out in another worktree carry the worktree path
        if marker == Some('+') {
            if let Some((_, after)) = enclosed(rest, '(', ')') {
                rest = after.trim_start();
            }
        }

        let mut branch = Branch {
            name,
            hash: hash.to_string(),
            is_current: marker == Some('*'),
            ..Default::default()
        };

        match enclosed(rest, '[', ']') {
            Some((upstream, message)) => {
                branch.apply_upstream(upstream);
                branch.message = message.trim().to_string();
            }
            None => branch.message = rest.trim().to_string(),
        }

        branch
    }

    fn apply_upstream(&mut self, upstream: &str) {
        let (remote, status) = match upstream.split_once(':') {
            Some((remote, status)) => (remote, status),
            None => (upstream, ""),
        };
        self.remote = remote.trim().to_string();

        for part in status.split(',') {
            let part = part.trim();
            if let Some(count) = part.strip_prefix("ahead ") {
                self.ahead = count.trim().parse().unwrap_or(0);
            } else if let Some(count) = part.strip_prefix("behind ") {
                self.behind = count.trim().parse().unwrap_or(0);
            }
        }
    }

    /// Case-sensitive substring match against hash, message, name and remote
    pub fn matches(&self, query: &str) -> bool {
        query.is_empty()
            || self.hash.contains(query)
            || self.message.contains(query)
            || self.name.contains(query)
            || self.remote.contains(query)
    }
}

/// Represents a commit from git log
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogEntry {
    pub hash: String,
    pub committer: String,
    pub email: String,
    pub subject: String,
    /// Ref decoration (`%D`), e.g. `HEAD -> main, tag: v1.0.0`
    pub branch: String,
}

impl LogEntry {
    pub fn parse(raw: &str) -> GitResult<Self> {
        let entry: LogEntry = serde_json::from_str(raw)
            .map_err(|e| GitError::ParseError(format!("invalid log line {:?}: {}", raw, e)))?;

        if entry.hash.is_empty() {
            return Err(GitError::ParseError(format!(
                "log line without a hash: {:?}",
                raw
            )));
        }

        Ok(entry)
    }

    /// Build an entry from one `LOG_RECORD_FORMAT` record
    pub fn from_record(raw: &str) -> GitResult<Self> {
        let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
        let [hash, committer, email, subject, branch] = fields.as_slice() else {
            return Err(GitError::ParseError(format!(
                "expected 5 fields in log record {:?}, found {}",
                raw,
                fields.len()
            )));
        };

        if hash.is_empty() {
            return Err(GitError::ParseError(format!(
                "log record without a hash: {:?}",
                raw
            )));
        }

        Ok(LogEntry {
            hash: hash.to_string(),
            committer: committer.to_string(),
            email: email.to_string(),
            subject: subject.to_string(),
            branch: branch.to_string(),
        })
    }

    /// One-line JSON form accepted by [`LogEntry::parse`]
    pub fn to_json(&self) -> GitResult<String> {
        serde_json::to_string(self)
            .map_err(|e| GitError::ParseError(format!("cannot serialize log entry: {}", e)))
    }

    /// Substring match; the hash is compared as given, every other field ignores case
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        if self.hash.contains(query) {
            return true;
        }

        let query = query.to_lowercase();
        [&self.committer, &self.email, &self.subject, &self.branch]
            .iter()
            .any(|field| field.to_lowercase().contains(&query))
    }

    /// Tag names listed in the ref decoration
    pub fn tags(&self) -> Vec<&str> {
        self.branch
            .split(", ")
            .filter_map(|decoration| decoration.trim().strip_prefix("tag: "))
            .collect()
    }

    pub fn is_tagged(&self) -> bool {
        !self.tags().is_empty()
    }
}

/// Split off the text up to the first whitespace
fn next_field(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

/// If `s` opens with `open`, return the text inside and whatever follows `close`
fn enclosed(s: &str, open: char, close: char) -> Option<(&str, &str)> {
    let inner = s.strip_prefix(open)?;
    let end = inner.find(close)?;
    Some((&inner[..end], &inner[end + close.len_utf8()..]))
}
