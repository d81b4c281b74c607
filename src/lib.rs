pub mod audit;
pub mod config;
pub mod error;
pub mod git;
pub mod report;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult, GitError, GitResult};
pub use git::{Branch, GitExecutor, GitRunner, LogEntry, Repository};
pub use report::{CollectingReporter, ErrorReporter, StderrReporter};
