pub mod executor;
pub mod parser;
pub mod repository;

// Re-export commonly used types
pub use executor::{CommandOutput, GitExecutor, GitRunner};
pub use parser::{Branch, LogEntry, LOG_RECORD_FORMAT, parse_branch_list, parse_log, parse_log_records};
pub use repository::Repository;
