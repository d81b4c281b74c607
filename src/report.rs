use std::sync::Mutex;

/// Sink for user-visible errors raised by repository actions
///
/// Actions such as checkout or tag never abort on a failed git command.
/// They hand a message describing the failure to the reporter and return.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ErrorReporter for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Writes errors to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl ErrorReporter for StderrReporter {
    fn report(&self, message: &str) {
        eprintln!("Error: {}", message);
    }
}

/// Keeps every reported message in memory
#[derive(Debug, Default)]
pub struct CollectingReporter {
    messages: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the messages reported so far, oldest first
    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, message: &str) {
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push(message.to_string());
    }
}
