/// Asks the user a yes/no question.
pub trait Prompt: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Answers no to everything. Used when no terminal is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclinePrompt;

impl Prompt for DeclinePrompt {
    fn confirm(&self, message: &str) -> bool {
        tracing::debug!(message, "no prompt available, declining");
        false
    }
}
