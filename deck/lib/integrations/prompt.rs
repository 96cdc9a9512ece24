use std::io::{BufRead, Write};

use async_trait::async_trait;

use crate::{DeckError, DeckResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Asks the user a yes/no question.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Returns true if the user agreed.
    async fn confirm(&self, message: &str) -> DeckResult<bool>;
}

/// Asks the user to pick one item.
#[async_trait]
pub trait Selector: Send + Sync {
    /// Returns the index of the picked item, `None` if the user backed out.
    async fn select_one(&self, prompt: &str, items: &[String]) -> DeckResult<Option<usize>>;
}

/// Confirms on the terminal.
///
/// Off a terminal (pipes, CI) nothing can be asked, so the answer is "no" unless
/// `assume_yes` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm {
    assume_yes: bool,
}

/// Picks from a numbered list on the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinSelector;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl StdinConfirm {
    /// Creates a prompt. `assume_yes` answers every question with yes without asking.
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn confirm(&self, message: &str) -> DeckResult<bool> {
        Ok(self(message))
    }
}

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, message: &str) -> DeckResult<bool> {
        if self.assume_yes {
            return Ok(true);
        }

        if !deckutils::is_interactive_terminal() {
            tracing::warn!("not a terminal, declining: {}", message.lines().next().unwrap_or_default());
            return Ok(false);
        }

        let prompt = format!("{}\nProceed? [y/N] ", message);
        let answer = read_line(prompt).await?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

#[async_trait]
impl Selector for StdinSelector {
    async fn select_one(&self, prompt: &str, items: &[String]) -> DeckResult<Option<usize>> {
        if items.is_empty() || !deckutils::is_interactive_terminal() {
            return Ok(None);
        }

        let mut menu = format!("{}\n", prompt);
        for (index, item) in items.iter().enumerate() {
            menu.push_str(&format!("  {}) {}\n", index + 1, item));
        }
        menu.push_str("Choose a number (empty to cancel): ");

        let answer = read_line(menu).await?;
        Ok(parse_selection(&answer, items.len()))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Parses a 1-based menu choice into an index.
fn parse_selection(answer: &str, len: usize) -> Option<usize> {
    answer
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|choice| (1..=len).contains(choice))
        .map(|choice| choice - 1)
}

async fn read_line(prompt: String) -> DeckResult<String> {
    tokio::task::spawn_blocking(move || {
        let mut stderr = std::io::stderr();
        write!(stderr, "{}", prompt)?;
        stderr.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok::<_, DeckError>(line)
    })
    .await?
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
