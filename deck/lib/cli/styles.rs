use std::fmt::Write;

use clap::builder::styling::{AnsiColor, Effects, Style, Styles};

use crate::catalog::ResourceStatus;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

#[cfg(not(test))]
/// Whether stdout is an ANSI-capable interactive terminal.
static IS_ANSI_TERMINAL: std::sync::LazyLock<bool> =
    std::sync::LazyLock::new(deckutils::is_ansi_interactive_terminal);

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Applies the [`styles`] palette to text.
pub trait AnsiStyles {
    /// Section headers.
    fn header(&self) -> String;

    /// Commands and names the user can type.
    fn literal(&self) -> String;

    /// Secondary details.
    fn placeholder(&self) -> String;

    /// Failures.
    fn error(&self) -> String;

    /// Successes.
    fn valid(&self) -> String;

    /// Warnings and refusals.
    fn invalid(&self) -> String;
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The palette of the deck CLI.
pub fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Green.on_default() | Effects::BOLD)
        .invalid(AnsiColor::Red.on_default() | Effects::BOLD)
}

/// The style a catalog status is printed in.
pub fn status_style(status: ResourceStatus) -> Style {
    match status {
        ResourceStatus::Running => AnsiColor::Green.on_default() | Effects::BOLD,
        ResourceStatus::Ready | ResourceStatus::ImageBuilt => AnsiColor::Blue.on_default(),
        ResourceStatus::Stopped => AnsiColor::Yellow.on_default(),
        ResourceStatus::Unavailable => AnsiColor::Red.on_default(),
    }
}

/// Renders a catalog status, colored when printing to a terminal.
pub fn paint_status(status: ResourceStatus) -> String {
    paint(status.to_string(), &status_style(status))
}

fn paint(text: String, style: &Style) -> String {
    #[cfg(not(test))]
    if !*IS_ANSI_TERMINAL {
        return text;
    }

    #[cfg(test)]
    if std::env::var("TERM").unwrap_or_default() == "dumb" {
        return text;
    }

    let mut styled = String::with_capacity(text.len() + 16);
    let _ = write!(styled, "{}", style);
    styled.push_str(&text);
    let _ = write!(styled, "{}", style.render_reset());
    styled
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<T: AsRef<str> + ?Sized> AnsiStyles for T {
    fn header(&self) -> String {
        paint(self.as_ref().to_string(), styles().get_header())
    }

    fn literal(&self) -> String {
        paint(self.as_ref().to_string(), styles().get_literal())
    }

    fn placeholder(&self) -> String {
        paint(self.as_ref().to_string(), styles().get_placeholder())
    }

    fn error(&self) -> String {
        paint(self.as_ref().to_string(), styles().get_error())
    }

    fn valid(&self) -> String {
        paint(self.as_ref().to_string(), styles().get_valid())
    }

    fn invalid(&self) -> String {
        paint(self.as_ref().to_string(), styles().get_invalid())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_dumb_terminal_is_plain() {
        std::env::set_var("TERM", "dumb");
        assert_eq!("deck".header(), "deck");
        assert_eq!(String::from("failed").error(), "failed");
        assert_eq!(paint_status(ResourceStatus::Running), "running");
    }

    #[test]
    #[serial]
    fn test_colored_terminal_wraps_text() {
        std::env::set_var("TERM", "xterm-256color");
        let literal = "deck start".literal();
        assert!(literal.contains("\x1b[34m"));
        assert!(literal.contains("deck start"));
        assert!(literal.ends_with("\x1b[0m"));

        let running = paint_status(ResourceStatus::Running);
        assert!(running.contains("\x1b[32m"));
        std::env::set_var("TERM", "dumb");
    }
}
