//! Module containing terminal utilities

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Determines if the process is running in an interactive terminal environment
pub fn is_interactive_terminal() -> bool {
    let is_tty = stdio_is_tty();

    // Optional enhancement: check for TERM, but don't require it
    let has_term = std::env::var("TERM").is_ok();
    if is_tty && !has_term {
        tracing::debug!("detected TTY without TERM environment variable");
    }

    is_tty
}

/// Determines if the terminal can render ANSI escape sequences.
pub fn is_ansi_interactive_terminal() -> bool {
    is_interactive_terminal()
        && std::env::var("TERM").map_or(true, |term| term != "dumb")
        && std::env::var_os("NO_COLOR").is_none()
}

#[cfg(unix)]
fn stdio_is_tty() -> bool {
    // Both stdin and stdout must be TTYs
    let stdin_is_tty = unsafe { libc::isatty(libc::STDIN_FILENO) == 1 };
    let stdout_is_tty = unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 };
    stdin_is_tty && stdout_is_tty
}

#[cfg(not(unix))]
fn stdio_is_tty() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}
