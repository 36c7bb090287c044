//! Command-line argument parsing for the headless client.

/// Options for a headless run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// WebSocket URL, overriding configuration
    pub url: Option<String>,
    /// Thread to switch to once started
    pub thread: Option<String>,
    /// Message to send on that thread once it is ready
    pub send: Option<String>,
}

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Connect and run until Ctrl-C (default)
    Run(RunOptions),
    /// Arguments could not be parsed
    Invalid(String),
}

pub const USAGE: &str = "Usage: agentsync [--url <ws-url>] [--thread <id>] [--send <text>]";

/// Parse command-line arguments and return the command to execute.
///
/// # Examples
///
/// ```
/// use agentsync::cli::args::{parse_args, CliCommand, RunOptions};
///
/// let args = vec!["agentsync".to_string(), "--thread".to_string(), "t1".to_string()];
/// assert_eq!(
///     parse_args(args.into_iter()),
///     CliCommand::Run(RunOptions {
///         thread: Some("t1".to_string()),
///         ..Default::default()
///     })
/// );
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    let mut options = RunOptions::default();
    // Skip the program name
    let mut args = args.skip(1);

    while let Some(arg) = args.next() {
        let slot = match arg.as_str() {
            "--version" | "-V" => return CliCommand::Version,
            "--help" | "-h" => return CliCommand::Help,
            "--url" => &mut options.url,
            "--thread" => &mut options.thread,
            "--send" => &mut options.send,
            other => return CliCommand::Invalid(format!("unknown argument: {}", other)),
        };
        match args.next() {
            Some(value) => *slot = Some(value),
            None => return CliCommand::Invalid(format!("{} needs a value", arg)),
        }
    }

    if options.send.is_some() && options.thread.is_none() {
        return CliCommand::Invalid("--send needs --thread".to_string());
    }
    CliCommand::Run(options)
}
