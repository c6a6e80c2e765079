use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;

/// Message reported when no recording path is given.
pub const MISSING_AUDIO_PATH: &str = "请提供音频文件路径";

/// Vocal Analyzer - acoustic quality scoring for vocal recordings
///
/// Prints one JSON line with pitch, rhythm, voice, timbre and energy
/// features plus weighted scores.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "vocal-analyzer", version)]
pub struct Cli {
    /// Recording to analyse (WAV, MP3, FLAC, OGG, M4A, ...)
    #[arg(value_name = "AUDIO")]
    pub audio_path: PathBuf,

    /// Optional reference recording to compare against
    #[arg(value_name = "REFERENCE")]
    pub reference_path: Option<PathBuf>,

    /// Further positional arguments are accepted and ignored
    #[arg(value_name = "IGNORED", hide = true)]
    pub ignored: Vec<PathBuf>,

    /// JSON file overriding scoring weights, tier thresholds or transcoder settings
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug)]
pub enum Invocation {
    Run(Cli),
    /// `--help` or `--version`: clap renders the text itself.
    Informational(clap::Error),
    /// Bad arguments, reported as a failure record.
    Invalid(String),
}

pub fn parse_args<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Invocation::Run(cli),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => Invocation::Informational(err),
            ErrorKind::MissingRequiredArgument => Invocation::Invalid(MISSING_AUDIO_PATH.to_string()),
            _ => Invocation::Invalid(summary(&err)),
        },
    }
}

/// First line of clap's rendered error, without the `error: ` prefix.
fn summary(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).trim().to_string()
}
