//! Command-line arguments

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "stagesync - fetch, upload and archive experiment session data"
)]
pub struct Args {
    /// Settings file (default: ~/.config/stagesync/config.toml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Root data directory (overrides data_root from the settings file)
    #[arg(short = 'r', long)]
    pub dataroot: Option<PathBuf>,

    /// Audit log receiving one line per operation outcome
    #[arg(long = "log-file", default_value = "upload.log")]
    pub log_file: PathBuf,

    /// Audit log format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Skip the connectivity check
    #[arg(long)]
    pub offline: bool,

    /// Hide per-file copy progress
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Transfer EEG data from the host PC
    Host(SessionArgs),
    /// Upload all experimental data for a session, then archive the host data
    Experiment {
        #[command(flatten)]
        session: SessionArgs,
        #[command(flatten)]
        dest: DestArgs,
    },
    /// Upload imaging data
    Imaging(DirUploadArgs),
    /// Upload clinical EEG data
    Clinical(DirUploadArgs),
    /// Delete archived host data older than the retention lifetime
    Sweep {
        /// Override archive.lifetime_days
        #[arg(long)]
        lifetime_days: Option<i64>,
    },
    /// List subjects, experiments and sessions available for upload
    List {
        #[arg(short = 's', long)]
        subject: Option<String>,
        #[arg(short = 'x', long, requires = "subject")]
        experiment: Option<String>,
    },
    /// Show the transfer state of a session
    Status(SessionArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SessionArgs {
    /// Subject ID
    #[arg(short = 's', long)]
    pub subject: String,
    /// Experiment type
    #[arg(short = 'x', long)]
    pub experiment: String,
    /// Session number
    #[arg(short = 'n', long)]
    pub session: u32,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DestArgs {
    /// "Upload" into this existing local directory instead (for testing)
    #[arg(short = 'l', long = "local-dir")]
    pub local_dir: Option<PathBuf>,
    /// Remote destination as user@host:dir (overrides the settings file)
    #[arg(long)]
    pub dest: Option<String>,
    /// SSH key to use when uploading
    #[arg(short = 'k', long = "ssh-key")]
    pub ssh_key: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DirUploadArgs {
    /// Subject ID
    #[arg(short = 's', long)]
    pub subject: String,
    /// Directory to upload
    pub source: PathBuf,
    #[command(flatten)]
    pub dest: DestArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_experiment_upload() {
        let args = Args::parse_from([
            "stagesync", "--offline", "experiment", "-s", "R1111M", "-x", "FR1", "-n", "2",
            "--local-dir", "/tmp/out",
        ]);
        assert!(args.offline);
        match args.command {
            Command::Experiment { session, dest } => {
                assert_eq!(session.subject, "R1111M");
                assert_eq!(session.session, 2);
                assert_eq!(dest.local_dir, Some(PathBuf::from("/tmp/out")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn session_number_must_be_non_negative() {
        assert!(Args::try_parse_from(["stagesync", "host", "-s", "R1", "-x", "FR1", "-n", "-1"]).is_err());
    }
}
