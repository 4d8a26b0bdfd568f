use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "tracksh",
    version,
    about = "An interactive shell for the ticket tracker.",
    long_about = "tracksh connects to the ticket tracker and CI server named in its config and reads commands line by line.\n\nType `help` at the prompt for the list of commands. Commands can also be piped in on stdin."
)]
pub(crate) struct Cli {
    /// Load configuration from PATH instead of ~/.config/tracksh.yml.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "PATH",
        help = "Load configuration from PATH instead of ~/.config/tracksh.yml."
    )]
    pub(crate) config: Option<PathBuf>,

    /// Start without fetching boards and sprints; run `load_sprints` later.
    #[arg(
        long = "skip-refresh",
        help = "Start without fetching boards and sprints; run `load_sprints` later."
    )]
    pub(crate) skip_refresh: bool,
}
