use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::SprintCache;
use crate::ci::{CiScheduleClient, GitLabClient};
use crate::cli::Cli;
use crate::commands::Session;
use crate::config::{load_config, Config};
use crate::dispatch::Dispatcher;
use crate::logger::{sanitize_log_value, Logger};
use crate::repl::{run_shell, ShellIo, TerminalShellIo};
use crate::tracker::{JiraClient, TrackerClient};

const DEFAULT_CONFIG_REL: &str = ".config/tracksh.yml";

#[derive(Debug)]
pub(crate) struct Quit {
    pub(crate) code: i32,
    #[allow(dead_code)]
    pub(crate) reason: String,
}

impl Quit {
    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code as u8)
    }
}

pub(crate) fn quit(logger: &Logger, reason: &str, code: i32) -> Quit {
    let sanitized = if reason.trim().is_empty() {
        "unknown".to_string()
    } else {
        sanitize_log_value(reason)
    };
    logger.log_event(&format!("quit reason={}", sanitized));
    Quit {
        code,
        reason: reason.to_string(),
    }
}

fn home_dir() -> Result<PathBuf, String> {
    env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| "Missing HOME environment variable".to_string())
}

fn bootstrap_config_error(default_path: &Path) -> String {
    format!(
        "Missing config file: {}\n\n\
A minimal config looks like:\n\
  tracker:\n\
    server: https://example.atlassian.net\n\
    username: me@example.com\n\
    token: env:JIRA_TOKEN\n\
    default_project: PROJ\n\
  field_map:\n\
    key: key\n\
    summary: fields.summary\n\
  ci:\n\
    token: env:GITLAB_TOKEN\n\
    project: group/testing\n\n\
To use a config at a non-default path, run:\n\
  tracksh --config PATH",
        default_path.display()
    )
}

/// Loads sprints before the first prompt. Failures only warn: the shell is
/// still useful for commands that do not need the cache.
pub(crate) fn startup_refresh(
    cache: &mut SprintCache,
    tracker: &dyn TrackerClient,
    logger: &Logger,
    io: &mut dyn ShellIo,
) {
    match cache.refresh(tracker, logger) {
        Ok(summary) => {
            let _ = io.write_out(&format!("fetched sprints ({})\n", summary));
        }
        Err(err) => logger.warn(&format!(
            "could not load sprints: {} (run load_sprints to retry)",
            err
        )),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SessionOptions {
    pub(crate) skip_refresh: bool,
    pub(crate) highlight: bool,
}

pub(crate) fn run_session(
    config: &Config,
    tracker: &dyn TrackerClient,
    ci: &dyn CiScheduleClient,
    logger: &Logger,
    options: SessionOptions,
    io: &mut dyn ShellIo,
    interrupted: &AtomicBool,
) -> Result<(), Quit> {
    let mut session = Session::new(config, tracker, ci, logger);
    session.highlight = options.highlight;
    if !options.skip_refresh {
        startup_refresh(&mut session.cache, tracker, logger, io);
    }
    let dispatcher = Dispatcher::new();
    run_shell(&mut session, &dispatcher, io, interrupted).map_err(|err| {
        let message = format!("shell I/O failed: {}", err);
        eprintln!("{}", message);
        quit(logger, &message, 1)
    })
}

pub(crate) fn run_with_cli(cli: Cli) -> Result<(), Quit> {
    let config_path_source_flag = cli.config.is_some();
    let home = home_dir().map_err(|message| Quit {
        code: 1,
        reason: message,
    })?;
    let default_config = home.join(DEFAULT_CONFIG_REL);
    let config_path = cli.config.unwrap_or_else(|| default_config.clone());

    if !config_path.is_file() {
        if config_path_source_flag {
            eprintln!("Missing config file: {}", config_path.display());
        } else {
            eprintln!("{}", bootstrap_config_error(&default_config));
        }
        return Err(Quit {
            code: 1,
            reason: format!("missing_config:{}", config_path.display()),
        });
    }

    let loaded = match load_config(&config_path) {
        Ok(loaded) => loaded,
        Err(message) => {
            eprintln!("{}", message);
            return Err(Quit {
                code: 1,
                reason: message,
            });
        }
    };
    let config = loaded.config;
    let logger = Logger::new(config.log_path.clone());
    logger.log_event(&format!(
        "session start config={} server={}",
        config_path.display(),
        config.tracker.server
    ));
    for warning in &loaded.warnings {
        logger.log_event(&format!("config warning {}", warning));
    }

    let tracker = JiraClient::new(
        &config.tracker.server,
        &config.tracker.username,
        &config.tracker.token,
    );
    let ci = GitLabClient::new(&config.ci.server, &config.ci.token);

    let interrupt_flag = Arc::new(AtomicBool::new(false));
    if let Err(err) = ctrlc::set_handler({
        let interrupt_flag = Arc::clone(&interrupt_flag);
        move || {
            interrupt_flag.store(true, Ordering::SeqCst);
        }
    }) {
        eprintln!("Failed to set interrupt handler: {}", err);
    }

    let mut io = TerminalShellIo::new();
    let highlight = io.stdout_is_terminal();
    if io.is_interactive() {
        let _ = io.write_out(&format!(
            "tracksh {} connected to {}. Type `help` for commands, Ctrl-D to leave.\n",
            env!("CARGO_PKG_VERSION"),
            config.tracker.server
        ));
    }

    let options = SessionOptions {
        skip_refresh: cli.skip_refresh,
        highlight,
    };
    let result = run_session(
        &config,
        &tracker,
        &ci,
        &logger,
        options,
        &mut io,
        &interrupt_flag,
    );
    logger.log_event("session end");
    result
}

pub(crate) fn run_with_args(args: Vec<OsString>) -> Result<(), Quit> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // clap's `Error::print()` uses termcolor and can bypass Rust's test output
            // capturing. Rendering it ourselves keeps CLI errors capture-friendly.
            if err.use_stderr() {
                eprintln!("{err}");
            } else {
                print!("{err}");
                return Ok(());
            }
            return Err(Quit {
                code: err.exit_code(),
                reason: "cli_parse".to_string(),
            });
        }
    };
    run_with_cli(cli)
}

pub(crate) fn main_with_args(args: Vec<OsString>) -> ExitCode {
    let result = run_with_args(args);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(quit) => quit.exit_code(),
    }
}

pub(crate) fn main() -> ExitCode {
    main_with_args(env::args_os().collect())
}
