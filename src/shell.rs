use shell_escape::unix::escape;
use std::env;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::errors::ShellError;
use crate::logger::{sanitize_log_value, Logger};

pub(crate) fn render_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn command_exists(name: &str) -> bool {
    if name.contains('/') {
        return Path::new(name).is_file();
    }
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|path| {
        let full = path.join(name);
        full.is_file() || full.is_symlink()
    })
}

/// Splits the configured browser command line and appends the URL.
pub(crate) fn browser_argv(browser: &str, url: &str) -> Result<Vec<String>, ShellError> {
    let mut argv = shell_words::split(browser)
        .map_err(|err| ShellError::usage(format!("invalid --browser {:?}: {}", browser, err)))?;
    if argv.is_empty() {
        return Err(ShellError::usage("--browser must not be empty"));
    }
    argv.push(url.to_string());
    Ok(argv)
}

/// Starts the browser detached from the shell's terminal streams.
pub(crate) fn launch_browser(browser: &str, url: &str, logger: &Logger) -> Result<(), ShellError> {
    let argv = browser_argv(browser, url)?;
    if !command_exists(&argv[0]) {
        return Err(ShellError::usage(format!(
            "browser command not found: {}",
            argv[0]
        )));
    }
    logger.log_event(&format!(
        "browser launch command={}",
        sanitize_log_value(&render_args(&argv))
    ));
    Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}
