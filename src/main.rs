use std::process::ExitCode;

mod app;
mod cache;
mod ci;
mod cli;
mod commands;
mod config;
mod dispatch;
mod errors;
mod http;
mod logger;
mod projection;
mod query;
mod reconcile;
mod render;
mod repl;
mod shell;
mod tracker;
mod types;
mod users;

#[cfg(test)]
mod test_support;

fn main() -> ExitCode {
    app::main()
}
