//! Command table and argument parsing for the shell.
//!
//! Each command either has a clap grammar, parsed from the shell-quoted
//! tokens of the line, or takes the raw remainder of the line verbatim.
//! A line that does not fit the grammar never reaches a handler: the
//! command's usage is printed instead and the session carries on.

use clap::error::ErrorKind;
use clap::{ArgMatches, Args, Command, FromArgMatches};

use crate::commands::{
    AddToEpicArgs, AddToSprintArgs, AssignArgs, CannedSearch, CommentArgs, CreateArgs,
    Invocation, IssueArgs, LabelArgs, LoadSprintsArgs, MoveArgs, MySprintArgs, OpenArgs,
    ReleaseIssuesArgs, ReleasesArgs, RollSprintArgs, RunRegressionArgs, Session, ShowArgs,
    SprintsArgs, TransitionArgs,
};
use crate::errors::ShellError;
use crate::logger::sanitize_log_value;
use crate::repl::ShellIo;

type Build = fn(&ArgMatches) -> Result<Invocation, clap::Error>;

pub(crate) enum Syntax {
    Grammar { command: fn() -> Command, build: Build },
    Raw(fn(&str) -> Invocation),
}

pub(crate) struct CommandSpec {
    pub(crate) name: &'static str,
    pub(crate) about: &'static str,
    pub(crate) syntax: Syntax,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ParseOutcome {
    Parsed(Invocation),
    /// `--help` was requested; carries the rendered usage.
    Help(String),
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatched {
    Ran,
    Help,
    Usage,
    Unknown,
}

fn grammar_of<A: Args>() -> Command {
    A::augment_args(Command::new("command"))
}

fn structured<A: Args>(name: &'static str, about: &'static str, build: Build) -> CommandSpec {
    CommandSpec {
        name,
        about,
        syntax: Syntax::Grammar {
            command: grammar_of::<A>,
            build,
        },
    }
}

fn raw(name: &'static str, about: &'static str, build: fn(&str) -> Invocation) -> CommandSpec {
    CommandSpec {
        name,
        about,
        syntax: Syntax::Raw(build),
    }
}

/// Every shell command, in the order `help` lists them.
pub(crate) fn command_table() -> Vec<CommandSpec> {
    vec![
        structured::<LoadSprintsArgs>(
            "load_sprints",
            "Refresh the board and sprint cache.",
            |m| LoadSprintsArgs::from_arg_matches(m).map(Invocation::LoadSprints),
        ),
        structured::<SprintsArgs>(
            "sprints",
            "List open issues of the current sprint for an assignee.",
            |m| SprintsArgs::from_arg_matches(m).map(Invocation::Sprints),
        ),
        raw(
            "current_sprint",
            "List open issues of the current sprint, ANDed with an optional predicate.",
            |line| Invocation::CurrentSprint(line.to_string()),
        ),
        structured::<MySprintArgs>(
            "mysprint",
            "List my issues in the current sprint.",
            |m| MySprintArgs::from_arg_matches(m).map(Invocation::MySprint),
        ),
        raw("search", "Run a free-form query.", |line| {
            Invocation::Search(line.to_string())
        }),
        raw("recentlyviewed", "Issues I viewed recently.", |_| {
            Invocation::Canned(CannedSearch::RecentlyViewed)
        }),
        raw("recentlyviewedopen", "Open issues I viewed recently.", |_| {
            Invocation::Canned(CannedSearch::RecentlyViewedOpen)
        }),
        raw(
            "myrecentlyviewedopen",
            "Open issues assigned to me that I viewed recently.",
            |_| Invocation::Canned(CannedSearch::MyRecentlyViewedOpen),
        ),
        raw("recentlycreated", "Recently created open issues.", |_| {
            Invocation::Canned(CannedSearch::RecentlyCreated)
        }),
        raw(
            "myrecentlycreated",
            "Recently created open issues assigned to me.",
            |_| Invocation::Canned(CannedSearch::MyRecentlyCreated),
        ),
        raw("reportedbyme", "Issues I reported.", |_| {
            Invocation::Canned(CannedSearch::ReportedByMe)
        }),
        structured::<ShowArgs>("show", "Show an issue's mapped fields.", |m| {
            ShowArgs::from_arg_matches(m).map(Invocation::Show)
        }),
        structured::<CreateArgs>("create", "Create an issue.", |m| {
            CreateArgs::from_arg_matches(m).map(Invocation::Create)
        }),
        structured::<OpenArgs>("open", "Open an issue in the browser.", |m| {
            OpenArgs::from_arg_matches(m).map(Invocation::Open)
        }),
        structured::<RollSprintArgs>(
            "roll_sprint",
            "Close the current sprint and start the next one.",
            |m| RollSprintArgs::from_arg_matches(m).map(Invocation::RollSprint),
        ),
        structured::<IssueArgs>("delete", "Delete an issue.", |m| {
            IssueArgs::from_arg_matches(m).map(Invocation::Delete)
        }),
        structured::<IssueArgs>("clone", "Copy an issue.", |m| {
            IssueArgs::from_arg_matches(m).map(Invocation::Clone)
        }),
        structured::<MoveArgs>("move", "Copy an issue into another project.", |m| {
            MoveArgs::from_arg_matches(m).map(Invocation::Move)
        }),
        structured::<AssignArgs>("assign", "Assign an issue.", |m| {
            AssignArgs::from_arg_matches(m).map(Invocation::Assign)
        }),
        structured::<CommentArgs>("comment", "Comment on an issue; @alias mentions a user.", |m| {
            CommentArgs::from_arg_matches(m).map(Invocation::Comment)
        }),
        structured::<IssueArgs>("comments", "Show the comments of an issue.", |m| {
            IssueArgs::from_arg_matches(m).map(Invocation::Comments)
        }),
        structured::<TransitionArgs>(
            "transition",
            "Move an issue through a configured transition and comment on it.",
            |m| TransitionArgs::from_arg_matches(m).map(Invocation::Transition),
        ),
        structured::<LabelArgs>("label", "Add labels to an issue.", |m| {
            LabelArgs::from_arg_matches(m).map(Invocation::Label)
        }),
        structured::<AddToEpicArgs>("add_to_epic", "Add issues to an epic.", |m| {
            AddToEpicArgs::from_arg_matches(m).map(Invocation::AddToEpic)
        }),
        structured::<AddToSprintArgs>("add_to_sprint", "Add issues to a sprint.", |m| {
            AddToSprintArgs::from_arg_matches(m).map(Invocation::AddToSprint)
        }),
        structured::<ReleasesArgs>("releases", "List a project's releases.", |m| {
            ReleasesArgs::from_arg_matches(m).map(Invocation::Releases)
        }),
        structured::<ReleaseIssuesArgs>("release_issues", "List the issues of a release.", |m| {
            ReleaseIssuesArgs::from_arg_matches(m).map(Invocation::ReleaseIssues)
        }),
        structured::<RunRegressionArgs>(
            "run_regression",
            "Schedule the regression pipeline for a release's issues.",
            |m| RunRegressionArgs::from_arg_matches(m).map(Invocation::RunRegression),
        ),
    ]
}

impl CommandSpec {
    fn grammar(&self, command: fn() -> Command) -> Command {
        command()
            .name(self.name)
            .bin_name(self.name)
            .about(self.about)
            .no_binary_name(true)
            .disable_version_flag(true)
            .color(clap::ColorChoice::Never)
    }

    pub(crate) fn parse(&self, line: &str) -> ParseOutcome {
        match &self.syntax {
            Syntax::Raw(build) => {
                let trimmed = line.trim();
                if trimmed == "-h" || trimmed == "--help" {
                    return ParseOutcome::Help(self.usage());
                }
                ParseOutcome::Parsed(build(trimmed))
            }
            Syntax::Grammar { command, build } => {
                let tokens = match shell_words::split(line) {
                    Ok(tokens) => tokens,
                    Err(err) => return ParseOutcome::Invalid(err.to_string()),
                };
                let matches = match self.grammar(*command).try_get_matches_from(tokens) {
                    Ok(matches) => matches,
                    Err(err) => {
                        return match err.kind() {
                            ErrorKind::DisplayHelp
                            | ErrorKind::DisplayVersion
                            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                                ParseOutcome::Help(err.render().to_string())
                            }
                            _ => ParseOutcome::Invalid(first_line(&err.render().to_string())),
                        }
                    }
                };
                match build(&matches) {
                    Ok(invocation) => ParseOutcome::Parsed(invocation),
                    Err(err) => ParseOutcome::Invalid(first_line(&err.render().to_string())),
                }
            }
        }
    }

    /// The help text a bare `--help` would print.
    pub(crate) fn usage(&self) -> String {
        match &self.syntax {
            Syntax::Raw(_) => format!("{}\n\nUsage: {} [TEXT]\n", self.about, self.name),
            Syntax::Grammar { command, .. } => self.grammar(*command).render_help().to_string(),
        }
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_string()
}

pub(crate) struct Dispatcher {
    table: Vec<CommandSpec>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self {
            table: command_table(),
        }
    }

    pub(crate) fn find(&self, name: &str) -> Option<&CommandSpec> {
        self.table.iter().find(|spec| spec.name == name)
    }

    pub(crate) fn commands(&self) -> impl Iterator<Item = &CommandSpec> {
        self.table.iter()
    }

    /// Parses and runs one command line. Parse failures print the command's
    /// usage and return `Dispatched::Usage`; handler errors propagate.
    pub(crate) fn dispatch(
        &self,
        session: &mut Session<'_>,
        io: &mut dyn ShellIo,
        name: &str,
        args: &str,
    ) -> Result<Dispatched, ShellError> {
        let Some(spec) = self.find(name) else {
            return Ok(Dispatched::Unknown);
        };
        match spec.parse(args) {
            ParseOutcome::Parsed(invocation) => {
                session.logger.log_event(&format!(
                    "cmd start name={} args={}",
                    name,
                    sanitize_log_value(args.trim())
                ));
                let result = session.execute(invocation, io);
                session.logger.log_event(&format!(
                    "cmd end name={} result={}",
                    name,
                    if result.is_ok() { "ok" } else { "error" }
                ));
                result.map(|()| Dispatched::Ran)
            }
            ParseOutcome::Help(text) => {
                io.write_out(&text)?;
                Ok(Dispatched::Help)
            }
            ParseOutcome::Invalid(error) => {
                session.logger.log_event(&format!(
                    "cmd usage name={} error={}",
                    name,
                    sanitize_log_value(&error)
                ));
                io.write_err(&format!("{}\n", error))?;
                let text = match spec.parse("--help") {
                    ParseOutcome::Help(text) => text,
                    _ => spec.usage(),
                };
                io.write_out(&text)?;
                Ok(Dispatched::Usage)
            }
        }
    }
}
