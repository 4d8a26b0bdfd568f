//! Parsed shell commands and the session state they run against.

use clap::{Args, ValueEnum};

use crate::cache::SprintCache;
use crate::ci::CiScheduleClient;
use crate::config::Config;
use crate::errors::ShellError;
use crate::logger::Logger;
use crate::repl::ShellIo;
use crate::tracker::TrackerClient;
use crate::types::{IssueType, Sprint};
use crate::users::UserResolver;

mod issues;
mod releases;
mod searches;
mod sprints;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Invocation {
    LoadSprints(LoadSprintsArgs),
    Sprints(SprintsArgs),
    CurrentSprint(String),
    MySprint(MySprintArgs),
    Search(String),
    Canned(CannedSearch),
    Show(ShowArgs),
    Create(CreateArgs),
    Open(OpenArgs),
    RollSprint(RollSprintArgs),
    Delete(IssueArgs),
    Clone(IssueArgs),
    Move(MoveArgs),
    Assign(AssignArgs),
    Comment(CommentArgs),
    Comments(IssueArgs),
    Transition(TransitionArgs),
    Label(LabelArgs),
    AddToEpic(AddToEpicArgs),
    AddToSprint(AddToSprintArgs),
    Releases(ReleasesArgs),
    ReleaseIssues(ReleaseIssuesArgs),
    RunRegression(RunRegressionArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CannedSearch {
    RecentlyViewed,
    RecentlyViewedOpen,
    MyRecentlyViewedOpen,
    RecentlyCreated,
    MyRecentlyCreated,
    ReportedByMe,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct LoadSprintsArgs {
    /// List every board with its sprints after refreshing.
    #[arg(short = 'v', long = "verbose")]
    pub(crate) verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct SprintsArgs {
    /// Only issues of this project.
    #[arg(short = 'p', long = "project", value_name = "PROJECT")]
    pub(crate) project: Option<String>,

    /// Assignee account id, alias, or a function such as currentUser().
    #[arg(
        short = 'a',
        long = "assignee",
        value_name = "USER",
        default_value = "currentUser()"
    )]
    pub(crate) assignee: String,

    /// Only issues of this type.
    #[arg(short = 't', long = "issuetype", value_name = "TYPE", value_parser = IssueType::NAMES)]
    pub(crate) issuetype: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct MySprintArgs {
    /// Include issues in every status.
    #[arg(long = "all")]
    pub(crate) all: bool,

    /// Extra predicate ANDed to the query, e.g. "labels = sdk".
    #[arg(value_name = "QUERY")]
    pub(crate) query: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct ShowArgs {
    #[arg(value_name = "ID")]
    pub(crate) id: String,

    #[arg(short = 'o', long = "output", value_enum, default_value_t = OutputFormat::Yaml)]
    pub(crate) output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct CreateArgs {
    #[arg(value_name = "SUMMARY")]
    pub(crate) summary: String,

    #[arg(value_name = "DESCRIPTION")]
    pub(crate) description: String,

    /// Project key; defaults to tracker.default_project.
    #[arg(short = 'p', long = "project", value_name = "PROJECT")]
    pub(crate) project: Option<String>,

    #[arg(short = 'a', long = "assignee", value_name = "USER")]
    pub(crate) assignee: Option<String>,

    #[arg(
        short = 't',
        long = "issuetype",
        value_name = "TYPE",
        default_value = "task",
        value_parser = IssueType::NAMES
    )]
    pub(crate) issuetype: String,

    /// Epic name, required when creating an epic.
    #[arg(short = 'e', long = "epicname", value_name = "NAME")]
    pub(crate) epicname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct OpenArgs {
    #[arg(value_name = "ID")]
    pub(crate) id: String,

    /// Browser command line; the issue URL is appended as the last argument.
    #[arg(long = "browser", value_name = "COMMAND", default_value = "xdg-open")]
    pub(crate) browser: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct RollSprintArgs {
    /// Do not ask for confirmation.
    #[arg(short = 'y', long = "yes")]
    pub(crate) yes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct IssueArgs {
    #[arg(value_name = "ID")]
    pub(crate) id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct MoveArgs {
    #[arg(value_name = "ID")]
    pub(crate) id: String,

    #[arg(value_name = "PROJECT")]
    pub(crate) project: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct AssignArgs {
    #[arg(value_name = "ID")]
    pub(crate) id: String,

    #[arg(value_name = "NICK")]
    pub(crate) nick: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct CommentArgs {
    #[arg(value_name = "ID")]
    pub(crate) id: String,

    #[arg(value_name = "COMMENT")]
    pub(crate) comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct TransitionArgs {
    #[arg(value_name = "ID")]
    pub(crate) id: String,

    /// A name from the transitions section of the config.
    #[arg(value_name = "TRANSITION")]
    pub(crate) transition: String,

    #[arg(value_name = "COMMENT")]
    pub(crate) comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct LabelArgs {
    #[arg(value_name = "ID")]
    pub(crate) id: String,

    /// Comma-separated labels to add.
    #[arg(value_name = "LABELS")]
    pub(crate) labels: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct AddToEpicArgs {
    #[arg(value_name = "EPIC")]
    pub(crate) epic: String,

    #[arg(value_name = "ID", required = true)]
    pub(crate) ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct AddToSprintArgs {
    /// `current`, a sprint id, or a sprint name.
    #[arg(value_name = "SPRINT")]
    pub(crate) sprint: String,

    #[arg(value_name = "ID", required = true)]
    pub(crate) ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct ReleasesArgs {
    #[arg(value_name = "PROJECT")]
    pub(crate) project: String,

    /// Include released versions.
    #[arg(long = "all")]
    pub(crate) all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct ReleaseIssuesArgs {
    #[arg(value_name = "RELEASE")]
    pub(crate) release: String,

    #[arg(short = 'p', long = "project", value_name = "PROJECT")]
    pub(crate) project: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub(crate) struct RunRegressionArgs {
    #[arg(value_name = "RELEASE")]
    pub(crate) release: String,

    /// Also list the tickets grouped by project.
    #[arg(short = 'v', long = "verbose")]
    pub(crate) verbose: bool,
}

/// Everything a command can touch: configuration, the remote clients, the
/// sprint cache, and the session log.
pub(crate) struct Session<'a> {
    pub(crate) config: &'a Config,
    pub(crate) tracker: &'a dyn TrackerClient,
    pub(crate) ci: &'a dyn CiScheduleClient,
    pub(crate) cache: SprintCache,
    pub(crate) users: UserResolver,
    pub(crate) logger: &'a Logger,
    /// Colour YAML output; only set when stdout is a terminal.
    pub(crate) highlight: bool,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        config: &'a Config,
        tracker: &'a dyn TrackerClient,
        ci: &'a dyn CiScheduleClient,
        logger: &'a Logger,
    ) -> Self {
        Self {
            config,
            tracker,
            ci,
            cache: SprintCache::new(),
            users: UserResolver::new(config.users.clone()),
            logger,
            highlight: false,
        }
    }

    pub(crate) fn execute(
        &mut self,
        invocation: Invocation,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        match invocation {
            Invocation::LoadSprints(args) => self.load_sprints(&args, io),
            Invocation::Sprints(args) => self.sprints(&args, io),
            Invocation::CurrentSprint(predicate) => self.current_sprint(&predicate, io),
            Invocation::MySprint(args) => self.my_sprint(&args, io),
            Invocation::Search(text) => self.search(&text, io),
            Invocation::Canned(kind) => self.canned_search(kind, io),
            Invocation::Show(args) => self.show(&args, io),
            Invocation::Create(args) => self.create(&args, io),
            Invocation::Open(args) => self.open(&args, io),
            Invocation::RollSprint(args) => self.roll_sprint(&args, io),
            Invocation::Delete(args) => self.delete(&args.id, io),
            Invocation::Clone(args) => self.clone_issue(&args.id, None, io),
            Invocation::Move(args) => self.clone_issue(&args.id, Some(&args.project), io),
            Invocation::Assign(args) => self.assign(&args, io),
            Invocation::Comment(args) => self.comment(&args, io),
            Invocation::Comments(args) => self.comments(&args.id, io),
            Invocation::Transition(args) => self.transition(&args, io),
            Invocation::Label(args) => self.label(&args, io),
            Invocation::AddToEpic(args) => self.add_to_epic(&args, io),
            Invocation::AddToSprint(args) => self.add_to_sprint(&args, io),
            Invocation::Releases(args) => self.releases(&args, io),
            Invocation::ReleaseIssues(args) => self.release_issues(&args, io),
            Invocation::RunRegression(args) => self.run_regression(&args, io),
        }
    }

    /// The current working sprint, or a usage error asking for a refresh.
    pub(crate) fn active_sprint(&self) -> Result<Sprint, ShellError> {
        self.cache
            .current_active_sprint()
            .cloned()
            .ok_or_else(|| ShellError::usage("no active sprint found (run load_sprints?)"))
    }

    fn load_sprints(
        &mut self,
        args: &LoadSprintsArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let summary = self.cache.refresh(self.tracker, self.logger)?;
        io.write_out(&format!("fetched sprints ({})\n", summary))?;
        if !args.verbose {
            return Ok(());
        }
        for (board, sprints) in self.cache.boards() {
            io.write_out(&format!("{}\n", board))?;
            if sprints.is_empty() {
                io.write_out("  (no sprints)\n")?;
            }
            for sprint in sprints.iter() {
                io.write_out(&format!("  {} [{}]\n", sprint, sprint.state))?;
            }
        }
        Ok(())
    }
}
