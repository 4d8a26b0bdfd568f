//! Board → sprint cache, rebuilt wholesale from the tracker.

use std::fmt;

use crate::errors::RemoteError;
use crate::logger::{sanitize_log_value, Logger};
use crate::tracker::TrackerClient;
use crate::types::{BoardKey, Sprint, SprintRef};

/// Insertion-ordered sprint-name → sprint mapping of one board.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SprintMap {
    sprints: Vec<Sprint>,
}

impl SprintMap {
    /// Duplicate names keep their first position and take the latest value.
    pub(crate) fn insert(&mut self, sprint: Sprint) {
        match self.sprints.iter_mut().find(|existing| existing.name == sprint.name) {
            Some(slot) => *slot = sprint,
            None => self.sprints.push(sprint),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Sprint> {
        self.sprints.iter().find(|sprint| sprint.name == name)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Sprint> {
        self.sprints.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.sprints.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sprints.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct RefreshSummary {
    pub(crate) boards: usize,
    pub(crate) sprints: usize,
    pub(crate) failed_boards: usize,
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} boards, {} sprints", self.boards, self.sprints)?;
        if self.failed_boards > 0 {
            write!(f, ", {} boards failed", self.failed_boards)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct SprintCache {
    boards: Vec<(BoardKey, SprintMap)>,
}

impl SprintCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fetches every board and its sprints, then swaps the result in.
    ///
    /// A board whose sprints cannot be fetched is kept with an empty mapping
    /// and a warning; failing to list boards leaves the cache untouched.
    pub(crate) fn refresh(
        &mut self,
        tracker: &dyn TrackerClient,
        logger: &Logger,
    ) -> Result<RefreshSummary, RemoteError> {
        let boards = tracker.boards()?;
        let mut rebuilt: Vec<(BoardKey, SprintMap)> = Vec::with_capacity(boards.len());
        let mut summary = RefreshSummary::default();

        for board in boards {
            let key = board.key();
            let mut sprint_map = SprintMap::default();
            match tracker.sprints(board.id) {
                Ok(sprints) => {
                    for mut sprint in sprints {
                        sprint.board_id.get_or_insert(board.id);
                        sprint_map.insert(sprint);
                    }
                    logger.log_event(&format!(
                        "refresh board={} sprints={}",
                        board.id,
                        sprint_map.len()
                    ));
                }
                Err(err) => {
                    summary.failed_boards += 1;
                    logger.warn(&format!(
                        "error getting sprints for board {}: {}",
                        key,
                        sanitize_log_value(&err.to_string())
                    ));
                }
            }
            summary.sprints += sprint_map.len();
            match rebuilt.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = sprint_map,
                None => rebuilt.push((key, sprint_map)),
            }
        }

        summary.boards = rebuilt.len();
        self.boards = rebuilt;
        Ok(summary)
    }

    pub(crate) fn boards(&self) -> impl Iterator<Item = (&BoardKey, &SprintMap)> {
        self.boards.iter().map(|(key, map)| (key, map))
    }

    fn all_sprints(&self) -> impl Iterator<Item = &Sprint> {
        self.boards.iter().flat_map(|(_, map)| map.iter())
    }

    /// First active, non-QA sprint scanning boards then sprints in insertion order.
    pub(crate) fn current_active_sprint(&self) -> Option<&Sprint> {
        self.all_sprints().find(|sprint| sprint.is_working_sprint())
    }

    pub(crate) fn find_by_name(&self, name: &str) -> Option<&Sprint> {
        self.boards.iter().find_map(|(_, map)| map.get(name))
    }

    /// Resolves a command-line sprint reference to a sprint id. Numeric ids
    /// are trusted as-is since the sprint may belong to an uncached board.
    pub(crate) fn resolve(&self, reference: &SprintRef) -> Option<u64> {
        match reference {
            SprintRef::Current => self.current_active_sprint().map(|sprint| sprint.id),
            SprintRef::Id(id) => Some(*id),
            SprintRef::Name(name) => self.find_by_name(name).map(|sprint| sprint.id),
        }
    }
}
