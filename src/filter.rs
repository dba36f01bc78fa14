use itertools::Itertools;

use crate::grid::{Day, TimetableEntry};

/// Display projection: whole week or a single day. Never a mutation and
/// never a network round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    Week,
    Day(Day),
}

impl ViewMode {
    pub fn label(self) -> String {
        match self {
            ViewMode::Week => "Week".to_string(),
            ViewMode::Day(day) => day.to_string(),
        }
    }
}

/// Which entry attribute a filter selects on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum FilterKind {
    Batch,
    Faculty,
    Room,
}

/// Independent selectors combined with logical AND.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSet {
    pub batch: Option<String>,
    pub faculty: Option<String>,
    pub room: Option<String>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.batch.is_none() && self.faculty.is_none() && self.room.is_none()
    }

    pub fn clear(&mut self) {
        *self = FilterSet::default();
    }

    pub fn get(&self, kind: FilterKind) -> Option<&String> {
        match kind {
            FilterKind::Batch => self.batch.as_ref(),
            FilterKind::Faculty => self.faculty.as_ref(),
            FilterKind::Room => self.room.as_ref(),
        }
    }

    pub fn set(&mut self, kind: FilterKind, value: Option<String>) {
        match kind {
            FilterKind::Batch => self.batch = value,
            FilterKind::Faculty => self.faculty = value,
            FilterKind::Room => self.room = value,
        }
    }

    pub fn matches(&self, entry: &TimetableEntry) -> bool {
        self.batch.as_ref().is_none_or(|b| *b == entry.batch)
            && self.faculty.as_ref().is_none_or(|f| *f == entry.faculty)
            && self.room.as_ref().is_none_or(|r| *r == entry.room)
    }

    /// Advance one selector through its option list: None → first → … → None.
    pub fn cycle(&mut self, kind: FilterKind, options: &[String]) {
        let next = match self.get(kind) {
            None => options.first().cloned(),
            Some(current) => options
                .iter()
                .position(|o| o == current)
                .and_then(|i| options.get(i + 1))
                .cloned(),
        };
        self.set(kind, next);
    }
}

/// Project the entry list through the active filters and view mode.
pub fn visible<'a>(
    entries: impl IntoIterator<Item = &'a TimetableEntry>,
    filters: &FilterSet,
    view: ViewMode,
) -> Vec<&'a TimetableEntry> {
    entries
        .into_iter()
        .filter(|e| filters.matches(e))
        .filter(|e| match view {
            ViewMode::Week => true,
            ViewMode::Day(day) => e.position.day == day.index(),
        })
        .collect()
}

/// Distinct values for one selector, ordered.
pub fn options<'a>(
    entries: impl IntoIterator<Item = &'a TimetableEntry>,
    kind: FilterKind,
) -> Vec<String> {
    entries
        .into_iter()
        .map(|e| match kind {
            FilterKind::Batch => e.batch.clone(),
            FilterKind::Faculty => e.faculty.clone(),
            FilterKind::Room => e.room.clone(),
        })
        .sorted()
        .dedup()
        .collect()
}
