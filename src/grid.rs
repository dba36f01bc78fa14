use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Days the rendered grid can cover, in display order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn from_index(idx: u8) -> Option<Day> {
        Day::ALL.get(idx as usize).copied()
    }

    pub fn index(self) -> u8 {
        Day::ALL.iter().position(|d| *d == self).unwrap_or(0) as u8
    }

    pub fn short(self) -> &'static str {
        match self {
            Day::Monday => "Mon",
            Day::Tuesday => "Tue",
            Day::Wednesday => "Wed",
            Day::Thursday => "Thu",
            Day::Friday => "Fri",
            Day::Saturday => "Sat",
        }
    }
}

pub type EntryId = u64;

/// Grid location as (day index, period index); unique per rendered grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub day: u8,
    pub period: u8,
}

impl Position {
    pub fn new(day: u8, period: u8) -> Self {
        Self { day, period }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Day::from_index(self.day) {
            Some(day) => write!(f, "{} P{}", day.short(), self.period + 1),
            None => write!(f, "D{} P{}", self.day + 1, self.period + 1),
        }
    }
}

/// The scheduled assignment occupying a cell. Canonically owned by the
/// server; the client holds a read-through cached projection only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub id: EntryId,
    pub course: String,
    pub faculty: String,
    pub room: String,
    pub batch: String,
    pub position: Position,
}

/// One (day, period) slot in the rendered grid.
#[derive(Clone, Debug, PartialEq)]
pub struct TimetableCell {
    pub position: Position,
    pub entry_id: Option<EntryId>,
    pub editable: bool,
}

impl TimetableCell {
    pub fn occupied(&self) -> bool {
        self.entry_id.is_some()
    }
}

/// Canonical cell representation as returned by the mutation endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellState {
    pub position: Position,
    pub entry: Option<TimetableEntry>,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("position {0} is outside the grid")]
    OutOfBounds(Position),
    #[error("cell {0} is already occupied")]
    Occupied(Position),
    #[error("unknown entry {0}")]
    UnknownEntry(EntryId),
}

/// In-memory projection of one template's timetable. Mutated only through
/// the editing session's apply steps; replaced wholesale on reload.
#[derive(Clone, Debug, PartialEq)]
pub struct TimetableGrid {
    days: u8,
    periods: u8,
    period_times: Vec<(NaiveTime, NaiveTime)>,
    cells: Vec<TimetableCell>,
    entries: BTreeMap<EntryId, TimetableEntry>,
}

impl TimetableGrid {
    pub fn new(days: u8, periods: u8) -> Self {
        let mut cells = Vec::with_capacity(days as usize * periods as usize);
        for day in 0..days {
            for period in 0..periods {
                cells.push(TimetableCell {
                    position: Position::new(day, period),
                    entry_id: None,
                    editable: true,
                });
            }
        }
        Self {
            days,
            periods,
            period_times: Vec::new(),
            cells,
            entries: BTreeMap::new(),
        }
    }

    pub fn days(&self) -> u8 {
        self.days
    }

    pub fn periods(&self) -> u8 {
        self.periods
    }

    pub fn set_period_times(&mut self, times: Vec<(NaiveTime, NaiveTime)>) {
        self.period_times = times;
    }

    pub fn period_time(&self, period: u8) -> Option<(NaiveTime, NaiveTime)> {
        self.period_times.get(period as usize).copied()
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.day < self.days && pos.period < self.periods
    }

    fn cell_index(&self, pos: Position) -> Option<usize> {
        if self.contains(pos) {
            Some(pos.day as usize * self.periods as usize + pos.period as usize)
        } else {
            None
        }
    }

    pub fn cell(&self, pos: Position) -> Option<&TimetableCell> {
        self.cell_index(pos).map(|i| &self.cells[i])
    }

    fn cell_mut(&mut self, pos: Position) -> Option<&mut TimetableCell> {
        self.cell_index(pos).map(move |i| &mut self.cells[i])
    }

    pub fn set_editable(&mut self, pos: Position, editable: bool) {
        if let Some(cell) = self.cell_mut(pos) {
            cell.editable = editable;
        }
    }

    pub fn entry(&self, id: EntryId) -> Option<&TimetableEntry> {
        self.entries.get(&id)
    }

    pub fn entry_at(&self, pos: Position) -> Option<&TimetableEntry> {
        self.cell(pos)
            .and_then(|c| c.entry_id)
            .and_then(|id| self.entries.get(&id))
    }

    pub fn entries(&self) -> impl Iterator<Item = &TimetableEntry> {
        self.entries.values()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.occupied()).count()
    }

    /// Place an entry during initial load. At most one entry per slot.
    pub fn place(&mut self, entry: TimetableEntry) -> Result<(), GridError> {
        let pos = entry.position;
        let cell = self.cell(pos).ok_or(GridError::OutOfBounds(pos))?;
        if cell.occupied() {
            return Err(GridError::Occupied(pos));
        }
        let id = entry.id;
        self.entries.insert(id, entry);
        if let Some(cell) = self.cell_mut(pos) {
            cell.entry_id = Some(id);
        }
        Ok(())
    }

    /// Relocate an entry into an empty cell. The source cell becomes empty.
    pub fn apply_move(&mut self, id: EntryId, to: Position) -> Result<(), GridError> {
        let from = self.entries.get(&id).ok_or(GridError::UnknownEntry(id))?.position;
        let target = self.cell(to).ok_or(GridError::OutOfBounds(to))?;
        if target.occupied() {
            return Err(GridError::Occupied(to));
        }
        if let Some(cell) = self.cell_mut(from) {
            cell.entry_id = None;
        }
        if let Some(cell) = self.cell_mut(to) {
            cell.entry_id = Some(id);
        }
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.position = to;
        }
        Ok(())
    }

    /// Exchange the positions of two entries.
    pub fn apply_swap(&mut self, a: EntryId, b: EntryId) -> Result<(), GridError> {
        let pos_a = self.entries.get(&a).ok_or(GridError::UnknownEntry(a))?.position;
        let pos_b = self.entries.get(&b).ok_or(GridError::UnknownEntry(b))?.position;
        if let Some(cell) = self.cell_mut(pos_a) {
            cell.entry_id = Some(b);
        }
        if let Some(cell) = self.cell_mut(pos_b) {
            cell.entry_id = Some(a);
        }
        if let Some(entry) = self.entries.get_mut(&a) {
            entry.position = pos_b;
        }
        if let Some(entry) = self.entries.get_mut(&b) {
            entry.position = pos_a;
        }
        Ok(())
    }

    /// Apply canonical cell states returned by the server. Clearing a cell
    /// drops its cached entry; occupying one refreshes the projection.
    pub fn apply_cell_states(&mut self, states: &[CellState]) {
        for state in states {
            let Some(idx) = self.cell_index(state.position) else {
                continue;
            };
            if let Some(old) = self.cells[idx].entry_id {
                // Keep the projection if the same entry merely moved here;
                // otherwise the old occupant is gone from this cell.
                if state.entry.as_ref().map(|e| e.id) != Some(old) {
                    let still_placed = self
                        .cells
                        .iter()
                        .enumerate()
                        .any(|(i, c)| i != idx && c.entry_id == Some(old));
                    let incoming = states
                        .iter()
                        .any(|s| s.entry.as_ref().map(|e| e.id) == Some(old));
                    if !still_placed && !incoming {
                        self.entries.remove(&old);
                    }
                }
            }
            match &state.entry {
                Some(entry) => {
                    let mut entry = entry.clone();
                    entry.position = state.position;
                    self.cells[idx].entry_id = Some(entry.id);
                    self.entries.insert(entry.id, entry);
                }
                None => {
                    self.cells[idx].entry_id = None;
                }
            }
        }
    }
}
