use std::collections::HashMap;
use std::sync::Mutex;

use crate::grid::{CellState, EntryId, Position, TimetableEntry};
use crate::remote::{
    BatchInfo, BatchLookup, EntryMutation, EntrySave, GridPayload, MoveMode, MoveRequest,
    RemoteError, TimetableSource,
};

/// In-memory stand-in for the scheduler server, used by demo mode and the
/// headless tests. Enforces the same slot-exclusivity rules the real server
/// does, so conflict paths are exercisable offline.
pub struct LocalService {
    state: Mutex<LocalState>,
}

struct LocalState {
    days: u8,
    periods: u8,
    period_times: Vec<(String, String)>,
    locked: Vec<Position>,
    entries: HashMap<EntryId, TimetableEntry>,
    batches: Vec<(String, BatchInfo)>,
    next_id: EntryId,
}

impl LocalService {
    pub fn from_payload(payload: &GridPayload) -> Self {
        let entries: HashMap<EntryId, TimetableEntry> = payload
            .cells
            .iter()
            .filter_map(|c| c.entry.clone())
            .map(|e| (e.id, e))
            .collect();
        let next_id = entries.keys().max().copied().unwrap_or(0) + 1;
        Self {
            state: Mutex::new(LocalState {
                days: payload.days,
                periods: payload.periods,
                period_times: payload.period_times.clone(),
                locked: payload.locked.clone(),
                entries,
                batches: Vec::new(),
                next_id,
            }),
        }
    }

    /// Register the batches a department lookup should return.
    pub fn seed_batches(&self, department: &str, batches: Vec<BatchInfo>) {
        let mut state = self.state.lock().expect("local state poisoned");
        for batch in batches {
            state.batches.push((department.to_string(), batch));
        }
    }
}

impl LocalState {
    fn entry_at(&self, pos: Position) -> Option<EntryId> {
        self.entries
            .values()
            .find(|e| e.position == pos)
            .map(|e| e.id)
    }
}

impl BatchLookup for LocalService {
    fn department_batches(
        &self,
        department: &str,
        semester: u8,
    ) -> Result<Vec<BatchInfo>, RemoteError> {
        let state = self.state.lock().expect("local state poisoned");
        Ok(state
            .batches
            .iter()
            .filter(|(dept, batch)| {
                dept.eq_ignore_ascii_case(department) && batch.semester == semester
            })
            .map(|(_, batch)| batch.clone())
            .collect())
    }
}

impl EntryMutation for LocalService {
    fn move_entry(&self, req: &MoveRequest) -> Result<Vec<CellState>, RemoteError> {
        let mut state = self.state.lock().expect("local state poisoned");
        if !state.entries.contains_key(&req.entry_id) {
            return Err(RemoteError::Conflict {
                message: format!("entry {} does not exist", req.entry_id),
            });
        }
        let occupant = state.entry_at(req.to_position);
        match req.mode {
            MoveMode::Move => {
                if occupant.is_some() {
                    return Err(RemoteError::Conflict {
                        message: "target slot is already occupied".into(),
                    });
                }
                let entry = state.entries.get_mut(&req.entry_id).expect("checked above");
                entry.position = req.to_position;
                let entry = entry.clone();
                Ok(vec![
                    CellState {
                        position: req.from_position,
                        entry: None,
                    },
                    CellState {
                        position: req.to_position,
                        entry: Some(entry),
                    },
                ])
            }
            MoveMode::Swap => {
                let Some(other_id) = occupant else {
                    return Err(RemoteError::Conflict {
                        message: "nothing to swap with in the target slot".into(),
                    });
                };
                if let Some(entry) = state.entries.get_mut(&req.entry_id) {
                    entry.position = req.to_position;
                }
                if let Some(other) = state.entries.get_mut(&other_id) {
                    other.position = req.from_position;
                }
                let moved = state.entries[&req.entry_id].clone();
                let other = state.entries[&other_id].clone();
                Ok(vec![
                    CellState {
                        position: req.from_position,
                        entry: Some(other),
                    },
                    CellState {
                        position: req.to_position,
                        entry: Some(moved),
                    },
                ])
            }
        }
    }

    fn save_entry(&self, req: &EntrySave) -> Result<Vec<CellState>, RemoteError> {
        let mut state = self.state.lock().expect("local state poisoned");
        let occupant = state.entry_at(req.position);
        let id = match req.entry_id {
            Some(id) => {
                if !state.entries.contains_key(&id) {
                    return Err(RemoteError::Conflict {
                        message: format!("entry {} does not exist", id),
                    });
                }
                if occupant.is_some_and(|o| o != id) {
                    return Err(RemoteError::Conflict {
                        message: "target slot is already occupied".into(),
                    });
                }
                id
            }
            None => {
                if occupant.is_some() {
                    return Err(RemoteError::Conflict {
                        message: "target slot is already occupied".into(),
                    });
                }
                let id = state.next_id;
                state.next_id += 1;
                id
            }
        };
        let entry = TimetableEntry {
            id,
            course: req.course.clone(),
            faculty: req.faculty.clone(),
            room: req.room.clone(),
            batch: req.batch.clone(),
            position: req.position,
        };
        state.entries.insert(id, entry.clone());
        Ok(vec![CellState {
            position: req.position,
            entry: Some(entry),
        }])
    }

    fn delete_entry(&self, entry_id: EntryId) -> Result<Vec<CellState>, RemoteError> {
        let mut state = self.state.lock().expect("local state poisoned");
        let Some(entry) = state.entries.remove(&entry_id) else {
            return Err(RemoteError::Conflict {
                message: format!("entry {} does not exist", entry_id),
            });
        };
        Ok(vec![CellState {
            position: entry.position,
            entry: None,
        }])
    }
}

impl TimetableSource for LocalService {
    fn fetch_grid(&self, _template_id: u64) -> Result<GridPayload, RemoteError> {
        let state = self.state.lock().expect("local state poisoned");
        let cells = state
            .entries
            .values()
            .map(|e| CellState {
                position: e.position,
                entry: Some(e.clone()),
            })
            .collect();
        Ok(GridPayload {
            days: state.days,
            periods: state.periods,
            period_times: state.period_times.clone(),
            cells,
            locked: state.locked.clone(),
        })
    }
}
