use std::fmt;

use tracing::debug;

use crate::editor::EntryForm;
use crate::grid::{CellState, EntryId, Position, TimetableGrid};
use crate::remote::{EntrySave, MoveMode, MoveRequest, RemoteError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorKind {
    /// Full-screen modal editor (primary activation).
    Modal,
    /// Inline quick editor (secondary activation).
    Inline,
}

/// Where the session is in its interaction lifecycle.
#[derive(Clone, Debug, PartialEq)]
pub enum EditState {
    Viewing,
    EditMode,
    CellEditing { cell: Position, kind: EditorKind },
    MovePending { from: Position, to: Position },
}

/// Why a gesture was refused. Refusals are no-ops: nothing is queued and
/// nothing already in flight is cancelled.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    EditModeOff,
    Busy,
    EmptyCell,
    NotEditable,
    OutOfGrid,
    NothingHeld,
    Validation,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Rejection::EditModeOff => "edit mode is off",
            Rejection::Busy => "another change is still being saved",
            Rejection::EmptyCell => "cell has no entry",
            Rejection::NotEditable => "cell is locked",
            Rejection::OutOfGrid => "outside the timetable",
            Rejection::NothingHeld => "no entry picked up",
            Rejection::Validation => "fix the highlighted fields",
        };
        f.write_str(msg)
    }
}

/// How a settled mutation response was handled.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Canonical cell states applied.
    Applied,
    /// Speculative change reverted; carries the message to surface.
    RolledBack(String),
    /// Response no longer matches an outstanding mutation; discarded.
    Stale,
}

#[derive(Clone, Debug)]
enum Pending {
    Move { ticket: u64, revert: TimetableGrid },
    Save { ticket: u64 },
    Delete { ticket: u64 },
}

impl Pending {
    fn ticket(&self) -> u64 {
        match self {
            Pending::Move { ticket, .. } => *ticket,
            Pending::Save { ticket } => *ticket,
            Pending::Delete { ticket } => *ticket,
        }
    }
}

/// Per-view editing state for one template. Owns no rendering and no I/O:
/// gestures come in, mutation requests and resolutions go out.
#[derive(Debug)]
pub struct EditingSession {
    template_id: u64,
    state: EditState,
    held: Option<Position>,
    form: Option<EntryForm>,
    pending: Option<Pending>,
    next_ticket: u64,
}

impl EditingSession {
    pub fn new(template_id: u64) -> Self {
        Self {
            template_id,
            state: EditState::Viewing,
            held: None,
            form: None,
            pending: None,
            next_ticket: 0,
        }
    }

    pub fn template_id(&self) -> u64 {
        self.template_id
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn edit_mode(&self) -> bool {
        self.state != EditState::Viewing
    }

    /// True while a mutation is outstanding. New mutating gestures are
    /// rejected until the in-flight request settles.
    pub fn busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn held(&self) -> Option<Position> {
        self.held
    }

    pub fn form(&self) -> Option<&EntryForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut EntryForm> {
        self.form.as_mut()
    }

    fn take_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    pub fn enable_edit(&mut self) {
        if self.state == EditState::Viewing {
            self.state = EditState::EditMode;
        }
    }

    /// Leave edit mode from any state. Cancels an in-progress edit and
    /// reverts a pending move without persisting; a late response for the
    /// abandoned request is discarded as stale.
    pub fn disable_edit(&mut self, grid: &mut TimetableGrid) {
        if let Some(Pending::Move { revert, .. }) = self.pending.take() {
            *grid = revert;
        }
        self.held = None;
        self.form = None;
        self.state = EditState::Viewing;
    }

    /// Open the editor on a cell. Opening on a new cell implicitly cancels
    /// any prior in-progress edit without persisting it.
    pub fn begin_edit(
        &mut self,
        grid: &TimetableGrid,
        cell: Position,
        kind: EditorKind,
    ) -> Result<(), Rejection> {
        match self.state {
            EditState::Viewing => return Err(Rejection::EditModeOff),
            EditState::MovePending { .. } => return Err(Rejection::Busy),
            EditState::EditMode | EditState::CellEditing { .. } => {}
        }
        if self.busy() {
            return Err(Rejection::Busy);
        }
        let target = grid.cell(cell).ok_or(Rejection::OutOfGrid)?;
        if !target.editable {
            return Err(Rejection::NotEditable);
        }
        self.form = Some(match grid.entry_at(cell) {
            Some(entry) => EntryForm::edit(entry),
            None => EntryForm::add(cell),
        });
        self.held = None;
        self.state = EditState::CellEditing { cell, kind };
        Ok(())
    }

    /// Discard local changes and restore the prior rendered content.
    pub fn cancel_edit(&mut self) {
        if matches!(self.state, EditState::CellEditing { .. }) {
            self.form = None;
            self.state = EditState::EditMode;
        }
    }

    /// Validate and dispatch the editor form. Validation failures block the
    /// submission entirely and are recorded per-field on the form.
    pub fn submit_edit(&mut self) -> Result<(u64, EntrySave), Rejection> {
        let EditState::CellEditing { cell, .. } = self.state else {
            return Err(Rejection::EditModeOff);
        };
        if self.busy() {
            return Err(Rejection::Busy);
        }
        let Some(form) = self.form.as_mut() else {
            return Err(Rejection::EditModeOff);
        };
        match form.validate() {
            Ok(()) => {}
            Err(errors) => {
                form.errors = errors;
                return Err(Rejection::Validation);
            }
        }
        let request = form.to_save();
        let ticket = self.take_ticket();
        debug!(ticket, cell = %cell, "save dispatched");
        self.form = None;
        self.pending = Some(Pending::Save { ticket });
        self.state = EditState::EditMode;
        Ok((ticket, request))
    }

    /// Pick up the entry in a source cell. Refused (a no-op) when the cell
    /// has no entry, is locked, edit mode is off, or a mutation is pending.
    pub fn begin_drag(&mut self, grid: &TimetableGrid, from: Position) -> Result<(), Rejection> {
        if self.state != EditState::EditMode {
            return Err(match self.state {
                EditState::Viewing => Rejection::EditModeOff,
                _ => Rejection::Busy,
            });
        }
        if self.busy() {
            return Err(Rejection::Busy);
        }
        let cell = grid.cell(from).ok_or(Rejection::OutOfGrid)?;
        if !cell.editable {
            return Err(Rejection::NotEditable);
        }
        if !cell.occupied() {
            return Err(Rejection::EmptyCell);
        }
        self.held = Some(from);
        Ok(())
    }

    pub fn cancel_drag(&mut self) {
        self.held = None;
    }

    /// Complete the drop half of the gesture. An occupied target that
    /// differs from the source becomes a swap; an empty target a move;
    /// the source cell itself a no-op. The grid is updated optimistically
    /// and snapshotted first so a failure can roll back.
    pub fn drop_on(
        &mut self,
        grid: &mut TimetableGrid,
        target: Position,
    ) -> Result<Option<(u64, MoveRequest)>, Rejection> {
        let from = self.held.ok_or(Rejection::NothingHeld)?;
        if self.busy() {
            return Err(Rejection::Busy);
        }
        let target_cell = grid.cell(target).ok_or(Rejection::OutOfGrid)?;
        if target == from {
            self.held = None;
            return Ok(None);
        }
        if !target_cell.editable {
            return Err(Rejection::NotEditable);
        }
        let entry_id = grid
            .cell(from)
            .and_then(|c| c.entry_id)
            .ok_or(Rejection::EmptyCell)?;
        let swap_with = target_cell.entry_id;

        let revert = grid.clone();
        let mode = match swap_with {
            Some(other) => {
                grid.apply_swap(entry_id, other)
                    .map_err(|_| Rejection::OutOfGrid)?;
                MoveMode::Swap
            }
            None => {
                grid.apply_move(entry_id, target)
                    .map_err(|_| Rejection::OutOfGrid)?;
                MoveMode::Move
            }
        };

        let ticket = self.take_ticket();
        debug!(ticket, %from, %target, ?mode, "move dispatched");
        self.held = None;
        self.pending = Some(Pending::Move { ticket, revert });
        self.state = EditState::MovePending { from, to: target };
        Ok(Some((
            ticket,
            MoveRequest {
                entry_id,
                from_position: from,
                to_position: target,
                mode,
            },
        )))
    }

    /// Dispatch a delete for the entry in a cell. No optimistic removal:
    /// the cell clears only when the canonical states come back.
    pub fn delete_at(
        &mut self,
        grid: &TimetableGrid,
        cell: Position,
    ) -> Result<(u64, EntryId), Rejection> {
        if self.state != EditState::EditMode {
            return Err(match self.state {
                EditState::Viewing => Rejection::EditModeOff,
                _ => Rejection::Busy,
            });
        }
        if self.busy() {
            return Err(Rejection::Busy);
        }
        let target = grid.cell(cell).ok_or(Rejection::OutOfGrid)?;
        if !target.editable {
            return Err(Rejection::NotEditable);
        }
        let entry_id = target.entry_id.ok_or(Rejection::EmptyCell)?;
        let ticket = self.take_ticket();
        debug!(ticket, cell = %cell, "delete dispatched");
        self.pending = Some(Pending::Delete { ticket });
        Ok((ticket, entry_id))
    }

    /// Apply a settled mutation response. A ticket that no longer matches
    /// the outstanding mutation (superseded, or cancelled by leaving edit
    /// mode) is discarded without touching the grid.
    pub fn resolve(
        &mut self,
        grid: &mut TimetableGrid,
        ticket: u64,
        result: Result<Vec<CellState>, RemoteError>,
    ) -> Resolution {
        let matches_pending = self
            .pending
            .as_ref()
            .is_some_and(|p| p.ticket() == ticket);
        if !matches_pending {
            return Resolution::Stale;
        }
        let pending = self.pending.take().expect("pending ticket matched");
        if matches!(self.state, EditState::MovePending { .. }) {
            self.state = EditState::EditMode;
        }
        match result {
            Ok(states) => {
                grid.apply_cell_states(&states);
                Resolution::Applied
            }
            Err(err) => {
                if let Pending::Move { revert, .. } = pending {
                    *grid = revert;
                }
                Resolution::RolledBack(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TimetableEntry;
    use assert_matches::assert_matches;

    fn entry(id: EntryId, pos: Position) -> TimetableEntry {
        TimetableEntry {
            id,
            course: format!("C{}", id),
            faculty: format!("F{}", id),
            room: format!("R{}", id),
            batch: "CS-A".into(),
            position: pos,
        }
    }

    fn grid_with(entries: &[(EntryId, Position)]) -> TimetableGrid {
        let mut grid = TimetableGrid::new(5, 6);
        for (id, pos) in entries {
            grid.place(entry(*id, *pos)).unwrap();
        }
        grid
    }

    fn canonical_move(id: EntryId, from: Position, to: Position) -> Vec<CellState> {
        vec![
            CellState {
                position: from,
                entry: None,
            },
            CellState {
                position: to,
                entry: Some(entry(id, to)),
            },
        ]
    }

    fn session_in_edit_mode(template: u64) -> EditingSession {
        let mut session = EditingSession::new(template);
        session.enable_edit();
        session
    }

    #[test]
    fn starts_viewing_with_no_pending_work() {
        let session = EditingSession::new(9);
        assert_eq!(session.template_id(), 9);
        assert_eq!(*session.state(), EditState::Viewing);
        assert!(!session.edit_mode());
        assert!(!session.busy());
    }

    #[test]
    fn gestures_require_edit_mode() {
        let grid = grid_with(&[(1, Position::new(0, 0))]);
        let mut session = EditingSession::new(1);

        assert_eq!(
            session.begin_drag(&grid, Position::new(0, 0)),
            Err(Rejection::EditModeOff)
        );
        assert_eq!(
            session.begin_edit(&grid, Position::new(0, 0), EditorKind::Modal),
            Err(Rejection::EditModeOff)
        );
        assert_matches!(
            session.delete_at(&grid, Position::new(0, 0)),
            Err(Rejection::EditModeOff)
        );
    }

    #[test]
    fn pick_up_refuses_empty_and_locked_cells() {
        let mut grid = grid_with(&[(1, Position::new(0, 0)), (2, Position::new(1, 0))]);
        grid.set_editable(Position::new(1, 0), false);
        let mut session = session_in_edit_mode(1);

        assert_eq!(
            session.begin_drag(&grid, Position::new(2, 2)),
            Err(Rejection::EmptyCell)
        );
        assert_eq!(
            session.begin_drag(&grid, Position::new(1, 0)),
            Err(Rejection::NotEditable)
        );
        assert_eq!(session.begin_drag(&grid, Position::new(0, 0)), Ok(()));
        assert_eq!(session.held(), Some(Position::new(0, 0)));
    }

    #[test]
    fn drop_on_source_cell_is_a_no_op() {
        let mut grid = grid_with(&[(1, Position::new(0, 0))]);
        let before = grid.clone();
        let mut session = session_in_edit_mode(1);

        session.begin_drag(&grid, Position::new(0, 0)).unwrap();
        let dispatched = session.drop_on(&mut grid, Position::new(0, 0)).unwrap();

        assert!(dispatched.is_none());
        assert_eq!(grid, before);
        assert!(session.held().is_none());
        assert!(!session.busy());
        assert_eq!(*session.state(), EditState::EditMode);
    }

    #[test]
    fn drop_on_empty_cell_dispatches_a_move() {
        let mut grid = grid_with(&[(1, Position::new(0, 0))]);
        let mut session = session_in_edit_mode(1);
        let occupied_before = grid.occupied_count();

        session.begin_drag(&grid, Position::new(0, 0)).unwrap();
        let (ticket, request) = session
            .drop_on(&mut grid, Position::new(1, 1))
            .unwrap()
            .unwrap();

        assert_eq!(request.mode, MoveMode::Move);
        assert_eq!(request.entry_id, 1);
        assert_eq!(request.from_position, Position::new(0, 0));
        assert_eq!(request.to_position, Position::new(1, 1));
        // optimistic update already visible
        assert!(!grid.cell(Position::new(0, 0)).unwrap().occupied());
        assert_eq!(grid.entry_at(Position::new(1, 1)).unwrap().id, 1);
        assert_matches!(*session.state(), EditState::MovePending { .. });

        let res = session.resolve(
            &mut grid,
            ticket,
            Ok(canonical_move(1, Position::new(0, 0), Position::new(1, 1))),
        );
        assert_eq!(res, Resolution::Applied);
        assert_eq!(grid.occupied_count(), occupied_before);
        assert_eq!(*session.state(), EditState::EditMode);
        assert!(!session.busy());
    }

    #[test]
    fn drop_on_occupied_cell_dispatches_a_swap() {
        let mut grid = grid_with(&[(1, Position::new(0, 0)), (2, Position::new(1, 1))]);
        let mut session = session_in_edit_mode(1);

        session.begin_drag(&grid, Position::new(0, 0)).unwrap();
        let (_, request) = session
            .drop_on(&mut grid, Position::new(1, 1))
            .unwrap()
            .unwrap();

        assert_eq!(request.mode, MoveMode::Swap);
        // both entries exchanged positions, exactly
        assert_eq!(grid.entry_at(Position::new(0, 0)).unwrap().id, 2);
        assert_eq!(grid.entry_at(Position::new(1, 1)).unwrap().id, 1);
        assert_eq!(grid.occupied_count(), 2);
    }

    #[test]
    fn failed_move_rolls_back_bit_for_bit() {
        let mut grid = grid_with(&[(1, Position::new(0, 0)), (2, Position::new(2, 3))]);
        let mut session = session_in_edit_mode(1);
        let before = grid.clone();

        session.begin_drag(&grid, Position::new(0, 0)).unwrap();
        let (ticket, _) = session
            .drop_on(&mut grid, Position::new(1, 1))
            .unwrap()
            .unwrap();
        assert_ne!(grid, before);

        let res = session.resolve(
            &mut grid,
            ticket,
            Err(RemoteError::Conflict {
                message: "slot taken by another batch".into(),
            }),
        );

        assert_eq!(
            res,
            Resolution::RolledBack("slot taken by another batch".into())
        );
        assert_eq!(grid, before);
        // session remains usable after the failure
        assert_eq!(*session.state(), EditState::EditMode);
        assert_eq!(session.begin_drag(&grid, Position::new(2, 3)), Ok(()));
    }

    #[test]
    fn second_gesture_is_ignored_while_one_is_pending() {
        let mut grid = grid_with(&[(1, Position::new(0, 0)), (2, Position::new(2, 3))]);
        let mut session = session_in_edit_mode(1);

        session.begin_drag(&grid, Position::new(0, 0)).unwrap();
        let (ticket, _) = session
            .drop_on(&mut grid, Position::new(1, 1))
            .unwrap()
            .unwrap();
        let during = grid.clone();

        assert_eq!(
            session.begin_drag(&grid, Position::new(2, 3)),
            Err(Rejection::Busy)
        );
        assert_eq!(
            session.begin_edit(&grid, Position::new(2, 3), EditorKind::Modal),
            Err(Rejection::Busy)
        );
        assert_matches!(
            session.delete_at(&grid, Position::new(2, 3)),
            Err(Rejection::Busy)
        );
        assert_eq!(grid, during);

        let res = session.resolve(
            &mut grid,
            ticket,
            Ok(canonical_move(1, Position::new(0, 0), Position::new(1, 1))),
        );
        assert_eq!(res, Resolution::Applied);
        assert_eq!(session.begin_drag(&grid, Position::new(2, 3)), Ok(()));
    }

    #[test]
    fn disabling_edit_mode_reverts_pending_move_and_discards_late_response() {
        let mut grid = grid_with(&[(1, Position::new(0, 0))]);
        let mut session = session_in_edit_mode(1);
        let before = grid.clone();

        session.begin_drag(&grid, Position::new(0, 0)).unwrap();
        let (ticket, _) = session
            .drop_on(&mut grid, Position::new(1, 1))
            .unwrap()
            .unwrap();

        session.disable_edit(&mut grid);
        assert_eq!(*session.state(), EditState::Viewing);
        assert_eq!(grid, before);

        // the request was not cancelled mid-flight; its response is stale
        let res = session.resolve(
            &mut grid,
            ticket,
            Ok(canonical_move(1, Position::new(0, 0), Position::new(1, 1))),
        );
        assert_eq!(res, Resolution::Stale);
        assert_eq!(grid, before);
    }

    #[test]
    fn unknown_ticket_is_stale() {
        let mut grid = grid_with(&[(1, Position::new(0, 0))]);
        let mut session = session_in_edit_mode(1);
        assert_eq!(session.resolve(&mut grid, 99, Ok(vec![])), Resolution::Stale);
    }

    #[test]
    fn begin_edit_prefills_from_occupied_cell() {
        let grid = grid_with(&[(1, Position::new(0, 0))]);
        let mut session = session_in_edit_mode(1);

        session
            .begin_edit(&grid, Position::new(0, 0), EditorKind::Modal)
            .unwrap();
        assert_matches!(
            *session.state(),
            EditState::CellEditing {
                kind: EditorKind::Modal,
                ..
            }
        );
        assert_eq!(session.form().unwrap().course, "C1");
    }

    #[test]
    fn begin_edit_on_empty_cell_opens_add_form() {
        let grid = grid_with(&[]);
        let mut session = session_in_edit_mode(1);

        session
            .begin_edit(&grid, Position::new(3, 2), EditorKind::Inline)
            .unwrap();
        let form = session.form().unwrap();
        assert!(form.course.is_empty());
        assert_eq!(form.cell, Position::new(3, 2));
    }

    #[test]
    fn switching_cells_cancels_the_previous_edit() {
        let grid = grid_with(&[(1, Position::new(0, 0))]);
        let mut session = session_in_edit_mode(1);

        session
            .begin_edit(&grid, Position::new(0, 0), EditorKind::Modal)
            .unwrap();
        session.form_mut().unwrap().course = "scratch".into();

        session
            .begin_edit(&grid, Position::new(1, 1), EditorKind::Modal)
            .unwrap();
        // prior in-progress edit discarded, nothing persisted
        assert!(session.form().unwrap().course.is_empty());
        assert!(!session.busy());
    }

    #[test]
    fn invalid_form_blocks_submission_entirely() {
        let grid = grid_with(&[]);
        let mut session = session_in_edit_mode(1);
        session
            .begin_edit(&grid, Position::new(0, 0), EditorKind::Modal)
            .unwrap();

        assert_eq!(session.submit_edit(), Err(Rejection::Validation));
        assert!(!session.busy());
        // errors recorded per field for the editor to render
        assert_eq!(session.form().unwrap().errors.len(), 4);
        assert_matches!(*session.state(), EditState::CellEditing { .. });
    }

    #[test]
    fn valid_submission_dispatches_and_closes_the_editor() {
        let grid = grid_with(&[(5, Position::new(1, 3))]);
        let mut session = session_in_edit_mode(1);
        session
            .begin_edit(&grid, Position::new(1, 3), EditorKind::Inline)
            .unwrap();
        session.form_mut().unwrap().room = "LH-9".into();

        let (ticket, request) = session.submit_edit().unwrap();
        assert_eq!(request.entry_id, Some(5));
        assert_eq!(request.room, "LH-9");
        assert_eq!(*session.state(), EditState::EditMode);
        assert!(session.busy());
        assert!(session.form().is_none());

        let mut grid = grid;
        let res = session.resolve(
            &mut grid,
            ticket,
            Ok(vec![CellState {
                position: Position::new(1, 3),
                entry: Some(entry(5, Position::new(1, 3))),
            }]),
        );
        assert_eq!(res, Resolution::Applied);
        assert!(!session.busy());
    }

    #[test]
    fn cancel_edit_restores_prior_content() {
        let grid = grid_with(&[(1, Position::new(0, 0))]);
        let mut session = session_in_edit_mode(1);
        session
            .begin_edit(&grid, Position::new(0, 0), EditorKind::Modal)
            .unwrap();
        session.form_mut().unwrap().course = "half-typed".into();

        session.cancel_edit();
        assert_eq!(*session.state(), EditState::EditMode);
        assert!(session.form().is_none());
        // grid untouched throughout
        assert_eq!(grid.entry_at(Position::new(0, 0)).unwrap().course, "C1");
    }

    #[test]
    fn delete_requires_an_occupied_editable_cell() {
        let mut grid = grid_with(&[(1, Position::new(0, 0))]);
        grid.set_editable(Position::new(4, 4), false);
        let mut session = session_in_edit_mode(1);

        assert_matches!(
            session.delete_at(&grid, Position::new(2, 2)),
            Err(Rejection::EmptyCell)
        );
        assert_matches!(
            session.delete_at(&grid, Position::new(4, 4)),
            Err(Rejection::NotEditable)
        );
        let (ticket, entry_id) = session.delete_at(&grid, Position::new(0, 0)).unwrap();
        assert_eq!(entry_id, 1);
        assert!(session.busy());

        // no optimistic removal for deletes
        assert!(grid.cell(Position::new(0, 0)).unwrap().occupied());
        let res = session.resolve(
            &mut grid,
            ticket,
            Ok(vec![CellState {
                position: Position::new(0, 0),
                entry: None,
            }]),
        );
        assert_eq!(res, Resolution::Applied);
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn failed_save_keeps_grid_and_session_usable() {
        let mut grid = grid_with(&[(5, Position::new(1, 3))]);
        let before = grid.clone();
        let mut session = session_in_edit_mode(1);
        session
            .begin_edit(&grid, Position::new(1, 3), EditorKind::Modal)
            .unwrap();
        let (ticket, _) = session.submit_edit().unwrap();

        let res = session.resolve(
            &mut grid,
            ticket,
            Err(RemoteError::Network("connection reset".into())),
        );
        assert_eq!(
            res,
            Resolution::RolledBack("network failure: connection reset".into())
        );
        assert_eq!(grid, before);
        assert_eq!(
            session.begin_edit(&grid, Position::new(1, 3), EditorKind::Modal),
            Ok(())
        );
    }
}
