use std::fmt;

use crate::grid::{EntryId, Position, TimetableEntry};
use crate::remote::EntrySave;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum Field {
    Course,
    Faculty,
    Room,
    Batch,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Course, Field::Faculty, Field::Room, Field::Batch];

    pub fn next(self) -> Field {
        let idx = Field::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Field::ALL[(idx + 1) % Field::ALL.len()]
    }

    pub fn prev(self) -> Field {
        let idx = Field::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Field::ALL[(idx + Field::ALL.len() - 1) % Field::ALL.len()]
    }
}

/// A single failed required-field check.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit(EntryId),
}

/// Form state for the modal/inline entry editors. Validation runs before
/// submission; any failure blocks the dispatch entirely.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryForm {
    pub cell: Position,
    pub mode: FormMode,
    pub course: String,
    pub faculty: String,
    pub room: String,
    pub batch: String,
    pub focus: Field,
    pub errors: Vec<FieldError>,
}

impl EntryForm {
    pub fn add(cell: Position) -> Self {
        Self {
            cell,
            mode: FormMode::Add,
            course: String::new(),
            faculty: String::new(),
            room: String::new(),
            batch: String::new(),
            focus: Field::Course,
            errors: Vec::new(),
        }
    }

    pub fn edit(entry: &TimetableEntry) -> Self {
        Self {
            cell: entry.position,
            mode: FormMode::Edit(entry.id),
            course: entry.course.clone(),
            faculty: entry.faculty.clone(),
            room: entry.room.clone(),
            batch: entry.batch.clone(),
            focus: Field::Course,
            errors: Vec::new(),
        }
    }

    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Course => &self.course,
            Field::Faculty => &self.faculty,
            Field::Room => &self.room,
            Field::Batch => &self.batch,
        }
    }

    fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Course => &mut self.course,
            Field::Faculty => &mut self.faculty,
            Field::Room => &mut self.room,
            Field::Batch => &mut self.batch,
        }
    }

    pub fn push_char(&mut self, c: char) {
        let focus = self.focus;
        self.value_mut(focus).push(c);
    }

    pub fn backspace(&mut self) {
        let focus = self.focus;
        self.value_mut(focus).pop();
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    /// Required-field checks, reported per field.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let errors: Vec<FieldError> = Field::ALL
            .iter()
            .filter(|f| self.value(**f).trim().is_empty())
            .map(|f| FieldError {
                field: *f,
                message: "is required".into(),
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Convert a validated form into the mutation payload.
    pub fn to_save(&self) -> EntrySave {
        EntrySave {
            entry_id: match self.mode {
                FormMode::Add => None,
                FormMode::Edit(id) => Some(id),
            },
            position: self.cell,
            course: self.course.trim().to_string(),
            faculty: self.faculty.trim().to_string(),
            room: self.room.trim().to_string(),
            batch: self.batch.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> TimetableEntry {
        TimetableEntry {
            id: 5,
            course: "Databases".into(),
            faculty: "Iyer".into(),
            room: "LH-2".into(),
            batch: "CS-B".into(),
            position: Position::new(1, 3),
        }
    }

    #[test]
    fn add_form_starts_blank() {
        let form = EntryForm::add(Position::new(0, 0));
        assert_eq!(form.mode, FormMode::Add);
        assert_eq!(form.focus, Field::Course);
        assert!(form.course.is_empty());
    }

    #[test]
    fn edit_form_is_prefilled() {
        let form = EntryForm::edit(&entry());
        assert_eq!(form.mode, FormMode::Edit(5));
        assert_eq!(form.course, "Databases");
        assert_eq!(form.cell, Position::new(1, 3));
    }

    #[test]
    fn blank_fields_are_each_reported() {
        let mut form = EntryForm::add(Position::new(0, 0));
        form.course = "Algorithms".into();
        form.room = "   ".into(); // whitespace only is still blank

        let errors = form.validate().unwrap_err();
        let fields: Vec<Field> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![Field::Faculty, Field::Room, Field::Batch]);
    }

    #[test]
    fn valid_form_produces_save_payload() {
        let mut form = EntryForm::edit(&entry());
        form.room = " LH-7 ".into();
        assert!(form.validate().is_ok());

        let save = form.to_save();
        assert_eq!(save.entry_id, Some(5));
        assert_eq!(save.room, "LH-7");
        assert_eq!(save.position, Position::new(1, 3));
    }

    #[test]
    fn add_form_save_has_no_entry_id() {
        let mut form = EntryForm::add(Position::new(2, 2));
        for (field, value) in [
            (Field::Course, "OS"),
            (Field::Faculty, "Nair"),
            (Field::Room, "Lab-3"),
            (Field::Batch, "CS-A"),
        ] {
            form.focus = field;
            for c in value.chars() {
                form.push_char(c);
            }
        }
        assert!(form.validate().is_ok());
        assert_eq!(form.to_save().entry_id, None);
    }

    #[test]
    fn focus_cycles_through_all_fields() {
        let mut form = EntryForm::add(Position::new(0, 0));
        for expected in [Field::Faculty, Field::Room, Field::Batch, Field::Course] {
            form.focus_next();
            assert_eq!(form.focus, expected);
        }
        form.focus_prev();
        assert_eq!(form.focus, Field::Batch);
    }

    #[test]
    fn push_and_backspace_edit_focused_field() {
        let mut form = EntryForm::add(Position::new(0, 0));
        form.focus = Field::Room;
        form.push_char('L');
        form.push_char('H');
        form.backspace();
        assert_eq!(form.room, "L");
        assert!(form.course.is_empty());
    }
}
