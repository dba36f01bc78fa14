use crate::remote::{BatchInfo, RemoteError};

pub const UNSELECTED_MSG: &str = "Select department and semester first";
pub const EMPTY_MSG: &str = "No batches found";

/// A department/semester pair to look up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchQuery {
    pub department: String,
    pub semester: u8,
}

/// Lifecycle of the batch list. `Empty` is a real result and renders a
/// different message than `Unselected`.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchList {
    Unselected,
    Loading(BatchQuery),
    Loaded(Vec<BatchInfo>),
    Empty(BatchQuery),
    Failed(String),
}

/// Input problems caught before a lookup is dispatched.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchInputError {
    DepartmentRequired,
    SemesterRequired,
    SemesterOutOfRange,
}

impl BatchInputError {
    pub fn message(&self) -> &'static str {
        match self {
            BatchInputError::DepartmentRequired => "Department selection is required",
            BatchInputError::SemesterRequired => "Semester is required",
            BatchInputError::SemesterOutOfRange => "Semester should be between 1 and 8",
        }
    }
}

/// Lookup panel state: two text inputs plus the list lifecycle.
#[derive(Clone, Debug, Default)]
pub struct BatchPanel {
    pub department: String,
    pub semester: String,
    pub semester_focused: bool,
    pub input_errors: Vec<BatchInputError>,
    list: BatchList,
}

impl Default for BatchList {
    fn default() -> Self {
        BatchList::Unselected
    }
}

impl BatchPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> &BatchList {
        &self.list
    }

    /// Validate the inputs and move to Loading. The caller dispatches the
    /// actual request with the returned query.
    pub fn start_lookup(&mut self) -> Result<BatchQuery, Vec<BatchInputError>> {
        let mut errors = Vec::new();
        if self.department.trim().is_empty() {
            errors.push(BatchInputError::DepartmentRequired);
        }
        let semester = match self.semester.trim() {
            "" => {
                errors.push(BatchInputError::SemesterRequired);
                None
            }
            raw => match raw.parse::<u8>() {
                Ok(n) if (1..=8).contains(&n) => Some(n),
                _ => {
                    errors.push(BatchInputError::SemesterOutOfRange);
                    None
                }
            },
        };
        if !errors.is_empty() {
            self.input_errors = errors.clone();
            return Err(errors);
        }
        self.input_errors.clear();
        let query = BatchQuery {
            department: self.department.trim().to_string(),
            semester: semester.expect("validated above"),
        };
        self.list = BatchList::Loading(query.clone());
        Ok(query)
    }

    /// Apply a settled lookup. A response for a query other than the one
    /// loading (inputs changed meanwhile) is discarded.
    pub fn resolve(&mut self, query: &BatchQuery, result: Result<Vec<BatchInfo>, RemoteError>) {
        let BatchList::Loading(current) = &self.list else {
            return;
        };
        if current != query {
            return;
        }
        self.list = match result {
            Ok(batches) if batches.is_empty() => BatchList::Empty(query.clone()),
            Ok(batches) => BatchList::Loaded(batches),
            Err(err) => BatchList::Failed(err.to_string()),
        };
    }

    pub fn reset(&mut self) {
        self.list = BatchList::Unselected;
    }

    /// One-line rendering of the list state.
    pub fn status_line(&self) -> String {
        match &self.list {
            BatchList::Unselected => UNSELECTED_MSG.to_string(),
            BatchList::Loading(q) => format!("Loading batches for {} sem {}…", q.department, q.semester),
            BatchList::Loaded(batches) => format!("{} batch(es)", batches.len()),
            BatchList::Empty(_) => EMPTY_MSG.to_string(),
            BatchList::Failed(msg) => format!("Lookup failed: {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn panel_with(department: &str, semester: &str) -> BatchPanel {
        BatchPanel {
            department: department.into(),
            semester: semester.into(),
            ..BatchPanel::new()
        }
    }

    #[test]
    fn fresh_panel_is_unselected() {
        let panel = BatchPanel::new();
        assert_eq!(*panel.list(), BatchList::Unselected);
        assert_eq!(panel.status_line(), UNSELECTED_MSG);
    }

    #[test]
    fn blank_inputs_block_the_lookup() {
        let mut panel = BatchPanel::new();
        let errors = panel.start_lookup().unwrap_err();
        assert_eq!(
            errors,
            vec![
                BatchInputError::DepartmentRequired,
                BatchInputError::SemesterRequired,
            ]
        );
        assert_eq!(*panel.list(), BatchList::Unselected);
    }

    #[test]
    fn semester_must_be_between_one_and_eight() {
        let mut panel = panel_with("CS", "9");
        assert_eq!(
            panel.start_lookup().unwrap_err(),
            vec![BatchInputError::SemesterOutOfRange]
        );

        let mut panel = panel_with("CS", "0");
        assert_eq!(
            panel.start_lookup().unwrap_err(),
            vec![BatchInputError::SemesterOutOfRange]
        );

        let mut panel = panel_with("CS", "abc");
        assert_eq!(
            panel.start_lookup().unwrap_err(),
            vec![BatchInputError::SemesterOutOfRange]
        );
    }

    #[test]
    fn empty_result_is_distinct_from_unselected() {
        let mut panel = panel_with("CS", "3");
        let query = panel.start_lookup().unwrap();
        assert_eq!(query.department, "CS");
        assert_eq!(query.semester, 3);

        panel.resolve(&query, Ok(vec![]));
        assert_matches!(panel.list(), BatchList::Empty(_));
        assert_eq!(panel.status_line(), EMPTY_MSG);
        assert_ne!(panel.status_line(), UNSELECTED_MSG);
    }

    #[test]
    fn loaded_batches_are_kept_in_order() {
        let mut panel = panel_with("CS", "3");
        let query = panel.start_lookup().unwrap();
        let batches = vec![
            BatchInfo {
                id: 1,
                name: "CS-A".into(),
                semester: 3,
            },
            BatchInfo {
                id: 2,
                name: "CS-B".into(),
                semester: 3,
            },
        ];
        panel.resolve(&query, Ok(batches.clone()));
        assert_eq!(*panel.list(), BatchList::Loaded(batches));
    }

    #[test]
    fn failed_lookup_surfaces_the_error() {
        let mut panel = panel_with("CS", "3");
        let query = panel.start_lookup().unwrap();
        panel.resolve(&query, Err(RemoteError::Network("timed out".into())));
        assert_matches!(panel.list(), BatchList::Failed(_));
        assert!(panel.status_line().contains("timed out"));
    }

    #[test]
    fn response_for_a_superseded_query_is_discarded() {
        let mut panel = panel_with("CS", "3");
        let stale = panel.start_lookup().unwrap();
        panel.department = "EE".into();
        let fresh = panel.start_lookup().unwrap();

        panel.resolve(
            &stale,
            Ok(vec![BatchInfo {
                id: 1,
                name: "CS-A".into(),
                semester: 3,
            }]),
        );
        assert_matches!(panel.list(), BatchList::Loading(_));

        panel.resolve(&fresh, Ok(vec![]));
        assert_matches!(panel.list(), BatchList::Empty(_));
    }
}
