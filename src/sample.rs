use include_dir::{include_dir, Dir};
use serde::Deserialize;

use crate::grid::TimetableGrid;
use crate::remote::GridPayload;

static ASSETS: Dir = include_dir!("$CARGO_MANIFEST_DIR/assets");

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("unknown demo template {0:?} (available: {available})", available = available().join(", "))]
    Unknown(String),
    #[error("demo template is invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SampleFile {
    template_id: u64,
    #[serde(flatten)]
    payload: GridPayload,
}

/// Names of the embedded demo templates.
pub fn available() -> Vec<String> {
    ASSETS
        .files()
        .filter_map(|f| {
            f.path()
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .collect()
}

/// Raw bootstrap payload of an embedded demo template (file stem under
/// assets/), as the server would have returned it.
pub fn payload(name: &str) -> Result<(u64, GridPayload), SampleError> {
    let file = ASSETS
        .get_file(format!("{}.json", name))
        .ok_or_else(|| SampleError::Unknown(name.to_string()))?;
    let sample: SampleFile = serde_json::from_slice(file.contents())
        .map_err(|e| SampleError::Invalid(e.to_string()))?;
    Ok((sample.template_id, sample.payload))
}

/// Load an embedded demo template by name.
pub fn load(name: &str) -> Result<(u64, TimetableGrid), SampleError> {
    let (template_id, payload) = payload(name)?;
    let grid = payload
        .build()
        .map_err(|e| SampleError::Invalid(e.to_string()))?;
    Ok((template_id, grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;

    #[test]
    fn lists_embedded_templates() {
        let names = available();
        assert!(names.iter().any(|n| n == "cs-sem3"));
        assert!(names.iter().any(|n| n == "me-sem1"));
    }

    #[test]
    fn loads_cs_demo_with_locked_cell() {
        let (template_id, grid) = load("cs-sem3").unwrap();
        assert_eq!(template_id, 101);
        assert_eq!(grid.days(), 5);
        assert_eq!(grid.periods(), 6);
        assert_eq!(grid.occupied_count(), 10);
        assert!(!grid.cell(Position::new(4, 5)).unwrap().editable);
        assert!(grid.period_time(0).is_some());
    }

    #[test]
    fn loads_me_demo() {
        let (template_id, grid) = load("me-sem1").unwrap();
        assert_eq!(template_id, 102);
        assert_eq!(grid.days(), 6);
        assert_eq!(grid.occupied_count(), 5);
    }

    #[test]
    fn unknown_name_is_reported() {
        let err = load("nope").unwrap_err();
        assert!(matches!(err, SampleError::Unknown(_)));
        assert!(err.to_string().contains("cs-sem3"));
    }
}
