use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::grid::{CellState, EntryId, Position};

/// Failures surfaced by the remote collaborators. Validation failures are
/// caught client-side before dispatch and never reach this type.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RemoteError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("{message}")]
    Conflict { message: String },
    #[error("malformed server payload: {0}")]
    Payload(String),
}

/// One batch as returned by the lookup endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchInfo {
    pub id: u64,
    pub name: String,
    pub semester: u8,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    batches: Vec<BatchInfo>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveMode {
    Move,
    Swap,
}

/// Move/swap request dispatched when a drop gesture completes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub entry_id: EntryId,
    pub from_position: Position,
    pub to_position: Position,
    pub mode: MoveMode,
}

/// Create/update request produced by the entry editor. `entry_id` is absent
/// when adding an entry to an empty cell.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySave {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<EntryId>,
    pub position: Position,
    pub course: String,
    pub faculty: String,
    pub room: String,
    pub batch: String,
}

#[derive(Debug, Deserialize)]
struct MutationResponse {
    cells: Vec<CellState>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

/// Batch Lookup Service collaborator.
pub trait BatchLookup: Send + Sync {
    fn department_batches(&self, department: &str, semester: u8)
        -> Result<Vec<BatchInfo>, RemoteError>;
}

/// Entry Mutation Service collaborator. Every call returns the canonical
/// cell states for the slots it touched.
pub trait EntryMutation: Send + Sync {
    fn move_entry(&self, req: &MoveRequest) -> Result<Vec<CellState>, RemoteError>;
    fn save_entry(&self, req: &EntrySave) -> Result<Vec<CellState>, RemoteError>;
    fn delete_entry(&self, entry_id: EntryId) -> Result<Vec<CellState>, RemoteError>;
}

/// Grid bootstrap payload for one template.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPayload {
    pub days: u8,
    pub periods: u8,
    #[serde(default)]
    pub period_times: Vec<(String, String)>,
    pub cells: Vec<CellState>,
    #[serde(default)]
    pub locked: Vec<Position>,
}

impl GridPayload {
    /// Assemble the client-side grid from a bootstrap payload.
    pub fn build(&self) -> Result<crate::grid::TimetableGrid, RemoteError> {
        let mut grid = crate::grid::TimetableGrid::new(self.days, self.periods);
        let times = self
            .period_times
            .iter()
            .map(|(start, end)| {
                let start = chrono::NaiveTime::parse_from_str(start, "%H:%M")
                    .map_err(|e| RemoteError::Payload(format!("bad period time {start:?}: {e}")))?;
                let end = chrono::NaiveTime::parse_from_str(end, "%H:%M")
                    .map_err(|e| RemoteError::Payload(format!("bad period time {end:?}: {e}")))?;
                Ok((start, end))
            })
            .collect::<Result<Vec<_>, RemoteError>>()?;
        grid.set_period_times(times);
        for state in &self.cells {
            if let Some(entry) = &state.entry {
                let mut entry = entry.clone();
                entry.position = state.position;
                grid.place(entry)
                    .map_err(|e| RemoteError::Payload(e.to_string()))?;
            }
        }
        for pos in &self.locked {
            grid.set_editable(*pos, false);
        }
        Ok(grid)
    }
}

/// Source of the initial grid for a template.
pub trait TimetableSource: Send + Sync {
    fn fetch_grid(&self, template_id: u64) -> Result<GridPayload, RemoteError>;
}

/// HTTP client against the scheduler server.
pub struct HttpClient {
    base: String,
    http: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Decode a mutation response, mapping client errors (occupancy
    /// conflicts, constraint violations) onto their server message.
    fn read_mutation(resp: reqwest::blocking::Response) -> Result<Vec<CellState>, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            let body: MutationResponse = resp
                .json()
                .map_err(|e| RemoteError::Payload(e.to_string()))?;
            return Ok(body.cells);
        }
        let fallback = format!("server returned {}", status);
        if status.is_client_error() {
            let message = resp
                .json::<ErrorResponse>()
                .map(|e| e.message)
                .unwrap_or(fallback);
            warn!(%status, %message, "mutation rejected");
            return Err(RemoteError::Conflict { message });
        }
        Err(RemoteError::Network(fallback))
    }

    fn post_mutation<B: Serialize>(&self, body: &B) -> Result<Vec<CellState>, RemoteError> {
        let resp = self
            .http
            .post(self.url("/api/update-entry/"))
            .json(body)
            .send()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Self::read_mutation(resp)
    }
}

impl BatchLookup for HttpClient {
    fn department_batches(
        &self,
        department: &str,
        semester: u8,
    ) -> Result<Vec<BatchInfo>, RemoteError> {
        debug!(department, semester, "looking up batches");
        let semester = semester.to_string();
        let resp = self
            .http
            .get(self.url("/api/department-batches/"))
            .query(&[("department_id", department), ("semester", semester.as_str())])
            .send()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(RemoteError::Network(format!(
                "server returned {}",
                resp.status()
            )));
        }
        let body: BatchResponse = resp
            .json()
            .map_err(|e| RemoteError::Payload(e.to_string()))?;
        Ok(body.batches)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest {
    entry_id: EntryId,
    delete: bool,
}

impl EntryMutation for HttpClient {
    fn move_entry(&self, req: &MoveRequest) -> Result<Vec<CellState>, RemoteError> {
        debug!(entry = req.entry_id, mode = ?req.mode, "dispatching move");
        self.post_mutation(req)
    }

    fn save_entry(&self, req: &EntrySave) -> Result<Vec<CellState>, RemoteError> {
        debug!(entry = ?req.entry_id, "dispatching save");
        self.post_mutation(req)
    }

    fn delete_entry(&self, entry_id: EntryId) -> Result<Vec<CellState>, RemoteError> {
        debug!(entry = entry_id, "dispatching delete");
        self.post_mutation(&DeleteRequest {
            entry_id,
            delete: true,
        })
    }
}

impl TimetableSource for HttpClient {
    fn fetch_grid(&self, template_id: u64) -> Result<GridPayload, RemoteError> {
        let resp = self
            .http
            .get(self.url(&format!("/api/timetable/{}/", template_id)))
            .send()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(RemoteError::Network(format!(
                "server returned {}",
                resp.status()
            )));
        }
        resp.json().map_err(|e| RemoteError::Payload(e.to_string()))
    }
}
