use std::fs::File;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, warn};

use crate::batches::BatchPanel;
use crate::config::{Config, ConfigStore, Theme};
use crate::export;
use crate::filter::{options, visible, FilterKind, FilterSet, ViewMode};
use crate::grid::{Day, Position, TimetableGrid};
use crate::remote::{BatchLookup, EntryMutation, TimetableSource};
use crate::runtime::{AppEvent, NetResponse};
use crate::session::{EditingSession, EditorKind, Rejection, Resolution};
use crate::TICK_RATE_MS;

/// Notices auto-dismiss after the same five seconds the web front end used.
const NOTICE_TICKS: u32 = (5000 / TICK_RATE_MS) as u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// Transient status-line message with a tick-driven lifetime, independent
/// of any editing state.
#[derive(Clone, Debug)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    ticks_left: u32,
}

impl Notice {
    fn new(text: impl Into<String>, kind: NoticeKind) -> Self {
        Self {
            text: text.into(),
            kind,
            ticks_left: NOTICE_TICKS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overlay {
    None,
    Batches,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Continue,
    Quit,
}

/// Handles on the external collaborators. Worker threads clone these.
#[derive(Clone)]
pub struct Services {
    pub batches: Arc<dyn BatchLookup>,
    pub mutations: Arc<dyn EntryMutation>,
    pub timetables: Arc<dyn TimetableSource>,
}

impl Services {
    /// One backend serving all three contracts (HTTP client or local stub).
    pub fn shared<S>(service: Arc<S>) -> Self
    where
        S: BatchLookup + EntryMutation + TimetableSource + 'static,
    {
        Self {
            batches: service.clone(),
            mutations: service.clone(),
            timetables: service,
        }
    }
}

pub struct App {
    pub server_url: String,
    pub grid: TimetableGrid,
    pub session: EditingSession,
    pub filters: FilterSet,
    pub view: ViewMode,
    pub cursor: Position,
    pub batch_panel: BatchPanel,
    pub overlay: Overlay,
    pub theme: Theme,
    pub notice: Option<Notice>,
    pub last_synced: Option<SystemTime>,
    services: Services,
    config_store: Box<dyn ConfigStore + Send>,
    tx: Sender<AppEvent>,
    reload_in_flight: bool,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Services")
    }
}

impl App {
    pub fn new(
        server_url: String,
        template_id: u64,
        grid: TimetableGrid,
        services: Services,
        config_store: Box<dyn ConfigStore + Send>,
        tx: Sender<AppEvent>,
    ) -> Self {
        let theme = config_store.load().theme;
        Self {
            server_url,
            grid,
            session: EditingSession::new(template_id),
            filters: FilterSet::default(),
            view: ViewMode::Week,
            cursor: Position::new(0, 0),
            batch_panel: BatchPanel::new(),
            overlay: Overlay::None,
            theme,
            notice: None,
            last_synced: Some(SystemTime::now()),
            services,
            config_store,
            tx,
            reload_in_flight: false,
        }
    }

    pub fn notify(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.notice = Some(Notice::new(text, kind));
    }

    /// Entries currently visible under the active filters and view mode.
    pub fn visible_entries(&self) -> Vec<&crate::grid::TimetableEntry> {
        visible(self.grid.entries(), &self.filters, self.view)
    }

    pub fn on_tick(&mut self) {
        if let Some(notice) = &mut self.notice {
            notice.ticks_left = notice.ticks_left.saturating_sub(1);
            if notice.ticks_left == 0 {
                self.notice = None;
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Signal {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Signal::Quit;
        }
        if self.session.form().is_some() {
            self.handle_editor_key(key);
            return Signal::Continue;
        }
        if self.overlay == Overlay::Batches {
            self.handle_batch_key(key);
            return Signal::Continue;
        }
        self.handle_grid_key(key)
    }

    fn handle_grid_key(&mut self, key: KeyEvent) -> Signal {
        match key.code {
            KeyCode::Char('q') => return Signal::Quit,
            KeyCode::Esc => {
                if self.session.held().is_some() {
                    self.session.cancel_drag();
                } else if self.session.edit_mode() {
                    self.session.disable_edit(&mut self.grid);
                } else {
                    return Signal::Quit;
                }
            }
            KeyCode::Char('e') => {
                if self.session.edit_mode() {
                    self.session.disable_edit(&mut self.grid);
                } else {
                    self.session.enable_edit();
                }
            }
            KeyCode::Up => self.move_cursor(0, -1),
            KeyCode::Down => self.move_cursor(0, 1),
            KeyCode::Left => self.move_cursor(-1, 0),
            KeyCode::Right => self.move_cursor(1, 0),
            KeyCode::Enter => self.try_begin_edit(EditorKind::Modal),
            KeyCode::Char('i') => self.try_begin_edit(EditorKind::Inline),
            KeyCode::Char(' ') => self.pick_or_drop(),
            KeyCode::Char('d') => self.try_delete(),
            KeyCode::Char('v') => {
                self.view = match self.view {
                    ViewMode::Week => ViewMode::Day(
                        Day::from_index(self.cursor.day).unwrap_or(Day::Monday),
                    ),
                    ViewMode::Day(_) => ViewMode::Week,
                };
            }
            KeyCode::Char('[') => self.shift_day(-1),
            KeyCode::Char(']') => self.shift_day(1),
            KeyCode::Char('1') => self.cycle_filter(FilterKind::Batch),
            KeyCode::Char('2') => self.cycle_filter(FilterKind::Faculty),
            KeyCode::Char('3') => self.cycle_filter(FilterKind::Room),
            KeyCode::Char('0') => {
                self.filters.clear();
                self.notify(NoticeKind::Info, "Filters cleared");
            }
            KeyCode::Char('b') => self.overlay = Overlay::Batches,
            KeyCode::Char('x') => self.open_export(),
            KeyCode::Char('c') => self.write_snapshot(),
            KeyCode::Char('t') => self.toggle_theme(),
            KeyCode::Char('r') => self.reload(),
            _ => {}
        }
        Signal::Continue
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.session.cancel_edit(),
            KeyCode::Tab | KeyCode::Down => {
                if let Some(form) = self.session.form_mut() {
                    form.focus_next();
                }
            }
            KeyCode::BackTab | KeyCode::Up => {
                if let Some(form) = self.session.form_mut() {
                    form.focus_prev();
                }
            }
            KeyCode::Backspace => {
                if let Some(form) = self.session.form_mut() {
                    form.backspace();
                }
            }
            KeyCode::Enter => match self.session.submit_edit() {
                Ok((ticket, request)) => {
                    let svc = self.services.mutations.clone();
                    let tx = self.tx.clone();
                    thread::spawn(move || {
                        let result = svc.save_entry(&request);
                        let _ = tx.send(AppEvent::Net(NetResponse::MutationSettled {
                            ticket,
                            result,
                        }));
                    });
                }
                Err(Rejection::Busy) => {}
                Err(rejection) => self.notify(NoticeKind::Warning, rejection.to_string()),
            },
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(form) = self.session.form_mut() {
                    form.push_char(c);
                }
            }
            _ => {}
        }
    }

    fn handle_batch_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.overlay = Overlay::None;
            }
            KeyCode::Tab | KeyCode::Up | KeyCode::Down => {
                self.batch_panel.semester_focused = !self.batch_panel.semester_focused;
            }
            KeyCode::Backspace => {
                self.batch_panel.input_errors.clear();
                if self.batch_panel.semester_focused {
                    self.batch_panel.semester.pop();
                } else {
                    self.batch_panel.department.pop();
                }
            }
            KeyCode::Enter => match self.batch_panel.start_lookup() {
                Ok(query) => {
                    let svc = self.services.batches.clone();
                    let tx = self.tx.clone();
                    let sent = query.clone();
                    thread::spawn(move || {
                        let result = svc.department_batches(&sent.department, sent.semester);
                        let _ = tx.send(AppEvent::Net(NetResponse::BatchesLoaded {
                            query: sent,
                            result,
                        }));
                    });
                    debug!(department = %query.department, semester = query.semester, "batch lookup dispatched");
                }
                Err(errors) => {
                    let text = errors
                        .iter()
                        .map(|e| e.message())
                        .collect::<Vec<_>>()
                        .join("; ");
                    self.notify(NoticeKind::Warning, text);
                }
            },
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.batch_panel.input_errors.clear();
                if self.batch_panel.semester_focused {
                    self.batch_panel.semester.push(c);
                } else {
                    self.batch_panel.department.push(c);
                }
            }
            _ => {}
        }
    }

    pub fn on_net(&mut self, response: NetResponse) {
        match response {
            NetResponse::MutationSettled { ticket, result } => {
                match self.session.resolve(&mut self.grid, ticket, result) {
                    Resolution::Applied => {
                        self.last_synced = Some(SystemTime::now());
                        self.notify(NoticeKind::Info, "Saved");
                    }
                    Resolution::RolledBack(message) => {
                        self.notify(NoticeKind::Error, message);
                    }
                    Resolution::Stale => {
                        debug!(ticket, "discarding stale mutation response");
                    }
                }
            }
            NetResponse::BatchesLoaded { query, result } => {
                self.batch_panel.resolve(&query, result);
            }
            NetResponse::GridLoaded { result } => {
                self.reload_in_flight = false;
                match result.and_then(|payload| payload.build()) {
                    Ok(grid) => {
                        let template_id = self.session.template_id();
                        self.grid = grid;
                        self.session = EditingSession::new(template_id);
                        self.clamp_cursor();
                        self.last_synced = Some(SystemTime::now());
                        self.notify(NoticeKind::Info, "Timetable reloaded");
                    }
                    Err(err) => {
                        warn!(%err, "reload failed");
                        self.notify(NoticeKind::Error, err.to_string());
                    }
                }
            }
        }
    }

    fn try_begin_edit(&mut self, kind: EditorKind) {
        match self.session.begin_edit(&self.grid, self.cursor, kind) {
            Ok(()) => {}
            Err(Rejection::Busy) => {}
            Err(rejection) => self.notify(NoticeKind::Warning, rejection.to_string()),
        }
    }

    fn pick_or_drop(&mut self) {
        if self.session.held().is_none() {
            match self.session.begin_drag(&self.grid, self.cursor) {
                Ok(()) | Err(Rejection::Busy) => {}
                Err(rejection) => self.notify(NoticeKind::Warning, rejection.to_string()),
            }
            return;
        }
        match self.session.drop_on(&mut self.grid, self.cursor) {
            Ok(None) => {}
            Ok(Some((ticket, request))) => {
                let svc = self.services.mutations.clone();
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let result = svc.move_entry(&request);
                    let _ = tx.send(AppEvent::Net(NetResponse::MutationSettled {
                        ticket,
                        result,
                    }));
                });
            }
            Err(Rejection::Busy) => {}
            Err(rejection) => self.notify(NoticeKind::Warning, rejection.to_string()),
        }
    }

    fn try_delete(&mut self) {
        match self.session.delete_at(&self.grid, self.cursor) {
            Ok((ticket, entry_id)) => {
                let svc = self.services.mutations.clone();
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let result = svc.delete_entry(entry_id);
                    let _ = tx.send(AppEvent::Net(NetResponse::MutationSettled {
                        ticket,
                        result,
                    }));
                });
            }
            Err(Rejection::Busy) => {}
            Err(rejection) => self.notify(NoticeKind::Warning, rejection.to_string()),
        }
    }

    fn reload(&mut self) {
        if self.reload_in_flight {
            return;
        }
        if self.session.busy() {
            self.notify(NoticeKind::Warning, Rejection::Busy.to_string());
            return;
        }
        self.reload_in_flight = true;
        let svc = self.services.timetables.clone();
        let tx = self.tx.clone();
        let template_id = self.session.template_id();
        thread::spawn(move || {
            let result = svc.fetch_grid(template_id);
            let _ = tx.send(AppEvent::Net(NetResponse::GridLoaded { result }));
        });
    }

    fn open_export(&mut self) {
        let template_id = self.session.template_id();
        match export::open_export(&self.server_url, template_id) {
            Ok(()) => self.notify(NoticeKind::Info, "Export opened in browser"),
            Err(err) => self.notify(NoticeKind::Error, format!("Export failed: {}", err)),
        }
    }

    fn write_snapshot(&mut self) {
        let filename = export::snapshot_filename(self.session.template_id());
        let result = File::create(&filename)
            .map_err(|e| e.to_string())
            .and_then(|file| {
                export::write_csv(&self.grid, &self.filters, self.view, file)
                    .map_err(|e| e.to_string())
            });
        match result {
            Ok(()) => self.notify(NoticeKind::Info, format!("Wrote {}", filename)),
            Err(err) => self.notify(NoticeKind::Error, format!("Snapshot failed: {}", err)),
        }
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggle();
        if let Err(err) = self.config_store.save(&Config { theme: self.theme }) {
            warn!(%err, "failed to persist theme");
        }
    }

    fn cycle_filter(&mut self, kind: FilterKind) {
        let opts = options(self.grid.entries(), kind);
        self.filters.cycle(kind, &opts);
        let label = match self.filters.get(kind) {
            Some(value) => format!("{}: {}", kind, value),
            None => format!("{}: all", kind),
        };
        self.notify(NoticeKind::Info, label);
    }

    fn move_cursor(&mut self, dx: i16, dy: i16) {
        let days = self.grid.days() as i16;
        let periods = self.grid.periods() as i16;
        if days == 0 || periods == 0 {
            return;
        }
        match self.view {
            ViewMode::Week => {
                let day = (self.cursor.day as i16 + dx).clamp(0, days - 1);
                let period = (self.cursor.period as i16 + dy).clamp(0, periods - 1);
                self.cursor = Position::new(day as u8, period as u8);
            }
            ViewMode::Day(_) => {
                // single column: horizontal movement switches the day
                if dx != 0 {
                    self.shift_day(dx);
                }
                let period = (self.cursor.period as i16 + dy).clamp(0, periods - 1);
                self.cursor.period = period as u8;
            }
        }
    }

    fn shift_day(&mut self, delta: i16) {
        let days = self.grid.days() as i16;
        if days == 0 {
            return;
        }
        let day = (self.cursor.day as i16 + delta).rem_euclid(days) as u8;
        self.cursor.day = day;
        if let ViewMode::Day(_) = self.view {
            self.view = ViewMode::Day(Day::from_index(day).unwrap_or(Day::Monday));
        }
    }

    fn clamp_cursor(&mut self) {
        let days = self.grid.days().max(1);
        let periods = self.grid.periods().max(1);
        self.cursor.day = self.cursor.day.min(days - 1);
        self.cursor.period = self.cursor.period.min(periods - 1);
    }

    /// Humanized age of the last acknowledged sync, for the status line.
    pub fn synced_ago(&self) -> Option<String> {
        let elapsed = self.last_synced?.elapsed().ok()?;
        let human = time_humanize::HumanTime::from(elapsed)
            .to_text_en(time_humanize::Accuracy::Rough, time_humanize::Tense::Past);
        Some(format!("synced {}", human))
    }
}
