use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, NoticeKind, Overlay};
use crate::batches::BatchList;
use crate::config::Theme;
use crate::editor::Field;
use crate::filter::ViewMode;
use crate::grid::{Day, Position};
use crate::session::EditState;

const CELL_WIDTH: u16 = 18;

/// Palette resolved from the persisted theme preference.
struct Palette {
    text: Color,
    dim: Color,
    accent: Color,
    ok: Color,
    warn: Color,
    error: Color,
    held: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Palette {
                text: Color::Black,
                dim: Color::DarkGray,
                accent: Color::Blue,
                ok: Color::Green,
                warn: Color::Yellow,
                error: Color::Red,
                held: Color::Magenta,
            },
            Theme::Dark => Palette {
                text: Color::White,
                dim: Color::Gray,
                accent: Color::Cyan,
                ok: Color::LightGreen,
                warn: Color::LightYellow,
                error: Color::LightRed,
                held: Color::LightMagenta,
            },
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        if out.width() + 2 > width {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let palette = Palette::for_theme(self.theme);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // title
                Constraint::Min(4),    // grid
                Constraint::Length(1), // status
                Constraint::Length(1), // key help
            ])
            .split(area);

        render_title(self, &palette, chunks[0], buf);
        render_grid(self, &palette, chunks[1], buf);
        render_status(self, &palette, chunks[2], buf);
        render_help(self, &palette, chunks[3], buf);

        match (self.session.form(), self.overlay) {
            (Some(_), _) => render_editor(self, &palette, area, buf),
            (None, Overlay::Batches) => render_batches(self, &palette, area, buf),
            _ => {}
        }
    }
}

fn render_title(app: &App, palette: &Palette, area: Rect, buf: &mut Buffer) {
    let mut spans = vec![
        Span::styled(
            format!(" slotgrid · template {} ", app.session.template_id()),
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("· {} view ", app.view.label()), Style::default().fg(palette.text)),
    ];
    if app.session.edit_mode() {
        spans.push(Span::styled(
            "· EDIT ",
            Style::default().fg(palette.warn).add_modifier(Modifier::BOLD),
        ));
    }
    if app.session.busy() {
        spans.push(Span::styled("· saving… ", Style::default().fg(palette.dim)));
    }
    for (name, value) in [
        ("batch", &app.filters.batch),
        ("faculty", &app.filters.faculty),
        ("room", &app.filters.room),
    ] {
        if let Some(value) = value {
            spans.push(Span::styled(
                format!("· {}={} ", name, value),
                Style::default().fg(palette.accent),
            ));
        }
    }
    Paragraph::new(Line::from(spans)).render(area, buf);
}

fn visible_days(app: &App) -> Vec<u8> {
    match app.view {
        ViewMode::Week => (0..app.grid.days()).collect(),
        ViewMode::Day(day) => vec![day.index()],
    }
}

fn render_grid(app: &App, palette: &Palette, area: Rect, buf: &mut Buffer) {
    let days = visible_days(app);

    let mut header_cells = vec![Cell::from("")];
    for day in &days {
        let label = Day::from_index(*day)
            .map(|d| d.short().to_string())
            .unwrap_or_else(|| format!("D{}", day + 1));
        header_cells.push(
            Cell::from(label).style(
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
        );
    }
    let header = Row::new(header_cells);

    let mut rows = Vec::new();
    for period in 0..app.grid.periods() {
        let time_label = match app.grid.period_time(period) {
            Some((start, _)) => start.format("%H:%M").to_string(),
            None => format!("P{}", period + 1),
        };
        let mut cells = vec![Cell::from(time_label).style(Style::default().fg(palette.dim))];
        for day in &days {
            let pos = Position::new(*day, period);
            cells.push(grid_cell(app, palette, pos));
        }
        rows.push(Row::new(cells));
    }

    let mut widths = vec![Constraint::Length(6)];
    widths.extend(days.iter().map(|_| Constraint::Length(CELL_WIDTH)));

    Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Timetable"))
        .render(area, buf);
}

fn grid_cell<'a>(app: &App, palette: &Palette, pos: Position) -> Cell<'a> {
    let cell = match app.grid.cell(pos) {
        Some(cell) => cell,
        None => return Cell::from(""),
    };
    let entry = app.grid.entry_at(pos);

    let filtered_out = entry.is_some_and(|e| !app.filters.matches(e));
    let text = match entry {
        Some(_) if filtered_out => "·".to_string(),
        Some(entry) => truncate(&entry.course, CELL_WIDTH as usize - 1),
        None => String::new(),
    };

    let mut style = Style::default().fg(palette.text);
    if filtered_out {
        style = Style::default().fg(palette.dim);
    }
    if !cell.editable {
        style = style.add_modifier(Modifier::DIM);
    }
    if app.session.held() == Some(pos) {
        style = style.fg(palette.held).add_modifier(Modifier::BOLD);
    }
    if let EditState::MovePending { from, to } = *app.session.state() {
        if pos == from || pos == to {
            style = style.fg(palette.warn).add_modifier(Modifier::ITALIC);
        }
    }
    if pos == app.cursor {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Cell::from(text).style(style)
}

fn render_status(app: &App, palette: &Palette, area: Rect, buf: &mut Buffer) {
    let line = match &app.notice {
        Some(notice) => {
            let color = match notice.kind {
                NoticeKind::Info => palette.ok,
                NoticeKind::Warning => palette.warn,
                NoticeKind::Error => palette.error,
            };
            Line::from(Span::styled(
                format!(" {}", notice.text),
                Style::default().fg(color),
            ))
        }
        None => {
            let synced = app.synced_ago().unwrap_or_else(|| "not synced".into());
            Line::from(Span::styled(
                format!(" {}", synced),
                Style::default().fg(palette.dim),
            ))
        }
    };
    Paragraph::new(line).render(area, buf);
}

fn render_help(app: &App, palette: &Palette, area: Rect, buf: &mut Buffer) {
    let help = if app.session.form().is_some() {
        "(tab) next field (enter) save (esc) cancel"
    } else if app.overlay == Overlay::Batches {
        "(tab) switch input (enter) look up (esc) close"
    } else if app.session.edit_mode() {
        "(space) pick/drop (enter) edit (i) quick edit (d)elete (e)xit edit (esc) back"
    } else {
        "(e)dit (v)iew [/] day (1/2/3) filters (0) clear (b)atches (x)port (c)sv (t)heme (r)eload (q)uit"
    };
    Paragraph::new(Span::styled(
        format!(" {}", help),
        Style::default().fg(palette.dim).add_modifier(Modifier::ITALIC),
    ))
    .render(area, buf);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

fn render_editor(app: &App, palette: &Palette, area: Rect, buf: &mut Buffer) {
    let Some(form) = app.session.form() else {
        return;
    };
    let popup = centered(area, 46, 12);
    Clear.render(popup, buf);

    let title = match form.mode {
        crate::editor::FormMode::Add => format!("Add entry at {}", form.cell),
        crate::editor::FormMode::Edit(id) => format!("Edit entry {} at {}", id, form.cell),
    };

    let mut lines = Vec::new();
    for field in Field::ALL {
        let marker = if form.focus == field { "▸" } else { " " };
        let style = if form.focus == field {
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text)
        };
        lines.push(Line::from(Span::styled(
            format!("{} {:<8} {}", marker, field, form.value(field)),
            style,
        )));
        if let Some(err) = form.errors.iter().find(|e| e.field == field) {
            lines.push(Line::from(Span::styled(
                format!("    {} {}", field, err.message),
                Style::default().fg(palette.error),
            )));
        }
    }

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .render(popup, buf);
}

fn render_batches(app: &App, palette: &Palette, area: Rect, buf: &mut Buffer) {
    let popup = centered(area, 44, 14);
    Clear.render(popup, buf);

    let panel = &app.batch_panel;
    let focus_style = Style::default().fg(palette.accent).add_modifier(Modifier::BOLD);
    let plain = Style::default().fg(palette.text);

    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                "{} department {}",
                if panel.semester_focused { " " } else { "▸" },
                panel.department
            ),
            if panel.semester_focused { plain } else { focus_style },
        )),
        Line::from(Span::styled(
            format!(
                "{} semester   {}",
                if panel.semester_focused { "▸" } else { " " },
                panel.semester
            ),
            if panel.semester_focused { focus_style } else { plain },
        )),
    ];
    for err in &panel.input_errors {
        lines.push(Line::from(Span::styled(
            format!("  {}", err.message()),
            Style::default().fg(palette.error),
        )));
    }
    lines.push(Line::from(""));

    match panel.list() {
        BatchList::Loaded(batches) => {
            for batch in batches {
                lines.push(Line::from(Span::styled(
                    format!("  {} - Semester {}", batch.name, batch.semester),
                    plain,
                )));
            }
        }
        _ => {
            lines.push(Line::from(Span::styled(
                format!("  {}", panel.status_line()),
                Style::default().fg(palette.dim),
            )));
        }
    }

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Batches"))
        .alignment(Alignment::Left)
        .render(popup, buf);
}
