use std::io::Write;

use crate::filter::{visible, FilterSet, ViewMode};
use crate::grid::{Day, TimetableGrid};

/// Server-side export is a plain navigation; the client only builds the URL.
pub fn export_url(base: &str, template_id: u64) -> String {
    format!(
        "{}/timetable/{}/export/",
        base.trim_end_matches('/'),
        template_id
    )
}

/// Hand the export URL to the system browser, which performs the download.
pub fn open_export(base: &str, template_id: u64) -> std::io::Result<()> {
    webbrowser::open(&export_url(base, template_id))
}

/// Write the currently visible grid as CSV, in the server export's column
/// layout: Batch, Day, Time, Course, Faculty, Room.
pub fn write_csv<W: Write>(
    grid: &TimetableGrid,
    filters: &FilterSet,
    view: ViewMode,
    out: W,
) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["Batch", "Day", "Time", "Course", "Faculty", "Room"])?;

    let mut rows = visible(grid.entries(), filters, view);
    rows.sort_by(|a, b| {
        (a.batch.as_str(), a.position)
            .cmp(&(b.batch.as_str(), b.position))
    });
    for entry in rows {
        let day = Day::from_index(entry.position.day)
            .map(|d| d.to_string())
            .unwrap_or_else(|| format!("Day {}", entry.position.day + 1));
        let time = match grid.period_time(entry.position.period) {
            Some((start, end)) => format!(
                "{} - {}",
                start.format("%H:%M"),
                end.format("%H:%M")
            ),
            None => format!("Period {}", entry.position.period + 1),
        };
        writer.write_record([
            entry.batch.as_str(),
            day.as_str(),
            time.as_str(),
            entry.course.as_str(),
            entry.faculty.as_str(),
            entry.room.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn snapshot_filename(template_id: u64) -> String {
    format!("timetable_{}.csv", template_id)
}
