use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs,
    io::{self, stdin},
    sync::Arc,
    time::Duration,
};
use tracing::info;

use slotgrid::app::{App, Services, Signal};
use slotgrid::app_dirs::AppDirs;
use slotgrid::config::FileConfigStore;
use slotgrid::local::LocalService;
use slotgrid::remote::{BatchInfo, GridPayload, HttpClient, TimetableSource};
use slotgrid::runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner};
use slotgrid::{filter, grid::TimetableGrid, sample, TICK_RATE_MS};

/// terminal timetable editor with move/swap gestures and live filters
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal client for a remote timetable scheduler: renders a template's grid, \
moves and swaps entries with pick-up/drop gestures, edits cells in place, and projects the grid \
through batch/faculty/room filters."
)]
pub struct Cli {
    /// timetable template id to open
    #[clap(short = 't', long, default_value_t = 1)]
    template: u64,

    /// scheduler server base url
    #[clap(short = 's', long, default_value = "http://localhost:8000")]
    server: String,

    /// open an embedded demo timetable instead of contacting the server
    #[clap(long, value_name = "NAME")]
    demo: Option<String>,

    /// list the embedded demo timetables and exit
    #[clap(long)]
    list_demos: bool,
}

fn init_tracing() {
    // Only log when asked to; the alternate screen owns the terminal, so
    // output goes to a file under the state dir.
    let Ok(level) = std::env::var("RUST_LOG") else {
        return;
    };
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(file) = fs::File::options().create(true).append(true).open(&path) else {
        return;
    };
    tracing_subscriber::fmt()
        .with_max_level(level.parse().unwrap_or(tracing::Level::INFO))
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
}

/// Resolve the grid and backing services from the CLI: an embedded demo
/// template with an in-memory service, or the real HTTP client.
fn bootstrap(cli: &Cli) -> Result<(u64, TimetableGrid, Services), Box<dyn Error>> {
    if let Some(name) = &cli.demo {
        let (template_id, payload) = sample::payload(name)?;
        let grid = payload.build()?;
        let service = Arc::new(local_service_for(name, &payload, &grid));
        info!(template_id, demo = %name, "demo timetable loaded");
        return Ok((template_id, grid, Services::shared(service)));
    }

    let client = Arc::new(HttpClient::new(&cli.server)?);
    let payload = client.fetch_grid(cli.template)?;
    let grid = payload.build()?;
    info!(template = cli.template, server = %cli.server, "timetable fetched");
    Ok((cli.template, grid, Services::shared(client)))
}

fn local_service_for(name: &str, payload: &GridPayload, grid: &TimetableGrid) -> LocalService {
    let service = LocalService::from_payload(payload);
    // demo batches: the department code is the demo name's prefix, the
    // batch names come from the grid itself
    if let Some((department, semester)) = parse_demo_name(name) {
        let batches = filter::options(grid.entries(), filter::FilterKind::Batch)
            .into_iter()
            .enumerate()
            .map(|(i, name)| BatchInfo {
                id: i as u64 + 1,
                name,
                semester,
            })
            .collect();
        service.seed_batches(&department, batches);
    }
    service
}

/// "cs-sem3" → ("CS", 3)
fn parse_demo_name(name: &str) -> Option<(String, u8)> {
    let (department, rest) = name.split_once("-sem")?;
    let semester = rest.parse().ok()?;
    Some((department.to_uppercase(), semester))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    if cli.list_demos {
        for name in sample::available() {
            println!("{}", name);
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let (template_id, grid, services) = bootstrap(&cli)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = CrosstermEventSource::new();
    let tx = events.sender();
    let mut app = App::new(
        cli.server.clone(),
        template_id,
        grid,
        services,
        Box::new(FileConfigStore::new()),
        tx,
    );
    let result = start_tui(&mut terminal, &mut app, events);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: CrosstermEventSource,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => {}
            AppEvent::Net(response) => app.on_net(response),
            AppEvent::Key(key) => {
                if app.handle_key(key) == Signal::Quit {
                    break;
                }
            }
        }
    }

    Ok(())
}
