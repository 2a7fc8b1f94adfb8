//! glint entrypoint: a pager-style demo wired through the coalescing
//! render pipeline (frame pump, scheduler, part registry, writer).

use anyhow::Result;
use clap::Parser;
use core_config::load_from;
use core_events::{
    CHANNEL_BLOCKING_SENDS, EVENT_CHANNEL_CAP, Event, EventSourceRegistry, FramePump, InputEvent,
    KeyCode, KeyEvent, KeyModifiers, TickEventSource,
};
use core_render::parts::{
    SelectionHandle, SelectionOverlayPart, StatusHandle, StatusPart, TextHandle, TextLinesPart,
};
use core_render::scheduler::RenderScheduler;
use core_render::writer::{Writer, emit};
use core_render::Surface;
use core_terminal::{CrosstermBackend, TerminalBackend, clamp_size};
use core_view::{PartRegistry, SelectionSpan, ViewportSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

const STATUS_ROWS: u16 = 1;
const EPHEMERAL_TTL: Duration = Duration::from_secs(3);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "glint", version, about = "glint viewer")] // minimal metadata
struct Args {
    /// Optional path to view at startup (UTF-8 text). If omitted a welcome
    /// buffer is used.
    pub path: Option<PathBuf>,
    /// Optional configuration file path (overrides discovery of `glint.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("glint.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "glint.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// Viewer-side state the snapshot is derived from.
struct Viewport {
    first_line: usize,
    first_column: usize,
    text_rows: u16,
    width: u16,
    cursor_line: usize,
    cursor_col: usize,
    line_count: usize,
    selections: Vec<SelectionSpan>,
}

impl Viewport {
    fn new(width: u16, height: u16, line_count: usize) -> Self {
        Self {
            first_line: 0,
            first_column: 0,
            text_rows: height.saturating_sub(STATUS_ROWS).max(1),
            width,
            cursor_line: 0,
            cursor_col: 0,
            line_count,
            selections: Vec::new(),
        }
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.text_rows = height.saturating_sub(STATUS_ROWS).max(1);
        self.scroll_cursor_into_view();
    }

    fn snapshot(&self) -> ViewportSnapshot {
        ViewportSnapshot::new(
            self.first_line,
            self.text_rows,
            self.first_column,
            self.width,
            self.selections.clone(),
        )
    }

    fn move_cursor(&mut self, d_line: isize, d_col: isize) {
        let max_line = self.line_count.saturating_sub(1);
        self.cursor_line = self
            .cursor_line
            .saturating_add_signed(d_line)
            .min(max_line);
        self.cursor_col = self.cursor_col.saturating_add_signed(d_col);
        self.scroll_cursor_into_view();
    }

    fn scroll_cursor_into_view(&mut self) {
        if self.cursor_line < self.first_line {
            self.first_line = self.cursor_line;
        }
        let last_visible = self.first_line + self.text_rows as usize - 1;
        if self.cursor_line > last_visible {
            self.first_line = self.cursor_line - self.text_rows as usize + 1;
        }
        if self.cursor_col < self.first_column {
            self.first_column = self.cursor_col;
        }
        let last_col = self.first_column + self.width.saturating_sub(1) as usize;
        if self.cursor_col > last_col {
            self.first_column = self.cursor_col - self.width.saturating_sub(1) as usize;
        }
    }

    /// Returns true when an existing selection was removed.
    fn toggle_line_selection(&mut self, line_len: usize) -> bool {
        let line = self.cursor_line;
        if let Some(pos) = self.selections.iter().position(|s| s.line == line) {
            self.selections.remove(pos);
            return true;
        }
        if line_len > 0 {
            let end = line_len.min(u16::MAX as usize) as u16;
            self.selections.push(SelectionSpan::new(line, 0, end));
        }
        false
    }
}

fn welcome_lines() -> Vec<String> {
    vec![
        "glint".to_string(),
        String::new(),
        "arrows  move / scroll".to_string(),
        "s       toggle line selection".to_string(),
        "c       clear selections".to_string(),
        "q       quit".to_string(),
    ]
}

fn load_lines(args: &Args) -> (Vec<String>, bool) {
    let Some(path) = args.path.as_ref() else {
        return (welcome_lines(), false);
    };
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let lines: Vec<String> = content.lines().map(str::to_string).collect();
            tracing::debug!(target: "io", file = %path.display(), line_count = lines.len(), "file_read_ok");
            (lines, false)
        }
        Err(e) => {
            error!(target: "io", ?e, "file_open_error");
            (welcome_lines(), true)
        }
    }
}

/// Blocking input thread: reads crossterm events and forwards normalized ones
/// over the bounded channel. `blocking_send` parks on backpressure instead of
/// dropping events; the thread exits once the consumer closes the channel.
fn spawn_input_thread(tx: mpsc::Sender<Event>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        loop {
            if tx.is_closed() {
                break;
            }
            match crossterm::event::poll(Duration::from_millis(100)) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    error!(target: "runtime.input", ?e, "poll_failed");
                    break;
                }
            }
            let event = match crossterm::event::read() {
                Ok(ev) => ev,
                Err(e) => {
                    error!(target: "runtime.input", ?e, "read_failed");
                    break;
                }
            };
            let Some(translated) = translate(event) else {
                continue;
            };
            if tx.blocking_send(Event::Input(translated)).is_err() {
                break;
            }
            CHANNEL_BLOCKING_SENDS.fetch_add(1, Ordering::Relaxed);
        }
    })
}

fn translate(event: crossterm::event::Event) -> Option<InputEvent> {
    use crossterm::event::{Event as CtEvent, KeyCode as CtKey, KeyEventKind, KeyModifiers as CtMods};
    match event {
        CtEvent::Key(key) if key.kind != KeyEventKind::Release => {
            if key.modifiers.contains(CtMods::CONTROL) && key.code == CtKey::Char('c') {
                return Some(InputEvent::CtrlC);
            }
            let code = match key.code {
                CtKey::Char(c) => KeyCode::Char(c),
                CtKey::Esc => KeyCode::Esc,
                CtKey::Up => KeyCode::Up,
                CtKey::Down => KeyCode::Down,
                CtKey::Left => KeyCode::Left,
                CtKey::Right => KeyCode::Right,
                _ => return None,
            };
            let mut mods = KeyModifiers::empty();
            if key.modifiers.contains(CtMods::CONTROL) {
                mods |= KeyModifiers::CTRL;
            }
            if key.modifiers.contains(CtMods::ALT) {
                mods |= KeyModifiers::ALT;
            }
            if key.modifiers.contains(CtMods::SHIFT) {
                mods |= KeyModifiers::SHIFT;
            }
            Some(InputEvent::Key(KeyEvent { code, mods }))
        }
        CtEvent::Resize(cols, rows) => Some(InputEvent::Resize(cols, rows)),
        _ => None,
    }
}

struct ViewerRuntime {
    viewport: Viewport,
    lines: Vec<String>,
    registry: PartRegistry,
    surface: Surface,
    scheduler: RenderScheduler<FramePump>,
    text: TextHandle,
    selection: SelectionHandle,
    status: StatusHandle,
    ephemeral_deadline: Option<Instant>,
}

impl ViewerRuntime {
    fn request_render(&mut self) {
        self.scheduler.request_render();
    }

    fn sync_status(&self) {
        self.status
            .set_position(self.viewport.cursor_line, self.viewport.cursor_col);
    }

    fn set_ephemeral(&mut self, message: &str) {
        self.status.set_message(message);
        self.ephemeral_deadline = Some(Instant::now() + EPHEMERAL_TTL);
    }

    fn paint(&mut self) -> Result<()> {
        let snapshot = self.viewport.snapshot();
        let mut source = move || snapshot.clone();
        let outcome = self.scheduler.flush_now(
            &mut source,
            &mut self.registry,
            &mut self.surface,
        );
        if !outcome.aborted {
            self.present()?;
        }
        Ok(())
    }

    fn on_frame(&mut self, token: u64) -> Result<()> {
        let snapshot = self.viewport.snapshot();
        let mut source = move || snapshot.clone();
        let outcome =
            self.scheduler
                .on_frame(token, &mut source, &mut self.registry, &mut self.surface);
        if let Some(outcome) = outcome
            && !outcome.aborted
        {
            self.present()?;
        }
        Ok(())
    }

    fn present(&self) -> Result<()> {
        let mut writer = Writer::new();
        emit(&self.surface, &mut writer);
        writer.flush(&mut std::io::stdout())
    }

    /// Returns true when the event requests shutdown.
    fn handle_input(&mut self, input: InputEvent) -> bool {
        match input {
            InputEvent::CtrlC => return true,
            InputEvent::Key(key) => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return true,
                KeyCode::Up => self.move_cursor(-1, 0),
                KeyCode::Down => self.move_cursor(1, 0),
                KeyCode::Left => self.move_cursor(0, -1),
                KeyCode::Right => self.move_cursor(0, 1),
                KeyCode::Char('s') => {
                    let len = self
                        .lines
                        .get(self.viewport.cursor_line)
                        .map(String::len)
                        .unwrap_or(0);
                    let removed = self.viewport.toggle_line_selection(len);
                    self.selection.mark();
                    if removed {
                        self.registry.force_all();
                    }
                    self.sync_status();
                    self.request_render();
                }
                KeyCode::Char('c') => {
                    if !self.viewport.selections.is_empty() {
                        self.viewport.selections.clear();
                        self.selection.mark();
                        // Reverse cells linger unless the rows repaint too.
                        self.registry.force_all();
                        self.request_render();
                    }
                }
                _ => {}
            },
            InputEvent::Resize(cols, rows) => {
                let (cols, rows) = clamp_size(cols, rows);
                self.viewport.resize(cols, rows);
                self.surface.resize(cols, rows);
                self.registry.force_all();
                if let Err(e) = self.paint() {
                    error!(target: "runtime", ?e, "resize_paint_failed");
                }
            }
        }
        false
    }

    fn move_cursor(&mut self, d_line: isize, d_col: isize) {
        let scrolled_from = (self.viewport.first_line, self.viewport.first_column);
        self.viewport.move_cursor(d_line, d_col);
        if (self.viewport.first_line, self.viewport.first_column) != scrolled_from {
            // Visible window moved; every part reads new geometry.
            self.registry.force_all();
        }
        self.sync_status();
        self.request_render();
    }

    fn expire_ephemeral(&mut self) {
        if let Some(deadline) = self.ephemeral_deadline
            && Instant::now() >= deadline
        {
            self.ephemeral_deadline = None;
            self.status.set_message("");
            self.request_render();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let config = load_from(args.config.clone())?;
    let (lines, open_failed) = load_lines(&args);

    let mut backend = CrosstermBackend::new();
    backend.set_title("glint")?;
    let (cols, rows) = backend.size()?;
    let _terminal_guard = backend.enter_guard()?;

    let (tx, mut rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);

    let mut registry = PartRegistry::new();
    let (text_part, text) = TextLinesPart::new();
    let (selection_part, selection) = SelectionOverlayPart::new();
    let (status_part, status) = StatusPart::new(config.status_skip());
    // Registration order is render order: text under overlay under status.
    registry.register(Box::new(text_part));
    registry.register(Box::new(selection_part));
    registry.register(Box::new(status_part));

    text.set_lines(lines.clone());
    status.set_position(0, 0);

    let line_count = lines.len();
    let mut runtime = ViewerRuntime {
        viewport: Viewport::new(cols, rows, line_count),
        lines,
        registry,
        surface: Surface::new(cols, rows),
        scheduler: RenderScheduler::new(FramePump::new(tx.clone()), config.max_deferral()),
        text,
        selection,
        status,
        ephemeral_deadline: None,
    };
    if open_failed {
        runtime.set_ephemeral("Open failed");
    }

    let mut sources = EventSourceRegistry::new();
    sources.register(TickEventSource::new(config.tick_interval()));
    let source_handles = sources.spawn_all(&tx);
    let input_handle = spawn_input_thread(tx.clone());
    drop(tx);

    info!(
        target: "runtime.startup",
        cols,
        rows,
        line_count,
        open_failed,
        config_override = args.config.is_some(),
        "bootstrap_complete"
    );

    // First paint before any input arrives.
    runtime.paint()?;

    while let Some(event) = rx.recv().await {
        match event {
            Event::Input(input) => {
                if runtime.handle_input(input) {
                    break;
                }
            }
            Event::FrameDue(token) => runtime.on_frame(token)?,
            Event::Tick => runtime.expire_ephemeral(),
            Event::Shutdown => break,
        }
    }

    runtime.scheduler.detach();
    rx.close();
    drop(rx);
    for handle in source_handles {
        let _ = tokio::time::timeout(Duration::from_millis(200), handle).await;
    }
    let _ = input_handle.join();

    let metrics = runtime.scheduler.metrics().snapshot();
    info!(
        target: "runtime",
        frames_requested = metrics.frames_requested,
        frames_coalesced = metrics.frames_coalesced,
        passes_completed = metrics.passes_completed,
        passes_aborted = metrics.passes_aborted,
        "shutdown"
    );
    Ok(())
}
