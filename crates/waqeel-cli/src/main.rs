use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::event::{self, DisableBracketedPaste, EnableBracketedPaste, Event};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod backend;
mod commands;
mod config;
mod constants;
mod conversation;
mod input;
mod render;
mod session;
mod transcript;
mod ui;

use app::{App, UiUpdate};
use backend::{HttpQaClient, QaClient};
use config::CliConfig;
use constants::{DEFAULT_LOG_LEVEL, SPINNER_FRAMES};
use input::{handle_key, handle_paste};
use session::ChatSession;
use ui::render_ui;

#[derive(Parser, Debug)]
#[command(name = "waqeel", version = env!("CARGO_PKG_VERSION"), about = "Legal assistant chat client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Ask a single question and print the answer
    #[arg(long)]
    prompt: Option<String>,

    /// Question-answering service URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Prior messages sent with each question
    #[arg(long, global = true)]
    max_history: Option<usize>,

    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a raw service answer read from FILE, or stdin
    Render {
        file: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderFormat::Html)]
        format: RenderFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RenderFormat {
    Html,
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?
        .with_overrides(cli.endpoint.clone(), cli.max_history);

    let interactive = cli.command.is_none() && cli.prompt.is_none();
    let _guard = init_logging(&config, interactive);

    if let Some(Commands::Render { file, format }) = cli.command {
        return run_render(&config, file, format);
    }

    if let Some(prompt) = cli.prompt.as_deref() {
        return run_non_interactive(&config, prompt);
    }

    run_interactive(&config)
}

/// The TUI owns the terminal, so it logs to a daily file; everything else
/// logs to stderr.
fn init_logging(config: &CliConfig, interactive: bool) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if !interactive {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .with_target(false)
            .try_init();
        return None;
    }

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("waqeel")
        .join("logs");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "waqeel.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .try_init();
    Some(guard)
}

fn run_render(config: &CliConfig, file: Option<PathBuf>, format: RenderFormat) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let rendered = config.renderer().render(&raw);
    match format {
        RenderFormat::Html => println!("{}", rendered.safe_html),
        RenderFormat::Text => println!("{}", rendered.plain_text),
        RenderFormat::Json => println!("{}", serde_json::to_string_pretty(&rendered)?),
    }
    Ok(())
}

fn run_non_interactive(config: &CliConfig, prompt: &str) -> Result<()> {
    let client = HttpQaClient::new(config.service.endpoint.clone(), config.timeout())?;
    let mut session = ChatSession::new(config.renderer(), config.history.max_messages);

    let payload = session.submit(prompt)?;
    let outcome = client.ask(&payload);
    let failed = outcome.is_err();
    let reply = session.settle(outcome)?;

    println!("{}", reply.content());
    if !reply.references().is_empty() {
        println!("\nReferences:");
        for reference in reply.references() {
            println!("  {} <{}>", reference.title, reference.url);
        }
    }

    if failed {
        bail!("no answer from {}", client.endpoint());
    }
    Ok(())
}

fn run_interactive(config: &CliConfig) -> Result<()> {
    let client: Arc<dyn QaClient> = Arc::new(HttpQaClient::new(
        config.service.endpoint.clone(),
        config.timeout(),
    )?);
    info!(endpoint = %config.service.endpoint, "starting interactive session");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let session = ChatSession::new(config.renderer(), config.history.max_messages);
    let mut app = App::new(session, config.service.endpoint.clone());
    let result = event_loop(&mut terminal, &mut app, &client);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    client: &Arc<dyn QaClient>,
) -> Result<()> {
    let mut last_tick = Instant::now();
    let (ui_tx, ui_rx) = mpsc::channel::<UiUpdate>();

    loop {
        let tick_rate = if app.session.is_awaiting() {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(220)
        };
        if app.dirty || last_tick.elapsed() >= tick_rate {
            if app.session.is_awaiting() {
                app.spinner_index = (app.spinner_index + 1) % SPINNER_FRAMES.len();
                app.mark_dirty();
            }
            if app.needs_clear {
                if let Err(err) = terminal.clear() {
                    warn!(error = %err, "failed to clear terminal");
                }
                app.needs_clear = false;
            }
            render_ui(terminal, app)?;
            app.dirty = false;
            last_tick = Instant::now();
        }

        while let Ok(update) = ui_rx.try_recv() {
            match update {
                UiUpdate::Reply(outcome) => app.apply_reply(outcome),
            }
        }

        if event::poll(Duration::from_millis(10))? {
            match event::read()? {
                Event::Key(key) => handle_key(app, key, client, &ui_tx),
                Event::Paste(text) => handle_paste(app, text),
                Event::Resize(..) => app.mark_dirty(),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }

        if let Some((_, at)) = app.toast {
            if at.elapsed() > Duration::from_secs(5) {
                app.toast = None;
                app.mark_dirty();
            }
        }
    }
    Ok(())
}
