use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sidgrid::audio;
use sidgrid::config::Config;
use sidgrid::middle::Middle;
use sidgrid::pipeline::demo::demo_project;
use sidgrid::pipeline::persistence;
use sidgrid::pipeline::render::OfflineRenderer;
use sidgrid::shared::InputEvent;
use sidgrid::tui;

const FRAME_INTERVAL: Duration = Duration::from_millis(16); // ~60fps

#[derive(Parser)]
#[command(name = "sidgrid")]
#[command(about = "Three-voice chip sequencer")]
#[command(version)]
struct Cli {
    /// Engine config (json); every field is optional
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the transport console on a project directory
    Play {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Render the whole grid once to a WAV file
    Render {
        #[arg(default_value = ".")]
        dir: PathBuf,

        #[arg(short, long, default_value = "sidgrid.wav")]
        output: PathBuf,
    },

    /// Write a demo pattern into the project directory
    Demo {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Play { dir } => {
            init_file_logging(&dir)?;
            play(&dir, config)
        }
        Command::Render { dir, output } => {
            init_stderr_logging();
            render(&dir, &output, config)
        }
        Command::Demo { dir } => {
            init_stderr_logging();
            persistence::save_project(&dir, &demo_project())?;
            println!("demo written to {}", persistence::project_file_path(&dir).display());
            Ok(())
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

// the console owns the terminal, so play mode logs to a file instead
fn init_file_logging(project_dir: &Path) -> anyhow::Result<()> {
    let path = persistence::log_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn render(project_dir: &Path, output: &Path, config: Config) -> anyhow::Result<()> {
    let project = persistence::load_or_default(project_dir);
    let renderer = OfflineRenderer::new(config);
    let audio = renderer
        .export_wav_file(&project, output, |p| {
            eprint!("\rrendering {:>3.0}%", p * 100.0);
            let _ = std::io::stderr().flush();
        })
        .with_context(|| format!("exporting {}", output.display()))?;
    eprintln!();
    println!("{} ({:.2}s)", output.display(), audio.duration_secs());
    Ok(())
}

fn play(project_dir: &Path, config: Config) -> anyhow::Result<()> {
    let project = persistence::load_or_default(project_dir);
    let audio = match audio::start_audio(project.filter, &config) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("audio unavailable, editing only: {e:#}");
            None
        }
    };
    let ticker = crossbeam_channel::tick(config.tick_interval());
    let mut middle = Middle::with_state(project, audio, config);

    terminal::enable_raw_mode()?;
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;
    let mut tui_state = tui::mode::TuiState::default();
    info!(dir = %project_dir.display(), "console opened");

    loop {
        // ticks that piled up while drawing collapse into one pass; the
        // transport catches up from the audio clock anyway
        if ticker.try_iter().count() > 0 {
            middle.tick();
        }
        middle.poll();

        let ds = middle.display_state().clone();
        tui_state.playing = ds.playing;
        tui_state.selected_voice = ds.selected_voice;

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state);
        })?;

        for event in tui::input::poll_input(FRAME_INTERVAL, &mut tui_state)? {
            if event == InputEvent::Quit {
                middle.stop();
                if let Err(e) = persistence::save_project(project_dir, &middle.project) {
                    warn!("could not save project: {e}");
                }
                info!("console closed");
                return Ok(());
            }
            middle.handle_input(event);
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags
        );
        let _ = terminal::disable_raw_mode();
    }
}
