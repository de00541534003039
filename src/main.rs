//! pipeterm - run a shell inside the pipeterm emulator
//!
//! The shell's output is interpreted by the engine and drawn with crossterm.
//! The shell runs on plain pipes, so programs that insist on a tty behave as
//! they would under a pipeline.
//!
//! # Quick Start
//!
//! ```text
//! pipeterm                 # Start with the configured shell (/bin/sh)
//! pipeterm -s /bin/bash    # Start with bash
//! pipeterm --demo          # Feed sample output through the emulator
//! ```

use std::env;
use std::io::Write;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::SetTitle;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pipeterm::config::Config;
use pipeterm::core::event::{NoopListener, SessionEvent};
use pipeterm::core::session::{Session, SessionState};
use pipeterm::core::term::Emulator;
use pipeterm::ui::{DebugRenderer, KeyMapper, Modifiers, Renderer};

/// Command line options
#[derive(Debug, Default)]
struct Args {
    /// Shell given with -s/--shell
    shell: Option<String>,
    demo: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("pipeterm {}", VERSION);
}

fn print_help() {
    eprintln!("pipeterm {} - VT100/xterm emulator over shell pipes", VERSION);
    eprintln!();
    eprintln!("Usage: pipeterm [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <CMD>     Shell executable (default: from config or /bin/sh)");
    eprintln!("  --demo                Render sample output and exit");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Ctrl+Q                Close the session and quit");
    eprintln!("  Ctrl+<letter>         Sent to the shell as a control character");
    eprintln!();
    eprintln!("Configuration: ~/.pipeterm/config.toml");
    eprintln!("Log file:      ~/.pipeterm/pipeterm.log (filter via PIPETERM_LOG)");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-s" | "--shell" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing shell argument".to_string());
                }
                parsed.shell = Some(args[i].clone());
            }
            "--demo" => {
                parsed.demo = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to ~/.pipeterm/pipeterm.log. PIPETERM_LOG overrides the configured level.
fn init_logging(config: &Config) {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("pipeterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("pipeterm.log"));

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("PIPETERM_LOG")
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = Config::load();
    if let Some(shell) = args.shell {
        config.shell = shell;
    }

    init_logging(&config);
    info!("pipeterm {} starting...", VERSION);

    if args.demo {
        return run_demo(&config);
    }

    run_terminal(&config)
}

/// Run the shell interactively
fn run_terminal(config: &Config) -> anyhow::Result<()> {
    let (cols, rows) = Renderer::size()?;
    info!("Shell: {}", config.shell);
    info!("Terminal size: {}x{}", cols, rows);

    let (tx, events) = mpsc::channel();
    let mut session = Session::new(config.session_config(cols, rows));
    session.set_listener(Box::new(tx));
    session.start();

    if session.state() != SessionState::Running {
        anyhow::bail!("Failed to start shell '{}' (see log for details)", config.shell);
    }

    let mut renderer = Renderer::new(config.color_resolver());
    renderer.init()?;

    let result = run_main_loop(&mut session, &mut renderer, &events);

    session.close();
    let _ = renderer.cleanup();

    result
}

fn run_main_loop(
    session: &mut Session,
    renderer: &mut Renderer,
    events: &Receiver<SessionEvent>,
) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(10);

    loop {
        if session.process_output() {
            renderer.render(session.screen())?;
            session.screen_mut().clear_dirty();
        }

        for evt in events.try_iter() {
            match evt {
                SessionEvent::TitleChanged(title) => {
                    execute!(std::io::stdout(), SetTitle(title))?;
                }
                SessionEvent::Bell => {
                    let mut stdout = std::io::stdout();
                    write!(stdout, "\x07")?;
                    stdout.flush()?;
                }
                SessionEvent::Error(e) => warn!("{}", e),
                SessionEvent::Exited(code) => {
                    info!("Session ended with code {}", code);
                    return Ok(());
                }
                SessionEvent::Output => {}
            }
        }

        if session.state() == SessionState::Terminated {
            return Ok(());
        }

        // Process input events
        if !event::poll(poll_timeout)? {
            continue;
        }

        match event::read()? {
            Event::Key(key_event) => {
                // Only process key press events
                if key_event.kind != KeyEventKind::Press {
                    continue;
                }

                let mods = Modifiers::from(key_event.modifiers);
                match key_event.code {
                    KeyCode::Char('q') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                        info!("Quit requested");
                        return Ok(());
                    }
                    KeyCode::Char(ch) if mods.contains(Modifiers::CTRL) => {
                        if let Some(byte) = KeyMapper::control_char(ch) {
                            session.write_bytes(&[byte]);
                        }
                    }
                    KeyCode::Char(ch) => {
                        let mut buf = [0u8; 4];
                        session.write(ch.encode_utf8(&mut buf));
                    }
                    code if KeyMapper::map(code, mods).is_some() => {
                        session.write_key_event(code, mods);
                    }
                    _ => {}
                }
            }
            Event::Resize(cols, rows) => {
                info!("Resized to {}x{}", cols, rows);
                session.resize(cols, rows);
                renderer.render(session.screen())?;
                session.screen_mut().clear_dirty();
            }
            _ => {}
        }
    }
}

/// Feed canned output through the emulator and dump the screen
fn run_demo(config: &Config) -> anyhow::Result<()> {
    println!("=== pipeterm Demo Mode ===\n");

    let demo_output = concat!(
        "\x1b]0;pipeterm demo\x07",
        "\x1b[32mWelcome to pipeterm!\x1b[0m\r\n",
        "\r\n",
        "This is a \x1b[1mbold\x1b[0m and \x1b[4munderlined\x1b[0m text.\r\n",
        "Colors: \x1b[31mRed\x1b[0m \x1b[32mGreen\x1b[0m \x1b[34mBlue\x1b[0m \x1b[38;5;208mOrange\x1b[0m\r\n",
        "\r\n",
        "\x1b[7mInverse text\x1b[0m\r\n",
        "Tabs:\tone\ttwo\r\n",
        "\r\n",
        "$ ",
    );

    let mut emulator = Emulator::new(60, 12);
    emulator.process_input(demo_output.as_bytes(), &mut NoopListener);

    println!("{}", DebugRenderer::render(emulator.screen()));

    let colors = config.color_resolver();
    if let Some(cell) = emulator.screen().cell(3, 8) {
        let rgb = colors.effective_foreground(&cell.style);
        println!("Cell (3, 8) '{}' -> #{:02X}{:02X}{:02X}", cell.ch, rgb.r, rgb.g, rgb.b);
    }

    println!("\nDemo complete. Run without --demo to start a shell.");
    Ok(())
}
