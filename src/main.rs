#![deny(unsafe_code)]

mod attribute;
mod config;
mod constants;
mod event_loop;
mod watcher;
mod x11;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use x11rb::connection::Connection;
use x11rb::rust_connection::RustConnection;

use crate::attribute::Attribute;
use crate::config::AttributeConfig;
use crate::event_loop::{Dispatcher, EventLoop};
use crate::watcher::AttributeWatcher;
use crate::x11::{AppContext, CachedAtoms, IconRenderer, TrayDocker, create_in_dock_order};

#[derive(Parser, Debug)]
#[command(name = "attr-tray")]
#[command(version)]
#[command(about = "Mirror boolean sysfs attributes as system tray icons", long_about = None)]
struct Cli {
    /// Attribute to show, as PATH:LABEL:FG:BG_ACTIVE:BG_INACTIVE
    /// (colors are integer literals such as 0xRRGGBB; LABEL is cut to 7 characters)
    #[arg(required = true, value_name = "PATH:LABEL:FG:BG1:BG0")]
    attributes: Vec<AttributeConfig>,

    /// X display to connect to (defaults to $DISPLAY)
    #[arg(long)]
    display: Option<String>,

    /// Enable debug mode with verbose logging
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        // --help / --version
        Err(e) => e.exit(),
    };

    init_logging(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("attr-tray: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let filter_directives = if debug {
        "info,attr_tray=debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter_directives));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("attr-tray: a tracing subscriber is already installed");
    }
}

fn run(cli: Cli) -> Result<()> {
    let initial = watcher::resolve_states(cli.attributes);

    let (conn, screen_num) = RustConnection::connect(cli.display.as_deref())
        .context("Failed to connect to the X server")?;
    let screen = &conn.setup().roots[screen_num];
    let atoms = CachedAtoms::new(&conn, screen_num)?;
    let ctx = AppContext {
        conn: &conn,
        screen,
        screen_num,
        atoms: &atoms,
    };

    let renderer = IconRenderer::new(&ctx)?;
    let docker = TrayDocker::new(&ctx);
    if docker.locate_tray()?.is_none() {
        info!(
            screen = ctx.screen_num,
            "No system tray found, icons will not be docked"
        );
    }

    let attributes = create_in_dock_order(initial, |config, state| {
        let window = docker.create_and_dock(&config)?;
        let attribute = Attribute::new(config, state, window);
        renderer.draw(&attribute)?;
        Ok(attribute)
    })?;

    let watcher = AttributeWatcher::new()?;
    let dispatcher = Dispatcher::new(attributes, watcher, renderer);

    let mut event_loop = EventLoop::new(&ctx, dispatcher);
    event_loop.run()
}
