use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use switchboard_common::observability::init_logging_with;
use switchboard_config::{SwitchboardConfig, SwitchboardConfigLoader};
use switchboard_tui::{
    BUFFER_TABLE, Buffer, CrosstermSurface, Screen, ScreenOptions, spawn_input_loop, styles,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

mod commands;
mod status_log;
mod theme;

#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about = "Console client multiplexing many buffers")]
struct Cli {
    /// Settings file; missing is fine.
    #[arg(short, long, env = "SWITCHBOARD_CONFIG", default_value = "switchboard.yaml")]
    config: PathBuf,

    /// Stacked windows, overriding the settings file.
    #[arg(short, long)]
    windows: Option<usize>,
}

fn screen_options(cfg: &SwitchboardConfig, cli: &Cli) -> ScreenOptions {
    ScreenOptions {
        windows: cli.windows.unwrap_or(cfg.ui.windows).max(1),
        scrollback: cfg.ui.scrollback,
        command_marker: cfg.ui.command_marker,
        beep: cfg.ui.beep,
        poll_timeout: Duration::from_millis(cfg.ui.poll_timeout_ms),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Env wins over the file.
    let cfg = SwitchboardConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()?;

    let (mirror, mirrored) = status_log::layer();
    let log_path = init_logging_with(cfg.log.to_log_config("switchboard"), Some(Box::new(mirror)))?;
    info!(path = %log_path.display(), config = %cli.config.display(), "app.start");

    let surface = CrosstermSurface::enter()?;
    let screen = Screen::new(
        Box::new(surface),
        Box::new(theme::TemplateTheme::new(cfg.templates.0.clone())),
        screen_options(&cfg, &cli),
    )?;
    screen.set_title(Some("Switchboard".into()));

    let status = screen.create_buffer(
        Buffer::builder("status")
            .descr("messages")
            .command_table(BUFFER_TABLE, None)
            .on_input(|screen, buffer, _| {
                let hint = format!("Commands start with {}; try {0}help", screen.options().command_marker);
                screen.append_styled(buffer, &hint, styles::dim());
                Ok(())
            }),
    );
    screen.display_buffer(&status);
    commands::install(&screen, &status)?;
    screen.append_line(&status, &format!("Logging to {}", log_path.display()));

    let cancel = CancellationToken::new();
    let drain = tokio::spawn(status_log::drain(
        screen.clone(),
        status.clone(),
        mirrored,
        cancel.clone(),
    ));
    let signal = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let outcome = spawn_input_loop(screen.clone(), cancel.clone()).await;
    cancel.cancel();
    signal.abort();
    let _ = drain.await;
    screen.shell_mode()?;
    info!("app.stop");
    outcome??;
    Ok(())
}
