mod app;
mod ui;

use std::{fs::OpenOptions, path::PathBuf, sync::Arc, sync::Mutex, time::Duration};

use anyhow::{Context, Result};
use app::{poll_event, App, AppAction};
use clap::Parser;
use crossterm::event::Event;
use prospeed::{
    geo,
    network,
    report::{FileHost, Host, NullHost, StdoutHost, WebhookHost},
    speedtest::{
        transport::{HttpTransport, Transport},
        TestUpdate, UpdateSink,
    },
    ClientContext, Settings, SpeedTest, SpeedTestError,
};
use ratatui::DefaultTerminal;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ui::draw_ui;

/// Time-boxed internet speed test
#[derive(Parser, Debug)]
#[command(name = "prospeed", version, about)]
struct Cli {
    /// Speed-test server base URL
    #[arg(long, env = "PROSPEED_SERVER")]
    server: Option<String>,

    /// Seconds spent on each of the download and upload phases
    #[arg(short, long)]
    duration: Option<u64>,

    /// TOML config file
    #[arg(short, long, env = "PROSPEED_CONFIG")]
    config: Option<PathBuf>,

    /// Run one test without the terminal UI and print the result JSON
    #[arg(long)]
    headless: bool,

    /// Append result JSON lines to this file
    #[arg(long)]
    report_file: Option<String>,

    /// POST result JSON to this URL
    #[arg(long)]
    webhook: Option<String>,

    /// Diagnostic log file used while the terminal UI is active
    #[arg(long)]
    log_file: Option<String>,

    /// Log filter, e.g. `info` or `prospeed=debug`
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (settings, config_problem) = load_settings(&cli);
    // a bad config file already fell back to defaults; bad flags are fatal
    settings.validate()?;
    init_tracing(&settings, cli.headless)?;
    if let Some(err) = config_problem {
        warn!("{err}. Falling back to internal defaults.");
    }

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(settings.server()?)?);
    let host = build_host(&settings, cli.headless)?;
    host.ready();

    let (geo_info, geo_ok) = geo::lookup(transport.as_ref()).await;
    let context = ClientContext {
        client_info: geo_info.user.clone(),
        network_type: network::detect(),
    };
    let speedtest = SpeedTest::new(Arc::clone(&transport), host, &settings);

    if cli.headless {
        return run_headless(&speedtest, &context, &settings).await;
    }

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let mut app = App::new(settings, geo_info, context.network_type.clone(), watch::channel(0).0);
    if !geo_ok {
        app.log("Could not fetch geo information.");
    }
    app.log("Ready. Press enter to start.");

    let result = run_app(&mut terminal, app, speedtest, context).await;

    ratatui::restore();
    result
}

fn load_settings(cli: &Cli) -> (Settings, Option<SpeedTestError>) {
    let (mut settings, problem) = match &cli.config {
        Some(path) => Settings::load_or_default(path),
        None => (Settings::default(), None),
    };

    if let Some(server) = &cli.server {
        settings.server_url = server.clone();
    }
    if let Some(duration) = cli.duration {
        settings.duration_secs = duration;
    }
    if let Some(path) = &cli.report_file {
        settings.report_file = Some(path.clone());
    }
    if let Some(url) = &cli.webhook {
        settings.webhook_url = Some(url.clone());
    }
    if let Some(path) = &cli.log_file {
        settings.log_file = path.clone();
    }
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    (settings, problem)
}

fn init_tracing(settings: &Settings, headless: bool) -> Result<()> {
    let filter = EnvFilter::try_new(&settings.log_level)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to create log filter")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // stderr would draw over the alternate screen
    let installed = if headless {
        builder.with_writer(std::io::stderr).try_init()
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&settings.log_file)
            .with_context(|| format!("cannot open log file {}", settings.log_file))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
    };
    installed.map_err(|err| anyhow::anyhow!("tracing init error: {err}"))
}

fn build_host(settings: &Settings, headless: bool) -> Result<Arc<dyn Host>> {
    if let Some(url) = &settings.webhook_url {
        let url = url.parse().with_context(|| format!("invalid webhook url {url}"))?;
        return Ok(Arc::new(WebhookHost::new(url)?));
    }
    if let Some(path) = &settings.report_file {
        return Ok(Arc::new(FileHost::new(path)));
    }
    if headless {
        Ok(Arc::new(StdoutHost))
    } else {
        Ok(Arc::new(NullHost))
    }
}

async fn run_headless(speedtest: &SpeedTest, context: &ClientContext, settings: &Settings) -> Result<()> {
    let (_duration_tx, duration_rx) = watch::channel(settings.duration_secs);
    let (tx, mut rx) = mpsc::channel(256);

    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            if let TestUpdate::PhaseComplete(measurement) = update {
                info!("{:?}: {}", measurement.kind, measurement.display());
            }
        }
    });

    let payload = speedtest
        .run_test(context, &duration_rx, UpdateSink::new(tx))
        .await
        .context("a speed test is already running")?;
    let _ = printer.await;

    if !(payload.metrics.ping_ok && payload.metrics.download_ok && payload.metrics.upload_ok) {
        warn!("one or more phases failed, see the log in the result payload");
    }
    Ok(())
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    mut app: App,
    speedtest: SpeedTest,
    context: ClientContext,
) -> Result<()> {
    let duration_rx = app.duration_receiver();
    let mut test_rx: Option<mpsc::Receiver<TestUpdate>> = None;

    loop {
        terminal.draw(|frame| draw_ui(frame, &app))?;

        // Handle test updates
        let mut disconnected = false;
        if let Some(rx) = test_rx.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(update) => app.apply(update),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }
        if disconnected {
            app.session_ended();
            test_rx = None;
        }

        // Handle input
        if let Some(Event::Key(key)) = poll_event(Duration::from_millis(30))? {
            if let Some(action) = app.handle_key_event(key) {
                match action {
                    AppAction::Quit => break,
                    AppAction::StartTest => {
                        if speedtest.is_running() {
                            continue;
                        }
                        app.begin_test();

                        let (tx, rx) = mpsc::channel(256);
                        test_rx = Some(rx);

                        let speedtest = speedtest.reconfigured(&app.settings);
                        let context = context.clone();
                        let duration_rx = duration_rx.clone();
                        app.set_task(tokio::spawn(async move {
                            let _ = speedtest
                                .run_test(&context, &duration_rx, UpdateSink::new(tx))
                                .await;
                        }));
                    }
                    AppAction::CancelTest => {
                        app.cancel_test();
                        test_rx = None;
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
