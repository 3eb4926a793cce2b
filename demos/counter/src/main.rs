//! Counter - Minimal viewflux host
//!
//! A view renders into a headless document; keys are turned into DOM clicks
//! on its buttons, the handlers dispatch actions, the scheduler reduces one
//! per tick and the result is routed back into the view's model, whose
//! bindings update the document that gets drawn.
//!
//! Keys: j/Down = decrement, k/Up = increment, r = reset, q = quit

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Flex, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use viewflux::prelude::*;
use viewflux::Config;

#[derive(Parser, Debug)]
#[command(about = "Counter driven by the viewflux action queue")]
struct Args {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Milliseconds between scheduler ticks
    #[arg(long)]
    tick_ms: Option<f64>,

    /// Write logs to this file (filtered by RUST_LOG)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Stop on the first fatal dispatch error instead of resuming
    #[arg(long)]
    halt_on_fatal: bool,
}

// ============================================================================
// State and reducers
// ============================================================================

#[derive(Default)]
struct AppState {
    count: i64,
}

fn reducers() -> Vec<Module<AppState>> {
    let step = || ObjectSchema::new().field("by", FieldRule::integer().required());
    vec![
        Module::Reducer(
            Reducer::new("increment", |state: &mut AppState, data: Value, done: Completion| {
                state.count += data["by"].as_i64().unwrap_or(1);
                done.complete(json!(state.count));
            })
            .with_schema(step()),
        ),
        Module::Reducer(
            Reducer::new("decrement", |state: &mut AppState, data: Value, done: Completion| {
                state.count -= data["by"].as_i64().unwrap_or(1);
                done.complete(json!(state.count));
            })
            .with_schema(step()),
        ),
        Module::Reducer(Reducer::new(
            "reset",
            |state: &mut AppState, _data: Value, done: Completion| {
                state.count = 0;
                done.complete(json!(0));
            },
        )),
    ]
}

// ============================================================================
// View
// ============================================================================

fn counter_view() -> Result<Rc<ViewClass>, ViewError> {
    ViewClass::builder("Counter")
        .template(concat!(
            r#"<div class="counter">"#,
            r#"<span class="value" data-role="bind" data-name="count">0</span>"#,
            r#"<button class="inc">+</button><button class="dec">-</button>"#,
            r#"<button class="reset">reset</button>"#,
            r#"</div>"#,
        ))
        .handler("onIncrement", |scope: &mut ViewScope<'_>, _: &Invocation| {
            scope.dispatch_with(Action::new("increment", json!({ "by": 1 })), "onCount");
        })
        .handler("onDecrement", |scope: &mut ViewScope<'_>, _: &Invocation| {
            scope.dispatch_with(Action::new("decrement", json!({ "by": 1 })), "onCount");
        })
        .handler("onReset", |scope: &mut ViewScope<'_>, _: &Invocation| {
            scope.dispatch_with(Action::new("reset", json!({})), "onCount");
        })
        .handler("onCount", |scope: &mut ViewScope<'_>, result: &Invocation| {
            let count = result.arg(0).cloned().unwrap_or(Value::Null);
            scope.set_attr("count", count);
        })
        .event("click .inc", "onIncrement")
        .event("click .dec", "onDecrement")
        .event("click .reset", "onReset")
        .build()
}

// ============================================================================
// Setup
// ============================================================================

fn init_tracing(log_file: Option<&Path>) -> io::Result<()> {
    // Nothing goes to stdout while the terminal UI is up
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = std::fs::File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();
    Ok(())
}

fn load_config(args: &Args) -> io::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_str(&std::fs::read_to_string(path)?)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?,
        None => Config::default(),
    };
    if let Some(tick_ms) = args.tick_ms {
        config.tick_interval_ms = tick_ms;
    }
    if args.halt_on_fatal {
        config.fatal_policy = FatalPolicy::Halt;
    }
    config
        .validate()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;
    let config = load_config(&args)?;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &config).await;

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

// ============================================================================
// Host loop
// ============================================================================

enum Input {
    Click(&'static str),
    Quit,
}

fn read_input() -> io::Result<Vec<Input>> {
    let mut inputs = Vec::new();
    while event::poll(Duration::ZERO)? {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let input = match key.code {
            KeyCode::Char('k') | KeyCode::Up => Input::Click(".inc"),
            KeyCode::Char('j') | KeyCode::Down => Input::Click(".dec"),
            KeyCode::Char('r') => Input::Click(".reset"),
            KeyCode::Char('q') | KeyCode::Esc => Input::Quit,
            _ => continue,
        };
        inputs.push(input);
    }
    Ok(inputs)
}

fn to_io(err: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::other(err)
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    config: &Config,
) -> io::Result<()> {
    let logger = ActionLoggerMiddleware::with_log(config.log_config());
    let mut dispatcher = Dispatcher::with_middleware(AppState::default(), logger);
    dispatcher.use_modules(reducers());

    let last_error = Rc::new(RefCell::new(None::<String>));
    let sink = Rc::clone(&last_error);
    dispatcher
        .bus()
        .subscribe_many(&[EventType::Error, EventType::Fatal], move |event| {
            *sink.borrow_mut() = Some(match event {
                AppEvent::Error(report) => report.to_string(),
                AppEvent::Fatal(message) => message.clone(),
                other => format!("{other:?}"),
            });
        });

    let document = Document::parse(r#"<main id="app"></main>"#).map_err(to_io)?;
    let mut tree =
        ViewTree::new(dispatcher.context().clone(), document).with_change_policy(config.change_policy);
    let counter = tree
        .create(counter_view().map_err(to_io)?, "#app", Some(json!({ "count": 0 }).into()))
        .map_err(to_io)?;

    let scheduler = Scheduler::new(config.scheduler_config());
    let cancel = scheduler.cancel_token();
    let mut failure: Option<io::Error> = None;
    let mut last_outcome = String::from("idle");

    let run = scheduler
        .run_with(&mut dispatcher, |result| {
            match result {
                Ok(TickOutcome::Idle) => {}
                Ok(outcome) => last_outcome = format!("{outcome:?}"),
                Err(err) => last_outcome = err.to_string(),
            }
            tree.pump();

            let inputs = match read_input() {
                Ok(inputs) => inputs,
                Err(err) => {
                    failure = Some(err);
                    cancel.cancel();
                    return;
                }
            };
            for input in inputs {
                match input {
                    Input::Click(selector) => {
                        if let Ok(Some(button)) = tree.document().query_first(selector) {
                            tree.trigger(&button, "click", Vec::new());
                        }
                    }
                    Input::Quit => cancel.cancel(),
                }
            }

            let count = tree
                .element(counter)
                .and_then(|root| root.select_first(".value").ok().flatten())
                .map(|el| el.text())
                .unwrap_or_default();
            let status = last_error
                .borrow()
                .clone()
                .unwrap_or_else(|| last_outcome.clone());

            if let Err(err) = terminal.draw(|frame| draw(frame, &count, &status)) {
                failure = Some(err);
                cancel.cancel();
            }
        })
        .await;

    if let Some(log) = dispatcher.middleware().log() {
        for entry in log.recent(10) {
            info!(
                sequence = entry.sequence,
                action = %entry.action_type,
                summary = %entry.summary,
                reduced = ?entry.reduced,
                "Action history"
            );
        }
    }
    info!(count = dispatcher.store().state().count, "Counter exited");

    if let Some(err) = failure {
        return Err(err);
    }
    run.map_err(to_io)
}

fn draw(frame: &mut ratatui::Frame, count: &str, status: &str) {
    let area = frame.area();

    // Center the counter vertically and horizontally
    let [_, center, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(5),
        Constraint::Fill(1),
    ])
    .areas(area);

    let [_, center, _] = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(30),
        Constraint::Fill(1),
    ])
    .flex(Flex::Center)
    .areas(center);

    let block = Block::default()
        .title(" Counter ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let paragraph = Paragraph::new(count.to_string())
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(paragraph, center);

    let [_, status_area, help_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);
    let status = Paragraph::new(status.to_string())
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(status, status_area);

    let help = Paragraph::new("k/Up: +1  j/Down: -1  r: reset  q: quit")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area);
}
