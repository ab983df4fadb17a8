//! Epsimo CLI - terminal client for the Epsimo agent platform.
//!
//! This is the entry point for the `epsimo` binary. Without a subcommand it
//! opens the chat interface.

mod app;
mod cli;
mod commands;
mod editing;
mod markdown;
mod messages;
mod poller;
mod resolver;
mod stream;
mod ui;

use std::io;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use epsimo_client::{PlatformClient, SessionContext, SessionStore};
use epsimo_core::{ApiResult, AssistantId, MessageId, ThreadId, ThreadInfo};

use app::{App, InputMode, REFRESH_INTERVAL};
use cli::{Args, Commands};
use poller::CreditPoller;
use resolver::Route;
use stream::StreamUpdate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("epsimo=debug,epsimo_client=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let config = args.client_config();
    let store = match &config.session_path {
        Some(path) => SessionStore::new(path.clone()),
        None => SessionStore::in_config_dir()?,
    };
    let session = SessionContext::open(store)?;
    let client = PlatformClient::new(&config.backend_url, session);

    match args.command.unwrap_or(Commands::Chat {
        thread: None,
        assistant: None,
    }) {
        Commands::Chat { thread, assistant } => {
            run_chat(client, config.poll_interval(), thread, assistant).await
        }
        command => commands::run(command, &client, &config, &mut io::stdout()).await,
    }
}

/// Open the chat interface.
async fn run_chat(
    client: PlatformClient,
    poll_interval: Duration,
    thread: Option<ThreadId>,
    assistant: Option<AssistantId>,
) -> anyhow::Result<()> {
    let (credits_tx, credits_rx) = mpsc::channel(4);
    let poller = CreditPoller::spawn(client.clone(), poll_interval, credits_tx);

    let (mut app, updates) = App::new(client);

    if !app.client().session().is_logged_in() {
        app.set_error("Not logged in. Quit and run `epsimo login` or `epsimo token`.");
    } else {
        if let Err(e) = app.refresh_threads().await {
            app.set_api_error("Failed to load threads", &e);
        }
        if let Err(e) = app.refresh_assistants().await {
            app.set_api_error("Failed to load assistants", &e);
        }
        let route = match (thread, assistant) {
            (Some(id), _) => Some(Route::Thread(id)),
            (None, Some(id)) => Some(Route::Assistant(id)),
            (None, None) => None,
        };
        if let Some(route) = route {
            app.open_route(route).await;
        }
    }

    // Setup terminal with mouse capture enabled
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, &mut app, updates, credits_rx).await;

    app.stream.stop();
    poller.cancel().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

/// Main event loop.
///
/// Stream updates trigger an immediate redraw so tokens appear as they arrive.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut updates: mpsc::Receiver<StreamUpdate>,
    mut credits: mpsc::Receiver<ApiResult<ThreadInfo>>,
) -> anyhow::Result<()> {
    let mut refresh_interval = tokio::time::interval(REFRESH_INTERVAL);

    loop {
        app.tick_animation();

        terminal.draw(|f| ui::render(f, app))?;

        let tick_rate = if app.needs_immediate_redraw() {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(100)
        };

        tokio::select! {
            () = tokio::time::sleep(tick_rate) => {
                while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        handle_input(app, evt).await;
                    }
                }
            }

            Some(update) = updates.recv() => {
                if app.handle_stream_update(update).await {
                    terminal.draw(|f| ui::render(f, app))?;
                }
            }

            Some(result) = credits.recv() => {
                app.handle_credits(result);
            }

            // Thread list refresh, skipped while a dialog or a run is active
            _ = refresh_interval.tick() => {
                if app.input_mode == InputMode::Normal
                    && !app.stream.is_inflight()
                    && app.client().session().is_logged_in()
                {
                    if let Err(e) = app.refresh_threads().await {
                        tracing::warn!(error = %e, "Failed to refresh threads");
                        app.refresh_error = Some(format!("Refresh failed: {}", e.message));
                    } else {
                        app.refresh_error = None;
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

/// Handle input events.
async fn handle_input(app: &mut App, event: Event) {
    match event {
        Event::Key(key) => {
            if key.kind != KeyEventKind::Press {
                return;
            }

            match app.input_mode.clone() {
                InputMode::Normal => handle_normal_mode(app, key.code, key.modifiers).await,
                InputMode::NewThread => handle_new_thread_mode(app, key.code).await,
                InputMode::EditingMessage(id) => {
                    handle_edit_mode(app, &id, key.code, key.modifiers);
                }
            }
        }
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_chat_up(3),
            MouseEventKind::ScrollDown => app.scroll_chat_down(3),
            _ => {}
        },
        _ => {}
    }
}

/// Handle input in normal mode.
///
/// - Up/Down always navigate threads
/// - Typing goes directly to input (when not in command mode)
/// - ESC stops a run, clears an error, or toggles command mode
async fn handle_normal_mode(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    if code == KeyCode::Esc {
        if app.command_mode {
            app.command_mode = false;
        } else if app.stream.is_inflight() {
            app.stop_streaming().await;
        } else if app.error_message.is_some() {
            app.clear_error();
        } else {
            app.command_mode = true;
        }
        return;
    }

    match code {
        KeyCode::PageUp => app.scroll_chat_up(10),
        KeyCode::PageDown => app.scroll_chat_down(10),
        KeyCode::Up => app.select_prev_thread(),
        KeyCode::Down => app.select_next_thread(),
        KeyCode::Tab => app.toggle_focus(),
        _ if app.command_mode => handle_command_mode(app, code).await,
        _ => handle_input_mode(app, code, modifiers).await,
    }
}

/// Handle single-key commands (ESC was pressed).
async fn handle_command_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('n') => app.enter_dialog_mode(InputMode::NewThread),
        KeyCode::Char('o') => app.open_selected_thread().await,
        KeyCode::Char('[') => app.select_prev_message(),
        KeyCode::Char(']') => app.select_next_message(),
        KeyCode::Char('e') => app.begin_edit(),
        KeyCode::Char('u') => app.abandon_selected_edit(),
        KeyCode::Char('U') => app.abandon_all_edits(),
        KeyCode::Char('s') => app.commit_edits().await,
        KeyCode::Char('c') => app.continue_conversation(),
        KeyCode::Char('+') => app.send_feedback(1.0).await,
        KeyCode::Char('-') => app.send_feedback(0.0).await,
        KeyCode::Char('r') => {
            if let Err(e) = app.refresh_threads().await {
                app.set_api_error("Refresh failed", &e);
            } else if let Err(e) = app.reload_messages().await {
                app.set_api_error("Failed to reload thread", &e);
            }
        }
        KeyCode::Char('j') => app.scroll_chat_down(1),
        KeyCode::Char('k') => app.scroll_chat_up(1),
        KeyCode::Enter => app.command_mode = false,
        _ => {}
    }
}

/// Handle typing into the chat input.
async fn handle_input_mode(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    match code {
        KeyCode::Enter => {
            if app.input.trim().is_empty() {
                app.open_selected_thread().await;
            } else if app.stream.is_inflight() {
                app.set_error("Wait for the response to finish, or press Esc to stop it");
            } else {
                let text = app.take_input();
                app.send_message(text).await;
            }
        }
        code => edit_text(app, code, modifiers),
    }
}

/// Handle the new-thread name prompt.
async fn handle_new_thread_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.exit_dialog_mode(),
        KeyCode::Enter => {
            let name = app.take_input();
            app.exit_dialog_mode();
            if !name.trim().is_empty() {
                if let Err(e) = app.create_thread(name.trim()).await {
                    app.set_api_error("Failed to create thread", &e);
                }
            }
        }
        code => edit_text(app, code, KeyModifiers::NONE),
    }
}

/// Handle the message edit prompt. Enter records a draft; saving is `s`.
fn handle_edit_mode(app: &mut App, id: &MessageId, code: KeyCode, modifiers: KeyModifiers) {
    match code {
        KeyCode::Esc => app.exit_dialog_mode(),
        KeyCode::Enter => app.finish_edit(id),
        code => edit_text(app, code, modifiers),
    }
}

/// Line editing keys shared by the chat input and dialogs.
fn edit_text(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    match code {
        KeyCode::Char('a') if ctrl => app.move_cursor_start(),
        KeyCode::Char('e') if ctrl => app.move_cursor_end(),
        KeyCode::Char('u') if ctrl => app.clear_input(),
        KeyCode::Char('w') if ctrl => app.delete_word(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        KeyCode::End => app.move_cursor_end(),
        _ => {}
    }
}
