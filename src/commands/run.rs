//! The assist session command (default).
//!
//! Wires the configured transport and media acquirer into a session
//! controller, starts a session and drives it from a line-based input loop
//! until the user or a Ctrl-C ends it. Finished sessions are persisted to
//! the transcript store.

use crate::config::{get_api_key, AudioMode, SidecoachConfig};
use crate::media::cpal_audio::CpalAcquirer;
use crate::media::strategy::Platform;
use crate::session::{
    SessionCommand, SessionController, SessionHandle, StartRequest, TranscriptStore,
};
use crate::transport::{event_channel, http::HttpTransport, Transport, TransportEvent};
use anyhow::anyhow;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

/// Runs one assist session end to end.
///
/// # Arguments
/// * `profile` - Assistant profile override from the command line
/// * `audio_mode` - Audio mode override from the command line
///
/// # Errors
/// - If configuration cannot be loaded
/// - If the session fails to start (missing credential, refused by the
///   endpoint, or fatal media acquisition failure)
pub async fn handle_run(
    profile: Option<String>,
    audio_mode: Option<String>,
) -> Result<(), anyhow::Error> {
    let mut config = SidecoachConfig::load()?;
    if let Some(profile) = profile {
        config.session.profile = profile;
    }
    if let Some(mode) = audio_mode {
        config.session.audio_mode = mode.parse::<AudioMode>().map_err(|e| anyhow!(e))?;
    }

    let api_key = get_api_key()?.unwrap_or_default();

    let (events_tx, mut events_rx) = event_channel();
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
        &config.transport.endpoint,
        &api_key,
        events_tx,
    ));
    let acquirer = CpalAcquirer::new(&config.audio.device)
        .with_loopback_helper(config.audio.loopback_helper.clone());

    let mut controller = SessionController::new(
        Arc::clone(&transport),
        Arc::new(acquirer),
        Platform::current(),
    );

    let request = StartRequest::from_preferences(api_key, &config.session);
    controller.start(request).await?;

    println!(
        "Session started (profile: {}, audio: {}).",
        config.session.profile, config.session.audio_mode
    );
    println!(
        "Type a question and press Enter. '/shot' sends a screenshot, '/r N' re-reads \
         response N, '/quit' or Ctrl-C ends the session."
    );

    let (handle, mut commands_rx) = SessionHandle::new();
    spawn_input_reader(handle);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(command) = commands_rx.recv() => match command {
                SessionCommand::CaptureScreenshot => {
                    controller.capture_screenshot().await;
                }
                SessionCommand::SendText(text) => {
                    controller.send_text(&text).await;
                }
                SessionCommand::MoveCursor(index) => {
                    controller.move_cursor(index);
                    print_current(&controller);
                }
                SessionCommand::Stop => break,
            },
            Some(event) = events_rx.recv() => {
                let is_status = matches!(event, TransportEvent::StatusUpdate(_));
                controller.apply_event(event);
                if is_status {
                    println!("[{}]", controller.status());
                } else {
                    print_current(&controller);
                }
            }
        }
    }

    // Grab what the persistence step needs before teardown clears it
    let started_at = controller.started_at();
    let responses = controller.history().entries().to_vec();
    controller.stop().await;

    if let Some(started_at) = started_at {
        match TranscriptStore::default_data_dir() {
            Ok(data_dir) => {
                let mut store = TranscriptStore::new(&data_dir);
                if let Err(e) = store.save_session(started_at, &responses) {
                    tracing::warn!("Failed to save transcript: {e}");
                }
            }
            Err(e) => tracing::warn!("Failed to locate transcript directory: {e}"),
        }
    }

    match started_at {
        Some(started_at) => {
            let elapsed = chrono::Local::now() - started_at;
            println!(
                "Session ended after {}m {}s.",
                elapsed.num_minutes(),
                elapsed.num_seconds() % 60
            );
        }
        None => println!("Session ended."),
    }
    Ok(())
}

/// Prints the response under the history cursor.
fn print_current(controller: &SessionController) {
    if let (Some(index), Some(text)) = (controller.history().cursor(), controller.history().current())
    {
        println!();
        println!("--- response {index} ---");
        println!("{text}");
    }
}

/// Reads stdin lines and turns them into session commands. Exits with the
/// session loop when the command channel closes.
fn spawn_input_reader(handle: SessionHandle) {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line {
                "/shot" => handle.capture_screenshot(),
                "/quit" | "/q" => {
                    handle.stop();
                    break;
                }
                _ => {
                    if let Some(rest) = line.strip_prefix("/r") {
                        match rest.trim().parse::<usize>() {
                            Ok(index) => handle.move_cursor(index),
                            Err(_) => println!("Usage: /r N"),
                        }
                    } else {
                        handle.send_text(line);
                    }
                }
            }
        }
    });
}
