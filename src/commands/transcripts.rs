//! Session transcript viewer.
//!
//! Prints the stored responses of recent sessions, most recent first.

use crate::session::TranscriptStore;

const DEFAULT_SESSION_COUNT: usize = 5;

/// Prints transcripts of the most recent sessions.
///
/// # Arguments
/// * `count` - How many sessions to show (defaults to 5)
///
/// # Errors
/// - If the data directory cannot be determined
/// - If the transcript database cannot be read
pub fn handle_transcripts(count: Option<usize>) -> Result<(), anyhow::Error> {
    let count = count.unwrap_or(DEFAULT_SESSION_COUNT);
    let data_dir = TranscriptStore::default_data_dir()?;
    let mut store = TranscriptStore::new(&data_dir);

    let sessions = store.recent_sessions(count)?;
    if sessions.is_empty() {
        println!("No session transcripts found.");
        println!("Transcripts are saved when an assist session ends.");
        return Ok(());
    }

    for session in sessions {
        println!();
        println!(
            "=== Session {} ({} responses) ===",
            session.started_at.format("%Y-%m-%d %H:%M"),
            session.responses.len()
        );
        for (index, response) in session.responses.iter().enumerate() {
            println!();
            println!("[{index}] {response}");
        }
    }
    println!();

    Ok(())
}
