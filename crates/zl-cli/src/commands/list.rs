//! List command implementation

use anyhow::Result;

use zl_core::Session;
use zl_orchestrator::SessionOrchestrator;

use crate::output::format_sessions;

/// Execute the list command
pub async fn list_command(orchestrator: &SessionOrchestrator, long: bool, json: bool) -> Result<()> {
    let book = orchestrator.snapshot().await;

    if json {
        let sessions: Vec<_> = book.sessions.iter().map(Session::for_storage).collect();
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    println!("{}", format_sessions(&book.sessions, book.active, long));
    Ok(())
}
