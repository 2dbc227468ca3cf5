//! Output formatting utilities for the CLI
//!
//! Tables for the session list, status lines for the connect flow, and
//! colored status messages.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use zl_core::time::format_age;
use zl_core::{ConnectionStatus, Session};
use zl_protocol::Envelope;

/// Format sessions as an ASCII table, marking the active one
///
/// The detailed view adds the connect mode, last connect time and URL.
pub fn format_sessions(sessions: &[Session], active: Option<usize>, detailed: bool) -> String {
    if sessions.is_empty() {
        return "No sessions configured".to_string();
    }

    #[derive(Tabled)]
    struct SessionRow {
        #[tabled(rename = "")]
        marker: &'static str,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "SESSION")]
        session: String,
        #[tabled(rename = "STATUS")]
        status: &'static str,
    }

    #[derive(Tabled)]
    struct SessionRowDetailed {
        #[tabled(rename = "")]
        marker: &'static str,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "SESSION")]
        session: String,
        #[tabled(rename = "MODE")]
        mode: String,
        #[tabled(rename = "STATUS")]
        status: &'static str,
        #[tabled(rename = "LAST CONNECTED")]
        last_connected: String,
        #[tabled(rename = "URL")]
        url: String,
    }

    let marker = |i: usize| if Some(i) == active { "*" } else { "" };

    if detailed {
        let rows: Vec<SessionRowDetailed> = sessions
            .iter()
            .enumerate()
            .map(|(i, s)| SessionRowDetailed {
                marker: marker(i),
                id: s.id.short().to_string(),
                name: s.display_name(),
                session: s.remote_session.clone(),
                mode: format!("{:?}", s.config.mode).to_lowercase(),
                status: s.status_text(),
                last_connected: s
                    .last_connected
                    .map(format_age)
                    .unwrap_or_else(|| "-".to_string()),
                url: s.url.as_deref().map(redact_token).unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        Table::new(rows)
            .with(Style::rounded())
            .with(Width::wrap(120))
            .to_string()
    } else {
        let rows: Vec<SessionRow> = sessions
            .iter()
            .enumerate()
            .map(|(i, s)| SessionRow {
                marker: marker(i),
                id: s.id.short().to_string(),
                name: s.display_name(),
                session: s.remote_session.clone(),
                status: s.status_text(),
            })
            .collect();

        Table::new(rows).with(Style::rounded()).to_string()
    }
}

/// Hide the token query parameter of a session URL
pub fn redact_token(url: &str) -> String {
    match url.split_once("?token=") {
        Some((base, _)) => format!("{}?token=…", base),
        None => url.to_string(),
    }
}

/// One-line description of an orchestrator status
pub fn format_status(status: &ConnectionStatus) -> String {
    match status {
        ConnectionStatus::Connecting(label) => format!("Connecting to {}...", label),
        ConnectionStatus::Connected(label) => label.clone(),
        ConnectionStatus::Error(message) => format!("Error: {}", message),
        ConnectionStatus::Disconnected => "Disconnected".to_string(),
    }
}

/// One-line description of an inbound control envelope
pub fn format_envelope(envelope: &Envelope) -> String {
    match envelope {
        Envelope::Ping(k) => format!("ping ({})", k.timestamp),
        Envelope::Pong(k) => format!("pong ({})", k.timestamp),
        Envelope::OpenView(view) => format!(
            "open {:?} '{}' [{}] -> {}",
            view.file_type, view.title, view.asset_id, view.url
        ),
        Envelope::Annotation(action) => format!(
            "annotation on {}: \"{}\" ({})",
            action.file_path, action.data.body, action.data.target_text
        ),
        Envelope::Custom { kind, payload } => {
            format!("{} ({} bytes)", kind, payload.len())
        }
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix (stderr)
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow (stderr)
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
