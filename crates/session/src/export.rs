//! Markdown export of a session transcript.
//!
//! Pure and order-preserving: the same transcript always produces
//! byte-identical output.

use personalens_core::types::{EventKind, SessionMode};
use personalens_core::Session;
use std::fmt::Write;

pub fn export_markdown(session: &Session) -> String {
    let mut out = String::new();
    let persona = session.persona();

    let _ = writeln!(out, "# Session report: {}", persona.first_name());
    out.push('\n');
    let _ = writeln!(
        out,
        "- Date: {}",
        session.started_at().format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(out, "- Site: {}", session.start_url());
    let _ = writeln!(out, "- Persona: {} {}", persona.icon, persona.name);
    let mode = match session.mode() {
        SessionMode::Guided => "guided",
        SessionMode::Autonomous => "autonomous",
    };
    let _ = writeln!(out, "- Mode: {mode}");
    if let Some(goal) = session.goal() {
        let _ = writeln!(out, "- Objective: {} (max {} steps)", goal.objective, goal.max_steps);
    }

    if let Some(context) = session.site_context() {
        out.push('\n');
        out.push_str("## Site\n\n");
        out.push_str(context);
        out.push('\n');
    }

    out.push('\n');
    out.push_str("## Transcript\n");
    for event in session.transcript() {
        let time = event.timestamp.format("%H:%M:%S");
        let page = event.page_type.label();
        out.push('\n');
        match &event.kind {
            EventKind::Navigation { url, action } => {
                let _ = writeln!(out, "### {time} · Navigation ({page})");
                out.push('\n');
                let _ = writeln!(out, "`{}` -> {url}", action.describe());
            }
            EventKind::OperatorCommand { text } => {
                let _ = writeln!(out, "### {time} · Operator command ({page})");
                out.push('\n');
                let _ = writeln!(out, "{text}");
            }
            EventKind::OperatorQuestion { text } => {
                let _ = writeln!(out, "### {time} · Operator question ({page})");
                out.push('\n');
                let _ = writeln!(out, "{text}");
            }
            EventKind::PersonaReply { text } => {
                let _ = writeln!(out, "### {time} · {} ({page})", persona.first_name());
                out.push('\n');
                let _ = writeln!(out, "{text}");
            }
            EventKind::SystemNote { text } => {
                let _ = writeln!(out, "### {time} · System ({page})");
                out.push('\n');
                let _ = writeln!(out, "{text}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use personalens_core::persona::builtin_personas;
    use personalens_core::types::{Event, NavigationAction, PageType};

    fn sample_session() -> Session {
        let mut session =
            Session::guided(builtin_personas()[0].clone(), "https://osteria.example");
        session.set_site_context("Sito di una piccola osteria bolognese.");
        session
            .append(Event::now(
                EventKind::Navigation {
                    url: "https://osteria.example/".to_string(),
                    action: NavigationAction::NavigateTo {
                        url: "https://osteria.example".to_string(),
                    },
                },
                PageType::Homepage,
            ))
            .unwrap();
        session
            .append(Event::now(
                EventKind::OperatorQuestion {
                    text: "prenoteresti qui?".to_string(),
                },
                PageType::Booking,
            ))
            .unwrap();
        session
            .append(Event::now(
                EventKind::PersonaReply {
                    text: "Sì, il form è semplice.".to_string(),
                },
                PageType::Booking,
            ))
            .unwrap();
        session
    }

    #[test]
    fn export_is_idempotent() {
        let session = sample_session();
        let first = export_markdown(&session);
        let second = export_markdown(&session);
        assert_eq!(first, second);
    }

    #[test]
    fn export_preserves_event_order() {
        let markdown = export_markdown(&sample_session());
        let navigation = markdown.find("Navigation").unwrap();
        let question = markdown.find("prenoteresti qui?").unwrap();
        let reply = markdown.find("il form è semplice").unwrap();
        assert!(navigation < question && question < reply);
    }

    #[test]
    fn header_carries_session_facts() {
        let markdown = export_markdown(&sample_session());
        assert!(markdown.starts_with("# Session report: Marco"));
        assert!(markdown.contains("- Site: https://osteria.example"));
        assert!(markdown.contains("- Mode: guided"));
        assert!(markdown.contains("## Site\n\nSito di una piccola osteria bolognese."));
        assert!(markdown.contains("(Booking)"));
    }
}
