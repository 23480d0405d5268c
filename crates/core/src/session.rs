use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::persona::Persona;
use crate::types::{Event, Goal, SessionMode, SessionStatus};

/// Root aggregate for one live session. Exactly one instance per browser
/// tab; there is no process-wide session state.
///
/// The transcript is append-only: entries can never be mutated or
/// reordered, and nothing can be appended once the session has `Ended`.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    persona: Persona,
    mode: SessionMode,
    goal: Option<Goal>,
    step_count: u32,
    transcript: Vec<Event>,
    site_context: Option<String>,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    start_url: String,
}

impl Session {
    pub fn guided(persona: Persona, start_url: &str) -> Self {
        Self::new(persona, SessionMode::Guided, None, start_url)
    }

    pub fn autonomous(persona: Persona, start_url: &str, goal: Goal) -> Self {
        Self::new(persona, SessionMode::Autonomous, Some(goal), start_url)
    }

    fn new(persona: Persona, mode: SessionMode, goal: Option<Goal>, start_url: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            persona,
            mode,
            goal,
            step_count: 0,
            transcript: Vec::new(),
            site_context: None,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            start_url: start_url.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn goal(&self) -> Option<&Goal> {
        self.goal.as_ref()
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    pub fn site_context(&self) -> Option<&str> {
        self.site_context.as_deref()
    }

    pub fn transcript(&self) -> &[Event] {
        &self.transcript
    }

    /// The last `n` transcript entries, oldest first. Bounds the model
    /// context window.
    pub fn transcript_window(&self, n: usize) -> &[Event] {
        let start = self.transcript.len().saturating_sub(n);
        &self.transcript[start..]
    }

    /// Append one transcript entry. Rejected once the session has ended.
    pub fn append(&mut self, event: Event) -> Result<()> {
        if self.status == SessionStatus::Ended {
            return Err(Error::Session(format!(
                "session {} has ended, transcript is frozen",
                self.id
            )));
        }
        self.transcript.push(event);
        Ok(())
    }

    /// Record one completed Acting step of the autonomous loop.
    pub fn record_step(&mut self) {
        self.step_count += 1;
    }

    /// Flip Autonomous -> Guided (operator "stop", or AI outage fallback).
    /// The reverse transition does not exist: a session started guided can
    /// never become autonomous.
    pub fn switch_to_guided(&mut self) {
        if self.mode != SessionMode::Guided {
            debug!(session = %self.id, "mode switched to guided");
        }
        self.mode = SessionMode::Guided;
    }

    pub fn set_status(&mut self, status: SessionStatus) -> Result<()> {
        if self.status == SessionStatus::Ended {
            return Err(Error::Session(format!(
                "session {} has ended, status is terminal",
                self.id
            )));
        }
        debug!(session = %self.id, from = ?self.status, to = ?status, "status change");
        self.status = status;
        Ok(())
    }

    /// Terminal. After this every mutation is rejected.
    pub fn end(&mut self) {
        debug!(session = %self.id, "session ended");
        self.status = SessionStatus::Ended;
    }

    /// Cache the one-shot site description. Later calls are ignored so the
    /// context stays stable for the whole session.
    pub fn set_site_context(&mut self, context: &str) {
        if self.site_context.is_none() && !context.trim().is_empty() {
            self.site_context = Some(context.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::builtin_personas;
    use crate::types::{EventKind, PageType};

    fn note(text: &str) -> Event {
        Event::now(
            EventKind::SystemNote {
                text: text.to_string(),
            },
            PageType::Unknown,
        )
    }

    fn session() -> Session {
        Session::guided(builtin_personas()[0].clone(), "https://example.test")
    }

    #[test]
    fn transcript_is_append_only() {
        let mut s = session();
        s.append(note("one")).unwrap();
        s.append(note("two")).unwrap();
        assert_eq!(s.transcript().len(), 2);
        let first = s.transcript()[0].clone();
        s.append(note("three")).unwrap();
        assert_eq!(s.transcript()[0], first);
        assert_eq!(s.transcript().len(), 3);
    }

    #[test]
    fn ended_session_rejects_mutation() {
        let mut s = session();
        s.append(note("one")).unwrap();
        s.end();
        assert!(s.append(note("late")).is_err());
        assert!(s.set_status(SessionStatus::Active).is_err());
        assert_eq!(s.transcript().len(), 1);
        assert_eq!(s.status(), SessionStatus::Ended);
    }

    #[test]
    fn guided_session_never_turns_autonomous() {
        let mut s = Session::autonomous(
            builtin_personas()[0].clone(),
            "https://example.test",
            Goal {
                objective: "look around".to_string(),
                max_steps: 5,
            },
        );
        assert_eq!(s.mode(), SessionMode::Autonomous);
        s.switch_to_guided();
        assert_eq!(s.mode(), SessionMode::Guided);
        // No API exists to go back; switching again is a no-op.
        s.switch_to_guided();
        assert_eq!(s.mode(), SessionMode::Guided);
    }

    #[test]
    fn window_bounds_the_transcript() {
        let mut s = session();
        for i in 0..10 {
            s.append(note(&format!("e{i}"))).unwrap();
        }
        let window = s.transcript_window(3);
        assert_eq!(window.len(), 3);
        assert!(matches!(
            &window[0].kind,
            EventKind::SystemNote { text } if text == "e7"
        ));
        assert_eq!(s.transcript_window(100).len(), 10);
    }

    #[test]
    fn site_context_is_set_once() {
        let mut s = session();
        s.set_site_context("a trattoria in Milan");
        s.set_site_context("something else");
        assert_eq!(s.site_context(), Some("a trattoria in Milan"));
    }
}
