//! Session state machine.
//!
//! One instance per live session, no process-global state. Owns the
//! transcript (through the `Session` aggregate), dispatches operator
//! commands, and holds the single control flow: guided commands are
//! rejected while the autonomous loop is running, and vice versa. Every
//! appended event is mirrored on an ordered broadcast stream for the
//! transport layer.

use personalens_browser::{Automation, BrowserController};
use personalens_core::config::{Config, SessionDefaults};
use personalens_core::persona::{find_persona, Persona};
use personalens_core::types::{
    Event, EventKind, Goal, NavigationAction, PageType, Rect, SessionMode, SessionStatus,
};
use personalens_core::{Error, Result, Session};
use personalens_gateway::{Gateway, VisionService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{info, warn};

use crate::engine::{EngineControl, NavigatorEngine};
use crate::export::export_markdown;
use crate::interpreter::{interpret, OperatorInput};

const EVENT_STREAM_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct StartOptions {
    pub persona_id: String,
    pub custom_profile: Option<String>,
    pub start_url: String,
    pub goal: Option<Goal>,
}

/// One item on the transport stream: the event plus the status at the
/// moment it was appended.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub status: SessionStatus,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionCommand {
    Input { text: String },
    Click { x: f64, y: f64 },
    Scroll { delta: i64 },
    NavigateUrl { url: String },
    Comment,
    Highlight { rect: Rect, question: String },
    Insights,
    Export,
    StartAutonomous,
    Pause,
    Resume,
    FastForward,
    Stop,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Accepted,
    Export(String),
}

struct EngineHandle {
    control: mpsc::Sender<EngineControl>,
    task: tokio::task::JoinHandle<()>,
}

pub struct SessionMachine {
    session: Arc<Mutex<Session>>,
    controller: Arc<BrowserController>,
    gateway: Arc<Gateway>,
    defaults: SessionDefaults,
    events: broadcast::Sender<SessionEvent>,
    engine: Mutex<Option<EngineHandle>>,
}

impl std::fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMachine").finish_non_exhaustive()
    }
}

impl SessionMachine {
    /// Validate the config, create the session, and open the start page.
    /// A failed start navigation leaves the session `Failed` but usable:
    /// the operator can retry with a manual `NavigateUrl`.
    pub async fn start(
        config: &Config,
        automation: Arc<dyn Automation>,
        service: Arc<dyn VisionService>,
        opts: StartOptions,
    ) -> Result<Self> {
        config.validate()?;

        let base = find_persona(&opts.persona_id)
            .ok_or_else(|| Error::NotFound(format!("persona '{}'", opts.persona_id)))?;
        let persona = match &opts.custom_profile {
            Some(profile) => Persona::customized(base, profile),
            None => base.clone(),
        };
        let session = match opts.goal.clone() {
            Some(goal) => Session::autonomous(persona, &opts.start_url, goal),
            None => Session::guided(persona, &opts.start_url),
        };
        info!(
            session_id = %session.id(),
            persona = %session.persona().id,
            mode = ?session.mode(),
            url = %opts.start_url,
            "session starting"
        );

        let (events, _) = broadcast::channel(EVENT_STREAM_CAPACITY);
        let machine = Self {
            session: Arc::new(Mutex::new(session)),
            controller: Arc::new(BrowserController::new(automation)),
            gateway: Arc::new(Gateway::new(service, config.session.retry_delay_ms)),
            defaults: config.session.clone(),
            events,
            engine: Mutex::new(None),
        };
        machine.open_start_page(&opts.start_url).await;
        Ok(machine)
    }

    async fn open_start_page(&self, url: &str) {
        if let Err(e) = self.controller.navigate(url).await {
            self.fail_note(e.to_string()).await;
            return;
        }
        let observation = match self.controller.observe().await {
            Ok(observation) => observation,
            Err(e) => {
                self.fail_note(format!("observation failed: {e}")).await;
                return;
            }
        };
        self.append(
            EventKind::Navigation {
                url: observation.url.clone(),
                action: NavigationAction::NavigateTo {
                    url: url.to_string(),
                },
            },
            observation.page_type,
        )
        .await;

        // One-shot site description, cached for the whole session.
        match self.gateway.describe_site(&observation).await {
            Ok(context) => self.session.lock().await.set_site_context(&context),
            Err(e) => warn!(error = %e, "site context unavailable, continuing without"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Full transcript copy for reconnect replay.
    pub async fn transcript_snapshot(&self) -> Vec<Event> {
        self.session.lock().await.transcript().to_vec()
    }

    pub async fn status(&self) -> SessionStatus {
        self.session.lock().await.status()
    }

    pub async fn session_id(&self) -> String {
        self.session.lock().await.id().to_string()
    }

    /// Quick-question suggestions for the page the session last saw.
    /// Reads the transcript only; issuing browser calls here would race
    /// the autonomous loop's own observe/act cycle on the controller.
    pub async fn current_suggestions(&self) -> &'static [&'static str] {
        personalens_classifier::suggestions_for(self.current_page_type().await)
    }

    pub async fn handle(&self, command: SessionCommand) -> Result<CommandOutcome> {
        self.reap_engine().await;
        match command {
            SessionCommand::Pause => {
                self.engine_control(EngineControl::Pause, Some(SessionStatus::Paused))
                    .await
            }
            SessionCommand::Resume => {
                self.engine_control(EngineControl::Resume, Some(SessionStatus::Active))
                    .await
            }
            SessionCommand::FastForward => self.engine_control(EngineControl::FastForward, None).await,
            SessionCommand::Stop => self.engine_control(EngineControl::Stop, None).await,
            SessionCommand::StartAutonomous => self.start_autonomous().await,
            SessionCommand::End => self.end().await,
            guided => {
                self.ensure_guided_control().await?;
                match guided {
                    SessionCommand::Input { text } => self.guided_input(&text).await,
                    SessionCommand::Click { x, y } => {
                        self.perform_action(NavigationAction::ClickAt { x, y }).await
                    }
                    SessionCommand::Scroll { delta } => {
                        self.perform_action(NavigationAction::ScrollBy { amount: delta })
                            .await
                    }
                    SessionCommand::NavigateUrl { url } => self.manual_navigate(&url).await,
                    SessionCommand::Comment => self.persona_comment().await,
                    SessionCommand::Highlight { rect, question } => {
                        self.highlight(&rect, &question).await
                    }
                    SessionCommand::Insights => self.insights().await,
                    SessionCommand::Export => {
                        let session = self.session.lock().await;
                        Ok(CommandOutcome::Export(export_markdown(&session)))
                    }
                    _ => unreachable!("control commands handled above"),
                }
            }
        }
    }

    /// Guided commands require the autonomous loop to be idle and the
    /// session to still be alive.
    async fn ensure_guided_control(&self) -> Result<()> {
        if self.engine_active().await {
            return Err(Error::Session(
                "autonomous loop holds control; stop or pause it first".to_string(),
            ));
        }
        if self.session.lock().await.status() == SessionStatus::Ended {
            return Err(Error::Session("session has ended".to_string()));
        }
        Ok(())
    }

    async fn guided_input(&self, text: &str) -> Result<CommandOutcome> {
        let page_type = self.current_page_type().await;
        match interpret(text, page_type) {
            OperatorInput::Navigation(action) => {
                self.append(
                    EventKind::OperatorCommand {
                        text: text.to_string(),
                    },
                    page_type,
                )
                .await;
                self.perform_action(action).await
            }
            OperatorInput::Question(question) => self.ask_persona(&question).await,
        }
    }

    async fn perform_action(&self, action: NavigationAction) -> Result<CommandOutcome> {
        match self.controller.act(&action).await {
            Ok(()) => {
                let observation = self.controller.observe().await.ok();
                let (url, page_type) = observation
                    .map(|o| (o.url, o.page_type))
                    .unwrap_or_else(|| (String::new(), PageType::Unknown));
                self.append(EventKind::Navigation { url, action }, page_type)
                    .await;
                Ok(CommandOutcome::Accepted)
            }
            // Rejected locally; nothing reached the browser.
            Err(e @ Error::InvalidAction(_)) => Err(e),
            Err(e) => {
                self.fail_note(e.to_string()).await;
                Ok(CommandOutcome::Accepted)
            }
        }
    }

    async fn manual_navigate(&self, url: &str) -> Result<CommandOutcome> {
        match self.controller.navigate(url).await {
            Ok(()) => {
                // A successful manual navigation recovers a failed session.
                {
                    let mut session = self.session.lock().await;
                    if session.status() == SessionStatus::Failed {
                        let _ = session.set_status(SessionStatus::Active);
                    }
                }
                let observation = self.controller.observe().await.ok();
                let (observed_url, page_type) = observation
                    .map(|o| (o.url, o.page_type))
                    .unwrap_or_else(|| (url.to_string(), PageType::Unknown));
                self.append(
                    EventKind::Navigation {
                        url: observed_url,
                        action: NavigationAction::NavigateTo {
                            url: url.to_string(),
                        },
                    },
                    page_type,
                )
                .await;
                Ok(CommandOutcome::Accepted)
            }
            Err(e) => {
                self.fail_note(e.to_string()).await;
                Ok(CommandOutcome::Accepted)
            }
        }
    }

    async fn ask_persona(&self, question: &str) -> Result<CommandOutcome> {
        let observation = match self.controller.observe().await {
            Ok(observation) => observation,
            Err(e) => {
                self.fail_note(format!("observation failed: {e}")).await;
                return Ok(CommandOutcome::Accepted);
            }
        };
        self.append(
            EventKind::OperatorQuestion {
                text: question.to_string(),
            },
            observation.page_type,
        )
        .await;

        let (persona, site_context, window) = self.prompt_inputs().await;
        match self
            .gateway
            .answer(&persona, site_context.as_deref(), &observation, &window, question)
            .await
        {
            Ok(text) => {
                self.append(EventKind::PersonaReply { text }, observation.page_type)
                    .await;
                Ok(CommandOutcome::Accepted)
            }
            Err(Error::AiUnavailable(reason)) => {
                // Guided sessions survive an AI outage; the operator just
                // sees the note and can try again later.
                self.append(
                    EventKind::SystemNote {
                        text: format!("AI unavailable: {reason}"),
                    },
                    observation.page_type,
                )
                .await;
                Ok(CommandOutcome::Accepted)
            }
            Err(e) => Err(e),
        }
    }

    async fn persona_comment(&self) -> Result<CommandOutcome> {
        let observation = match self.controller.observe().await {
            Ok(observation) => observation,
            Err(e) => {
                self.fail_note(format!("observation failed: {e}")).await;
                return Ok(CommandOutcome::Accepted);
            }
        };
        let (persona, site_context, window) = self.prompt_inputs().await;
        match self
            .gateway
            .react(&persona, site_context.as_deref(), &observation, &window)
            .await
        {
            Ok(text) => {
                self.append(EventKind::PersonaReply { text }, observation.page_type)
                    .await;
                Ok(CommandOutcome::Accepted)
            }
            Err(Error::AiUnavailable(reason)) => {
                self.append(
                    EventKind::SystemNote {
                        text: format!("AI unavailable: {reason}"),
                    },
                    observation.page_type,
                )
                .await;
                Ok(CommandOutcome::Accepted)
            }
            Err(e) => Err(e),
        }
    }

    async fn highlight(&self, rect: &Rect, question: &str) -> Result<CommandOutcome> {
        let region = self.controller.highlight(rect).await?;
        let page_type = self.current_page_type().await;
        self.append(
            EventKind::OperatorQuestion {
                text: question.to_string(),
            },
            page_type,
        )
        .await;

        let (persona, site_context, _) = self.prompt_inputs().await;
        match self
            .gateway
            .answer_region(&persona, site_context.as_deref(), &region, question)
            .await
        {
            Ok(text) => {
                self.append(EventKind::PersonaReply { text }, page_type).await;
                Ok(CommandOutcome::Accepted)
            }
            Err(Error::AiUnavailable(reason)) => {
                self.append(
                    EventKind::SystemNote {
                        text: format!("AI unavailable: {reason}"),
                    },
                    page_type,
                )
                .await;
                Ok(CommandOutcome::Accepted)
            }
            Err(e) => Err(e),
        }
    }

    async fn insights(&self) -> Result<CommandOutcome> {
        let (persona, site_context, _) = self.prompt_inputs().await;
        let transcript = self.transcript_snapshot().await;
        let page_type = transcript.last().map(|e| e.page_type).unwrap_or_default();
        match self
            .gateway
            .insights(&persona, site_context.as_deref(), &transcript)
            .await
        {
            Ok(text) => {
                self.append(EventKind::PersonaReply { text }, page_type).await;
                Ok(CommandOutcome::Accepted)
            }
            Err(Error::AiUnavailable(reason)) => {
                self.append(
                    EventKind::SystemNote {
                        text: format!("AI unavailable: {reason}"),
                    },
                    page_type,
                )
                .await;
                Ok(CommandOutcome::Accepted)
            }
            Err(e) => Err(e),
        }
    }

    async fn start_autonomous(&self) -> Result<CommandOutcome> {
        {
            let session = self.session.lock().await;
            if session.mode() != SessionMode::Autonomous {
                return Err(Error::Session(
                    "session was not started in autonomous mode".to_string(),
                ));
            }
            if session.status() == SessionStatus::Ended {
                return Err(Error::Session("session has ended".to_string()));
            }
        }
        let mut engine_slot = self.engine.lock().await;
        if engine_slot.as_ref().is_some_and(|h| !h.task.is_finished()) {
            return Err(Error::Session("autonomous loop is already running".to_string()));
        }
        let _ = self.session.lock().await.set_status(SessionStatus::Active);

        let (control, control_rx) = mpsc::channel(16);
        let engine = NavigatorEngine::new(
            self.session.clone(),
            self.controller.clone(),
            self.gateway.clone(),
            control_rx,
            self.events.clone(),
            &self.defaults,
        );
        let task = tokio::spawn(engine.run());
        *engine_slot = Some(EngineHandle { control, task });
        Ok(CommandOutcome::Accepted)
    }

    async fn engine_control(
        &self,
        control: EngineControl,
        status: Option<SessionStatus>,
    ) -> Result<CommandOutcome> {
        let engine_slot = self.engine.lock().await;
        match engine_slot.as_ref() {
            Some(handle) if !handle.task.is_finished() => {
                handle
                    .control
                    .send(control)
                    .await
                    .map_err(|_| Error::Session("autonomous loop is not running".to_string()))?;
                if let Some(status) = status {
                    let _ = self.session.lock().await.set_status(status);
                }
                Ok(CommandOutcome::Accepted)
            }
            _ => Err(Error::Session("autonomous loop is not running".to_string())),
        }
    }

    async fn end(&self) -> Result<CommandOutcome> {
        let handle = self.engine.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.control.send(EngineControl::Stop).await;
            let _ = handle.task.await;
        }
        self.append(
            EventKind::SystemNote {
                text: "session ended".to_string(),
            },
            self.current_page_type().await,
        )
        .await;
        self.session.lock().await.end();
        self.controller.close().await;
        info!("session ended");
        Ok(CommandOutcome::Accepted)
    }

    async fn engine_active(&self) -> bool {
        self.engine
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    async fn reap_engine(&self) {
        let mut engine_slot = self.engine.lock().await;
        if engine_slot.as_ref().is_some_and(|h| h.task.is_finished()) {
            *engine_slot = None;
        }
    }

    async fn prompt_inputs(&self) -> (Persona, Option<String>, Vec<Event>) {
        let session = self.session.lock().await;
        (
            session.persona().clone(),
            session.site_context().map(|s| s.to_string()),
            session.transcript_window(self.defaults.transcript_window).to_vec(),
        )
    }

    /// Page type of the last transcript entry. The transcript records what
    /// the session last saw, so this never needs a browser round trip.
    async fn current_page_type(&self) -> PageType {
        self.session
            .lock()
            .await
            .transcript()
            .last()
            .map(|event| event.page_type)
            .unwrap_or_default()
    }

    async fn append(&self, kind: EventKind, page_type: PageType) {
        let event = Event::now(kind, page_type);
        let mut session = self.session.lock().await;
        if session.append(event.clone()).is_ok() {
            let _ = self.events.send(SessionEvent {
                status: session.status(),
                event,
            });
        }
    }

    /// Record a terminal operator-visible failure. The session stays
    /// around so a manual navigation can revive it.
    async fn fail_note(&self, reason: String) {
        warn!(%reason, "session failure");
        {
            let mut session = self.session.lock().await;
            let _ = session.set_status(SessionStatus::Failed);
        }
        self.append(EventKind::SystemNote { text: reason }, PageType::Unknown)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use personalens_core::config::ProviderConfig;
    use personalens_core::types::{PageSignals, Viewport};
    use personalens_gateway::{VisionReply, VisionRequest};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeSite {
        refuse_navigation: AtomicBool,
        signals_calls: AtomicUsize,
    }

    impl FakeSite {
        fn new() -> Self {
            Self {
                refuse_navigation: AtomicBool::new(false),
                signals_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Automation for FakeSite {
        async fn navigate(&self, _url: &str) -> Result<()> {
            if self.refuse_navigation.load(Ordering::SeqCst) {
                Err(Error::Browser("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
        async fn screenshot(&self, _clip: Option<Rect>) -> Result<String> {
            Ok("cGFnZQ==".to_string())
        }
        async fn click(&self, _x: f64, _y: f64) -> Result<()> {
            Ok(())
        }
        async fn scroll(&self, _dy: i64) -> Result<()> {
            Ok(())
        }
        async fn go_back(&self) -> Result<()> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            Ok("https://osteria.example/prenota".to_string())
        }
        async fn dismiss_cookie_banner(&self) -> bool {
            false
        }
        async fn page_signals(&self) -> Result<PageSignals> {
            self.signals_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PageSignals {
                url: "https://osteria.example/prenota".to_string(),
                title: "Prenota un tavolo".to_string(),
                headings: vec!["Prenotazioni".to_string()],
                link_texts: vec![],
            })
        }
        async fn viewport(&self) -> Result<Viewport> {
            Ok(Viewport {
                width: 1280,
                height: 800,
            })
        }
        async fn close(&self) {}
    }

    struct CannedService {
        reply: String,
        delay: Duration,
    }

    #[async_trait]
    impl VisionService for CannedService {
        async fn respond(&self, _request: &VisionRequest) -> Result<VisionReply> {
            tokio::time::sleep(self.delay).await;
            Ok(VisionReply {
                text: self.reply.clone(),
            })
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.providers.insert(
            "gemini".to_string(),
            ProviderConfig {
                api_key: "k".to_string(),
                api_base: None,
            },
        );
        config.session.retry_delay_ms = 0;
        config.session.pause_delay_ms = 0;
        config
    }

    async fn guided_machine(site: Arc<FakeSite>, reply: &str) -> SessionMachine {
        SessionMachine::start(
            &config(),
            site,
            Arc::new(CannedService {
                reply: reply.to_string(),
                delay: Duration::ZERO,
            }),
            StartOptions {
                persona_id: "marco".to_string(),
                custom_profile: None,
                start_url: "https://osteria.example".to_string(),
                goal: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn guided_question_appends_one_persona_reply() {
        let machine = guided_machine(
            Arc::new(FakeSite::new()),
            "Sì, prenoterei volentieri: il form è chiaro.",
        )
        .await;
        machine
            .handle(SessionCommand::Input {
                text: "prenoteresti qui?".to_string(),
            })
            .await
            .unwrap();

        let transcript = machine.transcript_snapshot().await;
        let questions: Vec<_> = transcript
            .iter()
            .filter(|e| matches!(e.kind, EventKind::OperatorQuestion { .. }))
            .collect();
        let replies: Vec<_> = transcript
            .iter()
            .filter(|e| matches!(e.kind, EventKind::PersonaReply { .. }))
            .collect();
        assert_eq!(questions.len(), 1);
        assert_eq!(replies.len(), 1);
        assert_eq!(questions[0].page_type, PageType::Booking);
    }

    #[tokio::test]
    async fn suggestions_come_from_the_transcript_not_the_browser() {
        let site = Arc::new(FakeSite::new());
        let machine = guided_machine(site.clone(), "ok").await;

        let observed = site.signals_calls.load(Ordering::SeqCst);
        let suggestions = machine.current_suggestions().await;
        machine.current_suggestions().await;

        assert_eq!(site.signals_calls.load(Ordering::SeqCst), observed);
        assert_eq!(
            suggestions,
            personalens_classifier::suggestions_for(PageType::Booking)
        );
    }

    #[tokio::test]
    async fn unknown_persona_is_rejected_at_start() {
        let err = SessionMachine::start(
            &config(),
            Arc::new(FakeSite::new()),
            Arc::new(CannedService {
                reply: "ok".to_string(),
                delay: Duration::ZERO,
            }),
            StartOptions {
                persona_id: "nessuno".to_string(),
                custom_profile: None,
                start_url: "https://osteria.example".to_string(),
                goal: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn start_autonomous_requires_autonomous_mode() {
        let machine = guided_machine(Arc::new(FakeSite::new()), "ok").await;
        let err = machine
            .handle(SessionCommand::StartAutonomous)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[tokio::test]
    async fn guided_commands_are_rejected_while_the_loop_runs() {
        let machine = SessionMachine::start(
            &config(),
            Arc::new(FakeSite::new()),
            Arc::new(CannedService {
                reply: r#"{"comment": "guardo", "action": "SCROLL_DOWN"}"#.to_string(),
                delay: Duration::from_millis(300),
            }),
            StartOptions {
                persona_id: "marco".to_string(),
                custom_profile: None,
                start_url: "https://osteria.example".to_string(),
                goal: Some(Goal {
                    objective: "look around".to_string(),
                    max_steps: 5,
                }),
            },
        )
        .await
        .unwrap();

        machine.handle(SessionCommand::StartAutonomous).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let err = machine
            .handle(SessionCommand::Input {
                text: "che ne pensi?".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(_)));

        machine.handle(SessionCommand::Stop).await.unwrap();
    }

    #[tokio::test]
    async fn failed_navigation_leaves_a_note_and_recovers_on_retry() {
        let site = Arc::new(FakeSite::new());
        let machine = guided_machine(site.clone(), "ok").await;

        site.refuse_navigation.store(true, Ordering::SeqCst);
        machine
            .handle(SessionCommand::NavigateUrl {
                url: "https://down.example".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(machine.status().await, SessionStatus::Failed);
        assert!(machine
            .transcript_snapshot()
            .await
            .iter()
            .any(|e| matches!(e.kind, EventKind::SystemNote { .. })));

        site.refuse_navigation.store(false, Ordering::SeqCst);
        machine
            .handle(SessionCommand::NavigateUrl {
                url: "https://osteria.example/prenota".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(machine.status().await, SessionStatus::Active);
    }

    #[tokio::test]
    async fn ended_session_rejects_everything() {
        let machine = guided_machine(Arc::new(FakeSite::new()), "ok").await;
        machine.handle(SessionCommand::End).await.unwrap();
        let err = machine
            .handle(SessionCommand::Input {
                text: "ci sei ancora?".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[tokio::test]
    async fn export_command_returns_markdown() {
        let machine = guided_machine(Arc::new(FakeSite::new()), "ok").await;
        let outcome = machine.handle(SessionCommand::Export).await.unwrap();
        match outcome {
            CommandOutcome::Export(markdown) => {
                assert!(markdown.contains("Marco"));
            }
            other => panic!("expected export output, got {other:?}"),
        }
    }
}
