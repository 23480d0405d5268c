//! Autonomous navigation engine.
//!
//! One cooperative loop per session: Observing -> Deciding -> Acting ->
//! Pausing, repeated until the step limit, a satisfied goal, an operator
//! stop, or an unrecoverable failure. Control requests are honored only at
//! state boundaries; an in-flight AI or browser call always runs to
//! completion.

use personalens_browser::BrowserController;
use personalens_core::config::SessionDefaults;
use personalens_core::types::{Event, EventKind, NavigationAction, PageType, SessionStatus};
use personalens_core::{Error, Session};
use personalens_gateway::{Decision, Gateway};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{info, warn};

use crate::machine::SessionEvent;
use crate::visits::VisitLog;

const MAX_SCROLLS_PER_PAGE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineControl {
    Pause,
    Resume,
    Stop,
    FastForward,
}

enum Boundary {
    Continue,
    Stop,
}

pub struct NavigatorEngine {
    session: Arc<Mutex<Session>>,
    controller: Arc<BrowserController>,
    gateway: Arc<Gateway>,
    control: mpsc::Receiver<EngineControl>,
    events: broadcast::Sender<SessionEvent>,
    pause_delay_ms: u64,
    transcript_window: usize,
    paused: bool,
}

impl NavigatorEngine {
    pub fn new(
        session: Arc<Mutex<Session>>,
        controller: Arc<BrowserController>,
        gateway: Arc<Gateway>,
        control: mpsc::Receiver<EngineControl>,
        events: broadcast::Sender<SessionEvent>,
        defaults: &SessionDefaults,
    ) -> Self {
        Self {
            session,
            controller,
            gateway,
            control,
            events,
            pause_delay_ms: defaults.pause_delay_ms,
            transcript_window: defaults.transcript_window,
            paused: false,
        }
    }

    pub async fn run(mut self) {
        let goal = match self.session.lock().await.goal().cloned() {
            Some(goal) => goal,
            None => {
                self.fail("no objective configured for autonomous run".to_string(), PageType::Unknown)
                    .await;
                return;
            }
        };
        info!(objective = %goal.objective, max_steps = goal.max_steps, "autonomous run starting");

        let mut visits = VisitLog::new(MAX_SCROLLS_PER_PAGE);
        let mut last_page = PageType::Unknown;

        loop {
            if let Boundary::Stop = self.boundary().await {
                self.finish(true, last_page).await;
                return;
            }

            let step = self.session.lock().await.step_count();
            if step >= goal.max_steps {
                self.finish(false, last_page).await;
                return;
            }

            // Observing
            let observation = match self.controller.observe().await {
                Ok(observation) => observation,
                Err(e) => {
                    self.fail(format!("observation failed: {e}"), last_page).await;
                    return;
                }
            };
            last_page = observation.page_type;
            visits.record_visit(&observation.url);

            if let Boundary::Stop = self.boundary().await {
                self.finish(true, last_page).await;
                return;
            }

            // Deciding
            let decision = match self.decide(&goal, &observation, step, &visits).await {
                Ok(decision) => decision,
                Err(e) => {
                    self.fail(format!("autonomous navigation halted: {e}"), last_page)
                        .await;
                    return;
                }
            };

            if !decision.comment.is_empty() {
                self.append(
                    EventKind::PersonaReply {
                        text: decision.comment.clone(),
                    },
                    observation.page_type,
                )
                .await;
            }

            // Acting
            let mut acted = false;
            match &decision.action {
                None => {
                    // A comment-only round still consumes a step so the loop
                    // cannot spin forever on unparsable decisions.
                    if !decision.goal_satisfied {
                        acted = true;
                    }
                }
                Some(NavigationAction::ScrollBy { .. })
                    if !visits.scroll_allowed(&observation.url) =>
                {
                    // Page fully explored; treat like a satisfied goal.
                    info!(url = %observation.url, "scroll cap reached, ending run");
                    self.finish(false, last_page).await;
                    return;
                }
                Some(NavigationAction::NavigateTo { url }) if visits.was_visited(url) => {
                    self.append(
                        EventKind::SystemNote {
                            text: format!("skipped already visited page {url}"),
                        },
                        observation.page_type,
                    )
                    .await;
                    acted = true;
                }
                Some(action) => match self.controller.act(action).await {
                    Ok(()) => {
                        if matches!(action, NavigationAction::ScrollBy { .. }) {
                            visits.record_scroll(&observation.url);
                        }
                        let url = self
                            .controller
                            .current_url()
                            .await
                            .unwrap_or_else(|_| observation.url.clone());
                        self.append(
                            EventKind::Navigation {
                                url,
                                action: action.clone(),
                            },
                            observation.page_type,
                        )
                        .await;
                        acted = true;
                    }
                    Err(Error::InvalidAction(reason)) => {
                        warn!(%reason, "decision rejected");
                        self.append(
                            EventKind::SystemNote {
                                text: format!("action rejected: {reason}"),
                            },
                            observation.page_type,
                        )
                        .await;
                    }
                    Err(e) => {
                        self.fail(format!("browser failure: {e}"), last_page).await;
                        return;
                    }
                },
            }

            if acted {
                self.session.lock().await.record_step();
            }

            // Termination checks, in priority order.
            let step = self.session.lock().await.step_count();
            if step >= goal.max_steps || decision.goal_satisfied {
                self.finish(false, last_page).await;
                return;
            }

            if let Boundary::Stop = self.pausing().await {
                self.finish(true, last_page).await;
                return;
            }
        }
    }

    async fn decide(
        &self,
        goal: &personalens_core::types::Goal,
        observation: &personalens_core::types::PageObservation,
        step: u32,
        visits: &VisitLog,
    ) -> personalens_core::Result<Decision> {
        let (persona, site_context, window) = {
            let session = self.session.lock().await;
            (
                session.persona().clone(),
                session.site_context().map(|s| s.to_string()),
                session.transcript_window(self.transcript_window).to_vec(),
            )
        };
        self.gateway
            .decide(
                &persona,
                site_context.as_deref(),
                goal,
                observation,
                &window,
                step + 1,
                visits.visited_pages(),
            )
            .await
    }

    /// Drain pending control requests; block while paused.
    async fn boundary(&mut self) -> Boundary {
        loop {
            match self.control.try_recv() {
                Ok(EngineControl::Pause) => self.paused = true,
                Ok(EngineControl::Resume) => self.paused = false,
                Ok(EngineControl::Stop) => return Boundary::Stop,
                Ok(EngineControl::FastForward) => {}
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => return Boundary::Stop,
            }
        }
        while self.paused {
            match self.control.recv().await {
                Some(EngineControl::Resume) => self.paused = false,
                Some(EngineControl::Stop) | None => return Boundary::Stop,
                Some(_) => {}
            }
        }
        Boundary::Continue
    }

    /// Inter-step delay. FastForward skips the remaining delay only; Pause
    /// takes effect at the next boundary.
    async fn pausing(&mut self) -> Boundary {
        let delay = tokio::time::sleep(Duration::from_millis(self.pause_delay_ms));
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => return Boundary::Continue,
                control = self.control.recv() => match control {
                    Some(EngineControl::FastForward) => return Boundary::Continue,
                    Some(EngineControl::Pause) => self.paused = true,
                    Some(EngineControl::Resume) => self.paused = false,
                    Some(EngineControl::Stop) | None => return Boundary::Stop,
                }
            }
        }
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

    async fn finish(&self, stopped: bool, page_type: PageType) {
        let steps = {
            let mut session = self.session.lock().await;
            if stopped {
                session.switch_to_guided();
            }
            let _ = session.set_status(SessionStatus::AwaitingQa);
            session.step_count()
        };
        info!(steps, stopped, "autonomous run finished");
        self.append(
            EventKind::SystemNote {
                text: format!("autonomous exploration finished after {steps} step(s)"),
            },
            page_type,
        )
        .await;
    }

    async fn fail(&self, reason: String, page_type: PageType) {
        warn!(%reason, "autonomous run failed");
        {
            let mut session = self.session.lock().await;
            session.switch_to_guided();
            let _ = session.set_status(SessionStatus::Failed);
        }
        self.append(EventKind::SystemNote { text: reason }, page_type)
            .await;
    }
}
