//! Vision model gateway.
//!
//! [`VisionService`] is the provider seam: one request in, one reply out.
//! [`Gateway`] owns the retry policy and the session-facing operations
//! (persona reactions, Q&A, autonomous decisions, insights). Everything
//! above this crate talks in domain types, never in provider wire formats.

pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod parse;
pub mod prompt;

use async_trait::async_trait;
use personalens_core::persona::Persona;
use personalens_core::types::{Event, Goal, PageObservation};
use personalens_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use anthropic::AnthropicService;
pub use factory::create_service;
pub use gemini::GeminiService;
pub use parse::{parse_decision, Decision};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    Operator,
    Persona,
}

/// One prior exchange included as model context.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

/// A single vision call: system framing, prior turns, at most one image,
/// and the prompt for this turn.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub system: String,
    pub history: Vec<Turn>,
    pub image_b64: Option<String>,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct VisionReply {
    pub text: String,
}

#[async_trait]
pub trait VisionService: Send + Sync {
    async fn respond(&self, request: &VisionRequest) -> Result<VisionReply>;
}

impl std::fmt::Debug for dyn VisionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn VisionService")
    }
}

/// Map a failed HTTP status onto the retry classes.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: &str) -> Error {
    let snippet: String = body.chars().take(300).collect();
    let detail = format!("{provider} API error {status}: {snippet}");
    if status == reqwest::StatusCode::REQUEST_TIMEOUT {
        Error::Timeout(detail)
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Error::RateLimited(detail)
    } else if status.is_server_error() {
        Error::ServerError(detail)
    } else {
        Error::Provider(detail)
    }
}

/// Transport failures before any status line. A refused connection is
/// retried like a timeout; anything else is not worth a second attempt.
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::Timeout(format!("{provider} request failed: {e}"))
    } else {
        Error::Provider(format!("{provider} request failed: {e}"))
    }
}

pub struct Gateway {
    service: Arc<dyn VisionService>,
    retry_delay_ms: u64,
}

impl Gateway {
    pub fn new(service: Arc<dyn VisionService>, retry_delay_ms: u64) -> Self {
        Self {
            service,
            retry_delay_ms,
        }
    }

    /// One call with a single retry on transient failures. A second
    /// transient failure is surfaced as the service being unavailable.
    async fn call(&self, request: &VisionRequest) -> Result<VisionReply> {
        match self.service.respond(request).await {
            Ok(reply) => Ok(reply),
            Err(e) if e.is_transient() => {
                warn!(error = %e, delay_ms = self.retry_delay_ms, "vision call failed, retrying once");
                tokio::time::sleep(Duration::from_millis(self.retry_delay_ms)).await;
                match self.service.respond(request).await {
                    Ok(reply) => Ok(reply),
                    Err(e2) if e2.is_transient() => Err(Error::AiUnavailable(e2.to_string())),
                    Err(e2) => Err(e2),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// In-character first reaction to a freshly observed page.
    pub async fn react(
        &self,
        persona: &Persona,
        site_context: Option<&str>,
        observation: &PageObservation,
        history: &[Event],
    ) -> Result<String> {
        let request = VisionRequest {
            system: prompt::persona_system(persona, site_context),
            history: prompt::render_history(history),
            image_b64: Some(observation.screenshot_b64.clone()),
            prompt: prompt::reaction_prompt(observation),
        };
        let reply = self.call(&request).await?;
        Ok(reply.text.trim().to_string())
    }

    /// In-character answer to an operator question about the current page.
    pub async fn answer(
        &self,
        persona: &Persona,
        site_context: Option<&str>,
        observation: &PageObservation,
        history: &[Event],
        question: &str,
    ) -> Result<String> {
        let request = VisionRequest {
            system: prompt::persona_system(persona, site_context),
            history: prompt::render_history(history),
            image_b64: Some(observation.screenshot_b64.clone()),
            prompt: prompt::question_prompt(question),
        };
        let reply = self.call(&request).await?;
        Ok(reply.text.trim().to_string())
    }

    /// Answer about a cropped page region instead of the full page.
    pub async fn answer_region(
        &self,
        persona: &Persona,
        site_context: Option<&str>,
        region_b64: &str,
        question: &str,
    ) -> Result<String> {
        let request = VisionRequest {
            system: prompt::persona_system(persona, site_context),
            history: Vec::new(),
            image_b64: Some(region_b64.to_string()),
            prompt: prompt::region_prompt(question),
        };
        let reply = self.call(&request).await?;
        Ok(reply.text.trim().to_string())
    }

    /// One autonomous navigation decision. Malformed model output never
    /// fails the call; it degrades into a comment-only decision.
    pub async fn decide(
        &self,
        persona: &Persona,
        site_context: Option<&str>,
        goal: &Goal,
        observation: &PageObservation,
        history: &[Event],
        step: u32,
        visited: &[String],
    ) -> Result<Decision> {
        let request = VisionRequest {
            system: prompt::persona_system(persona, site_context),
            history: prompt::render_history(history),
            image_b64: Some(observation.screenshot_b64.clone()),
            prompt: prompt::navigation_prompt(goal, observation, step, visited),
        };
        let reply = self.call(&request).await?;
        let decision = parse_decision(&reply.text);
        debug!(
            action = ?decision.action,
            goal_satisfied = decision.goal_satisfied,
            "decision parsed"
        );
        Ok(decision)
    }

    /// A short neutral description of what the site is, derived from the
    /// first observed page. Not in persona voice.
    pub async fn describe_site(&self, observation: &PageObservation) -> Result<String> {
        let request = VisionRequest {
            system: prompt::site_context_system(),
            history: Vec::new(),
            image_b64: Some(observation.screenshot_b64.clone()),
            prompt: prompt::site_context_prompt(observation),
        };
        let reply = self.call(&request).await?;
        Ok(reply.text.trim().to_string())
    }

    /// End-of-session UX insights over the whole transcript.
    pub async fn insights(
        &self,
        persona: &Persona,
        site_context: Option<&str>,
        history: &[Event],
    ) -> Result<String> {
        let request = VisionRequest {
            system: prompt::persona_system(persona, site_context),
            history: Vec::new(),
            image_b64: None,
            prompt: prompt::insights_prompt(persona, history),
        };
        let reply = self.call(&request).await?;
        Ok(reply.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyService {
        calls: AtomicUsize,
        failures: usize,
        error: fn() -> Error,
    }

    impl FlakyService {
        fn failing(failures: usize, error: fn() -> Error) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                error,
            }
        }
    }

    #[async_trait]
    impl VisionService for FlakyService {
        async fn respond(&self, _request: &VisionRequest) -> Result<VisionReply> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(VisionReply {
                    text: "Che bel sito!".to_string(),
                })
            }
        }
    }

    fn request() -> VisionRequest {
        VisionRequest {
            system: "sys".to_string(),
            history: Vec::new(),
            image_b64: None,
            prompt: "react".to_string(),
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let service = Arc::new(FlakyService::failing(1, || {
            Error::RateLimited("slow down".to_string())
        }));
        let gateway = Gateway::new(service.clone(), 0);
        let reply = gateway.call(&request()).await.unwrap();
        assert_eq!(reply.text, "Che bel sito!");
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_transient_failure_means_unavailable() {
        let service = Arc::new(FlakyService::failing(2, || {
            Error::Timeout("no answer".to_string())
        }));
        let gateway = Gateway::new(service.clone(), 0);
        let err = gateway.call(&request()).await.unwrap_err();
        assert!(matches!(err, Error::AiUnavailable(_)));
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_transient_failure_is_not_retried() {
        let service = Arc::new(FlakyService::failing(2, || {
            Error::Provider("bad api key".to_string())
        }));
        let gateway = Gateway::new(service.clone(), 0);
        let err = gateway.call(&request()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn status_mapping_matches_retry_classes() {
        use reqwest::StatusCode;
        assert!(status_error("gemini", StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(status_error("gemini", StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(status_error("gemini", StatusCode::REQUEST_TIMEOUT, "").is_transient());
        assert!(!status_error("gemini", StatusCode::UNAUTHORIZED, "").is_transient());
        assert!(!status_error("gemini", StatusCode::BAD_REQUEST, "").is_transient());
    }
}
