//! Prompt construction for the vision calls.
//!
//! Persona framing is one system prompt shared by every in-character
//! operation; each operation adds its own user prompt. Decisions carry an
//! explicit JSON contract that `parse` understands.

use crate::{Turn, TurnRole};
use personalens_core::persona::Persona;
use personalens_core::types::{Event, EventKind, Goal, PageObservation};

pub fn persona_system(persona: &Persona, site_context: Option<&str>) -> String {
    let mut system = format!(
        "You are {name}, a real person browsing a website on your own laptop.\n\
         This is your profile. Stay fully in character at all times:\n\n{profile}\n\n\
         Rules:\n\
         - Speak in first person, in Italian, with the tone described above.\n\
         - React to what you actually see in the screenshot; never invent content.\n\
         - You are not an assistant and you never mention being an AI.\n\
         - Keep replies short and conversational, two to four sentences.",
        name = persona.first_name(),
        profile = persona.profile,
    );
    if let Some(context) = site_context {
        system.push_str("\n\nWhat you have understood about this site so far:\n");
        system.push_str(context);
    }
    system
}

pub fn reaction_prompt(observation: &PageObservation) -> String {
    format!(
        "You just landed on this page ({url}). The screenshot shows exactly what is \
         on your screen. Give your spontaneous first impression: what catches your \
         eye, what convinces you, what puts you off.",
        url = observation.url
    )
}

pub fn question_prompt(question: &str) -> String {
    format!(
        "Someone sitting next to you asks: \"{question}\"\n\
         Answer in character, based on the page you are looking at."
    )
}

pub fn region_prompt(question: &str) -> String {
    format!(
        "Look only at this cropped detail of the page. Someone asks: \"{question}\"\n\
         Answer in character about this specific element."
    )
}

pub fn site_context_system() -> String {
    "You describe websites factually for an observation log. \
     No persona, no opinions, no marketing language."
        .to_string()
}

pub fn site_context_prompt(observation: &PageObservation) -> String {
    format!(
        "This is the landing page of {url} (title: \"{title}\"). In two or three \
         plain sentences, state what this site is, what it offers, and who it is \
         aimed at.",
        url = observation.url,
        title = observation.signals.title
    )
}

pub fn navigation_prompt(
    goal: &Goal,
    observation: &PageObservation,
    step: u32,
    visited: &[String],
) -> String {
    let visited_block = if visited.is_empty() {
        "none yet".to_string()
    } else {
        visited.join("\n  ")
    };
    format!(
        "You are browsing this site with a purpose: {objective}\n\
         Step {step} of {max_steps}. Current page: {url} ({label}).\n\
         Pages you already visited:\n  {visited_block}\n\n\
         Look at the screenshot and decide your next move. Respond with a single \
         JSON object and nothing else:\n\
         {{\"comment\": \"<your in-character remark about this page>\",\n \
         \"action\": \"CLICK\" | \"SCROLL_DOWN\" | \"SCROLL_UP\" | \"GOTO\" | \"BACK\" | \"DONE\",\n \
         \"target\": {{\"x\": <px>, \"y\": <px>}} for CLICK, or a full URL string for GOTO,\n \
         \"reasoning\": \"<one sentence on why>\"}}\n\n\
         Use DONE only once your purpose is satisfied. Avoid revisiting pages from \
         the list above unless you have a reason to.",
        objective = goal.objective,
        step = step,
        max_steps = goal.max_steps,
        url = observation.url,
        label = observation.page_type.label(),
    )
}

pub fn insights_prompt(persona: &Persona, history: &[Event]) -> String {
    let transcript = render_transcript(history);
    format!(
        "Your browsing session is over. Here is everything that happened:\n\n\
         {transcript}\n\n\
         As {name}, sum up the experience for the people who run this site: what \
         worked for you, what frustrated or confused you, and what you would change \
         first. Be concrete and honest, still in your own voice.",
        name = persona.first_name(),
    )
}

/// Conversation turns for the model context. Only dialogue survives;
/// navigation and system entries are context the prompts carry separately.
pub fn render_history(history: &[Event]) -> Vec<Turn> {
    history
        .iter()
        .filter_map(|event| match &event.kind {
            EventKind::OperatorCommand { text } | EventKind::OperatorQuestion { text } => {
                Some(Turn {
                    role: TurnRole::Operator,
                    text: text.clone(),
                })
            }
            EventKind::PersonaReply { text } => Some(Turn {
                role: TurnRole::Persona,
                text: text.clone(),
            }),
            EventKind::Navigation { .. } | EventKind::SystemNote { .. } => None,
        })
        .collect()
}

fn render_transcript(history: &[Event]) -> String {
    let mut lines = Vec::with_capacity(history.len());
    for event in history {
        let line = match &event.kind {
            EventKind::Navigation { url, action } => {
                format!("[{}] you did: {} on {url}", event.page_type.label(), action.describe())
            }
            EventKind::OperatorCommand { text } => format!("operator asked you to: {text}"),
            EventKind::OperatorQuestion { text } => format!("operator: {text}"),
            EventKind::PersonaReply { text } => format!("you: {text}"),
            EventKind::SystemNote { text } => format!("(note: {text})"),
        };
        lines.push(line);
    }
    if lines.is_empty() {
        "(empty session)".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use personalens_core::persona::find_persona;
    use personalens_core::types::{NavigationAction, PageSignals, PageType, Viewport};

    fn observation() -> PageObservation {
        PageObservation {
            url: "https://osteria.example/menu".to_string(),
            screenshot_b64: String::new(),
            page_type: PageType::Menu,
            signals: PageSignals {
                url: "https://osteria.example/menu".to_string(),
                title: "Osteria - Menu".to_string(),
                headings: vec![],
                link_texts: vec![],
            },
            viewport: Viewport {
                width: 1280,
                height: 800,
            },
        }
    }

    #[test]
    fn system_prompt_carries_profile_and_context() {
        let persona = find_persona("marco").unwrap();
        let system = persona_system(persona, Some("A small osteria in Bologna."));
        assert!(system.contains("You are Marco"));
        assert!(system.contains("Casual Foodie"));
        assert!(system.contains("A small osteria in Bologna."));
    }

    #[test]
    fn navigation_prompt_lists_visited_pages() {
        let goal = Goal {
            objective: "decide whether to book a table".to_string(),
            max_steps: 5,
        };
        let visited = vec!["https://osteria.example/".to_string()];
        let prompt = navigation_prompt(&goal, &observation(), 2, &visited);
        assert!(prompt.contains("Step 2 of 5"));
        assert!(prompt.contains("https://osteria.example/"));
        assert!(prompt.contains("\"DONE\""));
    }

    #[test]
    fn history_keeps_only_dialogue() {
        let events = vec![
            Event::now(
                EventKind::Navigation {
                    url: "https://osteria.example/".to_string(),
                    action: NavigationAction::NoOp,
                },
                PageType::Homepage,
            ),
            Event::now(
                EventKind::OperatorQuestion {
                    text: "cosa ne pensi?".to_string(),
                },
                PageType::Homepage,
            ),
            Event::now(
                EventKind::PersonaReply {
                    text: "mi piace".to_string(),
                },
                PageType::Homepage,
            ),
        ];
        let turns = render_history(&events);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::Operator);
        assert_eq!(turns[1].role, TurnRole::Persona);
    }
}
