//! Guided-mode command interpreter.
//!
//! Classifies operator free text into a navigation command or a persona
//! question. Heuristic and deterministic: leading imperative verbs
//! (English and Italian), bare URLs, and coordinate clicks are commands;
//! everything else is forwarded verbatim as a question. Operator input is
//! never dropped.

use personalens_core::types::{NavigationAction, PageType};

const SCROLL_STEP: i64 = 600;

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorInput {
    Navigation(NavigationAction),
    Question(String),
}

/// Classify one line of operator input. The current page type travels
/// with the text; the routing rules themselves are purely lexical.
pub fn interpret(text: &str, _page_type: PageType) -> OperatorInput {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    if looks_like_url(&lower) {
        return OperatorInput::Navigation(NavigationAction::NavigateTo {
            url: trimmed.to_string(),
        });
    }

    if matches_any(&lower, &["back", "go back", "indietro", "torna", "torna indietro"]) {
        return OperatorInput::Navigation(NavigationAction::GoBack);
    }

    if let Some(rest) = strip_verb(&lower, &["scroll", "scorri", "scendi"]) {
        let amount = if matches_any(rest, &["up", "su", "in alto"]) {
            -SCROLL_STEP
        } else {
            SCROLL_STEP
        };
        return OperatorInput::Navigation(NavigationAction::ScrollBy { amount });
    }

    if let Some(rest) = strip_verb(&lower, &["click", "clicca", "clicca su"]) {
        if let Some((x, y)) = parse_coordinates(rest) {
            return OperatorInput::Navigation(NavigationAction::ClickAt { x, y });
        }
        // A click on named content needs the persona's eyes, not ours.
        return OperatorInput::Question(trimmed.to_string());
    }

    if let Some(rest) = strip_verb(
        &lower,
        &["go to", "open", "visit", "vai su", "vai a", "apri", "visita"],
    ) {
        if looks_like_url(rest) {
            return OperatorInput::Navigation(NavigationAction::NavigateTo {
                url: rest.to_string(),
            });
        }
        return OperatorInput::Question(trimmed.to_string());
    }

    OperatorInput::Question(trimmed.to_string())
}

fn matches_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text == *p)
}

/// Strip the longest matching leading verb phrase, returning the rest.
fn strip_verb<'a>(text: &'a str, verbs: &[&str]) -> Option<&'a str> {
    let mut best: Option<&str> = None;
    for verb in verbs {
        if text == *verb {
            best = Some("");
        } else if let Some(rest) = text.strip_prefix(verb) {
            if rest.starts_with(' ') {
                let rest = rest.trim_start();
                if best.map_or(true, |b| rest.len() < b.len()) {
                    best = Some(rest);
                }
            }
        }
    }
    best
}

fn looks_like_url(text: &str) -> bool {
    if text.is_empty() || text.contains(char::is_whitespace) {
        return false;
    }
    if text.starts_with("http://") || text.starts_with("https://") || text.starts_with("www.") {
        return true;
    }
    // Bare domains: at least one dot, no sentence punctuation around it.
    text.contains('.') && !text.ends_with('.') && !text.ends_with('?') && !text.ends_with('!')
}

fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    let numbers: Vec<f64> = text
        .split(|c: char| c == ',' || c == 'x' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match numbers.as_slice() {
        [x, y] => Some((*x, *y)),
        _ => None,
    }
}
