//! Parsing of autonomous navigation decisions out of model text.
//!
//! The model is asked for a single JSON object but routinely wraps it in
//! prose or code fences. Extraction scans for the first balanced object
//! that carries a "comment" field; when nothing parses, the raw text
//! becomes the comment and no action is taken.

use personalens_core::types::NavigationAction;
use serde::Deserialize;
use serde_json::Value;

/// Vertical distance of one scroll decision, in CSS pixels.
const SCROLL_STEP: i64 = 600;

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub comment: String,
    pub action: Option<NavigationAction>,
    pub reasoning: Option<String>,
    pub goal_satisfied: bool,
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    comment: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    target: Option<Value>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse one decision. Total: any input yields a usable `Decision`.
pub fn parse_decision(text: &str) -> Decision {
    for candidate in balanced_objects(text) {
        if let Ok(raw) = serde_json::from_str::<RawDecision>(candidate) {
            return from_raw(raw);
        }
    }
    Decision {
        comment: text.trim().to_string(),
        action: None,
        reasoning: None,
        goal_satisfied: false,
    }
}

fn from_raw(raw: RawDecision) -> Decision {
    let verb = raw
        .action
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_ascii_uppercase();
    let (action, goal_satisfied) = match verb.as_str() {
        "CLICK" => (raw.target.as_ref().and_then(click_target), false),
        "SCROLL_DOWN" => (Some(NavigationAction::ScrollBy { amount: SCROLL_STEP }), false),
        "SCROLL_UP" => (Some(NavigationAction::ScrollBy { amount: -SCROLL_STEP }), false),
        "GOTO" => (
            raw.target
                .as_ref()
                .and_then(|t| t.as_str())
                .map(|url| NavigationAction::NavigateTo {
                    url: url.to_string(),
                }),
            false,
        ),
        "BACK" => (Some(NavigationAction::GoBack), false),
        "DONE" => (None, true),
        _ => (None, false),
    };
    Decision {
        comment: raw.comment.trim().to_string(),
        action,
        reasoning: raw.reasoning.map(|r| r.trim().to_string()),
        goal_satisfied,
    }
}

/// Click targets arrive either as {"x": .., "y": ..} or as "x,y".
fn click_target(target: &Value) -> Option<NavigationAction> {
    if let (Some(x), Some(y)) = (
        target.get("x").and_then(|v| v.as_f64()),
        target.get("y").and_then(|v| v.as_f64()),
    ) {
        return Some(NavigationAction::ClickAt { x, y });
    }
    let text = target.as_str()?;
    let (x, y) = text.split_once(',')?;
    Some(NavigationAction::ClickAt {
        x: x.trim().parse().ok()?,
        y: y.trim().parse().ok()?,
    })
}

/// All balanced `{...}` slices of the input, in order of appearance.
/// String literals and escapes are honored so braces inside text do not
/// truncate the scan.
fn balanced_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut objects = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = scan_object(bytes, i) {
                objects.push(&text[i..=end]);
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    objects
}

fn scan_object(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_click_decision() {
        let text = r#"{"comment": "Il menu mi incuriosisce", "action": "CLICK", "target": {"x": 340, "y": 120}, "reasoning": "the menu link is visible"}"#;
        let d = parse_decision(text);
        assert_eq!(d.comment, "Il menu mi incuriosisce");
        assert_eq!(d.action, Some(NavigationAction::ClickAt { x: 340.0, y: 120.0 }));
        assert!(!d.goal_satisfied);
        assert_eq!(d.reasoning.as_deref(), Some("the menu link is visible"));
    }

    #[test]
    fn json_wrapped_in_prose_and_fences() {
        let text = "Sure! Here is my decision:\n```json\n{\"comment\": \"Scorro per vedere il resto\", \"action\": \"SCROLL_DOWN\"}\n```";
        let d = parse_decision(text);
        assert_eq!(d.comment, "Scorro per vedere il resto");
        assert_eq!(d.action, Some(NavigationAction::ScrollBy { amount: 600 }));
    }

    #[test]
    fn done_sets_goal_satisfied_without_action() {
        let d = parse_decision(r#"{"comment": "Ho visto abbastanza", "action": "DONE"}"#);
        assert!(d.goal_satisfied);
        assert!(d.action.is_none());
    }

    #[test]
    fn malformed_output_keeps_the_text() {
        let d = parse_decision("Mi piace molto questo sito, i colori sono caldi.");
        assert_eq!(d.comment, "Mi piace molto questo sito, i colori sono caldi.");
        assert!(d.action.is_none());
        assert!(!d.goal_satisfied);
    }

    #[test]
    fn click_target_as_string_pair() {
        let d = parse_decision(r#"{"comment": "clicco", "action": "CLICK", "target": "512, 64"}"#);
        assert_eq!(d.action, Some(NavigationAction::ClickAt { x: 512.0, y: 64.0 }));
    }

    #[test]
    fn click_without_target_degrades_to_comment_only() {
        let d = parse_decision(r#"{"comment": "clicco", "action": "CLICK"}"#);
        assert_eq!(d.comment, "clicco");
        assert!(d.action.is_none());
    }

    #[test]
    fn unknown_verb_is_ignored() {
        let d = parse_decision(r#"{"comment": "aspetto", "action": "HOVER"}"#);
        assert!(d.action.is_none());
        assert!(!d.goal_satisfied);
    }

    #[test]
    fn braces_inside_strings_do_not_break_scanning() {
        let text = r#"note: {"comment": "il footer dice {orari}", "action": "BACK"}"#;
        let d = parse_decision(text);
        assert_eq!(d.action, Some(NavigationAction::GoBack));
    }

    #[test]
    fn first_object_without_comment_is_skipped() {
        let text = r#"{"meta": 1} {"comment": "ok", "action": "SCROLL_UP"}"#;
        let d = parse_decision(text);
        assert_eq!(d.comment, "ok");
        assert_eq!(d.action, Some(NavigationAction::ScrollBy { amount: -600 }));
    }
}
