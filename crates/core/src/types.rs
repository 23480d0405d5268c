use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse classification of the currently displayed page. Drives contextual
/// prompts and operator suggestions. `Unknown` is a valid value, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Homepage,
    Menu,
    Booking,
    Gallery,
    About,
    Contact,
    Checkout,
    Unknown,
}

impl PageType {
    /// Stable human label used by the export and the transport layer.
    pub fn label(&self) -> &'static str {
        match self {
            PageType::Homepage => "Homepage",
            PageType::Menu => "Menu",
            PageType::Booking => "Booking",
            PageType::Gallery => "Gallery",
            PageType::About => "About",
            PageType::Contact => "Contact",
            PageType::Checkout => "Checkout",
            PageType::Unknown => "Page",
        }
    }
}

impl Default for PageType {
    fn default() -> Self {
        PageType::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Upper bounds are exclusive: the last addressable pixel of a
    /// 1280-wide viewport is x = 1279.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width as f64 && y < self.height as f64
    }
}

/// A rectangular page region, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// A rect may end exactly at the viewport edge; only its origin must
    /// land on an addressable pixel.
    pub fn fits_in(&self, viewport: &Viewport) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && viewport.contains(self.x, self.y)
            && self.x + self.width <= viewport.width as f64
            && self.y + self.height <= viewport.height as f64
    }
}

/// A browser action, produced by the guided interpreter or parsed from a
/// model decision. Closed set, handled exhaustively at every consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationAction {
    ClickAt { x: f64, y: f64 },
    ScrollBy { amount: i64 },
    NavigateTo { url: String },
    GoBack,
    NoOp,
}

impl NavigationAction {
    /// Short description used in transcript events and the export.
    pub fn describe(&self) -> String {
        match self {
            NavigationAction::ClickAt { x, y } => format!("click ({x:.0}, {y:.0})"),
            NavigationAction::ScrollBy { amount } => format!("scroll {amount}"),
            NavigationAction::NavigateTo { url } => format!("goto {url}"),
            NavigationAction::GoBack => "back".to_string(),
            NavigationAction::NoOp => "no-op".to_string(),
        }
    }
}

/// One transcript entry kind with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Navigation {
        url: String,
        action: NavigationAction,
    },
    OperatorCommand {
        text: String,
    },
    OperatorQuestion {
        text: String,
    },
    PersonaReply {
        text: String,
    },
    SystemNote {
        text: String,
    },
}

/// One transcript entry. Ordering is insertion order; the export and the
/// model context window both rely on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
    pub page_type: PageType,
}

impl Event {
    pub fn now(kind: EventKind, page_type: PageType) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            page_type,
        }
    }
}

/// Raw signals extracted from the live page, input to the classifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSignals {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub link_texts: Vec<String>,
}

/// A fresh snapshot of the browser's visual state. Ephemeral: never cached
/// across navigations because the page may have changed under us.
#[derive(Debug, Clone)]
pub struct PageObservation {
    pub url: String,
    pub screenshot_b64: String,
    pub page_type: PageType,
    pub signals: PageSignals,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Guided,
    Autonomous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    AwaitingQa,
    Failed,
    Ended,
}

/// Objective for an autonomous run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub objective: String,
    pub max_steps: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_roundtrips_through_json() {
        let action = NavigationAction::ClickAt { x: 120.0, y: 418.0 };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"click_at\""));
        let back: NavigationAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn event_kind_is_tagged() {
        let event = Event::now(
            EventKind::SystemNote {
                text: "boot".to_string(),
            },
            PageType::Unknown,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "system_note");
        assert_eq!(json["page_type"], "unknown");
    }

    #[test]
    fn rect_bounds_check() {
        let vp = Viewport {
            width: 1280,
            height: 800,
        };
        let inside = Rect {
            x: 10.0,
            y: 10.0,
            width: 100.0,
            height: 50.0,
        };
        let outside = Rect {
            x: 1200.0,
            y: 10.0,
            width: 300.0,
            height: 50.0,
        };
        assert!(inside.fits_in(&vp));
        assert!(!outside.fits_in(&vp));
    }

    #[test]
    fn viewport_edge_is_not_clickable() {
        let vp = Viewport {
            width: 1280,
            height: 800,
        };
        assert!(vp.contains(0.0, 0.0));
        assert!(vp.contains(1279.0, 799.0));
        assert!(!vp.contains(1280.0, 400.0));
        assert!(!vp.contains(640.0, 800.0));
        // A region may still end flush with the edge.
        let full = Rect {
            x: 0.0,
            y: 0.0,
            width: 1280.0,
            height: 800.0,
        };
        assert!(full.fits_in(&vp));
    }
}
