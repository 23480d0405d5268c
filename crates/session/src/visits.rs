//! Visit bookkeeping for the autonomous loop.
//!
//! URLs are compared in normalized form (scheme + host + path, trailing
//! slash stripped, query and fragment dropped) so that tracking params and
//! anchors do not look like new pages. Scrolls are capped per page.

use std::collections::{HashMap, HashSet};

pub struct VisitLog {
    seen: HashSet<String>,
    order: Vec<String>,
    scrolls: HashMap<String, u32>,
    max_scrolls: u32,
}

impl VisitLog {
    pub fn new(max_scrolls: u32) -> Self {
        Self {
            seen: HashSet::new(),
            order: Vec::new(),
            scrolls: HashMap::new(),
            max_scrolls,
        }
    }

    /// Record a visit. Returns true when the page is new.
    pub fn record_visit(&mut self, url: &str) -> bool {
        let normalized = normalize_url(url);
        if self.seen.insert(normalized.clone()) {
            self.order.push(normalized);
            true
        } else {
            false
        }
    }

    pub fn was_visited(&self, url: &str) -> bool {
        self.seen.contains(&normalize_url(url))
    }

    /// Visited pages in first-visit order, for the decide prompt.
    pub fn visited_pages(&self) -> &[String] {
        &self.order
    }

    pub fn record_scroll(&mut self, url: &str) {
        *self.scrolls.entry(normalize_url(url)).or_insert(0) += 1;
    }

    pub fn scroll_allowed(&self, url: &str) -> bool {
        self.scrolls
            .get(&normalize_url(url))
            .copied()
            .unwrap_or(0)
            < self.max_scrolls
    }
}

pub fn normalize_url(url: &str) -> String {
    match url::Url::parse(url.trim()) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("");
            let path = parsed.path().trim_end_matches('/');
            format!("{}://{}{}", parsed.scheme(), host, path)
        }
        Err(_) => url.trim().trim_end_matches('/').to_string(),
    }
}
