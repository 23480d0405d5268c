//! Page classification from observed signals.
//!
//! `classify` is pure, deterministic and total: any input, including empty
//! signals, yields a defined `PageType`. Unmatched input is `Unknown`.

pub mod suggestions;

use personalens_core::types::{PageSignals, PageType};
use url::Url;

pub use suggestions::suggestions_for;

/// Tie-break order when signals match several types: the most specific
/// page wins. This order is part of the contract; tests pin it.
const PRIORITY: [PageType; 7] = [
    PageType::Checkout,
    PageType::Booking,
    PageType::Contact,
    PageType::Menu,
    PageType::Gallery,
    PageType::About,
    PageType::Homepage,
];

/// Keywords matched against URL path tokens (exact) and title/heading text
/// (substring). The site corpus is Italian-first, so both languages appear.
fn keywords(page_type: PageType) -> &'static [&'static str] {
    match page_type {
        PageType::Checkout => &[
            "checkout", "cart", "carrello", "cassa", "order", "ordine", "payment", "pagamento",
        ],
        PageType::Booking => &[
            "book", "booking", "prenota", "prenotazione", "prenotazioni", "reserve",
            "reservation",
        ],
        PageType::Contact => &[
            "contact", "contacts", "contatti", "contattaci", "dove siamo", "come raggiungerci",
        ],
        PageType::Menu => &["menu", "carta", "piatti", "vini", "degustazione", "wine list"],
        PageType::Gallery => &["gallery", "galleria", "foto", "photos", "immagini"],
        PageType::About => &["about", "chi siamo", "chi-siamo", "storia", "our story"],
        PageType::Homepage => &["home", "homepage", "index", "benvenuti", "welcome"],
        PageType::Unknown => &[],
    }
}

/// Dominant call-to-action texts that identify a page even when URL and
/// headings say nothing. Consulted last: a nav link to the booking page
/// exists on every page of a restaurant site, so link texts alone must not
/// override stronger signals.
fn affordances(page_type: PageType) -> &'static [&'static str] {
    match page_type {
        PageType::Booking => &[
            "book a table",
            "book now",
            "prenota un tavolo",
            "prenota ora",
            "verifica disponibilita",
        ],
        PageType::Checkout => &["proceed to checkout", "completa l'ordine", "vai alla cassa"],
        _ => &[],
    }
}

fn path_tokens(raw_url: &str) -> Vec<String> {
    let path = match Url::parse(raw_url) {
        Ok(u) => u.path().to_string(),
        Err(_) => raw_url.to_string(),
    };
    path.split(|c: char| "/-_.".contains(c))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn is_root_path(raw_url: &str) -> bool {
    match Url::parse(raw_url) {
        Ok(u) => {
            let p = u.path();
            p.is_empty() || p == "/" || p == "/index.html" || p == "/index.php"
        }
        Err(_) => false,
    }
}

fn text_matches(text: &str, keyword: &str) -> bool {
    text.contains(keyword)
}

/// Map observed page signals to a page type.
pub fn classify(signals: &PageSignals) -> PageType {
    let tokens = path_tokens(&signals.url);
    let title = signals.title.to_lowercase();
    let headings: Vec<String> = signals.headings.iter().map(|h| h.to_lowercase()).collect();

    let strong_match = |page_type: PageType| -> bool {
        keywords(page_type).iter().any(|kw| {
            tokens.iter().any(|t| t == kw)
                || text_matches(&title, kw)
                || headings.iter().any(|h| text_matches(h, kw))
        })
    };

    for page_type in PRIORITY {
        if strong_match(page_type) {
            return page_type;
        }
    }

    if is_root_path(&signals.url) {
        return PageType::Homepage;
    }

    // Weakest signal: a dominant control text on an otherwise anonymous page.
    let links: Vec<String> = signals.link_texts.iter().map(|l| l.to_lowercase()).collect();
    for page_type in [PageType::Checkout, PageType::Booking] {
        if affordances(page_type)
            .iter()
            .any(|a| links.iter().any(|l| text_matches(l, a)))
        {
            return page_type;
        }
    }

    PageType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(url: &str, title: &str, headings: &[&str], links: &[&str]) -> PageSignals {
        PageSignals {
            url: url.to_string(),
            title: title.to_string(),
            headings: headings.iter().map(|s| s.to_string()).collect(),
            link_texts: links.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn empty_signals_yield_unknown() {
        assert_eq!(classify(&PageSignals::default()), PageType::Unknown);
    }

    #[test]
    fn garbage_input_never_panics() {
        let s = signals("not a url \u{0000}", "\u{FFFD}\u{FFFD}", &["", "   "], &[""]);
        assert_eq!(classify(&s), PageType::Unknown);
    }

    #[test]
    fn root_url_is_homepage() {
        let s = signals("https://osteria.example/", "Osteria Al Ponte", &[], &[]);
        assert_eq!(classify(&s), PageType::Homepage);
    }

    #[test]
    fn url_path_tokens_classify() {
        let s = signals("https://osteria.example/menu-autunno", "", &[], &[]);
        assert_eq!(classify(&s), PageType::Menu);
        let s = signals("https://osteria.example/prenotazioni", "", &[], &[]);
        assert_eq!(classify(&s), PageType::Booking);
        let s = signals("https://osteria.example/chi-siamo", "", &[], &[]);
        assert_eq!(classify(&s), PageType::About);
    }

    #[test]
    fn heading_text_classifies() {
        let s = signals(
            "https://osteria.example/p/42",
            "Osteria Al Ponte",
            &["La nostra galleria"],
            &[],
        );
        assert_eq!(classify(&s), PageType::Gallery);
    }

    #[test]
    fn booking_outranks_menu_on_tie() {
        // A booking page that lists menu choices must classify as Booking.
        let s = signals(
            "https://osteria.example/prenota",
            "Prenota il tuo menu degustazione",
            &[],
            &[],
        );
        assert_eq!(classify(&s), PageType::Booking);
    }

    #[test]
    fn checkout_outranks_booking() {
        let s = signals(
            "https://osteria.example/checkout",
            "Checkout - conferma prenotazione",
            &[],
            &[],
        );
        assert_eq!(classify(&s), PageType::Checkout);
    }

    #[test]
    fn booking_affordance_is_weakest_signal() {
        // Dominant CTA on an anonymous page wins...
        let s = signals(
            "https://osteria.example/p/landing",
            "",
            &[],
            &["Prenota un tavolo"],
        );
        assert_eq!(classify(&s), PageType::Booking);
        // ...but a nav link never overrides a strong signal.
        let s = signals(
            "https://osteria.example/menu",
            "Il menu",
            &[],
            &["Prenota un tavolo"],
        );
        assert_eq!(classify(&s), PageType::Menu);
    }

    #[test]
    fn priority_order_is_stable() {
        assert_eq!(PRIORITY[0], PageType::Checkout);
        assert_eq!(PRIORITY[1], PageType::Booking);
        assert_eq!(PRIORITY[2], PageType::Contact);
    }
}
