//! Contextual quick-question suggestions, keyed by page type.
//!
//! Presentation sugar for the operator, not control logic: lookup never
//! fails, page types without a dedicated list get the default one.

use personalens_core::types::PageType;

const DEFAULT: &[&str] = &[
    "Come sei arrivato qui?",
    "Cosa cercheresti su Google per trovare questo posto?",
    "Prenoteresti? Perche'?",
    "Cosa manca?",
    "A chi mostreresti questo sito?",
    "Torneresti a controllare questo sito?",
];

const HOMEPAGE: &[&str] = &[
    "Prima impressione?",
    "Cosa ti ha colpito per primo?",
    "Capisci subito di cosa si tratta?",
    "Ti viene voglia di esplorare?",
    "Cosa cercheresti su Google?",
];

const MENU: &[&str] = &[
    "I prezzi ti sembrano giusti per te?",
    "Cosa ordineresti?",
    "Manca qualcosa che cercavi?",
    "Il menu e' chiaro?",
    "Ti fidi della qualita'?",
];

const BOOKING: &[&str] = &[
    "E' facile prenotare?",
    "Che info ti mancano per decidere?",
    "Cosa ti frena dal prenotare ora?",
    "Ti fidi a lasciare i tuoi dati?",
    "Prenoteresti o chiameresti?",
];

const ABOUT: &[&str] = &[
    "Ti fidi di piu' dopo aver letto?",
    "Cosa ti ha convinto o lasciato dubbi?",
    "Manca qualcosa che vorresti sapere?",
];

const GALLERY: &[&str] = &[
    "Le foto ti convincono?",
    "Cosa ti trasmettono?",
    "Ti aiutano a decidere?",
];

const CONTACT: &[&str] = &[
    "Trovi facilmente come raggiungerli?",
    "Li contatteresti? Come?",
    "Manca qualche info?",
];

const UNKNOWN: &[&str] = &[
    "Cosa stai cercando?",
    "Questa pagina ti e' utile?",
    "Cosa faresti ora?",
];

pub fn suggestions_for(page_type: PageType) -> &'static [&'static str] {
    match page_type {
        PageType::Homepage => HOMEPAGE,
        PageType::Menu => MENU,
        PageType::Booking => BOOKING,
        PageType::About => ABOUT,
        PageType::Gallery => GALLERY,
        PageType::Contact => CONTACT,
        PageType::Unknown => UNKNOWN,
        PageType::Checkout => DEFAULT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_page_type_has_suggestions() {
        for page_type in [
            PageType::Homepage,
            PageType::Menu,
            PageType::Booking,
            PageType::Gallery,
            PageType::About,
            PageType::Contact,
            PageType::Checkout,
            PageType::Unknown,
        ] {
            assert!(!suggestions_for(page_type).is_empty());
        }
    }
}
