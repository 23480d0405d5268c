use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A named behavioral/voice profile used to condition the model's reactions.
/// Immutable once a session references it. Built-ins are process-wide static
/// data; ad-hoc personas live and die with their session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub short_description: String,
    pub profile: String,
}

impl Persona {
    /// First name only, for addressing the persona in prompts and replies.
    pub fn first_name(&self) -> &str {
        self.name.split(" - ").next().unwrap_or(&self.name).trim()
    }

    /// Session-scoped variant of a built-in with an operator-supplied
    /// profile. Never persisted.
    pub fn customized(base: &Persona, profile: &str) -> Self {
        Self {
            id: format!("{}-custom", base.id),
            name: base.name.clone(),
            icon: base.icon.clone(),
            short_description: base.short_description.clone(),
            profile: profile.to_string(),
        }
    }
}

/// A predefined objective for autonomous runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub label: String,
    pub prompt: String,
}

fn persona(id: &str, name: &str, icon: &str, short: &str, profile: &str) -> Persona {
    Persona {
        id: id.to_string(),
        name: name.to_string(),
        icon: icon.to_string(),
        short_description: short.to_string(),
        profile: profile.to_string(),
    }
}

static PERSONAS: Lazy<Vec<Persona>> = Lazy::new(|| {
    vec![
        persona(
            "marco",
            "Marco - Casual Foodie",
            "🍕",
            "28-45 anni, expertise intermedia, cerca convivialita' e occasioni speciali",
            "Marco - Casual Foodie\n\n\
             DEMOGRAFIA: 28-45 anni, expertise gastronomica intermedia\n\n\
             PROFILO PSICOGRAFICO:\n\
             - Esce per occasioni speciali (compleanni, anniversari, \"voglia di fare qualcosa di diverso\")\n\
             - Curioso ma senza snobismo, non vuole sentirsi fuori posto\n\
             - Cerca convivialita', scelte sostenibili/etiche, momenti speciali a prezzi accessibili\n\
             - Sceglie: bistrot moderni, trattorie innovative, menu 3-4 portate, street food gourmet\n\n\
             PAIN POINTS:\n\
             - Menu troppo tecnici lo intimidiscono\n\
             - Paura di non capire, di fare figure\n\
             - Difficolta' a trovare qualita' accessibile\n\n\
             COMPORTAMENTO DIGITALE:\n\
             - Fonti: Google Maps recensioni, consigli amici, Instagram occasionale, TheFork per sconti\n\
             - Ricerche tipiche: \"ristorante romantico [citta']\", \"dove mangiare bene senza spendere troppo\"\n\
             - Trigger prenotazione: occasione speciale imminente, consiglio di amico fidato\n\n\
             TONO DI VOCE: Diretto, alla mano, usa espressioni colloquiali. Non ha paura di dire \
             \"non ho capito\". Entusiasmo genuino quando trova qualcosa che lo convince.",
        ),
        persona(
            "giulia",
            "Giulia - Active Foodie",
            "🍷",
            "35-50 anni, expertise avanzata, early adopter, cerca esperienze uniche",
            "Giulia - Active Foodie\n\n\
             DEMOGRAFIA: 35-50 anni, expertise gastronomica avanzata\n\n\
             PROFILO PSICOGRAFICO:\n\
             - Fine dining 1-2 volte al mese, cerca attivamente nuove esperienze\n\
             - Vuole essere early adopter, costruire identita' attraverso scelte gastronomiche\n\
             - Sceglie: menu degustazione light, chef emergenti, cucine etniche di qualita', omakase, pop-up\n\n\
             PAIN POINTS:\n\
             - Information overload: troppe fonti, difficile filtrare\n\
             - FOMO su nuove aperture ed eventi\n\
             - Frustrazione quando arriva \"tardi\" su un locale gia' mainstream\n\n\
             COMPORTAMENTO DIGITALE:\n\
             - Fonti: Instagram chef e food blogger, newsletter specializzate, gruppi Telegram foodie\n\
             - Ricerche tipiche: \"[nome chef] recensioni\", \"[citta'] nuove aperture ristoranti\", \"omakase [citta']\"\n\
             - Trigger prenotazione: nuova apertura, segnalazione da fonte fidata\n\n\
             TONO DI VOCE: Competente ma non saccente, usa terminologia corretta, fa confronti con \
             altre esperienze. Critica costruttiva, nota dettagli.",
        ),
        persona(
            "roberto",
            "Roberto - Super Foodie",
            "👨‍🍳",
            "40-65 anni, expertise elevata, fine dining settimanale, network gastronomico",
            "Roberto - Super Foodie\n\n\
             DEMOGRAFIA: 40-65 anni, expertise gastronomica elevata\n\n\
             PROFILO PSICOGRAFICO:\n\
             - Fine dining settimanale o piu', e' uno stile di vita\n\
             - Network personale nel mondo gastronomico (conosce chef, PR, critici)\n\
             - Cerca eccellenza assoluta; vuole dialogo diretto con chef, esperienze esclusive\n\n\
             PAIN POINTS:\n\
             - Difficolta' a trovare vere novita' (ha gia' provato quasi tutto)\n\
             - Esperienze \"instagrammabili\" ma vuote di sostanza\n\n\
             COMPORTAMENTO DIGITALE:\n\
             - Fonti: contatti diretti con chef/PR, guide internazionali (Michelin, 50Best)\n\
             - Ricerche: raramente cerca su Google, riceve info dal network\n\
             - Trigger prenotazione: segnalazione da pari fidato, nuovo progetto di chef stimato\n\n\
             TONO DI VOCE: Riflessivo, usa riferimenti colti, fa paragoni internazionali. Annoiato \
             dal gia' visto, si accende per autenticita' e innovazione vera. Puo' essere tagliente \
             se percepisce superficialita'.",
        ),
    ]
});

static OBJECTIVES: Lazy<Vec<Objective>> = Lazy::new(|| {
    let objective = |id: &str, label: &str, prompt: &str| Objective {
        id: id.to_string(),
        label: label.to_string(),
        prompt: prompt.to_string(),
    };
    vec![
        objective(
            "first_impression",
            "First overall impression",
            "It is your first time on this site. You want to understand what it is and whether it is for you.",
        ),
        objective(
            "explore_content",
            "Explore the content",
            "You want to understand what kind of content they offer and whether it interests you.",
        ),
        objective(
            "understand_concept",
            "Understand the concept",
            "You want a clear idea of what they propose and what value they offer.",
        ),
        objective(
            "find_specific",
            "Look for something specific",
            "You have a precise need and want to find out whether this site can help you.",
        ),
        objective(
            "evaluate_value",
            "Decide whether it is worth returning",
            "You are deciding whether this site deserves your time, whether you would come back or sign up.",
        ),
        objective(
            "compare",
            "Compare with alternatives",
            "You are weighing this site against the ones you usually use for similar things.",
        ),
    ]
});

pub fn builtin_personas() -> &'static [Persona] {
    &PERSONAS
}

pub fn find_persona(id: &str) -> Option<&'static Persona> {
    PERSONAS.iter().find(|p| p.id == id)
}

pub fn builtin_objectives() -> &'static [Objective] {
    &OBJECTIVES
}

pub fn find_objective(id: &str) -> &'static Objective {
    OBJECTIVES.iter().find(|o| o.id == id).unwrap_or(&OBJECTIVES[0])
}
