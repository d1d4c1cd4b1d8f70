//! Static role-play scenario and language catalogs.
//!
//! User-facing copy is Brazilian Portuguese (the product's audience); the
//! character replies in the practice language with feedback in Portuguese.

use serde::Serialize;

/// A practice scenario with its role-play character.
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    /// Scenario identifier.
    pub id: &'static str,
    /// Display title.
    pub title: &'static str,
    /// Character name the model plays.
    pub character: &'static str,
    /// Character role, shown in the UI and fed into the prompt.
    pub character_role: &'static str,
    /// Difficulty label.
    pub level: &'static str,
}

/// A practice language.
#[derive(Debug, Clone, Serialize)]
pub struct Language {
    /// Language identifier.
    pub id: &'static str,
    /// Portuguese display name.
    pub name: &'static str,
    /// Endonym used inside the prompt.
    pub native_name: &'static str,
    /// BCP 47 code (speech synthesis on the client).
    pub code: &'static str,
}

/// Available scenarios.
pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        id: "meeting-friend",
        title: "Conhecendo Alguém",
        character: "Alex",
        character_role: "Novo amigo/amiga",
        level: "Iniciante",
    },
    Scenario {
        id: "restaurant",
        title: "Restaurante",
        character: "Taylor",
        character_role: "Garçom/Garçonete",
        level: "Iniciante",
    },
    Scenario {
        id: "job-interview",
        title: "Entrevista de Emprego",
        character: "Jordan",
        character_role: "Recrutador",
        level: "Intermediário",
    },
    Scenario {
        id: "airport",
        title: "Aeroporto",
        character: "Sam",
        character_role: "Atendente do aeroporto",
        level: "Iniciante",
    },
    Scenario {
        id: "supermarket",
        title: "Mercado",
        character: "Chris",
        character_role: "Funcionário do mercado",
        level: "Iniciante",
    },
    Scenario {
        id: "clothing-store",
        title: "Loja de Roupa",
        character: "Morgan",
        character_role: "Vendedor(a)",
        level: "Intermediário",
    },
    Scenario {
        id: "pharmacy",
        title: "Farmácia",
        character: "Dr. Lee",
        character_role: "Farmacêutico",
        level: "Intermediário",
    },
    Scenario {
        id: "office",
        title: "Escritório de Empresa",
        character: "Pat",
        character_role: "Colega de trabalho",
        level: "Avançado",
    },
];

/// Available practice languages.
pub const LANGUAGES: &[Language] = &[
    Language {
        id: "english",
        name: "Inglês",
        native_name: "English",
        code: "en-US",
    },
    Language {
        id: "spanish",
        name: "Espanhol",
        native_name: "Español",
        code: "es-ES",
    },
    Language {
        id: "french",
        name: "Francês",
        native_name: "Français",
        code: "fr-FR",
    },
];

/// Look up a scenario by ID.
pub fn find_scenario(scenario_id: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.id == scenario_id)
}

/// Look up a language by ID.
pub fn find_language(language_id: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.id == language_id)
}

/// Build the role-play system prompt for a scenario/language pair.
pub fn system_prompt(scenario: &Scenario, language: &Language) -> String {
    format!(
        "You are {character}, a friendly {role} helping a Brazilian student practice \
         {native} ({name}).\n\n\
         IMPORTANT INSTRUCTIONS:\n\
         - Respond naturally in {native} to the conversation\n\
         - After each of your {native} responses, add a feedback section in Portuguese \
         starting with \"💡 Feedback:\"\n\
         - In the feedback, comment on: pronunciation hints, grammar corrections if needed, \
         vocabulary suggestions, and encouragement\n\
         - Keep feedback brief (2-3 sentences) and positive\n\
         - If they make mistakes, correct them gently in the feedback section\n\
         - At the end of conversation (if they say goodbye), provide a performance summary \
         in Portuguese",
        character = scenario.character,
        role = scenario.character_role,
        native = language.native_name,
        name = language.name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lookup() {
        let scenario = find_scenario("job-interview").unwrap();
        assert_eq!(scenario.character, "Jordan");

        let language = find_language("french").unwrap();
        assert_eq!(language.native_name, "Français");

        assert!(find_scenario("time-travel").is_none());
        assert!(find_language("klingon").is_none());
    }

    #[test]
    fn prompt_names_character_and_language() {
        let scenario = find_scenario("restaurant").unwrap();
        let language = find_language("spanish").unwrap();

        let prompt = system_prompt(scenario, language);
        assert!(prompt.contains("You are Taylor"));
        assert!(prompt.contains("Garçom/Garçonete"));
        assert!(prompt.contains("Español"));
        assert!(prompt.contains("💡 Feedback:"));
    }

    #[test]
    fn scenario_ids_are_unique() {
        let mut ids: Vec<_> = SCENARIOS.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), SCENARIOS.len());
    }
}
