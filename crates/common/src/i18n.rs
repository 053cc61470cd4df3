//! Translation lookup
//!
//! The engine only ever consumes translations as a pure `key -> string`
//! function. `Catalog` is the built-in table covering the keys the
//! conversation engine needs; front ends can supply their own `Translator`.

pub const NEW_CONVERSATION: &str = "newConversation";
pub const INITIAL_BOT_MESSAGE: &str = "initialBotMessage";
pub const PREMIUM_ACTIVATED: &str = "premiumActivatedMessage";
pub const PREMIUM_RENEWED: &str = "premiumRenewedMessage";
pub const ERROR_MESSAGE: &str = "errorMessage";
pub const TITLE_PROMPT: &str = "titleGenerationPrompt";

/// Language used when the requested one has no table
pub const DEFAULT_LANGUAGE: &str = "fr";

pub trait Translator: Send + Sync {
    /// Look up `key` for `language`, substituting `{name}` placeholders from `args`.
    fn translate(&self, language: &str, key: &str, args: &[(&str, &str)]) -> String;
}

const FR: &[(&str, &str)] = &[
    (NEW_CONVERSATION, "Nouvelle conversation"),
    (
        INITIAL_BOT_MESSAGE,
        "Bonjour ! Je suis votre assistant pour les personnes en situation de handicap en {country}. Comment puis-je vous aider aujourd'hui ?",
    ),
    (
        PREMIUM_ACTIVATED,
        "Votre abonnement premium est activé pour 7 jours. Vous avez maintenant accès aux services avancés.",
    ),
    (
        PREMIUM_RENEWED,
        "Votre abonnement premium a été renouvelé pour 7 jours à partir d'aujourd'hui.",
    ),
    (
        ERROR_MESSAGE,
        "Désolé, une erreur s'est produite. Veuillez réessayer.",
    ),
    (
        TITLE_PROMPT,
        "Propose un titre très court (3 à 6 mots) pour cette conversation. Réponds uniquement avec le titre.",
    ),
];

const EN: &[(&str, &str)] = &[
    (NEW_CONVERSATION, "New conversation"),
    (
        INITIAL_BOT_MESSAGE,
        "Hello! I am your assistant for people with disabilities in {country}. How can I help you today?",
    ),
    (
        PREMIUM_ACTIVATED,
        "Your premium subscription is active for 7 days. You now have access to advanced services.",
    ),
    (
        PREMIUM_RENEWED,
        "Your premium subscription has been renewed for 7 days starting today.",
    ),
    (ERROR_MESSAGE, "Sorry, something went wrong. Please try again."),
    (
        TITLE_PROMPT,
        "Suggest a very short title (3 to 6 words) for this conversation. Reply with the title only.",
    ),
];

/// Built-in French/English catalog
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

impl Catalog {
    pub fn new() -> Self {
        Self
    }

    fn table(language: &str) -> &'static [(&'static str, &'static str)] {
        match language.get(..2).unwrap_or(language).to_ascii_lowercase().as_str() {
            "en" => EN,
            _ => FR,
        }
    }
}

impl Translator for Catalog {
    fn translate(&self, language: &str, key: &str, args: &[(&str, &str)]) -> String {
        let template = Self::table(language)
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v);

        let Some(template) = template else {
            tracing::debug!(language, key, "Missing translation, returning key");
            return key.to_string();
        };

        args.iter().fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
    }
}
