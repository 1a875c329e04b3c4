//! # Intent Resolver
//!
//! Maps free-form transcribed speech to a fixed set of keyword-triggered
//! intents. Resolution order matters: the exit phrase wins over everything,
//! chat mode swallows all other text, then keyword triggers fire in their
//! declared order.

/// Commands a spoken phrase can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Help,
    Status,
    Input,
    Scan,
    Care,
    Co2,
    Back,
    Profile,
}

/// Trigger table, in resolution order. The first intent with any matching
/// substring wins.
const KEYWORD_TRIGGERS: &[(Intent, &[&str])] = &[
    (Intent::Help, &["help", "command"]),
    (Intent::Status, &["status", "ready", "mature"]),
    (Intent::Input, &["input", "food", "water"]),
    (Intent::Scan, &["scan", "image", "photo", "picture"]),
    (Intent::Care, &["care", "plant", "watering", "growth"]),
    (Intent::Co2, &["co2", "carbon", "emission", "savings"]),
    (Intent::Back, &["back", "previous", "return"]),
    (Intent::Profile, &["profile", "setup"]),
];

/// Phrases that always exit Ask-Anything mode.
const EXIT_PHRASES: &[&str] = &["back", "menu", "exit", "/back", "/menu", "/exit"];

/// Outcome of resolving one lowercased utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The explicit exit phrase: leave chat mode / return to menu
    Exit,
    /// Session is in Ask-Anything mode: forward verbatim to the chat model
    ChatMessage(String),
    /// A keyword intent matched
    Command(Intent),
    /// Nothing matched
    NoIntentMatched,
}

/// Resolve a lowercased utterance against the trigger table.
///
/// `in_chat_mode` reflects whether the session currently sits in the
/// Ask-Anything state; while it does, only the exit phrase is interpreted.
pub fn resolve(text: &str, in_chat_mode: bool) -> Resolution {
    let trimmed = text.trim();

    if EXIT_PHRASES.contains(&trimmed) {
        return Resolution::Exit;
    }

    if in_chat_mode {
        return Resolution::ChatMessage(trimmed.to_string());
    }

    for (intent, keywords) in KEYWORD_TRIGGERS {
        if keywords.iter().any(|kw| trimmed.contains(kw)) {
            return Resolution::Command(*intent);
        }
    }

    Resolution::NoIntentMatched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_resolution_in_declared_order() {
        assert_eq!(
            resolve("is my compost ready yet", false),
            Resolution::Command(Intent::Status)
        );
        assert_eq!(
            resolve("show me a picture analysis", false),
            Resolution::Command(Intent::Scan)
        );
        // "watering" contains "water", so the earlier Input intent wins
        assert_eq!(
            resolve("watering schedule", false),
            Resolution::Command(Intent::Input)
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(resolve("sing me a song", false), Resolution::NoIntentMatched);
    }

    #[test]
    fn test_exit_phrase_wins_everywhere() {
        assert_eq!(resolve("back", true), Resolution::Exit);
        assert_eq!(resolve("menu", true), Resolution::Exit);
        assert_eq!(resolve("back", false), Resolution::Exit);
    }

    #[test]
    fn test_chat_mode_short_circuits_keywords() {
        assert_eq!(
            resolve("what is the status of composting science", true),
            Resolution::ChatMessage("what is the status of composting science".to_string())
        );
    }
}
