//! Prompt construction for a single turn

/// Build the prompt one persona receives for its next turn.
///
/// The transcript is every prior message in order, one per line, without
/// speaker labels.
pub fn build_prompt(persona: &str, theme: &str, previous: &[String]) -> String {
    let context = if previous.is_empty() {
        "This is the start of the conversation.".to_string()
    } else {
        format!(
            "Previous messages in the conversation:\n{}",
            previous.join("\n")
        )
    };

    format!(
        "{persona}\n\n\
         You are participating in a conversation about: {theme}\n\n\
         {context}\n\n\
         Based on the conversation so far and your persona, provide your next response about the theme: {theme}\n\n\
         Keep your response concise (1-3 sentences)."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_transcript_in_order() {
        let previous = vec![
            "Hello! I'm ready to start our conversation about math".to_string(),
            "What is a prime number?".to_string(),
        ];
        let prompt = build_prompt("A teacher", "math", &previous);

        assert_eq!(
            prompt,
            "A teacher\n\n\
             You are participating in a conversation about: math\n\n\
             Previous messages in the conversation:\n\
             Hello! I'm ready to start our conversation about math\n\
             What is a prime number?\n\n\
             Based on the conversation so far and your persona, provide your next response about the theme: math\n\n\
             Keep your response concise (1-3 sentences)."
        );
    }

    #[test]
    fn empty_history_announces_the_start() {
        let prompt = build_prompt("A student", "history", &[]);
        assert!(prompt.contains("\n\nThis is the start of the conversation.\n\n"));
        assert!(!prompt.contains("Previous messages"));
    }
}
