use crate::model::session::SessionConfig;

/// Builds the text sent to the narrative model.
/// This struct is intentionally dumb: it only formats text.
/// No parsing, no networking, no session logic.
pub struct PromptBuilder;

impl PromptBuilder {
    /// The standing instruction sent with every narrative request.
    pub fn system_instruction() -> String {
        let mut prompt = String::new();

        push_narrator_role(&mut prompt);
        push_format_rules(&mut prompt);
        push_style_rules(&mut prompt);

        prompt
    }

    /// The synthetic user message that opens a session. Sent once with an
    /// empty history; the setup fields never appear in later requests.
    pub fn opening_prompt(config: &SessionConfig) -> String {
        let mut prompt = String::new();

        prompt.push_str("Begin a new interactive story.\n\n");

        prompt.push_str("SETUP:\n");
        prompt.push_str(&format!("- Genre: {}\n", config.genre.trim()));
        prompt.push_str(&format!("- Tone: {}\n", config.tone.trim()));
        prompt.push_str(&format!("- My role: {}\n", config.player_role.trim()));

        prompt.push_str(
            "\nOpen with an evocative first scene that establishes where I am \
             and what is at stake, then offer my first set of choices.\n",
        );

        prompt
    }
}

fn push_narrator_role(prompt: &mut String) {
    prompt.push_str(
        "You are the narrator of an interactive fiction story.\n\n\
         Rules:\n\
         - Narrate vividly in second person, present tense.\n\
         - Never decide or describe the player's next action for them.\n\
         - Keep continuity with everything established earlier in the story.\n\
         - Each reply advances the story by exactly one scene.\n\n",
    );
}

fn push_format_rules(prompt: &mut String) {
    prompt.push_str(
        "Format every reply with exactly these sections, in this order:\n\
         [SCENE]\n\
         Two or three paragraphs describing the current scene.\n\
         [CHARACTER ACTIONS]\n\
         How characters present in the scene react. Omit the text (keep the \
         header) if no one else is present.\n\
         [CHOICES]\n\
         A numbered list of 3 to 5 actions the player could take next, one \
         per line.\n\n",
    );
}

fn push_style_rules(prompt: &mut String) {
    prompt.push_str(
        "Style:\n\
         - Choices must be concrete actions, not vague sentiments.\n\
         - No text outside the three sections.\n\
         - Never address the player out of character.\n",
    );
}
