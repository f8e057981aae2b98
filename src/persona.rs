//! The persona module lets a user talk about a book with a simulated reader
//! seeded with the book's synthesized review.

use anyhow::Result;
use llm::chat::ChatMessage;

use crate::constants::PERSONA_PROMPT;
use crate::model::{ModelContext, complete, fill_prompt};

/// A simulated reader.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Persona {
    /// Weighs strengths against weaknesses
    #[default]
    Critic,
    /// Loves the book and its characters
    Enthusiast,
    /// Connects the book to bigger questions
    Thinker,
}

impl Persona {
    pub fn name(self) -> &'static str {
        match self {
            Persona::Critic => "the Critic",
            Persona::Enthusiast => "the Enthusiast",
            Persona::Thinker => "the Thinker",
        }
    }

    fn style(self) -> &'static str {
        match self {
            Persona::Critic => {
                "reads critically, weighs strengths against weaknesses and is not afraid to disagree."
            }
            Persona::Enthusiast => {
                "loved this book, talks warmly about its characters and scenes and shares favourite moments."
            }
            Persona::Thinker => {
                "connects the book to history, society and personal life and likes to ask questions back."
            }
        }
    }
}

impl std::str::FromStr for Persona {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "critic" => Ok(Persona::Critic),
            "enthusiast" => Ok(Persona::Enthusiast),
            "thinker" => Ok(Persona::Thinker),
            _ => Err(format!("Invalid persona: {}", input)),
        }
    }
}

/// Who said a line of the conversation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Speaker {
    User,
    Persona,
}

/// The state of one conversation: the persona, its seed and every turn so far.
#[derive(Clone, Debug)]
pub struct Conversation {
    book: String,
    seed: String,
    persona: Persona,
    history: Vec<(Speaker, String)>,
}

impl Conversation {
    /// Starts a conversation about `book` seeded with its review document.
    pub fn new(book: &str, seed: &str, persona: Persona) -> Self {
        Self {
            book: book.to_string(),
            seed: seed.to_string(),
            persona,
            history: Vec::new(),
        }
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn history(&self) -> &[(Speaker, String)] {
        &self.history
    }

    /// Builds the messages sent to the model: the persona framing followed by the history.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let framing = fill_prompt(
            PERSONA_PROMPT,
            &[
                ("book", self.book.as_str()),
                ("seed", self.seed.as_str()),
                ("name", self.persona.name()),
                ("style", self.persona.style()),
            ],
        );

        std::iter::once(ChatMessage::user().content(framing).build())
            .chain(self.history.iter().map(|(speaker, text)| match speaker {
                Speaker::User => ChatMessage::user().content(text.clone()).build(),
                Speaker::Persona => ChatMessage::assistant().content(text.clone()).build(),
            }))
            .collect()
    }

    /// Sends the user's line and records both it and the persona's answer.
    ///
    /// On failure the user's line is not kept, so it can be sent again.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails.
    pub async fn reply(&mut self, ctx: &ModelContext<'_>, input: &str) -> Result<String> {
        self.history.push((Speaker::User, input.to_string()));

        match complete(ctx, &self.messages()).await {
            Ok(answer) => {
                self.history.push((Speaker::Persona, answer.clone()));
                Ok(answer)
            }
            Err(err) => {
                self.history.pop();
                Err(err)
            }
        }
    }
}
