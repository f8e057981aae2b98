#![allow(dead_code)]

use llm::{
    chat::{ChatMessage, ChatProvider, ChatResponse, Tool},
    error::LLMError,
};
use std::sync::Mutex;

#[macro_export]
macro_rules! assert_responses {
    (
        $(
            $test_name:ident : response => $response:expr, result => $result:expr
        ),+ $(,)?
    ) => {
        $(
            #[tokio::test]
            async fn $test_name() {
                let stub = StubLlmProvider::new($response.to_owned());
                let context = deepread::model::ModelContext::new(&stub);
                let result = deepread::model::complete_prompt(&context, "")
                    .await
                    .expect("Expected successful processing.");

                assert_that(&result).is_equal_to($result.to_owned());
            }
        )+
    }
}

type Responder = Box<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Chat model answering from a closure and remembering every prompt it received.
pub(crate) struct StubLlmProvider {
    responder: Responder,
    prompts: Mutex<Vec<String>>,
}

impl StubLlmProvider {
    pub fn new(response_content: String) -> Self {
        Self::with(move |_| Ok(response_content.clone()))
    }

    pub fn with<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        StubLlmProvider {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        let message = message.to_owned();
        Self::with(move |_| Err(message.clone()))
    }

    /// Every prompt received so far; a prompt is the conversation's contents joined by newlines.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts mutex").clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("prompts mutex").len()
    }
}

pub(crate) fn context(stub: &StubLlmProvider) -> deepread::model::ModelContext<'_> {
    deepread::model::ModelContext {
        model: stub,
        rate_limiter: None,
        retries: 0,
        timeout: std::time::Duration::from_secs(5),
    }
}

#[derive(Debug)]
struct StringResponse(String);

impl ChatResponse for StringResponse {
    fn text(&self) -> Option<String> {
        Some(self.0.clone())
    }

    fn tool_calls(&self) -> Option<Vec<llm::ToolCall>> {
        panic!()
    }

    fn thinking(&self) -> Option<String> {
        None
    }

    fn usage(&self) -> Option<llm::chat::Usage> {
        None
    }
}

impl std::fmt::Display for StringResponse {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl ChatProvider for StubLlmProvider {
    fn chat<'life0, 'life1, 'async_trait>(
        &'life0 self,
        messages: &'life1 [ChatMessage],
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let prompt = messages
            .iter()
            .map(|message| message.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        let result = (self.responder)(&prompt);
        self.prompts.lock().expect("prompts mutex").push(prompt);

        Box::pin(async move {
            result
                .map(|text| Box::new(StringResponse(text)) as Box<dyn ChatResponse>)
                .map_err(LLMError::ProviderError)
        })
    }

    fn chat_with_tools<'life0, 'life1, 'life2, 'async_trait>(
        &'life0 self,
        _messages: &'life1 [ChatMessage],
        _tools: Option<&'life2 [Tool]>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        'life2: 'async_trait,
        Self: 'async_trait,
    {
        panic!()
    }
}
