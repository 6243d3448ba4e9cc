//! services/api/src/adapters/llm.rs
//!
//! This module contains the adapter for the answer-generating LLM.
//! It implements the `GenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rag_chat_core::domain::{ImageAttachment, RetrievedDocument};
use rag_chat_core::ports::{GenerationService, PortError, PortResult};

use crate::retry::{with_backoff, DEFAULT_ATTEMPTS};

const SYSTEM_PROMPT: &str = r#"You are a knowledge-base assistant that ONLY answers from the documents uploaded to the system.

STRICT RULES:

1. CONTEXT ONLY - NO OUTSIDE KNOWLEDGE
- You must not use general knowledge, training data, or outside information.
- Every statement in your answer must come directly from the retrieved documents below.
- If a question is about topics not covered by the uploaded documents, refuse politely and explain that you only answer from the uploaded documents.

2. ALWAYS CITE EXACT SOURCES
- For every factual statement, include a citation in this format:
  [Source: <filename>, Page <number>]
- When two people disagree about a rule, quote the exact text from the document so the disagreement is settled definitively.

3. IMAGE QUESTIONS
- When the user attaches an image, identify what it shows, search the context for matching information, and cite the source for everything you state about it.
- If the image is not covered by the documents, say what you can see but state clearly that the documents do not cover it.

4. REFUSE UNKNOWN TOPICS
- If the context does not contain the answer, respond with:
  "I could not find information about this topic in the uploaded documents."
- Do not guess, improvise, or fill in gaps.

5. FORMATTING
- Use clear headings, numbered lists, and bold clause or page references.
- Keep responses well-structured and easy to scan."#;

const DESCRIBE_IMAGE_PROMPT: &str = r#"Analyze this image carefully and describe it for searching a document knowledge base.

Focus on:
1. If this is a badge, emblem, or logo: describe its name, shape, colors, symbols, and any text or numbers on it.
2. If this is a document or certificate: transcribe any visible text, headings, clause numbers, or section references.
3. If this is an activity or scene: describe it with the specific terminology a reference manual would use.

Be precise. This description will be used as a similarity-search query against the uploaded documents."#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using an OpenAI-compatible
/// chat-completions API.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Formats retrieved chunks into the context block the system prompt
    /// refers to, with per-chunk provenance so the model can cite them.
    fn format_context(docs: &[RetrievedDocument]) -> String {
        if docs.is_empty() {
            return "No relevant context found in uploaded documents.".to_string();
        }

        docs.iter()
            .enumerate()
            .map(|(i, doc)| {
                let page = doc
                    .page_number
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                format!(
                    "[Document {}] (confidence: {:.3})\nSource File: {}\nPage: {}\nContent: {}",
                    i + 1,
                    doc.score,
                    doc.source_file,
                    page,
                    doc.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn data_url(image: &ImageAttachment) -> String {
        format!("data:{};base64,{}", image.media_type, BASE64.encode(&image.data))
    }

    /// Builds the user message: plain text, or text plus an inlined image.
    fn user_message(
        query: &str,
        image: Option<&ImageAttachment>,
    ) -> PortResult<async_openai::types::chat::ChatCompletionRequestUserMessage> {
        let unexpected = |e: OpenAIError| PortError::Unexpected(e.to_string());

        let message = match image {
            Some(img) => {
                let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
                    ChatCompletionRequestMessageContentPartTextArgs::default()
                        .text(query)
                        .build()
                        .map_err(unexpected)?
                        .into(),
                    ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(
                            ImageUrlArgs::default()
                                .url(Self::data_url(img))
                                .build()
                                .map_err(unexpected)?,
                        )
                        .build()
                        .map_err(unexpected)?
                        .into(),
                ];
                ChatCompletionRequestUserMessageArgs::default()
                    .content(parts)
                    .build()
                    .map_err(unexpected)?
            }
            None => ChatCompletionRequestUserMessageArgs::default()
                .content(query)
                .build()
                .map_err(unexpected)?,
        };

        Ok(message)
    }

    async fn complete(
        &self,
        system: String,
        query: &str,
        image: Option<&ImageAttachment>,
    ) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            Self::user_message(query, image)?.into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Generation(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);

        match content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(PortError::Generation(
                "chat completion contained no text content".to_string(),
            )),
        }
    }
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiGenerationAdapter {
    /// Produces a grounded answer from the retrieved context, with the
    /// image inlined when the turn carried one.
    async fn answer(
        &self,
        query: &str,
        context: &[RetrievedDocument],
        image: Option<&ImageAttachment>,
    ) -> PortResult<String> {
        let system = format!(
            "{}\n\n=== RETRIEVED CONTEXT FROM UPLOADED DOCUMENTS ===\n{}\n=== END OF CONTEXT ===",
            SYSTEM_PROMPT,
            Self::format_context(context)
        );
        let query = if query.trim().is_empty() {
            "Please identify this image and provide relevant information from the uploaded documents."
        } else {
            query
        };

        with_backoff("generate_answer", DEFAULT_ATTEMPTS, || {
            self.complete(system.clone(), query, image)
        })
        .await
    }

    /// Captions an image into text suitable as a similarity-search query.
    async fn describe_image(&self, image: &ImageAttachment) -> PortResult<String> {
        with_backoff("describe_image", DEFAULT_ATTEMPTS, || {
            self.complete(
                "You describe images precisely for search purposes.".to_string(),
                DESCRIBE_IMAGE_PROMPT,
                Some(image),
            )
        })
        .await
    }
}
