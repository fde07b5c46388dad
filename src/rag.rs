use crate::chunking::{split_documents, ChunkingConfig};
use crate::completion::CompletionProvider;
use crate::compose::{compose, format_context, AssistantReply};
use crate::conversation::Conversation;
use crate::document::load_documents;
use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::gate::{is_on_topic, OFF_TOPIC_REPLY};
use crate::retrieval::Retriever;
use crate::store::VectorStore;
use log::{error, info};
use std::io::{self, Write};
use std::path::Path;

/// Counts reported by an indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub indexed: usize,
}

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine<E, S, C> {
    retriever: Retriever<E, S>,
    completion: Option<C>,
    chunking: ChunkingConfig,
    top_k: usize,
}

impl<E, S, C> RagEngine<E, S, C>
where
    E: Embedder,
    S: VectorStore,
    C: CompletionProvider,
{
    /// Create a new RAG engine; without `completion` answers are raw passages
    pub fn new(
        retriever: Retriever<E, S>,
        completion: Option<C>,
        chunking: ChunkingConfig,
        top_k: usize,
    ) -> Self {
        RagEngine {
            retriever,
            completion,
            chunking,
            top_k,
        }
    }

    pub fn retriever(&self) -> &Retriever<E, S> {
        &self.retriever
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// Load, chunk, embed and store every document under `data_dir`
    pub async fn index_directory<P: AsRef<Path>>(&mut self, data_dir: P) -> Result<IndexReport> {
        let documents = load_documents(data_dir)?;
        let chunks = split_documents(&documents, &self.chunking)?;

        info!("Generating embeddings for {} chunks...", chunks.len());
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.retriever.embedder().embed_documents(&texts).await?;

        let report = IndexReport {
            documents: documents.len(),
            chunks: chunks.len(),
            indexed: self.retriever.index(chunks, embeddings).await?,
        };
        info!("Indexed {} chunks", report.indexed);
        Ok(report)
    }

    /// Answer one question, propagating failures
    pub async fn answer(&self, question: &str) -> Result<AssistantReply> {
        if !is_on_topic(question) {
            info!("Rejected off-topic question");
            return Ok(AssistantReply::plain(OFF_TOPIC_REPLY));
        }

        let hits = self.retriever.search(question, self.top_k).await?;
        if hits.is_empty() {
            info!("No relevant information found in the index.");
            return Ok(compose(&hits, None));
        }

        let completion = match &self.completion {
            Some(provider) => Some(provider.complete(&format_context(&hits), question).await?),
            None => None,
        };

        Ok(compose(&hits, completion))
    }

    /// Run one chat turn: record the question, answer it, record the reply
    ///
    /// Failures become an assistant message instead of an error.
    pub async fn respond(&self, conversation: &mut Conversation, question: &str) -> AssistantReply {
        conversation.push_user(question);

        let reply = match self.answer(question).await {
            Ok(reply) => reply,
            Err(err) => {
                error!("Turn failed: {}", err);
                AssistantReply::plain(error_message(&err))
            }
        };

        conversation.push_assistant(reply.content.clone());
        reply
    }

    /// Run the interactive question loop on stdin/stdout
    pub async fn run_query_loop(&self, conversation: &mut Conversation) -> Result<()> {
        println!(
            "Ask about citations, formatting, or email etiquette. Type 'reset' to clear the chat, 'exit' to quit."
        );

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buffer = String::new();

        loop {
            print!("\nYour question: ");
            stdout.flush()?;

            buffer.clear();
            if stdin.read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();
            if question.is_empty() {
                continue;
            }

            match question.to_lowercase().as_str() {
                "exit" | "quit" => {
                    println!("Goodbye!");
                    break;
                }
                "reset" => {
                    conversation.reset();
                    println!("Chat cleared.");
                    continue;
                }
                _ => {}
            }

            let reply = self.respond(conversation, question).await;
            println!("\n{}", reply.content);
            if !reply.sources.is_empty() {
                println!("\nSources: {}", reply.sources);
            }
        }

        Ok(())
    }
}

/// Assistant-facing text for a failed turn
pub fn error_message(err: &RagError) -> String {
    match err.hint() {
        Some(hint) => format!("Error retrieving information: {}\n\n{}", err, hint),
        None => format!("Error retrieving information: {}", err),
    }
}
