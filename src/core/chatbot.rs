use crate::config::{AssistantSettings, ChatSettings};
use crate::core::knowledge::KnowledgeBase;
use crate::domain::model::{ChatMessage, Chunk, Role, ScoredChunk};
use crate::domain::ports::{ChatModel, Embedder, Storage};
use crate::utils::error::Result;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Conversational front end: retrieves context from the knowledge base,
/// assembles a persona prompt with recent history and asks the chat model.
pub struct RagChatbot<M: ChatModel, E: Embedder, S: Storage> {
    model: M,
    knowledge: KnowledgeBase<E, S>,
    settings: ChatSettings,
    assistant: AssistantSettings,
    history: Vec<ChatMessage>,
    has_introduced: bool,
}

impl<M: ChatModel, E: Embedder, S: Storage> RagChatbot<M, E, S> {
    pub fn new(
        model: M,
        knowledge: KnowledgeBase<E, S>,
        settings: ChatSettings,
        assistant: AssistantSettings,
    ) -> Self {
        Self {
            model,
            knowledge,
            settings,
            assistant,
            history: Vec::new(),
            has_introduced: false,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase<E, S> {
        &self.knowledge
    }

    pub fn knowledge_mut(&mut self) -> &mut KnowledgeBase<E, S> {
        &mut self.knowledge
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn has_introduced(&self) -> bool {
        self.has_introduced
    }

    /// The original query followed by up to `multi_query_count - 1` model
    /// rephrasings. Falls back to just the original if the model fails.
    pub async fn generate_multiple_queries(&self, query: &str) -> Vec<String> {
        let mut queries = vec![query.to_string()];
        let wanted = self.settings.multi_query_count.saturating_sub(1);
        if wanted == 0 {
            return queries;
        }

        let prompt = format!(
            "Generate {} different ways to ask the following question, to help \
             search a knowledge base. Write one question per line with no \
             numbering or extra text.\n\nQuestion: {}",
            wanted, query
        );
        let messages = [
            ChatMessage::system("You rewrite search queries. Answer only with the rewritten queries."),
            ChatMessage::user(prompt),
        ];

        match self.model.chat(&messages).await {
            Ok(answer) => {
                for variation in parse_query_variations(&answer, query) {
                    if queries.len() > wanted {
                        break;
                    }
                    queries.push(variation);
                }
            }
            Err(e) => {
                tracing::warn!("Query expansion failed, using the original query only: {}", e);
            }
        }

        tracing::debug!("Query variations: {:?}", queries);
        queries
    }

    /// Searches with every query variation, keeps the best score per chunk,
    /// drops chunks under the relevance threshold and returns at most `top_k`.
    pub async fn retrieve_with_multi_query(
        &self,
        query: &str,
        k_per_query: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let queries = self.generate_multiple_queries(query).await;

        let mut best: HashMap<String, ScoredChunk> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for q in &queries {
            let results = self
                .knowledge
                .similarity_search_with_relevance_scores(
                    q,
                    k_per_query,
                    self.settings.relevance_threshold,
                )
                .await?;

            for result in results {
                match best.get_mut(&result.chunk.id) {
                    Some(existing) if existing.score >= result.score => {}
                    Some(existing) => *existing = result,
                    None => {
                        order.push(result.chunk.id.clone());
                        best.insert(result.chunk.id.clone(), result);
                    }
                }
            }
        }

        let mut merged: Vec<ScoredChunk> = order
            .into_iter()
            .filter_map(|id| best.remove(&id))
            .collect();
        merged.sort_by(|a, b| b.score.total_cmp(&a.score));
        merged.truncate(self.settings.top_k);

        tracing::debug!(
            "Retrieved {} chunks from {} queries",
            merged.len(),
            queries.len()
        );
        Ok(merged)
    }

    pub async fn generate_response(&mut self, query: &str) -> Result<String> {
        let retrieved = self
            .retrieve_with_multi_query(query, self.settings.k_per_query)
            .await?;
        let chunks: Vec<Chunk> = retrieved.into_iter().map(|r| r.chunk).collect();
        let context = format_context(&chunks);

        let first_contact = !self.has_introduced && self.history.is_empty();
        let system_prompt = if first_contact {
            self.first_contact_prompt()
        } else {
            self.follow_up_prompt()
        };
        let prompt = self.user_prompt(query, &context);

        let messages = [ChatMessage::system(system_prompt), ChatMessage::user(prompt)];
        let answer = self.model.chat(&messages).await?;

        if first_contact {
            self.has_introduced = true;
        }
        self.history.push(ChatMessage::user(query));
        self.history.push(ChatMessage::assistant(answer.clone()));
        if self.history.len() > self.settings.history_limit {
            let excess = self.history.len() - self.settings.history_limit;
            self.history.drain(..excess);
        }

        Ok(answer)
    }

    pub fn clear_memory(&mut self) {
        self.history.clear();
        self.has_introduced = false;
    }

    fn first_contact_prompt(&self) -> String {
        format!(
            "You are a helpful customer service representative for {company}.\n\
             Your name is {name}. This is the first interaction, so briefly introduce yourself.\n\
             Be friendly, professional, and conversational. Keep responses concise and natural.\n\
             Use the provided context to answer questions accurately.\n\
             If you don't know something, politely say so.",
            company = self.assistant.company,
            name = self.assistant.name,
        )
    }

    fn follow_up_prompt(&self) -> String {
        format!(
            "You are {name}, a customer service representative for {company}.\n\
             You've already introduced yourself, so don't do it again.\n\
             Be friendly, professional, and conversational. Keep responses concise and natural.\n\
             Use the provided context to answer questions accurately.\n\
             Never mention document numbers, sources, or that you're looking at documents.\n\
             Respond as if you naturally know this information.\n\
             If you don't know something, politely say so.",
            company = self.assistant.company,
            name = self.assistant.name,
        )
    }

    fn history_block(&self) -> String {
        let start = self.history.len().saturating_sub(self.settings.prompt_history);
        self.history[start..]
            .iter()
            .map(|msg| {
                let speaker = match msg.role {
                    Role::User => "Customer",
                    _ => "Assistant",
                };
                format!("{}: {}\n", speaker, msg.content)
            })
            .collect()
    }

    fn user_prompt(&self, query: &str, context: &str) -> String {
        let history = self.history_block();
        if context.is_empty() {
            format!(
                "Previous conversation:\n{history}\n\
                 Customer's question: {query}\n\n\
                 Provide a helpful, natural response based on what you know about {company}.",
                company = self.assistant.company,
            )
        } else {
            format!(
                "Based on this information:\n{context}\n\n\
                 Previous conversation:\n{history}\n\
                 Customer's question: {query}\n\n\
                 Provide a helpful, natural response. Don't mention documents or sources."
            )
        }
    }
}

/// Chunk contents separated by blank lines, without any source references.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn list_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r#"^\s*(?:\d+[.):]|[-*•])\s*"#).expect("list marker pattern is valid")
    })
}

/// Cleans a model answer into distinct query variations: strips list markers
/// and quotes, drops blanks, repeats and the original query itself.
fn parse_query_variations(answer: &str, original: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(original.trim().to_lowercase());

    answer
        .lines()
        .map(|line| list_marker().replace(line, ""))
        .map(|line| line.trim().trim_matches('"').trim().to_string())
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_lowercase()))
        .collect()
}
