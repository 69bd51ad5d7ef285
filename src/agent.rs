//! Answer synthesis: turn retrieved passages into a grounded support
//! response with sources, a confidence score, and follow-up actions.

use async_trait::async_trait;
use rig::completion::{CompletionModel, Message};
use rig::message::AssistantContent;

use crate::types::{QueryResponse, RetrievalResult, SourceRef, SupportError};

const SYSTEM_PROMPT: &str = "You are a helpful customer support agent. Your role is to:

1. Answer customer questions about cancellations, refunds, billing, and general support
2. Always base your answers on the provided documentation
3. Provide clear, step-by-step instructions when available
4. Include relevant contact information when appropriate
5. Be concise but comprehensive
6. If you cannot answer based on the provided docs, say so clearly

Format your response as:
- Direct answer to the question
- Step-by-step instructions if applicable
- Important notes or warnings
- Relevant contact information
- Source references

Always be helpful, accurate, and professional.";

const NO_DOCS_ANSWER: &str = "I couldn't find specific information about your question in this \
site's documentation. Please contact their support team directly.";
const NO_DOCS_ACTION: &str = "Contact customer support directly";

const ERROR_ANSWER: &str = "I encountered an error processing your question. Please try again \
or contact support directly.";
const ERROR_ACTIONS: [&str; 2] = ["Try rephrasing your question", "Contact support directly"];

/// Low confidence reported for fallback answers (no documents, or synthesis
/// failure).
const FALLBACK_CONFIDENCE: f32 = 0.1;

const MAX_ACTIONS: usize = 3;
const SYNTHESIS_TEMPERATURE: f64 = 0.2;

/// Produces a free-text answer from a question plus retrieved documentation.
///
/// The seam between the deterministic pipeline and the generative model:
/// tests script this, production wires it to a rig completion model.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, prompt: &str) -> Result<String, SupportError>;
}

/// [`Synthesizer`] backed by any rig [`CompletionModel`].
#[derive(Clone)]
pub struct RigSynthesizer<M> {
    model: M,
}

impl<M> RigSynthesizer<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<M> Synthesizer for RigSynthesizer<M>
where
    M: CompletionModel,
{
    async fn synthesize(&self, prompt: &str) -> Result<String, SupportError> {
        let request = self
            .model
            .completion_request(Message::user(prompt.to_owned()))
            .preamble(SYSTEM_PROMPT.to_owned())
            .temperature(SYNTHESIS_TEMPERATURE)
            .build();

        let response = self
            .model
            .completion(request)
            .await
            .map_err(|err| SupportError::Synthesis(err.to_string()))?;

        let answer = response
            .choice
            .into_iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if answer.trim().is_empty() {
            return Err(SupportError::Synthesis(
                "model returned no text content".to_string(),
            ));
        }
        Ok(answer)
    }
}

/// Assembles complete answers from retrieval output and a [`Synthesizer`].
pub struct SupportAgent<S> {
    synthesizer: S,
}

impl<S> SupportAgent<S>
where
    S: Synthesizer,
{
    pub fn new(synthesizer: S) -> Self {
        Self { synthesizer }
    }

    /// Builds a [`QueryResponse`] from the question and its retrieved
    /// passages. Never errors: an empty retrieval set or a synthesis failure
    /// degrades to a canned low-confidence answer, so one flaky model call
    /// cannot surface as an internal error to the person asking.
    pub async fn process_query(
        &self,
        query: &str,
        results: &[RetrievalResult],
        context: Option<&str>,
    ) -> QueryResponse {
        if results.is_empty() {
            return QueryResponse {
                answer: NO_DOCS_ANSWER.to_string(),
                sources: Vec::new(),
                confidence: FALLBACK_CONFIDENCE,
                suggested_actions: vec![NO_DOCS_ACTION.to_string()],
            };
        }

        let prompt = build_prompt(query, results, context);
        match self.synthesizer.synthesize(&prompt).await {
            Ok(answer) => {
                let sources: Vec<SourceRef> = results.iter().map(SourceRef::from).collect();
                let suggested_actions = suggest_actions(query, &answer);
                let confidence = score_confidence(results);
                QueryResponse {
                    answer,
                    sources,
                    confidence,
                    suggested_actions,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "answer synthesis failed");
                QueryResponse {
                    answer: ERROR_ANSWER.to_string(),
                    sources: Vec::new(),
                    confidence: FALLBACK_CONFIDENCE,
                    suggested_actions: ERROR_ACTIONS.iter().map(|s| s.to_string()).collect(),
                }
            }
        }
    }
}

/// Formats the retrieval context and question for the completion model.
fn build_prompt(query: &str, results: &[RetrievalResult], context: Option<&str>) -> String {
    let doc_context = results
        .iter()
        .map(|result| {
            format!(
                "Document: {}\nURL: {}\nContent: {}",
                result.title(),
                if result.url().is_empty() {
                    "N/A"
                } else {
                    result.url()
                },
                result.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "QUESTION: {query}\n\nRELEVANT DOCUMENTATION:\n{doc_context}\n\n\
         ADDITIONAL CONTEXT: {}\n\n\
         Please provide a helpful response based on the documentation above.",
        context.unwrap_or("None")
    )
}

/// Confidence from the best (smallest) retrieval distance, clamped to
/// [0.3, 0.9] so a perfect match never reads as certainty and a poor one
/// never reads as zero.
fn score_confidence(results: &[RetrievalResult]) -> f32 {
    let min_distance = results
        .iter()
        .map(|result| result.distance)
        .fold(f32::INFINITY, f32::min);
    (1.0 - min_distance).clamp(0.3, 0.9)
}

/// Keyword-triggered follow-up actions, capped at three.
fn suggest_actions(query: &str, answer: &str) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let answer_lower = answer.to_lowercase();
    let mut actions: Vec<String> = Vec::new();

    if query_lower.contains("cancel") {
        actions.push("Go to Account Settings".to_string());
        if answer_lower.contains("contact") {
            actions.push("Contact Support".to_string());
        }
    }
    if query_lower.contains("refund") {
        actions.push("Check refund eligibility".to_string());
        actions.push("Prepare order details".to_string());
    }
    if query_lower.contains("billing") || query_lower.contains("payment") {
        actions.push("Review billing information".to_string());
        actions.push("Check payment methods".to_string());
    }

    if actions.is_empty() {
        actions = vec![
            "Contact customer support".to_string(),
            "Check account settings".to_string(),
        ];
    }
    actions.truncate(MAX_ACTIONS);
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct CannedSynthesizer(&'static str);

    #[async_trait]
    impl Synthesizer for CannedSynthesizer {
        async fn synthesize(&self, _prompt: &str) -> Result<String, SupportError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingSynthesizer;

    #[async_trait]
    impl Synthesizer for FailingSynthesizer {
        async fn synthesize(&self, _prompt: &str) -> Result<String, SupportError> {
            Err(SupportError::Synthesis("model offline".to_string()))
        }
    }

    fn result(title: &str, url: &str, category: &str, distance: f32) -> RetrievalResult {
        let mut metadata = BTreeMap::new();
        metadata.insert("title".to_string(), title.to_string());
        metadata.insert("url".to_string(), url.to_string());
        metadata.insert("category".to_string(), category.to_string());
        RetrievalResult {
            content: format!("{title} body"),
            metadata,
            distance,
        }
    }

    #[tokio::test]
    async fn empty_retrieval_gets_the_no_docs_fallback() {
        let agent = SupportAgent::new(CannedSynthesizer("unused"));
        let response = agent.process_query("how do I cancel?", &[], None).await;
        assert_eq!(response.answer, NO_DOCS_ANSWER);
        assert!(response.sources.is_empty());
        assert!((response.confidence - 0.1).abs() < f32::EPSILON);
        assert_eq!(response.suggested_actions, vec![NO_DOCS_ACTION.to_string()]);
    }

    #[tokio::test]
    async fn synthesis_failure_degrades_instead_of_erroring() {
        let agent = SupportAgent::new(FailingSynthesizer);
        let results = [result("Refund Policy", "https://x/refund", "refund", 0.2)];
        let response = agent.process_query("refund?", &results, None).await;
        assert_eq!(response.answer, ERROR_ANSWER);
        assert!(response.sources.is_empty());
        assert_eq!(response.suggested_actions.len(), 2);
    }

    #[tokio::test]
    async fn successful_answer_carries_sources_and_confidence() {
        let agent = SupportAgent::new(CannedSynthesizer("You can request a refund online."));
        let results = [
            result("Refund Policy", "https://x/refund", "refund", 0.25),
            result("Billing FAQ", "https://x/billing", "billing", 0.6),
        ];
        let response = agent
            .process_query("How do I get a refund?", &results, None)
            .await;
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].title, "Refund Policy");
        assert!((response.confidence - 0.75).abs() < 1e-6);
        assert_eq!(
            response.suggested_actions,
            vec![
                "Check refund eligibility".to_string(),
                "Prepare order details".to_string()
            ]
        );
    }

    #[test]
    fn confidence_is_clamped_to_its_band() {
        let near = [result("A", "", "general", 0.01)];
        assert!((score_confidence(&near) - 0.9).abs() < f32::EPSILON);
        let far = [result("A", "", "general", 0.95)];
        assert!((score_confidence(&far) - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn cancel_with_contact_in_answer_adds_contact_support() {
        let actions = suggest_actions(
            "I want to cancel my plan",
            "To cancel, contact our team at help@example.com.",
        );
        assert_eq!(
            actions,
            vec!["Go to Account Settings".to_string(), "Contact Support".to_string()]
        );
    }

    #[test]
    fn actions_are_capped_at_three() {
        let actions = suggest_actions("cancel refund billing", "please contact us");
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], "Go to Account Settings");
    }

    #[test]
    fn unmatched_queries_get_default_actions() {
        let actions = suggest_actions("what are your opening hours?", "We open at nine.");
        assert_eq!(
            actions,
            vec![
                "Contact customer support".to_string(),
                "Check account settings".to_string()
            ]
        );
    }

    #[test]
    fn prompt_includes_documents_and_context() {
        let results = [result("Refund Policy", "https://x/refund", "refund", 0.2)];
        let prompt = build_prompt("refund?", &results, Some("premium customer"));
        assert!(prompt.contains("QUESTION: refund?"));
        assert!(prompt.contains("Document: Refund Policy"));
        assert!(prompt.contains("URL: https://x/refund"));
        assert!(prompt.contains("ADDITIONAL CONTEXT: premium customer"));

        let no_context = build_prompt("refund?", &results, None);
        assert!(no_context.contains("ADDITIONAL CONTEXT: None"));
    }
}
