//! Free-text question to filtered table view.
//!
//! The model's JSON reply is untrusted input: a well-formed reply becomes a
//! filter spec, anything else degrades to the identity filter with an
//! explanatory narrative (a soft failure, never an error). Only the model
//! call itself failing surfaces as [`QueryError`].

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use petiq_core::{FilterSpec, PetitionRecord, PetitionTable, Predicate, SortOrder, TableSummary};

use crate::openai::{AiError, OpenAiClient};
use crate::prompt;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The model call itself failed (network, timeout, or API error). The
    /// table stays unfiltered; the caller decides whether the user re-asks.
    #[error("model call failed: {0}")]
    Model(#[from] AiError),
}

/// Outcome of one interpreted question: a derived, borrowed view over the
/// table snapshot plus the model's reading of the question.
#[derive(Debug)]
pub struct QueryResult<'a> {
    /// Human-readable restatement of the question.
    pub interpreted_intent: String,
    /// The validated spec that produced `matched_rows`. Identity when the
    /// reply could not be interpreted.
    pub filter_spec: FilterSpec,
    /// Matching rows in table order (unless the spec sorts them).
    pub matched_rows: Vec<&'a PetitionRecord>,
    /// Free-text insight about the results.
    pub narrative: String,
}

/// Interprets questions against a petition table via one model call each.
pub struct QueryInterpreter {
    client: OpenAiClient,
}

impl QueryInterpreter {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Interpret one question against the current table snapshot.
    ///
    /// An empty table short-circuits with an empty result and issues no
    /// model call. A reply that cannot be parsed degrades to the identity
    /// filter. No retries on failure.
    pub async fn interpret<'a>(
        &self,
        question: &str,
        table: &'a PetitionTable,
    ) -> Result<QueryResult<'a>, QueryError> {
        if table.is_empty() {
            return Ok(QueryResult {
                interpreted_intent: "No petition data is loaded".to_string(),
                filter_spec: FilterSpec::default(),
                matched_rows: Vec::new(),
                narrative: "The petition table is empty; load data before asking questions."
                    .to_string(),
            });
        }

        let system = prompt::build_system_prompt(table.records());
        let user = prompt::build_user_prompt(question);
        let raw = self.client.complete(&system, &user).await?;
        debug!(bytes = raw.len(), "model reply received");

        let (interpreted_intent, filter_spec, narrative) = match parse_model_reply(&raw) {
            Some(reply) => {
                let spec = FilterSpec {
                    predicates: reply.filters,
                    sort: reply
                        .sort
                        .as_ref()
                        .and_then(Value::as_str)
                        .and_then(SortOrder::parse),
                    limit: reply.limit.as_ref().and_then(lenient_limit),
                };
                let intent = reply
                    .interpretation
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| format!("Query processed: {question}"));
                (intent, spec, reply.narrative)
            }
            None => {
                warn!("model reply was not a usable JSON object; showing the full table");
                (
                    format!("The question could not be interpreted: {question}"),
                    FilterSpec::default(),
                    Some(
                        "The model reply could not be interpreted as a filter, so all \
                         petitions are shown unfiltered. Try rephrasing the question."
                            .to_string(),
                    ),
                )
            }
        };

        let matched_rows = filter_spec.apply(table.records());
        let narrative = narrative
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| basic_narrative(&matched_rows));

        Ok(QueryResult {
            interpreted_intent,
            filter_spec,
            matched_rows,
            narrative,
        })
    }
}

/// Wire shape of the model reply. Every field is optional so that a partial
/// reply still yields whatever it did contain.
#[derive(Debug, Default, Deserialize)]
struct ModelReply {
    #[serde(default)]
    interpretation: Option<String>,
    #[serde(default)]
    filters: Vec<Predicate>,
    #[serde(default)]
    sort: Option<Value>,
    #[serde(default)]
    limit: Option<Value>,
    #[serde(default)]
    narrative: Option<String>,
}

/// Parse the reply text into a [`ModelReply`].
///
/// The prompt demands raw JSON, but models occasionally wrap the object in
/// markdown fences or prose; the fallback takes the outermost brace span.
/// Returns `None` when no usable object can be extracted.
fn parse_model_reply(raw: &str) -> Option<ModelReply> {
    let trimmed = raw.trim();
    if let Ok(reply) = serde_json::from_str(trimmed) {
        return Some(reply);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn lenient_limit(value: &Value) -> Option<usize> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (n > 0).then_some(n as usize)
}

/// Statistical fallback narrative for replies that carried no insight text.
fn basic_narrative(rows: &[&PetitionRecord]) -> String {
    let Some(summary) = TableSummary::compute(rows.iter().copied()) else {
        return "No petitions matched the question.".to_string();
    };

    let mut out = format!(
        "Found {} petitions with {} signatures in total (average {:.0} per petition).",
        summary.rows, summary.total_signatures, summary.mean_signatures
    );
    if let Some(top) = rows.iter().max_by_key(|r| r.signatures) {
        out.push_str(&format!(
            " The most signed is \"{}\" with {} signatures.",
            prompt::truncate(&top.title, 100),
            top.signatures
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use petiq_core::PetitionState;

    fn table() -> PetitionTable {
        PetitionTable::new(vec![
            PetitionRecord {
                title: "Ban X".into(),
                url: "http://x".into(),
                state: PetitionState::Open,
                signatures: 150_000,
            },
            PetitionRecord {
                title: "Fix Y".into(),
                url: "http://y".into(),
                state: PetitionState::Closed,
                signatures: 40_000,
            },
        ])
    }

    fn envelope(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    async fn interpreter_for(server: &mockito::ServerGuard) -> QueryInterpreter {
        let client = OpenAiClient::new("test-key", "gpt-4o")
            .unwrap()
            .with_base_url(server.url());
        QueryInterpreter::new(client)
    }

    const GOOD_REPLY: &str = r#"{
        "interpretation": "Petitions with more than 100000 signatures",
        "filters": [{"field": "signatures", "comparator": ">", "value": 100000}],
        "sort": null,
        "limit": null,
        "narrative": "1 petition found"
    }"#;

    #[test]
    fn parses_raw_reply() {
        let reply = parse_model_reply(GOOD_REPLY).unwrap();
        assert_eq!(reply.filters.len(), 1);
        assert_eq!(reply.filters[0].field, "signatures");
        assert_eq!(
            reply.interpretation.as_deref(),
            Some("Petitions with more than 100000 signatures")
        );
    }

    #[test]
    fn parses_fenced_reply() {
        let fenced = format!("```json\n{GOOD_REPLY}\n```");
        let reply = parse_model_reply(&fenced).unwrap();
        assert_eq!(reply.filters.len(), 1);
    }

    #[test]
    fn parses_prose_wrapped_reply() {
        let wrapped = format!("Here is the filter you asked for:\n{GOOD_REPLY}\nHope that helps!");
        let reply = parse_model_reply(&wrapped).unwrap();
        assert_eq!(reply.filters.len(), 1);
    }

    #[test]
    fn garbage_reply_is_unusable() {
        assert!(parse_model_reply("I cannot answer that.").is_none());
        assert!(parse_model_reply("").is_none());
    }

    #[test]
    fn partial_reply_keeps_what_it_has() {
        let reply = parse_model_reply(r#"{"interpretation": "everything"}"#).unwrap();
        assert!(reply.filters.is_empty());
        assert!(reply.narrative.is_none());
    }

    #[test]
    fn limit_accepts_numbers_and_digit_strings() {
        assert_eq!(lenient_limit(&serde_json::json!(5)), Some(5));
        assert_eq!(lenient_limit(&serde_json::json!("10")), Some(10));
        assert_eq!(lenient_limit(&serde_json::json!(0)), None);
        assert_eq!(lenient_limit(&serde_json::json!("ten")), None);
    }

    #[tokio::test]
    async fn interprets_and_filters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(envelope(GOOD_REPLY))
            .expect(2)
            .create_async()
            .await;

        let interpreter = interpreter_for(&server).await;
        let table = table();

        let result = interpreter
            .interpret("petitions with over 100000 signatures", &table)
            .await
            .unwrap();
        assert_eq!(result.matched_rows.len(), 1);
        assert_eq!(result.matched_rows[0].title, "Ban X");
        assert_eq!(
            result.interpreted_intent,
            "Petitions with more than 100000 signatures"
        );
        assert_eq!(result.narrative, "1 petition found");

        // Held fixed, the same reply yields a structurally equal spec and
        // the same view: the apply step is deterministic.
        let again = interpreter
            .interpret("petitions with over 100000 signatures", &table)
            .await
            .unwrap();
        assert_eq!(result.filter_spec, again.filter_spec);
        assert_eq!(result.matched_rows, again.matched_rows);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unparseable_reply_soft_fails_to_full_table() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(envelope("Sorry, I cannot help with that."))
            .create_async()
            .await;

        let interpreter = interpreter_for(&server).await;
        let table = table();
        let result = interpreter.interpret("gibberish", &table).await.unwrap();

        assert!(result.filter_spec.is_identity());
        assert_eq!(result.matched_rows.len(), table.len());
        assert!(result.narrative.contains("could not be interpreted"));
    }

    #[tokio::test]
    async fn missing_narrative_falls_back_to_statistics() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(envelope(
                r#"{"interpretation": "everything", "filters": []}"#,
            ))
            .create_async()
            .await;

        let interpreter = interpreter_for(&server).await;
        let table = table();
        let result = interpreter.interpret("show everything", &table).await.unwrap();

        assert_eq!(result.matched_rows.len(), 2);
        assert!(result.narrative.contains("Found 2 petitions"));
        assert!(result.narrative.contains("Ban X"));
    }

    #[tokio::test]
    async fn model_failure_is_a_hard_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let interpreter = interpreter_for(&server).await;
        let table = table();
        let err = interpreter.interpret("anything", &table).await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Model(AiError::Api { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn empty_table_issues_no_model_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let interpreter = interpreter_for(&server).await;
        let empty = PetitionTable::new(Vec::new());
        let result = interpreter.interpret("anything", &empty).await.unwrap();

        assert!(result.matched_rows.is_empty());
        assert!(result.filter_spec.is_identity());
        mock.assert_async().await;
    }
}
