//! OpenAI-compatible chat client backing the generative collaborators.
//!
//! Classification matters more than the transport here: rate limits and
//! server-side errors map to `Transient` so the retry combinator recovers
//! them; anything structurally wrong with the endpoint is `Internal` and
//! aborts the run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborators::{ChatModel, PromptBlock, Role};
use crate::config::ChatEndpoint;
use crate::error::WorkflowError;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// A [`ChatModel`] speaking the `/chat/completions` wire format.
pub struct ChatClient {
    endpoint: ChatEndpoint,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(endpoint: ChatEndpoint) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { endpoint, http })
    }

    fn wire_messages<'a>(blocks: &'a [PromptBlock]) -> Vec<WireMessage<'a>> {
        blocks
            .iter()
            .map(|b| WireMessage {
                role: match b.role {
                    Role::System => "system",
                    Role::User => "user",
                },
                content: &b.content,
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn respond(&self, blocks: &[PromptBlock]) -> Result<String, WorkflowError> {
        let url = format!("{}/chat/completions", self.endpoint.url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.endpoint.model,
            messages: Self::wire_messages(blocks),
            temperature: 0.2,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.endpoint.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkflowError::transient("chat", e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            warn!(%status, %url, "chat endpoint pushed back");
            return Err(WorkflowError::transient(
                "chat",
                format!("endpoint returned {status}"),
            ));
        }
        if !status.is_success() {
            return Err(WorkflowError::Internal(anyhow::anyhow!(
                "chat endpoint {url} returned {status}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| WorkflowError::transient("chat", format!("malformed response: {e}")))?;
        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(WorkflowError::transient("chat", "response had no choices"));
        };
        debug!(
            model = %self.endpoint.model,
            response_len = choice.message.content.len(),
            "chat completion received"
        );
        Ok(choice.message.content)
    }
}

/// Quick reachability probe for `doctor`: GET `{url}/models` with a short
/// timeout. Failure means unreachable, not misconfigured.
pub async fn check_endpoint(url: &str) -> bool {
    let Ok(client) = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    else {
        return false;
    };
    let probe = format!("{}/models", url.trim_end_matches('/'));
    match client.get(&probe).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_messages_map_roles() {
        let blocks = vec![PromptBlock::system("rules"), PromptBlock::user("task")];
        let wire = ChatClient::wire_messages(&blocks);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[1].role, "user");
        assert_eq!(wire[1].content, "task");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"@Nullable String s;"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "@Nullable String s;");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_transient() {
        let client = ChatClient::new(ChatEndpoint {
            url: "http://127.0.0.1:1/v1".into(),
            model: "test".into(),
            api_key: None,
        })
        .unwrap();
        let err = client
            .respond(&[PromptBlock::user("hello")])
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_check_endpoint_unreachable_is_false() {
        assert!(!check_endpoint("http://127.0.0.1:1/v1").await);
    }
}
