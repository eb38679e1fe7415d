use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use log::{debug, trace, error};

use crate::request::TaskKind;

// ===== Message Types =====

#[derive(Debug, Clone, Serialize)]
pub struct SimplifyRequest<'a>
{   pub text: &'a str
  , pub api_key: &'a str
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslateRequest<'a>
{   pub text: &'a str
  , pub target_language: &'a str
  , pub api_key: &'a str
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry
{   pub role: String
  , pub parts: Vec<String>
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a>
{   pub history: Vec<HistoryEntry>
  , pub message: &'a str
  , pub api_key: &'a str
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifyResponse
{   pub simplified_text: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateResponse
{   pub translated_text: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse
{   pub response: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorDetail
{   detail: Option<serde_json::Value>
}

// ===== Cloud Client =====

/// Client for the hosted simplification service
#[derive(Clone)]
pub struct CloudClient
{   http_client: reqwest::Client
}

impl CloudClient
{   pub fn new(http_client: reqwest::Client) -> Self
    {   debug!("Creating CloudClient");
        CloudClient
        {   http_client
        }
    }

    pub async fn handle_invoke(
      &self
    , api_base: &str
    , api_key: &str
    , text: &str
    , task: TaskKind
    , target_language: &str
    ) -> Result<String, crate::error::Error>
    {   let base = api_base.trim_end_matches('/');
        match task
        {   TaskKind::Simplify => {
              let body = SimplifyRequest { text, api_key };
              let reply: SimplifyResponse = self
                .post(base, "/simplify", &body)
                .await?;
              field(reply.simplified_text, "simplified_text")
            }
          , TaskKind::Translate => {
              let body = TranslateRequest
              {   text
                , target_language
                , api_key
              };
              let reply: TranslateResponse = self
                .post(base, "/translate", &body)
                .await?;
              field(reply.translated_text, "translated_text")
            }
          , TaskKind::ChatTurn => {
              self.chat(base, api_key, text).await
            }
          , TaskKind::DetectLanguage => {
              // No dedicated endpoint; ask through chat
              let prompt = super::local::build_prompt(
                text,
                TaskKind::DetectLanguage,
                target_language
              );
              let raw = self.chat(base, api_key, &prompt).await?;
              Ok(crate::language::extract_language_code(&raw))
            }
        }
    }

    async fn chat(
      &self
    , base: &str
    , api_key: &str
    , message: &str
    ) -> Result<String, crate::error::Error>
    {   // History is not accumulated between turns
        let body = ChatRequest
        {   history: vec![]
          , message
          , api_key
        };
        let reply: ChatResponse = self
          .post(base, "/chat", &body)
          .await?;
        field(reply.response, "response")
    }

    async fn post<B, R>(
      &self
    , base: &str
    , endpoint: &str
    , body: &B
    ) -> Result<R, crate::error::Error>
    where
      B: Serialize
    , R: DeserializeOwned
    {   debug!("Calling API: {}{}", base, endpoint);

        let response = self.http_client
          .post(format!("{}{}", base, endpoint))
          .header("Content-Type", "application/json")
          .json(body)
          .send()
          .await
          .map_err(|e| {
            error!("Fetch error on {}: {}", endpoint, e);
            crate::error::Error::from(e)
          })?;

        let status = response.status();
        trace!("Response status on {}: {}", endpoint, status);

        let text = response.text().await.map_err(|e| {
          error!("Error reading body on {}: {}", endpoint, e);
          crate::error::Error::from(e)
        })?;

        if !status.is_success()
        {   let message = server_message(&text)
              .unwrap_or_else(|| {
                format!("API error: {}", status.as_u16())
              });
            error!(
              "API error on {}: {} - {}",
              endpoint, status, message
            );
            return Err(crate::error::Error::BackendStatusError
            {   status: status.as_u16()
              , message
            });
        }

        trace!("API success on {}: {}", endpoint, text);
        serde_json::from_str(&text).map_err(|e| {
          error!("Parse error on {}: {}", endpoint, e);
          crate::error::Error::MalformedResponse(e.to_string())
        })
    }
}

/// `detail` from a FastAPI error body, else the raw body
fn server_message(body: &str) -> Option<String>
{   let trimmed = body.trim();
    if trimmed.is_empty()
    {   return None;
    }
    match serde_json::from_str::<ErrorDetail>(trimmed)
    {   Ok(ErrorDetail { detail: Some(serde_json::Value::String(s)) })
          => Some(s)
      , Ok(ErrorDetail { detail: Some(other) }) => Some(other.to_string())
      , _ => Some(trimmed.to_string())
    }
}

fn field(
  value: Option<String>
, name: &str
) -> Result<String, crate::error::Error>
{   value.ok_or_else(|| {
      error!("Response missing {}", name);
      crate::error::Error::MalformedResponse(
        format!("missing field `{}`", name)
      )
    })
}
