use serde::{Deserialize, Serialize};
use log::{debug, trace, error};

use crate::request::TaskKind;

// ===== Message Types =====

#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions
{   pub temperature: f32
  , pub num_predict: u32
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest
{   pub model: String
  , pub prompt: String
  , pub stream: bool
  , pub options: GenerateOptions
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse
{   #[serde(default)]
    pub response: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateError
{   #[serde(default)]
    error: Option<String>
}

// ===== Prompts =====

/// Instruction text sent to the model for each task
pub fn build_prompt(
  text: &str
, task: TaskKind
, target_language: &str
) -> String
{   match task
    {   TaskKind::DetectLanguage => format!(
          "Detect the language of the following text: \"{}\". \
           Respond only with the ISO 639-1 language code \
           (e.g., \"en\", \"fr\"). If the language is not \
           recognized, respond with \"unknown\".",
          text
        )
      , TaskKind::Translate => format!(
          "Translate the following text into {}: \"{}\". \
           Respond only with the translated text.",
          target_language, text
        )
      , TaskKind::Simplify => format!(
          "Simplify the following English text for easy \
           understanding: \"{}\". Respond only with the \
           simplified text.",
          text
        )
      , TaskKind::ChatTurn => text.to_string()
    }
}

// ===== Local Client =====

/// Client for a local model server speaking the generate API.
/// Every task goes to the same endpoint; only the prompt differs.
#[derive(Clone)]
pub struct LocalClient
{   http_client: reqwest::Client
  , temperature: f32
  , num_predict: u32
}

impl LocalClient
{   pub fn new(
      http_client: reqwest::Client
    , config: &crate::config::ClientConfig
    ) -> Self
    {   debug!("Creating LocalClient");
        LocalClient
        {   http_client
          , temperature: config.temperature
          , num_predict: config.num_predict
        }
    }

    pub async fn handle_invoke(
      &self
    , endpoint: &str
    , model: &str
    , text: &str
    , task: TaskKind
    , target_language: &str
    ) -> Result<String, crate::error::Error>
    {   debug!(
          "Local model {} at {} for task {}",
          model, endpoint, task
        );

        let request = GenerateRequest
        {   model: model.to_string()
          , prompt: build_prompt(text, task, target_language)
          , stream: false
          , options: GenerateOptions
            {   temperature: self.temperature
              , num_predict: self.num_predict
            }
        };

        trace!("Local request: {:?}", request);

        let response = self.http_client
          .post(endpoint)
          .json(&request)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            crate::error::Error::from(e)
          })?;

        let status = response.status();
        trace!("Local response status: {}", status);

        let body = response.text().await.map_err(|e| {
          error!("Error reading response text: {}", e);
          crate::error::Error::from(e)
        })?;
        trace!("Raw local response: {}", body);

        if !status.is_success()
        {   let message = serde_json::from_str::<GenerateError>(&body)
              .ok()
              .and_then(|e| e.error)
              .or_else(|| {
                status.canonical_reason().map(str::to_string)
              })
              .unwrap_or_else(|| {
                "Local model request failed".to_string()
              });
            error!("Local model error {}: {}", status, message);
            return Err(crate::error::Error::BackendStatusError
            {   status: status.as_u16()
              , message
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
          .map_err(|e| {
            error!("Parse error: {}", e);
            crate::error::Error::MalformedResponse(e.to_string())
          })?;

        let generated = parsed.response
          .map(|r| r.trim().to_string())
          .filter(|r| !r.is_empty())
          .ok_or_else(|| {
            error!("No response field in local reply");
            crate::error::Error::MalformedResponse(
              "local model did not return a response".to_string()
            )
          })?;

        if task == TaskKind::DetectLanguage
        {   let code = crate::language::extract_language_code(&generated);
            debug!("Detected language {} from {:?}", code, generated);
            return Ok(code);
        }

        Ok(generated)
    }
}
