//! Request and response types for one LLM call

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a single LLM call is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind
{   DetectLanguage
  , Simplify
  , Translate
  , #[serde(alias = "chatbot_response")]
    ChatTurn
}

impl TaskKind
{   pub fn as_str(&self) -> &'static str
    {   match self
        {   TaskKind::DetectLanguage => "detect_language"
          , TaskKind::Simplify => "simplify"
          , TaskKind::Translate => "translate"
          , TaskKind::ChatTurn => "chat_turn"
        }
    }
}

impl fmt::Display for TaskKind
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind
{   type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {   match s
        {   "detect_language" => Ok(TaskKind::DetectLanguage)
          , "simplify" => Ok(TaskKind::Simplify)
          , "translate" => Ok(TaskKind::Translate)
          , "chat_turn" | "chatbot_response" => Ok(TaskKind::ChatTurn)
          , other => Err(crate::error::Error::UnknownTask(
              other.to_string()
            ))
        }
    }
}

/// One outbound call; immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest
{   /// Source text, or the full prompt for chat turns
    pub text: String
  , pub task: TaskKind
  , /// Language to translate into
    pub target_language: String
  , pub backend: crate::config::BackendConfig
}

impl LlmRequest
{   pub fn new(
      text: impl Into<String>
    , task: TaskKind
    , target_language: impl Into<String>
    , backend: crate::config::BackendConfig
    ) -> Self
    {   LlmRequest
        {   text: text.into()
          , task
          , target_language: target_language.into()
          , backend
        }
    }
}

/// Outcome of one call: fully succeeded or fully failed
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse
{   pub task: TaskKind
  , pub result: Result<String, crate::error::Error>
}
