use std::fmt;

/// Error type for every SimplifAI context
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Credential or endpoint absent from settings
    MissingConfiguration(String)
  , /// Trigger fired without any captured text
    NoTextSelected
  , /// Transport-level failure (connect, DNS, reset)
    NetworkFailure(String)
  , /// Backend answered with a non-success status
    BackendStatusError
    {   status: u16
      , message: String
    }
  , /// Payload missing the expected result field
    MalformedResponse(String)
  , /// Unrecognized task kind
    UnknownTask(String)
  , /// Transport timeout elapsed
    Timeout
  , /// An actor channel was closed
    Disconnected(String)
  , /// Settings file could not be read or written
    Io(String)
  , /// Generic error
    Other(String)
}

impl Error
{   /// Text shown to the user in place of a result
    pub fn user_message(&self) -> String
    {   match self
        {   Error::NoTextSelected => self.to_string()
          , _ => format!("Error: {}", self)
        }
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::MissingConfiguration(msg) => {
              write!(f,
                "{}. Please configure in extension options.",
                msg
              )
            }
          , Error::NoTextSelected => {
              write!(f, "No text selected.")
            }
          , Error::NetworkFailure(msg) => {
              write!(f, "Network failure: {}", msg)
            }
          , Error::BackendStatusError { status, message } => {
              write!(f, "Backend error {}: {}", status, message)
            }
          , Error::MalformedResponse(msg) => {
              write!(f, "Malformed response: {}", msg)
            }
          , Error::UnknownTask(task) => {
              write!(f, "Unknown LLM task: {}", task)
            }
          , Error::Timeout => {
              write!(f, "Request timed out")
            }
          , Error::Disconnected(what) => {
              write!(f, "{} disconnected", what)
            }
          , Error::Io(msg) => {
              write!(f, "I/O error: {}", msg)
            }
          , Error::Other(msg) => {
              write!(f, "{}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error
{   fn from(e: reqwest::Error) -> Self
    {   if e.is_timeout()
        {   Error::Timeout
        } else if e.is_decode()
        {   Error::MalformedResponse(e.to_string())
        } else
        {   Error::NetworkFailure(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error
{   fn from(e: std::io::Error) -> Self
    {   Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error
{   fn from(e: serde_json::Error) -> Self
    {   Error::Io(format!("invalid settings: {}", e))
    }
}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}
