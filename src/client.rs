use tokio::sync::mpsc;
use log::{debug, trace, error, info, warn};

use crate::config::BackendConfig;
use crate::providers::{CloudClient, LocalClient};

/// Sender side of the llm client; cheap to clone, one per trigger
#[derive(Clone)]
pub struct LlmHand
{   pub invoke_tx: mpsc::UnboundedSender<crate::InvokeArgs>
  , pub kill_process_tx
      : mpsc::UnboundedSender<crate::KillProcessArgs>
}

/// Receiver side of the llm client
pub struct LlmFoot
{   pub invoke_rx: mpsc::UnboundedReceiver<crate::InvokeArgs>
  , pub kill_process_rx
      : mpsc::UnboundedReceiver<crate::KillProcessArgs>
}

impl LlmHand
{   /// Fresh hand/foot pair; the foot goes to whatever serves calls
    pub fn channel() -> (LlmHand, LlmFoot)
    {   let (invoke_tx, invoke_rx) = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();
        ( LlmHand { invoke_tx, kill_process_tx }
        , LlmFoot { invoke_rx, kill_process_rx }
        )
    }

    /// Queue one call and wait for its outcome
    pub async fn invoke(
      &self
    , request: crate::request::LlmRequest
    ) -> crate::InvokeReply
    {   trace!("invoke queuing {}", request.task);
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();

        self.invoke_tx
          .send(crate::InvokeArgs
          {   request
            , reply: reply_tx
          })
          .map_err(|_| {
            error!("LLM client channel closed");
            crate::error::Error::Disconnected(
              "LLM client".to_string()
            )
          })?;

        match reply_rx.recv().await
        {   Some(result) => result
          , None => {
              error!("LLM client dropped the reply");
              Err(crate::error::Error::Disconnected(
                "LLM client".to_string()
              ))
            }
        }
    }

    /// Invoke and wrap the outcome with its task kind
    pub async fn respond(
      &self
    , request: crate::request::LlmRequest
    ) -> crate::request::LlmResponse
    {   let task = request.task;
        crate::request::LlmResponse
        {   task
          , result: self.invoke(request).await
        }
    }
}

/// Per-loop state: one pooled HTTP client shared by both backends
#[derive(Clone)]
pub struct LlmClientState
{   pub cloud: CloudClient
  , pub local: LocalClient
}

impl LlmClientState
{   pub fn new(config: &crate::config::ClientConfig) -> Self
    {   debug!(
          "Initializing LlmClientState, timeout {}s",
          config.timeout_secs
        );
        let http_client = reqwest::Client::builder()
          .timeout(config.timeout())
          .build()
          .unwrap_or_else(|e| {
            warn!("HTTP client builder failed ({}), using defaults", e);
            reqwest::Client::new()
          });
        LlmClientState
        {   cloud: CloudClient::new(http_client.clone())
          , local: LocalClient::new(http_client, config)
        }
    }

    /// Exactly one network call, no retry
    pub async fn handle_invoke(
      &self
    , request: crate::request::LlmRequest
    ) -> crate::InvokeReply
    {   match &request.backend
        {   BackendConfig::Cloud { api_base, api_key } => {
              self.cloud
                .handle_invoke(
                  api_base,
                  api_key,
                  &request.text,
                  request.task,
                  &request.target_language
                )
                .await
            }
          , BackendConfig::Local { endpoint, model } => {
              self.local
                .handle_invoke(
                  endpoint,
                  model,
                  &request.text,
                  request.task,
                  &request.target_language
                )
                .await
            }
        }
    }
}

/// Public llm client - owns the task
pub struct LlmClient
{   hand: LlmHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl LlmClient
{   /// Create and spawn a new llm client
    /// Returns immediately - spawns background task
    pub fn new(config: crate::config::ClientConfig) -> Self
    {   debug!("Creating LlmClient with task ownership");
        let (hand, foot) = LlmHand::channel();

        let _task_handle = tokio::spawn(async move {
          run_llm_loop(foot, config).await
        });

        LlmClient
        {   hand
          , _task_handle
        }
    }

    pub fn hand(&self) -> LlmHand
    {   self.hand.clone()
    }

    pub async fn invoke(
      &self
    , request: crate::request::LlmRequest
    ) -> crate::InvokeReply
    {   self.hand.invoke(request).await
    }

    /// Gracefully shutdown the client
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down LlmClient");
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();

        self.hand.kill_process_tx
          .send(crate::KillProcessArgs { reply: reply_tx })
          .map_err(|_| {
            error!("LLM client channel already closed");
            crate::error::Error::Disconnected(
              "LLM client".to_string()
            )
          })?;

        if let Some(result) = reply_rx.recv().await
        {   debug!("LLM client shutdown confirmed");
            result
        } else
        {   error!("LLM client shutdown unconfirmed");
            Err(crate::error::Error::Timeout)
        }
    }
}

/// Main llm client event loop
///
/// Each invocation runs on its own task so a slow backend call
/// never delays an unrelated trigger.
async fn run_llm_loop(
  foot: LlmFoot
, config: crate::config::ClientConfig
)
{   debug!("Starting LlmClient event loop");
    let state = LlmClientState::new(&config);
    let LlmFoot
    {   mut invoke_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = invoke_rx.recv() => {
          debug!("Received Invoke for task: {}", cmd.request.task);
          let state = state.clone();
          tokio::spawn(async move {
            let result = state.handle_invoke(cmd.request).await;
            if cmd.reply.send(result).is_err()
            {   debug!("Invoke reply dropped, caller gone");
            }
          });
        }
      , Some(cmd) = kill_process_rx.recv() => {
          debug!("Received KillProcess");
          let _ = cmd.reply.send(Ok(()));
          info!("LlmClient shutting down");
          break;
        }
      , else => {
          debug!("All LlmClient senders dropped");
          break;
        }
      }
    }
}
