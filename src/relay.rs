use tokio::sync::mpsc;
use log::{debug, trace, error, info, warn};

use crate::config::{BackendConfig, Settings, PIVOT_LANGUAGE};
use crate::language::same_language;
use crate::request::{LlmRequest, TaskKind};
use crate::{Delivery, DisplayMessage, RelayMessage, TabId};

/// Lifecycle of one selection trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState
{   Idle
  , AwaitingSettings
  , Processing
  , Done
  , Failed
}

/// Final text of a successful flow, with the text it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Processed
{   pub text: String
  , pub original_text: String
}

/// One selection trigger, from captured text to a deliverable result.
/// Owns all of its state; nothing is shared with other triggers.
#[derive(Debug)]
pub struct TriggerFlow
{   tab: TabId
  , selection: Option<String>
  , state: FlowState
  , transitions: Vec<FlowState>
}

impl TriggerFlow
{   pub fn new(tab: TabId, selection: Option<String>) -> Self
    {   TriggerFlow
        {   tab
          , selection
          , state: FlowState::Idle
          , transitions: vec![FlowState::Idle]
        }
    }

    pub fn state(&self) -> FlowState
    {   self.state
    }

    /// Every state visited so far, in order
    pub fn transitions(&self) -> &[FlowState]
    {   &self.transitions
    }

    fn transition(&mut self, next: FlowState)
    {   trace!("Tab {} flow {:?} -> {:?}", self.tab, self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    fn fail(&mut self, e: crate::error::Error)
      -> Result<Processed, crate::error::Error>
    {   warn!("Tab {} flow failed: {}", self.tab, e);
        self.transition(FlowState::Failed);
        Err(e)
    }

    /// Drive the flow to `Done` or `Failed`
    pub async fn run(
      &mut self
    , settings: &Settings
    , llm: &crate::client::LlmHand
    ) -> Result<Processed, crate::error::Error>
    {   let text = match self.selection.take()
        {   Some(text) if !text.trim().is_empty() => text
          , _ => return self.fail(crate::error::Error::NoTextSelected)
        };
        info!("Text received for processing in tab {}", self.tab);

        self.transition(FlowState::AwaitingSettings);
        if let Err(e) = settings.backend.validate()
        {   return self.fail(e);
        }

        self.transition(FlowState::Processing);
        match process_text(&text, settings, llm).await
        {   Ok(result) => {
              self.transition(FlowState::Done);
              Ok(Processed
              {   text: result
                , original_text: text
              })
            }
          , Err(e) => self.fail(e)
        }
    }
}

/// Backend-dependent call sequence for selected text.
/// The first failing call ends the sequence; nothing partial escapes.
pub async fn process_text(
  text: &str
, settings: &Settings
, llm: &crate::client::LlmHand
) -> Result<String, crate::error::Error>
{   let target = settings.default_language.as_str();
    let backend = &settings.backend;
    match backend
    {   BackendConfig::Cloud { .. } => {
          debug!("Cloud simplification, target {}", target);
          let simplified = llm
            .invoke(LlmRequest::new(
              text, TaskKind::Simplify, PIVOT_LANGUAGE, backend.clone()
            ))
            .await?;
          if same_language(target, PIVOT_LANGUAGE)
          {   return Ok(simplified);
          }
          llm.invoke(LlmRequest::new(
              simplified, TaskKind::Translate, target, backend.clone()
            ))
            .await
        }
      , BackendConfig::Local { .. } => {
          let detected = llm
            .invoke(LlmRequest::new(
              text, TaskKind::DetectLanguage, target, backend.clone()
            ))
            .await?;
          debug!("Detected language {}, target {}", detected, target);
          let task = if same_language(&detected, PIVOT_LANGUAGE)
            || same_language(&detected, target)
          {   TaskKind::Simplify
          } else
          {   TaskKind::Translate
          };
          llm.invoke(LlmRequest::new(text, task, target, backend.clone()))
            .await
        }
    }
}

/// Prompt for one chat turn; only the original text carries context
pub fn chat_prompt(
  context: &str
, question: &str
, language: &str
) -> String
{   format!(
      "Given the following original text: \"{}\", answer the \
       following question: \"{}\" in {}.",
      context, question, language
    )
}

/// One follow-up question, one call
pub async fn run_chat_turn(
  question: &str
, context: &str
, settings: &Settings
, llm: &crate::client::LlmHand
) -> Result<String, crate::error::Error>
{   settings.backend.validate()?;
    let prompt = chat_prompt(context, question, &settings.default_language);
    llm.invoke(LlmRequest::new(
        prompt,
        TaskKind::ChatTurn,
        settings.default_language.clone(),
        settings.backend.clone()
      ))
      .await
}

/// Sender side of the relay
#[derive(Clone)]
pub struct RelayHand
{   pub tx: mpsc::UnboundedSender<RelayMessage>
}

impl RelayHand
{   pub fn send(&self, msg: RelayMessage)
      -> Result<(), crate::error::Error>
    {   self.tx.send(msg).map_err(|_| {
          error!("Relay channel closed");
          crate::error::Error::Disconnected("Relay".to_string())
        })
    }

    pub fn trigger(&self, tab: TabId, selection: Option<String>)
      -> Result<(), crate::error::Error>
    {   self.send(RelayMessage::Trigger { tab, selection })
    }

    pub fn update_settings(&self, settings: Settings)
      -> Result<(), crate::error::Error>
    {   self.send(RelayMessage::SettingsChanged(settings))
    }
}

/// Public relay - owns the task
pub struct Relay
{   hand: RelayHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl Relay
{   pub fn new(
      store: crate::config::SettingsStore
    , llm: crate::client::LlmHand
    , display_tx: mpsc::UnboundedSender<DisplayMessage>
    ) -> Self
    {   debug!("Creating Relay");
        let (tx, rx) = mpsc::unbounded_channel();
        let _task_handle = tokio::spawn(async move {
          run_relay_loop(rx, store, llm, display_tx).await
        });
        Relay
        {   hand: RelayHand { tx }
          , _task_handle
        }
    }

    pub fn hand(&self) -> RelayHand
    {   self.hand.clone()
    }

    pub async fn shutdown(self) -> Result<(), crate::error::Error>
    {   debug!("Shutting down Relay");
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        self.hand.send(RelayMessage::Shutdown(reply_tx))?;
        reply_rx.recv().await.unwrap_or(Err(
          crate::error::Error::Disconnected("Relay".to_string())
        ))
    }
}

fn deliver(
  display_tx: &mpsc::UnboundedSender<DisplayMessage>
, msg: DisplayMessage
)
{   // A closed display is a silent no-op
    if display_tx.send(msg).is_err()
    {   debug!("Display gone, delivery dropped");
    }
}

/// Main relay event loop; every trigger and chat query gets its
/// own task and a snapshot of the settings current at arrival.
async fn run_relay_loop(
  mut rx: mpsc::UnboundedReceiver<RelayMessage>
, store: crate::config::SettingsStore
, llm: crate::client::LlmHand
, display_tx: mpsc::UnboundedSender<DisplayMessage>
)
{   debug!("Starting Relay event loop");
    while let Some(msg) = rx.recv().await
    { match msg
      {   RelayMessage::Trigger { tab, selection } => {
            debug!("Received Trigger for tab {}", tab);
            let settings = store.snapshot();
            let llm = llm.clone();
            let display_tx = display_tx.clone();
            tokio::spawn(async move {
              let mut flow = TriggerFlow::new(tab, selection);
              let msg = match flow.run(&settings, &llm).await
              {   Ok(done) => {
                    info!("Sending result to tab {}", tab);
                    DisplayMessage::DeliverResult
                    {   tab
                      , delivery: Delivery::Open
                      , text: done.text
                      , original_text: done.original_text
                    }
                  }
                , Err(e) => DisplayMessage::DeliverError
                  {   tab
                    , delivery: Delivery::Open
                    , message: e.user_message()
                  }
              };
              deliver(&display_tx, msg);
            });
          }
        , RelayMessage::ChatQuery { tab, question, context } => {
            debug!("Received ChatQuery for tab {}", tab);
            let settings = store.snapshot();
            let llm = llm.clone();
            let display_tx = display_tx.clone();
            tokio::spawn(async move {
              let msg = match run_chat_turn(
                &question, &context, &settings, &llm
              ).await
              {   Ok(text) => DisplayMessage::DeliverResult
                  {   tab
                    , delivery: Delivery::Reply
                    , text
                    , original_text: context
                  }
                , Err(e) => {
                    error!("Chat turn failed for tab {}: {}", tab, e);
                    DisplayMessage::DeliverError
                    {   tab
                      , delivery: Delivery::Reply
                      , message: e.user_message()
                    }
                  }
              };
              deliver(&display_tx, msg);
            });
          }
        , RelayMessage::SettingsChanged(settings) => {
            debug!("Received SettingsChanged");
            if let Err(e) = store.save(settings).await
            {   error!("Failed to persist settings: {}", e);
            }
          }
        , RelayMessage::Shutdown(reply) => {
            let _ = reply.send(Ok(()));
            info!("Relay shutting down");
            break;
          }
      }
    }
}
