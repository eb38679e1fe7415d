pub mod error;
pub mod config;
pub mod request;
pub mod language;
pub mod providers;
pub mod client;
pub mod relay;
pub mod display;
pub mod extension;

pub use client::{LlmClient, LlmHand};
pub use config::{BackendConfig, Settings, SettingsStore, PIVOT_LANGUAGE};
pub use display::{Display, DisplayHand};
pub use error::Error;
pub use extension::Simplifai;
pub use relay::{Relay, RelayHand};
pub use request::{LlmRequest, LlmResponse, TaskKind};

/*

SimplifAI: select text on a page, have a language model simplify or
translate it, then chat about it in a floating widget.

Three contexts, each an actor on its own tokio task, talking only
through the typed messages below:

  display  --RelayMessage-->   relay  --InvokeArgs-->  llm client
  display  <--DisplayMessage-- relay  <--InvokeReply-- llm client
  display  --OverlayEvent-->   host page

*/

/// Browser tab a widget lives in
pub type TabId = u32;

// ===== Invoke (relay -> llm client) =====

pub type InvokeReply = Result<String, crate::error::Error>;
pub type InvokeReplySender
  = tokio::sync::mpsc::UnboundedSender<InvokeReply>;

pub struct InvokeArgs
{   pub request: crate::request::LlmRequest
  , pub reply: InvokeReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== Relay bus (display/options -> relay) =====

#[derive(Debug, Clone)]
pub enum RelayMessage
{   /// Context-menu selection on a tab
    Trigger
    {   tab: TabId
      , selection: Option<String>
    }
  , /// Follow-up question typed into a widget
    ChatQuery
    {   tab: TabId
      , question: String
      , context: String
    }
  , /// Settings saved from the options page
    SettingsChanged(crate::config::Settings)
  , Shutdown(KillProcessReplySender)
}

// ===== Display bus (relay -> display) =====

/// How a delivery lands in the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery
{   /// Result of a selection trigger; opens the widget if needed
    Open
  , /// Answer to a chat question; dropped if no widget is open
    Reply
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayMessage
{   DeliverResult
    {   tab: TabId
      , delivery: Delivery
      , text: String
      , original_text: String
    }
  , DeliverError
    {   tab: TabId
      , delivery: Delivery
      , message: String
    }
}

// ===== Overlay (display -> host page) =====

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent
{   Opened
    {   tab: TabId
    }
  , Line
    {   tab: TabId
      , line: crate::display::ChatLine
    }
  , Cleared
    {   tab: TabId
    }
  , Removed
    {   tab: TabId
      , reason: crate::display::RemovalReason
    }
}
