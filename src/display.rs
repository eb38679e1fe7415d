use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};
use log::{debug, trace, error, info};

use crate::{Delivery, DisplayMessage, OverlayEvent, RelayMessage, TabId};

/// Who wrote a line in the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author
{   Llm
  , User
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine
{   pub author: Author
  , pub text: String
}

impl ChatLine
{   pub fn llm(text: impl Into<String>) -> Self
    {   ChatLine { author: Author::Llm, text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self
    {   ChatLine { author: Author::User, text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason
{   Closed
  , Inactivity
}

/// `Absent` is represented by the tab having no widget at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState
{   Open
  , OpenAwaitingReply
}

/// Read-only copy of a widget, for inspection
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetView
{   pub state: WidgetState
  , pub original_text: String
  , pub lines: Vec<ChatLine>
}

struct Widget
{   state: WidgetState
  , original_text: String
  , lines: Vec<ChatLine>
  , deadline: Instant
}

/// User-side input to the display
pub enum DisplayCommand
{   Keystroke
    {   tab: TabId
    }
  , Send
    {   tab: TabId
      , text: String
    }
  , Close
    {   tab: TabId
    }
  , Reload
    {   tab: TabId
    }
  , Snapshot
    {   tab: TabId
      , reply: mpsc::UnboundedSender<Option<WidgetView>>
    }
  , Shutdown(crate::KillProcessReplySender)
}

/// All widgets of the display, keyed by tab
struct DisplayState
{   widgets: HashMap<TabId, Widget>
  , timeout: Duration
  , relay_tx: mpsc::UnboundedSender<RelayMessage>
  , overlay_tx: mpsc::UnboundedSender<OverlayEvent>
}

impl DisplayState
{   fn emit(&self, event: OverlayEvent)
    {   if self.overlay_tx.send(event).is_err()
        {   trace!("Overlay receiver gone");
        }
    }

    fn next_deadline(&self) -> Option<Instant>
    {   self.widgets.values().map(|w| w.deadline).min()
    }

    fn touch(&mut self, tab: TabId) -> bool
    {   let deadline = Instant::now() + self.timeout;
        match self.widgets.get_mut(&tab)
        {   Some(widget) => {
              widget.deadline = deadline;
              true
            }
          , None => false
        }
    }

    fn push_line(&mut self, tab: TabId, line: ChatLine)
    {   if let Some(widget) = self.widgets.get_mut(&tab)
        {   widget.lines.push(line.clone());
            self.emit(OverlayEvent::Line { tab, line });
        }
    }

    fn remove(&mut self, tab: TabId, reason: RemovalReason)
    {   if self.widgets.remove(&tab).is_some()
        {   info!("Removing widget on tab {} ({:?})", tab, reason);
            self.emit(OverlayEvent::Removed { tab, reason });
        }
    }

    fn expire_due(&mut self, now: Instant)
    {   let due: Vec<TabId> = self.widgets
          .iter()
          .filter(|(_, w)| w.deadline <= now)
          .map(|(tab, _)| *tab)
          .collect();
        for tab in due
        {   self.remove(tab, RemovalReason::Inactivity);
        }
    }

    /// Create the widget, or append to the one already open
    fn open(&mut self, tab: TabId, text: String, original_text: String)
    {   let deadline = Instant::now() + self.timeout;
        match self.widgets.get_mut(&tab)
        {   Some(widget) => {
              debug!("Widget already open on tab {}, appending", tab);
              widget.original_text = original_text;
              widget.deadline = deadline;
            }
          , None => {
              debug!("Opening widget on tab {}", tab);
              self.widgets.insert(tab, Widget
              {   state: WidgetState::Open
                , original_text
                , lines: vec![]
                , deadline
              });
              self.emit(OverlayEvent::Opened { tab });
            }
        }
        if !text.is_empty()
        {   self.push_line(tab, ChatLine::llm(text));
        }
    }

    fn reply(&mut self, tab: TabId, text: String)
    {   match self.widgets.get_mut(&tab)
        {   Some(widget) => {
              widget.state = WidgetState::Open;
              self.touch(tab);
              self.push_line(tab, ChatLine::llm(text));
            }
          , None => {
              debug!("No widget on tab {}, reply dropped", tab);
            }
        }
    }

    fn handle_message(&mut self, msg: DisplayMessage)
    {   match msg
        {   DisplayMessage::DeliverResult
            {   tab, delivery: Delivery::Open, text, original_text
            } => self.open(tab, text, original_text)
          , DisplayMessage::DeliverError
            {   tab, delivery: Delivery::Open, message
            } => self.open(tab, message, String::new())
          , DisplayMessage::DeliverResult
            {   tab, delivery: Delivery::Reply, text, ..
            } => self.reply(tab, text)
          , DisplayMessage::DeliverError
            {   tab, delivery: Delivery::Reply, message
            } => self.reply(tab, message)
        }
    }

    fn send(&mut self, tab: TabId, text: String)
    {   let question = text.trim().to_string();
        if question.is_empty()
        {   return;
        }
        let context = match self.widgets.get_mut(&tab)
        {   Some(widget) => {
              widget.state = WidgetState::OpenAwaitingReply;
              widget.original_text.clone()
            }
          , None => {
              debug!("Send on tab {} without a widget", tab);
              return;
            }
        };
        self.push_line(tab, ChatLine::user(question.clone()));
        self.touch(tab);

        let query = RelayMessage::ChatQuery
        {   tab
          , question
          , context
        };
        if self.relay_tx.send(query).is_err()
        {   error!("Relay gone, cannot forward question");
            if let Some(widget) = self.widgets.get_mut(&tab)
            {   widget.state = WidgetState::Open;
            }
            self.push_line(
              tab,
              ChatLine::llm("LLM Error: relay disconnected")
            );
        }
    }

    fn reload(&mut self, tab: TabId)
    {   if let Some(widget) = self.widgets.get_mut(&tab)
        {   widget.lines.clear();
            self.touch(tab);
            self.emit(OverlayEvent::Cleared { tab });
        }
    }

    fn view(&self, tab: TabId) -> Option<WidgetView>
    {   self.widgets.get(&tab).map(|w| WidgetView
        {   state: w.state
          , original_text: w.original_text.clone()
          , lines: w.lines.clone()
        })
    }
}

/// Sender side of the display
#[derive(Clone)]
pub struct DisplayHand
{   pub tx: mpsc::UnboundedSender<DisplayCommand>
}

impl DisplayHand
{   fn send(&self, cmd: DisplayCommand)
      -> Result<(), crate::error::Error>
    {   self.tx.send(cmd).map_err(|_| {
          error!("Display channel closed");
          crate::error::Error::Disconnected("Display".to_string())
        })
    }

    pub fn keystroke(&self, tab: TabId)
      -> Result<(), crate::error::Error>
    {   self.send(DisplayCommand::Keystroke { tab })
    }

    pub fn send_question(&self, tab: TabId, text: impl Into<String>)
      -> Result<(), crate::error::Error>
    {   self.send(DisplayCommand::Send { tab, text: text.into() })
    }

    pub fn close(&self, tab: TabId)
      -> Result<(), crate::error::Error>
    {   self.send(DisplayCommand::Close { tab })
    }

    pub fn reload(&self, tab: TabId)
      -> Result<(), crate::error::Error>
    {   self.send(DisplayCommand::Reload { tab })
    }

    /// Current widget of a tab, `None` when absent
    pub async fn snapshot(&self, tab: TabId)
      -> Result<Option<WidgetView>, crate::error::Error>
    {   let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        self.send(DisplayCommand::Snapshot { tab, reply: reply_tx })?;
        reply_rx.recv().await.ok_or_else(|| {
          crate::error::Error::Disconnected("Display".to_string())
        })
    }
}

/// Public display - owns the task
pub struct Display
{   hand: DisplayHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl Display
{   pub fn new(
      config: crate::config::WidgetConfig
    , inbound: mpsc::UnboundedReceiver<DisplayMessage>
    , relay_tx: mpsc::UnboundedSender<RelayMessage>
    , overlay_tx: mpsc::UnboundedSender<OverlayEvent>
    ) -> Self
    {   debug!("Creating Display");
        let (tx, rx) = mpsc::unbounded_channel();
        let state = DisplayState
        {   widgets: HashMap::new()
          , timeout: config.inactivity_timeout()
          , relay_tx
          , overlay_tx
        };
        let _task_handle = tokio::spawn(async move {
          run_display_loop(state, inbound, rx).await
        });
        Display
        {   hand: DisplayHand { tx }
          , _task_handle
        }
    }

    pub fn hand(&self) -> DisplayHand
    {   self.hand.clone()
    }

    pub async fn shutdown(self) -> Result<(), crate::error::Error>
    {   debug!("Shutting down Display");
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        self.hand.send(DisplayCommand::Shutdown(reply_tx))?;
        reply_rx.recv().await.unwrap_or(Err(
          crate::error::Error::Disconnected("Display".to_string())
        ))
    }
}

enum Event
{   Message(DisplayMessage)
  , Command(DisplayCommand)
  , Tick
}

/// Main display event loop. Expired widgets are dropped before any
/// event is handled, so nothing reaches a widget past its deadline.
async fn run_display_loop(
  mut state: DisplayState
, mut inbound: mpsc::UnboundedReceiver<DisplayMessage>
, mut commands: mpsc::UnboundedReceiver<DisplayCommand>
)
{   debug!("Starting Display event loop");
    loop
    { let next = state.next_deadline();
      let wake = next.unwrap_or_else(|| {
        Instant::now() + Duration::from_secs(3600)
      });

      // Deliveries first, so a result queued before a user command
      // is on screen when that command runs
      let event = tokio::select!
      { biased;
        Some(msg) = inbound.recv() => Event::Message(msg)
      , Some(cmd) = commands.recv() => Event::Command(cmd)
      , _ = sleep_until(wake), if next.is_some() => Event::Tick
      , else => {
          debug!("Display channels closed");
          break;
        }
      };

      state.expire_due(Instant::now());

      match event
      {   Event::Tick => {}
        , Event::Message(msg) => {
            trace!("Display message: {:?}", msg);
            state.handle_message(msg);
          }
        , Event::Command(DisplayCommand::Keystroke { tab }) => {
            state.touch(tab);
          }
        , Event::Command(DisplayCommand::Send { tab, text }) => {
            state.send(tab, text);
          }
        , Event::Command(DisplayCommand::Close { tab }) => {
            state.remove(tab, RemovalReason::Closed);
          }
        , Event::Command(DisplayCommand::Reload { tab }) => {
            state.reload(tab);
          }
        , Event::Command(DisplayCommand::Snapshot { tab, reply }) => {
            let _ = reply.send(state.view(tab));
          }
        , Event::Command(DisplayCommand::Shutdown(reply)) => {
            let _ = reply.send(Ok(()));
            info!("Display shutting down");
            break;
          }
      }
    }
}
