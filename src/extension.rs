//! Wiring of the three contexts into one running extension

use tokio::sync::mpsc;
use log::debug;

use crate::client::{LlmClient, LlmHand};
use crate::config::{ClientConfig, Settings, SettingsStore, WidgetConfig};
use crate::display::{Display, DisplayHand, WidgetView};
use crate::relay::{Relay, RelayHand};
use crate::{OverlayEvent, TabId};

/// A running extension: llm client, relay and display actors
pub struct Simplifai
{   llm: Option<LlmClient>
  , relay: Relay
  , display: Display
}

impl Simplifai
{   /// Spawn everything against real HTTP backends
    pub fn new(
      store: SettingsStore
    , client_config: ClientConfig
    , widget_config: WidgetConfig
    ) -> (Self, mpsc::UnboundedReceiver<OverlayEvent>)
    {   let llm = LlmClient::new(client_config);
        let (mut simplifai, overlay_rx)
          = Self::with_llm(store, llm.hand(), widget_config);
        simplifai.llm = Some(llm);
        (simplifai, overlay_rx)
    }

    /// Spawn relay and display against any llm hand
    pub fn with_llm(
      store: SettingsStore
    , llm: LlmHand
    , widget_config: WidgetConfig
    ) -> (Self, mpsc::UnboundedReceiver<OverlayEvent>)
    {   debug!("Wiring Simplifai");
        let (display_tx, display_rx) = mpsc::unbounded_channel();
        let (overlay_tx, overlay_rx) = mpsc::unbounded_channel();

        let relay = Relay::new(store, llm, display_tx);
        let display = Display::new(
          widget_config,
          display_rx,
          relay.hand().tx,
          overlay_tx
        );

        ( Simplifai
          {   llm: None
            , relay
            , display
          }
        , overlay_rx
        )
    }

    pub fn relay(&self) -> RelayHand
    {   self.relay.hand()
    }

    pub fn display(&self) -> DisplayHand
    {   self.display.hand()
    }

    /// Context-menu click with whatever the page had selected
    pub fn trigger(&self, tab: TabId, selection: Option<String>)
      -> Result<(), crate::error::Error>
    {   self.relay.hand().trigger(tab, selection)
    }

    pub fn update_settings(&self, settings: Settings)
      -> Result<(), crate::error::Error>
    {   self.relay.hand().update_settings(settings)
    }

    pub async fn snapshot(&self, tab: TabId)
      -> Result<Option<WidgetView>, crate::error::Error>
    {   self.display.hand().snapshot(tab).await
    }

    /// Stop display first so no new questions reach the relay
    pub async fn shutdown(self) -> Result<(), crate::error::Error>
    {   self.display.shutdown().await?;
        self.relay.shutdown().await?;
        if let Some(llm) = self.llm
        {   llm.shutdown().await?;
        }
        Ok(())
    }
}
