//! Terminal stand-in for the browser extension.
//!
//! `simplifai <selected text>` runs a selection trigger, prints the
//! widget, then forwards each stdin line as a follow-up question.
//! `simplifai invoke <task> <text>` runs a single LLM call.

use std::io::Write;

use log::{debug, error, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use simplifai::config::{ClientConfig, SettingsStore, WidgetConfig};
use simplifai::display::{Author, RemovalReason};
use simplifai::{LlmClient, LlmRequest, OverlayEvent, Simplifai, TaskKind};

const TAB: simplifai::TabId = 1;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>>
{   env_logger::init();

    let settings_path = std::env::var("SIMPLIFAI_SETTINGS")
      .unwrap_or_else(|_| "simplifai.json".to_string());
    let store = SettingsStore::load(settings_path)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("invoke")
    {   return invoke(store, &args[1..]).await;
    }

    let selection = Some(args.join(" "));
    let (simplifai, mut overlay_rx) = Simplifai::new(
      store,
      ClientConfig::default(),
      WidgetConfig::default()
    );
    simplifai.trigger(TAB, selection)?;

    let display = simplifai.display();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop
    { tokio::select!
      { Some(event) = overlay_rx.recv() => {
          if !render(event)
          {   break;
          }
        }
      , line = lines.next_line(), if stdin_open => {
          match line
          {   Ok(Some(text)) => {
                display.keystroke(TAB)?;
                display.send_question(TAB, text)?;
              }
            , Ok(None) => {
                debug!("stdin closed");
                stdin_open = false;
              }
            , Err(e) => {
                error!("stdin error: {}", e);
                stdin_open = false;
              }
          }
        }
      , else => break
      }
    }

    simplifai.shutdown().await?;
    Ok(())
}

/// Print one overlay event; false once the widget is gone
fn render(event: OverlayEvent) -> bool
{   match event
    {   OverlayEvent::Opened { .. } => {
          println!("--- SimplifAI Chat ---");
        }
      , OverlayEvent::Line { line, .. } => {
          match line.author
          {   Author::Llm => println!("LLM: {}", line.text)
            , Author::User => println!("You: {}", line.text)
          }
        }
      , OverlayEvent::Cleared { .. } => {
          println!("--- cleared ---");
        }
      , OverlayEvent::Removed { reason, .. } => {
          match reason
          {   RemovalReason::Inactivity => {
                println!("--- closed after inactivity ---")
              }
            , RemovalReason::Closed => println!("--- closed ---")
          }
          return false;
        }
    }
    if let Err(e) = std::io::stdout().flush()
    {   warn!("stdout flush failed: {}", e);
    }
    true
}

async fn invoke(
  store: SettingsStore
, args: &[String]
) -> Result<(), Box<dyn std::error::Error>>
{   let task: TaskKind = args
      .first()
      .ok_or("usage: simplifai invoke <task> <text>")?
      .parse()?;
    let text = args[1..].join(" ");
    let settings = store.snapshot();
    settings.backend.validate()?;

    let client = LlmClient::new(ClientConfig::default());
    let response = client
      .hand()
      .respond(LlmRequest::new(
        text,
        task,
        settings.default_language.clone(),
        settings.backend.clone()
      ))
      .await;
    client.shutdown().await?;

    debug!("{} finished", response.task);
    println!("{}", response.result?);
    Ok(())
}
