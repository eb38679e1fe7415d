use std::time::Duration;

use tokio::sync::mpsc;
use tokio_test::assert_ok;

use simplifai::config::WidgetConfig;
use simplifai::display::{ChatLine, RemovalReason, WidgetState};
use simplifai::{
  Delivery, Display, DisplayHand, DisplayMessage, OverlayEvent, RelayMessage
};

struct Harness
{   display: Display
  , hand: DisplayHand
  , inbound: mpsc::UnboundedSender<DisplayMessage>
  , relay_rx: mpsc::UnboundedReceiver<RelayMessage>
  , overlay_rx: mpsc::UnboundedReceiver<OverlayEvent>
}

fn harness() -> Harness
{   let (inbound, inbound_rx) = mpsc::unbounded_channel();
    let (relay_tx, relay_rx) = mpsc::unbounded_channel();
    let (overlay_tx, overlay_rx) = mpsc::unbounded_channel();
    let display = Display::new(
      WidgetConfig::default(),
      inbound_rx,
      relay_tx,
      overlay_tx
    );
    let hand = display.hand();
    Harness { display, hand, inbound, relay_rx, overlay_rx }
}

fn open(tab: u32, text: &str, original: &str) -> DisplayMessage
{   DisplayMessage::DeliverResult
    {   tab
      , delivery: Delivery::Open
      , text: text.to_string()
      , original_text: original.to_string()
    }
}

fn reply(tab: u32, text: &str) -> DisplayMessage
{   DisplayMessage::DeliverResult
    {   tab
      , delivery: Delivery::Reply
      , text: text.to_string()
      , original_text: String::new()
    }
}

#[tokio::test(start_paused = true)]
async fn test_open_renders_first_message()
{   let mut h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple text.", "Hard text.")));

    let view = h.hand.snapshot(1).await.unwrap().unwrap();
    assert_eq!(view.state, WidgetState::Open);
    assert_eq!(view.original_text, "Hard text.");
    assert_eq!(view.lines, vec![ChatLine::llm("Simple text.")]);

    assert_eq!(h.overlay_rx.recv().await, Some(OverlayEvent::Opened { tab: 1 }));
    assert_eq!(
      h.overlay_rx.recv().await,
      Some(OverlayEvent::Line { tab: 1, line: ChatLine::llm("Simple text.") })
    );
    assert_ok!(h.display.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn test_second_open_appends()
{   let h = harness();
    assert_ok!(h.inbound.send(open(1, "R1", "first")));
    assert_ok!(h.inbound.send(open(1, "R2", "second")));

    let view = h.hand.snapshot(1).await.unwrap().unwrap();
    assert_eq!(view.lines, vec![ChatLine::llm("R1"), ChatLine::llm("R2")]);
    assert_eq!(view.original_text, "second");
}

#[tokio::test(start_paused = true)]
async fn test_error_open_clears_context()
{   let h = harness();
    assert_ok!(h.inbound.send(open(1, "R1", "first")));
    assert_ok!(h.inbound.send(DisplayMessage::DeliverError
    {   tab: 1
      , delivery: Delivery::Open
      , message: "Error: Request timed out".to_string()
    }));

    let view = h.hand.snapshot(1).await.unwrap().unwrap();
    assert_eq!(view.original_text, "");
    assert_eq!(
      view.lines,
      vec![ChatLine::llm("R1"), ChatLine::llm("Error: Request timed out")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_widgets_are_per_tab()
{   let h = harness();
    assert_ok!(h.inbound.send(open(1, "one", "a")));
    assert_ok!(h.inbound.send(open(2, "two", "b")));

    let one = h.hand.snapshot(1).await.unwrap().unwrap();
    let two = h.hand.snapshot(2).await.unwrap().unwrap();
    assert_eq!(one.lines, vec![ChatLine::llm("one")]);
    assert_eq!(two.lines, vec![ChatLine::llm("two")]);
    assert_eq!(h.hand.snapshot(3).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_send_forwards_question_with_context()
{   let mut h = harness();
    assert_ok!(h.inbound.send(open(4, "Simple.", "Original.")));
    assert_ok!(h.hand.send_question(4, "  What does it mean?\n"));

    match h.relay_rx.recv().await
    {   Some(RelayMessage::ChatQuery { tab, question, context }) => {
          assert_eq!(tab, 4);
          assert_eq!(question, "What does it mean?");
          assert_eq!(context, "Original.");
        }
      , other => panic!("unexpected relay message: {:?}", other)
    }

    let view = h.hand.snapshot(4).await.unwrap().unwrap();
    assert_eq!(view.state, WidgetState::OpenAwaitingReply);
    assert_eq!(view.lines[1], ChatLine::user("What does it mean?"));

    assert_ok!(h.inbound.send(reply(4, "It means this.")));
    let view = h.hand.snapshot(4).await.unwrap().unwrap();
    assert_eq!(view.state, WidgetState::Open);
    assert_eq!(view.lines[2], ChatLine::llm("It means this."));
}

#[tokio::test(start_paused = true)]
async fn test_blank_send_is_ignored()
{   let mut h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple.", "Original.")));
    assert_ok!(h.hand.send_question(1, "   "));

    let view = h.hand.snapshot(1).await.unwrap().unwrap();
    assert_eq!(view.lines.len(), 1);
    assert!(h.relay_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_reply_without_widget_is_noop()
{   let mut h = harness();
    assert_ok!(h.inbound.send(reply(9, "late answer")));

    assert_eq!(h.hand.snapshot(9).await.unwrap(), None);
    assert!(h.overlay_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_close_removes_widget()
{   let mut h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple.", "Original.")));
    assert_ok!(h.hand.close(1));

    assert_eq!(h.hand.snapshot(1).await.unwrap(), None);
    let mut events = vec![];
    while let Ok(event) = h.overlay_rx.try_recv()
    {   events.push(event);
    }
    assert_eq!(
      events.last(),
      Some(&OverlayEvent::Removed { tab: 1, reason: RemovalReason::Closed })
    );
}

#[tokio::test(start_paused = true)]
async fn test_reload_clears_messages()
{   let h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple.", "Original.")));
    assert_ok!(h.hand.reload(1));

    let view = h.hand.snapshot(1).await.unwrap().unwrap();
    assert!(view.lines.is_empty());
    assert_eq!(view.original_text, "Original.");
}

#[tokio::test(start_paused = true)]
async fn test_reload_emits_cleared()
{   let mut h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple.", "Original.")));
    assert_ok!(h.hand.reload(1));
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    let mut events = vec![];
    while let Ok(event) = h.overlay_rx.try_recv()
    {   events.push(event);
    }
    assert_eq!(
      events,
      vec![
        OverlayEvent::Opened { tab: 1 }
      , OverlayEvent::Line { tab: 1, line: ChatLine::llm("Simple.") }
      , OverlayEvent::Cleared { tab: 1 }
      ]
    );
}

// ===== Inactivity timer =====

#[tokio::test(start_paused = true)]
async fn test_inactivity_removes_widget()
{   let mut h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple.", "Original.")));
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(h.hand.snapshot(1).await.unwrap(), None);

    let mut events = vec![];
    while let Ok(event) = h.overlay_rx.try_recv()
    {   events.push(event);
    }
    assert_eq!(
      events.last(),
      Some(&OverlayEvent::Removed
      {   tab: 1
        , reason: RemovalReason::Inactivity
      })
    );
}

#[tokio::test(start_paused = true)]
async fn test_keystroke_resets_countdown()
{   let h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple.", "Original.")));
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(20)).await;
    assert_ok!(h.hand.keystroke(1));
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(h.hand.snapshot(1).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_send_resets_countdown()
{   let mut h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple.", "Original.")));
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(20)).await;
    assert_ok!(h.hand.send_question(1, "Why?"));
    assert!(h.hand.snapshot(1).await.unwrap().is_some());
    assert!(h.relay_rx.try_recv().is_ok());

    tokio::time::advance(Duration::from_secs(20)).await;
    let view = h.hand.snapshot(1).await.unwrap().unwrap();
    assert_eq!(view.state, WidgetState::OpenAwaitingReply);

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(h.hand.snapshot(1).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_reload_resets_countdown()
{   let h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple.", "Original.")));
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(20)).await;
    assert_ok!(h.hand.reload(1));
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(h.hand.snapshot(1).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_inbound_message_resets_countdown()
{   let h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple.", "Original.")));
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(25)).await;
    assert_ok!(h.inbound.send(reply(1, "more")));
    assert!(h.hand.snapshot(1).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(25)).await;
    let view = h.hand.snapshot(1).await.unwrap().unwrap();
    assert_eq!(view.lines.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_discards_pending_follow_up()
{   let mut h = harness();
    assert_ok!(h.inbound.send(open(1, "Simple.", "Original.")));
    assert_ok!(h.hand.send_question(1, "Why?"));
    assert!(h.relay_rx.recv().await.is_some());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_ok!(h.inbound.send(reply(1, "Because.")));
    assert_eq!(h.hand.snapshot(1).await.unwrap(), None);
}
