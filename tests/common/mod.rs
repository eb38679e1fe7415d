#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use simplifai::error::Error;
use simplifai::request::{LlmRequest, TaskKind};
use simplifai::LlmHand;

/// What a canned server saw for one connection
#[derive(Debug, Clone)]
pub struct CapturedRequest
{   pub path: String
  , pub body: serde_json::Value
}

fn reason(status: u16) -> &'static str
{   match status
    {   200 => "OK"
      , 400 => "Bad Request"
      , 404 => "Not Found"
      , 500 => "Internal Server Error"
      , _ => "Unknown"
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize>
{   buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn read_request(socket: &mut tokio::net::TcpStream)
  -> CapturedRequest
{   let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop
    {   let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf)
        {   break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let path = head
      .lines()
      .next()
      .and_then(|l| l.split_whitespace().nth(1))
      .unwrap_or("")
      .to_string();
    let content_length = head
      .lines()
      .filter_map(|l| l.split_once(':'))
      .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
      .map(|(_, v)| v.trim().parse::<usize>().unwrap())
      .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length
    {   let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = &buf[body_start..body_start + content_length];
    let body = if body.is_empty()
    {   serde_json::Value::Null
    } else
    {   serde_json::from_slice(body).unwrap()
    };
    CapturedRequest { path, body }
}

/// Serve the canned responses in order, one connection each.
/// Returns the base url and a handle yielding what was received.
pub async fn serve(responses: Vec<(u16, String)>)
  -> (String, tokio::task::JoinHandle<Vec<CapturedRequest>>)
{   let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
      let mut seen = vec![];
      for (status, body) in responses
      {   let (mut socket, _) = listener.accept().await.unwrap();
          seen.push(read_request(&mut socket).await);
          let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            status, reason(status), body.len(), body
          );
          socket.write_all(response.as_bytes()).await.unwrap();
          let _ = socket.shutdown().await;
      }
      seen
    });
    (format!("http://{}", addr), handle)
}

pub async fn serve_one(status: u16, body: &str)
  -> (String, tokio::task::JoinHandle<Vec<CapturedRequest>>)
{   serve(vec![(status, body.to_string())]).await
}

/// Address nothing listens on
pub async fn dead_address() -> String
{   let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub type CallLog = Arc<Mutex<Vec<LlmRequest>>>;

/// Scripted llm actor: records every request, answers with `respond`
pub fn fake_llm<F>(respond: F) -> (LlmHand, CallLog)
where
  F: Fn(&LlmRequest) -> Result<String, Error> + Send + 'static
{   let (hand, mut foot) = LlmHand::channel();
    let calls: CallLog = Arc::new(Mutex::new(vec![]));
    let log = calls.clone();
    tokio::spawn(async move {
      while let Some(cmd) = foot.invoke_rx.recv().await
      {   let result = respond(&cmd.request);
          log.lock().unwrap().push(cmd.request);
          let _ = cmd.reply.send(result);
      }
    });
    (hand, calls)
}

pub fn tasks(calls: &CallLog) -> Vec<TaskKind>
{   calls.lock().unwrap().iter().map(|r| r.task).collect()
}

/// Answers that make each task easy to recognise
pub fn echo_backend(detected: &'static str)
  -> impl Fn(&LlmRequest) -> Result<String, Error> + Send + 'static
{   move |request: &LlmRequest| match request.task
    {   TaskKind::DetectLanguage => Ok(detected.to_string())
      , TaskKind::Simplify => Ok(format!("simple({})", request.text))
      , TaskKind::Translate => Ok(format!(
          "{}({})", request.target_language, request.text
        ))
      , TaskKind::ChatTurn => Ok("answer".to_string())
    }
}
