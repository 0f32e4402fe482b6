//! Scripted HTTP server standing in for the management and identity
//! endpoints.
//!
//! Token requests are answered by the configured [`TokenIssuer`]; every
//! other request takes the next scripted response in order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::Endpoints;

const TOKEN_PATH_SUFFIX: &str = "/oauth2/token";

/// Response returned for one request.
#[derive(Clone, Debug)]
pub(super) struct ScriptedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl ScriptedResponse {
    pub(super) fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            headers: vec![(
                String::from("content-type"),
                String::from("application/json"),
            )],
            body: body.to_string(),
        }
    }

    pub(super) const fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub(super) fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_owned(),
        }
    }

    pub(super) fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }
}

/// How the identity endpoint answers password grants.
#[derive(Clone, Copy, Debug)]
pub(super) enum TokenIssuer {
    /// Issues `token-<n>` valid for the given number of seconds.
    Lifetime(u64),
    /// Rejects every grant with `invalid_grant`.
    Reject,
}

/// Management request as seen by the server.
#[derive(Clone, Debug)]
pub(super) struct RecordedRequest {
    pub(super) method: String,
    pub(super) target: String,
    pub(super) authorization: Option<String>,
    pub(super) body: String,
}

#[derive(Default)]
struct State {
    responses: VecDeque<ScriptedResponse>,
    requests: Vec<RecordedRequest>,
    tokens_issued: u32,
}

pub(super) struct ScriptedServer {
    base_url: String,
    state: Arc<Mutex<State>>,
    task: JoinHandle<()>,
}

impl ScriptedServer {
    pub(super) async fn start(issuer: TokenIssuer) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|err| panic!("bind scripted server: {err}"));
        let address = listener
            .local_addr()
            .unwrap_or_else(|err| panic!("scripted server address: {err}"));
        let state = Arc::new(Mutex::new(State::default()));
        let task = tokio::spawn(serve(listener, issuer, Arc::clone(&state)));
        Self {
            base_url: format!("http://{address}"),
            state,
            task,
        }
    }

    /// Absolute URL of `path` on this server.
    pub(super) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(super) fn endpoints(&self) -> Endpoints {
        Endpoints {
            management: self.base_url.clone(),
            authority: self.base_url.clone(),
        }
    }

    pub(super) fn push(&self, response: ScriptedResponse) {
        self.lock().responses.push_back(response);
    }

    pub(super) fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub(super) fn tokens_issued(&self) -> u32 {
        self.lock().tokens_issued
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, issuer: TokenIssuer, state: Arc<Mutex<State>>) {
    while let Ok((mut stream, _)) = listener.accept().await {
        let Some(request) = read_request(&mut stream).await else {
            continue;
        };
        let response = respond(&request, issuer, &state);
        write_response(&mut stream, &response).await;
    }
}

fn respond(request: &RecordedRequest, issuer: TokenIssuer, state: &Mutex<State>) -> ScriptedResponse {
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    if request.target.ends_with(TOKEN_PATH_SUFFIX) {
        guard.tokens_issued += 1;
        return match issuer {
            TokenIssuer::Lifetime(seconds) => ScriptedResponse::json(
                200,
                &json!({
                    "access_token": format!("token-{}", guard.tokens_issued),
                    "expires_in": seconds.to_string(),
                }),
            ),
            TokenIssuer::Reject => ScriptedResponse::json(
                400,
                &json!({
                    "error": "invalid_grant",
                    "error_description": "bad password",
                }),
            ),
        };
    }

    guard.requests.push(request.clone());
    guard.responses.pop_front().unwrap_or_else(|| {
        ScriptedResponse::json(
            500,
            &json!({ "error": { "code": "Unscripted", "message": request.target } }),
        )
    })
}

fn header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    let head_len = loop {
        if let Some(position) = header_end(&buffer) {
            break position;
        }
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(chunk.get(..read)?);
    };

    let head = String::from_utf8_lossy(buffer.get(..head_len)?).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_owned();
    let target = request_line.next()?.to_owned();

    let mut content_length = 0_usize;
    let mut authorization = None;
    for line in lines {
        let Some((name, raw)) = line.split_once(':') else {
            continue;
        };
        if name.eq_ignore_ascii_case("content-length") {
            content_length = raw.trim().parse().ok()?;
        } else if name.eq_ignore_ascii_case("authorization") {
            authorization = Some(raw.trim().to_owned());
        }
    }

    let body_start = head_len + 4;
    while buffer.len() < body_start + content_length {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(chunk.get(..read)?);
    }
    let body = String::from_utf8_lossy(buffer.get(body_start..)?).into_owned();

    Some(RecordedRequest {
        method,
        target,
        authorization,
        body,
    })
}

async fn write_response(stream: &mut TcpStream, response: &ScriptedResponse) {
    let extra: String = response
        .headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}\r\n"))
        .collect();
    let head = format!(
        "HTTP/1.1 {} Scripted\r\ncontent-length: {}\r\nconnection: close\r\n{extra}\r\n",
        response.status,
        response.body.len()
    );
    stream.write_all(head.as_bytes()).await.ok();
    stream.write_all(response.body.as_bytes()).await.ok();
    stream.shutdown().await.ok();
}
