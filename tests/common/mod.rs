//! In-process mock portal used by the integration tests.
//!
//! Serves the two endpoints the client speaks: `GET finalized-stream/height`
//! and `POST finalized-stream`. Stream responses are scripted per test and
//! consumed in order; once the script is exhausted every further request is
//! answered `204 No Content`. All received request bodies are captured for
//! assertions.

// not every test binary touches every helper
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    convert::Infallible,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_stream::StreamExt;

pub struct MockPortal {
    state: Arc<PortalState>,
    addr: SocketAddr,
}

#[derive(Default)]
struct PortalState {
    height: AtomicU64,
    height_text: Mutex<Option<String>>,
    script: Mutex<VecDeque<StreamResponse>>,
    requests: Mutex<Vec<serde_json::Value>>,
}

/// One scripted answer to a `POST finalized-stream` request.
pub enum StreamResponse {
    NoContent,
    /// A `200` body assembled from the given chunks, closed afterwards.
    Chunks(Vec<Chunk>),
    /// Like `Chunks`, but the connection stays open after the last chunk.
    Stall(Vec<Chunk>),
    Status(StatusCode),
}

#[derive(Clone)]
pub struct Chunk {
    pub delay: Duration,
    pub data: String,
}

impl MockPortal {
    pub async fn spawn() -> anyhow::Result<Self> {
        let state = Arc::new(PortalState::default());
        let app = Router::new()
            .route("/finalized-stream/height", get(height))
            .route("/finalized-stream", post(stream))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock portal server failed");
        });

        Ok(Self { state, addr })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_height(&self, height: u64) {
        self.state.height.store(height, Ordering::SeqCst);
    }

    /// Overrides the height endpoint with a raw response body.
    pub fn set_height_text(&self, text: impl Into<String>) {
        *self.state.height_text.lock().unwrap() = Some(text.into());
    }

    pub fn enqueue(&self, response: StreamResponse) {
        self.state.script.lock().unwrap().push_back(response);
    }

    /// Enqueues a single `200` response containing one line per block
    /// number, one chunk per line.
    pub fn enqueue_blocks(&self, numbers: impl IntoIterator<Item = u64>) {
        let chunks = numbers.into_iter().map(|n| chunk(format!("{}\n", block_line(n)))).collect();
        self.enqueue(StreamResponse::Chunks(chunks));
    }

    /// The captured `POST finalized-stream` request bodies, in order.
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn height(State(state): State<Arc<PortalState>>) -> String {
    if let Some(text) = state.height_text.lock().unwrap().clone() {
        return text;
    }
    state.height.load(Ordering::SeqCst).to_string()
}

async fn stream(
    State(state): State<Arc<PortalState>>,
    Json(request): Json<serde_json::Value>,
) -> Response {
    state.requests.lock().unwrap().push(request);

    match state.script.lock().unwrap().pop_front() {
        None | Some(StreamResponse::NoContent) => StatusCode::NO_CONTENT.into_response(),
        Some(StreamResponse::Status(status)) => status.into_response(),
        Some(StreamResponse::Chunks(chunks)) => body_response(chunks, false),
        Some(StreamResponse::Stall(chunks)) => body_response(chunks, true),
    }
}

fn body_response(chunks: Vec<Chunk>, stall: bool) -> Response {
    let data = tokio_stream::iter(chunks).then(|chunk| async move {
        tokio::time::sleep(chunk.delay).await;
        Ok::<Bytes, Infallible>(Bytes::from(chunk.data))
    });
    let body = if stall {
        Body::from_stream(data.chain(tokio_stream::pending()))
    } else {
        Body::from_stream(data)
    };
    Response::builder().status(StatusCode::OK).body(body).unwrap()
}

/// A minimal valid block line for `number`.
pub fn block_line(number: u64) -> String {
    format!(
        r#"{{"header":{{"number":{number},"hash":"0x{number:08x}","parentHash":"0x{:08x}"}}}}"#,
        number.wrapping_sub(1)
    )
}

pub fn chunk(data: impl Into<String>) -> Chunk {
    Chunk { delay: Duration::ZERO, data: data.into() }
}

pub fn delayed_chunk(delay: Duration, data: impl Into<String>) -> Chunk {
    Chunk { delay, data: data.into() }
}

/// One chunk holding the lines of all given blocks.
pub fn lines_chunk(numbers: impl IntoIterator<Item = u64>) -> Chunk {
    let mut data = String::new();
    for number in numbers {
        data.push_str(&block_line(number));
        data.push('\n');
    }
    chunk(data)
}
