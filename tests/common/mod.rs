#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Write;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{self, JoinHandle};

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer,
    dev::ServerHandle,
    http::StatusCode,
    rt,
    web::{self, Bytes, Data},
};

use csv_import_kit::schema::DestinationSchema;
use csv_import_kit::session::{ImportPreview, ImportSession};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a session file as `preview` would have left it.
    pub fn write_session(&self, schema: DestinationSchema, preview: ImportPreview) -> PathBuf {
        let path = self.path().join("session.json");
        let mut session = ImportSession::new(schema.clone());
        session.reset_with_preview(schema, Some("orders.csv".into()), preview);
        session.save(&path).expect("save session");
        path
    }
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Preview for the three-column order file used across the tests.
pub fn order_preview() -> ImportPreview {
    ImportPreview {
        delimiter: ",".into(),
        has_header: true,
        headers: strings(&["Order Id", "Qty", "Notes"]),
        sample_rows: vec![strings(&["A1", "5", "x"]), strings(&["A2", "7", "y"])],
        count_guessed: 2,
    }
}

pub fn minimal_order_schema() -> DestinationSchema {
    DestinationSchema::new("order_v1", ["order_id", "quantity"]).expect("schema")
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

type Responder = dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync;

struct MockState {
    responder: Box<Responder>,
    recorded: Mutex<Vec<RecordedRequest>>,
}

/// Import backend stand-in running on its own actix system thread.
pub struct MockBackend {
    pub base_url: String,
    state: Arc<MockState>,
    handle: ServerHandle,
    thread: JoinHandle<()>,
}

impl MockBackend {
    /// Answers requests in order with `(status, json body)`; extra requests get 500.
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::respond_with(move |_| {
            queue
                .lock()
                .expect("response queue")
                .pop_front()
                .unwrap_or((500, "\"no scripted response\"".to_string()))
        })
    }

    /// Answers every request with whatever `responder` computes from it.
    pub fn respond_with(
        responder: impl Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    ) -> Self {
        let state = Arc::new(MockState {
            responder: Box::new(responder),
            recorded: Mutex::new(Vec::new()),
        });
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock backend");
        let addr = listener.local_addr().expect("mock address");
        let (tx, rx) = mpsc::channel();
        let server_state = Data::from(Arc::clone(&state));
        let thread = thread::spawn(move || {
            rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(server_state.clone())
                        .default_service(web::to(answer))
                })
                .workers(1)
                .listen(listener)
                .expect("listen on mock socket")
                .run();
                tx.send(server.handle()).expect("send server handle");
                server.await.expect("mock backend");
            })
        });
        let handle = rx.recv().expect("mock backend started");
        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
            thread,
        }
    }

    /// Stops the server and returns every request it received.
    pub fn finish(self) -> Vec<RecordedRequest> {
        rt::System::new().block_on(self.handle.stop(false));
        self.thread.join().expect("mock backend thread");
        std::mem::take(&mut *self.state.recorded.lock().expect("recorded requests"))
    }
}

async fn answer(req: HttpRequest, body: Bytes, state: Data<MockState>) -> HttpResponse {
    let headers = req
        .headers()
        .iter()
        .map(|(name, value)| format!("{name}: {}", value.to_str().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n");
    let recorded = RecordedRequest {
        request_line: format!("{} {}", req.method(), req.uri()),
        headers,
        body: body.to_vec(),
    };
    let (status, payload) = (state.responder)(&recorded);
    state.recorded.lock().expect("recorded requests").push(recorded);
    HttpResponse::build(StatusCode::from_u16(status).expect("valid status"))
        .content_type("application/json")
        .body(payload)
}
