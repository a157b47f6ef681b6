//! In-process stand-in for the Meiki account backend

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use meiki_e2e::fixture::FixtureConfig;
use meiki_e2e::{Credentials, FixtureClient};

#[derive(Debug, Deserialize)]
struct Body {
    username: String,
    password: String,
}

/// How long a stalled request hangs before answering 503
pub const STALL: Duration = Duration::from_secs(2);

#[derive(Default)]
pub struct StubState {
    /// username -> password
    pub accounts: HashMap<String, String>,
    /// (path, status) of every answered request, in order
    pub log: Vec<(String, u16)>,
    logins: u64,
    /// path -> requests received so far, stalled ones included
    calls: HashMap<&'static str, u64>,
    /// 1-based `/create` calls answered with 500
    fail_create_on: Vec<u64>,
    /// 1-based `/delete` calls that stall for [`STALL`]
    stall_delete_on: Vec<u64>,
}

impl StubState {
    fn next_call(&mut self, path: &'static str) -> u64 {
        let n = self.calls.entry(path).or_default();
        *n += 1;
        *n
    }
}

#[derive(Clone, Default)]
pub struct StubBackend {
    pub state: Arc<Mutex<StubState>>,
}

impl StubBackend {
    pub fn has_account(&self, username: &str) -> bool {
        self.state.lock().unwrap().accounts.contains_key(username)
    }

    pub fn insert_account(&self, creds: &Credentials) {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(creds.username.clone(), creds.password.clone());
    }

    pub fn log(&self) -> Vec<(String, u16)> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn fail_create_on(&self, calls: &[u64]) {
        self.state.lock().unwrap().fail_create_on = calls.to_vec();
    }

    pub fn stall_delete_on(&self, calls: &[u64]) {
        self.state.lock().unwrap().stall_delete_on = calls.to_vec();
    }
}

async fn delete(State(stub): State<StubBackend>, Json(body): Json<Body>) -> StatusCode {
    let stalled = {
        let mut st = stub.state.lock().unwrap();
        let n = st.next_call("/delete");
        st.stall_delete_on.contains(&n)
    };
    if stalled {
        tokio::time::sleep(STALL).await;
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    let mut st = stub.state.lock().unwrap();
    let matches = st.accounts.get(&body.username).map(|pw| *pw == body.password);
    let status = match matches {
        Some(true) => {
            st.accounts.remove(&body.username);
            StatusCode::OK
        }
        Some(false) => StatusCode::UNAUTHORIZED,
        None => StatusCode::NOT_FOUND,
    };
    st.log.push(("/delete".to_string(), status.as_u16()));
    status
}

async fn create(
    State(stub): State<StubBackend>,
    Json(body): Json<Body>,
) -> (StatusCode, Json<Value>) {
    let mut st = stub.state.lock().unwrap();
    let n = st.next_call("/create");
    let (status, msg) = if st.fail_create_on.contains(&n) {
        (StatusCode::INTERNAL_SERVER_ERROR, "forced failure")
    } else if st.accounts.contains_key(&body.username) {
        (StatusCode::CONFLICT, "account already exists")
    } else {
        st.accounts.insert(body.username, body.password);
        (StatusCode::CREATED, "created")
    };
    st.log.push(("/create".to_string(), status.as_u16()));
    (status, Json(json!({ "message": msg })))
}

async fn login(
    State(stub): State<StubBackend>,
    Json(body): Json<Body>,
) -> (StatusCode, Json<Value>) {
    let mut st = stub.state.lock().unwrap();
    let matches = st.accounts.get(&body.username).map(|pw| *pw == body.password);
    let resp = match matches {
        Some(true) => {
            st.logins += 1;
            let token = format!("token-{}", st.logins);
            (StatusCode::OK, Json(json!({ "username": body.username, "token": token })))
        }
        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad credentials" }))),
    };
    st.log.push(("/login".to_string(), resp.0.as_u16()));
    resp
}

/// Serve the stub on an ephemeral port; returns its origin
pub async fn spawn_stub() -> (StubBackend, String) {
    let stub = StubBackend::default();
    let app = Router::new()
        .route("/delete", post(delete))
        .route("/create", post(create))
        .route("/login", post(login))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (stub, format!("http://{}/", addr))
}

pub fn client_for(origin: &str) -> FixtureClient {
    FixtureClient::new(FixtureConfig {
        origin: origin.to_string(),
        ..Default::default()
    })
    .unwrap()
}

/// Client that gives up well before a stalled request answers
pub fn impatient_client_for(origin: &str) -> FixtureClient {
    FixtureClient::new(FixtureConfig {
        origin: origin.to_string(),
        request_timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .unwrap()
}
