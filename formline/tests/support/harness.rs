//! End-to-end test harness for Formline
//!
//! ```no_run
//! let harness = TestHarness::builder().with_test_gate(true).build().await.unwrap();
//! let (status, body) = harness.post_form(harness.test_path(), &harness.mock_fields("pw")).await;
//! harness.shutdown().await;
//! ```
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use formline::{Formline, FormlineConfig};
use formline_common::{
    FormId, Signal,
    config::{ClientTimeouts, TlsConfig},
};
use formline_http::{HttpConfig, HttpError};
use formline_smtp::TesterConfig;
use formline_store::StoreConfig;
use reqwest::StatusCode;
use serde_json::Value;
use tempfile::TempDir;
use tokio::{sync::broadcast, task::JoinHandle};

use super::mock_server::{MockSmtpServer, MockSmtpServerBuilder, SmtpCommand};

pub const FORM: &str = "contact";

pub struct TestHarness {
    base_url: String,
    client: reqwest::Client,
    mock_server: MockSmtpServer,
    shutdown_tx: broadcast::Sender<Signal>,
    server_task: JoinHandle<Result<(), HttpError>>,
    db_path: PathBuf,
    _db_dir: TempDir,
}

pub struct TestHarnessBuilder {
    enforce_test_gate: bool,
    mock: MockSmtpServerBuilder,
}

impl TestHarnessBuilder {
    #[must_use]
    pub const fn with_test_gate(mut self, enforce: bool) -> Self {
        self.enforce_test_gate = enforce;
        self
    }

    #[must_use]
    pub fn with_auth_response(mut self, code: u16, text: &str) -> Self {
        self.mock = self.mock.with_auth_response(code, text);
        self
    }

    pub async fn build(self) -> anyhow::Result<TestHarness> {
        let mock_server = self.mock.build().await?;
        let db_dir = tempfile::tempdir()?;
        let db_path = db_dir.path().join("formline.db");

        let config = FormlineConfig {
            http: HttpConfig {
                listen_address: "127.0.0.1:0".to_string(),
                enforce_test_gate: self.enforce_test_gate,
            },
            store: StoreConfig::Sqlite {
                path: db_path.clone(),
            },
            tester: TesterConfig {
                helo_domain: "forms.test".to_string(),
                tls: TlsConfig::disabled(),
                timeouts: ClientTimeouts::default(),
            },
            forms: vec![FormId::from(FORM)],
        };

        let server = Formline::new(config).bind().await?;
        let addr = server.local_addr()?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let server_task = tokio::spawn(server.serve(shutdown_rx));

        Ok(TestHarness {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            mock_server,
            shutdown_tx,
            server_task,
            db_path,
            _db_dir: db_dir,
        })
    }
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder {
            enforce_test_gate: false,
            mock: MockSmtpServer::builder(),
        }
    }

    pub fn settings_path(&self) -> String {
        format!("/forms/{FORM}/settings/notifications")
    }

    pub fn test_path(&self) -> String {
        format!("/forms/{FORM}/settings/notifications/test")
    }

    /// Fields pointing at the mock SMTP server.
    pub fn mock_fields(&self, credential: &str) -> Vec<(&'static str, String)> {
        vec![
            ("email", "owner@forms.test".to_string()),
            ("credential", credential.to_string()),
            ("host", "127.0.0.1".to_string()),
            ("port", self.mock_server.port().to_string()),
        ]
    }

    pub async fn post_form(&self, path: &str, fields: &[(&'static str, String)]) -> (StatusCode, Value) {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .form(fields)
            .send()
            .await
            .expect("request sent");
        Self::decode(response).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("request sent");
        Self::decode(response).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .delete(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("request sent");
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> (StatusCode, Value) {
        let status = response.status();
        let body = response.json::<Value>().await.expect("JSON body");
        (status, body)
    }

    pub async fn mock_commands(&self) -> Vec<SmtpCommand> {
        self.mock_server.commands().await
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Stop the HTTP server and wait for it to finish. The database file is
    /// kept until the harness is dropped.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(Signal::Shutdown);
        (&mut self.server_task)
            .await
            .expect("server task joined")
            .expect("server stopped cleanly");
        self.mock_server.shutdown();
    }
}
