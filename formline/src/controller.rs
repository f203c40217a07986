use std::sync::{Arc, LazyLock};

use formline_common::{Signal, internal, logging};
use formline_http::{HttpServer, NotificationService};
use formline_smtp::SmtpTester;
use tokio::sync::broadcast;

use crate::config::FormlineConfig;

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    Ok(())
}

/// The running service: settings store, test sender and HTTP surface.
#[derive(Debug, Default)]
pub struct Formline {
    config: FormlineConfig,
}

impl Formline {
    #[must_use]
    pub const fn new(config: FormlineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &FormlineConfig {
        &self.config
    }

    /// Build the store, register the configured forms and bind the HTTP
    /// listener.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be opened, a form cannot be registered or
    /// the listen address cannot be bound.
    pub async fn bind(&self) -> anyhow::Result<HttpServer> {
        let store = self.config.store.build()?;
        for form in &self.config.forms {
            store.register_form(form).await?;
        }
        internal!(level = INFO, "Registered {} form(s)", self.config.forms.len());

        let tester = Arc::new(SmtpTester::new(self.config.tester.clone()));
        let service = NotificationService::new(store, tester)
            .with_test_gate(self.config.http.enforce_test_gate);

        Ok(HttpServer::new(&self.config.http, Arc::new(service)).await?)
    }

    /// Run until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// This function will return an error if start-up fails or the HTTP
    /// server stops with an error.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        let server = self.bind().await?;
        internal!(level = INFO, "Controller running");

        let serving = server.serve(SHUTDOWN_BROADCAST.subscribe());
        tokio::pin!(serving);

        let ret = tokio::select! {
            r = &mut serving => {
                r.map_err(anyhow::Error::from)
            }
            r = shutdown() => match r {
                Ok(()) => serving.await.map_err(anyhow::Error::from),
                Err(e) => Err(e),
            }
        };

        let _ = SHUTDOWN_BROADCAST.send(Signal::Finalised);
        internal!(level = INFO, "Shutting down...");

        ret
    }
}
