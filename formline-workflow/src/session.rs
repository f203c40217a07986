//! Async driver around [`WorkflowState`].

use std::{sync::Arc, time::Duration};

use formline_common::{FormId, internal, tracing};
use tokio::sync::mpsc;

use crate::{
    Debouncer, NotificationBackend, WorkflowError,
    provider::Detection,
    state::{Completion, Field, OperationKind, SettingsView, WorkflowState},
};

/// Quiet period before detection runs on a changed e-mail address.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub quiet_period: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

#[derive(Debug)]
enum SessionEvent {
    DetectionDue(u64),
    Completed(Completion),
}

/// What [`SettingsSession::next`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Detection ran on the current e-mail value.
    Detected(Detection),
    /// A detection firing was superseded by a later keystroke or a clear.
    DetectionSuperseded,
    /// A request finished. `applied` is `false` when its result was dropped.
    Completed { kind: OperationKind, applied: bool },
}

/// One open notification settings form.
///
/// Save, test and clear run as spawned tasks that post their completion back
/// to the session; [`Self::next`] applies those one at a time, so every state
/// transition happens on the task that owns the session.
pub struct SettingsSession<B: NotificationBackend> {
    form_id: FormId,
    backend: Arc<B>,
    state: WorkflowState,
    debouncer: Debouncer,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<B: NotificationBackend> SettingsSession<B> {
    /// Load the form's stored settings and start a session.
    ///
    /// When settings exist, detection runs immediately on the stored address.
    pub async fn open(
        form_id: FormId,
        backend: Arc<B>,
        options: SessionOptions,
    ) -> Result<Self, WorkflowError> {
        let persisted = backend
            .load(&form_id)
            .await
            .map_err(WorkflowError::Load)?;

        let mut state = WorkflowState::from_persisted(persisted.as_ref());
        if persisted.is_some() {
            state.apply_detection();
        }

        tracing::debug!(form = %form_id, detection = %state.detection(), "Opened settings session");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            form_id,
            backend,
            state,
            debouncer: Debouncer::new(options.quiet_period),
            events_tx,
            events_rx,
        })
    }

    #[must_use]
    pub const fn form_id(&self) -> &FormId {
        &self.form_id
    }

    #[must_use]
    pub const fn state(&self) -> &WorkflowState {
        &self.state
    }

    #[must_use]
    pub fn view(&self) -> SettingsView {
        self.state.view()
    }

    /// Whether a detection is waiting for the quiet period to end.
    #[must_use]
    pub const fn detection_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Apply a user edit. Changing the e-mail restarts the detection timer.
    pub fn edit(&mut self, field: Field, value: impl Into<String>) -> Result<(), WorkflowError> {
        let changed = self.state.edit(field, value)?;

        if changed && field == Field::Email {
            let events = self.events_tx.clone();
            self.debouncer.schedule(move |generation| {
                let _ = events.send(SessionEvent::DetectionDue(generation));
            });
        }

        Ok(())
    }

    /// Submit a test send with the current fields.
    pub fn test(&mut self) {
        let (ticket, submitted) = self.state.begin_test();
        self.spawn(move |backend, form_id| async move {
            let result = backend.test(&form_id, submitted).await;
            Completion::Test { ticket, result }
        });
    }

    /// Submit a save. Refused unless the last test passed with the current
    /// fields.
    pub fn save(&mut self) -> Result<(), WorkflowError> {
        let (ticket, submitted) = self.state.begin_save()?;
        self.spawn(move |backend, form_id| async move {
            let result = backend.save(&form_id, submitted.clone()).await;
            Completion::Save {
                ticket,
                submitted,
                result,
            }
        });
        Ok(())
    }

    /// Submit a clear.
    pub fn clear(&mut self) {
        let ticket = self.state.begin_clear();
        self.spawn(move |backend, form_id| async move {
            let result = backend.clear(&form_id).await;
            Completion::Clear { ticket, result }
        });
    }

    fn spawn<F, Fut>(&self, request: F)
    where
        F: FnOnce(Arc<B>, FormId) -> Fut,
        Fut: Future<Output = Completion> + Send + 'static,
    {
        let events = self.events_tx.clone();
        let running = request(Arc::clone(&self.backend), self.form_id.clone());

        tokio::spawn(async move {
            let _ = events.send(SessionEvent::Completed(running.await));
        });
    }

    /// Wait for the next event and apply it.
    ///
    /// Returns `None` only if the event channel is gone, which cannot happen
    /// while the session is alive.
    pub async fn next(&mut self) -> Option<SessionUpdate> {
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    fn apply(&mut self, event: SessionEvent) -> SessionUpdate {
        match event {
            SessionEvent::DetectionDue(generation) => {
                if !self.debouncer.accept(generation) {
                    return SessionUpdate::DetectionSuperseded;
                }
                let detection = self.state.apply_detection().clone();
                internal!(level = DEBUG, "Provider detection: {detection}");
                SessionUpdate::Detected(detection)
            }
            SessionEvent::Completed(completion) => {
                let kind = completion.kind();
                let cleared = kind == OperationKind::Clear && completion.succeeded();
                let applied = self.state.complete(completion);

                if applied && cleared {
                    self.debouncer.cancel();
                }
                if !applied {
                    tracing::debug!(form = %self.form_id, %kind, "Dropped stale completion");
                }

                SessionUpdate::Completed { kind, applied }
            }
        }
    }
}
