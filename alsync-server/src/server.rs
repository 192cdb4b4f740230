use crate::activity::ActivityLog;
use crate::api::{create_router, AppState};
use crate::session::{SessionHandle, WatchSession};
use crate::watcher::NotifyWatcher;
use alsync_core::Settings;
use anyhow::Context;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AlsyncServer {
    session: Arc<SessionHandle>,
    activity: Arc<ActivityLog>,
}

impl AlsyncServer {
    /// Opens or clones the project and starts watching it with the native
    /// file watcher.
    pub async fn start(settings: &Settings, secret: &str) -> anyhow::Result<Self> {
        let activity = Arc::new(ActivityLog::new());
        let notifier = NotifyWatcher::new(settings.debounce());

        let session = WatchSession::launch(settings, secret, &notifier, activity.clone())
            .await
            .with_context(|| format!("Failed to start session for {:?}", settings.project_path))?;

        Ok(Self {
            session: Arc::new(session),
            activity,
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn session_id(&self) -> uuid::Uuid {
        self.session.info().id
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Serves the control API until the session stops, either through
    /// `POST /stop` or Ctrl-C.
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let state = AppState {
            session: Arc::clone(&self.session),
            activity: Arc::clone(&self.activity),
        };

        let app = create_router(state);

        info!("Control API listening on {}", addr);
        info!("Session ID: {}", self.session.info().id);
        info!("Watching: {:?}", self.session.info().project_path);

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.session.cancel();
                self.session.wait().await;
                return Err(e).with_context(|| format!("Failed to bind {}", addr));
            }
        };

        let session = Arc::clone(&self.session);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(session, tokio::signal::ctrl_c()))
            .await?;

        self.session.cancel();
        self.session.wait().await;
        info!("Session {} stopped", self.session.info().id);

        Ok(())
    }
}

/// Resolves once the session has stopped. A successful interrupt cancels the
/// session first; a failed one only leaves the session to be stopped some
/// other way.
async fn shutdown_signal<F>(session: Arc<SessionHandle>, interrupt: F)
where
    F: Future<Output = io::Result<()>>,
{
    tokio::select! {
        result = interrupt => match result {
            Ok(()) => {
                info!("Interrupted, stopping session");
                session.cancel();
                session.wait().await;
            }
            Err(e) => {
                warn!("Failed to listen for Ctrl-C: {}", e);
                session.wait().await;
            }
        },
        _ = session.wait() => {}
    }
}
