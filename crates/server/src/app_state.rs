use server_api::ApiContext;
use shared::protocol::ServerEvent;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    pub(crate) fn new(api: ApiContext, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self { api, events }
    }

    pub(crate) fn publish(&self, event: ServerEvent) {
        if let Err(unsent) = self.events.send(event) {
            debug!(event = ?unsent.0, "no live subscribers for event");
        }
    }
}
