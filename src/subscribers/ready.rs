use async_trait::async_trait;
use tracing::info;

use super::Subscribe;
use crate::types::ReadyEvent;

/// Logs who we are logged in as, once per successful connect.
#[derive(Default)]
pub struct ReadyLogger;

#[async_trait]
impl Subscribe for ReadyLogger {
    async fn on_ready(&self, ready: &ReadyEvent) {
        info!(
            user = %ready.user.tag(),
            user_id = %ready.user.id,
            guilds = ready.guilds.len(),
            gateway_version = ready.v,
            "logged in"
        );
    }

    fn name(&self) -> &'static str {
        "ready_log"
    }
}
