//! One-shot flash messages carried in the session.

use actix_session::Session;
use anyhow::{anyhow, Result};

use weblog_models::auth::FlashMessage;

const FLASH_KEY: &str = "_flashes";

/// Queues a message for the next response that reads the flash channel.
pub fn flash(session: &Session, message: FlashMessage) -> Result<()> {
    let mut pending = session
        .get::<Vec<FlashMessage>>(FLASH_KEY)
        .unwrap_or_default()
        .unwrap_or_default();
    pending.push(message);
    session
        .insert(FLASH_KEY, pending)
        .map_err(|e| anyhow!("failed to write flash messages: {}", e))
}

/// Drains pending messages. Reading consumes: a second call returns nothing.
pub fn take_flashes(session: &Session) -> Vec<FlashMessage> {
    let pending = session
        .remove_as::<Vec<FlashMessage>>(FLASH_KEY)
        .and_then(|r| r.ok())
        .unwrap_or_default();
    pending
}
