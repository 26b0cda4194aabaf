use crate::check::Check;
use crate::error::StoreError;
use crate::webhook::WebHook;

/// Tag byte prefixing every consensus log entry's payload.
pub const TAG_UPSERT_CHECK: u8 = 0;
pub const TAG_DELETE_CHECK: u8 = 1;
pub const TAG_UPSERT_WEBHOOK: u8 = 2;
pub const TAG_DELETE_WEBHOOK: u8 = 3;

/// Reserved tag for the Consensus Adapter's barrier/read-index marker entry. The FSM
/// recognizes and discards it before it ever reaches `Store::exec_command` — it carries
/// no payload and never touches `checks_index`/`pending_webhooks_index`.
pub const TAG_BARRIER: u8 = 0xFF;

/// A decoded consensus log entry: a tag byte plus its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UpsertCheck(Check),
    DeleteCheck(String),
    UpsertWebhook(WebHook),
    DeleteWebhook(String),
    Barrier,
}

impl Command {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::UpsertCheck(check) => {
                let mut out = vec![TAG_UPSERT_CHECK];
                out.extend_from_slice(&serde_json::to_vec(check).expect("Check always serializes"));
                out
            }
            Command::DeleteCheck(id) => {
                let mut out = vec![TAG_DELETE_CHECK];
                out.extend_from_slice(id.as_bytes());
                out
            }
            Command::UpsertWebhook(webhook) => {
                let mut out = vec![TAG_UPSERT_WEBHOOK];
                out.extend_from_slice(&serde_json::to_vec(webhook).expect("WebHook always serializes"));
                out
            }
            Command::DeleteWebhook(id) => {
                let mut out = vec![TAG_DELETE_WEBHOOK];
                out.extend_from_slice(id.as_bytes());
                out
            }
            Command::Barrier => vec![TAG_BARRIER],
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, StoreError> {
        let (tag, payload) = data
            .split_first()
            .ok_or_else(|| StoreError::MalformedCommand("empty log entry".to_string()))?;
        match *tag {
            TAG_UPSERT_CHECK => {
                let check: Check = serde_json::from_slice(payload)
                    .map_err(|e| StoreError::MalformedCommand(e.to_string()))?;
                Ok(Command::UpsertCheck(check))
            }
            TAG_DELETE_CHECK => {
                let id = String::from_utf8(payload.to_vec())
                    .map_err(|e| StoreError::MalformedCommand(e.to_string()))?;
                Ok(Command::DeleteCheck(id))
            }
            TAG_UPSERT_WEBHOOK => {
                let webhook: WebHook = serde_json::from_slice(payload)
                    .map_err(|e| StoreError::MalformedCommand(e.to_string()))?;
                Ok(Command::UpsertWebhook(webhook))
            }
            TAG_DELETE_WEBHOOK => {
                let id = String::from_utf8(payload.to_vec())
                    .map_err(|e| StoreError::MalformedCommand(e.to_string()))?;
                Ok(Command::DeleteWebhook(id))
            }
            TAG_BARRIER => Ok(Command::Barrier),
            other => Err(StoreError::UnknownCommandTag(other)),
        }
    }
}
