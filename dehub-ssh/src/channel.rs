use dehub_common::Command;
use serde::{Deserialize, Serialize};

/// Carried as the payload of the SSH `exec` channel request that opens a
/// typed sub-channel (spec §4.5.2-5, §4.6.2-4). Replaces the original's use
/// of a bespoke SSH channel type + `ExtraData()` blob with the request/reply
/// primitive `russh` actually exposes on both client and server handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubChannelRequest {
    pub command: Command,
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl SubChannelRequest {
    pub fn new(command: Command, meta: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            command,
            meta: serde_json::to_value(meta)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("SubChannelRequest always serializes")
    }
}
