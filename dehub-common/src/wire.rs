use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::ServantId;

/// `Type=0|1` on the wire (spec §6): which edge path a hub should take for
/// this connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ClientRole {
    Servant = 0,
    Master = 1,
}

/// First frame a client sends to a hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubHeader {
    #[serde(rename = "Type")]
    pub role: ClientRole,
    #[serde(rename = "ID")]
    pub id: ServantId,
}

/// The sub-channel kinds a servant dispatches on (spec §4.5.2-5). Carried as
/// a string on the wire (in the exec-request payload that opens the
/// sub-channel, see `dehub_ssh::SubChannelRequest`) rather than as a native
/// SSH channel type, since a closed, serde-friendly enum is easier to reason
/// about than a raw `Channel::channel_type()` string match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Exec,
    ForwardSocks5,
    ShareDir,
}

impl Command {
    pub const fn as_str(self) -> &'static str {
        match self {
            Command::Exec => "exec",
            Command::ForwardSocks5 => "forward-socks5",
            Command::ShareDir => "share-dir",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "exec" => Some(Command::Exec),
            "forward-socks5" => Some(Command::ForwardSocks5),
            "share-dir" => Some(Command::ShareDir),
            _ => None,
        }
    }
}

impl Serialize for Command {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Command::from_str(&s).ok_or_else(|| serde::de::Error::custom(format!("unknown command {s:?}")))
    }
}

/// Logical name of the terminal-resize notification carried by exec
/// sub-channels. On the wire this rides the standard SSH `window-change`
/// channel request (`russh` exposes no generic named-request primitive to
/// send a literal `"resize"` request type); kept here for logging and for
/// documenting the semantic equivalence, not as an actual request name.
pub const RESIZE_REQUEST: &str = "resize";
