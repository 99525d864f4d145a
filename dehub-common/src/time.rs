use std::time::Duration;

/// Interval at which a servant's hub refreshes its `Directory` entry.
pub const HEARTBEAT: Duration = Duration::from_secs(30);

/// A `Directory` entry older than this is treated as absent, even if never
/// explicitly deleted (servant crash, hub crash, network partition).
pub const TTL: Duration = Duration::from_secs(2 * HEARTBEAT.as_secs());

/// Bound on `Dial` calls (hub-to-relay, hub-to-servant-of-record).
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on a single rendezvous frame read at the hub edge.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
