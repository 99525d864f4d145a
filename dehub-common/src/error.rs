/// Errors shared across fabric crates that don't already have a more
/// specific home (`dehub-wire::ProtocolError`, `dehub-directory::DirectoryError`, ...).
#[derive(thiserror::Error, Debug)]
pub enum FabricError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("servant not found for id {0:?}")]
    ServantNotFound(String),

    #[error("config error: {0}")]
    Config(String),
}
