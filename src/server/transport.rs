// Stdio transport checks

use tracing::{debug, warn};

/// How the process's stdin is connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// A terminal; someone started the server by hand
    Interactive,
    /// A pipe from an MCP client
    Piped,
}

/// Inspect stdin before handing it to the MCP transport
#[must_use]
pub fn validate_stdio_transport() -> StdioMode {
    debug!("Validating stdio transport setup");

    if atty::is(atty::Stream::Stdin) {
        warn!("Stdin is a terminal; the server expects JSON-RPC frames from an MCP client");
        StdioMode::Interactive
    } else {
        debug!("Stdio transport detected - ready for MCP communication");
        StdioMode::Piped
    }
}
