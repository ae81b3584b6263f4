//! Server behaviour flags that change how result cells are decoded.

use serde::Serialize;

use super::transport::Transport;

/// Per-connection record of server settings relevant to decoding.
///
/// Resolved once from the server's parameter status and cached by the owning
/// [`Connection`](super::Connection) for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Configuration {
    /// Timestamps and times travel as int64 microseconds rather than float8 seconds.
    pub has_integer_datetimes: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            has_integer_datetimes: true,
        }
    }
}

impl Configuration {
    /// Query the transport for the settings this record tracks.
    pub fn load<T: Transport + ?Sized>(transport: &T) -> Self {
        let has_integer_datetimes = boolean_parameter(transport, "integer_datetimes", true);
        tracing::debug!(has_integer_datetimes, "resolved connection configuration");
        Self {
            has_integer_datetimes,
        }
    }
}

/// A reported `on` is true, any other reported value is false, and an
/// unreported parameter takes `default`.
fn boolean_parameter<T: Transport + ?Sized>(transport: &T, key: &str, default: bool) -> bool {
    transport
        .parameter_status(key)
        .map_or(default, |value| value == "on")
}
