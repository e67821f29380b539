//! Where accepted submissions end up.

mod sheets;

pub use sheets::SheetsSink;

use async_trait::async_trait;
use formgate_common::GatewayError;

/// Append-only tabular store
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Append one row. No retries; failure ends the request.
    async fn append(&self, row: Vec<String>) -> Result<(), GatewayError>;

    /// Whether credentials and target are configured
    fn is_configured(&self) -> bool;
}
