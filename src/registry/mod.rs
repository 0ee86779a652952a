//! Registry clients
//!
//! - openfda: primary registry (brand → ingredients), plus local-name translation
//! - mfds: secondary registry (local ingredient → registered products)
//! - envelope: MFDS response schemas
//! - transport / retry: HTTP seam and retry policy shared by both

pub mod envelope;
pub mod mfds;
pub mod openfda;
pub mod retry;
pub mod transport;

use crate::cancel::{CancellationToken, Cancelled};
use async_trait::async_trait;
use drugmatch_common::SearchTerm;

pub use mfds::{LookupOutcome, MfdsClient};
pub use openfda::{OpenFdaClient, PrimaryEndpoint, PrimaryMatch};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Transport, TransportError};

/// Secondary registry lookup used by the calculator
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn lookup(
        &self,
        term: &SearchTerm,
        include_revoked: bool,
        cancel: &CancellationToken,
    ) -> Result<LookupOutcome, Cancelled>;
}
