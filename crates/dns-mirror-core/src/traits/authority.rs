// # Record Authority Trait
//
// Defines the interface for reading the authoritative record set of a zone.
//
// ## Implementations
//
// - Alibaba Cloud DNS: `dns-mirror-provider-aliyun` crate
//
// ## Usage
//
// ```rust,ignore
// use dns_mirror_core::traits::{PageRequest, RecordAuthority};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let authority = /* RecordAuthority implementation */;
//
//     authority.ping().await?;
//     let page = authority
//         .list_records_page("example.com", PageRequest::first(100))
//         .await?;
//     println!("{} of {} records", page.records.len(), page.total_count);
//
//     Ok(())
// }
// ```

use crate::model::RemoteRecord;
use async_trait::async_trait;

/// One page request against the authority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page_number: u64,
    /// Maximum records per page
    pub page_size: u64,
}

impl PageRequest {
    /// The first page at the given size
    pub fn first(page_size: u64) -> Self {
        Self {
            page_number: 1,
            page_size,
        }
    }

    /// The page after this one
    pub fn next(self) -> Self {
        Self {
            page_number: self.page_number + 1,
            page_size: self.page_size,
        }
    }
}

/// One page of records plus the authority's reported total
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    /// Records on this page, unfiltered
    pub records: Vec<RemoteRecord>,
    /// Total number of records the authority claims the zone holds
    pub total_count: u64,
}

/// Trait for record authority implementations
///
/// An authority is observed, never mutated: there is no write path.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses into [`RemoteRecord`]
/// - ✅ Return success or failure for exactly one request
///
/// ## Forbidden Capabilities
/// - ❌ Paginate on their own (owned by the remote snapshot builder)
/// - ❌ Filter by kind or status (owned by the remote snapshot builder)
/// - ❌ Retry or back off
/// - ❌ Touch the mirror store
///
/// Pagination lives outside the authority so the termination rules that
/// guard against a misreporting authority are enforced in one place.
#[async_trait]
pub trait RecordAuthority: Send + Sync {
    /// Fetch one page of records for `zone`
    ///
    /// # Returns
    ///
    /// - `Ok(RecordPage)`: The page; may be empty
    /// - `Err(Error)`: Transport, authentication or decoding failure
    async fn list_records_page(
        &self,
        zone: &str,
        page: PageRequest,
    ) -> Result<RecordPage, crate::Error>;

    /// Check that the authority is reachable and accepts our credentials
    async fn ping(&self) -> Result<(), crate::Error>;

    /// Authority name (for logging/debugging)
    fn authority_name(&self) -> &'static str;
}

/// Helper trait for constructing authorities from configuration
pub trait RecordAuthorityFactory: Send + Sync {
    /// Create a RecordAuthority instance from configuration
    fn create(
        &self,
        config: &crate::config::AuthorityConfig,
    ) -> Result<Box<dyn RecordAuthority>, crate::Error>;
}
