//! Lazy, restartable listing of a tenant's secrets.

use super::store::{PageRequest, SecretEntry, SecretStore};
use crate::errors::Result;
use futures::stream::BoxStream;
use std::sync::Arc;

pub type SecretEntryStream = BoxStream<'static, Result<SecretEntry>>;

/// Stream every secret under `path`, fetching one page at a time.
///
/// Nothing is fetched until the stream is polled. Passing the key of the last
/// entry seen as `start_after` resumes the listing right after it. The stream
/// ends on the first error.
pub fn list_secrets(
    store: Arc<dyn SecretStore>,
    mount: impl Into<String>,
    path: impl Into<String>,
    start_after: Option<String>,
    page_size: usize,
) -> SecretEntryStream {
    let mount = mount.into();
    let path = path.into();
    let limit = page_size.max(1);

    Box::pin(async_stream::try_stream! {
        let mut after = start_after;
        loop {
            let request = PageRequest { after: after.clone(), limit };
            let page = store.list_secrets_page(&mount, &path, &request).await?;
            for entry in page.entries {
                yield entry;
            }
            match page.next {
                // a store repeating its cursor would never terminate
                Some(next) if after.as_deref() != Some(next.as_str()) => after = Some(next),
                _ => break,
            }
        }
    })
}
