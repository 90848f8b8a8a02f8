pub mod feed;
pub mod page;

pub use feed::FeedSource;
pub use page::PageSource;

use crate::traits::ArticleSource;
use crate::types::{FetchMode, SourceDescriptor};
use crate::Fetcher;
use std::sync::Arc;

/// Builds one source per descriptor, in registry order, sharing one fetcher.
pub fn build_sources(
    descriptors: &[SourceDescriptor],
    fetcher: Arc<Fetcher>,
) -> Vec<Box<dyn ArticleSource>> {
    descriptors
        .iter()
        .cloned()
        .map(|descriptor| -> Box<dyn ArticleSource> {
            match descriptor.mode {
                FetchMode::Feed => Box::new(FeedSource::new(descriptor, Arc::clone(&fetcher))),
                FetchMode::Scrape => Box::new(PageSource::new(descriptor, Arc::clone(&fetcher))),
            }
        })
        .collect()
}
