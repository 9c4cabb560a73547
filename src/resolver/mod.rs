//! Resolves an identifier to the instances whose names it matches.
//!
//! The resolver walks every listing page and reports all matches. Deciding
//! whether the match count is acceptable is left to the caller, see
//! [`MatchResult::into_single`].

pub mod filter;

#[cfg(test)]
mod tests;

pub use filter::{ExactFilter, NameFilter, PrefixFilter, RegexFilter};

use std::sync::Arc;

use crate::compute::{BackendError, ComputeBackend, InstanceInfo};
use crate::error::{ClientError, ClientResult, Step};

/// Instances matching one filter, in listing order.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub filter: String,
    pub instances: Vec<InstanceInfo>,
}

impl MatchResult {
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.instances.iter().map(|i| i.name.clone()).collect()
    }

    /// Returns the only match, or [`ClientError::NoMatch`] /
    /// [`ClientError::AmbiguousMatch`].
    pub fn into_single(mut self) -> ClientResult<InstanceInfo> {
        match self.instances.len() {
            0 => Err(ClientError::NoMatch {
                filter: self.filter,
            }),
            1 => Ok(self.instances.remove(0)),
            _ => Err(ClientError::AmbiguousMatch {
                matches: self.names(),
                filter: self.filter,
            }),
        }
    }
}

#[derive(Clone)]
pub struct InstanceResolver {
    backend: Arc<dyn ComputeBackend>,
}

impl InstanceResolver {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self { backend }
    }

    /// Lists every page and keeps the instances `filter` selects.
    ///
    /// A failed page fails the whole resolution; a truncated listing could hide
    /// a second match.
    pub async fn resolve(&self, filter: &dyn NameFilter) -> ClientResult<MatchResult> {
        let described = filter.describe();
        let mut instances = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .backend
                .list(page_token.clone())
                .await
                .map_err(|e| ClientError::query(Step::Resolve, described, e))?;
            pages += 1;

            tracing::debug!(
                filter = described,
                page = pages,
                listed = page.instances.len(),
                "listed instances"
            );
            instances.extend(
                page.instances
                    .into_iter()
                    .filter(|i| filter.matches(&i.name)),
            );

            match page.next_page {
                Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                    return Err(ClientError::query(
                        Step::Resolve,
                        described,
                        BackendError::Parse {
                            what: "instance listing",
                            message: format!("page token {next} repeated"),
                        },
                    ));
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::info!(
            filter = described,
            pages,
            matches = instances.len(),
            "resolved identifier"
        );
        Ok(MatchResult {
            filter: described.to_string(),
            instances,
        })
    }
}
