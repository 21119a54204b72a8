//! Fallback-chain resolution with a per-attempt handle cache.

use std::collections::HashMap;

use tracing::debug;
use webreplay_protocols::{ElementHandle, PageError, PageHandle, ReplayError, SelectorDescriptor};

/// An element together with the descriptor that found it.
#[derive(Debug, Clone)]
pub(crate) struct Located {
    pub handle: ElementHandle,
    /// `strategy:value` of the matching descriptor.
    pub descriptor: String,
}

/// Resolves descriptor chains against one page.
///
/// Lives for a single action attempt; handles found here are never reused
/// across attempts.
pub(crate) struct Resolver<'a> {
    page: &'a dyn PageHandle,
    cache: HashMap<String, ElementHandle>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(page: &'a dyn PageHandle) -> Self {
        Self {
            page,
            cache: HashMap::new(),
        }
    }

    /// Drop cached handles so the next lookup queries the page again.
    pub(crate) fn clear(&mut self) {
        self.cache.clear();
    }

    /// First descriptor in `chain` that designates exactly one element.
    ///
    /// Lookup errors on individual descriptors count as misses; a lost
    /// connection to the host aborts the whole resolution.
    pub(crate) async fn resolve(
        &mut self,
        chain: &[&SelectorDescriptor],
    ) -> Result<Option<Located>, ReplayError> {
        for descriptor in chain {
            let key = descriptor.to_string();
            if let Some(handle) = self.cache.get(&key) {
                return Ok(Some(Located {
                    handle: handle.clone(),
                    descriptor: key,
                }));
            }
            match self.page.query_element(descriptor).await {
                Ok(Some(handle)) => {
                    self.cache.insert(key.clone(), handle.clone());
                    return Ok(Some(Located {
                        handle,
                        descriptor: key,
                    }));
                }
                Ok(None) => {}
                Err(e @ PageError::Connection(_)) => return Err(e.into()),
                Err(e) => debug!(selector = %key, "Selector lookup failed: {}", e),
            }
        }
        Ok(None)
    }
}
