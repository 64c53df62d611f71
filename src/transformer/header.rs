//! Request header transformer.

use crate::config::{HeaderTransform, HeaderValue};
use crate::context::{MigrationRequest, TransformContext};

/// Header manipulation for the request direction.
#[derive(Debug, Clone)]
pub struct HeaderTransformer {
    /// Headers to add (if not present)
    add: Vec<(String, String)>,
    /// Headers to set (overwrite)
    set: Vec<(String, String)>,
    /// Headers to remove
    remove: Vec<String>,
}

impl HeaderTransformer {
    /// Create a new header transformer from configuration.
    pub fn new(config: &HeaderTransform) -> Self {
        let pairs = |headers: &Option<Vec<HeaderValue>>| {
            headers
                .iter()
                .flatten()
                .map(|h| (h.name.to_lowercase(), h.value.clone()))
                .collect::<Vec<_>>()
        };

        Self {
            add: pairs(&config.add),
            set: pairs(&config.set),
            remove: config
                .remove
                .iter()
                .flatten()
                .map(|name| name.to_lowercase())
                .collect(),
        }
    }

    /// Apply the header changes to a request.
    ///
    /// Values are interpolated against the request as it was before any
    /// change from this transformer. Removals run first, then sets, then adds.
    pub fn apply(&self, request: &mut MigrationRequest, version: &str) {
        let resolved: Vec<(bool, &str, String)> = {
            let ctx = TransformContext::new(request, version);
            self.set
                .iter()
                .map(|(name, value)| (true, name.as_str(), ctx.interpolate(value)))
                .chain(
                    self.add
                        .iter()
                        .map(|(name, value)| (false, name.as_str(), ctx.interpolate(value))),
                )
                .collect()
        };

        for name in &self.remove {
            request.remove_header(name);
        }

        for (overwrite, name, value) in resolved {
            if overwrite || request.header(name).is_none() {
                request.set_header(name, value);
            }
        }
    }
}
