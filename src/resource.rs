use crate::error::BoxError;
use crate::value::AnyValue;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

pub type Attributes = BTreeMap<String, AnyValue>;

/// The entity producing telemetry (service, host, process, ...).
///
/// Some attributes may only be known at runtime; those are resolved by a
/// background task and merged in when it completes. Exporting code checks
/// [`Resource::async_attributes_pending`] and waits on
/// [`Resource::wait_for_async_attributes`] so it never sees a partially
/// resolved resource.
pub struct Resource {
    attributes: RwLock<Attributes>,
    settled: Option<watch::Receiver<bool>>,
}

impl Resource {
    pub fn new(attributes: Attributes) -> Self {
        Resource {
            attributes: RwLock::new(attributes),
            settled: None,
        }
    }

    pub fn empty() -> Self {
        Resource::new(Attributes::new())
    }

    /// Build a resource whose attributes are completed by `detect`.
    ///
    /// Detected attributes override the synchronous ones. A failed
    /// detection is logged and the resource is considered settled with
    /// only its synchronous attributes.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn with_async_attributes<F>(attributes: Attributes, detect: F) -> Arc<Self>
    where
        F: Future<Output = Result<Attributes, BoxError>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(false);
        let resource = Arc::new(Resource {
            attributes: RwLock::new(attributes),
            settled: Some(rx),
        });

        let resource_bg = Arc::clone(&resource);
        tokio::spawn(async move {
            match detect.await {
                Ok(detected) => {
                    let mut attrs = resource_bg
                        .attributes
                        .write()
                        .unwrap_or_else(PoisonError::into_inner);
                    attrs.extend(detected);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "resource attribute detection failed");
                }
            }
            let _ = tx.send(true);
        });

        resource
    }

    /// Snapshot of the current attributes.
    pub fn attributes(&self) -> Attributes {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<AnyValue> {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn async_attributes_pending(&self) -> bool {
        self.settled.as_ref().is_some_and(|rx| !*rx.borrow())
    }

    /// Resolve once asynchronous attributes have settled.
    ///
    /// Returns immediately for resources without asynchronous attributes,
    /// or when the detection task went away without settling.
    pub async fn wait_for_async_attributes(&self) {
        if let Some(rx) = &self.settled {
            let mut rx = rx.clone();
            let _ = rx.wait_for(|settled| *settled).await;
        }
    }
}

impl Default for Resource {
    fn default() -> Self {
        Resource::empty()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("attributes", &self.attributes())
            .field("pending", &self.async_attributes_pending())
            .finish()
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.attributes().serialize(serializer)
    }
}

/// Identifies the library or module a logger belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct InstrumentationScope {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_url: Option<String>,
}

impl InstrumentationScope {
    pub fn new(name: impl Into<String>) -> Self {
        InstrumentationScope {
            name: name.into(),
            version: None,
            schema_url: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_schema_url(mut self, schema_url: impl Into<String>) -> Self {
        self.schema_url = Some(schema_url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AnyValue::from(*v)))
            .collect()
    }

    #[test]
    fn plain_resource_is_never_pending() {
        let resource = Resource::new(attrs(&[("service.name", "api")]));
        assert!(!resource.async_attributes_pending());
        assert_eq!(resource.get("service.name"), Some(AnyValue::from("api")));
    }

    #[tokio::test(start_paused = true)]
    async fn async_attributes_are_merged_once_settled() {
        let resource = Resource::with_async_attributes(
            attrs(&[("service.name", "api"), ("host.name", "unknown")]),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(attrs(&[("host.name", "node-1")]))
            },
        );

        assert!(resource.async_attributes_pending());
        resource.wait_for_async_attributes().await;

        assert!(!resource.async_attributes_pending());
        assert_eq!(resource.get("host.name"), Some(AnyValue::from("node-1")));
        assert_eq!(resource.get("service.name"), Some(AnyValue::from("api")));
    }

    #[tokio::test]
    async fn failed_detection_still_settles() {
        let resource = Resource::with_async_attributes(attrs(&[("a", "b")]), async {
            Err::<Attributes, BoxError>("no metadata endpoint".into())
        });

        resource.wait_for_async_attributes().await;
        assert!(!resource.async_attributes_pending());
        assert_eq!(resource.attributes(), attrs(&[("a", "b")]));
    }
}
