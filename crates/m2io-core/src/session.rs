//! Sessions: one bundle registry, one event log, many datasets.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use m2io_bundle::{Bundle, BundleRegistry, BundleStore};
use m2io_ingest::Dataset;
use m2io_map::{CrosswalkPlan, CrosswalkResolver, LinkageSpec, link_overlay};
use m2io_model::{Digest, Event, EventLog, EventPayload};
use m2io_transform::{TransformOutcome, apply};

use crate::config::{ConfigError, SessionConfig};
use crate::error::SessionError;

/// Entry point for embedding applications.
///
/// Every dataset created by a session appends to the session's event log, so
/// the log tells the whole story of a session: bundles loaded, batches fed,
/// crosswalks resolved and plans applied.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    registry: BundleRegistry,
    resolver: CrosswalkResolver,
    log: EventLog,
}

impl Session {
    pub fn new() -> Self {
        Self::build(SessionConfig::default(), BundleRegistry::new())
    }

    /// A session with configured standards aliases registered up front.
    pub fn with_config(config: SessionConfig) -> Result<Self, SessionError> {
        let registry = BundleRegistry::new();
        for (alias, digest) in &config.standards {
            let digest =
                Digest::new(digest.as_str()).map_err(|_| ConfigError::InvalidStandard {
                    alias: alias.clone(),
                    digest: digest.clone(),
                })?;
            registry.register_alias(alias.as_str(), digest);
        }
        Ok(Self::build(config, registry))
    }

    fn build(config: SessionConfig, registry: BundleRegistry) -> Self {
        let log = EventLog::new();
        let store: Arc<dyn BundleStore> = Arc::new(registry.clone());
        Self {
            config,
            resolver: CrosswalkResolver::new(store, log.clone()),
            registry,
            log,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &BundleRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &CrosswalkResolver {
        &self.resolver
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Parse a bundle document and register it.
    pub fn load_bundle(&self, raw: &str) -> Result<Arc<Bundle>, SessionError> {
        Ok(self.register(Bundle::parse(raw)?))
    }

    pub fn load_bundle_file(&self, path: &Path) -> Result<Arc<Bundle>, SessionError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_bundle(&raw)
    }

    /// Register an already-built bundle and log a `BundleLoaded` event.
    pub fn register(&self, bundle: Bundle) -> Arc<Bundle> {
        let bundle = self.registry.insert(bundle);
        self.log.append(
            Event::draft(EventPayload::BundleLoaded {
                attributes: bundle.capture_base().len(),
                overlays: bundle.overlays().len(),
                alias: bundle.alias().map(str::to_string),
            })
            .bundle(bundle.digest()),
        );
        info!(
            digest = %bundle.digest().short(),
            name = bundle.name().unwrap_or_default(),
            "bundle loaded"
        );
        bundle
    }

    /// Bundle named by a computed digest, declared digest or alias.
    pub fn bundle(&self, reference: &str) -> Result<Arc<Bundle>, SessionError> {
        self.registry
            .lookup(reference)
            .ok_or_else(|| SessionError::UnknownBundle {
                reference: reference.to_string(),
            })
    }

    /// An empty dataset for the named bundle, using the configured ingest
    /// options and logging to the session log.
    pub fn dataset(&self, reference: &str) -> Result<Dataset, SessionError> {
        let bundle = self.bundle(reference)?;
        Ok(Dataset::with_log(bundle, self.log.clone()).with_options(self.config.ingest.clone()))
    }

    /// Resolve a crosswalk between two named bundles.
    pub fn resolve(
        &self,
        source: &str,
        target: &str,
        spec: &LinkageSpec,
    ) -> Result<Arc<CrosswalkPlan>, SessionError> {
        let source = self.bundle(source)?;
        self.resolve_from(&source, target, spec)
    }

    fn resolve_from(
        &self,
        source: &Arc<Bundle>,
        target: &str,
        spec: &LinkageSpec,
    ) -> Result<Arc<CrosswalkPlan>, SessionError> {
        let plan = if self.config.use_resolution_cache {
            self.resolver.resolve(source, target, spec)?
        } else {
            self.resolver.resolve_uncached(source, target, spec)?
        };
        Ok(plan)
    }

    pub fn apply(
        &self,
        dataset: &Dataset,
        plan: &CrosswalkPlan,
    ) -> Result<TransformOutcome, SessionError> {
        Ok(apply(dataset, plan, &self.config.transform)?)
    }

    /// Resolve from the dataset's bundle to `target` and apply the plan.
    pub fn transform(
        &self,
        dataset: &Dataset,
        target: &str,
        spec: &LinkageSpec,
    ) -> Result<TransformOutcome, SessionError> {
        let plan = self.resolve_from(dataset.bundle(), target, spec)?;
        self.apply(dataset, &plan)
    }

    /// Publish the resolved crosswalk as a `link` overlay on a new version of
    /// the source bundle. The new bundle has a new digest and is registered;
    /// the original is unchanged.
    pub fn publish_link(
        &self,
        source: &str,
        target: &str,
        spec: &LinkageSpec,
    ) -> Result<Arc<Bundle>, SessionError> {
        let source = self.bundle(source)?;
        let plan = self.resolve_from(&source, target, spec)?;
        let link = link_overlay(&plan)?;
        let published = source.with_link(link)?;
        info!(
            source = %source.digest().short(),
            published = %published.digest().short(),
            "link published"
        );
        Ok(self.register(published))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
