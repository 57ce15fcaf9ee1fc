use super::{Analyzer, Node};
use crate::{
    cache::{self, CacheModel},
    config, Error,
};
use indexmap::IndexMap;

/// Builds an analyzer from its configuration.
pub type Builder = fn(&config::Model) -> Result<Box<dyn Analyzer>, Error>;

/// Analyzer builders by model type.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    builders: IndexMap<String, Builder>,
}

fn base_cache(model: &config::Model) -> Result<Box<dyn Analyzer>, Error> {
    let config: cache::Config = model.params()?;
    if config.max_resource_size.is_some() || config.has_filters() {
        log::warn!(
            "{}: bypass and sharing filters are ignored by {}",
            model.name(),
            model.kind
        );
    }
    let cache = CacheModel::new(model.name(), config, cache::Bypass::Never, Vec::new())?;
    Ok(Box::new(cache))
}

fn intel_cache(model: &config::Model) -> Result<Box<dyn Analyzer>, Error> {
    let config: cache::Config = model.params()?;
    if config.max_resource_size.is_none() {
        return Err(Error::invalid_config(format!(
            "{}: {} requires max-resource-size",
            model.name(),
            model.kind
        )));
    }
    let bypass = cache::Bypass::from_config(&config);
    let cache = CacheModel::new(model.name(), config, bypass, Vec::new())?;
    Ok(Box::new(cache))
}

fn limit_study_cache(model: &config::Model) -> Result<Box<dyn Analyzer>, Error> {
    let config: cache::Config = model.params()?;
    let filters = CacheModel::filters_from_config(&config);
    let cache = CacheModel::new(model.name(), config, cache::Bypass::Never, filters)?;
    Ok(Box::new(cache))
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all built-in cache models.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("BaseCache", base_cache);
        registry.register("IntelCache", intel_cache);
        registry.register("LimitStudyCache", limit_study_cache);
        registry
    }

    /// Registers a builder, replacing any builder of the same name.
    pub fn register(&mut self, name: impl Into<String>, builder: Builder) {
        self.builders.insert(name.into(), builder);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.builders.keys().map(String::as_str)
    }

    /// Builds the analyzer of `model` and all its children.
    pub fn build(&self, model: &config::Model) -> Result<Node, Error> {
        let builder = self
            .builders
            .get(&model.kind)
            .ok_or_else(|| Error::UnknownAnalyzer {
                name: model.kind.clone(),
            })?;
        let analyzer = builder(model)?;
        let children = model
            .children
            .iter()
            .map(|child| self.build(child))
            .collect::<Result<_, _>>()?;
        Ok(Node { analyzer, children })
    }

    pub fn build_all(&self, models: &[config::Model]) -> Result<Vec<Node>, Error> {
        models.iter().map(|model| self.build(model)).collect()
    }
}
