//! Named, compiled-in insight implementations and post-processors
//!
//! Definition files refer to procedural insights and post-processors by name;
//! the catalog resolves those names at load time.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::filter::FilterEngine;

use super::android_crash::{self, AndroidCrashAnalyzer};
use super::engine::Insight;
use super::processors::{JsonProcessor, MatchReport, MatchSummary, PostProcessor};

/// Builds a procedural insight bound to the engine's filter engine
pub type InsightFactory = Arc<dyn Fn(&FilterEngine) -> Arc<dyn Insight> + Send + Sync>;

#[derive(Clone, Default)]
pub struct InsightCatalog {
    implementations: BTreeMap<String, InsightFactory>,
    processors: BTreeMap<String, Arc<dyn PostProcessor>>,
}

impl InsightCatalog {
    /// Empty catalog (no procedural insights, no processors)
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every built-in insight and processor registered
    pub fn builtin() -> Self {
        let mut catalog = Self::new();

        catalog.register_implementation(android_crash::IMPLEMENTATION, |engine| {
            Arc::new(AndroidCrashAnalyzer::new(engine.clone()))
        });

        catalog.register_processor(Arc::new(MatchReport));
        catalog.register_processor(Arc::new(MatchSummary));
        catalog.register_processor(Arc::new(JsonProcessor));

        catalog
    }

    /// Register a procedural insight under a name
    pub fn register_implementation<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&FilterEngine) -> Arc<dyn Insight> + Send + Sync + 'static,
    {
        self.implementations.insert(name.into(), Arc::new(factory));
    }

    /// Register a post-processor under its own name
    pub fn register_processor(&mut self, processor: Arc<dyn PostProcessor>) {
        self.processors
            .insert(processor.name().to_string(), processor);
    }

    pub fn implementation(&self, name: &str) -> Option<&InsightFactory> {
        self.implementations.get(name)
    }

    pub fn processor(&self, name: &str) -> Option<Arc<dyn PostProcessor>> {
        self.processors.get(name).cloned()
    }

    pub fn implementation_names(&self) -> Vec<&str> {
        self.implementations.keys().map(String::as_str).collect()
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.keys().map(String::as_str).collect()
    }
}
