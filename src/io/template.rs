//! Graph template store and placeholder substitution
//!
//! Placeholders follow the `$name` / `${name}` convention, `$$` is a literal
//! dollar. A placeholder without a value is an error; values nobody refers to
//! are ignored.

use crate::io::graph::JobGraph;
use crate::types::{SarError, SarResult};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};

/// Variable name to substituted value
pub type Substitutions = BTreeMap<String, String>;

const PLACEHOLDER_PATTERN: &str =
    r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))";

const BUNDLED_TEMPLATE: &str = include_str!("../../template/snap_polarimetry_graph.xml");

/// Resolves placeholders in single strings
pub struct PlaceholderRenderer {
    pattern: Regex,
}

impl PlaceholderRenderer {
    pub fn new() -> SarResult<Self> {
        let pattern = Regex::new(PLACEHOLDER_PATTERN)
            .map_err(|e| SarError::Processing(format!("Regex error: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Replace every placeholder in `text` with its value
    pub fn render(&self, text: &str, substitutions: &Substitutions) -> SarResult<String> {
        let mut failure: Option<SarError> = None;

        let rendered = self.pattern.replace_all(text, |caps: &Captures| {
            if caps.name("escaped").is_some() {
                return "$".to_string();
            }
            match caps.name("named").or_else(|| caps.name("braced")) {
                Some(name) => match substitutions.get(name.as_str()) {
                    Some(value) => value.clone(),
                    None => {
                        failure.get_or_insert_with(|| {
                            SarError::Template(format!(
                                "Variable '{}' is not defined",
                                name.as_str()
                            ))
                        });
                        String::new()
                    }
                },
                None => {
                    let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
                    failure.get_or_insert_with(|| {
                        SarError::Template(format!(
                            "Invalid placeholder at offset {} in '{}'",
                            offset, text
                        ))
                    });
                    String::new()
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(rendered.into_owned()),
        }
    }

    /// Names referenced by placeholders in `text`
    pub fn variables(&self, text: &str) -> Vec<String> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| caps.name("named").or_else(|| caps.name("braced")))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl JobGraph {
    /// Copy of the graph with every placeholder resolved
    pub fn substitute(&self, substitutions: &Substitutions) -> SarResult<JobGraph> {
        let renderer = PlaceholderRenderer::new()?;
        self.try_map_parameters(|value| renderer.render(value, substitutions))
    }

    /// Resolve placeholders and serialize for the engine
    pub fn render(&self, substitutions: &Substitutions) -> SarResult<String> {
        self.substitute(substitutions)?.to_xml()
    }

    /// Every placeholder name still present in the parameter blocks
    pub fn variables(&self) -> SarResult<BTreeSet<String>> {
        let renderer = PlaceholderRenderer::new()?;
        let mut names = BTreeSet::new();
        self.try_map_parameters(|value| {
            names.extend(renderer.variables(value));
            Ok(value.to_string())
        })?;
        Ok(names)
    }
}

/// Immutable job-graph template; every job works on its own copy
#[derive(Debug, Clone)]
pub struct GraphTemplate {
    graph: JobGraph,
}

impl GraphTemplate {
    /// Template shipped with the crate
    pub fn bundled() -> SarResult<Self> {
        Self::from_xml(BUNDLED_TEMPLATE)
    }

    pub fn from_xml(xml: &str) -> SarResult<Self> {
        let graph = JobGraph::from_xml(xml)?;
        graph.validate_links()?;
        Ok(Self { graph })
    }

    pub fn graph(&self) -> &JobGraph {
        &self.graph
    }

    /// Fresh, job-local copy of the template graph
    pub fn instantiate(&self) -> JobGraph {
        self.graph.clone()
    }
}
