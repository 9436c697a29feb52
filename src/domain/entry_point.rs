//! Entry Point Detection Module
//!
//! Picks the root methods call trees grow from. The policy is a rule table
//! ([`RootRules`]) rather than hard-coded checks so it can be tuned from
//! configuration without touching traversal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::layer::LayerType;
use crate::domain::model::{ClassEntity, CodeGraph, MethodEntity};
use crate::domain::naming;

/// Represents a detected root method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub method_id: String,
    pub class_id: String,
    /// Method name, for display
    pub name: String,
    pub kind: RootKind,
}

/// Which rule selected a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    /// Class or method carries a boundary annotation (`@RestController`, `@GetMapping`)
    BoundaryAnnotation,
    /// A parameter looks like a request carrier (`CreateOrderRequest`, `HttpServletRequest`)
    RequestShape,
    /// Name-pattern fallback (`listOrders`, `handleRefund`)
    ActionName,
}

/// Tunable root-detection policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootRules {
    /// Annotations on the class or method that mark a boundary component.
    #[serde(default = "default_boundary_annotations")]
    pub boundary_annotations: Vec<String>,
    /// Parameter type suffixes that carry an incoming request.
    #[serde(default = "default_request_params")]
    pub request_param_suffixes: Vec<String>,
    /// Verb prefix -> whether it qualifies a method under the name fallback.
    #[serde(default = "default_action_patterns")]
    pub action_patterns: BTreeMap<String, bool>,
    /// Allow the name fallback at all. It is permissive and may pick up
    /// plain service-style methods on entry-layer classes.
    #[serde(default = "default_name_fallback")]
    pub name_fallback: bool,
}

fn default_boundary_annotations() -> Vec<String> {
    [
        "RestController", "Controller", "RequestMapping", "GetMapping", "PostMapping",
        "PutMapping", "DeleteMapping", "PatchMapping", "Path", "GET", "POST", "PUT", "DELETE",
        "WebServlet", "MessageMapping", "KafkaListener", "RabbitListener", "Scheduled",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_request_params() -> Vec<String> {
    [
        "Request", "Req", "Param", "Params", "Form", "Command", "Query", "Dto", "DTO",
        "HttpServletRequest", "ServerRequest", "Pageable",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_action_patterns() -> BTreeMap<String, bool> {
    [
        "get", "list", "create", "update", "remove", "delete", "search", "handle", "process",
        "query", "add", "save", "submit",
    ]
    .iter()
    .map(|p| (p.to_string(), true))
    .collect()
}

fn default_name_fallback() -> bool {
    true
}

impl Default for RootRules {
    fn default() -> Self {
        Self {
            boundary_annotations: default_boundary_annotations(),
            request_param_suffixes: default_request_params(),
            action_patterns: default_action_patterns(),
            name_fallback: default_name_fallback(),
        }
    }
}

/// Root detector
pub struct RootDetector {
    rules: RootRules,
}

impl RootDetector {
    pub fn new(rules: RootRules) -> Self {
        Self { rules }
    }

    /// Detect every root in the graph, ordered by method id.
    pub fn detect(&self, graph: &CodeGraph) -> Vec<EntryPoint> {
        let mut roots = Vec::new();
        for class in graph.classes().filter(|c| c.layer == LayerType::Entry) {
            for method in graph.methods_of(class) {
                if let Some(kind) = self.classify(class, method) {
                    debug!("[Roots] {} selected by {:?}", method.id, kind);
                    roots.push(EntryPoint {
                        method_id: method.id.clone(),
                        class_id: class.id.clone(),
                        name: method.name.clone(),
                        kind,
                    });
                }
            }
        }
        roots.sort_by(|a, b| a.method_id.cmp(&b.method_id));
        info!("[Roots] Detected {} entry points", roots.len());
        roots
    }

    /// Which rule, if any, makes `method` a root.
    pub fn classify(&self, class: &ClassEntity, method: &MethodEntity) -> Option<RootKind> {
        if class.layer != LayerType::Entry || !method.is_public() || method.is_constructor {
            return None;
        }
        if self.has_boundary_annotation(class, method) {
            return Some(RootKind::BoundaryAnnotation);
        }
        if self.has_request_parameter(method) {
            return Some(RootKind::RequestShape);
        }
        if self.rules.name_fallback && self.matches_action(&method.name) {
            return Some(RootKind::ActionName);
        }
        None
    }

    pub fn is_root(&self, class: &ClassEntity, method: &MethodEntity) -> bool {
        self.classify(class, method).is_some()
    }

    fn has_boundary_annotation(&self, class: &ClassEntity, method: &MethodEntity) -> bool {
        let names: Vec<&str> = self.rules.boundary_annotations.iter().map(String::as_str).collect();
        class.has_annotation(&names) || method.has_annotation(&names)
    }

    fn has_request_parameter(&self, method: &MethodEntity) -> bool {
        method.parameters.iter().any(|p| {
            let simple = naming::simple_type_name(p);
            self.rules
                .request_param_suffixes
                .iter()
                .any(|suffix| simple.ends_with(suffix.as_str()))
        })
    }

    fn matches_action(&self, name: &str) -> bool {
        self.rules
            .action_patterns
            .iter()
            .any(|(pattern, enabled)| *enabled && naming::has_verb_prefix(name, pattern))
    }
}

impl Default for RootDetector {
    fn default() -> Self {
        Self::new(RootRules::default())
    }
}
