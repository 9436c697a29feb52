//! Interface-Implementation Resolver
//!
//! Links abstract method declarations to their concrete implementations by
//! structural signature matching, so tree traversal can continue past a call
//! that lands on an interface.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::model::{ClassEntity, CodeGraph, MethodEntity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    /// Implementation of an interface method.
    Interface,
    /// Override of an abstract method declared on a base class.
    Inheritance,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImplementationMapping {
    pub abstract_class_id: String,
    pub abstract_method_id: String,
    pub implementation_class_id: String,
    pub implementation_method_id: String,
    pub kind: MappingKind,
}

/// A mapping dropped by validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverWarning {
    pub abstract_method_id: String,
    pub implementation_method_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingValidation {
    pub kept: Vec<ImplementationMapping>,
    pub warnings: Vec<ResolverWarning>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Package prefixes treated as standard library and stripped before comparison.
    #[serde(default = "default_std_prefixes")]
    pub std_prefixes: Vec<String>,
    /// Also resolve abstract methods of abstract base classes.
    #[serde(default = "default_resolve_inheritance")]
    pub resolve_inheritance: bool,
}

fn default_std_prefixes() -> Vec<String> {
    vec!["java.".to_string(), "javax.".to_string(), "kotlin.".to_string()]
}

fn default_resolve_inheritance() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            std_prefixes: default_std_prefixes(),
            resolve_inheritance: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InterfaceResolver {
    config: ResolverConfig,
}

impl InterfaceResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Find every abstract-to-concrete mapping in the graph, validated.
    pub fn resolve(&self, graph: &CodeGraph) -> Vec<ImplementationMapping> {
        self.resolve_with_warnings(graph).kept
    }

    /// Like [`resolve`](Self::resolve), but also returns the mappings the
    /// validation pass discarded.
    pub fn resolve_with_warnings(&self, graph: &CodeGraph) -> MappingValidation {
        let mut candidates = Vec::new();

        for base in graph.classes() {
            let kind = if base.is_interface {
                MappingKind::Interface
            } else if base.is_abstract && self.config.resolve_inheritance {
                MappingKind::Inheritance
            } else {
                continue;
            };

            let abstract_methods: Vec<&MethodEntity> = graph
                .methods_of(base)
                .filter(|m| is_abstract_member(base, m))
                .collect();
            if abstract_methods.is_empty() {
                continue;
            }

            let implementors: Vec<&ClassEntity> = graph
                .classes()
                .filter(|c| c.id != base.id && !c.is_interface && declares_parent(c, base, kind))
                .collect();
            if implementors.is_empty() {
                debug!("[Resolver] No implementations for {}", base.id);
                continue;
            }

            for declared in &abstract_methods {
                let mut matched = false;
                for implementor in &implementors {
                    for candidate in graph.methods_of(implementor) {
                        if self.signatures_match(declared, candidate) {
                            matched = true;
                            candidates.push(ImplementationMapping {
                                abstract_class_id: base.id.clone(),
                                abstract_method_id: declared.id.clone(),
                                implementation_class_id: implementor.id.clone(),
                                implementation_method_id: candidate.id.clone(),
                                kind,
                            });
                        }
                    }
                }
                if !matched {
                    debug!("[Resolver] No matching signature for {}", declared.id);
                }
            }
        }

        let validation = self.validate(graph, candidates);
        for warning in &validation.warnings {
            warn!(
                "[Resolver] Discarded mapping {} -> {}: {}",
                warning.abstract_method_id, warning.implementation_method_id, warning.message
            );
        }
        info!("[Resolver] {} implementation mappings", validation.kept.len());
        validation
    }

    /// Re-check mappings against the live graph. Mappings whose methods are
    /// gone or whose signatures no longer line up become warnings.
    pub fn validate(
        &self,
        graph: &CodeGraph,
        mappings: Vec<ImplementationMapping>,
    ) -> MappingValidation {
        let mut result = MappingValidation::default();
        let mut seen = HashSet::new();

        for mapping in mappings {
            let key = (
                mapping.abstract_method_id.clone(),
                mapping.implementation_method_id.clone(),
            );
            if !seen.insert(key) {
                continue;
            }
            let declared = graph.method(&mapping.abstract_method_id);
            let implementation = graph.method(&mapping.implementation_method_id);
            let problem = match (declared, implementation) {
                (None, _) => Some("abstract method no longer exists"),
                (_, None) => Some("implementation method no longer exists"),
                (Some(d), Some(i)) if !self.signatures_match(d, i) => {
                    Some("signatures are no longer compatible")
                }
                _ => None,
            };
            match problem {
                Some(message) => result.warnings.push(ResolverWarning {
                    abstract_method_id: mapping.abstract_method_id,
                    implementation_method_id: mapping.implementation_method_id,
                    message: message.to_string(),
                }),
                None => result.kept.push(mapping),
            }
        }
        result
    }

    /// Same name, same arity, compatible parameters and return type, public.
    pub fn signatures_match(&self, declared: &MethodEntity, candidate: &MethodEntity) -> bool {
        if declared.name != candidate.name
            || declared.parameters.len() != candidate.parameters.len()
            || !candidate.is_public()
            || candidate.is_abstract
            || candidate.is_static
        {
            return false;
        }
        let params_ok = declared
            .parameters
            .iter()
            .zip(&candidate.parameters)
            .all(|(d, c)| self.types_compatible(d, c));
        params_ok && self.types_compatible(&declared.return_type, &candidate.return_type)
    }

    /// Compare a declared type against an implementation's type after
    /// normalization. Type variables and `Object` on the declared side accept
    /// anything.
    pub fn types_compatible(&self, declared: &str, candidate: &str) -> bool {
        let d = self.normalize_type(declared);
        let c = self.normalize_type(candidate);
        if d == c {
            return true;
        }
        let d_parts = type_parts(&d);
        let c_parts = type_parts(&c);
        d_parts.len() == c_parts.len()
            && d_parts
                .iter()
                .zip(&c_parts)
                .all(|(dp, cp)| dp == cp || is_wildcard(dp))
    }

    /// Strip standard-library qualification and whitespace:
    /// `java.util.List<java.lang.Long>` -> `List<Long>`.
    pub fn normalize_type(&self, type_name: &str) -> String {
        let compact: String = type_name.split_whitespace().collect();
        let mut out = String::with_capacity(compact.len());
        let mut token = String::new();
        for c in compact.chars() {
            if c.is_alphanumeric() || c == '.' || c == '_' || c == '$' {
                token.push(c);
            } else {
                out.push_str(&self.strip_std(&token));
                token.clear();
                out.push(c);
            }
        }
        out.push_str(&self.strip_std(&token));
        out
    }

    fn strip_std(&self, token: &str) -> String {
        if self.config.std_prefixes.iter().any(|p| token.starts_with(p.as_str())) {
            token.rsplit('.').next().unwrap_or(token).to_string()
        } else {
            token.to_string()
        }
    }
}

fn is_abstract_member(base: &ClassEntity, method: &MethodEntity) -> bool {
    if method.is_constructor || method.is_static {
        return false;
    }
    method.is_abstract || base.is_interface
}

fn declares_parent(class: &ClassEntity, base: &ClassEntity, kind: MappingKind) -> bool {
    match kind {
        MappingKind::Interface => class.interfaces.iter().any(|i| base.is_named(i)),
        MappingKind::Inheritance => {
            class.super_type.as_deref().map(|s| base.is_named(s)).unwrap_or(false)
        }
    }
}

/// Split a normalized type into identifiers and single punctuation marks.
fn type_parts(t: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = None;
    for (idx, c) in t.char_indices() {
        let ident = c.is_alphanumeric() || c == '.' || c == '_' || c == '$';
        match (ident, start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                parts.push(&t[s..idx]);
                parts.push(&t[idx..idx + c.len_utf8()]);
                start = None;
            }
            (false, None) => parts.push(&t[idx..idx + c.len_utf8()]),
            (true, Some(_)) => {}
        }
    }
    if let Some(s) = start {
        parts.push(&t[s..]);
    }
    parts
}

fn is_wildcard(part: &str) -> bool {
    part == "Object" || part == "?" || is_type_variable(part)
}

fn is_type_variable(t: &str) -> bool {
    let mut chars = t.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_uppercase())
}

/// Abstract method id -> implementation method ids, for traversal.
#[derive(Debug, Clone, Default)]
pub struct ImplementationIndex {
    by_abstract: BTreeMap<String, Vec<String>>,
}

impl ImplementationIndex {
    pub fn new(mappings: &[ImplementationMapping]) -> Self {
        let mut by_abstract: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for mapping in mappings {
            let targets = by_abstract.entry(mapping.abstract_method_id.clone()).or_default();
            if !targets.contains(&mapping.implementation_method_id) {
                targets.push(mapping.implementation_method_id.clone());
            }
        }
        for targets in by_abstract.values_mut() {
            targets.sort();
        }
        Self { by_abstract }
    }

    pub fn implementations(&self, method_id: &str) -> &[String] {
        self.by_abstract
            .get(method_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_abstract.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_abstract.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::layer::{BusinessDomain, LayerType};
    use crate::domain::model::{ClassSeed, MethodSeed};

    fn graph_from(seeds: Vec<ClassSeed>) -> CodeGraph {
        let mut classes = Vec::new();
        let mut methods = Vec::new();
        for seed in &seeds {
            let class = ClassEntity::from_seed(seed, LayerType::Persistence, BusinessDomain::Order);
            for m in &seed.methods {
                methods.push(MethodEntity::from_seed(&class.id, m));
            }
            classes.push(class);
        }
        CodeGraph::new(classes, methods, Vec::new())
    }

    fn repo_graph() -> CodeGraph {
        graph_from(vec![
            ClassSeed::new("com.shop.Repo").interface().method(
                MethodSeed::public("save")
                    .params(&["Order"])
                    .returns("void")
                    .abstract_method(),
            ),
            ClassSeed::new("com.shop.RepoImpl")
                .implements("Repo")
                .method(MethodSeed::public("save").params(&["Order"]))
                .method(MethodSeed::public("save").params(&["Order", "boolean"])),
        ])
    }

    #[test]
    fn test_single_implementation_mapping() {
        let mappings = InterfaceResolver::default().resolve(&repo_graph());
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].abstract_method_id, "com.shop.Repo#save(Order)");
        assert_eq!(mappings[0].implementation_method_id, "com.shop.RepoImpl#save(Order)");
        assert_eq!(mappings[0].kind, MappingKind::Interface);
    }

    #[test]
    fn test_std_qualification_and_generics() {
        let graph = graph_from(vec![
            ClassSeed::new("com.shop.Finder").interface().method(
                MethodSeed::public("find")
                    .params(&["java.lang.Long", "T"])
                    .returns("java.util.List<T>"),
            ),
            ClassSeed::new("com.shop.OrderFinder")
                .implements("com.shop.Finder")
                .method(
                    MethodSeed::public("find")
                        .params(&["Long", "Order"])
                        .returns("List<Order>"),
                ),
        ]);
        let resolver = InterfaceResolver::default();
        assert_eq!(
            resolver.normalize_type("java.util.Map<java.lang.String, com.x.Y>"),
            "Map<String,com.x.Y>"
        );
        let mappings = resolver.resolve(&graph);
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].implementation_method_id, "com.shop.OrderFinder#find(Long,Order)");
        assert!(resolver.types_compatible("T", "Order"));
        assert!(resolver.types_compatible("java.util.Map<K,V>", "Map<String,Order>"));
        assert!(!resolver.types_compatible("List<T>", "Set<Order>"));
        assert!(resolver.types_compatible("java.lang.Object", "Order"));
        assert!(!resolver.types_compatible("Order", "Invoice"));
    }

    #[test]
    fn test_non_public_implementation_rejected() {
        let graph = graph_from(vec![
            ClassSeed::new("com.shop.Repo")
                .interface()
                .method(MethodSeed::public("save").params(&["Order"])),
            ClassSeed::new("com.shop.RepoImpl")
                .implements("Repo")
                .method(MethodSeed::private("save").params(&["Order"])),
        ]);
        assert!(InterfaceResolver::default().resolve(&graph).is_empty());
    }

    #[test]
    fn test_inheritance_mapping() {
        let graph = graph_from(vec![
            ClassSeed::new("com.shop.BaseJob")
                .abstract_class()
                .method(MethodSeed::public("execute").abstract_method())
                .method(MethodSeed::public("schedule")),
            ClassSeed::new("com.shop.CleanupJob")
                .extends("com.shop.BaseJob")
                .method(MethodSeed::public("execute")),
        ]);
        let mappings = InterfaceResolver::default().resolve(&graph);
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].kind, MappingKind::Inheritance);

        let without = InterfaceResolver::new(ResolverConfig {
            resolve_inheritance: false,
            ..ResolverConfig::default()
        });
        assert!(without.resolve(&graph).is_empty());
    }

    #[test]
    fn test_validation_discards_stale_mappings() {
        let mut graph = repo_graph();
        let resolver = InterfaceResolver::default();
        let mappings = resolver.resolve(&graph);
        graph.remove_method("com.shop.RepoImpl#save(Order)");

        let validation = resolver.validate(&graph, mappings);
        assert!(validation.kept.is_empty());
        assert_eq!(validation.warnings.len(), 1);
        assert!(validation.warnings[0].message.contains("no longer exists"));
    }

    #[test]
    fn test_implementation_index() {
        let mappings = InterfaceResolver::default().resolve(&repo_graph());
        let index = ImplementationIndex::new(&mappings);
        assert_eq!(
            index.implementations("com.shop.Repo#save(Order)"),
            ["com.shop.RepoImpl#save(Order)"]
        );
        assert!(index.implementations("com.shop.RepoImpl#save(Order)").is_empty());
        assert_eq!(index.len(), 1);
    }
}
