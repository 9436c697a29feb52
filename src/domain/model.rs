//! Graph Entities
//!
//! Inventory seeds supplied by a source extractor, and the class / method /
//! call-edge entities the pipeline builds from them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::layer::{BusinessDomain, LayerType};
use crate::domain::naming;

// ============================================================================
// Inventory seeds
// ============================================================================

/// Visibility of a method as reported by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Package,
    Private,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Package
    }
}

/// A callable member as reported by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSeed {
    pub name: String,
    #[serde(default)]
    pub parameter_types: Vec<String>,
    #[serde(default = "default_return_type")]
    pub return_type: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub annotations: Vec<String>,
}

fn default_return_type() -> String {
    "void".to_string()
}

impl MethodSeed {
    pub fn new(name: &str, visibility: Visibility) -> Self {
        Self {
            name: name.to_string(),
            parameter_types: Vec::new(),
            return_type: default_return_type(),
            visibility,
            is_static: false,
            is_abstract: false,
            is_constructor: false,
            annotations: Vec::new(),
        }
    }

    pub fn public(name: &str) -> Self {
        Self::new(name, Visibility::Public)
    }

    pub fn private(name: &str) -> Self {
        Self::new(name, Visibility::Private)
    }

    pub fn params(mut self, types: &[&str]) -> Self {
        self.parameter_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn returns(mut self, return_type: &str) -> Self {
        self.return_type = return_type.to_string();
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn abstract_method(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn constructor(mut self) -> Self {
        self.is_constructor = true;
        self
    }

    pub fn annotated(mut self, annotation: &str) -> Self {
        self.annotations.push(annotation.to_string());
        self
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn is_accessor(&self) -> bool {
        naming::is_accessor(&self.name, self.parameter_types.len(), &self.return_type)
    }

    pub fn has_annotation(&self, names: &[&str]) -> bool {
        self.annotations
            .iter()
            .any(|a| names.contains(&naming::annotation_name(a)))
    }

    /// Method id within its declaring class.
    pub fn id_in(&self, class_id: &str) -> String {
        method_id(class_id, &self.name, &self.parameter_types)
    }
}

/// Class-qualified signature: `com.shop.OrderService#place(Order,long)`.
pub fn method_id<S: AsRef<str>>(class_id: &str, name: &str, parameter_types: &[S]) -> String {
    let params: Vec<String> = parameter_types
        .iter()
        .map(|p| p.as_ref().split_whitespace().collect::<String>())
        .collect();
    format!("{}#{}({})", class_id, name, params.join(","))
}

/// Bring an extractor-written id such as `A#run(Map<K, V>, int)` into the
/// form [`method_id`] produces.
pub fn canonical_method_id(raw: &str) -> String {
    let raw = raw.trim();
    let Some(inner) = raw.strip_suffix(')') else {
        return raw.to_string();
    };
    let Some(open) = inner.find('(') else {
        return raw.to_string();
    };
    let head: String = inner[..open].split_whitespace().collect();
    let params: String = inner[open + 1..].split_whitespace().collect();
    format!("{}({})", head, params)
}

/// A type as reported by the extractor, with its methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSeed {
    pub qualified_name: String,
    /// Defaults to the qualified name minus its last segment.
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub super_type: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default)]
    pub is_abstract: bool,
    /// Number of instance fields.
    #[serde(default)]
    pub field_count: usize,
    #[serde(default)]
    pub source_path: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodSeed>,
}

impl ClassSeed {
    pub fn new(qualified_name: &str) -> Self {
        Self {
            qualified_name: qualified_name.to_string(),
            package: naming::package_of(qualified_name).to_string(),
            annotations: Vec::new(),
            super_type: None,
            interfaces: Vec::new(),
            is_interface: false,
            is_abstract: false,
            field_count: 0,
            source_path: None,
            methods: Vec::new(),
        }
    }

    pub fn annotated(mut self, annotation: &str) -> Self {
        self.annotations.push(annotation.to_string());
        self
    }

    pub fn extends(mut self, super_type: &str) -> Self {
        self.super_type = Some(super_type.to_string());
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn interface(mut self) -> Self {
        self.is_interface = true;
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn fields(mut self, count: usize) -> Self {
        self.field_count = count;
        self
    }

    pub fn located_at(mut self, path: &str) -> Self {
        self.source_path = Some(path.to_string());
        self
    }

    pub fn method(mut self, method: MethodSeed) -> Self {
        self.methods.push(method);
        self
    }

    pub fn simple_name(&self) -> &str {
        naming::simple_name(&self.qualified_name)
    }

    pub fn package_name(&self) -> &str {
        if self.package.is_empty() {
            naming::package_of(&self.qualified_name)
        } else {
            &self.package
        }
    }

    pub fn has_annotation(&self, names: &[&str]) -> bool {
        self.annotations
            .iter()
            .any(|a| names.contains(&naming::annotation_name(a)))
    }
}

/// How a call edge was resolved by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Direct,
    Static,
    InterfaceDispatch,
    InheritanceDispatch,
    Reflective,
    Reference,
}

impl Default for CallKind {
    fn default() -> Self {
        CallKind::Direct
    }
}

/// A statically resolved call between two method ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEdge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub kind: CallKind,
    #[serde(default = "default_confidence", deserialize_with = "clamped_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

fn clamped_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    f64::deserialize(deserializer).map(|c| c.clamp(0.0, 1.0))
}

impl CallEdge {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            kind: CallKind::Direct,
            confidence: 1.0,
        }
    }

    pub fn with_kind(mut self, kind: CallKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Same edge with both endpoints in canonical id form.
    pub fn canonicalized(&self) -> Self {
        Self {
            from: canonical_method_id(&self.from),
            to: canonical_method_id(&self.to),
            ..self.clone()
        }
    }
}

/// The full extractor output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub classes: Vec<ClassSeed>,
    #[serde(default)]
    pub edges: Vec<CallEdge>,
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntity {
    /// Qualified name.
    pub id: String,
    pub simple_name: String,
    pub package: String,
    pub annotations: Vec<String>,
    pub layer: LayerType,
    pub business_domain: BusinessDomain,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub super_type: Option<String>,
    pub interfaces: Vec<String>,
    pub field_count: usize,
    pub method_ids: Vec<String>,
    pub cross_count: usize,
    pub weight: f64,
}

impl ClassEntity {
    pub fn from_seed(seed: &ClassSeed, layer: LayerType, business_domain: BusinessDomain) -> Self {
        Self {
            id: seed.qualified_name.clone(),
            simple_name: seed.simple_name().to_string(),
            package: seed.package_name().to_string(),
            annotations: seed.annotations.clone(),
            layer,
            business_domain,
            is_interface: seed.is_interface,
            is_abstract: seed.is_abstract,
            super_type: seed.super_type.clone(),
            interfaces: seed.interfaces.clone(),
            field_count: seed.field_count,
            method_ids: Vec::new(),
            cross_count: 0,
            weight: 0.0,
        }
    }

    pub fn has_annotation(&self, names: &[&str]) -> bool {
        self.annotations
            .iter()
            .any(|a| names.contains(&naming::annotation_name(a)))
    }

    /// True if `type_name` (qualified or simple) names this class.
    pub fn is_named(&self, type_name: &str) -> bool {
        let bare = type_name.split('<').next().unwrap_or(type_name).trim();
        bare == self.id || (!bare.contains('.') && bare == self.simple_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodEntity {
    pub id: String,
    pub class_id: String,
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_constructor: bool,
    pub annotations: Vec<String>,
    pub cross_count: usize,
    pub weight: f64,
    pub tree_ids: BTreeSet<String>,
    pub is_root_node: bool,
}

impl MethodEntity {
    pub fn from_seed(class_id: &str, seed: &MethodSeed) -> Self {
        Self {
            id: seed.id_in(class_id),
            class_id: class_id.to_string(),
            name: seed.name.clone(),
            return_type: seed.return_type.clone(),
            parameters: seed.parameter_types.clone(),
            visibility: seed.visibility,
            is_static: seed.is_static,
            is_abstract: seed.is_abstract,
            is_constructor: seed.is_constructor,
            annotations: seed.annotations.clone(),
            cross_count: 0,
            weight: 0.0,
            tree_ids: BTreeSet::new(),
            is_root_node: false,
        }
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn is_accessor(&self) -> bool {
        naming::is_accessor(&self.name, self.parameters.len(), &self.return_type)
    }

    /// Worth following during tree expansion.
    pub fn is_business_method(&self) -> bool {
        !self.is_constructor && !self.is_accessor() && !naming::is_base_object_method(&self.name)
    }

    pub fn has_annotation(&self, names: &[&str]) -> bool {
        self.annotations
            .iter()
            .any(|a| names.contains(&naming::annotation_name(a)))
    }
}

// ============================================================================
// CodeGraph - admitted entities plus adjacency indexes
// ============================================================================

/// Classes, methods and call edges admitted into analysis.
///
/// Maps are ordered by id so every traversal over the graph is deterministic.
#[derive(Debug, Clone, Default)]
pub struct CodeGraph {
    classes: BTreeMap<String, ClassEntity>,
    methods: BTreeMap<String, MethodEntity>,
    edges: Vec<CallEdge>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl CodeGraph {
    /// Assemble a graph. Edges are kept even when an endpoint is missing;
    /// traversal simply never follows them.
    pub fn new(
        classes: Vec<ClassEntity>,
        methods: Vec<MethodEntity>,
        edges: Vec<CallEdge>,
    ) -> Self {
        let mut class_map: BTreeMap<String, ClassEntity> =
            classes.into_iter().map(|c| (c.id.clone(), c)).collect();
        let method_map: BTreeMap<String, MethodEntity> =
            methods.into_iter().map(|m| (m.id.clone(), m)).collect();

        for class in class_map.values_mut() {
            class.method_ids.clear();
        }
        for method in method_map.values() {
            if let Some(class) = class_map.get_mut(&method.class_id) {
                class.method_ids.push(method.id.clone());
            }
        }

        let mut graph = Self {
            classes: class_map,
            methods: method_map,
            edges,
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
        };
        graph.reindex();
        graph
    }

    fn reindex(&mut self) {
        self.outgoing.clear();
        self.incoming.clear();
        for (idx, edge) in self.edges.iter().enumerate() {
            self.outgoing.entry(edge.from.clone()).or_default().push(idx);
            self.incoming.entry(edge.to.clone()).or_default().push(idx);
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassEntity> {
        self.classes.values()
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodEntity> {
        self.methods.values()
    }

    pub fn edges(&self) -> &[CallEdge] {
        &self.edges
    }

    pub fn class(&self, id: &str) -> Option<&ClassEntity> {
        self.classes.get(id)
    }

    pub fn method(&self, id: &str) -> Option<&MethodEntity> {
        self.methods.get(id)
    }

    pub fn class_mut(&mut self, id: &str) -> Option<&mut ClassEntity> {
        self.classes.get_mut(id)
    }

    pub fn method_mut(&mut self, id: &str) -> Option<&mut MethodEntity> {
        self.methods.get_mut(id)
    }

    pub fn classes_mut(&mut self) -> impl Iterator<Item = &mut ClassEntity> {
        self.classes.values_mut()
    }

    pub fn methods_mut(&mut self) -> impl Iterator<Item = &mut MethodEntity> {
        self.methods.values_mut()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn contains_method(&self, id: &str) -> bool {
        self.methods.contains_key(id)
    }

    /// Declaring class of a method.
    pub fn class_of(&self, method_id: &str) -> Option<&ClassEntity> {
        self.methods
            .get(method_id)
            .and_then(|m| self.classes.get(&m.class_id))
    }

    pub fn layer_of(&self, method_id: &str) -> LayerType {
        self.class_of(method_id)
            .map(|c| c.layer)
            .unwrap_or(LayerType::Unknown)
    }

    pub fn domain_of(&self, method_id: &str) -> BusinessDomain {
        self.class_of(method_id)
            .map(|c| c.business_domain)
            .unwrap_or(BusinessDomain::Unknown)
    }

    pub fn methods_of<'a>(
        &'a self,
        class: &'a ClassEntity,
    ) -> impl Iterator<Item = &'a MethodEntity> + 'a {
        class.method_ids.iter().filter_map(move |id| self.methods.get(id))
    }

    /// Outgoing edges in insertion order.
    pub fn outgoing(&self, method_id: &str) -> impl Iterator<Item = &CallEdge> {
        self.outgoing
            .get(method_id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.edges[idx])
    }

    pub fn out_degree(&self, method_id: &str) -> usize {
        self.outgoing.get(method_id).map(Vec::len).unwrap_or(0)
    }

    pub fn in_degree(&self, method_id: &str) -> usize {
        self.incoming.get(method_id).map(Vec::len).unwrap_or(0)
    }

    /// Find a class by qualified name, falling back to a unique simple-name match.
    pub fn find_class(&self, type_name: &str) -> Option<&ClassEntity> {
        if let Some(class) = self.classes.get(type_name) {
            return Some(class);
        }
        let mut matches = self.classes.values().filter(|c| c.is_named(type_name));
        let first = matches.next()?;
        match matches.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// Remove a method together with every edge touching it.
    pub fn remove_method(&mut self, method_id: &str) -> Option<MethodEntity> {
        let removed = self.methods.remove(method_id)?;
        if let Some(class) = self.classes.get_mut(&removed.class_id) {
            class.method_ids.retain(|id| id != method_id);
        }
        self.edges.retain(|e| e.from != method_id && e.to != method_id);
        self.reindex();
        Some(removed)
    }

    /// Consume the graph into its entity lists.
    pub fn into_parts(self) -> (Vec<ClassEntity>, Vec<MethodEntity>, Vec<CallEdge>) {
        (
            self.classes.into_values().collect(),
            self.methods.into_values().collect(),
            self.edges,
        )
    }
}
