//! Node Filter
//!
//! Decides which classes and methods are admitted into the graph. Decisions
//! are pure; the assembly stage tallies them into [`FilterStats`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::layer::LayerType;
use crate::domain::model::{ClassSeed, MethodSeed};
use crate::domain::naming;

const TEST_ANNOTATIONS: &[&str] = &[
    "Test", "ParameterizedTest", "RepeatedTest", "TestFactory", "BeforeEach", "AfterEach",
    "BeforeAll", "AfterAll", "Before", "After", "SpringBootTest", "WebMvcTest", "DataJpaTest",
    "RunWith", "ExtendWith",
];

const LIFECYCLE_ANNOTATIONS: &[&str] = &["PostConstruct", "PreDestroy"];

const LIFECYCLE_METHODS: &[&str] = &[
    "afterPropertiesSet", "destroy", "setApplicationContext", "setBeanFactory", "setBeanName",
    "setEnvironment", "setResourceLoader", "onApplicationEvent", "afterSingletonsInstantiated",
];

const DATA_ACCESS_ANNOTATIONS: &[&str] = &[
    "Query", "Select", "Insert", "Update", "Delete", "Modifying", "NativeQuery", "SelectProvider",
];

/// Name suffixes of transfer objects.
const TRANSFER_SUFFIXES: &[&str] = &[
    "DTO", "Dto", "VO", "Vo", "PO", "BO", "Request", "Response", "Form", "Payload",
];

/// Package tokens of transfer objects.
const TRANSFER_PACKAGES: &[&str] = &["dto", "vo", "po", "payload"];

/// Why a class or method was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    TestCode,
    DataHolder,
    TransferObject,
    AccessorOnly,
    BaseObjectMethod,
    LifecycleMethod,
    Accessor,
    NotDataAccess,
    NotStatelessUtility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Drop test classes and test methods.
    #[serde(default = "default_true")]
    pub exclude_test_code: bool,
    /// Drop accessor-shaped methods outside the entry layer.
    #[serde(default = "default_true")]
    pub exclude_accessors: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_test_code: true,
            exclude_accessors: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    config: FilterConfig,
}

impl NodeFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn include_class(&self, class: &ClassSeed, layer: LayerType) -> bool {
        self.class_exclusion(class, layer).is_none()
    }

    pub fn include_method(&self, method: &MethodSeed, class: &ClassSeed, layer: LayerType) -> bool {
        self.method_exclusion(method, class, layer).is_none()
    }

    pub fn class_exclusion(&self, class: &ClassSeed, layer: LayerType) -> Option<ExclusionReason> {
        if self.config.exclude_test_code && is_test_class(class) {
            return Some(ExclusionReason::TestCode);
        }
        if layer == LayerType::DataHolder {
            return Some(ExclusionReason::DataHolder);
        }
        if !class.is_interface && is_transfer_object(class) {
            return Some(ExclusionReason::TransferObject);
        }
        let members: Vec<&MethodSeed> =
            class.methods.iter().filter(|m| !m.is_constructor).collect();
        if !class.is_interface && !members.is_empty() && members.iter().all(|m| m.is_accessor()) {
            return Some(ExclusionReason::AccessorOnly);
        }
        None
    }

    pub fn method_exclusion(
        &self,
        method: &MethodSeed,
        class: &ClassSeed,
        layer: LayerType,
    ) -> Option<ExclusionReason> {
        if naming::is_base_object_method(&method.name) {
            return Some(ExclusionReason::BaseObjectMethod);
        }
        if self.config.exclude_test_code && method.has_annotation(TEST_ANNOTATIONS) {
            return Some(ExclusionReason::TestCode);
        }
        if method.has_annotation(LIFECYCLE_ANNOTATIONS)
            || LIFECYCLE_METHODS.contains(&method.name.as_str())
        {
            return Some(ExclusionReason::LifecycleMethod);
        }
        if self.config.exclude_accessors && layer != LayerType::Entry && method.is_accessor() {
            return Some(ExclusionReason::Accessor);
        }
        match layer {
            LayerType::Persistence if !method.is_constructor => {
                if !naming::looks_like_data_access(&method.name)
                    && !method.has_annotation(DATA_ACCESS_ANNOTATIONS)
                {
                    return Some(ExclusionReason::NotDataAccess);
                }
            }
            LayerType::Utility => {
                let stateless = method.is_static || class.field_count == 0;
                if !method.is_public() || !stateless {
                    return Some(ExclusionReason::NotStatelessUtility);
                }
            }
            _ => {}
        }
        None
    }
}

fn is_test_class(class: &ClassSeed) -> bool {
    let name = class.simple_name();
    if name.ends_with("Test")
        || name.ends_with("Tests")
        || name.ends_with("IT")
        || (naming::has_verb_prefix(name, "Test") && name.len() > 4)
    {
        return true;
    }
    if naming::tokenize(class.package_name())
        .iter()
        .any(|t| t == "test" || t == "tests")
    {
        return true;
    }
    if let Some(path) = &class.source_path {
        let normalized = path.replace('\\', "/");
        if normalized.contains("/test/")
            || normalized.contains("/tests/")
            || normalized.starts_with("test/")
        {
            return true;
        }
    }
    class.has_annotation(TEST_ANNOTATIONS)
}

fn is_transfer_object(class: &ClassSeed) -> bool {
    let name = class.simple_name();
    if TRANSFER_SUFFIXES.iter().any(|s| name.ends_with(s) && name.len() > s.len()) {
        return true;
    }
    naming::tokenize(class.package_name())
        .iter()
        .any(|t| TRANSFER_PACKAGES.contains(&t.as_str()))
}

/// Inclusion tallies for one assembly run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    pub total_classes: usize,
    pub included_classes: usize,
    pub excluded_classes: usize,
    pub total_methods: usize,
    pub included_methods: usize,
    pub excluded_methods: usize,
    pub exclusion_reasons: BTreeMap<ExclusionReason, usize>,
}

impl FilterStats {
    pub fn record_class(&mut self, exclusion: Option<ExclusionReason>) {
        self.total_classes += 1;
        match exclusion {
            Some(reason) => {
                self.excluded_classes += 1;
                *self.exclusion_reasons.entry(reason).or_default() += 1;
            }
            None => self.included_classes += 1,
        }
    }

    pub fn record_method(&mut self, exclusion: Option<ExclusionReason>) {
        self.total_methods += 1;
        match exclusion {
            Some(reason) => {
                self.excluded_methods += 1;
                *self.exclusion_reasons.entry(reason).or_default() += 1;
            }
            None => self.included_methods += 1,
        }
    }

    pub fn class_inclusion_ratio(&self) -> f64 {
        ratio(self.included_classes, self.total_classes)
    }

    pub fn method_inclusion_ratio(&self) -> f64 {
        ratio(self.included_methods, self.total_methods)
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
