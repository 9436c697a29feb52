//! Layer & Domain Classifier
//!
//! Assigns a structural layer and a business domain to a class from its
//! static facts. Both are ordered cascades where the first matching signal
//! wins; nothing here has side effects.

use crate::domain::layer::{BusinessDomain, LayerType};
use crate::domain::model::ClassSeed;
use crate::domain::naming;

/// Annotation names mapped to layers, strongest signal first.
const ANNOTATION_RULES: &[(&[&str], LayerType)] = &[
    (
        &[
            "RestController", "Controller", "RequestMapping", "Path", "WebServlet", "Endpoint",
            "RestResource", "MessageMapping", "GrpcService",
        ],
        LayerType::Entry,
    ),
    (&["Service", "DubboService", "Transactional"], LayerType::Service),
    (&["Repository", "Mapper", "Dao"], LayerType::Persistence),
    (
        &[
            "Configuration", "ConfigurationProperties", "SpringBootApplication",
            "EnableAutoConfiguration", "EnableScheduling",
        ],
        LayerType::Configuration,
    ),
    (
        &["Entity", "Table", "Document", "Embeddable", "Data", "Value", "MappedSuperclass"],
        LayerType::DataHolder,
    ),
    (&["Component", "Named", "Aspect", "Singleton"], LayerType::Component),
];

/// Package tokens mapped to layers.
const PACKAGE_RULES: &[(&[&str], LayerType)] = &[
    (&["controller", "web", "rest", "endpoint", "resource", "api", "handler"], LayerType::Entry),
    (&["service", "biz", "business", "application", "usecase", "manager"], LayerType::Service),
    (&["repository", "dao", "mapper", "persistence", "repo", "jpa"], LayerType::Persistence),
    (&["convert", "converter", "assembler", "mapping", "mapstruct"], LayerType::Mapping),
    (&["util", "utils", "helper", "helpers", "tool", "tools", "support"], LayerType::Utility),
    (&["config", "configuration", "bootstrap"], LayerType::Configuration),
    (&["dto", "vo", "po", "bo", "pojo"], LayerType::DataHolder),
    (&["component", "components"], LayerType::Component),
];

/// Packages that hold rich domain types as often as plain records. They only
/// mark a class as a data holder when it has no behaviour to judge by.
const MODEL_PACKAGES: &[&str] = &["entity", "entities", "model", "domain", "bean"];

/// Type-name suffixes mapped to layers. Checked against the simple name
/// after stripping a trailing `Impl`.
const SUFFIX_RULES: &[(&[&str], LayerType)] = &[
    (&["Controller", "Resource", "Endpoint", "Api", "Servlet"], LayerType::Entry),
    (&["Service", "Manager", "Facade", "UseCase", "Biz"], LayerType::Service),
    (&["Repository", "Dao", "DAO", "Mapper", "Repo"], LayerType::Persistence),
    (&["Converter", "Convertor", "Assembler", "Transformer"], LayerType::Mapping),
    (&["Util", "Utils", "Helper", "Tools", "Constants"], LayerType::Utility),
    (&["Config", "Configuration", "Properties", "Application"], LayerType::Configuration),
    (
        &["DTO", "Dto", "VO", "Vo", "PO", "BO", "Entity", "Request", "Response", "Form", "Param"],
        LayerType::DataHolder,
    ),
    (&["Component", "Listener", "Aspect", "Interceptor", "Filter"], LayerType::Component),
];

/// Prefixes some codebases use instead of suffixes.
const PREFIX_RULES: &[(&str, LayerType)] =
    &[("Util", LayerType::Utility), ("Base", LayerType::Component)];

/// Supertype / interface name tokens mapped to layers.
const SUPERTYPE_RULES: &[(&[&str], LayerType)] = &[
    (&["controller", "servlet", "resource"], LayerType::Entry),
    (&["repository", "dao", "mapper"], LayerType::Persistence),
    (&["service"], LayerType::Service),
    (&["converter", "assembler"], LayerType::Mapping),
    (&["configurer", "configuration"], LayerType::Configuration),
];

/// Stateless classifier; see the module docs for the cascade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LayerClassifier;

impl LayerClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, class: &ClassSeed) -> (LayerType, BusinessDomain) {
        let layer = self.classify_layer(class);
        let domain = self.classify_domain(class, layer);
        (layer, domain)
    }

    pub fn classify_layer(&self, class: &ClassSeed) -> LayerType {
        by_annotation(class)
            .or_else(|| by_package(class))
            .or_else(|| by_type_name(class))
            .or_else(|| by_supertype(class))
            .or_else(|| by_method_shape(class))
            .or_else(|| by_model_package(class))
            .unwrap_or(LayerType::Unknown)
    }

    pub fn classify_domain(&self, class: &ClassSeed, layer: LayerType) -> BusinessDomain {
        let package_tokens: Vec<String> = naming::tokenize(class.package_name());
        if let Some(domain) = best_domain(&package_tokens) {
            return domain;
        }
        if let Some(domain) = best_domain(&naming::tokenize(class.simple_name())) {
            return domain;
        }
        let annotation_tokens: Vec<String> = class
            .annotations
            .iter()
            .flat_map(|a| naming::tokenize(a))
            .collect();
        if let Some(domain) = best_domain(&annotation_tokens) {
            return domain;
        }
        match layer {
            LayerType::Configuration => BusinessDomain::System,
            LayerType::Utility => BusinessDomain::Common,
            _ => BusinessDomain::Unknown,
        }
    }
}

/// Domain inference from a bare identifier such as a method name.
pub fn infer_domain_from_name(name: &str) -> BusinessDomain {
    best_domain(&naming::tokenize(name)).unwrap_or(BusinessDomain::Unknown)
}

/// Highest-priority domain whose keywords hit any token.
fn best_domain(tokens: &[String]) -> Option<BusinessDomain> {
    BusinessDomain::ALL
        .iter()
        .copied()
        .filter(|d| naming::any_token_matches(tokens, d.keywords()))
        .max_by_key(|d| d.priority())
}

fn by_annotation(class: &ClassSeed) -> Option<LayerType> {
    ANNOTATION_RULES
        .iter()
        .find(|(names, _)| class.has_annotation(names))
        .map(|(_, layer)| *layer)
}

fn by_package(class: &ClassSeed) -> Option<LayerType> {
    let tokens = naming::tokenize(class.package_name());
    // The innermost package segment is the most specific signal.
    for token in tokens.iter().rev() {
        for (keywords, layer) in PACKAGE_RULES {
            if keywords.iter().any(|k| token == k) {
                return Some(*layer);
            }
        }
    }
    None
}

fn by_model_package(class: &ClassSeed) -> Option<LayerType> {
    if class.methods.iter().any(|m| !m.is_constructor) {
        return None;
    }
    naming::tokenize(class.package_name())
        .iter()
        .any(|t| MODEL_PACKAGES.contains(&t.as_str()))
        .then_some(LayerType::DataHolder)
}

fn by_type_name(class: &ClassSeed) -> Option<LayerType> {
    let name = class.simple_name();
    let base = name.strip_suffix("Impl").unwrap_or(name);
    for (suffixes, layer) in SUFFIX_RULES {
        if suffixes.iter().any(|s| base.ends_with(s) && base.len() >= s.len()) {
            return Some(*layer);
        }
    }
    PREFIX_RULES
        .iter()
        .find(|(prefix, _)| naming::has_verb_prefix(base, prefix) && base.len() > prefix.len())
        .map(|(_, layer)| *layer)
}

fn by_supertype(class: &ClassSeed) -> Option<LayerType> {
    let tokens: Vec<String> = class
        .super_type
        .iter()
        .chain(class.interfaces.iter())
        .flat_map(|t| naming::tokenize(naming::simple_type_name(t)))
        .collect();
    SUPERTYPE_RULES
        .iter()
        .find(|(keywords, _)| naming::any_token_matches(&tokens, keywords))
        .map(|(_, layer)| *layer)
}

fn by_method_shape(class: &ClassSeed) -> Option<LayerType> {
    let methods: Vec<_> = class.methods.iter().filter(|m| !m.is_constructor).collect();
    if methods.is_empty() {
        return None;
    }
    let total = methods.len() as f64;
    let accessors = methods.iter().filter(|m| m.is_accessor()).count();
    if accessors == methods.len() {
        return Some(LayerType::DataHolder);
    }
    let statics = methods.iter().filter(|m| m.is_static).count() as f64;
    if statics / total >= 0.8 {
        return Some(LayerType::Utility);
    }
    let data_access = methods
        .iter()
        .filter(|m| naming::looks_like_data_access(&m.name))
        .count() as f64;
    if data_access / total >= 0.5 {
        return Some(LayerType::Persistence);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MethodSeed;

    fn layer(seed: &ClassSeed) -> LayerType {
        LayerClassifier::new().classify_layer(seed)
    }

    #[test]
    fn test_annotation_beats_package() {
        let seed = ClassSeed::new("com.shop.util.OrderEndpoint").annotated("@RestController");
        assert_eq!(layer(&seed), LayerType::Entry);
    }

    #[test]
    fn test_package_tokens() {
        assert_eq!(layer(&ClassSeed::new("com.shop.service.Checkout")), LayerType::Service);
        assert_eq!(layer(&ClassSeed::new("com.shop.dao.Orders")), LayerType::Persistence);
        assert_eq!(layer(&ClassSeed::new("com.shop.config.Beans")), LayerType::Configuration);
    }

    #[test]
    fn test_domain_package_keeps_behaviour_classes() {
        let service = ClassSeed::new("com.shop.domain.OrderService")
            .method(MethodSeed::public("place").params(&["Order"]));
        assert_eq!(layer(&service), LayerType::Service);

        let aggregate = ClassSeed::new("com.shop.model.Cart")
            .method(MethodSeed::public("addItem").params(&["Item"]))
            .method(MethodSeed::public("checkout").returns("Receipt"));
        assert_eq!(layer(&aggregate), LayerType::Unknown);

        let record = ClassSeed::new("com.shop.entity.Order")
            .method(MethodSeed::public("getId").returns("Long"));
        assert_eq!(layer(&record), LayerType::DataHolder);
        assert_eq!(layer(&ClassSeed::new("com.shop.entity.Marker")), LayerType::DataHolder);
        assert_eq!(layer(&ClassSeed::new("com.shop.dto.OrderView")), LayerType::DataHolder);
    }

    #[test]
    fn test_type_name_suffix() {
        assert_eq!(layer(&ClassSeed::new("OrderServiceImpl")), LayerType::Service);
        assert_eq!(layer(&ClassSeed::new("OrderRepository")), LayerType::Persistence);
        assert_eq!(layer(&ClassSeed::new("OrderConverter")), LayerType::Mapping);
        assert_eq!(layer(&ClassSeed::new("OrderDTO")), LayerType::DataHolder);
        assert_eq!(layer(&ClassSeed::new("UtilDates")), LayerType::Utility);
    }

    #[test]
    fn test_supertype_tokens() {
        let seed = ClassSeed::new("Orders").implements("org.data.JpaRepository<Order, Long>");
        assert_eq!(layer(&seed), LayerType::Persistence);
    }

    #[test]
    fn test_method_shape_fallbacks() {
        let holder = ClassSeed::new("Thing")
            .method(MethodSeed::public("getName").returns("String"))
            .method(MethodSeed::public("setName").params(&["String"]));
        assert_eq!(layer(&holder), LayerType::DataHolder);

        let statics = ClassSeed::new("Maths")
            .method(MethodSeed::public("add").static_method())
            .method(MethodSeed::public("mul").static_method());
        assert_eq!(layer(&statics), LayerType::Utility);

        let store = ClassSeed::new("Ledger")
            .method(MethodSeed::public("findAll"))
            .method(MethodSeed::public("save").params(&["Entry"]))
            .method(MethodSeed::public("reconcile"));
        assert_eq!(layer(&store), LayerType::Persistence);

        assert_eq!(layer(&ClassSeed::new("Thing")), LayerType::Unknown);
    }

    #[test]
    fn test_domain_cascade() {
        let classifier = LayerClassifier::new();
        let seed = ClassSeed::new("com.shop.payment.web.Gateway");
        assert_eq!(classifier.classify(&seed).1, BusinessDomain::Payment);

        let by_name = ClassSeed::new("com.shop.web.UserOrderController");
        assert_eq!(classifier.classify(&by_name).1, BusinessDomain::Order);

        let by_annotation = ClassSeed::new("com.shop.web.Gateway")
            .annotated("@RequestMapping(\"/api/login\")");
        assert_eq!(classifier.classify(&by_annotation).1, BusinessDomain::Auth);

        let config = ClassSeed::new("com.shop.config.Beans");
        assert_eq!(
            classifier.classify(&config),
            (LayerType::Configuration, BusinessDomain::System)
        );

        assert_eq!(classifier.classify(&ClassSeed::new("Thing")).1, BusinessDomain::Unknown);
    }

    #[test]
    fn test_infer_domain_from_name() {
        assert_eq!(infer_domain_from_name("refundInvoice"), BusinessDomain::Payment);
        assert_eq!(infer_domain_from_name("listProducts"), BusinessDomain::Catalog);
        assert_eq!(infer_domain_from_name("doWork"), BusinessDomain::Unknown);
    }
}
