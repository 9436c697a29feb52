/// Layer & Domain Vocabulary
///
/// Structural layers and business domains assigned to classes, with the
/// fixed weights and priorities the rest of the pipeline reads.

use serde::{Deserialize, Serialize};

/// Coarse structural role of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    Entry,
    Service,
    Persistence,
    Mapping,
    Utility,
    Configuration,
    Component,
    DataHolder,
    Unknown,
}

impl LayerType {
    pub const ALL: [LayerType; 9] = [
        LayerType::Entry,
        LayerType::Service,
        LayerType::Persistence,
        LayerType::Mapping,
        LayerType::Utility,
        LayerType::Configuration,
        LayerType::Component,
        LayerType::DataHolder,
        LayerType::Unknown,
    ];

    /// Parse a layer name as typed on the command line.
    pub fn parse(s: &str) -> Option<LayerType> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "entry" | "boundary" | "controller" => Some(LayerType::Entry),
            "service" => Some(LayerType::Service),
            "persistence" | "repository" | "dao" => Some(LayerType::Persistence),
            "mapping" | "mapper" => Some(LayerType::Mapping),
            "utility" | "util" => Some(LayerType::Utility),
            "configuration" | "config" => Some(LayerType::Configuration),
            "component" => Some(LayerType::Component),
            "data_holder" | "dataholder" | "dto" => Some(LayerType::DataHolder),
            "unknown" => Some(LayerType::Unknown),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LayerType::Entry => "entry",
            LayerType::Service => "service",
            LayerType::Persistence => "persistence",
            LayerType::Mapping => "mapping",
            LayerType::Utility => "utility",
            LayerType::Configuration => "configuration",
            LayerType::Component => "component",
            LayerType::DataHolder => "data_holder",
            LayerType::Unknown => "unknown",
        }
    }

    /// Base score a method inherits from its class layer.
    /// Ordered entry > service > persistence > mapping > component >
    /// configuration > utility > data-holder > unknown.
    pub fn method_base_weight(&self) -> f64 {
        match self {
            LayerType::Entry => 10.0,
            LayerType::Service => 8.0,
            LayerType::Persistence => 6.0,
            LayerType::Mapping => 5.0,
            LayerType::Component => 4.0,
            LayerType::Configuration => 3.0,
            LayerType::Utility => 2.0,
            LayerType::DataHolder => 1.0,
            LayerType::Unknown => 0.0,
        }
    }

    /// Base score of the class itself; same order, larger spread.
    pub fn class_base_weight(&self) -> f64 {
        match self {
            LayerType::Entry => 20.0,
            LayerType::Service => 16.0,
            LayerType::Persistence => 12.0,
            LayerType::Mapping => 10.0,
            LayerType::Component => 8.0,
            LayerType::Configuration => 6.0,
            LayerType::Utility => 4.0,
            LayerType::DataHolder => 2.0,
            LayerType::Unknown => 0.0,
        }
    }
}

impl Default for LayerType {
    fn default() -> Self {
        LayerType::Unknown
    }
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coarse business capability of a class or tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessDomain {
    Identity,
    Order,
    Catalog,
    Payment,
    Auth,
    Inventory,
    Notification,
    System,
    Common,
    Unknown,
}

impl BusinessDomain {
    pub const ALL: [BusinessDomain; 10] = [
        BusinessDomain::Identity,
        BusinessDomain::Order,
        BusinessDomain::Catalog,
        BusinessDomain::Payment,
        BusinessDomain::Auth,
        BusinessDomain::Inventory,
        BusinessDomain::Notification,
        BusinessDomain::System,
        BusinessDomain::Common,
        BusinessDomain::Unknown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BusinessDomain::Identity => "identity",
            BusinessDomain::Order => "commerce_order",
            BusinessDomain::Catalog => "catalog",
            BusinessDomain::Payment => "payment",
            BusinessDomain::Auth => "auth",
            BusinessDomain::Inventory => "inventory",
            BusinessDomain::Notification => "notification",
            BusinessDomain::System => "system",
            BusinessDomain::Common => "common",
            BusinessDomain::Unknown => "unknown",
        }
    }

    /// Static priority; higher means more business-critical.
    pub fn priority(&self) -> u32 {
        match self {
            BusinessDomain::Payment => 10,
            BusinessDomain::Order => 9,
            BusinessDomain::Auth => 8,
            BusinessDomain::Identity => 7,
            BusinessDomain::Catalog => 6,
            BusinessDomain::Inventory => 5,
            BusinessDomain::Notification => 4,
            BusinessDomain::System => 3,
            BusinessDomain::Common => 1,
            BusinessDomain::Unknown => 0,
        }
    }

    /// Lower-case tokens that mark a class or method as belonging here.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            BusinessDomain::Identity => &["user", "member", "account", "profile", "customer"],
            BusinessDomain::Order => &["order", "cart", "checkout", "trade", "shipment"],
            BusinessDomain::Catalog => &["product", "catalog", "item", "sku", "goods", "category"],
            BusinessDomain::Payment => {
                &["pay", "payment", "billing", "invoice", "refund", "wallet"]
            }
            BusinessDomain::Auth => &[
                "auth", "login", "logout", "token", "security", "permission", "role", "oauth",
                "session",
            ],
            BusinessDomain::Inventory => &["inventory", "stock", "warehouse"],
            BusinessDomain::Notification => {
                &["notify", "notification", "message", "mail", "email", "sms"]
            }
            BusinessDomain::System => {
                &["system", "admin", "setting", "monitor", "job", "schedule", "audit"]
            }
            BusinessDomain::Common => &["common", "shared", "base"],
            BusinessDomain::Unknown => &[],
        }
    }
}

impl Default for BusinessDomain {
    fn default() -> Self {
        BusinessDomain::Unknown
    }
}

impl std::fmt::Display for BusinessDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
