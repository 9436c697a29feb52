//! Name and signature helpers shared by the classifier, filter, builder and
//! weight stages.

/// Methods every object inherits from the platform base type.
pub const BASE_OBJECT_METHODS: &[&str] = &[
    "equals", "hashCode", "toString", "clone", "finalize", "getClass", "wait", "notify",
    "notifyAll",
];

/// Name prefixes that read as data-access operations.
pub const DATA_ACCESS_PREFIXES: &[&str] = &[
    "find", "get", "save", "insert", "update", "delete", "remove", "select", "query", "count",
    "exists", "list", "page", "batch", "upsert", "load", "persist", "merge", "read", "search",
];

/// Split an identifier, package or path into lower-case word tokens.
///
/// Handles camelCase, acronyms (`OrderDTO` -> `order`, `dto`) and any
/// non-alphanumeric separator.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for part in text.split(|c: char| !c.is_alphanumeric()) {
        if part.is_empty() {
            continue;
        }
        let chars: Vec<char> = part.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            if i > 0 && c.is_uppercase() {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
                // `aB` starts a word, and so does the `R` in `HTTPRequest`.
                let boundary = prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next_is_lower);
                if boundary {
                    if !current.is_empty() {
                        tokens.push(current.to_lowercase());
                        current.clear();
                    }
                }
            }
            current.push(c);
        }
        if !current.is_empty() {
            tokens.push(current.to_lowercase());
        }
    }
    tokens
}

/// True if `token` is `keyword` or one of its plural forms.
pub fn token_matches(token: &str, keyword: &str) -> bool {
    if token == keyword {
        return true;
    }
    match token.strip_prefix(keyword) {
        Some("s") | Some("es") => true,
        _ => false,
    }
}

/// True if any token matches any keyword.
pub fn any_token_matches(tokens: &[String], keywords: &[&str]) -> bool {
    tokens
        .iter()
        .any(|t| keywords.iter().any(|k| token_matches(t, k)))
}

/// Last segment of a dotted name, without nested-class markers.
pub fn simple_name(qualified: &str) -> &str {
    let last = qualified.rsplit('.').next().unwrap_or(qualified);
    last.rsplit('$').next().unwrap_or(last)
}

/// Everything before the last dot, or empty for a top-level name.
pub fn package_of(qualified: &str) -> &str {
    match qualified.rfind('.') {
        Some(idx) => &qualified[..idx],
        None => "",
    }
}

/// Bare annotation name: `@org.foo.RequestMapping("/x")` -> `RequestMapping`.
pub fn annotation_name(annotation: &str) -> &str {
    let trimmed = annotation.trim().trim_start_matches('@');
    let head = trimmed.split('(').next().unwrap_or(trimmed).trim();
    head.rsplit('.').next().unwrap_or(head)
}

/// Outer type name without qualification or generic arguments.
/// `java.util.List<Order>` -> `List`, `Order[]` -> `Order`.
pub fn simple_type_name(type_name: &str) -> &str {
    let head = type_name.split('<').next().unwrap_or(type_name).trim();
    let head = head.trim_end_matches("[]").trim_end_matches("...");
    simple_name(head)
}

/// `name` starts with the verb `prefix` followed by a word boundary.
pub fn has_verb_prefix(name: &str, prefix: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest
            .chars()
            .next()
            .map(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit())
            .unwrap_or(false),
        None => false,
    }
}

pub fn is_void(return_type: &str) -> bool {
    let t = return_type.trim();
    t.is_empty() || t == "void" || t == "Void" || t == "()" || t == "Unit"
}

pub fn is_getter(name: &str, param_count: usize, return_type: &str) -> bool {
    if param_count != 0 {
        return false;
    }
    if has_verb_prefix(name, "get") && name.len() > 3 {
        return !is_void(return_type);
    }
    if has_verb_prefix(name, "is") && name.len() > 2 {
        let t = simple_type_name(return_type);
        return t == "boolean" || t == "Boolean";
    }
    false
}

pub fn is_setter(name: &str, param_count: usize) -> bool {
    param_count == 1 && has_verb_prefix(name, "set") && name.len() > 3
}

pub fn is_accessor(name: &str, param_count: usize, return_type: &str) -> bool {
    is_getter(name, param_count, return_type) || is_setter(name, param_count)
}

pub fn is_base_object_method(name: &str) -> bool {
    BASE_OBJECT_METHODS.contains(&name)
}

pub fn looks_like_data_access(name: &str) -> bool {
    DATA_ACCESS_PREFIXES.iter().any(|p| has_verb_prefix(name, p))
}
