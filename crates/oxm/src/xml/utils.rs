//! Naming helpers shared by the metadata layer and the codecs.

use crate::mapping::XmlNamespace;

/// Inflects a property or type name into an XML name.
///
/// Every uppercase letter that follows a word character gets a hyphen in
/// front of it, then the whole name is lowercased: `publishedAt` becomes
/// `published-at`, `Article` becomes `article`.
pub fn xmlize(word: &str) -> String {
    let mut out = String::with_capacity(word.len() + 4);
    let mut previous: Option<char> = None;
    for c in word.chars() {
        if c.is_uppercase() && previous.is_some_and(|p| p.is_alphanumeric() || p == '_') {
            out.push('-');
        }
        out.extend(c.to_lowercase());
        previous = Some(c);
    }
    out
}

/// Type name without its module path (`\`, `::` or `.` separated).
pub fn short_name(type_name: &str) -> &str {
    let mut start = 0;
    for sep in ["\\", "::", "."] {
        if let Some(pos) = type_name.rfind(sep) {
            start = start.max(pos + sep.len());
        }
    }
    &type_name[start..]
}

/// Uppercases the first character.
pub fn ucfirst(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether an element local name designates a type by its short name.
///
/// Matches the short name exactly, lowercased, with a capitalised local
/// name, or in its hyphenated form.
pub fn name_matches_type(local_name: &str, type_name: &str) -> bool {
    let short = short_name(type_name);
    short == local_name
        || short.to_lowercase() == local_name
        || ucfirst(local_name) == short
        || xmlize(short).trim_start_matches('-') == local_name
}

/// URL of the last prefix-less namespace, else the first declared, else `""`.
///
/// Subclasses append their own namespaces after the inherited ones, so a
/// subclass declaring a default namespace overrides its parent's.
pub fn default_namespace(namespaces: &[XmlNamespace]) -> String {
    namespaces
        .iter()
        .rfind(|ns| ns.prefix.as_deref().is_none_or(str::is_empty))
        .or_else(|| namespaces.first())
        .map(|ns| ns.url.clone())
        .unwrap_or_default()
}
