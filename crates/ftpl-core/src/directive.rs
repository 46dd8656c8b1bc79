/*
 * directive.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive vocabulary shared by the JSON and XML parsers.

/// JSON key / XML local name of the nested inclusion directive.
pub const INCLUDE: &str = "$include";
/// JSON key / XML local name of the flattening inclusion directive.
pub const INCLUDE_FLAT: &str = "$includeFlat";
/// JSON key / XML local name of the merge directive.
pub const MERGE: &str = "$merge";

/// Prefix of the synthetic key holding a deferred merge.
pub const DYNAMIC_MERGE_PREFIX: &str = "$dynamicMerge_";

/// An inclusion or merge directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Include,
    IncludeFlat,
    Merge,
}

impl Directive {
    /// The directive as written in JSON templates.
    pub fn as_str(self) -> &'static str {
        match self {
            Directive::Include => INCLUDE,
            Directive::IncludeFlat => INCLUDE_FLAT,
            Directive::Merge => MERGE,
        }
    }

    /// Match a JSON object key.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            INCLUDE => Some(Directive::Include),
            INCLUDE_FLAT => Some(Directive::IncludeFlat),
            MERGE => Some(Directive::Merge),
            _ => None,
        }
    }

    /// Match an XML element local name in the template namespace.
    pub fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "include" => Some(Directive::Include),
            "includeFlat" => Some(Directive::IncludeFlat),
            "merge" => Some(Directive::Merge),
            _ => None,
        }
    }
}

/// Parse the inline string form `$include{path}` / `$includeFlat{path}`.
///
/// `$merge` has no inline form: it needs an enclosing object as overlay.
pub fn parse_inline(value: &str) -> Option<(Directive, &str)> {
    let value = value.trim();
    let (directive, rest) = if let Some(rest) = value.strip_prefix(INCLUDE_FLAT) {
        (Directive::IncludeFlat, rest)
    } else if let Some(rest) = value.strip_prefix(INCLUDE) {
        (Directive::Include, rest)
    } else {
        return None;
    };

    let path = rest.strip_prefix('{')?.strip_suffix('}')?;
    Some((directive, path.trim()))
}

/// Key under which a deferred merge of `key` is stored.
pub fn dynamic_merge_key(key: &str) -> String {
    format!("{}{}", DYNAMIC_MERGE_PREFIX, key)
}
