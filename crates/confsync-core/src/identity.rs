//! Item identity assignment

use std::collections::HashSet;
use std::sync::LazyLock;

use confsync_content::scalar_string;
use regex::Regex;
use serde_yaml::Value;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9]+").expect("Invalid alias separator regex"));

/// Identity stored in `id_field`, if present and non-empty.
pub fn explicit_id(value: &Value, id_field: Option<&str>) -> Option<String> {
    let raw = value.as_mapping()?.get(id_field?)?;
    if raw.is_null() {
        return None;
    }
    let id = scalar_string(raw);
    (!id.is_empty()).then_some(id)
}

/// Identity derived from an item's `alias`.
pub fn alias_id(value: &Value) -> Option<String> {
    let alias = value.get("alias")?.as_str()?;
    normalize_alias(alias)
}

/// Turn an alias into a `snake_case` identity.
///
/// `Kitchen Lights` and `KitchenLights` both become `kitchen_lights`.
pub fn normalize_alias(alias: &str) -> Option<String> {
    let cleaned = alias.trim();
    if cleaned.is_empty() {
        return None;
    }
    let mut split = String::with_capacity(cleaned.len() + 8);
    let mut previous: Option<char> = None;
    for c in cleaned.chars() {
        if c.is_ascii_uppercase()
            && previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            split.push('_');
        }
        split.push(c);
        previous = Some(c);
    }
    let lowered = split.to_lowercase();
    let underscored = NON_ALNUM.replace_all(&lowered, "_");
    let normalized = underscored.trim_matches('_');
    (!normalized.is_empty()).then(|| normalized.to_string())
}

/// Positional identity: `path:line`, or `path:index+1` when the line is unknown.
pub fn synthetic_id(rel_path: &str, line: Option<usize>, index: usize) -> String {
    match line {
        Some(line) if line > 0 => format!("{}:{}", rel_path, line),
        _ => format!("{}:{}", rel_path, index + 1),
    }
}

/// Make a value usable as a dashboard view path.
pub fn sanitize_view_path(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .flat_map(|c| {
            let keep = c.is_alphanumeric() || c == '-' || c == '_';
            let mapped: Vec<char> = if keep { c.to_lowercase().collect() } else { vec!['-'] };
            mapped
        })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "view".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `candidate`, or the first of `candidate_2`, `candidate_3`, ... not in `used`.
pub fn ensure_unique(candidate: &str, used: &HashSet<String>) -> String {
    if !used.contains(candidate) {
        return candidate.to_string();
    }
    (2..)
        .map(|suffix| format!("{}_{}", candidate, suffix))
        .find(|augmented| !used.contains(augmented))
        .unwrap_or_else(|| candidate.to_string())
}

/// Display name: the first non-blank `alias`, `name` or `title`.
pub fn item_name(value: &Value) -> Option<String> {
    let map = value.as_mapping()?;
    ["alias", "name", "title"].iter().find_map(|key| {
        let name = map.get(*key)?.as_str()?.trim();
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[rstest]
    #[case("Kitchen Lights", Some("kitchen_lights"))]
    #[case("KitchenLights", Some("kitchen_lights"))]
    #[case("  Turn on -- Porch!  ", Some("turn_on_porch"))]
    #[case("Zone2Heat", Some("zone2_heat"))]
    #[case("HVAC", Some("hvac"))]
    #[case("!!!", None)]
    #[case("   ", None)]
    fn alias_normalization(#[case] alias: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_alias(alias).as_deref(), expected);
    }

    #[test]
    fn collisions_get_numbered_suffixes() {
        let mut used = HashSet::new();
        let first = ensure_unique("kitchen_lights", &used);
        used.insert(first.clone());
        let second = ensure_unique("kitchen_lights", &used);
        used.insert(second.clone());
        let third = ensure_unique("kitchen_lights", &used);
        assert_eq!(
            (first.as_str(), second.as_str(), third.as_str()),
            ("kitchen_lights", "kitchen_lights_2", "kitchen_lights_3")
        );
    }

    #[test]
    fn synthetic_ids_prefer_lines() {
        assert_eq!(synthetic_id("templates.yaml", Some(4), 0), "templates.yaml:4");
        assert_eq!(synthetic_id("templates.yaml", None, 2), "templates.yaml:3");
        assert_eq!(synthetic_id("templates.yaml", Some(0), 0), "templates.yaml:1");
    }

    #[test]
    fn view_paths_are_sanitized() {
        assert_eq!(sanitize_view_path("lovelace/Home.yaml:3"), "lovelace-home-yaml-3");
        assert_eq!(sanitize_view_path("::"), "view");
    }

    #[test]
    fn explicit_ids_ignore_null_and_empty_values() {
        assert_eq!(explicit_id(&yaml("id: 42\n"), Some("id")).as_deref(), Some("42"));
        assert_eq!(explicit_id(&yaml("id: null\n"), Some("id")), None);
        assert_eq!(explicit_id(&yaml("id: ''\n"), Some("id")), None);
        assert_eq!(explicit_id(&yaml("id: x\n"), None), None);
    }

    #[test]
    fn names_come_from_alias_name_or_title() {
        assert_eq!(item_name(&yaml("alias: ' '\nname: Porch\n")).as_deref(), Some("Porch"));
        assert_eq!(item_name(&yaml("title: Home\n")).as_deref(), Some("Home"));
        assert_eq!(item_name(&yaml("icon: mdi:home\n")), None);
    }
}
