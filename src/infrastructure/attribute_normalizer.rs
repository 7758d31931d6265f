//! Rule-based mapping of the free-text spec table into structured fields
//!
//! Each category has an ordered rule list. For every `{title, value}` entry
//! the first matching rule assigns its field; a later entry matching the
//! same field overwrites the earlier one.

use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

use crate::domain::errors::SyncError;
use crate::domain::inventory::{NormalizedFields, RawAttributes};
use crate::domain::services::AttributeNormalizer;

#[derive(Debug, Clone)]
pub struct FieldRule {
    field: String,
    title: Regex,
    exclude: Option<Regex>,
    replacements: Vec<(String, String)>,
    /// `None` trims whitespace
    trim_chars: Option<Vec<char>>,
    require_non_empty: bool,
}

impl FieldRule {
    pub fn new(field: &str, title_pattern: &str) -> Result<Self, SyncError> {
        Ok(Self {
            field: field.to_string(),
            title: case_insensitive(title_pattern)?,
            exclude: None,
            replacements: Vec::new(),
            trim_chars: None,
            require_non_empty: false,
        })
    }

    pub fn excluding(mut self, pattern: &str) -> Result<Self, SyncError> {
        self.exclude = Some(case_insensitive(pattern)?);
        Ok(self)
    }

    pub fn replacing(mut self, from: &str, to: &str) -> Self {
        self.replacements.push((from.to_string(), to.to_string()));
        self
    }

    pub fn trimming(mut self, chars: &str) -> Self {
        self.trim_chars = Some(chars.chars().collect());
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.require_non_empty = true;
        self
    }

    /// Cleaned value when this rule applies to the entry
    fn apply(&self, title: &str, value: &str) -> Option<String> {
        if !self.title.is_match(title) {
            return None;
        }
        if self.exclude.as_ref().is_some_and(|exclude| exclude.is_match(title)) {
            return None;
        }

        let mut value = value.to_string();
        for (from, to) in &self.replacements {
            value = value.replace(from.as_str(), to);
        }
        let value = match &self.trim_chars {
            Some(chars) => value.trim_matches(chars.as_slice()),
            None => value.trim(),
        };

        if self.require_non_empty && value.is_empty() {
            return None;
        }
        Some(value.to_string())
    }
}

fn case_insensitive(pattern: &str) -> Result<Regex, SyncError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| SyncError::Config(format!("Invalid rule pattern '{pattern}': {e}")))
}

/// Strip layout noise the shop leaves in spec values
fn clean_value(value: &str) -> String {
    value.replace(['\n', '\t'], "").replace("&nbsp;", " ")
}

#[derive(Debug, Clone, Default)]
pub struct RuleBasedNormalizer {
    rules: HashMap<String, Vec<FieldRule>>,
}

impl RuleBasedNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self, category: &str, rules: Vec<FieldRule>) -> Self {
        self.rules.insert(category.to_string(), rules);
        self
    }

    /// Rules for the shop's laptop and monitor sections (Latvian titles)
    pub fn banknote_defaults() -> Result<Self, SyncError> {
        let laptops = vec![
            FieldRule::new("cpu", "(cpu|proces)")?.trimming(" -,").non_empty(),
            FieldRule::new("ram", "(ram)")?,
            // "Diska lasītājs" is an optical drive, not storage
            FieldRule::new("storage", "(atmi|disk|hdd|ssd)")?.excluding("(oper|las)")?,
            FieldRule::new("gpu", "(gpu|video)")?.trimming(" -\""),
        ];
        let monitors = vec![
            FieldRule::new("resolution", "(izšķirtspēja)")?
                .replacing(" x ", "x")
                .trimming(" ")
                .non_empty(),
            FieldRule::new("size", "(izmērs)")?.trimming(" ").non_empty(),
            FieldRule::new("refresh_rate", "(frekvence)")?.trimming(" ").non_empty(),
            FieldRule::new("panel", "(tips)")?.trimming(" ").non_empty(),
        ];

        Ok(Self::new()
            .with_rules("laptops", laptops)
            .with_rules("monitors", monitors))
    }
}

impl AttributeNormalizer for RuleBasedNormalizer {
    fn normalize(&self, category: &str, attributes: &RawAttributes) -> NormalizedFields {
        let mut fields = NormalizedFields::new();
        let Some(rules) = self.rules.get(category) else {
            return fields;
        };

        for entry in attributes.spec_entries() {
            let value = clean_value(&entry.value);
            if let Some((field, value)) = rules
                .iter()
                .find_map(|rule| rule.apply(&entry.title, &value).map(|v| (&rule.field, v)))
            {
                fields.insert(field.clone(), value);
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn specs(entries: &[(&str, &str)]) -> RawAttributes {
        let description: Vec<_> = entries
            .iter()
            .map(|(title, value)| json!({"title": title, "value": value}))
            .collect();
        RawAttributes(json!({ "description_f": description }))
    }

    fn normalize(category: &str, entries: &[(&str, &str)]) -> NormalizedFields {
        RuleBasedNormalizer::banknote_defaults()
            .unwrap()
            .normalize(category, &specs(entries))
    }

    #[rstest]
    #[case("Procesors", " - Intel Core i5-8350U,", "cpu", "Intel Core i5-8350U")]
    #[case("RAM atmiņa", " 8 GB\n", "ram", "8 GB")]
    #[case("SSD disks", "256&nbsp;GB", "storage", "256 GB")]
    #[case("Video karte", "\"Intel UHD 620\" -", "gpu", "Intel UHD 620")]
    fn test_laptop_fields(
        #[case] title: &str,
        #[case] value: &str,
        #[case] field: &str,
        #[case] expected: &str,
    ) {
        let fields = normalize("laptops", &[(title, value)]);
        assert_eq!(fields.get(field).map(String::as_str), Some(expected));
    }

    #[rstest]
    #[case("Izšķirtspēja", "1920 x 1080", "resolution", "1920x1080")]
    #[case("Ekrāna izmērs", " 24\" ", "size", "24\"")]
    #[case("Atsvaidzes frekvence", "144 Hz", "refresh_rate", "144 Hz")]
    #[case("Matricas tips", "IPS", "panel", "IPS")]
    fn test_monitor_fields(
        #[case] title: &str,
        #[case] value: &str,
        #[case] field: &str,
        #[case] expected: &str,
    ) {
        let fields = normalize("monitors", &[(title, value)]);
        assert_eq!(fields.get(field).map(String::as_str), Some(expected));
    }

    #[test]
    fn test_optical_drive_is_not_storage() {
        let fields = normalize("laptops", &[("Diska lasītājs", "DVD-RW")]);
        assert!(fields.is_empty());
    }

    #[test]
    fn test_empty_cpu_value_falls_through() {
        let fields = normalize("laptops", &[("Procesors", " - "), ("Procesors", "AMD Ryzen 5")]);
        assert_eq!(fields["cpu"], "AMD Ryzen 5");
    }

    #[test]
    fn test_unknown_category_yields_no_fields() {
        assert!(normalize("tablets", &[("Procesors", "ARM")]).is_empty());
        assert!(normalize("laptops", &[]).is_empty());
    }
}
