// Concept record: one music-theory term and its curated metadata
use serde::{Deserialize, Deserializer, Serialize};

/// One curriculum entry.
///
/// JSON keys follow the curriculum file's dotted naming (`concept.ko`,
/// `examples.name`, ...). Only `concept.ko` is required; every other text
/// field defaults to empty and tolerates `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_type: Option<String>,

    #[serde(rename = "concept.ko")]
    pub concept_ko: String,
    #[serde(rename = "concept.en", default, deserialize_with = "nullable_string")]
    pub concept_en: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub aliases: Vec<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub definition: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub logic: String,
    #[serde(rename = "examples.name", default, deserialize_with = "nullable_string")]
    pub example_name: String,
    #[serde(
        rename = "examples.description",
        default,
        deserialize_with = "nullable_string"
    )]
    pub example_description: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub tips: String,
    #[serde(rename = "prerequisites.ko", default, deserialize_with = "string_or_list")]
    pub prerequisites_ko: Vec<String>,
    #[serde(rename = "prerequisites.en", default, deserialize_with = "string_or_list")]
    pub prerequisites_en: Vec<String>,
}

impl ConceptRecord {
    /// Minimal record with only the Korean name set
    pub fn named(concept_ko: impl Into<String>) -> Self {
        Self {
            node_id: None,
            parent_id: None,
            concept_type: None,
            concept_ko: concept_ko.into(),
            concept_en: String::new(),
            aliases: Vec::new(),
            definition: String::new(),
            logic: String::new(),
            example_name: String::new(),
            example_description: String::new(),
            tips: String::new(),
            prerequisites_ko: Vec::new(),
            prerequisites_en: Vec::new(),
        }
    }

    /// Name shown to users: Korean name, falling back to English
    pub fn display_name(&self) -> &str {
        if self.concept_ko.trim().is_empty() {
            &self.concept_en
        } else {
            &self.concept_ko
        }
    }

    /// Names a query may literally match: Korean, English, then aliases
    pub fn names(&self) -> impl Iterator<Item = &str> {
        [self.concept_ko.as_str(), self.concept_en.as_str()]
            .into_iter()
            .chain(self.aliases.iter().map(String::as_str))
    }

    pub fn aliases_joined(&self) -> String {
        self.aliases.join("; ")
    }

    /// Every free-text field, in curriculum order
    pub fn text_fields(&self) -> Vec<String> {
        vec![
            self.concept_ko.clone(),
            self.concept_en.clone(),
            self.aliases_joined(),
            self.definition.clone(),
            self.logic.clone(),
            self.example_name.clone(),
            self.example_description.clone(),
            self.tips.clone(),
            self.prerequisites_ko.join("; "),
            self.prerequisites_en.join("; "),
        ]
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.concept_ko.trim().is_empty() {
            return Err("field `concept.ko` is empty".to_string());
        }
        Ok(())
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    Text(String),
    List(Vec<String>),
}

/// Accepts `"a; b"`, `["a", "b"]` or `null`
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Option::<StringOrList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(StringOrList::Text(text)) => text.split(';').map(str::to_string).collect(),
        Some(StringOrList::List(list)) => list,
    };

    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_record() {
        let value = json!({
            "node_id": 12,
            "parent_id": 3,
            "concept_type": "harmony",
            "concept.ko": "세컨더리 도미넌트",
            "concept.en": "Secondary Dominant",
            "aliases": "부속 도미넌트; V/V",
            "definition": "다이아토닉 코드를 일시적인 으뜸화음으로 삼는 도미넌트",
            "logic": "목표 화음의 완전5도 위",
            "examples.name": "D7 - G",
            "examples.description": "C장조에서 V/V",
            "tips": "목표 화음을 먼저 찾는다",
            "prerequisites.ko": ["도미넌트", "다이아토닉 코드"],
            "prerequisites.en": "Dominant"
        });

        let record: ConceptRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.node_id, Some(12));
        assert_eq!(record.parent_id, Some(3));
        assert_eq!(record.aliases, vec!["부속 도미넌트", "V/V"]);
        assert_eq!(record.prerequisites_ko.len(), 2);
        assert_eq!(record.prerequisites_en, vec!["Dominant"]);
        assert_eq!(record.example_name, "D7 - G");
    }

    #[test]
    fn test_null_and_missing_fields_default() {
        let value = json!({
            "concept.ko": "음표",
            "concept.en": null,
            "aliases": null,
            "tips": null
        });

        let record: ConceptRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.concept_en, "");
        assert!(record.aliases.is_empty());
        assert_eq!(record.tips, "");
        assert!(record.node_id.is_none());
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let value = json!({ "definition": "no name here" });
        let err = serde_json::from_value::<ConceptRecord>(value).unwrap_err();
        assert!(err.to_string().contains("concept.ko"));
    }

    #[test]
    fn test_blank_name_fails_validation() {
        let record = ConceptRecord::named("   ");
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_names_include_aliases() {
        let mut record = ConceptRecord::named("투 파이브 원");
        record.concept_en = "ii-V-I".to_string();
        record.aliases = vec!["251".to_string()];

        let names: Vec<&str> = record.names().collect();
        assert_eq!(names, vec!["투 파이브 원", "ii-V-I", "251"]);
    }

    #[test]
    fn test_display_name_falls_back_to_english() {
        let mut record = ConceptRecord::named("");
        record.concept_en = "Cadence".to_string();
        assert_eq!(record.display_name(), "Cadence");
    }
}
