//! Detector findings
//!
//! The structured result shape consumed by external reporting: detector id,
//! impact/confidence classification, the ordered source elements the
//! finding points at, and bilingual description/exploit/recommendation
//! text. Findings are immutable once built; the dedup id is a hash of the
//! concatenated element descriptions.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Impact {
    Informational,
    Low,
    Medium,
    High,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
            Self::Informational => write!(f, "Informational"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Informational,
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
            Self::Informational => write!(f, "Informational"),
        }
    }
}

/// Where an element lives in its file. Offsets are byte offsets into the
/// source; lines are 1-indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapping {
    pub filename: String,
    pub start: usize,
    pub length: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub lines: Vec<usize>,
    pub starting_column: usize,
}

/// One source element a finding points at: a contract, function, variable
/// or IR node, optionally nested under its parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub source_mapping: SourceMapping,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Element>>,
}

impl Element {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            source_mapping: SourceMapping::default(),
            parent: None,
        }
    }

    pub fn with_source_mapping(mut self, source_mapping: SourceMapping) -> Self {
        self.source_mapping = source_mapping;
        self
    }

    pub fn with_parent(mut self, parent: Element) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    fn describe(&self) -> String {
        format!("{}:{}:{}", self.kind, self.name, self.source_mapping.start)
    }
}

/// English/Korean text pair carried on every narrative field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BilingualText {
    pub en: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub kr: String,
}

impl BilingualText {
    pub fn new(en: impl Into<String>, kr: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            kr: kr.into(),
        }
    }

    pub fn english(en: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            kr: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub check: String,
    pub impact: Impact,
    pub confidence: Confidence,
    pub elements: Vec<Element>,
    pub description: BilingualText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exploit_scenario: Option<BilingualText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<BilingualText>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub references: Vec<String>,
    pub id: String,
}

impl Finding {
    pub fn new(
        check: impl Into<String>,
        impact: Impact,
        confidence: Confidence,
        description: BilingualText,
    ) -> Self {
        Self {
            check: check.into(),
            impact,
            confidence,
            elements: Vec::new(),
            description,
            exploit_scenario: None,
            recommendation: None,
            references: Vec::new(),
            id: String::new(),
        }
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_elements(mut self, elements: Vec<Element>) -> Self {
        self.elements = elements;
        self
    }

    pub fn with_exploit_scenario(mut self, text: BilingualText) -> Self {
        self.exploit_scenario = Some(text);
        self
    }

    pub fn with_recommendation(mut self, text: BilingualText) -> Self {
        self.recommendation = Some(text);
        self
    }

    pub fn with_references(mut self, references: Vec<String>) -> Self {
        self.references = references;
        self
    }

    /// Finalizes the finding by stamping the dedup id. Identity is the
    /// detector id plus the textual description of every element, in order.
    pub fn finalize(mut self) -> Self {
        let mut hasher = DefaultHasher::new();
        self.check.hash(&mut hasher);
        for element in &self.elements {
            element.describe().hash(&mut hasher);
        }
        self.id = format!("{:016x}", hasher.finish());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(check: &str, element_name: &str) -> Finding {
        Finding::new(
            check,
            Impact::High,
            Confidence::Medium,
            BilingualText::english("uses a weak PRNG"),
        )
        .with_element(Element::new("function", element_name))
        .finalize()
    }

    #[test]
    fn test_id_is_stable_for_identical_findings() {
        assert_eq!(sample("weak-prng", "guess").id, sample("weak-prng", "guess").id);
    }

    #[test]
    fn test_id_differs_per_element() {
        assert_ne!(sample("weak-prng", "guess").id, sample("weak-prng", "draw").id);
    }

    #[test]
    fn test_id_differs_per_check() {
        assert_ne!(sample("weak-prng", "guess").id, sample("timestamp", "guess").id);
    }

    #[test]
    fn test_impact_ordering() {
        assert!(Impact::High > Impact::Medium);
        assert!(Impact::Low > Impact::Informational);
    }

    #[test]
    fn test_serialized_shape() {
        let finding = sample("weak-prng", "guess");
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["check"], "weak-prng");
        assert_eq!(json["impact"], "High");
        assert_eq!(json["confidence"], "Medium");
        assert_eq!(json["elements"][0]["type"], "function");
    }
}
