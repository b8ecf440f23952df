//! Patient context supplied by the records layer.

use serde::{Deserialize, Serialize};

/// Medical profile of the patient a question is about.
///
/// Owned and resolved by the caller; the pipeline only reads it. The `id`
/// participates in cache fingerprints so answers never leak between patients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContext {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

impl PatientContext {
    /// Create an empty profile with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn sex(mut self, sex: impl Into<String>) -> Self {
        self.sex = Some(sex.into());
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn medication(mut self, medication: impl Into<String>) -> Self {
        self.medications.push(medication.into());
        self
    }

    pub fn allergy(mut self, allergy: impl Into<String>) -> Self {
        self.allergies.push(allergy.into());
        self
    }

    /// True when nothing beyond the id is known.
    pub fn is_blank(&self) -> bool {
        self.age.is_none()
            && self.sex.is_none()
            && self.conditions.is_empty()
            && self.medications.is_empty()
            && self.allergies.is_empty()
    }
}
