//! Prompt catalog.
//!
//! The built-in catalog holds the two instruction variants the study compares, `simple` and
//! `complex`. A YAML file can replace it:
//!
//! ```yaml
//! prompts:
//!   - name: simple
//!     instruction: |
//!       You are a specialized neuroradiology AI assistant ...
//! ```
//!
//! Catalog order is preserved; the matrix runner evaluates prompts in this order.

use crate::{BenchError, BenchResult};
use orbit_types::NonEmptyText;
use serde::Deserialize;
use std::path::Path;

const RESPONSE_FORMAT: &str = "Use the following format for your response:

    **Primary Diagnosis**: PRIMARY DIAGNOSIS HERE

    **Differentials**:
    1. FIRST DIFFERENTIAL
    2. SECOND DIFFERENTIAL
    3. THIRD DIFFERENTIAL
    4. FOURTH DIFFERENTIAL";

const SIMPLE_INSTRUCTION: &str = "You are a specialized neuroradiology AI assistant trained in \
orbital imaging interpretation. Based on the clinical presentation, and the CT and/or MRI \
images provided, provide the most likely diagnosis and four main differentials for the orbit \
pathology.";

const COMPLEX_INSTRUCTION: &str = "You are a specialized neuroradiology AI assistant trained in \
orbital imaging interpretation. Please consider the following for each case: Is the lesion \
located in the optic nerve sheath complex, intraconal space, conal space or extraconal \
compartments? Integrate the clinical presentation (e.g., age, symptoms, laterality, acuity of \
onset) with the imaging findings (e.g., lesion density/signal, enhancement characteristics, \
margins, associated features like proptosis or bony remodelling) and provide the most likely \
diagnosis, as well as four main differentials.";

/// A named system instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptVariant {
    pub name: NonEmptyText,
    pub instruction_text: NonEmptyText,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptCatalog {
    variants: Vec<PromptVariant>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PromptFileWire {
    prompts: Vec<PromptWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PromptWire {
    name: NonEmptyText,
    instruction: NonEmptyText,
}

impl PromptCatalog {
    /// The `simple` and `complex` diagnostic prompts.
    pub fn builtin() -> Self {
        let variant = |name: &str, body: &str| -> Option<PromptVariant> {
            Some(PromptVariant {
                name: NonEmptyText::new(name).ok()?,
                instruction_text: NonEmptyText::new(format!("{} {}", body, RESPONSE_FORMAT))
                    .ok()?,
            })
        };

        Self {
            variants: [
                variant("simple", SIMPLE_INSTRUCTION),
                variant("complex", COMPLEX_INSTRUCTION),
            ]
            .into_iter()
            .flatten()
            .collect(),
        }
    }

    /// Builds a catalog from explicit variants.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::InvalidInput`] if the list is empty or names repeat.
    pub fn new(variants: Vec<PromptVariant>) -> BenchResult<Self> {
        if variants.is_empty() {
            return Err(BenchError::InvalidInput(
                "prompt catalog must contain at least one prompt".into(),
            ));
        }

        for (i, variant) in variants.iter().enumerate() {
            if variants[..i].iter().any(|v| v.name == variant.name) {
                return Err(BenchError::InvalidInput(format!(
                    "prompt '{}' is defined more than once",
                    variant.name
                )));
            }
        }

        Ok(Self { variants })
    }

    /// Loads a catalog from a YAML file.
    pub fn load(path: &Path) -> BenchResult<Self> {
        let text = std::fs::read_to_string(path).map_err(BenchError::PromptFileRead)?;
        Self::from_yaml_str(&text)
    }

    /// Parses a catalog from YAML text.
    ///
    /// Schema errors name the failing field (e.g. `prompts[1].instruction`).
    pub fn from_yaml_str(yaml_text: &str) -> BenchResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, PromptFileWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(BenchError::PromptFileSchema(format!(
                    "schema mismatch at {path}: {source}"
                )));
            }
        };

        Self::new(
            wire.prompts
                .into_iter()
                .map(|p| PromptVariant {
                    name: p.name,
                    instruction_text: p.instruction,
                })
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&PromptVariant> {
        self.variants.iter().find(|v| v.name.as_str() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PromptVariant> {
        self.variants.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
