use crate::domain::order::ProductRef;
use crate::domain::validation::FormData;
use crate::error::{CheckoutError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;

/// One scripted user action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ScenarioStep {
    Purchase {
        product: ProductRef,
    },
    Input {
        field: String,
        value: String,
    },
    Blur {
        field: String,
    },
    Submit {
        #[serde(rename = "paymentMethod", default)]
        payment_method: Option<String>,
        #[serde(default)]
        fields: FormData,
    },
    Dismiss,
}

/// Reads a checkout scenario: a JSON array of steps tagged by `action`.
///
/// The array itself must parse; individual steps are decoded lazily so one
/// malformed step does not hide the rest.
pub struct ScenarioReader {
    steps: Vec<Value>,
}

impl ScenarioReader {
    pub fn new<R: Read>(source: R) -> Result<Self> {
        let steps: Vec<Value> = serde_json::from_reader(source)?;
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(self) -> impl Iterator<Item = Result<ScenarioStep>> {
        self.steps
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(CheckoutError::from))
    }
}
