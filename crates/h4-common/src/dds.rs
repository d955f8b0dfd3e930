//! In-memory DDS sink: typed array variables with named dimensions.

use serde::Serialize;

use crate::dtype::CfType;

/// One dimension of a DDS array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DdsDim {
    pub size: usize,
    pub name: String,
}

/// A typed array (or scalar string) variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DdsVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub cf_type: CfType,
    pub dims: Vec<DdsDim>,
}

impl DdsVariable {
    pub fn new(name: impl Into<String>, cf_type: CfType) -> Self {
        Self {
            name: name.into(),
            cf_type,
            dims: Vec::new(),
        }
    }

    /// Add one dimension, builder style.
    pub fn with_dim(mut self, size: usize, name: impl Into<String>) -> Self {
        self.dims.push(DdsDim {
            size,
            name: name.into(),
        });
        self
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dds {
    variables: Vec<DdsVariable>,
}

impl Dds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable; a later variable with the same name replaces the earlier one.
    pub fn add_variable(&mut self, var: DdsVariable) {
        self.variables.retain(|v| v.name != var.name);
        self.variables.push(var);
    }

    pub fn find(&self, name: &str) -> Option<&DdsVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DdsVariable> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
