//! In-memory DAS sink: named attribute tables of typed textual values.
//!
//! Tables keep insertion order, attributes inside a table keep insertion
//! order, and values inside an attribute keep append order. Appending a
//! value under an existing name extends that attribute, matching the way
//! multi-valued attributes are emitted one triple at a time.

use serde::Serialize;

use crate::dtype::CfType;
use crate::error::{H4Error, H4Result};

/// One attribute: a CF type and its values rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attr {
    pub name: String,
    #[serde(rename = "type")]
    pub cf_type: CfType,
    pub values: Vec<String>,
}

impl Attr {
    /// First value, the common case for scalar attributes.
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// The attributes of one variable (or of `HDF_GLOBAL`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttrTable {
    name: String,
    attributes: Vec<Attr>,
}

impl AttrTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append one value. A second value under the same name extends the
    /// attribute; a different type for an existing name is rejected.
    pub fn append_attr(&mut self, name: &str, cf_type: CfType, value: impl Into<String>) -> H4Result<()> {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) if existing.cf_type != cf_type => Err(H4Error::malformed(
                name,
                format!(
                    "cannot append {} value to {} attribute in table '{}'",
                    cf_type, existing.cf_type, self.name
                ),
            )),
            Some(existing) => {
                existing.values.push(value);
                Ok(())
            }
            None => {
                self.attributes.push(Attr {
                    name: name.to_string(),
                    cf_type,
                    values: vec![value],
                });
                Ok(())
            }
        }
    }

    /// Append every value in order.
    pub fn append_values<S: AsRef<str>>(&mut self, name: &str, cf_type: CfType, values: &[S]) -> H4Result<()> {
        for v in values {
            self.append_attr(name, cf_type, v.as_ref())?;
        }
        Ok(())
    }

    /// Remove an attribute. Deleting a missing name is a no-op.
    pub fn del_attr(&mut self, name: &str) {
        self.attributes.retain(|a| a.name != name);
    }

    pub fn simple_find(&self, name: &str) -> Option<&Attr> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.simple_find(name).is_some()
    }

    pub fn attr_type(&self, name: &str) -> Option<CfType> {
        self.simple_find(name).map(|a| a.cf_type)
    }

    /// Number of values stored under `name` (0 when absent).
    pub fn attr_num(&self, name: &str) -> usize {
        self.simple_find(name).map(|a| a.values.len()).unwrap_or(0)
    }

    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.simple_find(name).and_then(Attr::first)
    }

    /// Rename an attribute in place. Returns false when `from` is absent.
    pub fn rename_attr(&mut self, from: &str, to: &str) -> bool {
        match self.attributes.iter().position(|a| a.name == from) {
            Some(idx) => {
                let mut attr = self.attributes.remove(idx);
                attr.name = to.to_string();
                self.attributes.push(attr);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attr> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// A dataset attribute structure: ordered attribute tables by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Das {
    tables: Vec<AttrTable>,
}

impl Das {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_table(&self, name: &str) -> Option<&AttrTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut AttrTable> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    /// Fetch the named table, creating it on first use.
    pub fn get_or_create(&mut self, name: &str) -> &mut AttrTable {
        match self.tables.iter().position(|t| t.name == name) {
            Some(idx) => &mut self.tables[idx],
            None => {
                self.tables.push(AttrTable::new(name));
                let last = self.tables.len() - 1;
                &mut self.tables[last]
            }
        }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttrTable> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
