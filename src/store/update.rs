use serde_json::{Map, Value};

/// Field assignments and removals applied to one document as a unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOps {
    pub set: Map<String, Value>,
    pub unset: Vec<String>,
}

impl UpdateOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set.insert(field.into(), value);
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.unset.contains(&field) {
            self.unset.push(field);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Applies the operations in place and reports whether anything changed.
    pub fn apply(&self, fields: &mut Map<String, Value>) -> bool {
        let mut changed = false;
        for (field, value) in &self.set {
            if fields.get(field) != Some(value) {
                fields.insert(field.clone(), value.clone());
                changed = true;
            }
        }
        for field in &self.unset {
            changed |= fields.remove(field).is_some();
        }
        changed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: bool,
    pub modified: bool,
}
