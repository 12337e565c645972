use serde_json::{Map, Value};

/// Equality conditions, all of which must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// `{ field: { eq: value }, ... }`, or `None` for an empty filter.
    pub fn to_graphql(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }

        let mut object = Map::new();
        for (field, value) in &self.conditions {
            let mut eq = Map::new();
            eq.insert("eq".to_string(), value.clone());
            object.insert(field.clone(), Value::Object(eq));
        }
        Some(Value::Object(object))
    }

    /// Evaluates the filter against a record locally.
    pub fn matches(&self, record: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| record.get(field) == Some(value))
    }
}
