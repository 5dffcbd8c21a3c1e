//! Per-run accumulator of completed step outputs.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ResultError;

/// Type-erased step output. Shared, never mutated after it is written.
pub(crate) type StepValue = Arc<dyn Any + Send + Sync>;

/// Step id -> value the step produced.
///
/// Entries are written once, by the executor, when a step succeeds. A step
/// receives a `ResultSet` restricted to its declared dependencies.
#[derive(Clone, Default)]
pub struct ResultSet {
    entries: HashMap<String, StepValue>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the value produced by `step`.
    pub fn get<T: Any + Send + Sync>(&self, step: &str) -> Result<&T, ResultError> {
        self.entries
            .get(step)
            .ok_or_else(|| ResultError::Missing(step.to_string()))?
            .downcast_ref::<T>()
            .ok_or_else(|| ResultError::TypeMismatch {
                step: step.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Remove and return the value produced by `step`.
    ///
    /// Clones only if another view of the run still shares the value.
    pub fn take<T: Any + Send + Sync + Clone>(&mut self, step: &str) -> Result<T, ResultError> {
        let value = self
            .entries
            .remove(step)
            .ok_or_else(|| ResultError::Missing(step.to_string()))?;

        match value.downcast::<T>() {
            Ok(typed) => Ok(Arc::unwrap_or_clone(typed)),
            Err(original) => {
                self.entries.insert(step.to_string(), original);
                Err(ResultError::TypeMismatch {
                    step: step.to_string(),
                    expected: type_name::<T>(),
                })
            }
        }
    }

    pub fn contains(&self, step: &str) -> bool {
        self.entries.contains_key(step)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of every recorded step, in no particular order.
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn insert(&mut self, step: String, value: StepValue) {
        debug_assert!(!self.entries.contains_key(&step), "step '{step}' recorded twice");
        self.entries.insert(step, value);
    }

    /// A new set holding only the entries for `steps`.
    pub(crate) fn view(&self, steps: &[String]) -> ResultSet {
        let entries = steps
            .iter()
            .filter_map(|id| self.entries.get(id).map(|v| (id.clone(), Arc::clone(v))))
            .collect();
        ResultSet { entries }
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut steps: Vec<&str> = self.steps().collect();
        steps.sort_unstable();
        f.debug_struct("ResultSet").field("steps", &steps).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value<T: Any + Send + Sync>(v: T) -> StepValue {
        Arc::new(v)
    }

    #[test]
    fn test_get_typed_value() {
        let mut results = ResultSet::new();
        results.insert("count".to_string(), value(3_u32));

        assert_eq!(results.get::<u32>("count"), Ok(&3));
        assert_eq!(
            results.get::<u32>("other"),
            Err(ResultError::Missing("other".to_string()))
        );
        assert!(matches!(
            results.get::<String>("count"),
            Err(ResultError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_take_removes_entry() {
        let mut results = ResultSet::new();
        results.insert("names".to_string(), value(vec!["a".to_string()]));

        let names: Vec<String> = results.take("names").unwrap();
        assert_eq!(names, vec!["a".to_string()]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_take_wrong_type_keeps_entry() {
        let mut results = ResultSet::new();
        results.insert("count".to_string(), value(3_u32));

        assert!(results.take::<String>("count").is_err());
        assert!(results.contains("count"));
    }

    #[test]
    fn test_take_shared_value_clones() {
        let mut results = ResultSet::new();
        results.insert("count".to_string(), value(7_u64));
        let view = results.view(&["count".to_string()]);

        assert_eq!(results.take::<u64>("count"), Ok(7));
        assert_eq!(view.get::<u64>("count"), Ok(&7));
    }

    #[test]
    fn test_view_restricts_entries() {
        let mut results = ResultSet::new();
        results.insert("a".to_string(), value(1_i32));
        results.insert("b".to_string(), value(2_i32));

        let view = results.view(&["b".to_string()]);
        assert_eq!(view.len(), 1);
        assert!(view.contains("b"));
        assert!(!view.contains("a"));
    }
}
