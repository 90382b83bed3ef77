//! Base implementation of records for logging.
use crate::error::OmpoError;
use std::collections::{
    hash_map::{Iter, Keys},
    HashMap,
};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically used for metrics like loss or reward.
    Scalar(f32),

    /// A counter of updates or environment steps.
    Step(usize),

    /// A 1-dimensional array of floating-point values.
    Array1(Vec<f32>),
}

/// A container for storing key-value pairs of various data types.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record containing a single step counter.
    pub fn from_step(name: impl Into<String>, value: usize) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Step(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys in the record.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records, consuming both.
    ///
    /// Values of `record` overwrite values of `self` with the same key.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges another record into this one in place.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, OmpoError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(OmpoError::RecordValueTypeError("Scalar".to_string())),
            None => Err(OmpoError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 1-dimensional array from the record.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, OmpoError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(OmpoError::RecordValueTypeError("Array1".to_string())),
            None => Err(OmpoError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a step counter from the record.
    pub fn get_step(&self, k: &str) -> Result<usize, OmpoError> {
        match self.0.get(k) {
            Some(RecordValue::Step(v)) => Ok(*v),
            Some(_) => Err(OmpoError::RecordValueTypeError("Step".to_string())),
            None => Err(OmpoError::RecordKeyError(k.to_string())),
        }
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_scalar_errors() {
        let record = Record::from_slice(&[
            ("loss", RecordValue::Scalar(0.5)),
            ("step", RecordValue::Step(16_777_217)),
        ]);

        assert_eq!(record.get_scalar("loss"), Ok(0.5));
        assert_eq!(
            record.get_scalar("step"),
            Err(OmpoError::RecordValueTypeError("Scalar".to_string()))
        );
        assert_eq!(record.get_step("step"), Ok(16_777_217));
        assert_eq!(
            record.get_step("loss"),
            Err(OmpoError::RecordValueTypeError("Step".to_string()))
        );
        assert_eq!(
            record.get_scalar("missing"),
            Err(OmpoError::RecordKeyError("missing".to_string()))
        );
    }

    #[test]
    fn test_merge_overwrites() {
        let a = Record::from_scalar("x", 1.0);
        let mut b = Record::from_scalar("x", 2.0);
        b.insert("y", RecordValue::Array1(vec![1.0, 2.0]));

        let merged = a.merge(b);
        assert_eq!(merged.get_scalar("x"), Ok(2.0));
        assert_eq!(merged.get_array1("y"), Ok(vec![1.0, 2.0]));
    }
}
