//! Per-request log field bag.
//!
//! Every tracked request owns one [`LogFields`]. Handlers and background
//! tasks append `key=value` pairs while the request runs; the tracking
//! middleware drains the bag once, when the request completes, and emits
//! a single log line from it.

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Append-only, shareable list of log fields in insertion order.
#[derive(Debug, Clone, Default)]
pub struct LogFields {
    inner: Arc<Mutex<Vec<(String, Value)>>>,
}

impl LogFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one field.
    pub fn add(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock().push((key.into(), value.into()));
    }

    /// Append several fields, keeping their order.
    pub fn extend<K, V, I>(&self, fields: I)
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut guard = self.lock();
        guard.extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Copy of the fields recorded so far.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        self.lock().clone()
    }

    /// Remove and return every field. A second call returns nothing.
    pub fn take(&self) -> Vec<(String, Value)> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Logging is best-effort: a panicked writer must not silence later lines.
    fn lock(&self) -> MutexGuard<'_, Vec<(String, Value)>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Renders drained fields as `Key=value` pairs separated by spaces.
pub struct Rendered<'a>(pub &'a [(String, Value)]);

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let fields = LogFields::new();
        fields.add("ID", 7);
        fields.extend([("Method", "GET"), ("URI", "/?a=1")]);
        fields.add("RespStatus", 500);

        let drained = fields.take();
        assert_eq!(
            Rendered(&drained).to_string(),
            r#"ID=7 Method="GET" URI="/?a=1" RespStatus=500"#
        );
    }

    #[test]
    fn take_drains_exactly_once() {
        let fields = LogFields::new();
        fields.add("k", "v");
        assert_eq!(fields.take().len(), 1);
        assert!(fields.take().is_empty());
        assert!(fields.is_empty());
    }

    #[test]
    fn clones_share_storage_across_threads() {
        let fields = LogFields::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let fields = fields.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        fields.add(format!("t{}", t), i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(fields.len(), 100);
        assert_eq!(fields.snapshot().len(), 100);
    }
}
