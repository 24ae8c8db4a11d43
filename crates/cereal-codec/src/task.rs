//! Task declarations
//!
//! [`task`] wraps a task function so its payloads go through the reference
//! codec by default. Callers who name another serializer keep it.

use crate::config::CEREAL_SERIALIZER;
use crate::registry::{RegistryError, SerializerRegistry};
use cereal_model::Value;
use std::fmt;

/// Task errors
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Message addressed to a different task
    #[error("message for task {found} delivered to {expected}")]
    WrongTask {
        /// Task that received the message
        expected: String,
        /// Task named in the message
        found: String,
    },

    /// Serializer lookup or codec failure
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl TaskError {
    /// Check if this wraps a not-found lookup failure
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Registry(e) if e.is_not_found())
    }
}

/// Task declaration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOptions {
    /// Task name
    pub name: String,
    /// Serializer name; `None` selects the reference codec
    pub serializer: Option<String>,
    /// Retry budget handed to the queue
    pub max_retries: u32,
}

impl TaskOptions {
    /// Create options for a named task
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serializer: None,
            max_retries: 3,
        }
    }

    /// With explicit serializer
    #[inline]
    #[must_use]
    pub fn with_serializer(mut self, serializer: impl Into<String>) -> Self {
        self.serializer = Some(serializer.into());
        self
    }

    /// With retry budget
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Queued task message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMessage {
    /// Target task name
    pub task: String,
    /// Serializer used for `body`
    pub serializer: String,
    /// Content type label
    pub content_type: String,
    /// Content encoding label
    pub content_encoding: String,
    /// Encoded arguments
    pub body: Vec<u8>,
    /// Retry budget the queue applies to this message
    pub max_retries: u32,
}

/// Declared task
pub struct Task<F> {
    options: TaskOptions,
    func: F,
}

/// Declare a task using the reference codec
pub fn task<F>(name: impl Into<String>, func: F) -> Task<F> {
    task_with(TaskOptions::new(name), func)
}

/// Declare a task with explicit options
///
/// An unset serializer defaults to [`CEREAL_SERIALIZER`].
pub fn task_with<F>(mut options: TaskOptions, func: F) -> Task<F> {
    if options.serializer.is_none() {
        options.serializer = Some(CEREAL_SERIALIZER.to_string());
    }
    Task { options, func }
}

impl<F> Task<F> {
    /// Task name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// Serializer this task uses
    #[must_use]
    pub fn serializer(&self) -> &str {
        self.options.serializer.as_deref().unwrap_or(CEREAL_SERIALIZER)
    }

    /// Resolved options
    #[inline]
    #[must_use]
    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    /// Serialize arguments into a queue message
    ///
    /// # Errors
    /// Returns error if the serializer is unknown or encoding fails
    pub fn enqueue(&self, registry: &SerializerRegistry, args: &Value) -> Result<TaskMessage, TaskError> {
        let encoded = registry.dumps(self.serializer(), args)?;
        tracing::debug!(task = self.name(), bytes = encoded.body.len(), "enqueued task");

        Ok(TaskMessage {
            task: self.name().to_string(),
            serializer: self.serializer().to_string(),
            content_type: encoded.content_type,
            content_encoding: encoded.content_encoding,
            body: encoded.body,
            max_retries: self.options.max_retries,
        })
    }

    /// Decode a queue message and run the task on it
    ///
    /// # Errors
    /// Returns error if the message targets another task or its payload
    /// cannot be decoded (including entities that no longer exist)
    pub fn run<R>(&self, registry: &SerializerRegistry, message: &TaskMessage) -> Result<R, TaskError>
    where
        F: Fn(Value) -> R,
    {
        if message.task != self.options.name {
            return Err(TaskError::WrongTask {
                expected: self.options.name.clone(),
                found: message.task.clone(),
            });
        }

        let args = registry.loads(&message.serializer, &message.content_type, &message.body)?;
        tracing::debug!(task = self.name(), "running task");
        Ok((self.func)(args))
    }

    /// Run the task in-process without serialization
    pub fn call<R>(&self, args: Value) -> R
    where
        F: Fn(Value) -> R,
    {
        (self.func)(args)
    }
}

impl<F> fmt::Debug for Task<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::registry::SerializerRegistration;
    use std::sync::Arc;

    #[test]
    fn task_defaults_to_reference_codec() {
        let t = task("app.noop", |_: Value| ());
        assert_eq!(t.serializer(), CEREAL_SERIALIZER);
        assert_eq!(t.options().serializer.as_deref(), Some(CEREAL_SERIALIZER));
    }

    #[test]
    fn task_keeps_explicit_serializer() {
        let t = task_with(TaskOptions::new("app.noop").with_serializer("json"), |_: Value| ());
        assert_eq!(t.serializer(), "json");
    }

    #[test]
    fn task_options_builder() {
        let options = TaskOptions::new("app.t").with_max_retries(0);
        assert_eq!(options.max_retries, 0);
        assert!(options.serializer.is_none());
    }

    #[test]
    fn call_runs_in_process() {
        let t = task("app.double", |v: Value| match v {
            Value::Int(n) => n * 2,
            _ => 0,
        });
        assert_eq!(t.call(Value::Int(21)), 42);
    }

    #[test]
    fn enqueue_unknown_serializer() {
        let t = task("app.noop", |_: Value| ());
        let err = t.enqueue(&SerializerRegistry::new(), &Value::Null).unwrap_err();
        assert!(matches!(err, TaskError::Registry(RegistryError::NotRegistered(_))));
    }

    #[test]
    fn enqueue_carries_retry_budget() {
        let mut registry = SerializerRegistry::new();
        registry
            .register(SerializerRegistration::new(
                CEREAL_SERIALIZER,
                Arc::new(|_: &Value| Ok::<_, CodecError>(b"{}".to_vec())),
                Arc::new(|_: &[u8]| Ok::<_, CodecError>(Value::Null)),
                "application/json",
                "utf-8",
            ))
            .unwrap();

        let default = task("app.noop", |_: Value| ());
        let message = default.enqueue(&registry, &Value::Null).unwrap();
        assert_eq!(message.max_retries, 3);

        let patient = task_with(TaskOptions::new("app.noop").with_max_retries(7), |_: Value| ());
        let message = patient.enqueue(&registry, &Value::Null).unwrap();
        assert_eq!(message.max_retries, 7);
        assert_eq!(message.serializer, CEREAL_SERIALIZER);
    }

    #[test]
    fn run_rejects_foreign_message() {
        let t = task("app.noop", |_: Value| ());
        let message = TaskMessage {
            task: "app.other".into(),
            serializer: CEREAL_SERIALIZER.into(),
            content_type: String::new(),
            content_encoding: String::new(),
            body: Vec::new(),
            max_retries: 0,
        };

        let err = t.run(&SerializerRegistry::new(), &message).unwrap_err();
        assert!(matches!(err, TaskError::WrongTask { .. }));
    }
}
