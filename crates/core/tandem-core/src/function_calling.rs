//! Local function tools that adapters execute on behalf of an agent

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Function definition advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,

    /// Function description
    pub description: String,

    /// Parameters schema (JSON Schema)
    pub parameters: serde_json::Value,
}

impl FunctionDefinition {
    /// Validate a function definition
    pub fn validate(&self) -> Result<(), FunctionError> {
        if self.name.is_empty() {
            return Err(FunctionError::new("Function name cannot be empty"));
        }
        if self.name.contains(char::is_whitespace) {
            return Err(FunctionError::new("Function name cannot contain whitespace"));
        }
        if self.description.is_empty() {
            return Err(FunctionError::new("Function description cannot be empty"));
        }
        if !self.parameters.is_object() {
            return Err(FunctionError::new(
                "Function parameters must be a JSON object",
            ));
        }
        Ok(())
    }
}

/// Function call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Backend call ID, echoed back with the output
    pub call_id: String,

    /// Function name to call
    pub name: String,

    /// Arguments (JSON object)
    pub arguments: serde_json::Value,
}

impl FunctionCall {
    /// Build a call from the raw argument string the backend sends
    pub fn from_raw(
        call_id: impl Into<String>,
        name: impl Into<String>,
        raw_arguments: &str,
    ) -> Self {
        let arguments = if raw_arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(raw_arguments)
                .unwrap_or_else(|_| serde_json::Value::String(raw_arguments.to_string()))
        };
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Function execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResult {
    /// Call ID
    pub call_id: String,

    /// Function name that was called
    pub name: String,

    /// Result value
    pub result: serde_json::Value,

    /// Whether the call succeeded
    pub success: bool,

    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FunctionResult {
    /// Output string submitted back to the backend
    ///
    /// Failures are reported to the model as `{"error": ...}` rather than
    /// failing the run.
    pub fn output_string(&self) -> String {
        if self.success {
            match &self.result {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        } else {
            serde_json::json!({ "error": self.error.clone().unwrap_or_default() }).to_string()
        }
    }
}

/// Error raised by a function handler
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct FunctionError(pub String);

impl FunctionError {
    /// Create a function error
    pub fn new(msg: impl Into<String>) -> Self {
        FunctionError(msg.into())
    }
}

/// Function handler type
pub type FunctionHandler = Arc<
    dyn Fn(
            serde_json::Value,
        ) -> std::pin::Pin<
            Box<
                dyn std::future::Future<Output = Result<serde_json::Value, FunctionError>>
                    + Send,
            >,
        > + Send
        + Sync,
>;

/// Registry of callable functions
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, (FunctionDefinition, FunctionHandler)>,
}

impl FunctionRegistry {
    /// Create a new function registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function
    pub fn register(
        &mut self,
        definition: FunctionDefinition,
        handler: FunctionHandler,
    ) -> Result<(), FunctionError> {
        definition.validate()?;
        info!("Registering function: {}", definition.name);
        self.functions
            .insert(definition.name.clone(), (definition, handler));
        Ok(())
    }

    /// Register a plain async closure
    pub fn register_fn<F, Fut>(
        &mut self,
        definition: FunctionDefinition,
        f: F,
    ) -> Result<(), FunctionError>
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<serde_json::Value, FunctionError>>
            + Send
            + 'static,
    {
        let handler: FunctionHandler = Arc::new(move |args| Box::pin(f(args)));
        self.register(definition, handler)
    }

    /// Get function definition
    pub fn get_definition(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.get(name).map(|(def, _)| def)
    }

    /// All definitions, sorted by name
    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        let mut defs: Vec<_> = self.functions.values().map(|(d, _)| d.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a function call
    pub async fn execute(&self, call: FunctionCall) -> FunctionResult {
        debug!("Executing function {} with {}", call.name, call.arguments);

        match self.functions.get(&call.name) {
            Some((_, handler)) => match handler(call.arguments).await {
                Ok(result) => FunctionResult {
                    call_id: call.call_id,
                    name: call.name,
                    result,
                    success: true,
                    error: None,
                },
                Err(e) => {
                    warn!("Function {} failed: {}", call.name, e);
                    FunctionResult {
                        call_id: call.call_id,
                        name: call.name,
                        result: serde_json::Value::Null,
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            },
            None => {
                warn!("Function '{}' not found in registry", call.name);
                FunctionResult {
                    error: Some(format!("Function '{}' not found", call.name)),
                    call_id: call.call_id,
                    name: call.name,
                    result: serde_json::Value::Null,
                    success: false,
                }
            }
        }
    }

    /// Check if function exists
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Get number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Helper to create a function definition
pub fn create_function_definition(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: serde_json::Value,
) -> FunctionDefinition {
    FunctionDefinition {
        name: name.into(),
        description: description.into(),
        parameters,
    }
}
