//! In-memory gateway serving canned responses for tests

use super::Gateway;
use crate::error::{SpeedupError, SpeedupResult};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

enum Canned {
    Result(Value),
    Error { code: i64, message: String },
}

/// Gateway answering each method with a fixed response and recording calls
#[derive(Default)]
pub struct StaticGateway {
    responses: HashMap<String, Canned>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, method: &str, result: Value) -> Self {
        self.responses
            .insert(method.to_string(), Canned::Result(result));
        self
    }

    pub fn with_error(mut self, method: &str, code: i64, message: &str) -> Self {
        self.responses.insert(
            method.to_string(),
            Canned::Error {
                code,
                message: message.to_string(),
            },
        );
        self
    }

    /// Methods invoked so far, in order
    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    /// Params of the most recent call to `method`
    pub fn last_params(&self, method: &str) -> Option<Vec<Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
    }
}

#[async_trait]
impl Gateway for StaticGateway {
    async fn invoke(&self, method: &str, params: Vec<Value>) -> SpeedupResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        match self.responses.get(method) {
            Some(Canned::Result(value)) => Ok(value.clone()),
            Some(Canned::Error { code, message }) => Err(SpeedupError::Rpc {
                code: *code,
                message: message.clone(),
            }),
            None => Err(SpeedupError::Rpc {
                code: -32601,
                message: format!("the method {} does not exist/is not available", method),
            }),
        }
    }
}
