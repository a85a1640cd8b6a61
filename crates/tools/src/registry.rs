//! In-memory registry of callable local functions: each entry pairs the
//! declarative [`FunctionContract`] (used for provider advertisement and
//! schema generation) with the handler that actually runs it.

use std::collections::HashMap;
use std::sync::Arc;

use agentcore_domain::contract::FunctionContract;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value, String>;
}

struct Entry {
    contract: FunctionContract,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
pub struct ToolRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, contract: FunctionContract, handler: Arc<dyn ToolHandler>) {
        let name = contract.name.clone();
        self.entries.write().insert(name, Entry { contract, handler });
    }

    pub fn get(&self, name: &str) -> Option<(FunctionContract, Arc<dyn ToolHandler>)> {
        self.entries
            .read()
            .get(name)
            .map(|e| (e.contract.clone(), e.handler.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn contracts(&self) -> Vec<FunctionContract> {
        self.entries.read().values().map(|e| e.contract.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}
