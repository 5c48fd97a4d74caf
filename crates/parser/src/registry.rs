//! Transaction handler registry.

use std::collections::HashMap;

use mirror_streams::{RecordItem, TransactionType};

use crate::context::ParserContext;
use crate::error::Result;
use crate::handlers;

/// Adds the type-specific rows of one successful transaction.
///
/// Handlers only read the item and write to the context.
pub type Handler = fn(&RecordItem, &mut ParserContext) -> Result<()>;

/// Static map from transaction type to its handler, built once at startup.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<TransactionType, Handler>,
}

impl HandlerRegistry {
    /// A registry without handlers.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A registry with every built-in handler.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for (transaction_type, handler) in handlers::BUILT_IN {
            registry.register(*transaction_type, *handler);
        }
        registry
    }

    /// Installs `handler`, returning the one it replaces.
    pub fn register(&mut self, transaction_type: TransactionType, handler: Handler) -> Option<Handler> {
        self.handlers.insert(transaction_type, handler)
    }

    pub fn get(&self, transaction_type: TransactionType) -> Option<Handler> {
        self.handlers.get(&transaction_type).copied()
    }

    pub fn contains(&self, transaction_type: TransactionType) -> bool {
        self.handlers.contains_key(&transaction_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("HandlerRegistry")
            .field("types", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &RecordItem, _: &mut ParserContext) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_built_in_handlers() {
        let registry = HandlerRegistry::new();
        assert_eq!(registry.len(), 11);
        assert!(registry.contains(TransactionType::ConsensusSubmitMessage));
        assert!(registry.get(TransactionType::Freeze).is_none());
        assert!(registry.get(TransactionType::Unknown).is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = HandlerRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.register(TransactionType::Freeze, noop).is_none());
        assert!(registry.register(TransactionType::Freeze, noop).is_some());
        assert_eq!(registry.len(), 1);
    }
}
