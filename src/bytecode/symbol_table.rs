use std::collections::HashMap;

/// Global name resolution for the compiler.
///
/// Each defined name owns one slot in the VM's globals store; slots are
/// handed out in definition order and a redefinition keeps the original slot.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    slots: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for `name`, allocating a new one on first definition.
    pub fn define(&mut self, name: &str) -> usize {
        let next = self.slots.len();
        *self.slots.entry(name.to_string()).or_insert(next)
    }

    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_allocates_in_order() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("a"), 0);
        assert_eq!(table.define("b"), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_redefine_keeps_slot() {
        let mut table = SymbolTable::new();
        table.define("a");
        table.define("b");
        assert_eq!(table.define("a"), 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_resolve() {
        let mut table = SymbolTable::new();
        table.define("x");
        assert_eq!(table.resolve("x"), Some(0));
        assert_eq!(table.resolve("y"), None);
        assert!(!table.is_empty());
    }
}
