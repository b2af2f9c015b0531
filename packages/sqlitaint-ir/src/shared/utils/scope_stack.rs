//! Scope stack for enclosing-name tracking
//!
//! Used by the pre-passes to remember enclosing classes, functions and methods.

/// Stack of enclosing names, one entry per open scope
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    scopes: Vec<String>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    /// Push a new scope
    pub fn push(&mut self, name: impl Into<String>) {
        self.scopes.push(name.into());
    }

    /// Pop the current scope
    pub fn pop(&mut self) -> Option<String> {
        self.scopes.pop()
    }

    /// Innermost name, or `""` outside any scope
    pub fn current(&self) -> &str {
        self.scopes.last().map(String::as_str).unwrap_or("")
    }

    /// Innermost name if any
    pub fn top(&self) -> Option<&str> {
        self.scopes.last().map(String::as_str)
    }

    /// Current depth
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Is empty?
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_current() {
        let mut stack = ScopeStack::new();
        assert_eq!(stack.current(), "");
        stack.push("A");
        stack.push("B");
        assert_eq!(stack.current(), "B");
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().as_deref(), Some("B"));
        assert_eq!(stack.top(), Some("A"));
    }
}
