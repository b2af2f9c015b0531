//! What an op does to taint

/// Arguments of a sink call that reach the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkArgs {
    All,
    Only(usize),
}

impl SinkArgs {
    pub fn selects(&self, index: usize) -> bool {
        match self {
            SinkArgs::All => true,
            SinkArgs::Only(i) => *i == index,
        }
    }
}

/// Classification of a single op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpRole {
    /// Introduces attacker-controlled data
    Source,
    /// Output is safe whatever the input
    Sanitizer,
    /// Tainted arguments reaching it are findings
    Sink(SinkArgs),
    /// Output cannot carry a string (numeric, boolean, control flow)
    Inert,
    /// Output is tainted when an input is
    Propagate,
}

impl OpRole {
    /// Sanitizers and inert ops both clear what they write
    pub fn clears(&self) -> bool {
        matches!(self, OpRole::Sanitizer | OpRole::Inert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_args_selection() {
        assert!(SinkArgs::All.selects(3));
        assert!(SinkArgs::Only(1).selects(1));
        assert!(!SinkArgs::Only(1).selects(0));
        assert!(OpRole::Inert.clears());
        assert!(!OpRole::Sink(SinkArgs::All).clears());
    }
}
