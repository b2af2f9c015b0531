//! Declared types of parameters, properties and return values

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum OpType {
    Mixed,
    Void,
    /// Built-in type name (`int`, `string`, `array`...)
    Literal { name: String, nullable: bool },
    /// Class or interface reference, resolved by name
    Reference { declaration: String, nullable: bool },
    Union(Vec<OpType>),
}

impl Default for OpType {
    fn default() -> Self {
        OpType::Mixed
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpType::Mixed => write!(f, "mixed"),
            OpType::Void => write!(f, "void"),
            OpType::Literal { name, nullable } | OpType::Reference {
                declaration: name,
                nullable,
            } => {
                if *nullable {
                    write!(f, "?")?;
                }
                write!(f, "{}", name)
            }
            OpType::Union(types) => {
                let parts: Vec<String> = types.iter().map(|t| t.to_string()).collect();
                write!(f, "{}", parts.join("|"))
            }
        }
    }
}
