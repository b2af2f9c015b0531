//! Per-file lowering result

use std::collections::BTreeMap;
use std::sync::Arc;

use super::ids::FuncId;

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub file_path: Arc<str>,
    /// Functions by scoped name (`{main}`, `f`, `Class::m`, `{anonymous}#1`)
    pub functions: BTreeMap<String, FuncId>,
    /// Declaration order, `{main}` first
    pub ordered_functions: Vec<FuncId>,
    /// Literal include/require targets, resolved against this file's directory
    pub included_files: Vec<String>,
    pub main: FuncId,
}

impl Script {
    pub fn new(file_path: Arc<str>, main: FuncId) -> Self {
        let mut functions = BTreeMap::new();
        functions.insert(super::func::MAIN_FUNC_NAME.to_string(), main);
        Self {
            file_path,
            functions,
            ordered_functions: vec![main],
            included_files: Vec::new(),
            main,
        }
    }

    pub fn add_function(&mut self, scoped_name: String, func: FuncId) {
        if self.functions.insert(scoped_name, func).is_none() {
            self.ordered_functions.push(func);
        }
    }

    pub fn function(&self, scoped_name: &str) -> Option<FuncId> {
        self.functions.get(scoped_name).copied()
    }

    pub fn add_include(&mut self, path: String) {
        if !self.included_files.contains(&path) {
            self.included_files.push(path);
        }
    }
}
