//! Call Resolver
//!
//! Maps call ops to callee functions by scoped name. Lookup runs over the
//! calling script first, then over every script it includes (transitively).
//! Names are compared case-insensitively, as the language does.
//!
//! | Call                | Key tried                                  |
//! |---------------------|--------------------------------------------|
//! | `f()`               | `f`, then any function with leaf name `f`  |
//! | `$closure()`        | the function behind the `Closure` op       |
//! | `$obj->m()`         | `Class::m` from the receiver, then `*::m`  |
//! | `A::m()`            | `A::m` (`self`/`static` → caller's class)  |
//! | `new A()`           | `A::__construct`                           |

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};

use crate::features::ir::domain::{FuncId, IrArena, OpId, OpKind, OperandId, OperandKind, Script};

/// Bound on value chains followed to find a closure
const MAX_CHAIN: usize = 16;

pub struct CallResolver<'a> {
    arena: &'a IrArena,
    /// Lowercased scoped name → function, per script
    names: Vec<AHashMap<String, FuncId>>,
    /// Scripts searched from each script, itself first
    visible: Vec<Vec<usize>>,
    owners: AHashMap<FuncId, usize>,
}

impl<'a> CallResolver<'a> {
    pub fn new(arena: &'a IrArena, scripts: &'a [Script]) -> Self {
        let by_path: AHashMap<&str, usize> = scripts
            .iter()
            .enumerate()
            .map(|(i, s)| (s.file_path.as_ref(), i))
            .collect();

        let names = scripts
            .iter()
            .map(|s| {
                s.functions
                    .iter()
                    .map(|(name, func)| (name.trim_start_matches('\\').to_ascii_lowercase(), *func))
                    .collect()
            })
            .collect();

        let visible = (0..scripts.len())
            .map(|start| {
                let mut seen = AHashSet::new();
                let mut order = Vec::new();
                let mut queue = VecDeque::from([start]);
                while let Some(idx) = queue.pop_front() {
                    if !seen.insert(idx) {
                        continue;
                    }
                    order.push(idx);
                    for included in &scripts[idx].included_files {
                        if let Some(next) = by_path.get(included.as_str()) {
                            queue.push_back(*next);
                        }
                    }
                }
                order
            })
            .collect();

        let owners = scripts
            .iter()
            .enumerate()
            .flat_map(|(i, s)| s.functions.values().map(move |f| (*f, i)))
            .collect();

        Self {
            arena,
            names,
            visible,
            owners,
        }
    }

    /// Scripts searched from `script`, itself first
    pub fn visible(&self, script: usize) -> &[usize] {
        self.visible.get(script).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Script that declares `func`
    pub fn script_of(&self, func: FuncId) -> Option<usize> {
        self.owners.get(&func).copied()
    }

    /// Callee of `call`, seen from `script` while executing `caller`
    pub fn resolve(
        &self,
        script: usize,
        caller: FuncId,
        call: OpId,
        substitutions: &AHashMap<OperandId, OperandId>,
    ) -> Option<FuncId> {
        match &self.arena.op(call).kind {
            OpKind::FunctionCall { name, .. } => match self.arena.string_of(*name) {
                Some(name) => self.function(script, name),
                None => self.closure_behind(*name, substitutions),
            },
            OpKind::MethodCall { var, name, .. } => {
                let method = self.arena.string_of(*name)?;
                let class = self.receiver_class(*var, caller, substitutions);
                self.method(script, class.as_deref(), method)
            }
            OpKind::StaticCall { class, name, .. } => {
                let method = self.arena.string_of(*name)?;
                let class = self.static_class(*class, caller)?;
                self.method(script, Some(&class), method)
            }
            OpKind::New { class, .. } => {
                let class = self.static_class(*class, caller)?;
                self.lookup(script, &format!("{}::__construct", class))
            }
            _ => None,
        }
    }

    fn function(&self, script: usize, name: &str) -> Option<FuncId> {
        let name = name.trim_start_matches('\\');
        if let Some(found) = self.lookup(script, name) {
            return Some(found);
        }
        let wanted = leaf(name).to_ascii_lowercase();
        self.find_visible(script, |key| !key.contains("::") && leaf(key) == wanted)
    }

    fn method(&self, script: usize, class: Option<&str>, method: &str) -> Option<FuncId> {
        let method = method.to_ascii_lowercase();
        if let Some(class) = class {
            let class = class.trim_start_matches('\\');
            if let Some(found) = self.lookup(script, &format!("{}::{}", class, method)) {
                return Some(found);
            }
            let class_leaf = leaf(class).to_ascii_lowercase();
            let suffix = format!("::{}", method);
            if let Some(found) = self.find_visible(script, |key| {
                key.strip_suffix(&suffix)
                    .is_some_and(|owner| leaf(owner) == class_leaf)
            }) {
                return Some(found);
            }
        }
        self.unique_method(script, &method)
    }

    /// Method by name alone when exactly one visible class declares it
    fn unique_method(&self, script: usize, method: &str) -> Option<FuncId> {
        let suffix = format!("::{}", method);
        let mut found = None;
        for idx in &self.visible[script] {
            for (key, func) in &self.names[*idx] {
                if key.ends_with(&suffix) {
                    if found.is_some_and(|f| f != *func) {
                        return None;
                    }
                    found = Some(*func);
                }
            }
        }
        found
    }

    fn lookup(&self, script: usize, scoped_name: &str) -> Option<FuncId> {
        let key = scoped_name.to_ascii_lowercase();
        self.visible
            .get(script)?
            .iter()
            .find_map(|idx| self.names[*idx].get(&key).copied())
    }

    fn find_visible(&self, script: usize, matches: impl Fn(&str) -> bool) -> Option<FuncId> {
        self.visible.get(script)?.iter().find_map(|idx| {
            let mut hits: Vec<(&String, &FuncId)> =
                self.names[*idx].iter().filter(|(k, _)| matches(k)).collect();
            hits.sort();
            hits.first().map(|(_, f)| **f)
        })
    }

    fn receiver_class(
        &self,
        var: OperandId,
        caller: FuncId,
        substitutions: &AHashMap<OperandId, OperandId>,
    ) -> Option<String> {
        let value = self.arena.value_of(follow(substitutions, var));
        match &self.arena.operand(value).kind {
            OperandKind::Object { class_name } => Some(class_name.clone()),
            _ if self.arena.name_of(var) == Some("this") => self.arena.func(caller).class.clone(),
            _ => None,
        }
    }

    fn static_class(&self, class: OperandId, caller: FuncId) -> Option<String> {
        let name = self.arena.string_of(class)?;
        match name.to_ascii_lowercase().as_str() {
            "self" | "static" => self.arena.func(caller).class.clone(),
            "parent" => None,
            _ => Some(name.to_string()),
        }
    }

    /// Function of the `Closure` op that produced the called value
    fn closure_behind(
        &self,
        callee: OperandId,
        substitutions: &AHashMap<OperandId, OperandId>,
    ) -> Option<FuncId> {
        let mut current = callee;
        for _ in 0..MAX_CHAIN {
            current = follow(substitutions, current);
            let resolved = self.arena.value_of(current);
            let def = self
                .arena
                .operand(current)
                .defs
                .first()
                .or_else(|| self.arena.operand(resolved).defs.first())
                .copied()?;
            match &self.arena.op(def).kind {
                OpKind::Closure { func, .. } => return Some(*func),
                OpKind::Assign { expr, .. } | OpKind::AssignRef { expr, .. } => current = *expr,
                _ => return None,
            }
        }
        None
    }
}

fn follow(substitutions: &AHashMap<OperandId, OperandId>, id: OperandId) -> OperandId {
    let mut current = id;
    for _ in 0..MAX_CHAIN {
        match substitutions.get(&current) {
            Some(next) if *next != current => current = *next,
            _ => break,
        }
    }
    current
}

/// Segment after the last namespace separator
fn leaf(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::Position;
    use std::sync::Arc;

    struct Fixture {
        arena: IrArena,
        scripts: Vec<Script>,
        main: FuncId,
    }

    fn declare(arena: &mut IrArena, script: &mut Script, name: &str, class: Option<&str>) -> FuncId {
        let func = arena.new_func(name);
        arena.func_mut(func).class = class.map(str::to_string);
        let scoped = arena.func(func).scoped_name();
        script.add_function(scoped, func);
        func
    }

    fn fixture() -> (Fixture, FuncId, FuncId, FuncId) {
        let mut arena = IrArena::new();
        let main = arena.new_func("{main}");
        let mut a = Script::new(Arc::from("/app/a.php"), main);
        a.add_include("/app/lib.php".to_string());

        let lib_main = arena.new_func("{main}");
        let mut lib = Script::new(Arc::from("/app/lib.php"), lib_main);
        let helper = declare(&mut arena, &mut lib, "App\\helper", None);
        let find = declare(&mut arena, &mut lib, "find", Some("App\\Repo"));
        let ctor = declare(&mut arena, &mut lib, "__construct", Some("App\\Repo"));

        (
            Fixture {
                arena,
                scripts: vec![a, lib],
                main,
            },
            helper,
            find,
            ctor,
        )
    }

    fn call(arena: &mut IrArena, kind: OpKind) -> OpId {
        arena.add_op(kind, Position::zero(), None)
    }

    #[test]
    fn test_function_through_include_and_leaf() {
        let (mut fx, helper, _, _) = fixture();
        let name = fx.arena.new_string("HELPER");
        let result = fx.arena.new_temporary(None);
        let op = call(
            &mut fx.arena,
            OpKind::FunctionCall {
                name,
                args: vec![],
                result,
            },
        );
        let resolver = CallResolver::new(&fx.arena, &fx.scripts);
        assert_eq!(
            resolver.resolve(0, fx.main, op, &AHashMap::new()),
            Some(helper),
            "leaf lookup is case-insensitive and crosses includes"
        );
        assert_eq!(resolver.script_of(helper), Some(1));
        assert_eq!(resolver.resolve(1, fx.main, op, &AHashMap::new()), Some(helper));
    }

    #[test]
    fn test_method_by_receiver_class() {
        let (mut fx, _, find, ctor) = fixture();
        let class = fx.arena.new_string("App\\Repo");
        let result = fx.arena.new_operand(OperandKind::Object {
            class_name: "App\\Repo".into(),
        });
        let new_op = call(
            &mut fx.arena,
            OpKind::New {
                class,
                args: vec![],
                result,
            },
        );
        let receiver = fx.arena.new_temporary(Some(result));
        let name = fx.arena.new_string("Find");
        let call_result = fx.arena.new_temporary(None);
        let method = call(
            &mut fx.arena,
            OpKind::MethodCall {
                var: receiver,
                name,
                args: vec![],
                nullsafe: false,
                result: call_result,
            },
        );

        let resolver = CallResolver::new(&fx.arena, &fx.scripts);
        let subs = AHashMap::new();
        assert_eq!(resolver.resolve(0, fx.main, new_op, &subs), Some(ctor));
        assert_eq!(resolver.resolve(0, fx.main, method, &subs), Some(find));
    }

    #[test]
    fn test_unresolved_names() {
        let (mut fx, _, _, _) = fixture();
        let name = fx.arena.new_string("mysql_query");
        let result = fx.arena.new_temporary(None);
        let op = call(
            &mut fx.arena,
            OpKind::FunctionCall {
                name,
                args: vec![],
                result,
            },
        );
        let resolver = CallResolver::new(&fx.arena, &fx.scripts);
        assert_eq!(resolver.resolve(0, fx.main, op, &AHashMap::new()), None);
    }

    #[test]
    fn test_closure_through_assignment() {
        let mut arena = IrArena::new();
        let main = arena.new_func("{main}");
        let mut script = Script::new(Arc::from("/app/c.php"), main);
        let closure = arena.new_func("{anonymous}#1");
        script.add_function("{anonymous}#1".into(), closure);

        let value = arena.new_temporary(None);
        call(
            &mut arena,
            OpKind::Closure {
                func: closure,
                use_vars: vec![],
                result: value,
            },
        );
        let name = arena.new_string("f");
        let var = arena.new_operand(OperandKind::Variable { name, value: None });
        let target = arena.new_temporary(Some(var));
        let assigned = arena.new_temporary(None);
        call(
            &mut arena,
            OpKind::Assign {
                var: target,
                expr: value,
                result: assigned,
            },
        );
        let result = arena.new_temporary(None);
        let op = call(
            &mut arena,
            OpKind::FunctionCall {
                name: target,
                args: vec![],
                result,
            },
        );

        let scripts = vec![script];
        let resolver = CallResolver::new(&arena, &scripts);
        assert_eq!(resolver.resolve(0, main, op, &AHashMap::new()), Some(closure));
    }
}
