/*
 * Taint Pass
 *
 * Replays one execution path and builds its provenance graph: one node per
 * op (or call-boundary binding) that produced tainted data, with edges
 * pointing from consumer to producer. Each sink node is then walked back to
 * the sources that reach it.
 *
 * Per path, so the taint state is flow-sensitive for free: a variable that
 * is reassigned to a constant stops being tainted.
 */

use ahash::{AHashMap, AHashSet};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::trace;

use super::taxonomy::{callee_name, Taxonomy};
use crate::features::ir::domain::{IrArena, OpId, OpKind, OperandId, OperandKind};
use crate::features::path_enumeration::{ExecPath, PathEvent};
use crate::features::taint_analysis::domain::{OpRole, SinkArgs, TaintFinding};

/// Traces emitted per sink node before the walk stops
pub const DEFAULT_MAX_TRACES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Source,
    Flow,
    Sink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaintNode {
    pub op: OpId,
    pub role: NodeRole,
}

/// Provenance graph of one path
#[derive(Debug, Default)]
pub struct TaintGraph {
    pub graph: DiGraph<TaintNode, ()>,
    /// Latest node that tainted each operand
    tainted: AHashMap<OperandId, NodeIndex>,
    pub sinks: Vec<NodeIndex>,
}

impl TaintGraph {
    pub fn is_tainted(&self, operand: OperandId) -> bool {
        self.tainted.contains_key(&operand)
    }

    fn node(&mut self, op: OpId, role: NodeRole) -> NodeIndex {
        self.graph.add_node(TaintNode { op, role })
    }

    /// New node fed by `inputs`
    fn derive(&mut self, op: OpId, role: NodeRole, inputs: &[NodeIndex]) -> NodeIndex {
        let node = self.node(op, role);
        for input in inputs {
            self.graph.update_edge(node, *input, ());
        }
        node
    }

    fn taint(&mut self, operand: OperandId, node: NodeIndex) {
        self.tainted.insert(operand, node);
    }

    fn clear(&mut self, operand: OperandId) {
        self.tainted.remove(&operand);
    }

    fn producers(&self, operands: &[OperandId]) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = Vec::new();
        for operand in operands {
            if let Some(node) = self.tainted.get(operand) {
                if !out.contains(node) {
                    out.push(*node);
                }
            }
        }
        out
    }
}

pub struct TaintPass<'a> {
    arena: &'a IrArena,
    taxonomy: &'a Taxonomy,
    max_traces: usize,
}

impl<'a> TaintPass<'a> {
    pub fn new(arena: &'a IrArena, taxonomy: &'a Taxonomy) -> Self {
        Self {
            arena,
            taxonomy,
            max_traces: DEFAULT_MAX_TRACES,
        }
    }

    pub fn with_max_traces(mut self, max_traces: usize) -> Self {
        self.max_traces = max_traces.max(1);
        self
    }

    /// Findings on one path, in sink order
    pub fn run(&self, path: &ExecPath) -> Vec<TaintFinding> {
        let graph = self.build(path);
        self.traces(&graph)
    }

    /// Replay the path's events into a provenance graph
    pub fn build(&self, path: &ExecPath) -> TaintGraph {
        let mut graph = TaintGraph::default();
        for event in &path.events {
            match *event {
                PathEvent::Op(op) => self.step(&mut graph, op),
                PathEvent::Bind {
                    via,
                    target,
                    source,
                } => Self::bind(&mut graph, via, target, source),
            }
        }
        graph
    }

    fn step(&self, graph: &mut TaintGraph, op: OpId) {
        let kind = &self.arena.op(op).kind;
        let (inputs, outputs) = self.flow(kind);
        match self.taxonomy.classify(self.arena, op) {
            OpRole::Source => {
                let node = graph.node(op, NodeRole::Source);
                for output in outputs {
                    graph.taint(output, node);
                }
            }
            OpRole::Sanitizer | OpRole::Inert => {
                for output in outputs {
                    graph.clear(output);
                }
            }
            OpRole::Sink(selected) => {
                let producers = graph.producers(&Self::sink_inputs(kind, selected));
                if !producers.is_empty() {
                    let node = graph.derive(op, NodeRole::Sink, &producers);
                    graph.sinks.push(node);
                    trace!(op = %op, inputs = producers.len(), "tainted sink");
                }
                for output in outputs {
                    graph.clear(output);
                }
            }
            OpRole::Propagate => {
                let producers = graph.producers(&inputs);
                if producers.is_empty() {
                    for output in outputs {
                        graph.clear(output);
                    }
                } else {
                    let node = graph.derive(op, NodeRole::Flow, &producers);
                    for output in outputs {
                        graph.taint(output, node);
                    }
                }
            }
        }
    }

    /// Values moving into a parameter, out of a return, or along an alias
    fn bind(
        graph: &mut TaintGraph,
        via: Option<OpId>,
        target: OperandId,
        source: Option<OperandId>,
    ) {
        let producer = source.and_then(|s| graph.tainted.get(&s).copied());
        match (producer, via) {
            (Some(producer), Some(via)) => {
                let node = graph.derive(via, NodeRole::Flow, &[producer]);
                graph.taint(target, node);
            }
            (Some(producer), None) => graph.taint(target, producer),
            (None, _) => graph.clear(target),
        }
    }

    /// Operands an op reads taint from and operands it writes
    fn flow(&self, kind: &OpKind) -> (Vec<OperandId>, Vec<OperandId>) {
        match kind {
            OpKind::Assign { var, expr, result } | OpKind::AssignRef { var, expr, result } => {
                (vec![*expr], vec![*var, *result])
            }
            // a tainted index alone does not make the element tainted
            OpKind::ArrayDimFetch { var, dim, result } => {
                let inputs = match dim.and_then(|dim| literal_element(self.arena, *var, dim)) {
                    Some(element) => element.into_iter().collect(),
                    None => vec![*var],
                };
                (inputs, vec![*result])
            }
            OpKind::FunctionCall { name, args, result }
                if args.len() >= 2
                    && callee_name(self.arena, *name).as_deref() == Some("parse_str") =>
            {
                (vec![args[0]], vec![args[1], *result])
            }
            OpKind::Unset { results, .. } => (Vec::new(), results.clone()),
            other => {
                let mut inputs = Vec::new();
                let mut outputs = Vec::new();
                other.for_each_operand(|slot, id| {
                    if other.is_write_slot(slot) {
                        outputs.push(id);
                    } else {
                        inputs.push(id);
                    }
                });
                (inputs, outputs)
            }
        }
    }

    fn sink_inputs(kind: &OpKind, selected: SinkArgs) -> Vec<OperandId> {
        kind.operand_list("args")
            .into_iter()
            .enumerate()
            .filter(|(i, _)| selected.selects(*i))
            .map(|(_, id)| id)
            .collect()
    }

    /// Walk every sink back to the sources that reach it
    pub fn traces(&self, graph: &TaintGraph) -> Vec<TaintFinding> {
        let mut findings = Vec::new();
        let mut seen: AHashSet<Vec<OpId>> = AHashSet::new();

        for sink in &graph.sinks {
            let mut emitted = 0;
            // (node, index of the next edge to try); graph edges only point
            // backwards in event order, so no visited set is needed
            let mut stack: Vec<(NodeIndex, usize)> = vec![(*sink, 0)];
            while let Some((node, next)) = stack.last().copied() {
                if emitted >= self.max_traces {
                    break;
                }
                // petgraph yields the newest edge first; walk inputs in
                // operand order instead
                let mut producers: Vec<NodeIndex> = graph
                    .graph
                    .neighbors_directed(node, Direction::Outgoing)
                    .collect();
                producers.reverse();
                if producers.is_empty() {
                    if graph.graph[node].role == NodeRole::Source {
                        let trace: Vec<OpId> =
                            stack.iter().rev().map(|(n, _)| graph.graph[*n].op).collect();
                        if seen.insert(trace.clone()) {
                            if let Some(finding) = TaintFinding::new(trace) {
                                findings.push(finding);
                                emitted += 1;
                            }
                        }
                    }
                    stack.pop();
                    continue;
                }
                match producers.get(next) {
                    Some(producer) => {
                        if let Some(top) = stack.last_mut() {
                            top.1 += 1;
                        }
                        stack.push((*producer, 0));
                    }
                    None => {
                        stack.pop();
                    }
                }
            }
        }
        findings
    }
}

/// Constant array key, normalized the way PHP stores it
#[derive(Debug, Clone, PartialEq)]
enum ArrayKey {
    Int(i64),
    Str(String),
}

impl ArrayKey {
    fn of(arena: &IrArena, operand: OperandId) -> Option<Self> {
        match &arena.operand(arena.value_of(operand)).kind {
            OperandKind::Number(n) if n.is_finite() => Some(Self::Int(n.trunc() as i64)),
            OperandKind::Bool(b) => Some(Self::Int(i64::from(*b))),
            OperandKind::String(s) => Some(match s.parse::<i64>() {
                Ok(i) if i.to_string() == *s => Self::Int(i),
                _ => Self::Str(s.clone()),
            }),
            _ => None,
        }
    }
}

/// Value that `array[dim]` reads when `array` is an array literal and `dim`
/// a constant: `Some(None)` for a missing key, `None` when either is unknown
fn literal_element(arena: &IrArena, array: OperandId, dim: OperandId) -> Option<Option<OperandId>> {
    let def = *arena.operand(array).defs.first()?;
    let OpKind::Array { keys, values, .. } = &arena.op(def).kind else {
        return None;
    };
    let wanted = ArrayKey::of(arena, dim)?;

    let mut next_index = 0i64;
    let mut selected = None;
    for (key, value) in keys.iter().zip(values) {
        let key = match arena.operand(*key).kind {
            OperandKind::Null => ArrayKey::Int(next_index),
            _ => ArrayKey::of(arena, *key)?,
        };
        if let ArrayKey::Int(i) = key {
            next_index = next_index.max(i.saturating_add(1));
        }
        // later duplicates overwrite earlier ones
        if key == wanted {
            selected = Some(*value);
        }
    }
    Some(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::domain::{FuncId, OperandKind};
    use crate::features::ir::domain::op::{BinaryOp, CastKind};
    use crate::shared::models::Position;

    struct Ir {
        arena: IrArena,
        func: FuncId,
        path: ExecPath,
    }

    impl Ir {
        fn new() -> Self {
            let mut arena = IrArena::new();
            let func = arena.new_func("{main}");
            Self {
                arena,
                func,
                path: ExecPath::new(func, 0),
            }
        }

        fn run(&mut self, kind: OpKind) -> OpId {
            let entry = self.arena.func(self.func).entry;
            let result = kind.result();
            let op = self.arena.add_op(kind, Position::new(1, 1, 0, 0), None);
            self.arena.append(entry, op);
            self.path.push_op(op, result);
            op
        }

        fn temp(&mut self) -> OperandId {
            self.arena.new_temporary(None)
        }

        fn source(&mut self) -> (OpId, OperandId) {
            let get = self.arena.new_operand(OperandKind::Symbolic {
                tag: "getsymbolic".into(),
            });
            self.arena.operand_mut(get).tainted = true;
            let dim = self.arena.new_string("q");
            let result = self.temp();
            let op = self.run(OpKind::ArrayDimFetch {
                var: get,
                dim: Some(dim),
                result,
            });
            (op, result)
        }

        fn assign(&mut self, expr: OperandId) -> (OpId, OperandId) {
            let var = self.temp();
            let result = self.temp();
            let op = self.run(OpKind::Assign { var, expr, result });
            (op, var)
        }

        fn call(&mut self, name: &str, args: Vec<OperandId>) -> (OpId, OperandId) {
            let name = self.arena.new_string(name);
            let result = self.temp();
            let op = self.run(OpKind::FunctionCall { name, args, result });
            (op, result)
        }

        fn findings(&self) -> Vec<TaintFinding> {
            let taxonomy = Taxonomy::new(false);
            TaintPass::new(&self.arena, &taxonomy).run(&self.path)
        }
    }

    #[test]
    fn test_direct_flow_traces_through_assignment() {
        let mut ir = Ir::new();
        let (fetch, value) = ir.source();
        let (assign, x) = ir.assign(value);
        let (sink, _) = ir.call("mysql_query", vec![x]);

        let findings = ir.findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].trace, vec![fetch, assign, sink]);
        assert_eq!(findings[0].source, fetch);
        assert_eq!(findings[0].sink, sink);
    }

    #[test]
    fn test_sanitizer_breaks_flow() {
        let mut ir = Ir::new();
        let (_, value) = ir.source();
        let (_, x) = ir.assign(value);
        let (_, clean) = ir.call("intval", vec![x]);
        let (_, y) = ir.assign(clean);
        ir.call("mysql_query", vec![y]);
        assert!(ir.findings().is_empty());
    }

    #[test]
    fn test_two_sources_give_two_findings() {
        let mut ir = Ir::new();
        let (first, a) = ir.source();
        let (second, b) = ir.source();
        let joined = ir.temp();
        ir.run(OpKind::Binary {
            op: BinaryOp::Concat,
            left: a,
            right: b,
            result: joined,
        });
        ir.call("mysql_query", vec![joined]);

        let sources: Vec<OpId> = ir.findings().iter().map(|f| f.source).collect();
        assert_eq!(sources, vec![first, second]);
    }

    #[test]
    fn test_reassignment_clears_taint() {
        let mut ir = Ir::new();
        let (_, value) = ir.source();
        let (_, x) = ir.assign(value);
        let safe = ir.arena.new_string("safe");
        let var = x;
        let result = ir.temp();
        ir.run(OpKind::Assign {
            var,
            expr: safe,
            result,
        });
        ir.call("mysql_query", vec![x]);
        assert!(ir.findings().is_empty(), "constant overwrite untaints $x");
    }

    #[test]
    fn test_tainted_index_does_not_taint_element() {
        let mut ir = Ir::new();
        let (_, key) = ir.source();
        let table = ir.temp();
        let element = ir.temp();
        ir.run(OpKind::ArrayDimFetch {
            var: table,
            dim: Some(key),
            result: element,
        });
        ir.call("mysql_query", vec![element]);
        assert!(ir.findings().is_empty());
    }

    #[test]
    fn test_param_binding_is_a_hop() {
        let mut ir = Ir::new();
        let (fetch, value) = ir.source();
        let name = ir.arena.new_string("a");
        let param_result = ir.temp();
        let callee = ir.arena.new_func("f");
        let param = ir.arena.add_op(
            OpKind::Param {
                name,
                default_var: None,
                default_block: None,
                by_ref: false,
                variadic: false,
                declared_type: Default::default(),
                func: callee,
                result: param_result,
            },
            Position::new(1, 1, 0, 0),
            None,
        );
        ir.path.bind(Some(param), param_result, Some(value));
        let (sink, _) = ir.call("mysql_query", vec![param_result]);

        let findings = ir.findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].trace, vec![fetch, param, sink]);
    }

    #[test]
    fn test_sink_argument_selection() {
        let mut ir = Ir::new();
        let (_, value) = ir.source();
        let conn = ir.temp();
        let sql = ir.arena.new_string("SELECT 1 WHERE a = $1");
        // tainted value in the params array, not the query text
        ir.call("pg_query_params", vec![conn, sql, value]);
        assert!(ir.findings().is_empty());

        ir.call("pg_query_params", vec![conn, value]);
        assert_eq!(ir.findings().len(), 1);
    }

    #[test]
    fn test_int_cast_sanitizes() {
        let mut ir = Ir::new();
        let (_, value) = ir.source();
        let number = ir.temp();
        ir.run(OpKind::Cast {
            kind: CastKind::Int,
            expr: value,
            result: number,
        });
        ir.call("mysql_query", vec![number]);
        assert!(ir.findings().is_empty());
    }

    #[test]
    fn test_parse_str_taints_output_argument() {
        let mut ir = Ir::new();
        let (_, value) = ir.source();
        let out = ir.temp();
        ir.call("parse_str", vec![value, out]);
        ir.call("mysql_query", vec![out]);
        assert_eq!(ir.findings().len(), 1);
    }

    #[test]
    fn test_trace_cap_per_sink() {
        let mut ir = Ir::new();
        let mut parts = Vec::new();
        for _ in 0..5 {
            let (_, v) = ir.source();
            parts.push(v);
        }
        let joined = ir.temp();
        ir.run(OpKind::ConcatList {
            list: parts,
            result: joined,
        });
        ir.call("mysql_query", vec![joined]);

        let taxonomy = Taxonomy::new(false);
        let capped = TaintPass::new(&ir.arena, &taxonomy)
            .with_max_traces(2)
            .run(&ir.path);
        assert_eq!(capped.len(), 2);
        assert_eq!(ir.findings().len(), 5);
    }
}
