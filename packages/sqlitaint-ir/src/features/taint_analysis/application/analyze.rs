//! Analyze taint use case
//!
//! Runs the taint pass over every enumerated path and merges the findings.
//! Paths share prefixes, so the same flow is usually found many times; it
//! is kept once, in first-seen order.

use ahash::AHashSet;
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::features::ir::domain::IrArena;
use crate::features::path_enumeration::ExecPath;
use crate::features::taint_analysis::domain::TaintFinding;
use crate::features::taint_analysis::infrastructure::{TaintPass, Taxonomy};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaintStats {
    pub paths: usize,
    /// Paths with at least one finding
    pub tainted_paths: usize,
    pub findings: usize,
    pub duplicates: usize,
}

#[derive(Debug, Default)]
pub struct TaintOutcome {
    pub findings: Vec<TaintFinding>,
    pub stats: TaintStats,
}

pub struct AnalyzeTaintUseCase {
    taxonomy: Taxonomy,
}

impl AnalyzeTaintUseCase {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            taxonomy: Taxonomy::new(config.laravel),
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn execute(&self, arena: &IrArena, paths: &[ExecPath]) -> TaintOutcome {
        let pass = TaintPass::new(arena, &self.taxonomy);
        let mut seen: AHashSet<TaintFinding> = AHashSet::new();
        let mut outcome = TaintOutcome::default();

        for (index, path) in paths.iter().enumerate() {
            let found = pass.run(path);
            if !found.is_empty() {
                outcome.stats.tainted_paths += 1;
                debug!(path = index, findings = found.len(), "tainted path");
            }
            for finding in found {
                if seen.insert(finding.clone()) {
                    outcome.findings.push(finding);
                } else {
                    outcome.stats.duplicates += 1;
                }
            }
        }

        outcome.stats.paths = paths.len();
        outcome.stats.findings = outcome.findings.len();
        info!(
            paths = outcome.stats.paths,
            tainted_paths = outcome.stats.tainted_paths,
            findings = outcome.stats.findings,
            duplicates = outcome.stats.duplicates,
            "taint analysis done"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::domain::{OpKind, Script};
    use crate::features::lowering::LowerFileUseCase;
    use crate::features::optimizer::OptimizeUseCase;
    use crate::features::parsing::PhpParser;
    use crate::features::path_enumeration::{EnumeratePathsUseCase, PathCondition};
    use crate::features::ssa::SimplifyUseCase;

    struct Analyzed {
        arena: IrArena,
        paths: Vec<ExecPath>,
        outcome: TaintOutcome,
    }

    fn analyze_with(config: AnalysisConfig, sources: &[(&str, &str)]) -> Analyzed {
        let mut arena = IrArena::new();
        let lower = LowerFileUseCase::new(PhpParser::new());
        let scripts: Vec<Script> = sources
            .iter()
            .map(|(path, source)| {
                lower
                    .execute(&mut arena, source, path)
                    .expect("lowering should succeed")
            })
            .collect();
        for script in &scripts {
            OptimizeUseCase::new().execute_all(&mut arena, script.ordered_functions.clone());
            SimplifyUseCase::new().execute_all(&mut arena, script.ordered_functions.clone());
        }
        let use_case = AnalyzeTaintUseCase::new(&config);
        let enumerated = EnumeratePathsUseCase::new(config.clone()).execute_with(
            &mut arena,
            &scripts,
            |arena, func| use_case.taxonomy().reads_input(arena, func),
        );
        let outcome = use_case.execute(&arena, &enumerated.paths);
        Analyzed {
            arena,
            paths: enumerated.paths,
            outcome,
        }
    }

    fn analyze(source: &str) -> Analyzed {
        analyze_with(AnalysisConfig::default(), &[("/app/index.php", source)])
    }

    fn kind_name(arena: &IrArena, op: crate::features::ir::domain::OpId) -> &'static str {
        arena.op(op).kind.name()
    }

    // ========================================================================
    // Basic flows
    // ========================================================================

    #[test]
    fn test_direct_flow() {
        let run = analyze("<?php\n$x = $_GET[\"q\"];\nmysql_query($x);\n");
        assert_eq!(run.outcome.findings.len(), 1);

        let finding = &run.outcome.findings[0];
        assert_eq!(kind_name(&run.arena, finding.source), "ArrayDimFetch");
        assert_eq!(kind_name(&run.arena, finding.sink), "FunctionCall");
        let intermediates: Vec<_> = finding.intermediates(&run.arena).collect();
        assert!(
            intermediates
                .iter()
                .any(|op| matches!(run.arena.op(*op).kind, OpKind::Assign { .. })),
            "the assignment to $x is part of the trace"
        );
    }

    #[test]
    fn test_sanitized_flow() {
        let run = analyze("<?php\n$x = $_POST[\"q\"];\n$y = intval($x);\nmysql_query($y);\n");
        assert!(run.outcome.findings.is_empty());
    }

    #[test]
    fn test_conditional_taint_found_once() {
        let run = analyze(
            "<?php\n$x = \"safe\";\nif ($cond) { $x = $_GET[\"q\"]; }\nmysql_query($x);\n",
        );
        assert_eq!(run.outcome.findings.len(), 1);
        assert_eq!(run.outcome.stats.tainted_paths, 1);

        let tainted = run
            .paths
            .iter()
            .find(|p| !AnalyzeTaintUseCase::new(&AnalysisConfig::default())
                .execute(&run.arena, std::slice::from_ref(*p))
                .findings
                .is_empty())
            .expect("one path carries the flow");
        assert!(matches!(
            tainted.conditions.as_slice(),
            [PathCondition::Branch { taken: true, .. }]
        ));
    }

    #[test]
    fn test_infeasible_branch_has_no_finding() {
        let run = analyze("<?php\nif (1 == 2) { $x = $_GET[\"q\"]; mysql_query($x); }\n");
        assert!(run.outcome.findings.is_empty());
    }

    #[test]
    fn test_cross_call_flow_passes_parameter() {
        let run = analyze("<?php\nfunction f($a) { mysql_query($a); }\nf($_GET[\"q\"]);\n");
        assert_eq!(run.outcome.findings.len(), 1);
        let trace = &run.outcome.findings[0].trace;
        assert!(
            trace
                .iter()
                .any(|op| matches!(run.arena.op(*op).kind, OpKind::Param { .. })),
            "trace should hop through f's parameter: {:?}",
            trace.iter().map(|op| kind_name(&run.arena, *op)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_return_value_flow() {
        let run = analyze(
            "<?php\nfunction id($v) { return $v; }\n$q = id($_GET[\"q\"]);\nmysql_query($q);\n",
        );
        assert_eq!(run.outcome.findings.len(), 1);
        let trace = &run.outcome.findings[0].trace;
        assert!(trace
            .iter()
            .any(|op| matches!(run.arena.op(*op).kind, OpKind::Return { .. })));
    }

    // ========================================================================
    // Boundaries
    // ========================================================================

    #[test]
    fn test_source_call_without_superglobal() {
        let run = analyze("<?php\n$x = filter_input(INPUT_GET, \"q\");\nmysql_query($x);\n");
        assert_eq!(run.outcome.findings.len(), 1);

        let numeric = analyze(
            "<?php\n$x = filter_input(INPUT_GET, \"q\", FILTER_SANITIZE_NUMBER_INT);\nmysql_query($x);\n",
        );
        assert!(numeric.outcome.findings.is_empty());
    }

    #[test]
    fn test_source_without_sink() {
        let run = analyze("<?php\n$x = $_GET[\"q\"];\necho $x;\n");
        assert!(run.outcome.findings.is_empty());
    }

    #[test]
    fn test_two_sources_one_sink() {
        let run = analyze(
            "<?php\n$a = $_GET[\"a\"];\n$b = $_COOKIE[\"b\"];\nmysql_query(\"SELECT \" . $a . $b);\n",
        );
        assert_eq!(run.outcome.findings.len(), 2);
        assert_ne!(run.outcome.findings[0].source, run.outcome.findings[1].source);
    }

    #[test]
    fn test_method_sink_and_escape_method() {
        let run = analyze(
            "<?php\n$id = $_GET[\"id\"];\n$db->query(\"SELECT * FROM t WHERE id = \" . $id);\n$db->query($db->real_escape_string($id));\n",
        );
        assert_eq!(run.outcome.findings.len(), 1);
    }

    #[test]
    fn test_loop_body_conditional_taint() {
        let run = analyze(
            "<?php\n$q = \"\";\nforeach ($rows as $r) {\n  if ($r) { $q = $_GET[\"q\"]; }\n}\nmysql_query($q);\n",
        );
        assert_eq!(run.outcome.findings.len(), 1);
    }

    // ========================================================================
    // Array literals
    // ========================================================================

    #[test]
    fn test_list_destructuring_tracks_elements() {
        let clean = analyze("<?php\nlist($a, $b) = [$_GET['a'], 'x'];\nmysql_query($b);\n");
        assert!(clean.outcome.findings.is_empty());

        let tainted = analyze("<?php\nlist($a, $b) = [$_GET['a'], 'x'];\nmysql_query($a);\n");
        assert_eq!(tainted.outcome.findings.len(), 1);
    }

    #[test]
    fn test_literal_fetch_by_string_and_numeric_key() {
        let clean = analyze("<?php\n$v = ['id' => $_GET['id'], 'name' => 'n']['name'];\nmysql_query($v);\n");
        assert!(clean.outcome.findings.is_empty());

        let tainted = analyze("<?php\n$v = [5 => 'a', $_GET['id']]['6'];\nmysql_query($v);\n");
        assert_eq!(tainted.outcome.findings.len(), 1);
    }

    #[test]
    fn test_unknown_key_takes_whole_array() {
        let run = analyze("<?php\n$v = [$_GET['a'], 'x'][$k];\nmysql_query($v);\n");
        assert_eq!(run.outcome.findings.len(), 1);
    }

    #[test]
    fn test_laravel_route_source_needs_mode() {
        let source = "<?php\n$r = Route::get(\"/u\");\nDB::select($r);\n";
        let off = analyze(source);
        assert!(off.outcome.findings.is_empty());

        let on = analyze_with(
            AnalysisConfig::default().laravel(true),
            &[("/app/index.php", source)],
        );
        assert_eq!(on.outcome.findings.len(), 1);
    }
}
