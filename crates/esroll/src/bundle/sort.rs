//! Module ordering
//!
//! Modules are emitted in depth-first post order from the entry, so
//! dependencies come before dependents. Cycles break that guarantee; when
//! one is found, modules are re-placed so that each is preceded by the
//! modules it needs while it is being evaluated (its strong dependencies),
//! unless those in turn need it.

use log::{debug, warn};
use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::{FxHashMap, FxHashSet};

use super::Bundle;
use crate::types::{FxIndexSet, ModuleId, StatementRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    OnStack,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DependencyKind {
    Strong,
    Weak,
}

#[derive(Debug, Default)]
struct Ordering {
    state: FxHashMap<ModuleId, VisitState>,
    ordered: Vec<ModuleId>,
    strong_deps: FxHashMap<ModuleId, Vec<ModuleId>>,
    has_cycles: bool,
    graph: DiGraph<ModuleId, DependencyKind>,
    nodes: FxHashMap<ModuleId, NodeIndex>,
}

impl Ordering {
    fn node(&mut self, module: ModuleId) -> NodeIndex {
        *self
            .nodes
            .entry(module)
            .or_insert_with(|| self.graph.add_node(module))
    }

    fn add_edge(&mut self, from: ModuleId, to: ModuleId, kind: DependencyKind) {
        let from = self.node(from);
        let to = self.node(to);
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, kind);
        }
    }

    /// Every module reachable from `module` over strong edges
    fn strong_closure(&self, module: ModuleId) -> FxHashSet<ModuleId> {
        let mut closure = FxHashSet::default();
        let mut stack: Vec<ModuleId> = self.strong_deps.get(&module).cloned().unwrap_or_default();
        while let Some(dependency) = stack.pop() {
            if closure.insert(dependency) {
                stack.extend(self.strong_deps.get(&dependency).into_iter().flatten());
            }
        }
        closure
    }
}

impl Bundle {
    fn visit(&self, module: ModuleId, ordering: &mut Ordering) {
        ordering.state.insert(module, VisitState::OnStack);
        ordering.node(module);

        let (strong, weak) = self.modules[module.index()].consolidate_dependencies();
        ordering
            .strong_deps
            .insert(module, strong.iter().copied().collect());

        let edges = strong
            .iter()
            .map(|&dep| (dep, DependencyKind::Strong))
            .chain(weak.iter().map(|&dep| (dep, DependencyKind::Weak)));
        for (dependency, kind) in edges {
            ordering.add_edge(module, dependency, kind);
            match ordering.state.get(&dependency) {
                Some(VisitState::OnStack) => ordering.has_cycles = true,
                Some(VisitState::Done) => {}
                None => self.visit(dependency, ordering),
            }
        }

        ordering.state.insert(module, VisitState::Done);
        ordering.ordered.push(module);
    }

    /// Included statements of every reachable module, in output order
    pub(super) fn sort(&self) -> Vec<StatementRef> {
        let Some(entry) = self.entry else {
            return Vec::new();
        };

        let mut ordering = Ordering::default();
        self.visit(entry, &mut ordering);

        let ordered = if ordering.has_cycles {
            report_cycles(self, &ordering);
            place_strong_dependencies_first(&ordering)
        } else {
            ordering.ordered
        };
        debug!(
            "Module order: {}",
            ordered
                .iter()
                .map(|&module| self.modules[module.index()].id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        ordered
            .into_iter()
            .flat_map(|module| {
                self.modules[module.index()]
                    .statements
                    .iter()
                    .filter(|statement| statement.is_included)
                    .map(move |statement| StatementRef::new(module, statement.index))
            })
            .collect()
    }
}

/// Re-place modules, each after those of its strong dependencies that do
/// not transitively strongly depend back on it
fn place_strong_dependencies_first(ordering: &Ordering) -> Vec<ModuleId> {
    let closures: FxHashMap<ModuleId, FxHashSet<ModuleId>> = ordering
        .ordered
        .iter()
        .map(|&module| (module, ordering.strong_closure(module)))
        .collect();

    let mut placed = FxIndexSet::default();
    for &module in &ordering.ordered {
        let mut placing = FxHashSet::default();
        for &dependency in ordering.strong_deps.get(&module).into_iter().flatten() {
            place(dependency, module, ordering, &closures, &mut placed, &mut placing);
        }
        placed.insert(module);
    }
    placed.into_iter().collect()
}

fn place(
    dependency: ModuleId,
    module: ModuleId,
    ordering: &Ordering,
    closures: &FxHashMap<ModuleId, FxHashSet<ModuleId>>,
    placed: &mut FxIndexSet<ModuleId>,
    placing: &mut FxHashSet<ModuleId>,
) {
    let depends_back = closures
        .get(&dependency)
        .is_some_and(|closure| closure.contains(&module));
    if depends_back || placed.contains(&dependency) || !placing.insert(dependency) {
        return;
    }
    for &next in ordering.strong_deps.get(&dependency).into_iter().flatten() {
        place(next, module, ordering, closures, placed, placing);
    }
    placed.insert(dependency);
}

fn report_cycles(bundle: &Bundle, ordering: &Ordering) {
    for component in tarjan_scc(&ordering.graph) {
        if component.len() < 2 {
            continue;
        }
        let mut ids: Vec<&str> = component
            .iter()
            .map(|&node| bundle.modules[ordering.graph[node].index()].id.as_str())
            .collect();
        ids.sort_unstable();
        warn!("Circular dependency between {}", ids.join(", "));
    }
}
