//! Structural checks over a chunk hierarchy

use super::index::ChunkHierarchy;
use super::types::ChunkId;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Outcome of an integrity check. Defects are reported, never thrown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// True iff `errors` is empty
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Chunks whose parent id is not in the hierarchy
    pub orphaned_chunks: Vec<ChunkId>,
    /// Each cycle as the ids along the parent chain
    pub circular_references: Vec<Vec<ChunkId>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityValidator;

impl IntegrityValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check orphans, parent-chain cycles and link consistency.
    ///
    /// Iteration follows arena order, so repeated runs yield identical reports.
    pub fn validate(&self, hierarchy: &ChunkHierarchy) -> ValidationReport {
        let mut report = ValidationReport::default();
        self.check_orphans(hierarchy, &mut report);
        self.check_cycles(hierarchy, &mut report);
        self.check_links(hierarchy, &mut report);
        self.check_spans(hierarchy, &mut report);
        report.is_valid = report.errors.is_empty();

        if !report.is_valid {
            warn!(
                "Hierarchy integrity check failed: {} errors, {} warnings",
                report.errors.len(),
                report.warnings.len()
            );
        }
        report
    }

    fn check_orphans(&self, hierarchy: &ChunkHierarchy, report: &mut ValidationReport) {
        for chunk in hierarchy.chunks() {
            if let Some(parent) = chunk.parent_id {
                if !hierarchy.contains(parent) {
                    report
                        .errors
                        .push(format!("Chunk {} references missing parent {}", chunk.id(), parent));
                    report.orphaned_chunks.push(chunk.id());
                }
            }
        }
    }

    /// Walk each parent chain once; re-entering the current path is a cycle
    fn check_cycles(&self, hierarchy: &ChunkHierarchy, report: &mut ValidationReport) {
        let mut visited: HashSet<ChunkId> = HashSet::new();

        for chunk in hierarchy.chunks() {
            let mut path: Vec<ChunkId> = Vec::new();
            let mut on_path: HashSet<ChunkId> = HashSet::new();
            let mut current = Some(chunk.id());

            while let Some(id) = current {
                if on_path.contains(&id) {
                    let from = path.iter().position(|p| *p == id).unwrap_or(0);
                    let cycle = path[from..].to_vec();
                    report.errors.push(format!(
                        "Circular parent reference: {}",
                        cycle.iter().map(ChunkId::to_string).collect::<Vec<_>>().join(" -> ")
                    ));
                    report.circular_references.push(cycle);
                    break;
                }
                if visited.contains(&id) {
                    break;
                }
                on_path.insert(id);
                path.push(id);
                current = hierarchy
                    .get(id)
                    .and_then(|c| c.parent_id)
                    .filter(|p| hierarchy.contains(*p));
            }
            visited.extend(path);
        }
    }

    /// Stored content must match the span it claims to cover
    fn check_spans(&self, hierarchy: &ChunkHierarchy, report: &mut ValidationReport) {
        for chunk in hierarchy.chunks() {
            if chunk.content.len() != chunk.char_length() {
                report.warnings.push(format!(
                    "Chunk {} holds {} bytes of content for a span of {} bytes",
                    chunk.id(),
                    chunk.content.len(),
                    chunk.char_length()
                ));
            }
        }
    }

    fn check_links(&self, hierarchy: &ChunkHierarchy, report: &mut ValidationReport) {
        for (parent, node) in hierarchy.chunks().iter().zip(&hierarchy.nodes) {
            let parent_id = parent.id();
            let mut seen: HashSet<ChunkId> = HashSet::new();

            for child_id in &node.children {
                if !seen.insert(*child_id) {
                    report
                        .warnings
                        .push(format!("Chunk {parent_id} lists child {child_id} more than once"));
                    continue;
                }
                let Some(child) = hierarchy.get(*child_id) else {
                    report
                        .warnings
                        .push(format!("Chunk {parent_id} lists missing child {child_id}"));
                    continue;
                };
                if child.parent_id != Some(parent_id) {
                    report.warnings.push(format!(
                        "Chunk {parent_id} lists child {child_id}, whose parent is {}",
                        child
                            .parent_id
                            .map(|p| p.to_string())
                            .unwrap_or_else(|| "none".to_string())
                    ));
                }
                if parent.level != child.level + 1 {
                    report.warnings.push(format!(
                        "Chunk {parent_id} at level {} has child {child_id} at level {}",
                        parent.level, child.level
                    ));
                }
            }
        }

        for chunk in hierarchy.chunks() {
            let Some(parent_id) = chunk.parent_id else {
                continue;
            };
            let listed = hierarchy
                .node(parent_id)
                .is_some_and(|n| n.children.contains(&chunk.id()));
            if hierarchy.contains(parent_id) && !listed {
                report.warnings.push(format!(
                    "Chunk {} names parent {parent_id}, which does not list it",
                    chunk.id()
                ));
            }
        }
    }
}
