//! Dependency graph layout.
//!
//! Takes the transitive set of tasks and directed predecessor → successor
//! edges collected by the task store and assigns each node a layer and a
//! position for visualization: Kahn's algorithm levels the DAG, then nodes
//! within a level are spread evenly, centered around x = 0, with the level
//! index mapped to the vertical axis.
//!
//! Cycles are rejected with `Error::DependencyCycle` rather than producing a
//! partial layout; a cycle would otherwise stall the leveling silently.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::task::Task;

/// A directed dependency edge, from predecessor to successor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: Uuid,
    pub to: Uuid,
}

/// The raw dependency graph reachable from a task
#[derive(Debug, Clone, Serialize)]
pub struct DependencyGraph {
    pub root: Uuid,
    pub tasks: Vec<Task>,
    pub edges: Vec<GraphEdge>,
}

/// Layout units for positioning
#[derive(Debug, Clone, Copy)]
pub struct GraphSpacing {
    /// Horizontal distance between node centers within a level
    pub horizontal: f64,
    /// Vertical distance between level baselines
    pub vertical: f64,
    /// Node box height, used to anchor edge curves at the box borders
    pub node_height: f64,
}

impl Default for GraphSpacing {
    fn default() -> Self {
        Self {
            horizontal: 200.0,
            vertical: 140.0,
            node_height: 60.0,
        }
    }
}

/// A 2D point in layout space
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A node with its assigned level and center position
#[derive(Debug, Clone, Serialize)]
pub struct PlacedNode {
    pub task_id: Uuid,
    pub level: u32,
    pub x: f64,
    pub y: f64,
}

/// An edge with curve anchors: parent bottom-center to child top-center
#[derive(Debug, Clone, Serialize)]
pub struct EdgePath {
    pub from: Uuid,
    pub to: Uuid,
    pub from_anchor: Point,
    pub to_anchor: Point,
}

/// A fully positioned graph, ready for rendering
#[derive(Debug, Clone, Serialize)]
pub struct GraphLayout {
    pub root: Uuid,
    pub nodes: Vec<PlacedNode>,
    pub edges: Vec<EdgePath>,
}

/// Compute a layered layout for the graph.
///
/// Every node gets exactly one level and `level(child) > level(parent)`
/// holds for every edge.
pub fn layout(graph: &DependencyGraph, spacing: GraphSpacing) -> Result<GraphLayout> {
    let node_ids: Vec<Uuid> = graph.tasks.iter().map(|task| task.id).collect();
    let node_set: HashSet<Uuid> = node_ids.iter().copied().collect();

    let mut successors: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut in_degree: HashMap<Uuid, usize> = node_ids.iter().map(|id| (*id, 0)).collect();

    for edge in &graph.edges {
        if !node_set.contains(&edge.from) || !node_set.contains(&edge.to) {
            return Err(Error::OperationFailed(format!(
                "graph edge references a task outside the node set: {} -> {}",
                edge.from, edge.to
            )));
        }
        successors.entry(edge.from).or_default().push(edge.to);
        *in_degree.entry(edge.to).or_default() += 1;
    }

    // Kahn leveling: roots sit at level 0, each edge pushes its successor
    // at least one level below its deepest parent.
    let mut levels: HashMap<Uuid, u32> = HashMap::new();
    let mut remaining = in_degree.clone();
    let mut queue: VecDeque<Uuid> = VecDeque::new();

    for id in &node_ids {
        if remaining[id] == 0 {
            levels.insert(*id, 0);
            queue.push_back(*id);
        }
    }

    let mut processed = 0usize;
    while let Some(current) = queue.pop_front() {
        processed += 1;
        let parent_level = levels[&current];
        if let Some(children) = successors.get(&current) {
            for child in children {
                let assigned = levels.entry(*child).or_insert(0);
                *assigned = (*assigned).max(parent_level + 1);
                let degree = remaining
                    .get_mut(child)
                    .ok_or_else(|| Error::OperationFailed("graph bookkeeping desync".into()))?;
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*child);
                }
            }
        }
    }

    if processed < node_ids.len() {
        // Some node never reached in-degree zero: there is a cycle. Name a
        // node stuck in it.
        let stuck = node_ids
            .iter()
            .find(|id| remaining.get(id).copied().unwrap_or(0) > 0)
            .copied()
            .unwrap_or(graph.root);
        return Err(Error::DependencyCycle(stuck));
    }

    // Group by level, preserving the node order the graph walk produced.
    let max_level = levels.values().copied().max().unwrap_or(0);
    let mut rows: Vec<Vec<Uuid>> = vec![Vec::new(); (max_level + 1) as usize];
    for id in &node_ids {
        rows[levels[id] as usize].push(*id);
    }

    let mut nodes = Vec::with_capacity(node_ids.len());
    let mut positions: HashMap<Uuid, Point> = HashMap::new();
    for (level, row) in rows.iter().enumerate() {
        let count = row.len();
        for (i, id) in row.iter().enumerate() {
            // Evenly spread, centered around x = 0.
            let x = (i as f64 - (count as f64 - 1.0) / 2.0) * spacing.horizontal;
            let y = level as f64 * spacing.vertical;
            positions.insert(*id, Point { x, y });
            nodes.push(PlacedNode {
                task_id: *id,
                level: level as u32,
                x,
                y,
            });
        }
    }

    let half_node = spacing.node_height / 2.0;
    let edges = graph
        .edges
        .iter()
        .map(|edge| {
            let from = positions[&edge.from];
            let to = positions[&edge.to];
            EdgePath {
                from: edge.from,
                to: edge.to,
                from_anchor: Point {
                    x: from.x,
                    y: from.y + half_node,
                },
                to_anchor: Point {
                    x: to.x,
                    y: to.y - half_node,
                },
            }
        })
        .collect();

    Ok(GraphLayout {
        root: graph.root,
        nodes,
        edges,
    })
}
