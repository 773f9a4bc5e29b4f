//! The project DAG built from `default_pipeline.star`.

use super::error::PipelineIssue;
use super::id::{normalize_process_name, JobId, JobIdAllocator, ProcessName};
use super::model::{
    InputEdgeRow, NodeRow, OutputEdgeRow, PipelineGeneral, PipelineStar, ProcessRow, ProcessStatus,
};
use super::node_type::NodeType;
use crate::error::{RelionError, Result, ResultExt};
use crate::star::StarModel;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the project pipeline at the project root
pub const DEFAULT_PIPELINE: &str = "default_pipeline.star";

/// A process of the pipeline together with its edges
#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    pub name: String,
    pub alias: String,
    pub type_label: String,
    pub status: ProcessStatus,
    /// Node names consumed, in edge order
    pub inputs: Vec<String>,
    /// Node names produced, in edge order
    pub outputs: Vec<String>,
}

impl Process {
    /// The alias, or `None` when RELION wrote the placeholder
    pub fn alias(&self) -> Option<&str> {
        match self.alias.as_str() {
            "None" | "" => None,
            alias => Some(alias),
        }
    }

    pub fn job_id(&self) -> Option<JobId> {
        ProcessName::parse(&self.name).map(|p| p.job)
    }
}

/// A data node: a file produced by one process and consumed by others
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    /// Label as written in the file, including RELION tags
    pub type_label: String,
    pub depth: Option<i32>,
}

impl Node {
    pub fn node_type(&self) -> Option<NodeType> {
        NodeType::from_label(&self.type_label)
    }
}

/// In-memory view of a RELION pipeline.
///
/// Loading never fails on graph inconsistencies; they are collected in
/// [`Pipeline::issues`] and the offending edges are left out.
#[derive(Debug, Clone)]
pub struct Pipeline {
    root: PathBuf,
    counter: u32,
    processes: Vec<Process>,
    index: HashMap<String, usize>,
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    input_edges: Vec<(String, String)>,
    output_edges: Vec<(String, String)>,
    issues: Vec<PipelineIssue>,
}

impl Pipeline {
    /// Load a pipeline file; its parent directory is the project root
    pub fn from_pipeline_star(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let model = PipelineStar::validate_file(path)?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        debug!(
            "Loaded {} with {} processes and {} nodes",
            path.display(),
            model.processes.len(),
            model.nodes.len()
        );
        Ok(Self::from_model(model, root))
    }

    /// Load `default_pipeline.star` of a project
    pub fn from_project(root: impl AsRef<Path>) -> Result<Self> {
        let path = root.as_ref().join(DEFAULT_PIPELINE);
        Self::from_pipeline_star(&path).context("Failed to load project pipeline")
    }

    pub fn from_model(model: PipelineStar, root: impl Into<PathBuf>) -> Self {
        let mut issues = Vec::new();

        let mut processes: Vec<Process> = Vec::with_capacity(model.processes.len());
        let mut index = HashMap::new();
        for row in model.processes.iter() {
            let name = normalize_process_name(&row.name);
            if index.contains_key(&name) {
                issues.push(PipelineIssue::DuplicateProcess(name));
                continue;
            }
            index.insert(name.clone(), processes.len());
            processes.push(Process {
                name,
                alias: row.alias.clone(),
                type_label: row.type_label.clone(),
                status: row.status,
                inputs: Vec::new(),
                outputs: Vec::new(),
            });
        }

        let mut nodes: Vec<Node> = Vec::with_capacity(model.nodes.len());
        let mut node_index = HashMap::new();
        for row in model.nodes.iter() {
            if node_index.contains_key(&row.name) {
                debug!("Ignoring repeated node {}", row.name);
                continue;
            }
            node_index.insert(row.name.clone(), nodes.len());
            nodes.push(Node {
                name: row.name.clone(),
                type_label: row.type_label.clone(),
                depth: row.depth,
            });
        }

        let mut input_edges = Vec::new();
        for edge in model.input_edges.iter() {
            let process = normalize_process_name(&edge.process);
            if !index.contains_key(&process) {
                issues.push(PipelineIssue::UnknownProcess {
                    process,
                    node: edge.from_node.clone(),
                });
            } else if !node_index.contains_key(&edge.from_node) {
                issues.push(PipelineIssue::UnknownInputNode {
                    process,
                    node: edge.from_node.clone(),
                });
            } else {
                input_edges.push((edge.from_node.clone(), process));
            }
        }

        let mut output_edges = Vec::new();
        for edge in model.output_edges.iter() {
            let process = normalize_process_name(&edge.process);
            if !index.contains_key(&process) {
                issues.push(PipelineIssue::UnknownProcess {
                    process,
                    node: edge.to_node.clone(),
                });
            } else if !node_index.contains_key(&edge.to_node) {
                issues.push(PipelineIssue::UnknownOutputNode {
                    process,
                    node: edge.to_node.clone(),
                });
            } else {
                output_edges.push((process, edge.to_node.clone()));
            }
        }

        let mut counter = model.general.map(|g| g.job_counter).unwrap_or(1);
        let max_job = processes
            .iter()
            .filter_map(|p| p.job_id().map(|id| (id.number(), p.name.as_str())))
            .max_by_key(|(n, _)| *n);
        if let Some((max_job, process)) = max_job {
            if counter <= max_job {
                issues.push(PipelineIssue::StaleCounter {
                    counter,
                    max_job,
                    process: process.to_string(),
                });
                counter = max_job + 1;
            }
        }

        let mut pipeline = Self {
            root: root.into(),
            counter,
            processes,
            index,
            nodes,
            node_index,
            input_edges,
            output_edges,
            issues,
        };

        if pipeline.kahn().is_err() {
            // only edges inside a cycle go; processes downstream keep their inputs
            let cyclic = pipeline.cyclic_input_edges();
            let first = cyclic
                .iter()
                .filter_map(|&e| pipeline.index.get(&pipeline.input_edges[e].1))
                .min()
                .copied()
                .unwrap_or_default();
            pipeline.issues.push(PipelineIssue::Cycle {
                process: pipeline.processes[first].name.clone(),
            });
            let mut e = 0;
            pipeline.input_edges.retain(|_| {
                let keep = !cyclic.contains(&e);
                e += 1;
                keep
            });
        }

        pipeline.link_edges();

        if let Some(issue) = pipeline.issues.first() {
            warn!(
                "{} ({} issue(s) in total)",
                RelionError::from(issue.clone()),
                pipeline.issues.len()
            );
        }
        pipeline
    }

    /// Fill per-process input and output lists from the retained edges
    fn link_edges(&mut self) {
        for p in &mut self.processes {
            p.inputs.clear();
            p.outputs.clear();
        }
        for (node, process) in &self.input_edges {
            if let Some(&i) = self.index.get(process) {
                self.processes[i].inputs.push(node.clone());
            }
        }
        for (process, node) in &self.output_edges {
            if let Some(&i) = self.index.get(process) {
                self.processes[i].outputs.push(node.clone());
            }
        }
    }

    /// node name -> indices of producing processes
    fn producers(&self) -> HashMap<&str, Vec<usize>> {
        let mut map: HashMap<&str, Vec<usize>> = HashMap::new();
        for (process, node) in &self.output_edges {
            if let Some(&i) = self.index.get(process) {
                map.entry(node.as_str()).or_default().push(i);
            }
        }
        map
    }

    /// Process successor sets derived from node edges
    fn successor_sets(&self) -> Vec<BTreeSet<usize>> {
        let producers = self.producers();
        let mut succ: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.processes.len()];
        for (node, process) in &self.input_edges {
            let Some(&consumer) = self.index.get(process) else {
                continue;
            };
            for &producer in producers.get(node.as_str()).into_iter().flatten() {
                succ[producer].insert(consumer);
            }
        }
        succ
    }

    /// Indices of input edges whose node is produced by a process the
    /// consumer itself reaches, i.e. edges inside a strongly connected component
    fn cyclic_input_edges(&self) -> Vec<usize> {
        let producers = self.producers();
        let succ = self.successor_sets();
        let mut reach: HashMap<usize, Vec<bool>> = HashMap::new();
        let mut cyclic = Vec::new();
        for (e, (node, process)) in self.input_edges.iter().enumerate() {
            let Some(&consumer) = self.index.get(process) else {
                continue;
            };
            let seen = reach
                .entry(consumer)
                .or_insert_with(|| reachable(&succ, consumer));
            if producers
                .get(node.as_str())
                .into_iter()
                .flatten()
                .any(|&p| seen[p])
            {
                cyclic.push(e);
            }
        }
        cyclic
    }

    /// Kahn's algorithm over process indices; on a cycle returns the
    /// processes that could not be ordered.
    fn kahn(&self) -> std::result::Result<Vec<usize>, Vec<usize>> {
        let succ = self.successor_sets();
        let mut in_degree = vec![0usize; self.processes.len()];
        for targets in &succ {
            for &t in targets {
                in_degree[t] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..self.processes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.processes.len());
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &t in &succ[i] {
                in_degree[t] -= 1;
                if in_degree[t] == 0 {
                    queue.push_back(t);
                }
            }
        }

        if order.len() == self.processes.len() {
            Ok(order)
        } else {
            Err((0..self.processes.len())
                .filter(|&i| in_degree[i] > 0)
                .collect())
        }
    }

    pub fn to_model(&self) -> PipelineStar {
        PipelineStar {
            general: Some(PipelineGeneral {
                job_counter: self.counter,
            }),
            processes: self
                .processes
                .iter()
                .map(|p| ProcessRow {
                    name: p.name.clone(),
                    alias: p.alias.clone(),
                    type_label: p.type_label.clone(),
                    status: p.status,
                })
                .collect(),
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeRow {
                    name: n.name.clone(),
                    type_label: n.type_label.clone(),
                    depth: n.depth,
                })
                .collect(),
            input_edges: self
                .input_edges
                .iter()
                .map(|(node, process)| InputEdgeRow {
                    from_node: node.clone(),
                    process: process.clone(),
                })
                .collect(),
            output_edges: self
                .output_edges
                .iter()
                .map(|(process, node)| OutputEdgeRow {
                    process: process.clone(),
                    to_node: node.clone(),
                })
                .collect(),
        }
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_model().write(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next unused job number
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn allocator(&self) -> JobIdAllocator {
        JobIdAllocator::new(self.counter)
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn issues(&self) -> &[PipelineIssue] {
        &self.issues
    }

    /// First recorded inconsistency, as an error
    pub fn check(&self) -> Result<()> {
        match self.issues.first() {
            Some(issue) => Err(issue.clone().into()),
            None => Ok(()),
        }
    }

    pub fn process(&self, name: &str) -> Option<&Process> {
        self.index
            .get(&normalize_process_name(name))
            .map(|&i| &self.processes[i])
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.node_index.get(name).map(|&i| &self.nodes[i])
    }

    /// Final row of `pipeline_processes` in file order
    pub fn last_process(&self) -> Option<&Process> {
        self.processes.last()
    }

    pub fn process_by_job_number(&self, number: u32) -> Option<&Process> {
        self.processes
            .iter()
            .find(|p| p.job_id() == Some(JobId(number)))
    }

    /// Processes with the given type label or one of its refinements
    /// (`relion.class2d` also matches `relion.class2d.em`)
    pub fn processes_of_type<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Process> {
        self.processes.iter().filter(move |p| {
            p.type_label == label
                || p.type_label
                    .strip_prefix(label)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Processes consuming any output node of `process`
    pub fn successors(&self, process: &str) -> BTreeSet<&str> {
        let Some(p) = self.process(process) else {
            return BTreeSet::new();
        };
        let outputs: HashSet<&str> = p.outputs.iter().map(String::as_str).collect();
        self.input_edges
            .iter()
            .filter(|(node, _)| outputs.contains(node.as_str()))
            .map(|(_, consumer)| consumer.as_str())
            .collect()
    }

    /// Processes producing any input node of `process`
    pub fn predecessors(&self, process: &str) -> BTreeSet<&str> {
        let Some(p) = self.process(process) else {
            return BTreeSet::new();
        };
        let inputs: HashSet<&str> = p.inputs.iter().map(String::as_str).collect();
        self.output_edges
            .iter()
            .filter(|(_, node)| inputs.contains(node.as_str()))
            .map(|(producer, _)| producer.as_str())
            .collect()
    }

    /// Filesystem path of a declared node, resolved against the project root
    pub fn resolve_node(&self, name: &str) -> Result<PathBuf> {
        if self.node(name).is_none() {
            return Err(RelionError::PipelineInconsistent(format!(
                "node {name} is not declared"
            )));
        }
        Ok(self.root.join(name))
    }

    /// Process names ordered so every producer precedes its consumers
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        match self.kahn() {
            Ok(order) => Ok(order
                .into_iter()
                .map(|i| self.processes[i].name.as_str())
                .collect()),
            Err(stuck) => Err(PipelineIssue::Cycle {
                process: stuck
                    .first()
                    .map(|&i| self.processes[i].name.clone())
                    .unwrap_or_default(),
            }
            .into()),
        }
    }
}

/// Equality of the graph itself; the root and collected issues are ignored.
impl PartialEq for Pipeline {
    fn eq(&self, other: &Self) -> bool {
        fn set(edges: &[(String, String)]) -> BTreeSet<(&str, &str)> {
            edges.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect()
        }
        self.counter == other.counter
            && self.processes == other.processes
            && self.nodes == other.nodes
            && set(&self.input_edges) == set(&other.input_edges)
            && set(&self.output_edges) == set(&other.output_edges)
    }
}

/// Processes reachable from `start`, `start` included
fn reachable(succ: &[BTreeSet<usize>], start: usize) -> Vec<bool> {
    let mut seen = vec![false; succ.len()];
    seen[start] = true;
    let mut stack = vec![start];
    while let Some(i) = stack.pop() {
        for &t in &succ[i] {
            if !seen[t] {
                seen[t] = true;
                stack.push(t);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(name: &str) -> ProcessRow {
        ProcessRow {
            name: name.to_string(),
            alias: "None".to_string(),
            type_label: "relion.external".to_string(),
            status: ProcessStatus::Succeeded,
        }
    }

    fn node(name: &str) -> NodeRow {
        NodeRow {
            name: name.to_string(),
            type_label: "ParticleGroupMetadata.star".to_string(),
            depth: None,
        }
    }

    fn input(node: &str, process: &str) -> InputEdgeRow {
        InputEdgeRow {
            from_node: node.to_string(),
            process: process.to_string(),
        }
    }

    fn output(process: &str, node: &str) -> OutputEdgeRow {
        OutputEdgeRow {
            process: process.to_string(),
            to_node: node.to_string(),
        }
    }

    fn diamond() -> PipelineStar {
        PipelineStar {
            general: Some(PipelineGeneral { job_counter: 5 }),
            processes: ["A/job001/", "B/job002/", "C/job003/", "D/job004/"]
                .into_iter()
                .map(process)
                .collect(),
            nodes: ["A/job001/a.star", "B/job002/b.star", "C/job003/c.star"]
                .into_iter()
                .map(node)
                .collect(),
            input_edges: [
                input("A/job001/a.star", "B/job002/"),
                input("A/job001/a.star", "C/job003/"),
                input("B/job002/b.star", "D/job004/"),
                input("C/job003/c.star", "D/job004/"),
            ]
            .into_iter()
            .collect(),
            output_edges: [
                output("A/job001/", "A/job001/a.star"),
                output("B/job002/", "B/job002/b.star"),
                output("C/job003/", "C/job003/c.star"),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_successors_and_predecessors() {
        let p = Pipeline::from_model(diamond(), "/project");
        assert!(p.issues().is_empty());
        assert_eq!(
            p.successors("A/job001/"),
            BTreeSet::from(["B/job002/", "C/job003/"])
        );
        assert_eq!(
            p.predecessors("D/job004"),
            BTreeSet::from(["B/job002/", "C/job003/"])
        );
        assert!(p.successors("D/job004/").is_empty());
        assert!(p.successors("Missing/job009/").is_empty());
    }

    #[test]
    fn test_topological_order() {
        let p = Pipeline::from_model(diamond(), "/project");
        let order = p.topological_order().unwrap();
        let pos = |n: &str| order.iter().position(|x| *x == n).unwrap();
        assert!(pos("A/job001/") < pos("B/job002/"));
        assert!(pos("C/job003/") < pos("D/job004/"));
    }

    #[test]
    fn test_unknown_node_is_dropped_and_reported() {
        let mut model = diamond();
        model.input_edges.push(input("Z/job009/z.star", "D/job004/"));
        let p = Pipeline::from_model(model, "/project");
        assert_eq!(p.issues().len(), 1);
        assert_eq!(p.issues()[0].process(), "D/job004/");
        assert!(matches!(
            p.check().unwrap_err(),
            RelionError::PipelineInconsistent(_)
        ));
        assert_eq!(p.process("D/job004/").unwrap().inputs.len(), 2);
    }

    #[test]
    fn test_stale_counter_is_repaired() {
        let mut model = diamond();
        model.general = Some(PipelineGeneral { job_counter: 2 });
        let p = Pipeline::from_model(model, "/project");
        assert!(matches!(
            p.issues()[0],
            PipelineIssue::StaleCounter { max_job: 4, .. }
        ));
        assert_eq!(p.allocator().allocate(), JobId(5));
    }

    #[test]
    fn test_cycle_is_reported_and_broken() {
        let mut model = diamond();
        model.nodes.push(node("D/job004/d.star"));
        model.output_edges.push(output("D/job004/", "D/job004/d.star"));
        model.input_edges.push(input("D/job004/d.star", "B/job002/"));
        let p = Pipeline::from_model(model, "/project");
        assert!(p
            .issues()
            .iter()
            .any(|i| matches!(i, PipelineIssue::Cycle { .. })));
        assert!(p.topological_order().is_ok());
    }

    #[test]
    fn test_cycle_breaking_spares_downstream_inputs() {
        let mut model = diamond();
        model.processes.push(process("E/job005/"));
        model.nodes.push(node("D/job004/d.star"));
        model.output_edges.push(output("D/job004/", "D/job004/d.star"));
        model.input_edges.push(input("D/job004/d.star", "B/job002/"));
        model.input_edges.push(input("D/job004/d.star", "E/job005/"));
        model.general = Some(PipelineGeneral { job_counter: 6 });
        let p = Pipeline::from_model(model, "/project");

        let cycles: Vec<_> = p
            .issues()
            .iter()
            .filter_map(|i| match i {
                PipelineIssue::Cycle { process } => Some(process.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(cycles, ["B/job002/"]);

        // E and the C -> D edge sit outside the cycle
        assert_eq!(p.predecessors("E/job005/"), BTreeSet::from(["D/job004/"]));
        assert_eq!(p.predecessors("D/job004/"), BTreeSet::from(["C/job003/"]));
        assert_eq!(p.predecessors("B/job002/"), BTreeSet::from(["A/job001/"]));

        let order = p.topological_order().unwrap();
        let pos = |name: &str| order.iter().position(|p| *p == name).unwrap();
        assert!(pos("D/job004/") < pos("E/job005/"));
    }

    #[test]
    fn test_resolve_node() {
        let p = Pipeline::from_model(diamond(), "/project");
        assert_eq!(
            p.resolve_node("A/job001/a.star").unwrap(),
            PathBuf::from("/project/A/job001/a.star")
        );
        assert!(p.resolve_node("nope.star").is_err());
    }

    #[test]
    fn test_lookup_helpers() {
        let p = Pipeline::from_model(diamond(), "/project");
        assert_eq!(p.last_process().unwrap().name, "D/job004/");
        assert_eq!(p.process_by_job_number(3).unwrap().name, "C/job003/");
        assert_eq!(p.processes_of_type("relion.external").count(), 4);
        assert_eq!(p.processes_of_type("relion.ext").count(), 0);
    }
}
