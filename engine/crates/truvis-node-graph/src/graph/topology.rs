//! 节点依赖图的拓扑排序
//!
//! 节点按加入图的顺序编号，边从依赖指向依赖它的节点

use std::collections::VecDeque;

pub struct DependencyGraph {
    node_count: usize,
    /// 出边：producer -> [consumer]
    adjacency: Vec<Vec<usize>>,
    in_degrees: Vec<usize>,
}

impl DependencyGraph {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            adjacency: vec![Vec::new(); node_count],
            in_degrees: vec![0; node_count],
        }
    }

    /// `producer` 必须先于 `consumer`；重复边只记一次
    pub fn add_edge(&mut self, producer: usize, consumer: usize) {
        if !self.adjacency[producer].contains(&consumer) {
            self.adjacency[producer].push(consumer);
            self.in_degrees[consumer] += 1;
        }
    }

    /// Kahn 排序，入度相同时保持编号顺序
    ///
    /// # 返回
    /// - `Ok(order)`: 排序后的节点编号
    /// - `Err(remaining)`: 存在环，返回没能排出的节点
    pub fn topological_sort(&self) -> Result<Vec<usize>, Vec<usize>> {
        let mut in_degrees = self.in_degrees.clone();
        let mut queue: VecDeque<usize> = (0..self.node_count).filter(|&i| in_degrees[i] == 0).collect();
        let mut result = Vec::with_capacity(self.node_count);

        while let Some(node) = queue.pop_front() {
            result.push(node);
            for &neighbor in &self.adjacency[node] {
                in_degrees[neighbor] -= 1;
                if in_degrees[neighbor] == 0 {
                    queue.push_back(neighbor);
                }
            }
        }

        if result.len() == self.node_count {
            Ok(result)
        } else {
            Err((0..self.node_count).filter(|&i| in_degrees[i] > 0).collect())
        }
    }

    pub fn get_predecessors(&self, node: usize) -> Vec<usize> {
        self.adjacency
            .iter()
            .enumerate()
            .filter(|(_, adj)| adj.contains(&node))
            .map(|(i, _)| i)
            .collect()
    }

    #[inline]
    pub fn get_successors(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }
}
