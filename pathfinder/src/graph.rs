//! Undirected token graph built from the pool set

use crate::Path;
use gauntlet_types::{Pool, Token};
use std::collections::{HashMap, HashSet, VecDeque};

/// Token adjacency derived from pools. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct TradeGraph {
    adjacency: HashMap<Token, Vec<Token>>,
    /// Tokens in first-seen order
    tokens: Vec<Token>,
    pools: Vec<Pool>,
}

impl TradeGraph {
    /// Neighbour order follows pool enumeration order. Repeated pairs and
    /// single-token pools add no edges.
    pub fn new(pools: &[Pool]) -> Self {
        let mut graph = Self {
            pools: pools.to_vec(),
            ..Default::default()
        };

        for pool in pools {
            graph.touch(pool.token0);
            graph.touch(pool.token1);
            if pool.token0 == pool.token1 {
                continue;
            }
            graph.link(pool.token0, pool.token1);
            graph.link(pool.token1, pool.token0);
        }

        graph
    }

    fn touch(&mut self, token: Token) {
        if !self.adjacency.contains_key(&token) {
            self.adjacency.insert(token, Vec::new());
            self.tokens.push(token);
        }
    }

    fn link(&mut self, from: Token, to: Token) {
        let neighbours = self.adjacency.entry(from).or_default();
        if !neighbours.contains(&to) {
            neighbours.push(to);
        }
    }

    pub fn neighbours(&self, token: &Token) -> &[Token] {
        self.adjacency.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.adjacency.contains_key(token)
    }

    pub fn adjacent(&self, a: &Token, b: &Token) -> bool {
        self.neighbours(a).contains(b)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    /// Breadth-first search. The first time `to` is dequeued its path is
    /// hop-minimal; ties go to the neighbour enumerated first.
    pub fn bfs(&self, from: Token, to: Token) -> Option<Path> {
        if from == to {
            return Some(Path::degenerate(from));
        }
        if !self.contains(&from) || !self.contains(&to) {
            return None;
        }

        let mut parent: HashMap<Token, Token> = HashMap::new();
        let mut visited: HashSet<Token> = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                return Some(Self::unwind(&parent, from, to));
            }

            for next in self.neighbours(&current) {
                if visited.insert(*next) {
                    parent.insert(*next, current);
                    queue.push_back(*next);
                }
            }
        }

        None
    }

    fn unwind(parent: &HashMap<Token, Token>, from: Token, to: Token) -> Path {
        let mut hops = vec![to];
        let mut cursor = to;
        while cursor != from {
            match parent.get(&cursor) {
                Some(prev) => {
                    hops.push(*prev);
                    cursor = *prev;
                }
                None => break,
            }
        }
        hops.reverse();
        Path::new(hops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u64) -> Token {
        Token::from_low_u64_be(n)
    }

    fn pool(n: u64, a: u64, b: u64) -> Pool {
        Pool::new(Token::from_low_u64_be(1000 + n), t(a), t(b))
    }

    #[test]
    fn test_neighbour_order_follows_pools() {
        let graph = TradeGraph::new(&[pool(0, 1, 3), pool(1, 1, 2), pool(2, 2, 1)]);

        assert_eq!(graph.neighbours(&t(1)), &[t(3), t(2)]);
        assert_eq!(graph.neighbours(&t(2)), &[t(1)]);
        assert_eq!(graph.tokens(), &[t(1), t(3), t(2)]);
    }

    #[test]
    fn test_single_token_pool_has_no_edge() {
        let graph = TradeGraph::new(&[pool(0, 5, 5)]);

        assert!(graph.contains(&t(5)));
        assert!(graph.neighbours(&t(5)).is_empty());
    }

    #[test]
    fn test_bfs_tie_breaks_by_enumeration() {
        // 1-2-4 and 1-3-4 are both two hops; 2 is enumerated first
        let graph = TradeGraph::new(&[
            pool(0, 1, 2),
            pool(1, 1, 3),
            pool(2, 3, 4),
            pool(3, 2, 4),
        ]);

        let path = graph.bfs(t(1), t(4)).unwrap();
        assert_eq!(path.tokens(), &[t(1), t(2), t(4)]);
    }

    #[test]
    fn test_bfs_unknown_token() {
        let graph = TradeGraph::new(&[pool(0, 1, 2)]);

        assert!(graph.bfs(t(1), t(9)).is_none());
        assert!(graph.bfs(t(9), t(1)).is_none());
    }
}
