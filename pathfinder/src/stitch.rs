//! Stitched resolution over a candidate pool subset
//!
//! Tries a direct pool, then a shared intermediate, then walks outwards
//! from the input token. Results are always structurally valid but not
//! necessarily hop-minimal.

use crate::Path;
use gauntlet_types::{Pool, Token};
use std::collections::HashSet;

pub fn resolve_within(candidates: &[Pool], from: Token, to: Token) -> Option<Path> {
    if from == to {
        return Some(Path::degenerate(from));
    }

    let mut visited = HashSet::new();
    stitch(candidates, from, to, &mut visited).map(Path::new)
}

fn stitch(candidates: &[Pool], from: Token, to: Token, visited: &mut HashSet<Token>) -> Option<Vec<Token>> {
    visited.insert(from);

    // Direct pool
    if candidates.iter().any(|p| p.other(&from) == Some(to)) {
        return Some(vec![from, to]);
    }

    let from_side: Vec<Token> = sides(candidates, &from);
    let to_side: Vec<Token> = sides(candidates, &to);

    // Shared intermediate
    if let Some(mid) = from_side
        .iter()
        .find(|mid| !visited.contains(*mid) && to_side.contains(mid))
    {
        return Some(vec![from, *mid, to]);
    }

    // Recurse from each neighbour; the visited set bounds depth by token count
    for next in from_side {
        if visited.contains(&next) {
            continue;
        }
        if let Some(rest) = stitch(candidates, next, to, visited) {
            let mut hops = Vec::with_capacity(rest.len() + 1);
            hops.push(from);
            hops.extend(rest);
            return Some(hops);
        }
    }

    None
}

/// Tokens paired with `token`, in pool order, without repeats or `token` itself
fn sides(candidates: &[Pool], token: &Token) -> Vec<Token> {
    let mut out = Vec::new();
    for other in candidates.iter().filter_map(|p| p.other(token)) {
        if other != *token && !out.contains(&other) {
            out.push(other);
        }
    }
    out
}
