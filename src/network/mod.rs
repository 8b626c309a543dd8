//! Contact network generation.
//!
//! Builds the two undirected social graphs every run communicates over: the
//! regular-contact graph and the deniable-contact graph. Both are sampled
//! the same way (each agent draws a target degree from `[min, max)`, then
//! fills its slots one partner at a time) and written back to the agents
//! as symmetric nickname lists. The deniable graph additionally rejects any
//! pair already connected in the regular graph, keeping the two networks
//! edge-disjoint.
//!
//! Partner selection draws uniformly among the acceptable candidates,
//! preferring agents that still have unfilled slots and falling back to the
//! whole population (which appends beyond the partner's target) only when
//! no unfilled candidate is acceptable. When not even that produces a
//! partner the constraints are infeasible and generation fails fast instead
//! of spinning.
//!
//! Generation is meant for a fresh population: re-invoking it on agents
//! whose lists are already populated is unsupported.

use petgraph::graph::{NodeIndex, UnGraph};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// One simulated user: stable identity plus the contact lists the
/// generator fills in before the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimUser {
    /// Stable numeric identity.
    pub id: u32,
    /// Stable nickname, used as the wire-level address.
    pub nickname: String,
    /// Nicknames this user may send regular messages to.
    pub regular_contacts: Vec<String>,
    /// Nicknames this user may send deniable messages to.
    pub deniable_contacts: Vec<String>,
}

impl SimUser {
    /// Create a user with empty contact lists.
    pub fn new(id: u32, nickname: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            regular_contacts: Vec::new(),
            deniable_contacts: Vec::new(),
        }
    }
}

/// Half-open degree bounds `[min, max)` for one contact graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegreeRange {
    /// Inclusive lower bound on an agent's target degree.
    pub min: usize,
    /// Exclusive upper bound on an agent's target degree.
    pub max: usize,
}

impl DegreeRange {
    /// Check feasibility against a population size. Fatal preconditions:
    /// the range must be non-empty and no node can have more neighbors
    /// than there are other nodes.
    pub fn validate(&self, population: usize) -> Result<()> {
        if self.max <= self.min {
            return Err(SimError::Topology(format!(
                "degree bounds [{}, {}) are empty",
                self.min, self.max
            )));
        }
        if self.max >= population {
            return Err(SimError::Topology(format!(
                "max degree {} must be smaller than the population size {}",
                self.max, population
            )));
        }
        Ok(())
    }
}

/// Populate every user's regular contact list.
///
/// Expects empty regular lists; see the module docs on re-invocation.
pub fn populate_regular_contacts(
    users: &mut [SimUser],
    range: DegreeRange,
    rng: &mut impl Rng,
) -> Result<()> {
    range.validate(users.len())?;
    let graph = sample_topology(users.len(), range, rng, None)?;
    for (a, b) in edge_pairs(&graph) {
        let partner = users[b].nickname.clone();
        users[a].regular_contacts.push(partner);
        let back = users[a].nickname.clone();
        users[b].regular_contacts.push(back);
    }
    Ok(())
}

/// Populate every user's deniable contact list, keeping the deniable graph
/// edge-disjoint from the already-generated regular graph.
pub fn populate_deniable_contacts(
    users: &mut [SimUser],
    range: DegreeRange,
    rng: &mut impl Rng,
) -> Result<()> {
    range.validate(users.len())?;
    let forbidden = graph_of_regular_contacts(users);
    let graph = sample_topology(users.len(), range, rng, Some(&forbidden))?;
    for (a, b) in edge_pairs(&graph) {
        let partner = users[b].nickname.clone();
        users[a].deniable_contacts.push(partner);
        let back = users[a].nickname.clone();
        users[b].deniable_contacts.push(back);
    }
    Ok(())
}

/// Sample one contact topology.
///
/// `forbidden` holds edges that must not be duplicated (the regular graph,
/// when sampling the deniable one).
fn sample_topology(
    population: usize,
    range: DegreeRange,
    rng: &mut impl Rng,
    forbidden: Option<&UnGraph<u32, ()>>,
) -> Result<UnGraph<u32, ()>> {
    let mut graph = UnGraph::with_capacity(population, population * range.max);
    let nodes: Vec<NodeIndex> = (0..population)
        .map(|i| graph.add_node(i as u32))
        .collect();

    let targets: Vec<usize> = (0..population)
        .map(|_| rng.gen_range(range.min..range.max))
        .collect();
    let mut degree = vec![0usize; population];

    for a in 0..population {
        while degree[a] < targets[a] {
            let b = pick_partner(a, &graph, &nodes, &degree, &targets, forbidden, rng)?;
            graph.add_edge(nodes[a], nodes[b], ());
            degree[a] += 1;
            degree[b] += 1;
        }
    }

    Ok(graph)
}

/// Choose a partner for `a` uniformly among the acceptable candidates.
///
/// Drawing uniformly from the filtered candidate set is distributed
/// identically to the sample-and-reject loop it replaces, but cannot spin:
/// an empty candidate set means the constraints are infeasible.
fn pick_partner(
    a: usize,
    graph: &UnGraph<u32, ()>,
    nodes: &[NodeIndex],
    degree: &[usize],
    targets: &[usize],
    forbidden: Option<&UnGraph<u32, ()>>,
    rng: &mut impl Rng,
) -> Result<usize> {
    let acceptable = |b: usize| {
        b != a
            && !graph.contains_edge(nodes[a], nodes[b])
            && forbidden.map_or(true, |f| !f.contains_edge(nodes[a], nodes[b]))
    };

    // Partners with unfilled slots first, so realized degrees stay at
    // their targets whenever the constraints permit.
    let unfilled: Vec<usize> = (0..degree.len())
        .filter(|&b| degree[b] < targets[b] && acceptable(b))
        .collect();
    if let Some(&b) = unfilled.choose(rng) {
        return Ok(b);
    }

    // Fall back to agents whose lists are already full; the edge appends
    // beyond their target.
    let any: Vec<usize> = (0..degree.len()).filter(|&b| acceptable(b)).collect();
    any.choose(rng).copied().ok_or_else(|| {
        SimError::Topology(format!(
            "no acceptable partner left for agent {} (infeasible degree constraints)",
            a
        ))
    })
}

/// Rebuild the regular graph from the users' nickname lists.
fn graph_of_regular_contacts(users: &[SimUser]) -> UnGraph<u32, ()> {
    let mut graph = UnGraph::new_undirected();
    let nodes: Vec<NodeIndex> = (0..users.len())
        .map(|i| graph.add_node(i as u32))
        .collect();

    let index_of = |nickname: &str| users.iter().position(|u| u.nickname == nickname);

    for (a, user) in users.iter().enumerate() {
        for partner in &user.regular_contacts {
            if let Some(b) = index_of(partner) {
                if !graph.contains_edge(nodes[a], nodes[b]) {
                    graph.add_edge(nodes[a], nodes[b], ());
                }
            }
        }
    }
    graph
}

/// Edge list as user-index pairs, in insertion order.
fn edge_pairs(graph: &UnGraph<u32, ()>) -> Vec<(usize, usize)> {
    use petgraph::visit::EdgeRef;
    graph
        .edge_references()
        .map(|e| (e.source().index(), e.target().index()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn population(count: usize) -> Vec<SimUser> {
        (0..count)
            .map(|i| SimUser::new(i as u32, i.to_string()))
            .collect()
    }

    #[test]
    fn test_four_agents_end_with_matched_pairs() {
        let mut users = population(4);
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = DegreeRange { min: 1, max: 2 };

        populate_regular_contacts(&mut users, bounds, &mut rng).unwrap();
        populate_deniable_contacts(&mut users, bounds, &mut rng).unwrap();

        for user in &users {
            assert_eq!(user.regular_contacts.len(), 1, "user {}", user.nickname);
            assert_eq!(user.deniable_contacts.len(), 1, "user {}", user.nickname);
            assert!(!user.regular_contacts.contains(&user.nickname));
            assert!(!user.deniable_contacts.contains(&user.nickname));
        }
    }

    #[test]
    fn test_generated_network_properties() {
        // ChaCha keeps this seed's stream identical across platforms.
        let mut users = population(200);
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(696_969_420);

        populate_regular_contacts(&mut users, DegreeRange { min: 3, max: 6 }, &mut rng).unwrap();
        populate_deniable_contacts(&mut users, DegreeRange { min: 1, max: 3 }, &mut rng).unwrap();

        for user in &users {
            // No self references.
            assert!(!user.regular_contacts.contains(&user.nickname));
            assert!(!user.deniable_contacts.contains(&user.nickname));

            // No duplicate neighbors.
            for contacts in [&user.regular_contacts, &user.deniable_contacts] {
                let mut seen = contacts.clone();
                seen.sort();
                seen.dedup();
                assert_eq!(seen.len(), contacts.len(), "user {}", user.nickname);
            }

            // Minimum degree respected.
            assert!(user.regular_contacts.len() >= 3);
            assert!(!user.deniable_contacts.is_empty());

            // Disjoint networks.
            for contact in &user.deniable_contacts {
                assert!(
                    !user.regular_contacts.contains(contact),
                    "user {} has {} in both networks",
                    user.nickname,
                    contact
                );
            }
        }

        // Symmetry: A lists B iff B lists A, in both networks.
        for user in &users {
            for contact in &user.regular_contacts {
                let partner = users.iter().find(|u| &u.nickname == contact).unwrap();
                assert!(partner.regular_contacts.contains(&user.nickname));
            }
            for contact in &user.deniable_contacts {
                let partner = users.iter().find(|u| &u.nickname == contact).unwrap();
                assert!(partner.deniable_contacts.contains(&user.nickname));
            }
        }
    }

    #[test]
    fn test_empty_bounds_rejected() {
        let mut users = population(10);
        let mut rng = StdRng::seed_from_u64(1);
        let result =
            populate_regular_contacts(&mut users, DegreeRange { min: 3, max: 3 }, &mut rng);
        assert!(matches!(result, Err(SimError::Topology(_))));
    }

    #[test]
    fn test_degree_exceeding_population_rejected() {
        let mut users = population(4);
        let mut rng = StdRng::seed_from_u64(1);
        let result =
            populate_regular_contacts(&mut users, DegreeRange { min: 1, max: 4 }, &mut rng);
        assert!(matches!(result, Err(SimError::Topology(_))));
    }

    #[test]
    fn test_infeasible_disjoint_networks_fail_fast() {
        // Three agents pairing up leaves a path (one append), so some agent
        // is regular-adjacent to both others; its deniable slot can never
        // be filled disjointly.
        let mut users = population(3);
        let mut rng = StdRng::seed_from_u64(7);

        populate_regular_contacts(&mut users, DegreeRange { min: 1, max: 2 }, &mut rng).unwrap();
        for user in &users {
            assert!(!user.regular_contacts.is_empty());
        }

        let result =
            populate_deniable_contacts(&mut users, DegreeRange { min: 1, max: 2 }, &mut rng);
        assert!(matches!(result, Err(SimError::Topology(_))));
    }
}
