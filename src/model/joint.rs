use serde::{Serialize, Deserialize};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{check_index, MadpError, Result};
use crate::index_tools;
use crate::types::Index;

/// A tuple of one individual index per agent together with its joint index.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct JointEntity {
    index: Index,
    individual: Vec<Index>,
}

impl JointEntity {
    fn with_capacity(nr_agents: usize) -> Self {
        JointEntity {
            index: 0,
            individual: Vec::with_capacity(nr_agents),
        }
    }

    pub fn new(index: Index, individual: Vec<Index>) -> Self {
        JointEntity { index, individual }
    }

    pub fn index(&self) -> Index {
        self.index
    }

    pub fn individual(&self) -> &[Index] {
        &self.individual
    }

    pub fn nr_agents(&self) -> usize {
        self.individual.len()
    }
}

/// Enumerates the Cartesian product of the per-agent sets depth-first.
///
/// Joint indices are assigned sequentially, agent 0 most significant. Only
/// the partial entity being extended is copied: at each recursion level the
/// first choice extends the caller's partial entity in place, middle choices
/// clone a saved copy of the prefix and the last choice takes that copy.
pub fn construct_joint(cardinalities: &[usize]) -> Result<Vec<JointEntity>> {
    let expected = index_tools::joint_cardinality(cardinalities)?;
    let mut joint = Vec::with_capacity(expected);
    if !cardinalities.is_empty() && expected > 0 {
        extend_partial(JointEntity::with_capacity(cardinalities.len()), 0, cardinalities, &mut joint);
    }
    if joint.len() != expected {
        return Err(MadpError::Construction(format!(
            "constructed {} joint entities, expected {}",
            joint.len(),
            expected
        )));
    }
    Ok(joint)
}

fn extend_partial(
    mut partial: JointEntity,
    agent: usize,
    cardinalities: &[usize],
    out: &mut Vec<JointEntity>,
) {
    let n = cardinalities[agent];
    let prefix = (n > 1).then(|| partial.clone());
    partial.individual.push(0);
    complete_or_recurse(partial, agent, cardinalities, out);

    if let Some(mut prefix) = prefix {
        for choice in 1..n - 1 {
            let mut next = prefix.clone();
            next.individual.push(choice);
            complete_or_recurse(next, agent, cardinalities, out);
        }
        prefix.individual.push(n - 1);
        complete_or_recurse(prefix, agent, cardinalities, out);
    }
}

fn complete_or_recurse(
    mut partial: JointEntity,
    agent: usize,
    cardinalities: &[usize],
    out: &mut Vec<JointEntity>,
) {
    if agent + 1 == cardinalities.len() {
        partial.index = out.len();
        out.push(partial);
    } else {
        extend_partial(partial, agent + 1, cardinalities, out);
    }
}

/// Joint entities built on first request and memoised.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LazyJointCache {
    cardinalities: Vec<usize>,
    steps: Vec<usize>,
    #[serde(skip)]
    by_index: RefCell<HashMap<Index, Vec<Index>>>,
    #[serde(skip)]
    by_individual: RefCell<HashMap<Vec<Index>, Index>>,
}

impl LazyJointCache {
    pub fn new(cardinalities: &[usize]) -> Self {
        LazyJointCache {
            cardinalities: cardinalities.to_vec(),
            steps: index_tools::calculate_step_size(cardinalities),
            by_index: RefCell::new(HashMap::new()),
            by_individual: RefCell::new(HashMap::new()),
        }
    }

    pub fn individual(&self, joint: Index) -> Vec<Index> {
        self.by_index
            .borrow_mut()
            .entry(joint)
            .or_insert_with(|| index_tools::joint_to_individual_with_steps(joint, &self.steps))
            .clone()
    }

    pub fn joint(&self, individual: &[Index]) -> Index {
        if let Some(&joint) = self.by_individual.borrow().get(individual) {
            return joint;
        }
        let joint = index_tools::individual_to_joint_with_steps(individual, &self.steps);
        self.by_individual.borrow_mut().insert(individual.to_vec(), joint);
        joint
    }

    pub fn cached(&self) -> usize {
        self.by_index.borrow().len()
    }

    pub fn clear(&self) {
        self.by_index.borrow_mut().clear();
        self.by_individual.borrow_mut().clear();
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
enum JointStorage {
    Eager(Vec<JointEntity>),
    Lazy(LazyJointCache),
}

/// The joint set over all agents' individual sets, either fully enumerated
/// or materialised on demand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JointSet {
    cardinalities: Vec<usize>,
    nr_joint: Option<usize>,
    storage: JointStorage,
}

impl JointSet {
    /// Eager enumeration is used for at most two agents when the product does
    /// not exceed `eager_limit`; otherwise entities are built lazily. An
    /// overflowing product is recorded and makes every joint query fail.
    pub fn new(cardinalities: &[usize], eager_limit: usize) -> Result<Self> {
        let nr_joint = index_tools::joint_cardinality(cardinalities).ok();
        let storage = match nr_joint {
            Some(n) if cardinalities.len() <= 2 && n <= eager_limit => {
                JointStorage::Eager(construct_joint(cardinalities)?)
            }
            _ => JointStorage::Lazy(LazyJointCache::new(cardinalities)),
        };
        if nr_joint.is_none() {
            log::warn!("joint set over {:?} overflows; joint queries disabled", cardinalities);
        }
        Ok(JointSet {
            cardinalities: cardinalities.to_vec(),
            nr_joint,
            storage,
        })
    }

    pub fn is_eager(&self) -> bool {
        matches!(self.storage, JointStorage::Eager(_))
    }

    pub fn cardinalities(&self) -> &[usize] {
        &self.cardinalities
    }

    pub fn nr_joint(&self) -> Result<usize> {
        self.nr_joint.ok_or_else(|| MadpError::IndexOverflow {
            cardinalities: self.cardinalities.clone(),
        })
    }

    /// Individual indices of joint element `joint`.
    pub fn individual(&self, joint: Index) -> Result<Vec<Index>> {
        check_index("joint index", joint, self.nr_joint()?)?;
        Ok(match &self.storage {
            JointStorage::Eager(entities) => entities[joint].individual.clone(),
            JointStorage::Lazy(cache) => cache.individual(joint),
        })
    }

    /// Joint index of the given individual indices.
    pub fn joint(&self, individual: &[Index]) -> Result<Index> {
        self.nr_joint()?;
        if individual.len() != self.cardinalities.len() {
            return Err(MadpError::dimension_mismatch(
                format!("{} individual indices", self.cardinalities.len()),
                format!("{}", individual.len()),
            ));
        }
        for (agent, (&idx, &n)) in individual.iter().zip(&self.cardinalities).enumerate() {
            check_index(&format!("individual index of agent {}", agent), idx, n)?;
        }
        Ok(match &self.storage {
            JointStorage::Eager(_) => index_tools::individual_to_joint(individual, &self.cardinalities)?,
            JointStorage::Lazy(cache) => cache.joint(individual),
        })
    }

    pub fn entity(&self, joint: Index) -> Result<JointEntity> {
        Ok(match &self.storage {
            JointStorage::Eager(entities) => {
                check_index("joint index", joint, entities.len())?;
                entities[joint].clone()
            }
            JointStorage::Lazy(_) => JointEntity::new(joint, self.individual(joint)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_joint_order() {
        let joint = construct_joint(&[2, 3]).unwrap();
        assert_eq!(joint.len(), 6);
        assert_eq!(joint[0].individual(), &[0, 0]);
        assert_eq!(joint[1].individual(), &[0, 1]);
        assert_eq!(joint[3].individual(), &[1, 0]);
        assert_eq!(joint[5].individual(), &[1, 2]);
        for (i, entity) in joint.iter().enumerate() {
            assert_eq!(entity.index(), i);
        }
    }

    #[test]
    fn test_construct_joint_matches_index_tools() {
        let card = [3, 1, 2, 2];
        let joint = construct_joint(&card).unwrap();
        assert_eq!(joint.len(), 12);
        for entity in &joint {
            assert_eq!(
                index_tools::individual_to_joint(entity.individual(), &card).unwrap(),
                entity.index()
            );
        }
    }

    #[test]
    fn test_construct_joint_single_choice_levels() {
        let joint = construct_joint(&[1, 4, 1]).unwrap();
        let individual: Vec<_> = joint.iter().map(|e| e.individual().to_vec()).collect();
        assert_eq!(individual, vec![vec![0, 0, 0], vec![0, 1, 0], vec![0, 2, 0], vec![0, 3, 0]]);
        assert_eq!(construct_joint(&[1]).unwrap()[0].individual(), &[0]);
    }

    #[test]
    fn test_empty_agent_set_gives_no_joint_entities() {
        assert!(construct_joint(&[2, 0]).unwrap().is_empty());
    }

    #[test]
    fn test_lazy_and_eager_agree() {
        let card = [3, 2, 2];
        let eager = JointSet::new(&card, usize::MAX).unwrap();
        let lazy = JointSet::new(&card, 0).unwrap();
        assert!(!eager.is_eager()); // three agents always go lazy
        let two = JointSet::new(&[3, 4], 100).unwrap();
        assert!(two.is_eager());
        for j in 0..12 {
            let individual = lazy.individual(j).unwrap();
            assert_eq!(eager.individual(j).unwrap(), individual);
            assert_eq!(lazy.joint(&individual).unwrap(), j);
        }
    }

    #[test]
    fn test_overflow_disables_queries() {
        let set = JointSet::new(&[usize::MAX, 3], 10).unwrap();
        assert!(matches!(set.nr_joint(), Err(MadpError::IndexOverflow { .. })));
        assert!(set.individual(0).is_err());
        assert!(set.joint(&[0, 0]).is_err());
    }
}
