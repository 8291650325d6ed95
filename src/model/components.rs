//! Named discrete sets: the shared state space with its initial state
//! distribution, and the per-agent action and observation sets with their
//! joint sets.

use ndarray::Array1;
use rand::{Rng, RngCore};
use serde::{Serialize, Deserialize};
use std::fmt;

use crate::error::{check_index, MadpError, Result};
use crate::model::joint::{JointEntity, JointSet};
use crate::model::probability::sample_inverse_cdf;
use crate::types::{DiscreteEntity, Index, NORMALIZATION_TOLERANCE};

/// How a set was populated; the two ways cannot be mixed on one set.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
enum Population {
    Counted,
    Named,
}

/// An ordered set of named entities.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct NamedSet {
    entities: Vec<DiscreteEntity>,
    population: Option<Population>,
}

impl NamedSet {
    fn set_nr(&mut self, n: usize, prefix: &str, what: &str) -> Result<()> {
        if self.population == Some(Population::Named) {
            return Err(MadpError::Construction(format!(
                "cannot set the number of {} after adding named ones",
                what
            )));
        }
        self.entities = (0..n)
            .map(|i| DiscreteEntity::new(i, format!("{}{}", prefix, i), String::new()))
            .collect();
        self.population = Some(Population::Counted);
        Ok(())
    }

    fn add(&mut self, name: &str, description: &str, what: &str) -> Result<Index> {
        if self.population == Some(Population::Counted) {
            return Err(MadpError::Construction(format!(
                "cannot add a named {} after setting their number",
                what
            )));
        }
        let index = self.entities.len();
        self.entities.push(DiscreteEntity::new(index, name, description));
        self.population = Some(Population::Named);
        Ok(index)
    }

    fn get(&self, index: Index, what: &str) -> Result<&DiscreteEntity> {
        check_index(what, index, self.entities.len())?;
        Ok(&self.entities[index])
    }

    fn index_by_name(&self, name: &str, what: &str) -> Result<Index> {
        self.entities
            .iter()
            .position(|e| e.name() == name)
            .ok_or_else(|| MadpError::NotFound {
                what: what.to_string(),
                name: name.to_string(),
            })
    }
}

/// The state set shared by all agents, plus the initial state distribution.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiscreteStates {
    states: NamedSet,
    isd: Option<Array1<f64>>,
    initialized: bool,
}

impl DiscreteStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nr(&mut self, n: usize) -> Result<()> {
        self.initialized = false;
        self.states.set_nr(n, "s", "states")
    }

    pub fn add<S: AsRef<str>>(&mut self, name: S, description: S) -> Result<Index> {
        self.initialized = false;
        self.states.add(name.as_ref(), description.as_ref(), "state")
    }

    pub fn nr(&self) -> usize {
        self.states.entities.len()
    }

    pub fn set_isd(&mut self, isd: Vec<f64>) -> Result<()> {
        if isd.len() != self.nr() {
            return Err(MadpError::dimension_mismatch(
                format!("{} initial probabilities", self.nr()),
                format!("{}", isd.len()),
            ));
        }
        self.initialized = false;
        self.isd = Some(Array1::from_vec(isd));
        Ok(())
    }

    pub fn set_uniform_isd(&mut self) -> Result<()> {
        let n = self.nr();
        if n == 0 {
            return Err(MadpError::invalid_parameter("states", "no states to spread over"));
        }
        self.set_isd(vec![1.0 / n as f64; n])
    }

    /// Finalizes the set; fails if there are no states or the initial state
    /// distribution is invalid (when present).
    pub fn set_initialized(&mut self, initialized: bool) -> Result<()> {
        if !initialized {
            self.initialized = false;
            return Ok(());
        }
        if self.nr() == 0 {
            return Err(MadpError::Construction("state set is empty".to_string()));
        }
        if let Some(isd) = &self.isd {
            check_distribution(isd, "initial state distribution")?;
        }
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(MadpError::not_initialized("state set"))
        }
    }

    pub fn get(&self, s: Index) -> Result<&DiscreteEntity> {
        self.ensure_initialized()?;
        self.states.get(s, "state")
    }

    pub fn index_by_name(&self, name: &str) -> Result<Index> {
        self.ensure_initialized()?;
        self.states.index_by_name(name, "state")
    }

    pub fn isd(&self) -> Option<&Array1<f64>> {
        self.isd.as_ref()
    }

    pub fn sample_initial_state(&self, rng: &mut dyn RngCore) -> Result<Index> {
        self.ensure_initialized()?;
        let isd = self
            .isd
            .as_ref()
            .ok_or_else(|| MadpError::not_initialized("initial state distribution"))?;
        Ok(sample_inverse_cdf(isd.iter().copied().enumerate(), isd.len(), rng.gen::<f64>()))
    }
}

/// Which per-agent set a component holds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ComponentKind {
    Actions,
    Observations,
}

impl ComponentKind {
    fn prefix(&self) -> &'static str {
        match self {
            ComponentKind::Actions => "a",
            ComponentKind::Observations => "o",
        }
    }

    fn singular(&self) -> &'static str {
        match self {
            ComponentKind::Actions => "action",
            ComponentKind::Observations => "observation",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Actions => write!(f, "actions"),
            ComponentKind::Observations => write!(f, "observations"),
        }
    }
}

/// Per-agent named sets and the joint set over them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentComponent {
    kind: ComponentKind,
    sets: Vec<NamedSet>,
    joint: Option<JointSet>,
    eager_limit: usize,
}

pub type DiscreteActions = AgentComponent;
pub type DiscreteObservations = AgentComponent;

impl AgentComponent {
    pub fn new(kind: ComponentKind, nr_agents: usize, eager_limit: usize) -> Self {
        AgentComponent {
            kind,
            sets: vec![NamedSet::default(); nr_agents],
            joint: None,
            eager_limit,
        }
    }

    pub fn actions(nr_agents: usize, eager_limit: usize) -> Self {
        Self::new(ComponentKind::Actions, nr_agents, eager_limit)
    }

    pub fn observations(nr_agents: usize, eager_limit: usize) -> Self {
        Self::new(ComponentKind::Observations, nr_agents, eager_limit)
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn nr_agents(&self) -> usize {
        self.sets.len()
    }

    fn set_mut(&mut self, agent: Index) -> Result<&mut NamedSet> {
        check_index("agent", agent, self.sets.len())?;
        self.joint = None;
        Ok(&mut self.sets[agent])
    }

    pub fn set_nr(&mut self, agent: Index, n: usize) -> Result<()> {
        let kind = self.kind;
        self.set_mut(agent)?.set_nr(n, kind.prefix(), &kind.to_string())
    }

    pub fn add<S: AsRef<str>>(&mut self, agent: Index, name: S, description: S) -> Result<Index> {
        let kind = self.kind;
        self.set_mut(agent)?.add(name.as_ref(), description.as_ref(), kind.singular())
    }

    /// Number of entities of `agent`; available before initialization.
    pub fn nr(&self, agent: Index) -> Result<usize> {
        check_index("agent", agent, self.sets.len())?;
        Ok(self.sets[agent].entities.len())
    }

    pub fn cardinalities(&self) -> Vec<usize> {
        self.sets.iter().map(|s| s.entities.len()).collect()
    }

    /// Finalizes the component by constructing its joint set.
    pub fn set_initialized(&mut self, initialized: bool) -> Result<()> {
        if !initialized {
            self.joint = None;
            return Ok(());
        }
        if self.joint.is_some() {
            return Ok(());
        }
        if let Some(agent) = self.sets.iter().position(|s| s.entities.is_empty()) {
            return Err(MadpError::Construction(format!(
                "agent {} has no {}",
                agent, self.kind
            )));
        }
        let joint = JointSet::new(&self.cardinalities(), self.eager_limit)?;
        log::debug!(
            "constructed joint {} over {:?} ({})",
            self.kind,
            self.cardinalities(),
            if joint.is_eager() { "eager" } else { "lazy" }
        );
        self.joint = Some(joint);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.joint.is_some()
    }

    fn joint_set(&self) -> Result<&JointSet> {
        self.joint
            .as_ref()
            .ok_or_else(|| MadpError::not_initialized(format!("joint {}", self.kind)))
    }

    pub fn get(&self, agent: Index, index: Index) -> Result<&DiscreteEntity> {
        self.joint_set()?;
        check_index("agent", agent, self.sets.len())?;
        self.sets[agent].get(index, self.kind.singular())
    }

    pub fn index_by_name(&self, name: &str, agent: Index) -> Result<Index> {
        self.joint_set()?;
        check_index("agent", agent, self.sets.len())?;
        self.sets[agent].index_by_name(name, self.kind.singular())
    }

    pub fn nr_joint(&self) -> Result<usize> {
        self.joint_set()?.nr_joint()
    }

    pub fn joint_to_individual(&self, joint: Index) -> Result<Vec<Index>> {
        self.joint_set()?.individual(joint)
    }

    pub fn individual_to_joint(&self, individual: &[Index]) -> Result<Index> {
        self.joint_set()?.joint(individual)
    }

    pub fn joint(&self, joint: Index) -> Result<JointEntity> {
        self.joint_set()?.entity(joint)
    }

    /// Comma separated individual names of a joint element.
    pub fn joint_name(&self, joint: Index) -> Result<String> {
        let individual = self.joint_to_individual(joint)?;
        let names: Vec<&str> = individual
            .iter()
            .zip(&self.sets)
            .map(|(&i, set)| set.entities[i].name())
            .collect();
        Ok(names.join(","))
    }
}

/// Validates a distribution: entries in [0, 1], no NaN, total mass one.
pub(crate) fn check_distribution(p: &Array1<f64>, what: &str) -> Result<()> {
    for (i, &value) in p.iter().enumerate() {
        if value.is_nan() || value < 0.0 || value > 1.0 + NORMALIZATION_TOLERANCE {
            return Err(MadpError::InvalidProbability {
                location: format!("{} entry {}", what, i),
                value,
            });
        }
    }
    let sum = p.sum();
    if (sum - 1.0).abs() > NORMALIZATION_TOLERANCE {
        return Err(MadpError::InvalidDistribution {
            row: what.to_string(),
            sum,
        });
    }
    Ok(())
}
