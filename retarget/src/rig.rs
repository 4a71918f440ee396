use animate::Skeleton;

/// Contiguous run of bones from `start` down to `end`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoneChain {
    pub name: String,
    pub start: String,
    pub end: String,
}

impl BoneChain {
    /// Bone indices from `start` to `end` inclusive, parent first.
    /// `None` if either bone is missing or `end` does not descend
    /// from `start`.
    pub fn resolve(&self, skeleton: &Skeleton) -> Option<Vec<usize>> {
        let start = skeleton.find(&self.start)?;
        let end = skeleton.find(&self.end)?;

        let mut bones = vec![end];
        let mut current = end;
        while current != start {
            current = skeleton.parent(current)?;
            bones.push(current);
        }
        bones.reverse();
        Some(bones)
    }
}

/// Chains of one skeleton with its retarget root.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetargetDefinition {
    pub skeleton: String,
    pub root: String,
    pub chains: Vec<BoneChain>,
}

impl RetargetDefinition {
    pub fn chain(&self, name: &str) -> Option<&BoneChain> {
        self.chains.iter().find(|chain| chain.name == name)
    }
}

/// Retarget stages the solver may run.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetargetOps {
    /// Direct chain-to-chain rotation transfer.
    pub chain_fk: bool,

    /// Full body IK pass over the target rig.
    pub run_ik_rig: bool,

    /// IK goals matching source chain ends.
    pub ik_goals: bool,
}

impl RetargetOps {
    /// Only the direct chain transfer.
    pub fn chains_only() -> Self {
        RetargetOps {
            chain_fk: true,
            run_ik_rig: false,
            ik_goals: false,
        }
    }
}

/// Source and target definitions paired for the solver.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetargetProfile {
    pub name: String,
    pub source: RetargetDefinition,
    pub target: RetargetDefinition,
    pub ops: RetargetOps,
}

impl RetargetProfile {
    pub fn new(source: RetargetDefinition, target: RetargetDefinition) -> Self {
        RetargetProfile {
            name: format!("RTG_{}", source.skeleton),
            source,
            target,
            ops: RetargetOps::chains_only(),
        }
    }

    /// Chain names present on both sides, in target order.
    pub fn matched_chains(
        &self,
    ) -> impl Iterator<Item = (&BoneChain, &BoneChain)> + '_ {
        self.target.chains.iter().filter_map(move |target| {
            self.source
                .chain(&target.name)
                .map(|source| (source, target))
        })
    }
}
