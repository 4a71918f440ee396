use {
    crate::{pose::Pose, transform::Transform},
    std::{collections::HashSet, convert::TryFrom},
};

#[derive(Debug, thiserror::Error)]
pub enum SkeletonError {
    #[error("Skeleton `{skeleton}` has no bones")]
    Empty { skeleton: String },

    #[error("Bone `{bone}` refers to parent {parent} which is out of range")]
    ParentOutOfRange { bone: String, parent: usize },

    #[error("Bone `{bone}` is part of a cycle in the hierarchy")]
    Cycle { bone: String },

    #[error("Bone name `{bone}` is used more than once")]
    DuplicateName { bone: String },
}

/// Single joint of the [`Skeleton`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bone {
    pub name: String,

    #[serde(default)]
    pub parent: Option<usize>,

    /// Reference pose transform relative to the parent bone.
    #[serde(default)]
    pub reference: Transform,
}

impl Bone {
    pub fn new(
        name: impl Into<String>,
        parent: Option<usize>,
        reference: Transform,
    ) -> Self {
        Bone {
            name: name.into(),
            parent,
            reference,
        }
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }
}

/// Tree-like structure of bones.
///
/// Bones are stored in file order; parents are not required to precede
/// their children. The hierarchy is validated on construction, so every
/// parent index is in range and there are no cycles.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "SkeletonRepr", into = "SkeletonRepr")]
pub struct Skeleton {
    name: String,
    bones: Box<[Bone]>,
    children: Box<[Box<[usize]>]>,

    /// Bone indices ordered so that every parent precedes its children.
    order: Box<[usize]>,
}

impl Skeleton {
    pub fn new(
        name: impl Into<String>,
        bones: Vec<Bone>,
    ) -> Result<Self, SkeletonError> {
        let name = name.into();
        if bones.is_empty() {
            return Err(SkeletonError::Empty { skeleton: name });
        }

        let mut names = HashSet::with_capacity(bones.len());
        let mut children = vec![Vec::new(); bones.len()];
        let mut roots = Vec::new();

        for (index, bone) in bones.iter().enumerate() {
            if !names.insert(bone.name.as_str()) {
                return Err(SkeletonError::DuplicateName {
                    bone: bone.name.clone(),
                });
            }

            match bone.parent {
                None => roots.push(index),
                Some(parent) if parent < bones.len() && parent != index => {
                    children[parent].push(index)
                }
                Some(parent) if parent == index => {
                    return Err(SkeletonError::Cycle {
                        bone: bone.name.clone(),
                    })
                }
                Some(parent) => {
                    return Err(SkeletonError::ParentOutOfRange {
                        bone: bone.name.clone(),
                        parent,
                    })
                }
            }
        }

        // Breadth-first from the roots. Bones never reached hang off a cycle.
        let mut order = Vec::with_capacity(bones.len());
        order.extend_from_slice(&roots);
        let mut next = 0;
        while next < order.len() {
            let bone = order[next];
            order.extend_from_slice(&children[bone]);
            next += 1;
        }

        if order.len() != bones.len() {
            let mut reached = vec![false; bones.len()];
            for &bone in &order {
                reached[bone] = true;
            }
            let orphan = reached.iter().position(|r| !r).unwrap_or(0);
            return Err(SkeletonError::Cycle {
                bone: bones[orphan].name.clone(),
            });
        }

        Ok(Skeleton {
            name,
            bones: bones.into_boxed_slice(),
            children: children
                .into_iter()
                .map(Vec::into_boxed_slice)
                .collect(),
            order: order.into_boxed_slice(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone_name(&self, index: usize) -> &str {
        &self.bones[index].name
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.bones[index].parent
    }

    pub fn is_leaf(&self, index: usize) -> bool {
        self.children[index].is_empty()
    }

    /// Leaf bones in index order.
    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.bones.len()).filter(move |&index| self.is_leaf(index))
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    /// Returns `true` if `ancestor` is reached from `bone` by following
    /// parent links. A bone is its own ancestor.
    pub fn is_ancestor(&self, ancestor: usize, bone: usize) -> bool {
        let mut current = Some(bone);
        while let Some(index) = current {
            if index == ancestor {
                return true;
            }
            current = self.bones[index].parent;
        }
        false
    }

    /// Parent-first evaluation order.
    pub fn evaluation_order(&self) -> &[usize] {
        &self.order
    }

    /// Local reference pose.
    pub fn reference_pose(&self) -> Pose {
        self.bones.iter().map(|bone| bone.reference).collect()
    }

    /// Converts local (parent-relative) transforms into component space.
    pub fn to_component(&self, local: &Pose) -> Pose {
        debug_assert_eq!(local.len(), self.bones.len());
        let local = local.transforms();
        let mut component = Pose::identity(self.bones.len());
        for &index in self.order.iter() {
            let transform = match self.bones[index].parent {
                Some(parent) => {
                    component[parent].mul_transform(&local[index])
                }
                None => local[index],
            };
            component[index] = transform;
        }
        component
    }

    /// Converts component space transforms back into local space.
    pub fn to_local(&self, component: &Pose) -> Pose {
        debug_assert_eq!(component.len(), self.bones.len());
        component
            .transforms()
            .iter()
            .zip(self.bones.iter())
            .map(|(transform, bone)| match bone.parent {
                Some(parent) => component[parent].relative_to_self(transform),
                None => *transform,
            })
            .collect()
    }
}

/// Serialized form of the [`Skeleton`], validated on conversion.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SkeletonRepr {
    pub name: String,
    pub bones: Vec<Bone>,
}

impl TryFrom<SkeletonRepr> for Skeleton {
    type Error = SkeletonError;

    fn try_from(repr: SkeletonRepr) -> Result<Self, SkeletonError> {
        Skeleton::new(repr.name, repr.bones)
    }
}

impl From<Skeleton> for SkeletonRepr {
    fn from(skeleton: Skeleton) -> Self {
        SkeletonRepr {
            name: skeleton.name,
            bones: skeleton.bones.into_vec(),
        }
    }
}
