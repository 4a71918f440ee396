use {
    crate::transform::Transform,
    std::{
        iter::FromIterator,
        ops::{Index, IndexMut},
    },
};

/// Transform per bone, in either local or component space.
/// Which one is up to the producer.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    transforms: Box<[Transform]>,
}

impl Pose {
    pub fn identity(size: usize) -> Pose {
        Pose {
            transforms: (0..size).map(|_| Transform::identity()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut [Transform] {
        &mut self.transforms
    }
}

impl From<Vec<Transform>> for Pose {
    fn from(transforms: Vec<Transform>) -> Self {
        Pose {
            transforms: transforms.into_boxed_slice(),
        }
    }
}

impl FromIterator<Transform> for Pose {
    fn from_iter<I: IntoIterator<Item = Transform>>(iter: I) -> Self {
        Pose {
            transforms: iter.into_iter().collect(),
        }
    }
}

impl Index<usize> for Pose {
    type Output = Transform;

    fn index(&self, index: usize) -> &Transform {
        &self.transforms[index]
    }
}

impl IndexMut<usize> for Pose {
    fn index_mut(&mut self, index: usize) -> &mut Transform {
        &mut self.transforms[index]
    }
}
