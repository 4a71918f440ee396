use nalgebra as na;

/// Translation, rotation and non-uniform scale of a bone.
///
/// Composition follows the usual "scale, then rotate, then translate" order
/// and ignores shear, which is what animation tracks can express.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "TransformRepr", into = "TransformRepr")]
pub struct Transform {
    pub translation: na::Vector3<f32>,
    pub rotation: na::UnitQuaternion<f32>,
    pub scale: na::Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Transform::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Transform {
            translation: na::Vector3::zeros(),
            rotation: na::UnitQuaternion::identity(),
            scale: na::Vector3::repeat(1.0),
        }
    }

    pub fn from_translation(translation: na::Vector3<f32>) -> Self {
        Transform {
            translation,
            ..Transform::identity()
        }
    }

    pub fn from_parts(
        translation: [f32; 3],
        rotation: [f32; 4],
        scale: [f32; 3],
    ) -> Self {
        let [x, y, z, w] = rotation;
        Transform {
            translation: translation.into(),
            rotation: na::UnitQuaternion::new_normalize(na::Quaternion::new(
                w, x, y, z,
            )),
            scale: scale.into(),
        }
    }

    /// Rotation as `[x, y, z, w]`.
    pub fn rotation_xyzw(&self) -> [f32; 4] {
        let q = self.rotation.quaternion();
        [q.i, q.j, q.k, q.w]
    }

    /// Returns `self * child`, the transform of `child` expressed in the
    /// space `self` is expressed in.
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.translation
                + self.rotation
                    * self.scale.component_mul(&child.translation),
            rotation: self.rotation * child.rotation,
            scale: self.scale.component_mul(&child.scale),
        }
    }

    /// Returns `x` such that `self * x == other`.
    ///
    /// Zero scale components on `self` produce zero components instead of
    /// infinities.
    pub fn relative_to_self(&self, other: &Transform) -> Transform {
        let inv_rotation = self.rotation.inverse();
        let inv_scale = self.scale.map(safe_recip);
        Transform {
            translation: (inv_rotation * (other.translation - self.translation))
                .component_mul(&inv_scale),
            rotation: inv_rotation * other.rotation,
            scale: other.scale.component_mul(&inv_scale),
        }
    }

    pub fn to_matrix(&self) -> na::Matrix4<f32> {
        na::Matrix4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * na::Matrix4::new_nonuniform_scaling(&self.scale)
    }

    /// Decomposes affine matrix into translation, rotation and scale.
    /// A negative determinant is folded into the scale.
    pub fn from_matrix(m: &na::Matrix4<f32>) -> Self {
        let translation: na::Vector3<f32> = m.column(3).xyz().into_owned();

        let mut r = m.remove_column(3).remove_row(3);
        let mut s = na::Vector3::new(
            r.column(0).norm(),
            r.column(1).norm(),
            r.column(2).norm(),
        );
        let sign = r.determinant().signum();
        s *= sign;
        r *= sign;

        r *= na::Matrix3::from_diagonal(&s.map(safe_recip));

        let r = na::Rotation3::from_matrix(&r);

        let rotation = match r.axis_angle() {
            Some((axis, angle)) => {
                na::UnitQuaternion::from_axis_angle(&axis, angle)
            }
            None => na::UnitQuaternion::identity(),
        };

        Transform {
            translation,
            rotation,
            scale: s,
        }
    }

    /// Approximate equality, used to compare poses produced by different
    /// code paths.
    pub fn abs_diff_eq(&self, other: &Transform, epsilon: f32) -> bool {
        (self.translation - other.translation).amax() <= epsilon
            && (self.scale - other.scale).amax() <= epsilon
            && 1.0
                - self
                    .rotation
                    .coords
                    .dot(&other.rotation.coords)
                    .abs()
                <= epsilon
    }
}

fn safe_recip(c: f32) -> f32 {
    if c.abs() <= f32::EPSILON {
        0.0
    } else {
        1.0 / c
    }
}

/// On-disk form of the [`Transform`].
/// Either explicit parts or column-major affine matrix.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum TransformRepr {
    Parts {
        translation: [f32; 3],
        rotation: [f32; 4],
        #[serde(default = "unit_scale")]
        scale: [f32; 3],
    },
    Matrix {
        matrix: [[f32; 4]; 4],
    },
}

fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}

impl From<TransformRepr> for Transform {
    fn from(repr: TransformRepr) -> Self {
        match repr {
            TransformRepr::Parts {
                translation,
                rotation,
                scale,
            } => Transform::from_parts(translation, rotation, scale),
            TransformRepr::Matrix { matrix } => {
                let columns = matrix.iter().map(|c| na::Vector4::from(*c));
                let columns: Vec<_> = columns.collect();
                Transform::from_matrix(&na::Matrix4::from_columns(&columns))
            }
        }
    }
}

impl From<Transform> for TransformRepr {
    fn from(t: Transform) -> Self {
        TransformRepr::Parts {
            translation: t.translation.into(),
            rotation: t.rotation_xyzw(),
            scale: t.scale.into(),
        }
    }
}
