//! Die polyhedra and face labelling
//!
//! Each die is a convex polyhedron whose faces carry a material index:
//! `0` marks a blank face, anything else is `value + 1`. Remapping a die's
//! displayed values only touches these indices, never the shape.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::dice::DieType;

/// Material index of an unlabelled face
pub const BLANK_MATERIAL: i32 = 0;

/// d4 faces show the three values at their corners
const D4_CORNER_LABELS: [[i32; 3]; 5] = [[0, 0, 0], [2, 4, 3], [1, 3, 4], [2, 1, 4], [1, 2, 3]];

/// One polygonal face of a die
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    /// Vertex indices, counter-clockwise seen from outside
    pub vertices: Vec<usize>,
    /// Outward unit normal in body space
    pub normal: Vec3,
    /// `0` for blank faces, otherwise face value + 1
    pub material: i32,
}

impl Face {
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.material == BLANK_MATERIAL
    }

    /// Face value carried by this face, if labelled
    #[inline]
    pub fn value(&self) -> Option<i32> {
        (!self.is_blank()).then(|| self.material - 1)
    }
}

/// Shape and face labelling for one die type at one scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DieGeometry {
    pub die: DieType,
    /// Circumscribed radius
    pub radius: f32,
    /// Vertices in body space
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Face>,
}

impl DieGeometry {
    /// Build the polyhedron for `die` with the given dice scale
    pub fn build(die: DieType, scale: f32) -> Self {
        let radius = scale * die.radius_factor();
        let (raw_vertices, raw_faces) = polyhedron(die);

        let vertices: Vec<Vec3> = raw_vertices
            .iter()
            .map(|v| Vec3::from_array(*v).normalize() * radius)
            .collect();

        let faces = raw_faces
            .iter()
            .map(|(indices, value)| {
                let normal = face_normal(&vertices, indices);
                Face {
                    vertices: indices.clone(),
                    normal,
                    material: if *value < 0 { BLANK_MATERIAL } else { value + 1 },
                }
            })
            .collect();

        Self {
            die,
            radius,
            vertices,
            faces,
        }
    }

    /// Labelled faces only
    pub fn labelled_faces(&self) -> impl Iterator<Item = &Face> {
        self.faces.iter().filter(|f| !f.is_blank())
    }

    /// Text printed on each face, in face order (blank faces are empty)
    pub fn labels(&self) -> Vec<String> {
        self.faces
            .iter()
            .map(|f| face_label(self.die, f.material))
            .collect()
    }
}

/// Text printed on a face with the given material index
pub fn face_label(die: DieType, material: i32) -> String {
    if material == BLANK_MATERIAL {
        return String::new();
    }
    let value = material - 1;
    match die {
        DieType::D4 => D4_CORNER_LABELS
            .get(value as usize)
            .map(|corners| {
                corners
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default(),
        DieType::D100 => format!("{}0", value),
        _ => value.to_string(),
    }
}

/// Outward normal of a convex face centred on the origin
fn face_normal(vertices: &[Vec3], indices: &[usize]) -> Vec3 {
    let a = vertices[indices[0]];
    let b = vertices[indices[1]];
    let c = vertices[indices[2]];
    let normal = (b - a).cross(c - a).normalize_or_zero();

    let centroid = indices.iter().map(|&i| vertices[i]).sum::<Vec3>() / indices.len() as f32;
    if normal.dot(centroid) < 0.0 { -normal } else { normal }
}

type RawFace = (Vec<usize>, i32);

fn face(indices: &[usize], value: i32) -> RawFace {
    (indices.to_vec(), value)
}

/// Unit-less vertex and face tables; the trailing face value is -1 for blanks
fn polyhedron(die: DieType) -> (Vec<[f32; 3]>, Vec<RawFace>) {
    match die {
        DieType::D4 => (
            vec![[1.0, 1.0, 1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, -1.0], [1.0, -1.0, -1.0]],
            vec![
                face(&[1, 0, 2], 1),
                face(&[0, 1, 3], 2),
                face(&[0, 3, 2], 3),
                face(&[1, 2, 3], 4),
            ],
        ),
        DieType::D6 => (
            vec![
                [-1.0, -1.0, -1.0],
                [1.0, -1.0, -1.0],
                [1.0, 1.0, -1.0],
                [-1.0, 1.0, -1.0],
                [-1.0, -1.0, 1.0],
                [1.0, -1.0, 1.0],
                [1.0, 1.0, 1.0],
                [-1.0, 1.0, 1.0],
            ],
            vec![
                face(&[0, 3, 2, 1], 1),
                face(&[1, 2, 6, 5], 2),
                face(&[0, 1, 5, 4], 3),
                face(&[3, 7, 6, 2], 4),
                face(&[0, 4, 7, 3], 5),
                face(&[4, 5, 6, 7], 6),
            ],
        ),
        DieType::D8 => (
            vec![
                [1.0, 0.0, 0.0],
                [-1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, -1.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.0, 0.0, -1.0],
            ],
            vec![
                face(&[0, 2, 4], 1),
                face(&[0, 4, 3], 2),
                face(&[0, 3, 5], 3),
                face(&[0, 5, 2], 4),
                face(&[1, 3, 4], 5),
                face(&[1, 4, 2], 6),
                face(&[1, 2, 5], 7),
                face(&[1, 5, 3], 8),
            ],
        ),
        DieType::D10 | DieType::D100 => {
            let step = std::f32::consts::TAU / 10.0;
            let h = 0.105;
            let mut vertices: Vec<[f32; 3]> = (0..10)
                .map(|i| {
                    let b = step * i as f32;
                    let z = if i % 2 == 1 { h } else { -h };
                    [b.cos(), b.sin(), z]
                })
                .collect();
            vertices.push([0.0, 0.0, -1.0]);
            vertices.push([0.0, 0.0, 1.0]);
            (
                vertices,
                vec![
                    face(&[5, 7, 11], 0),
                    face(&[4, 2, 10], 1),
                    face(&[1, 3, 11], 2),
                    face(&[0, 8, 10], 3),
                    face(&[7, 9, 11], 4),
                    face(&[8, 6, 10], 5),
                    face(&[9, 1, 11], 6),
                    face(&[2, 0, 10], 7),
                    face(&[3, 5, 11], 8),
                    face(&[6, 4, 10], 9),
                    face(&[1, 0, 2], -1),
                    face(&[1, 2, 3], -1),
                    face(&[3, 2, 4], -1),
                    face(&[3, 4, 5], -1),
                    face(&[5, 4, 6], -1),
                    face(&[5, 6, 7], -1),
                    face(&[7, 6, 8], -1),
                    face(&[7, 8, 9], -1),
                    face(&[9, 8, 0], -1),
                    face(&[9, 0, 1], -1),
                ],
            )
        }
        DieType::D12 => {
            let p = (1.0 + 5.0f32.sqrt()) / 2.0;
            let q = 1.0 / p;
            (
                vec![
                    [0.0, q, p],
                    [0.0, q, -p],
                    [0.0, -q, p],
                    [0.0, -q, -p],
                    [p, 0.0, q],
                    [p, 0.0, -q],
                    [-p, 0.0, q],
                    [-p, 0.0, -q],
                    [q, p, 0.0],
                    [q, -p, 0.0],
                    [-q, p, 0.0],
                    [-q, -p, 0.0],
                    [1.0, 1.0, 1.0],
                    [1.0, 1.0, -1.0],
                    [1.0, -1.0, 1.0],
                    [1.0, -1.0, -1.0],
                    [-1.0, 1.0, 1.0],
                    [-1.0, 1.0, -1.0],
                    [-1.0, -1.0, 1.0],
                    [-1.0, -1.0, -1.0],
                ],
                vec![
                    face(&[2, 14, 4, 12, 0], 1),
                    face(&[15, 9, 11, 19, 3], 2),
                    face(&[16, 10, 17, 7, 6], 3),
                    face(&[6, 7, 19, 11, 18], 4),
                    face(&[6, 18, 2, 0, 16], 5),
                    face(&[18, 11, 9, 14, 2], 6),
                    face(&[1, 17, 10, 8, 13], 7),
                    face(&[1, 13, 5, 15, 3], 8),
                    face(&[13, 8, 12, 4, 5], 9),
                    face(&[5, 4, 14, 9, 15], 10),
                    face(&[0, 12, 8, 10, 16], 11),
                    face(&[3, 19, 7, 17, 1], 12),
                ],
            )
        }
        DieType::D20 => {
            let t = (1.0 + 5.0f32.sqrt()) / 2.0;
            (
                vec![
                    [-1.0, t, 0.0],
                    [1.0, t, 0.0],
                    [-1.0, -t, 0.0],
                    [1.0, -t, 0.0],
                    [0.0, -1.0, t],
                    [0.0, 1.0, t],
                    [0.0, -1.0, -t],
                    [0.0, 1.0, -t],
                    [t, 0.0, -1.0],
                    [t, 0.0, 1.0],
                    [-t, 0.0, -1.0],
                    [-t, 0.0, 1.0],
                ],
                vec![
                    face(&[0, 11, 5], 1),
                    face(&[0, 5, 1], 2),
                    face(&[0, 1, 7], 3),
                    face(&[0, 7, 10], 4),
                    face(&[0, 10, 11], 5),
                    face(&[1, 5, 9], 6),
                    face(&[5, 11, 4], 7),
                    face(&[11, 10, 2], 8),
                    face(&[10, 7, 6], 9),
                    face(&[7, 1, 8], 10),
                    face(&[3, 9, 4], 11),
                    face(&[3, 4, 2], 12),
                    face(&[3, 2, 6], 13),
                    face(&[3, 6, 8], 14),
                    face(&[3, 8, 9], 15),
                    face(&[4, 9, 5], 16),
                    face(&[2, 4, 11], 17),
                    face(&[6, 2, 10], 18),
                    face(&[8, 6, 7], 19),
                    face(&[9, 8, 1], 20),
                ],
            )
        }
    }
}

/// Shared geometry per (die type, scale), built lazily on first use.
///
/// Instances hold an `Arc` to the cached shape; a remapped die clones its own
/// copy on write so the cached entry keeps the identity labelling.
#[derive(Debug, Default)]
pub struct GeometryCache {
    entries: HashMap<(DieType, u32), Arc<DieGeometry>>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Geometry for `die` at `scale`, building it if needed
    pub fn get(&mut self, die: DieType, scale: f32) -> Arc<DieGeometry> {
        self.entries
            .entry((die, scale.to_bits()))
            .or_insert_with(|| {
                log::debug!("Building {} geometry at scale {}", die, scale);
                Arc::new(DieGeometry::build(die, scale))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
