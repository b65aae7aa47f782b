//! Root mesh loading
//!
//! Hair grows from the vertices of a small face/vertex/normal text mesh
//! (the `v`/`vn`/`f` subset of Wavefront OBJ). Face corners are
//! `position/texcoord/normal` or `position//normal` references; every distinct
//! position/normal pair becomes one welded output vertex.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Mesh loading failure
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("failed to read mesh '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("line {line}: {kind} index {index} out of range ({count} declared so far)")]
    IndexOutOfRange {
        line: usize,
        kind: &'static str,
        index: i64,
        count: usize,
    },

    #[error("line {line}: face corner '{corner}' has no normal reference")]
    MissingNormal { line: usize, corner: String },
}

/// A hair root: one strand grows from each
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RootVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl RootVertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

/// Welded root mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootMesh {
    pub vertices: Vec<RootVertex>,
    pub indices: Vec<u32>,
}

/// Load and parse a root mesh from disk
pub fn load_root_mesh(path: impl AsRef<Path>) -> Result<RootMesh, MeshError> {
    let path = path.as_ref();
    log::debug!("Loading root mesh from '{}'", path.display());

    let source = std::fs::read_to_string(path).map_err(|source| MeshError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mesh = parse_root_mesh(&source)?;
    log::info!(
        "✓ Loaded root mesh '{}': {} vertices, {} indices",
        path.display(),
        mesh.vertices.len(),
        mesh.indices.len()
    );
    Ok(mesh)
}

/// Parse root mesh text.
///
/// Positions and normals are accumulated in declaration order and faces may
/// only reference what has already been declared. Polygons with more than three
/// corners are fan triangulated. Unknown statements (`vt`, `o`, `g`, `s`,
/// `usemtl`, ...) are ignored.
pub fn parse_root_mesh(source: &str) -> Result<RootMesh, MeshError> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut welded: HashMap<(usize, usize), u32> = HashMap::new();
    let mut mesh = RootMesh::default();

    for (line_index, raw) in source.lines().enumerate() {
        let line = line_index + 1;
        let statement = raw.split('#').next().unwrap_or("").trim();
        let mut tokens = statement.split_whitespace();

        match tokens.next() {
            Some("v") => positions.push(parse_vec3(line, tokens)?),
            Some("vn") => normals.push(parse_vec3(line, tokens)?),
            Some("f") => {
                let mut corners = Vec::with_capacity(4);
                for corner in tokens {
                    let key = parse_corner(line, corner, positions.len(), normals.len())?;
                    let index = *welded.entry(key).or_insert_with(|| {
                        mesh.vertices
                            .push(RootVertex::new(positions[key.0], normals[key.1]));
                        (mesh.vertices.len() - 1) as u32
                    });
                    corners.push(index);
                }

                if corners.len() < 3 {
                    return Err(MeshError::Parse {
                        line,
                        message: format!("face has {} corners, need at least 3", corners.len()),
                    });
                }

                for k in 1..corners.len() - 1 {
                    mesh.indices
                        .extend_from_slice(&[corners[0], corners[k], corners[k + 1]]);
                }
            }
            _ => {}
        }
    }

    Ok(mesh)
}

fn parse_vec3<'a>(line: usize, mut tokens: impl Iterator<Item = &'a str>) -> Result<Vec3, MeshError> {
    let mut components = [0.0f32; 3];
    for component in components.iter_mut() {
        let token = tokens.next().ok_or_else(|| MeshError::Parse {
            line,
            message: "expected 3 components".to_string(),
        })?;
        *component = token.parse().map_err(|_| MeshError::Parse {
            line,
            message: format!("invalid number '{token}'"),
        })?;
    }
    Ok(Vec3::from_array(components))
}

/// Resolve a corner to zero-based (position, normal) indices
fn parse_corner(
    line: usize,
    corner: &str,
    position_count: usize,
    normal_count: usize,
) -> Result<(usize, usize), MeshError> {
    let mut parts = corner.split('/');
    let position = parts.next().unwrap_or("");
    let _texcoord = parts.next();
    let normal = match parts.next() {
        Some(normal) if !normal.is_empty() => normal,
        _ => {
            return Err(MeshError::MissingNormal {
                line,
                corner: corner.to_string(),
            })
        }
    };

    Ok((
        resolve_index(line, "position", position, position_count)?,
        resolve_index(line, "normal", normal, normal_count)?,
    ))
}

/// One-based indices count from the start, negative ones from the latest declaration
fn resolve_index(
    line: usize,
    kind: &'static str,
    token: &str,
    count: usize,
) -> Result<usize, MeshError> {
    let index: i64 = token.parse().map_err(|_| MeshError::Parse {
        line,
        message: format!("invalid {kind} index '{token}'"),
    })?;

    let resolved = match index {
        i if i > 0 => i - 1,
        i if i < 0 => count as i64 + i,
        _ => -1,
    };

    if resolved < 0 || resolved >= count as i64 {
        return Err(MeshError::IndexOutOfRange {
            line,
            kind,
            index,
            count,
        });
    }
    Ok(resolved as usize)
}
