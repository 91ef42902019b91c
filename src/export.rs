use crate::errors::{Hy3dError, Result};
use crate::mesh::Mesh;
use std::fs;
use std::path::{Path, PathBuf};

pub const MESH_EXTENSION: &str = "glb";

/// Output file name for an input image: the file name up to its *first* dot, plus `.glb`.
///
/// `archive.tar.png` therefore becomes `archive.glb`, not `archive.tar.glb`. Multi-dot
/// names collide with each other (`cat.v1.png` and `cat.v2.png` both map to `cat.glb`);
/// this is kept as-is until someone decides otherwise.
pub fn output_file_name(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    format!("{stem}.{MESH_EXTENSION}")
}

pub fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    output_dir.join(output_file_name(input))
}

/// Write the mesh next to the others in `output_dir`, replacing any file of the same name.
///
/// The write is not atomic: a crash part-way leaves a truncated file behind.
pub fn export_mesh(mesh: Mesh, input: &Path, output_dir: &Path) -> Result<PathBuf> {
    let path = output_path(input, output_dir);
    fs::write(&path, mesh.into_bytes()).map_err(|e| Hy3dError::FileSystem {
        path: path.clone(),
        operation: "mesh export".to_string(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), "mesh exported");
    Ok(path)
}
