use crate::errors::{Hy3dError, Result};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const GLB_HEADER_LEN: usize = 12;

/// A generated surface, held as a binary glTF container.
///
/// The geometry itself is opaque to this crate: it is produced by the shape pipeline,
/// optionally repainted by the texture pipeline, and written out unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mesh {
    glb: Vec<u8>,
    textured: bool,
}

impl Mesh {
    /// Wrap GLB bytes after checking the container header.
    pub fn from_glb(glb: Vec<u8>) -> Result<Self> {
        validate_header(&glb)?;
        Ok(Self {
            glb,
            textured: false,
        })
    }

    pub fn into_textured(mut self) -> Self {
        self.textured = true;
        self
    }

    pub fn is_textured(&self) -> bool {
        self.textured
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.glb
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.glb
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn validate_header(glb: &[u8]) -> Result<()> {
    if glb.len() < GLB_HEADER_LEN {
        return Err(Hy3dError::invalid_mesh(format!(
            "{} bytes is shorter than a GLB header",
            glb.len()
        )));
    }
    if &glb[..4] != GLB_MAGIC {
        return Err(Hy3dError::invalid_mesh("missing glTF magic"));
    }

    let version = read_u32_le(glb, 4);
    if version != GLB_VERSION {
        return Err(Hy3dError::invalid_mesh(format!(
            "unsupported GLB version {version}"
        )));
    }

    let declared = read_u32_le(glb, 8) as usize;
    if declared != glb.len() {
        return Err(Hy3dError::invalid_mesh(format!(
            "header declares {declared} bytes but {} were received",
            glb.len()
        )));
    }
    Ok(())
}

/// Build a structurally valid GLB with a single JSON chunk. Used by mocks and tests.
pub fn minimal_glb(json: &str) -> Vec<u8> {
    let mut chunk = json.as_bytes().to_vec();
    // chunks are 4-byte aligned, JSON padded with spaces
    while chunk.len() % 4 != 0 {
        chunk.push(b' ');
    }

    let total = GLB_HEADER_LEN + 8 + chunk.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&chunk);
    glb
}
