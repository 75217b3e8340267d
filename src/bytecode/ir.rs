use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lang::value::Value;

/// Compiler output: a flat instruction stream plus the constants it references.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<Value>,
}

// =============================================================================
// Image - serialized bytecode on disk
// =============================================================================

const IMAGE_MAGIC: [u8; 4] = *b"KILN";
const IMAGE_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct Image {
    magic: [u8; 4],
    version: u16,
    bytecode: Bytecode,
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image error: {0}")]
    Encoding(#[from] postcard::Error),
    #[error("image error: not a kiln bytecode image")]
    BadMagic,
    #[error("image error: unsupported image version {found} (expected {expected})")]
    Version { found: u16, expected: u16 },
}

impl Bytecode {
    pub fn new(instructions: Vec<u8>, constants: Vec<Value>) -> Self {
        Bytecode {
            instructions,
            constants,
        }
    }

    /// Serializes into a self-describing image.
    pub fn to_image(&self) -> Result<Vec<u8>, ImageError> {
        let image = Image {
            magic: IMAGE_MAGIC,
            version: IMAGE_VERSION,
            bytecode: self.clone(),
        };
        Ok(postcard::to_allocvec(&image)?)
    }

    pub fn from_image(bytes: &[u8]) -> Result<Self, ImageError> {
        let image: Image = postcard::from_bytes(bytes)?;
        if image.magic != IMAGE_MAGIC {
            return Err(ImageError::BadMagic);
        }
        if image.version != IMAGE_VERSION {
            return Err(ImageError::Version {
                found: image.version,
                expected: IMAGE_VERSION,
            });
        }
        Ok(image.bytecode)
    }
}
