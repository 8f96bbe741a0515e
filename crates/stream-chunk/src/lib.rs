mod decode;
mod error;
mod frame;
mod reassembler;

pub use error::*;
pub use frame::{Fragment, PartTotal};
pub use reassembler::{ChunkReassembler, DEFAULT_CHUNK_TIMEOUT, Reassembled};
