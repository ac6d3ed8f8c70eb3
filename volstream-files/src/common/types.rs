use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::ParserError;
use crate::common::reader::Parseable;

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct C3Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct CAaBox {
    pub min: C3Vector,
    pub max: C3Vector,
}

impl CAaBox {
    /// Grows this box so that it also encloses `other`.
    pub fn union(&self, other: &CAaBox) -> CAaBox {
        CAaBox {
            min: C3Vector {
                x: self.min.x.min(other.min.x),
                y: self.min.y.min(other.min.y),
                z: self.min.z.min(other.min.z),
            },
            max: C3Vector {
                x: self.max.x.max(other.max.x),
                y: self.max.y.max(other.max.y),
                z: self.max.z.max(other.max.z),
            },
        }
    }
}

#[derive(Debug)]
pub(crate) struct IffChunk {
    pub magic: u32,
    pub size: u32,
    pub data: Vec<u8>,
}

/// The value reads as the magic in big endian. Chunks are written little endian, so on disk the bytes appear reversed.
pub(crate) const fn magic_from_str(magic: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*magic)
}

impl IffChunk {
    pub fn new(magic: &[u8; 4], data: Vec<u8>) -> IffChunk {
        IffChunk {
            magic: magic_from_str(magic),
            size: data.len() as u32,
            data,
        }
    }

    pub fn magic_str(&self) -> String {
        String::from_utf8_lossy(&self.magic.to_be_bytes()[..]).into_owned()
    }

    pub fn parse<T: Parseable<T>>(&self) -> Result<T, ParserError> {
        T::parse(&mut Cursor::new(&self.data))
    }

    pub fn read_next_chunk<R: Read>(rdr: &mut R) -> Result<IffChunk, ParserError> {
        let magic = rdr.read_u32::<LittleEndian>()?;
        let size = rdr.read_u32::<LittleEndian>()?;
        // grows with what is actually there, a corrupt size must not allocate up front
        let mut data = Vec::new();
        rdr.take(size as u64).read_to_end(&mut data)?;
        if data.len() != size as usize {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("chunk declares {} bytes, only {} remain", size, data.len()),
            )
            .into());
        }

        Ok(IffChunk { magic, size, data })
    }

    pub fn write<W: Write>(&self, wr: &mut W) -> Result<(), ParserError> {
        wr.write_u32::<LittleEndian>(self.magic)?;
        wr.write_u32::<LittleEndian>(self.size)?;
        wr.write_all(&self.data)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SVerChunk {
    pub version: u32,
}

impl Parseable<SVerChunk> for SVerChunk {
    fn parse<R: Read>(rdr: &mut R) -> Result<SVerChunk, ParserError> {
        Ok(SVerChunk {
            version: rdr.read_u32::<LittleEndian>()?,
        })
    }
}
