use std::ffi::CString;
use std::io::ErrorKind::UnexpectedEof;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ParserError;
use crate::common::types::{C3Vector, CAaBox, IffChunk};

pub(crate) trait Parseable<T> {
    fn parse<R: Read>(rdr: &mut R) -> Result<T, ParserError>;
}

impl Parseable<C3Vector> for C3Vector {
    fn parse<R: Read>(rdr: &mut R) -> Result<C3Vector, ParserError> {
        Ok(C3Vector {
            x: rdr.read_f32::<LittleEndian>()?,
            y: rdr.read_f32::<LittleEndian>()?,
            z: rdr.read_f32::<LittleEndian>()?,
        })
    }
}

impl Parseable<CAaBox> for CAaBox {
    fn parse<R: Read>(rdr: &mut R) -> Result<CAaBox, ParserError> {
        Ok(CAaBox {
            min: C3Vector::parse(rdr)?,
            max: C3Vector::parse(rdr)?,
        })
    }
}

impl Parseable<u32> for u32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u32, ParserError> {
        Ok(rdr.read_u32::<LittleEndian>()?)
    }
}

impl Parseable<f64> for f64 {
    fn parse<R: Read>(rdr: &mut R) -> Result<f64, ParserError> {
        Ok(rdr.read_f64::<LittleEndian>()?)
    }
}

pub(crate) fn read_cstring<R: Read>(rdr: &mut R) -> Result<CString, ParserError> {
    let mut buf = Vec::new();
    loop {
        let c = rdr.read_u8()?;
        if c == 0 {
            // SAFETY: the loop stops at the first nul byte, so buf contains none
            return Ok(unsafe { CString::from_vec_unchecked(buf) });
        }
        buf.push(c);
    }
}

pub(crate) fn read_chunk_array<T: Parseable<T>, R: Read>(rdr: &mut R) -> Result<Vec<T>, ParserError> {
    let mut list = Vec::<T>::new();
    let mut element = T::parse(rdr);
    while element.is_ok() {
        list.push(element?);
        element = T::parse(rdr);
    }

    // EOF arrives wrapped in a ParserError and marks the regular end of the array.
    match element {
        Err(ParserError::IOError(internal)) if internal.kind() == UnexpectedEof => (),
        err => return err.map(|_| Vec::with_capacity(0)),
    };
    Ok(list)
}

/// Reads chunks until the source is exhausted. A truncated chunk header or body is an error.
pub(crate) fn read_all_chunks<R: Read>(rdr: &mut R) -> Result<Vec<IffChunk>, ParserError> {
    let mut chunk_list = Vec::<IffChunk>::new();
    loop {
        let mut probe = [0u8; 1];
        if rdr.read(&mut probe)? == 0 {
            return Ok(chunk_list);
        }

        let mut rest = (&probe[..]).chain(&mut *rdr);
        chunk_list.push(IffChunk::read_next_chunk(&mut rest)?);
    }
}

pub(crate) fn get_mandatory_chunk_by_name<'a>(
    chunk_list: &'a [IffChunk],
    chunk_magic: &'static str,
) -> Result<&'a IffChunk, ParserError> {
    chunk_list
        .iter()
        .find(|chunk| chunk.magic_str().eq(chunk_magic))
        .ok_or(ParserError::MissingChunk { magic: chunk_magic })
}
