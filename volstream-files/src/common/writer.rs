use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ParserError;
use crate::common::types::{C3Vector, CAaBox};

pub(crate) trait Writable {
    fn write<W: Write>(&self, wr: &mut W) -> Result<(), ParserError>;
}

impl Writable for C3Vector {
    fn write<W: Write>(&self, wr: &mut W) -> Result<(), ParserError> {
        wr.write_f32::<LittleEndian>(self.x)?;
        wr.write_f32::<LittleEndian>(self.y)?;
        wr.write_f32::<LittleEndian>(self.z)?;
        Ok(())
    }
}

impl Writable for CAaBox {
    fn write<W: Write>(&self, wr: &mut W) -> Result<(), ParserError> {
        self.min.write(wr)?;
        self.max.write(wr)
    }
}

pub(crate) fn write_cstring<W: Write>(wr: &mut W, value: &str) -> Result<(), ParserError> {
    if value.as_bytes().contains(&0) {
        return Err(ParserError::FormatError {
            reason: "Strings must not contain nul bytes",
        });
    }

    wr.write_all(value.as_bytes())?;
    wr.write_u8(0)?;
    Ok(())
}
