//! Method header and extra-section decoding (ECMA-335 II.25.4).
//!
//! The low two bits of the first header byte select the layout:
//!
//! - **Tiny** (`0b10`): the upper six bits are the code size; max stack is 8 and there are
//!   no locals and no extra sections.
//! - **Fat** (`0b11`): a 16-bit word of flags plus header size in dwords, then max stack,
//!   code size and the local variable signature token. With `MORE_SECTS` set, 4-byte aligned
//!   data sections follow the code; each holds small (12-byte) or fat (24-byte) exception
//!   clauses and may chain to another section.

use crate::{
    file::io::{read_le, read_le_at},
    metadata::{
        method::{
            ExceptionClause, ExceptionClauseKind, ExceptionHandlerFlags, MethodBodyFlags,
            SectionFlags,
        },
        token::Token,
    },
    Result,
};

/// Max stack implied by a tiny header.
pub const TINY_MAX_STACK: u16 = 8;

const SMALL_CLAUSE_SIZE: usize = 12;
const FAT_CLAUSE_SIZE: usize = 24;

/// A decoded method body, borrowing its IL from the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody<'a> {
    /// The IL bytes
    pub code: &'a [u8],
    /// Size of the header in bytes
    pub header_size: usize,
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// `StandAloneSig` token of the locals, null if the method has none
    pub local_var_sig_token: Token,
    /// Fat header in use
    pub is_fat: bool,
    /// Locals are zero-initialised
    pub init_locals: bool,
    /// Exception clauses, in section order
    pub exception_clauses: Vec<ExceptionClause>,
}

impl<'a> MethodBody<'a> {
    /// Decode the body whose header starts at `data[0]`. `data` may extend past the body.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] for an unknown header format or a header size below
    /// three dwords, and [`crate::Error::OutOfBounds`] when the code or an exception section
    /// runs past `data`.
    pub fn from(data: &'a [u8]) -> Result<MethodBody<'a>> {
        let first_byte = read_le::<u8>(data)?;
        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b11)) {
            MethodBodyFlags::TINY_FORMAT => {
                let code_size = usize::from(first_byte >> 2);
                let code = data
                    .get(1..1 + code_size)
                    .ok_or_else(|| out_of_bounds_error!())?;

                Ok(MethodBody {
                    code,
                    header_size: 1,
                    max_stack: TINY_MAX_STACK,
                    local_var_sig_token: Token::new(0),
                    is_fat: false,
                    init_locals: false,
                    exception_clauses: Vec::new(),
                })
            }
            MethodBodyFlags::FAT_FORMAT => Self::fat(data),
            _ => Err(malformed_error!(
                "Method header 0x{:02X} is neither tiny nor fat",
                first_byte
            )),
        }
    }

    fn fat(data: &'a [u8]) -> Result<MethodBody<'a>> {
        let mut offset = 0;
        let first_word = read_le_at::<u16>(data, &mut offset)?;
        let max_stack = read_le_at::<u16>(data, &mut offset)?;
        let code_size = read_le_at::<u32>(data, &mut offset)? as usize;
        let local_var_sig_token = Token::new(read_le_at::<u32>(data, &mut offset)?);

        let flags = MethodBodyFlags::from_bits_truncate(first_word & 0x0FFF);
        let header_size = usize::from(first_word >> 12) * 4;
        if header_size < 12 {
            return Err(malformed_error!(
                "Fat method header declares {} bytes, less than 12",
                header_size
            ));
        }

        let code_end = header_size
            .checked_add(code_size)
            .ok_or_else(|| out_of_bounds_error!())?;
        let code = data
            .get(header_size..code_end)
            .ok_or_else(|| out_of_bounds_error!())?;

        let exception_clauses = if flags.contains(MethodBodyFlags::MORE_SECTS) {
            read_sections(data, code_end)?
        } else {
            Vec::new()
        };

        Ok(MethodBody {
            code,
            header_size,
            max_stack,
            local_var_sig_token,
            is_fat: true,
            init_locals: flags.contains(MethodBodyFlags::INIT_LOCALS),
            exception_clauses,
        })
    }

    /// Header plus code size, not counting extra sections.
    #[must_use]
    pub fn size(&self) -> usize {
        self.header_size + self.code.len()
    }

    /// Returns `true` if the method declares local variables.
    #[must_use]
    pub fn has_locals(&self) -> bool {
        !self.local_var_sig_token.is_null()
    }
}

fn read_sections(data: &[u8], code_end: usize) -> Result<Vec<ExceptionClause>> {
    let mut clauses = Vec::new();
    let mut cursor = (code_end + 3) & !3;

    loop {
        let section = SectionFlags::from_bits_truncate(read_le::<u8>(
            data.get(cursor..).ok_or_else(|| out_of_bounds_error!())?,
        )?);
        let is_fat = section.contains(SectionFlags::FAT_FORMAT);

        let mut position = cursor + 1;
        let size = if is_fat {
            let low = usize::from(read_le_at::<u16>(data, &mut position)?);
            let high = usize::from(read_le_at::<u8>(data, &mut position)?);
            low | (high << 16)
        } else {
            usize::from(read_le_at::<u8>(data, &mut position)?)
        };

        if size < 4 || cursor + size > data.len() {
            return Err(malformed_error!(
                "Method data section at 0x{:X} has invalid size {}",
                cursor,
                size
            ));
        }

        if section.contains(SectionFlags::EHTABLE) {
            let clause_size = if is_fat {
                FAT_CLAUSE_SIZE
            } else {
                SMALL_CLAUSE_SIZE
            };

            let mut position = cursor + 4;
            for _ in 0..(size - 4) / clause_size {
                clauses.push(if is_fat {
                    read_fat_clause(data, &mut position)?
                } else {
                    read_small_clause(data, &mut position)?
                });
            }
        }

        if !section.contains(SectionFlags::MORE_SECTS) {
            break;
        }
        cursor = (cursor + size + 3) & !3;
    }

    Ok(clauses)
}

fn read_small_clause(data: &[u8], offset: &mut usize) -> Result<ExceptionClause> {
    let flags = ExceptionHandlerFlags::from_bits_truncate(read_le_at::<u16>(data, offset)?);
    let try_offset = u32::from(read_le_at::<u16>(data, offset)?);
    let try_length = u32::from(read_le_at::<u8>(data, offset)?);
    let handler_offset = u32::from(read_le_at::<u16>(data, offset)?);
    let handler_length = u32::from(read_le_at::<u8>(data, offset)?);
    let extra = read_le_at::<u32>(data, offset)?;

    Ok(ExceptionClause {
        flags,
        kind: ExceptionClauseKind::from_raw(flags, extra),
        try_offset,
        try_length,
        handler_offset,
        handler_length,
    })
}

fn read_fat_clause(data: &[u8], offset: &mut usize) -> Result<ExceptionClause> {
    #[allow(clippy::cast_possible_truncation)]
    let flags = ExceptionHandlerFlags::from_bits_truncate(read_le_at::<u32>(data, offset)? as u16);
    let try_offset = read_le_at::<u32>(data, offset)?;
    let try_length = read_le_at::<u32>(data, offset)?;
    let handler_offset = read_le_at::<u32>(data, offset)?;
    let handler_length = read_le_at::<u32>(data, offset)?;
    let extra = read_le_at::<u32>(data, offset)?;

    Ok(ExceptionClause {
        flags,
        kind: ExceptionClauseKind::from_raw(flags, extra),
        try_offset,
        try_length,
        handler_offset,
        handler_length,
    })
}
