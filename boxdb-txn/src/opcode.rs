// The active opcode set and op flags. Historical codes 1-12, 14, 16 are
// reserved from an earlier wire protocol generation and must be rejected
// rather than silently accepted.

use boxdb_base::{kind_err, Kind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Nop,
    Insert,
    SelectLimit,
    Select,
    UpdateFields,
    Delete13,
    Delete,
    ExecLua,
    PaxosLeader,
    SelectKeys,
    SelectTuples,
    SubmitError,
    SelectTime,
    CreateObjectSpace,
    CreateIndex,
    DropObjectSpace,
    DropIndex,
    Truncate,
}

impl Opcode {
    pub fn code(self) -> u16 {
        match self {
            Opcode::Nop => 1,
            Opcode::Insert => 13,
            Opcode::SelectLimit => 15,
            Opcode::Select => 17,
            Opcode::UpdateFields => 19,
            Opcode::Delete13 => 20,
            Opcode::Delete => 21,
            Opcode::ExecLua => 22,
            Opcode::PaxosLeader => 90,
            Opcode::SelectKeys => 99,
            Opcode::SelectTuples => 100,
            Opcode::SubmitError => 101,
            Opcode::SelectTime => 102,
            Opcode::CreateObjectSpace => 240,
            Opcode::CreateIndex => 241,
            Opcode::DropObjectSpace => 242,
            Opcode::DropIndex => 243,
            Opcode::Truncate => 244,
        }
    }

    pub fn from_code(code: u16) -> Result<Opcode> {
        Ok(match code {
            1 => Opcode::Nop,
            13 => Opcode::Insert,
            15 => Opcode::SelectLimit,
            17 => Opcode::Select,
            19 => Opcode::UpdateFields,
            20 => Opcode::Delete13,
            21 => Opcode::Delete,
            22 => Opcode::ExecLua,
            90 => Opcode::PaxosLeader,
            99 => Opcode::SelectKeys,
            100 => Opcode::SelectTuples,
            101 => Opcode::SubmitError,
            102 => Opcode::SelectTime,
            240 => Opcode::CreateObjectSpace,
            241 => Opcode::CreateIndex,
            242 => Opcode::DropObjectSpace,
            243 => Opcode::DropIndex,
            244 => Opcode::Truncate,
            2..=12 | 14 | 16 => {
                return Err(kind_err(Kind::BadOpcode, format!("opcode {} is reserved", code)))
            }
            other => return Err(kind_err(Kind::BadOpcode, format!("unknown opcode {}", other))),
        })
    }

    pub fn is_delete(self) -> bool {
        matches!(self, Opcode::Delete | Opcode::Delete13)
    }
}

pub mod flags {
    pub const RETURN_TUPLE: u32 = 1;
    pub const ADD: u32 = 2;
    pub const REPLACE: u32 = 4;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_active_codes() {
        for op in [
            Opcode::Nop,
            Opcode::Insert,
            Opcode::SelectLimit,
            Opcode::Select,
            Opcode::UpdateFields,
            Opcode::Delete13,
            Opcode::Delete,
            Opcode::ExecLua,
            Opcode::PaxosLeader,
            Opcode::SelectKeys,
            Opcode::SelectTuples,
            Opcode::SubmitError,
            Opcode::SelectTime,
            Opcode::CreateObjectSpace,
            Opcode::CreateIndex,
            Opcode::DropObjectSpace,
            Opcode::DropIndex,
            Opcode::Truncate,
        ] {
            assert_eq!(Opcode::from_code(op.code()).unwrap(), op);
        }
    }

    #[test]
    fn reserved_codes_rejected() {
        for code in [2u16, 5, 9, 12, 14, 16] {
            let err = Opcode::from_code(code).unwrap_err();
            assert_eq!(err.kind(), Kind::BadOpcode);
        }
    }
}
