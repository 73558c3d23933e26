// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The data a slave exposes.

use core::fmt;

use crate::{
    error::FrameError,
    frame::{Access, Address, DataType, Word},
    util::{get_bit, set_bit},
};

/// Application callbacks for delegated data types.
///
/// Bit values are passed as `0` or `1`.
pub trait Accessor {
    fn read(&mut self, data_type: DataType, index: Address) -> Word;

    fn write(&mut self, data_type: DataType, index: Address, value: Word);

    fn can_read(&mut self, _data_type: DataType, _index: Address) -> bool {
        true
    }

    fn can_write(&mut self, _data_type: DataType, _index: Address) -> bool {
        true
    }
}

/// Storage of a single data type.
pub enum Table<'a> {
    Words(&'a mut [Word]),
    /// Bit-packed values, least significant bit first.
    Bits {
        values: &'a mut [u8],
        count: usize,
    },
    /// Values are provided by the [`Accessor`].
    Delegated { count: usize },
}

impl Table<'_> {
    const fn len(&self) -> usize {
        match self {
            Self::Words(values) => values.len(),
            Self::Bits { count, .. } | Self::Delegated { count } => *count,
        }
    }
}

impl fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Words(values) => f.debug_tuple("Words").field(&values.len()).finish(),
            Self::Bits { count, .. } => f.debug_tuple("Bits").field(count).finish(),
            Self::Delegated { count } => f.debug_tuple("Delegated").field(count).finish(),
        }
    }
}

/// Registers, coils and inputs of a slave device.
///
/// ```
/// use modbus_rtu_engine::slave::DeviceProfile;
///
/// let mut registers = [0u16; 16];
/// let mut coils = [0u8; 2];
/// let protected = [0b0000_0011, 0];
/// let profile = DeviceProfile::new()
///     .holding_registers(&mut registers)
///     .protect_holding_registers(&protected)
///     .coils(&mut coils, 12);
/// ```
#[derive(Default)]
pub struct DeviceProfile<'a> {
    holding_registers: Option<Table<'a>>,
    input_registers: Option<Table<'a>>,
    coils: Option<Table<'a>>,
    discrete_inputs: Option<Table<'a>>,
    protected_registers: Option<&'a [u8]>,
    protected_coils: Option<&'a [u8]>,
    accessor: Option<&'a mut dyn Accessor>,
}

impl fmt::Debug for DeviceProfile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceProfile")
            .field("holding_registers", &self.holding_registers)
            .field("input_registers", &self.input_registers)
            .field("coils", &self.coils)
            .field("discrete_inputs", &self.discrete_inputs)
            .field("accessor", &self.accessor.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> DeviceProfile<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn holding_registers(mut self, values: &'a mut [Word]) -> Self {
        self.holding_registers = Some(Table::Words(values));
        self
    }

    #[must_use]
    pub fn input_registers(mut self, values: &'a mut [Word]) -> Self {
        self.input_registers = Some(Table::Words(values));
        self
    }

    /// Use `count` bit-packed coils.
    ///
    /// `count` is limited to the number of bits in `values`.
    #[must_use]
    pub fn coils(mut self, values: &'a mut [u8], count: usize) -> Self {
        let count = count.min(values.len() * 8);
        self.coils = Some(Table::Bits { values, count });
        self
    }

    /// Use `count` bit-packed discrete inputs.
    #[must_use]
    pub fn discrete_inputs(mut self, values: &'a mut [u8], count: usize) -> Self {
        let count = count.min(values.len() * 8);
        self.discrete_inputs = Some(Table::Bits { values, count });
        self
    }

    /// Protect holding registers against writes from a master.
    ///
    /// A set bit protects the register with the same index.
    #[must_use]
    pub fn protect_holding_registers(mut self, mask: &'a [u8]) -> Self {
        self.protected_registers = Some(mask);
        self
    }

    /// Protect coils against writes from a master.
    #[must_use]
    pub fn protect_coils(mut self, mask: &'a [u8]) -> Self {
        self.protected_coils = Some(mask);
        self
    }

    #[must_use]
    pub fn accessor(mut self, accessor: &'a mut dyn Accessor) -> Self {
        self.accessor = Some(accessor);
        self
    }

    /// Serve `count` units of `data_type` through the [`Accessor`].
    #[must_use]
    pub fn delegate(mut self, data_type: DataType, count: usize) -> Self {
        *self.table_mut(data_type) = Some(Table::Delegated { count });
        self
    }

    const fn table(&self, data_type: DataType) -> Option<&Table<'a>> {
        match data_type {
            DataType::HoldingRegister => self.holding_registers.as_ref(),
            DataType::InputRegister => self.input_registers.as_ref(),
            DataType::Coil => self.coils.as_ref(),
            DataType::DiscreteInput => self.discrete_inputs.as_ref(),
        }
    }

    fn table_mut(&mut self, data_type: DataType) -> &mut Option<Table<'a>> {
        match data_type {
            DataType::HoldingRegister => &mut self.holding_registers,
            DataType::InputRegister => &mut self.input_registers,
            DataType::Coil => &mut self.coils,
            DataType::DiscreteInput => &mut self.discrete_inputs,
        }
    }

    /// Number of units of `data_type`, `None` if there is no source.
    #[must_use]
    pub fn len(&self, data_type: DataType) -> Option<usize> {
        match self.table(data_type)? {
            Table::Delegated { .. } if self.accessor.is_none() => None,
            table => Some(table.len()),
        }
    }

    /// Check that `count` units starting at `index` exist.
    pub(crate) fn check_range(
        &self,
        data_type: DataType,
        index: Address,
        count: usize,
    ) -> Result<(), FrameError> {
        let len = self.len(data_type).ok_or(FrameError::NoSource)?;
        let end = index as usize + count;
        if index as usize >= len || end > len || end > usize::from(u16::MAX) + 1 {
            return Err(FrameError::Range);
        }
        Ok(())
    }

    /// Check `access` to `count` units starting at `index`.
    ///
    /// The range must have been checked before.
    pub(crate) fn check_access(
        &mut self,
        data_type: DataType,
        access: Access,
        index: Address,
        count: usize,
    ) -> Result<(), FrameError> {
        let denied = match access {
            Access::Read => FrameError::NoRead,
            Access::Write => FrameError::NoWrite,
        };
        let indexes = (0..count).map(|offset| index as usize + offset);
        match self.table(data_type) {
            None => Err(FrameError::NoSource),
            Some(Table::Delegated { .. }) => {
                let accessor = self.accessor.as_mut().ok_or(FrameError::NoSource)?;
                for i in indexes {
                    let i = i as Address;
                    let allowed = match access {
                        Access::Read => accessor.can_read(data_type, i),
                        Access::Write => accessor.can_write(data_type, i),
                    };
                    if !allowed {
                        return Err(denied);
                    }
                }
                Ok(())
            }
            Some(_) => {
                let mask = match (access, data_type) {
                    (Access::Write, DataType::HoldingRegister) => self.protected_registers,
                    (Access::Write, DataType::Coil) => self.protected_coils,
                    _ => None,
                };
                if let Some(mask) = mask {
                    if indexes.into_iter().any(|i| get_bit(mask, i) == Some(true)) {
                        return Err(denied);
                    }
                }
                Ok(())
            }
        }
    }

    /// Read a single unit.
    ///
    /// Bits are returned as `0` or `1`.
    pub fn read(&mut self, data_type: DataType, index: Address) -> Result<Word, FrameError> {
        let i = index as usize;
        match self.table(data_type).ok_or(FrameError::NoSource)? {
            Table::Words(values) => values.get(i).copied().ok_or(FrameError::Range),
            Table::Bits { values, count } => {
                if i >= *count {
                    return Err(FrameError::Range);
                }
                get_bit(values, i).map(Word::from).ok_or(FrameError::Range)
            }
            Table::Delegated { count } => {
                if i >= *count {
                    return Err(FrameError::Range);
                }
                let accessor = self.accessor.as_mut().ok_or(FrameError::NoSource)?;
                Ok(accessor.read(data_type, index))
            }
        }
    }

    /// Write a single unit, ignoring write protection.
    ///
    /// Any nonzero value sets a bit.
    pub fn write(&mut self, data_type: DataType, index: Address, value: Word) -> Result<(), FrameError> {
        let i = index as usize;
        let accessor = &mut self.accessor;
        let table = match data_type {
            DataType::HoldingRegister => &mut self.holding_registers,
            DataType::InputRegister => &mut self.input_registers,
            DataType::Coil => &mut self.coils,
            DataType::DiscreteInput => &mut self.discrete_inputs,
        };
        match table.as_mut().ok_or(FrameError::NoSource)? {
            Table::Words(values) => {
                *values.get_mut(i).ok_or(FrameError::Range)? = value;
            }
            Table::Bits { values, count } => {
                if i >= *count {
                    return Err(FrameError::Range);
                }
                set_bit(values, i, value != 0).map_err(|_| FrameError::Range)?;
            }
            Table::Delegated { count } => {
                if i >= *count {
                    return Err(FrameError::Range);
                }
                let accessor = accessor.as_mut().ok_or(FrameError::NoSource)?;
                accessor.write(data_type, index, if data_type.is_bit() { Word::from(value != 0) } else { value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Callbacks {
        registers: [Word; 4],
        writes: usize,
    }

    impl Accessor for Callbacks {
        fn read(&mut self, _: DataType, index: Address) -> Word {
            self.registers[index as usize]
        }

        fn write(&mut self, _: DataType, index: Address, value: Word) {
            self.writes += 1;
            self.registers[index as usize] = value;
        }

        fn can_write(&mut self, _: DataType, index: Address) -> bool {
            index != 3
        }
    }

    #[test]
    fn check_ranges() {
        let mut registers = [0; 10];
        let profile = DeviceProfile::new().holding_registers(&mut registers);
        assert_eq!(profile.check_range(DataType::HoldingRegister, 0, 10), Ok(()));
        assert_eq!(
            profile.check_range(DataType::HoldingRegister, 5, 6),
            Err(FrameError::Range)
        );
        assert_eq!(
            profile.check_range(DataType::HoldingRegister, 10, 0),
            Err(FrameError::Range)
        );
        assert_eq!(
            profile.check_range(DataType::InputRegister, 0, 1),
            Err(FrameError::NoSource)
        );
    }

    #[test]
    fn coil_count_is_limited_by_buffer() {
        let mut coils = [0; 2];
        let profile = DeviceProfile::new().coils(&mut coils, 100);
        assert_eq!(profile.len(DataType::Coil), Some(16));
    }

    #[test]
    fn write_protection() {
        let mut registers = [0; 10];
        let mask = [0b0000_0100];
        let mut profile = DeviceProfile::new()
            .holding_registers(&mut registers)
            .protect_holding_registers(&mask);
        assert_eq!(
            profile.check_access(DataType::HoldingRegister, Access::Write, 0, 2),
            Ok(())
        );
        assert_eq!(
            profile.check_access(DataType::HoldingRegister, Access::Write, 1, 2),
            Err(FrameError::NoWrite)
        );
        assert_eq!(
            profile.check_access(DataType::HoldingRegister, Access::Read, 1, 2),
            Ok(())
        );
        // beyond the mask nothing is protected
        assert_eq!(
            profile.check_access(DataType::HoldingRegister, Access::Write, 8, 2),
            Ok(())
        );
    }

    #[test]
    fn read_and_write_bits() {
        let mut inputs = [0b0000_0010];
        let mut profile = DeviceProfile::new().discrete_inputs(&mut inputs, 5);
        assert_eq!(profile.read(DataType::DiscreteInput, 1), Ok(1));
        assert_eq!(profile.read(DataType::DiscreteInput, 5), Err(FrameError::Range));
        profile.write(DataType::DiscreteInput, 4, 0xFF00).unwrap();
        assert_eq!(profile.read(DataType::DiscreteInput, 4), Ok(1));
        assert_eq!(
            profile.write(DataType::Coil, 0, 1),
            Err(FrameError::NoSource)
        );
    }

    #[test]
    fn delegated_access() {
        let mut callbacks = Callbacks {
            registers: [1, 2, 3, 4],
            writes: 0,
        };
        {
            let mut profile = DeviceProfile::new()
                .accessor(&mut callbacks)
                .delegate(DataType::HoldingRegister, 4);
            assert_eq!(profile.read(DataType::HoldingRegister, 2), Ok(3));
            assert_eq!(
                profile.check_access(DataType::HoldingRegister, Access::Write, 2, 2),
                Err(FrameError::NoWrite)
            );
            profile.write(DataType::HoldingRegister, 0, 0xABCD).unwrap();
        }
        assert_eq!(callbacks.registers[0], 0xABCD);
        assert_eq!(callbacks.writes, 1);
    }

    #[test]
    fn delegation_without_accessor() {
        let profile = DeviceProfile::new().delegate(DataType::Coil, 8);
        assert_eq!(profile.len(DataType::Coil), None);
        assert_eq!(
            profile.check_range(DataType::Coil, 0, 1),
            Err(FrameError::NoSource)
        );
    }
}
