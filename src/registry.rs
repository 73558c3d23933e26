// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Function code dispatch.
//!
//! Overrides registered at runtime take precedence over the built-in
//! handlers. An override without a handler disables the function code.

use core::fmt;

use crate::{error::Error, frame::FunctionCode};

/// Maximum number of overridden function codes.
pub const MAX_OVERRIDES: usize = 16;

/// Result of a handler lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<H> {
    /// Neither an override nor a built-in handler exists.
    Unsupported,
    /// The function code was explicitly disabled.
    Disabled,
    /// The handler to run for the function code.
    Handler(H),
}

/// Handlers keyed by function code.
pub struct Registry<H: Copy> {
    overrides: heapless::Vec<(u8, Option<H>), MAX_OVERRIDES>,
    builtin: fn(FunctionCode) -> Option<H>,
}

impl<H: Copy> Registry<H> {
    /// Create a registry falling back to `builtin` for codes without override.
    #[must_use]
    pub const fn new(builtin: fn(FunctionCode) -> Option<H>) -> Self {
        Self {
            overrides: heapless::Vec::new(),
            builtin,
        }
    }

    /// Override the handler of `code`.
    ///
    /// `None` disables the function code, even if a built-in handler exists.
    pub fn set(&mut self, code: u8, handler: Option<H>) -> Result<(), Error> {
        if let Some(entry) = self.overrides.iter_mut().find(|(c, _)| *c == code) {
            entry.1 = handler;
            return Ok(());
        }
        self.overrides
            .push((code, handler))
            .map_err(|_| Error::Alloc)
    }

    /// Remove the override of `code` and restore the built-in behavior.
    pub fn remove(&mut self, code: u8) {
        if let Some(pos) = self.overrides.iter().position(|(c, _)| *c == code) {
            self.overrides.swap_remove(pos);
        }
    }

    #[must_use]
    pub fn lookup(&self, code: u8) -> Lookup<H> {
        match self.overrides.iter().find(|(c, _)| *c == code) {
            Some((_, Some(handler))) => Lookup::Handler(*handler),
            Some((_, None)) => Lookup::Disabled,
            None => (self.builtin)(FunctionCode::new(code))
                .map_or(Lookup::Unsupported, Lookup::Handler),
        }
    }
}

impl<H: Copy> fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (code, handler) in &self.overrides {
            list.entry(&(code, handler.is_some()));
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin(code: FunctionCode) -> Option<u8> {
        match code {
            FunctionCode::ReadCoils => Some(1),
            FunctionCode::WriteSingleRegister => Some(6),
            _ => None,
        }
    }

    #[test]
    fn builtin_handlers() {
        let registry = Registry::new(builtin);
        assert_eq!(registry.lookup(0x01), Lookup::Handler(1));
        assert_eq!(registry.lookup(0x06), Lookup::Handler(6));
        assert_eq!(registry.lookup(0x41), Lookup::Unsupported);
    }

    #[test]
    fn overrides_take_precedence() {
        let mut registry = Registry::new(builtin);
        registry.set(0x01, Some(42)).unwrap();
        registry.set(0x41, Some(65)).unwrap();
        assert_eq!(registry.lookup(0x01), Lookup::Handler(42));
        assert_eq!(registry.lookup(0x41), Lookup::Handler(65));

        registry.set(0x01, Some(43)).unwrap();
        assert_eq!(registry.lookup(0x01), Lookup::Handler(43));
    }

    #[test]
    fn disable_and_restore() {
        let mut registry = Registry::new(builtin);
        registry.set(0x06, None).unwrap();
        assert_eq!(registry.lookup(0x06), Lookup::Disabled);
        registry.remove(0x06);
        assert_eq!(registry.lookup(0x06), Lookup::Handler(6));
    }

    #[test]
    fn limited_number_of_overrides() {
        let mut registry = Registry::new(builtin);
        for code in 0..MAX_OVERRIDES as u8 {
            registry.set(0x40 + code, None).unwrap();
        }
        assert_eq!(registry.set(0x70, None), Err(Error::Alloc));
        // replacing an existing entry needs no extra room
        assert_eq!(registry.set(0x40, Some(1)), Ok(()));
    }
}
