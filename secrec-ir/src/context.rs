//! The process-scoped interning context.
//!
//! The `Context` owns the string table and the constant uniquing map. It is
//! mutated only while the code generator emits intermediate code; during
//! analyses it is read-only.

use crate::ir::constant::{ConstantValue, FloatConstant, IntConstant};
use crate::ir::symbol::{SymbolData, SymbolTable};
use crate::ir::types::{DataType, TypeNonVoid};
use crate::ir::Sym;
use crate::string_table::{StringId, StringTable};
use std::collections::BTreeMap;

/// Owner of the string table and the constant uniquing map.
///
/// Constants are symbols like any other, stored in the symbol table; the
/// context only remembers which `ConstantValue` already has a symbol so that
/// requesting the same constant twice returns the same `Sym`.
#[derive(Debug)]
pub struct Context {
    string_table: StringTable,
    constants: BTreeMap<ConstantValue, Sym>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            string_table: StringTable::new(),
            constants: BTreeMap::new(),
        }
    }

    /// Intern a string.
    pub fn intern(&mut self, s: &str) -> StringId {
        self.string_table.intern(s)
    }

    /// Look up an interned string.
    pub fn str(&self, id: StringId) -> &str {
        self.string_table.get(id)
    }

    /// Shared access to the string table.
    pub fn string_table(&self) -> &StringTable {
        &self.string_table
    }

    fn get_or_insert(&mut self, symbols: &mut SymbolTable, value: ConstantValue) -> Sym {
        if let Some(&sym) = self.constants.get(&value) {
            return sym;
        }
        let ty = TypeNonVoid::public(value.data_type());
        let sym = symbols.add(SymbolData::Constant { ty, value });
        self.constants.insert(value, sym);
        sym
    }

    /// The uniqued boolean constant `value`.
    pub fn bool_constant(&mut self, symbols: &mut SymbolTable, value: bool) -> Sym {
        self.get_or_insert(symbols, ConstantValue::Bool(value))
    }

    /// The uniqued numeric constant of integer type `ty` with the given bits.
    pub fn int_constant(&mut self, symbols: &mut SymbolTable, ty: DataType, value: u64) -> Sym {
        debug_assert!(ty.is_numeric() && !ty.is_float());
        let c = IntConstant::new(ty.width_in_bits() as u8, ty.is_signed(), value);
        self.get_or_insert(symbols, ConstantValue::Int(c))
    }

    /// The uniqued 32-bit float constant.
    pub fn float32_constant(&mut self, symbols: &mut SymbolTable, value: f32) -> Sym {
        self.get_or_insert(symbols, ConstantValue::Float(FloatConstant::from_f32(value)))
    }

    /// The uniqued 64-bit float constant.
    pub fn float64_constant(&mut self, symbols: &mut SymbolTable, value: f64) -> Sym {
        self.get_or_insert(symbols, ConstantValue::Float(FloatConstant::from_f64(value)))
    }

    /// The uniqued string constant, interning its payload.
    pub fn string_constant(&mut self, symbols: &mut SymbolTable, value: &str) -> Sym {
        let id = self.string_table.intern(value);
        self.get_or_insert(symbols, ConstantValue::Str(id))
    }

    /// The zero-equivalent constant of `ty`: `false`, `""`, `0` or `0.0`.
    pub fn default_constant(&mut self, symbols: &mut SymbolTable, ty: DataType) -> Sym {
        match ty {
            DataType::Bool => self.bool_constant(symbols, false),
            DataType::String => self.string_constant(symbols, ""),
            DataType::Float32 => self.float32_constant(symbols, 0.0),
            DataType::Float64 => self.float64_constant(symbols, 0.0),
            _ => self.int_constant(symbols, ty, 0),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_uniqued() {
        let mut cx = Context::new();
        let mut syms = SymbolTable::new();
        let a = cx.int_constant(&mut syms, DataType::Int64, 42);
        let b = cx.int_constant(&mut syms, DataType::Int64, 42);
        assert_eq!(a, b);

        // Same bits, different width or signedness: different constants.
        let c = cx.int_constant(&mut syms, DataType::Int32, 42);
        let d = cx.int_constant(&mut syms, DataType::Uint64, 42);
        assert_ne!(a, c);
        assert_ne!(a, d);

        let s1 = cx.string_constant(&mut syms, "main");
        let s2 = cx.string_constant(&mut syms, "main");
        assert_eq!(s1, s2);

        let z = cx.default_constant(&mut syms, DataType::Uint8);
        let z2 = cx.int_constant(&mut syms, DataType::Uint8, 0);
        assert_eq!(z, z2);
    }

    #[test]
    fn float_constants_unique_by_bits() {
        let mut cx = Context::new();
        let mut syms = SymbolTable::new();
        let a = cx.float64_constant(&mut syms, 1.5);
        let b = cx.float64_constant(&mut syms, 1.5);
        let c = cx.float32_constant(&mut syms, 1.5);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
