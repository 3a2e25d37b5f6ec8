//! Symbols: the named operands of the intermediate code.
//!
//! Every operand of an instruction is a symbol owned by the
//! [`SymbolTable`]. Symbols are tagged by kind; the analyses only ever
//! distinguish variables (which have a scope and a type) from everything
//! else, but the code generator also stores procedures, labels, constants,
//! protection kinds, domains and dimensionality symbols here.
//!
//! The table is scope chained: names declared between a
//! [`SymbolTable::begin_scope`]/[`SymbolTable::end_scope`] pair shadow outer
//! declarations and become unnameable when the scope ends. The symbols
//! themselves live as long as the table.

use crate::ir::constant::ConstantValue;
use crate::ir::entities::{Inst, Sym};
use crate::ir::types::TypeNonVoid;
use crate::fx::FxHashMap;
use crate::string_table::StringId;
use secrec_entity::packed_option::PackedOption;
use secrec_entity::PrimaryMap;

/// Scope of a variable symbol.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Scope {
    /// Visible to every procedure; propagated over interprocedural edges.
    Global,
    /// Local to the defining procedure.
    Local,
}

/// The payload of a symbol.
#[derive(Clone, Debug)]
pub enum SymbolData {
    /// A procedure name. `first_imop` is set by the emitter to the leading
    /// COMMENT instruction of the procedure body.
    Procedure {
        /// Interned procedure name.
        name: StringId,
        /// First instruction of the procedure body, once emitted.
        first_imop: PackedOption<Inst>,
    },
    /// An uninstantiated procedure template.
    Template {
        /// Interned template name.
        name: StringId,
    },
    /// A uniqued constant; see [`crate::Context`].
    Constant {
        /// Type of the constant.
        ty: TypeNonVoid,
        /// The constant payload.
        value: ConstantValue,
    },
    /// A jump label. `target` is the instruction the label marks.
    Label {
        /// Labelled instruction, once placed.
        target: PackedOption<Inst>,
    },
    /// A program variable.
    Variable {
        /// Interned variable name.
        name: StringId,
        /// Complete type of the variable.
        ty: TypeNonVoid,
        /// Global or procedure-local.
        scope: Scope,
        /// Symbol holding the total element count, for arrays.
        size: PackedOption<Sym>,
        /// Symbols holding the extent of each dimension.
        dims: Vec<Sym>,
    },
    /// A protection kind.
    Kind {
        /// Interned kind name.
        name: StringId,
    },
    /// A protection domain of some kind.
    Domain {
        /// Interned domain name.
        name: StringId,
        /// The kind this domain belongs to.
        kind: PackedOption<Sym>,
    },
    /// A dimensionality parameter of a template.
    Dimensionality {
        /// Interned name.
        name: StringId,
    },
}

impl SymbolData {
    /// The interned name of this symbol, when it has one.
    pub fn name(&self) -> Option<StringId> {
        match *self {
            Self::Procedure { name, .. }
            | Self::Template { name }
            | Self::Variable { name, .. }
            | Self::Kind { name }
            | Self::Domain { name, .. }
            | Self::Dimensionality { name } => Some(name),
            Self::Constant { .. } | Self::Label { .. } => None,
        }
    }
}

/// A scope-chained table owning all symbols of a translation unit.
#[derive(Debug)]
pub struct SymbolTable {
    syms: PrimaryMap<Sym, SymbolData>,
    scopes: Vec<FxHashMap<StringId, Sym>>,
}

impl SymbolTable {
    /// Create a table with a single global scope.
    pub fn new() -> Self {
        Self {
            syms: PrimaryMap::new(),
            scopes: vec![FxHashMap::default()],
        }
    }

    /// Open a nested scope.
    pub fn begin_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// Close the innermost scope. Symbols declared in it survive but can no
    /// longer be found by name.
    pub fn end_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot close the global scope");
        self.scopes.pop();
    }

    /// Append an anonymous symbol.
    pub fn add(&mut self, data: SymbolData) -> Sym {
        self.syms.push(data)
    }

    /// Append a symbol and bind its name in the innermost scope.
    pub fn declare(&mut self, data: SymbolData) -> Sym {
        let name = data.name();
        let sym = self.syms.push(data);
        if let Some(name) = name {
            self.scopes
                .last_mut()
                .expect("scope chain is never empty")
                .insert(name, sym);
        }
        sym
    }

    /// Find a symbol by name, walking the scope chain from the innermost
    /// scope outwards.
    pub fn find(&self, name: StringId) -> Option<Sym> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).copied())
    }

    /// Payload of `sym`.
    pub fn data(&self, sym: Sym) -> &SymbolData {
        &self.syms[sym]
    }

    /// Mutable payload of `sym`.
    pub fn data_mut(&mut self, sym: Sym) -> &mut SymbolData {
        &mut self.syms[sym]
    }

    /// Number of symbols in the table.
    pub fn len(&self) -> usize {
        self.syms.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }

    /// Iterate over all symbols in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (Sym, &SymbolData)> {
        self.syms.iter()
    }

    /// Is `sym` a program variable?
    pub fn is_variable(&self, sym: Sym) -> bool {
        matches!(&self.syms[sym], SymbolData::Variable { .. })
    }

    /// Is `sym` a variable with global scope? Only these are propagated over
    /// the interprocedural `Call` and `Ret` edges.
    pub fn is_global(&self, sym: Sym) -> bool {
        matches!(
            &self.syms[sym],
            SymbolData::Variable {
                scope: Scope::Global,
                ..
            }
        )
    }

    /// Does `sym` denote an array?
    pub fn is_array(&self, sym: Sym) -> bool {
        match &self.syms[sym] {
            SymbolData::Variable { ty, .. } | SymbolData::Constant { ty, .. } => ty.is_array(),
            _ => false,
        }
    }

    /// The labelled instruction of a label symbol.
    pub fn label_target(&self, sym: Sym) -> Option<Inst> {
        match &self.syms[sym] {
            SymbolData::Label { target } => target.expand(),
            _ => None,
        }
    }

    /// Mark `label` as labelling `target`.
    pub fn set_label_target(&mut self, label: Sym, target: Inst) {
        match &mut self.syms[label] {
            SymbolData::Label { target: slot } => *slot = target.into(),
            _ => panic!("set_label_target on a non-label symbol"),
        }
    }

    /// The first instruction of a procedure symbol's body.
    pub fn proc_first_imop(&self, sym: Sym) -> Option<Inst> {
        match &self.syms[sym] {
            SymbolData::Procedure { first_imop, .. } => first_imop.expand(),
            _ => None,
        }
    }

    /// Record the first instruction of the body of procedure `sym`.
    pub fn set_proc_first_imop(&mut self, sym: Sym, first: Inst) {
        match &mut self.syms[sym] {
            SymbolData::Procedure { first_imop, .. } => *first_imop = first.into(),
            _ => panic!("set_proc_first_imop on a non-procedure symbol"),
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::DataType;
    use crate::string_table::StringTable;

    fn variable(name: StringId) -> SymbolData {
        SymbolData::Variable {
            name,
            ty: TypeNonVoid::public(DataType::Int64),
            scope: Scope::Local,
            size: None.into(),
            dims: Vec::new(),
        }
    }

    #[test]
    fn scope_chain_shadows() {
        let mut strings = StringTable::new();
        let x = strings.intern("x");

        let mut table = SymbolTable::new();
        let outer = table.declare(variable(x));
        assert_eq!(table.find(x), Some(outer));

        table.begin_scope();
        let inner = table.declare(variable(x));
        assert_eq!(table.find(x), Some(inner));

        table.end_scope();
        assert_eq!(table.find(x), Some(outer));
        // Both symbols still resolve to data.
        assert!(table.is_variable(inner));
    }

    #[test]
    fn variable_queries() {
        let mut strings = StringTable::new();
        let g = strings.intern("g");
        let mut table = SymbolTable::new();
        let sym = table.declare(SymbolData::Variable {
            name: g,
            ty: TypeNonVoid::public_dim(DataType::Uint8, 1),
            scope: Scope::Global,
            size: None.into(),
            dims: Vec::new(),
        });
        assert!(table.is_variable(sym));
        assert!(table.is_global(sym));
        assert!(table.is_array(sym));
    }
}
