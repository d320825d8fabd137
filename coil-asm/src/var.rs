//! Variables and the scope stack they live in.

use std::collections::HashMap;

use coil_types::bytes::{self, Endian};
use coil_types::{Error, Result, TypeWord};

use crate::instruction::Instruction;
use crate::opcode::Opcode;
use crate::operand::Operand;

/// A declared variable.
///
/// Ids are dense and start at 1; id 0 is reserved. The wire form is
/// `id:u16, type:u16, scope_level:u32, init_len:u32, init:bytes`,
/// little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variable {
    id: u16,
    ty: TypeWord,
    scope_level: u32,
    init: Vec<u8>,
}

impl Variable {
    /// A variable with an optional initial value. The scope level is assigned
    /// when the variable enters a [`ScopeManager`].
    pub fn new(id: u16, ty: TypeWord, init: Vec<u8>) -> Self {
        Variable {
            id,
            ty,
            scope_level: 0,
            init,
        }
    }

    /// The variable id.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The declared type.
    pub fn ty(&self) -> TypeWord {
        self.ty
    }

    /// The scope depth the variable was declared at; 0 is global.
    pub fn scope_level(&self) -> u32 {
        self.scope_level
    }

    /// The initial-value bytes, empty when uninitialised.
    pub fn initial_value(&self) -> &[u8] {
        &self.init
    }

    /// Whether an initial value is present.
    pub fn is_initialized(&self) -> bool {
        !self.init.is_empty()
    }

    /// Lower this variable to its canonical `VAR` declaration instruction:
    /// the id, the type word as an immediate, and the initializer when one is
    /// present.
    pub fn declaration(&self) -> Instruction {
        let mut operands = vec![
            Operand::variable(self.id),
            Operand::immediate(self.ty.raw()),
        ];
        if self.is_initialized() {
            operands.push(Operand::Immediate {
                ty: self.ty,
                bytes: self.init.clone(),
            });
        }
        Instruction::new(Opcode::VAR, operands)
    }

    /// Append the wire encoding to `buf`.
    pub fn append(&self, buf: &mut Vec<u8>) {
        bytes::append_u16(buf, self.id, Endian::Little);
        bytes::append_u16(buf, self.ty.raw(), Endian::Little);
        bytes::append_u32(buf, self.scope_level, Endian::Little);
        bytes::append_u32(buf, self.init.len() as u32, Endian::Little);
        buf.extend_from_slice(&self.init);
    }

    /// The wire encoding as a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12 + self.init.len());
        self.append(&mut buf);
        buf
    }

    /// Decode one variable at `*offset`, advancing it past the bytes
    /// consumed.
    pub fn decode(buf: &[u8], offset: &mut usize) -> Result<Self> {
        let truncated = || Error::InvalidFormat("truncated variable".to_string());

        let id = bytes::read_u16(buf, *offset, Endian::Little).map_err(|_| truncated())?;
        let ty = bytes::read_u16(buf, *offset + 2, Endian::Little).map_err(|_| truncated())?;
        let scope_level =
            bytes::read_u32(buf, *offset + 4, Endian::Little).map_err(|_| truncated())?;
        let init_len =
            bytes::read_u32(buf, *offset + 8, Endian::Little).map_err(|_| truncated())? as usize;

        let start = *offset + 12;
        let init = buf
            .get(start..start + init_len)
            .ok_or_else(truncated)?
            .to_vec();
        *offset = start + init_len;

        Ok(Variable {
            id,
            ty: TypeWord::from_raw(ty),
            scope_level,
            init,
        })
    }
}

/// A stack of variable scopes.
///
/// Level 0 is the global scope and cannot be left. Lookup walks from the
/// innermost scope outwards.
#[derive(Debug, Clone)]
pub struct ScopeManager {
    scopes: Vec<HashMap<u16, Variable>>,
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeManager {
    /// A manager holding only the global scope.
    pub fn new() -> Self {
        ScopeManager {
            scopes: vec![HashMap::new()],
        }
    }

    /// Push a fresh scope level.
    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope, dropping its variables.
    ///
    /// Fails with [`Error::BadState`] on the global scope.
    pub fn leave_scope(&mut self) -> Result<()> {
        if self.scopes.len() == 1 {
            return Err(Error::BadState("cannot leave the global scope".to_string()));
        }
        self.scopes.pop();
        Ok(())
    }

    /// Current scope depth; 0 is global.
    pub fn current_level(&self) -> u32 {
        (self.scopes.len() - 1) as u32
    }

    /// Add `var` to the current scope, stamping it with the current level.
    /// A variable with the same id in the same scope is replaced.
    pub fn add_variable(&mut self, mut var: Variable) {
        var.scope_level = self.current_level();
        let scope = self
            .scopes
            .last_mut()
            .expect("the global scope always exists");
        scope.insert(var.id, var);
    }

    /// Find a variable by id, innermost scope first.
    pub fn find(&self, id: u16) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|scope| scope.get(&id))
    }

    /// The variables of the current scope, ordered by id.
    pub fn current_scope_variables(&self) -> Vec<Variable> {
        let scope = self.scopes.last().expect("the global scope always exists");
        let mut vars: Vec<Variable> = scope.values().cloned().collect();
        vars.sort_by_key(Variable::id);
        vars
    }

    /// Every live variable, outermost scope first, ordered by id within a
    /// scope.
    pub fn all_variables(&self) -> Vec<Variable> {
        let mut result = Vec::new();
        for scope in &self.scopes {
            let mut vars: Vec<Variable> = scope.values().cloned().collect();
            vars.sort_by_key(Variable::id);
            result.append(&mut vars);
        }
        result
    }

    /// Drop every scope except a fresh global one.
    pub fn clear(&mut self) {
        self.scopes.clear();
        self.scopes.push(HashMap::new());
    }
}

/// Variable tracking for a whole module: dense id allocation over a scope
/// stack.
#[derive(Debug, Clone)]
pub struct VariableManager {
    scopes: ScopeManager,
    next_id: u16,
}

impl Default for VariableManager {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableManager {
    /// A manager with no variables; the first id handed out is 1.
    pub fn new() -> Self {
        VariableManager {
            scopes: ScopeManager::new(),
            next_id: 1,
        }
    }

    /// Declare a variable in the current scope and return its id.
    pub fn create_variable(&mut self, ty: TypeWord, init: Vec<u8>) -> u16 {
        let id = self.next_id;
        self.next_id += 1;
        self.scopes.add_variable(Variable::new(id, ty, init));
        id
    }

    /// Find a variable by id.
    pub fn get(&self, id: u16) -> Option<&Variable> {
        self.scopes.find(id)
    }

    /// Whether a variable with `id` is live.
    pub fn exists(&self, id: u16) -> bool {
        self.get(id).is_some()
    }

    /// Push a fresh scope level.
    pub fn enter_scope(&mut self) {
        self.scopes.enter_scope();
    }

    /// Pop the innermost scope.
    pub fn leave_scope(&mut self) -> Result<()> {
        self.scopes.leave_scope()
    }

    /// Current scope depth.
    pub fn current_level(&self) -> u32 {
        self.scopes.current_level()
    }

    /// Every live variable.
    pub fn all_variables(&self) -> Vec<Variable> {
        self.scopes.all_variables()
    }

    /// Drop all variables and scopes; id assignment restarts at 1.
    pub fn clear(&mut self) {
        self.scopes.clear();
        self.next_id = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coil_types::ty;

    #[test]
    fn variable_round_trip() {
        let mut var = Variable::new(3, ty::INT64, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        var.scope_level = 2;

        let encoded = var.encode();
        let mut offset = 0;
        let decoded = Variable::decode(&encoded, &mut offset).unwrap();
        assert_eq!(decoded, var);
        assert_eq!(offset, encoded.len());
    }

    #[test]
    fn uninitialised_variable_round_trip() {
        let var = Variable::new(1, ty::FP32, vec![]);
        assert!(!var.is_initialized());

        let encoded = var.encode();
        assert_eq!(encoded.len(), 12);

        let mut offset = 0;
        assert_eq!(Variable::decode(&encoded, &mut offset).unwrap(), var);
    }

    #[test]
    fn truncated_initial_value_fails() {
        let var = Variable::new(1, ty::INT32, vec![42, 0, 0, 0]);
        let mut encoded = var.encode();
        encoded.pop();

        let mut offset = 0;
        assert!(Variable::decode(&encoded, &mut offset).is_err());
    }

    #[test]
    fn declaration_lowers_to_a_valid_var_instruction() {
        let var = Variable::new(7, ty::INT32, vec![42, 0, 0, 0]);
        let decl = var.declaration();
        assert_eq!(decl.opcode(), Opcode::VAR);
        assert_eq!(decl.operands().len(), 3);
        assert!(decl.validate().is_ok());

        let bare = Variable::new(8, ty::INT32, vec![]);
        assert_eq!(bare.declaration().operands().len(), 2);
        assert!(bare.declaration().validate().is_ok());
    }

    #[test]
    fn lookup_walks_scopes_innermost_first() {
        let mut scopes = ScopeManager::new();
        scopes.add_variable(Variable::new(1, ty::INT32, vec![]));

        scopes.enter_scope();
        scopes.add_variable(Variable::new(1, ty::FP64, vec![]));
        scopes.add_variable(Variable::new(2, ty::INT8, vec![]));

        assert_eq!(scopes.find(1).unwrap().ty(), ty::FP64);
        assert_eq!(scopes.find(2).unwrap().scope_level(), 1);

        scopes.leave_scope().unwrap();
        assert_eq!(scopes.find(1).unwrap().ty(), ty::INT32);
        assert!(scopes.find(2).is_none());
    }

    #[test]
    fn global_scope_cannot_be_left() {
        let mut scopes = ScopeManager::new();
        assert!(matches!(scopes.leave_scope(), Err(Error::BadState(_))));

        scopes.enter_scope();
        assert_eq!(scopes.current_level(), 1);
        scopes.leave_scope().unwrap();
        assert_eq!(scopes.current_level(), 0);
    }

    #[test]
    fn manager_allocates_dense_ids_from_one() {
        let mut vars = VariableManager::new();
        assert_eq!(vars.create_variable(ty::INT32, vec![]), 1);
        assert_eq!(vars.create_variable(ty::INT64, vec![]), 2);

        vars.enter_scope();
        assert_eq!(vars.create_variable(ty::FP32, vec![]), 3);
        assert!(vars.exists(3));
        vars.leave_scope().unwrap();
        assert!(!vars.exists(3));
        assert!(vars.exists(1));

        vars.clear();
        assert!(!vars.exists(1));
        assert_eq!(vars.create_variable(ty::INT32, vec![]), 1);
    }
}
