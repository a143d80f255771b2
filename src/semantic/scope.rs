//! Ámbitos léxicos y símbolos.
//!
//! Todos los ámbitos y símbolos de un programa viven en arenas dentro
//! de [`SymbolTable`] y se direccionan por [`ScopeId`] y [`SymbolId`].
//! Los ámbitos forman un árbol con raíz en el ámbito global. Una vez
//! que la construcción de la tabla concluye, ni los ámbitos ni los
//! símbolos cambian.

use std::collections::HashMap;

use super::Type;
use crate::ast::{Identifier, NodeId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

/// Un nombre declarado junto con su tipo.
#[derive(Debug, Clone)]
pub enum Symbol {
    Variable { name: Identifier, typ: Type },
    Function(FunctionSymbol),
}

#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    pub name: Identifier,
    pub returns: Type,

    /// Símbolos de parámetros, en orden de declaración.
    pub parameters: Vec<SymbolId>,
}

impl Symbol {
    pub fn variable(name: Identifier, typ: Type) -> Self {
        Symbol::Variable { name, typ }
    }

    pub fn function(name: Identifier, returns: Type) -> Self {
        Symbol::Function(FunctionSymbol {
            name,
            returns,
            parameters: Vec::new(),
        })
    }

    pub fn name(&self) -> &Identifier {
        match self {
            Symbol::Variable { name, .. } => name,
            Symbol::Function(function) => &function.name,
        }
    }

    /// Tipo de la variable, o tipo de retorno en el caso de una función.
    pub fn typ(&self) -> Type {
        match self {
            Symbol::Variable { typ, .. } => *typ,
            Symbol::Function(function) => function.returns,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionSymbol> {
        match self {
            Symbol::Function(function) => Some(function),
            Symbol::Variable { .. } => None,
        }
    }

    pub fn is_function(&self) -> bool {
        self.as_function().is_some()
    }
}

#[derive(Debug)]
pub struct Scope {
    parent: Option<ScopeId>,
    function: Option<SymbolId>,
    children: Vec<ScopeId>,
    order: Vec<SymbolId>,
    names: HashMap<Identifier, SymbolId>,
}

impl Scope {
    /// Ámbito que encierra a este. Solo el ámbito global carece de uno.
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Función a la que pertenece este ámbito, si alguna.
    pub fn function(&self) -> Option<SymbolId> {
        self.function
    }

    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    /// Símbolos en orden de inserción.
    pub fn symbols(&self) -> &[SymbolId] {
        &self.order
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Crea una tabla que contiene únicamente el ámbito global.
    pub fn new() -> Self {
        let global = Scope {
            parent: None,
            function: None,
            children: Vec::new(),
            order: Vec::new(),
            names: HashMap::new(),
        };

        SymbolTable {
            scopes: vec![global],
            symbols: Vec::new(),
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, ScopeId(id): ScopeId) -> &Scope {
        &self.scopes[id as usize]
    }

    pub fn symbol(&self, SymbolId(id): SymbolId) -> &Symbol {
        &self.symbols[id as usize]
    }

    /// Función a la que pertenece un ámbito, si alguna.
    pub fn function_of(&self, scope: ScopeId) -> Option<(SymbolId, &FunctionSymbol)> {
        let id = self.scope(scope).function?;
        self.symbol(id).as_function().map(|function| (id, function))
    }

    /// Abre un ámbito hijo con la función indicada.
    pub fn open(&mut self, parent: ScopeId, function: Option<SymbolId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            function,
            children: Vec::new(),
            order: Vec::new(),
            names: HashMap::new(),
        });

        self.scopes[parent.0 as usize].children.push(id);
        id
    }

    /// Abre un ámbito de bloque, el cual hereda la función de su padre.
    pub fn open_block(&mut self, parent: ScopeId) -> ScopeId {
        let function = self.scope(parent).function;
        self.open(parent, function)
    }

    /// Inserta un símbolo si el nombre no existe ya en este ámbito.
    ///
    /// Ante un conflicto se conserva el enlace original y se retorna `None`.
    pub fn define(&mut self, scope: ScopeId, symbol: Symbol) -> Option<SymbolId> {
        let id = SymbolId(self.symbols.len() as u32);
        let target = &mut self.scopes[scope.0 as usize];

        if target.names.contains_key(symbol.name()) {
            return None;
        }

        target.names.insert(symbol.name().clone(), id);
        target.order.push(id);
        self.symbols.push(symbol);

        Some(id)
    }

    /// Agrega un parámetro ya definido a la lista de una función.
    pub(super) fn push_parameter(&mut self, function: SymbolId, parameter: SymbolId) {
        if let Symbol::Function(function) = &mut self.symbols[function.0 as usize] {
            function.parameters.push(parameter);
        }
    }

    /// Busca en este ámbito y luego en cada ámbito que lo encierra.
    pub fn resolve(&self, scope: ScopeId, name: &Identifier) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(scope) = current {
            if let Some(id) = self.local_resolve(scope, name) {
                return Some(id);
            }

            current = self.scope(scope).parent;
        }

        None
    }

    /// Busca únicamente en este ámbito.
    pub fn local_resolve(&self, scope: ScopeId, name: &Identifier) -> Option<SymbolId> {
        self.scope(scope).names.get(name).copied()
    }

    /// Busca en este ámbito y luego entre los parámetros de su función.
    pub fn param_local_resolve(&self, scope: ScopeId, name: &Identifier) -> Option<SymbolId> {
        self.local_resolve(scope, name).or_else(|| {
            let (_, function) = self.function_of(scope)?;
            function
                .parameters
                .iter()
                .copied()
                .find(|&parameter| self.symbol(parameter).name() == name)
        })
    }
}

/// Asociación de nodos del árbol al ámbito activo al entrar en ellos.
#[derive(Debug)]
pub struct ScopeMap {
    scopes: Vec<Option<ScopeId>>,
}

impl ScopeMap {
    pub fn new(nodes: usize) -> Self {
        ScopeMap {
            scopes: vec![None; nodes],
        }
    }

    pub(super) fn record(&mut self, node: NodeId, scope: ScopeId) {
        let index = node.index();
        if index >= self.scopes.len() {
            self.scopes.resize(index + 1, None);
        }

        self.scopes[index] = Some(scope);
    }

    pub fn get(&self, node: NodeId) -> Option<ScopeId> {
        self.scopes.get(node.index()).copied().flatten()
    }

    /// Como [`ScopeMap::get()`], para nodos que siempre se registran.
    ///
    /// # Panics
    /// Si el nodo no tiene ámbito registrado, lo cual indica un árbol
    /// que no fue procesado por la construcción de la tabla de símbolos.
    pub fn scope_of(&self, node: NodeId) -> ScopeId {
        match self.get(node) {
            Some(scope) => scope,
            None => panic!("node {:?} has no recorded scope", node),
        }
    }
}
