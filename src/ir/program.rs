//! Whole programs: globals plus functions.

use crate::ir::{Constant, Function, Type};

/// A program-level integer variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    name: String,
    ty: Type,
    initializer: Constant,
    constant: bool,
}

impl Global {
    /// Creates a mutable global with the given initial value.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: Type, initial: i64) -> Self {
        Self {
            name: name.into(),
            ty,
            initializer: Constant::new(ty, initial),
            constant: false,
        }
    }

    /// Returns the global name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value type.
    #[must_use]
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Returns the initial value.
    #[must_use]
    pub fn initializer(&self) -> Constant {
        self.initializer
    }

    /// Replaces the initial value.
    pub fn set_initializer(&mut self, value: i64) {
        self.initializer = Constant::new(self.ty, value);
    }

    /// Returns `true` if the global can never be written.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// Marks the global read-only (or writable again).
    pub fn set_constant(&mut self, constant: bool) {
        self.constant = constant;
    }
}

/// A complete program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    name: String,
    globals: Vec<Global>,
    functions: Vec<Function>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Returns the program name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the globals in definition order.
    #[must_use]
    pub fn globals(&self) -> &[Global] {
        &self.globals
    }

    /// Looks up a global by name.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Looks up a global by name for editing.
    pub fn global_mut(&mut self, name: &str) -> Option<&mut Global> {
        self.globals.iter_mut().find(|g| g.name == name)
    }

    /// Appends a global.
    pub fn add_global(&mut self, global: Global) {
        self.globals.push(global);
    }

    /// Removes a global by name.
    ///
    /// # Returns
    ///
    /// The removed global, if it existed.
    pub fn remove_global(&mut self, name: &str) -> Option<Global> {
        let pos = self.globals.iter().position(|g| g.name == name)?;
        Some(self.globals.remove(pos))
    }

    /// Returns the functions in definition order.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Returns the functions for editing.
    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// Looks up a function by name for editing.
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name() == name)
    }

    /// Appends a function.
    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    /// Removes a function by name.
    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        let pos = self.functions.iter().position(|f| f.name() == name)?;
        Some(self.functions.remove(pos))
    }
}
