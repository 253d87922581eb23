//! Module registry for loading and resolving module graphs.
//!
//! `RegistryBuilder` collects module descriptions and lookup tables from JSON
//! strings, files or whole directories. `build` resolves cross-module
//! references and produces the immutable `ModuleRegistry` that every worker
//! borrows during a run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::core::error::LoadError;
use crate::modules::graph::Module;
use crate::modules::loader::{load_module_file, parse_module};
use crate::rules::lookup::{LookupTable, LookupTables};

/// Directory name whose JSON files are lookup tables rather than modules
pub const LOOKUP_TABLE_DIR: &str = "lookup_tables";

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    modules: BTreeMap<String, Module>,
    tables: LookupTables,
    rejected: Vec<LoadError>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already-built module
    pub fn add_module(&mut self, module: Module) -> Result<&mut Self, LoadError> {
        if self.modules.contains_key(&module.name) {
            return Err(LoadError::DuplicateModule {
                module: module.name,
            });
        }
        tracing::debug!("Registered module '{}' ({} states)", module.name, module.len());
        self.modules.insert(module.name.clone(), module);
        Ok(self)
    }

    /// Parse, validate and register a module description
    pub fn add_module_json(&mut self, json: &str) -> Result<&mut Self, LoadError> {
        let module = parse_module(json)?;
        self.add_module(module)
    }

    pub fn add_module_file(&mut self, path: &Path) -> Result<&mut Self, LoadError> {
        let module = load_module_file(path)?;
        self.add_module(module)
    }

    pub fn add_table(&mut self, table: LookupTable) -> Result<&mut Self, LoadError> {
        table.validate()?;
        tracing::debug!("Registered lookup table '{}' ({} rows)", table.name, table.rows.len());
        self.tables.insert(table)?;
        Ok(self)
    }

    pub fn add_table_json(&mut self, json: &str) -> Result<&mut Self, LoadError> {
        let table = LookupTable::from_json(json)?;
        self.add_table(table)
    }

    /// Load all .json files from a directory recursively
    ///
    /// Files below a `lookup_tables` directory are lookup tables; everything
    /// else is a module description. A file that fails to load is recorded as
    /// rejected and skipped; only I/O errors on the directory itself abort.
    /// Returns the number of files loaded.
    pub fn load_directory(&mut self, path: &Path) -> Result<usize, LoadError> {
        let mut loaded = 0;
        self.load_directory_recursive(path, false, &mut loaded)?;
        tracing::debug!("Loaded {} files from {}", loaded, path.display());
        Ok(loaded)
    }

    fn load_directory_recursive(
        &mut self,
        path: &Path,
        tables: bool,
        loaded: &mut usize,
    ) -> Result<(), LoadError> {
        // Sorted so rejection order and duplicate resolution do not depend on the filesystem
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            entries.push(entry?.path());
        }
        entries.sort();

        for entry_path in entries {
            if entry_path.is_dir() {
                let is_tables = tables
                    || entry_path
                        .file_name()
                        .map_or(false, |name| name == LOOKUP_TABLE_DIR);
                self.load_directory_recursive(&entry_path, is_tables, loaded)?;
            } else if entry_path.extension().map_or(false, |ext| ext == "json") {
                let result = if tables {
                    std::fs::read_to_string(&entry_path)
                        .map_err(LoadError::from)
                        .and_then(|json| self.add_table_json(&json).map(|_| ()))
                } else {
                    self.add_module_file(&entry_path).map(|_| ())
                };
                match result {
                    Ok(()) => *loaded += 1,
                    Err(e) => {
                        tracing::error!("Rejected {}: {}", entry_path.display(), e);
                        self.rejected.push(e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve cross-module references and freeze the registry
    ///
    /// Modules on a submodule cycle, or referencing an unknown submodule or
    /// lookup table, are rejected. Rejection cascades: a module calling a
    /// rejected submodule is rejected too.
    pub fn build(self) -> ModuleRegistry {
        let RegistryBuilder {
            mut modules,
            tables,
            mut rejected,
        } = self;

        for cycle in find_cycles(&modules) {
            tracing::error!("Rejected submodule cycle: {}", cycle.join(" -> "));
            for name in &cycle {
                modules.remove(name);
            }
            rejected.push(LoadError::CyclicSubmodule { cycle });
        }

        loop {
            let mut failures = Vec::new();
            for module in modules.values() {
                if let Some(error) = unresolved_reference(module, &modules, &tables) {
                    failures.push(error);
                }
            }
            if failures.is_empty() {
                break;
            }
            for error in failures {
                tracing::error!("Rejected module: {}", error);
                if let Some(name) = error.module() {
                    modules.remove(name);
                }
                rejected.push(error);
            }
        }

        tracing::debug!(
            "Module registry built: {} modules, {} lookup tables, {} rejected",
            modules.len(),
            tables.len(),
            rejected.len()
        );

        ModuleRegistry {
            modules,
            tables,
            rejected,
        }
    }
}

/// First reference of `module` that does not resolve
fn unresolved_reference(
    module: &Module,
    modules: &BTreeMap<String, Module>,
    tables: &LookupTables,
) -> Option<LoadError> {
    for (state, submodule) in module.submodule_calls() {
        if !modules.contains_key(submodule) {
            return Some(LoadError::UnknownSubmodule {
                module: module.name.clone(),
                state: state.to_string(),
                submodule: submodule.to_string(),
            });
        }
    }
    for (state, lookup) in module.lookup_tables() {
        let Some(table) = tables.get(&lookup.table) else {
            return Some(LoadError::UnknownLookupTable {
                module: module.name.clone(),
                state: state.to_string(),
                table: lookup.table.clone(),
            });
        };
        if table.columns.len() != lookup.attributes.len() {
            return Some(LoadError::LookupKeyMismatch {
                module: module.name.clone(),
                state: state.to_string(),
                table: lookup.table.clone(),
                attributes: lookup.attributes.len(),
                columns: table.columns.len(),
            });
        }
    }
    None
}

/// Every submodule call cycle, each listed from its first module back to itself
fn find_cycles(modules: &BTreeMap<String, Module>) -> Vec<Vec<String>> {
    let mut done: BTreeSet<&str> = BTreeSet::new();
    let mut cycles = Vec::new();

    for start in modules.keys() {
        let mut path: Vec<&str> = Vec::new();
        visit(start, modules, &mut path, &mut done, &mut cycles);
    }
    cycles
}

fn visit<'a>(
    name: &'a str,
    modules: &'a BTreeMap<String, Module>,
    path: &mut Vec<&'a str>,
    done: &mut BTreeSet<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    if done.contains(name) {
        return;
    }
    if let Some(pos) = path.iter().position(|n| *n == name) {
        let mut cycle: Vec<String> = path[pos..].iter().map(|n| n.to_string()).collect();
        cycle.push(name.to_string());
        if !cycles.contains(&cycle) {
            cycles.push(cycle);
        }
        return;
    }
    let Some(module) = modules.get(name) else {
        return;
    };

    path.push(name);
    let mut callees: Vec<&str> = module.submodule_calls().into_iter().map(|(_, s)| s).collect();
    callees.sort_unstable();
    callees.dedup();
    for callee in callees {
        visit(callee, modules, path, done, cycles);
    }
    path.pop();
    done.insert(name);
}

/// Immutable set of validated modules plus their lookup tables
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Module>,
    tables: LookupTables,
    rejected: Vec<LoadError>,
}

impl ModuleRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Modules attached to every person, in name order
    pub fn top_level(&self) -> impl Iterator<Item = &Module> + '_ {
        self.modules.values().filter(|m| !m.submodule)
    }

    /// All module names, in name order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.modules.keys().map(String::as_str)
    }

    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// Everything that failed to load or resolve
    pub fn rejected(&self) -> &[LoadError] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
