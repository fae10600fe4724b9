//! Sources of module metadata.

use crate::config::CascadeConfig;
use crate::error::Result;

use super::Module;

/// Supplies the full set of known modules.
///
/// A failure here is fatal to the run.
pub trait ModuleRegistry {
    /// List every known module.
    fn list_modules(&self) -> Result<Vec<Module>>;
}

/// Reads modules from the `modules:` section of the project config.
pub struct ConfigRegistry<'a> {
    config: &'a CascadeConfig,
}

impl<'a> ConfigRegistry<'a> {
    /// Create a registry backed by a loaded config.
    pub fn new(config: &'a CascadeConfig) -> Self {
        Self { config }
    }
}

impl ModuleRegistry for ConfigRegistry<'_> {
    fn list_modules(&self) -> Result<Vec<Module>> {
        let modules = self
            .config
            .modules
            .iter()
            .map(|(moniker, module)| {
                let mut resolved = Module::new(moniker.clone(), module.depends_on.iter().cloned());
                if let Some(workflow) = &module.workflow {
                    resolved = resolved.with_workflow(workflow.clone());
                }
                if !module.paths.is_empty() {
                    resolved = resolved.with_paths(module.paths.iter().cloned());
                }
                resolved
            })
            .collect();

        Ok(modules)
    }
}

/// A fixed list of modules, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    modules: Vec<Module>,
}

impl StaticRegistry {
    /// Create a registry that returns exactly `modules`.
    pub fn new(modules: Vec<Module>) -> Self {
        Self { modules }
    }
}

impl ModuleRegistry for StaticRegistry {
    fn list_modules(&self) -> Result<Vec<Module>> {
        Ok(self.modules.clone())
    }
}
