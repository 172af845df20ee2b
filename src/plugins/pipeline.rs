//! Middleware chain assembly.
//!
//! The first declared plugin is the outermost wrapper: it sees the request
//! first and the response last.

use crate::plugins::{Handler, PluginDecl, PluginError, PluginRegistry};

/// Wrap `terminal` with every declared plugin, outermost first.
///
/// Fails on the first unknown plugin or invalid plugin input.
pub fn build(
    registry: &PluginRegistry,
    plugins: &[PluginDecl],
    terminal: Handler,
) -> Result<Handler, PluginError> {
    plugins.iter().rev().try_fold(terminal, |next, decl| {
        let constructor = registry.lookup(&decl.name)?;
        constructor(decl, next)
    })
}
