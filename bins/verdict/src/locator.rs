/// Entry Point Locator
///
/// Finds the function a submitted source marks with `#[test]`. Only the
/// first one counts: items are visited in declaration order, and inline
/// `mod` blocks are searched in place (depth-first), so
///
/// ```text
/// mod checks { #[test] fn a() {} }
/// #[test] fn b() {}
/// ```
///
/// selects `checks::a`.

use anyhow::{Context, Result};
use syn::{Attribute, File, Ident, Item};

/// Location of the selected entry point relative to the crate root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub module_path: Vec<Ident>,
    pub name: Ident,
}

impl EntryPoint {
    /// `checks::a` style name, as libtest would print it
    pub fn qualified_name(&self) -> String {
        self.module_path
            .iter()
            .chain(std::iter::once(&self.name))
            .map(|ident| ident.to_string())
            .collect::<Vec<_>>()
            .join("::")
    }
}

pub fn parse_source(source_code: &str) -> Result<File> {
    syn::parse_file(source_code).context("Failed to parse source for entry point lookup")
}

pub(crate) fn is_entry_marker(attr: &Attribute) -> bool {
    attr.path().is_ident("test")
}

pub fn locate_entry_point(file: &File) -> Option<EntryPoint> {
    let mut module_path = Vec::new();
    find_in_items(&file.items, &mut module_path)
}

fn find_in_items(items: &[Item], module_path: &mut Vec<Ident>) -> Option<EntryPoint> {
    for item in items {
        match item {
            Item::Fn(func) if func.attrs.iter().any(is_entry_marker) => {
                return Some(EntryPoint {
                    module_path: module_path.clone(),
                    name: func.sig.ident.clone(),
                });
            }
            Item::Mod(module) => {
                if let Some((_, content)) = &module.content {
                    module_path.push(module.ident.clone());
                    let found = find_in_items(content, module_path);
                    module_path.pop();
                    if found.is_some() {
                        return found;
                    }
                }
            }
            _ => {}
        }
    }
    None
}
