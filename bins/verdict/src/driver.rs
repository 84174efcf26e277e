/// Driver Generation
///
/// Turns the submitted source into a standalone program whose `main` calls
/// the located entry point. The driver is compiled with `--cfg test`, which
/// keeps `#[cfg(test)]` modules but drops every other `#[test]` function.
///
/// The source is edited as text, in place, at the token positions syn
/// reports. Every user line keeps its line number, so panic locations,
/// `line!()` and (with the compiler's path remapping) `file!()` match the
/// submitted file.
///
/// Edits applied:
/// - test-only attributes on the entry function are blanked out
/// - the entry function and each module on its path get `pub(crate)`
/// - a crate-root `fn main` is renamed out of the way
/// - a generated `main` is appended after the last user line; it reports
///   the entry point's return value through `std::process::Termination`,
///   so both `()` and `Result` entry points map to an exit code

use crate::locator::{is_entry_marker, EntryPoint};
use anyhow::{bail, Result};
use proc_macro2::{LineColumn, Span};
use syn::{Attribute, File, Ident, Item, Signature, Visibility};

/// Name given to a user-defined `fn main` inside the driver
pub const RENAMED_USER_MAIN: &str = "__verdict_user_main";

fn is_test_only_attribute(attr: &Attribute) -> bool {
    is_entry_marker(attr) || attr.path().is_ident("should_panic") || attr.path().is_ident("ignore")
}

/// Produce the driver source for `entry`. `file` must be parsed from `source`.
pub fn instrument(source: &str, file: &File, entry: &EntryPoint) -> Result<String> {
    if entry.module_path.is_empty() && entry.name == "main" {
        bail!("Entry point cannot be named `main`");
    }

    let positions = SourcePositions::new(source);
    let mut edits = Vec::new();

    for item in &file.items {
        if let Item::Fn(func) = item {
            if func.sig.ident == "main" {
                edits.push(Edit::replace(
                    &positions,
                    func.sig.ident.span(),
                    func.sig.ident.span(),
                    RENAMED_USER_MAIN,
                ));
            }
        }
    }

    if !expose(&file.items, &entry.module_path, &entry.name, &positions, &mut edits) {
        bail!("Entry point `{}` not found while generating driver", entry.qualified_name());
    }

    let mut driver = apply(source, edits);
    if !driver.ends_with('\n') {
        driver.push('\n');
    }
    driver.push_str(&format!(
        "\nfn main() -> ::std::process::ExitCode {{\n    ::std::process::Termination::report(crate::{}())\n}}\n",
        entry.qualified_name()
    ));

    Ok(driver)
}

/// Walk down `module_path`, queueing visibility edits along the way, and blank
/// the test attributes on the entry function. Returns false if the path is gone.
fn expose(
    items: &[Item],
    module_path: &[Ident],
    name: &Ident,
    positions: &SourcePositions,
    edits: &mut Vec<Edit>,
) -> bool {
    match module_path.split_first() {
        None => {
            for item in items {
                if let Item::Fn(func) = item {
                    if &func.sig.ident == name && func.attrs.iter().any(is_entry_marker) {
                        for attr in func.attrs.iter().filter(|attr| is_test_only_attribute(attr)) {
                            edits.push(Edit::blank(
                                positions,
                                attr.pound_token.spans[0],
                                attr.bracket_token.span.close(),
                            ));
                        }
                        widen(&func.vis, signature_start(&func.sig), positions, edits);
                        return true;
                    }
                }
            }
            false
        }
        Some((head, rest)) => {
            for item in items {
                if let Item::Mod(module) = item {
                    if &module.ident != head {
                        continue;
                    }
                    if let Some((_, content)) = &module.content {
                        if expose(content, rest, name, positions, edits) {
                            let start = module
                                .unsafety
                                .map(|token| token.span)
                                .unwrap_or(module.mod_token.span);
                            widen(&module.vis, start, positions, edits);
                            return true;
                        }
                    }
                }
            }
            false
        }
    }
}

/// First token of a function signature: `const`, `async`, `unsafe`, `extern` or `fn`
fn signature_start(sig: &Signature) -> Span {
    sig.constness
        .map(|token| token.span)
        .or(sig.asyncness.map(|token| token.span))
        .or(sig.unsafety.map(|token| token.span))
        .or(sig.abi.as_ref().map(|abi| abi.extern_token.span))
        .unwrap_or(sig.fn_token.span)
}

/// Make an item reachable from the crate root
fn widen(vis: &Visibility, item_start: Span, positions: &SourcePositions, edits: &mut Vec<Edit>) {
    match vis {
        Visibility::Public(_) => {}
        Visibility::Inherited => edits.push(Edit::insert(positions, item_start, "pub(crate) ")),
        Visibility::Restricted(restricted) => edits.push(Edit::replace(
            positions,
            restricted.pub_token.span,
            restricted.paren_token.span.close(),
            "pub(crate)",
        )),
    }
}

/// Byte offsets for syn's line/column positions
struct SourcePositions<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourcePositions<'a> {
    fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self { source, line_starts }
    }

    /// `line` is 1-based, `column` counts chars
    fn offset(&self, position: LineColumn) -> usize {
        let Some(&line_start) = self.line_starts.get(position.line.saturating_sub(1)) else {
            return self.source.len();
        };
        let line_end = self
            .line_starts
            .get(position.line)
            .copied()
            .unwrap_or(self.source.len());
        let line = &self.source[line_start..line_end];

        // syn strips a leading BOM before parsing
        let column = if position.line == 1 && line.starts_with('\u{feff}') {
            position.column + 1
        } else {
            position.column
        };

        line_start
            + line
                .char_indices()
                .nth(column)
                .map(|(idx, _)| idx)
                .unwrap_or(line.len())
    }
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

impl Edit {
    fn insert(positions: &SourcePositions, at: Span, text: &str) -> Self {
        let offset = positions.offset(at.start());
        Self {
            start: offset,
            end: offset,
            text: text.to_string(),
        }
    }

    fn replace(positions: &SourcePositions, first: Span, last: Span, text: &str) -> Self {
        Self {
            start: positions.offset(first.start()),
            end: positions.offset(last.end()),
            text: text.to_string(),
        }
    }

    /// Overwrite with spaces, keeping line breaks
    fn blank(positions: &SourcePositions, first: Span, last: Span) -> Self {
        let start = positions.offset(first.start());
        let end = positions.offset(last.end());
        let text = positions.source[start..end]
            .chars()
            .map(|c| if c == '\n' || c == '\r' { c } else { ' ' })
            .collect();
        Self { start, end, text }
    }
}

fn apply(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.start.cmp(&a.start));
    let mut out = source.to_string();
    for edit in edits {
        out.replace_range(edit.start..edit.end, &edit.text);
    }
    out
}
