use anyhow::Result;
use std::fmt::Write as _;

use crate::scanner::ExtractionResult;

/// Plain-text listing, one section per target name.
///
/// Only files where the target has a definition are listed under it.
pub fn render_text(result: &ExtractionResult) -> String {
    let mut out = String::new();

    for target in &result.targets {
        let _ = writeln!(
            out,
            "Functions called by {target} and their definitions across all files:"
        );

        for file in &result.files {
            let Some(Some(def)) = file.functions.get(target) else { continue };
            let _ = writeln!(out, "In file {}:", file.path.display());
            let _ = writeln!(
                out,
                "  {} is defined from line {} to line {}",
                def.name, def.start_line, def.end_line
            );
            let _ = writeln!(out, "  Function content:\n{}\n", def.content.trim_end_matches('\n'));
        }
    }

    out
}

pub fn render_json(result: &ExtractionResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}
