use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use renderer::program::{BUILTIN_FRAGMENT_SHADER, BUILTIN_VERTEX_SHADER};
use renderer::VisualProgram;

/// Where each stage of the visual program comes from. `None` selects the
/// bundled stage.
#[derive(Debug, Clone, Default)]
pub struct ProgramFiles {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
}

impl ProgramFiles {
    /// Reads both stages from disk. Called again on every reload.
    pub fn load(&self) -> Result<VisualProgram> {
        let vertex = read_stage(self.vertex.as_deref(), BUILTIN_VERTEX_SHADER)?;
        let fragment = read_stage(self.fragment.as_deref(), BUILTIN_FRAGMENT_SHADER)?;
        Ok(VisualProgram::new(vertex, fragment))
    }
}

fn read_stage(path: Option<&Path>, builtin: &'static str) -> Result<Cow<'static, str>> {
    match path {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read shader {}", path.display()))?;
            tracing::debug!(path = %path.display(), bytes = source.len(), "loaded shader stage");
            Ok(Cow::Owned(source))
        }
        None => Ok(Cow::Borrowed(builtin)),
    }
}
