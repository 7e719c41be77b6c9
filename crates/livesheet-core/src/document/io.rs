use super::Calculator;
use crate::error::{Result, SheetError};
use livesheet_engine::engine::MathEngine;
use std::path::{Path, PathBuf};

pub const MAX_FUNCTION_FILE_BYTES: u64 = 1_048_576; // 1 MiB

fn read_functions_file(path: &Path) -> Result<String> {
    let meta = std::fs::metadata(path)?;
    if meta.len() > MAX_FUNCTION_FILE_BYTES {
        return Err(SheetError::TooLarge {
            path: path.display().to_string(),
            size: meta.len(),
            max: MAX_FUNCTION_FILE_BYTES,
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Read a sheet from disk.
pub fn read_sheet(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

/// Write a rewritten sheet back to disk.
pub fn write_sheet(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text)?;
    Ok(())
}

impl Calculator<MathEngine> {
    /// Load custom Rhai functions from a file (appends to existing functions).
    /// Returns the path loaded, or an error.
    pub fn load_functions(&mut self, path: &Path) -> Result<PathBuf> {
        let path_buf = std::fs::canonicalize(path)?;
        let content = read_functions_file(&path_buf)?;

        if self.functions_files.contains(&path_buf) {
            // Already loaded: keep current compiled state unchanged.
            return Ok(path_buf);
        }

        let merged = match &self.custom_functions {
            Some(existing) => format!("{}\n\n{}", existing, content),
            None => content,
        };

        // The engine only swaps its functions once the script compiles.
        self.engine.load_functions(&merged)?;
        self.functions_files.push(path_buf.clone());
        self.custom_functions = Some(merged);
        tracing::info!(path = %path_buf.display(), "loaded functions file");

        Ok(path_buf)
    }

    /// Reload all custom functions from the loaded files.
    /// Returns the number of files reloaded.
    pub fn reload_functions(&mut self) -> Result<usize> {
        if self.functions_files.is_empty() {
            return Err(SheetError::NoFunctionsLoaded);
        }

        let mut merged = String::new();
        for (idx, path) in self.functions_files.iter().enumerate() {
            let content = read_functions_file(path)?;
            if idx > 0 {
                merged.push_str("\n\n");
            }
            merged.push_str(&content);
        }

        self.engine.load_functions(&merged)?;
        self.custom_functions = Some(merged);

        Ok(self.functions_files.len())
    }

    /// Read `path`, rewrite it and return the new text.
    pub fn calculate_file(&mut self, path: &Path, math_sections: bool) -> Result<String> {
        let text = read_sheet(path)?;
        Ok(if math_sections {
            self.calculate_with_math_sections(&text)
        } else {
            self.calculate(&text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("livesheet_io_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_functions_makes_them_callable() {
        let dir = temp_dir("load");
        let path = dir.join("fns.rhai");
        fs::write(&path, "fn double(x) { x * 2.0 }").unwrap();

        let mut calc = Calculator::default();
        calc.load_functions(&path).unwrap();
        assert_eq!(calc.calculate("double(21) ="), "double(21) = 42");

        // Loading the same file twice is a no-op.
        calc.load_functions(&path).unwrap();
        assert_eq!(calc.functions_files.len(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_compile_keeps_previous_functions() {
        let dir = temp_dir("broken");
        let good = dir.join("good.rhai");
        let bad = dir.join("bad.rhai");
        fs::write(&good, "fn triple(x) { x * 3.0 }").unwrap();
        fs::write(&bad, "fn broken(x) { x * }").unwrap();

        let mut calc = Calculator::default();
        calc.load_functions(&good).unwrap();
        assert!(calc.load_functions(&bad).is_err());
        assert_eq!(calc.functions_files.len(), 1);
        assert_eq!(calc.calculate("triple(2) ="), "triple(2) = 6");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_reload_functions() {
        let mut calc = Calculator::default();
        assert!(matches!(calc.reload_functions(), Err(SheetError::NoFunctionsLoaded)));

        let dir = temp_dir("reload");
        let path = dir.join("fns.rhai");
        fs::write(&path, "fn bump(x) { x + 1.0 }").unwrap();
        calc.load_functions(&path).unwrap();
        fs::write(&path, "fn bump(x) { x + 10.0 }").unwrap();
        assert_eq!(calc.reload_functions().unwrap(), 1);
        assert_eq!(calc.calculate("bump(1) ="), "bump(1) = 11");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_oversized_functions_file_is_refused() {
        let dir = temp_dir("large");
        let path = dir.join("big.rhai");
        fs::write(&path, vec![b' '; (MAX_FUNCTION_FILE_BYTES + 1) as usize]).unwrap();
        let mut calc = Calculator::default();
        assert!(matches!(calc.load_functions(&path), Err(SheetError::TooLarge { .. })));
        fs::remove_dir_all(&dir).unwrap();
    }
}
