use crate::config::config_dir;
use std::path::PathBuf;

pub(crate) fn default_functions_path() -> Option<PathBuf> {
    let mut path = config_dir()?;
    path.push("default.rhai");
    Some(path)
}

/// Put `default.rhai` first in `functions` when it exists.
pub(crate) fn prepend_default_functions_if_present(
    functions: &mut Vec<PathBuf>,
    no_default_functions: bool,
) {
    if no_default_functions {
        return;
    }
    let Some(path) = default_functions_path() else {
        return;
    };
    if path.is_file() {
        functions.insert(0, path);
    } else {
        tracing::debug!(path = %path.display(), "no default functions file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_functions_path_is_deterministic() {
        assert_eq!(default_functions_path(), default_functions_path());
        if let Some(path) = default_functions_path() {
            assert!(path.ends_with("default.rhai"));
        }
    }

    #[test]
    fn disabled_default_functions_leave_list_alone() {
        let mut functions = vec![PathBuf::from("a.rhai")];
        prepend_default_functions_if_present(&mut functions, true);
        assert_eq!(functions, vec![PathBuf::from("a.rhai")]);
    }
}
